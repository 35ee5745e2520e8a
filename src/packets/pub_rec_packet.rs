use bytes::{Bytes, BytesMut};

use crate::{
    error::{DecodeError, EncodeError},
    limits::ConnectionLimits,
    protocol::{PacketType, UserProperties},
};

use super::{
    encode_publish_ack, pub_ack_packet::PubAckReasonCode, ControlPacket, DecodablePacket,
    EncodablePacket, PublishAck,
};

/// PUBREC uses the same Reason Codes as PUBACK.
pub type PubRecReasonCode = PubAckReasonCode;

/// A PUBREC packet is the response to a PUBLISH packet with `QoS` 2. It is the second packet of
/// the `QoS` 2 protocol exchange.
///
/// Reference: <https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901131>
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PubRecPacket {
    pub packet_identifier: u16,
    pub reason_code: PubRecReasonCode,
    pub reason_string: Option<String>,
    pub user_properties: UserProperties,
}

impl PubRecPacket {
    pub fn new(packet_identifier: u16, reason_code: PubRecReasonCode) -> Self {
        Self {
            packet_identifier,
            reason_code,
            reason_string: None,
            user_properties: UserProperties::new(),
        }
    }
}

impl ControlPacket for PubRecPacket {
    const PACKET_TYPE: PacketType = PacketType::PubRec;
}

impl DecodablePacket for PubRecPacket {
    fn decode(
        buf: &mut Bytes,
        _flags: u8,
        limits: &mut ConnectionLimits,
    ) -> Result<Self, DecodeError> {
        let PublishAck { packet_identifier, reason_code, reason_string, user_properties } =
            PublishAck::decode(buf, Self::PACKET_TYPE, limits)?;

        Ok(Self { packet_identifier, reason_code, reason_string, user_properties })
    }
}

impl EncodablePacket for PubRecPacket {
    fn encode_body(
        &self,
        buf: &mut BytesMut,
        omit_problem_information: bool,
    ) -> Result<(), EncodeError> {
        encode_publish_ack(
            buf,
            self.packet_identifier,
            self.reason_code,
            self.reason_string.as_deref(),
            &self.user_properties,
            omit_problem_information,
        )
    }

    fn has_problem_information(&self) -> bool {
        self.reason_string.is_some() || !self.user_properties.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_error_code() {
        let packet = PubRecPacket::decode_packet(
            0,
            Bytes::from_static(&[0x12, 0x34, 0x91, 0]),
            &mut ConnectionLimits::default(),
        )
        .unwrap();

        assert_eq!(packet, PubRecPacket::new(0x1234, PubRecReasonCode::PacketIdentifierInUse));
    }

    #[test]
    fn trailing_byte_after_empty_properties() {
        let result = PubRecPacket::decode_packet(
            0,
            Bytes::from_static(&[0, 1, 0x00, 0, 0xFF]),
            &mut ConnectionLimits::default(),
        );
        assert!(matches!(result, Err(DecodeError::MalformedPacket(_))));
    }
}

use std::fmt;

use bytes::{Bytes, BytesMut};

use crate::{
    error::{DecodeError, EncodeError},
    limits::ConnectionLimits,
    protocol::{PacketType, UserProperties},
};

use super::{
    encode_publish_ack, ControlPacket, DecodablePacket, EncodablePacket, PublishAck, ReasonCode,
};

/// Reason Codes of PUBREL and PUBCOMP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PubRelReasonCode {
    /// Message released.
    #[default]
    Success = 0x00,

    /// The Packet Identifier is not known. This is not an error during recovery, but at other
    /// times indicates a mismatch between the Session State on the Client and Server.
    PacketIdentifierNotFound = 0x92,
}

impl ReasonCode for PubRelReasonCode {
    fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Self::Success),
            0x92 => Some(Self::PacketIdentifierNotFound),
            _ => None,
        }
    }

    fn to_u8(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for PubRelReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "Success"),
            Self::PacketIdentifierNotFound => write!(f, "Packet Identifier not found"),
        }
    }
}

/// A PUBREL packet is the response to a PUBREC packet. It is the third packet of the `QoS` 2
/// protocol exchange.
///
/// Reference: <https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901141>
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PubRelPacket {
    pub packet_identifier: u16,
    pub reason_code: PubRelReasonCode,
    pub reason_string: Option<String>,
    pub user_properties: UserProperties,
}

impl PubRelPacket {
    pub fn new(packet_identifier: u16, reason_code: PubRelReasonCode) -> Self {
        Self {
            packet_identifier,
            reason_code,
            reason_string: None,
            user_properties: UserProperties::new(),
        }
    }
}

impl ControlPacket for PubRelPacket {
    const PACKET_TYPE: PacketType = PacketType::PubRel;
}

impl DecodablePacket for PubRelPacket {
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

impl EncodablePacket for PubRelPacket {
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
    fn requires_flags_0010() {
        let mut limits = ConnectionLimits::default();

        let packet =
            PubRelPacket::decode_packet(0b0010, Bytes::from_static(&[0, 9]), &mut limits).unwrap();
        assert_eq!(packet, PubRelPacket::new(9, PubRelReasonCode::Success));

        let result = PubRelPacket::decode_packet(0, Bytes::from_static(&[0, 9]), &mut limits);
        assert!(matches!(result, Err(DecodeError::MalformedPacket(_))));
    }

    #[test]
    fn encodes_reserved_flags() {
        let mut buf = BytesMut::new();
        PubRelPacket::new(9, PubRelReasonCode::PacketIdentifierNotFound)
            .encode(&mut buf, &ConnectionLimits::default())
            .unwrap();
        assert_eq!(&buf[..], &[0x62, 3, 0, 9, 0x92]);
    }

    #[test]
    fn puback_reason_code_is_not_valid_here() {
        let result = PubRelPacket::decode_packet(
            0b0010,
            Bytes::from_static(&[0, 9, 0x10]),
            &mut ConnectionLimits::default(),
        );
        assert!(matches!(result, Err(DecodeError::MalformedPacket(_))));
    }
}

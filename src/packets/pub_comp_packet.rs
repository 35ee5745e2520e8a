use bytes::{Bytes, BytesMut};

use crate::{
    error::{DecodeError, EncodeError},
    limits::ConnectionLimits,
    protocol::{PacketType, UserProperties},
};

use super::{
    encode_publish_ack, pub_rel_packet::PubRelReasonCode, ControlPacket, DecodablePacket,
    EncodablePacket, PublishAck,
};

/// PUBCOMP uses the same Reason Codes as PUBREL.
pub type PubCompReasonCode = PubRelReasonCode;

/// The PUBCOMP packet is the response to a PUBREL packet. It is the fourth and final packet of
/// the `QoS` 2 protocol exchange.
///
/// Reference: <https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901151>
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PubCompPacket {
    pub packet_identifier: u16,
    pub reason_code: PubCompReasonCode,
    pub reason_string: Option<String>,
    pub user_properties: UserProperties,
}

impl PubCompPacket {
    pub fn new(packet_identifier: u16, reason_code: PubCompReasonCode) -> Self {
        Self {
            packet_identifier,
            reason_code,
            reason_string: None,
            user_properties: UserProperties::new(),
        }
    }
}

impl ControlPacket for PubCompPacket {
    const PACKET_TYPE: PacketType = PacketType::PubComp;
}

impl DecodablePacket for PubCompPacket {
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

impl EncodablePacket for PubCompPacket {
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

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

/// Reason Codes of PUBACK and PUBREC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PubAckReasonCode {
    /// The message is accepted. Publication of the `QoS` 1 message proceeds.
    #[default]
    Success = 0x00,

    /// The message is accepted but there are no subscribers.
    NoMatchingSubscribers = 0x10,

    /// The receiver does not accept the publish but either does not want to reveal the reason, or
    /// it does not match one of the other values.
    UnspecifiedError = 0x80,

    /// The PUBLISH is valid but the receiver is not willing to accept it.
    ImplementationSpecificError = 0x83,

    /// The PUBLISH is not authorized.
    NotAuthorized = 0x87,

    /// The Topic Name is not malformed, but is not accepted by this Client or Server.
    TopicNameInvalid = 0x90,

    /// The Packet Identifier is already in use.
    PacketIdentifierInUse = 0x91,

    /// An implementation or administrative imposed limit has been exceeded.
    QuotaExceeded = 0x97,

    /// The payload format does not match the specified Payload Format Indicator.
    PayloadFormatInvalid = 0x99,
}

impl ReasonCode for PubAckReasonCode {
    fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Self::Success),
            0x10 => Some(Self::NoMatchingSubscribers),
            0x80 => Some(Self::UnspecifiedError),
            0x83 => Some(Self::ImplementationSpecificError),
            0x87 => Some(Self::NotAuthorized),
            0x90 => Some(Self::TopicNameInvalid),
            0x91 => Some(Self::PacketIdentifierInUse),
            0x97 => Some(Self::QuotaExceeded),
            0x99 => Some(Self::PayloadFormatInvalid),
            _ => None,
        }
    }

    fn to_u8(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for PubAckReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            Self::Success => "Success",
            Self::NoMatchingSubscribers => "No matching subscribers",
            Self::UnspecifiedError => "Unspecified error",
            Self::ImplementationSpecificError => "Implementation specific error",
            Self::NotAuthorized => "Not authorized",
            Self::TopicNameInvalid => "Topic Name invalid",
            Self::PacketIdentifierInUse => "Packet Identifier in use",
            Self::QuotaExceeded => "Quota exceeded",
            Self::PayloadFormatInvalid => "Payload format invalid",
        };

        write!(f, "{value}")
    }
}

/// A PUBACK packet is the response to a PUBLISH packet with `QoS` 1.
///
/// Reference: <https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901121>
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PubAckPacket {
    pub packet_identifier: u16,
    pub reason_code: PubAckReasonCode,

    /// Human readable string designed for diagnostics.
    pub reason_string: Option<String>,
    pub user_properties: UserProperties,
}

impl PubAckPacket {
    pub fn new(packet_identifier: u16, reason_code: PubAckReasonCode) -> Self {
        Self {
            packet_identifier,
            reason_code,
            reason_string: None,
            user_properties: UserProperties::new(),
        }
    }
}

impl ControlPacket for PubAckPacket {
    const PACKET_TYPE: PacketType = PacketType::PubAck;
}

impl DecodablePacket for PubAckPacket {
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

impl EncodablePacket for PubAckPacket {
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
    use crate::protocol::UserProperty;

    use super::*;

    fn decode(bytes: &'static [u8], limits: &mut ConnectionLimits) -> Result<PubAckPacket, DecodeError> {
        PubAckPacket::decode_packet(0, Bytes::from_static(bytes), limits)
    }

    #[test]
    fn minimal_puback_is_success() {
        let packet = decode(&[0, 7], &mut ConnectionLimits::default()).unwrap();
        assert_eq!(packet, PubAckPacket::new(7, PubAckReasonCode::Success));
        assert!(packet.user_properties.is_empty());
    }

    #[test]
    fn reason_code_without_properties() {
        let packet = decode(&[0, 7, 0x10], &mut ConnectionLimits::default()).unwrap();
        assert_eq!(packet.reason_code, PubAckReasonCode::NoMatchingSubscribers);
    }

    #[test]
    fn unknown_reason_code_is_malformed() {
        let result = decode(&[0, 7, 0x01], &mut ConnectionLimits::default());
        assert!(matches!(result, Err(DecodeError::MalformedPacket(_))));
    }

    #[test]
    fn too_short() {
        let result = decode(&[0], &mut ConnectionLimits::default());
        assert!(matches!(result, Err(DecodeError::MalformedPacket(_))));
    }

    #[test]
    fn reserved_flags() {
        let result = PubAckPacket::decode_packet(
            0b0010,
            Bytes::from_static(&[0, 7]),
            &mut ConnectionLimits::default(),
        );
        assert!(matches!(result, Err(DecodeError::MalformedPacket(_))));
    }

    #[test]
    fn reason_string_requires_problem_information() {
        let bytes: &'static [u8] = &[0, 7, 0x80, 5, 0x1F, 0, 2, b'n', b'o'];

        let packet = decode(bytes, &mut ConnectionLimits::default()).unwrap();
        assert_eq!(packet.reason_string.as_deref(), Some("no"));

        let mut limits = ConnectionLimits::new().with_request_problem_information(false);
        assert!(matches!(decode(bytes, &mut limits), Err(DecodeError::ProtocolError(_))));
    }

    #[test]
    fn foreign_property_is_protocol_error() {
        // Session Expiry Interval does not belong on PUBACK
        let result = decode(&[0, 7, 0x00, 5, 0x11, 0, 0, 0, 1], &mut ConnectionLimits::default());
        assert!(matches!(result, Err(DecodeError::ProtocolError(_))));
    }

    #[test]
    fn encodes_shortest_form() {
        let limits = ConnectionLimits::default();

        let mut buf = BytesMut::new();
        PubAckPacket::new(7, PubAckReasonCode::Success).encode(&mut buf, &limits).unwrap();
        assert_eq!(&buf[..], &[0x40, 2, 0, 7]);

        let mut buf = BytesMut::new();
        PubAckPacket::new(7, PubAckReasonCode::QuotaExceeded).encode(&mut buf, &limits).unwrap();
        assert_eq!(&buf[..], &[0x40, 3, 0, 7, 0x97]);
    }

    #[test]
    fn drops_problem_information_when_too_large() {
        let mut limits = ConnectionLimits::default();
        limits
            .apply_connack(&crate::packets::conn_ack_packet::ConnAckPacket {
                maximum_packet_size: Some(8),
                ..Default::default()
            })
            .unwrap();

        let mut packet = PubAckPacket::new(7, PubAckReasonCode::UnspecifiedError);
        packet.user_properties.push(UserProperty::new("key", "value"));

        let mut buf = BytesMut::new();
        packet.encode(&mut buf, &limits).unwrap();
        assert_eq!(&buf[..], &[0x40, 3, 0, 7, 0x80]);
    }
}

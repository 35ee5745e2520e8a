use std::fmt;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::{
    error::{DecodeError, EncodeError},
    limits::ConnectionLimits,
    protocol::{decoding::decode_u16, properties::PropertyEncoder, PacketType, UserProperties},
};

use super::{
    decode_ack_properties, decode_reason_code, encode_problem_information, ControlPacket,
    DecodablePacket, EncodablePacket, ReasonCode,
};

/// Reason Codes of SUBACK, one per requested subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubAckReasonCode {
    /// The subscription is accepted and the maximum `QoS` sent will be `QoS` 0.
    #[default]
    GrantedQos0 = 0x00,

    /// The subscription is accepted and the maximum `QoS` sent will be `QoS` 1.
    GrantedQos1 = 0x01,

    /// The subscription is accepted and any received `QoS` will be sent to this subscription.
    GrantedQos2 = 0x02,

    /// The subscription is not accepted and the Server either does not wish to reveal the
    /// reason or none of the other Reason Codes apply.
    UnspecifiedError = 0x80,

    /// The SUBSCRIBE is valid but the Server does not accept it.
    ImplementationSpecificError = 0x83,

    /// The Client is not authorized to make this subscription.
    NotAuthorized = 0x87,

    /// The Topic Filter is correctly formed but is not allowed for this Client.
    TopicFilterInvalid = 0x8F,

    /// The specified Packet Identifier is already in use.
    PacketIdentifierInUse = 0x91,

    /// An implementation or administrative imposed limit has been exceeded.
    QuotaExceeded = 0x97,

    /// The Server does not support Shared Subscriptions for this Client.
    SharedSubscriptionsNotSupported = 0x9E,

    /// The Server does not support Subscription Identifiers; the subscription is not accepted.
    SubscriptionIdentifiersNotSupported = 0xA1,

    /// The Server does not support Wildcard Subscriptions; the subscription is not accepted.
    WildcardSubscriptionsNotSupported = 0xA2,
}

impl ReasonCode for SubAckReasonCode {
    fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Self::GrantedQos0),
            0x01 => Some(Self::GrantedQos1),
            0x02 => Some(Self::GrantedQos2),
            0x80 => Some(Self::UnspecifiedError),
            0x83 => Some(Self::ImplementationSpecificError),
            0x87 => Some(Self::NotAuthorized),
            0x8F => Some(Self::TopicFilterInvalid),
            0x91 => Some(Self::PacketIdentifierInUse),
            0x97 => Some(Self::QuotaExceeded),
            0x9E => Some(Self::SharedSubscriptionsNotSupported),
            0xA1 => Some(Self::SubscriptionIdentifiersNotSupported),
            0xA2 => Some(Self::WildcardSubscriptionsNotSupported),
            _ => None,
        }
    }

    fn to_u8(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for SubAckReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            Self::GrantedQos0 => "Granted QoS 0",
            Self::GrantedQos1 => "Granted QoS 1",
            Self::GrantedQos2 => "Granted QoS 2",
            Self::UnspecifiedError => "Unspecified error",
            Self::ImplementationSpecificError => "Implementation specific error",
            Self::NotAuthorized => "Not authorized",
            Self::TopicFilterInvalid => "Topic Filter invalid",
            Self::PacketIdentifierInUse => "Packet Identifier in use",
            Self::QuotaExceeded => "Quota exceeded",
            Self::SharedSubscriptionsNotSupported => "Shared Subscriptions not supported",
            Self::SubscriptionIdentifiersNotSupported => "Subscription Identifiers not supported",
            Self::WildcardSubscriptionsNotSupported => "Wildcard Subscriptions not supported",
        };

        write!(f, "{value}")
    }
}

/// A SUBACK packet is sent by the Server to the Client to confirm receipt and processing of a
/// SUBSCRIBE packet.
///
/// Reference: <https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901171>
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubAckPacket {
    pub packet_identifier: u16,
    pub reason_string: Option<String>,
    pub user_properties: UserProperties,

    /// In the order of the Topic Filters in the SUBSCRIBE packet.
    pub reason_codes: Vec<SubAckReasonCode>,
}

impl SubAckPacket {
    pub fn new(packet_identifier: u16, reason_codes: Vec<SubAckReasonCode>) -> Self {
        Self {
            packet_identifier,
            reason_string: None,
            user_properties: UserProperties::new(),
            reason_codes,
        }
    }
}

impl ControlPacket for SubAckPacket {
    const PACKET_TYPE: PacketType = PacketType::SubAck;
}

impl DecodablePacket for SubAckPacket {
    fn decode(
        buf: &mut Bytes,
        _flags: u8,
        limits: &mut ConnectionLimits,
    ) -> Result<Self, DecodeError> {
        if buf.remaining() < 3 {
            return Err(DecodeError::remaining_length_too_short(Self::PACKET_TYPE));
        }

        let packet_identifier = decode_u16(buf)?;
        let (reason_string, user_properties) =
            decode_ack_properties(buf, Self::PACKET_TYPE, limits)?;

        if !buf.has_remaining() {
            return Err(DecodeError::protocol("SUBACK must contain at least one reason code"));
        }

        let mut reason_codes = Vec::with_capacity(buf.remaining());
        while buf.has_remaining() {
            reason_codes.push(decode_reason_code(buf, Self::PACKET_TYPE)?);
        }

        Ok(Self { packet_identifier, reason_string, user_properties, reason_codes })
    }
}

impl EncodablePacket for SubAckPacket {
    fn encode_body(
        &self,
        buf: &mut BytesMut,
        omit_problem_information: bool,
    ) -> Result<(), EncodeError> {
        if self.reason_codes.is_empty() {
            return Err(EncodeError::InvalidPacket(
                "SUBACK must contain at least one reason code".into(),
            ));
        }

        buf.put_u16(self.packet_identifier);

        let mut properties = PropertyEncoder::new();
        encode_problem_information(
            &mut properties,
            self.reason_string.as_deref(),
            &self.user_properties,
            omit_problem_information,
        )?;
        properties.finish(buf)?;

        for reason_code in &self.reason_codes {
            buf.put_u8(reason_code.to_u8());
        }

        Ok(())
    }

    fn has_problem_information(&self) -> bool {
        self.reason_string.is_some() || !self.user_properties.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(bytes: &'static [u8]) -> Result<SubAckPacket, DecodeError> {
        SubAckPacket::decode_packet(0, Bytes::from_static(bytes), &mut ConnectionLimits::default())
    }

    #[test]
    fn reason_codes_in_order() {
        let packet = decode(&[0, 3, 0, 0x01, 0x87, 0x00]).unwrap();
        assert_eq!(
            packet,
            SubAckPacket::new(
                3,
                vec![
                    SubAckReasonCode::GrantedQos1,
                    SubAckReasonCode::NotAuthorized,
                    SubAckReasonCode::GrantedQos0,
                ]
            )
        );
    }

    #[test]
    fn empty_payload_is_protocol_error() {
        let result = SubAckPacket::decode_packet(
            0,
            Bytes::from_static(&[0, 3, 1, 0x26]),
            &mut ConnectionLimits::default(),
        );
        // property list runs past the end
        assert!(matches!(result, Err(DecodeError::MalformedPacket(_))));

        assert!(matches!(
            decode(&[0, 3, 5, 0x1F, 0, 2, b'o', b'k']),
            Err(DecodeError::ProtocolError(_))
        ));
    }

    #[test]
    fn unknown_reason_code_is_malformed() {
        assert!(matches!(decode(&[0, 3, 0, 0x03]), Err(DecodeError::MalformedPacket(_))));
    }

    #[test]
    fn too_short() {
        assert!(matches!(decode(&[0, 3]), Err(DecodeError::MalformedPacket(_))));
    }
}

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

/// Reason Codes of UNSUBACK, one per Topic Filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnsubAckReasonCode {
    /// The subscription is deleted.
    #[default]
    Success = 0x00,

    /// No matching Topic Filter is being used by the Client.
    NoSubscriptionExisted = 0x11,

    /// The unsubscribe could not be completed and the Server either does not wish to reveal the
    /// reason or none of the other Reason Codes apply.
    UnspecifiedError = 0x80,

    /// The UNSUBSCRIBE is valid but the Server does not accept it.
    ImplementationSpecificError = 0x83,

    /// The Client is not authorized to unsubscribe.
    NotAuthorized = 0x87,

    /// The Topic Filter is correctly formed but is not allowed for this Client.
    TopicFilterInvalid = 0x8F,

    /// The specified Packet Identifier is already in use.
    PacketIdentifierInUse = 0x91,
}

impl ReasonCode for UnsubAckReasonCode {
    fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Self::Success),
            0x11 => Some(Self::NoSubscriptionExisted),
            0x80 => Some(Self::UnspecifiedError),
            0x83 => Some(Self::ImplementationSpecificError),
            0x87 => Some(Self::NotAuthorized),
            0x8F => Some(Self::TopicFilterInvalid),
            0x91 => Some(Self::PacketIdentifierInUse),
            _ => None,
        }
    }

    fn to_u8(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for UnsubAckReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            Self::Success => "Success",
            Self::NoSubscriptionExisted => "No subscription existed",
            Self::UnspecifiedError => "Unspecified error",
            Self::ImplementationSpecificError => "Implementation specific error",
            Self::NotAuthorized => "Not authorized",
            Self::TopicFilterInvalid => "Topic Filter invalid",
            Self::PacketIdentifierInUse => "Packet Identifier in use",
        };

        write!(f, "{value}")
    }
}

/// The UNSUBACK packet is sent by the Server to the Client to confirm receipt of an UNSUBSCRIBE
/// packet.
///
/// Reference: <https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901187>
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsubAckPacket {
    pub packet_identifier: u16,
    pub reason_string: Option<String>,
    pub user_properties: UserProperties,
    pub reason_codes: Vec<UnsubAckReasonCode>,
}

impl UnsubAckPacket {
    pub fn new(packet_identifier: u16, reason_codes: Vec<UnsubAckReasonCode>) -> Self {
        Self {
            packet_identifier,
            reason_string: None,
            user_properties: UserProperties::new(),
            reason_codes,
        }
    }
}

impl ControlPacket for UnsubAckPacket {
    const PACKET_TYPE: PacketType = PacketType::UnsubAck;
}

impl DecodablePacket for UnsubAckPacket {
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
            return Err(DecodeError::protocol("UNSUBACK must contain at least one reason code"));
        }

        let mut reason_codes = Vec::with_capacity(buf.remaining());
        while buf.has_remaining() {
            reason_codes.push(decode_reason_code(buf, Self::PACKET_TYPE)?);
        }

        Ok(Self { packet_identifier, reason_string, user_properties, reason_codes })
    }
}

impl EncodablePacket for UnsubAckPacket {
    fn encode_body(
        &self,
        buf: &mut BytesMut,
        omit_problem_information: bool,
    ) -> Result<(), EncodeError> {
        if self.reason_codes.is_empty() {
            return Err(EncodeError::InvalidPacket(
                "UNSUBACK must contain at least one reason code".into(),
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

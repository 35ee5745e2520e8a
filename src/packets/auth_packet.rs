use std::fmt;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::{
    error::{DecodeError, EncodeError},
    limits::ConnectionLimits,
    protocol::{
        properties::{
            decode_properties, Property, PropertyEncoder, AUTHENTICATION_DATA_IDENTIFIER,
            AUTHENTICATION_METHOD_IDENTIFIER,
        },
        PacketType, UserProperties,
    },
};

use super::{
    decode_reason_code, encode_problem_information, ControlPacket, DecodablePacket,
    EncodablePacket, ReasonCode,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthReasonCode {
    /// Authentication is successful.
    /// Sent by: Server.
    #[default]
    Success = 0x00,

    /// Continue the authentication with another step.
    /// Sent by: Client or Server.
    ContinueAuthentication = 0x18,

    /// Initiate a re-authentication.
    /// Sent by: Client.
    ReAuthenticate = 0x19,
}

impl ReasonCode for AuthReasonCode {
    fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Self::Success),
            0x18 => Some(Self::ContinueAuthentication),
            0x19 => Some(Self::ReAuthenticate),
            _ => None,
        }
    }

    fn to_u8(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for AuthReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            Self::Success => "Success",
            Self::ContinueAuthentication => "Continue authentication",
            Self::ReAuthenticate => "Re-authenticate",
        };

        write!(f, "{value}")
    }
}

/// An AUTH packet is sent from Client to Server or Server to Client as part of an extended
/// authentication exchange.
///
/// Reference: <https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901217>
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthPacket {
    pub reason_code: AuthReasonCode,

    /// Name of the authentication method. Must be the one used in CONNECT.
    pub authentication_method: String,
    pub authentication_data: Option<Bytes>,
    pub reason_string: Option<String>,
    pub user_properties: UserProperties,
}

impl AuthPacket {
    pub fn new(reason_code: AuthReasonCode, authentication_method: impl Into<String>) -> Self {
        Self {
            reason_code,
            authentication_method: authentication_method.into(),
            authentication_data: None,
            reason_string: None,
            user_properties: UserProperties::new(),
        }
    }
}

impl ControlPacket for AuthPacket {
    const PACKET_TYPE: PacketType = PacketType::Auth;
}

impl DecodablePacket for AuthPacket {
    fn decode(
        buf: &mut Bytes,
        _flags: u8,
        limits: &mut ConnectionLimits,
    ) -> Result<Self, DecodeError> {
        // Reason Code and Property Length. Without properties the method would be missing anyway.
        if buf.remaining() < 2 {
            return Err(DecodeError::remaining_length_too_short(Self::PACKET_TYPE));
        }

        let reason_code = decode_reason_code(buf, Self::PACKET_TYPE)?;

        let mut authentication_method = None;
        let mut authentication_data = None;
        let mut reason_string = None;
        let mut user_properties = UserProperties::new();

        let limits = &*limits;
        decode_properties(buf, Self::PACKET_TYPE, |property| {
            match property {
                Property::AuthenticationMethod(value) => authentication_method = Some(value),
                Property::AuthenticationData(value) => authentication_data = Some(value),
                Property::ReasonString(value) => {
                    limits.check_problem_information(Self::PACKET_TYPE, "Reason String")?;
                    reason_string = Some(value);
                }
                Property::UserProperty(value) => {
                    limits.check_problem_information(Self::PACKET_TYPE, "User Property")?;
                    user_properties.push(value);
                }
                property => return Err(property.invalid_for(Self::PACKET_TYPE)),
            }

            Ok(())
        })?;

        let Some(authentication_method) = authentication_method else {
            return Err(DecodeError::protocol("AUTH must include Authentication Method"));
        };

        Ok(Self {
            reason_code,
            authentication_method,
            authentication_data,
            reason_string,
            user_properties,
        })
    }
}

impl EncodablePacket for AuthPacket {
    fn encode_body(
        &self,
        buf: &mut BytesMut,
        omit_problem_information: bool,
    ) -> Result<(), EncodeError> {
        buf.put_u8(self.reason_code.to_u8());

        let mut properties = PropertyEncoder::new();
        properties.put_utf8_string(
            AUTHENTICATION_METHOD_IDENTIFIER,
            Some(self.authentication_method.as_str()),
        )?;
        properties
            .put_binary_data(AUTHENTICATION_DATA_IDENTIFIER, self.authentication_data.as_deref())?;
        encode_problem_information(
            &mut properties,
            self.reason_string.as_deref(),
            &self.user_properties,
            omit_problem_information,
        )?;

        properties.finish(buf)
    }

    fn has_problem_information(&self) -> bool {
        self.reason_string.is_some() || !self.user_properties.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(bytes: &'static [u8]) -> Result<AuthPacket, DecodeError> {
        AuthPacket::decode_packet(0, Bytes::from_static(bytes), &mut ConnectionLimits::default())
    }

    #[test]
    fn continue_authentication() {
        let packet = decode(&[0x18, 10, 0x15, 0, 3, b'S', b'C', b'R', 0x16, 0, 1, 0xAB]).unwrap();

        assert_eq!(packet.reason_code, AuthReasonCode::ContinueAuthentication);
        assert_eq!(packet.authentication_method, "SCR");
        assert_eq!(packet.authentication_data, Some(Bytes::from_static(&[0xAB])));
    }

    #[test]
    fn missing_method_is_protocol_error() {
        assert!(matches!(decode(&[0x18, 0]), Err(DecodeError::ProtocolError(_))));
    }

    #[test]
    fn remaining_length_below_two_is_malformed() {
        assert!(matches!(decode(&[]), Err(DecodeError::MalformedPacket(_))));
        assert!(matches!(decode(&[0x00]), Err(DecodeError::MalformedPacket(_))));
    }

    #[test]
    fn unknown_reason_code_is_malformed() {
        assert!(matches!(decode(&[0x17, 0]), Err(DecodeError::MalformedPacket(_))));
    }
}

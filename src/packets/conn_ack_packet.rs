use std::fmt;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::{
    constants::DEFAULT_RECEIVE_MAXIMUM,
    error::{DecodeError, EncodeError},
    limits::ConnectionLimits,
    protocol::{
        decoding::decode_u8,
        properties::{
            decode_properties, Property, PropertyEncoder, ASSIGNED_CLIENT_IDENTIFIER,
            AUTHENTICATION_DATA_IDENTIFIER, AUTHENTICATION_METHOD_IDENTIFIER,
            MAXIMUM_PACKET_SIZE_IDENTIFIER, MAXIMUM_QOS_IDENTIFIER, RECEIVE_MAXIMUM_IDENTIFIER,
            RESPONSE_INFORMATION_IDENTIFIER, RETAIN_AVAILABLE_IDENTIFIER,
            SERVER_KEEP_ALIVE_IDENTIFIER, SERVER_REFERENCE_IDENTIFIER,
            SESSION_EXPIRY_INTERVAL_IDENTIFIER, SHARED_SUBSCRIPTION_AVAILABLE_IDENTIFIER,
            SUBSCRIPTION_IDENTIFIERS_AVAILABLE_IDENTIFIER, TOPIC_ALIAS_MAXIMUM_IDENTIFIER,
            WILDCARD_SUBSCRIPTION_AVAILABLE_IDENTIFIER,
        },
        PacketType, QoS, UserProperties,
    },
};

use super::{
    decode_reason_code, encode_problem_information, ControlPacket, DecodablePacket,
    EncodablePacket, ReasonCode,
};

/// Represents the possible reason codes returned when attempting
/// to connect to an MQTT server. Each variant corresponds to a specific
/// connection outcome or error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectReasonCode {
    /// The Connection is accepted.
    #[default]
    Success = 0x00,

    /// The Server does not wish to reveal the reason for the failure,
    /// or none of the other Reason Codes apply.
    UnspecifiedError = 0x80,

    /// Data within the CONNECT packet could not be correctly parsed.
    MalformedPacket = 0x81,

    /// Data in the CONNECT packet does not conform to the MQTT protocol.
    ProtocolError = 0x82,

    /// The CONNECT is valid but is not accepted by this Server.
    ImplementationSpecificError = 0x83,

    /// The Server does not support the version of the MQTT protocol requested by the Client.
    UnsupportedProtocolVersion = 0x84,

    /// The Client Identifier is a valid string but is not allowed by the Server.
    ClientIdentifierNotValid = 0x85,

    /// The Server does not accept the User Name or Password specified by the Client.
    BadUserNameOrPassword = 0x86,

    /// The Client is not authorized to connect.
    NotAuthorized = 0x87,

    /// The MQTT Server is not available.
    ServerUnavailable = 0x88,

    /// The Server is busy. Try again later.
    ServerBusy = 0x89,

    /// This Client has been banned by administrative action. Contact the server administrator.
    Banned = 0x8A,

    /// The authentication method is not supported or does not match the authentication method currently in use.
    BadAuthenticationMethod = 0x8C,

    /// The Will Topic Name is not malformed, but is not accepted by this Server.
    TopicNameInvalid = 0x90,

    /// The CONNECT packet exceeded the maximum permissible size.
    PacketTooLarge = 0x95,

    /// An implementation or administrative imposed limit has been exceeded.
    QuotaExceeded = 0x97,

    /// The Will Payload does not match the specified Payload Format Indicator.
    PayloadFormatInvalid = 0x99,

    /// The Server does not support retained messages, and Will Retain was set to 1.
    RetainNotSupported = 0x9A,

    /// The Server does not support the `QoS` set in Will `QoS`.
    QosNotSupported = 0x9B,

    /// The Client should temporarily use another server.
    UseAnotherServer = 0x9C,

    /// The Client should permanently use another server.
    ServerMoved = 0x9D,

    /// The connection rate limit has been exceeded.
    ConnectionRateExceeded = 0x9F,
}

impl ReasonCode for ConnectReasonCode {
    fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Self::Success),
            0x80 => Some(Self::UnspecifiedError),
            0x81 => Some(Self::MalformedPacket),
            0x82 => Some(Self::ProtocolError),
            0x83 => Some(Self::ImplementationSpecificError),
            0x84 => Some(Self::UnsupportedProtocolVersion),
            0x85 => Some(Self::ClientIdentifierNotValid),
            0x86 => Some(Self::BadUserNameOrPassword),
            0x87 => Some(Self::NotAuthorized),
            0x88 => Some(Self::ServerUnavailable),
            0x89 => Some(Self::ServerBusy),
            0x8A => Some(Self::Banned),
            0x8C => Some(Self::BadAuthenticationMethod),
            0x90 => Some(Self::TopicNameInvalid),
            0x95 => Some(Self::PacketTooLarge),
            0x97 => Some(Self::QuotaExceeded),
            0x99 => Some(Self::PayloadFormatInvalid),
            0x9A => Some(Self::RetainNotSupported),
            0x9B => Some(Self::QosNotSupported),
            0x9C => Some(Self::UseAnotherServer),
            0x9D => Some(Self::ServerMoved),
            0x9F => Some(Self::ConnectionRateExceeded),
            _ => None,
        }
    }

    fn to_u8(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for ConnectReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            Self::Success => "Success",
            Self::UnspecifiedError => "Unspecified error",
            Self::MalformedPacket => "Malformed packet",
            Self::ProtocolError => "Protocol error",
            Self::ImplementationSpecificError => "Implementation specific error",
            Self::UnsupportedProtocolVersion => "Unsupported protocol version",
            Self::ClientIdentifierNotValid => "Client identifier not valid",
            Self::BadUserNameOrPassword => "Bad user name or password",
            Self::NotAuthorized => "Not authorized",
            Self::ServerUnavailable => "Server unavailable",
            Self::ServerBusy => "Server busy",
            Self::Banned => "Banned",
            Self::BadAuthenticationMethod => "Bad authentication method",
            Self::TopicNameInvalid => "Topic name invalid",
            Self::PacketTooLarge => "Packet too large",
            Self::QuotaExceeded => "Quota exceeded",
            Self::PayloadFormatInvalid => "Payload format invalid",
            Self::RetainNotSupported => "Retain not supported",
            Self::QosNotSupported => "QoS not supported",
            Self::UseAnotherServer => "Use another server",
            Self::ServerMoved => "Server moved",
            Self::ConnectionRateExceeded => "Connection rate exceeded",
        };

        write!(f, "{value}")
    }
}

/// The CONNACK packet is the packet sent by the Server in response to a CONNECT packet received from a Client.
///
/// Reference: <https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901074>
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnAckPacket {
    /// The Session Present flag informs the Client whether the Server is using Session State from a previous connection for this `ClientID`.
    ///
    /// If a Server sends a CONNACK packet containing a non-zero Reason Code it MUST set Session Present to 0.
    pub session_present: bool,

    /// If a Server sends a CONNACK packet containing a Reason code of 128 or greater it MUST then close the Network Connection.
    pub reason_code: ConnectReasonCode,

    /// Session Expiry Interval in seconds.
    pub session_expiry_interval: Option<u32>,

    /// The Server uses this value to limit the number of QoS 1 and QoS 2 publications that it is willing to process concurrently for the Client.
    pub receive_maximum: Option<u16>,

    /// If a Server does not support QoS 1 or QoS 2 PUBLISH packets it MUST send a Maximum QoS in the CONNACK packet specifying the highest QoS it supports.
    ///
    /// Only `QoS` 0 and 1 can be announced.
    pub maximum_qos: Option<QoS>,

    /// Whether the Server supports retained messages. If not present, then retained messages are supported.
    pub retain_available: Option<bool>,

    /// The Maximum Packet Size the Server is willing to accept. If not present, there is no limit beyond the limitations of the protocol.
    pub maximum_packet_size: Option<u32>,

    /// The Client Identifier which was assigned by the Server because a zero length Client Identifier was found in the CONNECT packet.
    pub assigned_client_identifier: Option<String>,

    /// The highest value that the Server will accept as a Topic Alias sent by the Client.
    pub topic_alias_maximum: Option<u16>,

    /// Human readable string designed for diagnostics and SHOULD NOT be parsed by the Client.
    pub reason_string: Option<String>,

    /// User Properties that can be used to provide additional information to the Client including diagnostic information.
    pub user_properties: UserProperties,

    /// Declares whether the Server supports Wildcard Subscriptions. If not present, then Wildcard Subscriptions are supported.
    pub wildcard_subscription_available: Option<bool>,

    /// Declares whether the Server supports Subscription Identifiers. If not present, then Subscription Identifiers are supported.
    pub subscription_identifiers_available: Option<bool>,

    /// Declares whether the Server supports Shared Subscriptions. If not present, then Shared Subscriptions are supported.
    pub shared_subscription_available: Option<bool>,

    /// If present, the Client MUST use this value instead of the Keep Alive value it sent on CONNECT.
    pub server_keep_alive: Option<u16>,

    /// Basis for creating a Response Topic.
    pub response_information: Option<String>,

    /// It can be used by the Client to identify another Server to use.
    pub server_reference: Option<String>,

    /// It contains the name of the authentication method.
    pub authentication_method: Option<String>,

    /// The contents of this data are defined by the authentication method.
    pub authentication_data: Option<Bytes>,
}

impl ConnAckPacket {
    pub fn new(reason_code: ConnectReasonCode) -> Self {
        Self { reason_code, ..Self::default() }
    }

    /// Receive Maximum, with the protocol default applied when absent.
    pub fn effective_receive_maximum(&self) -> u16 {
        self.receive_maximum.unwrap_or(DEFAULT_RECEIVE_MAXIMUM)
    }

    fn decode_properties(&mut self, buf: &mut Bytes) -> Result<(), DecodeError> {
        decode_properties(buf, Self::PACKET_TYPE, |property| {
            match property {
                Property::SessionExpiryInterval(value) => self.session_expiry_interval = Some(value),
                Property::ReceiveMaximum(value) => self.receive_maximum = Some(value),
                Property::MaximumQos(value) => self.maximum_qos = Some(value),
                Property::RetainAvailable(value) => self.retain_available = Some(value),
                Property::MaximumPacketSize(value) => self.maximum_packet_size = Some(value),
                Property::AssignedClientIdentifier(value) => {
                    self.assigned_client_identifier = Some(value);
                }
                Property::TopicAliasMaximum(value) => self.topic_alias_maximum = Some(value),
                Property::ReasonString(value) => self.reason_string = Some(value),
                Property::UserProperty(value) => self.user_properties.push(value),
                Property::WildcardSubscriptionAvailable(value) => {
                    self.wildcard_subscription_available = Some(value);
                }
                Property::SubscriptionIdentifiersAvailable(value) => {
                    self.subscription_identifiers_available = Some(value);
                }
                Property::SharedSubscriptionAvailable(value) => {
                    self.shared_subscription_available = Some(value);
                }
                Property::ServerKeepAlive(value) => self.server_keep_alive = Some(value),
                Property::ResponseInformation(value) => self.response_information = Some(value),
                Property::ServerReference(value) => self.server_reference = Some(value),
                Property::AuthenticationMethod(value) => self.authentication_method = Some(value),
                Property::AuthenticationData(value) => self.authentication_data = Some(value),
                property => return Err(property.invalid_for(Self::PACKET_TYPE)),
            }

            Ok(())
        })?;

        if self.authentication_data.is_some() && self.authentication_method.is_none() {
            return Err(DecodeError::protocol(
                "CONNACK must not include Authentication Data without Authentication Method",
            ));
        }

        Ok(())
    }
}

impl ControlPacket for ConnAckPacket {
    const PACKET_TYPE: PacketType = PacketType::ConnAck;
}

impl DecodablePacket for ConnAckPacket {
    fn decode(
        buf: &mut Bytes,
        _flags: u8,
        _limits: &mut ConnectionLimits,
    ) -> Result<Self, DecodeError> {
        if buf.remaining() < 2 {
            return Err(DecodeError::remaining_length_too_short(Self::PACKET_TYPE));
        }

        // Byte 1 is the "Connect Acknowledge Flags". Bits 7-1 are reserved and MUST be set to 0
        // Bit 0 is the Session Present Flag.
        let acknowledge_flags = decode_u8(buf)?;
        if acknowledge_flags & 0b1111_1110 != 0 {
            return Err(DecodeError::malformed(format!(
                "CONNACK acknowledge flags must be 0 or 1, got {acknowledge_flags:#010b}"
            )));
        }
        let session_present = acknowledge_flags == 1;

        let reason_code: ConnectReasonCode = decode_reason_code(buf, Self::PACKET_TYPE)?;
        if session_present && reason_code != ConnectReasonCode::Success {
            return Err(DecodeError::malformed(format!(
                "CONNACK session present must be 0 with reason code {reason_code}"
            )));
        }

        let mut packet = Self { session_present, reason_code, ..Self::default() };

        // The Property Length may be omitted by older peers
        if buf.has_remaining() {
            packet.decode_properties(buf)?;
        }

        Ok(packet)
    }
}

impl EncodablePacket for ConnAckPacket {
    fn encode_body(
        &self,
        buf: &mut BytesMut,
        omit_problem_information: bool,
    ) -> Result<(), EncodeError> {
        if self.session_present && self.reason_code != ConnectReasonCode::Success {
            return Err(EncodeError::InvalidPacket(
                "Session present must be 0 with an error reason code".into(),
            ));
        }

        buf.put_u8(u8::from(self.session_present));
        buf.put_u8(self.reason_code.to_u8());

        let mut properties = PropertyEncoder::new();

        // Add Session Expiry Interval if present
        properties.put_u32(SESSION_EXPIRY_INTERVAL_IDENTIFIER, self.session_expiry_interval);

        // Add Receive Maximum if present
        properties.put_u16(RECEIVE_MAXIMUM_IDENTIFIER, self.receive_maximum);

        // Add Maximum QoS if present
        properties.put_u8(MAXIMUM_QOS_IDENTIFIER, self.maximum_qos.map(QoS::to_u8));

        // Add Retain Available if present
        properties.put_bool(RETAIN_AVAILABLE_IDENTIFIER, self.retain_available);

        // Add Maximum Packet Size if present
        properties.put_u32(MAXIMUM_PACKET_SIZE_IDENTIFIER, self.maximum_packet_size);

        // Add Assigned Client Identifier if present
        properties.put_utf8_string(
            ASSIGNED_CLIENT_IDENTIFIER,
            self.assigned_client_identifier.as_deref(),
        )?;

        // Add Topic Alias Maximum if present
        properties.put_u16(TOPIC_ALIAS_MAXIMUM_IDENTIFIER, self.topic_alias_maximum);

        // Add Reason String and User Properties
        encode_problem_information(
            &mut properties,
            self.reason_string.as_deref(),
            &self.user_properties,
            omit_problem_information,
        )?;

        // Add availability flags if present
        properties.put_bool(
            WILDCARD_SUBSCRIPTION_AVAILABLE_IDENTIFIER,
            self.wildcard_subscription_available,
        );
        properties.put_bool(
            SUBSCRIPTION_IDENTIFIERS_AVAILABLE_IDENTIFIER,
            self.subscription_identifiers_available,
        );
        properties
            .put_bool(SHARED_SUBSCRIPTION_AVAILABLE_IDENTIFIER, self.shared_subscription_available);

        // Add Server Keep Alive if present
        properties.put_u16(SERVER_KEEP_ALIVE_IDENTIFIER, self.server_keep_alive);

        // Add Response Information if present
        properties.put_utf8_string(
            RESPONSE_INFORMATION_IDENTIFIER,
            self.response_information.as_deref(),
        )?;

        // Add Server Reference if present
        properties.put_utf8_string(SERVER_REFERENCE_IDENTIFIER, self.server_reference.as_deref())?;

        // Add Authentication Method and Data if present
        properties.put_utf8_string(
            AUTHENTICATION_METHOD_IDENTIFIER,
            self.authentication_method.as_deref(),
        )?;
        properties
            .put_binary_data(AUTHENTICATION_DATA_IDENTIFIER, self.authentication_data.as_deref())?;

        properties.finish(buf)
    }

    fn has_problem_information(&self) -> bool {
        self.reason_string.is_some() || !self.user_properties.is_empty()
    }
}

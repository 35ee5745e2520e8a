use std::fmt;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::{
    error::{DecodeError, EncodeError},
    limits::ConnectionLimits,
    protocol::{
        properties::{
            decode_properties, Property, PropertyEncoder, SERVER_REFERENCE_IDENTIFIER,
            SESSION_EXPIRY_INTERVAL_IDENTIFIER,
        },
        PacketType, UserProperties,
    },
};

use super::{
    decode_reason_code, encode_problem_information, ControlPacket, DecodablePacket,
    EncodablePacket, ReasonCode,
};

/// Represents the Reason Codes sent when disconnecting from an MQTT connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisconnectReasonCode {
    /// Close the connection normally. Do not send the Will Message.
    /// Sent by: Client or Server.
    #[default]
    NormalDisconnection = 0x00,

    /// The Client wishes to disconnect but requires that the Server also publishes its Will Message.
    /// Sent by: Client.
    DisconnectWithWillMessage = 0x04,

    /// The Connection is closed but the sender either does not wish to reveal the reason, or none of the other Reason Codes apply.
    /// Sent by: Client or Server.
    UnspecifiedError = 0x80,

    /// The received packet does not conform to the MQTT protocol.
    /// Sent by: Client or Server.
    MalformedPacket = 0x81,

    /// An unexpected or out of order packet was received.
    /// Sent by: Client or Server.
    ProtocolError = 0x82,

    /// The packet received is valid but cannot be processed by this implementation.
    /// Sent by: Client or Server.
    ImplementationSpecificError = 0x83,

    /// The request is not authorized.
    /// Sent by: Server.
    NotAuthorized = 0x87,

    /// The Server is busy and cannot continue processing requests from this Client.
    /// Sent by: Server.
    ServerBusy = 0x89,

    /// The Server is shutting down.
    /// Sent by: Server.
    ServerShuttingDown = 0x8B,

    /// The Connection is closed because no packet has been received for 1.5 times the Keep alive time.
    /// Sent by: Server.
    KeepAliveTimeout = 0x8D,

    /// Another Connection using the same `ClientID` has connected causing this Connection to be closed.
    /// Sent by: Server.
    SessionTakenOver = 0x8E,

    /// The Topic Filter is correctly formed, but is not accepted by this Server.
    /// Sent by: Server.
    TopicFilterInvalid = 0x8F,

    /// The Topic Name is correctly formed, but is not accepted by this Client or Server.
    /// Sent by: Client or Server.
    TopicNameInvalid = 0x90,

    /// The Client or Server has received more than Receive Maximum publications for which it has not sent PUBACK or PUBCOMP.
    /// Sent by: Client or Server.
    ReceiveMaximumExceeded = 0x93,

    /// The Client or Server has received a PUBLISH packet containing a Topic Alias which is greater than the Maximum Topic Alias it sent in the CONNECT or CONNACK packet.
    /// Sent by: Client or Server.
    TopicAliasInvalid = 0x94,

    /// The packet size is greater than Maximum Packet Size for this Client or Server.
    /// Sent by: Client or Server.
    PacketTooLarge = 0x95,

    /// The received data rate is too high.
    /// Sent by: Client or Server.
    MessageRateTooHigh = 0x96,

    /// An implementation or administrative imposed limit has been exceeded.
    /// Sent by: Client or Server.
    QuotaExceeded = 0x97,

    /// The Connection is closed due to an administrative action.
    /// Sent by: Client or Server.
    AdministrativeAction = 0x98,

    /// The payload format does not match the one specified by the Payload Format Indicator.
    /// Sent by: Client or Server.
    PayloadFormatInvalid = 0x99,

    /// The Server does not support retained messages.
    /// Sent by: Server.
    RetainNotSupported = 0x9A,

    /// The Client specified a `QoS` greater than the `QoS` specified in a Maximum `QoS` in the CONNACK.
    /// Sent by: Server.
    QosNotSupported = 0x9B,

    /// The Client should temporarily change its Server.
    /// Sent by: Server.
    UseAnotherServer = 0x9C,

    /// The Server has moved and the Client should permanently change its server location.
    /// Sent by: Server.
    ServerMoved = 0x9D,

    /// The Server does not support Shared Subscriptions.
    /// Sent by: Server.
    SharedSubscriptionsNotSupported = 0x9E,

    /// This connection is closed because the connection rate is too high.
    /// Sent by: Server.
    ConnectionRateExceeded = 0x9F,

    /// The maximum connection time authorized for this connection has been exceeded.
    /// Sent by: Server.
    MaximumConnectTime = 0xA0,

    /// The Server does not support Subscription Identifiers; the subscription is not accepted.
    /// Sent by: Server.
    SubscriptionIdentifiersNotSupported = 0xA1,

    /// The Server does not support Wildcard Subscriptions; the subscription is not accepted.
    /// Sent by: Server.
    WildcardSubscriptionsNotSupported = 0xA2,
}

impl ReasonCode for DisconnectReasonCode {
    fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Self::NormalDisconnection),
            0x04 => Some(Self::DisconnectWithWillMessage),
            0x80 => Some(Self::UnspecifiedError),
            0x81 => Some(Self::MalformedPacket),
            0x82 => Some(Self::ProtocolError),
            0x83 => Some(Self::ImplementationSpecificError),
            0x87 => Some(Self::NotAuthorized),
            0x89 => Some(Self::ServerBusy),
            0x8B => Some(Self::ServerShuttingDown),
            0x8D => Some(Self::KeepAliveTimeout),
            0x8E => Some(Self::SessionTakenOver),
            0x8F => Some(Self::TopicFilterInvalid),
            0x90 => Some(Self::TopicNameInvalid),
            0x93 => Some(Self::ReceiveMaximumExceeded),
            0x94 => Some(Self::TopicAliasInvalid),
            0x95 => Some(Self::PacketTooLarge),
            0x96 => Some(Self::MessageRateTooHigh),
            0x97 => Some(Self::QuotaExceeded),
            0x98 => Some(Self::AdministrativeAction),
            0x99 => Some(Self::PayloadFormatInvalid),
            0x9A => Some(Self::RetainNotSupported),
            0x9B => Some(Self::QosNotSupported),
            0x9C => Some(Self::UseAnotherServer),
            0x9D => Some(Self::ServerMoved),
            0x9E => Some(Self::SharedSubscriptionsNotSupported),
            0x9F => Some(Self::ConnectionRateExceeded),
            0xA0 => Some(Self::MaximumConnectTime),
            0xA1 => Some(Self::SubscriptionIdentifiersNotSupported),
            0xA2 => Some(Self::WildcardSubscriptionsNotSupported),
            _ => None,
        }
    }

    fn to_u8(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for DisconnectReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            Self::NormalDisconnection => "Normal disconnection",
            Self::DisconnectWithWillMessage => "Disconnect with will message",
            Self::UnspecifiedError => "Unspecified error",
            Self::MalformedPacket => "Malformed packet",
            Self::ProtocolError => "Protocol error",
            Self::ImplementationSpecificError => "Implementation specific error",
            Self::NotAuthorized => "Not authorized",
            Self::ServerBusy => "Server busy",
            Self::ServerShuttingDown => "Server shutting down",
            Self::KeepAliveTimeout => "Keep alive timeout",
            Self::SessionTakenOver => "Session taken over",
            Self::TopicFilterInvalid => "Topic filter invalid",
            Self::TopicNameInvalid => "Topic name invalid",
            Self::ReceiveMaximumExceeded => "Receive maximum exceeded",
            Self::TopicAliasInvalid => "Topic alias invalid",
            Self::PacketTooLarge => "Packet too large",
            Self::MessageRateTooHigh => "Message rate too high",
            Self::QuotaExceeded => "Quota exceeded",
            Self::AdministrativeAction => "Administrative action",
            Self::PayloadFormatInvalid => "Payload format invalid",
            Self::RetainNotSupported => "Retain not supported",
            Self::QosNotSupported => "QoS not supported",
            Self::UseAnotherServer => "Use another server",
            Self::ServerMoved => "Server moved",
            Self::SharedSubscriptionsNotSupported => "Shared subscriptions not supported",
            Self::ConnectionRateExceeded => "Connection rate exceeded",
            Self::MaximumConnectTime => "Maximum connect time",
            Self::SubscriptionIdentifiersNotSupported => "Subscription identifiers not supported",
            Self::WildcardSubscriptionsNotSupported => "Wildcard subscriptions not supported",
        };
        write!(f, "{value}")
    }
}

/// The DISCONNECT packet is the final MQTT Control Packet sent from the Client or the Server.
///
/// Reference: <https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901205>
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisconnectPacket {
    /// The Reason Code indicating why the DISCONNECT is occurring.
    pub reason_code: DisconnectReasonCode,

    /// Represents the Session Expiry Interval in seconds.
    /// The Session Expiry Interval MUST NOT be sent on a DISCONNECT by the Server.
    pub session_expiry_interval: Option<u32>,

    /// A human-readable reason string for diagnostic purposes. Should NOT be parsed programmatically.
    pub reason_string: Option<String>,

    pub user_properties: UserProperties,

    /// Encoded String which can be used by the Client to identify another Server to use.
    pub server_reference: Option<String>,
}

impl DisconnectPacket {
    pub fn new(reason_code: DisconnectReasonCode) -> Self {
        Self { reason_code, ..Self::default() }
    }

    pub fn with_reason_string(mut self, reason_string: impl Into<String>) -> Self {
        self.reason_string = Some(reason_string.into());
        self
    }
}

impl ControlPacket for DisconnectPacket {
    const PACKET_TYPE: PacketType = PacketType::Disconnect;
}

impl DecodablePacket for DisconnectPacket {
    fn decode(
        buf: &mut Bytes,
        _flags: u8,
        _limits: &mut ConnectionLimits,
    ) -> Result<Self, DecodeError> {
        // If the remaining length is 0, normal disconnection can be assumed
        if !buf.has_remaining() {
            return Ok(Self::default());
        }

        let mut packet = Self::new(decode_reason_code(buf, Self::PACKET_TYPE)?);

        if !buf.has_remaining() {
            return Ok(packet);
        }

        decode_properties(buf, Self::PACKET_TYPE, |property| {
            match property {
                Property::SessionExpiryInterval(value) => {
                    packet.session_expiry_interval = Some(value);
                }
                Property::ReasonString(value) => packet.reason_string = Some(value),
                Property::UserProperty(value) => packet.user_properties.push(value),
                Property::ServerReference(value) => packet.server_reference = Some(value),
                property => return Err(property.invalid_for(Self::PACKET_TYPE)),
            }

            Ok(())
        })?;

        Ok(packet)
    }
}

impl EncodablePacket for DisconnectPacket {
    fn encode_body(
        &self,
        buf: &mut BytesMut,
        omit_problem_information: bool,
    ) -> Result<(), EncodeError> {
        let mut properties = PropertyEncoder::new();

        properties.put_u32(SESSION_EXPIRY_INTERVAL_IDENTIFIER, self.session_expiry_interval);
        properties.put_utf8_string(SERVER_REFERENCE_IDENTIFIER, self.server_reference.as_deref())?;
        encode_problem_information(
            &mut properties,
            self.reason_string.as_deref(),
            &self.user_properties,
            omit_problem_information,
        )?;

        // If reason code is NormalDisconnection (0x00) and no properties, we can omit Reason Code and Property Length.
        if self.reason_code == DisconnectReasonCode::NormalDisconnection && properties.is_empty() {
            return Ok(());
        }

        buf.put_u8(self.reason_code.to_u8());

        if properties.is_empty() {
            return Ok(());
        }

        properties.finish(buf)
    }

    fn has_problem_information(&self) -> bool {
        self.reason_string.is_some() || !self.user_properties.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(bytes: &'static [u8]) -> Result<DisconnectPacket, DecodeError> {
        DisconnectPacket::decode_packet(
            0,
            Bytes::from_static(bytes),
            &mut ConnectionLimits::default(),
        )
    }

    #[test]
    fn empty_body_is_normal_disconnection() {
        assert_eq!(decode(&[]), Ok(DisconnectPacket::new(DisconnectReasonCode::NormalDisconnection)));
    }

    #[test]
    fn reason_code_only() {
        assert_eq!(
            decode(&[0x8E]),
            Ok(DisconnectPacket::new(DisconnectReasonCode::SessionTakenOver))
        );
    }

    #[test]
    fn decodes_properties() {
        let packet = decode(&[
            0x9C, 12, 0x1C, 0, 4, b'h', b'o', b's', b't', 0x1F, 0, 2, b'g', b'o',
        ])
        .unwrap();

        assert_eq!(packet.reason_code, DisconnectReasonCode::UseAnotherServer);
        assert_eq!(packet.server_reference.as_deref(), Some("host"));
        assert_eq!(packet.reason_string.as_deref(), Some("go"));
    }

    #[test]
    fn reason_string_is_accepted_without_problem_information() {
        let mut limits = ConnectionLimits::new().with_request_problem_information(false);
        let packet = DisconnectPacket::decode_packet(
            0,
            Bytes::from_static(&[0x81, 5, 0x1F, 0, 2, b'n', b'o']),
            &mut limits,
        )
        .unwrap();
        assert_eq!(packet.reason_string.as_deref(), Some("no"));
    }

    #[test]
    fn unknown_reason_code_is_malformed() {
        assert!(matches!(decode(&[0x01]), Err(DecodeError::MalformedPacket(_))));
    }

    #[test]
    fn encodes_shortest_form() {
        let limits = ConnectionLimits::default();

        let mut buf = BytesMut::new();
        DisconnectPacket::default().encode(&mut buf, &limits).unwrap();
        assert_eq!(&buf[..], &[0xE0, 0]);

        let mut buf = BytesMut::new();
        DisconnectPacket::new(DisconnectReasonCode::ProtocolError)
            .encode(&mut buf, &limits)
            .unwrap();
        assert_eq!(&buf[..], &[0xE0, 1, 0x82]);

        let mut buf = BytesMut::new();
        DisconnectPacket::new(DisconnectReasonCode::ProtocolError)
            .with_reason_string("x")
            .encode(&mut buf, &limits)
            .unwrap();
        assert_eq!(&buf[..], &[0xE0, 6, 0x82, 4, 0x1F, 0, 1, b'x']);
    }
}

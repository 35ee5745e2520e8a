//! Failure types of the codec.
//!
//! A decode failure is always fatal to the packet being decoded. The receive loop maps it to
//! the DISCONNECT it must send before closing the connection.

use thiserror::Error;

use crate::{
    limits::ConnectionLimits,
    packets::{
        conn_ack_packet::ConnectReasonCode,
        disconnect_packet::{DisconnectPacket, DisconnectReasonCode},
    },
    protocol::PacketType,
};

/// A classified decode failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The bytes cannot be parsed as a structurally valid packet of the declared type.
    #[error("Malformed Packet: {0}")]
    MalformedPacket(String),

    /// The packet parses but violates a semantic rule of the protocol.
    #[error("Protocol Error: {0}")]
    ProtocolError(String),

    /// A PUBLISH carried a Topic Alias of 0 or above the negotiated maximum.
    #[error("Topic Alias Invalid: {0}")]
    TopicAliasInvalid(String),

    /// The packet exceeds the Maximum Packet Size this side negotiated.
    #[error("Packet Too Large: {0}")]
    PacketTooLarge(String),

    /// A CONNECT carried a protocol name or level other than MQTT 5.
    #[error("Unsupported Protocol Version: {0}")]
    UnsupportedProtocolVersion(String),
}

impl DecodeError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedPacket(reason.into())
    }

    pub(crate) fn protocol(reason: impl Into<String>) -> Self {
        Self::ProtocolError(reason.into())
    }

    pub(crate) fn wrong_fixed_header_flags(packet_type: PacketType, flags: u8) -> Self {
        let expected = packet_type.fixed_flags();
        Self::malformed(format!(
            "{packet_type} fixed header flags must be {expected:#06b}, got {flags:#06b}"
        ))
    }

    pub(crate) fn remaining_length_too_short(packet_type: PacketType) -> Self {
        Self::malformed(format!("{packet_type} remaining length too short"))
    }

    pub(crate) fn remaining_length_too_long(packet_type: PacketType) -> Self {
        Self::malformed(format!("{packet_type} remaining length too long"))
    }

    pub(crate) fn wrong_reason_code(packet_type: PacketType, value: u8) -> Self {
        Self::malformed(format!("Invalid {packet_type} reason code: {value:#04x}"))
    }

    pub(crate) fn invalid_property(packet_type: PacketType, name: &str) -> Self {
        Self::protocol(format!("Invalid property for {packet_type}: {name}"))
    }

    /// Diagnostic text, without the classification prefix.
    pub fn reason(&self) -> &str {
        match self {
            Self::MalformedPacket(reason)
            | Self::ProtocolError(reason)
            | Self::TopicAliasInvalid(reason)
            | Self::PacketTooLarge(reason)
            | Self::UnsupportedProtocolVersion(reason) => reason,
        }
    }

    /// The DISCONNECT reason code reporting this failure to the peer.
    pub fn reason_code(&self) -> DisconnectReasonCode {
        match self {
            Self::MalformedPacket(_) => DisconnectReasonCode::MalformedPacket,
            Self::ProtocolError(_) | Self::UnsupportedProtocolVersion(_) => {
                DisconnectReasonCode::ProtocolError
            }
            Self::TopicAliasInvalid(_) => DisconnectReasonCode::TopicAliasInvalid,
            Self::PacketTooLarge(_) => DisconnectReasonCode::PacketTooLarge,
        }
    }

    /// The CONNACK reason code a Server answers with when the failing packet is the CONNECT.
    pub fn connect_reason_code(&self) -> ConnectReasonCode {
        match self {
            Self::MalformedPacket(_) => ConnectReasonCode::MalformedPacket,
            Self::ProtocolError(_) | Self::TopicAliasInvalid(_) => ConnectReasonCode::ProtocolError,
            Self::PacketTooLarge(_) => ConnectReasonCode::PacketTooLarge,
            Self::UnsupportedProtocolVersion(_) => ConnectReasonCode::UnsupportedProtocolVersion,
        }
    }

    /// Builds the DISCONNECT to send before closing the connection.
    ///
    /// The diagnostic is attached as Reason String unless the peer asked not to receive
    /// problem information.
    pub fn to_disconnect(&self, limits: &ConnectionLimits) -> DisconnectPacket {
        let packet = DisconnectPacket::new(self.reason_code());

        if limits.peer_problem_information_requested() {
            packet.with_reason_string(self.reason())
        } else {
            packet
        }
    }
}

/// Failure to serialize a packet. Nothing is written to the output buffer when encoding fails.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("Packet size {size} exceeds the maximum packet size {maximum}")]
    PacketTooLarge { size: usize, maximum: u32 },

    #[error("String length {0} exceeds the maximum allowed length")]
    StringTooLong(usize),

    #[error("String must not contain the null character")]
    NullCharacter,

    #[error("Binary data length {0} exceeds the maximum allowed length")]
    BinaryDataTooLong(usize),

    #[error("Value {0} cannot be encoded as a variable byte integer")]
    VariableByteIntOverflow(usize),

    #[error("Invalid packet: {0}")]
    InvalidPacket(String),
}

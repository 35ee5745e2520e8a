use std::fmt;

use crate::constants::{
    AUTH_IDENTIFIER, CONNACK_IDENTIFIER, CONNECT_IDENTIFIER, DISCONNECT_IDENTIFIER,
    PINGREQ_IDENTIFIER, PINGRESP_IDENTIFIER, PUBACK_IDENTIFIER, PUBCOMP_IDENTIFIER,
    PUBLISH_IDENTIFIER, PUBREC_IDENTIFIER, PUBREL_IDENTIFIER, SUBACK_IDENTIFIER,
    SUBSCRIBE_IDENTIFIER, UNSUBACK_IDENTIFIER, UNSUBSCRIBE_IDENTIFIER,
};

/// Represents the MQTT Control Packet Types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketType {
    /// Connection request.
    /// Sent by: Client to Server.
    Connect = 0x01,

    /// Connect acknowledgment.
    /// Sent by: Server to Client.
    ConnAck = 0x02,

    /// Publish message.
    /// Sent by: Client to Server or Server to Client.
    Publish = 0x03,

    /// Publish acknowledgment (`QoS` 1).
    /// Sent by: Client to Server or Server to Client.
    PubAck = 0x04,

    /// Publish received (`QoS` 2 delivery part 1).
    /// Sent by: Client to Server or Server to Client.
    PubRec = 0x05,

    /// Publish release (`QoS` 2 delivery part 2).
    /// Sent by: Client to Server or Server to Client.
    PubRel = 0x06,

    /// Publish complete (`QoS` 2 delivery part 3).
    /// Sent by: Client to Server or Server to Client.
    PubComp = 0x07,

    /// Subscribe request.
    /// Sent by: Client to Server.
    Subscribe = 0x08,

    /// Subscribe acknowledgment.
    /// Sent by: Server to Client.
    SubAck = 0x09,

    /// Unsubscribe request.
    /// Sent by: Client to Server.
    Unsubscribe = 0x0A,

    /// Unsubscribe acknowledgment.
    /// Sent by: Server to Client.
    UnsubAck = 0x0B,

    /// PING request.
    /// Sent by: Client to Server.
    PingReq = 0x0C,

    /// PING response.
    /// Sent by: Server to Client.
    PingResp = 0x0D,

    /// Disconnect notification.
    /// Sent by: Client to Server or Server to Client.
    Disconnect = 0x0E,

    /// Authentication exchange.
    /// Sent by: Client to Server or Server to Client.
    Auth = 0x0F,
}

impl PacketType {
    /// Converts a numeric value to a `PacketType`.
    ///
    /// Returns `None` if the value does not match a known type (including the reserved type 0).
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            CONNECT_IDENTIFIER => Some(Self::Connect),
            CONNACK_IDENTIFIER => Some(Self::ConnAck),
            PUBLISH_IDENTIFIER => Some(Self::Publish),
            PUBACK_IDENTIFIER => Some(Self::PubAck),
            PUBREC_IDENTIFIER => Some(Self::PubRec),
            PUBREL_IDENTIFIER => Some(Self::PubRel),
            PUBCOMP_IDENTIFIER => Some(Self::PubComp),
            SUBSCRIBE_IDENTIFIER => Some(Self::Subscribe),
            SUBACK_IDENTIFIER => Some(Self::SubAck),
            UNSUBSCRIBE_IDENTIFIER => Some(Self::Unsubscribe),
            UNSUBACK_IDENTIFIER => Some(Self::UnsubAck),
            PINGREQ_IDENTIFIER => Some(Self::PingReq),
            PINGRESP_IDENTIFIER => Some(Self::PingResp),
            DISCONNECT_IDENTIFIER => Some(Self::Disconnect),
            AUTH_IDENTIFIER => Some(Self::Auth),
            _ => None,
        }
    }

    /// Converts the `PacketType` to its numeric value.
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// The flags every packet of this type must carry in the 4 LSB of the fixed header.
    ///
    /// For `Publish` the flags are dynamic (DUP, `QoS`, RETAIN) and this returns the
    /// all-zero pattern of a `QoS` 0 message.
    pub fn fixed_flags(self) -> u8 {
        match self {
            Self::PubRel | Self::Subscribe | Self::Unsubscribe => 0b0000_0010,
            _ => 0b0000_0000,
        }
    }
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            Self::Connect => "CONNECT",
            Self::ConnAck => "CONNACK",
            Self::Publish => "PUBLISH",
            Self::PubAck => "PUBACK",
            Self::PubRec => "PUBREC",
            Self::PubRel => "PUBREL",
            Self::PubComp => "PUBCOMP",
            Self::Subscribe => "SUBSCRIBE",
            Self::SubAck => "SUBACK",
            Self::Unsubscribe => "UNSUBSCRIBE",
            Self::UnsubAck => "UNSUBACK",
            Self::PingReq => "PINGREQ",
            Self::PingResp => "PINGRESP",
            Self::Disconnect => "DISCONNECT",
            Self::Auth => "AUTH",
        };

        write!(f, "{value}")
    }
}

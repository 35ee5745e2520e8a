/// Protocol name.
pub const PROTOCOL_NAME: &str = "MQTT";

/// Protocol version.
pub const PROTOCOL_VERSION: u8 = 5;

/// Maximum value a Remaining Length (or any Variable Byte Integer) can carry.
pub const MAX_REMAINING_LENGTH: usize = 268_435_455;

/// Maximum allowed size for a packet: the largest remaining length plus a
/// five byte fixed header.
pub const MAX_PACKET_SIZE: u32 = 268_435_460;

/// Maximum allowed length for a UTF-8 encoded string or binary data.
pub const MAX_STRING_LENGTH: usize = 65_535;

/// Receive Maximum assumed when the property is absent.
pub const DEFAULT_RECEIVE_MAXIMUM: u16 = 65_535;

/// Connection request.
/// Sent by: Client to Server.
pub const CONNECT_IDENTIFIER: u8 = 0x01;

/// Connect acknowledgment.
/// Sent by: Server to Client.
pub const CONNACK_IDENTIFIER: u8 = 0x02;

/// Publish message.
/// Sent by: Client to Server or Server to Client.
pub const PUBLISH_IDENTIFIER: u8 = 0x03;

/// Publish acknowledgment (`QoS` 1).
/// Sent by: Client to Server or Server to Client.
pub const PUBACK_IDENTIFIER: u8 = 0x04;

/// Publish received (`QoS` 2 delivery part 1).
/// Sent by: Client to Server or Server to Client.
pub const PUBREC_IDENTIFIER: u8 = 0x05;

/// Publish release (`QoS` 2 delivery part 2).
/// Sent by: Client to Server or Server to Client.
pub const PUBREL_IDENTIFIER: u8 = 0x06;

/// Publish complete (`QoS` 2 delivery part 3).
/// Sent by: Client to Server or Server to Client.
pub const PUBCOMP_IDENTIFIER: u8 = 0x07;

/// Subscribe request.
/// Sent by: Client to Server.
pub const SUBSCRIBE_IDENTIFIER: u8 = 0x08;

/// Subscribe acknowledgment.
/// Sent by: Server to Client.
pub const SUBACK_IDENTIFIER: u8 = 0x09;

/// Unsubscribe request.
/// Sent by: Client to Server.
pub const UNSUBSCRIBE_IDENTIFIER: u8 = 0x0A;

/// Unsubscribe acknowledgment.
/// Sent by: Server to Client.
pub const UNSUBACK_IDENTIFIER: u8 = 0x0B;

/// PING request.
/// Sent by: Client to Server.
pub const PINGREQ_IDENTIFIER: u8 = 0x0C;

/// PING response.
/// Sent by: Server to Client.
pub const PINGRESP_IDENTIFIER: u8 = 0x0D;

/// Disconnect notification.
/// Sent by: Client to Server or Server to Client.
pub const DISCONNECT_IDENTIFIER: u8 = 0x0E;

/// Authentication exchange.
/// Sent by: Client to Server or Server to Client.
pub const AUTH_IDENTIFIER: u8 = 0x0F;

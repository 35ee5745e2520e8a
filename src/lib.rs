//! MQTT 5.0 packet codec.
//!
//! Decodes the body of a control packet into a typed [`Packet`] and encodes packets back into
//! wire format. Every decode failure is classified as a [`DecodeError`] that maps onto the
//! DISCONNECT the receiver must send. Values negotiated in CONNECT and CONNACK, and the
//! topic aliases of a connection, are tracked in [`ConnectionLimits`].
//!
//! ```
//! use bytes::Bytes;
//! use mqtt5_codec::{ConnectionLimits, DecoderRegistry, Packet};
//!
//! let registry = DecoderRegistry::client();
//! let mut limits = ConnectionLimits::default();
//!
//! // PUBACK for packet identifier 7, Success implied by the short form
//! let packet = registry.decode(0x40, Bytes::from_static(&[0, 7]), &mut limits).unwrap();
//! assert!(matches!(packet, Packet::PubAck(ack) if ack.packet_identifier == 7));
//! ```

pub mod connection;
pub mod constants;
pub mod error;
pub mod limits;
pub mod packets;
pub mod protocol;
pub mod registry;

pub use connection::{Connection, ConnectionError};
pub use error::{DecodeError, EncodeError};
pub use limits::ConnectionLimits;
pub use packets::{
    auth_packet::{AuthPacket, AuthReasonCode},
    conn_ack_packet::{ConnAckPacket, ConnectReasonCode},
    connect_packet::{ConnectPacket, Will},
    disconnect_packet::{DisconnectPacket, DisconnectReasonCode},
    ping_req_packet::PingReqPacket,
    ping_resp_packet::PingRespPacket,
    pub_ack_packet::{PubAckPacket, PubAckReasonCode},
    pub_comp_packet::{PubCompPacket, PubCompReasonCode},
    pub_rec_packet::{PubRecPacket, PubRecReasonCode},
    pub_rel_packet::{PubRelPacket, PubRelReasonCode},
    publish_packet::PublishPacket,
    sub_ack_packet::{SubAckPacket, SubAckReasonCode},
    subscribe_packet::{RetainHandling, SubscribePacket, Subscription},
    unsub_ack_packet::{UnsubAckPacket, UnsubAckReasonCode},
    unsubscribe_packet::UnsubscribePacket,
    ControlPacket, DecodablePacket, EncodablePacket, Packet, ReasonCode,
};
pub use protocol::{decode_fixed_header, FixedHeader, PacketType, QoS, UserProperties, UserProperty};
pub use registry::{DecodeFn, DecoderRegistry};

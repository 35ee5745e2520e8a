pub(crate) mod decoding;
pub(crate) mod encoding;
pub(crate) mod mqtt_data;
pub(crate) mod packet_type;
pub(crate) mod properties;
pub(crate) mod validation;

pub use decoding::{decode_fixed_header, FixedHeader};
pub use mqtt_data::{QoS, UserProperties, UserProperty};
pub use packet_type::PacketType;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::{
    error::{DecodeError, EncodeError},
    limits::ConnectionLimits,
    protocol::{
        decoding::{decode_u16, decode_utf8_string},
        encoding::encode_utf8_string,
        properties::{decode_properties, Property, PropertyEncoder},
        validation::validate_topic_filter,
        PacketType, UserProperties,
    },
};

use super::{ControlPacket, DecodablePacket, EncodablePacket};

/// An UNSUBSCRIBE packet is sent by the Client to the Server, to unsubscribe from topics.
///
/// Reference: <https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901179>
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsubscribePacket {
    pub packet_identifier: u16,
    pub user_properties: UserProperties,
    pub topic_filters: Vec<String>,
}

impl UnsubscribePacket {
    pub fn new(packet_identifier: u16, topic_filters: Vec<String>) -> Self {
        Self { packet_identifier, user_properties: UserProperties::new(), topic_filters }
    }
}

impl ControlPacket for UnsubscribePacket {
    const PACKET_TYPE: PacketType = PacketType::Unsubscribe;
}

impl DecodablePacket for UnsubscribePacket {
    fn decode(
        buf: &mut Bytes,
        _flags: u8,
        _limits: &mut ConnectionLimits,
    ) -> Result<Self, DecodeError> {
        if buf.remaining() < 3 {
            return Err(DecodeError::remaining_length_too_short(Self::PACKET_TYPE));
        }

        let packet_identifier = decode_u16(buf)?;
        if packet_identifier == 0 {
            return Err(DecodeError::protocol("UNSUBSCRIBE packet identifier must not be 0"));
        }

        let mut user_properties = UserProperties::new();
        decode_properties(buf, Self::PACKET_TYPE, |property| match property {
            Property::UserProperty(value) => {
                user_properties.push(value);
                Ok(())
            }
            property => Err(property.invalid_for(Self::PACKET_TYPE)),
        })?;

        if !buf.has_remaining() {
            return Err(DecodeError::protocol(
                "UNSUBSCRIBE must contain at least one topic filter",
            ));
        }

        let mut topic_filters = Vec::new();
        while buf.has_remaining() {
            let topic_filter = decode_utf8_string(buf)?;
            validate_topic_filter(&topic_filter).map_err(DecodeError::malformed)?;
            topic_filters.push(topic_filter);
        }

        Ok(Self { packet_identifier, user_properties, topic_filters })
    }
}

impl EncodablePacket for UnsubscribePacket {
    fn encode_body(&self, buf: &mut BytesMut, _omit: bool) -> Result<(), EncodeError> {
        if self.topic_filters.is_empty() {
            return Err(EncodeError::InvalidPacket(
                "UNSUBSCRIBE must contain at least one topic filter".into(),
            ));
        }

        buf.put_u16(self.packet_identifier);

        let mut properties = PropertyEncoder::new();
        properties.put_user_properties(&self.user_properties)?;
        properties.finish(buf)?;

        for topic_filter in &self.topic_filters {
            encode_utf8_string(buf, topic_filter)?;
        }

        Ok(())
    }
}

use std::mem;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::{
    error::{DecodeError, EncodeError},
    limits::ConnectionLimits,
    protocol::{
        decoding::{decode_u16, decode_utf8_string},
        encoding::encode_utf8_string,
        properties::{
            decode_properties, Property, PropertyEncoder, CONTENT_TYPE_IDENTIFIER,
            CORRELATION_DATA_IDENTIFIER, MESSAGE_EXPIRY_INTERVAL_IDENTIFIER,
            PAYLOAD_FORMAT_INDICATOR_IDENTIFIER, RESPONSE_TOPIC_IDENTIFIER,
            SUBSCRIPTION_IDENTIFIER, TOPIC_ALIAS_IDENTIFIER,
        },
        validation::validate_topic_name,
        PacketType, QoS, UserProperties,
    },
};

use super::{ControlPacket, DecodablePacket, EncodablePacket};

/// A PUBLISH packet is sent from a Client to a Server or from a Server to a Client to transport
/// an Application Message.
///
/// Reference: <https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901100>
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishPacket {
    /// Set when this might be a re-delivery of an earlier attempt to send the packet.
    pub dup: bool,
    pub qos: QoS,
    pub retain: bool,

    /// After decoding, a Topic Name sent empty together with a Topic Alias is replaced by the
    /// topic the alias maps to.
    pub topic_name: String,

    /// Present if and only if `qos` is 1 or 2.
    pub packet_identifier: Option<u16>,

    /// `true` means the payload is UTF-8 encoded character data.
    pub payload_format_indicator: Option<bool>,
    pub message_expiry_interval: Option<u32>,
    pub topic_alias: Option<u16>,
    pub response_topic: Option<String>,
    pub correlation_data: Option<Bytes>,
    pub user_properties: UserProperties,

    /// One per matching subscription that carried an identifier, in wire order.
    pub subscription_identifiers: Vec<u32>,
    pub content_type: Option<String>,
    pub payload: Bytes,
}

impl PublishPacket {
    pub fn new(topic_name: impl Into<String>, qos: QoS, payload: impl Into<Bytes>) -> Self {
        Self { topic_name: topic_name.into(), qos, payload: payload.into(), ..Self::default() }
    }

    /// Apply the Topic Alias rules to a received topic.
    fn resolve_topic_alias(&mut self, limits: &mut ConnectionLimits) -> Result<(), DecodeError> {
        let Some(alias) = self.topic_alias else {
            if self.topic_name.is_empty() {
                return Err(DecodeError::protocol(
                    "PUBLISH must include a Topic Name or a Topic Alias",
                ));
            }
            return Ok(());
        };

        let maximum = limits.topic_alias_maximum_inbound();
        if alias > maximum {
            return Err(DecodeError::TopicAliasInvalid(format!(
                "Topic Alias {alias} exceeds the maximum {maximum}"
            )));
        }

        if self.topic_name.is_empty() {
            let Some(topic_name) = limits.topic_alias(alias) else {
                return Err(DecodeError::protocol(format!(
                    "Topic Alias {alias} is not mapped to a Topic Name"
                )));
            };
            self.topic_name = topic_name.to_owned();
        } else {
            limits.register_topic_alias(alias, self.topic_name.clone());
        }

        Ok(())
    }
}

impl ControlPacket for PublishPacket {
    const PACKET_TYPE: PacketType = PacketType::Publish;
}

impl DecodablePacket for PublishPacket {
    /// Flags are DUP, `QoS` (2 bits) and RETAIN.
    fn validate_header(flags: u8) -> Result<(), DecodeError> {
        let qos = flags >> 1 & 0b11;
        if qos == 3 {
            return Err(DecodeError::malformed("PUBLISH QoS must not be 3"));
        }

        let dup = flags & 0b1000 != 0;
        if dup && qos == 0 {
            return Err(DecodeError::malformed("PUBLISH DUP must be 0 for QoS 0"));
        }

        Ok(())
    }

    fn decode(
        buf: &mut Bytes,
        flags: u8,
        limits: &mut ConnectionLimits,
    ) -> Result<Self, DecodeError> {
        // Topic Name length and Property Length
        if buf.remaining() < 3 {
            return Err(DecodeError::remaining_length_too_short(Self::PACKET_TYPE));
        }

        let mut packet = Self {
            dup: flags & 0b1000 != 0,
            qos: QoS::from_u8(flags >> 1 & 0b11).unwrap_or_default(),
            retain: flags & 0b0001 != 0,
            ..Self::default()
        };

        packet.topic_name = decode_utf8_string(buf)?;
        if !packet.topic_name.is_empty() {
            validate_topic_name(&packet.topic_name).map_err(DecodeError::malformed)?;
        }

        if packet.qos != QoS::AtMostOnce {
            let packet_identifier = decode_u16(buf)?;
            if packet_identifier == 0 {
                return Err(DecodeError::protocol("PUBLISH packet identifier must not be 0"));
            }
            packet.packet_identifier = Some(packet_identifier);
        }

        decode_properties(buf, Self::PACKET_TYPE, |property| {
            match property {
                Property::PayloadFormatIndicator(value) => {
                    packet.payload_format_indicator = Some(value);
                }
                Property::MessageExpiryInterval(value) => {
                    packet.message_expiry_interval = Some(value);
                }
                Property::TopicAlias(value) => packet.topic_alias = Some(value),
                Property::ResponseTopic(value) => {
                    validate_topic_name(&value).map_err(DecodeError::protocol)?;
                    packet.response_topic = Some(value);
                }
                Property::CorrelationData(value) => packet.correlation_data = Some(value),
                Property::UserProperty(value) => packet.user_properties.push(value),
                Property::SubscriptionIdentifier(value) => {
                    packet.subscription_identifiers.push(value);
                }
                Property::ContentType(value) => packet.content_type = Some(value),
                property => return Err(property.invalid_for(Self::PACKET_TYPE)),
            }

            Ok(())
        })?;

        packet.resolve_topic_alias(limits)?;

        // The payload is whatever is left
        packet.payload = mem::take(buf);

        Ok(packet)
    }
}

impl EncodablePacket for PublishPacket {
    fn flags(&self) -> u8 {
        u8::from(self.dup) << 3 | self.qos.to_u8() << 1 | u8::from(self.retain)
    }

    fn check_limits(&self, limits: &ConnectionLimits) -> Result<(), EncodeError> {
        let Some(alias) = self.topic_alias else {
            return Ok(());
        };

        let maximum = limits.topic_alias_maximum_outbound();
        if alias == 0 || alias > maximum {
            return Err(EncodeError::InvalidPacket(format!(
                "Topic Alias {alias} is outside the peer's range 1..={maximum}"
            )));
        }

        Ok(())
    }

    /// The full Topic Name is always sent, together with the Topic Alias if one is set.
    fn encode_body(&self, buf: &mut BytesMut, _omit: bool) -> Result<(), EncodeError> {
        if self.dup && self.qos == QoS::AtMostOnce {
            return Err(EncodeError::InvalidPacket("DUP must be 0 for QoS 0".into()));
        }
        validate_topic_name(&self.topic_name).map_err(EncodeError::InvalidPacket)?;
        if self.topic_name.is_empty() && self.topic_alias.is_none() {
            return Err(EncodeError::InvalidPacket(
                "PUBLISH must include a Topic Name or a Topic Alias".into(),
            ));
        }

        encode_utf8_string(buf, &self.topic_name)?;

        match (self.qos, self.packet_identifier) {
            (QoS::AtMostOnce, None) => {}
            (QoS::AtMostOnce, Some(_)) => {
                return Err(EncodeError::InvalidPacket(
                    "QoS 0 PUBLISH must not have a packet identifier".into(),
                ))
            }
            (_, Some(packet_identifier)) if packet_identifier != 0 => {
                buf.put_u16(packet_identifier);
            }
            (qos, _) => {
                return Err(EncodeError::InvalidPacket(format!(
                    "{qos} PUBLISH needs a non-zero packet identifier"
                )))
            }
        }

        let mut properties = PropertyEncoder::new();

        properties.put_bool(PAYLOAD_FORMAT_INDICATOR_IDENTIFIER, self.payload_format_indicator);
        properties.put_u32(MESSAGE_EXPIRY_INTERVAL_IDENTIFIER, self.message_expiry_interval);
        properties.put_u16(TOPIC_ALIAS_IDENTIFIER, self.topic_alias);
        properties.put_utf8_string(RESPONSE_TOPIC_IDENTIFIER, self.response_topic.as_deref())?;
        properties.put_binary_data(CORRELATION_DATA_IDENTIFIER, self.correlation_data.as_deref())?;
        properties.put_user_properties(&self.user_properties)?;
        for subscription_identifier in &self.subscription_identifiers {
            properties.put_variable_byte_int(SUBSCRIPTION_IDENTIFIER, *subscription_identifier)?;
        }
        properties.put_utf8_string(CONTENT_TYPE_IDENTIFIER, self.content_type.as_deref())?;

        properties.finish(buf)?;

        buf.extend_from_slice(&self.payload);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packets::conn_ack_packet::{ConnAckPacket, ConnectReasonCode};

    fn decode(
        flags: u8,
        bytes: &'static [u8],
        limits: &mut ConnectionLimits,
    ) -> Result<PublishPacket, DecodeError> {
        PublishPacket::decode_packet(flags, Bytes::from_static(bytes), limits)
    }

    #[test]
    fn qos0_with_payload() {
        let packet =
            decode(0b0001, &[0, 3, b'a', b'/', b'b', 0, b'h', b'i'], &mut ConnectionLimits::default())
                .unwrap();

        assert!(packet.retain);
        assert_eq!(packet.qos, QoS::AtMostOnce);
        assert_eq!(packet.topic_name, "a/b");
        assert_eq!(packet.packet_identifier, None);
        assert_eq!(packet.payload, Bytes::from_static(b"hi"));
    }

    #[test]
    fn qos1_packet_identifier() {
        let mut limits = ConnectionLimits::default();

        let packet = decode(0b1010, &[0, 1, b't', 0, 5, 0], &mut limits).unwrap();
        assert!(packet.dup);
        assert_eq!(packet.qos, QoS::AtLeastOnce);
        assert_eq!(packet.packet_identifier, Some(5));
        assert!(packet.payload.is_empty());

        assert!(matches!(
            decode(0b0010, &[0, 1, b't', 0, 0, 0], &mut limits),
            Err(DecodeError::ProtocolError(_))
        ));
    }

    #[test]
    fn header_flags() {
        let mut limits = ConnectionLimits::default();
        let bytes: &'static [u8] = &[0, 1, b't', 0];

        assert!(matches!(decode(0b0110, bytes, &mut limits), Err(DecodeError::MalformedPacket(_))));
        assert!(matches!(decode(0b1000, bytes, &mut limits), Err(DecodeError::MalformedPacket(_))));
    }

    #[test]
    fn wildcard_topic_is_malformed() {
        assert!(matches!(
            decode(0, &[0, 3, b'a', b'/', b'#', 0], &mut ConnectionLimits::default()),
            Err(DecodeError::MalformedPacket(_))
        ));
    }

    #[test]
    fn repeated_subscription_identifiers() {
        let packet =
            decode(0, &[0, 1, b't', 4, 0x0B, 1, 0x0B, 7], &mut ConnectionLimits::default()).unwrap();
        assert_eq!(packet.subscription_identifiers, vec![1, 7]);
    }

    #[test]
    fn topic_alias_is_registered_then_resolved() {
        let mut limits = ConnectionLimits::new().with_topic_alias_maximum(10);

        let packet = decode(0, &[0, 3, b'a', b'/', b'b', 3, 0x23, 0, 2], &mut limits).unwrap();
        assert_eq!(packet.topic_name, "a/b");
        assert_eq!(limits.topic_alias(2), Some("a/b"));

        let packet = decode(0, &[0, 0, 3, 0x23, 0, 2, b'x'], &mut limits).unwrap();
        assert_eq!(packet.topic_name, "a/b");
        assert_eq!(packet.topic_alias, Some(2));
        assert_eq!(packet.payload, Bytes::from_static(b"x"));
    }

    #[test]
    fn topic_alias_errors() {
        let mut limits = ConnectionLimits::new().with_topic_alias_maximum(10);

        // above the maximum
        assert!(matches!(
            decode(0, &[0, 1, b't', 3, 0x23, 0, 11], &mut limits),
            Err(DecodeError::TopicAliasInvalid(_))
        ));

        // zero
        assert!(matches!(
            decode(0, &[0, 1, b't', 3, 0x23, 0, 0], &mut limits),
            Err(DecodeError::TopicAliasInvalid(_))
        ));

        // unmapped
        assert!(matches!(
            decode(0, &[0, 0, 3, 0x23, 0, 4], &mut limits),
            Err(DecodeError::ProtocolError(_))
        ));

        // neither topic nor alias
        assert!(matches!(decode(0, &[0, 0, 0], &mut limits), Err(DecodeError::ProtocolError(_))));
    }

    #[test]
    fn aliases_disabled_by_default() {
        assert!(matches!(
            decode(0, &[0, 1, b't', 3, 0x23, 0, 1], &mut ConnectionLimits::default()),
            Err(DecodeError::TopicAliasInvalid(_))
        ));
    }

    #[test]
    fn encodes_flags_and_packet_identifier() {
        let mut packet = PublishPacket::new("t", QoS::ExactlyOnce, Bytes::from_static(b"p"));
        packet.retain = true;
        packet.packet_identifier = Some(9);

        let mut buf = BytesMut::new();
        packet.encode(&mut buf, &ConnectionLimits::default()).unwrap();
        assert_eq!(&buf[..], &[0x35, 7, 0, 1, b't', 0, 9, 0, b'p']);
    }

    #[test]
    fn encode_requires_packet_identifier_for_qos1() {
        let packet = PublishPacket::new("t", QoS::AtLeastOnce, Bytes::new());
        let mut buf = BytesMut::new();
        assert!(matches!(
            packet.encode(&mut buf, &ConnectionLimits::default()),
            Err(EncodeError::InvalidPacket(_))
        ));
    }

    #[test]
    fn encode_respects_peer_topic_alias_maximum() {
        let mut limits = ConnectionLimits::default();
        let mut connack = ConnAckPacket::new(ConnectReasonCode::Success);
        connack.topic_alias_maximum = Some(2);
        limits.apply_connack(&connack).unwrap();

        let mut packet = PublishPacket::new("a/b", QoS::AtMostOnce, Bytes::new());
        let mut buf = BytesMut::new();

        for alias in [0, 3, 9] {
            packet.topic_alias = Some(alias);
            assert!(
                matches!(packet.encode(&mut buf, &limits), Err(EncodeError::InvalidPacket(_))),
                "alias {alias}"
            );
        }
        assert!(buf.is_empty());

        packet.topic_alias = Some(2);
        packet.encode(&mut buf, &limits).unwrap();
        assert_eq!(&buf[..], &[0x30, 9, 0, 3, b'a', b'/', b'b', 3, 0x23, 0, 2]);
    }

    #[test]
    fn encode_rejects_aliases_the_peer_disabled() {
        let mut packet = PublishPacket::new("a/b", QoS::AtMostOnce, Bytes::new());
        packet.topic_alias = Some(1);

        let mut buf = BytesMut::new();
        assert!(matches!(
            packet.encode(&mut buf, &ConnectionLimits::default()),
            Err(EncodeError::InvalidPacket(_))
        ));
    }

    #[test]
    fn encode_requires_topic_name_or_alias() {
        let packet = PublishPacket::new("", QoS::AtMostOnce, Bytes::new());
        let mut buf = BytesMut::new();
        assert!(matches!(
            packet.encode(&mut buf, &ConnectionLimits::default()),
            Err(EncodeError::InvalidPacket(_))
        ));
        assert!(buf.is_empty());
    }
}

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::{
    error::{DecodeError, EncodeError},
    limits::ConnectionLimits,
    protocol::{
        decoding::{decode_u16, decode_u8, decode_utf8_string},
        encoding::encode_utf8_string,
        properties::{decode_properties, Property, PropertyEncoder, SUBSCRIPTION_IDENTIFIER},
        validation::validate_topic_filter,
        PacketType, QoS, UserProperties,
    },
};

use super::{ControlPacket, DecodablePacket, EncodablePacket};

const SHARED_SUBSCRIPTION_PREFIX: &str = "$share/";

/// Whether retained messages are sent when the subscription is established.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RetainHandling {
    #[default]
    SendAllAtSubscribe = 0,
    SendIfNewSubscription = 1,
    DoNotSendAtSubscribe = 2,
}

impl RetainHandling {
    fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::SendAllAtSubscribe),
            1 => Some(Self::SendIfNewSubscription),
            2 => Some(Self::DoNotSendAtSubscribe),
            _ => None,
        }
    }
}

/// A Topic Filter and its Subscription Options.
///
/// Reference: <https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901169>
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub topic_filter: String,
    pub maximum_qos: QoS,

    /// Application Messages must not be forwarded to a connection with a Client ID equal to the
    /// Client ID of the publishing connection.
    pub no_local: bool,
    pub retain_as_published: bool,
    pub retain_handling: RetainHandling,
}

impl Subscription {
    pub fn new(topic_filter: impl Into<String>, maximum_qos: QoS) -> Self {
        Self {
            topic_filter: topic_filter.into(),
            maximum_qos,
            no_local: false,
            retain_as_published: false,
            retain_handling: RetainHandling::default(),
        }
    }

    fn decode(buf: &mut Bytes) -> Result<Self, DecodeError> {
        let topic_filter = decode_utf8_string(buf)?;
        validate_topic_filter(&topic_filter).map_err(DecodeError::malformed)?;

        let options = decode_u8(buf)?;

        // Bits 6 and 7 of the Subscription Options byte are reserved
        if options & 0b1100_0000 != 0 {
            return Err(DecodeError::malformed(format!(
                "Subscription options reserved bits must be 0, got {options:#010b}"
            )));
        }

        let Some(maximum_qos) = QoS::from_u8(options & 0b0000_0011) else {
            return Err(DecodeError::protocol("Subscription maximum QoS must not be 3"));
        };

        let no_local = options >> 2 & 1 == 1;
        let retain_as_published = options >> 3 & 1 == 1;

        let Some(retain_handling) = RetainHandling::from_u8(options >> 4 & 0b0000_0011) else {
            return Err(DecodeError::protocol("Subscription retain handling must not be 3"));
        };

        if no_local && topic_filter.starts_with(SHARED_SUBSCRIPTION_PREFIX) {
            return Err(DecodeError::protocol(format!(
                "No Local must not be set on a shared subscription: {topic_filter}"
            )));
        }

        Ok(Self { topic_filter, maximum_qos, no_local, retain_as_published, retain_handling })
    }

    fn encode(&self, buf: &mut BytesMut) -> Result<(), EncodeError> {
        validate_topic_filter(&self.topic_filter).map_err(EncodeError::InvalidPacket)?;
        if self.no_local && self.topic_filter.starts_with(SHARED_SUBSCRIPTION_PREFIX) {
            return Err(EncodeError::InvalidPacket(format!(
                "No Local must not be set on a shared subscription: {}",
                self.topic_filter
            )));
        }

        encode_utf8_string(buf, &self.topic_filter)?;

        let options = self.maximum_qos.to_u8()
            | u8::from(self.no_local) << 2
            | u8::from(self.retain_as_published) << 3
            | (self.retain_handling as u8) << 4;
        buf.put_u8(options);

        Ok(())
    }
}

/// The SUBSCRIBE packet is sent from the Client to the Server to create one or more
/// Subscriptions.
///
/// Reference: <https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901161>
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribePacket {
    pub packet_identifier: u16,
    pub subscription_identifier: Option<u32>,
    pub user_properties: UserProperties,
    pub subscriptions: Vec<Subscription>,
}

impl SubscribePacket {
    pub fn new(packet_identifier: u16, subscriptions: Vec<Subscription>) -> Self {
        Self {
            packet_identifier,
            subscription_identifier: None,
            user_properties: UserProperties::new(),
            subscriptions,
        }
    }
}

impl ControlPacket for SubscribePacket {
    const PACKET_TYPE: PacketType = PacketType::Subscribe;
}

impl DecodablePacket for SubscribePacket {
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
            return Err(DecodeError::protocol("SUBSCRIBE packet identifier must not be 0"));
        }

        let mut packet = Self::new(packet_identifier, Vec::new());

        decode_properties(buf, Self::PACKET_TYPE, |property| {
            match property {
                Property::SubscriptionIdentifier(value) => {
                    packet.subscription_identifier = Some(value);
                }
                Property::UserProperty(value) => packet.user_properties.push(value),
                property => return Err(property.invalid_for(Self::PACKET_TYPE)),
            }

            Ok(())
        })?;

        if !buf.has_remaining() {
            return Err(DecodeError::protocol("SUBSCRIBE must contain at least one topic filter"));
        }

        while buf.has_remaining() {
            packet.subscriptions.push(Subscription::decode(buf)?);
        }

        Ok(packet)
    }
}

impl EncodablePacket for SubscribePacket {
    fn encode_body(&self, buf: &mut BytesMut, _omit: bool) -> Result<(), EncodeError> {
        if self.subscriptions.is_empty() {
            return Err(EncodeError::InvalidPacket(
                "SUBSCRIBE must contain at least one topic filter".into(),
            ));
        }
        if self.packet_identifier == 0 {
            return Err(EncodeError::InvalidPacket(
                "SUBSCRIBE packet identifier must not be 0".into(),
            ));
        }
        if self.subscription_identifier == Some(0) {
            return Err(EncodeError::InvalidPacket("Subscription Identifier must not be 0".into()));
        }

        buf.put_u16(self.packet_identifier);

        let mut properties = PropertyEncoder::new();
        if let Some(subscription_identifier) = self.subscription_identifier {
            properties.put_variable_byte_int(SUBSCRIPTION_IDENTIFIER, subscription_identifier)?;
        }
        properties.put_user_properties(&self.user_properties)?;
        properties.finish(buf)?;

        for subscription in &self.subscriptions {
            subscription.encode(buf)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(bytes: &'static [u8]) -> Result<SubscribePacket, DecodeError> {
        SubscribePacket::decode_packet(
            0b0010,
            Bytes::from_static(bytes),
            &mut ConnectionLimits::default(),
        )
    }

    #[test]
    fn decodes_subscription_options() {
        let packet = decode(&[0, 1, 2, 0x0B, 4, 0, 3, b'a', b'/', b'+', 0b0010_1110]).unwrap();

        assert_eq!(packet.packet_identifier, 1);
        assert_eq!(packet.subscription_identifier, Some(4));
        assert_eq!(
            packet.subscriptions,
            vec![Subscription {
                topic_filter: "a/+".into(),
                maximum_qos: QoS::ExactlyOnce,
                no_local: true,
                retain_as_published: true,
                retain_handling: RetainHandling::DoNotSendAtSubscribe,
            }]
        );
    }

    #[test]
    fn option_errors() {
        // reserved bit
        assert!(matches!(decode(&[0, 1, 0, 0, 1, b'a', 0b0100_0000]), Err(DecodeError::MalformedPacket(_))));
        // QoS 3
        assert!(matches!(decode(&[0, 1, 0, 0, 1, b'a', 0b0000_0011]), Err(DecodeError::ProtocolError(_))));
        // Retain Handling 3
        assert!(matches!(decode(&[0, 1, 0, 0, 1, b'a', 0b0011_0000]), Err(DecodeError::ProtocolError(_))));
    }

    #[test]
    fn no_local_on_shared_subscription() {
        let shared = decode(&[
            0, 1, 0, 0, 10, b'$', b's', b'h', b'a', b'r', b'e', b'/', b'g', b'/', b't', 0b0100,
        ]);
        assert!(matches!(shared, Err(DecodeError::ProtocolError(_))));

        let plain = decode(&[0, 1, 0, 0, 1, b't', 0b0100]).unwrap();
        assert!(plain.subscriptions[0].no_local);
    }

    #[test]
    fn empty_payload_is_protocol_error() {
        assert!(matches!(decode(&[0, 1, 0]), Err(DecodeError::ProtocolError(_))));
    }

    #[test]
    fn packet_identifier_zero() {
        assert!(matches!(decode(&[0, 0, 0, 0, 1, b'a', 0]), Err(DecodeError::ProtocolError(_))));
    }

    #[test]
    fn wrong_flags() {
        let result = SubscribePacket::decode_packet(
            0,
            Bytes::from_static(&[0, 1, 0, 0, 1, b'a', 0]),
            &mut ConnectionLimits::default(),
        );
        assert!(matches!(result, Err(DecodeError::MalformedPacket(_))));
    }

    #[test]
    fn encodes_options_byte() {
        let mut subscription = Subscription::new("a", QoS::AtLeastOnce);
        subscription.retain_handling = RetainHandling::SendIfNewSubscription;

        let mut buf = BytesMut::new();
        SubscribePacket::new(1, vec![subscription])
            .encode(&mut buf, &ConnectionLimits::default())
            .unwrap();
        assert_eq!(&buf[..], &[0x82, 7, 0, 1, 0, 0, 1, b'a', 0b0001_0001]);
    }

    #[test]
    fn encode_rejects_what_decode_rejects() {
        let mut shared = Subscription::new("$share/g/t", QoS::AtMostOnce);
        shared.no_local = true;

        let mut with_zero_identifier =
            SubscribePacket::new(1, vec![Subscription::new("t", QoS::AtMostOnce)]);
        with_zero_identifier.subscription_identifier = Some(0);

        let cases = [
            SubscribePacket::new(1, vec![shared]),
            SubscribePacket::new(1, vec![Subscription::new("a/#/b", QoS::AtMostOnce)]),
            SubscribePacket::new(1, vec![Subscription::new("", QoS::AtMostOnce)]),
            SubscribePacket::new(0, vec![Subscription::new("t", QoS::AtMostOnce)]),
            with_zero_identifier,
        ];

        for packet in cases {
            let mut buf = BytesMut::new();
            assert!(
                matches!(
                    packet.encode(&mut buf, &ConnectionLimits::default()),
                    Err(EncodeError::InvalidPacket(_))
                ),
                "{packet:?}"
            );
            assert!(buf.is_empty());
        }
    }
}

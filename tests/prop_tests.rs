use bytes::{Bytes, BytesMut};
use mqtt5_codec::{
    decode_fixed_header, ConnectionLimits, DecodeError, DecoderRegistry, Packet, PubAckPacket,
    PubAckReasonCode, PublishPacket, QoS, UserProperty,
};
use proptest::prelude::*;

fn encode(packet: Packet) -> BytesMut {
    let mut buf = BytesMut::new();
    packet.encode(&mut buf, &ConnectionLimits::default()).unwrap();
    buf
}

fn reason_code_strategy() -> impl Strategy<Value = PubAckReasonCode> {
    prop_oneof![
        Just(PubAckReasonCode::Success),
        Just(PubAckReasonCode::NoMatchingSubscribers),
        Just(PubAckReasonCode::NotAuthorized),
        Just(PubAckReasonCode::QuotaExceeded),
    ]
}

fn puback_strategy() -> impl Strategy<Value = PubAckPacket> {
    (
        1u16..,
        reason_code_strategy(),
        "[a-z ]{0,20}",
        prop::collection::vec(("[a-z]{0,8}", "[a-z0-9]{0,8}"), 0..4),
    )
        .prop_map(|(packet_identifier, reason_code, reason_string, user_properties)| {
            let mut packet = PubAckPacket::new(packet_identifier, reason_code);
            packet.reason_string = Some(reason_string);
            packet.user_properties = user_properties
                .into_iter()
                .map(|(name, value)| UserProperty::new(name, value))
                .collect();
            packet
        })
}

proptest! {
    #[test]
    fn remaining_length_matches_body(payload_len in 0usize..20_000) {
        let publish = PublishPacket::new("t", QoS::AtMostOnce, Bytes::from(vec![0xA5; payload_len]));
        let bytes = encode(publish.into());

        let header = decode_fixed_header(&bytes).unwrap().unwrap();
        let expected_header_len = match header.remaining_len {
            0..=127 => 2,
            128..=16_383 => 3,
            _ => 4,
        };

        prop_assert_eq!(header.header_len, expected_header_len);
        prop_assert_eq!(header.packet_size(), bytes.len());
        // topic (3 bytes) and an empty property list (1 byte) precede the payload
        prop_assert_eq!(header.remaining_len, payload_len + 4);
    }

    #[test]
    fn puback_decodes_what_was_encoded(packet in puback_strategy()) {
        let bytes = encode(packet.clone().into()).freeze();

        let decoded = DecoderRegistry::client()
            .decode(bytes[0], bytes.slice(2..), &mut ConnectionLimits::default())
            .unwrap();

        prop_assert_eq!(decoded, Packet::PubAck(packet));
    }

    #[test]
    fn property_length_off_by_one_is_malformed(packet in puback_strategy(), longer in any::<bool>()) {
        let mut bytes = encode(packet.into());

        // Fixed header, packet identifier and reason code come first
        let property_length = bytes[5];
        prop_assume!(property_length > 0);
        bytes[5] = if longer { property_length + 1 } else { property_length - 1 };

        let bytes = bytes.freeze();
        let result = DecoderRegistry::client()
            .decode(bytes[0], bytes.slice(2..), &mut ConnectionLimits::default());

        prop_assert!(matches!(result, Err(DecodeError::MalformedPacket(_))), "{:?}", result);
    }
}

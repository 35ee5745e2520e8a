//! Packet type dispatch.
//!
//! A [`DecoderRegistry`] maps the packet type in the first byte of the fixed header to the
//! decoder of that type. It holds no state of its own; everything learned about the connection
//! lives in the [`ConnectionLimits`] passed to each call.

use bytes::{Bytes, BytesMut};
use log::debug;

use crate::{
    error::{DecodeError, EncodeError},
    limits::ConnectionLimits,
    packets::{
        auth_packet::AuthPacket, conn_ack_packet::ConnAckPacket, connect_packet::ConnectPacket,
        disconnect_packet::DisconnectPacket, ping_req_packet::PingReqPacket,
        ping_resp_packet::PingRespPacket, pub_ack_packet::PubAckPacket,
        pub_comp_packet::PubCompPacket, pub_rec_packet::PubRecPacket,
        pub_rel_packet::PubRelPacket, publish_packet::PublishPacket,
        sub_ack_packet::SubAckPacket, subscribe_packet::SubscribePacket,
        unsub_ack_packet::UnsubAckPacket, unsubscribe_packet::UnsubscribePacket, DecodablePacket,
        Packet,
    },
    protocol::{encoding::variable_byte_int_len, PacketType},
};

/// Decodes the body of one packet type: fixed header flags, Remaining Length bytes, limits.
pub type DecodeFn = fn(u8, Bytes, &mut ConnectionLimits) -> Result<Packet, DecodeError>;

fn decode_with<P>(flags: u8, body: Bytes, limits: &mut ConnectionLimits) -> Result<Packet, DecodeError>
where
    P: DecodablePacket + Into<Packet>,
{
    P::decode_packet(flags, body, limits).map(Into::into)
}

const CLIENT_DECODERS: [(PacketType, DecodeFn); 11] = [
    (PacketType::ConnAck, decode_with::<ConnAckPacket>),
    (PacketType::Publish, decode_with::<PublishPacket>),
    (PacketType::PubAck, decode_with::<PubAckPacket>),
    (PacketType::PubRec, decode_with::<PubRecPacket>),
    (PacketType::PubRel, decode_with::<PubRelPacket>),
    (PacketType::PubComp, decode_with::<PubCompPacket>),
    (PacketType::SubAck, decode_with::<SubAckPacket>),
    (PacketType::UnsubAck, decode_with::<UnsubAckPacket>),
    (PacketType::PingResp, decode_with::<PingRespPacket>),
    (PacketType::Disconnect, decode_with::<DisconnectPacket>),
    (PacketType::Auth, decode_with::<AuthPacket>),
];

const SERVER_DECODERS: [(PacketType, DecodeFn); 11] = [
    (PacketType::Connect, decode_with::<ConnectPacket>),
    (PacketType::Publish, decode_with::<PublishPacket>),
    (PacketType::PubAck, decode_with::<PubAckPacket>),
    (PacketType::PubRec, decode_with::<PubRecPacket>),
    (PacketType::PubRel, decode_with::<PubRelPacket>),
    (PacketType::PubComp, decode_with::<PubCompPacket>),
    (PacketType::Subscribe, decode_with::<SubscribePacket>),
    (PacketType::Unsubscribe, decode_with::<UnsubscribePacket>),
    (PacketType::PingReq, decode_with::<PingReqPacket>),
    (PacketType::Disconnect, decode_with::<DisconnectPacket>),
    (PacketType::Auth, decode_with::<AuthPacket>),
];

/// Table of decoders indexed by packet type. Slot 0 (reserved) is always empty.
#[derive(Clone, Copy)]
pub struct DecoderRegistry {
    decoders: [Option<DecodeFn>; 16],
}

impl DecoderRegistry {
    fn with(tables: &[&[(PacketType, DecodeFn)]]) -> Self {
        let mut decoders: [Option<DecodeFn>; 16] = [None; 16];
        for table in tables {
            for &(packet_type, decode) in *table {
                decoders[packet_type.to_u8() as usize] = Some(decode);
            }
        }

        Self { decoders }
    }

    /// Decoders for the packets a Server sends to a Client.
    pub fn client() -> Self {
        Self::with(&[&CLIENT_DECODERS])
    }

    /// Decoders for the packets a Client sends to a Server.
    pub fn server() -> Self {
        Self::with(&[&SERVER_DECODERS])
    }

    /// Decoders for every packet type.
    pub fn all() -> Self {
        Self::with(&[&CLIENT_DECODERS, &SERVER_DECODERS])
    }

    /// Look up the decoder for the packet type in the upper nibble of `first_byte`.
    ///
    /// # Errors
    /// - `DecodeError::MalformedPacket` for the reserved type 0 and types not registered here.
    pub fn get(&self, first_byte: u8) -> Result<DecodeFn, DecodeError> {
        let packet_type = first_byte >> 4;
        self.decoders[packet_type as usize].ok_or_else(|| match PacketType::from_u8(packet_type) {
            Some(packet_type) => {
                DecodeError::malformed(format!("Unexpected packet type: {packet_type}"))
            }
            None => DecodeError::malformed(format!("Invalid packet type: {packet_type}")),
        })
    }

    /// Decode one packet.
    ///
    /// `body` must hold exactly the Remaining Length bytes following the fixed header. After a
    /// CONNACK or CONNECT the negotiated values are applied to `limits`.
    ///
    /// # Errors
    /// - `DecodeError::PacketTooLarge` if the packet exceeds the inbound Maximum Packet Size.
    /// - Any failure of the packet decoder. The partial packet is discarded.
    pub fn decode(
        &self,
        first_byte: u8,
        body: Bytes,
        limits: &mut ConnectionLimits,
    ) -> Result<Packet, DecodeError> {
        let result = self.dispatch(first_byte, body.clone(), limits);

        if let Err(e) = &result {
            debug!("Failed to decode packet {first_byte:#04x} {}: {e}", hex::encode(&body));
        }

        result
    }

    fn dispatch(
        &self,
        first_byte: u8,
        body: Bytes,
        limits: &mut ConnectionLimits,
    ) -> Result<Packet, DecodeError> {
        let size = 1 + variable_byte_int_len(body.len()) + body.len();
        let maximum = limits.maximum_packet_size_inbound();
        if size > maximum as usize {
            return Err(DecodeError::PacketTooLarge(format!(
                "Packet size {size} exceeds the maximum packet size {maximum}"
            )));
        }

        let decode = self.get(first_byte)?;
        let packet = decode(first_byte & 0x0F, body, limits)?;

        match &packet {
            Packet::ConnAck(packet) => limits.apply_connack(packet)?,
            Packet::Connect(packet) => limits.apply_connect(packet)?,
            _ => {}
        }

        Ok(packet)
    }

    /// Encode `packet` into `buf`, honouring the peer's Maximum Packet Size.
    pub fn encode(
        &self,
        packet: &Packet,
        buf: &mut BytesMut,
        limits: &ConnectionLimits,
    ) -> Result<(), EncodeError> {
        packet.encode(buf, limits)
    }
}

impl Default for DecoderRegistry {
    fn default() -> Self {
        Self::all()
    }
}

impl std::fmt::Debug for DecoderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registered: Vec<_> = (0..16u8)
            .filter(|&i| self.decoders[i as usize].is_some())
            .filter_map(PacketType::from_u8)
            .collect();

        f.debug_struct("DecoderRegistry").field("registered", &registered).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packets::conn_ack_packet::ConnectReasonCode;

    #[test]
    fn reserved_type_is_malformed() {
        let registry = DecoderRegistry::all();
        assert!(matches!(registry.get(0x00), Err(DecodeError::MalformedPacket(_))));
    }

    #[test]
    fn client_registry_rejects_server_bound_packets() {
        let registry = DecoderRegistry::client();
        assert!(registry.get(0x20).is_ok());
        assert!(matches!(registry.get(0x10), Err(DecodeError::MalformedPacket(_))));
        assert!(matches!(registry.get(0x82), Err(DecodeError::MalformedPacket(_))));
        assert!(matches!(registry.get(0xC0), Err(DecodeError::MalformedPacket(_))));
    }

    #[test]
    fn server_registry_rejects_client_bound_packets() {
        let registry = DecoderRegistry::server();
        assert!(registry.get(0x10).is_ok());
        assert!(matches!(registry.get(0x20), Err(DecodeError::MalformedPacket(_))));
        assert!(matches!(registry.get(0xD0), Err(DecodeError::MalformedPacket(_))));
    }

    #[test]
    fn inbound_maximum_packet_size() {
        let registry = DecoderRegistry::client();
        let mut limits = ConnectionLimits::new().with_maximum_packet_size(4);

        // PUBACK of 4 bytes fits, 5 bytes does not
        assert!(registry.decode(0x40, Bytes::from_static(&[0, 1]), &mut limits).is_ok());
        assert!(matches!(
            registry.decode(0x40, Bytes::from_static(&[0, 1, 0x10]), &mut limits),
            Err(DecodeError::PacketTooLarge(_))
        ));
    }

    #[test]
    fn connack_is_applied_once() {
        let registry = DecoderRegistry::client();
        let mut limits = ConnectionLimits::default();

        // Maximum Packet Size 100, Topic Alias Maximum 3
        let body = Bytes::from_static(&[0, 0, 8, 0x27, 0, 0, 0, 100, 0x22, 0, 3]);
        let packet = registry.decode(0x20, body.clone(), &mut limits).unwrap();

        assert_eq!(packet.packet_type(), PacketType::ConnAck);
        assert!(matches!(
            packet,
            Packet::ConnAck(ConnAckPacket { reason_code: ConnectReasonCode::Success, .. })
        ));
        assert_eq!(limits.maximum_packet_size_outbound(), 100);
        assert_eq!(limits.topic_alias_maximum_outbound(), 3);

        assert!(matches!(
            registry.decode(0x20, body, &mut limits),
            Err(DecodeError::ProtocolError(_))
        ));
    }

    #[test]
    fn connect_sets_peer_problem_information() {
        let registry = DecoderRegistry::server();
        let mut limits = ConnectionLimits::default();

        let body = Bytes::from_static(&[
            0, 4, b'M', b'Q', b'T', b'T', 5, 0b10, 0, 10, 2, 0x17, 0, 0, 1, b'c',
        ]);
        registry.decode(0x10, body, &mut limits).unwrap();

        assert!(!limits.peer_problem_information_requested());
        let disconnect = DecodeError::protocol("x").to_disconnect(&limits);
        assert_eq!(disconnect.reason_string, None);
    }
}

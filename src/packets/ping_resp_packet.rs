use bytes::{Bytes, BytesMut};

use crate::{
    error::{DecodeError, EncodeError},
    limits::ConnectionLimits,
    protocol::PacketType,
};

use super::{ControlPacket, DecodablePacket, EncodablePacket};

/// A PINGRESP Packet is sent by the Server to the Client in response to a PINGREQ packet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PingRespPacket;

impl ControlPacket for PingRespPacket {
    const PACKET_TYPE: PacketType = PacketType::PingResp;
}

impl DecodablePacket for PingRespPacket {
    fn decode(
        _buf: &mut Bytes,
        _flags: u8,
        _limits: &mut ConnectionLimits,
    ) -> Result<Self, DecodeError> {
        Ok(Self)
    }
}

impl EncodablePacket for PingRespPacket {
    fn encode_body(&self, _buf: &mut BytesMut, _omit: bool) -> Result<(), EncodeError> {
        Ok(())
    }
}

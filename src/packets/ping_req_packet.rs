use bytes::{Bytes, BytesMut};

use crate::{
    error::{DecodeError, EncodeError},
    limits::ConnectionLimits,
    protocol::PacketType,
};

use super::{ControlPacket, DecodablePacket, EncodablePacket};

/// The PINGREQ packet is sent from a Client to the Server. It has no variable header and no
/// payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PingReqPacket;

impl ControlPacket for PingReqPacket {
    const PACKET_TYPE: PacketType = PacketType::PingReq;
}

impl DecodablePacket for PingReqPacket {
    fn decode(
        _buf: &mut Bytes,
        _flags: u8,
        _limits: &mut ConnectionLimits,
    ) -> Result<Self, DecodeError> {
        // Any byte left over is rejected as trailing data
        Ok(Self)
    }
}

impl EncodablePacket for PingReqPacket {
    fn encode_body(&self, _buf: &mut BytesMut, _omit: bool) -> Result<(), EncodeError> {
        Ok(())
    }
}

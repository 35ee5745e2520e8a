use bytes::{Buf, BytesMut};
use log::{trace, warn};
use thiserror::Error;
use tokio::io::{self, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{
    error::{DecodeError, EncodeError},
    limits::ConnectionLimits,
    packets::{conn_ack_packet::ConnAckPacket, Packet},
    protocol::{decode_fixed_header, PacketType},
    registry::DecoderRegistry,
};

#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The peer closed the stream in the middle of a packet.
    #[error("Connection reset by peer")]
    ConnectionReset,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// An inbound packet failed to decode. The matching DISCONNECT has already been sent.
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Encode error: {0}")]
    Encode(#[from] EncodeError),
}

/// Frames packets on a byte stream and runs them through the codec.
///
/// Owns the [`ConnectionLimits`] of the connection, so negotiated values and topic aliases
/// carry over from one packet to the next.
#[derive(Debug)]
pub struct Connection<S> {
    stream: S,
    buffer: BytesMut,
    registry: DecoderRegistry,
    limits: ConnectionLimits,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, registry: DecoderRegistry, limits: ConnectionLimits) -> Connection<S> {
        Connection { stream, buffer: BytesMut::with_capacity(4096), registry, limits }
    }

    pub fn limits(&self) -> &ConnectionLimits {
        &self.limits
    }

    pub fn limits_mut(&mut self) -> &mut ConnectionLimits {
        &mut self.limits
    }

    pub fn into_inner(self) -> S {
        self.stream
    }

    /// Read a packet from the connection.
    ///
    /// Returns `None` if EOF is reached between packets. On a decode failure the DISCONNECT
    /// (or, for a failed CONNECT, the CONNACK) is written before the error is returned.
    pub async fn read_packet(&mut self) -> Result<Option<Packet>, ConnectionError> {
        loop {
            let first_byte = self.buffer.first().copied().unwrap_or_default();

            match self.parse_packet() {
                Ok(Some(packet)) => return Ok(Some(packet)),
                Ok(None) => {}
                Err(e) => {
                    self.reject(first_byte, &e).await;
                    return Err(e.into());
                }
            }

            if self.stream.read_buf(&mut self.buffer).await? == 0 {
                if self.buffer.is_empty() {
                    return Ok(None);
                }

                return Err(ConnectionError::ConnectionReset);
            }
        }
    }

    fn parse_packet(&mut self) -> Result<Option<Packet>, DecodeError> {
        let Some(header) = decode_fixed_header(&self.buffer)? else {
            return Ok(None);
        };

        // Fail before buffering a body that could never be accepted
        let maximum = self.limits.maximum_packet_size_inbound();
        if header.packet_size() > maximum as usize {
            return Err(DecodeError::PacketTooLarge(format!(
                "Packet size {} exceeds the maximum packet size {maximum}",
                header.packet_size()
            )));
        }

        if self.buffer.len() < header.packet_size() {
            return Ok(None);
        }

        let mut frame = self.buffer.split_to(header.packet_size()).freeze();
        frame.advance(header.header_len);

        let packet = self.registry.decode(header.first_byte, frame, &mut self.limits)?;
        trace!("Received {packet:?}");

        Ok(Some(packet))
    }

    async fn reject(&mut self, first_byte: u8, error: &DecodeError) {
        let connect_pending = !self.limits.is_negotiated()
            && PacketType::from_u8(first_byte >> 4) == Some(PacketType::Connect)
            && self.registry.get(first_byte).is_ok();

        let response: Packet = if connect_pending {
            ConnAckPacket::new(error.connect_reason_code()).into()
        } else {
            error.to_disconnect(&self.limits).into()
        };

        warn!("Closing connection after decode failure: {error}, sending {}", response.packet_type());

        if let Err(e) = self.write_packet(&response).await {
            warn!("Failed to send {}: {e}", response.packet_type());
        }
    }

    /// Write a packet to the connection.
    pub async fn write_packet(&mut self, packet: &Packet) -> Result<(), ConnectionError> {
        let mut buf = BytesMut::new();
        self.registry.encode(packet, &mut buf, &self.limits)?;

        self.stream.write_all(&buf).await?;
        self.stream.flush().await?;

        Ok(())
    }
}

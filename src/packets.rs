use bytes::{Buf, BufMut, Bytes, BytesMut};
use log::trace;

use crate::{
    constants::MAX_REMAINING_LENGTH,
    error::{DecodeError, EncodeError},
    limits::ConnectionLimits,
    protocol::{
        decoding::{decode_u16, decode_u8},
        encoding::{encode_variable_byte_int, variable_byte_int_len},
        properties::{decode_properties, Property, PropertyEncoder, REASON_STRING_IDENTIFIER},
        PacketType, UserProperties,
    },
};

pub mod auth_packet;
pub mod conn_ack_packet;
pub mod connect_packet;
pub mod disconnect_packet;
pub mod ping_req_packet;
pub mod ping_resp_packet;
pub mod pub_ack_packet;
pub mod pub_comp_packet;
pub mod pub_rec_packet;
pub mod pub_rel_packet;
pub mod publish_packet;
pub mod sub_ack_packet;
pub mod subscribe_packet;
pub mod unsub_ack_packet;
pub mod unsubscribe_packet;

use auth_packet::AuthPacket;
use conn_ack_packet::ConnAckPacket;
use connect_packet::ConnectPacket;
use disconnect_packet::DisconnectPacket;
use ping_req_packet::PingReqPacket;
use ping_resp_packet::PingRespPacket;
use pub_ack_packet::PubAckPacket;
use pub_comp_packet::PubCompPacket;
use pub_rec_packet::PubRecPacket;
use pub_rel_packet::PubRelPacket;
use publish_packet::PublishPacket;
use sub_ack_packet::SubAckPacket;
use subscribe_packet::SubscribePacket;
use unsub_ack_packet::UnsubAckPacket;
use unsubscribe_packet::UnsubscribePacket;

pub trait ControlPacket {
    const PACKET_TYPE: PacketType;
}

pub trait DecodablePacket: ControlPacket + Sized {
    /// Check the flags of the fixed header.
    ///
    /// All packet types except PUBLISH have a fixed flag pattern.
    fn validate_header(flags: u8) -> Result<(), DecodeError> {
        if flags != Self::PACKET_TYPE.fixed_flags() {
            return Err(DecodeError::wrong_fixed_header_flags(Self::PACKET_TYPE, flags));
        }

        Ok(())
    }

    /// Decode the variable header and payload. `buf` holds exactly the Remaining Length bytes.
    fn decode(buf: &mut Bytes, flags: u8, limits: &mut ConnectionLimits)
        -> Result<Self, DecodeError>;

    /// Validate the fixed header flags, decode the body and reject any trailing bytes.
    fn decode_packet(
        flags: u8,
        mut buf: Bytes,
        limits: &mut ConnectionLimits,
    ) -> Result<Self, DecodeError> {
        Self::validate_header(flags)?;

        let packet = Self::decode(&mut buf, flags, limits)?;

        if buf.has_remaining() {
            return Err(DecodeError::remaining_length_too_long(Self::PACKET_TYPE));
        }

        Ok(packet)
    }
}

pub trait EncodablePacket: ControlPacket {
    /// Flags of the fixed header.
    fn flags(&self) -> u8 {
        Self::PACKET_TYPE.fixed_flags()
    }

    /// Encode variable header and payload.
    ///
    /// With `omit_problem_information` the Reason String and User Properties are left out.
    fn encode_body(
        &self,
        buf: &mut BytesMut,
        omit_problem_information: bool,
    ) -> Result<(), EncodeError>;

    /// Whether the packet carries a Reason String or User Properties that may be dropped when
    /// the packet would otherwise exceed the peer's Maximum Packet Size.
    fn has_problem_information(&self) -> bool {
        false
    }

    /// Reject values the peer announced it will not accept, beyond the Maximum Packet Size.
    fn check_limits(&self, _limits: &ConnectionLimits) -> Result<(), EncodeError> {
        Ok(())
    }

    /// Encode the whole packet into `buf`.
    ///
    /// # Errors
    /// - `EncodeError::PacketTooLarge` if the packet exceeds the Maximum Packet Size of the peer
    ///   even without its problem information. Nothing is written to `buf` in that case.
    fn encode(&self, buf: &mut BytesMut, limits: &ConnectionLimits) -> Result<(), EncodeError> {
        self.check_limits(limits)?;
        let maximum = limits.maximum_packet_size_outbound();

        let mut body = BytesMut::new();
        self.encode_body(&mut body, false)?;

        if packet_size(body.len()) > maximum as usize && self.has_problem_information() {
            trace!(
                "{} of {} bytes exceeds maximum packet size {maximum}, omitting problem information",
                Self::PACKET_TYPE,
                packet_size(body.len())
            );
            body.clear();
            self.encode_body(&mut body, true)?;
        }

        let size = packet_size(body.len());
        if size > maximum as usize {
            return Err(EncodeError::PacketTooLarge { size, maximum });
        }
        if body.len() > MAX_REMAINING_LENGTH {
            return Err(EncodeError::VariableByteIntOverflow(body.len()));
        }

        buf.reserve(size);
        buf.put_u8(Self::PACKET_TYPE.to_u8() << 4 | self.flags());
        encode_variable_byte_int(buf, body.len())?;
        buf.extend_from_slice(&body);

        Ok(())
    }
}

fn packet_size(remaining_len: usize) -> usize {
    1 + variable_byte_int_len(remaining_len) + remaining_len
}

/// A one-byte reason code with a default used when the byte is omitted on the wire.
pub trait ReasonCode: Copy + Default + PartialEq {
    fn from_u8(value: u8) -> Option<Self>;

    fn to_u8(self) -> u8;
}

/// An MQTT Control Packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Connect(ConnectPacket),
    ConnAck(ConnAckPacket),
    Publish(PublishPacket),
    PubAck(PubAckPacket),
    PubRec(PubRecPacket),
    PubRel(PubRelPacket),
    PubComp(PubCompPacket),
    Subscribe(SubscribePacket),
    SubAck(SubAckPacket),
    Unsubscribe(UnsubscribePacket),
    UnsubAck(UnsubAckPacket),
    PingReq(PingReqPacket),
    PingResp(PingRespPacket),
    Disconnect(DisconnectPacket),
    Auth(AuthPacket),
}

macro_rules! packet_variants {
    ($($variant:ident($packet:ty)),* $(,)?) => {
        $(
            impl From<$packet> for Packet {
                fn from(packet: $packet) -> Self {
                    Self::$variant(packet)
                }
            }
        )*

        impl Packet {
            pub fn packet_type(&self) -> PacketType {
                match self {
                    $(Self::$variant(_) => <$packet as ControlPacket>::PACKET_TYPE,)*
                }
            }

            /// Encode the packet into `buf`, honouring the peer's Maximum Packet Size.
            pub fn encode(
                &self,
                buf: &mut BytesMut,
                limits: &ConnectionLimits,
            ) -> Result<(), EncodeError> {
                match self {
                    $(Self::$variant(packet) => packet.encode(buf, limits),)*
                }
            }
        }
    };
}

packet_variants! {
    Connect(ConnectPacket),
    ConnAck(ConnAckPacket),
    Publish(PublishPacket),
    PubAck(PubAckPacket),
    PubRec(PubRecPacket),
    PubRel(PubRelPacket),
    PubComp(PubCompPacket),
    Subscribe(SubscribePacket),
    SubAck(SubAckPacket),
    Unsubscribe(UnsubscribePacket),
    UnsubAck(UnsubAckPacket),
    PingReq(PingReqPacket),
    PingResp(PingRespPacket),
    Disconnect(DisconnectPacket),
    Auth(AuthPacket),
}

/// Decode a reason code byte. Unknown values make the packet malformed.
pub(crate) fn decode_reason_code<R: ReasonCode>(
    buf: &mut Bytes,
    packet_type: PacketType,
) -> Result<R, DecodeError> {
    let value = decode_u8(buf)?;
    R::from_u8(value).ok_or_else(|| DecodeError::wrong_reason_code(packet_type, value))
}

/// Decode a property list that may only hold Reason String and User Properties, as carried by
/// acknowledgements and AUTH.
pub(crate) fn decode_ack_properties(
    buf: &mut Bytes,
    packet_type: PacketType,
    limits: &ConnectionLimits,
) -> Result<(Option<String>, UserProperties), DecodeError> {
    let mut reason_string = None;
    let mut user_properties = UserProperties::new();

    decode_properties(buf, packet_type, |property| {
        match property {
            Property::ReasonString(value) => {
                limits.check_problem_information(packet_type, "Reason String")?;
                reason_string = Some(value);
            }
            Property::UserProperty(value) => {
                limits.check_problem_information(packet_type, "User Property")?;
                user_properties.push(value);
            }
            property => return Err(property.invalid_for(packet_type)),
        }

        Ok(())
    })?;

    Ok((reason_string, user_properties))
}

/// Reason String and User Properties of an outgoing packet.
pub(crate) fn encode_problem_information(
    properties: &mut PropertyEncoder,
    reason_string: Option<&str>,
    user_properties: &UserProperties,
    omit: bool,
) -> Result<(), EncodeError> {
    if omit {
        return Ok(());
    }

    properties.put_utf8_string(REASON_STRING_IDENTIFIER, reason_string)?;
    properties.put_user_properties(user_properties)
}

/// Fields shared by PUBACK, PUBREC, PUBREL and PUBCOMP.
pub(crate) struct PublishAck<R> {
    pub packet_identifier: u16,
    pub reason_code: R,
    pub reason_string: Option<String>,
    pub user_properties: UserProperties,
}

impl<R: ReasonCode> PublishAck<R> {
    /// Remaining Length 2 means the default reason code and no properties, 3 means no properties.
    pub(crate) fn decode(
        buf: &mut Bytes,
        packet_type: PacketType,
        limits: &ConnectionLimits,
    ) -> Result<Self, DecodeError> {
        if buf.remaining() < 2 {
            return Err(DecodeError::remaining_length_too_short(packet_type));
        }

        let packet_identifier = decode_u16(buf)?;

        let mut reason_code = R::default();
        let mut reason_string = None;
        let mut user_properties = UserProperties::new();

        if buf.has_remaining() {
            reason_code = decode_reason_code(buf, packet_type)?;

            if buf.has_remaining() {
                (reason_string, user_properties) =
                    decode_ack_properties(buf, packet_type, limits)?;
            }
        }

        Ok(Self { packet_identifier, reason_code, reason_string, user_properties })
    }
}

/// Encode the body of PUBACK, PUBREC, PUBREL or PUBCOMP in the shortest form its contents allow.
pub(crate) fn encode_publish_ack<R: ReasonCode>(
    buf: &mut BytesMut,
    packet_identifier: u16,
    reason_code: R,
    reason_string: Option<&str>,
    user_properties: &UserProperties,
    omit_problem_information: bool,
) -> Result<(), EncodeError> {
    buf.put_u16(packet_identifier);

    let mut properties = PropertyEncoder::new();
    encode_problem_information(
        &mut properties,
        reason_string,
        user_properties,
        omit_problem_information,
    )?;

    if properties.is_empty() {
        if reason_code != R::default() {
            buf.put_u8(reason_code.to_u8());
        }
        return Ok(());
    }

    buf.put_u8(reason_code.to_u8());
    properties.finish(buf)
}

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::{
    constants::{DEFAULT_RECEIVE_MAXIMUM, PROTOCOL_NAME, PROTOCOL_VERSION},
    error::{DecodeError, EncodeError},
    limits::ConnectionLimits,
    protocol::{
        decoding::{decode_binary_data, decode_u16, decode_u8, decode_utf8_string},
        encoding::{encode_binary_data, encode_utf8_string},
        properties::{
            decode_properties, Property, PropertyEncoder, AUTHENTICATION_DATA_IDENTIFIER,
            AUTHENTICATION_METHOD_IDENTIFIER, CONTENT_TYPE_IDENTIFIER,
            CORRELATION_DATA_IDENTIFIER, MAXIMUM_PACKET_SIZE_IDENTIFIER,
            MESSAGE_EXPIRY_INTERVAL_IDENTIFIER, PAYLOAD_FORMAT_INDICATOR_IDENTIFIER,
            RECEIVE_MAXIMUM_IDENTIFIER, REQUEST_PROBLEM_INFORMATION_IDENTIFIER,
            REQUEST_RESPONSE_INFORMATION_IDENTIFIER, RESPONSE_TOPIC_IDENTIFIER,
            SESSION_EXPIRY_INTERVAL_IDENTIFIER, TOPIC_ALIAS_MAXIMUM_IDENTIFIER,
            WILL_DELAY_INTERVAL_IDENTIFIER,
        },
        validation::validate_topic_name,
        PacketType, QoS, UserProperties,
    },
};

use super::{ControlPacket, DecodablePacket, EncodablePacket};

/// The Will Message published by the Server when the Network Connection is closed without a
/// normal DISCONNECT.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Will {
    pub topic: String,
    pub payload: Bytes,
    pub qos: QoS,
    pub retain: bool,

    /// Seconds the Server delays publishing the Will Message.
    pub delay_interval: Option<u32>,
    pub payload_format_indicator: Option<bool>,
    pub message_expiry_interval: Option<u32>,
    pub content_type: Option<String>,
    pub response_topic: Option<String>,
    pub correlation_data: Option<Bytes>,
    pub user_properties: UserProperties,
}

impl Will {
    pub fn new(topic: impl Into<String>, payload: impl Into<Bytes>, qos: QoS) -> Self {
        Self { topic: topic.into(), payload: payload.into(), qos, ..Self::default() }
    }

    fn decode_properties(&mut self, buf: &mut Bytes) -> Result<(), DecodeError> {
        // Will Properties share the identifier space of PUBLISH, minus the routing ones
        decode_properties(buf, PacketType::Connect, |property| {
            match property {
                Property::WillDelayInterval(value) => self.delay_interval = Some(value),
                Property::PayloadFormatIndicator(value) => {
                    self.payload_format_indicator = Some(value);
                }
                Property::MessageExpiryInterval(value) => {
                    self.message_expiry_interval = Some(value);
                }
                Property::ContentType(value) => self.content_type = Some(value),
                Property::ResponseTopic(value) => {
                    validate_topic_name(&value).map_err(DecodeError::protocol)?;
                    self.response_topic = Some(value);
                }
                Property::CorrelationData(value) => self.correlation_data = Some(value),
                Property::UserProperty(value) => self.user_properties.push(value),
                property => {
                    return Err(DecodeError::protocol(format!(
                        "{} is not allowed in Will Properties",
                        property.name()
                    )));
                }
            }

            Ok(())
        })
    }

    fn encode(&self, buf: &mut BytesMut) -> Result<(), EncodeError> {
        validate_topic_name(&self.topic).map_err(EncodeError::InvalidPacket)?;

        let mut properties = PropertyEncoder::new();
        properties.put_u32(WILL_DELAY_INTERVAL_IDENTIFIER, self.delay_interval);
        properties.put_bool(PAYLOAD_FORMAT_INDICATOR_IDENTIFIER, self.payload_format_indicator);
        properties.put_u32(MESSAGE_EXPIRY_INTERVAL_IDENTIFIER, self.message_expiry_interval);
        properties.put_utf8_string(CONTENT_TYPE_IDENTIFIER, self.content_type.as_deref())?;
        properties.put_utf8_string(RESPONSE_TOPIC_IDENTIFIER, self.response_topic.as_deref())?;
        properties.put_binary_data(CORRELATION_DATA_IDENTIFIER, self.correlation_data.as_deref())?;
        properties.put_user_properties(&self.user_properties)?;
        properties.finish(buf)?;

        encode_utf8_string(buf, &self.topic)?;
        encode_binary_data(buf, &self.payload)
    }
}

/// After a Network Connection is established by a Client to a Server, the first packet sent from
/// the Client to the Server MUST be a CONNECT packet.
///
/// Reference: <https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901033>
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectPacket {
    /// The Client Identifier identifies the Client to the Server. May be empty, in which case the
    /// Server assigns one.
    pub client_identifier: String,

    /// Specifies whether the connection starts a new session or is a continuation of an existing session.
    pub clean_start: bool,

    /// It is the maximum time interval that is permitted to elapse between the point at which the Client finishes transmitting one MQTT Control Packet and the point it starts sending the next.
    pub keep_alive: u16,

    /// Session Expiry Interval in seconds.
    /// If the Session Expiry Interval is 0xFFFFFFFF (`UINT_MAX`), the Session does not expire.
    pub session_expiry_interval: Option<u32>,

    /// The Client uses this value to limit the number of `QoS` 1 and `QoS` 2 publications that it is willing to process concurrently.
    /// If the Receive Maximum value is absent then its value defaults to 65,535.
    pub receive_maximum: Option<u16>,

    /// Represents the Maximum Packet Size the Client is willing to accept. If the Maximum Packet Size is not present, no limit on the packet size is imposed beyond the limitations in the protocol.
    pub maximum_packet_size: Option<u32>,

    /// This value indicates the highest value that the Client will accept as a Topic Alias sent by the Server.
    /// If Topic Alias Maximum is absent, the Server MUST NOT send any Topic Aliases to the Client.
    pub topic_alias_maximum: Option<u16>,

    /// The Client uses this value to request the Server to return Response Information in the CONNACK.
    pub request_response_information: Option<bool>,

    /// The Client uses this value to indicate whether the Reason String or User Properties are sent in the case of failures.
    pub request_problem_information: Option<bool>,

    /// User Properties on the CONNECT packet can be used to send connection related properties from the Client to the Server.
    pub user_properties: UserProperties,

    /// Contains the name of the authentication method used for extended authentication.
    pub authentication_method: Option<String>,

    /// The data used to authenticate.
    pub authentication_data: Option<Bytes>,

    pub will: Option<Will>,

    /// It can be used by the Server for authentication and authorization.
    pub user_name: Option<String>,

    /// Although this field is called Password, it can be used to carry any credential information.
    pub password: Option<Bytes>,
}

impl ConnectPacket {
    pub fn new(client_identifier: impl Into<String>) -> Self {
        Self { client_identifier: client_identifier.into(), clean_start: true, ..Self::default() }
    }

    /// Receive Maximum, with the protocol default applied when absent.
    pub fn effective_receive_maximum(&self) -> u16 {
        self.receive_maximum.unwrap_or(DEFAULT_RECEIVE_MAXIMUM)
    }

    fn decode_properties(&mut self, buf: &mut Bytes) -> Result<(), DecodeError> {
        decode_properties(buf, Self::PACKET_TYPE, |property| {
            match property {
                Property::SessionExpiryInterval(value) => self.session_expiry_interval = Some(value),
                Property::ReceiveMaximum(value) => self.receive_maximum = Some(value),
                Property::MaximumPacketSize(value) => self.maximum_packet_size = Some(value),
                Property::TopicAliasMaximum(value) => self.topic_alias_maximum = Some(value),
                Property::RequestResponseInformation(value) => {
                    self.request_response_information = Some(value);
                }
                Property::RequestProblemInformation(value) => {
                    self.request_problem_information = Some(value);
                }
                Property::UserProperty(value) => self.user_properties.push(value),
                Property::AuthenticationMethod(value) => self.authentication_method = Some(value),
                Property::AuthenticationData(value) => self.authentication_data = Some(value),
                property => return Err(property.invalid_for(Self::PACKET_TYPE)),
            }

            Ok(())
        })?;

        if self.authentication_data.is_some() && self.authentication_method.is_none() {
            return Err(DecodeError::protocol(
                "CONNECT must not include Authentication Data without Authentication Method",
            ));
        }

        Ok(())
    }
}

impl ControlPacket for ConnectPacket {
    const PACKET_TYPE: PacketType = PacketType::Connect;
}

impl DecodablePacket for ConnectPacket {
    fn decode(
        buf: &mut Bytes,
        _flags: u8,
        _limits: &mut ConnectionLimits,
    ) -> Result<Self, DecodeError> {
        // Protocol Name (6), Protocol Version, Connect Flags, Keep Alive (2)
        if buf.remaining() < 10 {
            return Err(DecodeError::remaining_length_too_short(Self::PACKET_TYPE));
        }

        let protocol_name = decode_utf8_string(buf)?;
        if protocol_name != PROTOCOL_NAME {
            return Err(DecodeError::UnsupportedProtocolVersion(format!(
                "Unsupported protocol name: {protocol_name}"
            )));
        }

        let protocol_version = decode_u8(buf)?;
        if protocol_version != PROTOCOL_VERSION {
            return Err(DecodeError::UnsupportedProtocolVersion(format!(
                "Unsupported protocol version: {protocol_version}"
            )));
        }

        let connect_flags = decode_u8(buf)?;

        // Reserved connect flag (last bit) must be set to 0
        if connect_flags & 0x1 != 0x0 {
            return Err(DecodeError::malformed("Connect flags reserved bit must be 0"));
        }

        let clean_start = connect_flags >> 1 & 1 == 1;
        let will_flag = connect_flags >> 2 & 1 == 1;
        let will_qos = connect_flags >> 3 & 0b0000_0011;
        let will_retain = connect_flags >> 5 & 1 == 1;
        let password_flag = connect_flags >> 6 & 1 == 1;
        let user_name_flag = connect_flags >> 7 & 1 == 1;

        // If the will_flag is set to 0, then will_retain must be set to 0
        if !will_flag && will_retain {
            return Err(DecodeError::malformed("Will retain must be 0 if will flag is 0"));
        }

        // If the will_flag is set to 0, then will_qos must be set to 0
        if !will_flag && will_qos != 0 {
            return Err(DecodeError::malformed("Will QoS must be 0 if will flag is 0"));
        }

        let Some(will_qos) = QoS::from_u8(will_qos) else {
            return Err(DecodeError::malformed(format!(
                "Will QoS must be 0, 1 or 2. Got: {will_qos}"
            )));
        };

        let keep_alive = decode_u16(buf)?;

        let mut packet = Self { clean_start, keep_alive, ..Self::default() };
        packet.decode_properties(buf)?;

        packet.client_identifier = decode_utf8_string(buf)?;

        if will_flag {
            let mut will = Will { qos: will_qos, retain: will_retain, ..Will::default() };
            will.decode_properties(buf)?;

            will.topic = decode_utf8_string(buf)?;
            validate_topic_name(&will.topic).map_err(DecodeError::malformed)?;

            will.payload = decode_binary_data(buf)?;
            packet.will = Some(will);
        }

        if user_name_flag {
            packet.user_name = Some(decode_utf8_string(buf)?);
        }

        if password_flag {
            packet.password = Some(decode_binary_data(buf)?);
        }

        Ok(packet)
    }
}

impl EncodablePacket for ConnectPacket {
    fn encode_body(&self, buf: &mut BytesMut, _omit: bool) -> Result<(), EncodeError> {
        encode_utf8_string(buf, PROTOCOL_NAME)?;
        buf.put_u8(PROTOCOL_VERSION);

        let mut connect_flags = u8::from(self.clean_start) << 1;
        if let Some(will) = &self.will {
            connect_flags |= 1 << 2 | will.qos.to_u8() << 3 | u8::from(will.retain) << 5;
        }
        connect_flags |= u8::from(self.password.is_some()) << 6;
        connect_flags |= u8::from(self.user_name.is_some()) << 7;
        buf.put_u8(connect_flags);

        buf.put_u16(self.keep_alive);

        let mut properties = PropertyEncoder::new();
        properties.put_u32(SESSION_EXPIRY_INTERVAL_IDENTIFIER, self.session_expiry_interval);
        properties.put_u16(RECEIVE_MAXIMUM_IDENTIFIER, self.receive_maximum);
        properties.put_u32(MAXIMUM_PACKET_SIZE_IDENTIFIER, self.maximum_packet_size);
        properties.put_u16(TOPIC_ALIAS_MAXIMUM_IDENTIFIER, self.topic_alias_maximum);
        properties
            .put_bool(REQUEST_RESPONSE_INFORMATION_IDENTIFIER, self.request_response_information);
        properties
            .put_bool(REQUEST_PROBLEM_INFORMATION_IDENTIFIER, self.request_problem_information);
        properties.put_user_properties(&self.user_properties)?;
        properties.put_utf8_string(
            AUTHENTICATION_METHOD_IDENTIFIER,
            self.authentication_method.as_deref(),
        )?;
        properties
            .put_binary_data(AUTHENTICATION_DATA_IDENTIFIER, self.authentication_data.as_deref())?;
        properties.finish(buf)?;

        encode_utf8_string(buf, &self.client_identifier)?;

        if let Some(will) = &self.will {
            will.encode(buf)?;
        }

        if let Some(user_name) = &self.user_name {
            encode_utf8_string(buf, user_name)?;
        }

        if let Some(password) = &self.password {
            encode_binary_data(buf, password)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(bytes: &[u8]) -> Result<ConnectPacket, DecodeError> {
        ConnectPacket::decode_packet(
            0,
            Bytes::copy_from_slice(bytes),
            &mut ConnectionLimits::default(),
        )
    }

    /// Protocol Name, Version 5, the given flags and a Keep Alive of 60.
    fn header(connect_flags: u8) -> Vec<u8> {
        vec![0, 4, b'M', b'Q', b'T', b'T', 5, connect_flags, 0, 60]
    }

    #[test]
    fn minimal_connect() {
        let mut bytes = header(0b0000_0010);
        bytes.extend_from_slice(&[0, 0, 2, b'i', b'd']);

        let packet = decode(&bytes).unwrap();
        assert_eq!(packet.client_identifier, "id");
        assert!(packet.clean_start);
        assert_eq!(packet.keep_alive, 60);
        assert!(packet.will.is_none());
    }

    #[test]
    fn will_user_name_and_password() {
        let mut bytes = header(0b1110_1100);
        bytes.extend_from_slice(&[0, 0, 0]);
        // will properties: Will Delay Interval 5
        bytes.extend_from_slice(&[5, 0x18, 0, 0, 0, 5]);
        bytes.extend_from_slice(&[0, 1, b'w', 0, 2, b'h', b'i']);
        bytes.extend_from_slice(&[0, 1, b'u', 0, 1, 0xFF]);

        let packet = decode(&bytes).unwrap();
        let will = packet.will.unwrap();
        assert_eq!(will.topic, "w");
        assert_eq!(will.payload, Bytes::from_static(b"hi"));
        assert_eq!(will.qos, QoS::AtLeastOnce);
        assert!(will.retain);
        assert_eq!(will.delay_interval, Some(5));
        assert_eq!(packet.user_name.as_deref(), Some("u"));
        assert_eq!(packet.password, Some(Bytes::from_static(&[0xFF])));
    }

    #[test]
    fn unsupported_protocol_version() {
        let mut bytes = vec![0, 4, b'M', b'Q', b'T', b'T', 4, 0, 0, 60];
        bytes.extend_from_slice(&[0, 0]);
        assert!(matches!(decode(&bytes), Err(DecodeError::UnsupportedProtocolVersion(_))));

        let mut bytes = vec![0, 4, b'M', b'Q', b'T', b'X', 5, 0, 0, 60];
        bytes.extend_from_slice(&[0, 0, 0]);
        assert!(matches!(decode(&bytes), Err(DecodeError::UnsupportedProtocolVersion(_))));
    }

    #[test]
    fn connect_flag_errors() {
        for flags in [0b0000_0001, 0b0010_0000, 0b0000_1000, 0b0001_1100] {
            let mut bytes = header(flags);
            bytes.extend_from_slice(&[0, 0, 0]);
            assert!(
                matches!(decode(&bytes), Err(DecodeError::MalformedPacket(_))),
                "flags {flags:#010b}"
            );
        }
    }

    #[test]
    fn authentication_data_requires_method() {
        let mut bytes = header(0);
        bytes.extend_from_slice(&[4, 0x16, 0, 1, 0xAA, 0, 0]);
        assert!(matches!(decode(&bytes), Err(DecodeError::ProtocolError(_))));
    }

    #[test]
    fn topic_alias_not_allowed_in_will_properties() {
        let mut bytes = header(0b0000_0100);
        bytes.extend_from_slice(&[0, 0, 0, 3, 0x23, 0, 1, 0, 1, b'w', 0, 0]);
        assert!(matches!(decode(&bytes), Err(DecodeError::ProtocolError(_))));
    }

    #[test]
    fn too_short() {
        assert!(matches!(decode(&[0, 4, b'M', b'Q', b'T', b'T', 5]), Err(DecodeError::MalformedPacket(_))));
    }

    #[test]
    fn encode_then_decode_keeps_will() {
        let mut packet = ConnectPacket::new("client");
        packet.keep_alive = 30;
        packet.request_problem_information = Some(false);
        packet.will = Some(Will::new("last/will", Bytes::from_static(b"bye"), QoS::ExactlyOnce));
        packet.password = Some(Bytes::from_static(b"secret"));

        let mut buf = BytesMut::new();
        packet.encode(&mut buf, &ConnectionLimits::default()).unwrap();
        assert_eq!(buf[0], 0x10);

        let decoded = decode(&buf[2..]).unwrap();
        assert_eq!(decoded, packet);
    }
}

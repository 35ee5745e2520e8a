//! Property list decoding and encoding.
//!
//! Reference: <https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901027>

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{DecodeError, EncodeError};

use super::{
    decoding::{
        decode_binary_data, decode_u16, decode_u32, decode_u8, decode_utf8_string,
        decode_utf8_string_pair, decode_variable_byte_int,
    },
    encoding::{
        encode_binary_data, encode_utf8_string, encode_utf8_string_pair, encode_variable_byte_int,
    },
    mqtt_data::{QoS, UserProperties, UserProperty},
    packet_type::PacketType,
};

pub const PAYLOAD_FORMAT_INDICATOR_IDENTIFIER: u8 = 0x01;
pub const MESSAGE_EXPIRY_INTERVAL_IDENTIFIER: u8 = 0x02;
pub const CONTENT_TYPE_IDENTIFIER: u8 = 0x03;
pub const RESPONSE_TOPIC_IDENTIFIER: u8 = 0x08;
pub const CORRELATION_DATA_IDENTIFIER: u8 = 0x09;
pub const SUBSCRIPTION_IDENTIFIER: u8 = 0x0B;
pub const SESSION_EXPIRY_INTERVAL_IDENTIFIER: u8 = 0x11;
pub const ASSIGNED_CLIENT_IDENTIFIER: u8 = 0x12;
pub const SERVER_KEEP_ALIVE_IDENTIFIER: u8 = 0x13;
pub const AUTHENTICATION_METHOD_IDENTIFIER: u8 = 0x15;
pub const AUTHENTICATION_DATA_IDENTIFIER: u8 = 0x16;
pub const REQUEST_PROBLEM_INFORMATION_IDENTIFIER: u8 = 0x17;
pub const WILL_DELAY_INTERVAL_IDENTIFIER: u8 = 0x18;
pub const REQUEST_RESPONSE_INFORMATION_IDENTIFIER: u8 = 0x19;
pub const RESPONSE_INFORMATION_IDENTIFIER: u8 = 0x1A;
pub const SERVER_REFERENCE_IDENTIFIER: u8 = 0x1C;
pub const REASON_STRING_IDENTIFIER: u8 = 0x1F;
pub const RECEIVE_MAXIMUM_IDENTIFIER: u8 = 0x21;
pub const TOPIC_ALIAS_MAXIMUM_IDENTIFIER: u8 = 0x22;
pub const TOPIC_ALIAS_IDENTIFIER: u8 = 0x23;
pub const MAXIMUM_QOS_IDENTIFIER: u8 = 0x24;
pub const RETAIN_AVAILABLE_IDENTIFIER: u8 = 0x25;
pub const USER_PROPERTY_IDENTIFIER: u8 = 0x26;
pub const MAXIMUM_PACKET_SIZE_IDENTIFIER: u8 = 0x27;
pub const WILDCARD_SUBSCRIPTION_AVAILABLE_IDENTIFIER: u8 = 0x28;
pub const SUBSCRIPTION_IDENTIFIERS_AVAILABLE_IDENTIFIER: u8 = 0x29;
pub const SHARED_SUBSCRIPTION_AVAILABLE_IDENTIFIER: u8 = 0x2A;

/// One decoded property, already checked against the value range the protocol allows for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Property {
    PayloadFormatIndicator(bool),
    MessageExpiryInterval(u32),
    ContentType(String),
    ResponseTopic(String),
    CorrelationData(Bytes),
    SubscriptionIdentifier(u32),
    SessionExpiryInterval(u32),
    AssignedClientIdentifier(String),
    ServerKeepAlive(u16),
    AuthenticationMethod(String),
    AuthenticationData(Bytes),
    RequestProblemInformation(bool),
    WillDelayInterval(u32),
    RequestResponseInformation(bool),
    ResponseInformation(String),
    ServerReference(String),
    ReasonString(String),
    ReceiveMaximum(u16),
    TopicAliasMaximum(u16),
    TopicAlias(u16),
    MaximumQos(QoS),
    RetainAvailable(bool),
    UserProperty(UserProperty),
    MaximumPacketSize(u32),
    WildcardSubscriptionAvailable(bool),
    SubscriptionIdentifiersAvailable(bool),
    SharedSubscriptionAvailable(bool),
}

impl Property {
    /// Decode the value of the property with the given identifier.
    fn decode(identifier: u32, buf: &mut Bytes) -> Result<Self, DecodeError> {
        let Ok(identifier) = u8::try_from(identifier) else {
            return Err(DecodeError::protocol(format!("Invalid property identifier: {identifier}")));
        };

        let property = match identifier {
            PAYLOAD_FORMAT_INDICATOR_IDENTIFIER => {
                Self::PayloadFormatIndicator(decode_bool(buf, "Payload Format Indicator")?)
            }
            MESSAGE_EXPIRY_INTERVAL_IDENTIFIER => Self::MessageExpiryInterval(decode_u32(buf)?),
            CONTENT_TYPE_IDENTIFIER => Self::ContentType(decode_utf8_string(buf)?),
            RESPONSE_TOPIC_IDENTIFIER => Self::ResponseTopic(decode_utf8_string(buf)?),
            CORRELATION_DATA_IDENTIFIER => Self::CorrelationData(decode_binary_data(buf)?),
            SUBSCRIPTION_IDENTIFIER => {
                let value = decode_variable_byte_int(buf)?;
                if value == 0 {
                    return Err(DecodeError::protocol("Subscription Identifier must not be 0"));
                }
                Self::SubscriptionIdentifier(value)
            }
            SESSION_EXPIRY_INTERVAL_IDENTIFIER => Self::SessionExpiryInterval(decode_u32(buf)?),
            ASSIGNED_CLIENT_IDENTIFIER => Self::AssignedClientIdentifier(decode_utf8_string(buf)?),
            SERVER_KEEP_ALIVE_IDENTIFIER => Self::ServerKeepAlive(decode_u16(buf)?),
            AUTHENTICATION_METHOD_IDENTIFIER => {
                Self::AuthenticationMethod(decode_utf8_string(buf)?)
            }
            AUTHENTICATION_DATA_IDENTIFIER => Self::AuthenticationData(decode_binary_data(buf)?),
            REQUEST_PROBLEM_INFORMATION_IDENTIFIER => {
                Self::RequestProblemInformation(decode_bool(buf, "Request Problem Information")?)
            }
            WILL_DELAY_INTERVAL_IDENTIFIER => Self::WillDelayInterval(decode_u32(buf)?),
            REQUEST_RESPONSE_INFORMATION_IDENTIFIER => {
                Self::RequestResponseInformation(decode_bool(buf, "Request Response Information")?)
            }
            RESPONSE_INFORMATION_IDENTIFIER => Self::ResponseInformation(decode_utf8_string(buf)?),
            SERVER_REFERENCE_IDENTIFIER => Self::ServerReference(decode_utf8_string(buf)?),
            REASON_STRING_IDENTIFIER => Self::ReasonString(decode_utf8_string(buf)?),
            RECEIVE_MAXIMUM_IDENTIFIER => {
                let value = decode_u16(buf)?;
                if value == 0 {
                    return Err(DecodeError::protocol("Receive Maximum must not be 0"));
                }
                Self::ReceiveMaximum(value)
            }
            TOPIC_ALIAS_MAXIMUM_IDENTIFIER => Self::TopicAliasMaximum(decode_u16(buf)?),
            TOPIC_ALIAS_IDENTIFIER => {
                let value = decode_u16(buf)?;
                if value == 0 {
                    return Err(DecodeError::TopicAliasInvalid("Topic Alias must not be 0".into()));
                }
                Self::TopicAlias(value)
            }
            MAXIMUM_QOS_IDENTIFIER => {
                let value = decode_u8(buf)?;
                match value {
                    0 => Self::MaximumQos(QoS::AtMostOnce),
                    1 => Self::MaximumQos(QoS::AtLeastOnce),
                    _ => {
                        return Err(DecodeError::protocol(format!(
                            "Maximum QoS must be 0 or 1, got {value}"
                        )))
                    }
                }
            }
            RETAIN_AVAILABLE_IDENTIFIER => {
                Self::RetainAvailable(decode_bool(buf, "Retain Available")?)
            }
            USER_PROPERTY_IDENTIFIER => Self::UserProperty(decode_utf8_string_pair(buf)?),
            MAXIMUM_PACKET_SIZE_IDENTIFIER => {
                let value = decode_u32(buf)?;
                if value == 0 {
                    return Err(DecodeError::protocol("Maximum Packet Size must not be 0"));
                }
                Self::MaximumPacketSize(value)
            }
            WILDCARD_SUBSCRIPTION_AVAILABLE_IDENTIFIER => Self::WildcardSubscriptionAvailable(
                decode_bool(buf, "Wildcard Subscription Available")?,
            ),
            SUBSCRIPTION_IDENTIFIERS_AVAILABLE_IDENTIFIER => Self::SubscriptionIdentifiersAvailable(
                decode_bool(buf, "Subscription Identifiers Available")?,
            ),
            SHARED_SUBSCRIPTION_AVAILABLE_IDENTIFIER => Self::SharedSubscriptionAvailable(
                decode_bool(buf, "Shared Subscription Available")?,
            ),
            _ => {
                return Err(DecodeError::protocol(format!(
                    "Invalid property identifier: {identifier:#04x}"
                )))
            }
        };

        Ok(property)
    }

    pub(crate) fn identifier(&self) -> u8 {
        match self {
            Self::PayloadFormatIndicator(_) => PAYLOAD_FORMAT_INDICATOR_IDENTIFIER,
            Self::MessageExpiryInterval(_) => MESSAGE_EXPIRY_INTERVAL_IDENTIFIER,
            Self::ContentType(_) => CONTENT_TYPE_IDENTIFIER,
            Self::ResponseTopic(_) => RESPONSE_TOPIC_IDENTIFIER,
            Self::CorrelationData(_) => CORRELATION_DATA_IDENTIFIER,
            Self::SubscriptionIdentifier(_) => SUBSCRIPTION_IDENTIFIER,
            Self::SessionExpiryInterval(_) => SESSION_EXPIRY_INTERVAL_IDENTIFIER,
            Self::AssignedClientIdentifier(_) => ASSIGNED_CLIENT_IDENTIFIER,
            Self::ServerKeepAlive(_) => SERVER_KEEP_ALIVE_IDENTIFIER,
            Self::AuthenticationMethod(_) => AUTHENTICATION_METHOD_IDENTIFIER,
            Self::AuthenticationData(_) => AUTHENTICATION_DATA_IDENTIFIER,
            Self::RequestProblemInformation(_) => REQUEST_PROBLEM_INFORMATION_IDENTIFIER,
            Self::WillDelayInterval(_) => WILL_DELAY_INTERVAL_IDENTIFIER,
            Self::RequestResponseInformation(_) => REQUEST_RESPONSE_INFORMATION_IDENTIFIER,
            Self::ResponseInformation(_) => RESPONSE_INFORMATION_IDENTIFIER,
            Self::ServerReference(_) => SERVER_REFERENCE_IDENTIFIER,
            Self::ReasonString(_) => REASON_STRING_IDENTIFIER,
            Self::ReceiveMaximum(_) => RECEIVE_MAXIMUM_IDENTIFIER,
            Self::TopicAliasMaximum(_) => TOPIC_ALIAS_MAXIMUM_IDENTIFIER,
            Self::TopicAlias(_) => TOPIC_ALIAS_IDENTIFIER,
            Self::MaximumQos(_) => MAXIMUM_QOS_IDENTIFIER,
            Self::RetainAvailable(_) => RETAIN_AVAILABLE_IDENTIFIER,
            Self::UserProperty(_) => USER_PROPERTY_IDENTIFIER,
            Self::MaximumPacketSize(_) => MAXIMUM_PACKET_SIZE_IDENTIFIER,
            Self::WildcardSubscriptionAvailable(_) => WILDCARD_SUBSCRIPTION_AVAILABLE_IDENTIFIER,
            Self::SubscriptionIdentifiersAvailable(_) => {
                SUBSCRIPTION_IDENTIFIERS_AVAILABLE_IDENTIFIER
            }
            Self::SharedSubscriptionAvailable(_) => SHARED_SUBSCRIPTION_AVAILABLE_IDENTIFIER,
        }
    }

    pub(crate) fn name(&self) -> &'static str {
        match self {
            Self::PayloadFormatIndicator(_) => "Payload Format Indicator",
            Self::MessageExpiryInterval(_) => "Message Expiry Interval",
            Self::ContentType(_) => "Content Type",
            Self::ResponseTopic(_) => "Response Topic",
            Self::CorrelationData(_) => "Correlation Data",
            Self::SubscriptionIdentifier(_) => "Subscription Identifier",
            Self::SessionExpiryInterval(_) => "Session Expiry Interval",
            Self::AssignedClientIdentifier(_) => "Assigned Client Identifier",
            Self::ServerKeepAlive(_) => "Server Keep Alive",
            Self::AuthenticationMethod(_) => "Authentication Method",
            Self::AuthenticationData(_) => "Authentication Data",
            Self::RequestProblemInformation(_) => "Request Problem Information",
            Self::WillDelayInterval(_) => "Will Delay Interval",
            Self::RequestResponseInformation(_) => "Request Response Information",
            Self::ResponseInformation(_) => "Response Information",
            Self::ServerReference(_) => "Server Reference",
            Self::ReasonString(_) => "Reason String",
            Self::ReceiveMaximum(_) => "Receive Maximum",
            Self::TopicAliasMaximum(_) => "Topic Alias Maximum",
            Self::TopicAlias(_) => "Topic Alias",
            Self::MaximumQos(_) => "Maximum QoS",
            Self::RetainAvailable(_) => "Retain Available",
            Self::UserProperty(_) => "User Property",
            Self::MaximumPacketSize(_) => "Maximum Packet Size",
            Self::WildcardSubscriptionAvailable(_) => "Wildcard Subscription Available",
            Self::SubscriptionIdentifiersAvailable(_) => "Subscription Identifiers Available",
            Self::SharedSubscriptionAvailable(_) => "Shared Subscription Available",
        }
    }

    /// Whether the property may occur more than once in a packet of the given type.
    fn is_repeatable(&self, packet_type: PacketType) -> bool {
        match self {
            Self::UserProperty(_) => true,
            Self::SubscriptionIdentifier(_) => packet_type == PacketType::Publish,
            _ => false,
        }
    }

    /// The error a packet handler returns for a property its packet type does not allow.
    pub(crate) fn invalid_for(&self, packet_type: PacketType) -> DecodeError {
        DecodeError::invalid_property(packet_type, self.name())
    }
}

fn decode_bool(buf: &mut Bytes, name: &str) -> Result<bool, DecodeError> {
    match decode_u8(buf)? {
        0 => Ok(false),
        1 => Ok(true),
        value => Err(DecodeError::protocol(format!("{name} must be 0 or 1, got {value}"))),
    }
}

/// Decode a property list and hand every property to `handle`, in wire order.
///
/// Reads the Property Length, then exactly that many bytes of properties. Duplicates of
/// properties that may only occur once are rejected here; `handle` rejects the properties
/// its packet type does not allow (see [`Property::invalid_for`]).
///
/// # Errors
/// - `DecodeError::MalformedPacket` if the Property Length exceeds the remaining bytes or a
///   property runs past the declared end.
/// - `DecodeError::ProtocolError` for unknown identifiers, duplicates and out-of-range values.
pub(crate) fn decode_properties<F>(
    buf: &mut Bytes,
    packet_type: PacketType,
    mut handle: F,
) -> Result<(), DecodeError>
where
    F: FnMut(Property) -> Result<(), DecodeError>,
{
    let len = decode_variable_byte_int(buf)? as usize;
    if len > buf.remaining() {
        return Err(DecodeError::malformed(format!(
            "{packet_type} property length {len} exceeds the remaining {} bytes",
            buf.remaining()
        )));
    }

    let mut properties = buf.split_to(len);

    // Bit n is set once the property with identifier n has been seen
    let mut seen = 0u64;

    while properties.has_remaining() {
        let identifier = decode_variable_byte_int(&mut properties)?;
        let property = Property::decode(identifier, &mut properties)?;

        if !property.is_repeatable(packet_type) {
            let mask = 1u64 << property.identifier();
            if seen & mask != 0 {
                return Err(DecodeError::protocol(format!(
                    "{packet_type} must not include {} more than once",
                    property.name()
                )));
            }
            seen |= mask;
        }

        handle(property)?;
    }

    Ok(())
}

/// Collects properties for an outgoing packet.
///
/// Properties are written in call order. The list is prefixed with its length by
/// [`PropertyEncoder::finish`].
#[derive(Debug, Default)]
pub(crate) struct PropertyEncoder {
    buf: BytesMut,
}

impl PropertyEncoder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn put_u8(&mut self, identifier: u8, value: Option<u8>) {
        if let Some(value) = value {
            self.buf.put_u8(identifier);
            self.buf.put_u8(value);
        }
    }

    pub(crate) fn put_bool(&mut self, identifier: u8, value: Option<bool>) {
        self.put_u8(identifier, value.map(u8::from));
    }

    pub(crate) fn put_u16(&mut self, identifier: u8, value: Option<u16>) {
        if let Some(value) = value {
            self.buf.put_u8(identifier);
            self.buf.put_u16(value);
        }
    }

    pub(crate) fn put_u32(&mut self, identifier: u8, value: Option<u32>) {
        if let Some(value) = value {
            self.buf.put_u8(identifier);
            self.buf.put_u32(value);
        }
    }

    pub(crate) fn put_variable_byte_int(
        &mut self,
        identifier: u8,
        value: u32,
    ) -> Result<(), EncodeError> {
        self.buf.put_u8(identifier);
        encode_variable_byte_int(&mut self.buf, value as usize)
    }

    pub(crate) fn put_utf8_string(
        &mut self,
        identifier: u8,
        value: Option<&str>,
    ) -> Result<(), EncodeError> {
        if let Some(value) = value {
            self.buf.put_u8(identifier);
            encode_utf8_string(&mut self.buf, value)?;
        }

        Ok(())
    }

    pub(crate) fn put_binary_data(
        &mut self,
        identifier: u8,
        value: Option<&[u8]>,
    ) -> Result<(), EncodeError> {
        if let Some(value) = value {
            self.buf.put_u8(identifier);
            encode_binary_data(&mut self.buf, value)?;
        }

        Ok(())
    }

    pub(crate) fn put_user_properties(
        &mut self,
        user_properties: &UserProperties,
    ) -> Result<(), EncodeError> {
        for property in user_properties {
            self.buf.put_u8(USER_PROPERTY_IDENTIFIER);
            encode_utf8_string_pair(&mut self.buf, property)?;
        }

        Ok(())
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Write Property Length followed by the properties.
    pub(crate) fn finish(self, out: &mut BytesMut) -> Result<(), EncodeError> {
        encode_variable_byte_int(out, self.buf.len())?;
        out.extend_from_slice(&self.buf);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(bytes: &'static [u8], packet_type: PacketType) -> Result<Vec<Property>, DecodeError> {
        let mut buf = Bytes::from_static(bytes);
        let mut properties = Vec::new();
        decode_properties(&mut buf, packet_type, |property| {
            properties.push(property);
            Ok(())
        })?;
        assert!(buf.is_empty());
        Ok(properties)
    }

    #[test]
    fn empty_property_list() {
        assert_eq!(collect(&[0], PacketType::PubAck), Ok(vec![]));
    }

    #[test]
    fn user_properties_repeat_in_order() {
        let properties = collect(
            &[14, 0x26, 0, 1, b'a', 0, 1, b'1', 0x26, 0, 1, b'a', 0, 1, b'2'],
            PacketType::PubAck,
        )
        .unwrap();
        assert_eq!(
            properties,
            vec![
                Property::UserProperty(UserProperty::new("a", "1")),
                Property::UserProperty(UserProperty::new("a", "2")),
            ]
        );
    }

    #[test]
    fn user_property_cut_by_declared_length_is_malformed() {
        let mut buf = Bytes::from_static(&[
            10, 0x26, 0, 1, b'a', 0, 1, b'1', 0x26, 0, 1, b'a', 0, 1, b'2',
        ]);
        let result = decode_properties(&mut buf, PacketType::PubAck, |_| Ok(()));
        assert!(matches!(result, Err(DecodeError::MalformedPacket(_))));
    }

    #[test]
    fn duplicate_single_value_property() {
        let result = collect(&[6, 0x13, 0, 10, 0x13, 0, 10], PacketType::ConnAck);
        assert!(matches!(result, Err(DecodeError::ProtocolError(_))));
    }

    #[test]
    fn subscription_identifier_repeats_only_in_publish() {
        let bytes: &'static [u8] = &[4, 0x0B, 1, 0x0B, 2];
        assert_eq!(
            collect(bytes, PacketType::Publish),
            Ok(vec![Property::SubscriptionIdentifier(1), Property::SubscriptionIdentifier(2)])
        );
        assert!(matches!(
            collect(bytes, PacketType::Subscribe),
            Err(DecodeError::ProtocolError(_))
        ));
    }

    #[test]
    fn unknown_identifier_is_protocol_error() {
        assert!(matches!(collect(&[2, 0x7F, 0], PacketType::PubAck), Err(DecodeError::ProtocolError(_))));
    }

    #[test]
    fn property_running_past_declared_length_is_malformed() {
        // Server Keep Alive needs 3 bytes, only 2 declared
        let mut buf = Bytes::from_static(&[2, 0x13, 0, 10]);
        let result = decode_properties(&mut buf, PacketType::ConnAck, |_| Ok(()));
        assert!(matches!(result, Err(DecodeError::MalformedPacket(_))));
    }

    #[test]
    fn declared_length_beyond_input_is_malformed() {
        assert!(matches!(
            collect(&[4, 0x13, 0, 10], PacketType::ConnAck),
            Err(DecodeError::MalformedPacket(_))
        ));
    }

    #[test]
    fn range_checks() {
        assert!(matches!(collect(&[3, 0x21, 0, 0], PacketType::ConnAck), Err(DecodeError::ProtocolError(_))));
        assert!(matches!(collect(&[2, 0x24, 2], PacketType::ConnAck), Err(DecodeError::ProtocolError(_))));
        assert!(matches!(collect(&[2, 0x25, 2], PacketType::ConnAck), Err(DecodeError::ProtocolError(_))));
        assert!(matches!(collect(&[5, 0x27, 0, 0, 0, 0], PacketType::ConnAck), Err(DecodeError::ProtocolError(_))));
        assert!(matches!(collect(&[3, 0x23, 0, 0], PacketType::Publish), Err(DecodeError::TopicAliasInvalid(_))));
    }

    #[test]
    fn encoder_writes_length_prefix() {
        let mut encoder = PropertyEncoder::new();
        encoder.put_u16(SERVER_KEEP_ALIVE_IDENTIFIER, Some(10));
        encoder.put_u32(SESSION_EXPIRY_INTERVAL_IDENTIFIER, None);
        encoder.put_bool(RETAIN_AVAILABLE_IDENTIFIER, Some(false));
        encoder.put_utf8_string(REASON_STRING_IDENTIFIER, Some("ok")).unwrap();

        let mut out = BytesMut::new();
        encoder.finish(&mut out).unwrap();

        assert_eq!(&out[..], &[10, 0x13, 0, 10, 0x25, 0, 0x1F, 0, 2, b'o', b'k']);
    }
}

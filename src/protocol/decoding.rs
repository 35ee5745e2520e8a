use bytes::{Buf, Bytes};

use crate::error::DecodeError;

use super::{mqtt_data::UserProperty, validation::validate_utf8_string};

/// The first byte and the decoded Remaining Length of a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedHeader {
    /// Packet type (4 MSB) and flags (4 LSB).
    pub first_byte: u8,

    /// Number of bytes following the fixed header.
    pub remaining_len: usize,

    /// Size of the fixed header itself (1 to 5 bytes).
    pub header_len: usize,
}

impl FixedHeader {
    /// Size of the whole packet, fixed header included.
    pub fn packet_size(&self) -> usize {
        self.header_len + self.remaining_len
    }
}

/// Decode the fixed header at the start of `buf`.
///
/// Returns `Ok(None)` if `buf` does not hold a complete fixed header yet. The packet body is
/// not required to be available.
///
/// # Errors
/// - Returns `DecodeError::MalformedPacket` if the Remaining Length is longer than 4 bytes.
pub fn decode_fixed_header(buf: &[u8]) -> Result<Option<FixedHeader>, DecodeError> {
    let Some((&first_byte, rest)) = buf.split_first() else {
        return Ok(None);
    };

    let mut multiplier = 1;
    let mut remaining_len = 0;

    for (i, &encoded_byte) in rest.iter().enumerate() {
        remaining_len += (encoded_byte & 127) as usize * multiplier;

        if encoded_byte & 128 == 0 {
            return Ok(Some(FixedHeader { first_byte, remaining_len, header_len: 2 + i }));
        }

        if multiplier == 128 * 128 * 128 {
            return Err(DecodeError::malformed("Malformed remaining length"));
        }

        multiplier *= 128;
    }

    Ok(None)
}

/// Decode a variable byte integer.
///
/// Reference: <https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901011>
///
/// **Specification:**
///
/// ```text
/// multiplier = 1
/// value = 0
/// do
///    encodedByte = 'next byte from stream'
///    value += (encodedByte AND 127) * multiplier
///    if (multiplier > 128*128*128)
///       throw Error(Malformed Variable Byte Integer)
///    multiplier *= 128
/// while ((encodedByte AND 128) != 0)
/// ```
///
/// # Errors
/// - Returns `DecodeError::MalformedPacket` if the input ends mid-sequence or a fifth byte is announced.
pub(crate) fn decode_variable_byte_int(buf: &mut Bytes) -> Result<u32, DecodeError> {
    let mut multiplier = 1;
    let mut decoded_value = 0;

    loop {
        if !buf.has_remaining() {
            return Err(DecodeError::malformed("Unable to read variable byte integer"));
        }
        let encoded_byte = buf.get_u8();

        // Take the 7 least significant bits
        decoded_value += u32::from(encoded_byte & 127) * multiplier;

        // If the continuation bit is not set, we are done
        if encoded_byte & 128 == 0 {
            break;
        }

        if multiplier == 128 * 128 * 128 {
            return Err(DecodeError::malformed("Malformed variable byte integer"));
        }

        multiplier *= 128;
    }

    Ok(decoded_value)
}

fn ensure_remaining(buf: &Bytes, len: usize, what: &str) -> Result<(), DecodeError> {
    if buf.remaining() < len {
        return Err(DecodeError::malformed(format!(
            "Failed to read {what}: {len} bytes needed, {} left",
            buf.remaining()
        )));
    }

    Ok(())
}

/// Decode a 1-byte unsigned integer.
///
/// Reference: <https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901007>
pub(crate) fn decode_u8(buf: &mut Bytes) -> Result<u8, DecodeError> {
    ensure_remaining(buf, 1, "u8")?;
    Ok(buf.get_u8())
}

/// Decode a 2-byte unsigned integer.
///
/// Reference: <https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901008>
pub(crate) fn decode_u16(buf: &mut Bytes) -> Result<u16, DecodeError> {
    ensure_remaining(buf, 2, "u16")?;
    Ok(buf.get_u16())
}

/// Decode a 4-byte unsigned integer.
///
/// Reference: <https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901009>
pub(crate) fn decode_u32(buf: &mut Bytes) -> Result<u32, DecodeError> {
    ensure_remaining(buf, 4, "u32")?;
    Ok(buf.get_u32())
}

/// Decode a UTF-8 string.
///
/// Reference: <https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901010>
///
/// **Specification:**
/// - Length is a two-byte integer representing the size of the following string.
/// - String must be well-formed UTF-8 without U+0000.
///
/// # Errors
/// - Returns `DecodeError::MalformedPacket` if reading fails or the string is not a valid MQTT string.
pub(crate) fn decode_utf8_string(buf: &mut Bytes) -> Result<String, DecodeError> {
    let len = decode_u16(buf)? as usize;
    ensure_remaining(buf, len, "UTF-8 string data")?;

    let encoded_value = buf.split_to(len);
    let value = std::str::from_utf8(&encoded_value)
        .map_err(|_| DecodeError::malformed("String is not valid UTF-8"))?;

    validate_utf8_string(value).map_err(DecodeError::malformed)?;

    Ok(value.to_owned())
}

/// Decode binary data.
///
/// Reference: <https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901012>
///
/// The returned `Bytes` shares the packet buffer.
pub(crate) fn decode_binary_data(buf: &mut Bytes) -> Result<Bytes, DecodeError> {
    let len = decode_u16(buf)? as usize;
    ensure_remaining(buf, len, "binary data")?;

    Ok(buf.split_to(len))
}

/// Decode a UTF-8 String Pair.
///
/// Reference: <https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901013>
pub(crate) fn decode_utf8_string_pair(buf: &mut Bytes) -> Result<UserProperty, DecodeError> {
    let name = decode_utf8_string(buf)?;
    let value = decode_utf8_string(buf)?;

    Ok(UserProperty { name, value })
}

use bytes::{BufMut, BytesMut};

use crate::{
    constants::{MAX_REMAINING_LENGTH, MAX_STRING_LENGTH},
    error::EncodeError,
};

use super::mqtt_data::UserProperty;

/// Number of bytes the variable byte integer encoding of `value` occupies.
pub(crate) fn variable_byte_int_len(value: usize) -> usize {
    match value {
        0..=127 => 1,
        128..=16_383 => 2,
        16_384..=2_097_151 => 3,
        _ => 4,
    }
}

/// Encode a variable byte integer.
///
/// Reference: <https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901011>
///
/// **Specification:**
///
/// ```text
/// do
///    encodedByte = X MOD 128
///    X = X DIV 128
///    // if there are more data to encode, set the top bit of this byte
///    if (X > 0)
///       encodedByte = encodedByte OR 128
///    endif
///    'output' encodedByte
/// while (X > 0)
/// ```
///
/// # Errors
/// - Returns `EncodeError::VariableByteIntOverflow` if the value needs more than 4 bytes.
pub(crate) fn encode_variable_byte_int(buf: &mut BytesMut, value: usize) -> Result<(), EncodeError> {
    if value > MAX_REMAINING_LENGTH {
        return Err(EncodeError::VariableByteIntOverflow(value));
    }

    let mut value = value;
    loop {
        // Extract the 7 least significant bits from the current value
        let mut encoded_byte = (value % 128) as u8;

        // The remaining bits will be processed in the next iteration
        value /= 128;

        // If there are still remaining bits, mark this byte as continuation
        if value > 0 {
            encoded_byte |= 128;
        }

        buf.put_u8(encoded_byte);

        if value == 0 {
            return Ok(());
        }
    }
}

/// Encode a UTF-8 string.
///
/// Reference: <https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901010>
///
/// # Errors
/// - Returns an error if the string is longer than 65,535 bytes or contains U+0000.
pub(crate) fn encode_utf8_string(buf: &mut BytesMut, value: &str) -> Result<(), EncodeError> {
    // MQTT requires that the length of the string must fit within 2 bytes (0 to 65_535).
    let len = u16::try_from(value.len()).map_err(|_| EncodeError::StringTooLong(value.len()))?;

    if value.contains('\0') {
        return Err(EncodeError::NullCharacter);
    }

    buf.put_u16(len);
    buf.put_slice(value.as_bytes());

    Ok(())
}

/// Encode binary data.
///
/// Reference: <https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901012>
pub(crate) fn encode_binary_data(buf: &mut BytesMut, value: &[u8]) -> Result<(), EncodeError> {
    if value.len() > MAX_STRING_LENGTH {
        return Err(EncodeError::BinaryDataTooLong(value.len()));
    }

    buf.put_u16(value.len() as u16);
    buf.put_slice(value);

    Ok(())
}

/// Encode a UTF-8 String Pair.
///
/// Reference: <https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901013>
pub(crate) fn encode_utf8_string_pair(
    buf: &mut BytesMut,
    property: &UserProperty,
) -> Result<(), EncodeError> {
    // UTF-8 String Pair are composed by:
    // - 2-byte name length
    // - name
    // - 2-byte value length
    // - value
    encode_utf8_string(buf, &property.name)?;
    encode_utf8_string(buf, &property.value)
}

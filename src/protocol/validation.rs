use crate::constants::MAX_STRING_LENGTH;

/// Validates a UTF-8 string based on MQTT protocol requirements.
///
/// Reference: <https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901010>
///
/// **Requirements:**
/// - Length must be ≤ `MAX_STRING_LENGTH`.
/// - Must not contain U+0000.
///
/// Code points between U+D800 and U+DFFF cannot occur in a `str`. Control characters and
/// non-characters are only discouraged by the protocol and are accepted.
pub(crate) fn validate_utf8_string(value: &str) -> Result<(), String> {
    let len = value.len();
    if len > MAX_STRING_LENGTH {
        return Err(format!(
            "String length {len} exceeds maximum allowed size of {MAX_STRING_LENGTH} bytes"
        ));
    }

    if value.contains('\0') {
        return Err("String must not contain the null character".to_string());
    }

    Ok(())
}

/// Validates a Topic Name (as carried by PUBLISH, Will Topic and Response Topic).
///
/// Reference: <https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901247>
pub(crate) fn validate_topic_name(value: &str) -> Result<(), String> {
    if value.contains(['+', '#']) {
        return Err(format!("Topic name must not contain wildcard characters: {value}"));
    }

    Ok(())
}

/// Validates a Topic Filter (as carried by SUBSCRIBE and UNSUBSCRIBE).
///
/// Only the structural rules are checked here; matching filters against topics is the job of
/// the session layer.
pub(crate) fn validate_topic_filter(value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Err("Topic filter must be at least one character long".to_string());
    }

    let mut levels = value.split('/').peekable();
    while let Some(level) = levels.next() {
        if level.contains('#') && (level != "#" || levels.peek().is_some()) {
            return Err(format!("Multi-level wildcard must be the last level: {value}"));
        }

        if level.contains('+') && level != "+" {
            return Err(format!("Single-level wildcard must occupy an entire level: {value}"));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_null_character() {
        assert!(validate_utf8_string("a\0b").is_err());
        assert!(validate_utf8_string("").is_ok());
    }

    #[test]
    fn rejects_oversized_string() {
        assert!(validate_utf8_string(&"a".repeat(MAX_STRING_LENGTH)).is_ok());
        assert!(validate_utf8_string(&"a".repeat(MAX_STRING_LENGTH + 1)).is_err());
    }

    #[test]
    fn topic_name_has_no_wildcards() {
        assert!(validate_topic_name("sport/tennis/player1").is_ok());
        assert!(validate_topic_name("sport/+/player1").is_err());
        assert!(validate_topic_name("sport/#").is_err());
    }

    #[test]
    fn topic_filter_wildcard_placement() {
        assert!(validate_topic_filter("sport/tennis/#").is_ok());
        assert!(validate_topic_filter("#").is_ok());
        assert!(validate_topic_filter("+/tennis/+").is_ok());
        assert!(validate_topic_filter("sport/tennis#").is_err());
        assert!(validate_topic_filter("sport/#/ranking").is_err());
        assert!(validate_topic_filter("sport+").is_err());
        assert!(validate_topic_filter("").is_err());
    }
}

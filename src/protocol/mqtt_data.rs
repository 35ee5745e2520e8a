use std::{fmt, slice};

/// Quality of Service levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum QoS {
    #[default]
    AtMostOnce = 0,
    AtLeastOnce = 1,
    ExactlyOnce = 2,
}

impl QoS {
    /// Converts a numeric value to a `QoS`.
    ///
    /// Returns `None` for 3, which is reserved.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::AtMostOnce),
            1 => Some(Self::AtLeastOnce),
            2 => Some(Self::ExactlyOnce),
            _ => None,
        }
    }

    /// Converts the `QoS` to its numeric value.
    pub fn to_u8(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for QoS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QoS {}", self.to_u8())
    }
}

/// A UTF-8 String Pair carried by the User Property.
///
/// Reference: <https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901013>
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserProperty {
    pub name: String,
    pub value: String,
}

impl UserProperty {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self { name: name.into(), value: value.into() }
    }
}

/// User Properties in the order they appeared on the wire.
///
/// The same name is allowed to appear more than once, so this is a list rather than a map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserProperties(Vec<UserProperty>);

impl UserProperties {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, property: UserProperty) {
        self.0.push(property);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> slice::Iter<'_, UserProperty> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[UserProperty] {
        &self.0
    }

    /// Values of every property with the given name, in order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.0.iter().filter(move |p| p.name == name).map(|p| p.value.as_str())
    }
}

impl FromIterator<UserProperty> for UserProperties {
    fn from_iter<T: IntoIterator<Item = UserProperty>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a UserProperties {
    type Item = &'a UserProperty;
    type IntoIter = slice::Iter<'a, UserProperty>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_properties_keep_order_and_duplicates() {
        let properties: UserProperties = [
            UserProperty::new("test", "value"),
            UserProperty::new("other", "x"),
            UserProperty::new("test", "value2"),
        ]
        .into_iter()
        .collect();

        assert_eq!(properties.len(), 3);
        assert_eq!(properties.get_all("test").collect::<Vec<_>>(), vec!["value", "value2"]);
        assert_eq!(properties.as_slice()[1], UserProperty::new("other", "x"));
    }

    #[test]
    fn qos_three_is_reserved() {
        assert_eq!(QoS::from_u8(2), Some(QoS::ExactlyOnce));
        assert_eq!(QoS::from_u8(3), None);
    }
}

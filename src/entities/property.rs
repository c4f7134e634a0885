use crate::net::cursor::ByteCursor;
use crate::net::type_hash::type_hash;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyName {
    Name(String),
    /// Already hashed; written as a 32-bit value in every protocol version.
    Hashed(u32),
}

impl PropertyName {
    pub fn matches(&self, name: &str) -> bool {
        match self {
            PropertyName::Name(own) => own.eq_ignore_ascii_case(name),
            PropertyName::Hashed(hash) => *hash == type_hash(name),
        }
    }

    pub fn write(&self, cursor: &mut ByteCursor, use_hashes: bool) {
        match self {
            PropertyName::Name(name) if use_hashes => cursor.write_u32(type_hash(name)),
            PropertyName::Name(name) => cursor.write_cstring(name),
            PropertyName::Hashed(hash) => cursor.write_u32(*hash),
        }
    }
}

impl From<&str> for PropertyName {
    fn from(value: &str) -> Self {
        PropertyName::Name(value.to_string())
    }
}

impl From<String> for PropertyName {
    fn from(value: String) -> Self {
        PropertyName::Name(value)
    }
}

impl From<u32> for PropertyName {
    fn from(value: u32) -> Self {
        PropertyName::Hashed(value)
    }
}

/// The closed set of values the client can decode in a property slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    String(String),
    U8(u8),
    U16(u16),
    U32(u32),
}

impl PropertyValue {
    pub fn kind(&self) -> &'static str {
        match self {
            PropertyValue::String(_) => "string",
            PropertyValue::U8(_) => "u8",
            PropertyValue::U16(_) => "u16",
            PropertyValue::U32(_) => "u32",
        }
    }

    pub fn write(&self, cursor: &mut ByteCursor) {
        match self {
            PropertyValue::String(value) => cursor.write_cstring(value),
            PropertyValue::U8(value) => cursor.write_u8(*value),
            PropertyValue::U16(value) => cursor.write_u16(*value),
            PropertyValue::U32(value) => cursor.write_u32(*value),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(value) => Some(value),
            _ => None,
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::String(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::String(value)
    }
}

impl From<u8> for PropertyValue {
    fn from(value: u8) -> Self {
        PropertyValue::U8(value)
    }
}

impl From<u16> for PropertyValue {
    fn from(value: u16) -> Self {
        PropertyValue::U16(value)
    }
}

impl From<u32> for PropertyValue {
    fn from(value: u32) -> Self {
        PropertyValue::U32(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PropertyError {
    #[error("unsupported property value type: {0}")]
    UnsupportedValueType(String),
    #[error("value {value} does not fit a {kind} property")]
    OutOfRange { value: i64, kind: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    pub name: PropertyName,
    pub value: PropertyValue,
}

impl Property {
    pub fn new(name: impl Into<PropertyName>, value: impl Into<PropertyValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn string(name: impl Into<PropertyName>, value: impl Into<String>) -> Self {
        Self::new(name, PropertyValue::String(value.into()))
    }

    pub fn u32(name: impl Into<PropertyName>, value: u32) -> Self {
        Self::new(name, PropertyValue::U32(value))
    }

    pub fn u16(name: impl Into<PropertyName>, value: u16) -> Self {
        Self::new(name, PropertyValue::U16(value))
    }

    pub fn u8(name: impl Into<PropertyName>, value: u8) -> Self {
        Self::new(name, PropertyValue::U8(value))
    }

    pub fn write(&self, cursor: &mut ByteCursor, use_hashes: bool) {
        self.name.write(cursor, use_hashes);
        self.value.write(cursor);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::cursor::Endian;

    #[test]
    fn string_name_switches_to_hash() {
        let property = Property::u32("hp", 100);

        let mut plain = ByteCursor::with_capacity(Endian::Little, 16);
        property.write(&mut plain, false);
        assert_eq!(plain.data(), &[b'h', b'p', 0, 100, 0, 0, 0]);

        let mut hashed = ByteCursor::with_capacity(Endian::Little, 16);
        property.write(&mut hashed, true);
        assert_eq!(hashed.data(), &[0x70, 0x21, 0x54, 0x00, 100, 0, 0, 0]);
    }

    #[test]
    fn prehashed_name_is_always_u32() {
        let property = Property::u8(0x0102_0304u32, 7);
        let mut cursor = ByteCursor::with_capacity(Endian::Big, 8);
        property.write(&mut cursor, false);
        assert_eq!(cursor.data(), &[0x01, 0x02, 0x03, 0x04, 0x07]);
    }

    #[test]
    fn value_widths() {
        let mut cursor = ByteCursor::with_capacity(Endian::Little, 16);
        PropertyValue::U8(1).write(&mut cursor);
        PropertyValue::U16(2).write(&mut cursor);
        PropertyValue::U32(3).write(&mut cursor);
        PropertyValue::from("ok").write(&mut cursor);
        assert_eq!(cursor.data(), &[1, 2, 0, 3, 0, 0, 0, b'o', b'k', 0]);
    }

    #[test]
    fn name_matching_is_case_insensitive() {
        assert!(PropertyName::from("MaxHP").matches("maxhp"));
        assert!(PropertyName::Hashed(type_hash("Level")).matches("LEVEL"));
        assert!(!PropertyName::from("hp").matches("mp"));
    }
}

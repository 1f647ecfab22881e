use time::OffsetDateTime;

use super::{TTLVBytesDeserializer, TTLVBytesSerializer, error::TtlvError};
use crate::kmip_1_4::kmip_types::Tag;

/// A KMIP Tag-Type-Length-Value item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TTLV {
    pub tag: Tag,
    pub value: TTLValue,
}

impl TTLV {
    #[must_use]
    pub const fn new(tag: Tag, value: TTLValue) -> Self {
        Self { tag, value }
    }

    #[must_use]
    pub const fn structure(tag: Tag, items: Vec<Self>) -> Self {
        Self::new(tag, TTLValue::Structure(items))
    }

    #[must_use]
    pub const fn integer(tag: Tag, value: i32) -> Self {
        Self::new(tag, TTLValue::Integer(value))
    }

    #[must_use]
    pub const fn long_integer(tag: Tag, value: i64) -> Self {
        Self::new(tag, TTLValue::LongInteger(value))
    }

    #[must_use]
    pub const fn enumeration(tag: Tag, value: u32) -> Self {
        Self::new(tag, TTLValue::Enumeration(value))
    }

    #[must_use]
    pub const fn boolean(tag: Tag, value: bool) -> Self {
        Self::new(tag, TTLValue::Boolean(value))
    }

    #[must_use]
    pub fn text(tag: Tag, value: impl Into<String>) -> Self {
        Self::new(tag, TTLValue::TextString(value.into()))
    }

    #[must_use]
    pub fn bytes(tag: Tag, value: impl Into<Vec<u8>>) -> Self {
        Self::new(tag, TTLValue::ByteString(value.into()))
    }

    #[must_use]
    pub const fn date_time(tag: Tag, value: OffsetDateTime) -> Self {
        Self::new(tag, TTLValue::DateTime(value))
    }

    #[must_use]
    pub const fn interval(tag: Tag, value: u32) -> Self {
        Self::new(tag, TTLValue::Interval(value))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, TtlvError> {
        let mut writer = Vec::new();
        TTLVBytesSerializer::new(&mut writer).write_ttlv(self)?;
        Ok(writer)
    }

    /// Decode exactly one TTLV item from `bytes`
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TtlvError> {
        let (ttlv, consumed) = TTLVBytesDeserializer::new(bytes).read_ttlv()?;
        if consumed != bytes.len() {
            return Err(TtlvError::from(format!(
                "Trailing bytes after TTLV item: {} unread",
                bytes.len() - consumed
            )));
        }
        Ok(ttlv)
    }

    /// The items of a structure, or an error for any other type
    pub fn as_structure(&self) -> Result<&[Self], TtlvError> {
        match &self.value {
            TTLValue::Structure(items) => Ok(items),
            v => Err(self.type_error("Structure", v)),
        }
    }

    /// First direct child with the given tag.
    /// Always `None` when `self` is not a structure.
    #[must_use]
    pub fn child(&self, tag: Tag) -> Option<&Self> {
        self.children(tag).next()
    }

    /// All direct children with the given tag, in order
    pub fn children(&self, tag: Tag) -> impl Iterator<Item = &Self> {
        let items: &[Self] = match &self.value {
            TTLValue::Structure(items) => items,
            _ => &[],
        };
        items.iter().filter(move |item| item.tag == tag)
    }

    /// Like [`TTLV::child`] but a missing child is an error
    pub fn require(&self, tag: Tag) -> Result<&Self, TtlvError> {
        self.child(tag)
            .ok_or_else(|| TtlvError::from(format!("Missing {tag} in {}", self.tag)))
    }

    pub fn as_integer(&self) -> Result<i32, TtlvError> {
        match &self.value {
            TTLValue::Integer(v) => Ok(*v),
            v => Err(self.type_error("Integer", v)),
        }
    }

    pub fn as_long_integer(&self) -> Result<i64, TtlvError> {
        match &self.value {
            TTLValue::LongInteger(v) => Ok(*v),
            v => Err(self.type_error("LongInteger", v)),
        }
    }

    pub fn as_enum(&self) -> Result<u32, TtlvError> {
        match &self.value {
            TTLValue::Enumeration(v) => Ok(*v),
            v => Err(self.type_error("Enumeration", v)),
        }
    }

    pub fn as_bool(&self) -> Result<bool, TtlvError> {
        match &self.value {
            TTLValue::Boolean(v) => Ok(*v),
            v => Err(self.type_error("Boolean", v)),
        }
    }

    pub fn as_text(&self) -> Result<&str, TtlvError> {
        match &self.value {
            TTLValue::TextString(v) => Ok(v),
            v => Err(self.type_error("TextString", v)),
        }
    }

    pub fn as_bytes(&self) -> Result<&[u8], TtlvError> {
        match &self.value {
            TTLValue::ByteString(v) => Ok(v),
            v => Err(self.type_error("ByteString", v)),
        }
    }

    pub fn as_date_time(&self) -> Result<OffsetDateTime, TtlvError> {
        match &self.value {
            TTLValue::DateTime(v) => Ok(*v),
            v => Err(self.type_error("DateTime", v)),
        }
    }

    pub fn as_interval(&self) -> Result<u32, TtlvError> {
        match &self.value {
            TTLValue::Interval(v) => Ok(*v),
            v => Err(self.type_error("Interval", v)),
        }
    }

    fn type_error(&self, expected: &str, found: &TTLValue) -> TtlvError {
        TtlvError::from(format!(
            "{}: expected a {expected}, found a {}",
            self.tag,
            found.ttlv_type().name()
        ))
    }
}

#[derive(Debug, Clone, Eq)]
pub enum TTLValue {
    Structure(Vec<TTLV>),
    Integer(i32),
    LongInteger(i64),
    /// Signed big-endian two's complement bytes
    BigInteger(Vec<u8>),
    Enumeration(u32),
    Boolean(bool),
    TextString(String),
    ByteString(Vec<u8>),
    DateTime(OffsetDateTime),
    Interval(u32),
}

impl TTLValue {
    #[must_use]
    pub const fn ttlv_type(&self) -> TtlvType {
        match self {
            Self::Structure(_) => TtlvType::Structure,
            Self::Integer(_) => TtlvType::Integer,
            Self::LongInteger(_) => TtlvType::LongInteger,
            Self::BigInteger(_) => TtlvType::BigInteger,
            Self::Enumeration(_) => TtlvType::Enumeration,
            Self::Boolean(_) => TtlvType::Boolean,
            Self::TextString(_) => TtlvType::TextString,
            Self::ByteString(_) => TtlvType::ByteString,
            Self::DateTime(_) => TtlvType::DateTime,
            Self::Interval(_) => TtlvType::Interval,
        }
    }
}

impl PartialEq for TTLValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Structure(l0), Self::Structure(r0)) => l0 == r0,
            (Self::Integer(l0), Self::Integer(r0)) => l0 == r0,
            (Self::LongInteger(l0), Self::LongInteger(r0)) => l0 == r0,
            (Self::BigInteger(l0), Self::BigInteger(r0)) => l0 == r0,
            (Self::Enumeration(l0), Self::Enumeration(r0)) => l0 == r0,
            (Self::Boolean(l0), Self::Boolean(r0)) => l0 == r0,
            (Self::TextString(l0), Self::TextString(r0)) => l0 == r0,
            (Self::ByteString(l0), Self::ByteString(r0)) => l0 == r0,
            // the wire format only carries seconds
            (Self::DateTime(l0), Self::DateTime(r0)) => l0.unix_timestamp() == r0.unix_timestamp(),
            (Self::Interval(l0), Self::Interval(r0)) => l0 == r0,
            (_, _) => false,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TtlvType {
    Structure = 0x01,
    Integer = 0x02,
    LongInteger = 0x03,
    BigInteger = 0x04,
    Enumeration = 0x05,
    Boolean = 0x06,
    TextString = 0x07,
    ByteString = 0x08,
    DateTime = 0x09,
    Interval = 0x0A,
}

impl TtlvType {
    #[must_use]
    pub const fn to_byte(self) -> u8 {
        match self {
            Self::Structure => 0x01,
            Self::Integer => 0x02,
            Self::LongInteger => 0x03,
            Self::BigInteger => 0x04,
            Self::Enumeration => 0x05,
            Self::Boolean => 0x06,
            Self::TextString => 0x07,
            Self::ByteString => 0x08,
            Self::DateTime => 0x09,
            Self::Interval => 0x0A,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Structure => "Structure",
            Self::Integer => "Integer",
            Self::LongInteger => "LongInteger",
            Self::BigInteger => "BigInteger",
            Self::Enumeration => "Enumeration",
            Self::Boolean => "Boolean",
            Self::TextString => "TextString",
            Self::ByteString => "ByteString",
            Self::DateTime => "DateTime",
            Self::Interval => "Interval",
        }
    }
}

impl TryFrom<u8> for TtlvType {
    type Error = TtlvError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(Self::Structure),
            0x02 => Ok(Self::Integer),
            0x03 => Ok(Self::LongInteger),
            0x04 => Ok(Self::BigInteger),
            0x05 => Ok(Self::Enumeration),
            0x06 => Ok(Self::Boolean),
            0x07 => Ok(Self::TextString),
            0x08 => Ok(Self::ByteString),
            0x09 => Ok(Self::DateTime),
            0x0A => Ok(Self::Interval),
            _ => Err(TtlvError::from(format!("Invalid type byte: {value:#04x}"))),
        }
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::{TTLV, TTLValue};
    use crate::kmip_1_4::kmip_types::Tag;

    fn sample() -> TTLV {
        TTLV::structure(
            Tag::Name,
            vec![
                TTLV::text(Tag::NameValue, "my-key"),
                TTLV::enumeration(Tag::NameType, 1),
            ],
        )
    }

    #[test]
    fn test_accessors() {
        let name = sample();
        assert_eq!(name.require(Tag::NameValue).unwrap().as_text().unwrap(), "my-key");
        assert_eq!(name.child(Tag::NameType).unwrap().as_enum().unwrap(), 1);
        assert!(name.child(Tag::Link).is_none());
        assert_eq!(name.children(Tag::NameValue).count(), 1);
        assert_eq!(name.as_structure().unwrap().len(), 2);
    }

    #[test]
    fn test_accessor_errors_name_the_tag() {
        let name = sample();
        let err = name.require(Tag::Link).unwrap_err();
        assert_eq!(err.to_string(), "Missing Link in Name");

        let err = name
            .require(Tag::NameValue)
            .unwrap()
            .as_integer()
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "NameValue: expected a Integer, found a TextString"
        );
    }

    #[test]
    fn test_children_of_a_leaf_is_empty() {
        let leaf = TTLV::new(Tag::BatchCount, TTLValue::Integer(1));
        assert_eq!(leaf.children(Tag::BatchCount).count(), 0);
    }

    #[test]
    fn test_from_bytes_rejects_trailing_bytes() {
        let mut bytes = TTLV::integer(Tag::BatchCount, 1).to_bytes().unwrap();
        bytes.extend_from_slice(&[0; 8]);
        let err = TTLV::from_bytes(&bytes).unwrap_err();
        assert!(err.to_string().contains("Trailing bytes"));
    }
}

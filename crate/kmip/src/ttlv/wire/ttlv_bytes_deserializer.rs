use std::io::Read;

use time::OffsetDateTime;

use super::padding;
use crate::{
    kmip_1_4::kmip_types::Tag,
    ttlv::{TTLV, TTLValue, TtlvType, error::TtlvError},
};

/// Size of the tag, type and length header of every item
const HEADER_SIZE: usize = 8;

pub struct TTLVBytesDeserializer<R> {
    reader: R,
}

impl<R> TTLVBytesDeserializer<R>
where
    R: Read,
{
    pub const fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Read one item and return it with the number of bytes consumed,
    /// header and padding included.
    pub fn read_ttlv(&mut self) -> Result<(TTLV, usize), TtlvError> {
        let mut tag_bytes = [0_u8; 4];
        self.reader.read_exact(&mut tag_bytes[1..])?;
        let tag_value = u32::from_be_bytes(tag_bytes);
        let tag = Tag::from_u32(tag_value)?;

        let mut type_byte = [0_u8; 1];
        self.reader.read_exact(&mut type_byte)?;
        let item_type = TtlvType::try_from(type_byte[0])?;

        let mut buf4 = [0_u8; 4];
        self.reader.read_exact(&mut buf4)?;
        let length = u32::from_be_bytes(buf4);
        let length = usize::try_from(length)
            .map_err(|_e| TtlvError::from(format!("Length too large: {length}")))?;

        let (value, value_size) = match item_type {
            TtlvType::Structure => {
                let mut items = Vec::new();
                let mut remaining = length;
                while remaining > 0 {
                    let (item, size) = self.read_ttlv()?;
                    if size > remaining {
                        return Err(TtlvError::from(format!(
                            "{}: item length exceeds the enclosing structure {tag}",
                            item.tag
                        )));
                    }
                    remaining -= size;
                    items.push(item);
                }
                (TTLValue::Structure(items), length)
            }
            TtlvType::Integer => {
                expect_length(tag, item_type, length, 4)?;
                let value = i32::from_be_bytes(self.read_array()?);
                self.skip(4)?;
                (TTLValue::Integer(value), 8)
            }
            TtlvType::LongInteger => {
                expect_length(tag, item_type, length, 8)?;
                (TTLValue::LongInteger(i64::from_be_bytes(self.read_array()?)), 8)
            }
            TtlvType::BigInteger => {
                if length % 8 != 0 {
                    return Err(TtlvError::from(format!(
                        "{tag}: big integer length must be a multiple of 8, got {length}"
                    )));
                }
                (TTLValue::BigInteger(self.read_vec(length)?), length)
            }
            TtlvType::Enumeration => {
                expect_length(tag, item_type, length, 4)?;
                let value = u32::from_be_bytes(self.read_array()?);
                self.skip(4)?;
                (TTLValue::Enumeration(value), 8)
            }
            TtlvType::Boolean => {
                expect_length(tag, item_type, length, 8)?;
                let buf8: [u8; 8] = self.read_array()?;
                (TTLValue::Boolean(u64::from_be_bytes(buf8) != 0), 8)
            }
            TtlvType::TextString => {
                let buf = self.read_vec(length)?;
                self.skip(padding(length))?;
                (
                    TTLValue::TextString(String::from_utf8(buf)?),
                    length + padding(length),
                )
            }
            TtlvType::ByteString => {
                let buf = self.read_vec(length)?;
                self.skip(padding(length))?;
                (TTLValue::ByteString(buf), length + padding(length))
            }
            TtlvType::DateTime => {
                expect_length(tag, item_type, length, 8)?;
                let timestamp = i64::from_be_bytes(self.read_array()?);
                (
                    TTLValue::DateTime(OffsetDateTime::from_unix_timestamp(timestamp)?),
                    8,
                )
            }
            TtlvType::Interval => {
                expect_length(tag, item_type, length, 4)?;
                let value = u32::from_be_bytes(self.read_array()?);
                self.skip(4)?;
                (TTLValue::Interval(value), 8)
            }
        };

        Ok((TTLV { tag, value }, HEADER_SIZE + value_size))
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], TtlvError> {
        let mut buf = [0_u8; N];
        self.reader.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Read `length` bytes without trusting `length` for the allocation
    fn read_vec(&mut self, length: usize) -> Result<Vec<u8>, TtlvError> {
        let mut buf = Vec::new();
        let limit = u64::try_from(length)
            .map_err(|_e| TtlvError::from(format!("Length too large: {length}")))?;
        self.reader.by_ref().take(limit).read_to_end(&mut buf)?;
        if buf.len() != length {
            return Err(TtlvError::from("Truncated TTLV input"));
        }
        Ok(buf)
    }

    fn skip(&mut self, count: usize) -> Result<(), TtlvError> {
        let mut buf = [0_u8; 8];
        self.reader.read_exact(&mut buf[..count])?;
        Ok(())
    }
}

fn expect_length(
    tag: Tag,
    item_type: TtlvType,
    length: usize,
    expected: usize,
) -> Result<(), TtlvError> {
    if length == expected {
        Ok(())
    } else {
        Err(TtlvError::from(format!(
            "{tag}: invalid {} length {length}, expected {expected}",
            item_type.name()
        )))
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use crate::{
        kmip_1_4::kmip_types::Tag,
        ttlv::{TTLV, TTLValue},
    };

    #[test]
    fn test_nested_structure_with_padded_children() {
        // children with padding used to be miscounted against the structure length
        let original = TTLV::structure(
            Tag::TemplateAttribute,
            vec![
                TTLV::structure(
                    Tag::Name,
                    vec![
                        TTLV::text(Tag::NameValue, "abc"),
                        TTLV::enumeration(Tag::NameType, 1),
                    ],
                ),
                TTLV::bytes(Tag::KeyMaterial, vec![0xAA; 13]),
                TTLV::boolean(Tag::Extractable, false),
                TTLV::long_integer(Tag::UsageLimitsTotal, -5),
                TTLV::interval(Tag::Offset, 3600),
                TTLV::date_time(Tag::ActivationDate, datetime!(2024-01-02 03:04:05 UTC)),
                TTLV::new(Tag::KeyMaterial, TTLValue::BigInteger(vec![0xFF; 16])),
            ],
        );
        let bytes = original.to_bytes().unwrap();
        let decoded = TTLV::from_bytes(&bytes).unwrap();
        assert_eq!(original, decoded);
    }

    #[test]
    fn test_unknown_tag_is_rejected() {
        let bytes = hex::decode("54000002000000040000000100000000").unwrap();
        let err = TTLV::from_bytes(&bytes).unwrap_err();
        assert!(err.to_string().contains("Unknown tag"), "{err}");
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let bytes = hex::decode("42000D0C000000040000000100000000").unwrap();
        let err = TTLV::from_bytes(&bytes).unwrap_err();
        assert!(err.to_string().contains("Invalid type byte"), "{err}");
    }

    #[test]
    fn test_truncated_input_is_rejected() {
        let bytes = TTLV::text(Tag::NameValue, "Hello World").to_bytes().unwrap();
        let err = TTLV::from_bytes(&bytes[..12]).unwrap_err();
        assert_eq!(err.to_string(), "Truncated TTLV input");
        let err = TTLV::from_bytes(&bytes[..5]).unwrap_err();
        assert_eq!(err.to_string(), "Truncated TTLV input");
    }

    #[test]
    fn test_child_overflowing_structure_is_rejected() {
        // a structure announcing 8 bytes but holding a 16 bytes integer
        let bytes = hex::decode(
            "420069010000000842006A020000000400000001000000000000000000000000",
        )
        .unwrap();
        let err = TTLV::from_bytes(&bytes).unwrap_err();
        assert!(err.to_string().contains("exceeds the enclosing structure"), "{err}");
    }

    #[test]
    fn test_invalid_utf8_is_rejected() {
        let bytes = hex::decode("4200550700000002C328000000000000").unwrap();
        let err = TTLV::from_bytes(&bytes).unwrap_err();
        assert!(err.to_string().contains("Invalid UTF-8"), "{err}");
    }

    #[test]
    fn test_huge_length_does_not_allocate() {
        let bytes = hex::decode("42004308FFFFFFF0").unwrap();
        let err = TTLV::from_bytes(&bytes).unwrap_err();
        assert_eq!(err.to_string(), "Truncated TTLV input");
    }
}

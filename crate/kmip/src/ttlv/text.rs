use std::fmt::{self, Display, Write};

use time::format_description::well_known::Rfc3339;

use super::ttlv_struct::{TTLV, TTLValue};
use crate::kmip_1_4::kmip_types::{CryptographicUsageMask, Tag, enum_name};

impl TTLV {
    /// Human readable rendition of a leaf value.
    ///
    /// `type_tag` selects the enumeration or mask used to name the value:
    /// it is the item tag for regular items, and the tag matching the
    /// attribute name for an `AttributeValue`.
    #[must_use]
    pub fn render_leaf(&self, type_tag: Tag) -> String {
        match &self.value {
            TTLValue::Structure(items) => format!("{} item(s)", items.len()),
            TTLValue::Integer(v) if type_tag == Tag::CryptographicUsageMask => {
                u32::try_from(*v).map_or_else(
                    |_e| v.to_string(),
                    |bits| CryptographicUsageMask::from_bits_retain(bits).to_string(),
                )
            }
            TTLValue::Integer(v) => v.to_string(),
            TTLValue::LongInteger(v) => v.to_string(),
            TTLValue::BigInteger(v) => format!("0x{}", hex::encode_upper(v)),
            TTLValue::Enumeration(v) => {
                enum_name(type_tag, *v).unwrap_or_else(|| format!("0x{v:08X}"))
            }
            TTLValue::Boolean(v) => v.to_string(),
            TTLValue::TextString(v) => v.clone(),
            TTLValue::ByteString(v) => hex::encode_upper(v),
            TTLValue::DateTime(v) => v.format(&Rfc3339).unwrap_or_else(|_e| v.to_string()),
            TTLValue::Interval(v) => format!("{v}s"),
        }
    }

    fn write_indented(&self, out: &mut String, depth: usize) -> fmt::Result {
        let indent = "    ".repeat(depth);
        let typ = self.value.ttlv_type().name();
        match &self.value {
            TTLValue::Structure(items) => {
                writeln!(out, "{indent}{} ({typ}):", self.tag)?;
                for item in items {
                    item.write_indented(out, depth + 1)?;
                }
            }
            _ => writeln!(out, "{indent}{} ({typ}): {}", self.tag, self.render_leaf(self.tag))?,
        }
        Ok(())
    }
}

/// Indented text dump of a TTLV tree
impl Display for TTLV {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        self.write_indented(&mut out, 0)?;
        f.write_str(out.trim_end())
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use crate::{kmip_1_4::kmip_types::Tag, ttlv::TTLV};

    #[test]
    fn test_text_dump() {
        let ttlv = TTLV::structure(
            Tag::Name,
            vec![
                TTLV::text(Tag::NameValue, "my-key"),
                TTLV::enumeration(Tag::NameType, 1),
            ],
        );
        assert_eq!(
            ttlv.to_string(),
            "Name (Structure):\n    NameValue (TextString): my-key\n    NameType (Enumeration): \
             UninterpretedTextString"
        );
    }

    #[test]
    fn test_usage_mask_is_named() {
        let ttlv = TTLV::integer(Tag::CryptographicUsageMask, 0x0C);
        assert_eq!(ttlv.render_leaf(Tag::CryptographicUsageMask), "Encrypt | Decrypt");
        assert_eq!(ttlv.render_leaf(Tag::CryptographicLength), "12");
    }
}

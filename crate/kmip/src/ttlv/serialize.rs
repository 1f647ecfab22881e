use serde::{
    Serialize,
    ser::{self, SerializeStruct, Serializer},
};
use time::format_description::well_known::Rfc3339;

use super::ttlv_struct::{TTLV, TTLValue};
use crate::kmip_1_4::kmip_types::enum_name;

/// JSON rendition of a TTLV tree, `{"tag", "type", "value"}` per item.
/// Enumerations are written with their KMIP name when the tag is known,
/// byte strings and big integers as upper case hex.
impl Serialize for TTLV {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        fn _serialize<S, T>(
            serializer: S,
            tag: &str,
            typ: &str,
            value: &T,
        ) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
            T: Serialize + ?Sized,
        {
            let mut ttlv = serializer.serialize_struct("TTLV", 3)?;
            ttlv.serialize_field("tag", tag)?;
            ttlv.serialize_field("type", typ)?;
            ttlv.serialize_field("value", value)?;
            ttlv.end()
        }

        let tag = self.tag.to_string();
        let typ = self.value.ttlv_type().name();
        match &self.value {
            TTLValue::Structure(v) => _serialize(serializer, &tag, typ, v),
            TTLValue::Integer(v) => _serialize(serializer, &tag, typ, v),
            TTLValue::LongInteger(v) => _serialize(serializer, &tag, typ, v),
            TTLValue::BigInteger(v) => _serialize(
                serializer,
                &tag,
                typ,
                &("0x".to_owned() + &hex::encode_upper(v)),
            ),
            TTLValue::Enumeration(v) => match enum_name(self.tag, *v) {
                Some(name) => _serialize(serializer, &tag, typ, &name),
                None => _serialize(serializer, &tag, typ, &format!("0x{v:08X}")),
            },
            TTLValue::Boolean(v) => _serialize(serializer, &tag, typ, v),
            TTLValue::TextString(v) => _serialize(serializer, &tag, typ, v),
            TTLValue::ByteString(v) => _serialize(serializer, &tag, typ, &hex::encode_upper(v)),
            TTLValue::DateTime(v) => _serialize(
                serializer,
                &tag,
                typ,
                &v.format(&Rfc3339).map_err(|err| {
                    ser::Error::custom(format!("Cannot format DateTime {v} into RFC3339: {err}"))
                })?,
            ),
            TTLValue::Interval(v) => _serialize(serializer, &tag, typ, v),
        }
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::{kmip_1_4::kmip_types::Tag, ttlv::TTLV};

    #[test]
    fn test_json_uses_enum_names_and_hex() {
        let ttlv = TTLV::structure(
            Tag::KeyBlock,
            vec![
                TTLV::enumeration(Tag::KeyFormatType, 1),
                TTLV::bytes(Tag::KeyMaterial, vec![0xDE, 0xAD]),
                TTLV::enumeration(Tag::AttributeValue, 2),
            ],
        );
        let value = serde_json::to_value(&ttlv).unwrap();
        assert_eq!(
            value,
            json!({
                "tag": "KeyBlock",
                "type": "Structure",
                "value": [
                    {"tag": "KeyFormatType", "type": "Enumeration", "value": "Raw"},
                    {"tag": "KeyMaterial", "type": "ByteString", "value": "DEAD"},
                    {"tag": "AttributeValue", "type": "Enumeration", "value": "0x00000002"},
                ]
            })
        );
    }
}

use serde::{Serialize, ser::SerializeStruct};
use serde_json::Value;

use super::kmip_types::{
    CryptographicAlgorithm, CryptographicUsageMask, KmipEnum, LinkType, NameType, ObjectType,
    RecommendedCurve, State, Tag,
};
use crate::{
    KmipResult,
    ttlv::{TTLV, TTLValue},
};

pub const UNIQUE_IDENTIFIER: &str = "Unique Identifier";
pub const NAME: &str = "Name";
pub const OBJECT_TYPE: &str = "Object Type";
pub const CRYPTOGRAPHIC_ALGORITHM: &str = "Cryptographic Algorithm";
pub const CRYPTOGRAPHIC_LENGTH: &str = "Cryptographic Length";
pub const CRYPTOGRAPHIC_DOMAIN_PARAMETERS: &str = "Cryptographic Domain Parameters";
pub const CRYPTOGRAPHIC_USAGE_MASK: &str = "Cryptographic Usage Mask";
pub const STATE: &str = "State";
pub const LINK: &str = "Link";
pub const DESCRIPTION: &str = "Description";
pub const COMMENT: &str = "Comment";
pub const SENSITIVE: &str = "Sensitive";
pub const EXTRACTABLE: &str = "Extractable";

/// A KMIP 1.4 attribute as carried in Template-Attribute structures,
/// Locate filters and Get Attributes responses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub index: Option<i32>,
    /// Item tagged `AttributeValue`
    pub value: TTLV,
}

impl Attribute {
    #[must_use]
    pub fn new(name: &str, value: TTLValue) -> Self {
        Self {
            name: name.to_owned(),
            index: None,
            value: TTLV::new(Tag::AttributeValue, value),
        }
    }

    #[must_use]
    pub fn object_type(object_type: ObjectType) -> Self {
        Self::new(OBJECT_TYPE, TTLValue::Enumeration(object_type.to_u32()))
    }

    #[must_use]
    pub fn state(state: State) -> Self {
        Self::new(STATE, TTLValue::Enumeration(state.to_u32()))
    }

    #[must_use]
    pub fn cryptographic_algorithm(algorithm: CryptographicAlgorithm) -> Self {
        Self::new(
            CRYPTOGRAPHIC_ALGORITHM,
            TTLValue::Enumeration(algorithm.to_u32()),
        )
    }

    #[must_use]
    pub fn cryptographic_length(bits: i32) -> Self {
        Self::new(CRYPTOGRAPHIC_LENGTH, TTLValue::Integer(bits))
    }

    #[must_use]
    pub fn usage_mask(mask: CryptographicUsageMask) -> Self {
        // masks are written as a KMIP Integer, bit pattern preserved
        Self::new(
            CRYPTOGRAPHIC_USAGE_MASK,
            TTLValue::Integer(i32::from_be_bytes(mask.bits().to_be_bytes())),
        )
    }

    #[must_use]
    pub fn domain_parameters(curve: RecommendedCurve) -> Self {
        Self::new(
            CRYPTOGRAPHIC_DOMAIN_PARAMETERS,
            TTLValue::Structure(vec![TTLV::enumeration(
                Tag::RecommendedCurve,
                curve.to_u32(),
            )]),
        )
    }

    #[must_use]
    pub fn name(value: &str) -> Self {
        Self::new(
            NAME,
            TTLValue::Structure(vec![
                TTLV::text(Tag::NameValue, value),
                TTLV::enumeration(Tag::NameType, NameType::UninterpretedTextString.to_u32()),
            ]),
        )
    }

    #[must_use]
    pub fn link(link_type: LinkType, linked_object_id: &str) -> Self {
        Self::new(
            LINK,
            TTLValue::Structure(vec![
                TTLV::enumeration(Tag::LinkType, link_type.to_u32()),
                TTLV::text(Tag::LinkedObjectIdentifier, linked_object_id),
            ]),
        )
    }

    #[must_use]
    pub fn text(name: &str, value: &str) -> Self {
        Self::new(name, TTLValue::TextString(value.to_owned()))
    }

    #[must_use]
    pub fn boolean(name: &str, value: bool) -> Self {
        Self::new(name, TTLValue::Boolean(value))
    }

    pub fn to_ttlv(&self) -> TTLV {
        let mut items = vec![TTLV::text(Tag::AttributeName, self.name.clone())];
        if let Some(index) = self.index {
            items.push(TTLV::integer(Tag::AttributeIndex, index));
        }
        items.push(self.value.clone());
        TTLV::structure(Tag::Attribute, items)
    }

    pub fn from_ttlv(ttlv: &TTLV) -> KmipResult<Self> {
        let name = ttlv.require(Tag::AttributeName)?.as_text()?.to_owned();
        let index = ttlv
            .child(Tag::AttributeIndex)
            .map(TTLV::as_integer)
            .transpose()?;
        let value = ttlv.require(Tag::AttributeValue)?.clone();
        Ok(Self { name, index, value })
    }

    /// Attribute name followed by its index when it is not the first
    /// instance, e.g. `Name [1]`
    #[must_use]
    pub fn display_name(&self) -> String {
        match self.index {
            Some(index) if index > 0 => format!("{} [{index}]", self.name),
            _ => self.name.clone(),
        }
    }

    /// Human readable value.
    /// Structures such as Name, Link, Digest or Cryptographic Parameters
    /// are rendered as one `Field: value` line per member.
    #[must_use]
    pub fn render(&self) -> String {
        let type_tag = Tag::from_attribute_name(&self.name).unwrap_or(Tag::AttributeValue);
        match &self.value.value {
            TTLValue::Structure(items) => {
                let mut lines = Vec::new();
                render_members(items, 0, &mut lines);
                lines.join("\n")
            }
            _ => self.value.render_leaf(type_tag),
        }
    }

    /// Value as an enumeration of type `E`, when it is one
    #[must_use]
    pub fn as_enum<E: KmipEnum>(&self) -> Option<E> {
        self.value.as_enum().ok().and_then(E::from_u32)
    }

    /// `NameValue` of a Name attribute
    #[must_use]
    pub fn name_value(&self) -> Option<&str> {
        self.value
            .child(Tag::NameValue)
            .and_then(|v| v.as_text().ok())
    }

    fn json_value(&self) -> Value {
        let type_tag = Tag::from_attribute_name(&self.name).unwrap_or(Tag::AttributeValue);
        ttlv_to_json(&self.value, type_tag)
    }
}

fn render_members(items: &[TTLV], depth: usize, lines: &mut Vec<String>) {
    let indent = "  ".repeat(depth);
    for item in items {
        match &item.value {
            TTLValue::Structure(children) => {
                lines.push(format!("{indent}{}:", item.tag));
                render_members(children, depth + 1, lines);
            }
            _ => lines.push(format!("{indent}{}: {}", item.tag, item.render_leaf(item.tag))),
        }
    }
}

fn ttlv_to_json(ttlv: &TTLV, type_tag: Tag) -> Value {
    match &ttlv.value {
        TTLValue::Structure(items) => {
            let mut map = serde_json::Map::new();
            for item in items {
                map.insert(item.tag.to_string(), ttlv_to_json(item, item.tag));
            }
            Value::Object(map)
        }
        TTLValue::Integer(v) if type_tag != Tag::CryptographicUsageMask => Value::from(*v),
        TTLValue::LongInteger(v) => Value::from(*v),
        TTLValue::Interval(v) => Value::from(*v),
        TTLValue::Boolean(v) => Value::from(*v),
        _ => Value::from(ttlv.render_leaf(type_tag)),
    }
}

impl Serialize for Attribute {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut attr = serializer.serialize_struct("Attribute", 3)?;
        attr.serialize_field("AttributeName", &self.name)?;
        if let Some(index) = self.index {
            attr.serialize_field("AttributeIndex", &index)?;
        }
        attr.serialize_field("AttributeValue", &self.json_value())?;
        attr.end()
    }
}

/// All `Attribute` children of a structure, in order
pub fn parse_attributes(container: &TTLV) -> KmipResult<Vec<Attribute>> {
    container
        .children(Tag::Attribute)
        .map(Attribute::from_ttlv)
        .collect()
}

/// A Template-Attribute like structure holding the given attributes
#[must_use]
pub fn template_attribute(tag: Tag, attributes: &[Attribute]) -> TTLV {
    TTLV::structure(tag, attributes.iter().map(Attribute::to_ttlv).collect())
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::{Attribute, parse_attributes, template_attribute};
    use crate::{
        kmip_1_4::kmip_types::{
            CryptographicAlgorithm, CryptographicUsageMask, LinkType, ObjectType, State, Tag,
        },
        ttlv::{TTLV, TTLValue},
    };

    #[test]
    fn test_ttlv_round_trip_keeps_index() {
        let mut attr = Attribute::name("my-key");
        attr.index = Some(1);
        let parsed = Attribute::from_ttlv(&attr.to_ttlv()).unwrap();
        assert_eq!(parsed, attr);
        assert_eq!(parsed.display_name(), "Name [1]");
        assert_eq!(parsed.name_value(), Some("my-key"));
    }

    #[test]
    fn test_render_enums_by_name() {
        assert_eq!(Attribute::state(State::Active).render(), "Active");
        assert_eq!(
            Attribute::object_type(ObjectType::SymmetricKey).render(),
            "SymmetricKey"
        );
        assert_eq!(
            Attribute::cryptographic_algorithm(CryptographicAlgorithm::AES).render(),
            "AES"
        );
    }

    #[test]
    fn test_render_mask_and_dates() {
        let attr = Attribute::usage_mask(CryptographicUsageMask::Sign | CryptographicUsageMask::Verify);
        assert_eq!(attr.render(), "Sign | Verify");
        let attr = Attribute::new(
            "Activation Date",
            TTLValue::DateTime(datetime!(2024-05-06 07:08:09 UTC)),
        );
        assert_eq!(attr.render(), "2024-05-06T07:08:09Z");
        assert_eq!(Attribute::cryptographic_length(256).render(), "256");
    }

    #[test]
    fn test_render_structures() {
        assert_eq!(
            Attribute::link(LinkType::PublicKeyLink, "abc").render(),
            "LinkType: PublicKeyLink\nLinkedObjectIdentifier: abc"
        );
        let digest = Attribute::new(
            "Digest",
            TTLValue::Structure(vec![
                TTLV::enumeration(Tag::HashingAlgorithm, 6),
                TTLV::bytes(Tag::DigestValue, vec![0xAB, 0xCD]),
            ]),
        );
        assert_eq!(digest.render(), "HashingAlgorithm: SHA256\nDigestValue: ABCD");
    }

    #[test]
    fn test_parse_template_attribute() {
        let attributes = vec![
            Attribute::cryptographic_algorithm(CryptographicAlgorithm::AES),
            Attribute::cryptographic_length(256),
        ];
        let template = template_attribute(Tag::TemplateAttribute, &attributes);
        assert_eq!(parse_attributes(&template).unwrap(), attributes);
    }

    #[test]
    fn test_json_value() {
        let json = serde_json::to_value(Attribute::name("k")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "AttributeName": "Name",
                "AttributeValue": {"NameValue": "k", "NameType": "UninterpretedTextString"}
            })
        );
        let json = serde_json::to_value(Attribute::cryptographic_length(128)).unwrap();
        assert_eq!(json["AttributeValue"], 128);
    }
}

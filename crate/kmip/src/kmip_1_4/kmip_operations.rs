//! Request payloads and response payloads of the KMIP 1.4 operations
//! used by the client. Each request knows its [`Operation`] and builds
//! the children of its Request Payload; each response parses a
//! Response Payload.

use serde::Serialize;
use time::OffsetDateTime;

use super::{
    kmip_attributes::{Attribute, parse_attributes, template_attribute},
    kmip_objects::{ManagedObject, OBJECT_TAGS},
    kmip_types::{KmipEnum, ObjectType, Operation, RevocationReasonCode, Tag},
};
use crate::{KmipError, KmipResult, ttlv::TTLV};

pub trait KmipRequest {
    type Response;

    fn operation(&self) -> Operation;

    /// Children of the Request Payload structure
    fn payload(&self) -> Vec<TTLV>;

    fn parse_response(payload: &TTLV) -> KmipResult<Self::Response>;
}

fn unique_identifier(payload: &TTLV) -> KmipResult<String> {
    Ok(payload.require(Tag::UniqueIdentifier)?.as_text()?.to_owned())
}

fn optional_attributes(payload: &TTLV, tag: Tag) -> KmipResult<Vec<Attribute>> {
    payload
        .child(tag)
        .map_or_else(|| Ok(Vec::new()), parse_attributes)
}

fn object_type_of(payload: &TTLV) -> KmipResult<ObjectType> {
    let value = payload.require(Tag::ObjectType)?.as_enum()?;
    ObjectType::from_u32(value)
        .ok_or_else(|| KmipError::NotSupported(format!("object type {value:#x}")))
}

/// Create a managed object, a symmetric key in practice
#[derive(Debug, Clone)]
pub struct Create {
    pub object_type: ObjectType,
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateResponse {
    pub object_type: ObjectType,
    pub unique_identifier: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<Attribute>,
}

impl KmipRequest for Create {
    type Response = CreateResponse;

    fn operation(&self) -> Operation {
        Operation::Create
    }

    fn payload(&self) -> Vec<TTLV> {
        vec![
            TTLV::enumeration(Tag::ObjectType, self.object_type.to_u32()),
            template_attribute(Tag::TemplateAttribute, &self.attributes),
        ]
    }

    fn parse_response(payload: &TTLV) -> KmipResult<Self::Response> {
        Ok(CreateResponse {
            object_type: object_type_of(payload)?,
            unique_identifier: unique_identifier(payload)?,
            attributes: optional_attributes(payload, Tag::TemplateAttribute)?,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct CreateKeyPair {
    pub common_attributes: Vec<Attribute>,
    pub private_key_attributes: Vec<Attribute>,
    pub public_key_attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct KeyPairResponse {
    pub private_key_unique_identifier: String,
    pub public_key_unique_identifier: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub private_key_template_attribute: Vec<Attribute>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub public_key_template_attribute: Vec<Attribute>,
}

impl KeyPairResponse {
    fn from_payload(payload: &TTLV) -> KmipResult<Self> {
        Ok(Self {
            private_key_unique_identifier: payload
                .require(Tag::PrivateKeyUniqueIdentifier)?
                .as_text()?
                .to_owned(),
            public_key_unique_identifier: payload
                .require(Tag::PublicKeyUniqueIdentifier)?
                .as_text()?
                .to_owned(),
            private_key_template_attribute: optional_attributes(
                payload,
                Tag::PrivateKeyTemplateAttribute,
            )?,
            public_key_template_attribute: optional_attributes(
                payload,
                Tag::PublicKeyTemplateAttribute,
            )?,
        })
    }
}

impl KmipRequest for CreateKeyPair {
    type Response = KeyPairResponse;

    fn operation(&self) -> Operation {
        Operation::CreateKeyPair
    }

    fn payload(&self) -> Vec<TTLV> {
        let mut items = Vec::with_capacity(3);
        for (tag, attributes) in [
            (Tag::CommonTemplateAttribute, &self.common_attributes),
            (Tag::PrivateKeyTemplateAttribute, &self.private_key_attributes),
            (Tag::PublicKeyTemplateAttribute, &self.public_key_attributes),
        ] {
            if !attributes.is_empty() {
                items.push(template_attribute(tag, attributes));
            }
        }
        items
    }

    fn parse_response(payload: &TTLV) -> KmipResult<Self::Response> {
        KeyPairResponse::from_payload(payload)
    }
}

#[derive(Debug, Clone)]
pub struct Register {
    pub object: ManagedObject,
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct IdentifierWithAttributes {
    pub unique_identifier: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub template_attribute: Vec<Attribute>,
}

impl IdentifierWithAttributes {
    fn from_payload(payload: &TTLV) -> KmipResult<Self> {
        Ok(Self {
            unique_identifier: unique_identifier(payload)?,
            template_attribute: optional_attributes(payload, Tag::TemplateAttribute)?,
        })
    }
}

impl KmipRequest for Register {
    type Response = IdentifierWithAttributes;

    fn operation(&self) -> Operation {
        Operation::Register
    }

    fn payload(&self) -> Vec<TTLV> {
        let object_type = self.object.object_type().map_or(0, KmipEnum::to_u32);
        vec![
            TTLV::enumeration(Tag::ObjectType, object_type),
            template_attribute(Tag::TemplateAttribute, &self.attributes),
            self.object.to_ttlv(),
        ]
    }

    fn parse_response(payload: &TTLV) -> KmipResult<Self::Response> {
        IdentifierWithAttributes::from_payload(payload)
    }
}

#[derive(Debug, Clone)]
pub struct Get {
    pub unique_identifier: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetResponse {
    pub object_type: ObjectType,
    pub unique_identifier: String,
    pub object: ManagedObject,
}

impl KmipRequest for Get {
    type Response = GetResponse;

    fn operation(&self) -> Operation {
        Operation::Get
    }

    fn payload(&self) -> Vec<TTLV> {
        vec![TTLV::text(
            Tag::UniqueIdentifier,
            self.unique_identifier.clone(),
        )]
    }

    fn parse_response(payload: &TTLV) -> KmipResult<Self::Response> {
        let object = OBJECT_TAGS
            .iter()
            .find_map(|tag| payload.child(*tag))
            .ok_or_else(|| KmipError::InvalidMessage("Get response holds no object".to_owned()))?;
        Ok(GetResponse {
            object_type: object_type_of(payload)?,
            unique_identifier: unique_identifier(payload)?,
            object: ManagedObject::from_ttlv(object)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct GetAttributes {
    pub unique_identifier: String,
    /// Names of the attributes to fetch, all of them when empty
    pub attribute_names: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetAttributesResponse {
    pub unique_identifier: String,
    pub attribute: Vec<Attribute>,
}

impl GetAttributesResponse {
    /// First instance of the named attribute
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&Attribute> {
        self.attribute
            .iter()
            .find(|a| a.name == name && a.index.unwrap_or(0) == 0)
    }
}

impl KmipRequest for GetAttributes {
    type Response = GetAttributesResponse;

    fn operation(&self) -> Operation {
        Operation::GetAttributes
    }

    fn payload(&self) -> Vec<TTLV> {
        let mut items = vec![TTLV::text(
            Tag::UniqueIdentifier,
            self.unique_identifier.clone(),
        )];
        items.extend(
            self.attribute_names
                .iter()
                .map(|name| TTLV::text(Tag::AttributeName, name.clone())),
        );
        items
    }

    fn parse_response(payload: &TTLV) -> KmipResult<Self::Response> {
        Ok(GetAttributesResponse {
            unique_identifier: unique_identifier(payload)?,
            attribute: parse_attributes(payload)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct AddAttribute {
    pub unique_identifier: String,
    pub attribute: Attribute,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AddAttributeResponse {
    pub unique_identifier: String,
    pub attribute: Attribute,
}

impl KmipRequest for AddAttribute {
    type Response = AddAttributeResponse;

    fn operation(&self) -> Operation {
        Operation::AddAttribute
    }

    fn payload(&self) -> Vec<TTLV> {
        vec![
            TTLV::text(Tag::UniqueIdentifier, self.unique_identifier.clone()),
            self.attribute.to_ttlv(),
        ]
    }

    fn parse_response(payload: &TTLV) -> KmipResult<Self::Response> {
        Ok(AddAttributeResponse {
            unique_identifier: unique_identifier(payload)?,
            attribute: Attribute::from_ttlv(payload.require(Tag::Attribute)?)?,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct IdentifierResponse {
    pub unique_identifier: String,
}

#[derive(Debug, Clone)]
pub struct Activate {
    pub unique_identifier: String,
}

impl KmipRequest for Activate {
    type Response = IdentifierResponse;

    fn operation(&self) -> Operation {
        Operation::Activate
    }

    fn payload(&self) -> Vec<TTLV> {
        vec![TTLV::text(
            Tag::UniqueIdentifier,
            self.unique_identifier.clone(),
        )]
    }

    fn parse_response(payload: &TTLV) -> KmipResult<Self::Response> {
        Ok(IdentifierResponse {
            unique_identifier: unique_identifier(payload)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Revoke {
    pub unique_identifier: String,
    pub reason: RevocationReasonCode,
    pub message: Option<String>,
}

impl KmipRequest for Revoke {
    type Response = IdentifierResponse;

    fn operation(&self) -> Operation {
        Operation::Revoke
    }

    fn payload(&self) -> Vec<TTLV> {
        let mut reason = vec![TTLV::enumeration(
            Tag::RevocationReasonCode,
            self.reason.to_u32(),
        )];
        if let Some(message) = &self.message {
            reason.push(TTLV::text(Tag::RevocationMessage, message.clone()));
        }
        let mut items = vec![
            TTLV::text(Tag::UniqueIdentifier, self.unique_identifier.clone()),
            TTLV::structure(Tag::RevocationReason, reason),
        ];
        // compromise reasons require the compromise date
        if matches!(
            self.reason,
            RevocationReasonCode::KeyCompromise | RevocationReasonCode::CACompromise
        ) {
            items.push(TTLV::date_time(
                Tag::CompromiseOccurrenceDate,
                OffsetDateTime::now_utc(),
            ));
        }
        items
    }

    fn parse_response(payload: &TTLV) -> KmipResult<Self::Response> {
        Ok(IdentifierResponse {
            unique_identifier: unique_identifier(payload)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Destroy {
    pub unique_identifier: String,
}

impl KmipRequest for Destroy {
    type Response = IdentifierResponse;

    fn operation(&self) -> Operation {
        Operation::Destroy
    }

    fn payload(&self) -> Vec<TTLV> {
        vec![TTLV::text(
            Tag::UniqueIdentifier,
            self.unique_identifier.clone(),
        )]
    }

    fn parse_response(payload: &TTLV) -> KmipResult<Self::Response> {
        Ok(IdentifierResponse {
            unique_identifier: unique_identifier(payload)?,
        })
    }
}

/// Locate objects matching all the given attributes
#[derive(Debug, Clone, Default)]
pub struct Locate {
    pub maximum_items: Option<i32>,
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct LocateResponse {
    pub unique_identifier: Vec<String>,
}

impl KmipRequest for Locate {
    type Response = LocateResponse;

    fn operation(&self) -> Operation {
        Operation::Locate
    }

    fn payload(&self) -> Vec<TTLV> {
        let mut items = Vec::new();
        if let Some(max) = self.maximum_items {
            items.push(TTLV::integer(Tag::MaximumItems, max));
        }
        items.extend(self.attributes.iter().map(Attribute::to_ttlv));
        items
    }

    fn parse_response(payload: &TTLV) -> KmipResult<Self::Response> {
        Ok(LocateResponse {
            unique_identifier: payload
                .children(Tag::UniqueIdentifier)
                .map(|id| id.as_text().map(ToOwned::to_owned))
                .collect::<Result<_, _>>()?,
        })
    }
}

/// Replace a symmetric key
#[derive(Debug, Clone)]
pub struct ReKey {
    pub unique_identifier: String,
    /// Seconds between the initialization and activation of the new key
    pub offset: Option<u32>,
}

impl KmipRequest for ReKey {
    type Response = IdentifierWithAttributes;

    fn operation(&self) -> Operation {
        Operation::ReKey
    }

    fn payload(&self) -> Vec<TTLV> {
        let mut items = vec![TTLV::text(
            Tag::UniqueIdentifier,
            self.unique_identifier.clone(),
        )];
        if let Some(offset) = self.offset {
            items.push(TTLV::interval(Tag::Offset, offset));
        }
        items
    }

    fn parse_response(payload: &TTLV) -> KmipResult<Self::Response> {
        IdentifierWithAttributes::from_payload(payload)
    }
}

/// Replace a key pair, identified by its private key
#[derive(Debug, Clone)]
pub struct ReKeyKeyPair {
    pub private_key_unique_identifier: String,
    pub offset: Option<u32>,
}

impl KmipRequest for ReKeyKeyPair {
    type Response = KeyPairResponse;

    fn operation(&self) -> Operation {
        Operation::ReKeyKeyPair
    }

    fn payload(&self) -> Vec<TTLV> {
        let mut items = vec![TTLV::text(
            Tag::PrivateKeyUniqueIdentifier,
            self.private_key_unique_identifier.clone(),
        )];
        if let Some(offset) = self.offset {
            items.push(TTLV::interval(Tag::Offset, offset));
        }
        items
    }

    fn parse_response(payload: &TTLV) -> KmipResult<Self::Response> {
        KeyPairResponse::from_payload(payload)
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::{
        Create, CreateKeyPair, Get, GetAttributes, KmipRequest, Locate, ReKey, Revoke,
    };
    use crate::{
        kmip_1_4::{
            kmip_attributes::{self, Attribute},
            kmip_objects::{KeyBlock, ManagedObject},
            kmip_types::{
                CryptographicAlgorithm, KeyFormatType, KmipEnum, ObjectType,
                RevocationReasonCode, State, Tag,
            },
        },
        ttlv::TTLV,
    };

    #[test]
    fn test_create_payload() {
        let request = Create {
            object_type: ObjectType::SymmetricKey,
            attributes: vec![
                Attribute::cryptographic_algorithm(CryptographicAlgorithm::AES),
                Attribute::cryptographic_length(256),
            ],
        };
        let payload = TTLV::structure(Tag::RequestPayload, request.payload());
        assert_eq!(
            payload.require(Tag::ObjectType).unwrap().as_enum().unwrap(),
            ObjectType::SymmetricKey.to_u32()
        );
        let template = payload.require(Tag::TemplateAttribute).unwrap();
        assert_eq!(template.children(Tag::Attribute).count(), 2);
    }

    #[test]
    fn test_create_key_pair_skips_empty_templates() {
        let request = CreateKeyPair {
            common_attributes: vec![Attribute::cryptographic_algorithm(
                CryptographicAlgorithm::RSA,
            )],
            ..Default::default()
        };
        let payload = request.payload();
        assert_eq!(payload.len(), 1);
        assert_eq!(payload[0].tag, Tag::CommonTemplateAttribute);
    }

    #[test]
    fn test_get_response() {
        let key = ManagedObject::SymmetricKey(KeyBlock::new(
            KeyFormatType::Raw,
            vec![1; 16],
            Some(CryptographicAlgorithm::AES),
            Some(128),
        ));
        let payload = TTLV::structure(
            Tag::ResponsePayload,
            vec![
                TTLV::enumeration(Tag::ObjectType, ObjectType::SymmetricKey.to_u32()),
                TTLV::text(Tag::UniqueIdentifier, "k1"),
                key.to_ttlv(),
            ],
        );
        let response = Get::parse_response(&payload).unwrap();
        assert_eq!(response.unique_identifier, "k1");
        assert_eq!(response.object, key);
    }

    #[test]
    fn test_get_attributes_response() {
        let mut second_name = Attribute::name("alias");
        second_name.index = Some(1);
        let payload = TTLV::structure(
            Tag::ResponsePayload,
            vec![
                TTLV::text(Tag::UniqueIdentifier, "k1"),
                Attribute::name("main").to_ttlv(),
                second_name.to_ttlv(),
                Attribute::state(State::Active).to_ttlv(),
            ],
        );
        let response = GetAttributes::parse_response(&payload).unwrap();
        assert_eq!(response.attribute.len(), 3);
        assert_eq!(
            response.find(kmip_attributes::NAME).unwrap().name_value(),
            Some("main")
        );
        assert_eq!(
            response
                .find(kmip_attributes::STATE)
                .unwrap()
                .as_enum::<State>(),
            Some(State::Active)
        );
    }

    #[test]
    fn test_locate() {
        let request = Locate {
            maximum_items: None,
            attributes: vec![Attribute::object_type(ObjectType::PrivateKey)],
        };
        assert_eq!(request.payload().len(), 1);

        let payload = TTLV::structure(
            Tag::ResponsePayload,
            vec![
                TTLV::text(Tag::UniqueIdentifier, "a"),
                TTLV::text(Tag::UniqueIdentifier, "b"),
            ],
        );
        let response = Locate::parse_response(&payload).unwrap();
        assert_eq!(response.unique_identifier, vec!["a", "b"]);
    }

    #[test]
    fn test_revoke_compromise_carries_a_date() {
        let request = Revoke {
            unique_identifier: "k1".to_owned(),
            reason: RevocationReasonCode::KeyCompromise,
            message: Some("leaked".to_owned()),
        };
        let payload = TTLV::structure(Tag::RequestPayload, request.payload());
        assert!(payload.child(Tag::CompromiseOccurrenceDate).is_some());
        let reason = payload.require(Tag::RevocationReason).unwrap();
        assert_eq!(
            reason.require(Tag::RevocationMessage).unwrap().as_text().unwrap(),
            "leaked"
        );

        let request = Revoke {
            unique_identifier: "k1".to_owned(),
            reason: RevocationReasonCode::Superseded,
            message: None,
        };
        let payload = TTLV::structure(Tag::RequestPayload, request.payload());
        assert!(payload.child(Tag::CompromiseOccurrenceDate).is_none());
    }

    #[test]
    fn test_rekey_offset_is_an_interval() {
        let request = ReKey {
            unique_identifier: "k1".to_owned(),
            offset: Some(60),
        };
        let payload = TTLV::structure(Tag::RequestPayload, request.payload());
        assert_eq!(
            payload.require(Tag::Offset).unwrap().as_interval().unwrap(),
            60
        );
    }
}

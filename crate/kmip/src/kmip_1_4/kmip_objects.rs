use serde::Serialize;

use super::kmip_types::{
    CertificateType, CryptographicAlgorithm, KeyFormatType, KmipEnum, ObjectType, SecretDataType,
    Tag,
};
use crate::{KmipError, KmipResult, ttlv::TTLV};

/// The key material of a key or secret object, as carried in a Key Block.
/// Only byte string key materials are supported: transparent key
/// structures are not requested by this client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct KeyBlock {
    pub key_format_type: KeyFormatType,
    #[serde(with = "hex_upper")]
    pub key_material: Vec<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cryptographic_algorithm: Option<CryptographicAlgorithm>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cryptographic_length: Option<i32>,
}

impl KeyBlock {
    #[must_use]
    pub const fn new(
        key_format_type: KeyFormatType,
        key_material: Vec<u8>,
        cryptographic_algorithm: Option<CryptographicAlgorithm>,
        cryptographic_length: Option<i32>,
    ) -> Self {
        Self {
            key_format_type,
            key_material,
            cryptographic_algorithm,
            cryptographic_length,
        }
    }

    pub fn to_ttlv(&self) -> TTLV {
        let mut items = vec![
            TTLV::enumeration(Tag::KeyFormatType, self.key_format_type.to_u32()),
            TTLV::structure(
                Tag::KeyValue,
                vec![TTLV::bytes(Tag::KeyMaterial, self.key_material.clone())],
            ),
        ];
        if let Some(algorithm) = self.cryptographic_algorithm {
            items.push(TTLV::enumeration(
                Tag::CryptographicAlgorithm,
                algorithm.to_u32(),
            ));
        }
        if let Some(length) = self.cryptographic_length {
            items.push(TTLV::integer(Tag::CryptographicLength, length));
        }
        TTLV::structure(Tag::KeyBlock, items)
    }

    pub fn from_ttlv(ttlv: &TTLV) -> KmipResult<Self> {
        let format = ttlv.require(Tag::KeyFormatType)?.as_enum()?;
        let key_format_type = KeyFormatType::from_u32(format)
            .ok_or_else(|| KmipError::NotSupported(format!("key format type {format:#x}")))?;
        if ttlv.child(Tag::KeyWrappingData).is_some() {
            return Err(KmipError::NotSupported("wrapped key material".to_owned()));
        }
        let key_value = ttlv.require(Tag::KeyValue)?;
        let key_material = match key_value.child(Tag::KeyMaterial) {
            Some(material) => material.as_bytes().map_err(|_e| {
                KmipError::NotSupported(format!("transparent key material ({key_format_type})"))
            })?,
            // a wrapped key value is a plain byte string
            None => key_value.as_bytes()?,
        }
        .to_vec();
        let cryptographic_algorithm = ttlv
            .child(Tag::CryptographicAlgorithm)
            .and_then(|a| a.as_enum().ok())
            .and_then(CryptographicAlgorithm::from_u32);
        let cryptographic_length = ttlv
            .child(Tag::CryptographicLength)
            .map(TTLV::as_integer)
            .transpose()?;
        Ok(Self {
            key_format_type,
            key_material,
            cryptographic_algorithm,
            cryptographic_length,
        })
    }
}

/// A KMIP 1.4 managed object
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ManagedObject {
    Certificate {
        certificate_type: CertificateType,
        #[serde(with = "hex_upper")]
        certificate_value: Vec<u8>,
    },
    SymmetricKey(KeyBlock),
    PublicKey(KeyBlock),
    PrivateKey(KeyBlock),
    SecretData {
        secret_data_type: SecretDataType,
        key_block: KeyBlock,
    },
    /// Objects this client does not interpret, kept as TTLV
    Other(TTLV),
}

impl ManagedObject {
    #[must_use]
    pub fn object_type(&self) -> Option<ObjectType> {
        match self {
            Self::Certificate { .. } => Some(ObjectType::Certificate),
            Self::SymmetricKey(_) => Some(ObjectType::SymmetricKey),
            Self::PublicKey(_) => Some(ObjectType::PublicKey),
            Self::PrivateKey(_) => Some(ObjectType::PrivateKey),
            Self::SecretData { .. } => Some(ObjectType::SecretData),
            Self::Other(ttlv) => match ttlv.tag {
                Tag::SplitKey => Some(ObjectType::SplitKey),
                Tag::Template => Some(ObjectType::Template),
                Tag::OpaqueObject => Some(ObjectType::OpaqueObject),
                Tag::PGPKey => Some(ObjectType::PGPKey),
                _ => None,
            },
        }
    }

    pub fn to_ttlv(&self) -> TTLV {
        match self {
            Self::Certificate {
                certificate_type,
                certificate_value,
            } => TTLV::structure(
                Tag::Certificate,
                vec![
                    TTLV::enumeration(Tag::CertificateType, certificate_type.to_u32()),
                    TTLV::bytes(Tag::CertificateValue, certificate_value.clone()),
                ],
            ),
            Self::SymmetricKey(key_block) => {
                TTLV::structure(Tag::SymmetricKey, vec![key_block.to_ttlv()])
            }
            Self::PublicKey(key_block) => {
                TTLV::structure(Tag::PublicKey, vec![key_block.to_ttlv()])
            }
            Self::PrivateKey(key_block) => {
                TTLV::structure(Tag::PrivateKey, vec![key_block.to_ttlv()])
            }
            Self::SecretData {
                secret_data_type,
                key_block,
            } => TTLV::structure(
                Tag::SecretData,
                vec![
                    TTLV::enumeration(Tag::SecretDataType, secret_data_type.to_u32()),
                    key_block.to_ttlv(),
                ],
            ),
            Self::Other(ttlv) => ttlv.clone(),
        }
    }

    pub fn from_ttlv(ttlv: &TTLV) -> KmipResult<Self> {
        Ok(match ttlv.tag {
            Tag::Certificate => {
                let typ = ttlv.require(Tag::CertificateType)?.as_enum()?;
                Self::Certificate {
                    certificate_type: CertificateType::from_u32(typ).ok_or_else(|| {
                        KmipError::NotSupported(format!("certificate type {typ:#x}"))
                    })?,
                    certificate_value: ttlv.require(Tag::CertificateValue)?.as_bytes()?.to_vec(),
                }
            }
            Tag::SymmetricKey => Self::SymmetricKey(key_block_of(ttlv)?),
            Tag::PublicKey => Self::PublicKey(key_block_of(ttlv)?),
            Tag::PrivateKey => Self::PrivateKey(key_block_of(ttlv)?),
            Tag::SecretData => {
                let typ = ttlv.require(Tag::SecretDataType)?.as_enum()?;
                Self::SecretData {
                    secret_data_type: SecretDataType::from_u32(typ).ok_or_else(|| {
                        KmipError::NotSupported(format!("secret data type {typ:#x}"))
                    })?,
                    key_block: key_block_of(ttlv)?,
                }
            }
            _ => Self::Other(ttlv.clone()),
        })
    }
}

fn key_block_of(ttlv: &TTLV) -> KmipResult<KeyBlock> {
    KeyBlock::from_ttlv(ttlv.require(Tag::KeyBlock)?)
}

/// Tags that hold a managed object inside a payload
pub(crate) const OBJECT_TAGS: [Tag; 9] = [
    Tag::Certificate,
    Tag::SymmetricKey,
    Tag::PublicKey,
    Tag::PrivateKey,
    Tag::SecretData,
    Tag::SplitKey,
    Tag::Template,
    Tag::OpaqueObject,
    Tag::PGPKey,
];

mod hex_upper {
    use serde::Serializer;

    pub(super) fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode_upper(bytes))
    }
}

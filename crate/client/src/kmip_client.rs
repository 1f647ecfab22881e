//! KMIP operations offered by [`KmipClient`]

use okms_kmip::kmip_1_4::{
    kmip_attributes::{self, Attribute},
    kmip_objects::{KeyBlock, ManagedObject},
    kmip_operations::{
        Activate, AddAttribute, AddAttributeResponse, Create, CreateKeyPair, CreateResponse,
        Destroy, Get, GetAttributes, GetAttributesResponse, GetResponse, IdentifierResponse,
        IdentifierWithAttributes, KeyPairResponse, Locate, LocateResponse, ReKey, ReKeyKeyPair,
        Register, Revoke,
    },
    kmip_types::{
        CertificateType, CryptographicAlgorithm, CryptographicUsageMask, KeyFormatType,
        ObjectType, RevocationReasonCode, SecretDataType,
    },
};

use crate::{
    KmipClient,
    encodings::{certificate_der_from_pem, private_key_block_from_pem, public_key_block_from_pem},
    error::result::KmsClientResult,
};

/// Material handed to [`KmipClient::register`]
#[derive(Debug, Clone)]
pub enum RegisterMaterial {
    /// A password, sent as opaque secret data
    Secret(Vec<u8>),
    Symmetric {
        algorithm: CryptographicAlgorithm,
        key: Vec<u8>,
    },
    /// DER or PEM encoded X.509 certificate
    Certificate { value: Vec<u8>, pem: bool },
    /// PEM public key, or PEM private key whose public half is registered
    PemPublicKey(Vec<u8>),
    PemPrivateKey(Vec<u8>),
}

impl RegisterMaterial {
    fn into_object(self) -> KmsClientResult<(ManagedObject, Vec<Attribute>)> {
        Ok(match self {
            Self::Secret(secret) => (
                ManagedObject::SecretData {
                    secret_data_type: SecretDataType::Password,
                    key_block: KeyBlock::new(KeyFormatType::Opaque, secret, None, None),
                },
                vec![],
            ),
            Self::Symmetric { algorithm, key } => {
                let bits = i32::try_from(key.len() * 8).unwrap_or(i32::MAX);
                (
                    ManagedObject::SymmetricKey(KeyBlock::new(
                        KeyFormatType::Raw,
                        key,
                        Some(algorithm),
                        Some(bits),
                    )),
                    vec![
                        Attribute::cryptographic_algorithm(algorithm),
                        Attribute::cryptographic_length(bits),
                    ],
                )
            }
            Self::Certificate { value, pem } => {
                let certificate_value = if pem {
                    certificate_der_from_pem(&value)?
                } else {
                    value
                };
                (
                    ManagedObject::Certificate {
                        certificate_type: CertificateType::X509,
                        certificate_value,
                    },
                    vec![],
                )
            }
            Self::PemPublicKey(pem) => {
                let key_block = public_key_block_from_pem(&pem)?;
                let attributes = key_attributes(&key_block);
                (ManagedObject::PublicKey(key_block), attributes)
            }
            Self::PemPrivateKey(pem) => {
                let key_block = private_key_block_from_pem(&pem)?;
                let attributes = key_attributes(&key_block);
                (ManagedObject::PrivateKey(key_block), attributes)
            }
        })
    }
}

fn key_attributes(key_block: &KeyBlock) -> Vec<Attribute> {
    let mut attributes = Vec::with_capacity(2);
    if let Some(algorithm) = key_block.cryptographic_algorithm {
        attributes.push(Attribute::cryptographic_algorithm(algorithm));
    }
    if let Some(length) = key_block.cryptographic_length {
        attributes.push(Attribute::cryptographic_length(length));
    }
    attributes
}

impl KmipClient {
    /// Create a symmetric key. `attributes` come on top of the algorithm,
    /// length and usage mask.
    pub fn create_symmetric(
        &self,
        algorithm: CryptographicAlgorithm,
        length: i32,
        usage: CryptographicUsageMask,
        attributes: Vec<Attribute>,
    ) -> KmsClientResult<CreateResponse> {
        let mut all = vec![
            Attribute::cryptographic_algorithm(algorithm),
            Attribute::cryptographic_length(length),
            Attribute::usage_mask(usage),
        ];
        all.extend(attributes);
        self.send(&Create {
            object_type: ObjectType::SymmetricKey,
            attributes: all,
        })
    }

    pub fn create_key_pair(&self, request: &CreateKeyPair) -> KmsClientResult<KeyPairResponse> {
        self.send(request)
    }

    /// Register an object built from local material, with the usage mask
    /// (ignored for secrets and certificates) and extra attributes
    pub fn register(
        &self,
        material: RegisterMaterial,
        usage: Option<CryptographicUsageMask>,
        attributes: Vec<Attribute>,
    ) -> KmsClientResult<IdentifierWithAttributes> {
        let (object, mut all) = material.into_object()?;
        if let Some(usage) = usage {
            all.push(Attribute::usage_mask(usage));
        }
        all.extend(attributes);
        self.send(&Register {
            object,
            attributes: all,
        })
    }

    pub fn get(&self, unique_identifier: &str) -> KmsClientResult<GetResponse> {
        self.send(&Get {
            unique_identifier: unique_identifier.to_owned(),
        })
    }

    /// Fetch the named attributes, or all of them when `names` is empty
    pub fn get_attributes(
        &self,
        unique_identifier: &str,
        names: &[&str],
    ) -> KmsClientResult<GetAttributesResponse> {
        self.send(&GetAttributes {
            unique_identifier: unique_identifier.to_owned(),
            attribute_names: names.iter().map(|n| (*n).to_owned()).collect(),
        })
    }

    pub fn add_attribute(
        &self,
        unique_identifier: &str,
        attribute: Attribute,
    ) -> KmsClientResult<AddAttributeResponse> {
        self.send(&AddAttribute {
            unique_identifier: unique_identifier.to_owned(),
            attribute,
        })
    }

    pub fn activate(&self, unique_identifier: &str) -> KmsClientResult<IdentifierResponse> {
        self.send(&Activate {
            unique_identifier: unique_identifier.to_owned(),
        })
    }

    pub fn revoke(
        &self,
        unique_identifier: &str,
        reason: RevocationReasonCode,
        message: Option<String>,
    ) -> KmsClientResult<IdentifierResponse> {
        self.send(&Revoke {
            unique_identifier: unique_identifier.to_owned(),
            reason,
            message,
        })
    }

    pub fn destroy(&self, unique_identifier: &str) -> KmsClientResult<IdentifierResponse> {
        self.send(&Destroy {
            unique_identifier: unique_identifier.to_owned(),
        })
    }

    /// Identifiers of the objects matching all the given attributes
    pub fn locate(&self, attributes: Vec<Attribute>) -> KmsClientResult<LocateResponse> {
        self.send(&Locate {
            maximum_items: None,
            attributes,
        })
    }

    pub fn rekey(
        &self,
        unique_identifier: &str,
        offset: Option<u32>,
    ) -> KmsClientResult<IdentifierWithAttributes> {
        self.send(&ReKey {
            unique_identifier: unique_identifier.to_owned(),
            offset,
        })
    }

    pub fn rekey_key_pair(
        &self,
        private_key_unique_identifier: &str,
        offset: Option<u32>,
    ) -> KmsClientResult<KeyPairResponse> {
        self.send(&ReKeyKeyPair {
            private_key_unique_identifier: private_key_unique_identifier.to_owned(),
            offset,
        })
    }

    /// Object type of a managed object, read from its attributes
    pub fn object_type(&self, unique_identifier: &str) -> KmsClientResult<Option<ObjectType>> {
        let response = self.get_attributes(unique_identifier, &[kmip_attributes::OBJECT_TYPE])?;
        Ok(response
            .find(kmip_attributes::OBJECT_TYPE)
            .and_then(Attribute::as_enum::<ObjectType>))
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use okms_kmip::kmip_1_4::{
        kmip_attributes,
        kmip_objects::ManagedObject,
        kmip_types::{CryptographicAlgorithm, KeyFormatType, SecretDataType},
    };
    use openssl::rsa::Rsa;

    use super::RegisterMaterial;

    #[test]
    fn test_secret_material() {
        let (object, attributes) = RegisterMaterial::Secret(b"pwd".to_vec())
            .into_object()
            .unwrap();
        let ManagedObject::SecretData {
            secret_data_type,
            key_block,
        } = object
        else {
            panic!("expected secret data");
        };
        assert_eq!(secret_data_type, SecretDataType::Password);
        assert_eq!(key_block.key_format_type, KeyFormatType::Opaque);
        assert!(attributes.is_empty());
    }

    #[test]
    fn test_symmetric_material_length() {
        let (_, attributes) = RegisterMaterial::Symmetric {
            algorithm: CryptographicAlgorithm::AES,
            key: vec![0; 32],
        }
        .into_object()
        .unwrap();
        assert_eq!(attributes[1].name, kmip_attributes::CRYPTOGRAPHIC_LENGTH);
        assert_eq!(attributes[1].render(), "256");
    }

    #[test]
    fn test_key_pair_from_one_pem() {
        let pem = Rsa::generate(2048).unwrap().private_key_to_pem().unwrap();
        let (private, _) = RegisterMaterial::PemPrivateKey(pem.clone())
            .into_object()
            .unwrap();
        let (public, attributes) = RegisterMaterial::PemPublicKey(pem).into_object().unwrap();
        assert!(matches!(private, ManagedObject::PrivateKey(_)));
        assert!(matches!(public, ManagedObject::PublicKey(_)));
        assert_eq!(attributes[0].render(), "RSA");
    }

    #[test]
    fn test_pem_certificate_requires_certificate_block() {
        let pem = Rsa::generate(2048).unwrap().public_key_to_pem().unwrap();
        let err = RegisterMaterial::Certificate { value: pem, pem: true }
            .into_object()
            .unwrap_err();
        assert!(err.to_string().contains("Expected a CERTIFICATE"), "{err}");
    }
}

//! Clients for the two surfaces of an OKMS domain: the REST API and the
//! KMIP 1.4 socket, plus the local data-key stream codec.

pub use datakey::{DEFAULT_BLOCK_SIZE, DataKeyDecryptor, DataKeyEncryptor};
pub use encodings::{der_to_pem, object_to_bytes, private_key_pem_to_pkcs8, public_key_from_pem};
pub use error::{
    KmsClientError,
    result::{KmsClientResult, KmsClientResultHelper},
};
pub use file_utils::{read_bytes_from_file, read_bytes_from_file_max, write_bytes_to_file};
pub use jwk::Jwk;
pub use kmip_client::RegisterMaterial;
pub use kms_rest_client::{DEFAULT_RETRY, KmsRestClient, RestAuth, RestClientConfig};
pub use okms_kmip;
pub use secrets::{
    ListSecretsResponse, Secret, SecretConfig, SecretMetadata, SecretMetadataRequest,
    SecretVersion,
};
pub use service_keys::{
    CreateImportServiceKeyRequest, DataKey, KeyType, ListServiceKeysResponse, ServiceKey,
};
pub use socket_client::{KmipClient, KmipClientConfig, MAX_RESPONSE_SIZE};

mod datakey;
mod encodings;
mod error;
mod file_utils;
mod jwk;
mod kmip_client;
mod kms_rest_client;
mod secrets;
mod service_keys;
mod socket_client;

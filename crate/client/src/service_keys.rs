//! Domain service keys: lifecycle, encryption, data keys and signatures

use base64::{Engine, engine::general_purpose::STANDARD};
use openssl::pkey::PKey;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::{
    KmsRestClient,
    error::result::{KmsClientResult, KmsClientResultHelper},
    jwk::Jwk,
};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyType {
    #[serde(rename = "oct")]
    Oct,
    #[serde(rename = "RSA")]
    Rsa,
    #[serde(rename = "EC")]
    Ec,
}

impl std::fmt::Display for KeyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Oct => "oct",
            Self::Rsa => "RSA",
            Self::Ec => "EC",
        })
    }
}

/// A service key as returned by the API
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ServiceKey {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub key_type: KeyType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub curve: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operations: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keys: Option<Vec<Jwk>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Map<String, Value>>,
}

impl ServiceKey {
    /// String attribute of the key, e.g. `activation_date`
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .as_ref()
            .and_then(|attributes| attributes.get(name))
            .and_then(Value::as_str)
    }

    /// Lifecycle state, from the attributes first
    #[must_use]
    pub fn key_state(&self) -> Option<&str> {
        self.attribute("state").or(self.state.as_deref())
    }

    /// Creation date, from the attributes first
    #[must_use]
    pub fn creation_date(&self) -> Option<&str> {
        self.attribute("original_creation_date")
            .or(self.created_at.as_deref())
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ListServiceKeysResponse {
    #[serde(default)]
    pub objects_list: Vec<ServiceKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continuation_token: Option<String>,
    #[serde(default)]
    pub is_truncated: bool,
}

#[derive(Serialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct CreateImportServiceKeyRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub key_type: Option<KeyType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub curve: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operations: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keys: Option<Vec<Jwk>>,
}

#[derive(Serialize)]
struct PatchServiceKeyRequest<'a> {
    name: &'a str,
}

#[derive(Serialize)]
struct DeactivateServiceKeyRequest<'a> {
    reason: &'a str,
}

#[derive(Serialize)]
struct EncryptRequest<'a> {
    plaintext: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<&'a str>,
}

#[derive(Deserialize)]
struct EncryptResponse {
    ciphertext: String,
}

#[derive(Serialize)]
struct DecryptRequest<'a> {
    ciphertext: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<&'a str>,
}

#[derive(Deserialize)]
struct DecryptResponse {
    plaintext: String,
}

#[derive(Serialize)]
struct GenerateDataKeyRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    size: u32,
}

/// A data key generated by the service: the plain key (base64) and the
/// same key wrapped by the service key
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct DataKey {
    #[serde(rename = "plaintext")]
    pub plain: String,
    #[serde(rename = "key")]
    pub encrypted: String,
}

impl DataKey {
    pub fn plain_key(&self) -> KmsClientResult<Zeroizing<Vec<u8>>> {
        Ok(Zeroizing::new(STANDARD.decode(&self.plain)?))
    }
}

#[derive(Serialize)]
struct DecryptDataKeyRequest<'a> {
    key: &'a str,
}

#[derive(Serialize)]
struct SignRequest<'a> {
    alg: &'a str,
    isdigest: bool,
    message: String,
}

#[derive(Deserialize)]
struct SignResponse {
    signature: String,
}

#[derive(Serialize)]
struct VerifyRequest<'a> {
    alg: &'a str,
    isdigest: bool,
    message: String,
    signature: &'a str,
}

#[derive(Deserialize)]
struct VerifyResponse {
    result: bool,
}

const NO_BODY: Option<&()> = None;

impl KmsRestClient {
    /// One page of service keys
    pub async fn list_service_keys(
        &self,
        page_size: Option<u32>,
        continuation_token: Option<&str>,
        state: Option<&str>,
    ) -> KmsClientResult<ListServiceKeysResponse> {
        let mut query = Vec::new();
        if let Some(page_size) = page_size {
            query.push(("pageSize", page_size.to_string()));
        }
        if let Some(token) = continuation_token {
            query.push(("continuationToken", token.to_owned()));
        }
        if let Some(state) = state {
            query.push(("state", state.to_owned()));
        }
        self.call(Method::GET, self.url(["v1", "servicekey"])?, &query, NO_BODY)
            .await
    }

    /// Follow the continuation tokens until every page is read
    pub async fn list_all_service_keys(
        &self,
        page_size: Option<u32>,
        state: Option<&str>,
    ) -> KmsClientResult<Vec<ServiceKey>> {
        let mut keys = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let page = self
                .list_service_keys(page_size, token.as_deref(), state)
                .await?;
            keys.extend(page.objects_list);
            match page.continuation_token {
                Some(next) if page.is_truncated && !next.is_empty() => token = Some(next),
                _ => return Ok(keys),
            }
        }
    }

    pub async fn create_import_service_key(
        &self,
        body: &CreateImportServiceKeyRequest,
    ) -> KmsClientResult<ServiceKey> {
        self.call(Method::POST, self.url(["v1", "servicekey"])?, &[], Some(body))
            .await
    }

    /// Service key metadata, with its public material when `format` is `jwk`
    pub async fn get_service_key(
        &self,
        id: &Uuid,
        format: Option<&str>,
    ) -> KmsClientResult<ServiceKey> {
        let query: Vec<_> = format.map(|f| ("format", f.to_owned())).into_iter().collect();
        self.call(
            Method::GET,
            self.url(["v1", "servicekey", id.to_string().as_str()])?,
            &query,
            NO_BODY,
        )
        .await
    }

    pub async fn update_service_key(&self, id: &Uuid, name: &str) -> KmsClientResult<ServiceKey> {
        self.call(
            Method::PUT,
            self.url(["v1", "servicekey", id.to_string().as_str()])?,
            &[],
            Some(&PatchServiceKeyRequest { name }),
        )
        .await
    }

    pub async fn delete_service_key(&self, id: &Uuid) -> KmsClientResult<()> {
        self.call_no_content(
            Method::DELETE,
            self.url(["v1", "servicekey", id.to_string().as_str()])?,
            &[],
            NO_BODY,
        )
        .await
    }

    pub async fn activate_service_key(&self, id: &Uuid) -> KmsClientResult<()> {
        self.call_no_content(
            Method::POST,
            self.url(["v1", "servicekey", id.to_string().as_str(), "activate"])?,
            &[],
            NO_BODY,
        )
        .await
    }

    pub async fn deactivate_service_key(&self, id: &Uuid, reason: &str) -> KmsClientResult<()> {
        self.call_no_content(
            Method::POST,
            self.url(["v1", "servicekey", id.to_string().as_str(), "deactivate"])?,
            &[],
            Some(&DeactivateServiceKeyRequest { reason }),
        )
        .await
    }

    /// Encrypt a small UTF-8 payload with the service key
    pub async fn encrypt(
        &self,
        id: &Uuid,
        plaintext: &str,
        context: Option<&str>,
    ) -> KmsClientResult<String> {
        let response: EncryptResponse = self
            .call(
                Method::POST,
                self.url(["v1", "servicekey", id.to_string().as_str(), "encrypt"])?,
                &[],
                Some(&EncryptRequest { plaintext, context }),
            )
            .await?;
        Ok(response.ciphertext)
    }

    pub async fn decrypt(
        &self,
        id: &Uuid,
        ciphertext: &str,
        context: Option<&str>,
    ) -> KmsClientResult<Zeroizing<String>> {
        let response: DecryptResponse = self
            .call(
                Method::POST,
                self.url(["v1", "servicekey", id.to_string().as_str(), "decrypt"])?,
                &[],
                Some(&DecryptRequest {
                    ciphertext,
                    context,
                }),
            )
            .await?;
        Ok(Zeroizing::new(response.plaintext))
    }

    /// Generate a data key of `size` bits, wrapped by the service key
    pub async fn generate_data_key(
        &self,
        id: &Uuid,
        name: Option<&str>,
        size: u32,
    ) -> KmsClientResult<DataKey> {
        self.call(
            Method::POST,
            self.url(["v1", "servicekey", id.to_string().as_str(), "datakey"])?,
            &[],
            Some(&GenerateDataKeyRequest { name, size }),
        )
        .await
    }

    /// Unwrap a data key, returning the plain key bytes
    pub async fn decrypt_data_key(
        &self,
        id: &Uuid,
        encrypted_key: &str,
    ) -> KmsClientResult<Zeroizing<Vec<u8>>> {
        let response: DecryptResponse = self
            .call(
                Method::POST,
                self.url(["v1", "servicekey", id.to_string().as_str(), "datakey", "decrypt"])?,
                &[],
                Some(&DecryptDataKeyRequest { key: encrypted_key }),
            )
            .await?;
        let plain = Zeroizing::new(response.plaintext);
        Ok(Zeroizing::new(
            STANDARD
                .decode(plain.as_bytes())
                .context("Invalid data key returned by the server")?,
        ))
    }

    /// Sign a digest computed locally, returning the base64 signature
    pub async fn sign(&self, id: &Uuid, alg: &str, digest: &[u8]) -> KmsClientResult<String> {
        let response: SignResponse = self
            .call(
                Method::POST,
                self.url(["v1", "servicekey", id.to_string().as_str(), "sign"])?,
                &[],
                Some(&SignRequest {
                    alg,
                    isdigest: true,
                    message: STANDARD.encode(digest),
                }),
            )
            .await?;
        Ok(response.signature)
    }

    pub async fn verify(
        &self,
        id: &Uuid,
        alg: &str,
        digest: &[u8],
        signature: &str,
    ) -> KmsClientResult<bool> {
        let response: VerifyResponse = self
            .call(
                Method::POST,
                self.url(["v1", "servicekey", id.to_string().as_str(), "verify"])?,
                &[],
                Some(&VerifyRequest {
                    alg,
                    isdigest: true,
                    message: STANDARD.encode(digest),
                    signature,
                }),
            )
            .await?;
        Ok(response.result)
    }

    /// Import raw symmetric key material as an `oct` key
    pub async fn import_key(
        &self,
        key: &[u8],
        name: &str,
        context: &str,
        operations: Vec<String>,
    ) -> KmsClientResult<ServiceKey> {
        let body = import_request(Jwk::symmetric(key), KeyType::Oct, name, context, operations);
        self.create_import_service_key(&body).await
    }

    /// Import a PEM private key (PKCS#1, SEC1 or PKCS#8) as an RSA or EC key
    pub async fn import_key_pair_pem(
        &self,
        pem: &[u8],
        name: &str,
        context: &str,
        operations: Vec<String>,
    ) -> KmsClientResult<ServiceKey> {
        let key = PKey::private_key_from_pem(pem).context("Invalid PEM private key")?;
        let jwk = Jwk::from_private_key(&key)?;
        let key_type = if jwk.kty == "RSA" {
            KeyType::Rsa
        } else {
            KeyType::Ec
        };
        let body = import_request(jwk, key_type, name, context, operations);
        self.create_import_service_key(&body).await
    }
}

fn import_request(
    jwk: Jwk,
    key_type: KeyType,
    name: &str,
    context: &str,
    operations: Vec<String>,
) -> CreateImportServiceKeyRequest {
    CreateImportServiceKeyRequest {
        name: name.to_owned(),
        context: Some(context.to_owned()),
        key_type: Some(key_type),
        operations: (!operations.is_empty()).then_some(operations),
        keys: Some(vec![jwk]),
        ..CreateImportServiceKeyRequest::default()
    }
}

//! Versioned key/value secrets (`/v2/secret`)

use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{KmsRestClient, error::result::KmsClientResult};

/// Secret engine configuration, also used as the update body where only
/// the given fields are sent
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SecretConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cas_required: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deactivate_version_after: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_versions: Option<u32>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct SecretMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cas_required: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_version: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deactivate_version_after: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_versions: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oldest_version: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_metadata: Option<Map<String, Value>>,
}

/// Metadata fields a client may set
#[derive(Serialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct SecretMetadataRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cas_required: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deactivate_version_after: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_versions: Option<u32>,
}

impl SecretMetadataRequest {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.cas_required.is_none()
            && self.deactivate_version_after.is_none()
            && self.max_versions.is_none()
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SecretVersion {
    pub id: u32,
    #[serde(default)]
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deactivated_at: Option<String>,
    #[serde(default)]
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Map<String, Value>>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct SecretVersionData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Map<String, Value>>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Secret {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<SecretMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<SecretVersionData>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ListSecretsResponse {
    #[serde(default)]
    pub results: Vec<Secret>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_count: Option<u32>,
}

#[derive(Serialize)]
struct PostSecretRequest<'a> {
    path: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<&'a SecretMetadataRequest>,
    version: SecretVersionData,
}

#[derive(Serialize)]
struct PutSecretRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<&'a SecretMetadataRequest>,
    version: SecretVersionData,
}

#[derive(Serialize)]
struct PutSecretVersionRequest<'a> {
    state: &'a str,
}

const NO_BODY: Option<&()> = None;

fn secret_path(path: &str) -> impl Iterator<Item = &str> {
    ["v2", "secret"]
        .into_iter()
        .chain(path.split('/').filter(|s| !s.is_empty()))
}

fn cas_query(cas: Option<u32>) -> Vec<(&'static str, String)> {
    cas.map(|cas| ("cas", cas.to_string())).into_iter().collect()
}

impl KmsRestClient {
    pub async fn get_secret_config(&self) -> KmsClientResult<SecretConfig> {
        self.call(Method::GET, self.url(["v2", "secret", "config"])?, &[], NO_BODY)
            .await
    }

    pub async fn update_secret_config(&self, config: &SecretConfig) -> KmsClientResult<()> {
        self.call_no_content(
            Method::PUT,
            self.url(["v2", "secret", "config"])?,
            &[],
            Some(config),
        )
        .await
    }

    pub async fn list_secrets(
        &self,
        page_size: u32,
        page_number: u32,
    ) -> KmsClientResult<ListSecretsResponse> {
        self.call(
            Method::GET,
            self.url(["v2", "secret"])?,
            &[
                ("pageSize", page_size.to_string()),
                ("pageNumber", page_number.to_string()),
            ],
            NO_BODY,
        )
        .await
    }

    pub async fn create_secret(
        &self,
        path: &str,
        metadata: &SecretMetadataRequest,
        data: Map<String, Value>,
    ) -> KmsClientResult<Secret> {
        let body = PostSecretRequest {
            path,
            metadata: (!metadata.is_empty()).then_some(metadata),
            version: SecretVersionData { data: Some(data) },
        };
        self.call(Method::POST, self.url(["v2", "secret"])?, &[], Some(&body))
            .await
    }

    /// Secret metadata and, when `include_data` is set, the data of the
    /// requested version (the latest one by default)
    pub async fn get_secret(
        &self,
        path: &str,
        version: Option<u32>,
        include_data: bool,
    ) -> KmsClientResult<Secret> {
        let mut query = vec![("includeData", include_data.to_string())];
        if let Some(version) = version {
            query.push(("version", version.to_string()));
        }
        self.call(Method::GET, self.url(secret_path(path))?, &query, NO_BODY)
            .await
    }

    /// Write a new version of a secret and update its metadata
    pub async fn update_secret(
        &self,
        path: &str,
        cas: Option<u32>,
        metadata: &SecretMetadataRequest,
        data: Map<String, Value>,
    ) -> KmsClientResult<Secret> {
        let body = PutSecretRequest {
            metadata: (!metadata.is_empty()).then_some(metadata),
            version: SecretVersionData { data: Some(data) },
        };
        self.call(
            Method::PUT,
            self.url(secret_path(path))?,
            &cas_query(cas),
            Some(&body),
        )
        .await
    }

    pub async fn delete_secret(&self, path: &str) -> KmsClientResult<()> {
        self.call_no_content(Method::DELETE, self.url(secret_path(path))?, &[], NO_BODY)
            .await
    }

    pub async fn list_secret_versions(&self, path: &str) -> KmsClientResult<Vec<SecretVersion>> {
        self.call(
            Method::GET,
            self.url(secret_path(path).chain(["version"]))?,
            &[],
            NO_BODY,
        )
        .await
    }

    pub async fn create_secret_version(
        &self,
        path: &str,
        cas: Option<u32>,
        data: Map<String, Value>,
    ) -> KmsClientResult<SecretVersion> {
        self.call(
            Method::POST,
            self.url(secret_path(path).chain(["version"]))?,
            &cas_query(cas),
            Some(&SecretVersionData { data: Some(data) }),
        )
        .await
    }

    pub async fn get_secret_version(
        &self,
        path: &str,
        version: u32,
        include_data: bool,
    ) -> KmsClientResult<SecretVersion> {
        let version = version.to_string();
        self.call(
            Method::GET,
            self.url(secret_path(path).chain(["version", version.as_str()]))?,
            &[("includeData", include_data.to_string())],
            NO_BODY,
        )
        .await
    }

    /// Change the state of a version: `active`, `deactivated` or `deleted`
    pub async fn update_secret_version(
        &self,
        path: &str,
        version: u32,
        state: &str,
    ) -> KmsClientResult<SecretVersion> {
        let version = version.to_string();
        self.call(
            Method::PUT,
            self.url(secret_path(path).chain(["version", version.as_str()]))?,
            &[],
            Some(&PutSecretVersionRequest { state }),
        )
        .await
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{Secret, SecretConfig, SecretMetadataRequest, secret_path};

    #[test]
    fn test_secret_path_segments() {
        assert_eq!(
            secret_path("/app/db//password").collect::<Vec<_>>(),
            ["v2", "secret", "app", "db", "password"]
        );
    }

    #[test]
    fn test_config_update_sends_given_fields_only() {
        let config = SecretConfig {
            max_versions: Some(5),
            ..SecretConfig::default()
        };
        assert_eq!(serde_json::to_value(&config).unwrap(), json!({"maxVersions": 5}));
        assert!(SecretMetadataRequest::default().is_empty());
    }

    #[test]
    fn test_secret_model() {
        let secret: Secret = serde_json::from_value(json!({
            "path": "app/db",
            "metadata": {"casRequired": true, "currentVersion": 3, "maxVersions": 10},
            "version": {"data": {"user": "admin"}}
        }))
        .unwrap();
        let metadata = secret.metadata.unwrap();
        assert_eq!(metadata.current_version, Some(3));
        assert_eq!(metadata.cas_required, Some(true));
        assert_eq!(secret.version.unwrap().data.unwrap()["user"], "admin");
    }
}

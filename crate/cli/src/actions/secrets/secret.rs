use clap::{ArgAction, Parser};
use okms_client::{KmsRestClient, Secret};

use super::{MetadataArgs, data_table, kv_builder::parse_args_data, metadata_table, sections};
use crate::{
    actions::console::{Stdout, Table},
    error::result::KmsCliResult,
};

fn secret_text(secret: &Secret, path: &str) -> String {
    let mut parts = Vec::new();
    if let Some(metadata) = &secret.metadata {
        parts.push((
            "Metadata",
            metadata_table(Some(secret.path.as_deref().unwrap_or(path)), metadata),
        ));
    }
    if let Some(data) = secret.version.as_ref().and_then(|v| v.data.as_ref()) {
        parts.push(("Data", data_table(data)));
    }
    sections(&parts)
}

/// List secrets
#[derive(Parser, Debug)]
pub struct ListAction {
    /// Maximum number of secrets returned in one call
    #[arg(long, alias = "page_size", default_value_t = 100)]
    page_size: u32,

    /// Number of the page to return
    #[arg(long, alias = "page_number", default_value_t = 1)]
    page_number: u32,
}

impl ListAction {
    pub async fn run(&self, client: &KmsRestClient, stdout: &Stdout) -> KmsCliResult<()> {
        let response = client.list_secrets(self.page_size, self.page_number).await?;
        stdout.write(&response, || {
            let mut table = Table::new(&["Path", "Version", "Created at", "Updated at"]);
            for secret in &response.results {
                let metadata = secret.metadata.clone().unwrap_or_default();
                table.add_row(&[
                    secret.path.clone().unwrap_or_default(),
                    metadata
                        .current_version
                        .map(|v| v.to_string())
                        .unwrap_or_default(),
                    metadata.created_at.unwrap_or_default(),
                    metadata.updated_at.unwrap_or_default(),
                ]);
            }
            table.render()
        })
    }
}

/// Create a secret
#[derive(Parser, Debug)]
pub struct CreateAction {
    /// Path of the secret
    path: String,

    /// Secret data: `key=value` pairs, `-` for a JSON object on stdin, or
    /// an inline JSON object
    #[arg(value_name = "DATA", required = true)]
    data: Vec<String>,

    #[command(flatten)]
    metadata: MetadataArgs,
}

impl CreateAction {
    pub async fn run(&self, client: &KmsRestClient, stdout: &Stdout) -> KmsCliResult<()> {
        let data = parse_args_data(&self.data)?;
        let secret = client
            .create_secret(&self.path, &self.metadata.request(), data)
            .await?;
        stdout.write(&secret, || secret_text(&secret, &self.path))
    }
}

/// Retrieve a secret
#[derive(Parser, Debug)]
pub struct GetAction {
    /// Path of the secret
    path: String,

    /// Version to retrieve. Defaults to the latest one
    #[arg(long = "version", value_name = "VERSION")]
    secret_version: Option<u32>,

    /// Include the secret data
    #[arg(long, default_value_t = true, action = ArgAction::Set, value_name = "BOOL")]
    include_data: bool,
}

impl GetAction {
    pub async fn run(&self, client: &KmsRestClient, stdout: &Stdout) -> KmsCliResult<()> {
        let secret = client
            .get_secret(&self.path, self.secret_version, self.include_data)
            .await?;
        stdout.write(&secret, || secret_text(&secret, &self.path))
    }
}

/// Write a new version of a secret, and update its metadata
#[derive(Parser, Debug)]
pub struct UpdateAction {
    /// Path of the secret
    path: String,

    /// Secret data: `key=value` pairs, `-` for a JSON object on stdin, or
    /// an inline JSON object
    #[arg(value_name = "DATA", required = true)]
    data: Vec<String>,

    /// Current version of the secret. Required when cas is enabled
    #[arg(long)]
    cas: Option<u32>,

    #[command(flatten)]
    metadata: MetadataArgs,
}

impl UpdateAction {
    pub async fn run(&self, client: &KmsRestClient, stdout: &Stdout) -> KmsCliResult<()> {
        let data = parse_args_data(&self.data)?;
        let secret = client
            .update_secret(&self.path, self.cas, &self.metadata.request(), data)
            .await?;
        stdout.write(&secret, || secret_text(&secret, &self.path))
    }
}

/// Delete a secret and all its versions
#[derive(Parser, Debug)]
pub struct DeleteAction {
    /// Path of the secret
    path: String,
}

impl DeleteAction {
    pub async fn run(&self, client: &KmsRestClient, stdout: &Stdout) -> KmsCliResult<()> {
        client.delete_secret(&self.path).await?;
        stdout.message(&format!("Secret {} successfully deleted", self.path))
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use clap::Parser;
    use okms_client::Secret;
    use serde_json::json;

    use super::{CreateAction, GetAction, ListAction, secret_text};

    #[test]
    fn test_create_flags() {
        let action = CreateAction::try_parse_from([
            "create",
            "app/db",
            "user=admin",
            "password=pa55",
            "--max-versions",
            "3",
        ])
        .unwrap();
        assert_eq!(action.data, ["user=admin", "password=pa55"]);
        let metadata = action.metadata.request();
        assert_eq!(metadata.max_versions, Some(3));
        assert!(metadata.cas_required.is_none());
        assert!(CreateAction::try_parse_from(["create", "app/db"]).is_err());
    }

    #[test]
    fn test_list_paging_flags() {
        let action = ListAction::try_parse_from(["list"]).unwrap();
        assert_eq!((action.page_size, action.page_number), (100, 1));
        let action =
            ListAction::try_parse_from(["list", "--page-size", "10", "--page_number", "3"]).unwrap();
        assert_eq!((action.page_size, action.page_number), (10, 3));
        let action = ListAction::try_parse_from(["list", "--page_size", "5"]).unwrap();
        assert_eq!(action.page_size, 5);
    }

    #[test]
    fn test_get_include_data() {
        let action = GetAction::try_parse_from(["get", "app/db"]).unwrap();
        assert!(action.include_data);
        let action =
            GetAction::try_parse_from(["get", "app/db", "--include-data", "false", "--version", "2"])
                .unwrap();
        assert!(!action.include_data);
        assert_eq!(action.secret_version, Some(2));
    }

    #[test]
    fn test_secret_text() {
        let secret: Secret = serde_json::from_value(json!({
            "path": "app/db",
            "metadata": {"currentVersion": 1},
            "version": {"data": {"user": "admin"}},
        }))
        .unwrap();
        let text = secret_text(&secret, "ignored");
        assert!(text.starts_with("Metadata\nPath "), "{text}");
        assert!(text.contains("\n\nData\nKey   Value\n----  -----\nuser  admin\n"), "{text}");
    }
}

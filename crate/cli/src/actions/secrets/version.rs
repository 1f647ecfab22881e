use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use okms_client::{KmsRestClient, SecretVersion};

use super::{data_table, kv_builder::parse_args_data, sections, version_table};
use crate::{
    actions::console::{Stdout, Table},
    error::result::KmsCliResult,
};

/// Manage the versions of a secret
#[derive(Subcommand, Debug)]
pub enum VersionCommands {
    List(ListVersionsAction),
    Get(GetVersionAction),
    Create(CreateVersionAction),
    Update(UpdateVersionAction),
}

impl VersionCommands {
    pub async fn process(&self, client: &KmsRestClient, stdout: &Stdout) -> KmsCliResult<()> {
        match self {
            Self::List(action) => action.run(client, stdout).await,
            Self::Get(action) => action.run(client, stdout).await,
            Self::Create(action) => action.run(client, stdout).await,
            Self::Update(action) => action.run(client, stdout).await,
        }
    }
}

fn version_text(version: &SecretVersion) -> String {
    let mut parts = vec![("Metadata", version_table(version))];
    if let Some(data) = &version.data {
        parts.push(("Data", data_table(data)));
    }
    sections(&parts)
}

/// List the versions of a secret
#[derive(Parser, Debug)]
pub struct ListVersionsAction {
    /// Path of the secret
    path: String,
}

impl ListVersionsAction {
    pub async fn run(&self, client: &KmsRestClient, stdout: &Stdout) -> KmsCliResult<()> {
        let versions = client.list_secret_versions(&self.path).await?;
        stdout.write(&versions, || {
            let mut table = Table::new(&["Version", "State", "Created at", "Deactivated at"]);
            for version in &versions {
                table.add_row(&[
                    version.id.to_string(),
                    version.state.clone(),
                    version.created_at.clone(),
                    version.deactivated_at.clone().unwrap_or_default(),
                ]);
            }
            table.render()
        })
    }
}

/// Retrieve a version of a secret
#[derive(Parser, Debug)]
pub struct GetVersionAction {
    /// Path of the secret
    path: String,

    #[arg(value_name = "VERSION")]
    secret_version: u32,

    /// Include the secret data
    #[arg(long, default_value_t = true, action = ArgAction::Set, value_name = "BOOL")]
    include_data: bool,
}

impl GetVersionAction {
    pub async fn run(&self, client: &KmsRestClient, stdout: &Stdout) -> KmsCliResult<()> {
        let version = client
            .get_secret_version(&self.path, self.secret_version, self.include_data)
            .await?;
        stdout.write(&version, || version_text(&version))
    }
}

/// Write a new version of a secret
#[derive(Parser, Debug)]
pub struct CreateVersionAction {
    /// Path of the secret
    path: String,

    /// Secret data: `key=value` pairs, `-` for a JSON object on stdin, or
    /// an inline JSON object
    #[arg(value_name = "DATA", required = true)]
    data: Vec<String>,

    /// Current version of the secret. Required when cas is enabled
    #[arg(long)]
    cas: Option<u32>,
}

impl CreateVersionAction {
    pub async fn run(&self, client: &KmsRestClient, stdout: &Stdout) -> KmsCliResult<()> {
        let data = parse_args_data(&self.data)?;
        let version = client
            .create_secret_version(&self.path, self.cas, data)
            .await?;
        stdout.write(&version, || version_text(&version))
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum VersionState {
    Active,
    Deactivated,
    Deleted,
}

impl VersionState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Deactivated => "deactivated",
            Self::Deleted => "deleted",
        }
    }
}

/// Change the state of a version of a secret
#[derive(Parser, Debug)]
pub struct UpdateVersionAction {
    /// Path of the secret
    path: String,

    #[arg(value_name = "VERSION")]
    secret_version: u32,

    /// New state of the version
    #[arg(long, value_enum, required = true)]
    state: VersionState,
}

impl UpdateVersionAction {
    pub async fn run(&self, client: &KmsRestClient, stdout: &Stdout) -> KmsCliResult<()> {
        let version = client
            .update_secret_version(&self.path, self.secret_version, self.state.as_str())
            .await?;
        stdout.write(&version, || version_text(&version))
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{UpdateVersionAction, VersionState};

    #[test]
    fn test_update_requires_state() {
        assert!(UpdateVersionAction::try_parse_from(["update", "app/db", "2"]).is_err());
        let action =
            UpdateVersionAction::try_parse_from(["update", "app/db", "2", "--state", "deleted"])
                .unwrap();
        assert_eq!(action.secret_version, 2);
        assert_eq!(action.state, VersionState::Deleted);
        assert!(
            UpdateVersionAction::try_parse_from(["update", "app/db", "2", "--state", "gone"])
                .is_err()
        );
    }
}

use clap::{Parser, Subcommand};
use okms_client::{KmsRestClient, SecretConfig};

use crate::{
    actions::console::{KeyValueTable, Stdout},
    error::result::KmsCliResult,
};

/// Manage the secret engine configuration
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    Get(GetConfigAction),
    Update(UpdateConfigAction),
}

impl ConfigCommands {
    pub async fn process(&self, client: &KmsRestClient, stdout: &Stdout) -> KmsCliResult<()> {
        match self {
            Self::Get(action) => action.run(client, stdout).await,
            Self::Update(action) => action.run(client, stdout).await,
        }
    }
}

fn config_table(config: &SecretConfig) -> String {
    let mut table = KeyValueTable::new();
    table
        .add("CAS required", config.cas_required.unwrap_or_default())
        .add(
            "Deactivate version after",
            config.deactivate_version_after.as_deref().unwrap_or_default(),
        )
        .add(
            "Max versions",
            config.max_versions.unwrap_or_default(),
        );
    table.render()
}

/// Retrieve the secret engine configuration
#[derive(Parser, Debug)]
pub struct GetConfigAction;

impl GetConfigAction {
    pub async fn run(&self, client: &KmsRestClient, stdout: &Stdout) -> KmsCliResult<()> {
        let config = client.get_secret_config().await?;
        stdout.write(&config, || config_table(&config))
    }
}

/// Update the secret engine configuration. Only the given flags are changed
#[derive(Parser, Debug)]
pub struct UpdateConfigAction {
    /// Require the cas parameter on every write request
    #[arg(long, value_name = "BOOL", num_args = 0..=1, default_missing_value = "true")]
    cas_required: Option<bool>,

    /// Number of versions to keep per secret
    #[arg(long)]
    max_versions: Option<u32>,

    /// Time before a version is deactivated, such as `24h` or `30d`
    #[arg(long, value_name = "DURATION")]
    deactivate_after: Option<String>,
}

impl UpdateConfigAction {
    pub(crate) fn config(&self) -> SecretConfig {
        SecretConfig {
            cas_required: self.cas_required,
            deactivate_version_after: self.deactivate_after.clone(),
            max_versions: self.max_versions,
        }
    }

    pub async fn run(&self, client: &KmsRestClient, stdout: &Stdout) -> KmsCliResult<()> {
        client.update_secret_config(&self.config()).await?;
        stdout.message("Secret configuration updated")
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use clap::Parser;
    use okms_client::SecretConfig;

    use super::{UpdateConfigAction, config_table};

    #[test]
    fn test_update_only_given_flags() {
        let action =
            UpdateConfigAction::try_parse_from(["update", "--cas-required", "--max-versions", "5"])
                .unwrap();
        assert_eq!(
            action.config(),
            SecretConfig {
                cas_required: Some(true),
                deactivate_version_after: None,
                max_versions: Some(5),
            }
        );

        let action = UpdateConfigAction::try_parse_from(["update", "--cas-required", "false"])
            .unwrap();
        assert_eq!(action.config().cas_required, Some(false));
        assert!(action.config().max_versions.is_none());
    }

    #[test]
    fn test_config_table() {
        let config = SecretConfig {
            cas_required: Some(false),
            deactivate_version_after: Some("0s".to_owned()),
            max_versions: Some(10),
        };
        assert_eq!(
            config_table(&config),
            "CAS required              false\nDeactivate version after  0s\nMax versions              10\n"
        );
    }
}

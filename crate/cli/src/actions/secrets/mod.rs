use clap::{Parser, Subcommand};
use okms_client::{SecretMetadata, SecretMetadataRequest, SecretVersion};
use serde_json::{Map, Value};

use self::{
    config::ConfigCommands,
    secret::{CreateAction, DeleteAction, GetAction, ListAction, UpdateAction},
    version::VersionCommands,
};
use super::{
    CliContext, RestArgs,
    console::{KeyValueTable, Table},
};
use crate::error::result::KmsCliResult;

mod config;
mod kv_builder;
mod secret;
mod version;

/// Manage versioned key-value secrets
#[derive(Parser, Debug)]
pub struct SecretsCommand {
    #[command(flatten)]
    pub rest: RestArgs,

    #[command(subcommand)]
    pub command: SecretsCommands,
}

#[derive(Subcommand, Debug)]
pub enum SecretsCommands {
    #[command(subcommand)]
    Config(ConfigCommands),
    List(ListAction),
    Create(CreateAction),
    Get(GetAction),
    Update(UpdateAction),
    Delete(DeleteAction),
    #[command(subcommand)]
    Version(VersionCommands),
}

impl SecretsCommand {
    pub async fn process(&self, ctx: &CliContext) -> KmsCliResult<()> {
        let client = self.rest.client(ctx)?;
        let stdout = &ctx.stdout;
        match &self.command {
            SecretsCommands::Config(command) => command.process(&client, stdout).await,
            SecretsCommands::List(action) => action.run(&client, stdout).await,
            SecretsCommands::Create(action) => action.run(&client, stdout).await,
            SecretsCommands::Get(action) => action.run(&client, stdout).await,
            SecretsCommands::Update(action) => action.run(&client, stdout).await,
            SecretsCommands::Delete(action) => action.run(&client, stdout).await,
            SecretsCommands::Version(command) => command.process(&client, stdout).await,
        }
    }
}

/// Metadata flags shared by `create` and `update`
#[derive(clap::Args, Debug, Clone)]
pub struct MetadataArgs {
    /// Require the cas parameter on every write of the secret
    #[arg(long, value_name = "BOOL", num_args = 0..=1, default_missing_value = "true")]
    cas_required: Option<bool>,

    /// Number of versions to keep (the server keeps 10 by default)
    #[arg(long)]
    max_versions: Option<u32>,

    /// Time before a version is deactivated, such as `24h` or `30d`
    #[arg(long, alias = "deactivate-version-after", value_name = "DURATION")]
    deactivate_after: Option<String>,
}

impl MetadataArgs {
    pub(crate) fn request(&self) -> SecretMetadataRequest {
        SecretMetadataRequest {
            cas_required: self.cas_required,
            deactivate_version_after: self.deactivate_after.clone(),
            max_versions: self.max_versions,
        }
    }
}

/// Values are shown as text when they are strings, as JSON otherwise
fn display_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn opt_to_string<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

pub(crate) fn metadata_table(path: Option<&str>, metadata: &SecretMetadata) -> String {
    let mut table = KeyValueTable::new();
    table
        .add_opt("Path", path)
        .add("CAS required", metadata.cas_required.unwrap_or_default())
        .add("Created at", metadata.created_at.as_deref().unwrap_or_default())
        .add("Updated at", metadata.updated_at.as_deref().unwrap_or_default())
        .add("Current version", opt_to_string(metadata.current_version))
        .add("Oldest version", opt_to_string(metadata.oldest_version))
        .add("Max versions", opt_to_string(metadata.max_versions))
        .add(
            "Deactivate version after",
            metadata.deactivate_version_after.as_deref().unwrap_or_default(),
        )
        .add_opt(
            "Custom metadata",
            metadata
                .custom_metadata
                .as_ref()
                .filter(|custom| !custom.is_empty())
                .map(|custom| Value::Object(custom.clone())),
        );
    table.render()
}

pub(crate) fn data_table(data: &Map<String, Value>) -> String {
    let mut table = Table::new(&["Key", "Value"]);
    for (key, value) in data {
        table.add_row(&[key.clone(), display_value(value)]);
    }
    table.render()
}

pub(crate) fn version_table(version: &SecretVersion) -> String {
    let mut table = KeyValueTable::new();
    table
        .add("Version", version.id)
        .add("State", &version.state)
        .add("Created at", &version.created_at)
        .add(
            "Deactivated at",
            version.deactivated_at.as_deref().unwrap_or_default(),
        );
    table.render()
}

/// Sections separated by an empty line, each under its title
pub(crate) fn sections(parts: &[(&str, String)]) -> String {
    parts
        .iter()
        .map(|(title, body)| format!("{title}\n{body}"))
        .collect::<Vec<_>>()
        .join("\n")
}

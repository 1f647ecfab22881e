use clap::{Parser, Subcommand, ValueEnum};
use okms_client::ServiceKey;
use time::{OffsetDateTime, format_description::well_known::Rfc3339, macros::format_description};
use uuid::Uuid;

use self::{
    datakeys::DataKeysCommands,
    encrypt::{DecryptAction, EncryptAction},
    manage::{
        ActivateAction, DeactivateAction, DeleteAction, ExportAction, GenerateAction, GetAction,
        ImportAction, ListAction, UpdateAction,
    },
    sign::{SignAction, VerifyAction},
};
use super::{CliContext, RestArgs, console::KeyValueTable};
use crate::error::result::{KmsCliResult, KmsCliResultHelper};

mod datakeys;
mod encrypt;
mod manage;
mod openssh;
mod sign;

pub(crate) use self::sign::SignatureAlgorithm;

/// Manage domain keys
#[derive(Parser, Debug)]
pub struct KeysCommand {
    #[command(flatten)]
    pub rest: RestArgs,

    #[command(subcommand)]
    pub command: KeysCommands,
}

#[derive(Subcommand, Debug)]
pub enum KeysCommands {
    #[command(visible_alias = "ls")]
    List(ListAction),
    #[command(visible_aliases = ["new", "gen", "create", "add"])]
    Generate(GenerateAction),
    Update(UpdateAction),
    Export(ExportAction),
    Import(ImportAction),
    Get(GetAction),
    Encrypt(EncryptAction),
    Decrypt(DecryptAction),
    #[command(subcommand, visible_aliases = ["datakey", "dk"])]
    Datakeys(DataKeysCommands),
    Sign(SignAction),
    Verify(VerifyAction),
    Deactivate(DeactivateAction),
    #[command(visible_alias = "del")]
    Delete(DeleteAction),
    Activate(ActivateAction),
}

impl KeysCommand {
    pub async fn process(&self, ctx: &CliContext) -> KmsCliResult<()> {
        let client = self.rest.client(ctx)?;
        let stdout = &ctx.stdout;
        match &self.command {
            KeysCommands::List(action) => action.run(&client, stdout).await,
            KeysCommands::Generate(action) => action.run(&client, stdout).await,
            KeysCommands::Update(action) => action.run(&client, stdout).await,
            KeysCommands::Export(action) => action.run(&client, stdout).await,
            KeysCommands::Import(action) => action.run(&client, stdout).await,
            KeysCommands::Get(action) => action.run(&client, stdout).await,
            KeysCommands::Encrypt(action) => action.run(&client, stdout).await,
            KeysCommands::Decrypt(action) => action.run(&client, stdout).await,
            KeysCommands::Datakeys(command) => command.process(&client, stdout).await,
            KeysCommands::Sign(action) => action.run(&client, stdout).await,
            KeysCommands::Verify(action) => action.run(&client, stdout).await,
            KeysCommands::Deactivate(action) => action.run(&client).await,
            KeysCommands::Delete(action) => action.run(&client).await,
            KeysCommands::Activate(action) => action.run(&client).await,
        }
    }
}

pub(crate) fn parse_key_id(id: &str) -> KmsCliResult<Uuid> {
    Uuid::parse_str(id).with_context(|| format!("Invalid Key ID {id:?}"))
}

/// Key operations accepted by the service
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyUsage {
    #[value(name = "sign")]
    Sign,
    #[value(name = "verify")]
    Verify,
    #[value(name = "encrypt")]
    Encrypt,
    #[value(name = "decrypt")]
    Decrypt,
    #[value(name = "wrapKey")]
    WrapKey,
    #[value(name = "unwrapKey")]
    UnwrapKey,
    #[value(name = "deriveKey")]
    DeriveKey,
    #[value(name = "deriveBits")]
    DeriveBits,
}

impl KeyUsage {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sign => "sign",
            Self::Verify => "verify",
            Self::Encrypt => "encrypt",
            Self::Decrypt => "decrypt",
            Self::WrapKey => "wrapKey",
            Self::UnwrapKey => "unwrapKey",
            Self::DeriveKey => "deriveKey",
            Self::DeriveBits => "deriveBits",
        }
    }
}

pub(crate) fn usages_to_operations(usages: &[KeyUsage]) -> Vec<String> {
    usages.iter().map(|u| u.as_str().to_owned()).collect()
}

/// RFC 3339 date rendered as `YYYY-MM-DD HH:MM:SS`.
/// Values that do not parse are shown as they are.
pub(crate) fn format_date(value: &str) -> String {
    let format = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    OffsetDateTime::parse(value, &Rfc3339)
        .ok()
        .and_then(|date| date.format(&format).ok())
        .unwrap_or_else(|| value.to_owned())
}

pub(crate) fn service_key_table(key: &ServiceKey) -> String {
    let mut table = KeyValueTable::new();
    table
        .add("Id", key.id)
        .add("Name", &key.name)
        .add("State", key.key_state().unwrap_or_default())
        .add("Key Type", key.key_type)
        .add("Size", key.size.map(|s| s.to_string()).unwrap_or_default())
        .add("Curve", key.curve.clone().unwrap_or_default())
        .add(
            "Usage",
            key.operations
                .as_ref()
                .map(|ops| ops.join(", "))
                .unwrap_or_default(),
        )
        .add(
            "Created at",
            key.creation_date().map(format_date).unwrap_or_default(),
        )
        .add_opt("Activated at", key.attribute("activation_date").map(format_date))
        .add_opt(
            "Deactivated at",
            key.attribute("deactivation_date").map(format_date),
        )
        .add_opt(
            "Compromised at",
            key.attribute("compromise_date").map(format_date),
        );
    table.render()
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use okms_client::ServiceKey;

    use super::{format_date, parse_key_id, service_key_table};

    #[test]
    fn test_format_date() {
        assert_eq!(format_date("2024-03-05T10:11:12Z"), "2024-03-05 10:11:12");
        assert_eq!(format_date("yesterday"), "yesterday");
    }

    #[test]
    fn test_invalid_key_id() {
        let err = parse_key_id("nope").unwrap_err();
        assert!(err.to_string().starts_with("Invalid Key ID \"nope\""), "{err}");
    }

    #[test]
    fn test_service_key_table() {
        let key: ServiceKey = serde_json::from_value(serde_json::json!({
            "id": "3bd3b1a4-e9e4-4f63-9aa5-7d1c0b6a4a28",
            "name": "my-key",
            "type": "EC",
            "curve": "P-256",
            "operations": ["sign", "verify"],
            "attributes": {
                "state": "active",
                "original_creation_date": "2024-03-05T10:11:12Z",
                "activation_date": "2024-03-05T10:11:13Z"
            }
        }))
        .unwrap();
        let text = service_key_table(&key);
        assert!(text.contains("Name          my-key\n"), "{text}");
        assert!(text.contains("Usage         sign, verify\n"), "{text}");
        assert!(text.contains("Created at    2024-03-05 10:11:12\n"), "{text}");
        assert!(text.contains("Activated at  2024-03-05 10:11:13\n"), "{text}");
        assert!(!text.contains("Deactivated at"), "{text}");
    }
}

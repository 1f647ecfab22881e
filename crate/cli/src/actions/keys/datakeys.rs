use base64::{Engine, engine::general_purpose::STANDARD};
use clap::{Parser, Subcommand};
use okms_client::KmsRestClient;
use zeroize::Zeroizing;

use super::parse_key_id;
use crate::{
    actions::{
        args::{Input, MAX_INPUT_SIZE},
        console::{KeyValueTable, Stdout},
    },
    error::result::KmsCliResult,
};

/// Manage data keys
#[derive(Subcommand, Debug)]
pub enum DataKeysCommands {
    New(NewDataKeyAction),
    Decrypt(DecryptDataKeyAction),
}

impl DataKeysCommands {
    pub async fn process(&self, client: &KmsRestClient, stdout: &Stdout) -> KmsCliResult<()> {
        match self {
            Self::New(action) => action.run(client, stdout).await,
            Self::Decrypt(action) => action.run(client, stdout).await,
        }
    }
}

/// Generate a new data key, wrapped by a domain key
#[derive(Parser, Debug)]
pub struct NewDataKeyAction {
    #[arg(value_name = "KEY-ID")]
    key_id: String,

    /// Size of the data key, in bits
    #[arg(long, default_value_t = 256)]
    size: u32,

    /// Optional name of the data key
    #[arg(long)]
    name: Option<String>,
}

impl NewDataKeyAction {
    pub async fn run(&self, client: &KmsRestClient, stdout: &Stdout) -> KmsCliResult<()> {
        let id = parse_key_id(&self.key_id)?;
        let data_key = client
            .generate_data_key(&id, self.name.as_deref(), self.size)
            .await?;
        stdout.write(
            &serde_json::json!({
                "plain": data_key.plain,
                "encrypted": data_key.encrypted,
            }),
            || {
                format!(
                    "Plain key: {}\nEncrypted key: {}",
                    data_key.plain, data_key.encrypted
                )
            },
        )
    }
}

/// Decrypt a data key with the domain key that wraps it
#[derive(Parser, Debug)]
pub struct DecryptDataKeyAction {
    #[arg(value_name = "KEY-ID")]
    key_id: String,

    /// Encrypted data key: text, `@file` or `-` for stdin
    #[arg(value_name = "DATA-KEY")]
    data_key: Input,
}

impl DecryptDataKeyAction {
    pub async fn run(&self, client: &KmsRestClient, stdout: &Stdout) -> KmsCliResult<()> {
        let id = parse_key_id(&self.key_id)?;
        let encrypted = self.data_key.read_string_max(MAX_INPUT_SIZE)?;
        let plain_key = client.decrypt_data_key(&id, encrypted.trim()).await?;
        let encoded = Zeroizing::new(STANDARD.encode(plain_key.as_slice()));
        stdout.write(&serde_json::json!({ "plain": encoded.as_str() }), || {
            let mut table = KeyValueTable::new();
            table.add("Plaintext Key", encoded.as_str());
            table.render()
        })
    }
}

use base64::{Engine, engine::general_purpose::STANDARD};
use clap::{Parser, ValueEnum};
use okms_client::{
    CreateImportServiceKeyRequest, KeyType, KmsRestClient, ServiceKey, der_to_pem,
};
use openssl::pkey::Id;
use tracing::debug;

use super::{
    KeyUsage, format_date, openssh::authorized_key, parse_key_id, service_key_table,
    usages_to_operations,
};
use crate::{
    actions::{
        args::{Input, MAX_INPUT_SIZE},
        console::{Stdout, Table, to_json},
    },
    cli_bail, cli_ensure,
    error::{KmsCliError, result::KmsCliResult},
};

/// List domain keys
#[derive(Parser, Debug)]
pub struct ListAction {
    /// Number of keys to fetch per page (between 10 and 500)
    #[arg(long, default_value_t = 100)]
    page_size: u32,

    /// List all keys (including deactivated and deleted ones)
    #[arg(short = 'A', long)]
    all: bool,
}

impl ListAction {
    pub async fn run(&self, client: &KmsRestClient, stdout: &Stdout) -> KmsCliResult<()> {
        let state = if self.all { "all" } else { "active" };
        let keys = client
            .list_all_service_keys(Some(self.page_size), Some(state))
            .await?;
        debug!("{} key(s) listed", keys.len());
        stdout.write(&serde_json::json!({ "objectsList": keys }), || {
            let mut table = Table::new(&["ID", "Name", "Type", "State", "Created At"]);
            for key in &keys {
                table.add_row(&[
                    key.id.to_string(),
                    key.name.clone(),
                    key.key_type.to_string(),
                    key.key_state().unwrap_or_default().to_owned(),
                    key.creation_date().map(format_date).unwrap_or_default(),
                ]);
            }
            table.render()
        })
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum KeySpec {
    #[default]
    Oct,
    Rsa,
    Ec,
}

impl From<KeySpec> for KeyType {
    fn from(spec: KeySpec) -> Self {
        match spec {
            KeySpec::Oct => Self::Oct,
            KeySpec::Rsa => Self::Rsa,
            KeySpec::Ec => Self::Ec,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Curve {
    #[default]
    #[value(name = "P-256")]
    P256,
    #[value(name = "P-384")]
    P384,
    #[value(name = "P-521")]
    P521,
}

impl Curve {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::P256 => "P-256",
            Self::P384 => "P-384",
            Self::P521 => "P-521",
        }
    }
}

/// Generate a new domain service key
#[derive(Parser, Debug)]
pub struct GenerateAction {
    /// Name of the key
    name: String,

    /// Context of the key. Defaults to the key's name
    #[arg(long)]
    context: Option<String>,

    /// Key operations (key usage), comma separated
    #[arg(long, value_delimiter = ',')]
    usage: Vec<KeyUsage>,

    /// Type of the key to create
    #[arg(long = "type", value_enum, default_value_t = KeySpec::Oct)]
    key_type: KeySpec,

    /// Size of the key to generate
    #[arg(long, default_value_t = 256, conflicts_with = "curve")]
    size: u32,

    /// Curve of elliptic curve (ec) keys
    #[arg(long, value_enum)]
    curve: Option<Curve>,
}

impl GenerateAction {
    pub(crate) fn request(&self) -> CreateImportServiceKeyRequest {
        let mut body = CreateImportServiceKeyRequest {
            name: self.name.clone(),
            context: Some(self.context.clone().unwrap_or_else(|| self.name.clone())),
            key_type: Some(self.key_type.into()),
            operations: Some(usages_to_operations(&self.usage)),
            ..CreateImportServiceKeyRequest::default()
        };
        if self.key_type == KeySpec::Ec {
            body.curve = Some(self.curve.unwrap_or_default().as_str().to_owned());
        } else {
            body.size = Some(self.size);
        }
        body
    }

    pub async fn run(&self, client: &KmsRestClient, stdout: &Stdout) -> KmsCliResult<()> {
        let key = client.create_import_service_key(&self.request()).await?;
        stdout.write(&key, || service_key_table(&key))
    }
}

/// Retrieve domain key metadata
#[derive(Parser, Debug)]
pub struct GetAction {
    #[arg(value_name = "KEY-ID")]
    key_id: String,
}

impl GetAction {
    pub async fn run(&self, client: &KmsRestClient, stdout: &Stdout) -> KmsCliResult<()> {
        let id = parse_key_id(&self.key_id)?;
        let key = client.get_service_key(&id, None).await?;
        stdout.write(&key, || service_key_table(&key))
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExportFormat {
    #[default]
    Pkix,
    Pkcs1,
    Openssh,
    Jwk,
}

/// Export public key material
#[derive(Parser, Debug)]
pub struct ExportAction {
    #[arg(value_name = "KEY-ID")]
    key_id: String,

    /// Export format
    #[arg(short, long, value_enum, default_value_t = ExportFormat::Pkix, ignore_case = true)]
    format: ExportFormat,
}

/// A key carrying attributes is exported only while its state is `active`
fn ensure_exportable(key: &ServiceKey) -> KmsCliResult<()> {
    if key.attributes.is_some() {
        let state = key.attribute("state").unwrap_or_default();
        cli_ensure!(
            state == "active",
            "The key is not active (state is {state:?})"
        );
    }
    Ok(())
}

impl ExportAction {
    pub async fn run(&self, client: &KmsRestClient, stdout: &Stdout) -> KmsCliResult<()> {
        let id = parse_key_id(&self.key_id)?;
        let key = client.get_service_key(&id, Some("jwk")).await?;
        let Some(jwk) = key.keys.as_ref().and_then(|keys| keys.first()) else {
            cli_bail!("Server returned no key");
        };
        if stdout.is_json() {
            return stdout.write(&key, String::new);
        }
        ensure_exportable(&key)?;

        if self.format == ExportFormat::Jwk {
            println!("{}", to_json(jwk)?);
            return Ok(());
        }
        let public_key = jwk.public_key()?;
        match self.format {
            ExportFormat::Pkcs1 => {
                cli_ensure!(
                    public_key.id() == Id::RSA,
                    "pkcs1 format is only for RSA public keys"
                );
                let der = public_key.rsa()?.public_key_to_der_pkcs1()?;
                print!("{}", der_to_pem(&der, "RSA PUBLIC KEY"));
            }
            ExportFormat::Openssh => {
                println!("{} {}", authorized_key(&public_key)?, key.name);
            }
            ExportFormat::Pkix | ExportFormat::Jwk => {
                print!("{}", der_to_pem(&public_key.public_key_to_der()?, "PUBLIC KEY"));
            }
        }
        Ok(())
    }
}

/// Import a base64 encoded symmetric key or a PEM encoded private key
#[derive(Parser, Debug)]
pub struct ImportAction {
    /// Name of the key
    name: String,

    /// Key material: text, `@file` or `-` for stdin
    #[arg(value_name = "KEY")]
    key_material: Input,

    /// Context of the key. Defaults to the key's name
    #[arg(long)]
    context: Option<String>,

    /// Key operations (key usage), comma separated
    #[arg(long, value_delimiter = ',')]
    usage: Vec<KeyUsage>,

    /// Import a base64 encoded symmetric key
    #[arg(short = 'S', long)]
    symmetric: bool,
}

impl ImportAction {
    pub async fn run(&self, client: &KmsRestClient, stdout: &Stdout) -> KmsCliResult<()> {
        let context = self.context.as_deref().unwrap_or(&self.name);
        let material = zeroize::Zeroizing::new(self.key_material.read_all_max(MAX_INPUT_SIZE)?);
        let operations = usages_to_operations(&self.usage);
        let key = if self.symmetric {
            let text = std::str::from_utf8(&material)?;
            let bytes = zeroize::Zeroizing::new(STANDARD.decode(text.trim())?);
            client
                .import_key(&bytes, &self.name, context, operations)
                .await?
        } else {
            client
                .import_key_pair_pem(&material, &self.name, context, operations)
                .await?
        };
        stdout.write(&key, || service_key_table(&key))
    }
}

/// Update a service key
#[derive(Parser, Debug)]
pub struct UpdateAction {
    #[arg(value_name = "KEY-ID")]
    key_id: String,

    /// New name of the key
    #[arg(long, required = true)]
    name: String,
}

impl UpdateAction {
    pub async fn run(&self, client: &KmsRestClient, stdout: &Stdout) -> KmsCliResult<()> {
        let id = parse_key_id(&self.key_id)?;
        let key = client.update_service_key(&id, &self.name).await?;
        stdout.write(&key, || service_key_table(&key))
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[value(rename_all = "snake_case")]
pub enum RevocationReason {
    #[default]
    Unspecified,
    KeyCompromise,
    CaCompromise,
    AffiliationChanged,
    Superseded,
    CessationOfOperation,
    PrivilegeWithdrawn,
}

impl RevocationReason {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unspecified => "unspecified",
            Self::KeyCompromise => "key_compromise",
            Self::CaCompromise => "ca_compromise",
            Self::AffiliationChanged => "affiliation_changed",
            Self::Superseded => "superseded",
            Self::CessationOfOperation => "cessation_of_operation",
            Self::PrivilegeWithdrawn => "privilege_withdrawn",
        }
    }
}

/// Run `op` on every key id, collecting the failures into one error
async fn for_each_key<'a, F, Fut>(ids: &'a [String], mut op: F) -> KmsCliResult<()>
where
    F: FnMut(uuid::Uuid, &'a str) -> Fut,
    Fut: Future<Output = Result<(), String>>,
{
    let mut errors = Vec::new();
    for id in ids {
        match parse_key_id(id) {
            Ok(key_id) => {
                if let Err(e) = op(key_id, id).await {
                    errors.push(e);
                }
            }
            Err(e) => errors.push(e.to_string()),
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(KmsCliError::Default(errors.join("\n")))
    }
}

/// Activate one or more service keys
#[derive(Parser, Debug)]
pub struct ActivateAction {
    #[arg(value_name = "KEY-ID", required = true)]
    key_ids: Vec<String>,
}

impl ActivateAction {
    pub async fn run(&self, client: &KmsRestClient) -> KmsCliResult<()> {
        for_each_key(&self.key_ids, |key_id, id| async move {
            client
                .activate_service_key(&key_id)
                .await
                .map_err(|e| format!("Failed to activate key {id:?}: {e}"))
        })
        .await
    }
}

/// Deactivate one or more service keys
#[derive(Parser, Debug)]
pub struct DeactivateAction {
    #[arg(value_name = "KEY-ID", required = true)]
    key_ids: Vec<String>,

    /// The reason of revocation
    #[arg(long, value_enum, default_value_t = RevocationReason::Unspecified)]
    reason: RevocationReason,
}

impl DeactivateAction {
    pub async fn run(&self, client: &KmsRestClient) -> KmsCliResult<()> {
        let reason = self.reason.as_str();
        for_each_key(&self.key_ids, |key_id, id| async move {
            client
                .deactivate_service_key(&key_id, reason)
                .await
                .map_err(|e| format!("Failed to deactivate key {id:?}: {e}"))
        })
        .await
    }
}

/// Delete one or more deactivated service keys. This action is irreversible
#[derive(Parser, Debug)]
pub struct DeleteAction {
    #[arg(value_name = "KEY-ID", required = true)]
    key_ids: Vec<String>,

    /// Delete active keys too, by deactivating them first with an
    /// unspecified reason
    #[arg(long)]
    force: bool,
}

impl DeleteAction {
    pub async fn run(&self, client: &KmsRestClient) -> KmsCliResult<()> {
        let force = self.force;
        for_each_key(&self.key_ids, |key_id, id| async move {
            if force {
                client
                    .deactivate_service_key(&key_id, RevocationReason::Unspecified.as_str())
                    .await
                    .map_err(|e| format!("Failed to deactivate key {id:?}: {e}"))?;
            }
            client
                .delete_service_key(&key_id)
                .await
                .map_err(|e| format!("Failed to delete key {id:?}: {e}"))
        })
        .await
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use clap::Parser;

    use okms_client::{KeyType, ServiceKey};
    use serde_json::{Value, json};

    use super::{Curve, GenerateAction, KeySpec, ensure_exportable};

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        action: GenerateAction,
    }

    fn parse(args: &[&str]) -> GenerateAction {
        Wrapper::try_parse_from(std::iter::once("generate").chain(args.iter().copied()))
            .unwrap()
            .action
    }

    #[test]
    fn test_generate_defaults() {
        let action = parse(&["my-key"]);
        assert_eq!(action.key_type, KeySpec::Oct);
        let body = action.request();
        assert_eq!(body.context.as_deref(), Some("my-key"));
        assert_eq!(body.size, Some(256));
        assert!(body.curve.is_none());
        assert_eq!(body.key_type, Some(KeyType::Oct));
    }

    #[test]
    fn test_generate_ec_with_usage() {
        let action = parse(&[
            "signer",
            "--type",
            "ec",
            "--curve",
            "P-384",
            "--usage",
            "sign,verify",
            "--context",
            "ctx",
        ]);
        assert_eq!(action.curve, Some(Curve::P384));
        let body = action.request();
        assert_eq!(body.curve.as_deref(), Some("P-384"));
        assert!(body.size.is_none());
        assert_eq!(
            body.operations,
            Some(vec!["sign".to_owned(), "verify".to_owned()])
        );
        assert_eq!(body.context.as_deref(), Some("ctx"));
    }

    #[test]
    fn test_size_and_curve_conflict() {
        let result = Wrapper::try_parse_from([
            "generate", "k", "--type", "ec", "--size", "256", "--curve", "P-256",
        ]);
        assert!(result.is_err());
    }

    fn service_key(attributes: Option<Value>) -> ServiceKey {
        let mut key = json!({
            "id": "f2bd4cb5-2b2c-4d16-9e52-1ae5bfa3a1c4",
            "name": "my-key",
            "type": "EC",
            "curve": "P-256",
        });
        if let Some(attributes) = attributes {
            key["attributes"] = attributes;
        }
        serde_json::from_value(key).unwrap()
    }

    #[test]
    fn test_export_requires_active_state() {
        ensure_exportable(&service_key(None)).unwrap();
        ensure_exportable(&service_key(Some(json!({"state": "active"})))).unwrap();

        let err = ensure_exportable(&service_key(Some(json!({"state": "deactivated"}))))
            .unwrap_err()
            .to_string();
        assert!(err.contains("\"deactivated\""), "{err}");

        let err = ensure_exportable(&service_key(Some(json!({"origin": "okms"}))))
            .unwrap_err()
            .to_string();
        assert!(err.contains("not active"), "{err}");
    }
}

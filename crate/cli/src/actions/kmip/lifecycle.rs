use clap::Parser;
use okms_client::{KmipClient, okms_kmip::kmip_1_4::kmip_types::RevocationReasonCode};

use crate::{
    actions::console::{Stdout, ensure_confirmed},
    error::result::KmsCliResult,
};

/// Activate an object
#[derive(Parser, Debug)]
pub struct ActivateAction {
    #[arg(value_name = "ID")]
    object_id: String,
}

impl ActivateAction {
    pub fn run(&self, client: &KmipClient, stdout: &Stdout) -> KmsCliResult<()> {
        let response = client.activate(&self.object_id)?;
        stdout.write(&response, || {
            format!("Activated object {}", response.unique_identifier)
        })
    }
}

/// Revoke an object
#[derive(Parser, Debug)]
pub struct RevokeAction {
    #[arg(value_name = "ID")]
    object_id: String,

    /// Revocation reason
    #[arg(long, default_value = "Unspecified")]
    reason: RevocationReasonCode,

    /// Optional revocation message
    #[arg(long)]
    message: Option<String>,

    /// Force revoke without prompting for confirmation
    #[arg(long)]
    force: bool,
}

impl RevokeAction {
    pub fn run(&self, client: &KmipClient, stdout: &Stdout) -> KmsCliResult<()> {
        if !self.force {
            ensure_confirmed("Revocation cannot be undone. Continue ?")?;
        }
        let message = self.message.clone().filter(|m| !m.is_empty());
        let response = client.revoke(&self.object_id, self.reason, message)?;
        stdout.write(&response, || {
            format!("Revoked object {}", response.unique_identifier)
        })
    }
}

/// Destroy an object
#[derive(Parser, Debug)]
pub struct DestroyAction {
    #[arg(value_name = "ID")]
    object_id: String,

    /// Force deletion without prompting for confirmation
    #[arg(long)]
    force: bool,
}

impl DestroyAction {
    pub fn run(&self, client: &KmipClient, stdout: &Stdout) -> KmsCliResult<()> {
        if !self.force {
            ensure_confirmed("Destroy cannot be undone. Continue ?")?;
        }
        let response = client.destroy(&self.object_id)?;
        stdout.write(&response, || {
            format!("Destroyed object {}", response.unique_identifier)
        })
    }
}

use clap::Parser;
use okms_client::{KmipClient, okms_kmip::kmip_1_4::kmip_types::ObjectType};

use super::with_attributes;
use crate::{
    actions::console::Stdout,
    cli_bail,
    error::result::{KmsCliResult, KmsCliResultHelper},
};

/// Rekey a symmetric key or a key-pair
#[derive(Parser, Debug)]
pub struct RekeyAction {
    #[arg(value_name = "ID")]
    object_id: String,

    /// Optional rekeying offset, in seconds
    #[arg(long, value_name = "SECS", allow_negative_numbers = true)]
    offset: Option<i64>,
}

impl RekeyAction {
    fn offset(&self) -> KmsCliResult<Option<u32>> {
        self.offset
            .map(|offset| {
                if offset < 0 {
                    cli_bail!("offset cannot be negative");
                }
                Ok(u32::try_from(offset)?)
            })
            .transpose()
    }

    pub fn run(&self, client: &KmipClient, stdout: &Stdout) -> KmsCliResult<()> {
        let offset = self.offset()?;
        let object_type = client
            .object_type(&self.object_id)?
            .context("Missing object type from server returned attributes")?;
        match object_type {
            ObjectType::SymmetricKey => {
                let response = client.rekey(&self.object_id, offset)?;
                stdout.write(&response, || {
                    with_attributes(
                        format!("Replacement key ID: {}", response.unique_identifier),
                        &response.template_attribute,
                    )
                })
            }
            ObjectType::PrivateKey => {
                let response = client.rekey_key_pair(&self.object_id, offset)?;
                stdout.write(&response, || {
                    format!(
                        "Replacement private-key ID: {}\nReplacement public-key ID: {}",
                        response.private_key_unique_identifier,
                        response.public_key_unique_identifier
                    )
                })
            }
            ObjectType::PublicKey => {
                cli_bail!("Cannot rekey public-key, please specify the private-key ID instead")
            }
            other => cli_bail!("Cannot rekey an object of type {other}"),
        }
    }
}

use std::io::{self, Write};

use clap::Parser;
use okms_client::{KmipClient, object_to_bytes, okms_kmip::kmip_1_4::kmip_objects::ManagedObject};

use crate::{actions::console::Stdout, error::result::KmsCliResult};

/// Get the materials from a kmip object.
///
/// Secrets and symmetric keys are written as raw bytes, keys and
/// certificates as PEM, and other objects as a TTLV dump.
#[derive(Parser, Debug)]
pub struct GetAction {
    #[arg(value_name = "ID")]
    object_id: String,
}

impl GetAction {
    pub fn run(&self, client: &KmipClient, stdout: &Stdout) -> KmsCliResult<()> {
        let response = client.get(&self.object_id)?;
        if stdout.is_json() {
            return stdout.write(&response, String::new);
        }
        let material = match object_to_bytes(&response.object)? {
            Some(bytes) => bytes,
            None => {
                if let ManagedObject::Other(ttlv) = &response.object {
                    println!("{ttlv}");
                }
                return Ok(());
            }
        };
        let mut out = io::stdout().lock();
        out.write_all(&material)?;
        out.flush()?;
        Ok(())
    }
}

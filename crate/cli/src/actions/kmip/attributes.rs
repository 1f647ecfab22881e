use clap::{Parser, Subcommand};
use okms_client::KmipClient;

use super::attribute_table;
use crate::{actions::console::Stdout, error::result::KmsCliResult};

/// Manage an object's attributes
#[derive(Subcommand, Debug)]
pub enum AttributesCommands {
    Get(GetAttributesAction),
}

impl AttributesCommands {
    pub fn process(&self, client: &KmipClient, stdout: &Stdout) -> KmsCliResult<()> {
        match self {
            Self::Get(action) => action.run(client, stdout),
        }
    }
}

/// Get the attributes of an object
#[derive(Parser, Debug)]
pub struct GetAttributesAction {
    #[arg(value_name = "ID")]
    object_id: String,
}

impl GetAttributesAction {
    pub fn run(&self, client: &KmipClient, stdout: &Stdout) -> KmsCliResult<()> {
        let response = client.get_attributes(&self.object_id, &[])?;
        stdout.write(&response, || attribute_table(&response.attribute))
    }
}

use clap::Parser;
use okms_client::{
    KmipClient,
    okms_kmip::kmip_1_4::{
        kmip_attributes::{self, Attribute},
        kmip_operations::GetAttributesResponse,
        kmip_types::{ObjectType, State},
    },
};

use crate::{
    actions::console::{Stdout, Table},
    error::result::KmsCliResult,
};

/// List kmip objects
#[derive(Parser, Debug)]
pub struct LocateAction {
    /// Display detailed information
    #[arg(long)]
    details: bool,

    /// List only objects in the given states
    #[arg(long, value_name = "STATE")]
    state: Vec<State>,

    /// List only objects of the given types
    #[arg(long = "type", value_name = "TYPE")]
    object_type: Vec<ObjectType>,
}

impl LocateAction {
    /// One Locate filter per combination of the requested states and types,
    /// since the attributes of a single Locate request must all match
    fn filters(&self) -> Vec<Vec<Attribute>> {
        let states: Vec<Option<State>> = if self.state.is_empty() {
            vec![None]
        } else {
            self.state.iter().copied().map(Some).collect()
        };
        let types: Vec<Option<ObjectType>> = if self.object_type.is_empty() {
            vec![None]
        } else {
            self.object_type.iter().copied().map(Some).collect()
        };
        let mut filters = Vec::with_capacity(states.len() * types.len());
        for state in &states {
            for object_type in &types {
                let mut filter = Vec::with_capacity(2);
                if let Some(object_type) = object_type {
                    filter.push(Attribute::object_type(*object_type));
                }
                if let Some(state) = state {
                    filter.push(Attribute::state(*state));
                }
                filters.push(filter);
            }
        }
        filters
    }

    fn locate(&self, client: &KmipClient) -> KmsCliResult<Vec<String>> {
        let mut ids: Vec<String> = Vec::new();
        for filter in self.filters() {
            for id in client.locate(filter)?.unique_identifier {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }
        Ok(ids)
    }

    pub fn run(&self, client: &KmipClient, stdout: &Stdout) -> KmsCliResult<()> {
        let ids = self.locate(client)?;
        if !self.details {
            return stdout.write(&serde_json::json!({ "UniqueIdentifier": ids }), || {
                let mut table = Table::new(&["ID"]);
                for id in &ids {
                    table.add_row(&[id]);
                }
                table.render()
            });
        }
        let objects = ids
            .iter()
            .map(|id| client.get_attributes(id, &[]))
            .collect::<Result<Vec<_>, _>>()?;
        stdout.write(&objects, || object_table(&objects))
    }
}

fn object_table(objects: &[GetAttributesResponse]) -> String {
    let mut table = Table::new(&["ID", "TYPE", "NAME", "STATE", "ALGORITHM", "SIZE"]);
    for object in objects {
        let render = |name: &str| object.find(name).map(Attribute::render).unwrap_or_default();
        table.add_row(&[
            object.unique_identifier.clone(),
            render(kmip_attributes::OBJECT_TYPE),
            object
                .find(kmip_attributes::NAME)
                .and_then(Attribute::name_value)
                .unwrap_or_default()
                .to_owned(),
            render(kmip_attributes::STATE),
            render(kmip_attributes::CRYPTOGRAPHIC_ALGORITHM),
            render(kmip_attributes::CRYPTOGRAPHIC_LENGTH),
        ]);
    }
    table.render()
}

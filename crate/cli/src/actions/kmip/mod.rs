//! Management of the objects of the KMIP endpoint.
//!
//! These commands talk KMIP 1.4 over a mutually authenticated TLS socket,
//! so the profile must hold the client certificate and key.

use clap::{Args, Parser, Subcommand, ValueEnum};
use okms_client::okms_kmip::kmip_1_4::{
    kmip_attributes::{self, Attribute},
    kmip_operations::KeyPairResponse,
    kmip_types::{CryptographicAlgorithm, CryptographicUsageMask, RecommendedCurve},
};

use self::{
    attributes::AttributesCommands,
    create::CreateCommands,
    get::GetAction,
    lifecycle::{ActivateAction, DestroyAction, RevokeAction},
    locate::LocateAction,
    register::RegisterCommands,
    rekey::RekeyAction,
};
use super::{CliContext, KmipArgs, console::KeyValueTable};
use crate::error::result::KmsCliResult;

mod attributes;
mod create;
mod get;
mod lifecycle;
mod locate;
mod register;
mod rekey;

/// Manage kmip objects
#[derive(Parser, Debug)]
pub struct KmipCommand {
    #[command(flatten)]
    pub kmip: KmipArgs,

    #[command(subcommand)]
    pub command: KmipCommands,
}

#[derive(Subcommand, Debug)]
pub enum KmipCommands {
    #[command(visible_aliases = ["list", "ls"])]
    Locate(LocateAction),
    #[command(subcommand)]
    Create(CreateCommands),
    #[command(subcommand, visible_aliases = ["attribute", "attr"])]
    Attributes(AttributesCommands),
    Activate(ActivateAction),
    Revoke(RevokeAction),
    #[command(visible_aliases = ["delete", "del"])]
    Destroy(DestroyAction),
    Get(GetAction),
    #[command(subcommand)]
    Register(RegisterCommands),
    Rekey(RekeyAction),
}

impl KmipCommand {
    pub fn process(&self, ctx: &CliContext) -> KmsCliResult<()> {
        let client = self.kmip.client(ctx)?;
        let stdout = &ctx.stdout;
        match &self.command {
            KmipCommands::Locate(action) => action.run(&client, stdout),
            KmipCommands::Create(command) => command.process(&client, stdout),
            KmipCommands::Attributes(command) => command.process(&client, stdout),
            KmipCommands::Activate(action) => action.run(&client, stdout),
            KmipCommands::Revoke(action) => action.run(&client, stdout),
            KmipCommands::Destroy(action) => action.run(&client, stdout),
            KmipCommands::Get(action) => action.run(&client, stdout),
            KmipCommands::Register(command) => command.process(&client, stdout),
            KmipCommands::Rekey(action) => action.run(&client, stdout),
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
#[value(rename_all = "UPPER")]
pub enum SymmetricAlgorithm {
    Aes,
    Tdes,
    Skipjack,
}

impl From<SymmetricAlgorithm> for CryptographicAlgorithm {
    fn from(algorithm: SymmetricAlgorithm) -> Self {
        match algorithm {
            SymmetricAlgorithm::Aes => Self::AES,
            SymmetricAlgorithm::Tdes => Self::TDES,
            SymmetricAlgorithm::Skipjack => Self::SKIPJACK,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
#[value(rename_all = "UPPER")]
pub enum AsymmetricAlgorithm {
    Rsa,
    Ecdsa,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum EcCurve {
    #[value(name = "P-256")]
    P256,
    #[value(name = "P-384")]
    P384,
    #[value(name = "P-521")]
    P521,
}

impl From<EcCurve> for RecommendedCurve {
    fn from(curve: EcCurve) -> Self {
        match curve {
            EcCurve::P256 => Self::P256,
            EcCurve::P384 => Self::P384,
            EcCurve::P521 => Self::P521,
        }
    }
}

/// Cryptographic usages accepted on the command line
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
#[value(rename_all = "PascalCase")]
pub enum KeyUsage {
    Sign,
    Verify,
    Encrypt,
    Decrypt,
    WrapKey,
    UnwrapKey,
    DeriveKey,
}

impl From<KeyUsage> for CryptographicUsageMask {
    fn from(usage: KeyUsage) -> Self {
        match usage {
            KeyUsage::Sign => Self::Sign,
            KeyUsage::Verify => Self::Verify,
            KeyUsage::Encrypt => Self::Encrypt,
            KeyUsage::Decrypt => Self::Decrypt,
            KeyUsage::WrapKey => Self::WrapKey,
            KeyUsage::UnwrapKey => Self::UnwrapKey,
            KeyUsage::DeriveKey => Self::DeriveKey,
        }
    }
}

pub(crate) fn usage_mask(usages: &[KeyUsage]) -> CryptographicUsageMask {
    usages
        .iter()
        .fold(CryptographicUsageMask::empty(), |mask, usage| {
            mask | CryptographicUsageMask::from(*usage)
        })
}

/// Free text attributes settable on any object
#[derive(Args, Clone, Debug, Default)]
pub struct TextAttributes {
    /// Set the description attribute
    #[arg(long)]
    description: Option<String>,

    /// Set the comment attribute
    #[arg(long)]
    comment: Option<String>,
}

impl TextAttributes {
    pub(crate) fn push_into(&self, attributes: &mut Vec<Attribute>) {
        if let Some(description) = self.description.as_deref().filter(|d| !d.is_empty()) {
            attributes.push(Attribute::text(kmip_attributes::DESCRIPTION, description));
        }
        if let Some(comment) = self.comment.as_deref().filter(|c| !c.is_empty()) {
            attributes.push(Attribute::text(kmip_attributes::COMMENT, comment));
        }
    }
}

pub(crate) fn push_name(attributes: &mut Vec<Attribute>, name: Option<&str>) {
    if let Some(name) = name.filter(|n| !n.is_empty()) {
        attributes.push(Attribute::name(name));
    }
}

/// Sensitive and Extractable flags of a key holding secret material
pub(crate) fn protection_attributes(sensitive: bool, extractable: bool) -> [Attribute; 2] {
    [
        Attribute::boolean(kmip_attributes::EXTRACTABLE, extractable),
        Attribute::boolean(kmip_attributes::SENSITIVE, sensitive),
    ]
}

/// Two columns: the attribute name, suffixed by its index when it is not
/// the first instance, and its value
pub(crate) fn attribute_table(attributes: &[Attribute]) -> String {
    let mut table = KeyValueTable::new();
    for attribute in attributes {
        table.add(attribute.display_name(), attribute.render());
    }
    table.render()
}

/// A title line followed by the attribute table, when there are attributes
pub(crate) fn with_attributes(title: String, attributes: &[Attribute]) -> String {
    if attributes.is_empty() {
        title
    } else {
        format!("{title}\n{}", attribute_table(attributes))
    }
}

/// Identifiers of both keys, then the attributes the server returned
pub(crate) fn key_pair_text(response: &KeyPairResponse, label: &str) -> String {
    let mut text = format!(
        "Public Key {label} {}\nPrivate Key {label} {}",
        response.public_key_unique_identifier, response.private_key_unique_identifier
    );
    for (title, attributes) in [
        ("Public Key Attributes:", &response.public_key_template_attribute),
        ("Private Key Attributes:", &response.private_key_template_attribute),
    ] {
        if !attributes.is_empty() {
            text.push('\n');
            text.push_str(&with_attributes(title.to_owned(), attributes));
        }
    }
    text
}

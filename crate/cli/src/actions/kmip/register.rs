use base64::{Engine, engine::general_purpose::STANDARD};
use clap::{ArgAction, Parser, Subcommand};
use okms_client::{
    KmipClient, RegisterMaterial,
    okms_kmip::kmip_1_4::{
        kmip_attributes::Attribute,
        kmip_operations::{IdentifierWithAttributes, KeyPairResponse},
        kmip_types::LinkType,
    },
};

use super::{
    KeyUsage, SymmetricAlgorithm, TextAttributes, key_pair_text, protection_attributes,
    push_name, usage_mask, with_attributes,
};
use crate::{
    actions::{
        args::{Input, MAX_KMIP_INPUT_SIZE},
        console::Stdout,
    },
    error::result::KmsCliResult,
};

/// Register a kmip object.
///
/// VALUE can be either plain text, a '-' to read from stdin, or a
/// filename prefixed with @.
#[derive(Subcommand, Debug)]
pub enum RegisterCommands {
    Secret(RegisterSecretAction),
    #[command(visible_alias = "sym")]
    Symmetric(RegisterSymmetricKeyAction),
    #[command(visible_aliases = ["cert", "crt"])]
    Certificate(RegisterCertificateAction),
    #[command(visible_aliases = ["public", "pub"])]
    PublicKey(RegisterPublicKeyAction),
    #[command(visible_aliases = ["private", "priv"])]
    PrivateKey(RegisterPrivateKeyAction),
    #[command(visible_aliases = ["pair", "kp"])]
    KeyPair(RegisterKeyPairAction),
}

impl RegisterCommands {
    pub fn process(&self, client: &KmipClient, stdout: &Stdout) -> KmsCliResult<()> {
        match self {
            Self::Secret(action) => action.run(client, stdout),
            Self::Symmetric(action) => action.run(client, stdout),
            Self::Certificate(action) => action.run(client, stdout),
            Self::PublicKey(action) => action.run(client, stdout),
            Self::PrivateKey(action) => action.run(client, stdout),
            Self::KeyPair(action) => action.run(client, stdout),
        }
    }
}

fn read_value(value: &Input, base64: bool) -> KmsCliResult<Vec<u8>> {
    let bytes = value.read_all_max(MAX_KMIP_INPUT_SIZE)?;
    Ok(if base64 {
        STANDARD.decode(bytes.trim_ascii())?
    } else {
        bytes
    })
}

fn registered(
    stdout: &Stdout,
    what: &str,
    response: &IdentifierWithAttributes,
) -> KmsCliResult<()> {
    stdout.write(response, || {
        with_attributes(
            format!("{what} registered with ID {}", response.unique_identifier),
            &response.template_attribute,
        )
    })
}

/// Register a secret object
#[derive(Parser, Debug)]
pub struct RegisterSecretAction {
    value: Input,

    /// Given secret is base64 encoded
    #[arg(long)]
    base64: bool,

    /// Optional name for the secret
    #[arg(long)]
    name: Option<String>,

    #[command(flatten)]
    text: TextAttributes,
}

impl RegisterSecretAction {
    pub fn run(&self, client: &KmipClient, stdout: &Stdout) -> KmsCliResult<()> {
        let secret = read_value(&self.value, self.base64)?;
        let mut attributes = Vec::new();
        push_name(&mut attributes, self.name.as_deref());
        self.text.push_into(&mut attributes);
        let response = client.register(RegisterMaterial::Secret(secret), None, attributes)?;
        registered(stdout, "Secret", &response)
    }
}

/// Register a symmetric key object
#[derive(Parser, Debug)]
pub struct RegisterSymmetricKeyAction {
    value: Input,

    /// Key's cryptographic algorithm
    #[arg(long, value_enum, ignore_case = true, required = true)]
    alg: SymmetricAlgorithm,

    /// Cryptographic usage
    #[arg(
        long,
        value_enum,
        ignore_case = true,
        value_delimiter = ',',
        default_values = ["Encrypt", "Decrypt"]
    )]
    usage: Vec<KeyUsage>,

    /// Given key is base64 encoded
    #[arg(long)]
    base64: bool,

    /// Optional name for the key
    #[arg(long)]
    name: Option<String>,

    /// Set sensitive attribute
    #[arg(long)]
    sensitive: bool,

    /// Set the extractable attribute
    #[arg(long, default_value_t = true, action = ArgAction::Set, value_name = "BOOL")]
    extractable: bool,

    #[command(flatten)]
    text: TextAttributes,
}

impl RegisterSymmetricKeyAction {
    pub fn run(&self, client: &KmipClient, stdout: &Stdout) -> KmsCliResult<()> {
        let key = read_value(&self.value, self.base64)?;
        let mut attributes = protection_attributes(self.sensitive, self.extractable).to_vec();
        push_name(&mut attributes, self.name.as_deref());
        self.text.push_into(&mut attributes);
        let response = client.register(
            RegisterMaterial::Symmetric {
                algorithm: self.alg.into(),
                key,
            },
            Some(usage_mask(&self.usage)),
            attributes,
        )?;
        registered(stdout, "Symmetric key", &response)
    }
}

/// Register an X509 certificate
#[derive(Parser, Debug)]
pub struct RegisterCertificateAction {
    value: Input,

    /// Certificate is PEM encoded
    #[arg(long)]
    pem: bool,

    /// Optional name for the certificate
    #[arg(long)]
    name: Option<String>,

    /// Set a link to the certificate's public key
    #[arg(long, value_name = "ID")]
    public_key: Option<String>,

    /// Set a link to the parent signing certificate
    #[arg(long, value_name = "ID")]
    parent: Option<String>,

    #[command(flatten)]
    text: TextAttributes,
}

impl RegisterCertificateAction {
    fn attributes(&self) -> Vec<Attribute> {
        let mut attributes = Vec::new();
        push_name(&mut attributes, self.name.as_deref());
        self.text.push_into(&mut attributes);
        if let Some(id) = self.public_key.as_deref().filter(|id| !id.is_empty()) {
            attributes.push(Attribute::link(LinkType::PublicKeyLink, id));
        }
        if let Some(id) = self.parent.as_deref().filter(|id| !id.is_empty()) {
            attributes.push(Attribute::link(LinkType::CertificateLink, id));
        }
        attributes
    }

    pub fn run(&self, client: &KmipClient, stdout: &Stdout) -> KmsCliResult<()> {
        let value = read_value(&self.value, false)?;
        let response = client.register(
            RegisterMaterial::Certificate {
                value,
                pem: self.pem,
            },
            None,
            self.attributes(),
        )?;
        registered(stdout, "Certificate", &response)
    }
}

/// Register a public key object from PEM encoded data
#[derive(Parser, Debug)]
pub struct RegisterPublicKeyAction {
    value: Input,

    /// Cryptographic usage
    #[arg(
        long,
        value_enum,
        ignore_case = true,
        value_delimiter = ',',
        default_value = "Verify"
    )]
    usage: Vec<KeyUsage>,

    /// Optional name for the key
    #[arg(long)]
    name: Option<String>,

    /// Optional private key ID to link to
    #[arg(long, value_name = "ID")]
    private_link: Option<String>,

    #[command(flatten)]
    text: TextAttributes,
}

impl RegisterPublicKeyAction {
    pub fn run(&self, client: &KmipClient, stdout: &Stdout) -> KmsCliResult<()> {
        let pem = read_value(&self.value, false)?;
        let mut attributes = Vec::new();
        push_name(&mut attributes, self.name.as_deref());
        self.text.push_into(&mut attributes);
        if let Some(id) = self.private_link.as_deref().filter(|id| !id.is_empty()) {
            attributes.push(Attribute::link(LinkType::PrivateKeyLink, id));
        }
        let response = client.register(
            RegisterMaterial::PemPublicKey(pem),
            Some(usage_mask(&self.usage)),
            attributes,
        )?;
        registered(stdout, "Public key", &response)
    }
}

/// Register a private key object from PEM encoded data
#[derive(Parser, Debug)]
pub struct RegisterPrivateKeyAction {
    value: Input,

    /// Cryptographic usage
    #[arg(
        long,
        value_enum,
        ignore_case = true,
        value_delimiter = ',',
        default_value = "Sign"
    )]
    usage: Vec<KeyUsage>,

    /// Optional name for the key
    #[arg(long)]
    name: Option<String>,

    /// Set sensitive attribute
    #[arg(long)]
    sensitive: bool,

    /// Set the extractable attribute
    #[arg(long, default_value_t = true, action = ArgAction::Set, value_name = "BOOL")]
    extractable: bool,

    /// Optional public key ID to link to
    #[arg(long, value_name = "ID")]
    public_link: Option<String>,

    #[command(flatten)]
    text: TextAttributes,
}

impl RegisterPrivateKeyAction {
    pub fn run(&self, client: &KmipClient, stdout: &Stdout) -> KmsCliResult<()> {
        let pem = read_value(&self.value, false)?;
        let mut attributes = protection_attributes(self.sensitive, self.extractable).to_vec();
        push_name(&mut attributes, self.name.as_deref());
        self.text.push_into(&mut attributes);
        if let Some(id) = self.public_link.as_deref().filter(|id| !id.is_empty()) {
            attributes.push(Attribute::link(LinkType::PublicKeyLink, id));
        }
        let response = client.register(
            RegisterMaterial::PemPrivateKey(pem),
            Some(usage_mask(&self.usage)),
            attributes,
        )?;
        registered(stdout, "Private key", &response)
    }
}

/// Register a private and a public key objects from private key PEM
/// encoded data
#[derive(Parser, Debug)]
pub struct RegisterKeyPairAction {
    value: Input,

    /// Private key allowed usage
    #[arg(
        long,
        value_enum,
        ignore_case = true,
        value_delimiter = ',',
        default_value = "Sign"
    )]
    private_usage: Vec<KeyUsage>,

    /// Public key allowed usage
    #[arg(
        long,
        value_enum,
        ignore_case = true,
        value_delimiter = ',',
        default_value = "Verify"
    )]
    public_usage: Vec<KeyUsage>,

    /// Optional private key name
    #[arg(long)]
    private_name: Option<String>,

    /// Optional public key name
    #[arg(long)]
    public_name: Option<String>,

    /// Set sensitive attribute on the private key
    #[arg(long)]
    private_sensitive: bool,

    /// Set the extractable attribute on the private key
    #[arg(long, default_value_t = true, action = ArgAction::Set, value_name = "BOOL")]
    private_extractable: bool,

    /// Description and comment are set on both keys
    #[command(flatten)]
    text: TextAttributes,
}

impl RegisterKeyPairAction {
    fn private_key_attributes(&self) -> Vec<Attribute> {
        let mut attributes =
            protection_attributes(self.private_sensitive, self.private_extractable).to_vec();
        push_name(&mut attributes, self.private_name.as_deref());
        self.text.push_into(&mut attributes);
        attributes
    }

    fn public_key_attributes(&self, private_key_id: &str) -> Vec<Attribute> {
        let mut attributes = vec![Attribute::link(LinkType::PrivateKeyLink, private_key_id)];
        push_name(&mut attributes, self.public_name.as_deref());
        self.text.push_into(&mut attributes);
        attributes
    }

    /// The private key is registered first, then the public key linked to
    /// it, and finally the private key gets its link to the public key
    pub fn run(&self, client: &KmipClient, stdout: &Stdout) -> KmsCliResult<()> {
        let pem = read_value(&self.value, false)?;
        let private = client.register(
            RegisterMaterial::PemPrivateKey(pem.clone()),
            Some(usage_mask(&self.private_usage)),
            self.private_key_attributes(),
        )?;
        let public = client.register(
            RegisterMaterial::PemPublicKey(pem),
            Some(usage_mask(&self.public_usage)),
            self.public_key_attributes(&private.unique_identifier),
        )?;
        client.add_attribute(
            &private.unique_identifier,
            Attribute::link(LinkType::PublicKeyLink, &public.unique_identifier),
        )?;

        let response = KeyPairResponse {
            private_key_unique_identifier: private.unique_identifier,
            public_key_unique_identifier: public.unique_identifier,
            private_key_template_attribute: private.template_attribute,
            public_key_template_attribute: public.template_attribute,
        };
        stdout.write(&response, || key_pair_text(&response, "registered with ID:"))
    }
}

use clap::{ArgAction, Parser, Subcommand};
use okms_client::{
    KmipClient,
    okms_kmip::kmip_1_4::{
        kmip_attributes::Attribute,
        kmip_operations::CreateKeyPair,
        kmip_types::{CryptographicAlgorithm, RecommendedCurve},
    },
};

use super::{
    AsymmetricAlgorithm, EcCurve, KeyUsage, SymmetricAlgorithm, TextAttributes,
    key_pair_text, protection_attributes, push_name, usage_mask, with_attributes,
};
use crate::{actions::console::Stdout, cli_bail, error::result::KmsCliResult};

/// Create kmip keys
#[derive(Subcommand, Debug)]
pub enum CreateCommands {
    #[command(visible_alias = "sym")]
    Symmetric(CreateSymmetricKeyAction),
    KeyPair(CreateKeyPairAction),
}

impl CreateCommands {
    pub fn process(&self, client: &KmipClient, stdout: &Stdout) -> KmsCliResult<()> {
        match self {
            Self::Symmetric(action) => action.run(client, stdout),
            Self::KeyPair(action) => action.run(client, stdout),
        }
    }
}

/// Create KMIP symmetric key
#[derive(Parser, Debug)]
pub struct CreateSymmetricKeyAction {
    /// Key algorithm
    #[arg(long, value_enum, ignore_case = true, required = true)]
    alg: SymmetricAlgorithm,

    /// Key bit length
    #[arg(long, required = true)]
    size: i32,

    /// Cryptographic usage
    #[arg(
        long,
        value_enum,
        ignore_case = true,
        value_delimiter = ',',
        default_values = ["Encrypt", "Decrypt"]
    )]
    usage: Vec<KeyUsage>,

    /// Optional key name
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

impl CreateSymmetricKeyAction {
    /// Attributes sent on top of the algorithm, length and usage mask
    fn attributes(&self) -> Vec<Attribute> {
        let mut attributes = protection_attributes(self.sensitive, self.extractable).to_vec();
        push_name(&mut attributes, self.name.as_deref());
        self.text.push_into(&mut attributes);
        attributes
    }

    pub fn run(&self, client: &KmipClient, stdout: &Stdout) -> KmsCliResult<()> {
        let response = client.create_symmetric(
            self.alg.into(),
            self.size,
            usage_mask(&self.usage),
            self.attributes(),
        )?;
        stdout.write(&response, || {
            with_attributes(
                format!("Key created with ID {}", response.unique_identifier),
                &response.attributes,
            )
        })
    }
}

/// Create an asymmetric key-pair
#[derive(Parser, Debug)]
pub struct CreateKeyPairAction {
    /// Key-pair algorithm
    #[arg(long, value_enum, ignore_case = true, required = true)]
    alg: AsymmetricAlgorithm,

    /// Modulus bit length of the RSA key-pair to generate
    #[arg(long, conflicts_with = "curve")]
    size: Option<i32>,

    /// Elliptic curve for EC keys
    #[arg(long, value_enum, ignore_case = true)]
    curve: Option<EcCurve>,

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

impl CreateKeyPairAction {
    fn request(&self) -> KmsCliResult<CreateKeyPair> {
        let mut common_attributes = match self.alg {
            AsymmetricAlgorithm::Rsa => {
                let Some(size) = self.size else {
                    cli_bail!("Missing --size flag");
                };
                vec![
                    Attribute::cryptographic_algorithm(CryptographicAlgorithm::RSA),
                    Attribute::cryptographic_length(size),
                ]
            }
            AsymmetricAlgorithm::Ecdsa => {
                let Some(curve) = self.curve else {
                    cli_bail!("Missing --curve flag");
                };
                let curve = RecommendedCurve::from(curve);
                let mut attributes = vec![
                    Attribute::cryptographic_algorithm(CryptographicAlgorithm::ECDSA),
                    Attribute::domain_parameters(curve),
                ];
                if let Some(bits) = curve.bit_length() {
                    attributes.push(Attribute::cryptographic_length(bits));
                }
                attributes
            }
        };
        self.text.push_into(&mut common_attributes);

        let mut private_key_attributes = vec![Attribute::usage_mask(usage_mask(
            &self.private_usage,
        ))];
        private_key_attributes.extend(protection_attributes(
            self.private_sensitive,
            self.private_extractable,
        ));
        push_name(&mut private_key_attributes, self.private_name.as_deref());

        let mut public_key_attributes =
            vec![Attribute::usage_mask(usage_mask(&self.public_usage))];
        push_name(&mut public_key_attributes, self.public_name.as_deref());

        Ok(CreateKeyPair {
            common_attributes,
            private_key_attributes,
            public_key_attributes,
        })
    }

    pub fn run(&self, client: &KmipClient, stdout: &Stdout) -> KmsCliResult<()> {
        let response = client.create_key_pair(&self.request()?)?;
        stdout.write(&response, || key_pair_text(&response, "ID:"))
    }
}

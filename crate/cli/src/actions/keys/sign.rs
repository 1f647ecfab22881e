use std::io;

use base64::{Engine, engine::general_purpose::STANDARD};
use clap::{Parser, ValueEnum};
use okms_client::KmsRestClient;
use openssl::{
    bn::BigNum,
    ecdsa::EcdsaSig,
    hash::{Hasher, MessageDigest},
    md::{Md, MdRef},
    pkey::{Id, PKey, Public},
    pkey_ctx::PkeyCtx,
    rsa::Padding,
    sign::RsaPssSaltlen,
};
use tracing::debug;

use super::parse_key_id;
use crate::{
    actions::{
        args::{Input, MAX_INPUT_SIZE},
        console::Stdout,
        with_progress,
    },
    cli_bail, cli_ensure,
    error::result::{KmsCliResult, KmsCliResultHelper},
};

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    #[value(name = "ES256")]
    Es256,
    #[value(name = "ES384")]
    Es384,
    #[value(name = "ES512")]
    Es512,
    #[value(name = "RS256")]
    Rs256,
    #[value(name = "RS384")]
    Rs384,
    #[value(name = "RS512")]
    Rs512,
    #[value(name = "PS256")]
    Ps256,
    #[value(name = "PS384")]
    Ps384,
    #[value(name = "PS512")]
    Ps512,
}

impl SignatureAlgorithm {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Es256 => "ES256",
            Self::Es384 => "ES384",
            Self::Es512 => "ES512",
            Self::Rs256 => "RS256",
            Self::Rs384 => "RS384",
            Self::Rs512 => "RS512",
            Self::Ps256 => "PS256",
            Self::Ps384 => "PS384",
            Self::Ps512 => "PS512",
        }
    }

    /// Hash size in bits
    const fn hash_bits(self) -> u16 {
        match self {
            Self::Es256 | Self::Rs256 | Self::Ps256 => 256,
            Self::Es384 | Self::Rs384 | Self::Ps384 => 384,
            Self::Es512 | Self::Rs512 | Self::Ps512 => 512,
        }
    }

    #[must_use]
    pub fn message_digest(self) -> MessageDigest {
        match self.hash_bits() {
            256 => MessageDigest::sha256(),
            384 => MessageDigest::sha384(),
            _ => MessageDigest::sha512(),
        }
    }

    pub(crate) fn md(self) -> &'static MdRef {
        match self.hash_bits() {
            256 => Md::sha256(),
            384 => Md::sha384(),
            _ => Md::sha512(),
        }
    }

    pub(crate) const fn is_ec(self) -> bool {
        matches!(self, Self::Es256 | Self::Es384 | Self::Es512)
    }

    const fn is_pss(self) -> bool {
        matches!(self, Self::Ps256 | Self::Ps384 | Self::Ps512)
    }
}

/// Hash the whole input with the algorithm's digest
fn hash_input(
    data: &Input,
    alg: SignatureAlgorithm,
    show_progress: bool,
) -> KmsCliResult<Vec<u8>> {
    let (reader, size) = data.open()?;
    let (mut reader, bar) = with_progress(reader, size, "Hashing", show_progress)?;
    let mut hasher = Hasher::new(alg.message_digest())?;
    let hashed = io::copy(&mut reader, &mut hasher)?;
    if let Some(bar) = bar {
        bar.finish_and_clear();
    }
    debug!("{hashed} bytes hashed for {}", alg.as_str());
    Ok(hasher.finish()?.to_vec())
}

/// Sign data with a domain key. The data is hashed locally and only its
/// digest is sent to the server
#[derive(Parser, Debug)]
pub struct SignAction {
    #[arg(value_name = "KEY-ID")]
    key_id: String,

    /// Data to sign: text, `@file` or `-` for stdin
    #[arg(value_name = "DATA")]
    data: Input,

    /// Signature algorithm
    #[arg(short, long, value_enum, required = true)]
    alg: SignatureAlgorithm,

    /// Do not display the progress bar
    #[arg(long)]
    no_progress: bool,
}

impl SignAction {
    pub async fn run(&self, client: &KmsRestClient, stdout: &Stdout) -> KmsCliResult<()> {
        let id = parse_key_id(&self.key_id)?;
        let digest = hash_input(&self.data, self.alg, !self.no_progress)?;
        let signature = client.sign(&id, self.alg.as_str(), &digest).await?;
        stdout.write(&signature, || signature.clone())
    }
}

/// Verify a signature made with a domain key
#[derive(Parser, Debug)]
pub struct VerifyAction {
    #[arg(value_name = "KEY-ID")]
    key_id: String,

    /// Signed data: text, `@file` or `-` for stdin
    #[arg(value_name = "DATA")]
    data: Input,

    /// Base64 signature: text, `@file` or `-` for stdin
    #[arg(value_name = "SIGNATURE")]
    signature: Input,

    /// Signature algorithm
    #[arg(short, long, value_enum, required = true)]
    alg: SignatureAlgorithm,

    /// Verify locally with the exported public key
    #[arg(long)]
    local: bool,

    /// Do not display the progress bar
    #[arg(long)]
    no_progress: bool,
}

impl VerifyAction {
    pub async fn run(&self, client: &KmsRestClient, stdout: &Stdout) -> KmsCliResult<()> {
        let id = parse_key_id(&self.key_id)?;
        let signature = self.signature.read_string_max(MAX_INPUT_SIZE)?;
        let signature = signature.trim();
        let digest = hash_input(&self.data, self.alg, !self.no_progress)?;

        if self.local {
            let key = client.get_service_key(&id, Some("jwk")).await?;
            let Some(jwk) = key.keys.as_ref().and_then(|keys| keys.first()) else {
                cli_bail!("The server returned no key");
            };
            let public_key = jwk.public_key()?;
            let signature = STANDARD.decode(signature)?;
            verify_local(&public_key, self.alg, &digest, &signature)?;
        } else {
            let valid = client
                .verify(&id, self.alg.as_str(), &digest, signature)
                .await?;
            cli_ensure!(valid, "Signature invalid");
        }
        stdout.message("Signature is valid")
    }
}

/// Verify `signature` over a precomputed `digest`. EC signatures are the
/// fixed size concatenation of r and s.
pub(crate) fn verify_local(
    public_key: &PKey<Public>,
    alg: SignatureAlgorithm,
    digest: &[u8],
    signature: &[u8],
) -> KmsCliResult<()> {
    let valid = match public_key.id() {
        Id::RSA => {
            cli_ensure!(
                !alg.is_ec(),
                "Cannot use algorithm {:?} with an RSA key",
                alg.as_str()
            );
            let mut ctx = PkeyCtx::new(public_key)?;
            ctx.verify_init()?;
            if alg.is_pss() {
                ctx.set_rsa_padding(Padding::PKCS1_PSS)?;
                ctx.set_rsa_pss_saltlen(RsaPssSaltlen::DIGEST_LENGTH)?;
            } else {
                ctx.set_rsa_padding(Padding::PKCS1)?;
            }
            ctx.set_signature_md(alg.md())?;
            ctx.verify(digest, signature)
                .context("Validation failed")?
        }
        Id::EC => {
            cli_ensure!(
                alg.is_ec(),
                "Cannot use algorithm {:?} with an EC key",
                alg.as_str()
            );
            cli_ensure!(
                !signature.is_empty() && signature.len() % 2 == 0,
                "Validation failed: invalid signature length {}",
                signature.len()
            );
            let (r, s) = signature.split_at(signature.len() / 2);
            let ecdsa = EcdsaSig::from_private_components(
                BigNum::from_slice(r)?,
                BigNum::from_slice(s)?,
            )?;
            ecdsa
                .verify(digest, &*public_key.ec_key()?)
                .context("Validation failed")?
        }
        other => cli_bail!("Unsupported key type {other:?}"),
    };
    cli_ensure!(valid, "signature is not valid");
    Ok(())
}

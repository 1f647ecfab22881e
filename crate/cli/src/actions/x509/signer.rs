use base64::{Engine, engine::general_purpose::STANDARD};
use der::{
    Decode, Encode,
    asn1::{Any, BitString, ObjectIdentifier},
};
use okms_client::KmsRestClient;
use openssl::{
    bn::BigNum,
    ecdsa::EcdsaSig,
    hash::hash,
    pkey::{Id, PKey, Public},
};
use tracing::debug;
use uuid::Uuid;
use x509_cert::{
    Certificate, TbsCertificate,
    crl::{CertificateList, TbsCertList},
    request::{CertReq, CertReqInfo},
    spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned},
};

use crate::{
    actions::keys::SignatureAlgorithm,
    cli_bail, cli_ensure,
    error::{KmsCliError, result::KmsCliResult},
};

const ECDSA_WITH_SHA256: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.2");
const ECDSA_WITH_SHA384: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.3");
const ECDSA_WITH_SHA512: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.4");
const SHA256_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.11");
const SHA384_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.12");
const SHA512_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.13");

/// Signs digests with a private key that never leaves its holder
pub(crate) trait DigestSigner {
    fn algorithm(&self) -> SignatureAlgorithm;

    /// Public key matching the private signing key
    fn public_key_info(&self) -> &SubjectPublicKeyInfoOwned;

    /// Raw signature of `digest`: PKCS#1 for RSA, r || s for EC
    async fn sign_digest(&self, digest: &[u8]) -> KmsCliResult<Vec<u8>>;

    fn algorithm_identifier(&self) -> KmsCliResult<AlgorithmIdentifierOwned> {
        algorithm_identifier(self.algorithm())
    }
}

/// A domain key signing through the REST API
pub(crate) struct KmsSigner<'a> {
    client: &'a KmsRestClient,
    key_id: Uuid,
    algorithm: SignatureAlgorithm,
    public_key_info: SubjectPublicKeyInfoOwned,
}

impl<'a> KmsSigner<'a> {
    /// Fetch the public half of the key to pick the algorithm
    pub(crate) async fn new(client: &'a KmsRestClient, key_id: Uuid) -> KmsCliResult<Self> {
        let key = client.get_service_key(&key_id, Some("jwk")).await?;
        let Some(jwk) = key.keys.as_ref().and_then(|keys| keys.first()) else {
            cli_bail!("The server returned no key");
        };
        let public_key = jwk.public_key()?;
        let algorithm = default_algorithm(&public_key)?;
        debug!("signing with key {key_id} using {}", algorithm.as_str());
        Ok(Self {
            client,
            key_id,
            algorithm,
            public_key_info: public_key_info(&public_key)?,
        })
    }
}

impl DigestSigner for KmsSigner<'_> {
    fn algorithm(&self) -> SignatureAlgorithm {
        self.algorithm
    }

    fn public_key_info(&self) -> &SubjectPublicKeyInfoOwned {
        &self.public_key_info
    }

    async fn sign_digest(&self, digest: &[u8]) -> KmsCliResult<Vec<u8>> {
        let signature = self
            .client
            .sign(&self.key_id, self.algorithm.as_str(), digest)
            .await?;
        Ok(STANDARD.decode(signature)?)
    }
}

pub(crate) fn public_key_info(public_key: &PKey<Public>) -> KmsCliResult<SubjectPublicKeyInfoOwned> {
    Ok(SubjectPublicKeyInfoOwned::from_der(
        &public_key.public_key_to_der()?,
    )?)
}

/// RS256 for RSA keys, ECDSA with the hash matching the curve size for EC keys
pub(crate) fn default_algorithm(public_key: &PKey<Public>) -> KmsCliResult<SignatureAlgorithm> {
    match public_key.id() {
        Id::RSA => Ok(SignatureAlgorithm::Rs256),
        Id::EC => match public_key.ec_key()?.group().degree() {
            256 => Ok(SignatureAlgorithm::Es256),
            384 => Ok(SignatureAlgorithm::Es384),
            521 => Ok(SignatureAlgorithm::Es512),
            other => Err(KmsCliError::NotSupported(format!(
                "EC curve of {other} bits"
            ))),
        },
        other => Err(KmsCliError::NotSupported(format!(
            "signing with key type {other:?}"
        ))),
    }
}

pub(crate) fn algorithm_identifier(
    algorithm: SignatureAlgorithm,
) -> KmsCliResult<AlgorithmIdentifierOwned> {
    let (oid, parameters) = match algorithm {
        SignatureAlgorithm::Es256 => (ECDSA_WITH_SHA256, None),
        SignatureAlgorithm::Es384 => (ECDSA_WITH_SHA384, None),
        SignatureAlgorithm::Es512 => (ECDSA_WITH_SHA512, None),
        SignatureAlgorithm::Rs256 => (SHA256_WITH_RSA, Some(Any::null())),
        SignatureAlgorithm::Rs384 => (SHA384_WITH_RSA, Some(Any::null())),
        SignatureAlgorithm::Rs512 => (SHA512_WITH_RSA, Some(Any::null())),
        other => {
            return Err(KmsCliError::NotSupported(format!(
                "{} signatures in X.509 structures",
                other.as_str()
            )));
        }
    };
    Ok(AlgorithmIdentifierOwned { oid, parameters })
}

/// DER `ECDSA-Sig-Value` from the fixed size concatenation of r and s
pub(crate) fn p1363_to_der(signature: &[u8]) -> KmsCliResult<Vec<u8>> {
    cli_ensure!(
        !signature.is_empty() && signature.len() % 2 == 0,
        "Invalid EC signature length {}",
        signature.len()
    );
    let (r, s) = signature.split_at(signature.len() / 2);
    let signature = EcdsaSig::from_private_components(BigNum::from_slice(r)?, BigNum::from_slice(s)?)?;
    Ok(signature.to_der()?)
}

/// Hash the DER encoding of `tbs` and have it signed
async fn sign_der<S: DigestSigner>(signer: &S, tbs: &impl Encode) -> KmsCliResult<BitString> {
    let algorithm = signer.algorithm();
    let digest = hash(algorithm.message_digest(), &tbs.to_der()?)?;
    let mut signature = signer.sign_digest(&digest).await?;
    if algorithm.is_ec() {
        signature = p1363_to_der(&signature)?;
    }
    Ok(BitString::from_bytes(&signature)?)
}

pub(crate) async fn sign_certificate<S: DigestSigner>(
    signer: &S,
    tbs_certificate: TbsCertificate,
) -> KmsCliResult<Certificate> {
    let signature = sign_der(signer, &tbs_certificate).await?;
    Ok(Certificate {
        signature_algorithm: tbs_certificate.signature.clone(),
        tbs_certificate,
        signature,
    })
}

pub(crate) async fn sign_request<S: DigestSigner>(
    signer: &S,
    info: CertReqInfo,
) -> KmsCliResult<CertReq> {
    let signature = sign_der(signer, &info).await?;
    Ok(CertReq {
        info,
        algorithm: signer.algorithm_identifier()?,
        signature,
    })
}

pub(crate) async fn sign_crl<S: DigestSigner>(
    signer: &S,
    tbs_cert_list: TbsCertList,
) -> KmsCliResult<CertificateList> {
    let signature = sign_der(signer, &tbs_cert_list).await?;
    Ok(CertificateList {
        signature_algorithm: tbs_cert_list.signature.clone(),
        tbs_cert_list,
        signature,
    })
}

/// A signer holding its private key in memory
#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod testing {
    use openssl::{
        ecdsa::EcdsaSig,
        pkey::{Id, PKey, Private, Public},
        pkey_ctx::PkeyCtx,
        rsa::Padding,
    };
    use x509_cert::spki::SubjectPublicKeyInfoOwned;

    use super::{DigestSigner, default_algorithm, public_key_info};
    use crate::{actions::keys::SignatureAlgorithm, error::result::KmsCliResult};

    pub(crate) struct LocalSigner {
        pub private_key: PKey<Private>,
        pub public_key: PKey<Public>,
        algorithm: SignatureAlgorithm,
        public_key_info: SubjectPublicKeyInfoOwned,
    }

    impl LocalSigner {
        pub(crate) fn new(private_key: PKey<Private>) -> Self {
            let public_key =
                PKey::public_key_from_der(&private_key.public_key_to_der().unwrap()).unwrap();
            Self {
                algorithm: default_algorithm(&public_key).unwrap(),
                public_key_info: public_key_info(&public_key).unwrap(),
                private_key,
                public_key,
            }
        }
    }

    impl DigestSigner for LocalSigner {
        fn algorithm(&self) -> SignatureAlgorithm {
            self.algorithm
        }

        fn public_key_info(&self) -> &SubjectPublicKeyInfoOwned {
            &self.public_key_info
        }

        async fn sign_digest(&self, digest: &[u8]) -> KmsCliResult<Vec<u8>> {
            if self.private_key.id() == Id::EC {
                let ec = self.private_key.ec_key()?;
                let size = i32::try_from(ec.group().degree().div_ceil(8))?;
                let signature = EcdsaSig::sign(digest, &ec)?;
                let mut raw = signature.r().to_vec_padded(size)?;
                raw.extend(signature.s().to_vec_padded(size)?);
                return Ok(raw);
            }
            let mut ctx = PkeyCtx::new(&self.private_key)?;
            ctx.sign_init()?;
            ctx.set_rsa_padding(Padding::PKCS1)?;
            ctx.set_signature_md(self.algorithm.md())?;
            let mut signature = Vec::new();
            ctx.sign_to_vec(digest, &mut signature)?;
            Ok(signature)
        }
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use openssl::{
        bn::BigNum,
        ec::{EcGroup, EcKey},
        ecdsa::EcdsaSig,
        nid::Nid,
        pkey::PKey,
        rsa::Rsa,
    };

    use super::{algorithm_identifier, default_algorithm, p1363_to_der, testing::LocalSigner};
    use crate::actions::keys::SignatureAlgorithm;

    #[test]
    fn test_default_algorithm() {
        let rsa = LocalSigner::new(PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap());
        assert_eq!(default_algorithm(&rsa.public_key).unwrap(), SignatureAlgorithm::Rs256);

        for (nid, expected) in [
            (Nid::X9_62_PRIME256V1, SignatureAlgorithm::Es256),
            (Nid::SECP384R1, SignatureAlgorithm::Es384),
            (Nid::SECP521R1, SignatureAlgorithm::Es512),
        ] {
            let group = EcGroup::from_curve_name(nid).unwrap();
            let signer =
                LocalSigner::new(PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap());
            assert_eq!(default_algorithm(&signer.public_key).unwrap(), expected);
        }
    }

    #[test]
    fn test_algorithm_identifier() {
        let ec = algorithm_identifier(SignatureAlgorithm::Es384).unwrap();
        assert_eq!(ec.oid.to_string(), "1.2.840.10045.4.3.3");
        assert!(ec.parameters.is_none());

        let rsa = algorithm_identifier(SignatureAlgorithm::Rs256).unwrap();
        assert_eq!(rsa.oid.to_string(), "1.2.840.113549.1.1.11");
        assert!(rsa.parameters.is_some());

        assert!(algorithm_identifier(SignatureAlgorithm::Ps256).is_err());
    }

    #[test]
    fn test_p1363_to_der() {
        let mut raw = vec![0_u8; 32];
        raw[31] = 7;
        raw.extend([0xff_u8; 32]);
        let der = p1363_to_der(&raw).unwrap();
        let signature = EcdsaSig::from_der(&der).unwrap();
        assert_eq!(signature.r().to_owned().unwrap(), BigNum::from_u32(7).unwrap());
        assert_eq!(signature.s().num_bytes(), 32);

        assert!(p1363_to_der(&[]).is_err());
        assert!(p1363_to_der(&[1, 2, 3]).is_err());
    }
}

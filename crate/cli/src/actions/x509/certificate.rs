use std::{
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};

use clap::Parser;
use der::{
    Decode, DecodePem, Encode,
    asn1::{ObjectIdentifier, OctetString, SetOfVec},
    flagset::FlagSet,
    oid::AssociatedOid,
};
use okms_client::{KmsRestClient, der_to_pem, read_bytes_from_file};
use openssl::x509::X509Req;
use tracing::debug;
use uuid::Uuid;
use x509_cert::{
    Certificate, TbsCertificate, Version,
    attr::Attribute,
    ext::{
        AsExtension, Extension,
        pkix::{
            AuthorityKeyIdentifier, BasicConstraints, ExtendedKeyUsage, KeyUsage, KeyUsages,
        },
    },
    name::Name,
    request::{self, CertReq, CertReqInfo, ExtensionReq},
    time::Validity,
};

use super::{
    SanArgs, SubjectArgs, ca_signing_key, parse_duration, random_serial_number, read_certificate,
    signer::{DigestSigner, KmsSigner, sign_certificate, sign_request},
    subject_key_id_extension, x509_time,
};
use crate::{
    actions::keys::parse_key_id,
    cli_ensure,
    error::result::{KmsCliResult, KmsCliResultHelper},
};

const ID_KP_SERVER_AUTH: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.3.1");
const ID_KP_CLIENT_AUTH: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.3.2");

/// What a certificate is allowed to do
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Profile {
    Ca,
    Leaf { server_auth: bool, client_auth: bool },
}

impl Profile {
    fn key_usage(self) -> KeyUsage {
        let usages: FlagSet<KeyUsages> = match self {
            Self::Ca => KeyUsages::KeyCertSign | KeyUsages::CRLSign | KeyUsages::DigitalSignature,
            Self::Leaf { .. } => {
                KeyUsages::DigitalSignature | KeyUsages::KeyEncipherment | KeyUsages::KeyAgreement
            }
        };
        KeyUsage(usages)
    }

    fn extended_key_usage(self) -> Option<ExtendedKeyUsage> {
        let Self::Leaf {
            server_auth,
            client_auth,
        } = self
        else {
            return None;
        };
        let mut purposes = Vec::new();
        if client_auth {
            purposes.push(ID_KP_CLIENT_AUTH);
        }
        if server_auth {
            purposes.push(ID_KP_SERVER_AUTH);
        }
        (!purposes.is_empty()).then_some(ExtendedKeyUsage(purposes))
    }

    /// Key usages, extended key usages and basic constraints. Leaf
    /// certificates only carry basic constraints when `leaf_constraints`.
    fn extensions(self, subject: &Name, leaf_constraints: bool) -> KmsCliResult<Vec<Extension>> {
        let mut extensions = Vec::new();
        push_extension(&mut extensions, subject, &self.key_usage())?;
        if let Some(eku) = self.extended_key_usage() {
            push_extension(&mut extensions, subject, &eku)?;
        }
        let ca = self == Self::Ca;
        if ca || leaf_constraints {
            let constraints = BasicConstraints {
                ca,
                path_len_constraint: None,
            };
            push_extension(&mut extensions, subject, &constraints)?;
        }
        Ok(extensions)
    }
}

fn push_extension(
    extensions: &mut Vec<Extension>,
    subject: &Name,
    extension: &impl AsExtension,
) -> KmsCliResult<()> {
    let extension = extension.to_extension(subject, extensions)?;
    extensions.push(extension);
    Ok(())
}

fn validity(duration: Duration) -> KmsCliResult<Validity> {
    let now = SystemTime::now();
    let not_after = now
        .checked_add(duration)
        .context("Validity duration is too long")?;
    Ok(Validity {
        not_before: x509_time(now)?,
        not_after: x509_time(not_after)?,
    })
}

/// A certificate for the signer's own key, issued by itself
pub(crate) async fn self_signed<S: DigestSigner>(
    signer: &S,
    key_id: &Uuid,
    subject: Name,
    san: &SanArgs,
    duration: Duration,
    profile: Profile,
) -> KmsCliResult<Certificate> {
    let mut extensions = profile.extensions(&subject, false)?;
    extensions.push(subject_key_id_extension(&subject, key_id)?);
    if let Some(names) = san.extension(&subject)? {
        extensions.push(names);
    }
    let tbs_certificate = TbsCertificate {
        version: Version::V3,
        serial_number: random_serial_number()?,
        signature: signer.algorithm_identifier()?,
        issuer: subject.clone(),
        validity: validity(duration)?,
        subject,
        subject_public_key_info: signer.public_key_info().clone(),
        issuer_unique_id: None,
        subject_unique_id: None,
        extensions: Some(extensions),
    };
    sign_certificate(signer, tbs_certificate).await
}

pub(crate) async fn create_request<S: DigestSigner>(
    signer: &S,
    key_id: &Uuid,
    subject: Name,
    san: &SanArgs,
) -> KmsCliResult<CertReq> {
    let mut extensions = Vec::new();
    if let Some(names) = san.extension(&subject)? {
        extensions.push(names);
    }
    extensions.push(subject_key_id_extension(&subject, key_id)?);
    let attribute = Attribute::try_from(ExtensionReq(extensions))?;
    let info = CertReqInfo {
        version: request::Version::V1,
        subject,
        public_key: signer.public_key_info().clone(),
        attributes: SetOfVec::try_from(vec![attribute])?,
    };
    sign_request(signer, info).await
}

/// Extensions asked for in a certificate request
pub(crate) fn requested_extensions(request: &CertReq) -> KmsCliResult<Vec<Extension>> {
    let mut extensions = Vec::new();
    for attribute in request
        .info
        .attributes
        .iter()
        .filter(|attribute| attribute.oid == ExtensionReq::OID)
    {
        for value in attribute.values.iter() {
            extensions.extend(ExtensionReq::from_der(&value.to_der()?)?.0);
        }
    }
    Ok(extensions)
}

/// Check the request is signed by the key it carries
pub(crate) fn verify_request(request: &CertReq) -> KmsCliResult<()> {
    let request = X509Req::from_der(&request.to_der()?)?;
    let valid = request
        .verify(&*request.public_key()?)
        .context("Invalid CSR signature")?;
    cli_ensure!(valid, "Invalid CSR signature");
    Ok(())
}

/// Issue a certificate for `request`, signed by the CA key
pub(crate) async fn sign_certificate_request<S: DigestSigner>(
    signer: &S,
    request: &CertReq,
    ca: &Certificate,
    key_id: &Uuid,
    duration: Duration,
    profile: Profile,
) -> KmsCliResult<Certificate> {
    verify_request(request)?;
    let subject = request.info.subject.clone();
    let mut extensions = profile.extensions(&subject, true)?;
    let authority = AuthorityKeyIdentifier {
        key_identifier: Some(OctetString::new(key_id.as_bytes().to_vec())?),
        ..Default::default()
    };
    push_extension(&mut extensions, &subject, &authority)?;
    for requested in requested_extensions(request)? {
        if extensions.iter().any(|e| e.extn_id == requested.extn_id) {
            debug!("ignoring requested extension {}", requested.extn_id);
            continue;
        }
        extensions.push(requested);
    }
    let tbs_certificate = TbsCertificate {
        version: Version::V3,
        serial_number: random_serial_number()?,
        signature: signer.algorithm_identifier()?,
        issuer: ca.tbs_certificate.subject.clone(),
        validity: validity(duration)?,
        subject,
        subject_public_key_info: request.info.public_key.clone(),
        issuer_unique_id: None,
        subject_unique_id: None,
        extensions: Some(extensions),
    };
    sign_certificate(signer, tbs_certificate).await
}

fn read_request(path: &Path) -> KmsCliResult<CertReq> {
    let bytes = read_bytes_from_file(&path)?;
    CertReq::from_pem(&bytes)
        .or_else(|_| CertReq::from_der(&bytes))
        .with_context(|| format!("Invalid certificate request {}", path.display()))
}

/// Generate a self-signed CA, signed with the key identified by KEY-ID
#[derive(Parser, Debug)]
pub struct CreateCaAction {
    #[arg(value_name = "KEY-ID")]
    key_id: String,

    #[command(flatten)]
    subject: SubjectArgs,

    #[command(flatten)]
    san: SanArgs,

    /// Validity duration
    #[arg(long, default_value = "365d", value_parser = parse_duration)]
    validity: Duration,
}

impl CreateCaAction {
    pub async fn run(&self, client: &KmsRestClient) -> KmsCliResult<String> {
        let key_id = parse_key_id(&self.key_id)?;
        let signer = KmsSigner::new(client, key_id).await?;
        let certificate = self_signed(
            &signer,
            &key_id,
            self.subject.name()?,
            &self.san,
            self.validity,
            Profile::Ca,
        )
        .await?;
        Ok(der_to_pem(&certificate.to_der()?, "CERTIFICATE"))
    }
}

/// Generate a self-signed certificate, signed with the key identified by KEY-ID
#[derive(Parser, Debug)]
pub struct CreateCertAction {
    #[arg(value_name = "KEY-ID")]
    key_id: String,

    #[command(flatten)]
    subject: SubjectArgs,

    #[command(flatten)]
    san: SanArgs,

    /// Validity duration
    #[arg(long, default_value = "365d", value_parser = parse_duration)]
    validity: Duration,

    /// Enable server auth extended key usage
    #[arg(long)]
    server_auth: bool,

    /// Enable client auth extended key usage
    #[arg(long)]
    client_auth: bool,
}

impl CreateCertAction {
    pub async fn run(&self, client: &KmsRestClient) -> KmsCliResult<String> {
        let key_id = parse_key_id(&self.key_id)?;
        let signer = KmsSigner::new(client, key_id).await?;
        let profile = Profile::Leaf {
            server_auth: self.server_auth,
            client_auth: self.client_auth,
        };
        let certificate = self_signed(
            &signer,
            &key_id,
            self.subject.name()?,
            &self.san,
            self.validity,
            profile,
        )
        .await?;
        Ok(der_to_pem(&certificate.to_der()?, "CERTIFICATE"))
    }
}

/// Generate a certificate request signed with the key identified by KEY-ID
#[derive(Parser, Debug)]
pub struct CreateCsrAction {
    #[arg(value_name = "KEY-ID")]
    key_id: String,

    #[command(flatten)]
    subject: SubjectArgs,

    #[command(flatten)]
    san: SanArgs,
}

impl CreateCsrAction {
    pub async fn run(&self, client: &KmsRestClient) -> KmsCliResult<String> {
        let key_id = parse_key_id(&self.key_id)?;
        let signer = KmsSigner::new(client, key_id).await?;
        let request = create_request(&signer, &key_id, self.subject.name()?, &self.san).await?;
        Ok(der_to_pem(&request.to_der()?, "CERTIFICATE REQUEST"))
    }
}

/// Sign a certificate request with a CA whose key is stored in the KMS.
///
/// KEY-ID can be left out when the CA's subject key id is the UUID of its key.
#[derive(Parser, Debug)]
pub struct SignAction {
    /// Certificate request, PEM or DER
    #[arg(value_name = "CSR")]
    csr: PathBuf,

    /// CA certificate, PEM or DER
    #[arg(value_name = "CA")]
    ca_certificate: PathBuf,

    #[arg(value_name = "KEY-ID")]
    key_id: Option<String>,

    /// Validity duration
    #[arg(long, default_value = "365d", value_parser = parse_duration)]
    validity: Duration,

    /// Enable server auth extended key usage
    #[arg(long)]
    server_auth: bool,

    /// Enable client auth extended key usage
    #[arg(long)]
    client_auth: bool,

    /// Sign as a CA certificate
    #[arg(long, conflicts_with_all = ["server_auth", "client_auth"])]
    new_ca: bool,
}

impl SignAction {
    fn profile(&self) -> Profile {
        if self.new_ca {
            Profile::Ca
        } else {
            Profile::Leaf {
                server_auth: self.server_auth,
                client_auth: self.client_auth,
            }
        }
    }

    pub async fn run(&self, client: &KmsRestClient) -> KmsCliResult<String> {
        let request = read_request(&self.csr)?;
        let ca = read_certificate(&self.ca_certificate)?;
        let key_id = ca_signing_key(self.key_id.as_deref(), &ca)?;
        let signer = KmsSigner::new(client, key_id).await?;
        let certificate = sign_certificate_request(
            &signer,
            &request,
            &ca,
            &key_id,
            self.validity,
            self.profile(),
        )
        .await?;
        Ok(der_to_pem(&certificate.to_der()?, "CERTIFICATE"))
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use std::time::Duration;

    use clap::Parser;
    use der::{Encode, oid::AssociatedOid};
    use openssl::{
        ec::{EcGroup, EcKey},
        nid::Nid,
        pkey::PKey,
        rsa::Rsa,
        x509::{X509, X509Req},
    };
    use uuid::Uuid;
    use x509_cert::{
        Certificate,
        ext::pkix::{BasicConstraints, ExtendedKeyUsage, SubjectAltName},
    };

    use super::{
        Profile, SignAction, create_request, requested_extensions, self_signed,
        sign_certificate_request,
    };
    use crate::actions::x509::{
        SanArgs, SubjectArgs, ca_signing_key, find_extension, signer::testing::LocalSigner,
        subject_key_id,
    };

    const KEY_ID: &str = "3bd3b1a4-e9e4-4f63-9aa5-7d1c0b6a4a28";

    #[derive(Parser)]
    struct Names {
        #[command(flatten)]
        subject: SubjectArgs,
        #[command(flatten)]
        san: SanArgs,
    }

    fn names(args: &[&str]) -> Names {
        Names::try_parse_from(std::iter::once("x").chain(args.iter().copied())).unwrap()
    }

    fn ec_signer() -> LocalSigner {
        let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
        LocalSigner::new(PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap())
    }

    fn has_extension(certificate: &Certificate, oid: der::asn1::ObjectIdentifier) -> bool {
        find_extension(certificate.tbs_certificate.extensions.as_deref(), oid).is_some()
    }

    #[tokio::test]
    async fn test_self_signed_ca() {
        let signer = ec_signer();
        let key_id = Uuid::parse_str(KEY_ID).unwrap();
        let args = names(&["--cn", "my-ca", "--dns-names", "ca.example.com"]);
        let certificate = self_signed(
            &signer,
            &key_id,
            args.subject.name().unwrap(),
            &args.san,
            Duration::from_secs(86_400),
            Profile::Ca,
        )
        .await
        .unwrap();

        assert_eq!(subject_key_id(&certificate).unwrap(), key_id.as_bytes());
        assert_eq!(ca_signing_key(None, &certificate).unwrap(), key_id);
        assert!(has_extension(&certificate, BasicConstraints::OID));
        assert!(has_extension(&certificate, SubjectAltName::OID));
        assert!(!has_extension(&certificate, ExtendedKeyUsage::OID));

        let x509 = X509::from_der(&certificate.to_der().unwrap()).unwrap();
        assert!(x509.verify(&signer.public_key).unwrap());
        assert_eq!(x509.subject_key_id().unwrap().as_slice(), key_id.as_bytes());
        assert_eq!(
            x509.subject_alt_names().unwrap()[0].dnsname(),
            Some("ca.example.com")
        );
    }

    #[tokio::test]
    async fn test_self_signed_rsa_leaf() {
        let signer = LocalSigner::new(PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap());
        let key_id = Uuid::parse_str(KEY_ID).unwrap();
        let args = names(&["--cn", "leaf"]);
        let certificate = self_signed(
            &signer,
            &key_id,
            args.subject.name().unwrap(),
            &args.san,
            Duration::from_secs(3_600),
            Profile::Leaf {
                server_auth: true,
                client_auth: false,
            },
        )
        .await
        .unwrap();
        assert!(!has_extension(&certificate, BasicConstraints::OID));
        assert!(has_extension(&certificate, ExtendedKeyUsage::OID));

        let x509 = X509::from_der(&certificate.to_der().unwrap()).unwrap();
        assert!(x509.verify(&signer.public_key).unwrap());
    }

    #[tokio::test]
    async fn test_sign_request() {
        let ca_signer = ec_signer();
        let ca_key = Uuid::parse_str(KEY_ID).unwrap();
        let ca_names = names(&["--cn", "my-ca"]);
        let ca = self_signed(
            &ca_signer,
            &ca_key,
            ca_names.subject.name().unwrap(),
            &ca_names.san,
            Duration::from_secs(86_400),
            Profile::Ca,
        )
        .await
        .unwrap();

        let leaf_signer = ec_signer();
        let leaf_key = Uuid::new_v4();
        let leaf_names = names(&["--cn", "server", "--ip-addrs", "10.0.0.1"]);
        let request = create_request(
            &leaf_signer,
            &leaf_key,
            leaf_names.subject.name().unwrap(),
            &leaf_names.san,
        )
        .await
        .unwrap();
        let x509_req = X509Req::from_der(&request.to_der().unwrap()).unwrap();
        assert!(x509_req.verify(&leaf_signer.public_key).unwrap());
        assert_eq!(requested_extensions(&request).unwrap().len(), 2);

        let certificate = sign_certificate_request(
            &ca_signer,
            &request,
            &ca,
            &ca_key,
            Duration::from_secs(3_600),
            Profile::Leaf {
                server_auth: true,
                client_auth: true,
            },
        )
        .await
        .unwrap();
        assert_eq!(subject_key_id(&certificate).unwrap(), leaf_key.as_bytes());
        assert_eq!(
            certificate.tbs_certificate.issuer,
            ca.tbs_certificate.subject
        );

        let x509 = X509::from_der(&certificate.to_der().unwrap()).unwrap();
        assert!(x509.verify(&ca_signer.public_key).unwrap());
        assert!(!x509.verify(&leaf_signer.public_key).unwrap());
        assert_eq!(x509.authority_key_id().unwrap().as_slice(), ca_key.as_bytes());
        assert!(x509.subject_alt_names().is_some());
    }

    #[tokio::test]
    async fn test_tampered_request_is_rejected() {
        let signer = ec_signer();
        let args = names(&["--cn", "server"]);
        let mut request = create_request(
            &signer,
            &Uuid::new_v4(),
            args.subject.name().unwrap(),
            &args.san,
        )
        .await
        .unwrap();
        request.info.subject = names(&["--cn", "other"]).subject.name().unwrap();

        let ca = self_signed(
            &signer,
            &Uuid::new_v4(),
            args.subject.name().unwrap(),
            &args.san,
            Duration::from_secs(60),
            Profile::Ca,
        )
        .await
        .unwrap();
        let err = sign_certificate_request(
            &signer,
            &request,
            &ca,
            &Uuid::new_v4(),
            Duration::from_secs(60),
            Profile::Ca,
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("Invalid CSR signature"), "{err}");
    }

    #[tokio::test]
    async fn test_ca_without_uuid_subject_key_id() {
        let signer = ec_signer();
        let args = names(&["--cn", "leaf"]);
        let mut certificate = self_signed(
            &signer,
            &Uuid::new_v4(),
            args.subject.name().unwrap(),
            &args.san,
            Duration::from_secs(60),
            Profile::Leaf {
                server_auth: false,
                client_auth: false,
            },
        )
        .await
        .unwrap();
        certificate.tbs_certificate.extensions = None;
        let err = ca_signing_key(None, &certificate).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot use CA's subject key id, please provide the KEY-ID"
        );
        assert!(ca_signing_key(Some(KEY_ID), &certificate).is_ok());
    }

    #[test]
    fn test_new_ca_conflicts_with_auth_flags() {
        assert!(SignAction::try_parse_from(["sign", "req.pem", "ca.pem", "--new-ca"]).is_ok());
        assert!(
            SignAction::try_parse_from(["sign", "req.pem", "ca.pem", "--new-ca", "--server-auth"])
                .is_err()
        );
        assert!(
            SignAction::try_parse_from(["sign", "req.pem", "ca.pem", "--new-ca", "--client-auth"])
                .is_err()
        );
        let action =
            SignAction::try_parse_from(["sign", "req.pem", "ca.pem", KEY_ID, "--validity", "30d"])
                .unwrap();
        assert_eq!(action.validity, Duration::from_secs(30 * 86_400));
        assert_eq!(action.key_id.as_deref(), Some(KEY_ID));
    }
}

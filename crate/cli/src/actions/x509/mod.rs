//! X.509 certificates, requests and revocation lists signed by domain keys.
//!
//! The structures are built locally. Only the digest of their DER encoding
//! is sent to the server to be signed.

use std::{
    net::IpAddr,
    path::Path,
    time::{Duration, SystemTime},
};

use clap::{Args, Parser, Subcommand};
use der::{
    Decode, DecodePem,
    asn1::{
        Any, GeneralizedTime, Ia5String, ObjectIdentifier, PrintableStringRef, UtcTime,
        Utf8StringRef,
    },
    oid::AssociatedOid,
};
use okms_client::read_bytes_from_file;
use openssl::rand::rand_bytes;
use uuid::Uuid;
use x509_cert::{
    Certificate,
    attr::AttributeTypeAndValue,
    ext::{
        AsExtension, Extension,
        pkix::{SubjectAltName, SubjectKeyIdentifier, name::GeneralName},
    },
    name::{Name, RdnSequence, RelativeDistinguishedName},
    serial_number::SerialNumber,
    time::Time,
};

use self::{
    certificate::{CreateCaAction, CreateCertAction, CreateCsrAction, SignAction},
    crl::CrlAction,
};
use super::{CliContext, RestArgs, keys::parse_key_id};
use crate::error::result::{KmsCliResult, KmsCliResultHelper};

mod certificate;
mod crl;
mod signer;

const ID_AT_COMMON_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.3");
const ID_AT_COUNTRY_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.6");
const ID_AT_ORGANIZATION_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.10");
const ID_AT_ORGANIZATIONAL_UNIT_NAME: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("2.5.4.11");

/// Generate and sign X.509 certificates with domain keys
#[derive(Parser, Debug)]
pub struct X509Command {
    #[command(flatten)]
    pub rest: RestArgs,

    #[command(subcommand)]
    pub command: X509Commands,
}

#[derive(Subcommand, Debug)]
pub enum X509Commands {
    #[command(subcommand, visible_aliases = ["new", "gen", "generate"])]
    Create(CreateCommands),
    Sign(SignAction),
    Crl(CrlAction),
}

/// Generate certificates and certificate requests signed with a domain key
#[derive(Subcommand, Debug)]
pub enum CreateCommands {
    Ca(CreateCaAction),
    Cert(CreateCertAction),
    Csr(CreateCsrAction),
}

impl X509Command {
    pub async fn process(&self, ctx: &CliContext) -> KmsCliResult<()> {
        let client = self.rest.client(ctx)?;
        let pem = match &self.command {
            X509Commands::Create(CreateCommands::Ca(action)) => action.run(&client).await?,
            X509Commands::Create(CreateCommands::Cert(action)) => action.run(&client).await?,
            X509Commands::Create(CreateCommands::Csr(action)) => action.run(&client).await?,
            X509Commands::Sign(action) => action.run(&client).await?,
            X509Commands::Crl(action) => action.run(&client).await?,
        };
        print!("{pem}");
        Ok(())
    }
}

/// Subject distinguished name
#[derive(Args, Debug, Clone, Default)]
pub struct SubjectArgs {
    /// Common name
    #[arg(long)]
    cn: Option<String>,

    /// Comma separated organizational units
    #[arg(long, value_delimiter = ',')]
    ou: Vec<String>,

    /// Comma separated organizations
    #[arg(long, value_delimiter = ',')]
    org: Vec<String>,

    /// Comma separated countries
    #[arg(long, value_delimiter = ',')]
    country: Vec<String>,
}

/// One multi-valued relative name holding every value of an attribute
fn rdn(
    oid: ObjectIdentifier,
    values: impl IntoIterator<Item = Any>,
) -> KmsCliResult<RelativeDistinguishedName> {
    let atvs = values
        .into_iter()
        .map(|value| AttributeTypeAndValue { oid, value })
        .collect::<Vec<_>>();
    Ok(RelativeDistinguishedName::try_from(atvs)?)
}

fn utf8_values(values: &[String]) -> KmsCliResult<Vec<Any>> {
    values
        .iter()
        .map(|value| Ok(Any::encode_from(&Utf8StringRef::new(value)?)?))
        .collect()
}

impl SubjectArgs {
    /// Relative names ordered country, organization, unit then common name
    pub(crate) fn name(&self) -> KmsCliResult<Name> {
        let mut rdns = Vec::new();
        if !self.country.is_empty() {
            let countries = self
                .country
                .iter()
                .map(|c| Ok(Any::encode_from(&PrintableStringRef::new(c)?)?))
                .collect::<KmsCliResult<Vec<_>>>()?;
            rdns.push(rdn(ID_AT_COUNTRY_NAME, countries)?);
        }
        if !self.org.is_empty() {
            rdns.push(rdn(ID_AT_ORGANIZATION_NAME, utf8_values(&self.org)?)?);
        }
        if !self.ou.is_empty() {
            rdns.push(rdn(ID_AT_ORGANIZATIONAL_UNIT_NAME, utf8_values(&self.ou)?)?);
        }
        if let Some(cn) = &self.cn {
            rdns.push(rdn(
                ID_AT_COMMON_NAME,
                [Any::encode_from(&Utf8StringRef::new(cn)?)?],
            )?);
        }
        Ok(RdnSequence(rdns))
    }
}

/// Subject alternative names
#[derive(Args, Debug, Clone, Default)]
pub struct SanArgs {
    /// Comma separated list of DNS names
    #[arg(long, value_delimiter = ',')]
    dns_names: Vec<String>,

    /// Comma separated list of email addresses
    #[arg(long, value_delimiter = ',')]
    emails: Vec<String>,

    /// Comma separated list of IP addresses
    #[arg(long, value_delimiter = ',')]
    ip_addrs: Vec<IpAddr>,
}

impl SanArgs {
    /// The subjectAltName extension, when any name is given
    pub(crate) fn extension(&self, subject: &Name) -> KmsCliResult<Option<Extension>> {
        let mut names = Vec::new();
        for dns in &self.dns_names {
            names.push(GeneralName::DnsName(Ia5String::new(dns)?));
        }
        for email in &self.emails {
            names.push(GeneralName::Rfc822Name(Ia5String::new(email)?));
        }
        names.extend(self.ip_addrs.iter().copied().map(GeneralName::from));
        if names.is_empty() {
            return Ok(None);
        }
        Ok(Some(SubjectAltName(names).to_extension(subject, &[])?))
    }
}

/// Parse a duration such as `365d`, `12h30m` or `90s`
pub(crate) fn parse_duration(value: &str) -> Result<Duration, String> {
    let mut total = Duration::ZERO;
    let mut digits = String::new();
    for c in value.trim().chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        let unit: u64 = match c {
            'd' => 86_400,
            'h' => 3_600,
            'm' => 60,
            's' => 1,
            other => return Err(format!("invalid unit {other:?} in duration {value:?}")),
        };
        let amount: u64 = digits
            .parse()
            .map_err(|_e| format!("missing number before {c:?} in duration {value:?}"))?;
        digits.clear();
        total = amount
            .checked_mul(unit)
            .map(Duration::from_secs)
            .and_then(|d| total.checked_add(d))
            .ok_or_else(|| format!("duration {value:?} is too large"))?;
    }
    if !digits.is_empty() {
        return Err(format!(
            "missing unit in duration {value:?}, use one of d, h, m or s"
        ));
    }
    if total.is_zero() {
        return Err(format!("invalid duration {value:?}"));
    }
    Ok(total)
}

/// A random positive serial number below `i64::MAX`
pub(crate) fn random_serial_number() -> KmsCliResult<SerialNumber> {
    loop {
        let mut bytes = [0_u8; 8];
        rand_bytes(&mut bytes)?;
        let value = u64::from_be_bytes(bytes) & (u64::MAX >> 1);
        if value != 0 && value != u64::MAX >> 1 {
            return Ok(SerialNumber::new(&value.to_be_bytes())?);
        }
    }
}

/// UTCTime up to 2049, GeneralizedTime afterwards
pub(crate) fn x509_time(time: SystemTime) -> KmsCliResult<Time> {
    Ok(match UtcTime::from_system_time(time) {
        Ok(utc) => Time::UtcTime(utc),
        Err(_) => Time::GeneralTime(GeneralizedTime::from_system_time(time)?),
    })
}

pub(crate) fn subject_key_id_extension(subject: &Name, key_id: &Uuid) -> KmsCliResult<Extension> {
    let ski = SubjectKeyIdentifier(der::asn1::OctetString::new(key_id.as_bytes().to_vec())?);
    Ok(ski.to_extension(subject, &[])?)
}

pub(crate) fn find_extension<'a>(
    extensions: Option<&'a [Extension]>,
    oid: ObjectIdentifier,
) -> Option<&'a Extension> {
    extensions?.iter().find(|ext| ext.extn_id == oid)
}

/// The subject key identifier of a certificate
pub(crate) fn subject_key_id(certificate: &Certificate) -> Option<Vec<u8>> {
    let extension = find_extension(
        certificate.tbs_certificate.extensions.as_deref(),
        SubjectKeyIdentifier::OID,
    )?;
    let ski = SubjectKeyIdentifier::from_der(extension.extn_value.as_bytes()).ok()?;
    Some(ski.0.as_bytes().to_vec())
}

/// The key signing for a CA: the given KEY-ID, or the CA's subject key
/// identifier when it is a UUID
pub(crate) fn ca_signing_key(key_id: Option<&str>, ca: &Certificate) -> KmsCliResult<Uuid> {
    if let Some(key_id) = key_id {
        return parse_key_id(key_id);
    }
    subject_key_id(ca)
        .filter(|ski| ski.len() == 16)
        .and_then(|ski| Uuid::from_slice(&ski).ok())
        .context("Cannot use CA's subject key id, please provide the KEY-ID")
}

/// Read a PEM or DER certificate
pub(crate) fn read_certificate(path: &Path) -> KmsCliResult<Certificate> {
    let bytes = read_bytes_from_file(&path)?;
    Certificate::from_pem(&bytes)
        .or_else(|_| Certificate::from_der(&bytes))
        .with_context(|| format!("Invalid certificate {}", path.display()))
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime};

    use clap::Parser;
    use der::Encode;
    use uuid::Uuid;
    use x509_cert::time::Time;

    use super::{
        SanArgs, SubjectArgs, parse_duration, random_serial_number, subject_key_id_extension,
        x509_time,
    };

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        subject: SubjectArgs,
        #[command(flatten)]
        san: SanArgs,
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("365d").unwrap(), Duration::from_secs(365 * 86_400));
        assert_eq!(parse_duration("1h30m").unwrap(), Duration::from_secs(5_400));
        assert_eq!(parse_duration("45s").unwrap(), Duration::from_secs(45));
        assert!(parse_duration("10").is_err());
        assert!(parse_duration("3w").is_err());
        assert!(parse_duration("d").is_err());
        assert!(parse_duration("0s").is_err());
    }

    #[test]
    fn test_subject_name() {
        let args = Wrapper::try_parse_from([
            "x", "--cn", "my-ca", "--org", "ACME", "--ou", "IT,Ops", "--country", "FR",
        ])
        .unwrap();
        let name = args.subject.name().unwrap();
        assert_eq!(name.to_string(), "CN=my-ca,OU=IT+OU=Ops,O=ACME,C=FR");
    }

    #[test]
    fn test_san_extension() {
        let args = Wrapper::try_parse_from([
            "x",
            "--dns-names",
            "a.example.com,b.example.com",
            "--ip-addrs",
            "10.0.0.1,::1",
            "--emails",
            "admin@example.com",
        ])
        .unwrap();
        let subject = args.subject.name().unwrap();
        let extension = args.san.extension(&subject).unwrap().unwrap();
        assert_eq!(extension.extn_id.to_string(), "2.5.29.17");
        // an empty subject makes the alternative names critical
        assert!(extension.critical);

        let empty = Wrapper::try_parse_from(["x"]).unwrap();
        assert!(empty.san.extension(&subject).unwrap().is_none());
    }

    #[test]
    fn test_serial_number_is_positive() {
        for _ in 0..32 {
            let serial = random_serial_number().unwrap();
            let bytes = serial.as_bytes();
            assert!(!bytes.is_empty() && bytes.len() <= 8);
            assert!(bytes.len() < 8 || bytes[0] & 0x80 == 0);
        }
    }

    #[test]
    fn test_x509_time() {
        assert!(matches!(x509_time(SystemTime::now()).unwrap(), Time::UtcTime(_)));
        let far = SystemTime::UNIX_EPOCH + Duration::from_secs(2_600_000_000);
        assert!(matches!(x509_time(far).unwrap(), Time::GeneralTime(_)));
    }

    #[test]
    fn test_subject_key_id_extension() {
        let id = Uuid::parse_str("3bd3b1a4-e9e4-4f63-9aa5-7d1c0b6a4a28").unwrap();
        let extension = subject_key_id_extension(&Default::default(), &id).unwrap();
        assert!(!extension.critical);
        // OCTET STRING of the 16 UUID bytes
        let value = extension.extn_value.as_bytes();
        assert_eq!(&value[..2], [0x04, 16]);
        assert_eq!(&value[2..], id.as_bytes());
        assert!(extension.to_der().is_ok());
    }
}

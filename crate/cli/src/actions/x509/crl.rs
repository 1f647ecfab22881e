use std::{
    path::PathBuf,
    time::{Duration, SystemTime},
};

use clap::Parser;
use der::{
    Decode, Encode,
    asn1::{OctetString, Uint},
    oid::AssociatedOid,
};
use okms_client::{KmsRestClient, der_to_pem, read_bytes_from_file};
use openssl::bn::BigNum;
use serde::Deserialize;
use serde_json::Value;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use x509_cert::{
    Certificate, Version,
    crl::{CertificateList, RevokedCert, TbsCertList},
    ext::{
        AsExtension,
        pkix::{AuthorityKeyIdentifier, CrlNumber, CrlReason, KeyUsage, KeyUsages},
    },
    serial_number::SerialNumber,
};

use super::{
    ca_signing_key, find_extension, parse_duration, read_certificate,
    signer::{DigestSigner, KmsSigner, sign_crl},
    subject_key_id, x509_time,
};
use crate::{
    cli_bail, cli_ensure,
    error::result::{KmsCliResult, KmsCliResultHelper},
};

/// An entry of the revocation list file
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RevocationEntry {
    #[serde(default)]
    serial_number: Value,
    revocation_date: String,
    #[serde(default)]
    reason_code: Option<i64>,
}

/// Serial numbers are decimal strings, `0x` prefixed hexadecimal strings
/// or JSON numbers
fn parse_serial(value: &Value) -> KmsCliResult<SerialNumber> {
    let number = match value {
        Value::String(text) => {
            if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
                cli_ensure!(
                    !hex.is_empty() && hex.bytes().all(|b| b.is_ascii_hexdigit()),
                    "Invalid hexadecimal serial number {text:?}"
                );
                BigNum::from_hex_str(hex)?
            } else {
                cli_ensure!(
                    !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()),
                    "Invalid decimal serial number {text:?}, hexadecimal values must start with 0x"
                );
                BigNum::from_dec_str(text)?
            }
        }
        Value::Number(number) => {
            let number = number
                .as_u64()
                .with_context(|| format!("Invalid serial number {number}"))?;
            BigNum::from_dec_str(&number.to_string())?
        }
        Value::Null => cli_bail!("Missing serial number"),
        other => cli_bail!("Invalid serial number {other}"),
    };
    let mut bytes = number.to_vec();
    if bytes.is_empty() {
        bytes.push(0);
    }
    Ok(SerialNumber::new(&bytes)?)
}

fn crl_reason(code: i64) -> KmsCliResult<CrlReason> {
    Ok(match code {
        0 => CrlReason::Unspecified,
        1 => CrlReason::KeyCompromise,
        2 => CrlReason::CaCompromise,
        3 => CrlReason::AffiliationChanged,
        4 => CrlReason::Superseded,
        5 => CrlReason::CessationOfOperation,
        6 => CrlReason::CertificateHold,
        8 => CrlReason::RemoveFromCRL,
        9 => CrlReason::PrivilegeWithdrawn,
        10 => CrlReason::AaCompromise,
        other => cli_bail!("Invalid reason code {other}"),
    })
}

impl RevocationEntry {
    fn revoked_cert(&self, ca: &Certificate) -> KmsCliResult<RevokedCert> {
        let serial_number = parse_serial(&self.serial_number)?;
        let date = OffsetDateTime::parse(&self.revocation_date, &Rfc3339)
            .with_context(|| format!("Invalid revocation date {:?}", self.revocation_date))?;
        // unspecified is left out, as the entry has no reason at all
        let crl_entry_extensions = match self.reason_code {
            Some(code) if code != 0 => Some(vec![
                crl_reason(code)?.to_extension(&ca.tbs_certificate.subject, &[])?,
            ]),
            _ => None,
        };
        Ok(RevokedCert {
            serial_number,
            revocation_date: x509_time(SystemTime::from(date))?,
            crl_entry_extensions,
        })
    }
}

pub(crate) fn parse_revocation_list(bytes: &[u8]) -> KmsCliResult<Vec<RevocationEntry>> {
    serde_json::from_slice(bytes).context("Invalid revocation list")
}

/// A revocation list issued by `ca`, whose key is held by `signer`
pub(crate) async fn create_crl<S: DigestSigner>(
    signer: &S,
    ca: &Certificate,
    entries: &[RevocationEntry],
    next_update: Duration,
    crl_number: u64,
) -> KmsCliResult<CertificateList> {
    let extensions = ca.tbs_certificate.extensions.as_deref();
    if let Some(extension) = find_extension(extensions, KeyUsage::OID) {
        let usage = KeyUsage::from_der(extension.extn_value.as_bytes())?;
        cli_ensure!(
            usage.0.contains(KeyUsages::CRLSign),
            "The CA certificate does not have the crlSign key usage"
        );
    }
    let key_identifier = subject_key_id(ca)
        .context("The CA certificate does not contain a subject key identifier")?;

    let issuer = ca.tbs_certificate.subject.clone();
    let revoked = entries
        .iter()
        .map(|entry| entry.revoked_cert(ca))
        .collect::<KmsCliResult<Vec<_>>>()?;
    let authority = AuthorityKeyIdentifier {
        key_identifier: Some(OctetString::new(key_identifier)?),
        ..Default::default()
    };
    let crl_extensions = vec![
        authority.to_extension(&issuer, &[])?,
        CrlNumber(Uint::new(&crl_number.to_be_bytes())?).to_extension(&issuer, &[])?,
    ];

    let now = SystemTime::now();
    let next = now
        .checked_add(next_update)
        .context("Next update is too far")?;
    let tbs_cert_list = TbsCertList {
        version: Version::V2,
        signature: signer.algorithm_identifier()?,
        issuer,
        this_update: x509_time(now)?,
        next_update: Some(x509_time(next)?),
        revoked_certificates: (!revoked.is_empty()).then_some(revoked),
        crl_extensions: Some(crl_extensions),
    };
    sign_crl(signer, tbs_cert_list).await
}

/// Generate a Certificate Revocation List with a CA whose key is stored in
/// the KMS.
///
/// REVOKE_LIST is a JSON array of entries holding `serialNumber` (a decimal
/// string, or a hexadecimal one prefixed with 0x), `revocationDate`
/// (RFC 3339) and an optional `reasonCode`.
#[derive(Parser, Debug)]
pub struct CrlAction {
    /// CA certificate, PEM or DER
    #[arg(value_name = "CA")]
    ca_certificate: PathBuf,

    #[arg(value_name = "REVOKE_LIST")]
    revoke_list: PathBuf,

    #[arg(value_name = "KEY-ID")]
    key_id: Option<String>,

    /// Duration before the next update of the CRL
    #[arg(long, alias = "nextUpdate", default_value = "30d", value_parser = parse_duration)]
    next_update: Duration,

    /// CRL number, i.e. its version
    #[arg(long, alias = "crlNumber", default_value_t = 1)]
    crl_number: u64,
}

impl CrlAction {
    pub async fn run(&self, client: &KmsRestClient) -> KmsCliResult<String> {
        let ca = read_certificate(&self.ca_certificate)?;
        let entries = parse_revocation_list(&read_bytes_from_file(&self.revoke_list)?)?;
        let key_id = ca_signing_key(self.key_id.as_deref(), &ca)?;
        let signer = KmsSigner::new(client, key_id).await?;
        let crl = create_crl(&signer, &ca, &entries, self.next_update, self.crl_number).await?;
        Ok(der_to_pem(&crl.to_der()?, "X509 CRL"))
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use std::time::Duration;

    use clap::Parser;
    use der::Encode;
    use openssl::{
        ec::{EcGroup, EcKey},
        nid::Nid,
        pkey::PKey,
        x509::X509Crl,
    };
    use serde_json::json;
    use uuid::Uuid;
    use x509_cert::name::Name;

    use super::{CrlAction, create_crl, parse_revocation_list, parse_serial};
    use crate::actions::x509::{
        SanArgs,
        certificate::{Profile, self_signed},
        signer::testing::LocalSigner,
    };

    #[test]
    fn test_parse_serial() {
        let serial = |value| parse_serial(&value).map(|s| s.as_bytes().to_vec());
        assert_eq!(serial(json!("258")).unwrap(), [1, 2]);
        assert_eq!(serial(json!("0x0102")).unwrap(), [1, 2]);
        assert_eq!(serial(json!("0X1f")).unwrap(), [0x1f]);
        assert_eq!(serial(json!(258)).unwrap(), [1, 2]);
        assert_eq!(serial(json!("0")).unwrap(), [0]);
        // big serials do not fit in a JSON number
        assert!(serial(json!("1234567890123456789012345678901234567890")).is_ok());

        let err = serial(json!("1F")).unwrap_err();
        assert!(err.to_string().contains("must start with 0x"), "{err}");
        assert!(serial(json!(null)).is_err());
        assert!(serial(json!("0x")).is_err());
        assert!(serial(json!("0xZZ")).is_err());
        assert!(serial(json!("-5")).is_err());
        assert!(serial(json!(-5)).is_err());
        assert!(serial(json!(1.5)).is_err());
        assert!(serial(json!([1])).is_err());
    }

    #[test]
    fn test_flag_aliases() {
        let action = CrlAction::try_parse_from([
            "crl",
            "ca.pem",
            "revoked.json",
            "--nextUpdate",
            "7d",
            "--crlNumber",
            "3",
        ])
        .unwrap();
        assert_eq!(action.next_update, Duration::from_secs(7 * 86_400));
        assert_eq!(action.crl_number, 3);
        assert!(action.key_id.is_none());

        let action = CrlAction::try_parse_from(["crl", "ca.pem", "revoked.json"]).unwrap();
        assert_eq!(action.next_update, Duration::from_secs(30 * 86_400));
        assert_eq!(action.crl_number, 1);
    }

    #[tokio::test]
    async fn test_create_crl() {
        let group = EcGroup::from_curve_name(Nid::SECP384R1).unwrap();
        let signer = LocalSigner::new(PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap());
        let ca = self_signed(
            &signer,
            &Uuid::new_v4(),
            Name::default(),
            &SanArgs::default(),
            Duration::from_secs(86_400),
            Profile::Ca,
        )
        .await
        .unwrap();

        let entries = parse_revocation_list(
            json!([
                {"serialNumber": "12345", "revocationDate": "2024-03-05T10:11:12Z"},
                {"serialNumber": "0xABCDEF", "revocationDate": "2024-03-06T00:00:00+02:00", "reasonCode": 1},
                {"serialNumber": 42, "revocationDate": "2024-03-07T00:00:00Z", "reasonCode": 0},
            ])
            .to_string()
            .as_bytes(),
        )
        .unwrap();
        let crl = create_crl(&signer, &ca, &entries, Duration::from_secs(3_600), 7)
            .await
            .unwrap();
        let revoked = crl.tbs_cert_list.revoked_certificates.as_ref().unwrap();
        assert_eq!(revoked.len(), 3);
        assert!(revoked[0].crl_entry_extensions.is_none());
        assert_eq!(revoked[1].crl_entry_extensions.as_ref().unwrap().len(), 1);
        assert!(revoked[2].crl_entry_extensions.is_none());

        let x509_crl = X509Crl::from_der(&crl.to_der().unwrap()).unwrap();
        assert!(x509_crl.verify(&signer.public_key).unwrap());
        let serials: Vec<String> = x509_crl
            .get_revoked()
            .unwrap()
            .iter()
            .map(|entry| entry.serial_number().to_bn().unwrap().to_dec_str().unwrap().to_string())
            .collect();
        assert_eq!(serials, ["12345", "11259375", "42"]);
    }

    #[tokio::test]
    async fn test_crl_checks_the_ca() {
        let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
        let signer = LocalSigner::new(PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap());
        let leaf = self_signed(
            &signer,
            &Uuid::new_v4(),
            Name::default(),
            &SanArgs::default(),
            Duration::from_secs(60),
            Profile::Leaf {
                server_auth: false,
                client_auth: false,
            },
        )
        .await
        .unwrap();
        let err = create_crl(&signer, &leaf, &[], Duration::from_secs(60), 1)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("crlSign"), "{err}");

        let bad = parse_revocation_list(br#"[{"serialNumber": "1", "revocationDate": "yesterday"}]"#)
            .unwrap();
        let mut ca = self_signed(
            &signer,
            &Uuid::new_v4(),
            Name::default(),
            &SanArgs::default(),
            Duration::from_secs(60),
            Profile::Ca,
        )
        .await
        .unwrap();
        let err = create_crl(&signer, &ca, &bad, Duration::from_secs(60), 1)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Invalid revocation date"), "{err}");

        ca.tbs_certificate.extensions = None;
        let err = create_crl(&signer, &ca, &[], Duration::from_secs(60), 1)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("subject key identifier"), "{err}");
    }
}

//! OpenSSH `authorized_keys` encoding of RSA and NIST EC public keys

use base64::{Engine, engine::general_purpose::STANDARD};
use openssl::{
    bn::BigNumContext,
    ec::PointConversionForm,
    nid::Nid,
    pkey::{Id, PKey, Public},
};

use crate::{cli_bail, error::result::KmsCliResult};

fn put_string(out: &mut Vec<u8>, bytes: &[u8]) -> KmsCliResult<()> {
    out.extend_from_slice(&u32::try_from(bytes.len())?.to_be_bytes());
    out.extend_from_slice(bytes);
    Ok(())
}

/// Positive multiple precision integer: big endian, with a leading zero
/// byte when the high bit is set
fn put_mpint(out: &mut Vec<u8>, magnitude: &[u8]) -> KmsCliResult<()> {
    let trimmed: &[u8] = match magnitude.iter().position(|b| *b != 0) {
        Some(start) => &magnitude[start..],
        None => &[],
    };
    if trimmed.first().is_some_and(|b| b & 0x80 != 0) {
        let mut padded = Vec::with_capacity(trimmed.len() + 1);
        padded.push(0);
        padded.extend_from_slice(trimmed);
        put_string(out, &padded)
    } else {
        put_string(out, trimmed)
    }
}

/// `<type> <base64 blob>` line, without comment
pub(crate) fn authorized_key(key: &PKey<Public>) -> KmsCliResult<String> {
    let mut blob = Vec::new();
    let key_type = match key.id() {
        Id::RSA => {
            let rsa = key.rsa()?;
            put_string(&mut blob, b"ssh-rsa")?;
            put_mpint(&mut blob, &rsa.e().to_vec())?;
            put_mpint(&mut blob, &rsa.n().to_vec())?;
            "ssh-rsa".to_owned()
        }
        Id::EC => {
            let ec = key.ec_key()?;
            let group = ec.group();
            let curve = match group.curve_name() {
                Some(Nid::X9_62_PRIME256V1) => "nistp256",
                Some(Nid::SECP384R1) => "nistp384",
                Some(Nid::SECP521R1) => "nistp521",
                other => cli_bail!("Unsupported curve {other:?} for openssh format"),
            };
            let key_type = format!("ecdsa-sha2-{curve}");
            let point = ec.public_key().to_bytes(
                group,
                PointConversionForm::UNCOMPRESSED,
                &mut *BigNumContext::new()?,
            )?;
            put_string(&mut blob, key_type.as_bytes())?;
            put_string(&mut blob, curve.as_bytes())?;
            put_string(&mut blob, &point)?;
            key_type
        }
        other => cli_bail!("Unsupported key type {other:?} for openssh format"),
    };
    Ok(format!("{key_type} {}", STANDARD.encode(blob)))
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use base64::{Engine, engine::general_purpose::STANDARD};
    use openssl::{
        ec::{EcGroup, EcKey},
        nid::Nid,
        pkey::PKey,
        rsa::Rsa,
    };

    use super::{authorized_key, put_mpint};

    #[test]
    fn test_mpint() {
        let mut out = Vec::new();
        put_mpint(&mut out, &[0x00, 0x80, 0x01]).unwrap();
        assert_eq!(out, [0, 0, 0, 3, 0x00, 0x80, 0x01]);
        out.clear();
        put_mpint(&mut out, &[0x01, 0x00, 0x01]).unwrap();
        assert_eq!(out, [0, 0, 0, 3, 0x01, 0x00, 0x01]);
    }

    #[test]
    fn test_rsa_line() {
        let rsa = Rsa::generate(2048).unwrap();
        let public = PKey::public_key_from_der(&rsa.public_key_to_der().unwrap()).unwrap();
        let line = authorized_key(&public).unwrap();
        let (kind, blob) = line.split_once(' ').unwrap();
        assert_eq!(kind, "ssh-rsa");
        let blob = STANDARD.decode(blob).unwrap();
        assert_eq!(&blob[..11], b"\x00\x00\x00\x07ssh-rsa");
        // e = 65537
        assert_eq!(&blob[11..18], [0, 0, 0, 3, 1, 0, 1]);
    }

    #[test]
    fn test_ec_line() {
        let group = EcGroup::from_curve_name(Nid::SECP384R1).unwrap();
        let ec = EcKey::generate(&group).unwrap();
        let public = PKey::public_key_from_der(&ec.public_key_to_der().unwrap()).unwrap();
        let line = authorized_key(&public).unwrap();
        assert!(line.starts_with("ecdsa-sha2-nistp384 "), "{line}");
        let blob = STANDARD.decode(line.split_once(' ').unwrap().1).unwrap();
        // name, curve, then a 97 byte uncompressed point
        assert_eq!(blob.len(), 4 + 19 + 4 + 8 + 4 + 97);
    }
}

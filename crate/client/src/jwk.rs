//! JSON Web Keys as exchanged with the service key routes

use base64::{
    Engine,
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig, general_purpose::URL_SAFE_NO_PAD},
};
use openssl::{
    bn::{BigNum, BigNumContext, BigNumRef},
    ec::{EcGroup, EcKey},
    nid::Nid,
    pkey::{Id, PKey, Private, Public},
    rsa::Rsa,
};
use serde::{Deserialize, Serialize};

use crate::{
    client_bail,
    error::{KmsClientError, result::KmsClientResult},
};

/// Decodes base64url with or without padding
const B64_URL: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Jwk {
    pub kty: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    #[serde(rename = "use", skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_ops: Option<Vec<String>>,
    // RSA
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub d: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dq: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qi: Option<String>,
    // EC
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crv: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,
    // oct
    #[serde(skip_serializing_if = "Option::is_none")]
    pub k: Option<String>,
}

fn b64(n: &BigNumRef) -> String {
    URL_SAFE_NO_PAD.encode(n.to_vec())
}

fn b64_padded(n: &BigNumRef, len: i32) -> KmsClientResult<String> {
    Ok(URL_SAFE_NO_PAD.encode(n.to_vec_padded(len)?))
}

fn bignum(field: &str, value: Option<&String>) -> KmsClientResult<BigNum> {
    let Some(value) = value else {
        client_bail!("Invalid JWK: missing {field:?}");
    };
    Ok(BigNum::from_slice(&B64_URL.decode(value)?)?)
}

pub(crate) fn curve_nid(crv: &str) -> KmsClientResult<Nid> {
    Ok(match crv {
        "P-256" => Nid::X9_62_PRIME256V1,
        "P-384" => Nid::SECP384R1,
        "P-521" => Nid::SECP521R1,
        other => {
            return Err(KmsClientError::NotSupported(format!("curve {other}")));
        }
    })
}

fn curve_name(nid: Nid) -> KmsClientResult<&'static str> {
    Ok(match nid {
        Nid::X9_62_PRIME256V1 => "P-256",
        Nid::SECP384R1 => "P-384",
        Nid::SECP521R1 => "P-521",
        other => {
            return Err(KmsClientError::NotSupported(format!("curve {other:?}")));
        }
    })
}

impl Jwk {
    /// A symmetric (`oct`) key
    #[must_use]
    pub fn symmetric(key: &[u8]) -> Self {
        Self {
            kty: "oct".to_owned(),
            k: Some(URL_SAFE_NO_PAD.encode(key)),
            ..Self::default()
        }
    }

    /// Full JWK of an RSA or EC private key
    pub fn from_private_key(key: &PKey<Private>) -> KmsClientResult<Self> {
        match key.id() {
            Id::RSA => {
                let rsa = key.rsa()?;
                Ok(Self {
                    kty: "RSA".to_owned(),
                    n: Some(b64(rsa.n())),
                    e: Some(b64(rsa.e())),
                    d: Some(b64(rsa.d())),
                    p: rsa.p().map(b64),
                    q: rsa.q().map(b64),
                    dp: rsa.dmp1().map(b64),
                    dq: rsa.dmq1().map(b64),
                    qi: rsa.iqmp().map(b64),
                    ..Self::default()
                })
            }
            Id::EC => {
                let ec = key.ec_key()?;
                let group = ec.group();
                let nid = group
                    .curve_name()
                    .ok_or_else(|| KmsClientError::NotSupported("unnamed curve".to_owned()))?;
                let size = i32::try_from(group.degree().div_ceil(8))
                    .map_err(|e| KmsClientError::Conversion(e.to_string()))?;
                let mut ctx = BigNumContext::new()?;
                let mut x = BigNum::new()?;
                let mut y = BigNum::new()?;
                ec.public_key()
                    .affine_coordinates_gfp(group, &mut x, &mut y, &mut ctx)?;
                Ok(Self {
                    kty: "EC".to_owned(),
                    crv: Some(curve_name(nid)?.to_owned()),
                    x: Some(b64_padded(&x, size)?),
                    y: Some(b64_padded(&y, size)?),
                    d: Some(b64_padded(ec.private_key(), size)?),
                    ..Self::default()
                })
            }
            other => Err(KmsClientError::NotSupported(format!(
                "key type {other:?}"
            ))),
        }
    }

    /// Public key of an RSA (`n`, `e`) or EC (`crv`, `x`, `y`) JWK
    pub fn public_key(&self) -> KmsClientResult<PKey<Public>> {
        match self.kty.as_str() {
            "RSA" => {
                let rsa = Rsa::from_public_components(
                    bignum("n", self.n.as_ref())?,
                    bignum("e", self.e.as_ref())?,
                )?;
                Ok(PKey::from_rsa(rsa)?)
            }
            "EC" => {
                let Some(crv) = &self.crv else {
                    client_bail!("Invalid JWK: missing \"crv\"");
                };
                let group = EcGroup::from_curve_name(curve_nid(crv)?)?;
                let ec = EcKey::from_public_key_affine_coordinates(
                    &group,
                    &*bignum("x", self.x.as_ref())?,
                    &*bignum("y", self.y.as_ref())?,
                )?;
                Ok(PKey::from_ec_key(ec)?)
            }
            other => Err(KmsClientError::NotSupported(format!(
                "JWK of type {other:?} has no public key"
            ))),
        }
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use openssl::{
        ec::{EcGroup, EcKey},
        nid::Nid,
        pkey::PKey,
        rsa::Rsa,
    };

    use super::Jwk;

    #[test]
    fn test_rsa_public_key() {
        let key = PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap();
        let jwk = Jwk::from_private_key(&key).unwrap();
        assert_eq!(jwk.kty, "RSA");
        assert_eq!(jwk.e.as_deref(), Some("AQAB"));
        let public = jwk.public_key().unwrap();
        assert!(public.public_eq(&key));
    }

    #[test]
    fn test_ec_public_key() {
        let group = EcGroup::from_curve_name(Nid::SECP521R1).unwrap();
        let key = PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap();
        let jwk = Jwk::from_private_key(&key).unwrap();
        assert_eq!(jwk.crv.as_deref(), Some("P-521"));
        // coordinates keep the field size
        assert_eq!(jwk.x.as_ref().unwrap().len(), 88);
        assert!(jwk.public_key().unwrap().public_eq(&key));
    }

    #[test]
    fn test_parse_server_jwk() {
        let jwk: Jwk = serde_json::from_str(
            r#"{"kty":"EC","crv":"P-256","use":"sig",
                "x":"f83OJ3D2xF1Bg8vub9tLe1gHMzV76e8Tus9uPHvRVEU",
                "y":"x_FEzRu9m36HLN_tue659LNpXW6pCyStikYjKIWI5a0"}"#,
        )
        .unwrap();
        assert_eq!(jwk.key_use.as_deref(), Some("sig"));
        jwk.public_key().unwrap();
    }

    #[test]
    fn test_oct_keys_have_no_public_key() {
        let jwk = Jwk::symmetric(&[0; 32]);
        assert_eq!(jwk.k.as_deref().map(str::len), Some(43));
        let err = jwk.public_key().unwrap_err();
        assert!(err.to_string().contains("has no public key"), "{err}");
    }
}

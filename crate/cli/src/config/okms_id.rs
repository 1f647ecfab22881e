use der::{Decode, asn1::ObjectIdentifier, oid::AssociatedOid};
use x509_cert::{
    Certificate,
    ext::pkix::{SubjectAltName, name::GeneralName},
};

/// Microsoft UPN, used to carry the domain id in client certificates
const UPN_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.4.1.311.20.2.3");
const DOMAIN_PREFIX: &str = "okms.domain:";

/// OKMS domain id found in the `otherName` SAN entries of the first
/// certificate of a PEM bundle
#[must_use]
pub fn okms_id_from_certificate(pem_bundle: &[u8]) -> Option<String> {
    let blocks = pem::parse_many(pem_bundle).ok()?;
    let block = blocks.iter().find(|b| b.tag() == "CERTIFICATE")?;
    let certificate = Certificate::from_der(block.contents()).ok()?;
    let extensions = certificate.tbs_certificate.extensions?;
    extensions
        .iter()
        .filter(|ext| ext.extn_id == SubjectAltName::OID)
        .filter_map(|ext| SubjectAltName::from_der(ext.extn_value.as_bytes()).ok())
        .flat_map(|san| san.0)
        .find_map(|name| match name {
            GeneralName::OtherName(other) if other.type_id == UPN_OID => other
                .value
                .decode_as::<String>()
                .ok()?
                .strip_prefix(DOMAIN_PREFIX)
                .map(ToOwned::to_owned),
            _ => None,
        })
}

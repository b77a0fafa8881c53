//! # Distinguished Names
//!
//! Builds X.501 names attribute by attribute instead of parsing RFC 4514
//! strings, so identifier values such as `iPhone0,0` need no escaping.
//! Attributes are emitted in C, ST, L, O, OU, CN order, one per RDN.

use const_oid::db::rfc4519;
use const_oid::ObjectIdentifier;
use der::asn1::{Any, SetOfVec};
use der::Tag;
use x509_cert::attr::AttributeTypeAndValue;
use x509_cert::name::{Name, RdnSequence, RelativeDistinguishedName};

use crate::error::CryptoError;

/// Organization on every certificate the synthesizer issues.
pub const ORGANIZATION: &str = "Apple Inc.";

/// Common name of the self-signed root.
pub const ROOT_CA_COMMON_NAME: &str = "Apple Root CA";

/// Common name of the intermediate that signs device certificates.
pub const DEVICE_CA_COMMON_NAME: &str = "Apple Device CA";

/// Incremental builder for a distinguished name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DistinguishedName {
    country: Option<String>,
    state: Option<String>,
    locality: Option<String>,
    organization: Option<String>,
    organizational_unit: Option<String>,
    common_name: Option<String>,
}

impl DistinguishedName {
    /// Empty name.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `C`.
    pub fn country(mut self, value: impl Into<String>) -> Self {
        self.country = Some(value.into());
        self
    }

    /// Set `ST`.
    pub fn state(mut self, value: impl Into<String>) -> Self {
        self.state = Some(value.into());
        self
    }

    /// Set `L`.
    pub fn locality(mut self, value: impl Into<String>) -> Self {
        self.locality = Some(value.into());
        self
    }

    /// Set `O`.
    pub fn organization(mut self, value: impl Into<String>) -> Self {
        self.organization = Some(value.into());
        self
    }

    /// Set `OU`.
    pub fn organizational_unit(mut self, value: impl Into<String>) -> Self {
        self.organizational_unit = Some(value.into());
        self
    }

    /// Set `CN`.
    pub fn common_name(mut self, value: impl Into<String>) -> Self {
        self.common_name = Some(value.into());
        self
    }

    /// Encode as an X.509 `Name`.
    ///
    /// `C` is a PrintableString, everything else UTF8String.
    pub fn to_name(&self) -> Result<Name, CryptoError> {
        let entries = [
            (rfc4519::C, Tag::PrintableString, &self.country),
            (rfc4519::ST, Tag::Utf8String, &self.state),
            (rfc4519::L, Tag::Utf8String, &self.locality),
            (rfc4519::O, Tag::Utf8String, &self.organization),
            (rfc4519::OU, Tag::Utf8String, &self.organizational_unit),
            (rfc4519::CN, Tag::Utf8String, &self.common_name),
        ];

        let mut rdns = Vec::new();
        for (oid, tag, value) in entries {
            if let Some(value) = value {
                let atv = AttributeTypeAndValue {
                    oid,
                    value: Any::new(tag, value.as_bytes())?,
                };
                let set = SetOfVec::try_from(vec![atv])?;
                rdns.push(RelativeDistinguishedName(set));
            }
        }
        Ok(RdnSequence(rdns))
    }
}

/// First value of attribute `oid` in `name`, as text.
pub fn attribute(name: &Name, oid: ObjectIdentifier) -> Option<String> {
    name.0
        .iter()
        .flat_map(|rdn| rdn.0.iter())
        .find(|atv| atv.oid == oid)
        .and_then(|atv| std::str::from_utf8(atv.value.value()).ok())
        .map(str::to_string)
}

/// Common name of `name`.
pub fn common_name(name: &Name) -> Option<String> {
    attribute(name, rfc4519::CN)
}

/// Subject of the self-signed root.
pub fn root_ca_subject() -> DistinguishedName {
    DistinguishedName::new()
        .country("US")
        .organization(ORGANIZATION)
        .organizational_unit("Apple Certification Authority")
        .common_name(ROOT_CA_COMMON_NAME)
}

/// Subject of the device intermediate.
pub fn device_ca_subject() -> DistinguishedName {
    DistinguishedName::new()
        .country("US")
        .organization(ORGANIZATION)
        .organizational_unit("Apple Certification Authority")
        .common_name(DEVICE_CA_COMMON_NAME)
}

/// Subject of the activation server certificate.
pub fn server_subject(service_host: &str) -> DistinguishedName {
    DistinguishedName::new()
        .country("US")
        .state("California")
        .locality("Cupertino")
        .organization(ORGANIZATION)
        .common_name(service_host)
}

/// Subject of a device certificate.
pub fn device_subject(serial_number: &str, product_type: &str) -> DistinguishedName {
    DistinguishedName::new()
        .organization(ORGANIZATION)
        .organizational_unit(product_type)
        .common_name(serial_number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use der::{Decode, Encode};

    #[test]
    fn device_subject_keeps_commas_verbatim() {
        let name = device_subject("C00000000000", "iPhone0,0").to_name().unwrap();
        assert_eq!(common_name(&name).as_deref(), Some("C00000000000"));
        assert_eq!(attribute(&name, rfc4519::OU).as_deref(), Some("iPhone0,0"));
        assert_eq!(attribute(&name, rfc4519::O).as_deref(), Some(ORGANIZATION));
        assert_eq!(attribute(&name, rfc4519::C), None);
    }

    #[test]
    fn server_subject_has_locality_fields() {
        let name = server_subject("albert.apple.com").to_name().unwrap();
        assert_eq!(attribute(&name, rfc4519::C).as_deref(), Some("US"));
        assert_eq!(attribute(&name, rfc4519::ST).as_deref(), Some("California"));
        assert_eq!(attribute(&name, rfc4519::L).as_deref(), Some("Cupertino"));
        assert_eq!(common_name(&name).as_deref(), Some("albert.apple.com"));
    }

    #[test]
    fn one_attribute_per_rdn_in_fixed_order() {
        let name = server_subject("h").to_name().unwrap();
        let oids: Vec<_> = name.0.iter().map(|rdn| rdn.0.iter().next().unwrap().oid).collect();
        assert_eq!(
            oids,
            vec![rfc4519::C, rfc4519::ST, rfc4519::L, rfc4519::O, rfc4519::CN]
        );
        assert!(name.0.iter().all(|rdn| rdn.0.len() == 1));
    }

    #[test]
    fn names_survive_der() {
        let name = root_ca_subject().to_name().unwrap();
        let der = name.to_der().unwrap();
        let back = Name::from_der(&der).unwrap();
        assert_eq!(back, name);
        assert_eq!(common_name(&back).as_deref(), Some(ROOT_CA_COMMON_NAME));
    }

    #[test]
    fn root_and_device_ca_differ() {
        assert_ne!(
            root_ca_subject().to_name().unwrap(),
            device_ca_subject().to_name().unwrap()
        );
    }
}

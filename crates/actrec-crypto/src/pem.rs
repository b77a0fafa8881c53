//! PEM certificate bundles (`UniqueDeviceCertificate`), leaf first.

use der::pem::LineEnding;
use der::EncodePem;
use x509_cert::Certificate;

use crate::error::CryptoError;

/// Concatenate certificates as LF-terminated PEM blocks.
pub fn encode_pem_bundle<'a>(
    certificates: impl IntoIterator<Item = &'a Certificate>,
) -> Result<String, CryptoError> {
    let mut bundle = String::new();
    for cert in certificates {
        bundle.push_str(&cert.to_pem(LineEnding::LF)?);
    }
    Ok(bundle)
}

/// Parse every certificate in a PEM bundle, preserving order.
pub fn parse_pem_bundle(pem: &[u8]) -> Result<Vec<Certificate>, CryptoError> {
    Ok(Certificate::load_pem_chain(pem)?)
}

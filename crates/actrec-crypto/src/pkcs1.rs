//! # PKCS#1 v1.5 Signatures
//!
//! PKCS#1 v1.5 signing over raw bytes (the account token) and the matching
//! verification used by `verify` tooling and tests, including certificate
//! chain checks. PKCS#1 v1.5 is deterministic: the same key and message
//! always yield the same signature.

use const_oid::db::rfc5912::SHA_256_WITH_RSA_ENCRYPTION;
use der::Encode;
use rsa::pkcs1v15::{Signature, VerifyingKey};
use rsa::pkcs8::DecodePublicKey;
use rsa::RsaPublicKey;
use sha2::Sha256;
use signature::{SignatureEncoding, Signer, Verifier};
use x509_cert::Certificate;

use crate::certificate::CertifiedKey;
use crate::error::CryptoError;

/// Sign `message` with the private key of `signer`.
pub fn sign_pkcs1_sha256(signer: &CertifiedKey, message: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let signature: Signature = signer
        .key()
        .signer()
        .try_sign(message)
        .map_err(|e| CryptoError::Signing(e.to_string()))?;
    Ok(signature.to_vec())
}

/// Verify a PKCS#1 v1.5 / SHA-256 signature.
pub fn verify_pkcs1_sha256(
    public_key: &RsaPublicKey,
    message: &[u8],
    signature: &[u8],
) -> Result<(), CryptoError> {
    let signature = Signature::try_from(signature)
        .map_err(|e| CryptoError::VerificationFailed(format!("malformed signature: {e}")))?;
    VerifyingKey::<Sha256>::new(public_key.clone())
        .verify(message, &signature)
        .map_err(|_| CryptoError::VerificationFailed("signature does not match".into()))
}

/// The RSA public key a certificate binds.
pub fn public_key_from_certificate(cert: &Certificate) -> Result<RsaPublicKey, CryptoError> {
    let spki = cert.tbs_certificate.subject_public_key_info.to_der()?;
    RsaPublicKey::from_public_key_der(&spki)
        .map_err(|e| CryptoError::Encoding(format!("certificate public key: {e}")))
}

/// Check that `issuer` signed `child`: names link and the signature over
/// the TBS certificate verifies with the issuer's key.
pub fn verify_issued_by(child: &Certificate, issuer: &Certificate) -> Result<(), CryptoError> {
    if child.tbs_certificate.issuer != issuer.tbs_certificate.subject {
        return Err(CryptoError::VerificationFailed(format!(
            "issuer name mismatch: expected {}, found {}",
            issuer.tbs_certificate.subject, child.tbs_certificate.issuer
        )));
    }
    if child.signature_algorithm.oid != SHA_256_WITH_RSA_ENCRYPTION {
        return Err(CryptoError::VerificationFailed(format!(
            "unsupported signature algorithm {}",
            child.signature_algorithm.oid
        )));
    }
    let tbs = child.tbs_certificate.to_der()?;
    let signature = child.signature.as_bytes().ok_or_else(|| {
        CryptoError::VerificationFailed("signature has unused bits".into())
    })?;
    verify_pkcs1_sha256(&public_key_from_certificate(issuer)?, &tbs, signature)
}

/// Verify a chain ordered leaf first, ending in a self-signed root.
pub fn verify_chain(chain: &[Certificate]) -> Result<(), CryptoError> {
    let root = chain
        .last()
        .ok_or_else(|| CryptoError::VerificationFailed("empty certificate chain".into()))?;
    for pair in chain.windows(2) {
        verify_issued_by(&pair[0], &pair[1])?;
    }
    verify_issued_by(root, root)
}

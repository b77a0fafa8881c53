//! # CMS Signed-Data Envelope
//!
//! The activation ticket is a DER `ContentInfo` wrapping CMS `SignedData`
//! (RFC 5652): the canonical ticket bytes as `id-data` encapsulated content,
//! one signer identified by issuer and serial number, SHA-256 digest,
//! sha256WithRSAEncryption over the signed attributes, and the signer's
//! certificate embedded.
//!
//! Signing is deterministic for a given key, certificate and content.

use actrec_core::CanonicalBytes;
use cms::builder::{SignedDataBuilder, SignerInfoBuilder};
use cms::cert::{CertificateChoices, IssuerAndSerialNumber};
use cms::content_info::ContentInfo;
use cms::signed_data::{EncapsulatedContentInfo, SignedData, SignerIdentifier, SignerInfo};
use const_oid::db::rfc5911::{ID_DATA, ID_SIGNED_DATA};
use const_oid::db::rfc5912::ID_SHA_256;
use const_oid::ObjectIdentifier;
use der::asn1::OctetString;
use der::{Any, Decode, Encode, Tag};
use rsa::pkcs1v15::{Signature, SigningKey};
use sha2::{Digest, Sha256};
use spki::AlgorithmIdentifierOwned;
use x509_cert::Certificate;

use crate::certificate::CertifiedKey;
use crate::error::CryptoError;
use crate::pkcs1::{public_key_from_certificate, verify_pkcs1_sha256};

/// `id-messageDigest` signed attribute (RFC 5652 §11.2).
const MESSAGE_DIGEST: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.4");

/// Sign `content` into a DER-encoded CMS `ContentInfo`.
pub fn sign_envelope(content: &CanonicalBytes, signer: &CertifiedKey) -> Result<Vec<u8>, CryptoError> {
    let signing = |e: &dyn std::fmt::Debug| CryptoError::Signing(format!("CMS: {e:?}"));

    let econtent = EncapsulatedContentInfo {
        econtent_type: ID_DATA,
        econtent: Some(Any::new(Tag::OctetString, content.as_bytes())?),
    };
    let digest_algorithm = AlgorithmIdentifierOwned {
        oid: ID_SHA_256,
        parameters: None,
    };
    let certificate = signer.certificate();
    let sid = SignerIdentifier::IssuerAndSerialNumber(IssuerAndSerialNumber {
        issuer: certificate.tbs_certificate.issuer.clone(),
        serial_number: certificate.tbs_certificate.serial_number.clone(),
    });

    let signing_key = signer.key().signer();
    let signer_info = SignerInfoBuilder::new(
        &signing_key,
        sid,
        digest_algorithm.clone(),
        &econtent,
        None,
    )
    .map_err(|e| signing(&e))?;

    let mut builder = SignedDataBuilder::new(&econtent);
    builder
        .add_digest_algorithm(digest_algorithm)
        .map_err(|e| signing(&e))?
        .add_certificate(CertificateChoices::Certificate(certificate.clone()))
        .map_err(|e| signing(&e))?
        .add_signer_info::<SigningKey<Sha256>, Signature>(signer_info)
        .map_err(|e| signing(&e))?;
    let content_info = builder.build().map_err(|e| signing(&e))?;

    Ok(content_info.to_der()?)
}

/// The parts of a decoded envelope.
#[derive(Debug, Clone)]
pub struct OpenedEnvelope {
    /// Encapsulated content bytes.
    pub content: Vec<u8>,
    /// Certificate of the single signer.
    pub signer_certificate: Certificate,
    signer_info: SignerInfo,
}

/// Decode an envelope without checking its signature.
pub fn open_envelope(der: &[u8]) -> Result<OpenedEnvelope, CryptoError> {
    let content_info = ContentInfo::from_der(der)?;
    if content_info.content_type != ID_SIGNED_DATA {
        return Err(CryptoError::VerificationFailed(format!(
            "content type {} is not signed-data",
            content_info.content_type
        )));
    }
    let signed_data: SignedData = content_info.content.decode_as()?;

    let content = match &signed_data.encap_content_info.econtent {
        Some(econtent) => econtent.decode_as::<OctetString>()?.into_bytes(),
        None => {
            return Err(CryptoError::VerificationFailed(
                "envelope has no encapsulated content".into(),
            ))
        }
    };

    let mut signer_infos = signed_data.signer_infos.0.iter();
    let signer_info = match (signer_infos.next(), signer_infos.next()) {
        (Some(info), None) => info.clone(),
        _ => {
            return Err(CryptoError::VerificationFailed(
                "envelope must have exactly one signer".into(),
            ))
        }
    };

    let SignerIdentifier::IssuerAndSerialNumber(sid) = &signer_info.sid else {
        return Err(CryptoError::VerificationFailed(
            "signer is not identified by issuer and serial number".into(),
        ));
    };
    let signer_certificate = signed_data
        .certificates
        .iter()
        .flat_map(|set| set.0.iter())
        .find_map(|choice| match choice {
            CertificateChoices::Certificate(cert)
                if cert.tbs_certificate.issuer == sid.issuer
                    && cert.tbs_certificate.serial_number == sid.serial_number =>
            {
                Some(cert.clone())
            }
            _ => None,
        })
        .ok_or_else(|| {
            CryptoError::VerificationFailed("signer certificate not embedded".into())
        })?;

    Ok(OpenedEnvelope {
        content,
        signer_certificate,
        signer_info,
    })
}

/// Decode an envelope and verify its signer's signature and message digest.
pub fn verify_envelope(der: &[u8]) -> Result<OpenedEnvelope, CryptoError> {
    let opened = open_envelope(der)?;
    let signed_attrs = opened.signer_info.signed_attrs.as_ref().ok_or_else(|| {
        CryptoError::VerificationFailed("signer has no signed attributes".into())
    })?;

    let digest = signed_attrs
        .iter()
        .find(|attr| attr.oid == MESSAGE_DIGEST)
        .and_then(|attr| attr.values.iter().next())
        .ok_or_else(|| CryptoError::VerificationFailed("message digest missing".into()))?
        .decode_as::<OctetString>()?;
    if digest.as_bytes() != Sha256::digest(&opened.content).as_slice() {
        return Err(CryptoError::VerificationFailed(
            "message digest does not match content".into(),
        ));
    }

    let public_key = public_key_from_certificate(&opened.signer_certificate)?;
    verify_pkcs1_sha256(
        &public_key,
        &signed_attrs.to_der()?,
        opened.signer_info.signature.as_bytes(),
    )?;
    Ok(opened)
}

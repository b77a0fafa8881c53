//! # Certificate Construction
//!
//! Shared plumbing for the trust chain builder and the issuer: validity
//! windows from session time, the signed `CertificateBuilder` call, and the
//! [`CertifiedKey`] pairing of a key with the certificate binding it.

use std::time::Duration;

use actrec_core::Timestamp;
use chrono::Datelike;
use der::asn1::{GeneralizedTime, UtcTime};
use der::{Decode, Encode};
use rsa::pkcs1v15::Signature;
use x509_cert::builder::{Builder, CertificateBuilder, Profile};
use x509_cert::ext::pkix::ExtendedKeyUsage;
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;
use x509_cert::time::{Time, Validity};
use x509_cert::Certificate;

use crate::error::CryptoError;
use crate::keys::RsaKeyPair;

/// First year UTCTime cannot represent (RFC 5280 §4.1.2.5).
const UTC_TIME_LIMIT_YEAR: i32 = 2050;

/// A key pair and the certificate that binds its public half.
#[derive(Debug)]
pub struct CertifiedKey {
    key: RsaKeyPair,
    certificate: Certificate,
}

impl CertifiedKey {
    pub(crate) fn new(key: RsaKeyPair, certificate: Certificate) -> Self {
        Self { key, certificate }
    }

    /// The certificate.
    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    /// Subject name of the certificate.
    pub fn subject(&self) -> &Name {
        &self.certificate.tbs_certificate.subject
    }

    /// The private key.
    pub(crate) fn key(&self) -> &RsaKeyPair {
        &self.key
    }

    /// DER encoding of the certificate.
    pub fn certificate_der(&self) -> Result<Vec<u8>, CryptoError> {
        Ok(self.certificate.to_der()?)
    }
}

/// Validity window `[not_before, not_before + days]`.
pub fn validity(not_before: Timestamp, days: i64) -> Result<Validity, CryptoError> {
    Ok(Validity {
        not_before: x509_time(not_before)?,
        not_after: x509_time(not_before.plus_days(days))?,
    })
}

/// UTCTime before 2050, GeneralizedTime from 2050 on.
fn x509_time(ts: Timestamp) -> Result<Time, CryptoError> {
    let secs = u64::try_from(ts.epoch_secs()).map_err(|_| {
        CryptoError::CertificateIssuance(format!("time {ts} precedes the Unix epoch"))
    })?;
    let since_epoch = Duration::from_secs(secs);
    if ts.as_datetime().year() < UTC_TIME_LIMIT_YEAR {
        Ok(Time::UtcTime(UtcTime::from_unix_duration(since_epoch)?))
    } else {
        Ok(Time::GeneralTime(GeneralizedTime::from_unix_duration(since_epoch)?))
    }
}

/// Everything that distinguishes one certificate from another.
pub(crate) struct CertificateRequest<'a> {
    pub profile: Profile,
    pub serial_number: SerialNumber,
    pub validity: Validity,
    pub subject: Name,
    pub subject_key: &'a RsaKeyPair,
}

/// Build and sign a certificate with `issuer_key`.
///
/// `extended_key_usage` is added after the profile's own extensions.
pub(crate) fn sign_certificate(
    request: CertificateRequest<'_>,
    issuer_key: &RsaKeyPair,
    extended_key_usage: Option<ExtendedKeyUsage>,
) -> Result<Certificate, CryptoError> {
    let issuance = |e: &dyn std::fmt::Display| CryptoError::CertificateIssuance(e.to_string());

    let spki = request.subject_key.subject_public_key_info()?;
    let signer = issuer_key.signer();
    let mut builder = CertificateBuilder::new(
        request.profile,
        request.serial_number,
        request.validity,
        request.subject,
        spki,
        &signer,
    )
    .map_err(|e| issuance(&e))?;

    if let Some(eku) = extended_key_usage {
        builder.add_extension(&eku).map_err(|e| issuance(&e))?;
    }

    let certificate = builder
        .build::<Signature>()
        .map_err(|e| CryptoError::Signing(e.to_string()))?;

    // Keep the decoded form a record consumer will see.
    let der = certificate.to_der()?;
    Ok(Certificate::from_der(&der)?)
}

/// Decode a DER certificate.
pub fn decode_certificate(der: &[u8]) -> Result<Certificate, CryptoError> {
    Ok(Certificate::from_der(der)?)
}

/// Printable facts about a certificate, for inspection output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateSummary {
    /// RFC 4514 subject.
    pub subject: String,
    /// RFC 4514 issuer.
    pub issuer: String,
    /// Serial number as lowercase hex.
    pub serial: String,
    /// Start of validity, ISO 8601.
    pub not_before: String,
    /// End of validity, ISO 8601.
    pub not_after: String,
}

impl CertificateSummary {
    pub fn of(cert: &Certificate) -> Self {
        let tbs = &cert.tbs_certificate;
        let time = |t: &Time| {
            i64::try_from(t.to_unix_duration().as_secs())
                .ok()
                .and_then(|secs| Timestamp::from_epoch_secs(secs).ok())
                .map_or_else(|| t.to_string(), |ts| ts.to_iso8601())
        };
        Self {
            subject: tbs.subject.to_string(),
            issuer: tbs.issuer.to_string(),
            serial: tbs
                .serial_number
                .as_bytes()
                .iter()
                .map(|b| format!("{b:02x}"))
                .collect(),
            not_before: time(&tbs.validity.not_before),
            not_after: time(&tbs.validity.not_after),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validity_spans_requested_days() {
        let start = Timestamp::parse("2026-01-15T12:00:00Z").unwrap();
        let v = validity(start, 365).unwrap();
        assert_eq!(
            v.not_before.to_unix_duration().as_secs() as i64,
            start.epoch_secs()
        );
        assert_eq!(
            v.not_after.to_unix_duration().as_secs() as i64,
            start.plus_days(365).epoch_secs()
        );
    }

    #[test]
    fn utc_time_before_2050() {
        let start = Timestamp::parse("2026-01-15T12:00:00Z").unwrap();
        let v = validity(start, 3650).unwrap();
        assert!(matches!(v.not_before, Time::UtcTime(_)));
        assert!(matches!(v.not_after, Time::UtcTime(_)));
    }

    #[test]
    fn generalized_time_from_2050() {
        let start = Timestamp::parse("2045-01-15T12:00:00Z").unwrap();
        let v = validity(start, 3650).unwrap();
        assert!(matches!(v.not_before, Time::UtcTime(_)));
        assert!(matches!(v.not_after, Time::GeneralTime(_)));
    }

    #[test]
    fn garbage_does_not_decode() {
        assert!(matches!(
            decode_certificate(b"not der"),
            Err(CryptoError::Encoding(_))
        ));
    }

    #[test]
    fn pre_epoch_rejected() {
        let start = Timestamp::from_epoch_secs(-86_400).unwrap();
        assert!(matches!(
            validity(start, 1),
            Err(CryptoError::CertificateIssuance(_))
        ));
    }
}

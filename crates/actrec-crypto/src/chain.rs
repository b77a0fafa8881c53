//! # Trust Chain Builder
//!
//! Generates the session's Root CA and Device CA. The root is self-signed;
//! the Device CA is signed by the root key and may only sign end-entity
//! certificates (`pathLenConstraint = 0`). The two steps run strictly in
//! order because the Device CA certificate needs the root key.

use actrec_core::{Timestamp, ValidityDays};
use rand_core::CryptoRngCore;
use x509_cert::builder::Profile;

use crate::certificate::{sign_certificate, validity, CertificateRequest, CertifiedKey};
use crate::error::CryptoError;
use crate::keys::RsaKeyPair;
use crate::name::{device_ca_subject, root_ca_subject};
use crate::serial::SerialAllocator;

/// Root CA and Device CA owned by one session.
#[derive(Debug)]
pub struct TrustChain {
    root: CertifiedKey,
    device_ca: CertifiedKey,
}

impl TrustChain {
    /// Generate both CA keys and certificates.
    pub fn build(
        rng: &mut impl CryptoRngCore,
        key_bits: usize,
        serials: &mut SerialAllocator,
        issued_at: Timestamp,
        days: &ValidityDays,
    ) -> Result<Self, CryptoError> {
        let root_key = RsaKeyPair::generate(&mut *rng, key_bits)?;
        let root_cert = sign_certificate(
            CertificateRequest {
                profile: Profile::Root,
                serial_number: serials.next_serial()?,
                validity: validity(issued_at, days.root_ca)?,
                subject: root_ca_subject().to_name()?,
                subject_key: &root_key,
            },
            &root_key,
            None,
        )?;
        let root = CertifiedKey::new(root_key, root_cert);
        tracing::debug!("root CA certificate issued");

        let device_ca_key = RsaKeyPair::generate(&mut *rng, key_bits)?;
        let device_ca_cert = sign_certificate(
            CertificateRequest {
                profile: Profile::SubCA {
                    issuer: root.subject().clone(),
                    path_len_constraint: Some(0),
                },
                serial_number: serials.next_serial()?,
                validity: validity(issued_at, days.device_ca)?,
                subject: device_ca_subject().to_name()?,
                subject_key: &device_ca_key,
            },
            root.key(),
            None,
        )?;
        let device_ca = CertifiedKey::new(device_ca_key, device_ca_cert);
        tracing::debug!("device CA certificate issued");

        Ok(Self { root, device_ca })
    }

    /// The self-signed root.
    pub fn root(&self) -> &CertifiedKey {
        &self.root
    }

    /// The intermediate that signs device certificates.
    pub fn device_ca(&self) -> &CertifiedKey {
        &self.device_ca
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::session_rng;
    use crate::name::{common_name, DEVICE_CA_COMMON_NAME, ROOT_CA_COMMON_NAME};
    use crate::pkcs1::verify_issued_by;
    use crate::serial::serial_value;
    use x509_cert::ext::pkix::BasicConstraints;

    fn chain(seed: u8) -> TrustChain {
        let issued_at = Timestamp::parse("2026-01-15T12:00:00Z").unwrap();
        let mut serials = SerialAllocator::seeded_from(issued_at);
        TrustChain::build(
            &mut session_rng(Some([seed; 32])),
            1024,
            &mut serials,
            issued_at,
            &ValidityDays::default(),
        )
        .unwrap()
    }

    fn basic_constraints(ck: &CertifiedKey) -> BasicConstraints {
        let (_, bc) = ck
            .certificate()
            .tbs_certificate
            .get::<BasicConstraints>()
            .unwrap()
            .expect("basicConstraints present");
        bc
    }

    #[test]
    fn root_is_self_signed() {
        let chain = chain(1);
        let root = chain.root().certificate();
        assert_eq!(root.tbs_certificate.issuer, root.tbs_certificate.subject);
        assert_eq!(
            common_name(&root.tbs_certificate.subject).as_deref(),
            Some(ROOT_CA_COMMON_NAME)
        );
        verify_issued_by(root, root).unwrap();
    }

    #[test]
    fn device_ca_is_signed_by_root() {
        let chain = chain(2);
        let root = chain.root().certificate();
        let device_ca = chain.device_ca().certificate();
        assert_eq!(device_ca.tbs_certificate.issuer, root.tbs_certificate.subject);
        assert_eq!(
            common_name(&device_ca.tbs_certificate.subject).as_deref(),
            Some(DEVICE_CA_COMMON_NAME)
        );
        verify_issued_by(device_ca, root).unwrap();
    }

    #[test]
    fn both_are_certificate_authorities() {
        let chain = chain(3);
        assert!(basic_constraints(chain.root()).ca);
        let device_ca = basic_constraints(chain.device_ca());
        assert!(device_ca.ca);
        assert_eq!(device_ca.path_len_constraint, Some(0));
    }

    #[test]
    fn serials_increase_along_the_chain() {
        let chain = chain(4);
        let root = serial_value(&chain.root().certificate().tbs_certificate.serial_number);
        let device_ca =
            serial_value(&chain.device_ca().certificate().tbs_certificate.serial_number);
        assert_eq!(device_ca, root.map(|v| v + 1));
    }

    #[test]
    fn seeded_chains_are_identical() {
        let a = chain(5);
        let b = chain(5);
        assert_eq!(
            a.device_ca().certificate_der().unwrap(),
            b.device_ca().certificate_der().unwrap()
        );
    }

    #[test]
    fn summary_names_subject_and_window() {
        let chain = chain(6);
        let summary = crate::certificate::CertificateSummary::of(chain.device_ca().certificate());
        assert!(summary.subject.contains(DEVICE_CA_COMMON_NAME));
        assert!(summary.issuer.contains(ROOT_CA_COMMON_NAME));
        assert_eq!(summary.not_before, "2026-01-15T12:00:00Z");
        assert!(!summary.serial.is_empty());
    }
}

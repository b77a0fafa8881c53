//! # Certificate Issuer
//!
//! End-entity certificates for one session: the activation server
//! certificate, signed by the Root CA, and the device certificate, signed by
//! the Device CA. Every failure surfaces as
//! [`CryptoError::CertificateIssuance`], except key generation which keeps
//! its own variant.

use actrec_core::{Timestamp, ValidityDays};
use const_oid::db::rfc5280::ID_KP_SERVER_AUTH;
use rand_core::CryptoRngCore;
use x509_cert::builder::Profile;
use x509_cert::ext::pkix::ExtendedKeyUsage;

use crate::certificate::{sign_certificate, validity, CertificateRequest, CertifiedKey};
use crate::chain::TrustChain;
use crate::error::CryptoError;
use crate::keys::RsaKeyPair;
use crate::name::{device_subject, server_subject};
use crate::serial::SerialAllocator;

/// Issues leaf certificates under a session's [`TrustChain`].
pub struct Issuer<'a, R> {
    chain: &'a TrustChain,
    rng: &'a mut R,
    serials: &'a mut SerialAllocator,
    key_bits: usize,
    issued_at: Timestamp,
    days: &'a ValidityDays,
}

impl<'a, R: CryptoRngCore> Issuer<'a, R> {
    pub fn new(
        chain: &'a TrustChain,
        rng: &'a mut R,
        serials: &'a mut SerialAllocator,
        key_bits: usize,
        issued_at: Timestamp,
        days: &'a ValidityDays,
    ) -> Self {
        Self {
            chain,
            rng,
            serials,
            key_bits,
            issued_at,
            days,
        }
    }

    /// Server certificate for `service_host`, signed by the Root CA.
    pub fn issue_server(&mut self, service_host: &str) -> Result<CertifiedKey, CryptoError> {
        let key = RsaKeyPair::generate(&mut *self.rng, self.key_bits)?;
        let issuer = self.chain.root();
        let certificate = sign_certificate(
            CertificateRequest {
                profile: Profile::Leaf {
                    issuer: issuer.subject().clone(),
                    enable_key_agreement: false,
                    enable_key_encipherment: true,
                },
                serial_number: self.serials.next_serial()?,
                validity: validity(self.issued_at, self.days.server)?,
                subject: server_subject(service_host).to_name()?,
                subject_key: &key,
            },
            issuer.key(),
            Some(ExtendedKeyUsage(vec![ID_KP_SERVER_AUTH])),
        )
        .map_err(as_issuance)?;
        tracing::debug!(host = service_host, "server certificate issued");
        Ok(CertifiedKey::new(key, certificate))
    }

    /// Device certificate naming `serial_number`, signed by the Device CA.
    pub fn issue_device(
        &mut self,
        serial_number: &str,
        product_type: &str,
    ) -> Result<CertifiedKey, CryptoError> {
        let key = RsaKeyPair::generate(&mut *self.rng, self.key_bits)?;
        let issuer = self.chain.device_ca();
        let certificate = sign_certificate(
            CertificateRequest {
                profile: Profile::Leaf {
                    issuer: issuer.subject().clone(),
                    enable_key_agreement: false,
                    enable_key_encipherment: true,
                },
                serial_number: self.serials.next_serial()?,
                validity: validity(self.issued_at, self.days.device)?,
                subject: device_subject(serial_number, product_type).to_name()?,
                subject_key: &key,
            },
            issuer.key(),
            None,
        )
        .map_err(as_issuance)?;
        tracing::debug!(product_type, "device certificate issued");
        Ok(CertifiedKey::new(key, certificate))
    }
}

fn as_issuance(err: CryptoError) -> CryptoError {
    match err {
        CryptoError::CertificateIssuance(_) | CryptoError::KeyGeneration(_) => err,
        other => CryptoError::CertificateIssuance(other.to_string()),
    }
}

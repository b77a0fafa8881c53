//! # Certificate Serial Numbers
//!
//! One allocator per session. Serials are seeded from the session's
//! issuance time (epoch milliseconds) and strictly increase by one per
//! certificate, so the four certificates of a session never collide.

use actrec_core::Timestamp;
use x509_cert::serial_number::SerialNumber;

use crate::error::CryptoError;

/// Strictly increasing serial-number source for a single session.
#[derive(Debug)]
pub struct SerialAllocator {
    next: u64,
}

impl SerialAllocator {
    /// Seed from the session's issuance time.
    pub fn seeded_from(issued_at: Timestamp) -> Self {
        let millis = u64::try_from(issued_at.epoch_secs())
            .unwrap_or(0)
            .saturating_mul(1000);
        Self::starting_at(millis.max(1))
    }

    /// Start counting from `first`.
    pub fn starting_at(first: u64) -> Self {
        Self { next: first }
    }

    /// The next serial value.
    pub fn next_value(&mut self) -> u64 {
        let value = self.next;
        self.next = self.next.saturating_add(1);
        value
    }

    /// The next serial as an X.509 `SerialNumber`.
    pub fn next_serial(&mut self) -> Result<SerialNumber, CryptoError> {
        let value = self.next_value();
        SerialNumber::new(&positive_der_integer(value))
            .map_err(|e| CryptoError::CertificateIssuance(format!("serial number: {e}")))
    }
}

/// Minimal two's-complement encoding of a non-negative integer.
fn positive_der_integer(value: u64) -> Vec<u8> {
    let mut bytes: Vec<u8> = value
        .to_be_bytes()
        .into_iter()
        .skip_while(|b| *b == 0)
        .collect();
    if bytes.first().map_or(true, |b| b & 0x80 != 0) {
        bytes.insert(0, 0);
    }
    bytes
}

/// Serial number of a certificate as an unsigned integer, when it fits.
pub fn serial_value(serial: &SerialNumber) -> Option<u64> {
    let bytes = serial.as_bytes();
    let trimmed: Vec<u8> = bytes.iter().copied().skip_while(|b| *b == 0).collect();
    if trimmed.len() > 8 {
        return None;
    }
    let mut buf = [0u8; 8];
    buf[8 - trimmed.len()..].copy_from_slice(&trimmed);
    Some(u64::from_be_bytes(buf))
}

//! # Ephemeral RSA Key Custody
//!
//! Every session generates its own Root CA, Device CA, server and device
//! keys. Nothing here persists a key or exposes its bytes.
//!
//! ## Security Invariant
//!
//! - `RsaKeyPair` does not implement `Serialize`, `Clone`, or a revealing
//!   `Debug`.
//! - The private key is zeroized when the pair is dropped (`rsa` zeroizes
//!   `RsaPrivateKey` on drop). Transient `SigningKey` copies made for a
//!   single signature are dropped, and therefore zeroized, before the
//!   signing call returns.
//! - Raw signing is crate-private. Outside this crate a key can only be
//!   used through certificate issuance, envelope signing and
//!   [`crate::pkcs1::sign_pkcs1_sha256`].

use der::Decode;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_core::CryptoRngCore;
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::EncodePublicKey;
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use spki::SubjectPublicKeyInfoOwned;

use crate::error::CryptoError;

/// The RNG a session draws key material from.
///
/// Seeded sessions are reproducible. Unseeded sessions seed from the OS.
pub fn session_rng(seed: Option<[u8; 32]>) -> StdRng {
    match seed {
        Some(seed) => StdRng::from_seed(seed),
        None => StdRng::from_entropy(),
    }
}

/// An RSA key pair held in memory for one session.
pub struct RsaKeyPair {
    private: RsaPrivateKey,
    bits: usize,
}

impl RsaKeyPair {
    /// Generate a new key of `bits` modulus size.
    pub fn generate(rng: &mut impl CryptoRngCore, bits: usize) -> Result<Self, CryptoError> {
        let private =
            RsaPrivateKey::new(rng, bits).map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;
        Ok(Self { private, bits })
    }

    /// Modulus size in bits.
    pub fn bits(&self) -> usize {
        self.bits
    }

    /// The public half.
    pub fn public_key(&self) -> RsaPublicKey {
        self.private.to_public_key()
    }

    /// SubjectPublicKeyInfo for embedding in a certificate.
    pub fn subject_public_key_info(&self) -> Result<SubjectPublicKeyInfoOwned, CryptoError> {
        let der = self
            .public_key()
            .to_public_key_der()
            .map_err(|e| CryptoError::Encoding(e.to_string()))?;
        Ok(SubjectPublicKeyInfoOwned::from_der(der.as_bytes())?)
    }

    /// A PKCS#1 v1.5 / SHA-256 signer over this key.
    ///
    /// The returned signer owns a copy of the private key and zeroizes it
    /// on drop; callers keep it scoped to one operation.
    pub(crate) fn signer(&self) -> SigningKey<Sha256> {
        SigningKey::<Sha256>::new(self.private.clone())
    }
}

impl std::fmt::Debug for RsaKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RsaKeyPair({} bits, <private>)", self.bits)
    }
}

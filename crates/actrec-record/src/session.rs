//! # Synthesis Session
//!
//! One session turns one request into one activation record. It owns its
//! issuance time (read once from the injected [`Clock`]), its RNG and its
//! serial allocator. Nothing is shared with other sessions except the
//! read-only [`SynthesisConfig`].
//!
//! ## Stages
//!
//! ```text
//! Decoding ─▶ ChainBuilding ─▶ CertIssuing ─▶ TicketSigning ─▶ TokenSigning ─▶ Assembling ─▶ Done
//!    │              │               │               │                │              │
//!    └──────────────┴───────────────┴───── Failed { stage, reason } ─┴──────────────┘
//! ```
//!
//! Stages run strictly in order; there are no retries. A failed session is
//! terminal and the caller starts a new one. Key material lives inside the
//! session and is dropped (and zeroized) on every exit path.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use actrec_core::{ActivationError, Clock, DeviceAttributes, SynthesisConfig, Timestamp};
use actrec_crypto::{
    encode_pem_bundle, session_rng, CertifiedKey, Certificate, Issuer, SerialAllocator,
    TrustChain,
};
use rand::rngs::StdRng;

use crate::record::ActivationRecord;
use crate::request::decode_attributes;
use crate::ticket::SignedTicket;
use crate::token::{AccountTokenPayload, SignedToken};

// ─── Stages ──────────────────────────────────────────────────────────

/// A step of the synthesis pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    /// Request decoding and identifier resolution.
    Decoding,
    /// Root CA and Device CA generation.
    ChainBuilding,
    /// Server and device certificate issuance.
    CertIssuing,
    /// CMS ticket signing.
    TicketSigning,
    /// Account token rendering and signing.
    TokenSigning,
    /// Record serialization.
    Assembling,
}

impl Stage {
    /// Every stage in execution order.
    pub const ALL: [Stage; 6] = [
        Stage::Decoding,
        Stage::ChainBuilding,
        Stage::CertIssuing,
        Stage::TicketSigning,
        Stage::TokenSigning,
        Stage::Assembling,
    ];

    /// Stage name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Decoding => "Decoding",
            Self::ChainBuilding => "ChainBuilding",
            Self::CertIssuing => "CertIssuing",
            Self::TicketSigning => "TicketSigning",
            Self::TokenSigning => "TokenSigning",
            Self::Assembling => "Assembling",
        }
    }

}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// Created, nothing run yet.
    Pending,
    /// Executing `Stage`.
    Running(Stage),
    /// Record produced.
    Done,
    /// Aborted in `stage`.
    Failed {
        /// Stage that failed.
        stage: Stage,
        /// Error text.
        reason: String,
    },
}

impl SessionState {
    /// Whether no further stage can run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed { .. })
    }
}

// ─── Errors ──────────────────────────────────────────────────────────

/// A session failure, tagged with the stage that failed.
#[derive(Error, Debug)]
#[error("activation session failed during {stage}: {source}")]
pub struct SessionError {
    /// Stage that failed.
    pub stage: Stage,
    /// Underlying error.
    #[source]
    pub source: ActivationError,
}

impl SessionError {
    /// Whether retrying with corrected input can succeed.
    pub fn is_recoverable(&self) -> bool {
        self.source.is_recoverable()
    }
}

// ─── Artifacts ───────────────────────────────────────────────────────

/// Everything a successful session produced, minus private keys.
#[derive(Debug, Clone)]
pub struct SessionArtifacts {
    /// Resolved device attributes.
    pub attributes: DeviceAttributes,
    /// Issuance time shared by every certificate and the ticket.
    pub issued_at: Timestamp,
    /// Self-signed Root CA certificate.
    pub root_certificate: Certificate,
    /// Device CA certificate.
    pub device_ca_certificate: Certificate,
    /// Activation server certificate.
    pub server_certificate: Certificate,
    /// Device certificate.
    pub device_certificate: Certificate,
    /// CMS ticket.
    pub ticket: SignedTicket,
    /// Token fields.
    pub token: AccountTokenPayload,
    /// Rendered token and its signature.
    pub signed_token: SignedToken,
    /// The assembled record.
    pub record: ActivationRecord,
    /// XML serialization of `record`.
    pub document: Vec<u8>,
    /// Stages completed, in order.
    pub stages: Vec<Stage>,
}

// ─── The Session ─────────────────────────────────────────────────────

/// Input a session starts from.
#[derive(Debug, Clone, Copy)]
pub enum SessionInput<'a> {
    /// Raw request property-list bytes.
    Request(&'a [u8]),
    /// Already-resolved attributes.
    Attributes(&'a DeviceAttributes),
}

/// A single synthesis run.
pub struct Session<'c> {
    config: &'c SynthesisConfig,
    issued_at: Timestamp,
    rng: StdRng,
    serials: SerialAllocator,
    state: SessionState,
    stages: Vec<Stage>,
}

impl<'c> Session<'c> {
    /// Create a session, reading the issuance time from `clock` once.
    pub fn new(config: &'c SynthesisConfig, clock: &dyn Clock) -> Self {
        let issued_at = clock.now();
        Self {
            config,
            issued_at,
            rng: session_rng(config.rng_seed),
            serials: SerialAllocator::seeded_from(issued_at),
            state: SessionState::Pending,
            stages: Vec::new(),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Issuance time of this session.
    pub fn issued_at(&self) -> Timestamp {
        self.issued_at
    }

    /// Run every stage. The session ends in `Done` or `Failed`.
    pub fn run(&mut self, input: SessionInput<'_>) -> Result<SessionArtifacts, SessionError> {
        if self.state != SessionState::Pending {
            return Err(SessionError {
                stage: Stage::Decoding,
                source: ActivationError::Decode("session has already run".into()),
            });
        }
        let config = self.config;

        let attributes = self.step(Stage::Decoding, |_| match input {
            SessionInput::Request(bytes) => decode_attributes(bytes, &config.fallback),
            SessionInput::Attributes(attrs) => Ok(attrs.clone()),
        })?;

        let chain = self.step(Stage::ChainBuilding, |s| {
            Ok(TrustChain::build(
                &mut s.rng,
                config.key_bits,
                &mut s.serials,
                s.issued_at,
                &config.validity,
            )?)
        })?;

        let (server, device) = self.step(Stage::CertIssuing, |s| {
            let mut issuer = Issuer::new(
                &chain,
                &mut s.rng,
                &mut s.serials,
                config.key_bits,
                s.issued_at,
                &config.validity,
            );
            let server = issuer.issue_server(&config.service_host)?;
            let device =
                issuer.issue_device(&attributes.serial_number(), &attributes.product_type())?;
            Ok((server, device))
        })?;

        let ticket = self.step(Stage::TicketSigning, |s| {
            SignedTicket::issue(&attributes, s.issued_at, &server)
        })?;

        let (token, signed_token) = self.step(Stage::TokenSigning, |_| {
            let token = AccountTokenPayload::new(&attributes, &ticket, config);
            let signed = token.sign(&server)?;
            Ok((token, signed))
        })?;

        let (record, document) = self.step(Stage::Assembling, |_| {
            let record = assemble(config, &chain, &server, &device, &signed_token)?;
            let document = record.to_xml()?;
            Ok((record, document))
        })?;

        self.state = SessionState::Done;
        tracing::info!(
            product_type = %attributes.product_type(),
            substituted = attributes.substituted().count(),
            blank = attributes.blank().count(),
            "activation record synthesized"
        );

        Ok(SessionArtifacts {
            issued_at: self.issued_at,
            root_certificate: chain.root().certificate().clone(),
            device_ca_certificate: chain.device_ca().certificate().clone(),
            server_certificate: server.certificate().clone(),
            device_certificate: device.certificate().clone(),
            attributes,
            ticket,
            token,
            signed_token,
            record,
            document,
            stages: self.stages.clone(),
        })
    }

    fn step<T>(
        &mut self,
        stage: Stage,
        f: impl FnOnce(&mut Self) -> Result<T, ActivationError>,
    ) -> Result<T, SessionError> {
        self.state = SessionState::Running(stage);
        tracing::debug!(%stage, "session stage started");
        match f(self) {
            Ok(value) => {
                self.stages.push(stage);
                Ok(value)
            }
            Err(source) => {
                tracing::warn!(%stage, error = %source, "session stage failed");
                self.state = SessionState::Failed {
                    stage,
                    reason: source.to_string(),
                };
                Err(SessionError { stage, source })
            }
        }
    }
}

impl std::fmt::Debug for Session<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("issued_at", &self.issued_at)
            .field("state", &self.state)
            .field("stages", &self.stages)
            .finish_non_exhaustive()
    }
}

fn assemble(
    config: &SynthesisConfig,
    chain: &TrustChain,
    server: &CertifiedKey,
    device: &CertifiedKey,
    signed_token: &SignedToken,
) -> Result<ActivationRecord, ActivationError> {
    let bundle = encode_pem_bundle([
        device.certificate(),
        chain.device_ca().certificate(),
        chain.root().certificate(),
    ])
    .map_err(|e| ActivationError::Serialization(e.to_string()))?;
    let der = |ck: &CertifiedKey| {
        ck.certificate_der()
            .map_err(|e| ActivationError::Serialization(e.to_string()))
    };

    Ok(ActivationRecord {
        unbrick: config.unbrick,
        account_token_certificate: der(server)?,
        device_certificate: der(device)?,
        regulatory_info: config.regulatory_info.as_bytes().to_vec(),
        fairplay_key_data: config.fairplay_key_data.as_bytes().to_vec(),
        account_token: signed_token.payload.clone(),
        account_token_signature: signed_token.signature.clone(),
        unique_device_certificate: bundle.into_bytes(),
    })
}

// ─── Entry Points ────────────────────────────────────────────────────

/// Synthesize a record from request bytes.
pub fn generate(
    request: &[u8],
    config: &SynthesisConfig,
    clock: &dyn Clock,
) -> Result<SessionArtifacts, SessionError> {
    Session::new(config, clock).run(SessionInput::Request(request))
}

/// Synthesize a record from already-resolved attributes.
pub fn generate_from_attributes(
    attributes: &DeviceAttributes,
    config: &SynthesisConfig,
    clock: &dyn Clock,
) -> Result<SessionArtifacts, SessionError> {
    Session::new(config, clock).run(SessionInput::Attributes(attributes))
}

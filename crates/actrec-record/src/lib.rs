//! # actrec-record: Activation Record Synthesis
//!
//! Drives one synthesis session from request bytes to the final record:
//!
//! - **Request** (`request.rs`): property-list decoding into flat device
//!   attributes.
//! - **Ticket** (`ticket.rs`): CMS signed-data binding of randomness,
//!   issuance time and device identifier.
//! - **Token** (`token.rs`): the fixed-order account token and its
//!   signature.
//! - **Record** (`record.rs`): the eight-key activation record document.
//! - **Session** (`session.rs`): stage ordering, failure reporting, and the
//!   [`generate`] entry points.
//!
//! ## Crate Policy
//!
//! - Depends on `actrec-core` and `actrec-crypto` internally.
//! - No private key leaves a session; [`SessionArtifacts`] carries
//!   certificates and signed outputs only.

#![deny(missing_docs)]

pub mod record;
pub mod request;
pub mod session;
pub mod ticket;
pub mod token;

pub use record::{record_keys, ActivationRecord, RECORD_KEYS};
pub use request::{decode_attributes, decode_request};
pub use session::{
    generate, generate_from_attributes, Session, SessionArtifacts, SessionError, SessionInput,
    SessionState, Stage,
};
pub use ticket::{ticket_content, SignedTicket};
pub use token::{parse_rendered, token_keys, AccountTokenPayload, SignedToken, TokenValue};

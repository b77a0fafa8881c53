//! # actrec-core: Foundational Types for the Activation Record Synthesizer
//!
//! Leaf crate of the workspace. Defines the values that flow between the
//! request decoder, the PKI builder, and the record assembler, and the error
//! taxonomy every session reports through.
//!
//! ## Key Design Principles
//!
//! 1. **Tagged attribute values.** Request nodes decode into [`AttrValue`]
//!    and are matched explicitly. Unknown kinds become `Opaque`.
//!
//! 2. **Immutable attributes.** [`DeviceAttributes::resolve`] is the only way
//!    to build the session input. It enforces the mandatory identifiers and
//!    is the single place fallback placeholders are applied.
//!
//! 3. **Injected time.** Sessions read time from a [`Clock`], never from
//!    the system directly.
//!
//! 4. **`CanonicalBytes` for signed ticket content.** JCS output, no floats.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `actrec-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod attributes;
pub mod canonical;
pub mod config;
pub mod error;
pub mod temporal;
pub mod value;

pub use attributes::{keys, DeviceAttributes, FallbackTable, DEFAULTABLE_FIELDS, MANDATORY_FIELDS};
pub use canonical::CanonicalBytes;
pub use config::{SynthesisConfig, ValidityDays};
pub use error::{ActivationError, CanonicalizationError, ConfigError};
pub use temporal::{Clock, FixedClock, SystemClock, Timestamp};
pub use value::AttrValue;

//! tandem: dual-model speculative decoding.
//!
//! A fast drafter extends a shared candidate token sequence; an
//! authoritative target verifies whole speculative tails in single forward
//! passes and commits the longest matching prefix plus one fresh token.
//! Two deployment bindings share the same engines:
//!
//! - **Local**: drafter and target are peer threads around a turn-based
//!   [`core::Coordinator`].
//! - **Remote**: the target owns a [`core::HintBoard`] behind a `/hint`
//!   endpoint; a drafter on another host stays aligned through a
//!   prefix-delta protocol sealed with CRC-32 fingerprints.
//!
//! The tensor runtime and tokenizer are collaborators behind the
//! [`model::LanguageModel`] and [`model::TextCodec`] traits; a corpus-backed
//! n-gram reference backend is included.

pub mod config;
pub mod error;

pub mod core;
pub mod engine;
pub mod model;
pub mod prompt;
pub mod server;
pub mod session;

pub use config::{RuntimeConfig, ServerConfig, SpeculationConfig};
pub use error::{Error, Result};

//! Core coordination: the shared candidate, the local turn-based
//! coordinator, and the remote delta-sync protocol.

pub mod candidate;
pub mod checksum;
pub mod coordinator;
pub mod delta;

pub use candidate::CandidateLedger;
pub use checksum::token_crc32;
pub use coordinator::{CandidateSnapshot, Coordinator, Turn};
pub use delta::{DraftSync, HintBoard, HintRequest, HintResponse};

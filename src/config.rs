//! Configuration types for tandem.

use serde::{Deserialize, Serialize};

/// Runtime configuration for one model instance.
///
/// These knobs mirror what a tensor runtime consumes at load time. The
/// built-in reference backend only uses `n_batch` and `n_ctx`; thread count
/// and GPU offload are forwarded to backends that understand them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Maximum number of positions submitted to the decode primitive per call.
    pub n_batch: usize,
    /// Context size in tokens (prompt + generation must fit).
    pub n_ctx: usize,
    /// CPU threads for evaluation.
    pub n_threads: usize,
    /// Transformer layers offloaded to the GPU.
    pub n_gpu_layers: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            n_batch: 512,
            n_ctx: 4096,
            n_threads: 16,
            n_gpu_layers: 0,
        }
    }
}

/// Speculation configuration shared by both drafter variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeculationConfig {
    /// Tokens the drafter extends per turn.
    pub n_draft: usize,
    /// Maximum speculative lead over the approved frontier before the remote
    /// drafter throttles.
    pub n_ahead: usize,
    /// Pause after a failed hint round-trip, in milliseconds.
    pub retry_backoff_ms: u64,
    /// Pause while throttled or waiting for authoritative progress, in
    /// milliseconds.
    pub throttle_pause_ms: u64,
}

impl Default for SpeculationConfig {
    fn default() -> Self {
        Self {
            n_draft: 5,
            n_ahead: 16,
            retry_backoff_ms: 500,
            throttle_pause_ms: 500,
        }
    }
}

impl SpeculationConfig {
    /// Pause after a failed hint round-trip.
    pub fn retry_backoff(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.retry_backoff_ms)
    }

    /// Pause while throttled.
    pub fn throttle_pause(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.throttle_pause_ms)
    }
}

/// HTTP server / peer endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on (lead) or connect to (back).
    pub host: String,
    /// TCP port.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5555,
        }
    }
}

//! The remote drafter.
//!
//! Same extension logic as the local drafter, but the candidate snapshot
//! arrives through a `/hint` round-trip and publication rides on the next
//! request body. A failed round-trip never mutates local state; the drafter
//! backs off and retries. The `n_ahead` throttle bounds wasted draft compute
//! when the target is slower to consume speculation than we produce it.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::{RuntimeConfig, SpeculationConfig};
use crate::core::{DraftSync, HintRequest, HintResponse};
use crate::error::Result;
use crate::model::{LanguageModel, Token};

/// One hint round-trip. Abstracted so the drafter loop runs against an
/// in-process board in tests and over HTTP in production.
pub trait HintTransport {
    fn hint(&self, req: &HintRequest) -> Result<HintResponse>;
}

/// Blocking HTTP transport to the lead's `/hint` endpoint, one keep-alive
/// connection reused across rounds.
pub struct HttpHintTransport {
    client: reqwest::blocking::Client,
    url: String,
}

impl HttpHintTransport {
    pub fn new(host: &str, port: u16) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .tcp_keepalive(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            url: format!("http://{host}:{port}/hint"),
        })
    }
}

impl HintTransport for HttpHintTransport {
    fn hint(&self, req: &HintRequest) -> Result<HintResponse> {
        let resp = self
            .client
            .post(&self.url)
            .json(req)
            .send()?
            .error_for_status()?
            .json::<HintResponse>()?;
        Ok(resp)
    }
}

/// Outcome of one remote drafting round; tells the caller how to pace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftStep {
    /// Extended the candidate by this many tokens and ready to re-hint.
    Extended(usize),
    /// No useful work right now (cold start, too far ahead, or out of
    /// context); pause briefly before the next hint.
    Throttled,
    /// The round-trip failed; back off and retry. Local state untouched.
    Backoff,
}

/// Drafter loop for the two-host deployment.
pub struct RemoteDrafter<M, T> {
    model: M,
    transport: T,
    sync: DraftSync,
    runtime: RuntimeConfig,
    spec: SpeculationConfig,
}

impl<M: LanguageModel, T: HintTransport> RemoteDrafter<M, T> {
    pub fn new(model: M, transport: T, runtime: RuntimeConfig, spec: SpeculationConfig) -> Self {
        Self {
            model,
            transport,
            sync: DraftSync::new(),
            runtime,
            spec,
        }
    }

    /// The drafter-side mirror, for observation.
    pub fn sync(&self) -> &DraftSync {
        &self.sync
    }

    /// One round: hint, resynchronize, maybe extend.
    pub fn step(&mut self) -> Result<DraftStep> {
        let req = self.sync.request();
        let was_synced = req.n_prefix > 0 || !self.sync.tokens().is_empty();
        match self.transport.hint(&req) {
            Ok(resp) => {
                if resp.n_prefix == 0 && was_synced {
                    info!("authoritative sequence changed, resynchronizing from scratch");
                }
                self.sync.apply(resp);
            }
            Err(e) => {
                warn!(error = %e, "hint round-trip failed");
                return Ok(DraftStep::Backoff);
            }
        }

        if self.sync.should_wait(self.spec.n_ahead) {
            debug!(
                len = self.sync.tokens().len(),
                n_approved = self.sync.n_approved(),
                "waiting for the target to consume speculation"
            );
            return Ok(DraftStep::Throttled);
        }
        if self.sync.tokens().len() >= self.runtime.n_ctx {
            debug!("candidate fills the draft context, not extending");
            return Ok(DraftStep::Throttled);
        }

        // Trim the cache above the positions the target did not reject,
        // keeping at least one position to re-decode for its logit.
        let total = self.sync.tokens().len();
        let mut reuse = self.sync.n_reusable().min(self.model.n_cached());
        if reuse >= total {
            reuse = total - 1;
        }
        self.model.forget_from(reuse);

        let mut extended = 0;
        for _ in 0..self.spec.n_draft {
            let from = self.model.n_cached();
            let tail: Vec<Token> = self.sync.tokens()[from..].to_vec();
            let next = super::feed_tail(&mut self.model, &tail, from, self.runtime.n_batch)?;
            self.sync.push(next);
            extended += 1;
        }
        Ok(DraftStep::Extended(extended))
    }

    /// Run forever, pacing on the per-round outcome. Only a decode failure
    /// on the local model exits the loop.
    pub fn run(&mut self) -> Result<()> {
        loop {
            match self.step()? {
                DraftStep::Extended(_) => {}
                DraftStep::Throttled => std::thread::sleep(self.spec.throttle_pause()),
                DraftStep::Backoff => std::thread::sleep(self.spec.retry_backoff()),
            }
        }
    }
}

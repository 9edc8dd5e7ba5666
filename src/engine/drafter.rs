//! The local drafter.
//!
//! Runs the fast model as a peer thread of the verifier, extending the
//! shared candidate by `n_draft` greedy tokens every time the turn comes
//! around. The target may have rewritten any speculative position since the
//! last turn, so each round starts by diffing the snapshot against the local
//! sequence and trimming the draft cache back to the first divergence.

use tracing::debug;

use crate::config::{RuntimeConfig, SpeculationConfig};
use crate::core::Coordinator;
use crate::error::Result;
use crate::model::{LanguageModel, Token};

use super::target::common_prefix_len;

/// Drafter loop for the in-process deployment.
pub struct DraftEngine<M> {
    model: M,
    runtime: RuntimeConfig,
    spec: SpeculationConfig,
}

impl<M: LanguageModel> DraftEngine<M> {
    pub fn new(model: M, runtime: RuntimeConfig, spec: SpeculationConfig) -> Self {
        Self {
            model,
            runtime,
            spec,
        }
    }

    /// Run until the coordinator reports the request done.
    pub fn run(&mut self, prompt: &[Token], coordinator: &Coordinator) -> Result<()> {
        self.model.forget_from(0);
        super::feed_tail(&mut self.model, prompt, 0, self.runtime.n_batch)?;
        let mut local: Vec<Token> = prompt.to_vec();

        while let Some(shared) = coordinator.await_draft_turn() {
            // Adopt the snapshot wherever it disagrees with (or extends) the
            // local sequence; cached positions past the divergence are dead.
            let m = common_prefix_len(&shared, &local);
            if m < shared.len().min(local.len()) {
                self.model.forget_from(m);
                local = shared;
            } else if shared.len() >= local.len() {
                local = shared;
            }
            // else: the target agreed with a prefix of a longer local
            // sequence; keep the extra speculation we already have.

            for _ in 0..self.spec.n_draft {
                let mut from = self.model.n_cached();
                if from >= local.len() {
                    // Everything is cached; re-decode the last position so
                    // there is a logit to extend from.
                    from = local.len() - 1;
                    self.model.forget_from(from);
                }
                let next =
                    super::feed_tail(&mut self.model, &local[from..], from, self.runtime.n_batch)?;
                local.push(next);
            }
            debug!(len = local.len(), "drafted extension");
            coordinator.publish_draft(local.clone());
        }
        Ok(())
    }
}

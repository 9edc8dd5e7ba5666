//! The target verifier.
//!
//! Runs the authoritative model. Each step checks a speculative tail in one
//! forward pass, commits the longest matching prefix plus one freshly
//! produced token, trims the cache back to the committed frontier, and
//! publishes the new state through the [`CandidateExchange`] seam shared by
//! the local coordinator and the remote hint board.

use std::time::Instant;

use tracing::{debug, info, warn};

use crate::config::RuntimeConfig;
use crate::error::{Error, Result};
use crate::model::{LanguageModel, LogitMode, Token};

/// Publication seam between the verifier and whichever coordinator binding
/// is in play.
pub trait CandidateExchange {
    /// Publish freshly committed tokens starting at `next_tokens_pos` and
    /// obtain the candidate tail starting at the anchor position
    /// `n_accepted - 1` for the next verify step. `None` means the request
    /// was cancelled.
    fn exchange(
        &self,
        next_tokens_pos: usize,
        next_tokens: &[Token],
        n_accepted: usize,
    ) -> Option<Vec<Token>>;

    /// Signal that generation for this request is over.
    fn finish(&self);
}

/// The authoritative verifier for one model instance.
///
/// Holds the previous request's final token sequence so a follow-up request
/// sharing a prefix (the usual chat pattern) skips re-decoding it.
pub struct TargetEngine<M> {
    model: M,
    runtime: RuntimeConfig,
    last_session: Vec<Token>,
}

impl<M: LanguageModel> TargetEngine<M> {
    pub fn new(model: M, runtime: RuntimeConfig) -> Self {
        Self {
            model,
            runtime,
            last_session: Vec::new(),
        }
    }

    /// The model's context size in tokens.
    pub fn n_ctx(&self) -> usize {
        self.runtime.n_ctx
    }

    /// Run one request to completion. Committed tokens are handed to
    /// `on_commit` in step order; the return value is the full output.
    ///
    /// The exchange is always finished on the way out, success or not, so a
    /// peer drafter never blocks on a dead request.
    pub fn run(
        &mut self,
        prompt: &[Token],
        max_new_tokens: usize,
        exchange: &dyn CandidateExchange,
        on_commit: &mut dyn FnMut(&[Token]),
    ) -> Result<Vec<Token>> {
        let result = self.generate(prompt, max_new_tokens, exchange, on_commit);
        exchange.finish();
        match result {
            Ok(output) => {
                self.last_session = prompt.to_vec();
                self.last_session.extend_from_slice(&output);
                Ok(output)
            }
            Err(e) => {
                // The cache may be mid-request; drop it so the next request
                // starts clean.
                self.model.forget_from(0);
                self.last_session.clear();
                Err(e)
            }
        }
    }

    fn generate(
        &mut self,
        prompt: &[Token],
        max_new_tokens: usize,
        exchange: &dyn CandidateExchange,
        on_commit: &mut dyn FnMut(&[Token]),
    ) -> Result<Vec<Token>> {
        if prompt.is_empty() {
            return Err(Error::Config("prompt must not be empty".into()));
        }
        let n_ctx = self.runtime.n_ctx;
        if n_ctx < prompt.len() {
            return Err(Error::PromptTooLong {
                n_prompt: prompt.len(),
                n_ctx,
            });
        }
        let mut n_predict = max_new_tokens;
        if n_ctx < prompt.len() + n_predict {
            warn!(
                n_ctx,
                n_prompt = prompt.len(),
                "context not large enough, trimming output budget"
            );
            n_predict = n_ctx - prompt.len();
        }
        let n_len = prompt.len() + n_predict;

        // Reuse the cache for the longest prefix shared with the previous
        // session; at least one prompt token is re-decoded for its logit.
        let shared = common_prefix_len(&self.last_session, prompt);
        let n_reuse = shared.min(prompt.len() - 1).min(self.model.n_cached());
        self.model.forget_from(n_reuse);
        info!(n_reuse, "reusing cached prompt positions");

        let encode_start = Instant::now();
        let anchor_token =
            super::feed_tail(&mut self.model, &prompt[n_reuse..], n_reuse, self.runtime.n_batch)?;
        let encode_dur = encode_start.elapsed().as_secs_f64();
        let n_encoded = prompt.len() - n_reuse;
        info!(
            n_encoded,
            "encoded in {:.3}s, {:.1} t/s",
            encode_dur,
            n_encoded as f64 / encode_dur.max(1e-9)
        );

        let mut output: Vec<Token> = Vec::new();
        let mut n_accepted = prompt.len();
        let mut input_seq = vec![prompt[prompt.len() - 1]];
        let mut pending = vec![anchor_token];
        let decode_start = Instant::now();

        while n_accepted < n_len {
            let mut next_tokens = std::mem::take(&mut pending);
            if next_tokens.len() != input_seq.len() {
                return Err(Error::Decode(format!(
                    "expected {} greedy tokens, got {}",
                    input_seq.len(),
                    next_tokens.len()
                )));
            }

            let next_tokens_pos = n_accepted;
            // The first produced token is always accepted; speculation is
            // accepted while it matches what the model produced.
            let mut n_match = 0;
            while n_match + 1 < input_seq.len()
                && n_match < next_tokens.len()
                && next_tokens[n_match] == input_seq[n_match + 1]
            {
                n_match += 1;
            }
            n_accepted += n_match + 1;
            next_tokens.truncate(n_match + 1);
            debug!(
                n_match,
                n_rejected = input_seq.len() - 1 - n_match,
                "verification step"
            );

            // Positions past the last committed token are no longer trusted.
            self.model.forget_from(n_accepted - 1);

            let mut done = false;
            if let Some(idx) = next_tokens.iter().position(|&t| self.model.is_eog(t)) {
                done = true;
                next_tokens.truncate(idx);
            }
            if !next_tokens.is_empty() {
                output.extend_from_slice(&next_tokens);
                on_commit(&next_tokens);
            }

            // Publication is unconditional so peers observe the final commit
            // too; the returned tail only matters when the loop continues.
            let tail = exchange.exchange(next_tokens_pos, &next_tokens, n_accepted);
            if done || n_accepted >= n_len {
                break;
            }
            let Some(mut tail) = tail else {
                break;
            };
            if tail.len() + n_accepted > n_len {
                tail.truncate(n_len - n_accepted);
            }
            if tail.len() > self.runtime.n_batch {
                warn!("trimming speculation to fit in batch size");
                tail.truncate(self.runtime.n_batch);
            }
            input_seq = tail;
            pending = self
                .model
                .decode(&input_seq, n_accepted - 1, LogitMode::All)?;
        }

        let decode_dur = decode_start.elapsed().as_secs_f64();
        info!(
            n_decoded = output.len(),
            "decoded in {:.3}s, {:.1} t/s",
            decode_dur,
            output.len() as f64 / decode_dur.max(1e-9)
        );
        Ok(output)
    }
}

/// Length of the longest common prefix of two token sequences.
pub(crate) fn common_prefix_len(a: &[Token], b: &[Token]) -> usize {
    let lim = a.len().min(b.len());
    (0..lim).find(|&i| a[i] != b[i]).unwrap_or(lim)
}

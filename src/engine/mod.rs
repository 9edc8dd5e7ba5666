//! The two actors: the target verifier and the drafter (local and remote).

pub mod drafter;
pub mod remote;
pub mod target;

pub use drafter::DraftEngine;
pub use remote::{DraftStep, HintTransport, HttpHintTransport, RemoteDrafter};
pub use target::{CandidateExchange, TargetEngine};

use crate::core::{Coordinator, HintBoard};
use crate::error::{Error, Result};
use crate::model::{LanguageModel, LogitMode, Token};

impl CandidateExchange for Coordinator {
    fn exchange(
        &self,
        next_tokens_pos: usize,
        next_tokens: &[Token],
        n_accepted: usize,
    ) -> Option<Vec<Token>> {
        self.exchange_verified(next_tokens_pos, next_tokens, n_accepted)
    }

    fn finish(&self) {
        Coordinator::finish(self);
    }
}

impl CandidateExchange for HintBoard {
    fn exchange(
        &self,
        next_tokens_pos: usize,
        next_tokens: &[Token],
        n_accepted: usize,
    ) -> Option<Vec<Token>> {
        Some(self.commit(next_tokens_pos, next_tokens, n_accepted))
    }

    fn finish(&self) {
        // The board outlives the request; remote drafters notice the next
        // request through the fingerprint check and resynchronize.
    }
}

/// Feed `tokens` at positions starting from `first_pos` in `n_batch`-sized
/// chunks, asking for logits only at the end. Returns the greedy token
/// produced by the final chunk.
pub(crate) fn feed_tail<M: LanguageModel>(
    model: &mut M,
    tokens: &[Token],
    first_pos: usize,
    n_batch: usize,
) -> Result<Token> {
    if tokens.is_empty() {
        return Err(Error::Decode("empty token range".into()));
    }
    let mut produced = 0;
    let mut i = 0;
    while i < tokens.len() {
        let j = (i + n_batch).min(tokens.len());
        produced = model.decode(&tokens[i..j], first_pos + i, LogitMode::Last)?[0];
        i = j;
    }
    Ok(produced)
}

//! The shared candidate and its approved frontier.
//!
//! A candidate is the one token sequence both actors cooperate on: an
//! approved prefix the target has committed, followed by a speculative tail
//! the drafter keeps extending. The ledger tracks how much of the sequence
//! is authoritative and binds that prefix with a fingerprint so a remote
//! peer can detect it is no longer looking at the same request.

use crate::core::checksum::token_crc32;
use crate::model::Token;

/// Shared candidate plus approved-frontier bookkeeping.
///
/// Invariants maintained by every mutation:
/// - `n_approved` never decreases within a request and never exceeds
///   `tokens.len()`.
/// - `tokens[..n_approved]` is never rewritten once approved.
/// - `crc32_approved` always equals the fingerprint of `tokens[..n_approved]`.
#[derive(Debug, Clone, Default)]
pub struct CandidateLedger {
    /// The candidate: approved prefix + speculative tail.
    tokens: Vec<Token>,
    /// Count of leading tokens committed by the target.
    n_approved: usize,
    /// Fingerprint of `tokens[..n_approved]`.
    crc32_approved: u32,
}

impl CandidateLedger {
    /// Start a ledger for a new request. The prompt is speculation-free but
    /// not yet target-approved; the frontier advances as the target commits.
    pub fn new(prompt: Vec<Token>) -> Self {
        Self {
            tokens: prompt,
            n_approved: 0,
            crc32_approved: 0,
        }
    }

    /// Start a ledger with the whole prompt pre-approved. Used by the local
    /// coordinator, where the prompt is authoritative by construction.
    pub fn with_approved_prompt(prompt: Vec<Token>) -> Self {
        let crc32_approved = token_crc32(&prompt);
        let n_approved = prompt.len();
        Self {
            tokens: prompt,
            n_approved,
            crc32_approved,
        }
    }

    /// The full candidate sequence.
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Count of target-approved leading tokens.
    pub fn n_approved(&self) -> usize {
        self.n_approved
    }

    /// Fingerprint of the approved prefix.
    pub fn crc32_approved(&self) -> u32 {
        self.crc32_approved
    }

    /// Fingerprint of `tokens[..n]`, or `None` if `n` is out of range.
    pub fn fingerprint_prefix(&self, n: usize) -> Option<u32> {
        self.tokens.get(..n).map(token_crc32)
    }

    /// Commit freshly verified tokens starting at `pos`.
    ///
    /// Where `next_tokens` agrees with the existing speculative tail the
    /// candidate is left untouched (a longer agreeing tail survives); at the
    /// first divergence the tail is cut and replaced. The approved frontier
    /// becomes `pos + next_tokens.len()` and the fingerprint is recomputed.
    pub fn commit(&mut self, pos: usize, next_tokens: &[Token]) {
        debug_assert!(pos >= self.n_approved);
        debug_assert!(pos <= self.tokens.len());
        let tail = &self.tokens[pos.min(self.tokens.len())..];
        let lim = tail.len().min(next_tokens.len());
        let n_match = (0..lim)
            .find(|&i| tail[i] != next_tokens[i])
            .unwrap_or(lim);
        if n_match != next_tokens.len() {
            self.tokens.truncate(pos);
            self.tokens.extend_from_slice(next_tokens);
        }
        self.n_approved = pos + next_tokens.len();
        self.crc32_approved = token_crc32(&self.tokens[..self.n_approved]);
    }

    /// Replace the speculative tail with a drafter-published candidate.
    ///
    /// The approved prefix is protected: a publication that would rewrite an
    /// approved position is discarded, since any tail built on a diverged
    /// prefix is unusable anyway.
    pub fn publish_tail(&mut self, candidate: Vec<Token>) {
        let n = self.n_approved;
        if candidate.len() < n || candidate[..n] != self.tokens[..n] {
            return;
        }
        self.tokens = candidate;
    }

    /// Append tokens past the current end of the candidate.
    pub fn extend(&mut self, new_tokens: &[Token]) {
        self.tokens.extend_from_slice(new_tokens);
    }

    /// The tail starting at `pos` (empty when `pos` is past the end).
    pub fn tail_from(&self, pos: usize) -> Vec<Token> {
        self.tokens.get(pos..).map(<[Token]>::to_vec).unwrap_or_default()
    }
}

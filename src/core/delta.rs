//! Prefix-delta synchronization for the remote (two-host) deployment.
//!
//! The target owns the authoritative candidate; a remote drafter keeps a
//! mirror aligned through `/hint` round-trips. Neither side retransmits the
//! shared prefix: the drafter sends only its tail past the last approved
//! frontier it observed, sealed with a CRC-32 of the omitted prefix, and the
//! target answers with whatever the drafter is missing. A fingerprint
//! mismatch means the drafter is looking at a dead sequence (usually a new
//! request) and gets the full candidate back for a from-scratch resync.

use serde::{Deserialize, Serialize};

use crate::core::candidate::CandidateLedger;
use crate::model::Token;

/// One hint round, drafter to target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HintRequest {
    /// The drafter's candidate from position `n_prefix` onward.
    pub candidate: Vec<Token>,
    /// Position at which `candidate` starts.
    pub n_prefix: usize,
    /// Fingerprint of the drafter's local `tokens[..n_prefix]`.
    pub crc32_prefix: u32,
}

/// One hint round, target to drafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HintResponse {
    /// Replacement (or echo) of the drafter's tail, starting at `n_prefix`.
    pub candidate: Vec<Token>,
    /// Position at which `candidate` starts. Zero signals a full resync.
    pub n_prefix: usize,
    /// Leading positions of the submitted tail still consistent with the
    /// authoritative sequence, relative to `n_prefix`.
    pub n_not_rejected: usize,
    /// Latest authoritative frontier (absolute).
    pub n_approved: usize,
    /// Fingerprint of the approved prefix on the target side.
    pub crc32_approved: u32,
}

/// Target-side authoritative candidate for the remote deployment.
///
/// All operations run under one internal lock: this is the server-side
/// critical section the spec's remote coordinator requires.
#[derive(Default)]
pub struct HintBoard {
    ledger: std::sync::Mutex<CandidateLedger>,
}

impl HintBoard {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CandidateLedger> {
        self.ledger.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Begin a new request. The frontier restarts at zero so any drafter
    /// still mirroring the previous request fails the prefix check and takes
    /// the full-resync path on its next hint.
    pub fn reset(&self, prompt: Vec<Token>) {
        *self.lock() = CandidateLedger::new(prompt);
    }

    /// Serve one hint round: prefix check, merge, frontier report.
    pub fn hint(&self, req: &HintRequest) -> HintResponse {
        let mut ledger = self.lock();

        let prefix_live = ledger
            .fingerprint_prefix(req.n_prefix)
            .is_some_and(|crc| crc == req.crc32_prefix);
        if !prefix_live {
            // The drafter's world is stale; hand it everything from zero.
            return HintResponse {
                candidate: ledger.tokens().to_vec(),
                n_prefix: 0,
                n_not_rejected: 0,
                n_approved: ledger.n_approved(),
                crc32_approved: ledger.crc32_approved(),
            };
        }

        let local_tail = &ledger.tokens()[req.n_prefix..];
        let lim = local_tail.len().min(req.candidate.len());
        let n_not_rejected = (0..lim)
            .find(|&i| local_tail[i] != req.candidate[i])
            .unwrap_or(req.candidate.len());

        let extends = n_not_rejected == req.candidate.len()
            && ledger.tokens().len() < req.n_prefix + req.candidate.len();
        let candidate = if extends {
            // Tail fully matched and reaches past our end: adopt the new
            // speculation and echo the tail back unchanged.
            ledger.extend(&req.candidate[lim..]);
            req.candidate.clone()
        } else {
            // We are ahead or in disagreement: the drafter must replace its
            // tail with ours.
            ledger.tail_from(req.n_prefix)
        };

        HintResponse {
            candidate,
            n_prefix: req.n_prefix,
            n_not_rejected,
            n_approved: ledger.n_approved(),
            crc32_approved: ledger.crc32_approved(),
        }
    }

    /// Target publication, same commit rule as the local coordinator.
    /// Returns the candidate tail starting at `n_accepted - 1`.
    pub fn commit(
        &self,
        next_tokens_pos: usize,
        next_tokens: &[Token],
        n_accepted: usize,
    ) -> Vec<Token> {
        let mut ledger = self.lock();
        ledger.commit(next_tokens_pos, next_tokens);
        ledger.tail_from(n_accepted - 1)
    }

    /// Observe (tokens, n_approved, crc32_approved).
    pub fn snapshot(&self) -> (Vec<Token>, usize, u32) {
        let ledger = self.lock();
        (
            ledger.tokens().to_vec(),
            ledger.n_approved(),
            ledger.crc32_approved(),
        )
    }
}

/// Drafter-side mirror of the authoritative candidate.
///
/// Tracks what the last hint round established so the next round can send a
/// minimal delta and the drafter knows how much of its KV cache is still
/// trustworthy.
#[derive(Debug, Default)]
pub struct DraftSync {
    tokens: Vec<Token>,
    n_prefix: usize,
    n_not_rejected: usize,
    n_approved: usize,
    crc32_approved: u32,
    last_payload_len: usize,
}

impl DraftSync {
    pub fn new() -> Self {
        Self::default()
    }

    /// The mirrored candidate.
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Latest observed authoritative frontier.
    pub fn n_approved(&self) -> usize {
        self.n_approved
    }

    /// Count of leading positions whose draft KV cache is still usable:
    /// everything up to the response offset plus what the target did not
    /// reject.
    pub fn n_reusable(&self) -> usize {
        self.n_prefix + self.n_not_rejected
    }

    /// Build the next hint: the tail past the approved frontier, sealed with
    /// the fingerprint of the omitted prefix.
    pub fn request(&self) -> HintRequest {
        HintRequest {
            candidate: self.tokens.get(self.n_approved..).map(<[Token]>::to_vec).unwrap_or_default(),
            n_prefix: self.n_approved,
            crc32_prefix: self.crc32_approved,
        }
    }

    /// Fold a hint response into the mirror. On a full resync
    /// (`n_prefix == 0`) this replaces the whole sequence.
    pub fn apply(&mut self, resp: HintResponse) {
        self.tokens.truncate(resp.n_prefix);
        self.tokens.extend_from_slice(&resp.candidate);
        self.n_prefix = resp.n_prefix;
        self.n_not_rejected = resp.n_not_rejected;
        self.n_approved = resp.n_approved;
        self.crc32_approved = resp.crc32_approved;
        self.last_payload_len = resp.candidate.len();
    }

    /// Append locally drafted tokens to the mirror.
    pub fn push(&mut self, token: Token) {
        self.tokens.push(token);
    }

    /// Whether the drafter should pause instead of extending: nothing to
    /// work on yet, or already `n_ahead` speculative tokens past the
    /// confirmed frontier.
    pub fn should_wait(&self, n_ahead: usize) -> bool {
        self.tokens.is_empty()
            || self.last_payload_len == 0
            || (self.n_approved > 0 && self.tokens.len() > self.n_approved + n_ahead)
    }
}

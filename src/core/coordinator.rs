//! In-process coordinator for the local (single-host) deployment.
//!
//! Drafter and target are peer threads strictly alternating on one shared
//! candidate. A tri-state turn flag routes exclusive write access; a
//! condition variable wakes whichever actor the turn was handed to. The
//! mutex is only held while inspecting or mutating the record, never across
//! a model decode.

use std::sync::{Condvar, Mutex, MutexGuard};

use crate::core::candidate::CandidateLedger;
use crate::model::Token;

/// Who may mutate the candidate right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Turn {
    /// The drafter may extend the speculative tail.
    Drafter,
    /// The target may verify and commit.
    Target,
    /// Handed off, new owner not yet woken.
    Idle,
    /// Terminal: no further mutation.
    Done,
}

/// Read-only observation of the coordinator state.
#[derive(Debug, Clone)]
pub struct CandidateSnapshot {
    pub tokens: Vec<Token>,
    pub n_approved: usize,
    pub crc32_approved: u32,
    pub turn: Turn,
}

struct Shared {
    ledger: CandidateLedger,
    turn: Turn,
}

/// Turn-based coordinator shared by the drafter and target threads.
pub struct Coordinator {
    shared: Mutex<Shared>,
    turn_changed: Condvar,
}

impl Coordinator {
    /// Create a coordinator for one request. The initial turn belongs to the
    /// drafter so the first verification has speculation to check.
    pub fn new(prompt: Vec<Token>) -> Self {
        Self {
            shared: Mutex::new(Shared {
                ledger: CandidateLedger::with_approved_prompt(prompt),
                turn: Turn::Drafter,
            }),
            turn_changed: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Block until it is the drafter's turn, then snapshot the candidate and
    /// take the turn. Returns `None` once the request is done.
    pub fn await_draft_turn(&self) -> Option<Vec<Token>> {
        let mut shared = self.lock();
        while !matches!(shared.turn, Turn::Drafter | Turn::Done) {
            shared = self
                .turn_changed
                .wait(shared)
                .unwrap_or_else(|e| e.into_inner());
        }
        if shared.turn == Turn::Done {
            return None;
        }
        shared.turn = Turn::Idle;
        Some(shared.ledger.tokens().to_vec())
    }

    /// Drafter publication: install the extended candidate and hand the turn
    /// to the target. A publication that would rewrite an approved position
    /// is discarded (the turn still changes hands).
    pub fn publish_draft(&self, candidate: Vec<Token>) {
        let mut shared = self.lock();
        if shared.turn == Turn::Done {
            return;
        }
        shared.ledger.publish_tail(candidate);
        shared.turn = Turn::Target;
        self.turn_changed.notify_all();
    }

    /// Target publication: wait for the drafter's handoff, commit the freshly
    /// verified tokens at `next_tokens_pos`, advance the approved frontier to
    /// `next_tokens_pos + next_tokens.len()`, hand the turn back, and return
    /// the candidate tail starting at `n_accepted - 1` (the anchor) for the
    /// next verify step. Returns `None` once the request is done.
    pub fn exchange_verified(
        &self,
        next_tokens_pos: usize,
        next_tokens: &[Token],
        n_accepted: usize,
    ) -> Option<Vec<Token>> {
        let mut shared = self.lock();
        while !matches!(shared.turn, Turn::Target | Turn::Done) {
            shared = self
                .turn_changed
                .wait(shared)
                .unwrap_or_else(|e| e.into_inner());
        }
        if shared.turn == Turn::Done {
            return None;
        }
        shared.ledger.commit(next_tokens_pos, next_tokens);
        let tail = shared.ledger.tail_from(n_accepted - 1);
        shared.turn = Turn::Drafter;
        self.turn_changed.notify_all();
        Some(tail)
    }

    /// Terminal transition: wake both actors, no further mutation.
    pub fn finish(&self) {
        let mut shared = self.lock();
        shared.turn = Turn::Done;
        self.turn_changed.notify_all();
    }

    /// Whether the request has finished.
    pub fn is_done(&self) -> bool {
        self.lock().turn == Turn::Done
    }

    /// Observe the current state without taking a turn.
    pub fn snapshot(&self) -> CandidateSnapshot {
        let shared = self.lock();
        CandidateSnapshot {
            tokens: shared.ledger.tokens().to_vec(),
            n_approved: shared.ledger.n_approved(),
            crc32_approved: shared.ledger.crc32_approved(),
            turn: shared.turn,
        }
    }
}

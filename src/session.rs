//! Per-request output mailbox.
//!
//! The generation loop pushes decoded text pieces as the target commits
//! tokens; the response producer blocks on chunk availability and forwards
//! them in order. One mailbox per request, handed explicitly to the
//! generation loop; finite and not restartable.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard};

#[derive(Default)]
struct MailboxState {
    chunks: VecDeque<String>,
    closed: bool,
}

/// Single-slot session record bridging the generation thread and the
/// response stream.
#[derive(Default)]
pub struct Mailbox {
    state: Mutex<MailboxState>,
    available: Condvar,
}

impl Mailbox {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MailboxState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue one output piece. Ignored after close.
    pub fn push(&self, piece: String) {
        let mut state = self.lock();
        if state.closed {
            return;
        }
        state.chunks.push_back(piece);
        self.available.notify_all();
    }

    /// Mark the turn complete; pending chunks stay readable.
    pub fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        self.available.notify_all();
    }

    /// Block until a chunk is available or the mailbox is closed. Returns
    /// `None` exactly once all chunks are drained and the mailbox is closed.
    pub fn next_chunk(&self) -> Option<String> {
        let mut state = self.lock();
        loop {
            if let Some(chunk) = state.chunks.pop_front() {
                return Some(chunk);
            }
            if state.closed {
                return None;
            }
            state = self
                .available
                .wait(state)
                .unwrap_or_else(|e| e.into_inner());
        }
    }

}

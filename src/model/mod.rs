//! The decode-primitive seam.
//!
//! The tensor runtime is an external collaborator: the coordinator, drafter,
//! and verifier only ever talk to a [`LanguageModel`]. The contract mirrors
//! a cached autoregressive decoder: feed a batch of tokens at consecutive
//! positions, read greedy continuations at the positions you asked logits
//! for, and trim the cache when a prefix is no longer trusted.
//!
//! The crate ships one real implementation, [`NgramLm`], a corpus-backed
//! pattern-reuse model that runs without weights or a GPU.

pub mod codec;
pub mod ngram;

pub use codec::{ByteCodec, TextCodec};
pub use ngram::NgramLm;

use crate::error::Result;

/// An opaque token identifier from a fixed vocabulary.
pub type Token = u32;

/// Which positions of a decode batch produce logits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogitMode {
    /// Only the final position. Used for prefill and single-token extension.
    Last,
    /// Every position. Used by the verifier to check a whole tail at once.
    All,
}

/// A greedy autoregressive decoder with a position-indexed KV cache.
///
/// Cache contract: the implementation holds attention state for positions
/// `[0, n_cached())` and a decode batch must start exactly at `n_cached()`;
/// anything else is a [`crate::Error::CachePosition`] error. This is the
/// invariant whose violation silently corrupts output in systems that do
/// not check it.
pub trait LanguageModel: Send {
    /// Feed `tokens` at positions `[first_pos, first_pos + tokens.len())`
    /// and return the greedy continuation at each requested position: one
    /// token for [`LogitMode::Last`], one per input position for
    /// [`LogitMode::All`] (the entry for position `p` is the argmax
    /// prediction for position `p + 1`).
    fn decode(&mut self, tokens: &[Token], first_pos: usize, mode: LogitMode) -> Result<Vec<Token>>;

    /// Drop cached attention state for positions `>= pos`.
    fn forget_from(&mut self, pos: usize);

    /// Number of positions currently cached.
    fn n_cached(&self) -> usize;

    /// Whether this token ends generation.
    fn is_eog(&self, token: Token) -> bool;

    /// Vocabulary size.
    fn n_vocab(&self) -> usize;
}

impl LanguageModel for Box<dyn LanguageModel> {
    fn decode(&mut self, tokens: &[Token], first_pos: usize, mode: LogitMode) -> Result<Vec<Token>> {
        (**self).decode(tokens, first_pos, mode)
    }

    fn forget_from(&mut self, pos: usize) {
        (**self).forget_from(pos);
    }

    fn n_cached(&self) -> usize {
        (**self).n_cached()
    }

    fn is_eog(&self, token: Token) -> bool {
        (**self).is_eog(token)
    }

    fn n_vocab(&self) -> usize {
        (**self).n_vocab()
    }
}

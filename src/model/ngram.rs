//! Corpus-backed n-gram reference model.
//!
//! A deterministic greedy decoder that needs no weights: the continuation
//! for a context is whatever followed the longest matching suffix earlier in
//! the context itself (pattern reuse), falling back to the loaded corpus,
//! falling back to the corpus's most frequent token. Useful as a drafter
//! against a real target, and as the stand-in backend for smoke runs and
//! end-to-end tests.
//!
//! The KV-cache contract is enforced literally: the "cache" is the token
//! context itself, batches must start at the cached length, and
//! [`forget_from`](crate::model::LanguageModel::forget_from) truncates it.

use std::collections::HashMap;
use std::path::Path;

use super::{ByteCodec, LanguageModel, LogitMode, TextCodec, Token};
use crate::error::{Error, Result};

/// Deterministic n-gram language model over an in-memory corpus.
#[derive(Debug)]
pub struct NgramLm {
    corpus: Vec<Token>,
    /// Longest suffix length considered for a match.
    order: usize,
    eog: Token,
    n_vocab: usize,
    /// Most frequent corpus token, smallest id on ties; `eog` if empty.
    fallback: Token,
    /// Decoded context; doubles as the position-indexed cache.
    ctx: Vec<Token>,
}

impl NgramLm {
    /// Suffix length that balances hit rate and specificity for byte-level
    /// corpora.
    pub const DEFAULT_ORDER: usize = 4;

    /// Build a model from an already-tokenized corpus.
    pub fn from_corpus(
        corpus: Vec<Token>,
        order: usize,
        eog: Token,
        n_vocab: usize,
    ) -> Result<Self> {
        if order == 0 {
            return Err(Error::Config("n-gram order must be at least 1".into()));
        }
        let mut counts: HashMap<Token, usize> = HashMap::new();
        for &token in &corpus {
            *counts.entry(token).or_default() += 1;
        }
        let fallback = counts
            .into_iter()
            .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
            .map_or(eog, |(token, _)| token);
        Ok(Self {
            corpus,
            order,
            eog,
            n_vocab,
            fallback,
            ctx: Vec::new(),
        })
    }

    /// Load a byte-level model from a corpus file.
    pub fn open(path: impl AsRef<Path>, order: usize) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::ModelLoad(format!("{}: {e}", path.display())))?;
        let corpus = ByteCodec::encode_raw(&text);
        Self::from_corpus(corpus, order, ByteCodec.eog(), ByteCodec.n_vocab())
    }

    /// Greedy prediction for the position after `window = ctx[..upto]`.
    fn predict(&self, upto: usize) -> Token {
        let window = &self.ctx[..upto];
        for k in (1..=self.order.min(upto)).rev() {
            let suffix = &window[upto - k..];
            // Pattern reuse within the live context first, earliest match.
            if let Some(t) = follow_match(window, suffix, upto - k) {
                return t;
            }
            if let Some(t) = follow_match(&self.corpus, suffix, self.corpus.len()) {
                return t;
            }
        }
        self.fallback
    }
}

/// Earliest occurrence of `suffix` in `haystack[..limit]` that has a
/// following token; returns that token.
fn follow_match(haystack: &[Token], suffix: &[Token], limit: usize) -> Option<Token> {
    let k = suffix.len();
    let scan_end = limit.min(haystack.len().saturating_sub(k));
    for j in 0..scan_end {
        if &haystack[j..j + k] == suffix {
            return Some(haystack[j + k]);
        }
    }
    None
}

impl LanguageModel for NgramLm {
    fn decode(&mut self, tokens: &[Token], first_pos: usize, mode: LogitMode) -> Result<Vec<Token>> {
        if tokens.is_empty() {
            return Err(Error::Decode("empty decode batch".into()));
        }
        if first_pos != self.ctx.len() {
            return Err(Error::CachePosition {
                expected: self.ctx.len(),
                got: first_pos,
            });
        }
        self.ctx.extend_from_slice(tokens);
        let out = match mode {
            LogitMode::Last => vec![self.predict(self.ctx.len())],
            LogitMode::All => (first_pos..self.ctx.len())
                .map(|p| self.predict(p + 1))
                .collect(),
        };
        Ok(out)
    }

    fn forget_from(&mut self, pos: usize) {
        self.ctx.truncate(pos);
    }

    fn n_cached(&self) -> usize {
        self.ctx.len()
    }

    fn is_eog(&self, token: Token) -> bool {
        token == self.eog
    }

    fn n_vocab(&self) -> usize {
        self.n_vocab
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(corpus: &[Token]) -> NgramLm {
        NgramLm::from_corpus(corpus.to_vec(), 3, 257, 258).unwrap()
    }

    #[test]
    fn test_zero_order_rejected() {
        assert!(NgramLm::from_corpus(vec![1], 0, 257, 258).is_err());
    }

    #[test]
    fn test_corpus_continuation() {
        // Corpus knows "1 2 -> 3".
        let mut lm = model(&[1, 2, 3, 4]);
        let out = lm.decode(&[1, 2], 0, LogitMode::Last).unwrap();
        assert_eq!(out, vec![3]);
    }

    #[test]
    fn test_context_pattern_beats_corpus() {
        // Corpus says 1 2 -> 3, but the live context already saw 1 2 -> 9.
        let mut lm = model(&[1, 2, 3]);
        let out = lm.decode(&[1, 2, 9, 1, 2], 0, LogitMode::Last).unwrap();
        assert_eq!(out, vec![9]);
    }

    #[test]
    fn test_fallback_most_frequent() {
        let mut lm = model(&[5, 5, 5, 8]);
        let out = lm.decode(&[42], 0, LogitMode::Last).unwrap();
        assert_eq!(out, vec![5]);
    }

    #[test]
    fn test_all_mode_predicts_each_position() {
        let mut lm = model(&[1, 2, 3, 4]);
        // Position 0 sees [1] -> 2, position 1 sees [1, 2] -> 3.
        let out = lm.decode(&[1, 2], 0, LogitMode::All).unwrap();
        assert_eq!(out, vec![2, 3]);
    }

    #[test]
    fn test_cache_position_enforced() {
        let mut lm = model(&[1, 2]);
        lm.decode(&[1], 0, LogitMode::Last).unwrap();
        let err = lm.decode(&[2], 5, LogitMode::Last).unwrap_err();
        assert!(matches!(
            err,
            Error::CachePosition {
                expected: 1,
                got: 5
            }
        ));
    }

    #[test]
    fn test_forget_from_trims_cache() {
        let mut lm = model(&[1, 2, 3]);
        lm.decode(&[1, 2, 3], 0, LogitMode::Last).unwrap();
        assert_eq!(lm.n_cached(), 3);
        lm.forget_from(1);
        assert_eq!(lm.n_cached(), 1);
        // Decoding resumes at the trimmed position.
        lm.decode(&[7, 8], 1, LogitMode::Last).unwrap();
        assert_eq!(lm.n_cached(), 3);
    }

    #[test]
    fn test_determinism() {
        let mut a = model(&[1, 2, 3, 1, 2, 4]);
        let mut b = model(&[1, 2, 3, 1, 2, 4]);
        let out_a = a.decode(&[1, 2, 3, 1, 2], 0, LogitMode::All).unwrap();
        let out_b = b.decode(&[1, 2, 3, 1, 2], 0, LogitMode::All).unwrap();
        assert_eq!(out_a, out_b);
    }

    #[test]
    fn test_open_missing_file_is_model_load_error() {
        let err = NgramLm::open("/nonexistent/corpus.txt", 3).unwrap_err();
        assert!(matches!(err, Error::ModelLoad(_)));
    }
}

//! The tokenizer seam.
//!
//! Real deployments bring their own tokenizer; the engines only need
//! encode/decode plus the two sentinel tokens. [`ByteCodec`] is the in-crate
//! reference: one token per byte, with begin-of-sequence and
//! end-of-generation sentinels above the byte range.

use super::Token;

/// Text-to-token codec contract.
pub trait TextCodec: Send + Sync {
    /// Tokenize `text` with the beginning-of-sequence marker prepended.
    fn encode(&self, text: &str) -> Vec<Token>;

    /// Render a token sequence back to text, skipping sentinels.
    fn decode(&self, tokens: &[Token]) -> String;

    /// Begin-of-sequence token.
    fn bos(&self) -> Token;

    /// End-of-generation token.
    fn eog(&self) -> Token;

    /// Vocabulary size, sentinels included.
    fn n_vocab(&self) -> usize;
}

/// Byte-level reference codec: tokens 0..=255 are raw bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ByteCodec;

impl ByteCodec {
    /// Begin-of-sequence sentinel.
    pub const BOS: Token = 256;
    /// End-of-generation sentinel.
    pub const EOG: Token = 257;

    /// Tokenize without the beginning-of-sequence marker.
    pub fn encode_raw(text: &str) -> Vec<Token> {
        text.bytes().map(Token::from).collect()
    }
}

impl TextCodec for ByteCodec {
    fn encode(&self, text: &str) -> Vec<Token> {
        let mut tokens = Vec::with_capacity(text.len() + 1);
        tokens.push(Self::BOS);
        tokens.extend(text.bytes().map(Token::from));
        tokens
    }

    fn decode(&self, tokens: &[Token]) -> String {
        let bytes: Vec<u8> = tokens
            .iter()
            .filter(|&&t| t < 256)
            .map(|&t| t as u8)
            .collect();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    fn bos(&self) -> Token {
        Self::BOS
    }

    fn eog(&self) -> Token {
        Self::EOG
    }

    fn n_vocab(&self) -> usize {
        258
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_prepends_bos() {
        let tokens = ByteCodec.encode("ab");
        assert_eq!(tokens, vec![ByteCodec::BOS, 97, 98]);
    }

    #[test]
    fn test_decode_skips_sentinels() {
        let text = ByteCodec.decode(&[ByteCodec::BOS, 104, 105, ByteCodec::EOG]);
        assert_eq!(text, "hi");
    }

    #[test]
    fn test_text_round_trip() {
        let text = "hello, world";
        let tokens = ByteCodec.encode(text);
        assert_eq!(ByteCodec.decode(&tokens), text);
    }

    #[test]
    fn test_encode_raw_has_no_bos() {
        assert_eq!(ByteCodec::encode_raw("a"), vec![97]);
    }
}

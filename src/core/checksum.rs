//! Token-range fingerprinting.
//!
//! Both sides of the delta-sync protocol identify an approved prefix by a
//! CRC-32 checksum instead of retransmitting it. The checksum is computed
//! over the little-endian byte serialization of each token id in order, so
//! two peers agree on the fingerprint iff they agree on the token sequence.

use crate::model::Token;

/// CRC-32 (reflected polynomial 0xEDB88320) of a token range.
pub fn token_crc32(tokens: &[Token]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    for token in tokens {
        hasher.update(&token.to_le_bytes());
    }
    hasher.finalize()
}

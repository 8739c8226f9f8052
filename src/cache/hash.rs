//! Hash utilities for content-based change classification.
//!
//! This module provides fast, non-cryptographic hash functions used to
//! fingerprint document content, both whole-document and per-line.

/// Compute FNV-1a 64-bit hash of text content.
///
/// FNV-1a (Fowler-Noll-Vo) is a fast, non-cryptographic hash function with
/// good distribution properties. It's suitable for:
/// - Content-based cache keys
/// - Change detection
/// - Deduplication
///
/// **Not suitable for**:
/// - Adversarial collision resistance (use SipHash)
/// - Cryptographic purposes (use SHA-256, etc.)
///
/// # Example
///
/// ```
/// use shirabe::cache::fnv1a_hash;
///
/// let hash1 = fnv1a_hash("hello world");
/// let hash2 = fnv1a_hash("hello world");
/// let hash3 = fnv1a_hash("different");
///
/// assert_eq!(hash1, hash2);
/// assert_ne!(hash1, hash3);
/// ```
#[inline]
pub fn fnv1a_hash(text: &str) -> u64 {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;

    let mut hash = FNV_OFFSET;
    for byte in text.bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Per-line fingerprints with trailing whitespace stripped from each line.
///
/// Two documents with equal line counts and equal fingerprints differ at most
/// in trailing whitespace, which cannot affect analysis results. Line endings
/// are normalized by the strip, so CRLF and LF content fingerprint alike.
pub fn line_hashes(text: &str) -> Vec<u64> {
    text.lines().map(|line| fnv1a_hash(line.trim_end())).collect()
}

//! Text decoding with an ordered fallback chain.
//!
//! Span text coming out of a decoder is usually already a string, but raw
//! byte sequences still show up (fonts without a usable encoding, byte
//! arrays in structured dumps). Decoding never fails: each step of the chain
//! is tried in order and the result records which one produced the text.

use std::borrow::Cow;

use unicode_normalization::UnicodeNormalization;

/// Outcome of decoding a byte sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedText {
    /// Decoded with the primary encoding (UTF-8, or UTF-16BE with a BOM).
    Primary(String),
    /// Decoded with the byte-preserving Latin-1 fallback.
    Fallback(String),
    /// Coerced with replacement characters; some input was lost.
    Degraded(String),
}

impl DecodedText {
    /// Borrow the decoded text.
    pub fn as_str(&self) -> &str {
        match self {
            DecodedText::Primary(s) | DecodedText::Fallback(s) | DecodedText::Degraded(s) => s,
        }
    }

    /// Consume and return the decoded text.
    pub fn into_string(self) -> String {
        match self {
            DecodedText::Primary(s) | DecodedText::Fallback(s) | DecodedText::Degraded(s) => s,
        }
    }

    /// Whether the primary encoding succeeded.
    pub fn is_primary(&self) -> bool {
        matches!(self, DecodedText::Primary(_))
    }
}

/// Decode raw span bytes.
///
/// Order: UTF-16BE (only when the `FE FF` byte order mark is present),
/// then UTF-8, then Latin-1. A BOM-marked sequence that is not valid UTF-16
/// is coerced lossily and reported as [`DecodedText::Degraded`].
pub fn decode_bytes(bytes: &[u8]) -> DecodedText {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let payload = &bytes[2..];
        let units: Vec<u16> = payload
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        return match String::from_utf16(&units) {
            Ok(s) if payload.len() % 2 == 0 => DecodedText::Primary(s),
            _ => DecodedText::Degraded(String::from_utf16_lossy(&units)),
        };
    }

    match std::str::from_utf8(bytes) {
        Ok(s) => DecodedText::Primary(s.to_string()),
        Err(_) => DecodedText::Fallback(bytes.iter().map(|&b| b as char).collect()),
    }
}

/// Apply NFKC normalization (ligatures, full-width forms, compatibility
/// characters) to decoded span text.
pub fn normalize(text: &str) -> Cow<'_, str> {
    if text.is_ascii() {
        Cow::Borrowed(text)
    } else {
        Cow::Owned(text.nfkc().collect())
    }
}

//! Charset detection for legacy OpenVPN config files.
//!
//! [`detect`] infers the byte encoding of a text blob. Checks are ordered by
//! how much they can be trusted:
//!
//! 1. an explicit override, returned verbatim;
//! 2. strict UTF-8 (every byte sequence valid, no U+FFFD);
//! 3. statistically scored legacy Cyrillic charsets;
//! 4. an external oracle (`file -bi`);
//! 5. the hard default, windows-1251.
//!
//! Detection never fails. The result is a [`CharsetChoice`] that records which
//! step produced it; [`CharsetChoice::encoding`] resolves it to an
//! `encoding_rs` encoding.

mod oracle;

use std::borrow::Cow;
use std::fmt;

use encoding_rs::{
    Encoding, IBM866_INIT, KOI8_R_INIT, UTF_8, UTF_8_INIT, WINDOWS_1251_INIT, WINDOWS_1252_INIT,
};

pub use oracle::{parse_charset_token, CharsetOracle, FileCommandOracle, NoOracle};

// ---------------------------------------------------------------------------
// Charset tables
// ---------------------------------------------------------------------------

/// Used when nothing else qualifies.
pub static DEFAULT_ENCODING: &Encoding = &WINDOWS_1251_INIT;

/// Legacy candidates, scored in this order; ties keep the earlier one.
pub static LEGACY_CANDIDATES: [&Encoding; 3] = [&WINDOWS_1251_INIT, &KOI8_R_INIT, &IBM866_INIT];

/// Decode order tried when the detected charset leaves replacement characters.
/// The last entry (ISO-8859-1, mapped to windows-1252) accepts any byte.
pub static READ_FALLBACKS: [&Encoding; 5] = [
    &UTF_8_INIT,
    &WINDOWS_1251_INIT,
    &KOI8_R_INIT,
    &IBM866_INIT,
    &WINDOWS_1252_INIT,
];

const REPLACEMENT: char = '\u{FFFD}';

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Which detection step produced a [`CharsetChoice`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectionSource {
    Override,
    Utf8,
    /// Best-scoring legacy candidate.
    Scored { score: u64 },
    Oracle,
    Default,
}

/// Result of charset detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharsetChoice {
    /// Charset label. Verbatim for overrides and oracle answers, the
    /// `encoding_rs` canonical name otherwise.
    pub label: String,
    pub source: DetectionSource,
}

impl CharsetChoice {
    fn known(encoding: &'static Encoding, source: DetectionSource) -> Self {
        Self {
            label: encoding.name().to_string(),
            source,
        }
    }

    /// The encoding named by `label`, if `encoding_rs` knows it.
    pub fn resolve(&self) -> Option<&'static Encoding> {
        resolve_label(&self.label)
    }

    /// The encoding named by `label`, or [`DEFAULT_ENCODING`] for unknown labels.
    pub fn encoding(&self) -> &'static Encoding {
        self.resolve().unwrap_or_else(|| {
            tracing::warn!(
                label = %self.label,
                fallback = DEFAULT_ENCODING.name(),
                "unknown charset label, using default"
            );
            DEFAULT_ENCODING
        })
    }
}

impl fmt::Display for CharsetChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            DetectionSource::Override => write!(f, "{} (explicit)", self.label),
            DetectionSource::Utf8 => write!(f, "{} (valid UTF-8)", self.label),
            DetectionSource::Scored { score } => write!(f, "{} (score {score})", self.label),
            DetectionSource::Oracle => write!(f, "{} (file utility)", self.label),
            DetectionSource::Default => write!(f, "{} (default)", self.label),
        }
    }
}

/// Character statistics for one candidate decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextStats {
    /// Characters in U+0400..=U+04FF.
    pub cyrillic: u64,
    /// Printable ASCII, U+0020..=U+007E.
    pub printable_ascii: u64,
    pub total: u64,
}

impl TextStats {
    pub fn of(text: &str) -> Self {
        let mut stats = Self::default();
        for c in text.chars() {
            stats.total += 1;
            if ('\u{0400}'..='\u{04FF}').contains(&c) {
                stats.cyrillic += 1;
            } else if (' '..='~').contains(&c) {
                stats.printable_ascii += 1;
            }
        }
        stats
    }

    /// `10 × cyrillic + ascii`, or `None` when the text does not look like
    /// Cyrillic prose: no Cyrillic at all, or recognised characters making up
    /// no more than 80% of the text.
    pub fn score(&self) -> Option<u64> {
        let recognised = self.cyrillic + self.printable_ascii;
        // recognised > 0.8 × total, kept in integers.
        if self.cyrillic == 0 || recognised * 5 <= self.total * 4 {
            return None;
        }
        Some(self.cyrillic * 10 + self.printable_ascii)
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Detect the charset of `bytes`, consulting `file -bi` as the last heuristic.
pub fn detect(bytes: &[u8], explicit: Option<&str>) -> CharsetChoice {
    detect_with(bytes, explicit, &FileCommandOracle)
}

/// Detect the charset of `bytes` with a caller-supplied oracle.
///
/// Deterministic for a fixed input and a deterministic oracle.
pub fn detect_with(bytes: &[u8], explicit: Option<&str>, oracle: &dyn CharsetOracle) -> CharsetChoice {
    if let Some(label) = explicit.map(str::trim).filter(|s| !s.is_empty()) {
        tracing::debug!(label, "using explicit charset");
        return CharsetChoice {
            label: label.to_string(),
            source: DetectionSource::Override,
        };
    }

    if is_strict_utf8(bytes) {
        tracing::debug!("content is valid UTF-8");
        return CharsetChoice::known(UTF_8, DetectionSource::Utf8);
    }

    if let Some((encoding, score)) = best_legacy_candidate(bytes) {
        tracing::debug!(charset = encoding.name(), score, "scored legacy charset");
        return CharsetChoice::known(encoding, DetectionSource::Scored { score });
    }

    if let Some(label) = oracle.guess(bytes) {
        tracing::debug!(label = %label, "charset from oracle");
        return CharsetChoice {
            label,
            source: DetectionSource::Oracle,
        };
    }

    tracing::warn!(
        charset = DEFAULT_ENCODING.name(),
        "could not determine charset, using default"
    );
    CharsetChoice::known(DEFAULT_ENCODING, DetectionSource::Default)
}

/// Score every legacy candidate and return the best qualifying one.
pub fn best_legacy_candidate(bytes: &[u8]) -> Option<(&'static Encoding, u64)> {
    let mut best: Option<(&'static Encoding, u64)> = None;
    for &encoding in LEGACY_CANDIDATES.iter() {
        let Some(text) = decode_clean(bytes, encoding) else {
            continue;
        };
        let Some(score) = TextStats::of(&text).score() else {
            continue;
        };
        if best.map_or(true, |(_, top)| score > top) {
            best = Some((encoding, score));
        }
    }
    best
}

/// Decode `bytes`, returning `None` if any replacement character would appear.
pub fn decode_clean<'a>(bytes: &'a [u8], encoding: &'static Encoding) -> Option<Cow<'a, str>> {
    let text = encoding.decode_without_bom_handling_and_without_replacement(bytes)?;
    if text.contains(REPLACEMENT) {
        return None;
    }
    Some(text)
}

/// Decode `bytes`, substituting U+FFFD for malformed sequences.
pub fn decode_lossy<'a>(bytes: &'a [u8], encoding: &'static Encoding) -> Cow<'a, str> {
    encoding.decode_without_bom_handling(bytes).0
}

/// Look up an encoding by any WHATWG label (`"Windows-1251"`, `"cp866"`, …).
pub fn resolve_label(label: &str) -> Option<&'static Encoding> {
    Encoding::for_label(label.trim().as_bytes())
}

/// Whether `text` can be encoded in `encoding` without substitution.
pub fn can_encode(text: &str, encoding: &'static Encoding) -> bool {
    let (_, _, had_unmappable) = encoding.encode(text);
    !had_unmappable
}

fn is_strict_utf8(bytes: &[u8]) -> bool {
    // Valid UTF-8 re-encodes to identical bytes; a literal U+FFFD is still
    // treated as evidence of an earlier lossy conversion.
    matches!(std::str::from_utf8(bytes), Ok(text) if !text.contains(REPLACEMENT))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Track identity normalization shared by the tagger, scorer and catalog index.
//!
//! CRITICAL: catalog keys and local filename stems must normalize the same
//! way, or every track shows up in both reconciliation lists.

use any_ascii::any_ascii;
use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

use crate::error::{Result, TagMateError};
use crate::models::NormalizedIdentity;

// ============================================================================
// REGEX PATTERNS
// ============================================================================

/// Separator between the artist segment and the title segment.
pub const IDENTITY_SEPARATOR: &str = " - ";

/// Characters that cannot appear in a filename stem.
pub const ILLEGAL_FILENAME_CHARS: [char; 9] = ['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// Any parenthesized group (first `)` closes it).
pub static PAREN_GROUP: Lazy<Regex> = Lazy::new(|| Regex::new(r"\([^)]*\)").unwrap());

/// Mix/remix parentheticals in a lowercased title: "(extended mix)", "(someone remix)"
pub static MIX_GROUP: Lazy<Regex> = Lazy::new(|| Regex::new(r"\([^)]*ix[^)]*\)\s*").unwrap());

/// Edit parentheticals in a lowercased title: "(radio edit)"
pub static EDIT_GROUP: Lazy<Regex> = Lazy::new(|| Regex::new(r"\([^)]*edit[^)]*\)\s*").unwrap());

/// Everything a lookup query may not contain
pub static NON_ALPHA: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-zA-Z\s]").unwrap());

pub static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Regex to collapse repeated spaces into a single space
pub static MULTI_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r" {2,}").unwrap());

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Check if a character is a Unicode combining mark (diacritical mark).
pub fn is_combining_mark(c: char) -> bool {
    matches!(c as u32, 0x0300..=0x036F | 0x1AB0..=0x1AFF | 0x1DC0..=0x1DFF | 0xFE20..=0xFE2F)
}

/// Fold Unicode text to lowercase ASCII by applying NFKD decomposition and
/// removing combining marks, then transliterating what is left.
/// e.g., "Beyoncé" → "beyonce", "Röyksopp" → "royksopp"
pub fn fold_to_ascii(s: &str) -> String {
    let stripped: String = s.nfkd().filter(|c| !is_combining_mark(*c)).collect();
    any_ascii(&stripped).to_lowercase()
}

/// Split "artists - title" at the first separator.
pub fn split_identity(raw: &str) -> Result<(&str, &str)> {
    raw.split_once(IDENTITY_SEPARATOR)
        .ok_or_else(|| TagMateError::MalformedIdentity(raw.to_string()))
}

// ============================================================================
// NORMALIZATION FUNCTIONS
// ============================================================================

/// Normalize a raw identity string ("artists - title (version)").
///
/// Fails with [`TagMateError::MalformedIdentity`] when the separator is absent.
pub fn normalize_identity(raw: &str) -> Result<NormalizedIdentity> {
    let (artist, title) = split_identity(raw)?;
    Ok(NormalizedIdentity {
        artist: fold_to_ascii(artist),
        title: clean_title(title),
        version: extract_version(raw),
    })
}

/// Lowercase a title and drop mix/edit parentheticals.
/// e.g., "Title (Extended Mix)" → "title", "Title (Radio Edit)" → "title"
pub fn clean_title(title: &str) -> String {
    let lowered = title.to_lowercase();
    let result = MIX_GROUP.replace_all(&lowered, "");
    let result = EDIT_GROUP.replace_all(&result, "");
    result.trim_end().to_string()
}

/// Find the first parenthesized group naming a Mix or Remix that is not a
/// "feat." credit, and return it without parentheses.
pub fn extract_version(raw: &str) -> Option<String> {
    PAREN_GROUP
        .find_iter(raw)
        .map(|m| m.as_str())
        .find(|group| {
            let content = &group[1..group.len() - 1];
            !content.starts_with("feat.") && (content.contains("Mix") || content.contains("Remix"))
        })
        .map(|group| group.replace(['(', ')'], ""))
}

/// Reduce a track name to letters and single separators for a search query.
/// e.g., format_query("A & B - C (Original Mix)", "+") → "A+B+C+Original+Mix"
pub fn format_query(raw: &str, separator: &str) -> String {
    let letters = NON_ALPHA.replace_all(raw, "");
    let collapsed = WHITESPACE_RUN.replace_all(&letters, " ");
    collapsed.trim().replace(' ', separator)
}

// ============================================================================
// CATALOG KEYS
// ============================================================================

/// Rewrite "Title - Some Remix" into "Title (Some Remix)".
pub fn rewrite_catalog_title(title: &str) -> String {
    if title.contains(IDENTITY_SEPARATOR) {
        format!("{})", title.replace("- ", "("))
    } else {
        title.to_string()
    }
}

/// Remove filesystem-illegal characters and collapse double spaces.
pub fn strip_illegal(s: &str) -> String {
    let cleaned: String = s
        .chars()
        .filter(|c| !ILLEGAL_FILENAME_CHARS.contains(c))
        .collect();
    MULTI_SPACE.replace_all(&cleaned, " ").to_string()
}

/// Build the identity key a local file for this catalog track is named by.
pub fn catalog_key(artists: &[String], title: &str) -> String {
    let joined = format!(
        "{}{}{}",
        artists.join(", "),
        IDENTITY_SEPARATOR,
        rewrite_catalog_title(title)
    );
    strip_illegal(&joined)
}

// ============================================================================
// TESTS
// ============================================================================

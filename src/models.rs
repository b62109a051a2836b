//! Core data models for the tagging pipeline.
//!
//! This module contains the catalog, identity, tag and report types shared
//! by every stage, plus the comment grammar that encodes a file's condition.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::GrammarViolation;

// ============================================================================
// Audio Formats
// ============================================================================

/// Fixed set of formats the pipeline handles, in tagging order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AudioFormat {
    Mp3,
    Aif,
    Wav,
}

impl AudioFormat {
    pub const ALL: [AudioFormat; 3] = [AudioFormat::Mp3, AudioFormat::Aif, AudioFormat::Wav];

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "mp3" => Some(AudioFormat::Mp3),
            "aif" => Some(AudioFormat::Aif),
            "wav" => Some(AudioFormat::Wav),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    pub fn extension(self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Aif => "aif",
            AudioFormat::Wav => "wav",
        }
    }

    pub fn is_compressed(self) -> bool {
        self == AudioFormat::Mp3
    }

    /// Rank when choosing the Primary copy of a group: lower is better.
    pub fn primary_rank(self) -> u8 {
        match self {
            AudioFormat::Aif => 0,
            AudioFormat::Wav => 1,
            AudioFormat::Mp3 => 2,
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

// ============================================================================
// Catalog Models
// ============================================================================

/// Item as yielded by the catalog collaborator (one playlist row).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: String,
    pub title: String,
    pub artists: Vec<String>,
    #[serde(default)]
    pub artwork_url: Option<String>,
    #[serde(default)]
    pub preview_url: Option<String>,
}

/// Catalog metadata for one track, keyed by its canonical identity.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    /// "artists - title" with illegal filename characters stripped
    pub key: String,
    pub artists: Vec<String>,
    /// Title after remix subtitles were rewritten into a parenthetical
    pub title: String,
    pub artwork_url: Option<String>,
    pub preview_url: Option<String>,
    pub external_id: String,
}

impl CatalogEntry {
    pub fn artists_joined(&self) -> String {
        self.artists.join(", ")
    }
}

// ============================================================================
// Identity and Matching
// ============================================================================

/// Comparable form of an "artists - title (version)" string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedIdentity {
    /// Diacritic-folded, lowercased artist segment
    pub artist: String,
    /// Lowercased title with mix/edit parentheticals removed
    pub title: String,
    /// Content of the first "(... Mix)" / "(... Remix)" group, if any
    pub version: Option<String>,
}

impl NormalizedIdentity {
    /// Re-join artist and title into an identity string (version dropped).
    pub fn key(&self) -> String {
        format!("{} - {}", self.artist, self.title)
    }
}

/// Best candidate returned by the metadata-lookup collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupCandidate {
    pub artists: Vec<String>,
    pub title: String,
    /// Mix name, e.g. "Original Mix" or "Someone Remix"
    pub version: String,
    pub genre: String,
    pub label: String,
}

/// Similarity scores (0-100) between a candidate and a local identity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SimilarityResult {
    pub artist: f64,
    pub title: f64,
    pub version: f64,
}

// ============================================================================
// Tags and the Comment Grammar
// ============================================================================

/// Metadata attached to one on-disk file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagBlock {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub genre: Option<String>,
    pub comment: Option<String>,
    #[serde(default)]
    pub artwork: Option<Vec<u8>>,
}

impl TagBlock {
    /// Copy the four text fields from `other`, leaving artwork untouched.
    pub fn copy_text_fields(&mut self, other: &TagBlock) {
        self.title = other.title.clone();
        self.artist = other.artist.clone();
        self.genre = other.genre.clone();
        self.comment = other.comment.clone();
    }
}

/// Classification state of one format copy within a track group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Condition {
    Primary,
    Substitute,
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Primary => f.write_str("Primary"),
            Condition::Substitute => f.write_str("Substitute"),
        }
    }
}

impl FromStr for Condition {
    type Err = GrammarViolation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Primary" => Ok(Condition::Primary),
            "Substitute" => Ok(Condition::Substitute),
            other => Err(GrammarViolation::UnknownCondition(other.to_string())),
        }
    }
}

/// Parsed `/* library [/ condition] [/ label] */` comment.
///
/// A two-segment comment whose second segment is exactly `Primary` or
/// `Substitute` is read as a condition, never as a label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub library: String,
    pub condition: Option<Condition>,
    pub label: Option<String>,
}

impl Comment {
    pub fn new(library: impl Into<String>) -> Self {
        Self {
            library: library.into(),
            condition: None,
            label: None,
        }
    }

    pub fn with_label(library: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            library: library.into(),
            condition: None,
            label: Some(label.into()),
        }
    }

    pub fn parse(raw: &str) -> Result<Self, GrammarViolation> {
        let inner = raw
            .trim()
            .strip_prefix("/*")
            .and_then(|s| s.strip_suffix("*/"))
            .ok_or(GrammarViolation::MissingDelimiters)?;

        // Segments are joined by " / "; a bare '/' belongs to the label
        let inner = inner.trim();
        if inner.starts_with('/') || inner.ends_with('/') {
            return Err(GrammarViolation::EmptySegment);
        }
        let segments: Vec<&str> = inner.split(" / ").map(str::trim).collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(GrammarViolation::EmptySegment);
        }

        match segments.as_slice() {
            [library] => Ok(Comment::new(*library)),
            [library, second] => match second.parse::<Condition>() {
                Ok(condition) => Ok(Comment {
                    library: library.to_string(),
                    condition: Some(condition),
                    label: None,
                }),
                Err(_) => Ok(Comment::with_label(*library, *second)),
            },
            [library, condition, label] => Ok(Comment {
                library: library.to_string(),
                condition: Some(condition.parse()?),
                label: Some(label.to_string()),
            }),
            _ => Err(GrammarViolation::TooManySegments(segments.len())),
        }
    }
}

impl fmt::Display for Comment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/* {}", self.library)?;
        if let Some(condition) = self.condition {
            write!(f, " / {}", condition)?;
        }
        if let Some(label) = &self.label {
            write!(f, " / {}", label)?;
        }
        f.write_str(" */")
    }
}

impl FromStr for Comment {
    type Err = GrammarViolation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Comment::parse(s)
    }
}

// ============================================================================
// Local Collection
// ============================================================================

/// One file of a track group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackFile {
    pub format: AudioFormat,
    pub path: PathBuf,
}

/// Format copies sharing one filename stem. Members are kept in
/// [`AudioFormat::ALL`] order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalTrackGroup {
    pub stem: String,
    pub files: Vec<TrackFile>,
}

impl LocalTrackGroup {
    pub fn new(stem: impl Into<String>) -> Self {
        Self {
            stem: stem.into(),
            files: Vec::new(),
        }
    }

    pub fn push(&mut self, file: TrackFile) {
        self.files.push(file);
        self.files.sort_by_key(|f| f.format);
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn has_format(&self, format: AudioFormat) -> bool {
        self.files.iter().any(|f| f.format == format)
    }

    /// The copy that receives the canonical tags first.
    pub fn tagging_primary(&self) -> Option<&TrackFile> {
        self.files.first()
    }

    /// Every copy except the tagging primary.
    pub fn siblings(&self) -> &[TrackFile] {
        self.files.get(1..).unwrap_or(&[])
    }
}

// ============================================================================
// Reports and Statistics
// ============================================================================

/// One-directional differences between catalog keys and local stems.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationReport {
    pub missing_from_local: Vec<String>,
    pub missing_from_catalog: Vec<String>,
}

/// Counters for one pipeline run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunStats {
    // Tagging
    pub groups_seen: usize,
    pub tagged: usize,
    pub accepted: usize,
    pub manual: usize,
    pub flagged_low_confidence: usize,
    pub lookup_failures: usize,
    pub malformed_identities: usize,
    pub unmatched_catalog: usize,
    pub artwork_failures: usize,
    pub other_failures: usize,

    // Propagation
    pub propagated: usize,
    pub propagation_failures: usize,

    // Classification
    pub primaries: usize,
    pub substitutes: usize,
    pub grammar_violations: usize,
    pub promoted: usize,

    // Reconciliation
    pub missing_from_local: usize,
    pub missing_from_catalog: usize,

    pub elapsed_seconds: f64,
}

impl RunStats {
    /// Log stats to stderr in JSON format
    pub fn log_phase(&self, phase: &str) {
        if let Ok(json) = serde_json::to_string_pretty(self) {
            eprintln!("[STATS:{}]\n{}", phase, json);
        }
    }

    pub fn write_to_file(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comment_add_condition_to_library_only() {
        let mut comment = Comment::parse("/* Lib */").unwrap();
        comment.condition = Some(Condition::Primary);
        assert_eq!(comment.to_string(), "/* Lib / Primary */");
    }

    #[test]
    fn test_comment_add_condition_before_label() {
        let mut comment = Comment::parse("/* Lib / LabelX */").unwrap();
        assert_eq!(comment.label.as_deref(), Some("LabelX"));
        comment.condition = Some(Condition::Substitute);
        assert_eq!(comment.to_string(), "/* Lib / Substitute / LabelX */");
    }

    #[test]
    fn test_comment_reparse_is_lossless() {
        let parsed = Comment::parse("/* Lib / Substitute / LabelX */").unwrap();
        assert_eq!(parsed.library, "Lib");
        assert_eq!(parsed.condition, Some(Condition::Substitute));
        assert_eq!(parsed.label.as_deref(), Some("LabelX"));

        let parsed = Comment::parse("/* Lib / Primary */").unwrap();
        assert_eq!(parsed.condition, Some(Condition::Primary));
        assert_eq!(parsed.label, None);
    }

    #[test]
    fn test_comment_label_may_contain_slash() {
        let comment = Comment::with_label("Lib", "Armada/Kontor");
        assert_eq!(comment.to_string(), "/* Lib / Armada/Kontor */");

        let parsed = Comment::parse("/* Lib / Armada/Kontor */").unwrap();
        assert_eq!(parsed, comment);

        let parsed = Comment::parse("/* Lib / Substitute / Armada/Kontor */").unwrap();
        assert_eq!(parsed.condition, Some(Condition::Substitute));
        assert_eq!(parsed.label.as_deref(), Some("Armada/Kontor"));
    }

    #[test]
    fn test_comment_violations() {
        assert_eq!(
            Comment::parse("no delimiters"),
            Err(GrammarViolation::MissingDelimiters)
        );
        assert_eq!(Comment::parse("/* */"), Err(GrammarViolation::EmptySegment));
        assert_eq!(Comment::parse("/* Lib / */"), Err(GrammarViolation::EmptySegment));
        assert_eq!(
            Comment::parse("/* Lib /  / Label */"),
            Err(GrammarViolation::EmptySegment)
        );
        assert_eq!(
            Comment::parse("/* Lib / Maybe / Label */"),
            Err(GrammarViolation::UnknownCondition("Maybe".to_string()))
        );
        assert_eq!(
            Comment::parse("/* a / b / c / d */"),
            Err(GrammarViolation::TooManySegments(4))
        );
    }

    #[test]
    fn test_group_orders_members_by_format() {
        let mut group = LocalTrackGroup::new("A - B");
        group.push(TrackFile {
            format: AudioFormat::Wav,
            path: PathBuf::from("A - B.wav"),
        });
        group.push(TrackFile {
            format: AudioFormat::Mp3,
            path: PathBuf::from("A - B.mp3"),
        });
        assert_eq!(group.tagging_primary().unwrap().format, AudioFormat::Mp3);
        assert_eq!(group.siblings().len(), 1);
        assert_eq!(group.siblings()[0].format, AudioFormat::Wav);
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(AudioFormat::from_extension("MP3"), Some(AudioFormat::Mp3));
        assert_eq!(AudioFormat::from_extension("flac"), None);
        assert!(AudioFormat::Mp3.is_compressed());
        assert!(!AudioFormat::Aif.is_compressed());
    }
}

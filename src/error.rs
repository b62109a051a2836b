//! Error taxonomy for the tagging pipeline.
//!
//! Per-file failures carry enough context (stem, path, url) to be reported
//! without aborting the batch. Low-confidence lookups are not errors: see
//! [`crate::scoring::MatchDecision`].

use std::path::PathBuf;

use thiserror::Error;

use crate::models::Condition;

/// Result type for library operations
pub type Result<T> = std::result::Result<T, TagMateError>;

#[derive(Error, Debug)]
pub enum TagMateError {
    /// Track identity lacks the `" - "` separator between artists and title
    #[error("malformed track identity '{0}': missing ' - ' separator")]
    MalformedIdentity(String),

    /// Metadata lookup errored or returned data that could not be decoded
    #[error("metadata lookup failed for '{track}': {reason}")]
    RemoteLookupFailure { track: String, reason: String },

    /// Stored comment does not follow `/* library [/ condition] [/ label] */`
    #[error("comment grammar violation in {}: {violation}", path.display())]
    CommentGrammar {
        path: PathBuf,
        violation: GrammarViolation,
    },

    #[error("artwork fetch failed for {url}: {reason}")]
    ArtworkFetch { url: String, reason: String },

    /// Tag container could not be read or persisted
    #[error("tag container error for {}: {reason}", path.display())]
    Tag { path: PathBuf, reason: String },

    #[error("genre selection failed for '{track}': {reason}")]
    Selection { track: String, reason: String },

    #[error("catalog error: {0}")]
    Catalog(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TagMateError {
    pub fn tag(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        TagMateError::Tag {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn lookup(track: impl Into<String>, reason: impl ToString) -> Self {
        TagMateError::RemoteLookupFailure {
            track: track.into(),
            reason: reason.to_string(),
        }
    }
}

/// Ways a comment can fail the classification grammar.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GrammarViolation {
    #[error("comment is not wrapped in '/* ... */'")]
    MissingDelimiters,

    #[error("comment has an empty segment")]
    EmptySegment,

    #[error("'{0}' is not a condition (expected Primary or Substitute)")]
    UnknownCondition(String),

    #[error("comment has {0} segments, at most 3 are allowed")]
    TooManySegments(usize),

    #[error("library segment is '{found}', expected '{expected}'")]
    LibraryMismatch { expected: String, found: String },

    #[error("comment already carries condition {0}")]
    AlreadyClassified(Condition),
}

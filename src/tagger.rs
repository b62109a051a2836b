//! Tag propagation: writes the canonical tag block to one format copy of
//! each track group, then mirrors it to the sibling copies.
//!
//! Per-group failures (lookup errors, malformed names, unreadable
//! containers, artwork) are logged and counted; the batch continues.
//! Only a selection front end that has gone away stops the run.

use log::{debug, error, info, warn};
use std::path::Path;

use crate::artwork::{stage_artwork, ArtworkFetcher};
use crate::catalog::CatalogIndex;
use crate::error::{Result, TagMateError};
use crate::library::Layout;
use crate::lookup::MetadataLookup;
use crate::models::{Comment, LocalTrackGroup, RunStats, TagBlock, TrackFile};
use crate::normalize::{format_query, normalize_identity, split_identity};
use crate::progress::PhaseProgress;
use crate::safety::relocate;
use crate::scoring::{decide, score_candidate, MatchDecision};
use crate::selection::SelectionProvider;
use crate::tags::TagStore;

/// Genre written to files whose automatic match failed the confidence gate
pub const PLACEHOLDER_GENRE: &str = "Unknown";

/// Default separator between words of a lookup query
pub const DEFAULT_QUERY_SEPARATOR: &str = "+";

/// Where the genre (and label) of a group comes from.
pub enum GenreResolver<'a> {
    Manual(&'a mut dyn SelectionProvider),
    Automatic(&'a dyn MetadataLookup),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagOutcome {
    /// Tags written; `matched_catalog` is false when title and artist came
    /// from the filename
    Tagged { matched_catalog: bool },
    /// Tagged with placeholder metadata, group belongs in the mismatch area
    Flagged,
}

/// Result of propagating one primary copy to its siblings.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Propagation {
    pub copied: usize,
    pub failed: usize,
}

#[derive(Debug, Default)]
pub struct TagRunReport {
    /// Stems tagged from their filename, or skipped as malformed
    pub unmatched: Vec<String>,
    /// Stems moved to the mismatch area
    pub flagged: Vec<String>,
    /// (stem, error) for every group that could not be tagged
    pub failures: Vec<(String, String)>,
}

pub struct Tagger<'a> {
    library: String,
    query_separator: String,
    layout: &'a Layout,
    tags: &'a dyn TagStore,
    artwork: &'a dyn ArtworkFetcher,
    resolver: GenreResolver<'a>,
}

impl<'a> Tagger<'a> {
    pub fn new(
        library: impl Into<String>,
        layout: &'a Layout,
        tags: &'a dyn TagStore,
        artwork: &'a dyn ArtworkFetcher,
        resolver: GenreResolver<'a>,
    ) -> Self {
        Self {
            library: library.into(),
            query_separator: DEFAULT_QUERY_SEPARATOR.to_string(),
            layout,
            tags,
            artwork,
            resolver,
        }
    }

    pub fn with_query_separator(mut self, separator: impl Into<String>) -> Self {
        self.query_separator = separator.into();
        self
    }

    /// Resolve genre and comment for a group, and whether it must be flagged.
    fn resolve_genre(
        &mut self,
        stem: &str,
        preview_url: Option<&str>,
        stats: &mut RunStats,
    ) -> Result<(String, Comment, bool)> {
        match &mut self.resolver {
            GenreResolver::Manual(provider) => {
                let genre = provider.select_genre(stem, preview_url)?;
                stats.manual += 1;
                Ok((genre, Comment::new(&self.library), false))
            }
            GenreResolver::Automatic(lookup) => {
                let local = normalize_identity(stem)?;
                let query = format_query(stem, &self.query_separator);
                let candidate = lookup.lookup(&query)?;
                let scores = score_candidate(&candidate, &local);
                debug!(
                    "{}: artist {:.1}, title {:.1}, version {:.1}",
                    stem, scores.artist, scores.title, scores.version
                );

                match decide(&scores) {
                    MatchDecision::Accepted => {
                        stats.accepted += 1;
                        Ok((
                            candidate.genre,
                            Comment::with_label(&self.library, candidate.label),
                            false,
                        ))
                    }
                    MatchDecision::LowConfidence => {
                        warn!(
                            "Low-confidence match for '{}' (artist {:.0}, title {:.0}, version {:.0})",
                            stem, scores.artist, scores.title, scores.version
                        );
                        stats.flagged_low_confidence += 1;
                        Ok((
                            PLACEHOLDER_GENRE.to_string(),
                            Comment::new(&self.library),
                            true,
                        ))
                    }
                }
            }
        }
    }

    /// Tag the primary copy of `group` and mirror it to the siblings.
    pub fn tag_group(
        &mut self,
        group: &LocalTrackGroup,
        index: &CatalogIndex,
        stats: &mut RunStats,
    ) -> Result<TagOutcome> {
        let primary = group
            .tagging_primary()
            .ok_or_else(|| TagMateError::tag(&group.stem, "group has no files"))?;
        let entry = index.get(&group.stem);

        let (title, artist) = match entry {
            Some(entry) => (entry.title.clone(), entry.artists_joined()),
            None => {
                let (artist, title) = split_identity(&group.stem)?;
                (title.to_string(), artist.to_string())
            }
        };

        let preview_url = entry.and_then(|e| e.preview_url.as_deref());
        let (genre, comment, flagged) = self.resolve_genre(&group.stem, preview_url, stats)?;

        let mut block = self.tags.read(&primary.path)?;
        block.copy_text_fields(&TagBlock {
            title: Some(title),
            artist: Some(artist),
            genre: Some(genre),
            comment: Some(comment.to_string()),
            artwork: None,
        });
        self.tags.persist(&primary.path, &block)?;

        if let Some(url) = entry.and_then(|e| e.artwork_url.as_deref()) {
            if let Err(e) = self.embed_artwork(&primary.path, url) {
                warn!("Artwork skipped for '{}': {}", group.stem, e);
                stats.artwork_failures += 1;
            }
        }

        let propagation = self.propagate(&primary.path, group.siblings())?;
        stats.propagated += propagation.copied;
        stats.propagation_failures += propagation.failed;

        if flagged {
            Ok(TagOutcome::Flagged)
        } else {
            Ok(TagOutcome::Tagged {
                matched_catalog: entry.is_some(),
            })
        }
    }

    fn embed_artwork(&self, path: &Path, url: &str) -> Result<()> {
        // Staged file is removed when `staged` drops
        let staged = stage_artwork(self.artwork, url)?;
        self.tags.embed_artwork(path, &staged.read()?)
    }

    /// Copy title, artist, genre and comment of `primary` to every sibling,
    /// with its artwork when the sibling's container accepts it.
    pub fn propagate(&self, primary: &Path, siblings: &[TrackFile]) -> Result<Propagation> {
        let source = self.tags.read(primary)?;
        let mut result = Propagation::default();

        for sibling in siblings {
            let written = self.tags.read(&sibling.path).and_then(|mut block| {
                block.copy_text_fields(&source);
                self.tags.persist(&sibling.path, &block)
            });
            if let Err(e) = written {
                warn!("Could not propagate tags to {}: {}", sibling.path.display(), e);
                result.failed += 1;
                continue;
            }

            if let Some(image) = &source.artwork {
                if let Err(e) = self.tags.embed_artwork(&sibling.path, image) {
                    debug!("No artwork for {} ({})", sibling.path.display(), e);
                }
            }
            result.copied += 1;
        }
        Ok(result)
    }

    /// Remove the comment of a flagged file stuck in the working set, so the
    /// classifier reports it and it is never promoted.
    fn hold_back(&self, path: &Path) {
        let cleared = self.tags.read(path).and_then(|mut block| {
            block.comment = None;
            self.tags.persist(path, &block)
        });
        match cleared {
            Ok(()) => warn!("{} stays in the working set unclassified", path.display()),
            Err(e) => error!("Could not clear the comment of {}: {}", path.display(), e),
        }
    }

    /// Tag every group, moving flagged groups to the mismatch area.
    pub fn run(
        &mut self,
        groups: &[LocalTrackGroup],
        index: &CatalogIndex,
        stats: &mut RunStats,
    ) -> anyhow::Result<TagRunReport> {
        let mut report = TagRunReport::default();
        let progress = PhaseProgress::start("tag", groups.len(), 50);

        for group in groups {
            stats.groups_seen += 1;
            match self.tag_group(group, index, stats) {
                Ok(TagOutcome::Tagged { matched_catalog }) => {
                    stats.tagged += 1;
                    if !matched_catalog {
                        info!("'{}' is not in the catalog, tagged from its filename", group.stem);
                        stats.unmatched_catalog += 1;
                        report.unmatched.push(group.stem.clone());
                    }
                }
                Ok(TagOutcome::Flagged) => {
                    stats.tagged += 1;
                    for file in &group.files {
                        if let Err(e) = relocate(&file.path, &self.layout.mismatch) {
                            warn!("Could not move {} to the mismatch area: {:#}", file.path.display(), e);
                            report.failures.push((group.stem.clone(), e.to_string()));
                            self.hold_back(&file.path);
                        }
                    }
                    report.flagged.push(group.stem.clone());
                }
                Err(e @ TagMateError::Selection { .. }) => {
                    progress.abandon();
                    return Err(e.into());
                }
                Err(e) => {
                    match &e {
                        TagMateError::MalformedIdentity(_) => {
                            stats.malformed_identities += 1;
                            report.unmatched.push(group.stem.clone());
                        }
                        TagMateError::RemoteLookupFailure { .. } => stats.lookup_failures += 1,
                        _ => stats.other_failures += 1,
                    }
                    warn!("Skipping '{}': {}", group.stem, e);
                    report.failures.push((group.stem.clone(), e.to_string()));
                }
            }
            progress.advance();
        }

        progress.finish();
        Ok(report)
    }
}

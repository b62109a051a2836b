//! Primary/Substitute classification of track groups.
//!
//! Each group gets exactly one Primary copy: the best lossless copy when
//! there is one (aif before wav), otherwise the only copy. Every other copy
//! is a Substitute. The condition is written into the comment grammar.
//!
//! Substitutes are moved into a [`StagingArena`] before any comment is
//! rewritten, so the in-place pass over the directory only ever sees the
//! copies that should become Primary. The arena moves everything back when
//! it is restored or dropped.

use anyhow::Context;
use log::{error, info, warn};
use rustc_hash::FxHashSet;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::error::{GrammarViolation, Result, TagMateError};
use crate::library::scan_groups;
use crate::models::{Comment, Condition, LocalTrackGroup, TrackFile};
use crate::progress::PhaseProgress;
use crate::safety::{move_file, relocate};
use crate::tags::TagStore;

// ============================================================================
// Planning
// ============================================================================

/// Target condition of every copy in `group`.
pub fn plan(group: &LocalTrackGroup) -> Vec<(TrackFile, Condition)> {
    let primary = group
        .files
        .iter()
        .min_by_key(|f| f.format.primary_rank())
        .map(|f| f.path.clone());

    group
        .files
        .iter()
        .map(|f| {
            let condition = if Some(&f.path) == primary.as_ref() {
                Condition::Primary
            } else {
                Condition::Substitute
            };
            (f.clone(), condition)
        })
        .collect()
}

/// Insert `condition` into a stored comment.
///
/// `/* lib */` becomes `/* lib / condition */` and `/* lib / label */`
/// becomes `/* lib / condition / label */`. Anything else is a violation.
pub fn apply_condition(
    raw: Option<&str>,
    library: &str,
    condition: Condition,
) -> std::result::Result<String, GrammarViolation> {
    let mut comment = Comment::parse(raw.unwrap_or_default())?;
    if comment.library != library {
        return Err(GrammarViolation::LibraryMismatch {
            expected: library.to_string(),
            found: comment.library,
        });
    }
    if let Some(existing) = comment.condition {
        return Err(GrammarViolation::AlreadyClassified(existing));
    }
    comment.condition = Some(condition);
    Ok(comment.to_string())
}

/// Rewrite the comment of one file.
pub fn classify_file(
    tags: &dyn TagStore,
    path: &Path,
    library: &str,
    condition: Condition,
) -> Result<()> {
    let mut block = tags.read(path)?;
    let comment = apply_condition(block.comment.as_deref(), library, condition).map_err(
        |violation| TagMateError::CommentGrammar {
            path: path.to_path_buf(),
            violation,
        },
    )?;
    block.comment = Some(comment);
    tags.persist(path, &block)
}

// ============================================================================
// Staging Arena
// ============================================================================

/// Scoped directory holding files moved out of a classification target.
/// Files are moved back by [`StagingArena::restore`], or on drop.
pub struct StagingArena {
    dir: Option<TempDir>,
    /// (original path, staged path)
    staged: Vec<(PathBuf, PathBuf)>,
}

impl StagingArena {
    /// Create the arena inside `parent`, on the same filesystem.
    pub fn new_in(parent: &Path) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(parent)?;
        Ok(Self {
            dir: Some(dir),
            staged: Vec::new(),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.dir.as_ref().map(TempDir::path)
    }

    /// Move `file` into the arena. Returns its staged path.
    pub fn stage(&mut self, file: &Path) -> anyhow::Result<PathBuf> {
        let dir = self.path().context("staging arena already released")?;
        let staged = relocate(file, dir)?;
        self.staged.push((file.to_path_buf(), staged.clone()));
        Ok(staged)
    }

    pub fn staged(&self) -> &[(PathBuf, PathBuf)] {
        &self.staged
    }

    /// Move every staged file back; returns the ones that could not be moved.
    fn move_back(&mut self) -> Vec<(PathBuf, PathBuf)> {
        let mut stuck = Vec::new();
        for (original, staged) in self.staged.drain(..) {
            if let Err(e) = move_file(&staged, &original) {
                error!(
                    "Could not restore {} from staging: {:#}",
                    original.display(),
                    e
                );
                stuck.push((original, staged));
            }
        }
        stuck
    }

    /// Move files back, keeping the arena on disk if any file is stuck in it.
    fn release(&mut self) -> usize {
        let stuck = self.move_back();
        let count = stuck.len();
        if count > 0 {
            if let Some(dir) = self.dir.take() {
                let kept = dir.keep();
                error!(
                    "{} file(s) left in {} for manual recovery",
                    count,
                    kept.display()
                );
            }
        }
        self.staged = stuck;
        count
    }

    /// Move every staged file back to where it came from and remove the arena.
    pub fn restore(mut self) -> anyhow::Result<()> {
        let stuck = self.release();
        if stuck > 0 {
            anyhow::bail!("{} staged file(s) could not be restored", stuck);
        }
        Ok(())
    }
}

impl Drop for StagingArena {
    fn drop(&mut self) {
        if !self.staged.is_empty() {
            self.release();
        }
    }
}

// ============================================================================
// Directory Pass
// ============================================================================

#[derive(Debug, Default)]
pub struct ClassifyReport {
    pub primaries: usize,
    pub substitutes: usize,
    /// Files left unclassified because their comment broke the grammar
    pub violations: Vec<(PathBuf, GrammarViolation)>,
    pub failures: Vec<(PathBuf, String)>,
}

impl ClassifyReport {
    fn record(&mut self, path: &Path, condition: Condition, result: Result<()>) {
        match result {
            Ok(()) => match condition {
                Condition::Primary => self.primaries += 1,
                Condition::Substitute => self.substitutes += 1,
            },
            Err(TagMateError::CommentGrammar { violation, .. }) => {
                warn!(
                    "Leaving {} unclassified: {}",
                    path.display(),
                    violation
                );
                self.violations.push((path.to_path_buf(), violation));
            }
            Err(e) => {
                warn!("Could not classify {}: {}", path.display(), e);
                self.failures.push((path.to_path_buf(), e.to_string()));
            }
        }
    }
}

/// Classify every track group in `dir`.
pub fn classify_directory(
    dir: &Path,
    library: &str,
    tags: &dyn TagStore,
) -> anyhow::Result<ClassifyReport> {
    let groups = scan_groups(dir)
        .with_context(|| format!("Failed to scan {}", dir.display()))?;
    let total: usize = groups.iter().map(LocalTrackGroup::len).sum();
    let mut report = ClassifyReport::default();
    let mut expected_primary: FxHashSet<PathBuf> = FxHashSet::default();
    let mut arena = StagingArena::new_in(dir)?;
    let progress = PhaseProgress::start("classify", total, 100);

    // Phase 1: move Substitutes out of the directory
    for group in &groups {
        for (file, condition) in plan(group) {
            match condition {
                Condition::Primary => {
                    expected_primary.insert(file.path);
                }
                Condition::Substitute => {
                    if let Err(e) = arena.stage(&file.path) {
                        warn!("Could not stage {}: {:#}", file.path.display(), e);
                        report.failures.push((file.path, e.to_string()));
                        progress.advance();
                    }
                }
            }
        }
    }

    // Phase 2: staged copies become Substitutes
    for (original, staged) in arena.staged() {
        let result = classify_file(tags, staged, library, Condition::Substitute);
        report.record(original, Condition::Substitute, result);
        progress.advance();
    }

    // Phase 3: whatever is still in place becomes Primary
    for group in scan_groups(dir)? {
        for file in &group.files {
            if !expected_primary.contains(&file.path) {
                warn!("{} was not staged, leaving it unclassified", file.path.display());
                continue;
            }
            let result = classify_file(tags, &file.path, library, Condition::Primary);
            report.record(&file.path, Condition::Primary, result);
            progress.advance();
        }
    }

    arena.restore()?;
    progress.finish();
    info!(
        "Classified {} primary and {} substitute copies in {}",
        report.primaries,
        report.substitutes,
        dir.display()
    );
    Ok(report)
}

/// Whether every copy of `group` carries a condition for `library`.
fn is_classified(tags: &dyn TagStore, group: &LocalTrackGroup, library: &str) -> bool {
    group.files.iter().all(|file| {
        tags.read(&file.path)
            .ok()
            .and_then(|block| block.comment)
            .and_then(|raw| Comment::parse(&raw).ok())
            .is_some_and(|c| c.library == library && c.condition.is_some())
    })
}

/// Move fully classified groups from `working` into `collection`.
/// Returns the number of groups moved.
pub fn promote_classified(
    working: &Path,
    collection: &Path,
    library: &str,
    tags: &dyn TagStore,
) -> anyhow::Result<usize> {
    let mut promoted = 0;
    for group in scan_groups(working)? {
        if !is_classified(tags, &group, library) {
            continue;
        }
        let mut moved_all = true;
        for file in &group.files {
            if let Err(e) = relocate(&file.path, collection) {
                warn!("Could not promote {}: {:#}", file.path.display(), e);
                moved_all = false;
            }
        }
        if moved_all {
            promoted += 1;
        }
    }
    Ok(promoted)
}

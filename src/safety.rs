//! Safety utilities to prevent accidental file loss.
//!
//! Every move of an audio file goes through [`move_file`]: it never
//! overwrites, and it never leaves the file in both places or in neither.

use anyhow::{bail, Context, Result};
use log::warn;
use std::path::{Path, PathBuf};

use crate::library::Layout;

/// Move `src` to the exact path `dest`.
///
/// Checks:
/// - `dest` must not exist
/// - a failed rename (e.g. across filesystems) falls back to copy, size
///   check, then removal of the source
/// - if the source cannot be removed after copying, the copy is removed so
///   no stale duplicate is left behind
pub fn move_file(src: &Path, dest: &Path) -> Result<()> {
    if dest.exists() {
        bail!(
            "Safety check failed: refusing to overwrite '{}' with '{}'",
            dest.display(),
            src.display()
        );
    }

    if std::fs::rename(src, dest).is_ok() {
        return Ok(());
    }

    let copied = std::fs::copy(src, dest)
        .with_context(|| format!("Failed to copy {} to {}", src.display(), dest.display()))?;
    let expected = std::fs::metadata(src)?.len();
    if copied != expected {
        let _ = std::fs::remove_file(dest);
        bail!(
            "Safety check failed: copy of '{}' is {} bytes, expected {}",
            src.display(),
            copied,
            expected
        );
    }

    if let Err(e) = std::fs::remove_file(src) {
        if let Err(cleanup) = std::fs::remove_file(dest) {
            warn!(
                "Could not remove duplicate {}: {}",
                dest.display(),
                cleanup
            );
        }
        return Err(e).with_context(|| format!("Failed to remove {} after copy", src.display()));
    }
    Ok(())
}

/// Move `src` into `dest_dir`, keeping its file name. Returns the new path.
pub fn relocate(src: &Path, dest_dir: &Path) -> Result<PathBuf> {
    let name = src
        .file_name()
        .with_context(|| format!("'{}' has no file name", src.display()))?;
    let dest = dest_dir.join(name);
    move_file(src, &dest)?;
    Ok(dest)
}

/// Validates that the derived directories and the export directory are
/// pairwise distinct, so a move or export can never land on its own source.
pub fn validate_layout(layout: &Layout, output_dir: &Path) -> Result<()> {
    let named: [(&str, &Path); 4] = [
        ("working", layout.working.as_path()),
        ("mismatch", layout.mismatch.as_path()),
        ("collection", layout.collection.as_path()),
        ("output", output_dir),
    ];

    for (i, (name_a, a)) in named.iter().enumerate() {
        for (name_b, b) in &named[i + 1..] {
            if a == b {
                bail!(
                    "Safety check failed: {} and {} directories are both '{}'",
                    name_a,
                    name_b,
                    a.display()
                );
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_relocate_moves_once() {
        let tmp = TempDir::new().unwrap();
        let src_dir = tmp.path().join("a");
        let dest_dir = tmp.path().join("b");
        std::fs::create_dir_all(&src_dir).unwrap();
        std::fs::create_dir_all(&dest_dir).unwrap();
        let src = src_dir.join("A - B.mp3");
        std::fs::write(&src, "payload").unwrap();

        let dest = relocate(&src, &dest_dir).unwrap();
        assert_eq!(dest, dest_dir.join("A - B.mp3"));
        assert!(!src.exists());
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "payload");
    }

    #[test]
    fn test_relocate_refuses_overwrite() {
        let tmp = TempDir::new().unwrap();
        let dest_dir = tmp.path().join("b");
        std::fs::create_dir_all(&dest_dir).unwrap();
        let src = tmp.path().join("A - B.mp3");
        std::fs::write(&src, "new").unwrap();
        std::fs::write(dest_dir.join("A - B.mp3"), "old").unwrap();

        let result = relocate(&src, &dest_dir);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("refusing to overwrite"));
        // Both files untouched
        assert_eq!(std::fs::read_to_string(&src).unwrap(), "new");
        assert_eq!(
            std::fs::read_to_string(dest_dir.join("A - B.mp3")).unwrap(),
            "old"
        );
    }

    #[test]
    fn test_relocate_missing_source() {
        let tmp = TempDir::new().unwrap();
        let result = relocate(&tmp.path().join("gone.mp3"), tmp.path());
        // Destination equals source path, which does not exist either
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_layout() {
        let tmp = TempDir::new().unwrap();
        let layout = Layout::new(tmp.path(), "Lib");
        assert!(validate_layout(&layout, &tmp.path().join("output")).is_ok());

        let result = validate_layout(&layout, &layout.collection);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("collection and output"));
    }
}

//! Local collection on disk: derived directory layout and stem grouping.

use indexmap::IndexMap;
use log::debug;
use rustc_hash::FxBuildHasher;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::models::{AudioFormat, LocalTrackGroup, TrackFile};

/// Directories derived from the base media directory and library name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    /// Files waiting to be tagged
    pub working: PathBuf,
    /// Holding area for low-confidence automatic matches
    pub mismatch: PathBuf,
    /// Finished, classified collection
    pub collection: PathBuf,
}

impl Layout {
    pub fn new(music_dir: &Path, library: &str) -> Self {
        let root = music_dir.join(library);
        Self {
            working: root.join("music_to_be_tagged"),
            mismatch: root.join("possible_mismatch"),
            collection: root.join(format!("{}_collection", library)),
        }
    }

    /// Create any missing directory of the layout.
    pub fn ensure(&self) -> Result<()> {
        for dir in [&self.working, &self.mismatch, &self.collection] {
            if !dir.is_dir() {
                debug!("Creating {}", dir.display());
                std::fs::create_dir_all(dir)?;
            }
        }
        Ok(())
    }
}

fn stem_of(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
}

/// Group the supported audio files directly inside `dir` by filename stem.
///
/// Groups come out sorted by stem so runs are reproducible; other files and
/// subdirectories are ignored.
pub fn scan_groups(dir: &Path) -> Result<Vec<LocalTrackGroup>> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.is_file())
        .collect();
    paths.sort();

    let mut groups: IndexMap<String, LocalTrackGroup, FxBuildHasher> = IndexMap::default();
    for path in paths {
        let (Some(format), Some(stem)) = (AudioFormat::from_path(&path), stem_of(&path)) else {
            continue;
        };
        groups
            .entry(stem.clone())
            .or_insert_with(|| LocalTrackGroup::new(stem))
            .push(TrackFile { format, path });
    }

    Ok(groups.into_values().collect())
}

/// Distinct stems of the supported audio files in `dir`, sorted.
pub fn local_stems(dir: &Path) -> Result<Vec<String>> {
    Ok(scan_groups(dir)?.into_iter().map(|g| g.stem).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), "").unwrap();
    }

    #[test]
    fn test_layout_paths_and_ensure() {
        let tmp = TempDir::new().unwrap();
        let layout = Layout::new(tmp.path(), "Lib");
        assert_eq!(layout.working, tmp.path().join("Lib/music_to_be_tagged"));
        assert_eq!(layout.mismatch, tmp.path().join("Lib/possible_mismatch"));
        assert_eq!(layout.collection, tmp.path().join("Lib/Lib_collection"));

        layout.ensure().unwrap();
        assert!(layout.working.is_dir());
        assert!(layout.mismatch.is_dir());
        assert!(layout.collection.is_dir());
        // Second call is a no-op
        layout.ensure().unwrap();
    }

    #[test]
    fn test_scan_groups_by_stem() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "B - Two.wav");
        touch(tmp.path(), "A - One.aif");
        touch(tmp.path(), "A - One.mp3");
        touch(tmp.path(), "A - One.flac");
        touch(tmp.path(), "notes.txt");
        std::fs::create_dir(tmp.path().join("sub.mp3")).unwrap();

        let groups = scan_groups(tmp.path()).unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].stem, "A - One");
        assert_eq!(groups[0].len(), 2);
        assert_eq!(groups[0].tagging_primary().unwrap().format, AudioFormat::Mp3);
        assert!(groups[0].has_format(AudioFormat::Aif));
        assert_eq!(groups[1].stem, "B - Two");

        assert_eq!(local_stems(tmp.path()).unwrap(), vec!["A - One", "B - Two"]);
    }

    #[test]
    fn test_scan_accepts_uppercase_extension() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "A - One.MP3");
        let groups = scan_groups(tmp.path()).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].files[0].format, AudioFormat::Mp3);
    }
}

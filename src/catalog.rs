//! Catalog index: canonical track key → catalog metadata.
//!
//! Built once per run from a paginated [`CatalogSource`]. Keys keep the
//! position of their first appearance; a later item with the same key
//! replaces the earlier entry's data.

use indexmap::IndexMap;
use log::{debug, warn};
use rustc_hash::FxBuildHasher;
use serde::Deserialize;
use std::path::Path;

use crate::error::{Result, TagMateError};
use crate::models::{CatalogEntry, CatalogItem};
use crate::normalize::{catalog_key, rewrite_catalog_title};

/// Items requested per catalog page
pub const PAGE_SIZE: usize = 100;

/// Remote catalog (playlist) collaborator.
pub trait CatalogSource {
    /// Total number of items in the playlist.
    fn total(&self, playlist: &str) -> Result<usize>;

    /// Items `offset..offset + limit` of the playlist.
    fn page(&self, playlist: &str, offset: usize, limit: usize) -> Result<Vec<CatalogItem>>;
}

#[derive(Debug, Default)]
pub struct CatalogIndex {
    entries: IndexMap<String, CatalogEntry, FxBuildHasher>,
    collisions: usize,
}

impl CatalogIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pull every page of `playlist` and index it.
    pub fn build(source: &dyn CatalogSource, playlist: &str) -> Result<Self> {
        let total = source.total(playlist)?;
        let mut index = Self::new();
        let mut offset = 0;

        while offset < total {
            let page = source.page(playlist, offset, PAGE_SIZE)?;
            if page.is_empty() {
                warn!(
                    "Catalog returned an empty page at offset {} of {}",
                    offset, total
                );
                break;
            }
            for item in page {
                index.insert(item);
            }
            offset += PAGE_SIZE;
        }

        debug!("Indexed {} catalog keys from {} items", index.len(), total);
        Ok(index)
    }

    pub fn from_items(items: impl IntoIterator<Item = CatalogItem>) -> Self {
        let mut index = Self::new();
        for item in items {
            index.insert(item);
        }
        index
    }

    /// Index one item. Returns the entry it replaced on a key collision.
    pub fn insert(&mut self, item: CatalogItem) -> Option<CatalogEntry> {
        let key = catalog_key(&item.artists, &item.title);
        let entry = CatalogEntry {
            key: key.clone(),
            title: rewrite_catalog_title(&item.title),
            artists: item.artists,
            artwork_url: item.artwork_url,
            preview_url: item.preview_url,
            external_id: item.id,
        };

        let replaced = self.entries.insert(key, entry);
        if let Some(old) = &replaced {
            self.collisions += 1;
            warn!(
                "Catalog key '{}' appears twice ({} replaced by {})",
                old.key, old.external_id, self.entries[&old.key].external_id
            );
        }
        replaced
    }

    pub fn get(&self, key: &str) -> Option<&CatalogEntry> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// All keys in catalog enumeration order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn entries(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn collisions(&self) -> usize {
        self.collisions
    }
}

// ============================================================================
// JSON playlist export
// ============================================================================

/// Playlist export on disk: `{"id": "...", "total": n, "items": [...]}`.
#[derive(Debug, Deserialize)]
pub struct JsonPlaylist {
    #[serde(default)]
    pub id: Option<String>,
    pub total: usize,
    pub items: Vec<CatalogItem>,
}

impl JsonPlaylist {
    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn from_json(contents: &str) -> Result<Self> {
        serde_json::from_str(contents)
            .map_err(|e| TagMateError::Catalog(format!("invalid playlist export: {}", e)))
    }

    fn check_playlist(&self, playlist: &str) -> Result<()> {
        match &self.id {
            Some(id) if id != playlist => Err(TagMateError::Catalog(format!(
                "playlist export is for '{}', configured library points at '{}'",
                id, playlist
            ))),
            _ => Ok(()),
        }
    }
}

impl CatalogSource for JsonPlaylist {
    fn total(&self, playlist: &str) -> Result<usize> {
        self.check_playlist(playlist)?;
        Ok(self.total)
    }

    fn page(&self, playlist: &str, offset: usize, limit: usize) -> Result<Vec<CatalogItem>> {
        self.check_playlist(playlist)?;
        Ok(self.items.iter().skip(offset).take(limit).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn item(id: &str, artists: &[&str], title: &str) -> CatalogItem {
        CatalogItem {
            id: id.to_string(),
            title: title.to_string(),
            artists: artists.iter().map(|a| a.to_string()).collect(),
            artwork_url: Some(format!("https://img.example/{}.jpg", id)),
            preview_url: None,
        }
    }

    /// Counts page requests so pagination can be asserted.
    struct PagedSource {
        items: Vec<CatalogItem>,
        pages_served: Cell<usize>,
    }

    impl CatalogSource for PagedSource {
        fn total(&self, _playlist: &str) -> Result<usize> {
            Ok(self.items.len())
        }

        fn page(&self, _playlist: &str, offset: usize, limit: usize) -> Result<Vec<CatalogItem>> {
            self.pages_served.set(self.pages_served.get() + 1);
            Ok(self.items.iter().skip(offset).take(limit).cloned().collect())
        }
    }

    #[test]
    fn test_build_paginates_all_items() {
        let items: Vec<CatalogItem> = (0..250)
            .map(|i| item(&format!("id{}", i), &["Artist"], &format!("Track {}", i)))
            .collect();
        let source = PagedSource {
            items,
            pages_served: Cell::new(0),
        };
        let index = CatalogIndex::build(&source, "playlist").unwrap();
        assert_eq!(index.len(), 250);
        assert_eq!(source.pages_served.get(), 3);
        assert_eq!(index.keys().next(), Some("Artist - Track 0"));
    }

    #[test]
    fn test_key_and_entry_shape() {
        let index = CatalogIndex::from_items(vec![item(
            "x1",
            &["A", "B"],
            "Song - Someone Remix",
        )]);
        let entry = index.get("A, B - Song (Someone Remix)").unwrap();
        assert_eq!(entry.title, "Song (Someone Remix)");
        assert_eq!(entry.artists_joined(), "A, B");
        assert_eq!(entry.external_id, "x1");
    }

    #[test]
    fn test_collision_last_write_wins_keeps_position() {
        let mut index = CatalogIndex::from_items(vec![
            item("first", &["A"], "Song"),
            item("other", &["B"], "Tune"),
        ]);
        let replaced = index.insert(item("second", &["A"], "Song"));
        assert_eq!(replaced.unwrap().external_id, "first");
        assert_eq!(index.get("A - Song").unwrap().external_id, "second");
        assert_eq!(index.collisions(), 1);
        let keys: Vec<&str> = index.keys().collect();
        assert_eq!(keys, vec!["A - Song", "B - Tune"]);
    }

    #[test]
    fn test_json_playlist_source() {
        let json = r#"{
            "id": "lib-playlist",
            "total": 2,
            "items": [
                {"id": "1", "title": "One", "artists": ["X"], "artwork_url": "https://a/1.jpg"},
                {"id": "2", "title": "Two", "artists": ["Y"], "preview_url": "https://p/2.mp3"}
            ]
        }"#;
        let playlist = JsonPlaylist::from_json(json).unwrap();
        let index = CatalogIndex::build(&playlist, "lib-playlist").unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(
            index.get("Y - Two").unwrap().preview_url.as_deref(),
            Some("https://p/2.mp3")
        );

        assert!(CatalogIndex::build(&playlist, "another").is_err());
    }
}

//! Tag-store collaborator: reads and writes the metadata block of one file.
//!
//! [`LoftyTagStore`] writes ID3v2 into mp3, aif and wav containers alike,
//! since RIFF INFO cannot hold pictures. [`JsonTagStore`] keeps the whole
//! block as the file's content, so fixtures can be inspected as text.

use lofty::config::WriteOptions;
use lofty::file::TaggedFile;
use lofty::picture::{Picture, PictureType};
use lofty::prelude::*;
use lofty::probe::Probe;
use lofty::tag::{Tag, TagType};
use std::path::Path;

use crate::error::{Result, TagMateError};
use crate::models::TagBlock;

pub trait TagStore {
    fn read(&self, path: &Path) -> Result<TagBlock>;

    /// Write the four text fields of `tags`. Artwork is left as it is;
    /// `None` fields are removed from the file.
    fn persist(&self, path: &Path, tags: &TagBlock) -> Result<()>;

    /// Replace the front-cover picture.
    fn embed_artwork(&self, path: &Path, image: &[u8]) -> Result<()>;
}

// ============================================================================
// lofty
// ============================================================================

#[derive(Debug, Default, Clone, Copy)]
pub struct LoftyTagStore;

impl LoftyTagStore {
    fn open(path: &Path) -> Result<TaggedFile> {
        Probe::open(path)
            .and_then(|probe| probe.read())
            .map_err(|e| TagMateError::tag(path, e))
    }

    /// Existing ID3v2 tag, or a fresh one inserted into the file.
    fn id3_tag<'a>(file: &'a mut TaggedFile, path: &Path) -> Result<&'a mut Tag> {
        if file.tag(TagType::Id3v2).is_none() {
            file.insert_tag(Tag::new(TagType::Id3v2));
        }
        file.tag_mut(TagType::Id3v2)
            .ok_or_else(|| TagMateError::tag(path, "container does not accept ID3v2 tags"))
    }

    fn save(tag: &Tag, path: &Path) -> Result<()> {
        tag.save_to_path(path, WriteOptions::default())
            .map_err(|e| TagMateError::tag(path, e))
    }
}

fn set_or_remove(
    tag: &mut Tag,
    value: Option<&String>,
    set: fn(&mut Tag, String),
    remove: fn(&mut Tag),
) {
    match value {
        Some(v) => set(tag, v.clone()),
        None => remove(tag),
    }
}

impl TagStore for LoftyTagStore {
    fn read(&self, path: &Path) -> Result<TagBlock> {
        let file = Self::open(path)?;
        let Some(tag) = file.tag(TagType::Id3v2).or_else(|| file.primary_tag()) else {
            return Ok(TagBlock::default());
        };

        let artwork = tag
            .pictures()
            .iter()
            .find(|p| p.pic_type() == PictureType::CoverFront)
            .or_else(|| tag.pictures().first())
            .map(|p| p.data().to_vec());

        Ok(TagBlock {
            title: tag.title().map(|s| s.into_owned()),
            artist: tag.artist().map(|s| s.into_owned()),
            genre: tag.genre().map(|s| s.into_owned()),
            comment: tag.comment().map(|s| s.into_owned()),
            artwork,
        })
    }

    fn persist(&self, path: &Path, tags: &TagBlock) -> Result<()> {
        let mut file = Self::open(path)?;
        let tag = Self::id3_tag(&mut file, path)?;

        set_or_remove(tag, tags.title.as_ref(), Tag::set_title, Tag::remove_title);
        set_or_remove(tag, tags.artist.as_ref(), Tag::set_artist, Tag::remove_artist);
        set_or_remove(tag, tags.genre.as_ref(), Tag::set_genre, Tag::remove_genre);
        set_or_remove(tag, tags.comment.as_ref(), Tag::set_comment, Tag::remove_comment);

        Self::save(tag, path)
    }

    fn embed_artwork(&self, path: &Path, image: &[u8]) -> Result<()> {
        let mut picture = Picture::from_reader(&mut std::io::Cursor::new(image))
            .map_err(|e| TagMateError::tag(path, format!("unreadable artwork: {}", e)))?;
        picture.set_pic_type(PictureType::CoverFront);

        let mut file = Self::open(path)?;
        let tag = Self::id3_tag(&mut file, path)?;
        tag.remove_picture_type(PictureType::CoverFront);
        tag.push_picture(picture);

        Self::save(tag, path)
    }
}

// ============================================================================
// JSON
// ============================================================================

/// Stores the tag block as JSON in place of the audio payload. An empty
/// file reads as an untagged one.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonTagStore;

impl JsonTagStore {
    fn write(path: &Path, tags: &TagBlock) -> Result<()> {
        let json = serde_json::to_string(tags).map_err(|e| TagMateError::tag(path, e))?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

impl TagStore for JsonTagStore {
    fn read(&self, path: &Path) -> Result<TagBlock> {
        let contents = std::fs::read_to_string(path)?;
        if contents.trim().is_empty() {
            return Ok(TagBlock::default());
        }
        serde_json::from_str(&contents).map_err(|e| TagMateError::tag(path, e))
    }

    fn persist(&self, path: &Path, tags: &TagBlock) -> Result<()> {
        let mut stored = self.read(path)?;
        stored.copy_text_fields(tags);
        Self::write(path, &stored)
    }

    fn embed_artwork(&self, path: &Path, image: &[u8]) -> Result<()> {
        let mut stored = self.read(path)?;
        stored.artwork = Some(image.to_vec());
        Self::write(path, &stored)
    }
}

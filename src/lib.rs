//! TagMate library - shared modules for the tagging and report binaries.

pub mod artwork;
pub mod catalog;
pub mod classify;
pub mod config;
pub mod error;
pub mod library;
pub mod lookup;
pub mod models;
pub mod normalize;
pub mod progress;
pub mod report;
pub mod safety;
pub mod scoring;
pub mod selection;
pub mod tagger;
pub mod tags;

pub use error::{Result, TagMateError};

//! Storage layer.
//!
//! - **Paths**: maps collection prefixes to style files
//! - **Style file**: the BOM-prefixed three-column delimited format
//! - **Notes**: the JSON sidecar holding per-style notes
//! - **Collection store**: load / save of a single collection

// Allow significant_drop_tightening - mutex guards are held for a single statement.
#![allow(clippy::significant_drop_tightening)]

mod collection;
mod notes;
mod paths;
pub mod style_file;

pub use collection::{CollectionStore, LoadError};
pub use notes::NotesDictionary;
pub use paths::{STYLE_FILE_EXTENSION, StylePaths};

//! Data models for stylestore.
//!
//! Style records, collections, and the `prefix::name` naming convention.

pub mod name;
mod style;

pub use name::NAME_SEPARATOR;
pub use style::{Collection, DEDUP_SUFFIX, LINE_BREAK_MARKER, StyleRecord};

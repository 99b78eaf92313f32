//! Security features.
//!
//! Passphrase encryption of backup files.

pub mod encryption;

pub use encryption::{Encryptor, MAGIC_HEADER, is_encrypted};

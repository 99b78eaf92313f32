//! Passphrase-based encryption for backup files.
//!
//! Provides AES-256-GCM authenticated encryption keyed by a user passphrase.
//! Encryption is available with the `encryption` feature flag (on by default);
//! without it, [`Encryptor::new`] reports the feature as missing and callers
//! fall back to plaintext backups.
//!
//! # Security Properties
//!
//! - **Algorithm**: AES-256-GCM (authenticated encryption)
//! - **Key**: 32 bytes derived from the passphrase with Argon2id
//! - **Salt**: 16 bytes, randomly generated per file
//! - **Nonce**: 12 bytes, randomly generated per file
//! - **Format**: `STYLESTORE_ENC_V1` magic + salt + nonce + ciphertext + auth tag
//!
//! # Example
//!
//! ```rust,ignore
//! use secrecy::SecretString;
//! use stylestore::security::Encryptor;
//!
//! let encryptor = Encryptor::new(&SecretString::from("correct horse".to_string()))?;
//! let encrypted = encryptor.encrypt(b"name,prompt,negative_prompt\n")?;
//! let decrypted = encryptor.decrypt(&encrypted)?;
//! ```

/// Magic bytes identifying encrypted backups.
pub const MAGIC_HEADER: &[u8] = b"STYLESTORE_ENC_V1\0";

/// Checks if data appears to be encrypted (has magic header).
#[must_use]
pub fn is_encrypted(data: &[u8]) -> bool {
    data.starts_with(MAGIC_HEADER)
}

#[cfg(feature = "encryption")]
mod implementation {
    use super::MAGIC_HEADER;
    use crate::{Error, Result};

    use aes_gcm::{
        Aes256Gcm, Key, Nonce,
        aead::{Aead, AeadCore, KeyInit, OsRng, rand_core::RngCore},
    };
    use argon2::Argon2;
    use secrecy::{ExposeSecret, SecretString};

    /// Salt size for key derivation.
    const SALT_SIZE: usize = 16;

    /// Nonce size for AES-256-GCM (12 bytes / 96 bits).
    const NONCE_SIZE: usize = 12;

    /// Key size for AES-256 (32 bytes / 256 bits).
    const KEY_SIZE: usize = 32;

    /// GCM authentication tag size.
    const TAG_SIZE: usize = 16;

    /// Passphrase-keyed AES-256-GCM encryptor.
    pub struct Encryptor {
        passphrase: SecretString,
    }

    impl std::fmt::Debug for Encryptor {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("Encryptor")
                .field("passphrase", &"[REDACTED]")
                .finish()
        }
    }

    impl Encryptor {
        /// Creates an encryptor for the given passphrase.
        ///
        /// # Errors
        ///
        /// Returns an error if the passphrase is empty.
        pub fn new(passphrase: &SecretString) -> Result<Self> {
            if passphrase.expose_secret().is_empty() {
                return Err(Error::InvalidInput(
                    "Encryption passphrase must not be empty".to_string(),
                ));
            }
            Ok(Self {
                passphrase: passphrase.clone(),
            })
        }

        /// Returns `true`: this build can encrypt.
        #[must_use]
        pub const fn is_available() -> bool {
            true
        }

        fn cipher(&self, salt: &[u8]) -> Result<Aes256Gcm> {
            let mut key = [0u8; KEY_SIZE];
            Argon2::default()
                .hash_password_into(self.passphrase.expose_secret().as_bytes(), salt, &mut key)
                .map_err(|e| Error::failed("derive_key", format!("Argon2 failed: {e}")))?;
            Ok(Aes256Gcm::new(&Key::<Aes256Gcm>::from(key)))
        }

        /// Encrypts plaintext data.
        ///
        /// Returns: magic header + salt + nonce + ciphertext (includes auth tag)
        ///
        /// # Errors
        ///
        /// Returns an error if key derivation or encryption fails.
        pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
            let mut salt = [0u8; SALT_SIZE];
            OsRng.fill_bytes(&mut salt);
            let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

            let ciphertext = self
                .cipher(&salt)?
                .encrypt(&nonce, plaintext)
                .map_err(|e| Error::failed("encrypt", format!("AES-256-GCM encryption failed: {e}")))?;

            let mut output = Vec::with_capacity(
                MAGIC_HEADER.len() + SALT_SIZE + NONCE_SIZE + ciphertext.len(),
            );
            output.extend_from_slice(MAGIC_HEADER);
            output.extend_from_slice(&salt);
            output.extend_from_slice(&nonce);
            output.extend_from_slice(&ciphertext);

            tracing::debug!(
                plaintext_len = plaintext.len(),
                encrypted_len = output.len(),
                "Encrypted data"
            );

            Ok(output)
        }

        /// Decrypts data produced by [`Encryptor::encrypt`].
        ///
        /// # Errors
        ///
        /// Returns an error if the data is malformed, the passphrase is wrong,
        /// or the data was tampered with.
        pub fn decrypt(&self, encrypted: &[u8]) -> Result<Vec<u8>> {
            let min_size = MAGIC_HEADER.len() + SALT_SIZE + NONCE_SIZE + TAG_SIZE;
            if encrypted.len() < min_size {
                return Err(Error::InvalidInput(format!(
                    "Encrypted data too short: {} bytes, minimum {}",
                    encrypted.len(),
                    min_size
                )));
            }

            let Some(body) = encrypted.strip_prefix(MAGIC_HEADER) else {
                return Err(Error::InvalidInput(
                    "Invalid encrypted file: missing magic header".to_string(),
                ));
            };

            let (salt, rest) = body.split_at(SALT_SIZE);
            let (nonce, ciphertext) = rest.split_at(NONCE_SIZE);
            let nonce: [u8; NONCE_SIZE] = nonce
                .try_into()
                .map_err(|_| Error::InvalidInput("Invalid nonce length".to_string()))?;

            let plaintext = self
                .cipher(salt)?
                .decrypt(&Nonce::from(nonce), ciphertext)
                .map_err(|e| {
                    Error::failed(
                        "decrypt",
                        format!("AES-256-GCM decryption failed (wrong key or corrupted data): {e}"),
                    )
                })?;

            tracing::debug!(
                encrypted_len = encrypted.len(),
                plaintext_len = plaintext.len(),
                "Decrypted data"
            );

            Ok(plaintext)
        }
    }

}

#[cfg(feature = "encryption")]
pub use implementation::Encryptor;

// Stub implementation when encryption feature is disabled
#[cfg(not(feature = "encryption"))]
mod stub {
    use crate::{Error, Result};
    use secrecy::SecretString;

    /// Encryptor (stub).
    #[derive(Debug)]
    pub struct Encryptor;

    impl Encryptor {
        /// Returns an error indicating encryption is not available.
        ///
        /// # Errors
        ///
        /// Always returns an error.
        pub fn new(_passphrase: &SecretString) -> Result<Self> {
            Err(Error::FeatureNotEnabled("encryption".to_string()))
        }

        /// Returns `false`: this build cannot encrypt.
        #[must_use]
        pub const fn is_available() -> bool {
            false
        }

        /// Always fails.
        ///
        /// # Errors
        ///
        /// Always returns an error.
        pub fn encrypt(&self, _plaintext: &[u8]) -> Result<Vec<u8>> {
            Err(Error::FeatureNotEnabled("encryption".to_string()))
        }

        /// Always fails.
        ///
        /// # Errors
        ///
        /// Always returns an error.
        pub fn decrypt(&self, _encrypted: &[u8]) -> Result<Vec<u8>> {
            Err(Error::FeatureNotEnabled("encryption".to_string()))
        }
    }
}

#[cfg(not(feature = "encryption"))]
pub use stub::Encryptor;

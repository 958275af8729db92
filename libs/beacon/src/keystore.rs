//! Signing key provisioning
//!
//! Keys are provisioned out-of-band and read once at startup. On the host
//! the key lives in a hex file next to the beacon configuration.

use crate::validation::{SigningKey, ValidationError};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use zeroize::Zeroizing;

/// Length of keys produced by [`generate_key`]
pub const GENERATED_KEY_LEN: usize = 32;

/// Key files larger than this are rejected without being parsed
const MAX_KEY_FILE_SIZE: u64 = 4 * 1024;

/// Key store errors
#[derive(Error, Debug)]
pub enum KeyStoreError {
    /// IO error
    #[error("IO error on {path}: {source}")]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying error
        source: io::Error,
    },

    /// Key file content is not hex
    #[error("Key file {0} is not valid hex")]
    InvalidHex(PathBuf),

    /// Key file exceeds the size limit
    #[error("Key file {path} too large: {size} bytes")]
    TooLarge {
        /// File involved
        path: PathBuf,
        /// Size on disk
        size: u64,
    },

    /// Key material rejected
    #[error("Invalid key: {0}")]
    Key(#[from] ValidationError),

    /// Random source unavailable
    #[error("Random generation failed: {0}")]
    Random(String),
}

/// Result type for key store operations
pub type Result<T> = std::result::Result<T, KeyStoreError>;

/// Supplies the signing key at startup
pub trait KeyStore {
    /// Load the provisioned key
    fn load_signing_key(&self) -> Result<SigningKey>;
}

/// Key held in memory, for tests and embedded provisioning
#[derive(Debug, Clone)]
pub struct StaticKeyStore(SigningKey);

impl StaticKeyStore {
    /// Wrap an already provisioned key
    #[must_use]
    pub fn new(key: SigningKey) -> Self {
        Self(key)
    }
}

impl KeyStore for StaticKeyStore {
    fn load_signing_key(&self) -> Result<SigningKey> {
        Ok(self.0.clone())
    }
}

/// Hex-encoded key file
#[derive(Debug, Clone)]
pub struct FileKeyStore {
    path: PathBuf,
}

impl FileKeyStore {
    /// Key store backed by `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the key file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `key_bytes` as hex, owner read/write only
    pub fn provision(&self, key_bytes: &[u8]) -> Result<()> {
        let io_err = |source: io::Error| KeyStoreError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let encoded = Zeroizing::new(hex::encode(key_bytes));
        fs::write(&self.path, encoded.as_bytes()).map_err(io_err)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600)).map_err(io_err)?;
        }

        log::info!("Provisioned signing key at {}", self.path.display());
        Ok(())
    }
}

impl KeyStore for FileKeyStore {
    fn load_signing_key(&self) -> Result<SigningKey> {
        let io_err = |source: io::Error| KeyStoreError::Io {
            path: self.path.clone(),
            source,
        };

        let size = fs::metadata(&self.path).map_err(io_err)?.len();
        if size > MAX_KEY_FILE_SIZE {
            return Err(KeyStoreError::TooLarge {
                path: self.path.clone(),
                size,
            });
        }

        let contents = Zeroizing::new(fs::read_to_string(&self.path).map_err(io_err)?);
        let bytes = hex::decode(contents.trim())
            .map_err(|_| KeyStoreError::InvalidHex(self.path.clone()))?;
        let key = SigningKey::new(bytes)?;

        log::debug!("Loaded {}-byte signing key from {}", key.len(), self.path.display());
        Ok(key)
    }
}

/// Generate fresh random key material
pub fn generate_key() -> Result<Zeroizing<[u8; GENERATED_KEY_LEN]>> {
    let mut key = Zeroizing::new([0u8; GENERATED_KEY_LEN]);
    getrandom::fill(&mut key[..]).map_err(|e| KeyStoreError::Random(e.to_string()))?;
    Ok(key)
}

//! Key material loaded at startup
//!
//! Catalog payloads are encrypted under one of several `key:iv` pairs, each
//! provisioned as a hex string in its own file. Older catalog formats used a
//! single opaque secret instead; that secret is kept alongside the pairs.

use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("expected \"<hex-key>:<hex-iv>\"")]
    MissingSeparator,
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),
    #[error("invalid AES key length: {0} bytes")]
    InvalidKeyLength(usize),
    #[error("invalid IV length: {0} bytes")]
    InvalidIvLength(usize),
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}

/// One AES key and its IV
#[derive(Clone, PartialEq, Eq)]
pub struct KeyMaterial {
    pub key: Vec<u8>,
    pub iv: [u8; 16],
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("key_len", &self.key.len())
            .finish_non_exhaustive()
    }
}

impl KeyMaterial {
    /// Parse `"<hex-key>:<hex-iv>"`
    pub fn parse(secret: &str) -> Result<Self, KeyError> {
        let (key_hex, iv_hex) = secret
            .trim()
            .split_once(':')
            .ok_or(KeyError::MissingSeparator)?;

        let key = hex::decode(key_hex)?;
        if !matches!(key.len(), 16 | 24 | 32) {
            return Err(KeyError::InvalidKeyLength(key.len()));
        }

        let iv_bytes = hex::decode(iv_hex)?;
        let iv: [u8; 16] = iv_bytes
            .as_slice()
            .try_into()
            .map_err(|_| KeyError::InvalidIvLength(iv_bytes.len()))?;

        Ok(Self { key, iv })
    }

    pub fn from_file(path: &Path) -> Result<Self, KeyError> {
        Self::parse(&read_secret(path)?)
    }
}

/// All key material available to the decryptor, in load order
#[derive(Debug, Clone, Default)]
pub struct KeyRing {
    pairs: Vec<KeyMaterial>,
    legacy_secret: Option<String>,
}

impl KeyRing {
    pub fn new(pairs: Vec<KeyMaterial>, legacy_secret: Option<String>) -> Self {
        Self {
            pairs,
            legacy_secret,
        }
    }

    /// Load every configured key file
    ///
    /// Files that are missing or malformed are logged and skipped, so a
    /// partially provisioned install still starts.
    pub fn load(pair_files: &[impl AsRef<Path>], legacy_file: Option<&Path>) -> Self {
        let mut pairs = Vec::with_capacity(pair_files.len());
        for path in pair_files {
            let path = path.as_ref();
            match KeyMaterial::from_file(path) {
                Ok(material) => pairs.push(material),
                Err(e) => tracing::warn!("Skipping key file {}: {}", path.display(), e),
            }
        }

        let legacy_secret = legacy_file.and_then(|path| match read_secret(path) {
            Ok(secret) if !secret.is_empty() => Some(secret),
            Ok(_) => {
                tracing::warn!("Legacy secret file {} is empty", path.display());
                None
            }
            Err(e) => {
                tracing::warn!("Skipping legacy secret: {}", e);
                None
            }
        });

        tracing::info!(
            key_pairs = pairs.len(),
            legacy_secret = legacy_secret.is_some(),
            "Key material loaded"
        );

        Self::new(pairs, legacy_secret)
    }

    pub fn pairs(&self) -> &[KeyMaterial] {
        &self.pairs
    }

    pub fn legacy_secret(&self) -> Option<&str> {
        self.legacy_secret.as_deref()
    }
}

fn read_secret(path: &Path) -> Result<String, KeyError> {
    std::fs::read_to_string(path)
        .map(|s| s.trim().to_string())
        .map_err(|source| KeyError::Io {
            path: path.display().to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const PAIR: &str = "000102030405060708090a0b0c0d0e0f:0f0e0d0c0b0a09080706050403020100";

    #[test]
    fn test_parse_key_material() {
        let material = KeyMaterial::parse(PAIR).unwrap();
        assert_eq!(material.key.len(), 16);
        assert_eq!(material.key[1], 0x01);
        assert_eq!(material.iv[0], 0x0f);
    }

    #[test]
    fn test_parse_aes256_key() {
        let secret = format!("{}:{}", "ab".repeat(32), "cd".repeat(16));
        let material = KeyMaterial::parse(&secret).unwrap();
        assert_eq!(material.key.len(), 32);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(matches!(
            KeyMaterial::parse("deadbeef"),
            Err(KeyError::MissingSeparator)
        ));
        assert!(matches!(
            KeyMaterial::parse("zz:00"),
            Err(KeyError::InvalidHex(_))
        ));
        assert!(matches!(
            KeyMaterial::parse(&format!("{}:{}", "ab".repeat(10), "cd".repeat(16))),
            Err(KeyError::InvalidKeyLength(10))
        ));
        assert!(matches!(
            KeyMaterial::parse(&format!("{}:{}", "ab".repeat(16), "cd".repeat(8))),
            Err(KeyError::InvalidIvLength(8))
        ));
    }

    #[test]
    fn test_load_skips_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("secret1.txt");
        let mut file = std::fs::File::create(&good).unwrap();
        writeln!(file, "  {}  ", PAIR).unwrap();

        let legacy = dir.path().join("secret.txt");
        std::fs::write(&legacy, "legacy-secret-value\n").unwrap();

        let missing = dir.path().join("secret2.txt");
        let ring = KeyRing::load(&[good, missing], Some(legacy.as_path()));

        assert_eq!(ring.pairs().len(), 1);
        assert_eq!(ring.legacy_secret(), Some("legacy-secret-value"));
    }
}

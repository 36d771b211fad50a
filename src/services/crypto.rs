//! Payload decryption
//!
//! Three independent schemes, each matched to one payload shape:
//!
//! - **catalog**: base64 AES-CBC ciphertext tried against every provisioned
//!   `key:iv` pair until one yields plausible JSON/URL text
//! - **embedded**: playlist bodies that carry their own IV and key at fixed
//!   offsets inside the base64 text
//! - **legacy**: base64 AES-CBC ciphertext keyed by a single reversed secret
//!
//! None of the public entry points return an error. Failures are logged and
//! turned into the fallback each caller expects (absence, the original text,
//! or an empty string).

use aes::cipher::{block_padding::NoPadding, BlockDecryptMut, KeyIvInit};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use thiserror::Error;

use crate::services::keys::{KeyMaterial, KeyRing};
use crate::services::metrics::record_decrypt;

type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;
type Aes192CbcDec = cbc::Decryptor<aes::Aes192>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

const BLOCK_SIZE: usize = 16;

/// Playlist bodies shorter than this cannot hold an embedded IV and key
const MIN_EMBEDDED_LEN: usize = 79;

/// Prefixes of playlist text that is already plaintext
const PLAINTEXT_PREFIXES: [&str; 3] = ["#EXTM3U", "#EXTINF", "#KODIPROP"];

#[derive(Debug, Error)]
enum DecryptError {
    #[error("base64 decode failed: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("unsupported AES key length: {0} bytes")]
    KeyLength(usize),
    #[error("unsupported IV length: {0} bytes")]
    IvLength(usize),
    #[error("ciphertext length {0} is not a multiple of the block size")]
    BlockLength(usize),
    #[error("invalid PKCS#7 padding")]
    Padding,
    #[error("plaintext is not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("payload too short for embedded key layout")]
    Layout,
    #[error("secret character {0:?} is outside Latin-1")]
    NotLatin1(char),
}

/// Which scheme protects per-provider playlist bodies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaylistScheme {
    /// IV and key embedded in the payload
    #[default]
    Embedded,
    /// Single reversed secret
    Legacy,
}

impl std::str::FromStr for PlaylistScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "embedded" => Ok(Self::Embedded),
            "legacy" => Ok(Self::Legacy),
            other => Err(format!("unknown playlist scheme: {}", other)),
        }
    }
}

impl std::fmt::Display for PlaylistScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaylistScheme::Embedded => write!(f, "embedded"),
            PlaylistScheme::Legacy => write!(f, "legacy"),
        }
    }
}

/// Key material plus the playlist scheme in use
#[derive(Debug, Clone)]
pub struct Decryptor {
    keys: KeyRing,
    playlist_scheme: PlaylistScheme,
}

impl Decryptor {
    pub fn new(keys: KeyRing, playlist_scheme: PlaylistScheme) -> Self {
        Self {
            keys,
            playlist_scheme,
        }
    }

    /// Decrypt the provider catalog
    pub fn catalog(&self, payload: &str) -> Option<String> {
        decrypt_catalog(payload, self.keys.pairs())
    }

    /// Decrypt a provider playlist body with the configured scheme
    pub fn playlist(&self, body: &str) -> String {
        match self.playlist_scheme {
            PlaylistScheme::Embedded => decrypt_embedded(body),
            PlaylistScheme::Legacy => match self.keys.legacy_secret() {
                Some(secret) => decrypt_legacy(body, secret),
                None => {
                    tracing::warn!("Legacy playlist scheme selected but no secret is loaded");
                    record_decrypt("legacy", "failed");
                    String::new()
                }
            },
        }
    }
}

/// Multi-key trial decryption
///
/// Returns the first candidate that starts with `{` or `[`, or mentions
/// `http` in any case. `None` when the payload is not base64 or no key
/// produces an acceptable candidate.
pub fn decrypt_catalog(payload: &str, keys: &[KeyMaterial]) -> Option<String> {
    let ciphertext = match STANDARD.decode(strip_whitespace(payload)) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!("Catalog decryption failed: {}", DecryptError::from(e));
            record_decrypt("catalog", "failed");
            return None;
        }
    };

    for (index, material) in keys.iter().enumerate() {
        match decrypt_catalog_candidate(&material.key, &material.iv, &ciphertext) {
            Ok(text) if looks_decrypted(&text) => {
                tracing::debug!(key_index = index, "Catalog decrypted");
                record_decrypt("catalog", "ok");
                return Some(text);
            }
            Ok(_) => tracing::debug!(key_index = index, "Candidate rejected by content check"),
            Err(e) => tracing::debug!(key_index = index, "Key did not fit: {}", e),
        }
    }

    tracing::warn!("Catalog decryption failed with all {} keys", keys.len());
    record_decrypt("catalog", "failed");
    None
}

/// Embedded-key playlist decryption
///
/// Plain M3U passes through untouched, inputs too short for the layout come
/// back trimmed, and anything that fails to decrypt comes back as the
/// original input.
pub fn decrypt_embedded(body: &str) -> String {
    let trimmed = body.trim();

    if PLAINTEXT_PREFIXES.iter().any(|p| trimmed.starts_with(p)) {
        record_decrypt("embedded", "passthrough");
        return body.to_string();
    }

    if trimmed.chars().count() < MIN_EMBEDDED_LEN {
        record_decrypt("embedded", "passthrough");
        return trimmed.to_string();
    }

    match decrypt_embedded_layout(trimmed) {
        Ok(text) => {
            record_decrypt("embedded", "ok");
            text
        }
        Err(e) => {
            tracing::warn!("Playlist decryption failed, using raw body: {}", e);
            record_decrypt("embedded", "failed");
            body.to_string()
        }
    }
}

/// Legacy single-secret decryption
///
/// Returns an empty string on any failure.
pub fn decrypt_legacy(payload: &str, secret: &str) -> String {
    match decrypt_legacy_inner(payload, secret) {
        Ok(text) => {
            record_decrypt("legacy", "ok");
            text
        }
        Err(e) => {
            tracing::warn!("Legacy decryption failed: {}", e);
            record_decrypt("legacy", "failed");
            String::new()
        }
    }
}

// Layout: ct[0..10] | iv_b64[24] | ct[10..n-10] | key_b64[44] | ct[n-10..n]
fn decrypt_embedded_layout(s: &str) -> Result<String, DecryptError> {
    let len = s.len();
    let field = |start: usize, end: usize| s.get(start..end).ok_or(DecryptError::Layout);

    let mut encoded = String::with_capacity(len);
    encoded.push_str(field(0, 10)?);
    encoded.push_str(field(34, len - 54)?);
    encoded.push_str(field(len - 10, len)?);

    let iv = STANDARD.decode(field(10, 34)?)?;
    let key = STANDARD.decode(field(len - 54, len - 10)?)?;
    let ciphertext = STANDARD.decode(encoded)?;

    decrypt_pkcs7_text(&key, &iv, &ciphertext)
}

fn decrypt_legacy_inner(payload: &str, secret: &str) -> Result<String, DecryptError> {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() < BLOCK_SIZE {
        return Err(DecryptError::IvLength(chars.len()));
    }

    let iv: Vec<u8> = chars[..BLOCK_SIZE]
        .iter()
        .rev()
        .collect::<String>()
        .into_bytes();

    let key = chars[11..chars.len() - 1]
        .iter()
        .rev()
        .map(|&c| u8::try_from(c).map_err(|_| DecryptError::NotLatin1(c)))
        .collect::<Result<Vec<u8>, _>>()?;

    let ciphertext = STANDARD.decode(strip_whitespace(payload))?;
    let plain = cbc_decrypt(&key, &iv, &ciphertext)?;

    unpad_lenient(plain)
}

fn strip_whitespace(s: &str) -> String {
    s.chars().filter(|c| !c.is_ascii_whitespace()).collect()
}

fn looks_decrypted(text: &str) -> bool {
    text.starts_with('{') || text.starts_with('[') || text.to_lowercase().contains("http")
}

// Only the final byte is trusted as the pad length; pad contents are not checked.
fn decrypt_catalog_candidate(
    key: &[u8],
    iv: &[u8],
    ciphertext: &[u8],
) -> Result<String, DecryptError> {
    let mut plain = cbc_decrypt(key, iv, ciphertext)?;
    strip_pad_length(&mut plain)?;
    Ok(String::from_utf8(plain)?)
}

fn decrypt_pkcs7_text(key: &[u8], iv: &[u8], ciphertext: &[u8]) -> Result<String, DecryptError> {
    let mut plain = cbc_decrypt(key, iv, ciphertext)?;
    strip_pkcs7(&mut plain)?;
    Ok(String::from_utf8(plain)?)
}

/// Raw AES-CBC decryption, key size picked from the key length
fn cbc_decrypt(key: &[u8], iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, DecryptError> {
    if iv.len() != BLOCK_SIZE {
        return Err(DecryptError::IvLength(iv.len()));
    }

    macro_rules! decrypt_with {
        ($dec:ty, $buf:expr) => {
            <$dec>::new_from_slices(key, iv)
                .map_err(|_| DecryptError::KeyLength(key.len()))?
                .decrypt_padded_mut::<NoPadding>($buf)
                .map_err(|_| DecryptError::BlockLength(ciphertext.len()))?
                .len()
        };
    }

    let mut buf = ciphertext.to_vec();
    let len = match key.len() {
        16 => decrypt_with!(Aes128CbcDec, &mut buf),
        24 => decrypt_with!(Aes192CbcDec, &mut buf),
        32 => decrypt_with!(Aes256CbcDec, &mut buf),
        other => return Err(DecryptError::KeyLength(other)),
    };
    buf.truncate(len);

    Ok(buf)
}

fn strip_pkcs7(buf: &mut Vec<u8>) -> Result<(), DecryptError> {
    let pad = *buf.last().ok_or(DecryptError::Padding)? as usize;
    if pad == 0 || pad > BLOCK_SIZE || pad > buf.len() {
        return Err(DecryptError::Padding);
    }

    let body_len = buf.len() - pad;
    if buf[body_len..].iter().any(|&b| b as usize != pad) {
        return Err(DecryptError::Padding);
    }

    buf.truncate(body_len);
    Ok(())
}

fn strip_pad_length(buf: &mut Vec<u8>) -> Result<(), DecryptError> {
    let pad = *buf.last().ok_or(DecryptError::Padding)? as usize;
    if pad == 0 || pad > BLOCK_SIZE || pad > buf.len() {
        return Err(DecryptError::Padding);
    }

    buf.truncate(buf.len() - pad);
    Ok(())
}

// A final byte outside 1..=16 is not treated as an error: the whole buffer is
// decoded, invalid UTF-8 dropped and trailing NULs trimmed.
fn unpad_lenient(mut plain: Vec<u8>) -> Result<String, DecryptError> {
    match plain.last().copied() {
        Some(pad @ 1..=16) if pad as usize <= plain.len() => {
            plain.truncate(plain.len() - pad as usize);
            Ok(String::from_utf8(plain)?)
        }
        _ => {
            let text: String = plain.utf8_chunks().map(|chunk| chunk.valid()).collect();
            Ok(text.trim_end_matches('\0').to_string())
        }
    }
}

/// Payload builders shared by the decryption and pipeline tests
#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use aes::cipher::{block_padding::Pkcs7, BlockEncryptMut};

    pub type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
    pub type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;

    pub fn encrypt(material: &KeyMaterial, plaintext: &[u8]) -> Vec<u8> {
        match material.key.len() {
            16 => Aes128CbcEnc::new_from_slices(&material.key, &material.iv)
                .unwrap()
                .encrypt_padded_vec_mut::<Pkcs7>(plaintext),
            32 => Aes256CbcEnc::new_from_slices(&material.key, &material.iv)
                .unwrap()
                .encrypt_padded_vec_mut::<Pkcs7>(plaintext),
            n => panic!("unsupported key length {}", n),
        }
    }

    /// Base64 catalog payload encrypted under `material`
    pub fn catalog_payload(material: &KeyMaterial, plaintext: &str) -> String {
        STANDARD.encode(encrypt(material, plaintext.as_bytes()))
    }

    /// Base64 payload for the single-secret scheme (16-char IV, 16-byte key)
    pub fn legacy_payload(plaintext: &str, secret: &str) -> String {
        let chars: Vec<char> = secret.chars().collect();
        let iv: Vec<u8> = chars[..16].iter().rev().map(|&c| c as u8).collect();
        let key: Vec<u8> = chars[11..chars.len() - 1]
            .iter()
            .rev()
            .map(|&c| c as u8)
            .collect();

        let ct = Aes128CbcEnc::new_from_slices(&key, &iv)
            .unwrap()
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());
        STANDARD.encode(ct)
    }

    /// Lay out ciphertext, IV and key the way embedded playlists carry them
    pub fn embed(plaintext: &str, key: &[u8; 32], iv: &[u8; 16]) -> String {
        let ct = Aes256CbcEnc::new_from_slices(key, iv)
            .unwrap()
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());
        let ct_b64 = STANDARD.encode(ct);
        let n = ct_b64.len();
        assert!(n >= 20);

        format!(
            "{}{}{}{}{}",
            &ct_b64[..10],
            STANDARD.encode(iv),
            &ct_b64[10..n - 10],
            STANDARD.encode(key),
            &ct_b64[n - 10..]
        )
    }
}

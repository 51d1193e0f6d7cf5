//! Credential vault for backend secrets.
//!
//! Uses AES-256-GCM for authenticated encryption of bearer tokens and API
//! keys before they are stored in the database. The stored form is
//! `hex(nonce ‖ tag ‖ ciphertext)`.

use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM};
use ring::rand::{SecureRandom, SystemRandom};
use zeroize::Zeroizing;

/// Size of the encryption key (32 bytes = 256 bits).
pub const KEY_SIZE: usize = 32;

/// Size of the nonce (12 bytes for AES-GCM).
const NONCE_SIZE: usize = 12;

/// Size of the authentication tag.
const TAG_SIZE: usize = 16;

/// Smallest well-formed blob (empty plaintext).
const MIN_BLOB_SIZE: usize = NONCE_SIZE + TAG_SIZE;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid encryption key: {0}")]
    InvalidKey(String),

    #[error("malformed credential blob: {0}")]
    Malformed(String),

    /// Tag mismatch: the blob was tampered with or sealed under another key
    #[error("credential failed authentication")]
    Authentication,

    #[error("encryption failed")]
    Seal,
}

/// Encrypts and decrypts stored backend credentials.
pub struct CredentialVault {
    key: LessSafeKey,
    rng: SystemRandom,
}

impl std::fmt::Debug for CredentialVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialVault").finish_non_exhaustive()
    }
}

impl CredentialVault {
    /// Create a vault with the given 256-bit key.
    pub fn new(key: &[u8; KEY_SIZE]) -> Result<Self, CryptoError> {
        let unbound_key = UnboundKey::new(&AES_256_GCM, key)
            .map_err(|_| CryptoError::InvalidKey("rejected by AES-256-GCM".to_string()))?;
        Ok(Self {
            key: LessSafeKey::new(unbound_key),
            rng: SystemRandom::new(),
        })
    }

    /// Create a vault from a 64-character hex key.
    pub fn from_hex_key(key_hex: &str) -> Result<Self, CryptoError> {
        let bytes = Zeroizing::new(
            hex::decode(key_hex.trim()).map_err(|e| CryptoError::InvalidKey(e.to_string()))?,
        );
        let key: Zeroizing<[u8; KEY_SIZE]> = Zeroizing::new(
            bytes.as_slice().try_into().map_err(|_| {
                CryptoError::InvalidKey(format!(
                    "expected {} bytes, got {}",
                    KEY_SIZE,
                    bytes.len()
                ))
            })?,
        );
        Self::new(&key)
    }

    /// Encrypt a plaintext credential under a fresh random nonce.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        self.rng.fill(&mut nonce_bytes).map_err(|_| CryptoError::Seal)?;

        let mut in_out = plaintext.as_bytes().to_vec();
        let tag = self
            .key
            .seal_in_place_separate_tag(
                Nonce::assume_unique_for_key(nonce_bytes),
                Aad::empty(),
                &mut in_out,
            )
            .map_err(|_| CryptoError::Seal)?;

        let mut blob = Vec::with_capacity(MIN_BLOB_SIZE + in_out.len());
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(tag.as_ref());
        blob.extend_from_slice(&in_out);

        Ok(hex::encode(blob))
    }

    /// Decrypt a hex blob produced by [`encrypt`](Self::encrypt).
    ///
    /// Fails closed: malformed hex, a short blob or a tag mismatch all
    /// produce an error and never partial plaintext.
    pub fn decrypt(&self, blob_hex: &str) -> Result<Zeroizing<String>, CryptoError> {
        let blob = hex::decode(blob_hex).map_err(|e| CryptoError::Malformed(e.to_string()))?;

        if blob.len() < MIN_BLOB_SIZE {
            return Err(CryptoError::Malformed(format!(
                "expected at least {} bytes, got {}",
                MIN_BLOB_SIZE,
                blob.len()
            )));
        }

        let (nonce_bytes, rest) = blob.split_at(NONCE_SIZE);
        let (tag, ciphertext) = rest.split_at(TAG_SIZE);
        let nonce_array: [u8; NONCE_SIZE] = nonce_bytes
            .try_into()
            .map_err(|_| CryptoError::Malformed("invalid nonce".to_string()))?;

        // ring expects ciphertext ‖ tag
        let mut in_out = Zeroizing::new(Vec::with_capacity(ciphertext.len() + TAG_SIZE));
        in_out.extend_from_slice(ciphertext);
        in_out.extend_from_slice(tag);

        let plaintext = self
            .key
            .open_in_place(
                Nonce::assume_unique_for_key(nonce_array),
                Aad::empty(),
                &mut in_out,
            )
            .map_err(|_| CryptoError::Authentication)?;

        let text = std::str::from_utf8(plaintext)
            .map_err(|_| CryptoError::Malformed("plaintext is not valid UTF-8".to_string()))?;
        Ok(Zeroizing::new(text.to_string()))
    }
}

/// Generate a random 256-bit key.
pub fn generate_key() -> Result<[u8; KEY_SIZE], CryptoError> {
    let rng = SystemRandom::new();
    let mut key = [0u8; KEY_SIZE];
    rng.fill(&mut key)
        .map_err(|_| CryptoError::InvalidKey("failed to generate random key".to_string()))?;
    Ok(key)
}

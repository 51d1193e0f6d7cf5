//! Crypto integration tests
//!
//! Note: Unit tests already exist in mcpgate_storage::crypto::tests

use mcpgate_storage::{generate_key, CredentialVault, CryptoError, KEY_SIZE};
use pretty_assertions::assert_eq;
use tests::fixtures::{tamper, vault};

#[test]
fn test_generate_key() {
    let key1 = generate_key().expect("Failed to generate key");
    let key2 = generate_key().expect("Failed to generate key");

    assert_ne!(key1, key2);
    assert_eq!(key1.len(), KEY_SIZE);
}

#[test]
fn test_encrypt_decrypt_roundtrip() {
    let vault = vault();

    let blob = vault.encrypt("ghp_secret_token").expect("Failed to encrypt");
    let decrypted = vault.decrypt(&blob).expect("Failed to decrypt");

    assert_eq!(decrypted.as_str(), "ghp_secret_token");
}

#[test]
fn test_blob_is_hex_nonce_tag_ciphertext() {
    let vault = vault();
    let plaintext = "abc123";

    let blob = vault.encrypt(plaintext).expect("Failed to encrypt");
    let bytes = hex::decode(&blob).expect("blob should be hex");

    // 12-byte nonce + 16-byte tag + ciphertext of plaintext length
    assert_eq!(bytes.len(), 12 + 16 + plaintext.len());
    assert!(!blob.contains(plaintext));
}

#[test]
fn test_same_plaintext_encrypts_differently() {
    let vault = vault();

    let blob1 = vault.encrypt("same").expect("Failed to encrypt");
    let blob2 = vault.encrypt("same").expect("Failed to encrypt");

    assert_ne!(blob1, blob2);
    assert_eq!(vault.decrypt(&blob1).unwrap().as_str(), "same");
    assert_eq!(vault.decrypt(&blob2).unwrap().as_str(), "same");
}

#[test]
fn test_decrypt_with_wrong_key_fails() {
    let blob = vault().encrypt("secret").expect("Failed to encrypt");

    let result = vault().decrypt(&blob);

    assert_eq!(result.unwrap_err(), CryptoError::Authentication);
}

#[test]
fn test_tampered_blob_fails_closed() {
    let vault = vault();
    let blob = vault.encrypt("secret").expect("Failed to encrypt");

    let result = vault.decrypt(&tamper(&blob));

    assert_eq!(result.unwrap_err(), CryptoError::Authentication);
}

#[test]
fn test_any_single_bit_flip_fails_authentication() {
    let vault = vault();
    let blob = vault.encrypt("ghp_secret").expect("Failed to encrypt");
    let bytes = hex::decode(&blob).expect("blob should be hex");

    // Nonce, tag and ciphertext are all covered
    for byte in 0..bytes.len() {
        for bit in 0..8 {
            let mut flipped = bytes.clone();
            flipped[byte] ^= 1 << bit;

            let result = vault.decrypt(&hex::encode(&flipped));

            assert_eq!(
                result.map(|s| s.to_string()),
                Err(CryptoError::Authentication),
                "flip of bit {} in byte {} was accepted",
                bit,
                byte
            );
        }
    }
}

#[test]
fn test_malformed_blobs_rejected() {
    let vault = vault();

    assert!(matches!(vault.decrypt("not hex"), Err(CryptoError::Malformed(_))));
    // Shorter than nonce + tag
    assert!(matches!(vault.decrypt(&"00".repeat(27)), Err(CryptoError::Malformed(_))));
}

#[test]
fn test_hex_key_loading() {
    let key = generate_key().expect("Failed to generate key");
    let hex_key = hex::encode(key);

    let from_hex = CredentialVault::from_hex_key(&hex_key).expect("valid key");
    let from_bytes = CredentialVault::new(&key).expect("valid key");

    let blob = from_hex.encrypt("shared").expect("Failed to encrypt");
    assert_eq!(from_bytes.decrypt(&blob).unwrap().as_str(), "shared");

    assert!(matches!(
        CredentialVault::from_hex_key(&hex_key[..62]),
        Err(CryptoError::InvalidKey(_))
    ));
    assert!(matches!(
        CredentialVault::from_hex_key(&"zz".repeat(32)),
        Err(CryptoError::InvalidKey(_))
    ));
}

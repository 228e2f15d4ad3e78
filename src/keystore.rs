//! Password-protected key files for plot-owning accounts.
//!
//! A keystore directory holds one JSON file per account. Each file carries
//! the account address in the clear and the 32-byte private key sealed
//! with AES-256-GCM under an Argon2-derived key. Secrets are wrapped in
//! zeroizing buffers so they leave memory when dropped.

use std::fs;
use std::path::{Path, PathBuf};

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use argon2::Argon2;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::Zeroizing;

use crate::types::{address_to_hex, parse_address, Address};

const KEYSTORE_VERSION: u32 = 1;
const SALT_BYTES: usize = 16;
const NONCE_BYTES: usize = 12;

#[derive(Debug, Error)]
pub enum KeystoreError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("malformed keystore file: {0}")]
    Format(String),

    #[error("key derivation failed")]
    Kdf,

    #[error("wrong password or corrupted keystore")]
    Decrypt,

    #[error("no keystore found for address {0}")]
    NotFound(String),
}

/// Cipher parameters of one sealed key. All byte fields are hex.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CryptoParams {
    pub ciphertext: String,
    pub nonce: String,
    pub salt: String,
}

/// On-disk keystore file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeystoreFile {
    pub address: String,
    pub crypto: CryptoParams,
    pub version: u32,
}

fn derive_cipher_key(password: &str, salt: &[u8]) -> Result<Zeroizing<[u8; 32]>, KeystoreError> {
    let mut key = Zeroizing::new([0u8; 32]);
    Argon2::default()
        .hash_password_into(password.as_bytes(), salt, key.as_mut())
        .map_err(|_| KeystoreError::Kdf)?;
    Ok(key)
}

/// Seal a private key under a password.
pub fn encrypt_key(
    address: &Address,
    private_key: &[u8; 32],
    password: &str,
) -> Result<KeystoreFile, KeystoreError> {
    let mut salt = [0u8; SALT_BYTES];
    let mut nonce = [0u8; NONCE_BYTES];
    rand::thread_rng().fill_bytes(&mut salt);
    rand::thread_rng().fill_bytes(&mut nonce);

    let key = derive_cipher_key(password, &salt)?;
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_ref()));
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), private_key.as_slice())
        .map_err(|_| KeystoreError::Kdf)?;

    Ok(KeystoreFile {
        address: address_to_hex(address),
        crypto: CryptoParams {
            ciphertext: hex::encode(ciphertext),
            nonce: hex::encode(nonce),
            salt: hex::encode(salt),
        },
        version: KEYSTORE_VERSION,
    })
}

/// Unseal a keystore file with its password.
pub fn decrypt_key(
    file: &KeystoreFile,
    password: &str,
) -> Result<Zeroizing<[u8; 32]>, KeystoreError> {
    let salt = hex::decode(&file.crypto.salt)
        .map_err(|e| KeystoreError::Format(format!("salt: {}", e)))?;
    let nonce = hex::decode(&file.crypto.nonce)
        .map_err(|e| KeystoreError::Format(format!("nonce: {}", e)))?;
    if nonce.len() != NONCE_BYTES {
        return Err(KeystoreError::Format("nonce length".to_string()));
    }
    let ciphertext = hex::decode(&file.crypto.ciphertext)
        .map_err(|e| KeystoreError::Format(format!("ciphertext: {}", e)))?;

    let key = derive_cipher_key(password, &salt)?;
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_ref()));
    let plain = Zeroizing::new(
        cipher
            .decrypt(Nonce::from_slice(&nonce), ciphertext.as_slice())
            .map_err(|_| KeystoreError::Decrypt)?,
    );

    if plain.len() != 32 {
        return Err(KeystoreError::Format("private key length".to_string()));
    }
    let mut out = Zeroizing::new([0u8; 32]);
    out.copy_from_slice(&plain);
    Ok(out)
}

/// Write a keystore file into a directory, named after its address.
pub fn store_key(keydir: &Path, file: &KeystoreFile) -> Result<PathBuf, KeystoreError> {
    let path = keydir.join(format!("{}.json", file.address.trim_start_matches("0x")));
    let json = serde_json::to_string_pretty(file)
        .map_err(|e| KeystoreError::Format(e.to_string()))?;
    fs::write(&path, json)?;
    Ok(path)
}

/// Locate the keystore for an address in a directory and unseal it.
/// Files that do not parse as keystores are skipped.
pub fn export_private_key(
    keydir: &Path,
    address: &Address,
    password: &str,
) -> Result<Zeroizing<[u8; 32]>, KeystoreError> {
    for entry in fs::read_dir(keydir)?.flatten() {
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }
        let Ok(raw) = fs::read_to_string(entry.path()) else {
            continue;
        };
        let Ok(file) = serde_json::from_str::<KeystoreFile>(&raw) else {
            continue;
        };
        let Ok(stored) = parse_address(&file.address) else {
            continue;
        };
        if &stored == address {
            return decrypt_key(&file, password);
        }
    }
    Err(KeystoreError::NotFound(address_to_hex(address)))
}

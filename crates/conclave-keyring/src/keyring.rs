//! A single member's keyring: installed keys plus the primary.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::KeyringError;

/// Accepted decoded key lengths (AES-128, AES-192, AES-256).
pub const KEY_LENGTHS: [usize; 3] = [16, 24, 32];

/// Reject anything that is not standard base64 of 16, 24 or 32 bytes.
pub fn validate_key(key: &str) -> Result<(), KeyringError> {
    let bytes = STANDARD
        .decode(key)
        .map_err(|e| KeyringError::InvalidKey(format!("not valid base64: {e}")))?;
    if !KEY_LENGTHS.contains(&bytes.len()) {
        return Err(KeyringError::InvalidKey(format!(
            "key must be 16, 24 or 32 bytes, got {}",
            bytes.len()
        )));
    }
    Ok(())
}

/// Keys in install order. The primary is always one of `keys`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyring {
    keys: Vec<String>,
    primary: String,
}

impl Keyring {
    /// A ring holding only `primary`.
    pub fn new(primary: impl Into<String>) -> Self {
        let primary = primary.into();
        Self {
            keys: vec![primary.clone()],
            primary,
        }
    }

    /// Build from a persisted list; the first entry becomes primary.
    pub fn from_keys(keys: Vec<String>) -> Result<Self, KeyringError> {
        let Some(primary) = keys.first().cloned() else {
            return Err(KeyringError::EmptyKeyring);
        };
        for key in &keys {
            validate_key(key)?;
        }
        let mut ring = Self::new(primary);
        for key in keys.into_iter().skip(1) {
            ring.install(key);
        }
        Ok(ring)
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Keys with the primary first, the order keyring files are written in.
    pub fn primary_first(&self) -> Vec<String> {
        let mut keys = Vec::with_capacity(self.keys.len());
        keys.push(self.primary.clone());
        keys.extend(self.keys.iter().filter(|k| **k != self.primary).cloned());
        keys
    }

    pub fn primary(&self) -> &str {
        &self.primary
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.iter().any(|k| k == key)
    }

    /// Add `key` without touching the primary. Installing twice is a no-op.
    pub fn install(&mut self, key: impl Into<String>) {
        let key = key.into();
        if !self.contains(&key) {
            self.keys.push(key);
        }
    }

    /// Promote an installed key to primary.
    pub fn use_key(&mut self, key: &str) -> Result<(), KeyringError> {
        if !self.contains(key) {
            return Err(KeyringError::KeyNotInstalled(key.to_string()));
        }
        self.primary = key.to_string();
        Ok(())
    }

    /// Drop a non-primary key. Removing an absent key succeeds.
    pub fn remove(&mut self, key: &str) -> Result<(), KeyringError> {
        if self.primary == key {
            return Err(KeyringError::InvalidKey(
                "removing the primary key is not allowed".to_string(),
            ));
        }
        self.keys.retain(|k| k != key);
        Ok(())
    }
}

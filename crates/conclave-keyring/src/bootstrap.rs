//! Keyring files: seeded once at first start, loaded on every start.

use std::path::{Path, PathBuf};

use conclave_common::{paths, persist};

use crate::error::KeyringError;
use crate::keyring::{validate_key, Keyring};

/// LAN keyring file name under the gossip state directory.
pub const LOCAL_KEYRING_FILE: &str = "local.keyring";

/// WAN keyring file name under the gossip state directory.
pub const FEDERATION_KEYRING_FILE: &str = "remote.keyring";

pub fn local_keyring_path(data_dir: &Path) -> PathBuf {
    paths::serf_dir(data_dir).join(LOCAL_KEYRING_FILE)
}

pub fn federation_keyring_path(data_dir: &Path) -> PathBuf {
    paths::serf_dir(data_dir).join(FEDERATION_KEYRING_FILE)
}

/// Seed `path` with a single-key ring unless a file is already there.
///
/// Returns `true` when this call wrote the file. An existing file is never
/// touched, whatever key it holds.
pub fn init_keyring_file(path: &Path, key: &str) -> Result<bool, KeyringError> {
    validate_key(key)?;
    let written = persist::write_json_new(path, &[key])?;
    if written {
        tracing::debug!(path = %path.display(), "Keyring file initialized");
    } else {
        tracing::info!(
            path = %path.display(),
            "Keyring file already exists, ignoring configured encryption key"
        );
    }
    Ok(written)
}

/// Read a keyring file. The first entry is the primary.
pub fn load_keyring_file(path: &Path) -> Result<Keyring, KeyringError> {
    let keys: Vec<String> = persist::read_json(path).map_err(|e| KeyringError::Load {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    Keyring::from_keys(keys).map_err(|e| KeyringError::Load {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// Rewrite a keyring file with the primary first.
pub fn save_keyring_file(path: &Path, keyring: &Keyring) -> Result<(), KeyringError> {
    persist::write_json_replace(path, &keyring.primary_first())?;
    tracing::debug!(path = %path.display(), keys = keyring.keys().len(), "Keyring file saved");
    Ok(())
}

/// The keyrings this node loaded at startup.
#[derive(Debug, Clone, Default)]
pub struct LoadedKeyrings {
    pub local: Option<Keyring>,
    pub federation: Option<Keyring>,
}

/// Seed (when `encrypt` is set) and then load the node's keyring files.
///
/// Servers handle both scopes. Other nodes only ever touch the local file
/// and ignore a federation file even if one exists.
pub fn bootstrap_keyrings(
    data_dir: &Path,
    encrypt: Option<&str>,
    server: bool,
) -> Result<LoadedKeyrings, KeyringError> {
    let local_path = local_keyring_path(data_dir);
    let federation_path = federation_keyring_path(data_dir);

    if let Some(key) = encrypt {
        init_keyring_file(&local_path, key)?;
        if server {
            init_keyring_file(&federation_path, key)?;
        }
    }

    let local = load_if_present(&local_path)?;
    let federation = if server {
        load_if_present(&federation_path)?
    } else {
        None
    };
    Ok(LoadedKeyrings { local, federation })
}

fn load_if_present(path: &Path) -> Result<Option<Keyring>, KeyringError> {
    if !path.exists() {
        return Ok(None);
    }
    load_keyring_file(path).map(Some)
}

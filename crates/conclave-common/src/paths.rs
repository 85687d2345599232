use std::path::{Path, PathBuf};

/// Environment override for the data directory.
pub const DATA_DIR_ENV: &str = "CONCLAVE_DATA_DIR";

/// Root data directory for the agent.
///
/// `CONCLAVE_DATA_DIR` wins when set; otherwise:
/// - Linux: `~/.conclave/`
/// - macOS: `~/Library/Application Support/conclave/`
/// - Windows: `%LOCALAPPDATA%\conclave\`
pub fn conclave_data_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(DATA_DIR_ENV) {
        return PathBuf::from(dir);
    }

    #[cfg(target_os = "macos")]
    {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("conclave");
        }
    }

    #[cfg(windows)]
    {
        if let Some(local) = std::env::var_os("LOCALAPPDATA") {
            return PathBuf::from(local).join("conclave");
        }
    }

    #[cfg(not(any(target_os = "macos", windows)))]
    {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(".conclave");
        }
    }

    PathBuf::from(".conclave")
}

/// Gossip state directory (keyring files) under a data dir.
pub fn serf_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("serf")
}

/// Log directory under a data dir.
pub fn log_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("logs")
}

//! Data directory initialization.
//!
//! Ensures the data directory layout exists and holds a commented
//! `config.toml` if none is there yet. Called once during agent startup.

use std::path::Path;

use conclave_common::paths;

/// Default content for a freshly created config.toml.
pub const DEFAULT_CONFIG_TOML: &str = "\
# Conclave agent configuration

# node_name = \"\"
# datacenter = \"dc1\"
# server = false
# encrypt = \"<base64 gossip key>\"

# [http]
# port = 8500

# [acl]
# enabled = false
# default_policy = \"allow\"
";

/// Ensure the data directory structure exists.
///
/// Creates:
/// - `<data_dir>/`
/// - `<data_dir>/config.toml` (if not already present)
/// - `<data_dir>/serf/`
/// - `<data_dir>/logs/`
///
/// Errors are logged but not fatal; keyring bootstrap reports its own
/// failure if `serf/` is still missing.
pub fn ensure_data_dir(data_dir: &Path) {
    if let Err(e) = std::fs::create_dir_all(data_dir) {
        tracing::warn!(
            path = %data_dir.display(),
            error = %e,
            "Could not create data directory"
        );
        return;
    }

    for path in [paths::serf_dir(data_dir), paths::log_dir(data_dir)] {
        if let Err(e) = std::fs::create_dir_all(&path) {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Could not create subdirectory"
            );
        }
    }

    let config_path = data_dir.join("config.toml");
    if !config_path.exists() {
        match std::fs::write(&config_path, DEFAULT_CONFIG_TOML) {
            Ok(()) => tracing::debug!(path = %config_path.display(), "Created default config"),
            Err(e) => tracing::warn!(
                path = %config_path.display(),
                error = %e,
                "Could not write default config"
            ),
        }
    }

    tracing::debug!(path = %data_dir.display(), "Data directory ready");
}

//! Agent configuration.
//!
//! [`AgentConfig`] is read from an optional TOML file; every field has a
//! default so an empty file (or none at all) yields a runnable dev agent.
//! The binary layers CLI flags on top after loading.

pub mod dirs;

use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use conclave_acl::AclConfig;
use conclave_common::paths;
use serde::{Deserialize, Serialize};

/// Default HTTP API port.
pub const DEFAULT_HTTP_PORT: u16 = 8500;

pub const DEFAULT_DATACENTER: &str = "dc1";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Node name; empty means "use the hostname".
    pub node_name: String,
    pub datacenter: String,
    pub server: bool,
    /// Pretty-print every API response.
    pub dev_mode: bool,
    pub data_dir: Option<PathBuf>,
    pub acl: AclConfig,
    pub http: HttpConfig,
    /// Base64 gossip key written to the keyring files on first start.
    pub encrypt: Option<String>,
    /// Skip keyring files entirely; `encrypt` is then ignored.
    pub disable_keyring_file: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            node_name: String::new(),
            datacenter: DEFAULT_DATACENTER.to_string(),
            server: false,
            dev_mode: false,
            data_dir: None,
            acl: AclConfig::default(),
            http: HttpConfig::default(),
            encrypt: None,
            disable_keyring_file: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: IpAddr,
    /// Plain HTTP port; `None` disables the TCP listener.
    pub port: Option<u16>,
    /// HTTPS port, used only when `tls` is set.
    pub https_port: Option<u16>,
    pub tls: Option<TlsConfig>,
    pub unix_socket: Option<PathBuf>,
    /// Octal permission bits for the unix socket, e.g. `"0660"`.
    pub unix_socket_mode: Option<String>,
    /// Headers added to every API response.
    pub response_headers: BTreeMap<String, String>,
    pub translate_wan_addrs: bool,
    pub cors: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: Some(DEFAULT_HTTP_PORT),
            https_port: None,
            tls: None,
            unix_socket: None,
            unix_socket_mode: None,
            response_headers: BTreeMap::new(),
            translate_wan_addrs: false,
            cors: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsConfig {
    pub cert_file: PathBuf,
    pub key_file: PathBuf,
}

impl AgentConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if it exists, defaults otherwise.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.datacenter.is_empty() {
            return Err(ConfigError::Invalid("datacenter must not be empty".into()));
        }
        if self.http.https_port.is_some() && self.http.tls.is_none() {
            return Err(ConfigError::Invalid(
                "http.https_port requires http.tls".into(),
            ));
        }
        self.http.unix_socket_mode()?;
        Ok(())
    }

    /// Configured data dir, or the platform default.
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(paths::conclave_data_dir)
    }

    /// Token applied to requests that carry none.
    pub fn default_token(&self) -> &str {
        self.acl.default_token.as_deref().unwrap_or_default()
    }
}

impl HttpConfig {
    pub fn http_addr(&self) -> Option<SocketAddr> {
        self.port.map(|port| SocketAddr::new(self.bind, port))
    }

    pub fn https_addr(&self) -> Option<SocketAddr> {
        match (&self.tls, self.https_port) {
            (Some(_), Some(port)) => Some(SocketAddr::new(self.bind, port)),
            _ => None,
        }
    }

    /// Parsed socket mode; accepts `"660"`, `"0660"` and `"0o660"`.
    pub fn unix_socket_mode(&self) -> Result<Option<u32>, ConfigError> {
        let Some(raw) = self.unix_socket_mode.as_deref() else {
            return Ok(None);
        };
        let digits = raw.strip_prefix("0o").unwrap_or(raw);
        match u32::from_str_radix(digits, 8) {
            Ok(mode) if mode <= 0o7777 => Ok(Some(mode)),
            _ => Err(ConfigError::Invalid(format!(
                "http.unix_socket_mode {raw:?} is not an octal mode"
            ))),
        }
    }
}

use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Parser, Subcommand};
use conclave_config::AgentConfig;

#[derive(Parser, Debug)]
#[command(name = "conclave", version, about = "Cluster agent with a Consul-compatible HTTP API")]
pub struct Cli {
    /// Agent config file (default: <data-dir>/config.toml)
    #[arg(long, env = "CONCLAVE_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Data directory for keyring files and logs
    #[arg(long, env = "CONCLAVE_DATA_DIR", value_name = "PATH")]
    pub data_dir: Option<PathBuf>,

    /// Node name (default: hostname)
    #[arg(long, env = "CONCLAVE_NODE")]
    pub node: Option<String>,

    /// Datacenter this agent belongs to
    #[arg(long, env = "CONCLAVE_DATACENTER")]
    pub datacenter: Option<String>,

    /// Run as a server (joins the federation keyring scope)
    #[arg(long, env = "CONCLAVE_SERVER")]
    pub server: bool,

    /// Developer mode: pretty-print every response
    #[arg(long)]
    pub dev: bool,

    /// Address the HTTP listeners bind to
    #[arg(long, env = "CONCLAVE_BIND")]
    pub bind: Option<IpAddr>,

    /// HTTP API port
    #[arg(long, env = "CONCLAVE_HTTP_PORT")]
    pub http_port: Option<u16>,

    /// Gossip encryption key seeded into new keyring files
    #[arg(long, env = "CONCLAVE_ENCRYPT", hide_env_values = true)]
    pub encrypt: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, env = "CONCLAVE_LOG", default_value = "info")]
    pub log_level: String,

    /// Increase verbosity (-v = debug, -vv = trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Write logs to file (in addition to stderr)
    #[arg(long, env = "CONCLAVE_LOG_FILE", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,

    /// How long in-flight requests may run after shutdown starts
    #[arg(long, default_value = "5s", value_parser = humantime::parse_duration)]
    pub drain_timeout: Duration,

    /// Output JSON instead of human-readable text
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show version information
    Version,
    /// Load and validate the configuration, then exit
    Validate,
}

impl Cli {
    /// Config file to read and whether it must exist.
    pub fn config_path(&self) -> (PathBuf, bool) {
        match &self.config {
            Some(path) => (path.clone(), true),
            None => {
                let data_dir = self
                    .data_dir
                    .clone()
                    .unwrap_or_else(conclave_common::paths::conclave_data_dir);
                (data_dir.join("config.toml"), false)
            }
        }
    }

    /// Flags given on the command line override file values.
    pub fn apply(&self, config: &mut AgentConfig) {
        if let Some(dir) = &self.data_dir {
            config.data_dir = Some(dir.clone());
        }
        if let Some(node) = &self.node {
            config.node_name = node.clone();
        }
        if let Some(dc) = &self.datacenter {
            config.datacenter = dc.clone();
        }
        if self.server {
            config.server = true;
        }
        if self.dev {
            config.dev_mode = true;
        }
        if let Some(bind) = self.bind {
            config.http.bind = bind;
        }
        if let Some(port) = self.http_port {
            config.http.port = Some(port);
        }
        if let Some(key) = &self.encrypt {
            config.encrypt = Some(key.clone());
        }
    }
}

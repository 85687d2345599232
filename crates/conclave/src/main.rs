mod agent;
pub(crate) mod cli;

use std::time::Duration;

use clap::Parser;
use conclave_config::AgentConfig;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use cli::{Cli, Command};

/// Maximum time to wait for orderly shutdown before forcing exit.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(20);

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => cli.log_level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    let env_filter = tracing_subscriber::EnvFilter::try_new(level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    // Hold the non-blocking guards for the lifetime of main so logs flush on exit.
    let _log_guards = init_logging(env_filter, cli.log_file.as_deref())?;

    match &cli.command {
        Some(Command::Version) => {
            if cli.json {
                println!(
                    "{}",
                    serde_json::json!({
                        "version": env!("CARGO_PKG_VERSION"),
                        "platform": std::env::consts::OS,
                    })
                );
            } else {
                println!("conclave {}", env!("CARGO_PKG_VERSION"));
            }
            return Ok(());
        }
        Some(Command::Validate) => {
            load_config(&cli)?;
            println!("Configuration is valid.");
            return Ok(());
        }
        None => {}
    }

    let config = load_config(&cli)?;
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run_agent(config, cli.drain_timeout))
}

fn load_config(cli: &Cli) -> anyhow::Result<AgentConfig> {
    let (path, required) = cli.config_path();
    let mut config = if required {
        AgentConfig::load(&path)?
    } else {
        AgentConfig::load_or_default(&path)?
    };
    cli.apply(&mut config);
    config.node_name = agent::resolve_node_name(&config);
    config.validate()?;
    Ok(config)
}

async fn run_agent(config: AgentConfig, drain: Duration) -> anyhow::Result<()> {
    let data_dir = config.data_dir();
    conclave_config::dirs::ensure_data_dir(&data_dir);
    startup_diagnostics(&config);

    let app = agent::build_router(&config, &data_dir)?;
    let cancel = CancellationToken::new();
    let mut tasks: Vec<JoinHandle<()>> = Vec::new();

    if let Some(addr) = config.http.http_addr() {
        let listener = conclave_http::bind_tcp(addr)
            .map_err(|e| anyhow::anyhow!("Failed to bind HTTP listener on {addr}: {e}"))?;
        let (app, token) = (app.clone(), cancel.clone());
        tasks.push(tokio::spawn(async move {
            if let Err(e) = conclave_http::serve_tcp(listener, app, token, drain).await {
                tracing::error!(error = %e, "HTTP listener failed");
            }
        }));
    }

    if let (Some(addr), Some(tls)) = (config.http.https_addr(), config.http.tls.clone()) {
        let listener = conclave_http::bind_tcp(addr)
            .map_err(|e| anyhow::anyhow!("Failed to bind HTTPS listener on {addr}: {e}"))?;
        let files = conclave_http::TlsFiles {
            cert: tls.cert_file,
            key: tls.key_file,
        };
        let (app, token) = (app.clone(), cancel.clone());
        tasks.push(tokio::spawn(async move {
            if let Err(e) = conclave_http::serve_tls(listener, &files, app, token, drain).await {
                tracing::error!(error = %e, "HTTPS listener failed");
            }
        }));
    }

    #[cfg(unix)]
    if let Some(path) = config.http.unix_socket.clone() {
        let mode = config.http.unix_socket_mode()?;
        let (app, token) = (app.clone(), cancel.clone());
        tasks.push(tokio::spawn(async move {
            if let Err(e) = conclave_http::serve_unix(&path, mode, app, token, drain).await {
                tracing::error!(error = %e, path = %path.display(), "Unix socket listener failed");
            }
        }));
    }

    if tasks.is_empty() {
        anyhow::bail!("No HTTP listener configured");
    }
    tracing::info!("Ready.");

    shutdown_signal().await;
    tracing::info!("Shutting down...");

    let shutdown = async {
        cancel.cancel();
        for task in tasks {
            let _ = task.await;
        }
    };
    if tokio::time::timeout(SHUTDOWN_TIMEOUT, shutdown).await.is_err() {
        tracing::warn!("Shutdown timed out after {:?}, forcing exit", SHUTDOWN_TIMEOUT);
    }
    Ok(())
}

/// Wait for Ctrl+C.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}

fn startup_diagnostics(config: &AgentConfig) {
    tracing::info!("Conclave v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        node = %config.node_name,
        datacenter = %config.datacenter,
        server = config.server,
        "Agent identity"
    );
    tracing::info!("Data dir: {}", config.data_dir().display());
    if config.acl.enabled {
        tracing::info!(default_policy = ?config.acl.default_policy, "ACLs enabled");
    }
    match config.http.http_addr() {
        Some(addr) => tracing::info!("HTTP: {addr}"),
        None => tracing::info!("HTTP listener: disabled"),
    }
    if let Some(addr) = config.http.https_addr() {
        tracing::info!("HTTPS: {addr}");
    }
    if let Some(path) = &config.http.unix_socket {
        tracing::info!("Unix socket: {}", path.display());
    }
}

/// Initialize tracing with stderr + optional file output.
/// Returns guards that must be held for the lifetime of the program
/// to ensure the non-blocking writers flush on shutdown.
fn init_logging(
    env_filter: tracing_subscriber::EnvFilter,
    log_file: Option<&std::path::Path>,
) -> anyhow::Result<Vec<tracing_appender::non_blocking::WorkerGuard>> {
    use tracing_subscriber::prelude::*;

    let (nb_stderr, stderr_guard) = tracing_appender::non_blocking(std::io::stderr());
    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(nb_stderr);

    if let Some(path) = log_file {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        let (nb_file, file_guard) = tracing_appender::non_blocking(file);
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(nb_file);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();

        Ok(vec![stderr_guard, file_guard])
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();

        Ok(vec![stderr_guard])
    }
}

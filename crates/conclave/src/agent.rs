//! Startup wiring: configuration in, a ready-to-serve router out.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use axum::Router;
use conclave_acl::AccessGuard;
use conclave_config::AgentConfig;
use conclave_http::{Gateway, GatewayConfig};
use conclave_keyring::bootstrap::{federation_keyring_path, local_keyring_path};
use conclave_keyring::{
    bootstrap_keyrings, validate_key, Keyring, KeyringScope, LoadedKeyrings, MemoryCluster,
    RotationCoordinator,
};
use conclave_store::{MemoryStore, Node};

/// Node name from config, falling back to the hostname.
pub fn resolve_node_name(config: &AgentConfig) -> String {
    if !config.node_name.is_empty() {
        return config.node_name.clone();
    }
    match hostname::get() {
        Ok(h) => h.to_string_lossy().into_owned(),
        Err(e) => {
            tracing::warn!(error = %e, "Could not determine hostname, using \"conclave\"");
            "conclave".to_string()
        }
    }
}

/// Build the gateway for `config`, seeding and loading keyring files under
/// `data_dir`. `config.node_name` must already be resolved.
pub fn build_router(config: &AgentConfig, data_dir: &Path) -> anyhow::Result<Router> {
    let node_name = config.node_name.clone();
    let guard = AccessGuard::from_config(config.acl.clone());

    let store = Arc::new(MemoryStore::new(
        guard.clone(),
        config.datacenter.clone(),
        Some(node_name.clone()),
    ));
    store.register_node(Node {
        node: node_name.clone(),
        address: config.http.bind.to_string(),
        datacenter: config.datacenter.clone(),
        meta: BTreeMap::new(),
    });

    let keyrings = load_keyrings(config, data_dir)?;
    if keyrings.local.is_none() {
        tracing::info!("Gossip encryption disabled, no keyring loaded");
    }
    let mut cluster = MemoryCluster::from_keyrings(
        &node_name,
        &config.datacenter,
        keyrings.local,
        keyrings.federation,
    );
    if !config.disable_keyring_file {
        cluster = cluster.with_keyring_file(KeyringScope::Local, local_keyring_path(data_dir));
        if config.server {
            cluster = cluster
                .with_keyring_file(KeyringScope::Federation, federation_keyring_path(data_dir));
        }
    }
    let coordinator = Arc::new(RotationCoordinator::new(
        guard.clone(),
        Arc::new(cluster),
        config.server,
    ));

    let gateway_config = GatewayConfig {
        node_name,
        datacenter: config.datacenter.clone(),
        server: config.server,
        dev_mode: config.dev_mode,
        default_token: config.default_token().to_string(),
        response_headers: config.http.response_headers.clone(),
        translate_wan_addrs: config.http.translate_wan_addrs,
        cors: config.http.cors,
    };
    Ok(Gateway::new(gateway_config, guard, store, coordinator).into_router())
}

fn load_keyrings(config: &AgentConfig, data_dir: &Path) -> anyhow::Result<LoadedKeyrings> {
    let encrypt = config.encrypt.as_deref();
    if !config.disable_keyring_file {
        return Ok(bootstrap_keyrings(data_dir, encrypt, config.server)?);
    }

    // Without keyring files the configured key lives in memory only.
    let Some(key) = encrypt else {
        return Ok(LoadedKeyrings::default());
    };
    validate_key(key)?;
    Ok(LoadedKeyrings {
        local: Some(Keyring::new(key)),
        federation: config.server.then(|| Keyring::new(key)),
    })
}

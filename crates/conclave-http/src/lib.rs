//! Conclave HTTP: the agent's API gateway.
//!
//! Every API route is a [`router::RouteDescriptor`] whose handler runs
//! inside [`pipeline`]: query options are parsed up front, failures become
//! a status plus raw message, successes become JSON with the consistency
//! metadata headers, and each request leaves one token-redacted audit line.
//! The same router is served over TCP, TLS and a unix socket.

pub mod error;
mod handlers;
pub mod listener;
pub mod pipeline;
pub mod query;
pub mod response;
pub mod router;

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::Router;
use conclave_acl::AccessGuard;
use conclave_keyring::RotationCoordinator;
use conclave_store::StateStore;

pub use error::GatewayError;
pub use listener::{bind_tcp, serve_tcp, serve_tls, TlsFiles};
#[cfg(unix)]
pub use listener::serve_unix;
pub use query::{parse_query_options, ParseError, QueryParams};
pub use response::Reply;
pub use router::{build_router, route_table, RouteDescriptor};

/// Agent settings the gateway reads on every request.
#[derive(Debug, Clone, Default)]
pub struct GatewayConfig {
    pub node_name: String,
    pub datacenter: String,
    pub server: bool,
    /// Pretty-print every response.
    pub dev_mode: bool,
    /// Token used when a request carries none.
    pub default_token: String,
    /// Extra headers set on every API response.
    pub response_headers: BTreeMap<String, String>,
    pub translate_wan_addrs: bool,
    /// Wrap the router in a permissive CORS layer.
    pub cors: bool,
}

/// Shared state behind every route.
pub struct Gateway {
    pub config: GatewayConfig,
    pub guard: AccessGuard,
    pub store: Arc<dyn StateStore>,
    pub keyring: Arc<RotationCoordinator>,
}

impl Gateway {
    pub fn new(
        config: GatewayConfig,
        guard: AccessGuard,
        store: Arc<dyn StateStore>,
        keyring: Arc<RotationCoordinator>,
    ) -> Self {
        Self {
            config,
            guard,
            store,
            keyring,
        }
    }

    /// The full API router over the standard route table.
    pub fn into_router(self) -> Router {
        build_router(Arc::new(self), route_table())
    }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

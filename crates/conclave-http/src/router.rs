//! The route table, built once at startup and never mutated.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::Router;
use conclave_common::http::error_response_with_status;
use tower_http::cors::CorsLayer;

use crate::handlers;
use crate::pipeline::{self, instrumentation_key, HandlerFn};
use crate::Gateway;

/// Body of `GET /`.
pub const INDEX_BODY: &str = "Conclave Agent";

/// One API route. A pattern ending in `/` also matches everything below it.
#[derive(Clone, Copy)]
pub struct RouteDescriptor {
    pub pattern: &'static str,
    pub handler: HandlerFn,
    pub instrumented: bool,
}

impl std::fmt::Debug for RouteDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteDescriptor")
            .field("pattern", &self.pattern)
            .field("instrumented", &self.instrumented)
            .finish_non_exhaustive()
    }
}

/// A descriptor with its metric key computed once.
#[derive(Debug)]
pub(crate) struct BoundRoute {
    pub(crate) descriptor: RouteDescriptor,
    pub(crate) metric_key: String,
}

impl BoundRoute {
    fn new(descriptor: RouteDescriptor) -> Self {
        Self {
            metric_key: instrumentation_key(descriptor.pattern).join("."),
            descriptor,
        }
    }
}

fn route(pattern: &'static str, handler: HandlerFn) -> RouteDescriptor {
    RouteDescriptor {
        pattern,
        handler,
        instrumented: true,
    }
}

/// Every API route the agent serves.
pub fn route_table() -> Vec<RouteDescriptor> {
    vec![
        route("/v1/agent/self", |gw, ctx| {
            Box::pin(handlers::agent::agent_self(gw, ctx))
        }),
        route("/v1/catalog/nodes", |gw, ctx| {
            Box::pin(handlers::catalog::catalog_nodes(gw, ctx))
        }),
        route("/v1/kv/", |gw, ctx| Box::pin(handlers::kv::kv_endpoint(gw, ctx))),
        route("/v1/operator/keyring", |gw, ctx| {
            Box::pin(handlers::operator::keyring_endpoint(gw, ctx))
        }),
        route("/v1/status/leader", |gw, ctx| {
            Box::pin(handlers::status::status_leader(gw, ctx))
        }),
    ]
}

/// Build the axum router for `routes`. Every listener serves the result.
pub fn build_router(gateway: Arc<Gateway>, routes: Vec<RouteDescriptor>) -> Router {
    let cors = gateway.config.cors;
    let mut app = Router::new().route("/", any(index));

    for descriptor in routes {
        let bound = Arc::new(BoundRoute::new(descriptor));
        let mut paths = vec![descriptor.pattern.to_string()];
        if descriptor.pattern.ends_with('/') {
            paths.push(format!("{}{{*rest}}", descriptor.pattern));
        }
        for path in paths {
            let bound = bound.clone();
            app = app.route(
                &path,
                any(move |State(gw): State<Arc<Gateway>>, req: Request| {
                    let bound = bound.clone();
                    async move { pipeline::serve(gw, bound, req).await }
                }),
            );
        }
    }

    let mut app = app.fallback(not_found).with_state(gateway);
    if cors {
        app = app.layer(CorsLayer::permissive());
    }
    app
}

async fn index() -> &'static str {
    INDEX_BODY
}

async fn not_found() -> Response {
    error_response_with_status(StatusCode::NOT_FOUND, "404 page not found").into_response()
}

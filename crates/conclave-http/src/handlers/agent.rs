use std::sync::Arc;

use axum::http::Method;
use conclave_acl::Capability;
use serde::Serialize;

use crate::error::GatewayError;
use crate::pipeline::RequestContext;
use crate::response::Reply;
use crate::Gateway;

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct AgentSelf<'a> {
    config: AgentInfo<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct AgentInfo<'a> {
    node_name: &'a str,
    datacenter: &'a str,
    server: bool,
    version: &'static str,
}

/// GET /v1/agent/self: this agent's identity.
pub(crate) async fn agent_self(
    gateway: Arc<Gateway>,
    ctx: RequestContext,
) -> Result<Reply, GatewayError> {
    if ctx.method != Method::GET {
        return Err(GatewayError::MethodNotAllowed);
    }
    gateway
        .guard
        .authorize(&ctx.options.token, Capability::OperatorRead)
        .await?;

    let config = &gateway.config;
    Reply::json(&AgentSelf {
        config: AgentInfo {
            node_name: &config.node_name,
            datacenter: &config.datacenter,
            server: config.server,
            version: env!("CARGO_PKG_VERSION"),
        },
    })
}

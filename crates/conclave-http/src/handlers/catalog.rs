use std::sync::Arc;

use axum::http::Method;

use crate::error::GatewayError;
use crate::pipeline::RequestContext;
use crate::response::Reply;
use crate::Gateway;

/// GET /v1/catalog/nodes: honours `node-meta` filters and `near`.
pub(crate) async fn catalog_nodes(
    gateway: Arc<Gateway>,
    ctx: RequestContext,
) -> Result<Reply, GatewayError> {
    if ctx.method != Method::GET {
        return Err(GatewayError::MethodNotAllowed);
    }
    let (nodes, meta) = gateway.store.catalog_nodes(&ctx.options).await?;
    Ok(Reply::json(&nodes)?.with_meta(meta))
}

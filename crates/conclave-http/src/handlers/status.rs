use std::sync::Arc;

use axum::http::Method;

use crate::error::GatewayError;
use crate::pipeline::RequestContext;
use crate::response::Reply;
use crate::Gateway;

/// GET /v1/status/leader: the leader's address as a JSON string.
pub(crate) async fn status_leader(
    gateway: Arc<Gateway>,
    ctx: RequestContext,
) -> Result<Reply, GatewayError> {
    if ctx.method != Method::GET {
        return Err(GatewayError::MethodNotAllowed);
    }
    let leader = gateway.store.leader(&ctx.options).await?;
    Reply::json(&leader)
}

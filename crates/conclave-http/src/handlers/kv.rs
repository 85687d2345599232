//! `/v1/kv/<key>`: read, list, write and delete entries.

use std::sync::Arc;

use axum::http::{Method, StatusCode};

use crate::error::GatewayError;
use crate::pipeline::RequestContext;
use crate::response::Reply;
use crate::Gateway;

const PREFIX: &str = "/v1/kv/";

pub(crate) async fn kv_endpoint(
    gateway: Arc<Gateway>,
    ctx: RequestContext,
) -> Result<Reply, GatewayError> {
    let key = ctx.path_suffix(PREFIX);
    match ctx.method {
        Method::GET => kv_get(&gateway, &ctx, key).await,
        Method::PUT => kv_put(&gateway, &ctx, key).await,
        Method::DELETE => kv_delete(&gateway, &ctx, key).await,
        _ => Err(GatewayError::MethodNotAllowed),
    }
}

async fn kv_get(gateway: &Gateway, ctx: &RequestContext, key: &str) -> Result<Reply, GatewayError> {
    if ctx.params.has("recurse") {
        let (entries, meta) = gateway.store.kv_list(key, &ctx.options).await?;
        if entries.is_empty() {
            return Ok(Reply::status(StatusCode::NOT_FOUND).with_meta(meta));
        }
        return Ok(Reply::json(&entries)?.with_meta(meta));
    }

    let (entry, meta) = gateway.store.kv_get(key, &ctx.options).await?;
    match entry {
        Some(entry) => Ok(Reply::json(&[entry])?.with_meta(meta)),
        None => Ok(Reply::status(StatusCode::NOT_FOUND).with_meta(meta)),
    }
}

async fn kv_put(gateway: &Gateway, ctx: &RequestContext, key: &str) -> Result<Reply, GatewayError> {
    if key.is_empty() {
        return Err(GatewayError::MissingKey);
    }
    let flags = match ctx.params.get("flags").filter(|f| !f.is_empty()) {
        Some(raw) => raw.parse::<u64>().map_err(|_| GatewayError::InvalidFlags)?,
        None => 0,
    };
    let ok = gateway
        .store
        .kv_put(key, ctx.body.to_vec(), flags, &ctx.options)
        .await?;
    Reply::json(&ok)
}

async fn kv_delete(
    gateway: &Gateway,
    ctx: &RequestContext,
    key: &str,
) -> Result<Reply, GatewayError> {
    if key.is_empty() {
        return Err(GatewayError::MissingKey);
    }
    let recurse = ctx.params.has("recurse");
    let ok = gateway.store.kv_delete(key, recurse, &ctx.options).await?;
    Reply::json(&ok)
}

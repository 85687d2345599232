//! `/v1/operator/keyring`: GET lists, POST installs, PUT promotes,
//! DELETE removes.

use std::sync::Arc;

use axum::http::Method;
use conclave_keyring::KeyringRequest;

use crate::error::GatewayError;
use crate::pipeline::RequestContext;
use crate::query::parse_relay_factor;
use crate::response::Reply;
use crate::Gateway;

pub(crate) async fn keyring_endpoint(
    gateway: Arc<Gateway>,
    ctx: RequestContext,
) -> Result<Reply, GatewayError> {
    let relay_factor = parse_relay_factor(&ctx.params)?;
    let token = ctx.options.token.as_str();
    let coordinator = &gateway.keyring;

    let results = match ctx.method {
        Method::GET => coordinator.list(token, relay_factor).await?,
        Method::POST => {
            let key = decode_key(&ctx)?;
            coordinator.install(token, &key, relay_factor).await?
        }
        Method::PUT => {
            let key = decode_key(&ctx)?;
            coordinator.use_key(token, &key, relay_factor).await?
        }
        Method::DELETE => {
            let key = decode_key(&ctx)?;
            coordinator.remove(token, &key, relay_factor).await?
        }
        _ => return Err(GatewayError::MethodNotAllowed),
    };
    Reply::json(&results)
}

fn decode_key(ctx: &RequestContext) -> Result<String, GatewayError> {
    let request: KeyringRequest =
        serde_json::from_slice(&ctx.body).map_err(|e| GatewayError::Decode(e.to_string()))?;
    Ok(request.key)
}

//! The wrapper every API route runs through.
//!
//! Per request: parse options, run the handler, map failures to a status
//! with the raw error text as body, encode successes, apply the configured
//! headers, then log one audit line with the token-redacted URL.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::body::{Body, Bytes};
use axum::extract::{ConnectInfo, Request};
use axum::http::{HeaderMap, Method};
use axum::response::Response;
use conclave_common::error::ErrorCode;
use conclave_common::http::error_response;
use conclave_store::QueryOptions;
use futures_util::future::BoxFuture;

use crate::error::GatewayError;
use crate::query::{parse_query_options, QueryParams};
use crate::response::{set_static_headers, set_translate_addresses, Reply};
use crate::router::BoundRoute;
use crate::Gateway;

/// Stand-in for token values in logged URLs.
pub const REDACTED: &str = "<hidden>";

/// Largest request body read into memory.
pub const MAX_BODY_BYTES: usize = 512 * 1024;

/// Everything a handler needs about its request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub method: Method,
    pub path: String,
    pub params: QueryParams,
    pub headers: HeaderMap,
    pub options: QueryOptions,
    pub body: Bytes,
    pub remote: Option<SocketAddr>,
}

impl RequestContext {
    /// Path remainder after `prefix`, empty if the path is the prefix.
    pub fn path_suffix(&self, prefix: &str) -> &str {
        self.path.strip_prefix(prefix).unwrap_or_default()
    }
}

pub type HandlerFuture = BoxFuture<'static, Result<Reply, GatewayError>>;

/// Domain handler: a plain function so the route table stays a static list.
pub type HandlerFn = fn(Arc<Gateway>, RequestContext) -> HandlerFuture;

/// Copy of `url` with every `token` value replaced by [`REDACTED`].
///
/// Each raw `token` pair in the query keeps its key as sent and gets the
/// marker as its value, whatever encoding the client used, so an empty or
/// bare `token` still shows. Any other occurrence of a token value in the
/// path or in other parameters is replaced as well.
pub fn redact_url(url: &str) -> String {
    let Some((head, query)) = url.split_once('?') else {
        return url.to_string();
    };
    let tokens: Vec<String> = url::form_urlencoded::parse(query.as_bytes())
        .filter(|(key, _)| key == "token")
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
        .collect();
    let scrub = |text: &str| {
        let mut text = text.to_string();
        for token in &tokens {
            text = text.replace(token.as_str(), REDACTED);
            let encoded: String = url::form_urlencoded::byte_serialize(token.as_bytes()).collect();
            if encoded != *token {
                text = text.replace(&encoded, REDACTED);
            }
        }
        text
    };

    let pairs: Vec<String> = query
        .split('&')
        .map(|pair| {
            let raw_key = pair.split_once('=').map_or(pair, |(key, _)| key);
            let is_token = url::form_urlencoded::parse(raw_key.as_bytes())
                .next()
                .is_some_and(|(key, _)| key == "token");
            if is_token {
                format!("{raw_key}={REDACTED}")
            } else {
                scrub(pair)
            }
        })
        .collect();
    format!("{}?{}", scrub(head), pairs.join("&"))
}

/// Metric key segments for a route pattern: the leading empty segment is
/// dropped and any other empty segment becomes `_`, so `/v1/kv/` and every
/// `/v1/kv/<key>` share `v1.kv._`.
pub fn instrumentation_key(pattern: &str) -> Vec<String> {
    pattern
        .split('/')
        .enumerate()
        .filter_map(|(i, part)| match (i, part) {
            (0, "") => None,
            (_, "") => Some("_".to_string()),
            (_, part) => Some(part.to_string()),
        })
        .collect()
}

pub(crate) async fn serve(gateway: Arc<Gateway>, route: Arc<BoundRoute>, req: Request) -> Response {
    let started = Instant::now();
    let (parts, body) = req.into_parts();

    let remote = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let from = remote.map_or_else(|| "@".to_string(), |addr| addr.to_string());
    let method = parts.method.clone();
    let params = QueryParams::parse(parts.uri.query());
    let url = redact_url(&parts.uri.to_string());
    let pretty = params.has("pretty") || gateway.config.dev_mode;

    let outcome = async {
        let options = parse_query_options(&params, &parts.headers, &gateway.config)?;
        let body = read_body(body).await?;
        let ctx = RequestContext {
            method: parts.method.clone(),
            path: parts.uri.path().to_string(),
            params: params.clone(),
            headers: parts.headers.clone(),
            options,
            body,
            remote,
        };
        let reply = (route.descriptor.handler)(gateway.clone(), ctx).await?;
        reply.into_response(pretty)
    }
    .await;

    let mut response = match outcome {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(
                target: "conclave::http",
                %method,
                %url,
                error = %e,
                %from,
                "Request failed"
            );
            error_response(ErrorCode::from(&e), e.to_string())
        }
    };
    apply_configured_headers(&gateway, response.headers_mut());

    let elapsed = started.elapsed();
    if route.descriptor.instrumented {
        metrics::histogram!(
            "conclave_http_request_seconds",
            "method" => method.to_string(),
            "route" => route.metric_key.clone()
        )
        .record(elapsed.as_secs_f64());
    }
    tracing::debug!(
        target: "conclave::http",
        %method,
        %url,
        ?elapsed,
        %from,
        "Request"
    );
    response
}

async fn read_body(body: Body) -> Result<Bytes, GatewayError> {
    axum::body::to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|e| GatewayError::Decode(format!("failed to read body: {e}")))
}

/// Configured headers go underneath whatever the handler set.
fn apply_configured_headers(gateway: &Gateway, headers: &mut HeaderMap) {
    let mut configured = HeaderMap::new();
    set_static_headers(&mut configured, &gateway.config.response_headers);
    set_translate_addresses(&mut configured, gateway.config.translate_wan_addrs);
    for (name, value) in configured {
        if let Some(name) = name {
            headers.entry(name).or_insert(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_value_is_hidden_everywhere() {
        assert_eq!(
            redact_url("/v1/kv/SECRET?token=SECRET"),
            "/v1/kv/<hidden>?token=<hidden>"
        );
    }

    #[test]
    fn multiple_tokens_are_all_hidden() {
        let logged = redact_url("/v1/kv/a?token=alpha&token=beta");
        assert_eq!(logged, "/v1/kv/a?token=<hidden>&token=<hidden>");
        assert!(!logged.contains("alpha"));
        assert!(!logged.contains("beta"));
    }

    #[test]
    fn empty_token_still_leaves_a_marker() {
        assert_eq!(redact_url("/v1/kv/a?token="), "/v1/kv/a?token=<hidden>");
        assert_eq!(
            redact_url("/v1/kv/a?token&stale"),
            "/v1/kv/a?token=<hidden>&stale"
        );
    }

    #[test]
    fn encoded_token_is_hidden() {
        assert_eq!(
            redact_url("/v1/status/leader?token=a%2Fb"),
            "/v1/status/leader?token=<hidden>"
        );
    }

    #[test]
    fn any_client_encoding_of_the_token_is_hidden() {
        for url in [
            "/v1/kv/a?token=my%20secret",
            "/v1/kv/a?token=%73ecret",
            "/v1/kv/a?token=a%2fb",
            "/v1/kv/a?token=my+secret",
        ] {
            assert_eq!(redact_url(url), "/v1/kv/a?token=<hidden>", "{url}");
        }
    }

    #[test]
    fn encoded_token_key_is_still_recognized() {
        assert_eq!(
            redact_url("/v1/kv/a?tok%65n=secret&recurse"),
            "/v1/kv/a?tok%65n=<hidden>&recurse"
        );
    }

    #[test]
    fn other_parameters_keep_their_values() {
        assert_eq!(
            redact_url("/v1/kv/a?index=7&token=abc&wait=5s"),
            "/v1/kv/a?index=7&token=<hidden>&wait=5s"
        );
    }

    #[test]
    fn url_without_token_is_untouched() {
        assert_eq!(redact_url("/v1/kv/a?stale"), "/v1/kv/a?stale");
        assert_eq!(redact_url("/v1/kv/a"), "/v1/kv/a");
    }

    #[test]
    fn instrumentation_keys_collapse_parameterized_paths() {
        assert_eq!(instrumentation_key("/v1/kv/"), vec!["v1", "kv", "_"]);
        assert_eq!(
            instrumentation_key("/v1/operator/keyring"),
            vec!["v1", "operator", "keyring"]
        );
        assert_eq!(instrumentation_key("/"), vec!["_"]);
    }

    #[test]
    fn path_suffix_strips_route_prefix() {
        let ctx = RequestContext {
            method: Method::GET,
            path: "/v1/kv/web/config".to_string(),
            params: QueryParams::default(),
            headers: HeaderMap::new(),
            options: QueryOptions::default(),
            body: Bytes::new(),
            remote: None,
        };
        assert_eq!(ctx.path_suffix("/v1/kv/"), "web/config");
        assert_eq!(ctx.path_suffix("/v1/other/"), "");
    }
}

//! Query-string parsing: consistency mode, blocking parameters, datacenter,
//! token, RTT source and node-meta filters.

use std::time::Duration;

use axum::http::HeaderMap;
use conclave_store::{QueryOptions, QuerySource};

use crate::GatewayConfig;

/// Header carrying the request token when `?token=` is absent.
pub const TOKEN_HEADER: &str = "x-consul-token";

/// `?near=` value meaning "this agent".
pub const NEAR_AGENT: &str = "_agent";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("Invalid wait time")]
    InvalidWait,

    #[error("Invalid index")]
    InvalidIndex,

    #[error("Cannot specify ?stale with ?consistent, conflicting semantics.")]
    ConflictingConsistency,

    #[error("Invalid relay factor")]
    InvalidRelayFactor,
}

/// Decoded query parameters in request order. Repeated keys are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    pub fn parse(raw: Option<&str>) -> Self {
        let pairs = raw
            .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
            .unwrap_or_default();
        Self { pairs }
    }

    /// First value for `key`, empty string when present without a value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Every value for `key`, in order.
    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.pairs
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn has(&self, key: &str) -> bool {
        self.pairs.iter().any(|(k, _)| k == key)
    }

    /// First non-empty value for `key`.
    fn non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|v| !v.is_empty())
    }
}

/// Build the options for one request. Nothing is returned unless every
/// parameter parsed, so a failure never leaves half-filled options behind.
pub fn parse_query_options(
    params: &QueryParams,
    headers: &HeaderMap,
    config: &GatewayConfig,
) -> Result<QueryOptions, ParseError> {
    let allow_stale = params.has("stale");
    let require_consistent = params.has("consistent");
    if allow_stale && require_consistent {
        return Err(ParseError::ConflictingConsistency);
    }

    let max_query_time = params.non_empty("wait").map(parse_wait).transpose()?;
    let min_query_index = params
        .non_empty("index")
        .map(|raw| raw.parse::<u64>().map_err(|_| ParseError::InvalidIndex))
        .transpose()?
        .unwrap_or(0);

    let datacenter = parse_datacenter(params, config);
    let source = QuerySource {
        datacenter: datacenter.clone(),
        node: parse_near(params, config),
    };

    Ok(QueryOptions {
        datacenter,
        token: resolve_token(params, headers, config),
        min_query_index,
        max_query_time,
        allow_stale,
        require_consistent,
        node_meta_filters: parse_node_meta(params),
        source,
    })
}

/// Humantime durations (`1m30s`, `250ms`), plus a single decimal value with
/// a unit (`1.5s`, `0.5m`).
fn parse_wait(raw: &str) -> Result<Duration, ParseError> {
    humantime::parse_duration(raw)
        .ok()
        .or_else(|| parse_decimal_duration(raw))
        .ok_or(ParseError::InvalidWait)
}

fn parse_decimal_duration(raw: &str) -> Option<Duration> {
    const UNITS: [(&str, f64); 7] = [
        ("ns", 1e-9),
        ("us", 1e-6),
        ("µs", 1e-6),
        ("ms", 1e-3),
        ("s", 1.0),
        ("m", 60.0),
        ("h", 3600.0),
    ];
    let split = raw.find(|c: char| !(c.is_ascii_digit() || c == '.'))?;
    let (number, unit) = raw.split_at(split);
    let (_, scale) = UNITS.iter().find(|(name, _)| *name == unit)?;
    let value: f64 = number.parse().ok()?;
    Duration::try_from_secs_f64(value * scale).ok()
}

/// `?dc=` or the agent's own datacenter; never empty.
pub fn parse_datacenter(params: &QueryParams, config: &GatewayConfig) -> String {
    params
        .non_empty("dc")
        .map(str::to_string)
        .unwrap_or_else(|| config.datacenter.clone())
}

/// `?token=`, then the token header, then the agent default.
pub fn resolve_token(params: &QueryParams, headers: &HeaderMap, config: &GatewayConfig) -> String {
    if let Some(token) = params.non_empty("token") {
        return token.to_string();
    }
    if let Some(token) = headers
        .get(TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
    {
        return token.to_string();
    }
    config.default_token.clone()
}

fn parse_near(params: &QueryParams, config: &GatewayConfig) -> String {
    match params.non_empty("near") {
        Some(NEAR_AGENT) => config.node_name.clone(),
        Some(node) => node.to_string(),
        None => String::new(),
    }
}

fn parse_node_meta(params: &QueryParams) -> std::collections::BTreeMap<String, String> {
    params
        .get_all("node-meta")
        .map(|pair| match pair.split_once(':') {
            Some((k, v)) => (k.to_string(), v.to_string()),
            None => (pair.to_string(), String::new()),
        })
        .collect()
}

/// `?relay-factor=`, 0 when absent.
pub fn parse_relay_factor(params: &QueryParams) -> Result<u8, ParseError> {
    match params.non_empty("relay-factor") {
        None => Ok(0),
        Some(raw) => raw
            .parse::<u8>()
            .ok()
            .filter(|f| *f <= conclave_keyring::coordinator::MAX_RELAY_FACTOR)
            .ok_or(ParseError::InvalidRelayFactor),
    }
}

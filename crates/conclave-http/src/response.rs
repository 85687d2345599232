//! Response composition: metadata headers and JSON encoding.

use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use conclave_store::QueryMeta;
use serde::Serialize;

use crate::error::GatewayError;

pub const INDEX_HEADER: &str = "x-consul-index";
pub const LAST_CONTACT_HEADER: &str = "x-consul-lastcontact";
pub const KNOWN_LEADER_HEADER: &str = "x-consul-knownleader";
pub const TRANSLATE_ADDRESSES_HEADER: &str = "x-consul-translate-addresses";

/// What a handler hands back to the pipeline.
#[derive(Debug, Clone, Default)]
pub struct Reply {
    pub status: StatusCode,
    pub meta: Option<QueryMeta>,
    /// `None` yields an empty body and no content type.
    pub body: Option<serde_json::Value>,
}

impl Reply {
    /// 200 with a JSON body.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, GatewayError> {
        let body = serde_json::to_value(value)
            .map_err(|e| GatewayError::Internal(format!("failed to encode response: {e}")))?;
        Ok(Self {
            status: StatusCode::OK,
            meta: None,
            body: Some(body),
        })
    }

    /// 200 with no body.
    pub fn empty() -> Self {
        Self {
            status: StatusCode::OK,
            ..Self::default()
        }
    }

    /// No body with an explicit status (e.g. 404 for a missing key).
    pub fn status(status: StatusCode) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    pub fn with_meta(mut self, meta: QueryMeta) -> Self {
        self.meta = Some(meta);
        self
    }

    /// Encode into a response; `pretty` selects 4-space indentation with a
    /// trailing newline.
    pub fn into_response(self, pretty: bool) -> Result<Response, GatewayError> {
        let mut headers = HeaderMap::new();
        if let Some(meta) = &self.meta {
            set_meta(&mut headers, meta);
        }
        let Some(body) = self.body else {
            return Ok((self.status, headers).into_response());
        };
        let bytes = encode_json(&body, pretty)?;
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok((self.status, headers, bytes).into_response())
    }
}

/// Index, last-contact (milliseconds) and known-leader headers.
pub fn set_meta(headers: &mut HeaderMap, meta: &QueryMeta) {
    headers.insert(INDEX_HEADER, HeaderValue::from(meta.index));
    let millis = u64::try_from(meta.last_contact.as_millis()).unwrap_or(u64::MAX);
    headers.insert(LAST_CONTACT_HEADER, HeaderValue::from(millis));
    headers.insert(
        KNOWN_LEADER_HEADER,
        HeaderValue::from_static(if meta.known_leader { "true" } else { "false" }),
    );
}

/// Configured static headers. Invalid names or values are skipped with a
/// warning.
pub fn set_static_headers<'a>(
    headers: &mut HeaderMap,
    configured: impl IntoIterator<Item = (&'a String, &'a String)>,
) {
    for (name, value) in configured {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => tracing::warn!(header = %name, "Skipping invalid response header"),
        }
    }
}

pub fn set_translate_addresses(headers: &mut HeaderMap, enabled: bool) {
    if enabled {
        headers.insert(
            TRANSLATE_ADDRESSES_HEADER,
            HeaderValue::from_static("true"),
        );
    }
}

pub fn encode_json<T: Serialize>(value: &T, pretty: bool) -> Result<Vec<u8>, GatewayError> {
    if !pretty {
        return serde_json::to_vec(value)
            .map_err(|e| GatewayError::Internal(format!("failed to encode response: {e}")));
    }
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value
        .serialize(&mut ser)
        .map_err(|e| GatewayError::Internal(format!("failed to encode response: {e}")))?;
    buf.push(b'\n');
    Ok(buf)
}

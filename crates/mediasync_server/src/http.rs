//! HTTP surface of the gateway.
//!
//! A single fallback handler serves every path and dispatches on the
//! method. Every response, errors included, carries the CORS headers.

use crate::error::{GatewayError, GatewayResult};
use crate::handler::Gateway;
use axum::body::{Body, Bytes};
use axum::extract::{DefaultBodyLimit, Query, State};
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    ACCESS_CONTROL_MAX_AGE,
};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use futures::FutureExt;
use http_body_util::LengthLimitError;
use mediasync_protocol::{API_KEY_HEADER, KEYS_QUERY_PARAM};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{error, warn};

const ALLOW_HEADERS: &str = "Content-Type, x-api-key";
const ALLOW_METHODS: &str = "GET, POST, DELETE, OPTIONS";
const MAX_AGE_SECS: &str = "86400";

#[derive(Clone)]
struct AppState {
    gateway: Arc<Gateway>,
    origin: HeaderValue,
}

/// Builds the router serving `gateway` on every path.
pub fn router(gateway: Arc<Gateway>) -> Router {
    let configured = &gateway.config().allowed_origin;
    let origin = HeaderValue::from_str(configured).unwrap_or_else(|_| {
        warn!(origin = %configured, "invalid ALLOWED_ORIGIN, using *");
        HeaderValue::from_static("*")
    });

    Router::new()
        .fallback(dispatch)
        .layer(DefaultBodyLimit::disable())
        .with_state(AppState { gateway, origin })
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if self.is_server_error() {
            error!(error = %self, "request failed");
        }
        (status, Json(self.to_body())).into_response()
    }
}

async fn dispatch(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Body,
) -> Response {
    let gateway = Arc::clone(&state.gateway);
    let outcome = AssertUnwindSafe(handle(gateway, method, uri, headers, body))
        .catch_unwind()
        .await;

    let mut response = match outcome {
        Ok(Ok(response)) => response,
        Ok(Err(err)) => err.into_response(),
        Err(panic) => GatewayError::Internal(panic_message(panic.as_ref())).into_response(),
    };
    apply_cors(response.headers_mut(), &state.origin);
    response
}

async fn handle(
    gateway: Arc<Gateway>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Body,
) -> GatewayResult<Response> {
    if method == Method::OPTIONS {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }
    gateway.check_store()?;

    let api_key = headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok());

    match method {
        Method::GET => {
            let grant = gateway.authorize_read(api_key)?;
            let param = keys_param(&uri);
            let lists = gateway.read(grant, param.as_deref()).await?;
            Ok(Json(lists).into_response())
        }
        Method::POST => {
            let grant = gateway.authorize_write(api_key)?;
            let bytes = read_body(body, gateway.config().max_body_bytes).await?;
            gateway.write(grant, &bytes).await?;
            Ok(Json(mediasync_protocol::StatusBody::Ok).into_response())
        }
        Method::DELETE => {
            let grant = gateway.authorize_write(api_key)?;
            let bytes = read_body(body, gateway.config().max_body_bytes).await?;
            let status = gateway.delete(grant, &bytes).await?;
            Ok(Json(status).into_response())
        }
        other => Err(GatewayError::MethodNotAllowed(other.to_string())),
    }
}

/// First `keys` value from the query string. Malformed queries read as
/// absent.
fn keys_param(uri: &Uri) -> Option<String> {
    let Query(pairs) = Query::<Vec<(String, String)>>::try_from_uri(uri).ok()?;
    pairs
        .into_iter()
        .find(|(name, _)| name == KEYS_QUERY_PARAM)
        .map(|(_, value)| value)
}

/// Buffers the body, refusing to hold more than `limit` bytes.
async fn read_body(body: Body, limit: usize) -> GatewayResult<Bytes> {
    match axum::body::to_bytes(body, limit).await {
        Ok(bytes) => Ok(bytes),
        Err(err) => {
            let mut source: Option<&(dyn std::error::Error + 'static)> = Some(&err);
            while let Some(cause) = source {
                if cause.is::<LengthLimitError>() {
                    return Err(GatewayError::PayloadTooLarge { limit });
                }
                source = cause.source();
            }
            Err(GatewayError::Internal(format!("reading body: {err}")))
        }
    }
}

fn apply_cors(headers: &mut HeaderMap, origin: &HeaderValue) {
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOW_HEADERS),
    );
    headers.insert(ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static(MAX_AGE_SECS));
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOW_METHODS),
    );
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "handler panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_param_is_decoded() {
        let uri: Uri = "/?keys=filmin_a%2Cviki_b&other=1".parse().unwrap();
        assert_eq!(keys_param(&uri).as_deref(), Some("filmin_a,viki_b"));

        let uri: Uri = "/?keys=a&keys=b".parse().unwrap();
        assert_eq!(keys_param(&uri).as_deref(), Some("a"));

        let uri: Uri = "/".parse().unwrap();
        assert_eq!(keys_param(&uri), None);
    }

    #[test]
    fn panic_messages() {
        let boxed: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(boxed.as_ref()), "bang");
        let boxed: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(boxed.as_ref()), "handler panicked");
    }

    #[tokio::test]
    async fn oversized_body_is_refused_while_reading() {
        let body = Body::from(vec![b'x'; 64]);
        let err = read_body(body, 16).await.unwrap_err();
        assert!(matches!(err, GatewayError::PayloadTooLarge { limit: 16 }));

        let body = Body::from("{}");
        assert_eq!(read_body(body, 16).await.unwrap().as_ref(), b"{}");
    }

    #[test]
    fn cors_headers_are_complete() {
        let mut headers = HeaderMap::new();
        apply_cors(&mut headers, &HeaderValue::from_static("*"));
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_HEADERS], "Content-Type, x-api-key");
        assert_eq!(headers[ACCESS_CONTROL_MAX_AGE], "86400");
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_METHODS], "GET, POST, DELETE, OPTIONS");
    }
}

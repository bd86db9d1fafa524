//! Request routing dispatch module
//!
//! Entry point for HTTP request processing: method validation, edge cache
//! lookup, key resolution, the object pipeline and error mapping.

use std::convert::Infallible;
use std::sync::Arc;

use hyper::{HeaderMap, Method, Request, Response, Uri};

use super::object::{self, Served};
use super::{edge, resolver};
use crate::cache::CacheKey;
use crate::config::AppState;
use crate::error::{BackendError, GatewayError};
use crate::http::{self, ResponseBody};
use crate::logger;

/// What the request resolved to, attached to the response for the access log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOutcome {
    pub object_key: Option<String>,
    /// HIT, MISS or BYPASS
    pub cache_status: &'static str,
}

/// Main entry point for HTTP request handling
pub async fn handle_request(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
) -> Result<Response<ResponseBody>, Infallible> {
    let (parts, _body) = req.into_parts();
    Ok(handle(&state, &parts.method, &parts.uri, &parts.headers).await)
}

/// Handle a request given its head; the request body is never read
pub async fn handle(
    state: &AppState,
    method: &Method,
    uri: &Uri,
    headers: &HeaderMap,
) -> Response<ResponseBody> {
    // 1. Check HTTP method
    if let Some(resp) = check_http_method(method, &state.config.gateway.cors_origin) {
        return resp;
    }

    // 2. Edge cache lookup
    let cache_key = state
        .edge_cache
        .as_ref()
        .map(|_| CacheKey::new(method, uri, headers));
    let mut outcome = RequestOutcome {
        object_key: None,
        cache_status: if cache_key.is_some() { "MISS" } else { "BYPASS" },
    };
    if let (Some(cache), Some(key)) = (&state.edge_cache, &cache_key) {
        if let Some(resp) = edge::lookup(cache.as_ref(), key).await {
            outcome.cache_status = "HIT";
            return with_outcome(resp, outcome);
        }
    }

    // 3. Resolve the object key
    let key = match resolver::resolve_key(
        uri.path(),
        uri.query(),
        &state.config.routes,
        &state.config.gateway.build_stamp,
    ) {
        Ok(key) => key,
        Err(err) => return with_outcome(error_response(&err), outcome),
    };
    outcome.object_key = Some(key.to_string());

    // 4. Run the pipeline and populate the cache
    let response = match object::serve_object(state, method, &key, headers).await {
        Ok(Served {
            response,
            cache_eligible,
        }) => match (&state.edge_cache, cache_key) {
            (Some(cache), Some(cache_key)) if cache_eligible => edge::store_in_background(
                &state.tasks,
                Arc::clone(cache),
                cache_key,
                response,
                state.config.cache.max_entry_bytes,
            ),
            _ => response,
        },
        Err(err) => error_response(&err),
    };

    with_outcome(response, outcome)
}

/// Check HTTP method and return appropriate response for non-GET/HEAD methods
fn check_http_method(method: &Method, cors_origin: &str) -> Option<Response<ResponseBody>> {
    match *method {
        Method::GET | Method::HEAD => None,
        Method::OPTIONS => Some(http::build_options_response(cors_origin)),
        _ => {
            logger::log_warning(&format!("Method not allowed: {method}"));
            Some(error_response(&GatewayError::MethodNotAllowed))
        }
    }
}

/// Map a pipeline error to its response
///
/// Backend exhaustion ends up here as a bare 502.
fn error_response(err: &GatewayError) -> Response<ResponseBody> {
    match err {
        GatewayError::BadRequest(message) => http::build_400_response(message),
        GatewayError::MethodNotAllowed => http::build_405_response(),
        GatewayError::NotFound | GatewayError::Backend(BackendError::InvalidKey(_)) => {
            http::build_404_response()
        }
        GatewayError::RangeNotSatisfiable { size } => http::build_416_response(*size),
        GatewayError::Backend(e) => {
            logger::log_error(&format!("Backend failure: {e}"));
            http::build_502_response()
        }
    }
}

fn with_outcome(
    mut response: Response<ResponseBody>,
    outcome: RequestOutcome,
) -> Response<ResponseBody> {
    response.extensions_mut().insert(outcome);
    response
}

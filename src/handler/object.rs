//! Object pipeline
//!
//! Range negotiation, precondition evaluation and response assembly for a
//! resolved object key. Backend exhaustion is returned as an error; the
//! router decides what the client sees.

use hyper::header::{HeaderMap, IF_RANGE, RANGE};
use hyper::{Method, Response};

use super::precondition::{self, PreconditionOutcome};
use crate::config::AppState;
use crate::error::{GatewayError, GatewayResult};
use crate::http::{
    assemble_object_response, build_304_response, build_412_response, if_range_satisfied,
    negotiate_range, HeaderPolicy, PreconditionHeaders, ResponseBody,
};
use crate::logger;
use crate::storage::{GetOptions, GetOutcome, ObjectKey};

/// Pipeline result
pub struct Served {
    pub response: Response<ResponseBody>,
    /// Whether the edge cache may keep a copy
    pub cache_eligible: bool,
}

fn header_str<'a>(headers: &'a HeaderMap, name: &hyper::header::HeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Serve `key` for a GET or HEAD request
pub async fn serve_object(
    state: &AppState,
    method: &Method,
    key: &ObjectKey,
    headers: &HeaderMap,
) -> GatewayResult<Served> {
    let is_head = method == Method::HEAD;
    let policy = HeaderPolicy {
        cors_origin: &state.config.gateway.cors_origin,
        default_cache_control: &state.config.gateway.cache_control,
    };
    // HEAD ignores Range entirely
    let range_header = if is_head {
        None
    } else {
        header_str(headers, &RANGE)
    };

    let mut range = None;
    if let Some(range_header) = range_header {
        let Some(metadata) = state.client.head(key.as_str()).await? else {
            return serve_not_found(state, is_head, &policy).await;
        };

        match negotiate_range(range_header, metadata.size) {
            Ok(negotiated) => range = Some(negotiated),
            Err(rejection) => {
                logger::log_range_rejected(key.as_str(), range_header, &rejection);
                return Err(GatewayError::RangeNotSatisfiable {
                    size: Some(metadata.size),
                });
            }
        }

        if let Some(if_range) = header_str(headers, &IF_RANGE) {
            if !if_range_satisfied(if_range, &metadata) {
                range = None;
            }
        }
    }

    let cache_eligible = !is_head && range_header.is_none();
    let preconditions = PreconditionHeaders::from_headers(headers);
    let evaluation =
        precondition::evaluate(&state.client, is_head, key, &preconditions, range).await?;

    let object = match (evaluation.outcome, evaluation.object) {
        (PreconditionOutcome::PreconditionFailed, _) => {
            return Ok(Served {
                response: build_412_response(),
                cache_eligible: false,
            });
        }
        (PreconditionOutcome::NotModified, Some(object)) => {
            return Ok(Served {
                response: build_304_response(object.metadata()),
                cache_eligible: false,
            });
        }
        (_, None) => return serve_not_found(state, is_head, &policy).await,
        (PreconditionOutcome::Proceed, Some(object)) => object,
    };

    Ok(Served {
        response: assemble_object_response(object, range, false, &policy),
        cache_eligible,
    })
}

/// Serve the configured not-found object with a 404, or fail with `NotFound`
async fn serve_not_found(
    state: &AppState,
    is_head: bool,
    policy: &HeaderPolicy<'_>,
) -> GatewayResult<Served> {
    let Some(fallback_key) = state.config.gateway.not_found_key() else {
        return Err(GatewayError::NotFound);
    };

    let fallback = if is_head {
        state
            .client
            .head(fallback_key)
            .await?
            .map(GetOutcome::Metadata)
    } else {
        state.client.get(fallback_key, &GetOptions::default()).await?
    };

    match fallback {
        Some(object) => Ok(Served {
            response: assemble_object_response(object, None, true, policy),
            cache_eligible: false,
        }),
        None => Err(GatewayError::NotFound),
    }
}

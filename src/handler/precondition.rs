//! Precondition evaluation
//!
//! Stages run in a fixed order, each issuing at most one backend call:
//! 1. `If-Match` / `If-Unmodified-Since`: failure ends in 412
//! 2. `If-None-Match` / `If-Modified-Since`: failure ends in 304
//! 3. the final HEAD or GET, skipped when an earlier stage already has the body
//!
//! A body fetched in stage 1 is checked against stage 2 locally instead of
//! being fetched again.

use crate::backend::ResilientClient;
use crate::error::BackendError;
use crate::http::{EffectiveRange, PreconditionHeaders};
use crate::storage::{Conditional, GetOptions, GetOutcome, ObjectKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreconditionOutcome {
    Proceed,
    NotModified,
    PreconditionFailed,
}

/// Outcome plus whatever the backend returned on the way
#[derive(Debug)]
pub struct Evaluation {
    pub outcome: PreconditionOutcome,
    /// `None` when the object is absent or the request failed a precondition.
    /// Metadata only for HEAD and for `NotModified`.
    pub object: Option<GetOutcome>,
}

impl Evaluation {
    const fn proceed(object: Option<GetOutcome>) -> Self {
        Self {
            outcome: PreconditionOutcome::Proceed,
            object,
        }
    }
}

async fn conditional_get(
    client: &ResilientClient,
    key: &ObjectKey,
    range: Option<EffectiveRange>,
    only_if: Conditional,
) -> Result<Option<GetOutcome>, BackendError> {
    client
        .get(key.as_str(), &GetOptions { range, only_if })
        .await
}

/// Run the precondition stages for `key`
///
/// `range` must already be cleared for HEAD requests and failed `If-Range`
/// checks.
pub async fn evaluate(
    client: &ResilientClient,
    is_head: bool,
    key: &ObjectKey,
    headers: &PreconditionHeaders,
    range: Option<EffectiveRange>,
) -> Result<Evaluation, BackendError> {
    let mut fetched = None;

    if let Some(only_if) = headers.match_stage() {
        match conditional_get(client, key, range, only_if).await? {
            None => return Ok(Evaluation::proceed(None)),
            Some(GetOutcome::Metadata(_)) => {
                return Ok(Evaluation {
                    outcome: PreconditionOutcome::PreconditionFailed,
                    object: None,
                });
            }
            Some(object) => fetched = Some(object),
        }
    }

    if let Some(only_if) = headers.none_match_stage() {
        let object = match fetched.take() {
            Some(object) if only_if.evaluate(object.metadata()) => object,
            Some(object) => GetOutcome::Metadata(object.into_metadata()),
            None => match conditional_get(client, key, range, only_if).await? {
                Some(object) => object,
                None => return Ok(Evaluation::proceed(None)),
            },
        };
        if let GetOutcome::Metadata(metadata) = object {
            return Ok(Evaluation {
                outcome: PreconditionOutcome::NotModified,
                object: Some(GetOutcome::Metadata(metadata)),
            });
        }
        fetched = Some(object);
    }

    let object = match fetched {
        Some(object) if is_head => Some(GetOutcome::Metadata(object.into_metadata())),
        Some(object) => Some(object),
        None if is_head => client.head(key.as_str()).await?.map(GetOutcome::Metadata),
        None => client.get(key.as_str(), &GetOptions::ranged(range)).await?,
    };
    Ok(Evaluation::proceed(object))
}

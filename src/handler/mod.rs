//! Request handler module
//!
//! Routes GET/HEAD requests to the object pipeline:
//! key resolution, range negotiation, preconditions, response assembly,
//! with the edge cache in front of and behind it.

pub mod edge;
pub mod object;
pub mod precondition;
pub mod resolver;
pub mod router;

// Re-export main entry point
pub use router::{handle, handle_request, RequestOutcome};

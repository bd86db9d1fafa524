//! HTTP protocol layer module
//!
//! Range negotiation, conditional header parsing, body helpers and response
//! builders, decoupled from the object pipeline that drives them.

pub mod body;
pub mod conditional;
pub mod mime;
pub mod range;
pub mod response;

// Re-export commonly used types
pub use body::ResponseBody;
pub use conditional::PreconditionHeaders;
pub use range::{if_range_satisfied, negotiate_range, EffectiveRange, RangeRejection};
pub use response::{
    assemble_object_response, build_304_response, build_400_response, build_404_response,
    build_405_response, build_412_response, build_416_response, build_502_response,
    build_options_response, HeaderPolicy,
};

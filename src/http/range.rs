//! HTTP Range negotiation module
//!
//! Turns a `Range` header into the single byte window the blob store can
//! serve, and applies `If-Range` against the object's current metadata.
//! Textual parsing is delegated to `http-range`.

use chrono::{DateTime, Utc};
use http_range::{HttpRange, HttpRangeParseError};
use thiserror::Error;

use crate::storage::ObjectMetadata;

/// Byte window requested from the blob store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectiveRange {
    /// Explicit window starting at `offset`
    Offset { offset: u64, length: u64 },
    /// Last `suffix` bytes, resolved against the object size when served
    Suffix { suffix: u64 },
}

impl EffectiveRange {
    /// Encode an inclusive `[start, end]` window against `size`
    ///
    /// A window that reaches the last byte becomes a suffix range.
    pub const fn from_bounds(start: u64, end: u64, size: u64) -> Self {
        if end + 1 == size {
            Self::Suffix {
                suffix: size - start,
            }
        } else {
            Self::Offset {
                offset: start,
                length: end - start + 1,
            }
        }
    }

    /// Number of bytes the response declares
    pub const fn declared_length(&self) -> u64 {
        match *self {
            Self::Offset { length, .. } => length,
            Self::Suffix { suffix } => suffix,
        }
    }

    /// Inclusive `(start, end)` positions against `size`
    pub const fn bounds(&self, size: u64) -> (u64, u64) {
        match *self {
            Self::Offset { offset, length } => (offset, (offset + length).saturating_sub(1)),
            Self::Suffix { suffix } => (size.saturating_sub(suffix), size.saturating_sub(1)),
        }
    }

    /// `Content-Range` header value
    pub fn content_range(&self, size: u64) -> String {
        let (start, end) = self.bounds(size);
        format!("bytes {start}-{end}/{size}")
    }
}

/// Why a `Range` header was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RangeRejection {
    #[error("malformed range header")]
    Malformed,
    #[error("range does not overlap the object")]
    Unsatisfiable,
    #[error("{0} ranges requested, only one is supported")]
    MultipleRanges(usize),
}

/// Resolve a `Range` header against an object of `size` bytes
///
/// Only a single `bytes` range is accepted: the blob store cannot serve
/// more than one window per call.
///
/// # Examples
/// ```
/// use isogate::http::range::{negotiate_range, EffectiveRange};
///
/// let range = negotiate_range("bytes=900-999", 1000).unwrap();
/// assert_eq!(range, EffectiveRange::Suffix { suffix: 100 });
/// assert!(negotiate_range("bytes=0-1,500-501", 1000).is_err());
/// ```
pub fn negotiate_range(header: &str, size: u64) -> Result<EffectiveRange, RangeRejection> {
    let mut ranges = HttpRange::parse(header, size).map_err(|e| match e {
        HttpRangeParseError::InvalidRange => RangeRejection::Malformed,
        HttpRangeParseError::NoOverlap => RangeRejection::Unsatisfiable,
    })?;

    match ranges.len() {
        0 => Err(RangeRejection::Unsatisfiable),
        1 => {
            let HttpRange { start, length } = ranges.remove(0);
            if length == 0 {
                return Err(RangeRejection::Unsatisfiable);
            }
            Ok(EffectiveRange::from_bounds(start, start + length - 1, size))
        }
        n => Err(RangeRejection::MultipleRanges(n)),
    }
}

/// Whether an `If-Range` validator still allows the partial response
///
/// A date keeps the range when it is not later than the object's
/// last-modified time. Otherwise only a strong entity tag equal to the
/// object's quoted etag keeps it.
pub fn if_range_satisfied(if_range: &str, metadata: &ObjectMetadata) -> bool {
    let if_range = if_range.trim();

    if let Ok(date) = httpdate::parse_http_date(if_range) {
        if DateTime::<Utc>::from(date) <= metadata.last_modified {
            return true;
        }
    }

    !if_range.starts_with("W/") && if_range == metadata.http_etag()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn metadata() -> ObjectMetadata {
        ObjectMetadata::new(
            "os-kde-nvidia-hardened-20240101.iso",
            1000,
            "abc123",
            Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
        )
    }

    #[test]
    fn test_tail_range_becomes_suffix() {
        assert_eq!(
            negotiate_range("bytes=900-999", 1000),
            Ok(EffectiveRange::Suffix { suffix: 100 })
        );
        assert_eq!(
            negotiate_range("bytes=-20", 1000),
            Ok(EffectiveRange::Suffix { suffix: 20 })
        );
        assert_eq!(
            negotiate_range("bytes=500-", 1000),
            Ok(EffectiveRange::Suffix { suffix: 500 })
        );
    }

    #[test]
    fn test_inner_range_is_offset() {
        assert_eq!(
            negotiate_range("bytes=0-99", 1000),
            Ok(EffectiveRange::Offset {
                offset: 0,
                length: 100
            })
        );
    }

    #[test]
    fn test_end_past_size_is_clamped() {
        assert_eq!(
            negotiate_range("bytes=900-5000", 1000),
            Ok(EffectiveRange::Suffix { suffix: 100 })
        );
    }

    #[test]
    fn test_multiple_ranges_rejected() {
        assert_eq!(
            negotiate_range("bytes=0-1,500-501", 1000),
            Err(RangeRejection::MultipleRanges(2))
        );
    }

    #[test]
    fn test_unsatisfiable_and_malformed() {
        assert_eq!(
            negotiate_range("bytes=2000-", 1000),
            Err(RangeRejection::Unsatisfiable)
        );
        assert_eq!(
            negotiate_range("bytes=a-b", 1000),
            Err(RangeRejection::Malformed)
        );
        assert_eq!(
            negotiate_range("items=0-9", 1000),
            Err(RangeRejection::Malformed)
        );
    }

    #[test]
    fn test_content_range() {
        let suffix = EffectiveRange::Suffix { suffix: 100 };
        assert_eq!(suffix.content_range(1000), "bytes 900-999/1000");
        assert_eq!(suffix.declared_length(), 100);

        let offset = EffectiveRange::Offset {
            offset: 10,
            length: 20,
        };
        assert_eq!(offset.content_range(1000), "bytes 10-29/1000");
        assert_eq!(offset.declared_length(), 20);
    }

    #[test]
    fn test_if_range_etag() {
        let meta = metadata();
        assert!(if_range_satisfied("\"abc123\"", &meta));
        assert!(!if_range_satisfied("W/\"abc123\"", &meta));
        assert!(!if_range_satisfied("\"other\"", &meta));
        // the validator must carry its quotes
        assert!(!if_range_satisfied("abc123", &meta));
    }

    #[test]
    fn test_if_range_date() {
        let meta = metadata();
        assert!(if_range_satisfied("Mon, 01 Jan 2024 12:00:00 GMT", &meta));
        assert!(if_range_satisfied("Sun, 31 Dec 2023 08:00:00 GMT", &meta));
        assert!(!if_range_satisfied("Tue, 02 Jan 2024 12:00:00 GMT", &meta));
    }
}

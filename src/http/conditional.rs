//! Conditional request headers
//!
//! Parses `If-Match`, `If-None-Match`, `If-Modified-Since` and
//! `If-Unmodified-Since` into the conditions the blob store evaluates.
//! Weak validators and unparseable dates are ignored.

use chrono::{DateTime, Utc};
use hyper::header::{
    HeaderMap, HeaderName, IF_MATCH, IF_MODIFIED_SINCE, IF_NONE_MATCH, IF_UNMODIFIED_SINCE,
};

use crate::storage::Conditional;

/// Precondition headers of a request, already normalised
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreconditionHeaders {
    pub if_match: Option<String>,
    pub if_none_match: Option<String>,
    pub if_modified_since: Option<DateTime<Utc>>,
    pub if_unmodified_since: Option<DateTime<Utc>>,
}

impl PreconditionHeaders {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            if_match: header_str(headers, &IF_MATCH).and_then(normalize_etag),
            if_none_match: header_str(headers, &IF_NONE_MATCH).and_then(normalize_etag),
            if_modified_since: header_str(headers, &IF_MODIFIED_SINCE).and_then(parse_date),
            if_unmodified_since: header_str(headers, &IF_UNMODIFIED_SINCE).and_then(parse_date),
        }
    }

    /// Conditions for the `If-Match` / `If-Unmodified-Since` stage
    pub fn match_stage(&self) -> Option<Conditional> {
        if self.if_match.is_none() && self.if_unmodified_since.is_none() {
            return None;
        }
        Some(Conditional {
            etag_matches: self.if_match.clone(),
            uploaded_before: self.if_unmodified_since,
            ..Conditional::default()
        })
    }

    /// Conditions for the `If-None-Match` / `If-Modified-Since` stage
    ///
    /// `If-None-Match` replaces `If-Modified-Since` entirely when both are sent.
    pub fn none_match_stage(&self) -> Option<Conditional> {
        if let Some(tag) = &self.if_none_match {
            return Some(Conditional {
                etag_does_not_match: Some(tag.clone()),
                ..Conditional::default()
            });
        }
        self.if_modified_since.map(|since| Conditional {
            uploaded_after: Some(since),
            ..Conditional::default()
        })
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &HeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Trim an entity tag and strip its quotes; weak tags yield `None`
pub fn normalize_etag(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.starts_with("W/") {
        return None;
    }
    let tag = raw.trim_matches(|c| c == '"' || c == '\'');
    (!tag.is_empty()).then(|| tag.to_string())
}

fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    httpdate::parse_http_date(raw.trim())
        .ok()
        .map(DateTime::<Utc>::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use hyper::header::HeaderValue;

    fn headers(pairs: &[(HeaderName, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(name.clone(), HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_normalize_etag() {
        assert_eq!(normalize_etag(" \"abc\" "), Some("abc".to_string()));
        assert_eq!(normalize_etag("'abc'"), Some("abc".to_string()));
        assert_eq!(normalize_etag("abc"), Some("abc".to_string()));
        assert_eq!(normalize_etag("W/\"abc\""), None);
        assert_eq!(normalize_etag("\"\""), None);
        assert_eq!(normalize_etag("*"), Some("*".to_string()));
    }

    #[test]
    fn test_parse_headers() {
        let parsed = PreconditionHeaders::from_headers(&headers(&[
            (IF_MATCH, "\"abc\""),
            (IF_UNMODIFIED_SINCE, "Mon, 01 Jan 2024 12:00:00 GMT"),
            (IF_MODIFIED_SINCE, "not a date"),
        ]));
        assert_eq!(parsed.if_match.as_deref(), Some("abc"));
        assert_eq!(
            parsed.if_unmodified_since,
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap())
        );
        assert_eq!(parsed.if_modified_since, None);
        assert_eq!(parsed.if_none_match, None);
    }

    #[test]
    fn test_match_stage() {
        assert!(PreconditionHeaders::default().match_stage().is_none());

        let parsed = PreconditionHeaders::from_headers(&headers(&[(IF_MATCH, "\"abc\"")]));
        let stage = parsed.match_stage().unwrap();
        assert_eq!(stage.etag_matches.as_deref(), Some("abc"));
        assert!(stage.uploaded_before.is_none());
    }

    #[test]
    fn test_if_none_match_overrides_modified_since() {
        let parsed = PreconditionHeaders::from_headers(&headers(&[
            (IF_NONE_MATCH, "\"abc\""),
            (IF_MODIFIED_SINCE, "Mon, 01 Jan 2024 12:00:00 GMT"),
        ]));
        let stage = parsed.none_match_stage().unwrap();
        assert_eq!(stage.etag_does_not_match.as_deref(), Some("abc"));
        assert!(stage.uploaded_after.is_none());

        let parsed = PreconditionHeaders::from_headers(&headers(&[(
            IF_MODIFIED_SINCE,
            "Mon, 01 Jan 2024 12:00:00 GMT",
        )]));
        let stage = parsed.none_match_stage().unwrap();
        assert!(stage.etag_does_not_match.is_none());
        assert!(stage.uploaded_after.is_some());
    }

    #[test]
    fn test_weak_if_none_match_ignored() {
        let parsed = PreconditionHeaders::from_headers(&headers(&[(IF_NONE_MATCH, "W/\"abc\"")]));
        assert!(parsed.none_match_stage().is_none());
    }
}

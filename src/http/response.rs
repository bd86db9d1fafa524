//! HTTP response building module
//!
//! Builders for the fixed-status responses and the object response
//! assembler. Absent header values are rendered as empty strings rather
//! than omitted; downstream consumers rely on that shape.

use std::time::SystemTime;

use chrono::{DateTime, Utc};
use hyper::header::{
    ACCEPT_RANGES, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_MAX_AGE, ALLOW, CACHE_CONTROL, CONTENT_DISPOSITION,
    CONTENT_ENCODING, CONTENT_LANGUAGE, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, ETAG, EXPIRES,
    LAST_MODIFIED,
};
use hyper::{Response, StatusCode};

use super::body::{self, FixedLengthStream, ResponseBody};
use super::mime::DEFAULT_CONTENT_TYPE;
use super::range::EffectiveRange;
use crate::storage::{GetOutcome, ObjectMetadata};

pub const ALLOWED_METHODS: &str = "GET, HEAD, OPTIONS";

/// Configured values feeding the header policy
#[derive(Debug, Clone, Copy)]
pub struct HeaderPolicy<'a> {
    pub cors_origin: &'a str,
    pub default_cache_control: &'a str,
}

/// Render a timestamp as an HTTP date
pub fn http_date(time: DateTime<Utc>) -> String {
    httpdate::fmt_http_date(SystemTime::from(time))
}

/// Build the response for an object fetched from the store
///
/// `object` is metadata-only for HEAD requests. `not_found_fallback` marks
/// the configured not-found object standing in for a missing one.
pub fn assemble_object_response(
    object: GetOutcome,
    range: Option<EffectiveRange>,
    not_found_fallback: bool,
    policy: &HeaderPolicy<'_>,
) -> Response<ResponseBody> {
    let range = if not_found_fallback { None } else { range };
    let has_body = object.has_body();

    let status = if not_found_fallback {
        StatusCode::NOT_FOUND
    } else if range.is_some() && has_body {
        StatusCode::PARTIAL_CONTENT
    } else {
        StatusCode::OK
    };

    let (metadata, stream) = match object {
        GetOutcome::Metadata(metadata) => (metadata, None),
        GetOutcome::Body(object) => (object.metadata, Some(object.body)),
    };

    let declared_length = range.map_or(metadata.size, |r| r.declared_length());
    let body = match stream {
        Some(stream) if metadata.size != 0 => {
            body::from_stream(Box::pin(FixedLengthStream::new(stream, declared_length)))
        }
        _ => body::empty(),
    };

    let (etag, last_modified) = if not_found_fallback {
        (String::new(), String::new())
    } else {
        (metadata.http_etag(), http_date(metadata.last_modified))
    };

    let cache_control = metadata.cache_control.clone().unwrap_or_else(|| {
        if not_found_fallback {
            String::new()
        } else {
            policy.default_cache_control.to_string()
        }
    });

    let content_disposition = metadata
        .content_disposition
        .clone()
        .unwrap_or_else(|| format!("attachment; filename=\"{}\"", metadata.key));

    let mut builder = Response::builder()
        .status(status)
        .header(ACCEPT_RANGES, "bytes")
        .header(ACCESS_CONTROL_ALLOW_ORIGIN, policy.cors_origin)
        .header(ETAG, etag)
        .header(LAST_MODIFIED, last_modified)
        .header(CACHE_CONTROL, cache_control)
        .header(
            EXPIRES,
            metadata.cache_expiry.map(http_date).unwrap_or_default(),
        )
        .header(
            CONTENT_TYPE,
            metadata
                .content_type
                .as_deref()
                .unwrap_or(DEFAULT_CONTENT_TYPE),
        )
        .header(
            CONTENT_ENCODING,
            metadata.content_encoding.as_deref().unwrap_or_default(),
        )
        .header(
            CONTENT_LANGUAGE,
            metadata.content_language.as_deref().unwrap_or_default(),
        )
        .header(CONTENT_DISPOSITION, content_disposition);

    if let Some(range) = range {
        builder = builder.header(CONTENT_RANGE, range.content_range(metadata.size));
    }

    builder
        .header(CONTENT_LENGTH, declared_length)
        .body(body)
        .unwrap_or_else(|e| {
            log_build_error(status.as_str(), &e);
            Response::new(body::empty())
        })
}

/// Build 304 Not Modified response, carrying validators only
pub fn build_304_response(metadata: &ObjectMetadata) -> Response<ResponseBody> {
    Response::builder()
        .status(StatusCode::NOT_MODIFIED)
        .header(ETAG, metadata.http_etag())
        .header(LAST_MODIFIED, http_date(metadata.last_modified))
        .body(body::empty())
        .unwrap_or_else(|e| {
            log_build_error("304", &e);
            Response::new(body::empty())
        })
}

/// Build 400 Bad Request response
pub fn build_400_response(message: &str) -> Response<ResponseBody> {
    plain_response(StatusCode::BAD_REQUEST, format!("Bad Request: {message}"))
}

/// Build 404 Not Found response
pub fn build_404_response() -> Response<ResponseBody> {
    plain_response(StatusCode::NOT_FOUND, "File Not Found".to_string())
}

/// Build 405 Method Not Allowed response
pub fn build_405_response() -> Response<ResponseBody> {
    Response::builder()
        .status(StatusCode::METHOD_NOT_ALLOWED)
        .header(CONTENT_TYPE, "text/plain")
        .header(ALLOW, ALLOWED_METHODS)
        .body(body::full("Method Not Allowed"))
        .unwrap_or_else(|e| {
            log_build_error("405", &e);
            Response::new(body::full("Method Not Allowed"))
        })
}

/// Build OPTIONS response (preflight request)
pub fn build_options_response(cors_origin: &str) -> Response<ResponseBody> {
    let mut builder = Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header(ALLOW, ALLOWED_METHODS);

    if !cors_origin.is_empty() {
        builder = builder
            .header(ACCESS_CONTROL_ALLOW_ORIGIN, cors_origin)
            .header(ACCESS_CONTROL_ALLOW_METHODS, ALLOWED_METHODS)
            .header(
                ACCESS_CONTROL_ALLOW_HEADERS,
                "Range, If-Match, If-None-Match, If-Modified-Since, If-Unmodified-Since, If-Range",
            )
            .header(ACCESS_CONTROL_MAX_AGE, "86400");
    }

    builder.body(body::empty()).unwrap_or_else(|e| {
        log_build_error("OPTIONS", &e);
        Response::new(body::empty())
    })
}

/// Build 412 Precondition Failed response
pub fn build_412_response() -> Response<ResponseBody> {
    Response::builder()
        .status(StatusCode::PRECONDITION_FAILED)
        .body(body::empty())
        .unwrap_or_else(|e| {
            log_build_error("412", &e);
            Response::new(body::empty())
        })
}

/// Build 416 Range Not Satisfiable response
pub fn build_416_response(size: Option<u64>) -> Response<ResponseBody> {
    let mut builder = Response::builder()
        .status(StatusCode::RANGE_NOT_SATISFIABLE)
        .header(CONTENT_TYPE, "text/plain");
    if let Some(size) = size {
        builder = builder.header(CONTENT_RANGE, format!("bytes */{size}"));
    }
    builder
        .body(body::full("Range Not Satisfiable"))
        .unwrap_or_else(|e| {
            log_build_error("416", &e);
            Response::new(body::full("Range Not Satisfiable"))
        })
}

/// Build 502 Bad Gateway response, used by the hosting router only
pub fn build_502_response() -> Response<ResponseBody> {
    plain_response(StatusCode::BAD_GATEWAY, "Bad Gateway".to_string())
}

fn plain_response(status: StatusCode, text: String) -> Response<ResponseBody> {
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "text/plain")
        .body(body::full(text.clone()))
        .unwrap_or_else(|e| {
            log_build_error(status.as_str(), &e);
            Response::new(body::full(text))
        })
}

/// Log response build error
fn log_build_error(status: &str, error: &hyper::http::Error) {
    crate::logger::log_error(&format!("Failed to build {status} response: {error}"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::ObjectBody;
    use bytes::Bytes;
    use chrono::TimeZone;
    use futures_util::stream;
    use http_body_util::BodyExt;

    const POLICY: HeaderPolicy<'static> = HeaderPolicy {
        cors_origin: "https://example.org",
        default_cache_control: "public, max-age=3600",
    };

    fn metadata(size: u64) -> ObjectMetadata {
        ObjectMetadata::new(
            "os-kde-nvidia-hardened-20240101.iso",
            size,
            "abc",
            Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
        )
    }

    fn with_body(metadata: ObjectMetadata, data: &'static [u8]) -> GetOutcome {
        GetOutcome::Body(ObjectBody {
            metadata,
            body: Box::pin(stream::iter(vec![Ok(Bytes::from_static(data))])),
        })
    }

    fn header<'a>(response: &'a Response<ResponseBody>, name: &str) -> &'a str {
        response.headers()[name].to_str().unwrap()
    }

    #[tokio::test]
    async fn test_full_object_response() {
        let response = assemble_object_response(with_body(metadata(5), b"hello"), None, false, &POLICY);
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header(&response, "accept-ranges"), "bytes");
        assert_eq!(header(&response, "etag"), "\"abc\"");
        assert_eq!(header(&response, "last-modified"), "Mon, 01 Jan 2024 12:00:00 GMT");
        assert_eq!(header(&response, "cache-control"), "public, max-age=3600");
        assert_eq!(header(&response, "content-type"), "application/octet-stream");
        assert_eq!(header(&response, "content-encoding"), "");
        assert_eq!(header(&response, "expires"), "");
        assert_eq!(
            header(&response, "content-disposition"),
            "attachment; filename=\"os-kde-nvidia-hardened-20240101.iso\""
        );
        assert_eq!(header(&response, "content-length"), "5");
        assert!(response.headers().get("content-range").is_none());

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(bytes, "hello");
    }

    #[tokio::test]
    async fn test_partial_response() {
        let range = EffectiveRange::Suffix { suffix: 2 };
        let response =
            assemble_object_response(with_body(metadata(5), b"lo"), Some(range), false, &POLICY);
        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(header(&response, "content-range"), "bytes 3-4/5");
        assert_eq!(header(&response, "content-length"), "2");
    }

    #[tokio::test]
    async fn test_body_forced_to_declared_length() {
        // metadata says 5 bytes, the store delivered 7
        let response =
            assemble_object_response(with_body(metadata(5), b"hello!!"), None, false, &POLICY);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(bytes, "hello");
    }

    #[tokio::test]
    async fn test_head_has_no_body() {
        let response =
            assemble_object_response(GetOutcome::Metadata(metadata(5)), None, false, &POLICY);
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header(&response, "content-length"), "5");
        assert!(response.into_body().collect().await.unwrap().to_bytes().is_empty());
    }

    #[tokio::test]
    async fn test_fallback_response() {
        let mut meta = metadata(9);
        meta.key = "404.html".into();
        let range = EffectiveRange::Suffix { suffix: 2 };
        let response =
            assemble_object_response(with_body(meta, b"not found"), Some(range), true, &POLICY);
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(header(&response, "etag"), "");
        assert_eq!(header(&response, "last-modified"), "");
        assert_eq!(header(&response, "cache-control"), "");
        assert_eq!(header(&response, "content-length"), "9");
        assert!(response.headers().get("content-range").is_none());
    }

    #[test]
    fn test_stored_metadata_wins() {
        let mut meta = metadata(0);
        meta.cache_control = Some("no-cache".into());
        meta.content_type = Some("application/pgp-keys".into());
        meta.cache_expiry = Some(Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap());
        let response = assemble_object_response(GetOutcome::Metadata(meta), None, false, &POLICY);
        assert_eq!(header(&response, "cache-control"), "no-cache");
        assert_eq!(header(&response, "content-type"), "application/pgp-keys");
        assert_eq!(header(&response, "expires"), "Tue, 01 Jan 2030 00:00:00 GMT");
        assert_eq!(header(&response, "content-length"), "0");
    }

    #[test]
    fn test_status_builders() {
        let response = build_405_response();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(header(&response, "allow"), "GET, HEAD, OPTIONS");

        let response = build_options_response("");
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(header(&response, "allow"), "GET, HEAD, OPTIONS");
        assert!(response.headers().get("access-control-allow-origin").is_none());

        let response = build_416_response(Some(1000));
        assert_eq!(header(&response, "content-range"), "bytes */1000");

        let response = build_304_response(&metadata(1));
        assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
        assert_eq!(header(&response, "etag"), "\"abc\"");
        assert!(response.headers().get("content-length").is_none());
    }
}

//! Object key resolution
//!
//! Maps the two supported request shapes to object keys:
//! - `<download_path>?de=..&nvidia=..` and `<checksum_path>?de=..&nvidia=..`
//! - `/<keyring_file>`

use serde::Deserialize;

use crate::config::RoutesConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::storage::ObjectKey;

#[derive(Debug, Default, Deserialize)]
struct ImageQuery {
    de: Option<String>,
    nvidia: Option<String>,
}

impl ImageQuery {
    fn parse(query: Option<&str>) -> GatewayResult<Self> {
        match query {
            None => Ok(Self::default()),
            Some(query) => serde_urlencoded::from_str(query)
                .map_err(|e| GatewayError::BadRequest(format!("invalid query string: {e}"))),
        }
    }

    fn require(value: Option<String>, name: &str) -> GatewayResult<String> {
        value
            .filter(|v| !v.is_empty())
            .ok_or_else(|| GatewayError::BadRequest(format!("missing query parameter '{name}'")))
    }
}

/// Resolve the object key for a request path and query string
pub fn resolve_key(
    path: &str,
    query: Option<&str>,
    routes: &RoutesConfig,
    build_stamp: &str,
) -> GatewayResult<ObjectKey> {
    let checksum = if path == routes.download_path {
        false
    } else if path == routes.checksum_path {
        true
    } else if path.strip_prefix('/') == Some(routes.keyring_file.as_str()) {
        return Ok(ObjectKey::new(routes.keyring_file.clone()));
    } else {
        return Err(GatewayError::NotFound);
    };

    let params = ImageQuery::parse(query)?;
    let de = ImageQuery::require(params.de, "de")?;
    let nvidia = ImageQuery::require(params.nvidia, "nvidia")?;

    let mut key = format!(
        "{}-{de}-{nvidia}-hardened-{build_stamp}.iso",
        routes.product
    );
    if checksum {
        key.push_str("-CHECKSUM");
    }
    Ok(ObjectKey::new(key))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(path: &str, query: Option<&str>) -> GatewayResult<ObjectKey> {
        resolve_key(path, query, &RoutesConfig::default(), "20240101")
    }

    #[test]
    fn test_download_key() {
        let key = resolve("/download", Some("de=kde&nvidia=open")).unwrap();
        assert_eq!(key.as_str(), "os-kde-open-hardened-20240101.iso");

        let key = resolve("/download", Some("nvidia=closed&de=gnome&lang=en")).unwrap();
        assert_eq!(key.as_str(), "os-gnome-closed-hardened-20240101.iso");
    }

    #[test]
    fn test_checksum_key() {
        let key = resolve("/download-checksum", Some("de=kde&nvidia=open")).unwrap();
        assert_eq!(key.as_str(), "os-kde-open-hardened-20240101.iso-CHECKSUM");
    }

    #[test]
    fn test_query_values_are_decoded() {
        let key = resolve("/download", Some("de=kde%2Dplasma&nvidia=open")).unwrap();
        assert_eq!(key.as_str(), "os-kde-plasma-open-hardened-20240101.iso");
    }

    #[test]
    fn test_missing_parameters() {
        for query in [None, Some("de=kde"), Some("nvidia=open"), Some("de=&nvidia=open")] {
            let err = resolve("/download", query).unwrap_err();
            assert!(matches!(err, GatewayError::BadRequest(_)), "{query:?}");
        }
        assert!(matches!(
            resolve("/download-checksum", Some("de=kde")),
            Err(GatewayError::BadRequest(_))
        ));
    }

    #[test]
    fn test_keyring_key() {
        let key = resolve("/keyring.gpg", Some("ignored=1")).unwrap();
        assert_eq!(key.as_str(), "keyring.gpg");
    }

    #[test]
    fn test_unknown_paths() {
        for path in ["/", "/other.iso", "/download/extra", "/keyring.gpg/x", "keyring.gpg"] {
            assert!(matches!(resolve(path, None), Err(GatewayError::NotFound)), "{path}");
        }
    }

    #[test]
    fn test_custom_routes() {
        let routes = RoutesConfig {
            product: "secureblue".to_string(),
            download_path: "/iso".to_string(),
            checksum_path: "/iso/sum".to_string(),
            keyring_file: "signing.asc".to_string(),
        };
        let key = resolve_key("/iso/sum", Some("de=kde&nvidia=open"), &routes, "x").unwrap();
        assert_eq!(key.as_str(), "secureblue-kde-open-hardened-x.iso-CHECKSUM");
        assert_eq!(
            resolve_key("/signing.asc", None, &routes, "x").unwrap().as_str(),
            "signing.asc"
        );
    }
}

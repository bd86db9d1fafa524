//! MIME type detection module
//!
//! Returns the Content-Type of an object based on its key.

/// Default type for objects without a known extension
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Get MIME Content-Type for an object key
///
/// Checksum objects (`-CHECKSUM` suffix) are plain text.
///
/// # Examples
/// ```
/// use isogate::http::mime::content_type_for_key;
/// assert_eq!(content_type_for_key("os-kde-nvidia-hardened-20240101.iso"), "application/x-iso9660-image");
/// assert_eq!(content_type_for_key("os-kde-nvidia-hardened-20240101.iso-CHECKSUM"), "text/plain; charset=utf-8");
/// assert_eq!(content_type_for_key("blob"), "application/octet-stream");
/// ```
pub fn content_type_for_key(key: &str) -> &'static str {
    if key.ends_with("CHECKSUM") {
        return "text/plain; charset=utf-8";
    }

    let extension = key.rsplit_once('.').map(|(_, ext)| ext);
    match extension {
        // Images
        Some("iso") => "application/x-iso9660-image",
        Some("img" | "raw") => DEFAULT_CONTENT_TYPE,
        Some("qcow2") => "application/x-qemu-disk",

        // Keys and signatures
        Some("gpg" | "pgp" | "asc" | "pub") => "application/pgp-keys",
        Some("sig") => "application/pgp-signature",

        // Text, used for checksums and error pages
        Some("txt" | "sha256" | "sha512") => "text/plain; charset=utf-8",
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("json") => "application/json",

        _ => DEFAULT_CONTENT_TYPE,
    }
}

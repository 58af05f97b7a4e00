//! Pure, stateless helpers for HTTP request processing: `X-API-Key`
//! enforcement and file-key percent-decoding for the `files/{*fileKey}`
//! route (spec §6).

use crate::api::error::ApiError;
use axum::http::HeaderMap;

/// `X-API-Key` header required in Prod, optional in Dev (spec §6).
pub fn check_api_key(headers: &HeaderMap, required_key: Option<&str>) -> Result<(), ApiError> {
    let Some(required_key) = required_key else {
        return Ok(());
    };

    let provided = headers
        .get("X-API-Key")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if provided == required_key {
        Ok(())
    } else {
        Err(ApiError::Unauthorized)
    }
}

/// Reverses `LocalObjectStore`'s per-segment percent-encoding: decodes
/// each `/`-separated segment independently so a literal `%2F` in a
/// filename can't be used to smuggle a path separator.
pub fn decode_file_key(raw: &str) -> Result<String, ApiError> {
    raw.split('/')
        .map(decode_segment)
        .collect::<Result<Vec<_>, _>>()
        .map(|segments| segments.join("/"))
}

fn decode_segment(segment: &str) -> Result<String, ApiError> {
    let bytes = segment.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            let value = hex.and_then(|h| u8::from_str_radix(h, 16).ok());
            match value {
                Some(byte) => {
                    out.push(byte);
                    i += 3;
                }
                None => {
                    out.push(bytes[i]);
                    i += 1;
                }
            }
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).map_err(|e| ApiError::InvalidPayload(format!("invalid file key: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_encoded_segments_preserving_slashes() {
        assert_eq!(
            decode_file_key("results/job%201/template.json").unwrap(),
            "results/job 1/template.json"
        );
    }

    #[test]
    fn api_key_check_passes_through_when_unconfigured() {
        let headers = HeaderMap::new();
        assert!(check_api_key(&headers, None).is_ok());
    }

    #[test]
    fn api_key_check_rejects_mismatch() {
        let mut headers = HeaderMap::new();
        headers.insert("X-API-Key", "wrong".parse().unwrap());
        assert!(check_api_key(&headers, Some("right")).is_err());
    }

    #[test]
    fn api_key_check_accepts_match() {
        let mut headers = HeaderMap::new();
        headers.insert("X-API-Key", "right".parse().unwrap());
        assert!(check_api_key(&headers, Some("right")).is_ok());
    }
}

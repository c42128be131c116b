//! Signed connection URLs
//!
//! The service authenticates the WebSocket upgrade through query parameters:
//! an HMAC-SHA256 signature over `host`, `date` and the request line, wrapped
//! in a base64 `authorization` value. The date is part of the signed content
//! and is checked against the server clock, so a fresh one is stamped on
//! every call.

use crate::error::{RecognizeError, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use url::Url;

type HmacSha256 = Hmac<Sha256>;

/// RFC1123 date as the server expects it, e.g. `Mon, 19 Oct 2026 08:00:00 GMT`
pub fn rfc1123_now() -> String {
    Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Build the signed `https://` (or `http://` for plain endpoints) URL for
/// `endpoint`, stamped with the current time.
pub fn build_signed_url(endpoint: &str, api_key: &str, api_secret: &str) -> Result<Url> {
    build_signed_url_at(endpoint, api_key, api_secret, &rfc1123_now())
}

/// Same as [`build_signed_url`] with a caller-supplied date string.
pub fn build_signed_url_at(
    endpoint: &str,
    api_key: &str,
    api_secret: &str,
    date: &str,
) -> Result<Url> {
    if api_key.is_empty() || api_secret.is_empty() {
        return Err(RecognizeError::AuthBuild(
            "api_key and api_secret must be set".to_string(),
        ));
    }

    let parsed = Url::parse(endpoint)
        .map_err(|e| RecognizeError::AuthBuild(format!("invalid endpoint {endpoint:?}: {e}")))?;

    let host = parsed
        .host_str()
        .ok_or_else(|| RecognizeError::AuthBuild(format!("endpoint {endpoint:?} has no host")))?
        .to_string();

    let scheme = match parsed.scheme() {
        "https" | "wss" => "https",
        "http" | "ws" => "http",
        other => {
            return Err(RecognizeError::AuthBuild(format!(
                "unsupported endpoint scheme {other:?}"
            )))
        }
    };

    let canonical = canonical_string(&host, date, parsed.path());
    let signature = sign(api_secret, &canonical)?;

    let authorization = format!(
        "api_key=\"{api_key}\", algorithm=\"hmac-sha256\", headers=\"host date request-line\", signature=\"{signature}\""
    );

    let authority = match parsed.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.clone(),
    };

    let mut signed = Url::parse(&format!("{scheme}://{authority}{}", parsed.path()))
        .map_err(|e| RecognizeError::AuthBuild(e.to_string()))?;
    signed
        .query_pairs_mut()
        .append_pair("authorization", &BASE64.encode(authorization.as_bytes()))
        .append_pair("date", date)
        .append_pair("host", &host);

    Ok(signed)
}

/// The three-line string the signature covers. No trailing newline.
pub fn canonical_string(host: &str, date: &str, path: &str) -> String {
    format!("host: {host}\ndate: {date}\nGET {path} HTTP/1.1")
}

/// Base64 of HMAC-SHA256(`secret`, `canonical`)
pub fn sign(secret: &str, canonical: &str) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| RecognizeError::AuthBuild(format!("invalid api_secret: {e}")))?;
    mac.update(canonical.as_bytes());
    Ok(BASE64.encode(mac.finalize().into_bytes()))
}

/// Rewrite the scheme for the WebSocket handshake: `https` → `wss`, `http` → `ws`.
pub fn to_websocket_url(url: &Url) -> String {
    let s = url.as_str();
    if let Some(rest) = s.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = s.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DATE: &str = "Mon, 19 Oct 2026 08:00:00 GMT";

    fn query(url: &Url, key: &str) -> Option<String> {
        url.query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }

    #[test]
    fn test_signed_url_is_deterministic() -> Result<()> {
        let a = build_signed_url_at(crate::config::DEFAULT_ENDPOINT, "key", "secret", DATE)?;
        let b = build_signed_url_at(crate::config::DEFAULT_ENDPOINT, "key", "secret", DATE)?;
        assert_eq!(a, b);
        assert_eq!(a.scheme(), "https");
        assert_eq!(a.host_str(), Some("iat-api.xfyun.cn"));
        assert_eq!(a.path(), "/v2/iat");
        assert_eq!(query(&a, "date").as_deref(), Some(DATE));
        assert_eq!(query(&a, "host").as_deref(), Some("iat-api.xfyun.cn"));
        Ok(())
    }

    #[test]
    fn test_signature_verifies_against_recomputation() -> Result<()> {
        let url = build_signed_url_at("https://iat-api.xfyun.cn/v2/iat", "key", "secret", DATE)?;
        let encoded = query(&url, "authorization").unwrap();
        let decoded = String::from_utf8(BASE64.decode(encoded).unwrap()).unwrap();

        let canonical = "host: iat-api.xfyun.cn\ndate: Mon, 19 Oct 2026 08:00:00 GMT\nGET /v2/iat HTTP/1.1";
        let mut mac = HmacSha256::new_from_slice(b"secret").unwrap();
        mac.update(canonical.as_bytes());
        let expected = BASE64.encode(mac.finalize().into_bytes());

        assert_eq!(
            decoded,
            format!(
                "api_key=\"key\", algorithm=\"hmac-sha256\", headers=\"host date request-line\", signature=\"{expected}\""
            )
        );
        Ok(())
    }

    #[test]
    fn test_canonical_string_has_no_trailing_newline() {
        let s = canonical_string("h", "d", "/p");
        assert_eq!(s, "host: h\ndate: d\nGET /p HTTP/1.1");
        assert_eq!(s.lines().count(), 3);
    }

    #[test]
    fn test_different_secret_changes_signature() -> Result<()> {
        let canonical = canonical_string("h", DATE, "/v2/iat");
        assert_ne!(sign("one", &canonical)?, sign("two", &canonical)?);
        Ok(())
    }

    #[test]
    fn test_port_kept_in_url_but_not_in_host() -> Result<()> {
        let url = build_signed_url_at("http://127.0.0.1:9000/v2/iat", "key", "secret", DATE)?;
        assert_eq!(url.port(), Some(9000));
        assert_eq!(query(&url, "host").as_deref(), Some("127.0.0.1"));
        assert!(to_websocket_url(&url).starts_with("ws://127.0.0.1:9000/v2/iat?"));
        Ok(())
    }

    #[test]
    fn test_websocket_scheme_rewrite() -> Result<()> {
        let url = build_signed_url_at("wss://iat-api.xfyun.cn/v2/iat", "key", "secret", DATE)?;
        assert_eq!(url.scheme(), "https");
        assert!(to_websocket_url(&url).starts_with("wss://iat-api.xfyun.cn/v2/iat?authorization="));
        Ok(())
    }

    #[test]
    fn test_malformed_endpoint_fails_before_io() {
        let err = build_signed_url_at("not a url", "key", "secret", DATE).unwrap_err();
        assert!(matches!(err, RecognizeError::AuthBuild(_)));

        let err = build_signed_url_at("ftp://host/v2/iat", "key", "secret", DATE).unwrap_err();
        assert!(matches!(err, RecognizeError::AuthBuild(_)));
    }

    #[test]
    fn test_missing_credentials_rejected() {
        let err = build_signed_url_at(crate::config::DEFAULT_ENDPOINT, "", "secret", DATE).unwrap_err();
        assert!(matches!(err, RecognizeError::AuthBuild(_)));
    }

    #[test]
    fn test_rfc1123_shape() {
        let now = rfc1123_now();
        assert!(now.ends_with(" GMT"));
        assert_eq!(now.split(' ').count(), 6);
    }
}

//! OAuth 1.0a request signing (HMAC-SHA1).
//!
//! Requests carry JSON bodies, which are not part of the signature base
//! string; only the oauth parameters and any query parameters are signed.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use sha1::Sha1;

use super::AccountCredentials;

type HmacSha1 = Hmac<Sha1>;

/// Builds the `Authorization` header value for one request.
#[must_use]
pub fn authorization_header(
    credentials: &AccountCredentials,
    method: &str,
    url: &str,
) -> String {
    let nonce = uuid::Uuid::new_v4().simple().to_string();
    let timestamp = chrono::Utc::now().timestamp().to_string();
    signed_header(credentials, method, url, &nonce, &timestamp)
}

/// Deterministic core of [`authorization_header`].
pub(crate) fn signed_header(
    credentials: &AccountCredentials,
    method: &str,
    url: &str,
    nonce: &str,
    timestamp: &str,
) -> String {
    let (base_url, query) = url.split_once('?').unwrap_or((url, ""));

    let mut params: Vec<(String, String)> = vec![
        ("oauth_consumer_key".to_string(), credentials.consumer_key.clone()),
        ("oauth_nonce".to_string(), nonce.to_string()),
        ("oauth_signature_method".to_string(), "HMAC-SHA1".to_string()),
        ("oauth_timestamp".to_string(), timestamp.to_string()),
        ("oauth_token".to_string(), credentials.access_token.clone()),
        ("oauth_version".to_string(), "1.0".to_string()),
    ];
    let oauth_param_count = params.len();
    params.extend(query.split('&').filter(|p| !p.is_empty()).map(|pair| {
        let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
        (k.to_string(), v.to_string())
    }));

    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (percent_encode(k), percent_encode(v)))
        .collect();
    encoded.sort();
    let param_string = encoded
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let base_string = format!(
        "{}&{}&{}",
        method.to_ascii_uppercase(),
        percent_encode(base_url),
        percent_encode(&param_string)
    );
    let signing_key = format!(
        "{}&{}",
        percent_encode(&credentials.consumer_secret),
        percent_encode(&credentials.access_secret)
    );
    let signature = sign(&signing_key, &base_string);

    let mut header_params: Vec<(String, String)> =
        params.into_iter().take(oauth_param_count).collect();
    header_params.push(("oauth_signature".to_string(), signature));
    header_params.sort();

    let fields = header_params
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", percent_encode(k), percent_encode(v)))
        .collect::<Vec<_>>()
        .join(", ");
    format!("OAuth {fields}")
}

fn sign(key: &str, message: &str) -> String {
    // HMAC accepts keys of any length.
    let mut mac = match HmacSha1::new_from_slice(key.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(message.as_bytes());
    STANDARD.encode(mac.finalize().into_bytes())
}

/// RFC 3986 percent-encoding: everything but `A-Z a-z 0-9 - . _ ~`.
pub(crate) fn percent_encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(char::from(byte));
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::social::accounts::fixtures;

    #[test]
    fn percent_encoding_follows_rfc3986() {
        assert_eq!(percent_encode("Ladies + Gentlemen"), "Ladies%20%2B%20Gentlemen");
        assert_eq!(percent_encode("An encoded string!"), "An%20encoded%20string%21");
        assert_eq!(percent_encode("Dogs, Cats & Mice"), "Dogs%2C%20Cats%20%26%20Mice");
        assert_eq!(percent_encode("\u{2603}"), "%E2%98%83");
        assert_eq!(percent_encode("safe-._~"), "safe-._~");
    }

    #[test]
    fn header_is_deterministic_for_fixed_nonce() {
        let creds = fixtures::credentials("main");
        let url = "https://api.twitter.com/2/tweets";
        let a = signed_header(&creds, "post", url, "abc", "1700000000");
        let b = signed_header(&creds, "POST", url, "abc", "1700000000");
        assert_eq!(a, b);
        assert!(a.starts_with("OAuth "));
        assert!(a.contains("oauth_consumer_key=\"main-ck\""));
        assert!(a.contains("oauth_token=\"main-at\""));
        assert!(a.contains("oauth_signature=\""));
        assert!(!a.contains("main-cs"));
    }

    #[test]
    fn signature_depends_on_url_and_secrets() {
        let creds = fixtures::credentials("main");
        let other = fixtures::credentials("alt");
        let tweets = signed_header(&creds, "POST", "https://api.twitter.com/2/tweets", "n", "1");
        let me = signed_header(&creds, "POST", "https://api.twitter.com/2/users/me", "n", "1");
        let alt = signed_header(&other, "POST", "https://api.twitter.com/2/tweets", "n", "1");
        assert_ne!(tweets, me);
        assert_ne!(tweets, alt);
    }
}

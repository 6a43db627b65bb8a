//! OAuth 1.0a request signing (HMAC-SHA1).
//!
//! Only signing with an already-issued access token; obtaining tokens is
//! done out of band.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use hmac::{Hmac, Mac};
use secrecy::ExposeSecret;
use sha1::Sha1;

use crate::config::PublisherCredentials;
use crate::error::{Error, Result};

type HmacSha1 = Hmac<Sha1>;

/// RFC 3986 percent-encoding: everything but unreserved characters.
pub fn percent_encode(input: &str) -> String {
    urlencoding::encode(input).into_owned()
}

/// Per-request values that go into the signature.
pub struct RequestNonce<'a> {
    pub nonce: &'a str,
    pub timestamp: u64,
}

/// Compute the base64 HMAC-SHA1 signature over a request.
///
/// `params` holds every query/form parameter plus the `oauth_*` ones,
/// unencoded and in any order.
pub fn signature(
    method: &str,
    url: &str,
    params: &[(&str, &str)],
    consumer_secret: &str,
    token_secret: &str,
) -> Result<String> {
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
        percent_encode(url),
        percent_encode(&param_string)
    );
    let signing_key = format!(
        "{}&{}",
        percent_encode(consumer_secret),
        percent_encode(token_secret)
    );

    let mut mac = HmacSha1::new_from_slice(signing_key.as_bytes())
        .map_err(|e| Error::Publish(format!("cannot key request signature: {e}")))?;
    mac.update(base_string.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Build the `Authorization: OAuth ...` header value for a request.
///
/// `extra_params` are query/form parameters that take part in the signature
/// (a JSON body does not).
pub fn authorization_header(
    method: &str,
    url: &str,
    extra_params: &[(&str, &str)],
    credentials: &PublisherCredentials,
    request: &RequestNonce<'_>,
) -> Result<String> {
    let timestamp = request.timestamp.to_string();
    let oauth_params = [
        ("oauth_consumer_key", credentials.consumer_key.expose_secret()),
        ("oauth_nonce", request.nonce),
        ("oauth_signature_method", "HMAC-SHA1"),
        ("oauth_timestamp", timestamp.as_str()),
        ("oauth_token", credentials.access_token.expose_secret()),
        ("oauth_version", "1.0"),
    ];

    let mut all_params: Vec<(&str, &str)> = oauth_params.to_vec();
    all_params.extend_from_slice(extra_params);
    let signature = signature(
        method,
        url,
        &all_params,
        credentials.consumer_secret.expose_secret(),
        credentials.access_token_secret.expose_secret(),
    )?;

    let mut header_params: Vec<(&str, &str)> = oauth_params.to_vec();
    header_params.push(("oauth_signature", signature.as_str()));
    header_params.sort();

    let fields = header_params
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", percent_encode(k), percent_encode(v)))
        .collect::<Vec<_>>()
        .join(", ");
    Ok(format!("OAuth {fields}"))
}

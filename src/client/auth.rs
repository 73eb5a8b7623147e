//! SharedKey request signing for the Blob, Queue and File services.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Method, Request};
use sha2::Sha256;
use std::collections::BTreeMap;
use url::Url;

use crate::utils::error::{BridgeError, Result};

type HmacSha256 = Hmac<Sha256>;

const STANDARD_HEADERS: [&str; 11] = [
    "content-encoding",
    "content-language",
    "content-length",
    "content-md5",
    "content-type",
    "date",
    "if-modified-since",
    "if-match",
    "if-none-match",
    "if-unmodified-since",
    "range",
];

pub fn string_to_sign(method: &Method, headers: &HeaderMap, url: &Url, account: &str) -> String {
    let mut out = String::new();
    out.push_str(method.as_str());
    out.push('\n');

    for name in STANDARD_HEADERS {
        let value = header_value(headers, name);
        // A zero length is signed as an empty string.
        if name == "content-length" && value == "0" {
            out.push('\n');
            continue;
        }
        out.push_str(&value);
        out.push('\n');
    }

    out.push_str(&canonicalized_headers(headers));
    out.push_str(&canonicalized_resource(url, account));
    out
}

fn header_value(headers: &HeaderMap, name: &str) -> String {
    headers
        .get_all(name)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect::<Vec<_>>()
        .join(",")
}

fn canonicalized_headers(headers: &HeaderMap) -> String {
    let mut ms_headers: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in headers {
        let name = name.as_str();
        if !name.starts_with("x-ms-") {
            continue;
        }
        if let Ok(value) = value.to_str() {
            ms_headers
                .entry(name.to_string())
                .or_default()
                .push(value.trim().to_string());
        }
    }

    ms_headers
        .into_iter()
        .map(|(name, values)| format!("{}:{}\n", name, values.join(",")))
        .collect()
}

fn canonicalized_resource(url: &Url, account: &str) -> String {
    let mut resource = format!("/{}{}", account, url.path());

    let mut params: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in url.query_pairs() {
        params
            .entry(name.to_lowercase())
            .or_default()
            .push(value.into_owned());
    }

    for (name, mut values) in params {
        values.sort();
        resource.push('\n');
        resource.push_str(&name);
        resource.push(':');
        resource.push_str(&values.join(","));
    }

    resource
}

pub fn compute_signature(key: &[u8], string_to_sign: &str) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(|e| BridgeError::ConfigError {
        message: format!("Invalid account key: {}", e),
    })?;
    mac.update(string_to_sign.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Adds `Authorization: SharedKey <account>:<signature>` to a built request.
pub fn authorize(request: &mut Request, account: &str, key: &[u8]) -> Result<()> {
    let sts = string_to_sign(request.method(), request.headers(), request.url(), account);
    let signature = compute_signature(key, &sts)?;
    let value = HeaderValue::from_str(&format!("SharedKey {}:{}", account, signature))
        .map_err(|e| BridgeError::invalid_argument(format!("Bad authorization header: {}", e)))?;
    request.headers_mut().insert(AUTHORIZATION, value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};

    #[test]
    fn test_string_to_sign_layout() {
        let mut headers = HeaderMap::new();
        headers.insert("x-ms-version", HeaderValue::from_static("2021-08-06"));
        headers.insert(
            "x-ms-date",
            HeaderValue::from_static("Fri, 26 Jun 2015 23:39:12 GMT"),
        );
        headers.insert("x-ms-blob-type", HeaderValue::from_static("BlockBlob"));
        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("5"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));

        let url = Url::parse("https://acct.blob.core.windows.net/c1/foo/bar.txt").unwrap();
        let sts = string_to_sign(&Method::PUT, &headers, &url, "acct");

        let expected = "PUT\n\n\n5\n\ntext/plain\n\n\n\n\n\n\n\
             x-ms-blob-type:BlockBlob\n\
             x-ms-date:Fri, 26 Jun 2015 23:39:12 GMT\n\
             x-ms-version:2021-08-06\n\
             /acct/c1/foo/bar.txt";
        assert_eq!(sts, expected);
    }

    #[test]
    fn test_zero_length_and_sorted_query() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("0"));

        let url =
            Url::parse("http://127.0.0.1:10000/devstoreaccount1/c1?restype=container&comp=list&prefix=a%2F")
                .unwrap();
        let sts = string_to_sign(&Method::GET, &headers, &url, "devstoreaccount1");

        assert!(sts.starts_with("GET\n\n\n\n"));
        assert!(sts.ends_with(
            "/devstoreaccount1/devstoreaccount1/c1\ncomp:list\nprefix:a/\nrestype:container"
        ));
    }

    #[test]
    fn test_signature_is_base64_sha256() {
        let signature = compute_signature(b"secret", "GET\n").unwrap();
        let raw = STANDARD.decode(signature).unwrap();
        assert_eq!(raw.len(), 32);
    }
}

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_LENGTH};
use reqwest::{Client, Method, Response, StatusCode};
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

use crate::client::auth;
use crate::client::connection::{Credentials, ServiceKind, StorageAccount};
use crate::client::xml::{from_xml, ErrorBody};
use crate::domain::model::{ByteStream, UploadOptions};
use crate::utils::error::{BridgeError, Result};

pub const API_VERSION: &str = "2021-08-06";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const META_PREFIX: &str = "x-ms-meta-";

/// Signs, sends and classifies storage REST calls.
#[derive(Debug, Clone)]
pub struct RestTransport {
    client: Client,
    account: StorageAccount,
}

impl RestTransport {
    pub fn new(account: StorageAccount, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, account })
    }

    pub fn account(&self) -> &StorageAccount {
        &self.account
    }

    /// Service URL for `segments` (each may contain `/`), with query pairs.
    pub fn url(&self, kind: ServiceKind, segments: &[&str], query: &[(&str, &str)]) -> Result<Url> {
        let mut url = self.account.endpoint(kind)?.clone();
        {
            let mut path = url.path_segments_mut().map_err(|_| BridgeError::ConfigError {
                message: format!("{} endpoint cannot be a base URL", kind),
            })?;
            path.pop_if_empty();
            for segment in segments {
                path.extend(segment.split('/'));
            }
        }
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    /// URL usable as an `x-ms-copy-source`: carries the SAS token when the
    /// account authenticates with one.
    pub fn source_url(&self, kind: ServiceKind, segments: &[&str]) -> Result<Url> {
        let mut url = self.url(kind, segments, &[])?;
        self.append_sas(&mut url);
        Ok(url)
    }

    fn append_sas(&self, url: &mut Url) {
        if let Credentials::SharedAccessSignature { token } = &self.account.credentials {
            let query = match url.query() {
                Some(existing) if !existing.is_empty() => format!("{}&{}", existing, token),
                _ => token.clone(),
            };
            url.set_query(Some(&query));
        }
    }

    pub async fn send(
        &self,
        method: Method,
        mut url: Url,
        mut headers: HeaderMap,
        body: Option<Bytes>,
    ) -> Result<Response> {
        self.append_sas(&mut url);

        headers.insert("x-ms-version", HeaderValue::from_static(API_VERSION));
        insert_header(&mut headers, "x-ms-date", &http_date(Utc::now()))?;

        let body = match body {
            Some(body) => Some(body),
            // Writes without a payload still need an explicit zero length.
            None if method == Method::PUT || method == Method::POST => Some(Bytes::new()),
            None => None,
        };
        if let Some(body) = &body {
            headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
        }

        let mut builder = self.client.request(method.clone(), url).headers(headers);
        if let Some(body) = body {
            builder = builder.body(body);
        }
        let mut request = builder.build()?;

        if let Credentials::SharedKey { key } = &self.account.credentials {
            auth::authorize(&mut request, &self.account.account_name, key)?;
        }

        tracing::debug!("{} {}", method, request.url().path());
        let response = self.client.execute(request).await?;
        tracing::debug!("{} {} -> {}", method, response.url().path(), response.status());

        if response.status().is_success() {
            Ok(response)
        } else {
            Err(classify_failure(response).await)
        }
    }
}

/// 404 becomes `NotFound`; every other non-success status is a service failure.
async fn classify_failure(response: Response) -> BridgeError {
    let status = response.status();
    let header_code = header_string(response.headers(), "x-ms-error-code");
    let body = response.text().await.unwrap_or_default();
    let parsed = if body.trim().is_empty() {
        None
    } else {
        from_xml::<ErrorBody>(&body).ok()
    };

    let code = header_code.or_else(|| parsed.as_ref().and_then(|p| p.code.clone()));
    let reason = reason_phrase(status);

    if status == StatusCode::NOT_FOUND {
        return BridgeError::NotFound {
            status: status.as_u16(),
            reason,
            code,
        };
    }

    BridgeError::ServiceFailure {
        status: status.as_u16(),
        reason,
        code,
        message: parsed.and_then(|p| p.message).unwrap_or_default(),
    }
}

fn reason_phrase(status: StatusCode) -> String {
    status.canonical_reason().unwrap_or("Unknown").to_string()
}

pub fn insert_header(headers: &mut HeaderMap, name: &str, value: &str) -> Result<()> {
    let name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| BridgeError::invalid_argument(format!("Invalid header name {}: {}", name, e)))?;
    let value = HeaderValue::from_str(value).map_err(|e| {
        BridgeError::invalid_argument(format!("Invalid value for header {}: {}", name, e))
    })?;
    headers.insert(name, value);
    Ok(())
}

/// Content headers under `prefix` (`x-ms-blob-` for blobs, `x-ms-` for files)
/// plus `x-ms-meta-*`.
pub fn upload_headers(options: &UploadOptions, prefix: &str) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    let pairs = [
        ("content-type", &options.content_type),
        ("cache-control", &options.cache_control),
        ("content-language", &options.content_language),
        ("content-encoding", &options.content_encoding),
    ];
    for (name, value) in pairs {
        if let Some(value) = value {
            insert_header(&mut headers, &format!("{}{}", prefix, name), value)?;
        }
    }
    for (key, value) in &options.metadata {
        insert_header(&mut headers, &format!("{}{}", META_PREFIX, key), value)?;
    }
    Ok(headers)
}

pub fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
}

pub fn header_u64(headers: &HeaderMap, name: &str) -> Result<u64> {
    match header_string(headers, name) {
        Some(value) => value.trim().parse().map_err(|_| {
            BridgeError::invalid_response(format!("Header {} is not a number: {}", name, value))
        }),
        None => Ok(0),
    }
}

pub fn last_modified(headers: &HeaderMap) -> Result<DateTime<Utc>> {
    let value = header_string(headers, "last-modified")
        .ok_or_else(|| BridgeError::invalid_response("Response is missing Last-Modified"))?;
    parse_http_date(&value)
}

pub fn metadata(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            let key = name.as_str().strip_prefix(META_PREFIX)?;
            Some((key.to_string(), value.to_str().ok()?.to_string()))
        })
        .collect()
}

pub fn http_date(time: DateTime<Utc>) -> String {
    time.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

pub fn parse_http_date(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| BridgeError::invalid_response(format!("Unparseable date {:?}: {}", value, e)))
}

pub fn body_stream(response: Response) -> ByteStream {
    Box::pin(response.bytes_stream().map_err(BridgeError::from))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_http_date_round_trip_format() {
        let time = Utc.with_ymd_and_hms(2009, 9, 9, 9, 20, 2).unwrap();
        assert_eq!(http_date(time), "Wed, 09 Sep 2009 09:20:02 GMT");
        assert_eq!(parse_http_date("Wed, 09 Sep 2009 09:20:02 GMT").unwrap(), time);
        assert!(matches!(
            parse_http_date("yesterday"),
            Err(BridgeError::InvalidResponse { .. })
        ));
    }

    #[test]
    fn test_upload_headers_prefixing() {
        let mut options = UploadOptions {
            content_type: Some("text/plain".to_string()),
            cache_control: Some("max-age=60".to_string()),
            ..Default::default()
        };
        options.metadata.insert("Owner".to_string(), "ops".to_string());

        let headers = upload_headers(&options, "x-ms-blob-").unwrap();
        assert_eq!(
            header_string(&headers, "x-ms-blob-content-type").as_deref(),
            Some("text/plain")
        );
        assert_eq!(
            header_string(&headers, "x-ms-blob-cache-control").as_deref(),
            Some("max-age=60")
        );
        assert_eq!(header_string(&headers, "x-ms-meta-owner").as_deref(), Some("ops"));
        assert_eq!(metadata(&headers).get("owner").map(String::as_str), Some("ops"));
    }
}

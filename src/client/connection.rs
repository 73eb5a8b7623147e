use crate::utils::error::{BridgeError, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::fmt;
use url::Url;

pub const DEV_STORE_ACCOUNT: &str = "devstoreaccount1";
pub const DEV_STORE_KEY: &str =
    "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";
const DEFAULT_ENDPOINT_SUFFIX: &str = "core.windows.net";

/// `DefaultEndpointsProtocol=<protocol>;AccountName=<account>;AccountKey=<key>`
pub fn build_connection_string(protocol: &str, account_name: &str, key: &str) -> String {
    format!(
        "DefaultEndpointsProtocol={};AccountName={};AccountKey={}",
        protocol, account_name, key
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    Blob,
    Queue,
    File,
}

impl ServiceKind {
    fn subdomain(self) -> &'static str {
        match self {
            ServiceKind::Blob => "blob",
            ServiceKind::Queue => "queue",
            ServiceKind::File => "file",
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.subdomain())
    }
}

#[derive(Clone)]
pub enum Credentials {
    SharedKey { key: Vec<u8> },
    /// SAS token without the leading `?`.
    SharedAccessSignature { token: String },
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::SharedKey { .. } => f.write_str("SharedKey(..)"),
            Credentials::SharedAccessSignature { .. } => f.write_str("SharedAccessSignature(..)"),
        }
    }
}

/// Account, credentials and per-service endpoints parsed from a connection string.
#[derive(Debug, Clone)]
pub struct StorageAccount {
    pub account_name: String,
    pub credentials: Credentials,
    blob_endpoint: Option<Url>,
    queue_endpoint: Option<Url>,
    file_endpoint: Option<Url>,
}

impl StorageAccount {
    pub fn from_connection_string(connection_string: &str) -> Result<Self> {
        let mut protocol = "https".to_string();
        let mut account_name = None;
        let mut account_key = None;
        let mut sas = None;
        let mut suffix = DEFAULT_ENDPOINT_SUFFIX.to_string();
        let mut blob_endpoint = None;
        let mut queue_endpoint = None;
        let mut file_endpoint = None;
        let mut development = false;

        for part in connection_string.split(';') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            // Values (keys, SAS tokens) may contain '='.
            let (name, value) = part.split_once('=').ok_or_else(|| BridgeError::ConfigError {
                message: format!("Malformed connection string segment: {}", part),
            })?;
            let value = value.trim().to_string();
            match name.trim().to_ascii_lowercase().as_str() {
                "defaultendpointsprotocol" => protocol = value,
                "accountname" => account_name = Some(value),
                "accountkey" => account_key = Some(value),
                "sharedaccesssignature" => sas = Some(value.trim_start_matches('?').to_string()),
                "endpointsuffix" => suffix = value,
                "blobendpoint" => blob_endpoint = Some(parse_endpoint("BlobEndpoint", &value)?),
                "queueendpoint" => queue_endpoint = Some(parse_endpoint("QueueEndpoint", &value)?),
                "fileendpoint" => file_endpoint = Some(parse_endpoint("FileEndpoint", &value)?),
                "usedevelopmentstorage" => development = value.eq_ignore_ascii_case("true"),
                other => {
                    tracing::debug!("Ignoring connection string setting: {}", other);
                }
            }
        }

        if development {
            account_name.get_or_insert_with(|| DEV_STORE_ACCOUNT.to_string());
            account_key.get_or_insert_with(|| DEV_STORE_KEY.to_string());
            if blob_endpoint.is_none() {
                blob_endpoint = Some(parse_endpoint(
                    "BlobEndpoint",
                    "http://127.0.0.1:10000/devstoreaccount1",
                )?);
            }
            if queue_endpoint.is_none() {
                queue_endpoint = Some(parse_endpoint(
                    "QueueEndpoint",
                    "http://127.0.0.1:10001/devstoreaccount1",
                )?);
            }
        }

        let account_name = account_name.ok_or_else(|| BridgeError::MissingConfigError {
            field: "AccountName".to_string(),
        })?;

        let credentials = match (account_key, sas) {
            (Some(key), _) => Credentials::SharedKey {
                key: STANDARD
                    .decode(key.as_bytes())
                    .map_err(|e| BridgeError::InvalidConfigValueError {
                        field: "AccountKey".to_string(),
                        value: "<redacted>".to_string(),
                        reason: format!("Account key is not valid base64: {}", e),
                    })?,
            },
            (None, Some(token)) => Credentials::SharedAccessSignature { token },
            (None, None) => {
                return Err(BridgeError::MissingConfigError {
                    field: "AccountKey".to_string(),
                })
            }
        };

        if !development {
            for (slot, kind) in [
                (&mut blob_endpoint, ServiceKind::Blob),
                (&mut queue_endpoint, ServiceKind::Queue),
                (&mut file_endpoint, ServiceKind::File),
            ] {
                if slot.is_none() {
                    let url = format!(
                        "{}://{}.{}.{}",
                        protocol,
                        account_name,
                        kind.subdomain(),
                        suffix
                    );
                    *slot = Some(parse_endpoint(&format!("{}Endpoint", kind), &url)?);
                }
            }
        }

        Ok(Self {
            account_name,
            credentials,
            blob_endpoint,
            queue_endpoint,
            file_endpoint,
        })
    }

    pub fn endpoint(&self, kind: ServiceKind) -> Result<&Url> {
        let endpoint = match kind {
            ServiceKind::Blob => self.blob_endpoint.as_ref(),
            ServiceKind::Queue => self.queue_endpoint.as_ref(),
            ServiceKind::File => self.file_endpoint.as_ref(),
        };
        endpoint.ok_or_else(|| BridgeError::MissingConfigError {
            field: format!("{}Endpoint", kind),
        })
    }
}

fn parse_endpoint(field: &str, value: &str) -> Result<Url> {
    crate::utils::validation::validate_url(field, value)?;
    Url::parse(value).map_err(|e| BridgeError::InvalidConfigValueError {
        field: field.to_string(),
        value: value.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_connection_string() {
        assert_eq!(
            build_connection_string("https", "acct", "a2V5"),
            "DefaultEndpointsProtocol=https;AccountName=acct;AccountKey=a2V5"
        );
    }

    #[test]
    fn test_default_endpoints_from_account() {
        let account = StorageAccount::from_connection_string(
            "DefaultEndpointsProtocol=https;AccountName=acct;AccountKey=a2V5;",
        )
        .unwrap();

        assert_eq!(account.account_name, "acct");
        assert!(matches!(
            &account.credentials,
            Credentials::SharedKey { key } if key == b"key"
        ));
        assert_eq!(
            account.endpoint(ServiceKind::Blob).unwrap().as_str(),
            "https://acct.blob.core.windows.net/"
        );
        assert_eq!(
            account.endpoint(ServiceKind::File).unwrap().as_str(),
            "https://acct.file.core.windows.net/"
        );
    }

    #[test]
    fn test_explicit_endpoint_and_sas() {
        let account = StorageAccount::from_connection_string(
            "AccountName=acct;SharedAccessSignature=?sv=2021&sig=abc%3D;QueueEndpoint=http://localhost:9000/acct",
        )
        .unwrap();

        assert!(matches!(
            &account.credentials,
            Credentials::SharedAccessSignature { token } if token == "sv=2021&sig=abc%3D"
        ));
        assert_eq!(
            account.endpoint(ServiceKind::Queue).unwrap().as_str(),
            "http://localhost:9000/acct"
        );
    }

    #[test]
    fn test_development_storage() {
        let account = StorageAccount::from_connection_string("UseDevelopmentStorage=true").unwrap();
        assert_eq!(account.account_name, DEV_STORE_ACCOUNT);
        assert_eq!(
            account.endpoint(ServiceKind::Queue).unwrap().as_str(),
            "http://127.0.0.1:10001/devstoreaccount1"
        );
        assert!(account.endpoint(ServiceKind::File).is_err());
    }

    #[test]
    fn test_missing_key_is_rejected() {
        let err = StorageAccount::from_connection_string("AccountName=acct").unwrap_err();
        assert!(matches!(err, BridgeError::MissingConfigError { .. }));
    }
}

use crate::client::build_connection_string;
use crate::utils::error::{BridgeError, Result};
use crate::utils::validation::{
    validate_account_name, validate_non_empty_string, validate_positive_number,
    validate_protocol, validate_range, validate_resource_name, Validate,
};
use serde::{Deserialize, Serialize};

pub const MAX_VISIBILITY_TIMEOUT: u64 = 7 * 24 * 3600;

/// One layer of connection configuration. Every field is optional so layers
/// can be stacked; see [`ConnectionSettings::overlay`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    pub driver: Option<String>,
    pub protocol: Option<String>,
    pub account_name: Option<String>,
    pub key: Option<String>,
    pub connection_string: Option<String>,
    pub container: Option<String>,
    pub share: Option<String>,
    pub queue: Option<String>,
    /// Default queue name as written in the `[queue]` section.
    pub default: Option<String>,
    pub auto_create_container: Option<bool>,
    pub auto_create_share: Option<bool>,
    pub auto_create_queue: Option<bool>,
    pub auto_base64: Option<bool>,
    /// Visibility timeout in seconds for popped messages.
    pub timeout: Option<u64>,
    pub request_timeout_seconds: Option<u64>,
}

impl ConnectionSettings {
    /// Returns a copy where every field set in `top` replaces ours.
    pub fn overlay(&self, top: &ConnectionSettings) -> ConnectionSettings {
        macro_rules! pick {
            ($($field:ident),*) => {
                ConnectionSettings {
                    $($field: top.$field.clone().or_else(|| self.$field.clone()),)*
                }
            };
        }

        pick!(
            driver,
            protocol,
            account_name,
            key,
            connection_string,
            container,
            share,
            queue,
            default,
            auto_create_container,
            auto_create_share,
            auto_create_queue,
            auto_base64,
            timeout,
            request_timeout_seconds
        )
    }

    /// Stacks layers from lowest to highest precedence.
    pub fn merge<'a, I>(layers: I) -> ConnectionSettings
    where
        I: IntoIterator<Item = &'a ConnectionSettings>,
    {
        layers
            .into_iter()
            .fold(ConnectionSettings::default(), |acc, layer| acc.overlay(layer))
    }

    /// The explicit connection string, or one built from protocol, account
    /// name and key.
    pub fn connection_string(&self) -> Result<String> {
        if let Some(explicit) = self.connection_string.as_deref().filter(|s| !s.is_empty()) {
            return Ok(explicit.to_string());
        }

        let protocol = self.protocol.as_deref().unwrap_or("https");
        let account_name = self
            .account_name
            .as_deref()
            .ok_or_else(|| BridgeError::MissingConfigError {
                field: "account_name".to_string(),
            })?;
        let key = self
            .key
            .as_deref()
            .ok_or_else(|| BridgeError::MissingConfigError {
                field: "key".to_string(),
            })?;

        Ok(build_connection_string(protocol, account_name, key))
    }

    pub fn request_timeout(&self) -> std::time::Duration {
        self.request_timeout_seconds
            .map(std::time::Duration::from_secs)
            .unwrap_or(crate::client::http::DEFAULT_REQUEST_TIMEOUT)
    }
}

impl Validate for ConnectionSettings {
    fn validate(&self) -> Result<()> {
        if let Some(protocol) = &self.protocol {
            validate_protocol("protocol", protocol)?;
        }
        if let Some(account_name) = &self.account_name {
            validate_account_name("account_name", account_name)?;
        }
        if let Some(key) = &self.key {
            validate_non_empty_string("key", key)?;
        }
        if let Some(container) = &self.container {
            validate_resource_name("container", container)?;
        }
        if let Some(share) = &self.share {
            validate_resource_name("share", share)?;
        }
        for (field, queue) in [("queue", &self.queue), ("default", &self.default)] {
            if let Some(queue) = queue {
                validate_resource_name(field, queue)?;
            }
        }
        if let Some(timeout) = self.timeout {
            // 0 means "use the default"
            if timeout != 0 {
                validate_range("timeout", timeout, 1, MAX_VISIBILITY_TIMEOUT)?;
            }
        }
        if let Some(seconds) = self.request_timeout_seconds {
            validate_positive_number("request_timeout_seconds", seconds, 1)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlay_prefers_top_layer() {
        let credentials = ConnectionSettings {
            protocol: Some("https".to_string()),
            account_name: Some("acct".to_string()),
            key: Some("k1".to_string()),
            ..Default::default()
        };
        let disk = ConnectionSettings {
            key: Some("k2".to_string()),
            container: Some("c1".to_string()),
            ..Default::default()
        };

        let merged = ConnectionSettings::merge([&credentials, &disk]);
        assert_eq!(merged.account_name.as_deref(), Some("acct"));
        assert_eq!(merged.key.as_deref(), Some("k2"));
        assert_eq!(merged.container.as_deref(), Some("c1"));
    }

    #[test]
    fn test_connection_string_is_built_from_parts() {
        let settings = ConnectionSettings {
            protocol: Some("https".to_string()),
            account_name: Some("acct".to_string()),
            key: Some("k".to_string()),
            ..Default::default()
        };
        assert_eq!(
            settings.connection_string().unwrap(),
            "DefaultEndpointsProtocol=https;AccountName=acct;AccountKey=k"
        );

        let explicit = ConnectionSettings {
            connection_string: Some("UseDevelopmentStorage=true".to_string()),
            ..settings
        };
        assert_eq!(explicit.connection_string().unwrap(), "UseDevelopmentStorage=true");
    }

    #[test]
    fn test_missing_key_is_reported() {
        let settings = ConnectionSettings {
            account_name: Some("acct".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            settings.connection_string(),
            Err(BridgeError::MissingConfigError { field }) if field == "key"
        ));
    }

    #[test]
    fn test_validation_bounds() {
        let mut settings = ConnectionSettings {
            timeout: Some(604_801),
            ..Default::default()
        };
        assert!(settings.validate().is_err());

        settings.timeout = Some(0);
        assert!(settings.validate().is_ok());

        settings.request_timeout_seconds = Some(0);
        assert!(settings.validate().is_err());
    }
}

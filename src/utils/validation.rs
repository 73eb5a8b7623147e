use crate::utils::error::{BridgeError, Result};
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(BridgeError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: "URL cannot be empty".to_string(),
        });
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(BridgeError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: url_str.to_string(),
                reason: format!("Unsupported URL scheme: {}", scheme),
            }),
        },
        Err(e) => Err(BridgeError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: format!("Invalid URL format: {}", e),
        }),
    }
}

pub fn validate_protocol(field_name: &str, protocol: &str) -> Result<()> {
    match protocol {
        "http" | "https" => Ok(()),
        other => Err(BridgeError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: other.to_string(),
            reason: "Protocol must be http or https".to_string(),
        }),
    }
}

pub fn validate_required_field<'a, T>(field_name: &str, value: &'a Option<T>) -> Result<&'a T> {
    value.as_ref().ok_or_else(|| BridgeError::MissingConfigError {
        field: field_name.to_string(),
    })
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(BridgeError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

pub fn validate_positive_number(field_name: &str, value: u64, min_value: u64) -> Result<()> {
    if value < min_value {
        return Err(BridgeError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be at least {}", min_value),
        });
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(BridgeError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min, max),
        });
    }
    Ok(())
}

/// Storage account names: 3-24 lowercase letters and digits.
pub fn validate_account_name(field_name: &str, name: &str) -> Result<()> {
    if name.len() < 3 || name.len() > 24 {
        return Err(BridgeError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: name.to_string(),
            reason: "Account name must be between 3 and 24 characters".to_string(),
        });
    }

    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
    {
        return Err(BridgeError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: name.to_string(),
            reason: "Account name can only contain lowercase letters and numbers".to_string(),
        });
    }

    Ok(())
}

/// Container, share and queue names share one rule set: 3-63 characters,
/// lowercase letters, digits and single hyphens, starting and ending with a
/// letter or digit.
pub fn validate_resource_name(field_name: &str, name: &str) -> Result<()> {
    let invalid = |reason: &str| BridgeError::InvalidConfigValueError {
        field: field_name.to_string(),
        value: name.to_string(),
        reason: reason.to_string(),
    };

    if name.len() < 3 || name.len() > 63 {
        return Err(invalid("Name must be between 3 and 63 characters"));
    }

    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(invalid(
            "Name can only contain lowercase letters, numbers, and hyphens",
        ));
    }

    if name.starts_with('-') || name.ends_with('-') {
        return Err(invalid("Name cannot start or end with a hyphen"));
    }

    if name.contains("--") {
        return Err(invalid("Name cannot contain consecutive hyphens"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("blob_endpoint", "https://acct.blob.core.windows.net").is_ok());
        assert!(validate_url("blob_endpoint", "http://127.0.0.1:10000/devstoreaccount1").is_ok());
        assert!(validate_url("blob_endpoint", "").is_err());
        assert!(validate_url("blob_endpoint", "invalid-url").is_err());
        assert!(validate_url("blob_endpoint", "ftp://example.com").is_err());
    }

    #[test]
    fn test_validate_resource_name() {
        assert!(validate_resource_name("queue", "jobs").is_ok());
        assert!(validate_resource_name("queue", "image-resize-2").is_ok());
        assert!(validate_resource_name("queue", "ab").is_err());
        assert!(validate_resource_name("queue", "Jobs").is_err());
        assert!(validate_resource_name("queue", "-jobs").is_err());
        assert!(validate_resource_name("queue", "a--b").is_err());
        assert!(validate_resource_name("queue", "under_score").is_err());
    }

    #[test]
    fn test_validate_account_name() {
        assert!(validate_account_name("account_name", "devstoreaccount1").is_ok());
        assert!(validate_account_name("account_name", "My-Account").is_err());
        assert!(validate_account_name("account_name", "ab").is_err());
    }

    #[test]
    fn test_validate_range_and_protocol() {
        assert!(validate_range("timeout", 5u64, 1, 604_800).is_ok());
        assert!(validate_range("timeout", 0u64, 1, 604_800).is_err());
        assert!(validate_protocol("protocol", "https").is_ok());
        assert!(validate_protocol("protocol", "tcp").is_err());
    }
}

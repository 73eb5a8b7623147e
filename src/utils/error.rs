use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    /// Container, share, queue, blob or file is missing (HTTP 404).
    #[error("Resource not found ({status} {reason}){}", fmt_code(.code))]
    NotFound {
        status: u16,
        reason: String,
        code: Option<String>,
    },

    #[error("Storage service failure ({status} {reason}){}: {message}", fmt_code(.code))]
    ServiceFailure {
        status: u16,
        reason: String,
        code: Option<String>,
        message: String,
    },

    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// The pop receipt held by a job is no longer valid.
    #[error("Stale lease on message {message_id}: {reason}")]
    StaleLease { message_id: String, reason: String },

    /// A successful response the client could not decode.
    #[error("Invalid service response: {message}")]
    InvalidResponse { message: String },

    #[error("Operation not supported: {operation}")]
    Unsupported { operation: String },

    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("XML error: {0}")]
    XmlError(#[from] quick_xml::DeError),

    #[error("Base64 decode error: {0}")]
    DecodeError(#[from] base64::DecodeError),

    #[error("Invalid UTF-8 payload: {0}")]
    Utf8Error(#[from] std::string::FromUtf8Error),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value for {field} ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },
}

fn fmt_code(code: &Option<String>) -> String {
    code.as_ref().map(|c| format!(" [{}]", c)).unwrap_or_default()
}

impl BridgeError {
    pub fn not_found(status: u16, reason: impl Into<String>, code: Option<String>) -> Self {
        BridgeError::NotFound {
            status,
            reason: reason.into(),
            code,
        }
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        BridgeError::InvalidResponse {
            message: message.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        BridgeError::InvalidArgument {
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, BridgeError::NotFound { .. })
    }

    /// 409 conflicts such as `ContainerAlreadyExists` or `ShareAlreadyExists`.
    pub fn is_already_exists(&self) -> bool {
        match self {
            BridgeError::ServiceFailure { status, code, .. } => {
                *status == 409
                    && code
                        .as_deref()
                        .map(|c| c.ends_with("AlreadyExists"))
                        .unwrap_or(false)
            }
            _ => false,
        }
    }

    /// Vendor status code, when the error came from the storage service.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            BridgeError::NotFound { status, .. } | BridgeError::ServiceFailure { status, .. } => {
                Some(*status)
            }
            BridgeError::ApiError(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn error_code(&self) -> Option<&str> {
        match self {
            BridgeError::NotFound { code, .. } | BridgeError::ServiceFailure { code, .. } => {
                code.as_deref()
            }
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;

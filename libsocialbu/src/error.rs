//! Error types for the SocialBu client

use std::collections::BTreeMap;

use serde_json::Value;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SocialBuError>;

/// The pipeline step at which a media upload failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStep {
    /// Requesting a signed upload slot from the API (includes file resolution).
    SignedUrl,
    /// Transferring the raw bytes to storage via the signed URL.
    S3Upload,
    /// Querying the API for the final upload token.
    Confirmation,
}

impl UploadStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadStep::SignedUrl => "signed_url",
            UploadStep::S3Upload => "s3_upload",
            UploadStep::Confirmation => "confirmation",
        }
    }
}

impl std::fmt::Display for UploadStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The request that produced an API error, kept for logging and debugging.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: String,
    pub endpoint: String,
    pub payload: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: &str, endpoint: &str, payload: Option<Value>) -> Self {
        Self {
            method: method.to_string(),
            endpoint: endpoint.to_string(),
            payload,
        }
    }
}

#[derive(Error, Debug)]
pub enum SocialBuError {
    #[error("Authentication failed: {message}")]
    Authentication {
        message: String,
        response: Option<Value>,
        request: Option<ApiRequest>,
    },

    #[error("Not found: {message}")]
    NotFound {
        message: String,
        response: Option<Value>,
        request: Option<ApiRequest>,
    },

    /// Local required-field/capability failure, or an HTTP 422 from the API.
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        errors: BTreeMap<String, Vec<String>>,
        response: Option<Value>,
        request: Option<ApiRequest>,
    },

    #[error("Rate limit exceeded: {message}")]
    RateLimit {
        message: String,
        retry_after: Option<u64>,
        response: Option<Value>,
        request: Option<ApiRequest>,
    },

    #[error("Server error ({status}): {message}")]
    Server {
        message: String,
        status: u16,
        response: Option<Value>,
        request: Option<ApiRequest>,
    },

    /// Any other non-2xx API response.
    #[error("API error ({status}): {message}")]
    Api {
        message: String,
        status: u16,
        response: Option<Value>,
        request: Option<ApiRequest>,
    },

    #[error("Media upload failed at {step}: {message}")]
    MediaUpload {
        step: UploadStep,
        message: String,
        status: u16,
        response: Option<Value>,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

impl SocialBuError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            SocialBuError::Validation { .. } => 3,
            SocialBuError::Authentication { .. } => 2,
            _ => 1,
        }
    }

    /// HTTP status code associated with the error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            SocialBuError::Authentication { .. } => Some(401),
            SocialBuError::NotFound { .. } => Some(404),
            SocialBuError::Validation { response, .. } => response.as_ref().map(|_| 422),
            SocialBuError::RateLimit { .. } => Some(429),
            SocialBuError::Server { status, .. } | SocialBuError::Api { status, .. } => {
                Some(*status)
            }
            SocialBuError::MediaUpload { status, .. } if *status != 0 => Some(*status),
            _ => None,
        }
    }

    /// Field-scoped validation errors, if this is a validation failure.
    pub fn validation_errors(&self) -> Option<&BTreeMap<String, Vec<String>>> {
        match self {
            SocialBuError::Validation { errors, .. } => Some(errors),
            _ => None,
        }
    }

    /// Seconds until the rate limit resets, if provided by the API.
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            SocialBuError::RateLimit { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// The upload step that failed, if this is a media upload failure.
    pub fn upload_step(&self) -> Option<UploadStep> {
        match self {
            SocialBuError::MediaUpload { step, .. } => Some(*step),
            _ => None,
        }
    }

    /// Build a validation error from locally accumulated field errors.
    pub(crate) fn local_validation(
        message: &str,
        errors: BTreeMap<String, Vec<String>>,
    ) -> Self {
        SocialBuError::Validation {
            message: message.to_string(),
            errors,
            response: None,
            request: None,
        }
    }

    /// Build a media upload error for a step, with a plain message.
    pub(crate) fn upload(step: UploadStep, message: impl Into<String>) -> Self {
        SocialBuError::MediaUpload {
            step,
            message: message.into(),
            status: 0,
            response: None,
        }
    }

    /// Wrap an underlying error as a failure of the given upload step,
    /// preserving the status code and response body when available.
    pub(crate) fn at_upload_step(step: UploadStep, source: SocialBuError) -> Self {
        let status = source.status_code().unwrap_or(0);
        let response = match &source {
            SocialBuError::Authentication { response, .. }
            | SocialBuError::NotFound { response, .. }
            | SocialBuError::Validation { response, .. }
            | SocialBuError::RateLimit { response, .. }
            | SocialBuError::Server { response, .. }
            | SocialBuError::Api { response, .. }
            | SocialBuError::MediaUpload { response, .. } => response.clone(),
            _ => None,
        };
        let prefix = match step {
            UploadStep::SignedUrl => "Failed to get signed URL for media upload",
            UploadStep::S3Upload => "Failed to upload media to storage",
            UploadStep::Confirmation => "Failed to confirm media upload",
        };
        SocialBuError::MediaUpload {
            step,
            message: format!("{}: {}", prefix, source),
            status,
            response,
        }
    }
}

impl From<reqwest::Error> for SocialBuError {
    fn from(err: reqwest::Error) -> Self {
        SocialBuError::Network(err.to_string())
    }
}

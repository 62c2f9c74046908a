//! Error types for the PDF form server

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

/// Result type alias for the PDF form server
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the PDF form server
#[derive(Error, Debug)]
pub enum Error {
    /// Bytes could not be parsed as a PDF document
    #[error("Failed to load PDF document: {reason}")]
    DocumentLoad { reason: String },

    /// Re-serializing a modified document failed
    #[error("Failed to save PDF document: {reason}")]
    DocumentSave { reason: String },

    /// Writing a value into one field's dictionary failed
    #[error("Failed to update field \"{name}\": {reason}")]
    FieldUpdate { name: String, reason: String },

    /// No `pdf` part in the upload
    #[error("No PDF file uploaded")]
    MissingPdf,

    /// The `pdf` part does not carry `application/pdf`
    #[error("Only PDF files are allowed (got {content_type})")]
    NotPdf { content_type: String },

    /// A file part with a name other than `pdf` or `fields`
    #[error("Unexpected file field: {name}")]
    UnexpectedFileField { name: String },

    /// No `fields` part in a fill request
    #[error("Missing \"fields\" data in request body")]
    MissingFieldsData,

    /// The `fields` payload is not a JSON object of scalar values
    #[error("Invalid JSON in \"fields\" parameter: {reason}")]
    InvalidFieldsJson { reason: String },

    /// Upload exceeded the configured ceiling
    #[error("Upload too large (max: {max_bytes} bytes)")]
    UploadTooLarge { max_bytes: usize },

    /// Malformed multipart body
    #[error("File upload error: {reason}")]
    Upload { reason: String },

    /// Request to `/api` without an `Authorization` header
    #[error("Missing Authorization header")]
    MissingAuthorization,

    /// `Authorization` header does not match the configured secret
    #[error("Invalid API secret")]
    InvalidApiSecret,

    /// `API_SECRET` is not configured on the server
    #[error("API secret is not configured")]
    ApiSecretNotConfigured,

    /// Invalid server configuration
    #[error("Invalid configuration: {reason}")]
    Config { reason: String },

    /// Background task failed to complete
    #[error("Task join error: {reason}")]
    TaskJoin { reason: String },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// HTTP status for this error when it reaches the request boundary.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::MissingPdf
            | Error::NotPdf { .. }
            | Error::UnexpectedFileField { .. }
            | Error::MissingFieldsData
            | Error::InvalidFieldsJson { .. }
            | Error::UploadTooLarge { .. }
            | Error::Upload { .. } => StatusCode::BAD_REQUEST,
            Error::MissingAuthorization => StatusCode::UNAUTHORIZED,
            Error::InvalidApiSecret => StatusCode::FORBIDDEN,
            Error::DocumentLoad { .. }
            | Error::DocumentSave { .. }
            | Error::FieldUpdate { .. }
            | Error::ApiSecretNotConfigured
            | Error::Config { .. }
            | Error::TaskJoin { .. }
            | Error::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Return a message safe to send to clients.
    /// Library and parser details are omitted; they belong in `details`
    /// or in the log.
    pub fn client_message(&self) -> String {
        match self {
            Error::DocumentLoad { .. } => "Failed to load PDF document".to_string(),
            Error::DocumentSave { .. } => "Failed to save PDF document".to_string(),
            Error::FieldUpdate { name, .. } => format!("Failed to update field \"{}\"", name),
            Error::MissingPdf => "No PDF file uploaded".to_string(),
            Error::NotPdf { .. } => "Only PDF files are allowed".to_string(),
            Error::UnexpectedFileField { name } => format!("Unexpected file field: {}", name),
            Error::MissingFieldsData => "Missing \"fields\" data in request body".to_string(),
            Error::InvalidFieldsJson { .. } => "Invalid JSON in \"fields\" parameter".to_string(),
            Error::UploadTooLarge { max_bytes } => {
                format!("File size too large. Maximum allowed size is {}", human_size(*max_bytes))
            }
            Error::Upload { reason } => format!("File upload error: {}", reason),
            Error::MissingAuthorization => {
                "Unauthorized: Missing Authorization header".to_string()
            }
            Error::InvalidApiSecret => "Forbidden: Invalid API secret".to_string(),
            Error::ApiSecretNotConfigured => {
                "Server configuration error: API_SECRET not set".to_string()
            }
            Error::Config { .. } => "Server configuration error".to_string(),
            Error::TaskJoin { .. } | Error::Serialization(_) => {
                "Internal server error".to_string()
            }
        }
    }
}

/// Whole megabytes when the size is a multiple of one, bytes otherwise.
fn human_size(bytes: usize) -> String {
    const MIB: usize = 1024 * 1024;
    if bytes >= MIB && bytes % MIB == 0 {
        format!("{}MB", bytes / MIB)
    } else {
        format!("{} bytes", bytes)
    }
}

/// JSON error body returned by every failing endpoint
#[derive(Debug, Clone, Serialize, schemars::JsonSchema)]
pub struct ErrorBody {
    /// Error message
    pub error: String,
    /// Underlying cause, when it is useful to the caller
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Suggestion for fixing the request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

/// An error ready to be rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorBody,
}

impl ApiError {
    /// A document-level failure during an operation: generic message,
    /// cause text in `details`.
    pub fn operation_failed(message: &str, err: &Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: ErrorBody {
                error: message.to_string(),
                details: Some(err.to_string()),
                hint: None,
            },
        }
    }

    /// Render an error, including the cause text when `expose_details` is set.
    pub fn from_error(err: &Error, expose_details: bool) -> Self {
        let details = match err {
            Error::InvalidFieldsJson { reason } => Some(reason.clone()),
            _ if expose_details && err.status_code().is_server_error() => Some(err.to_string()),
            _ => None,
        };
        let hint = match err {
            Error::InvalidFieldsJson { .. } => Some(
                "Send \"fields\" as a JSON object, either as a text part or as a .json file part"
                    .to_string(),
            ),
            _ => None,
        };

        Self {
            status: err.status_code(),
            body: ErrorBody {
                error: err.client_message(),
                details,
                hint,
            },
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self::from_error(&err, false)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}

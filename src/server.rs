//! HTTP server implementation using axum

use crate::auth::require_api_secret;
use crate::config::ServerConfig;
use crate::error::{ApiError, Error, Result};
use crate::openapi::{openapi_document, swagger_ui_html, OPENAPI_JSON_PATH};
use crate::pdf::{
    extract_form_fields, fill_form_fields, FieldKind, FieldPosition, FillInstruction, FormField,
};
use axum::extract::multipart::{Field, MultipartError, MultipartRejection};
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{header, HeaderName, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{middleware, Json, Router};
use schemars::JsonSchema;
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Room for multipart boundaries, part headers and the `fields` part on
/// top of the file itself.
const MULTIPART_OVERHEAD_BYTES: usize = 1024 * 1024;

const PDF_CONTENT_TYPE: &str = "application/pdf";
const DEFAULT_OUTPUT_STEM: &str = "form";

const X_FIELDS_APPLIED: HeaderName = HeaderName::from_static("x-fields-applied");
const X_FIELDS_SKIPPED: HeaderName = HeaderName::from_static("x-fields-skipped");

/// State shared by all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    openapi: Arc<serde_json::Value>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Result<Self> {
        Ok(Self {
            config: Arc::new(config),
            openapi: Arc::new(openapi_document()?),
        })
    }

    fn expose_error_details(&self) -> bool {
        self.config.environment.exposes_error_details()
    }
}

// ============================================================================
// Response types
// ============================================================================

/// Wire name of a field kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum FieldTypeResponse {
    Text,
    Checkbox,
    Radio,
    Dropdown,
    Unknown,
}

/// Current value of a field: text for text/radio/dropdown, a flag for checkboxes
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[serde(untagged)]
pub enum FieldValueResponse {
    Text(String),
    Flag(bool),
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FieldPositionResponse {
    /// Zero-based page index
    pub page_index: u32,
    /// Distance from the left page edge in centimeters
    pub x: f64,
    /// Distance from the bottom page edge in centimeters
    pub y: f64,
    /// Width in centimeters
    pub width: f64,
    /// Height in centimeters
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FormFieldResponse {
    /// Fully qualified field name
    pub name: String,
    /// Field type
    #[serde(rename = "type")]
    pub field_type: FieldTypeResponse,
    /// Current value, if set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<FieldValueResponse>,
    /// Available options (radio and dropdown only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    /// Maximum text length (text fields with a limit only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
    /// Placement of the field's first widget
    pub position: FieldPositionResponse,
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct ExtractFieldsResponse {
    /// Form fields in reading order
    pub fields: Vec<FormFieldResponse>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct HealthResponse {
    /// Always "healthy"
    pub status: String,
    /// Current server time, RFC 3339
    pub timestamp: String,
}

impl From<&FieldPosition> for FieldPositionResponse {
    fn from(position: &FieldPosition) -> Self {
        Self {
            page_index: position.page_index,
            x: position.x,
            y: position.y,
            width: position.width,
            height: position.height,
        }
    }
}

impl From<&FormField> for FormFieldResponse {
    fn from(field: &FormField) -> Self {
        let (field_type, value, max_length) = match &field.kind {
            FieldKind::Text { value, max_length } => (
                FieldTypeResponse::Text,
                value.clone().map(FieldValueResponse::Text),
                *max_length,
            ),
            FieldKind::Checkbox { checked } => (
                FieldTypeResponse::Checkbox,
                Some(FieldValueResponse::Flag(*checked)),
                None,
            ),
            FieldKind::Radio { selected, .. } => (
                FieldTypeResponse::Radio,
                selected.clone().map(FieldValueResponse::Text),
                None,
            ),
            FieldKind::Dropdown { selected, .. } => (
                FieldTypeResponse::Dropdown,
                selected.clone().map(FieldValueResponse::Text),
                None,
            ),
            FieldKind::Unknown => (FieldTypeResponse::Unknown, None, None),
        };

        Self {
            name: field.name.clone(),
            field_type,
            value,
            options: field.kind.options().map(<[String]>::to_vec),
            max_length,
            position: FieldPositionResponse::from(&field.position),
        }
    }
}

// ============================================================================
// Multipart upload handling
// ============================================================================

/// The uploaded PDF part
#[derive(Debug)]
struct PdfUpload {
    file_name: Option<String>,
    data: Vec<u8>,
}

/// Parts collected from one multipart request
#[derive(Debug, Default)]
struct Upload {
    pdf: Option<PdfUpload>,
    /// `fields` sent as a plain form value
    fields_text: Option<String>,
    /// `fields` sent as a file-like part (e.g. a `.json` upload)
    fields_file: Option<Vec<u8>>,
}

impl Upload {
    /// Read every part. File parts other than `pdf` (and `fields` when
    /// `accept_fields` is set) are rejected; stray text parts are ignored.
    async fn read(
        multipart: std::result::Result<Multipart, MultipartRejection>,
        max_bytes: usize,
        accept_fields: bool,
    ) -> Result<Self> {
        let mut multipart = multipart.map_err(|rejection| {
            tracing::debug!(error = %rejection, "Request is not a multipart upload");
            Error::MissingPdf
        })?;

        let mut upload = Self::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| multipart_error(e, max_bytes))?
        {
            let name = field.name().unwrap_or_default().to_string();
            let is_file = field.file_name().is_some();

            match name.as_str() {
                "pdf" => {
                    let content_type = field.content_type().unwrap_or_default().to_string();
                    if !is_pdf_content_type(&content_type) {
                        return Err(Error::NotPdf { content_type });
                    }
                    if upload.pdf.is_some() {
                        continue;
                    }
                    let file_name = field.file_name().map(str::to_string);
                    let data = read_part(field, max_bytes).await?;
                    upload.pdf = Some(PdfUpload { file_name, data });
                }
                "fields" if accept_fields => {
                    let data = read_part(field, max_bytes).await?;
                    if is_file {
                        upload.fields_file = Some(data);
                    } else {
                        upload.fields_text = Some(String::from_utf8(data).map_err(|e| {
                            Error::InvalidFieldsJson {
                                reason: e.to_string(),
                            }
                        })?);
                    }
                }
                _ if is_file => return Err(Error::UnexpectedFileField { name: name.clone() }),
                _ => {}
            }
        }

        Ok(upload)
    }

    fn take_pdf(&mut self) -> Result<PdfUpload> {
        self.pdf.take().ok_or(Error::MissingPdf)
    }

    /// The `fields` payload: the text part wins over a file part, and
    /// empty payloads count as missing.
    fn take_fields(&mut self) -> Result<String> {
        if let Some(text) = self.fields_text.take().filter(|t| !t.trim().is_empty()) {
            return Ok(text);
        }
        match self.fields_file.take().filter(|data| !data.is_empty()) {
            Some(data) => String::from_utf8(data).map_err(|e| Error::InvalidFieldsJson {
                reason: e.to_string(),
            }),
            None => Err(Error::MissingFieldsData),
        }
    }
}

/// Read one part, failing once it grows past `max_bytes`.
async fn read_part(mut field: Field<'_>, max_bytes: usize) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| multipart_error(e, max_bytes))?
    {
        if data.len() + chunk.len() > max_bytes {
            return Err(Error::UploadTooLarge { max_bytes });
        }
        data.extend_from_slice(&chunk);
    }
    Ok(data)
}

fn multipart_error(err: MultipartError, max_bytes: usize) -> Error {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        Error::UploadTooLarge { max_bytes }
    } else {
        Error::Upload {
            reason: err.body_text(),
        }
    }
}

fn is_pdf_content_type(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .map(|essence| essence.trim().eq_ignore_ascii_case(PDF_CONTENT_TYPE))
        .unwrap_or(false)
}

/// `<stem>.filled.pdf` from the uploaded file name, restricted to
/// characters that are safe inside a quoted header parameter.
fn output_file_name(uploaded: Option<&str>) -> String {
    let base = uploaded
        .and_then(|name| name.rsplit(['/', '\\']).next())
        .unwrap_or_default();
    let stem = match base.len().checked_sub(4) {
        Some(cut) if base.is_char_boundary(cut) && base[cut..].eq_ignore_ascii_case(".pdf") => {
            &base[..cut]
        }
        _ => base,
    };

    let sanitized: String = stem
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii_graphic() || c == ' ' => c,
            _ => '_',
        })
        .collect();

    if sanitized.trim().is_empty() {
        format!("{}.filled.pdf", DEFAULT_OUTPUT_STEM)
    } else {
        format!("{}.filled.pdf", sanitized)
    }
}

// ============================================================================
// Handlers
// ============================================================================

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
    })
}

async fn openapi_json(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(state.openapi.as_ref().clone())
}

async fn swagger_ui() -> Html<String> {
    Html(swagger_ui_html())
}

/// Extract form fields from an uploaded PDF
async fn extract_fields(
    State(state): State<AppState>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> std::result::Result<Json<ExtractFieldsResponse>, ApiError> {
    let expose = state.expose_error_details();
    let mut upload = Upload::read(multipart, state.config.max_upload_bytes, false)
        .await
        .map_err(|e| reject(&e, expose))?;
    let pdf = upload.take_pdf().map_err(|e| reject(&e, expose))?;

    let size = pdf.data.len();
    // CPU-bound lopdf parsing
    let fields = tokio::task::spawn_blocking(move || extract_form_fields(&pdf.data))
        .await
        .map_err(|e| {
            reject(
                &Error::TaskJoin {
                    reason: e.to_string(),
                },
                expose,
            )
        })?
        .map_err(|e| {
            tracing::error!(error = %e, "extract_fields failed");
            ApiError::operation_failed("Failed to extract PDF form fields", &e)
        })?;

    tracing::info!(bytes = size, fields = fields.len(), "Extracted PDF form fields");

    Ok(Json(ExtractFieldsResponse {
        fields: fields.iter().map(FormFieldResponse::from).collect(),
    }))
}

/// Fill form fields in an uploaded PDF and return the result
async fn fill_form(
    State(state): State<AppState>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> std::result::Result<Response, ApiError> {
    let expose = state.expose_error_details();
    let mut upload = Upload::read(multipart, state.config.max_upload_bytes, true)
        .await
        .map_err(|e| reject(&e, expose))?;
    let pdf = upload.take_pdf().map_err(|e| reject(&e, expose))?;
    let instruction = upload
        .take_fields()
        .and_then(|json| FillInstruction::from_json_str(&json))
        .map_err(|e| reject(&e, expose))?;

    let file_name = output_file_name(pdf.file_name.as_deref());
    // CPU-bound lopdf parsing and serialization
    let (output, report) =
        tokio::task::spawn_blocking(move || fill_form_fields(&pdf.data, &instruction))
            .await
            .map_err(|e| {
                reject(
                    &Error::TaskJoin {
                        reason: e.to_string(),
                    },
                    expose,
                )
            })?
            .map_err(|e| {
                tracing::error!(error = %e, "fill_form failed");
                ApiError::operation_failed("Failed to fill PDF form", &e)
            })?;

    let applied = report.applied_count();
    let skipped = report.skipped().count();
    tracing::info!(
        applied,
        skipped,
        bytes = output.len(),
        file = %file_name,
        "Filled PDF form"
    );

    Ok((
        [
            (header::CONTENT_TYPE, PDF_CONTENT_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
            (header::CONTENT_LENGTH, output.len().to_string()),
            (X_FIELDS_APPLIED, applied.to_string()),
            (X_FIELDS_SKIPPED, skipped.to_string()),
        ],
        output,
    )
        .into_response())
}

fn reject(err: &Error, expose: bool) -> ApiError {
    if err.status_code().is_server_error() {
        tracing::error!(error = %err, "Request failed");
    } else {
        tracing::debug!(error = %err, "Rejected request");
    }
    ApiError::from_error(err, expose)
}

// ============================================================================
// Router and entry point
// ============================================================================

/// Build the application router.
pub fn build_router(config: ServerConfig) -> Result<Router> {
    let body_limit = config
        .max_upload_bytes
        .saturating_mul(2)
        .saturating_add(MULTIPART_OVERHEAD_BYTES);
    let state = AppState::new(config)?;

    let api = Router::new()
        .route("/pdf/extract-fields", post(extract_fields))
        .route("/pdf/fill-form", post(fill_form))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_api_secret,
        ));

    Ok(Router::new()
        .route("/health", get(health))
        .route("/api-docs", get(swagger_ui))
        .route(OPENAPI_JSON_PATH, get(openapi_json))
        .nest("/api", api)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

/// Run the HTTP server until Ctrl-C.
pub async fn run_server(config: ServerConfig) -> anyhow::Result<()> {
    let addr = config.socket_addr()?;
    if config.api_secret.is_none() {
        tracing::warn!("API_SECRET is not set; all /api requests will fail");
    }
    let environment = config.environment;
    let app = build_router(config)?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, ?environment, "PDF form server listening");
    tracing::info!("API documentation at http://{}/api-docs", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("PDF form server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}

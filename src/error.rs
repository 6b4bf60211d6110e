//! Error types for the Orgload import pipeline.
//!
//! This module defines a hierarchy of error types:
//!
//! - [`ConfigError`] - configuration / startup errors (fatal)
//! - [`ExcelError`] - spreadsheet reading errors
//! - [`ApiError`] - Strapi API client errors
//! - [`ImportError`] - top-level orchestration errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use thiserror::Error;

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors during configuration loading and validation.
///
/// All of these are fatal: the run aborts before any row is processed.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No API token and not a dry run.
    #[error("STRAPI_TOKEN is not set (set it or use DRY_RUN=true / --dry-run)")]
    MissingToken,

    /// Input spreadsheet does not exist.
    #[error("Excel file not found: {0}")]
    MissingInputFile(String),

    /// An environment variable holds a value that cannot be parsed.
    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: String, value: String },
}

// =============================================================================
// Excel Reading Errors
// =============================================================================

/// Errors while reading the input spreadsheet.
#[derive(Debug, Error)]
pub enum ExcelError {
    /// Failed to open or parse the workbook.
    #[error("Failed to read Excel file: {0}")]
    Workbook(#[from] calamine::XlsxError),

    /// The requested sheet is not in the workbook.
    #[error("Sheet \"{0}\" does not exist")]
    SheetNotFound(String),

    /// The workbook has no sheets at all.
    #[error("Workbook contains no sheets")]
    NoSheets,

    /// The sheet has no header row.
    #[error("Sheet \"{0}\" has no header row")]
    NoHeaders(String),
}

// =============================================================================
// API Client Errors
// =============================================================================

/// Errors from the Strapi API client.
///
/// HTTP error responses keep the status and raw body so the audit
/// log can record the server's diagnostics verbatim.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Transport-level failure (connection, timeout, TLS, ...).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The server answered with a 4xx/5xx status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body did not have the expected shape.
    #[error("Unexpected API response: {0}")]
    InvalidResponse(String),
}

impl ApiError {
    /// Raw response body for failed requests, if any.
    pub fn response_body(&self) -> Option<&str> {
        match self {
            ApiError::Status { body, .. } => Some(body),
            _ => None,
        }
    }
}

// =============================================================================
// Import Errors (top-level)
// =============================================================================

/// Top-level errors returned by the import entry points.
#[derive(Debug, Error)]
pub enum ImportError {
    /// Configuration error.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Excel reading error.
    #[error("Excel error: {0}")]
    Excel(#[from] ExcelError),

    /// API client error.
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Audit log file error.
    #[error("Log file error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for Excel reading.
pub type ExcelResult<T> = Result<T, ExcelError>;

/// Result type for API calls.
pub type ApiResult<T> = Result<T, ApiError>;

/// Result type for the import run.
pub type ImportResult<T> = Result<T, ImportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        let cfg_err = ConfigError::MissingToken;
        let import_err: ImportError = cfg_err.into();
        assert!(import_err.to_string().contains("STRAPI_TOKEN"));

        let api_err = ApiError::Status {
            status: 400,
            body: "ValidationError".into(),
        };
        let import_err: ImportError = api_err.into();
        assert!(import_err.to_string().contains("400"));
    }

    #[test]
    fn test_api_error_response_body() {
        let err = ApiError::Status {
            status: 500,
            body: "boom".into(),
        };
        assert_eq!(err.response_body(), Some("boom"));

        let err = ApiError::InvalidResponse("not json".into());
        assert_eq!(err.response_body(), None);
    }
}

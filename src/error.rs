//! Error types for PDF Eye-Saver

use thiserror::Error;

/// Result type alias for PDF Eye-Saver
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for PDF Eye-Saver
#[derive(Error, Debug)]
pub enum Error {
    /// Input bytes are not a parseable PDF
    #[error("Malformed input: {reason}")]
    MalformedInput { reason: String },

    /// Color is not `#RRGGBB` or a channel is out of range
    #[error("Unsupported color: {value}")]
    UnsupportedColor { value: String },

    /// Mode is neither "standard" nor "overlay"
    #[error("Unsupported mode: {value}")]
    UnsupportedMode { value: String },

    /// Overlay opacity outside (0, 1]
    #[error("Invalid overlay opacity: {value}")]
    InvalidOpacity { value: f32 },

    /// PDF is encrypted
    #[error("PDF is password protected")]
    Encrypted,

    /// PDF file not found
    #[error("PDF not found: {path}")]
    PdfNotFound { path: String },

    /// Cache key not found
    #[error("Cache key not found: {key}")]
    CacheKeyNotFound { key: String },

    /// Input exceeds the configured size limit
    #[error("Input too large: {size} bytes (max: {max_size} bytes)")]
    InputTooLarge { size: u64, max_size: u64 },

    /// Processing took longer than the configured timeout
    #[error("Processing timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    /// Background task panicked or was cancelled
    #[error("Task failed: {reason}")]
    TaskFailed { reason: String },

    /// Path access denied (outside allowed resource directories)
    #[error("Path access denied: {path}")]
    PathAccessDenied { path: String },

    /// Image dimension exceeded
    #[error("Image dimension exceeded: {detail}")]
    ImageDimensionExceeded { detail: String },

    /// PDFium error
    #[error("PDFium error: {reason}")]
    Pdfium { reason: String },

    /// Serialising the modified document failed
    #[error("Failed to write PDF: {reason}")]
    PdfWrite { reason: String },

    /// Base64 decode error
    #[error("Invalid base64 data: {0}")]
    Base64Decode(#[from] base64::DecodeError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Return a sanitized error message safe to send to clients.
    /// Internal details (paths, library errors) are omitted.
    /// Full details should be logged via tracing before calling this.
    pub fn client_message(&self) -> String {
        match self {
            Error::MalformedInput { .. } => "Malformed input: not a readable PDF".to_string(),
            Error::UnsupportedColor { value } => {
                format!("Unsupported color: {} (expected #RRGGBB)", value)
            }
            Error::UnsupportedMode { value } => {
                format!(
                    "Unsupported mode: {} (expected \"standard\" or \"overlay\")",
                    value
                )
            }
            Error::InvalidOpacity { value } => {
                format!("Invalid overlay opacity: {} (expected 0 < opacity <= 1)", value)
            }
            Error::Encrypted => "PDF is password protected".to_string(),
            Error::PdfNotFound { .. } => "PDF not found".to_string(),
            Error::CacheKeyNotFound { .. } => "Cache key not found".to_string(),
            Error::InputTooLarge { max_size, .. } => {
                format!("Input exceeds maximum size of {} bytes", max_size)
            }
            Error::Timeout { seconds } => format!("Processing timed out after {} seconds", seconds),
            Error::TaskFailed { .. } => "Internal error".to_string(),
            Error::PathAccessDenied { .. } => "Access denied".to_string(),
            Error::ImageDimensionExceeded { detail } => {
                format!("Image dimension exceeded: {}", detail)
            }
            Error::Pdfium { .. } => "Preview rendering error".to_string(),
            Error::PdfWrite { .. } => "PDF processing error".to_string(),
            Error::Base64Decode(_) => "Invalid base64 data".to_string(),
            Error::Io(_) => "I/O error".to_string(),
        }
    }
}

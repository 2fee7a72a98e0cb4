//! # Pipeline Error Handling
//!
//! One error type, [`FrameError`], covers every failure of the capture-and-persist pipeline,
//! from geometry misconfiguration to a full disk.
//!
//! ## Architecture
//!
//! - **Error Types**: struct-like variants, each carrying an [`ErrorContext`]
//! - **Error Context**: timestamp, operation, free-form context, recovery suggestion, severity
//!   and key/value metadata
//! - **Error Traits**: [`Retryable`], [`HasSeverity`], [`HasRecoverySuggestion`]
//! - **Classification**: the [`classify`] module separates programmer errors from per-frame
//!   failures
//!
//! ## Propagation Policy
//!
//! Geometry, selection and configuration errors mean the pipeline is wired wrong. They are
//! surfaced immediately and never retried. Persistence and resize failures drop the current
//! frame; the session keeps processing later frames. Nothing in a real-time frame pipeline is
//! retried, so [`Retryable::is_retryable`] is always false here.
//!
//! ## Usage
//!
//! ```rust
//! use frame_to_file::error::{classify, FrameError, HasSeverity, ErrorSeverity};
//!
//! let error = FrameError::missing_metadata("resized buffer supplied without width/height")
//!     .with_operation("select_variant");
//!
//! assert!(classify::is_programmer_error(&error));
//! assert_eq!(error.severity(), ErrorSeverity::Critical);
//! ```

use std::{
    collections::HashMap,
    error::Error as StdError,
    fmt,
    path::{Path, PathBuf},
    time::SystemTime,
};

use frame_scale::pixel::{ElementType, PixelFormat};
use frame_scale::ScaleError;

/// Severity levels for errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Debug,
    Info,
    /// The pipeline carries on, e.g. one file could not be deleted
    Warning,
    /// One frame was lost
    Error,
    /// The pipeline is misconfigured and every frame will fail the same way
    Critical,
}

/// Metadata about when and where an error occurred
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub timestamp: SystemTime,
    /// The operation being performed when the error occurred
    pub operation: Option<String>,
    pub context: Option<String>,
    pub recovery_suggestion: Option<String>,
    pub severity: ErrorSeverity,
    pub metadata: HashMap<String, String>,
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self {
            timestamp: SystemTime::now(),
            operation: None,
            context: None,
            recovery_suggestion: None,
            severity: ErrorSeverity::Error,
            metadata: HashMap::new(),
        }
    }
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_severity(mut self, severity: ErrorSeverity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_recovery_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.recovery_suggestion = Some(suggestion.into());
        self
    }

    fn critical(suggestion: &str) -> Self {
        Self::new()
            .with_severity(ErrorSeverity::Critical)
            .with_recovery_suggestion(suggestion)
    }
}

/// Base error type for the frame pipeline
#[derive(Debug)]
pub enum FrameError {
    /// Non-positive, non-finite or out-of-frame size fed to geometry
    InvalidDimension {
        what: String,
        reason: String,
        context: ErrorContext,
    },
    /// Resized buffer supplied without the metadata needed to read it
    MissingMetadata { reason: String, context: ErrorContext },
    /// Pixel format / element type combination rejected by the format policy
    UnsupportedFormat {
        pixel_format: PixelFormat,
        element_type: ElementType,
        context: ErrorContext,
    },
    /// Declared metadata describes a different byte length than the buffer holds
    BufferMismatch {
        expected: usize,
        actual: usize,
        context: ErrorContext,
    },
    /// Persisting a frame failed; the frame is dropped
    WriteFailed {
        path: PathBuf,
        source: std::io::Error,
        context: ErrorContext,
    },
    /// One file could not be removed while clearing the managed directory
    DeleteFailed {
        path: PathBuf,
        source: std::io::Error,
        context: ErrorContext,
    },
    /// Operation not allowed in the persister's current state
    State {
        current_state: String,
        attempted_operation: String,
        reason: String,
        context: ErrorContext,
    },
    /// Configuration validation errors
    Config {
        field: String,
        value: String,
        reason: String,
        context: ErrorContext,
    },
    /// I/O outside of a frame write, e.g. creating the managed directory
    Io {
        operation: String,
        path: Option<PathBuf>,
        source: std::io::Error,
        context: ErrorContext,
    },
    /// Explicit start-up failed
    Initialization {
        component: String,
        reason: String,
        context: ErrorContext,
    },
    /// The resize collaborator failed
    Resize {
        source: ScaleError,
        context: ErrorContext,
    },
    /// External library errors
    External {
        library: String,
        source: Box<dyn StdError + Send + Sync>,
        context: ErrorContext,
    },
}

impl FrameError {
    pub fn invalid_dimension(what: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidDimension {
            what: what.into(),
            reason: reason.into(),
            context: ErrorContext::critical("Check the frame format and crop size fed to geometry"),
        }
    }

    pub fn missing_metadata(reason: impl Into<String>) -> Self {
        Self::MissingMetadata {
            reason: reason.into(),
            context: ErrorContext::critical(
                "Always pass width, height, pixel format and element type with a resized buffer",
            ),
        }
    }

    pub fn unsupported_format(pixel_format: PixelFormat, element_type: ElementType) -> Self {
        Self::UnsupportedFormat {
            pixel_format,
            element_type,
            context: ErrorContext::critical(
                "Request argb/uint8 output or switch the format policy to passthrough",
            ),
        }
    }

    pub fn buffer_mismatch(expected: usize, actual: usize) -> Self {
        Self::BufferMismatch {
            expected,
            actual,
            context: ErrorContext::critical("Declared metadata must describe the buffer exactly"),
        }
    }

    pub fn write_failed(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::WriteFailed {
            path: path.into(),
            source,
            context: ErrorContext::new()
                .with_recovery_suggestion("Check free space and permissions of the frame directory"),
        }
    }

    pub fn delete_failed(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::DeleteFailed {
            path: path.into(),
            source,
            context: ErrorContext::new().with_severity(ErrorSeverity::Warning),
        }
    }

    pub fn state(
        current_state: impl Into<String>,
        attempted_operation: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::State {
            current_state: current_state.into(),
            attempted_operation: attempted_operation.into(),
            reason: reason.into(),
            context: ErrorContext::new().with_severity(ErrorSeverity::Warning),
        }
    }

    pub fn config(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Config {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
            context: ErrorContext::critical("Fix the pipeline configuration and restart"),
        }
    }

    pub fn io(operation: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            path: None,
            source,
            context: ErrorContext::new(),
        }
    }

    pub fn io_at(operation: impl Into<String>, path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            path: Some(path.to_path_buf()),
            source,
            context: ErrorContext::new(),
        }
    }

    pub fn initialization(component: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Initialization {
            component: component.into(),
            reason: reason.into(),
            context: ErrorContext::new().with_severity(ErrorSeverity::Critical),
        }
    }

    pub fn external(
        library: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::External {
            library: library.into(),
            source: Box::new(source),
            context: ErrorContext::new(),
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context_mut().context = Some(context.into());
        self
    }

    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.context_mut().operation = Some(operation.into());
        self
    }

    pub fn with_recovery_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.context_mut().recovery_suggestion = Some(suggestion.into());
        self
    }

    pub fn with_severity(mut self, severity: ErrorSeverity) -> Self {
        self.context_mut().severity = severity;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context_mut().metadata.insert(key.into(), value.into());
        self
    }

    pub fn context(&self) -> &ErrorContext {
        match self {
            Self::InvalidDimension { context, .. } => context,
            Self::MissingMetadata { context, .. } => context,
            Self::UnsupportedFormat { context, .. } => context,
            Self::BufferMismatch { context, .. } => context,
            Self::WriteFailed { context, .. } => context,
            Self::DeleteFailed { context, .. } => context,
            Self::State { context, .. } => context,
            Self::Config { context, .. } => context,
            Self::Io { context, .. } => context,
            Self::Initialization { context, .. } => context,
            Self::Resize { context, .. } => context,
            Self::External { context, .. } => context,
        }
    }

    fn context_mut(&mut self) -> &mut ErrorContext {
        match self {
            Self::InvalidDimension { context, .. } => context,
            Self::MissingMetadata { context, .. } => context,
            Self::UnsupportedFormat { context, .. } => context,
            Self::BufferMismatch { context, .. } => context,
            Self::WriteFailed { context, .. } => context,
            Self::DeleteFailed { context, .. } => context,
            Self::State { context, .. } => context,
            Self::Config { context, .. } => context,
            Self::Io { context, .. } => context,
            Self::Initialization { context, .. } => context,
            Self::Resize { context, .. } => context,
            Self::External { context, .. } => context,
        }
    }

    /// Short stable name, used as a log field
    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidDimension { .. } => "invalid_dimension",
            Self::MissingMetadata { .. } => "missing_metadata",
            Self::UnsupportedFormat { .. } => "unsupported_format",
            Self::BufferMismatch { .. } => "buffer_mismatch",
            Self::WriteFailed { .. } => "write_failed",
            Self::DeleteFailed { .. } => "delete_failed",
            Self::State { .. } => "state",
            Self::Config { .. } => "config",
            Self::Io { .. } => "io",
            Self::Initialization { .. } => "initialization",
            Self::Resize { .. } => "resize",
            Self::External { .. } => "external",
        }
    }
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::InvalidDimension { what, reason, .. } => {
                write!(f, "Invalid {}: {}", what, reason)
            }
            FrameError::MissingMetadata { reason, .. } => {
                write!(f, "Missing buffer metadata: {}", reason)
            }
            FrameError::UnsupportedFormat {
                pixel_format,
                element_type,
                ..
            } => write!(
                f,
                "Unsupported buffer format {}/{} (only argb/uint8 is guaranteed)",
                pixel_format, element_type
            ),
            FrameError::BufferMismatch {
                expected, actual, ..
            } => write!(
                f,
                "Buffer holds {} bytes but its metadata describes {} bytes",
                actual, expected
            ),
            FrameError::WriteFailed { path, source, .. } => {
                write!(f, "Failed to write frame to '{}': {}", path.display(), source)
            }
            FrameError::DeleteFailed { path, source, .. } => {
                write!(f, "Failed to delete '{}': {}", path.display(), source)
            }
            FrameError::State {
                current_state,
                attempted_operation,
                reason,
                ..
            } => write!(
                f,
                "Cannot {} while persister is {}: {}",
                attempted_operation, current_state, reason
            ),
            FrameError::Config {
                field,
                value,
                reason,
                ..
            } => write!(
                f,
                "Configuration error in '{}': {} (value: {})",
                field, reason, value
            ),
            FrameError::Io {
                operation,
                path,
                source,
                ..
            } => {
                if let Some(path) = path {
                    write!(
                        f,
                        "I/O error during {} on '{}': {}",
                        operation,
                        path.display(),
                        source
                    )
                } else {
                    write!(f, "I/O error during {}: {}", operation, source)
                }
            }
            FrameError::Initialization {
                component, reason, ..
            } => write!(f, "Failed to initialize {}: {}", component, reason),
            FrameError::Resize { source, .. } => write!(f, "Resize failed: {}", source),
            FrameError::External {
                library, source, ..
            } => write!(f, "External library error in {}: {}", library, source),
        }
    }
}

impl StdError for FrameError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::WriteFailed { source, .. } => Some(source),
            Self::DeleteFailed { source, .. } => Some(source),
            Self::Io { source, .. } => Some(source),
            Self::Resize { source, .. } => Some(source),
            Self::External { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

/// Result type alias using the pipeline error type
pub type FrameResult<T> = Result<T, FrameError>;

/// Trait for errors that can be retried
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for FrameError {
    /// Frames are dropped, never retried.
    fn is_retryable(&self) -> bool {
        false
    }
}

/// Trait for errors with severity levels
pub trait HasSeverity {
    fn severity(&self) -> ErrorSeverity;
}

impl HasSeverity for FrameError {
    fn severity(&self) -> ErrorSeverity {
        self.context().severity
    }
}

/// Trait for errors that provide recovery suggestions
pub trait HasRecoverySuggestion {
    fn recovery_suggestion(&self) -> Option<&str>;
}

impl HasRecoverySuggestion for FrameError {
    fn recovery_suggestion(&self) -> Option<&str> {
        self.context().recovery_suggestion.as_deref()
    }
}

/// Error classification utilities
pub mod classify {
    use super::*;

    /// Misconfigured pipeline: every following frame would fail the same way.
    pub fn is_programmer_error(error: &FrameError) -> bool {
        matches!(
            error,
            FrameError::InvalidDimension { .. }
                | FrameError::MissingMetadata { .. }
                | FrameError::UnsupportedFormat { .. }
                | FrameError::BufferMismatch { .. }
                | FrameError::Config { .. }
        )
    }

    /// The current frame is lost but processing continues with the next one.
    pub fn drops_frame(error: &FrameError) -> bool {
        matches!(
            error,
            FrameError::WriteFailed { .. }
                | FrameError::State { .. }
                | FrameError::Resize { .. }
                | FrameError::Io { .. }
        )
    }
}

impl From<std::io::Error> for FrameError {
    fn from(error: std::io::Error) -> Self {
        Self::io("unknown", error)
    }
}

impl From<serde_json::Error> for FrameError {
    fn from(error: serde_json::Error) -> Self {
        Self::external("serde_json", error)
    }
}

impl From<ScaleError> for FrameError {
    fn from(error: ScaleError) -> Self {
        match error {
            ScaleError::InvalidDimension { what, reason } => Self::invalid_dimension(what, reason),
            ScaleError::BufferMismatch { expected, actual } => {
                Self::buffer_mismatch(expected, actual)
            }
            ScaleError::UnsupportedSource {
                pixel_format,
                element_type,
            } => Self::unsupported_format(pixel_format, element_type)
                .with_context("resize source frame"),
            other => Self::Resize {
                source: other,
                context: ErrorContext::new()
                    .with_recovery_suggestion("Frame dropped; check the resize request"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let error = FrameError::config("resize_factor", "0.5", "must be >= 1");
        assert_eq!(error.category(), "config");
        assert!(!error.is_retryable());
        assert!(classify::is_programmer_error(&error));
    }

    #[test]
    fn test_error_with_context() {
        let error = FrameError::write_failed(
            "/tmp/frame.raw",
            std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        )
        .with_context("persisting resized frame")
        .with_metadata("bytes", "1920");

        assert_eq!(error.category(), "write_failed");
        assert_eq!(error.severity(), ErrorSeverity::Error);
        assert_eq!(error.context().metadata.get("bytes").map(String::as_str), Some("1920"));
        assert!(error.recovery_suggestion().is_some());
        assert!(error.source().is_some());
    }

    #[test]
    fn test_error_classification() {
        let state = FrameError::state("Clearing", "persist", "directory is being cleared");
        assert!(classify::drops_frame(&state));
        assert!(!classify::is_programmer_error(&state));

        let delete = FrameError::delete_failed(
            "/tmp/x",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(delete.severity(), ErrorSeverity::Warning);
        assert!(!classify::drops_frame(&delete));
    }

    #[test]
    fn test_scale_error_conversion() {
        let err: FrameError = ScaleError::BufferMismatch {
            expected: 16,
            actual: 12,
        }
        .into();
        assert!(matches!(
            err,
            FrameError::BufferMismatch {
                expected: 16,
                actual: 12,
                ..
            }
        ));

        let err: FrameError = ScaleError::UnsupportedSource {
            pixel_format: PixelFormat::Rgb,
            element_type: ElementType::Uint8,
        }
        .into();
        assert_eq!(err.category(), "unsupported_format");
    }

    #[test]
    fn test_display() {
        let err = FrameError::unsupported_format(PixelFormat::Rgb, ElementType::Float32);
        assert_eq!(
            err.to_string(),
            "Unsupported buffer format rgb/float32 (only argb/uint8 is guaranteed)"
        );
    }
}

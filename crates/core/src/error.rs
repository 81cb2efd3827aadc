//! Error types for the frame server library.

use std::fmt;

/// Errors that can occur in the frame server library.
///
/// Variants map to specific failure modes across the stack:
///
/// - **Transport**: [`Io`](Self::Io): socket/network failures.
/// - **Server**: [`NotStarted`](Self::NotStarted),
///   [`AlreadyRunning`](Self::AlreadyRunning).
/// - **Frames**: [`InvalidFrame`](Self::InvalidFrame): a raw buffer whose
///   size does not match its declared geometry.
/// - **Config**: [`Config`](Self::Config): unreadable or invalid settings.
///
/// Capture and encode failures have their own types ([`CaptureError`],
/// [`EncodeError`]) because the producer treats them as control flow
/// rather than as errors to propagate.
#[derive(Debug, thiserror::Error)]
pub enum FramecastError {
    /// Underlying I/O or socket error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// [`Server::start`](crate::Server::start) has not been called yet.
    #[error("server not started")]
    NotStarted,

    /// [`Server::start`](crate::Server::start) was called while already running.
    #[error("server already running")]
    AlreadyRunning,

    /// Pixel buffer length does not match `width * height * bytes_per_pixel`.
    #[error("invalid frame: expected {expected} bytes, got {actual}")]
    InvalidFrame { expected: usize, actual: usize },

    /// Configuration could not be loaded or failed validation.
    #[error("config error: {0}")]
    Config(String),
}

impl From<toml::de::Error> for FramecastError {
    fn from(e: toml::de::Error) -> Self {
        Self::Config(e.to_string())
    }
}

/// Failure reported by a [`FrameSource`](crate::source::FrameSource).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    /// No coherent frame was available this time around. Recoverable.
    #[error("frame not ready")]
    NotReady,

    /// The device is gone or was never started. Ends the producer.
    #[error("source fault: {0}")]
    Fault(String),
}

/// Failure reported by an [`Encoder`](crate::media::Encoder). The frame is skipped.
#[derive(Debug, thiserror::Error)]
#[error("encode failed: {kind}")]
pub struct EncodeError {
    kind: EncodeErrorKind,
}

/// Specific kind of encode failure.
#[derive(Debug)]
pub enum EncodeErrorKind {
    /// The encoder does not handle this pixel format.
    UnsupportedFormat(&'static str),
    /// The underlying codec rejected the frame.
    Codec(String),
}

impl EncodeError {
    pub fn unsupported(format: &'static str) -> Self {
        Self {
            kind: EncodeErrorKind::UnsupportedFormat(format),
        }
    }

    pub fn codec(message: impl Into<String>) -> Self {
        Self {
            kind: EncodeErrorKind::Codec(message.into()),
        }
    }

    pub fn kind(&self) -> &EncodeErrorKind {
        &self.kind
    }
}

impl fmt::Display for EncodeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedFormat(format) => write!(f, "unsupported pixel format {format}"),
            Self::Codec(message) => write!(f, "{message}"),
        }
    }
}

/// Convenience alias for `Result<T, FramecastError>`.
pub type Result<T> = std::result::Result<T, FramecastError>;

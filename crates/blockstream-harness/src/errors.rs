use std::fmt;

use blockstream_core::EngineError;

use crate::source::SourceId;

/// Errors returned by a delta source before they are normalized for the
/// public pump stream.
///
/// `Display`/`Error` are implemented by hand because the `source` fields
/// hold a [`SourceId`] label, which a `thiserror` derive would mistake for
/// an error-chain source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// Source returned an application-level failure (HTTP status, auth, etc.).
    Source {
        source: SourceId,
        message: String,
        status_code: Option<u16>,
    },
    /// Transport or stream I/O failed.
    Transport { source: SourceId, message: String },
    /// Source item shape or sequencing was invalid.
    Protocol { source: SourceId, message: String },
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source {
                source, message, ..
            } => write!(f, "source error ({source}): {message}"),
            Self::Transport { source, message } => {
                write!(f, "transport error ({source}): {message}")
            }
            Self::Protocol { source, message } => {
                write!(f, "protocol error ({source}): {message}")
            }
        }
    }
}

impl std::error::Error for SourceError {}

impl SourceError {
    /// Creates a source-level error.
    pub fn source(
        source: impl Into<SourceId>,
        message: impl Into<String>,
        status_code: Option<u16>,
    ) -> Self {
        Self::Source {
            source: source.into(),
            message: message.into(),
            status_code,
        }
    }

    /// Creates a transport-level error.
    pub fn transport(source: impl Into<SourceId>, message: impl Into<String>) -> Self {
        Self::Transport {
            source: source.into(),
            message: message.into(),
        }
    }

    /// Creates a protocol-level error.
    pub fn protocol(source: impl Into<SourceId>, message: impl Into<String>) -> Self {
        Self::Protocol {
            source: source.into(),
            message: message.into(),
        }
    }
}

/// Terminal run failure sent through `PumpEvent::Error`.
///
/// `Display`/`Error` are implemented by hand because the `source` fields
/// hold a source-id label, which a `thiserror` derive would mistake for an
/// error-chain source.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum RunFailure {
    /// Delta source returned a non-retryable or terminal failure.
    Source { source: String, message: String },
    /// Network/stream transport failed.
    Transport { source: String, message: String },
    /// The engine rejected input needed to establish the run's baseline.
    Engine { message: String },
    /// The pump detected a protocol or invariant error.
    Protocol { message: String },
    /// The run was cancelled by the caller.
    Cancelled,
}

impl fmt::Display for RunFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source { source, message } => {
                write!(f, "source failure ({source}): {message}")
            }
            Self::Transport { source, message } => {
                write!(f, "transport failure ({source}): {message}")
            }
            Self::Engine { message } => write!(f, "engine failure: {message}"),
            Self::Protocol { message } => write!(f, "protocol failure: {message}"),
            Self::Cancelled => f.write_str("run cancelled"),
        }
    }
}

impl std::error::Error for RunFailure {}

/// Top-level error type for the public pump API.
///
/// `Display`/`Error` are implemented by hand because the `source` field of
/// [`PumpError::SourceNotFound`] holds a [`SourceId`] label, which a
/// `thiserror` derive would mistake for an error-chain source.
#[derive(Debug, Clone, PartialEq)]
pub enum PumpError {
    /// Invalid harness/source configuration.
    Config(String),
    /// Invalid user input to the builder API.
    Validation(String),
    /// Requested source is not registered in the harness.
    SourceNotFound { source: SourceId },
    /// Engine error surfaced outside the run stream.
    Engine(EngineError),
    /// Terminal failure returned from a started run.
    RunFailed(RunFailure),
    /// Internal protocol misuse or invariant violation.
    Protocol(String),
}

impl fmt::Display for PumpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config error: {msg}"),
            Self::Validation(msg) => write!(f, "validation error: {msg}"),
            Self::SourceNotFound { source } => write!(f, "source not found: {source}"),
            Self::Engine(err) => fmt::Display::fmt(err, f),
            Self::RunFailed(err) => fmt::Display::fmt(err, f),
            Self::Protocol(msg) => write!(f, "protocol error: {msg}"),
        }
    }
}

impl std::error::Error for PumpError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Engine(err) => err.source(),
            Self::RunFailed(err) => err.source(),
            _ => None,
        }
    }
}

impl PumpError {
    pub(crate) fn run_failed(failure: RunFailure) -> Self {
        Self::RunFailed(failure)
    }

    pub(crate) fn protocol_msg(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }
}

impl From<RunFailure> for PumpError {
    fn from(value: RunFailure) -> Self {
        PumpError::RunFailed(value)
    }
}

impl From<EngineError> for PumpError {
    fn from(value: EngineError) -> Self {
        PumpError::Engine(value)
    }
}

pub(crate) fn run_failure_from_source_error(err: &SourceError) -> RunFailure {
    match err {
        SourceError::Source {
            source, message, ..
        } => RunFailure::Source {
            source: source.to_string(),
            message: message.clone(),
        },
        SourceError::Transport { source, message } => RunFailure::Transport {
            source: source.to_string(),
            message: message.clone(),
        },
        SourceError::Protocol { source, message } => RunFailure::Protocol {
            message: format!("source={source}: {message}"),
        },
    }
}

use std::error::Error;
use std::fmt;

use crate::value::Format;

/// Agent lifecycle and communication errors.
///
/// Back-pressure style variants (`ClaimBuffer`, `BackPressure`) are absorbed
/// on the hot path; configuration variants are fatal before the first duty
/// cycle; everything else is surfaced or re-dispatched as an `Error` event.
#[derive(Debug)]
pub enum AgentError {
    /// Operation attempted in a state that does not allow it.
    State {
        current: &'static str,
        attempted: &'static str,
    },
    /// Transport or codec failure.
    Communication(String),
    /// Invalid or inconsistent configuration.
    Configuration(String),
    /// A publish failed for a specific property field.
    Publication { message: String, field: String },
    /// `try_claim` returned no buffer for the requested length.
    ClaimBuffer { stream: usize, length: usize },
    /// `offer` reported back-pressure.
    BackPressure { stream: usize },
    /// `offer` failed for a non-back-pressure reason.
    PublicationFailure { stream: usize, reason: String },
    /// Publication registration referenced a stream that does not exist.
    StreamNotFound { name: String, index: usize },
    /// Proxy or adapter used before `on_start` created it.
    CommunicationNotInitialized { op: &'static str },
    /// Required environment variable missing or unparsable.
    EnvironmentVariable(String),
    /// Poller name already present in the active set or pending additions.
    DuplicatePoller(String),
    Property(PropertyError),
    Timer(TimerError),
    /// Control signal that unwinds the runner. Never converted to an
    /// `Error` event.
    Termination,
}

impl fmt::Display for AgentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::State { current, attempted } => {
                write!(f, "cannot {attempted} in state {current}")
            }
            Self::Communication(msg) => write!(f, "communication error: {msg}"),
            Self::Configuration(msg) => write!(f, "configuration error: {msg}"),
            Self::Publication { message, field } => {
                write!(f, "publication of {field} failed: {message}")
            }
            Self::ClaimBuffer { stream, length } => {
                write!(f, "claim of {length} bytes on stream {stream} failed")
            }
            Self::BackPressure { stream } => write!(f, "back-pressure on stream {stream}"),
            Self::PublicationFailure { stream, reason } => {
                write!(f, "offer on stream {stream} failed: {reason}")
            }
            Self::StreamNotFound { name, index } => {
                write!(f, "no output stream {index} for {name}")
            }
            Self::CommunicationNotInitialized { op } => {
                write!(f, "{op}: communications not initialized")
            }
            Self::EnvironmentVariable(name) => {
                write!(f, "environment variable {name} missing or invalid")
            }
            Self::DuplicatePoller(name) => write!(f, "poller {name} already registered"),
            Self::Property(err) => write!(f, "{err}"),
            Self::Timer(err) => write!(f, "{err}"),
            Self::Termination => write!(f, "agent termination"),
        }
    }
}

impl Error for AgentError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Property(err) => Some(err),
            Self::Timer(err) => Some(err),
            _ => None,
        }
    }
}

impl From<PropertyError> for AgentError {
    fn from(err: PropertyError) -> Self {
        AgentError::Property(err)
    }
}

impl From<TimerError> for AgentError {
    fn from(err: TimerError) -> Self {
        AgentError::Timer(err)
    }
}

/// Property store errors. Always surfaced to the caller; inbound writes that
/// fail are rejected and echoed back as `Error` events.
#[derive(Debug)]
pub enum PropertyError {
    NotFound(String),
    Type {
        name: String,
        expected: Format,
        actual: Format,
    },
    Access {
        name: String,
        attempted: &'static str,
    },
    Validation {
        name: String,
        message: String,
    },
}

impl fmt::Display for PropertyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(name) => write!(f, "property {name} not found"),
            Self::Type {
                name,
                expected,
                actual,
            } => write!(f, "property {name} expects {expected:?}, got {actual:?}"),
            Self::Access { name, attempted } => {
                write!(f, "property {name} does not allow {attempted}")
            }
            Self::Validation { name, message } => {
                write!(f, "property {name} rejected value: {message}")
            }
        }
    }
}

impl Error for PropertyError {}

#[derive(Debug)]
pub enum TimerError {
    NotFound(i64),
    Invalid(String),
    Scheduling { reason: String, deadline_ns: i64 },
}

impl fmt::Display for TimerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "timer {id} not found"),
            Self::Invalid(reason) => write!(f, "invalid timer: {reason}"),
            Self::Scheduling { reason, deadline_ns } => {
                write!(f, "cannot schedule timer at {deadline_ns}: {reason}")
            }
        }
    }
}

impl Error for TimerError {}

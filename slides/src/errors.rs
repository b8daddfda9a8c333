use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Errors reported by a [`ScreenSurface`](crate::surface::ScreenSurface) implementation.
#[derive(Error, Debug, Clone)]
pub enum AutomationError {
    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Platform-specific error: {0}")]
    PlatformError(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Image could not be read: {0}")]
    ImageNotReadable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification used in run reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Interpretation,
    TargetNotFound,
    ActionExecution,
    Cancellation,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Interpretation => "interpretation",
            ErrorKind::TargetNotFound => "target not found",
            ErrorKind::ActionExecution => "action execution",
            ErrorKind::Cancellation => "cancelled",
        };
        f.write_str(name)
    }
}

/// Failure of an executing action.
#[derive(Error, Debug, Clone)]
pub enum ActionError {
    #[error("Target {image} not found within {waited:?}")]
    TargetNotFound { image: String, waited: Duration },

    #[error("Target {image} is still on screen")]
    UnexpectedTarget { image: String },

    #[error("{action} failed: {source}")]
    Execution {
        action: String,
        #[source]
        source: AutomationError,
    },

    #[error("{0} was cancelled")]
    Cancelled(String),

    #[error("Gave up after {attempts} attempts: {last}")]
    RetryExhausted {
        attempts: u32,
        last: Box<ActionError>,
    },

    #[error("Parallel child {index} failed: {source}")]
    Parallel {
        index: usize,
        #[source]
        source: Box<ActionError>,
    },

    #[error("Task join error: {0}")]
    Join(String),

    #[error("Invalid action state: {0}")]
    InvalidState(String),
}

impl ActionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ActionError::TargetNotFound { .. } => ErrorKind::TargetNotFound,
            ActionError::Cancelled(_) => ErrorKind::Cancellation,
            ActionError::RetryExhausted { last, .. } => last.kind(),
            ActionError::Parallel { source, .. } => source.kind(),
            ActionError::UnexpectedTarget { .. }
            | ActionError::Execution { .. }
            | ActionError::Join(_)
            | ActionError::InvalidState(_) => ErrorKind::ActionExecution,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ActionError::Cancelled(_))
    }

    /// The innermost failure, looking through retry and parallel wrappers.
    pub fn root_cause(&self) -> &ActionError {
        match self {
            ActionError::RetryExhausted { last, .. } => last.root_cause(),
            ActionError::Parallel { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// A slide element that could not be turned into an action.
///
/// Interpretation errors are local to one element: the interpreter records
/// them and keeps going with the rest of the slide.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InterpretationError {
    #[error("Element {element}: unknown keyword '{keyword}'")]
    UnknownKeyword { element: u32, keyword: String },

    #[error("Element {element}: keyword '{keyword}' needs an argument")]
    MissingArgument { element: u32, keyword: String },

    #[error("Element {element}: keyword '{keyword}' needs a target image")]
    MissingTarget { element: u32, keyword: String },

    #[error("Element {element}: invalid argument for '{keyword}': {reason}")]
    InvalidArgument {
        element: u32,
        keyword: String,
        reason: String,
    },

    #[error("Element {element} has neither keywords nor text")]
    EmptyElement { element: u32 },

    #[error("Element {element}: order index is used by more than one element")]
    DuplicateOrder { element: u32 },
}

impl InterpretationError {
    /// Order index of the offending element.
    pub fn element(&self) -> u32 {
        match self {
            InterpretationError::UnknownKeyword { element, .. }
            | InterpretationError::MissingArgument { element, .. }
            | InterpretationError::MissingTarget { element, .. }
            | InterpretationError::InvalidArgument { element, .. }
            | InterpretationError::EmptyElement { element }
            | InterpretationError::DuplicateOrder { element } => *element,
        }
    }
}

/// Errors raised while reading a slide document.
#[derive(Error, Debug)]
pub enum ReadError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed slide document {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unsupported document: {0}")]
    Unsupported(String),
}

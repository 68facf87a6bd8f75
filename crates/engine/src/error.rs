//! Error taxonomy for playbook validation and execution.

use thiserror::Error;

/// Broad category of a [`PlaybookError`], stable across wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Resolution,
    Coercion,
    Invocation,
    Document,
}

#[derive(Debug, Error)]
pub enum PlaybookError {
    /// The playbook structure is malformed. Raised before any call is made.
    #[error("invalid playbook: {message}")]
    Validation { message: String },

    /// A reference, locator, state path or contract method could not be resolved.
    #[error("{message}")]
    Resolution { message: String },

    /// A keyed argument object does not provide a declared parameter.
    #[error("missing argument `{parameter}` for `{method}` (tried {tried})", tried = .attempted.join(", "))]
    MissingArgument {
        method: String,
        parameter: String,
        attempted: Vec<String>,
    },

    /// The artifact source could not produce the named contract.
    #[error("no artifact for contract `{contract}`: {source}")]
    Artifact {
        contract: String,
        #[source]
        source: anyhow::Error,
    },

    /// The declared parameter type is outside the supported set.
    #[error("unknown/unsupported type: {declared_type}")]
    UnsupportedType { declared_type: String },

    /// A conversion for a supported type rejected its value.
    #[error("cannot coerce value to `{declared_type}`: {message}")]
    Coercion { declared_type: String, message: String },

    /// The external contract layer failed. The source is passed through untouched.
    #[error("{contract}.{method} failed: {source}")]
    Invocation {
        contract: String,
        method: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to load {path}: {message}")]
    Document { path: String, message: String },

    /// Any of the above, tagged with the summary of the instruction it came from.
    #[error("step `{summary}` failed: {source}")]
    Step {
        summary: String,
        #[source]
        source: Box<PlaybookError>,
    },
}

impl PlaybookError {
    pub fn validation(message: impl Into<String>) -> Self {
        PlaybookError::Validation { message: message.into() }
    }

    pub fn resolution(message: impl Into<String>) -> Self {
        PlaybookError::Resolution { message: message.into() }
    }

    pub fn document(path: impl Into<String>, message: impl Into<String>) -> Self {
        PlaybookError::Document {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Category of the underlying failure, looking through step context.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PlaybookError::Validation { .. } => ErrorKind::Validation,
            PlaybookError::Resolution { .. } | PlaybookError::MissingArgument { .. } | PlaybookError::Artifact { .. } => {
                ErrorKind::Resolution
            }
            PlaybookError::UnsupportedType { .. } | PlaybookError::Coercion { .. } => ErrorKind::Coercion,
            PlaybookError::Invocation { .. } => ErrorKind::Invocation,
            PlaybookError::Document { .. } => ErrorKind::Document,
            PlaybookError::Step { source, .. } => source.kind(),
        }
    }

    /// Attaches the summary of the failing instruction. Errors that already
    /// carry a step summary are returned unchanged.
    pub fn within_step(self, summary: impl Into<String>) -> Self {
        match self {
            PlaybookError::Step { .. } => self,
            other => PlaybookError::Step {
                summary: summary.into(),
                source: Box::new(other),
            },
        }
    }

    pub fn step_summary(&self) -> Option<&str> {
        match self {
            PlaybookError::Step { summary, .. } => Some(summary),
            _ => None,
        }
    }

    /// The error with any step context removed.
    pub fn root(&self) -> &PlaybookError {
        match self {
            PlaybookError::Step { source, .. } => source.root(),
            other => other,
        }
    }
}

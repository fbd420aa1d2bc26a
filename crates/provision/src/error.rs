//! Error types for provisioning.
//!
//! Every failure carries the name of the resource being provisioned. The
//! [`ErrorCategory`] tells callers whether anything was left behind: a
//! partial failure means the workload exists and should be destroyed before
//! another attempt.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use crate::lifecycle::ProvisionState;

/// Result type alias for provisioning operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of provisioning errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The resource definition cannot be provisioned as written.
    Validation,
    /// Something with the same identity already exists.
    Conflict,
    /// The workload never reported ready.
    Timeout,
    /// The workload exists but a later step failed.
    Partial,
    /// The container runtime or another capability rejected a request.
    Runtime,
}

impl ErrorCategory {
    /// Whether resources were left behind by the failed attempt.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        matches!(self, Self::Partial | Self::Timeout)
    }

    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Validation => "Invalid resource definition",
            Self::Conflict => "Resource already exists",
            Self::Timeout => "Resource did not become ready",
            Self::Partial => "Resource partially provisioned",
            Self::Runtime => "Container runtime error",
        }
    }

    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Validation => "Fix the resource definition and try again",
            Self::Conflict => "Destroy the existing resource first",
            Self::Timeout => "Check the workload logs, then destroy and retry",
            Self::Partial => "Destroy the resource before trying again",
            Self::Runtime => "Check that the container runtime is running and reachable",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur while provisioning a resource.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The resource name cannot be used as a host name.
    #[error("invalid cluster name {name:?}: {reason}")]
    InvalidName {
        /// Rejected name.
        name: String,
        /// Rule that was broken.
        reason: String,
    },

    /// A workload with the same identity is already running.
    #[error("cluster {name} already exists")]
    AlreadyExists {
        /// Resource name.
        name: String,
    },

    /// The readiness signal never appeared.
    #[error("cluster {name} was not ready after {}s", .timeout.as_secs())]
    Timeout {
        /// Resource name.
        name: String,
        /// Time waited.
        timeout: Duration,
    },

    /// Generated artifacts could not be extracted or written.
    #[error("unable to write {what} for cluster {name}")]
    Artifact {
        /// Resource name.
        name: String,
        /// Artifact being produced.
        what: String,
        /// Underlying failure.
        #[source]
        source: anyhow::Error,
    },

    /// Downstream workloads never became healthy.
    #[error("cluster {name} failed its health check")]
    HealthCheck {
        /// Resource name.
        name: String,
        /// Underlying failure.
        #[source]
        source: anyhow::Error,
    },

    /// The server container exists but its startup could not be observed.
    #[error("unable to read logs of cluster {name}")]
    Startup {
        /// Resource name.
        name: String,
        /// Underlying failure.
        #[source]
        source: anyhow::Error,
    },

    /// Pre-staged images could not be imported.
    #[error("unable to import images into cluster {name}")]
    ImageImport {
        /// Resource name.
        name: String,
        /// Underlying failure.
        #[source]
        source: anyhow::Error,
    },

    /// A capability call failed.
    #[error("unable to {action}")]
    Runtime {
        /// What was being attempted.
        action: String,
        /// Underlying failure.
        #[source]
        source: anyhow::Error,
    },

    /// A lifecycle step was attempted out of order.
    #[error("cannot move from {from} to {to}")]
    Transition {
        /// Current state.
        from: ProvisionState,
        /// Requested state.
        to: ProvisionState,
    },

    /// IO error on the data home.
    #[error("IO error at {path}: {source}")]
    Io {
        /// Path involved in the error.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

impl Error {
    /// Create an IO error with path context.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Wrap a capability failure.
    pub fn runtime(action: impl Into<String>, source: anyhow::Error) -> Self {
        Self::Runtime {
            action: action.into(),
            source,
        }
    }

    /// Get the category of this error.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::InvalidName { .. } => ErrorCategory::Validation,
            Error::AlreadyExists { .. } => ErrorCategory::Conflict,
            Error::Timeout { .. } => ErrorCategory::Timeout,
            Error::Startup { .. }
            | Error::Artifact { .. }
            | Error::HealthCheck { .. }
            | Error::ImageImport { .. } => ErrorCategory::Partial,
            Error::Runtime { .. } | Error::Transition { .. } | Error::Io { .. } => {
                ErrorCategory::Runtime
            }
        }
    }

    /// Whether the failed attempt left resources behind.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        self.category().is_partial()
    }
}

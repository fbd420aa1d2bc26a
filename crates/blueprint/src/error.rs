//! Error types for parsing and linking.
//!
//! Every failure the parser can surface is a variant here. Errors carry the
//! file or resource identity that caused them, and are categorized so callers
//! can tell document problems from graph problems without matching on text.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Result type alias for blueprint operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of parse errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The document itself is malformed.
    Syntax,
    /// The document is well formed but a block does not match its schema.
    Schema,
    /// The resource graph is inconsistent (duplicates, reserved names, relinking).
    Graph,
    /// A module source could not be retrieved.
    Fetch,
    /// Filesystem access failed.
    Io,
}

impl ErrorCategory {
    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Syntax => "Malformed document",
            Self::Schema => "Invalid resource definition",
            Self::Graph => "Inconsistent resource graph",
            Self::Fetch => "Module source unavailable",
            Self::Io => "Filesystem error",
        }
    }

    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Syntax => "Fix the syntax error at the reported location",
            Self::Schema => "Check the block's attributes against the resource type",
            Self::Graph => "Rename or remove the conflicting resource",
            Self::Fetch => "Check the module source address and your network connection",
            Self::Io => "Check that the path exists and is readable",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur while building a resource graph.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A document could not be parsed.
    #[error("syntax error in {file}: {message}")]
    Syntax {
        /// Offending document.
        file: PathBuf,
        /// Parser message, including the location.
        message: String,
    },

    /// An expression could not be evaluated.
    #[error("unable to evaluate expression in {file}: {message}")]
    Eval {
        /// Document containing the expression.
        file: PathBuf,
        /// Evaluation message.
        message: String,
    },

    /// A block names a resource type nobody registered.
    #[error("resource type {kind} defined in file {file}, does not exist")]
    UnknownResourceType {
        /// The unrecognized block type.
        kind: String,
        /// Document declaring it.
        file: PathBuf,
    },

    /// A block's attributes do not fit its resource type.
    #[error("unable to decode {id} in file {file}: {message}")]
    Decode {
        /// Resource identity.
        id: String,
        /// Document declaring it.
        file: PathBuf,
        /// Decoder message.
        message: String,
    },

    /// A resource with the same identity is already registered.
    #[error("resource {id} already exists")]
    DuplicateResource {
        /// Colliding identity.
        id: String,
    },

    /// A user-declared resource uses a name the tool reserves.
    #[error("{kind} name {name} is reserved")]
    ReservedName {
        /// Resource kind.
        kind: String,
        /// Reserved name.
        name: String,
    },

    /// Adding a resource to the graph failed.
    #[error("unable to add resource {id} in file {file}: {source}")]
    AddResource {
        /// Resource identity.
        id: String,
        /// Document declaring it.
        file: PathBuf,
        /// Underlying failure.
        #[source]
        source: Box<Error>,
    },

    /// No resource with this identity exists.
    #[error("resource {0} not found")]
    ResourceNotFound(String),

    /// An identity is not of the form `<kind>.<name>`.
    #[error("invalid resource identity: {0}")]
    InvalidIdentity(String),

    /// References were already linked for this graph.
    #[error("references have already been linked for this config")]
    AlreadyLinked,

    /// A module source could not be fetched.
    #[error("unable to fetch module source {source_uri}: {cause:#}")]
    Fetch {
        /// Source address.
        source_uri: String,
        /// Transport failure.
        #[source]
        cause: anyhow::Error,
    },

    /// IO error during file operations.
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

    /// Create a syntax error for a document.
    pub fn syntax(file: impl Into<PathBuf>, message: impl fmt::Display) -> Self {
        Self::Syntax {
            file: file.into(),
            message: message.to_string(),
        }
    }

    /// Get the error category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Syntax { .. } | Error::Eval { .. } => ErrorCategory::Syntax,
            Error::UnknownResourceType { .. } | Error::Decode { .. } => ErrorCategory::Schema,
            Error::InvalidIdentity(_) => ErrorCategory::Schema,
            Error::DuplicateResource { .. }
            | Error::ReservedName { .. }
            | Error::ResourceNotFound(_)
            | Error::AlreadyLinked => ErrorCategory::Graph,
            Error::AddResource { source, .. } => source.category(),
            Error::Fetch { .. } => ErrorCategory::Fetch,
            Error::Io { .. } => ErrorCategory::Io,
        }
    }

    /// Strip `AddResource` wrappers and return the underlying failure.
    #[must_use]
    pub fn root(&self) -> &Error {
        match self {
            Error::AddResource { source, .. } => source.root(),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_type_names_type_and_file() {
        let err = Error::UnknownResourceType {
            kind: "containr".to_string(),
            file: PathBuf::from("/tmp/main.hcl"),
        };
        let msg = err.to_string();
        assert!(msg.contains("containr"));
        assert!(msg.contains("/tmp/main.hcl"));
        assert_eq!(err.category(), ErrorCategory::Schema);
    }

    #[test]
    fn test_add_resource_takes_inner_category() {
        let err = Error::AddResource {
            id: "network.wan".to_string(),
            file: PathBuf::from("main.hcl"),
            source: Box::new(Error::ReservedName {
                kind: "network".to_string(),
                name: "wan".to_string(),
            }),
        };
        assert_eq!(err.category(), ErrorCategory::Graph);
        assert!(matches!(err.root(), Error::ReservedName { .. }));
        assert!(err.to_string().contains("unable to add resource network.wan"));
    }

    #[test]
    fn test_fetch_error_wraps_cause() {
        let err = Error::Fetch {
            source_uri: "github.com/org/repo//mod".to_string(),
            cause: anyhow::anyhow!("connection refused"),
        };
        assert_eq!(err.category(), ErrorCategory::Fetch);
        assert!(err.to_string().contains("connection refused"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_io_error_category() {
        let err = Error::io(
            "/missing",
            io::Error::new(io::ErrorKind::NotFound, "not found"),
        );
        assert_eq!(err.category(), ErrorCategory::Io);
        assert!(err.to_string().contains("/missing"));
    }

    #[test]
    fn test_category_advice_not_empty() {
        for category in [
            ErrorCategory::Syntax,
            ErrorCategory::Schema,
            ErrorCategory::Graph,
            ErrorCategory::Fetch,
            ErrorCategory::Io,
        ] {
            assert!(!category.description().is_empty());
            assert!(!category.advice().is_empty());
        }
    }
}

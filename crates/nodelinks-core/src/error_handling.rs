//! Error taxonomy for nodelinks.
//! Every user-visible failure names the path, address, or command that caused it.

use std::fmt;

/// Main error type for nodelinks operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodelinksError {
    /// Filesystem errors outside of link management
    Io {
        operation: String,
        path: Option<String>,
        source: String,
    },
    /// Probe / HTTP errors that escape a single probe (client construction)
    Network {
        operation: String,
        url: Option<String>,
        source: String,
    },
    /// Malformed or unreadable catalog / settings documents
    Config {
        operation: String,
        field: Option<String>,
        source: String,
    },
    /// Shared path would alias the tool's own installation
    Safety {
        operation: String,
        path: String,
        reason: String,
    },
    /// Link creation / removal refused or failed
    Link {
        operation: String,
        path: String,
        reason: String,
    },
    /// Package manager exited non-zero (or could not be spawned)
    Subprocess {
        command: String,
        code: Option<i32>,
        source: String,
    },
    /// Missing arguments, cancelled prompts, unsupported input
    Usage { message: String },
}

pub type Result<T> = std::result::Result<T, NodelinksError>;

impl NodelinksError {
    /// Process exit code for this failure. Subprocess failures propagate the child's code.
    pub fn exit_code(&self) -> i32 {
        match self {
            NodelinksError::Subprocess { code: Some(c), .. } if *c != 0 => *c,
            _ => 1,
        }
    }

    pub fn is_safety(&self) -> bool {
        matches!(self, NodelinksError::Safety { .. })
    }
}

impl fmt::Display for NodelinksError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodelinksError::Io { operation, path, source } => {
                write!(f, "I/O error in {}: {}", operation, source)?;
                if let Some(path) = path {
                    write!(f, " (path: {})", path)?;
                }
                Ok(())
            }
            NodelinksError::Network { operation, url, source } => {
                write!(f, "Network error in {}: {}", operation, source)?;
                if let Some(url) = url {
                    write!(f, " (url: {})", url)?;
                }
                Ok(())
            }
            NodelinksError::Config { operation, field, source } => {
                write!(f, "Configuration error in {}: {}", operation, source)?;
                if let Some(field) = field {
                    write!(f, " (field: {})", field)?;
                }
                Ok(())
            }
            NodelinksError::Safety { operation, path, reason } => {
                write!(f, "Refusing {}: {} (path: {})", operation, reason, path)
            }
            NodelinksError::Link { operation, path, reason } => {
                write!(f, "Link error in {}: {} (path: {})", operation, reason, path)
            }
            NodelinksError::Subprocess { command, code, source } => {
                write!(f, "`{}` failed: {}", command, source)?;
                if let Some(code) = code {
                    write!(f, " (exit code: {})", code)?;
                }
                Ok(())
            }
            NodelinksError::Usage { message } => write!(f, "{}", message),
        }
    }
}

impl std::error::Error for NodelinksError {}

/// Constructors for common error patterns
pub mod utils {
    use super::*;
    use std::path::Path;

    pub fn io_error(operation: &str, path: Option<&Path>, source: std::io::Error) -> NodelinksError {
        NodelinksError::Io {
            operation: operation.to_string(),
            path: path.map(|p| p.display().to_string()),
            source: source.to_string(),
        }
    }

    pub fn network_error(operation: &str, url: Option<&str>, source: reqwest::Error) -> NodelinksError {
        NodelinksError::Network {
            operation: operation.to_string(),
            url: url.map(String::from),
            source: source.to_string(),
        }
    }

    pub fn config_error(operation: &str, field: Option<&str>, source: impl fmt::Display) -> NodelinksError {
        NodelinksError::Config {
            operation: operation.to_string(),
            field: field.map(String::from),
            source: source.to_string(),
        }
    }

    pub fn safety_error(operation: &str, path: &Path, reason: &str) -> NodelinksError {
        NodelinksError::Safety {
            operation: operation.to_string(),
            path: path.display().to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn link_error(operation: &str, path: &Path, reason: impl fmt::Display) -> NodelinksError {
        NodelinksError::Link {
            operation: operation.to_string(),
            path: path.display().to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn usage_error(message: impl Into<String>) -> NodelinksError {
        NodelinksError::Usage { message: message.into() }
    }
}

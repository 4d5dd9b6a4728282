//! Error types for loading and reshuffling production rule sets.

/// Errors surfaced by network construction, reshuffling and PRS import.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The rule set or variable set handed to the network is malformed.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A fan-out conflict could not be resolved.
    #[error("unresolvable conflict on '{var}': {reason}")]
    Unresolvable { var: String, reason: String },

    /// The PRS text could not be parsed.
    #[error("parse error at line {line}: {message}")]
    Parse { line: usize, message: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

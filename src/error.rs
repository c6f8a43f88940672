//! Error types for reading and building architecture files.

use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The architecture file could not be opened or read.
    #[error("error reading {}: {}", path.display(), source)]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed s-expression structure: unbalanced parentheses or nesting
    /// deeper than the reader allows.
    #[error("{message} (line {line})")]
    Structure { line: i32, message: String },

    /// The tree is well-formed but its contents are invalid: a missing or
    /// duplicated section, wrong arity, or an unresolvable reference.
    #[error("{message} (line {line})")]
    Semantic { line: i32, message: String },
}

impl Error {
    pub fn structure(line: i32, message: impl Into<String>) -> Self {
        Error::Structure {
            line,
            message: message.into(),
        }
    }

    pub fn semantic(line: i32, message: impl Into<String>) -> Self {
        Error::Semantic {
            line,
            message: message.into(),
        }
    }

    /// Line number the error refers to, if it has one.
    pub fn line(&self) -> Option<i32> {
        match self {
            Error::Io { .. } => None,
            Error::Structure { line, .. } | Error::Semantic { line, .. } => Some(*line),
        }
    }
}

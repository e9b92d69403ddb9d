use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unexpected character '{ch}' at {line}:{column}")]
    UnexpectedChar { ch: char, line: usize, column: usize },
    #[error("unterminated {what} starting at {line}:{column}")]
    Unterminated {
        what: &'static str,
        line: usize,
        column: usize,
    },
    #[error("expected {expected}, found {found} at {line}:{column}")]
    Unexpected {
        expected: String,
        found: String,
        line: usize,
        column: usize,
    },
    #[error("unsupported syntax: {what} at {line}:{column}")]
    Unsupported {
        what: &'static str,
        line: usize,
        column: usize,
    },
}

#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("failed to read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseError,
    },
    #[error("failed to list corpus directory")]
    Walk(#[from] walkdir::Error),
}

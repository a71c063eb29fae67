//! Error types for the logpack compression library.
//!
//! This module defines all error types that can occur during parsing,
//! encoding, decoding, and query planning.

use thiserror::Error;

/// Main error type for the logpack compression library.
///
/// All operations that can fail return `Result<T, LogPackError>`.
#[derive(Debug, Error)]
pub enum LogPackError {
    /// Operation attempted before the component was set up.
    #[error("operation attempted before initialization")]
    NotInit,

    /// Caller violated an API contract (e.g. empty search string).
    #[error("bad parameter: {message}")]
    BadParam {
        /// Description of the violated contract
        message: String,
    },

    /// The reader was exhausted cleanly.
    #[error("end of file")]
    EndOfFile,

    /// I/O error.
    ///
    /// Wraps errors from the underlying reader or writer.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Buffer growth would exceed the configured maximum capacity.
    ///
    /// Fatal for the current file; the parser instance remains usable
    /// for the next file after a reset.
    #[error("buffer growth to {requested} bytes exceeds the configured maximum")]
    AllocFailure {
        /// The capacity that the growth would have required
        requested: usize,
    },

    /// The lexer found no match after checking the entire buffer at its
    /// maximum supported size.
    #[error("lexer failed to find a match after checking entire buffer (offset {offset})")]
    LexerFailure {
        /// Byte offset of the last successfully scanned position
        offset: usize,
    },

    /// A logtype declares a different number of variables than were
    /// supplied for decoding.
    #[error("logtype contains {expected} variables, but {given} were given for decoding")]
    VariableCountMismatch {
        /// Number of variable positions in the logtype
        expected: usize,
        /// Number of encoded variables supplied by the caller
        given: usize,
    },

    /// Decoding encountered a schema tag that is not in the lexer's
    /// symbol table.
    #[error("encoded variable has unknown schema tag {tag}")]
    UnknownSchemaTag {
        /// The unrecognized tag byte
        tag: u8,
    },

    /// Error in a schema rule or the schema file.
    ///
    /// Contains the schema line number and a descriptive message.
    #[error("schema error at line {line}: {message}")]
    Schema {
        /// Line number in the schema file (1-indexed)
        line: usize,
        /// Description of the error
        message: String,
    },
}

/// Type alias for Results using `LogPackError`.
pub type Result<T> = std::result::Result<T, LogPackError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_failure_display() {
        let error = LogPackError::AllocFailure { requested: 1 << 24 };
        let display = format!("{}", error);
        assert!(display.contains("16777216"));
    }

    #[test]
    fn test_variable_count_mismatch_display() {
        let error = LogPackError::VariableCountMismatch {
            expected: 3,
            given: 5,
        };
        let display = format!("{}", error);
        assert!(display.contains("3 variables"));
        assert!(display.contains("5 were given"));
    }

    #[test]
    fn test_unknown_schema_tag_display() {
        let error = LogPackError::UnknownSchemaTag { tag: 9 };
        let display = format!("{}", error);
        assert!(display.contains("tag 9"));
    }

    #[test]
    fn test_schema_error_display() {
        let error = LogPackError::Schema {
            line: 4,
            message: "unbalanced parenthesis".to_string(),
        };
        let display = format!("{}", error);
        assert!(display.contains("line 4"));
        assert!(display.contains("unbalanced parenthesis"));
    }

    #[test]
    fn test_io_error_from() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error: LogPackError = io_error.into();
        assert!(matches!(error, LogPackError::Io(_)));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<LogPackError>();
    }
}

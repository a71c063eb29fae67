//! # Logpack Compression Library
//!
//! Compression and wildcard search for unstructured log files.
//!
//! Each log message is split into a *logtype* (the static skeleton of
//! the message) and a sequence of *variables* (numbers, identifiers,
//! tokens). Integers, floats, and hex values are bit-packed into fixed
//! 64-bit slots; everything else is interned into variable
//! dictionaries. Searches run against the compressed form: the query
//! planner turns a wildcard search string into logtype patterns and
//! variable constraints, so most messages are ruled out without
//! decompression.
//!
//! ## Features
//!
//! - **Two tokenizers**: a schema-driven DFA lexer compiled from
//!   user-defined regex rules, and a heuristic delimiter/classifier
//!   fallback that needs no configuration
//! - **Bit-packed variables**: integers, floats, and hex values encode
//!   into fixed-width slots disjoint from the dictionary-id range
//! - **Streaming parsing**: a half-read circular input buffer with
//!   in-place growth handles arbitrarily long messages
//! - **Compressed search**: wildcard queries plan into subqueries over
//!   the logtype and variable dictionaries, with exact round-trip
//!   decompression for matches
//!
//! ## Quick Start
//!
//! ### Heuristic compression
//!
//! ```rust
//! use logpack_compression::LogCompressor;
//!
//! let compressor = LogCompressor::new();
//! let archive = compressor.compress_heuristic("user=alice id=42 load=3.14\n");
//! assert_eq!(
//!     archive.decompress_message(0).unwrap(),
//!     "user=alice id=42 load=3.14\n"
//! );
//! ```
//!
//! ### Schema-driven compression
//!
//! ```rust,ignore
//! use logpack_compression::{LogCompressor, Schema};
//!
//! let schema = Schema::load_from_file(std::path::Path::new("schema.txt"))?;
//! let reader = std::fs::File::open("app.log")?;
//! let archive = LogCompressor::new().compress_with_schema(&schema, reader)?;
//! ```
//!
//! ### Searching
//!
//! ```rust
//! use logpack_compression::{plan_query, LogCompressor, SearchConfig};
//!
//! let compressor = LogCompressor::new();
//! let archive = compressor.compress_heuristic("connect from host-a\n");
//! let query = plan_query(&archive, "host-*", &SearchConfig::default(), None).unwrap();
//! let matches = archive.find_matches(&query).unwrap();
//! assert_eq!(matches.len(), 1);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod archive;
pub mod automata;
pub mod buffer;
pub mod config;
pub mod dictionary;
pub mod encoder;
pub mod error;
pub mod heuristic;
pub mod lexer;
pub mod logtype;
pub mod parser;
pub mod query;
pub mod schema;
pub mod stats;
pub mod wildcard;

pub use archive::{Archive, CompressedMessage, LogCompressor, TokenizationMode};
pub use config::{ParserConfig, SearchConfig};
pub use dictionary::{DictEntry, LogtypeDictionary, VariableDictionary};
pub use error::{LogPackError, Result};
pub use lexer::{Lexer, LexerMode, ScanOutcome, Token};
pub use logtype::{Logtype, VarDelim, VarInfo};
pub use parser::{LogParser, MessageParser, ParsingAction};
pub use query::{plan_query, Query, SubQuery};
pub use schema::Schema;
pub use stats::{CompressionStats, StatsSnapshot};
pub use wildcard::{sanitize_search_string, wildcard_match};

#[cfg(test)]
mod thread_safety {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_public_types_are_send_sync() {
        assert_send_sync::<Archive>();
        assert_send_sync::<LogCompressor>();
        assert_send_sync::<CompressionStats>();
        assert_send_sync::<StatsSnapshot>();
        assert_send_sync::<VariableDictionary>();
        assert_send_sync::<LogtypeDictionary>();
        assert_send_sync::<Logtype>();
        assert_send_sync::<Schema>();
        assert_send_sync::<Lexer>();
        assert_send_sync::<Query>();
        assert_send_sync::<SubQuery>();
        assert_send_sync::<LogPackError>();
        assert_send_sync::<ParserConfig>();
        assert_send_sync::<SearchConfig>();
    }
}

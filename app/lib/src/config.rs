//! Configuration types for the logpack compression library.
//!
//! This module provides configuration structs for controlling buffer
//! management during parsing and the behavior of query planning.

/// Configuration for the log parser and its buffers.
///
/// Controls the input buffer's initial capacity, the ceiling beyond which
/// growth is refused, and the initial token capacity of the output buffer.
#[derive(Debug, Clone)]
pub struct ParserConfig {
    /// Initial capacity of the input buffer in bytes.
    ///
    /// The buffer is operated as two halves; one half is read from the
    /// underlying reader while the lexer consumes the other. Must be even
    /// and at least 2.
    ///
    /// Default: 65,536 bytes
    pub initial_buffer_capacity: usize,

    /// Maximum capacity the input buffer may grow to in bytes.
    ///
    /// A single log message longer than this limit aborts compression of
    /// the current file with an allocation failure. The limit bounds
    /// memory use in the face of pathological inputs.
    ///
    /// Default: 16,777,216 bytes (16 MiB)
    pub max_buffer_capacity: usize,

    /// Initial token capacity of the output buffer.
    ///
    /// The output buffer doubles in size when a message produces more
    /// tokens than the current capacity.
    ///
    /// Default: 128 tokens
    pub output_buffer_capacity: usize,

    /// Number of messages per archive segment.
    ///
    /// Segment ids let the query planner narrow a search to the segments
    /// that may contain matches.
    ///
    /// Default: 100,000 messages
    pub segment_size: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            initial_buffer_capacity: 64 * 1024,
            max_buffer_capacity: 16 * 1024 * 1024,
            output_buffer_capacity: 128,
            segment_size: 100_000,
        }
    }
}

impl ParserConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the initial input buffer capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is odd or less than 2.
    pub fn with_initial_buffer_capacity(mut self, capacity: usize) -> Self {
        assert!(
            capacity >= 2 && capacity % 2 == 0,
            "input buffer capacity must be even and at least 2"
        );
        self.initial_buffer_capacity = capacity;
        self
    }

    /// Set the maximum input buffer capacity.
    pub fn with_max_buffer_capacity(mut self, capacity: usize) -> Self {
        self.max_buffer_capacity = capacity;
        self
    }

    /// Set the initial output buffer token capacity.
    pub fn with_output_buffer_capacity(mut self, capacity: usize) -> Self {
        self.output_buffer_capacity = capacity;
        self
    }

    /// Set the number of messages per segment.
    pub fn with_segment_size(mut self, size: usize) -> Self {
        self.segment_size = size;
        self
    }
}

/// Configuration for query planning.
#[derive(Debug, Clone, Default)]
pub struct SearchConfig {
    /// Match without regard to ASCII case.
    pub ignore_case: bool,
}

impl SearchConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set case-insensitive matching.
    pub fn with_ignore_case(mut self, ignore_case: bool) -> Self {
        self.ignore_case = ignore_case;
        self
    }
}

//! Circular input buffer over a log reader.
//!
//! The buffer is a contiguous allocation operated as two halves: one
//! half is refilled from the reader while the lexer consumes the other.
//! The scan position wraps at the end, so a token may span the seam.
//! When a single message outgrows the buffer, the buffer doubles,
//! re-linearizing its content; offsets held by the lexer and in emitted
//! tokens must then be renormalized by the caller when the halves were
//! flipped.

use std::io::Read;

use log::warn;

use crate::config::ParserConfig;
use crate::error::{LogPackError, Result};

/// Result of asking the input buffer for the next byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputByte {
    /// The byte at the scan position.
    Byte(u8),
    /// The scan caught up with the last read; the caller must read more
    /// input (or grow the buffer) and retry.
    NeedsInput,
    /// The reader is exhausted and every byte has been scanned.
    Eof,
}

/// Sliding input window with half-buffer reads and in-place growth.
#[derive(Debug)]
pub struct InputBuffer {
    storage: Vec<u8>,
    /// Current scan index.
    pos: usize,
    /// Index one past the chronologically newest byte, modulo capacity.
    last_read_pos: usize,
    /// Bytes before this index belong to already-emitted messages.
    consumed_pos: usize,
    /// Whether the next read targets the second half.
    read_second_half_next: bool,
    finished_reading: bool,
    max_capacity: usize,
}

impl InputBuffer {
    /// Create a buffer sized by `config`.
    pub fn new(config: &ParserConfig) -> Self {
        Self {
            storage: vec![0; config.initial_buffer_capacity],
            pos: 0,
            last_read_pos: 0,
            consumed_pos: 0,
            read_second_half_next: false,
            finished_reading: false,
            max_capacity: config.max_buffer_capacity,
        }
    }

    /// Reset for a new input stream, keeping the current allocation.
    pub fn reset(&mut self) {
        self.pos = 0;
        self.last_read_pos = 0;
        self.consumed_pos = 0;
        self.read_second_half_next = false;
        self.finished_reading = false;
    }

    /// Current capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Current scan position.
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Whether the reader reported end of input.
    pub fn finished_reading(&self) -> bool {
        self.finished_reading
    }

    /// The commit point of the last emitted message.
    pub fn consumed_pos(&self) -> usize {
        self.consumed_pos
    }

    /// Byte at `index`, wrapping within the buffer.
    pub fn byte_at(&self, index: usize) -> u8 {
        self.storage[index % self.storage.len()]
    }

    /// Copy the bytes of `[start, end)` out of the circular storage.
    ///
    /// `start > end` denotes a span that wraps around the seam.
    pub fn span(&self, start: usize, end: usize) -> Vec<u8> {
        if start <= end {
            self.storage[start..end].to_vec()
        } else {
            let mut out = Vec::with_capacity(self.storage.len() - start + end);
            out.extend_from_slice(&self.storage[start..]);
            out.extend_from_slice(&self.storage[..end]);
            out
        }
    }

    /// Commit the scan up to `consumed_pos`; bytes before it may be
    /// overwritten by future reads.
    pub fn set_consumed_pos(&mut self, consumed_pos: usize) {
        self.consumed_pos = consumed_pos % self.storage.len();
    }

    /// Rewind the scan position by one byte.
    pub fn step_back(&mut self) {
        if self.pos == 0 {
            self.pos = self.storage.len() - 1;
        } else {
            self.pos -= 1;
        }
    }

    /// Set the scan position directly (used to backtrack to the last
    /// accepted match).
    pub fn set_pos(&mut self, pos: usize) {
        self.pos = pos % self.storage.len();
    }

    /// The next byte at the scan position, advancing past it.
    pub fn next_byte(&mut self) -> InputByte {
        if self.pos == self.last_read_pos {
            return if self.finished_reading {
                InputByte::Eof
            } else {
                InputByte::NeedsInput
            };
        }
        let byte = self.storage[self.pos];
        self.pos += 1;
        if self.pos == self.storage.len() {
            self.pos = 0;
        }
        InputByte::Byte(byte)
    }

    /// Whether a fresh half-read would only overwrite consumed bytes.
    pub fn read_is_safe(&self) -> bool {
        if self.finished_reading {
            return false;
        }
        let half = self.storage.len() / 2;
        if self.read_second_half_next {
            // Overwriting the second half is safe only when the last
            // message ended strictly inside the first half
            self.consumed_pos > 0 && self.consumed_pos < half
        } else {
            self.consumed_pos > half
        }
    }

    /// Read one buffer half from `reader`.
    ///
    /// Loops on short reads; only a zero-byte read marks end of input.
    pub fn read<R: Read>(&mut self, reader: &mut R) -> Result<()> {
        let half = self.storage.len() / 2;
        let offset = if self.read_second_half_next { half } else { 0 };
        let mut total = 0;
        while total < half {
            let n = reader.read(&mut self.storage[offset + total..offset + half])?;
            if n == 0 {
                self.finished_reading = true;
                break;
            }
            total += n;
        }
        self.read_second_half_next = !self.read_second_half_next;
        self.last_read_pos = (self.last_read_pos + total) % self.storage.len();
        Ok(())
    }

    /// Double the buffer and read fresh input into the new space.
    ///
    /// Returns whether the halves had to be flipped to re-linearize the
    /// content; when they were, the caller must renormalize any offsets
    /// it holds via [`InputBuffer::flip_offset`] logic.
    pub fn grow_and_read<R: Read>(&mut self, reader: &mut R) -> Result<bool> {
        let old_capacity = self.storage.len();
        let new_capacity = old_capacity * 2;
        if new_capacity > self.max_capacity {
            if old_capacity >= self.max_capacity {
                // The whole maximum-size buffer has been scanned
                // without finding a token boundary
                return Err(LogPackError::LexerFailure { offset: self.pos });
            }
            return Err(LogPackError::AllocFailure {
                requested: new_capacity,
            });
        }
        warn!(
            "long message detected, growing input buffer to {} bytes",
            new_capacity
        );

        let mut new_storage = vec![0; new_capacity];
        // A flip is needed when the second half chronologically precedes
        // the first: that is the case exactly when the newest read went
        // to the first half.
        let flipped = self.read_second_half_next;
        if flipped {
            let half = old_capacity / 2;
            new_storage[..half].copy_from_slice(&self.storage[half..]);
            new_storage[half..old_capacity].copy_from_slice(&self.storage[..half]);
            self.consumed_pos = flip_offset(self.consumed_pos, old_capacity);
        } else {
            new_storage[..old_capacity].copy_from_slice(&self.storage);
        }
        self.storage = new_storage;

        // Old content now occupies the first half of the doubled buffer
        self.pos = old_capacity;
        self.last_read_pos = old_capacity;
        self.read_second_half_next = true;
        self.read(reader)?;
        Ok(flipped)
    }
}

/// Map an offset of the pre-growth circular layout onto the linearized
/// layout produced by a flipping growth.
pub fn flip_offset(offset: usize, old_capacity: usize) -> usize {
    let half = old_capacity / 2;
    if offset < half {
        offset + half
    } else {
        offset - half
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> ParserConfig {
        ParserConfig::new()
            .with_initial_buffer_capacity(8)
            .with_max_buffer_capacity(64)
    }

    fn drain(buffer: &mut InputBuffer) -> Vec<u8> {
        let mut out = Vec::new();
        loop {
            match buffer.next_byte() {
                InputByte::Byte(b) => out.push(b),
                _ => return out,
            }
        }
    }

    #[test]
    fn test_read_fills_one_half() {
        let mut buffer = InputBuffer::new(&small_config());
        let mut reader: &[u8] = b"abcdefgh";
        buffer.read(&mut reader).unwrap();
        assert_eq!(drain(&mut buffer), b"abcd");
        assert_eq!(buffer.next_byte(), InputByte::NeedsInput);
    }

    #[test]
    fn test_eof_after_short_read() {
        let mut buffer = InputBuffer::new(&small_config());
        let mut reader: &[u8] = b"ab";
        buffer.read(&mut reader).unwrap();
        assert_eq!(drain(&mut buffer), b"ab");
        assert_eq!(buffer.next_byte(), InputByte::Eof);
    }

    #[test]
    fn test_alternating_halves_wrap() {
        let mut buffer = InputBuffer::new(&small_config());
        let mut reader: &[u8] = b"abcdefghij";
        buffer.read(&mut reader).unwrap(); // first half: abcd
        buffer.read(&mut reader).unwrap(); // second half: efgh
        assert_eq!(drain(&mut buffer), b"abcdefgh");
        buffer.set_consumed_pos(6);
        assert!(buffer.read_is_safe());
        buffer.read(&mut reader).unwrap(); // first half again: ij
        assert_eq!(drain(&mut buffer), b"ij");
        assert_eq!(buffer.next_byte(), InputByte::Eof);
    }

    #[test]
    fn test_read_is_safe_blocks_unconsumed_half() {
        let mut buffer = InputBuffer::new(&small_config());
        let mut reader: &[u8] = b"abcdefghij";
        buffer.read(&mut reader).unwrap();
        // Nothing consumed yet: overwriting the second half is fine only
        // if the message being scanned did not start at zero
        assert!(!buffer.read_is_safe());
        buffer.set_consumed_pos(2);
        assert!(buffer.read_is_safe());
    }

    #[test]
    fn test_grow_without_flip_preserves_content() {
        let mut buffer = InputBuffer::new(&small_config());
        let mut reader: &[u8] = b"abcdefghijkl";
        buffer.read(&mut reader).unwrap(); // abcd in first half
        buffer.read(&mut reader).unwrap(); // efgh in second half
        let flipped = buffer.grow_and_read(&mut reader).unwrap();
        assert!(!flipped);
        assert_eq!(buffer.capacity(), 16);
        assert_eq!(buffer.span(0, 8), b"abcdefgh");
        // The grow-read pulled the remaining bytes into the new half
        assert_eq!(drain(&mut buffer), b"ijkl");
    }

    #[test]
    fn test_grow_with_flip_relinearizes() {
        let mut buffer = InputBuffer::new(&small_config());
        let mut reader: &[u8] = b"abcdefghijkl";
        buffer.read(&mut reader).unwrap(); // abcd
        buffer.read(&mut reader).unwrap(); // efgh
        buffer.set_consumed_pos(6);
        buffer.read(&mut reader).unwrap(); // ijkl overwrites first half
        // Layout is now "ijklefgh": second half is chronologically first
        let mut more: &[u8] = b"mnop";
        let flipped = buffer.grow_and_read(&mut more).unwrap();
        assert!(flipped);
        assert_eq!(buffer.span(0, 8), b"efghijkl");
        assert_eq!(buffer.consumed_pos, 2);
        assert_eq!(drain(&mut buffer), b"mnop");
    }

    #[test]
    fn test_grow_past_max_is_alloc_failure() {
        let config = ParserConfig::new()
            .with_initial_buffer_capacity(8)
            .with_max_buffer_capacity(12);
        let mut buffer = InputBuffer::new(&config);
        let mut reader: &[u8] = b"abcdefgh";
        buffer.read(&mut reader).unwrap();
        let result = buffer.grow_and_read(&mut reader);
        assert!(matches!(
            result,
            Err(LogPackError::AllocFailure { requested: 16 })
        ));
    }

    #[test]
    fn test_grow_at_max_is_lexer_failure() {
        let config = ParserConfig::new()
            .with_initial_buffer_capacity(8)
            .with_max_buffer_capacity(8);
        let mut buffer = InputBuffer::new(&config);
        let mut reader: &[u8] = b"abcdefgh";
        buffer.read(&mut reader).unwrap();
        let result = buffer.grow_and_read(&mut reader);
        assert!(matches!(result, Err(LogPackError::LexerFailure { .. })));
    }

    #[test]
    fn test_flip_offset_mapping() {
        assert_eq!(flip_offset(0, 8), 4);
        assert_eq!(flip_offset(3, 8), 7);
        assert_eq!(flip_offset(4, 8), 0);
        assert_eq!(flip_offset(7, 8), 3);
    }

    #[test]
    fn test_span_wraps_around_seam() {
        let mut buffer = InputBuffer::new(&small_config());
        let mut reader: &[u8] = b"abcdefghij";
        buffer.read(&mut reader).unwrap();
        buffer.read(&mut reader).unwrap();
        buffer.set_consumed_pos(6);
        buffer.read(&mut reader).unwrap(); // ij at positions 0..2
        assert_eq!(buffer.span(6, 2), b"ghij");
    }
}

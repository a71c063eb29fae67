//! Token output buffer for the log parser.
//!
//! Holds the tokens of the message being parsed. Slot 0 is reserved for
//! the timestamp token and stays unused when the message has none; the
//! first content token lives at slot 1 either way. The buffer doubles
//! its capacity when a message produces more tokens than fit.

use crate::buffer::input::flip_offset;
use crate::lexer::Token;

/// Growable token list with a reserved timestamp slot.
#[derive(Debug)]
pub struct OutputBuffer {
    tokens: Vec<Token>,
    pos: usize,
    has_timestamp: bool,
    has_delimiters: bool,
}

impl OutputBuffer {
    /// Create a buffer with the given initial token capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            tokens: vec![Token::default(); capacity.max(2)],
            pos: 0,
            has_timestamp: false,
            has_delimiters: false,
        }
    }

    /// Clear message state; keeps the allocation and the delimiter flag.
    pub fn reset(&mut self) {
        self.pos = 0;
        self.has_timestamp = false;
    }

    /// Current write position.
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Set the write position.
    pub fn set_pos(&mut self, pos: usize) {
        self.pos = pos;
    }

    /// Advance the write position, growing the storage when it passes
    /// the end.
    pub fn advance(&mut self) {
        self.pos += 1;
        if self.pos == self.tokens.len() {
            // Doubling keeps amortized appends cheap for very long lines
            self.tokens.resize(self.tokens.len() * 2, Token::default());
        }
    }

    /// Store `token` at `slot`, growing as needed.
    pub fn set_token(&mut self, slot: usize, token: Token) {
        if slot >= self.tokens.len() {
            let mut new_len = self.tokens.len() * 2;
            while slot >= new_len {
                new_len *= 2;
            }
            self.tokens.resize(new_len, Token::default());
        }
        self.tokens[slot] = token;
    }

    /// Store `token` at the current write position.
    pub fn set_curr_token(&mut self, token: Token) {
        let slot = self.pos;
        self.set_token(slot, token);
    }

    /// Token at `slot`.
    pub fn token(&self, slot: usize) -> &Token {
        &self.tokens[slot]
    }

    /// Token at the current write position.
    pub fn curr_token(&self) -> &Token {
        &self.tokens[self.pos]
    }

    /// Whether slot 0 holds a timestamp token.
    pub fn has_timestamp(&self) -> bool {
        self.has_timestamp
    }

    /// Record whether slot 0 holds a timestamp token.
    pub fn set_has_timestamp(&mut self, has_timestamp: bool) {
        self.has_timestamp = has_timestamp;
    }

    /// Whether the lexer ran with delimiters.
    pub fn has_delimiters(&self) -> bool {
        self.has_delimiters
    }

    /// Record whether the lexer ran with delimiters.
    pub fn set_has_delimiters(&mut self, has_delimiters: bool) {
        self.has_delimiters = has_delimiters;
    }

    /// Renormalize stored token offsets after a flipping input-buffer
    /// growth, and stamp the new backing capacity.
    pub fn flip_token_offsets(&mut self, old_capacity: usize) {
        for token in &mut self.tokens[..self.pos] {
            if token.type_ids.is_empty() {
                continue;
            }
            token.start_pos = flip_offset(token.start_pos, old_capacity);
            token.end_pos = flip_offset(token.end_pos, old_capacity);
            token.buffer_size = old_capacity * 2;
        }
    }

    /// Stamp the new backing capacity after a non-flipping growth.
    pub fn update_buffer_size(&mut self, new_capacity: usize) {
        for token in &mut self.tokens[..self.pos] {
            token.buffer_size = new_capacity;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    fn token(start: usize, end: usize) -> Token {
        Token {
            start_pos: start,
            end_pos: end,
            buffer_size: 8,
            line: 0,
            type_ids: smallvec![1],
        }
    }

    #[test]
    fn test_set_and_advance() {
        let mut buffer = OutputBuffer::new(2);
        buffer.set_token(0, token(0, 1));
        buffer.set_pos(1);
        buffer.set_curr_token(token(1, 2));
        buffer.advance();
        assert_eq!(buffer.pos(), 2);
        assert_eq!(buffer.token(1).start_pos, 1);
    }

    #[test]
    fn test_growth_preserves_tokens() {
        let mut buffer = OutputBuffer::new(2);
        for i in 0..40 {
            buffer.set_curr_token(token(i, i + 1));
            buffer.advance();
        }
        for i in 0..40 {
            assert_eq!(buffer.token(i).start_pos, i);
        }
    }

    #[test]
    fn test_reset_keeps_delimiter_flag() {
        let mut buffer = OutputBuffer::new(2);
        buffer.set_has_delimiters(true);
        buffer.set_has_timestamp(true);
        buffer.set_pos(5);
        buffer.reset();
        assert_eq!(buffer.pos(), 0);
        assert!(!buffer.has_timestamp());
        assert!(buffer.has_delimiters());
    }

    #[test]
    fn test_flip_token_offsets() {
        let mut buffer = OutputBuffer::new(4);
        buffer.set_token(0, token(6, 2)); // wrapped span in an 8-byte buffer
        buffer.set_pos(1);
        buffer.flip_token_offsets(8);
        let flipped = buffer.token(0);
        assert_eq!(flipped.start_pos, 2);
        assert_eq!(flipped.end_pos, 6);
        assert_eq!(flipped.buffer_size, 16);
    }
}

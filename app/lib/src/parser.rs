//! Log parser state machine.
//!
//! [`LogParser`] turns the lexer's token stream into messages: it
//! detects a timestamp at the start of input, appends tokens until it
//! sees the start of the next message, and hands the completed message
//! to the caller as a [`ParsingAction`]. A message boundary is either a
//! bare newline (when messages carry no timestamps) or a
//! newline-plus-timestamp token; the boundary token is rewritten to a
//! plain newline so every emitted message ends with `\n`, and the
//! remainder is held over as the first token of the next message.
//!
//! [`MessageParser`] owns the buffers and the reader and drives the
//! state machine: it catches `NeedsInput`, reads or grows the input
//! buffer, renormalizes offsets after a flipping growth, and yields one
//! message per call.

use std::io::Read;

use smallvec::smallvec;

use crate::buffer::{InputBuffer, OutputBuffer};
use crate::config::ParserConfig;
use crate::error::{LogPackError, Result};
use crate::lexer::{symbol, Lexer, LexerMode, ScanOutcome, Token};
use crate::schema::Schema;

/// What the caller should do with the output buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsingAction {
    /// A message is complete; more input remains.
    Compress,
    /// A message is complete and the input is exhausted.
    CompressAndFinish,
}

/// Result of one [`LogParser::parse`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStep {
    /// The lexer needs more input before a boundary can be found.
    NeedsInput,
    /// A message boundary was reached.
    Action(ParsingAction),
}

/// Result of one [`LogParser::init`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitStep {
    /// The lexer needs more input before the first token completes.
    NeedsInput,
    /// The input was empty; there is nothing to parse.
    Done,
    /// The first token is placed; parsing may begin.
    Ready,
}

/// Tokenizing log parser over a schema.
#[derive(Debug)]
pub struct LogParser {
    lexer: Lexer,
    has_start_of_message: bool,
    start_of_message: Token,
}

impl LogParser {
    /// Build a parser for `schema`.
    ///
    /// The schema must declare at least one delimiter.
    pub fn new(schema: &Schema) -> Result<Self> {
        if schema.delimiters().is_empty() {
            return Err(LogPackError::Schema {
                line: 0,
                message: "schema-driven parsing requires delimiters".to_string(),
            });
        }
        Ok(Self {
            lexer: Lexer::from_schema(schema, LexerMode::Parsing)?,
            has_start_of_message: false,
            start_of_message: Token::default(),
        })
    }

    /// The parsing lexer.
    pub fn lexer(&self) -> &Lexer {
        &self.lexer
    }

    /// Reset for a new input stream.
    pub fn reset(&mut self, output: &mut OutputBuffer) {
        self.lexer.reset();
        self.has_start_of_message = false;
        output.reset();
        output.set_has_delimiters(self.lexer.has_delimiters());
    }

    /// Renormalize lexer offsets after a flipping buffer growth.
    pub fn flip_states(&mut self, old_capacity: usize) {
        self.lexer.flip_states(old_capacity);
        if self.has_start_of_message {
            let token = &mut self.start_of_message;
            token.start_pos = crate::buffer::input::flip_offset(token.start_pos, old_capacity);
            token.end_pos = crate::buffer::input::flip_offset(token.end_pos, old_capacity);
            token.buffer_size = old_capacity * 2;
        }
    }

    /// Scan the first token and seed the output buffer.
    pub fn init(&mut self, input: &mut InputBuffer, output: &mut OutputBuffer) -> Result<InitStep> {
        let token = match self.lexer.scan(input)? {
            ScanOutcome::NeedsInput => return Ok(InitStep::NeedsInput),
            ScanOutcome::Token(token) => token,
        };
        output.set_token(0, token.clone());
        if token.top_type() == symbol::END {
            return Ok(InitStep::Done);
        }
        if token.top_type() == symbol::FIRST_TIMESTAMP {
            output.set_has_timestamp(true);
            output.set_pos(1);
        } else {
            output.set_has_timestamp(false);
            output.set_token(1, token);
            output.set_pos(2);
        }
        self.has_start_of_message = false;
        Ok(InitStep::Ready)
    }

    /// Append tokens until a message boundary, the end of input, or the
    /// need for more input.
    pub fn parse(&mut self, input: &mut InputBuffer, output: &mut OutputBuffer) -> Result<ParseStep> {
        if self.has_start_of_message {
            // A timestamped start-of-message upgrades the stream: from
            // here on messages end at the next timestamp, never at a
            // bare newline
            if self.start_of_message.top_type() == symbol::NEWLINE_TIMESTAMP {
                output.set_has_timestamp(true);
            }
            if output.has_timestamp() {
                output.set_token(0, self.start_of_message.clone());
                output.set_pos(1);
            } else {
                output.set_token(1, self.start_of_message.clone());
                output.set_pos(2);
            }
            self.has_start_of_message = false;
        }

        loop {
            let token = match self.lexer.scan(input)? {
                ScanOutcome::NeedsInput => return Ok(ParseStep::NeedsInput),
                ScanOutcome::Token(token) => token,
            };
            output.set_curr_token(token.clone());
            let token_type = token.top_type();

            if token_type == symbol::END {
                return Ok(ParseStep::Action(ParsingAction::CompressAndFinish));
            }

            if !output.has_timestamp() && token_type == symbol::NEWLINE {
                // The newline byte itself is the last consumed offset
                input.set_consumed_pos(token.start_pos);
                output.advance();
                return Ok(ParseStep::Action(ParsingAction::Compress));
            }

            let found_start_of_next_message = (output.has_timestamp()
                && token_type == symbol::NEWLINE_TIMESTAMP)
                || (!output.has_timestamp()
                    && token.first_byte(input) == Some(b'\n')
                    && token_type != symbol::NEWLINE);
            if found_start_of_next_message {
                // The leading newline belongs to the current message,
                // not to the held-over token
                let mut start = token.clone();
                if start.start_pos == start.buffer_size - 1 {
                    start.start_pos = 0;
                } else {
                    start.start_pos += 1;
                }
                self.start_of_message = start;

                // End the current message on a plain newline
                let mut newline = token;
                newline.end_pos = newline.start_pos + 1;
                newline.type_ids = smallvec![symbol::UNCAUGHT_STRING];
                output.set_curr_token(newline);

                let consumed = if self.start_of_message.start_pos == 0 {
                    input.capacity() - 1
                } else {
                    self.start_of_message.start_pos - 1
                };
                input.set_consumed_pos(consumed);
                self.has_start_of_message = true;
                output.advance();
                return Ok(ParseStep::Action(ParsingAction::Compress));
            }

            output.advance();
        }
    }
}

/// Reader-driving message parser.
///
/// Owns the parser, both buffers, and the reader; yields one message
/// per [`MessageParser::next_message`] call. The emitted message's
/// tokens stay valid until the next call.
#[derive(Debug)]
pub struct MessageParser<R: Read> {
    parser: LogParser,
    input: InputBuffer,
    output: OutputBuffer,
    reader: R,
    state: DriverState,
    needs_pos_reset: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DriverState {
    Fresh,
    Parsing,
    Done,
}

impl<R: Read> MessageParser<R> {
    /// Build a message parser and perform the initial read.
    pub fn new(schema: &Schema, config: &ParserConfig, mut reader: R) -> Result<Self> {
        let parser = LogParser::new(schema)?;
        let mut input = InputBuffer::new(config);
        input.read(&mut reader)?;
        Ok(Self {
            parser,
            input,
            output: OutputBuffer::new(config.output_buffer_capacity),
            reader,
            state: DriverState::Fresh,
            needs_pos_reset: false,
        })
    }

    /// The output buffer holding the latest message's tokens.
    pub fn output(&self) -> &OutputBuffer {
        &self.output
    }

    /// The input buffer backing the latest message's tokens.
    pub fn input(&self) -> &InputBuffer {
        &self.input
    }

    /// The parsing lexer.
    pub fn lexer(&self) -> &Lexer {
        self.parser.lexer()
    }

    /// Bytes of the token at `slot` in the output buffer.
    pub fn token_bytes(&self, slot: usize) -> Vec<u8> {
        self.output.token(slot).bytes(&self.input)
    }

    /// Read or grow so a stalled scan can continue.
    fn feed(&mut self) -> Result<()> {
        if self.input.read_is_safe() {
            self.input.read(&mut self.reader)
        } else {
            let old_capacity = self.input.capacity();
            let flipped = self.input.grow_and_read(&mut self.reader)?;
            if flipped {
                self.parser.flip_states(old_capacity);
                self.output.flip_token_offsets(old_capacity);
            } else {
                self.output.update_buffer_size(self.input.capacity());
            }
            Ok(())
        }
    }

    /// Parse the next message.
    ///
    /// Returns `None` when the input is exhausted. On `Some`, the
    /// message occupies the output buffer: the timestamp token in slot
    /// 0 when [`OutputBuffer::has_timestamp`] is set, content tokens in
    /// slots `1..pos`.
    pub fn next_message(&mut self) -> Result<Option<ParsingAction>> {
        loop {
            match self.state {
                DriverState::Done => return Ok(None),
                DriverState::Fresh => {
                    self.parser.reset(&mut self.output);
                    match self.parser.init(&mut self.input, &mut self.output)? {
                        InitStep::NeedsInput => self.feed()?,
                        InitStep::Done => {
                            self.state = DriverState::Done;
                            return Ok(None);
                        }
                        InitStep::Ready => self.state = DriverState::Parsing,
                    }
                }
                DriverState::Parsing => {
                    if self.needs_pos_reset {
                        let pos = if self.output.has_timestamp() { 0 } else { 1 };
                        self.output.set_pos(pos);
                        self.needs_pos_reset = false;
                    }
                    match self.parser.parse(&mut self.input, &mut self.output)? {
                        ParseStep::NeedsInput => self.feed()?,
                        ParseStep::Action(action) => {
                            if action == ParsingAction::CompressAndFinish {
                                self.state = DriverState::Done;
                                let empty = self.output.pos() <= 1
                                    && !(self.output.has_timestamp() && self.output.pos() == 1);
                                if empty {
                                    return Ok(None);
                                }
                            } else {
                                self.needs_pos_reset = true;
                            }
                            return Ok(Some(action));
                        }
                    }
                }
            }
        }
    }
}

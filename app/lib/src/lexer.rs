//! Incremental DFA lexer over the input buffer.
//!
//! The lexer owns the compiled schema DFA and drives it against the
//! circular input buffer, producing one [`Token`] per call. Token
//! boundaries follow longest accepting match; ties go to the lowest
//! rule id, which mirrors schema declaration order. With delimiters
//! configured, a variable token is only recognized when it is flanked
//! by delimiters (or the ends of input); the flanking delimiter stays
//! with the token that follows it.
//!
//! Scanning never unwinds: when the scan catches up with the last read
//! the lexer hands back [`ScanOutcome::NeedsInput`] with its state
//! saved, and the driver resumes it after reading or growing the
//! buffer.

use std::collections::HashMap;

use crate::automata::{Dfa, Nfa, RegexAst, StateId, TagList};
use crate::buffer::input::{flip_offset, InputBuffer, InputByte};
use crate::error::{LogPackError, Result};
use crate::schema::{Schema, TIMESTAMP_RULE_NAME};

/// Well-known token type ids.
///
/// Schema variables are numbered from [`symbol::FIRST_SCHEMA_VAR`] in
/// declaration order, so rule id order is declaration order.
pub mod symbol {
    /// End of input.
    pub const END: u32 = 0;
    /// Bytes no rule accepted.
    pub const UNCAUGHT_STRING: u32 = 1;
    /// A lone newline.
    pub const NEWLINE: u32 = 2;
    /// A timestamp at the start of the input.
    pub const FIRST_TIMESTAMP: u32 = 3;
    /// A newline followed by a timestamp: the start of the next message.
    pub const NEWLINE_TIMESTAMP: u32 = 4;
    /// First id available to schema variables.
    pub const FIRST_SCHEMA_VAR: u32 = 5;
}

/// A scanned token, spanning bytes of the input buffer.
///
/// Offsets index the circular buffer; `start_pos > end_pos` means the
/// token wraps around the seam. The token stays valid across buffer
/// growth (offsets are renormalized) but not across a buffer reset.
#[derive(Debug, Clone, Default)]
pub struct Token {
    /// Offset of the first byte.
    pub start_pos: usize,
    /// Offset one past the last byte.
    pub end_pos: usize,
    /// Capacity of the backing buffer when the token was made.
    pub buffer_size: usize,
    /// Line number the token started on (0-indexed).
    pub line: u32,
    /// Accepting rule ids, ascending; index 0 is the match type.
    pub type_ids: TagList,
}

impl Token {
    /// The highest priority type id.
    pub fn top_type(&self) -> u32 {
        self.type_ids.first().copied().unwrap_or(symbol::END)
    }

    /// Token length in bytes.
    pub fn len(&self) -> usize {
        if self.start_pos <= self.end_pos {
            self.end_pos - self.start_pos
        } else {
            self.buffer_size - self.start_pos + self.end_pos
        }
    }

    /// Whether the token spans no bytes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy the token bytes out of the input buffer.
    pub fn bytes(&self, input: &InputBuffer) -> Vec<u8> {
        if self.is_empty() {
            return Vec::new();
        }
        input.span(self.start_pos, self.end_pos)
    }

    /// The first byte of the token (the flanking delimiter when
    /// delimiters are configured).
    pub fn first_byte(&self, input: &InputBuffer) -> Option<u8> {
        if self.is_empty() {
            None
        } else {
            Some(input.byte_at(self.start_pos))
        }
    }
}

/// Result of one scan call.
#[derive(Debug)]
pub enum ScanOutcome {
    /// A complete token; an `END`-typed token marks end of input.
    Token(Token),
    /// The scan reached unread territory; feed the buffer and rescan.
    NeedsInput,
}

/// How a lexer is built from a schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexerMode {
    /// Full tokenizing lexer: newline and timestamp rules, variable
    /// rules prefixed with a delimiter class.
    Parsing,
    /// Raw variable rules only, for classifying query substrings.
    Search,
    /// Like `Search` but over reversed patterns, for query substrings
    /// with a prefix wildcard.
    SearchReversed,
}

#[derive(Debug, Clone)]
struct ScanState {
    start_pos: usize,
    state: StateId,
    failed: bool,
    matched: bool,
    match_pos: usize,
    match_types: TagList,
    newlines: u32,
    newlines_at_match: u32,
}

impl ScanState {
    fn fresh(start_pos: usize, root: StateId) -> Self {
        Self {
            start_pos,
            state: root,
            failed: false,
            matched: false,
            match_pos: start_pos,
            match_types: TagList::new(),
            newlines: 0,
            newlines_at_match: 0,
        }
    }
}

/// Schema-driven incremental lexer.
#[derive(Debug)]
pub struct Lexer {
    dfa: Dfa,
    delimiters: [bool; 256],
    has_delimiters: bool,
    symbol_names: HashMap<u32, String>,
    symbol_ids: HashMap<String, u32>,
    scan_state: Option<ScanState>,
    line: u32,
}

impl Lexer {
    /// Build a lexer from a schema in the given mode.
    pub fn from_schema(schema: &Schema, mode: LexerMode) -> Result<Self> {
        let mut delimiters = [false; 256];
        for &d in schema.delimiters() {
            delimiters[d as usize] = true;
        }
        let has_delimiters = !schema.delimiters().is_empty();

        let mut symbol_names: HashMap<u32, String> = HashMap::new();
        let mut symbol_ids: HashMap<String, u32> = HashMap::new();
        let mut register = |id: u32, name: &str| {
            symbol_names.insert(id, name.to_string());
            symbol_ids.insert(name.to_string(), id);
        };
        register(symbol::END, "$end");
        register(symbol::UNCAUGHT_STRING, "$uncaught");

        let mut nfa = Nfa::new();
        if mode == LexerMode::Parsing {
            register(symbol::NEWLINE, "newline");
            register(symbol::FIRST_TIMESTAMP, "firstTimestamp");
            register(symbol::NEWLINE_TIMESTAMP, "newlineTimestamp");
            nfa.add_rule(symbol::NEWLINE, &RegexAst::Literal(u32::from(b'\n')));
        }

        let delimiter_ranges: Vec<(u32, u32)> = schema
            .delimiters()
            .iter()
            .map(|&d| (u32::from(d), u32::from(d)))
            .collect();

        let mut next_id = symbol::FIRST_SCHEMA_VAR;
        for var in schema.vars() {
            if var.name == TIMESTAMP_RULE_NAME {
                if mode == LexerMode::Parsing {
                    // The timestamp becomes two detectors: one anchored at
                    // the start of input, one behind a newline. Neither
                    // feeds a dictionary.
                    nfa.add_rule(symbol::FIRST_TIMESTAMP, &var.ast);
                    let newline_timestamp = RegexAst::Cat(
                        Box::new(RegexAst::Literal(u32::from(b'\n'))),
                        Box::new(var.ast.clone()),
                    );
                    nfa.add_rule(symbol::NEWLINE_TIMESTAMP, &newline_timestamp);
                }
                continue;
            }
            if next_id > u32::from(u8::MAX) {
                return Err(LogPackError::Schema {
                    line: var.line_num,
                    message: "too many schema variables for one-byte tags".to_string(),
                });
            }
            register(next_id, &var.name);

            let mut ast = var.ast.clone();
            ast.exclude_delimiters_from_wildcards(schema.delimiters());
            match mode {
                LexerMode::Parsing => {
                    // Prefix with a delimiter class so every variable is
                    // delimiter flanked and keeps its leading delimiter
                    let prefixed = RegexAst::Cat(
                        Box::new(RegexAst::Group {
                            negated: false,
                            ranges: delimiter_ranges.clone(),
                            wildcard: false,
                        }),
                        Box::new(ast),
                    );
                    nfa.add_rule(next_id, &prefixed);
                }
                LexerMode::Search => nfa.add_rule(next_id, &ast),
                LexerMode::SearchReversed => nfa.add_rule(next_id, &ast.reversed()),
            }
            next_id += 1;
        }

        Ok(Self {
            dfa: Dfa::from_nfa(&nfa),
            delimiters,
            has_delimiters,
            symbol_names,
            symbol_ids,
            scan_state: None,
            line: 0,
        })
    }

    /// Whether a byte is a schema delimiter.
    pub fn is_delimiter(&self, byte: u8) -> bool {
        self.delimiters[byte as usize]
    }

    /// Whether the schema declared delimiters.
    pub fn has_delimiters(&self) -> bool {
        self.has_delimiters
    }

    /// The compiled DFA.
    pub fn dfa(&self) -> &Dfa {
        &self.dfa
    }

    /// Name of a token type id, if registered.
    pub fn symbol_name(&self, id: u32) -> Option<&str> {
        self.symbol_names.get(&id).map(String::as_str)
    }

    /// Token type id of a symbol name, if registered.
    pub fn symbol_id(&self, name: &str) -> Option<u32> {
        self.symbol_ids.get(name).copied()
    }

    /// Number of registered symbols.
    pub fn num_symbols(&self) -> usize {
        self.symbol_names.len()
    }

    /// Forget any in-progress scan and line count.
    pub fn reset(&mut self) {
        self.scan_state = None;
        self.line = 0;
    }

    /// Renormalize saved scan offsets after a flipping buffer growth.
    pub fn flip_states(&mut self, old_capacity: usize) {
        if let Some(state) = self.scan_state.as_mut() {
            state.start_pos = flip_offset(state.start_pos, old_capacity);
            if state.matched {
                state.match_pos = flip_offset(state.match_pos, old_capacity);
            }
        }
    }

    fn make_token(&self, input: &InputBuffer, start: usize, end: usize, types: TagList) -> Token {
        Token {
            start_pos: start,
            end_pos: end,
            buffer_size: input.capacity(),
            line: self.line,
            type_ids: types,
        }
    }

    fn uncaught_types() -> TagList {
        TagList::from_slice(&[symbol::UNCAUGHT_STRING])
    }

    /// Scan the next token from the input buffer.
    ///
    /// Resumable: a [`ScanOutcome::NeedsInput`] return keeps the scan
    /// state, and the next call continues where it stopped.
    pub fn scan(&mut self, input: &mut InputBuffer) -> Result<ScanOutcome> {
        let mut st = self
            .scan_state
            .take()
            .unwrap_or_else(|| ScanState::fresh(input.pos(), self.dfa.root()));

        loop {
            let pos_before = input.pos();
            let byte = match input.next_byte() {
                InputByte::NeedsInput => {
                    self.scan_state = Some(st);
                    return Ok(ScanOutcome::NeedsInput);
                }
                InputByte::Eof => {
                    if st.matched && st.match_pos == pos_before {
                        let token = self.make_token(
                            input,
                            st.start_pos,
                            st.match_pos,
                            st.match_types.clone(),
                        );
                        self.line += st.newlines_at_match;
                        return Ok(ScanOutcome::Token(token));
                    }
                    if pos_before == st.start_pos {
                        let token = self.make_token(
                            input,
                            pos_before,
                            pos_before,
                            TagList::from_slice(&[symbol::END]),
                        );
                        return Ok(ScanOutcome::Token(token));
                    }
                    let token =
                        self.make_token(input, st.start_pos, pos_before, Self::uncaught_types());
                    self.line += st.newlines;
                    return Ok(ScanOutcome::Token(token));
                }
                InputByte::Byte(byte) => byte,
            };

            if !st.failed {
                match self.dfa.next(st.state, byte) {
                    Some(next) => {
                        st.state = next;
                        if byte == b'\n' {
                            st.newlines += 1;
                        }
                        if self.dfa.is_accepting(next) {
                            st.matched = true;
                            st.match_pos = input.pos();
                            st.match_types = TagList::from_slice(self.dfa.tags(next));
                            st.newlines_at_match = st.newlines;
                        }
                        continue;
                    }
                    None => st.failed = true,
                }
            }

            // The DFA is dead; a delimiter (or end of input) closes the
            // token. Without delimiters every byte is a boundary.
            if self.is_delimiter(byte) || !self.has_delimiters {
                if st.matched && st.match_pos == pos_before {
                    // The match ends exactly at this delimiter: emit it
                    // and leave the delimiter for the next token
                    input.set_pos(st.match_pos);
                    let token =
                        self.make_token(input, st.start_pos, st.match_pos, st.match_types.clone());
                    self.line += st.newlines_at_match;
                    return Ok(ScanOutcome::Token(token));
                }
                if pos_before == st.start_pos {
                    // A lone delimiter no rule wants; emit it as a
                    // one-byte string so the scan keeps moving
                    let token =
                        self.make_token(input, st.start_pos, input.pos(), Self::uncaught_types());
                    self.line += st.newlines;
                    if byte == b'\n' {
                        self.line += 1;
                    }
                    return Ok(ScanOutcome::Token(token));
                }
                input.step_back();
                let token =
                    self.make_token(input, st.start_pos, pos_before, Self::uncaught_types());
                self.line += st.newlines;
                return Ok(ScanOutcome::Token(token));
            }
            if byte == b'\n' {
                st.newlines += 1;
            }
        }
    }

    /// Type ids of the rules that accept `value` exactly.
    ///
    /// Returns an empty list when no rule accepts the whole string.
    pub fn scan_str(&self, value: &[u8]) -> TagList {
        match self.dfa.run(value) {
            Some(state) => TagList::from_slice(self.dfa.tags(state)),
            None => TagList::new(),
        }
    }

    /// Type ids of the rules that could accept `value` followed by any
    /// byte sequence, the question a trailing `*` poses.
    pub fn scan_str_with_trailing_wildcard(&self, value: &[u8]) -> Vec<u32> {
        match self.dfa.run(value) {
            Some(state) => self.dfa.reachable_tags(state).into_iter().collect(),
            None => Vec::new(),
        }
    }
}

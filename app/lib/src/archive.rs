//! In-memory archive of compressed messages.
//!
//! The archive bundles the dictionaries with the encoded messages so
//! compress, search, and decompress round-trip without the on-disk
//! column layout. Each message records its logtype id, encoded
//! variable slots, optional timestamp text, and the segment it falls
//! in; segments are fixed-size message buckets that let a query skip
//! regions that cannot match.

use std::io::Read;

use log::error;
use serde::{Deserialize, Serialize};

use crate::config::ParserConfig;
use crate::dictionary::{LogtypeDictionary, VariableDictionary};
use crate::encoder;
use crate::error::{LogPackError, Result};
use crate::lexer::symbol;
use crate::logtype::{decode_variables_into_message, DecodeTags, Logtype};
use crate::parser::MessageParser;
use crate::query::Query;
use crate::schema::Schema;
use crate::stats::CompressionStats;
use crate::wildcard::wildcard_match;

/// Which tokenizer produced an archive.
///
/// An archive never mixes the two: schema-mode logtypes carry tags
/// after every `NonDouble` delimiter, heuristic logtypes carry none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenizationMode {
    /// Fixed-delimiter classifier tokenization.
    Heuristic,
    /// Schema-driven DFA tokenization.
    Schema,
}

/// One encoded message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressedMessage {
    /// Id into the logtype dictionary.
    pub logtype_id: u64,
    /// Encoded variable slots, in message order.
    pub vars: Vec<i64>,
    /// Raw timestamp text, when the message had one.
    pub timestamp: Option<String>,
    /// Segment this message falls in.
    pub segment_id: u32,
}

/// Dictionaries plus encoded messages.
#[derive(Debug, Serialize, Deserialize)]
pub struct Archive {
    mode: TokenizationMode,
    var_dicts: Vec<VariableDictionary>,
    logtype_dict: LogtypeDictionary,
    messages: Vec<CompressedMessage>,
    decode_tags: DecodeTags,
    segment_size: usize,
}

impl Archive {
    fn new(
        mode: TokenizationMode,
        num_var_dicts: usize,
        decode_tags: DecodeTags,
        segment_size: usize,
    ) -> Self {
        Self {
            mode,
            var_dicts: (0..num_var_dicts.max(1))
                .map(|_| VariableDictionary::new())
                .collect(),
            logtype_dict: LogtypeDictionary::new(),
            messages: Vec::new(),
            decode_tags,
            segment_size: segment_size.max(1),
        }
    }

    /// Which tokenizer produced this archive.
    pub fn mode(&self) -> TokenizationMode {
        self.mode
    }

    /// The variable dictionaries, indexed by schema tag (heuristic
    /// archives hold a single dictionary at index 0).
    pub fn var_dicts(&self) -> &[VariableDictionary] {
        &self.var_dicts
    }

    /// The logtype dictionary.
    pub fn logtype_dict(&self) -> &LogtypeDictionary {
        &self.logtype_dict
    }

    /// Schema tags needed to decode non-dictionary variables.
    pub fn decode_tags(&self) -> DecodeTags {
        self.decode_tags
    }

    /// Number of stored messages.
    pub fn num_messages(&self) -> usize {
        self.messages.len()
    }

    /// The `index`th message.
    pub fn message(&self, index: usize) -> Option<&CompressedMessage> {
        self.messages.get(index)
    }

    fn next_segment_id(&self) -> u32 {
        (self.messages.len() / self.segment_size) as u32
    }

    fn add_message(
        &mut self,
        logtype: Logtype,
        vars: Vec<i64>,
        dict_refs: &[(usize, u64)],
        timestamp: Option<String>,
        stats: &CompressionStats,
    ) {
        let segment_id = self.next_segment_id();
        let (logtype_id, is_new) = self.logtype_dict.add_entry(logtype);
        if is_new {
            stats.add_logtype();
        }
        self.logtype_dict.add_entry_to_segment(logtype_id, segment_id);
        for &(dict_index, id) in dict_refs {
            if let Some(dict) = self.var_dicts.get_mut(dict_index) {
                dict.add_entry_to_segment(id, segment_id);
            }
        }
        self.messages.push(CompressedMessage {
            logtype_id,
            vars,
            timestamp,
            segment_id,
        });
        stats.add_message();
    }

    /// Reconstruct the `index`th message exactly.
    pub fn decompress_message(&self, index: usize) -> Result<String> {
        let message = self.messages.get(index).ok_or(LogPackError::BadParam {
            message: format!("message index {} out of range", index),
        })?;
        let entry = self
            .logtype_dict
            .entry(message.logtype_id)
            .ok_or(LogPackError::BadParam {
                message: format!("logtype id {} out of range", message.logtype_id),
            })?;
        let decoded = decode_variables_into_message(
            &entry.logtype,
            &self.var_dicts,
            &message.vars,
            self.decode_tags,
        )?;
        let mut out = String::new();
        if let Some(timestamp) = &message.timestamp {
            out.push_str(timestamp);
        }
        out.push_str(&String::from_utf8_lossy(&decoded));
        Ok(out)
    }

    /// Indexes and text of the messages matching `query`.
    ///
    /// Sound with respect to the planner: a message matches when the
    /// supersedes-all signal fired, or some subquery covers its
    /// segment, logtype, and variables, re-checked against the full
    /// wildcard string where the subquery demands it.
    pub fn find_matches(&self, query: &Query) -> Result<Vec<(usize, String)>> {
        let mut matches = Vec::new();
        for index in 0..self.messages.len() {
            if let Some(text) = self.match_message(query, index)? {
                matches.push((index, text));
            }
        }
        Ok(matches)
    }

    fn match_message(&self, query: &Query, index: usize) -> Result<Option<String>> {
        let message = &self.messages[index];
        if query.matches_all() {
            return Ok(Some(self.decompress_message(index)?));
        }
        for subquery in query.subqueries() {
            if !subquery.segment_ids().contains(&message.segment_id) {
                continue;
            }
            if !subquery.matches_logtype(message.logtype_id) {
                continue;
            }
            if !subquery.matches_vars(&message.vars) {
                continue;
            }
            let text = self.decompress_message(index)?;
            if subquery.wildcard_match_required() {
                let matched = wildcard_match(
                    text.as_bytes(),
                    query.search_string().as_bytes(),
                    !query.ignore_case(),
                );
                if !matched {
                    continue;
                }
            }
            return Ok(Some(text));
        }
        Ok(None)
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| LogPackError::BadParam {
            message: format!("archive serialization failed: {}", e),
        })
    }

    /// Deserialize from JSON and rebuild lookup indexes.
    pub fn from_json(json: &str) -> Result<Self> {
        let mut archive: Archive =
            serde_json::from_str(json).map_err(|e| LogPackError::BadParam {
                message: format!("archive deserialization failed: {}", e),
            })?;
        for dict in &mut archive.var_dicts {
            dict.rebuild_index();
        }
        archive.logtype_dict.rebuild_index();
        Ok(archive)
    }
}

/// Facade that turns raw logs into an [`Archive`].
#[derive(Debug, Default)]
pub struct LogCompressor {
    config: ParserConfig,
    stats: CompressionStats,
}

impl LogCompressor {
    /// Create a compressor with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a compressor with the given configuration.
    pub fn with_config(config: ParserConfig) -> Self {
        Self {
            config,
            stats: CompressionStats::new(),
        }
    }

    /// The running statistics counters.
    pub fn stats(&self) -> &CompressionStats {
        &self.stats
    }

    /// Compress with the heuristic tokenizer: one message per line.
    pub fn compress_heuristic(&self, input: &str) -> Archive {
        let mut archive = Archive::new(
            TokenizationMode::Heuristic,
            1,
            DecodeTags::default(),
            self.config.segment_size,
        );
        self.stats.add_input_bytes(input.len() as u64);
        for line in input.split_inclusive('\n') {
            let dict_len_before = archive.var_dicts[0].len();
            let (logtype, vars, var_ids) = crate::logtype::encode_and_add_to_dictionary(
                line.as_bytes(),
                &mut archive.var_dicts[0],
            );
            for _ in dict_len_before..archive.var_dicts[0].len() {
                self.stats.add_var_dict_entry();
            }
            let dict_refs: Vec<(usize, u64)> = var_ids.iter().map(|&id| (0, id)).collect();
            archive.add_message(logtype, vars, &dict_refs, None, &self.stats);
        }
        archive
    }

    /// Compress with the schema-driven tokenizer.
    pub fn compress_with_schema<R: Read>(&self, schema: &Schema, reader: R) -> Result<Archive> {
        let mut parser = MessageParser::new(schema, &self.config, reader)?;
        let lexer_symbols = parser.lexer().num_symbols();
        let decode_tags = DecodeTags {
            int_tag: parser.lexer().symbol_id("int").map(|id| id as u8),
            hex_tag: parser.lexer().symbol_id("hex").map(|id| id as u8),
        };
        let float_id = parser.lexer().symbol_id("float");
        let int_id = parser.lexer().symbol_id("int");
        let hex_id = parser.lexer().symbol_id("hex");

        let mut archive = Archive::new(
            TokenizationMode::Schema,
            lexer_symbols,
            decode_tags,
            self.config.segment_size,
        );

        loop {
            match parser.next_message() {
                Ok(Some(_)) => {}
                Ok(None) => break,
                Err(err) => {
                    error!(
                        "giving up on input at offset {} after {} messages: {}",
                        parser.input().pos(),
                        archive.num_messages(),
                        err
                    );
                    return Err(err);
                }
            }
            let output = parser.output();
            let timestamp = if output.has_timestamp() {
                Some(String::from_utf8_lossy(&parser.token_bytes(0)).into_owned())
            } else {
                None
            };

            let mut logtype = Logtype::new();
            let mut vars: Vec<i64> = Vec::new();
            let mut dict_refs: Vec<(usize, u64)> = Vec::new();
            for slot in 1..output.pos() {
                let token = output.token(slot);
                let token_type = token.top_type();
                let bytes = parser.token_bytes(slot);
                self.stats.add_input_bytes(bytes.len() as u64);

                if token_type == symbol::UNCAUGHT_STRING || token_type == symbol::NEWLINE {
                    logtype.push_static(&bytes);
                    continue;
                }

                // A variable token carries its flanking delimiter as its
                // first byte; that byte is static text. A held-over token
                // at the start of a message has none.
                let var_bytes = match bytes.first() {
                    Some(&first) if parser.lexer().is_delimiter(first) => {
                        logtype.push_static(&bytes[..1]);
                        &bytes[1..]
                    }
                    _ => &bytes[..],
                };
                let var_str = String::from_utf8_lossy(var_bytes).into_owned();

                let tag = token_type as u8;
                let encoded = if Some(token_type) == int_id {
                    encoder::encode_integer(&var_str)
                } else if Some(token_type) == float_id {
                    encoder::encode_float(&var_str)
                } else if Some(token_type) == hex_id {
                    encoder::encode_hex(&var_str)
                } else {
                    None
                };

                match encoded {
                    Some(value) if Some(token_type) == float_id => {
                        logtype.add_double_var();
                        vars.push(value);
                    }
                    Some(value) => {
                        logtype.add_non_double_var(Some(tag));
                        vars.push(value);
                    }
                    None => {
                        let dict_index = token_type as usize;
                        let (id, is_new) = archive.var_dicts[dict_index].add_entry(&var_str);
                        if is_new {
                            self.stats.add_var_dict_entry();
                        }
                        dict_refs.push((dict_index, id));
                        logtype.add_non_double_var(Some(tag));
                        vars.push(encoder::encode_dict_id(id));
                    }
                }
            }
            archive.add_message(logtype, vars, &dict_refs, timestamp, &self.stats);
        }
        Ok(archive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heuristic_round_trip() {
        let compressor = LogCompressor::new();
        let input = "user=alice id=42 load=3.14\nuser=bob id=43 load=2.5\n";
        let archive = compressor.compress_heuristic(input);
        assert_eq!(archive.num_messages(), 2);
        // Same skeleton, different variables
        assert_eq!(archive.logtype_dict().len(), 1);
        let mut restored = String::new();
        for i in 0..archive.num_messages() {
            restored.push_str(&archive.decompress_message(i).unwrap());
        }
        assert_eq!(restored, input);
    }

    #[test]
    fn test_schema_round_trip() {
        let compressor = LogCompressor::new();
        let schema = Schema::standard();
        let input = "2024-01-01 00:00:00 job 42 took 3.14 at 0xdead\n\
                     2024-01-01 00:00:01 job 43 took 2.5 at 0xbeef\n";
        let archive = compressor
            .compress_with_schema(&schema, input.as_bytes())
            .unwrap();
        assert_eq!(archive.num_messages(), 2);
        assert_eq!(archive.logtype_dict().len(), 1);
        let mut restored = String::new();
        for i in 0..archive.num_messages() {
            restored.push_str(&archive.decompress_message(i).unwrap());
        }
        assert_eq!(restored, input);
    }

    #[test]
    fn test_schema_mode_encodes_ints_inline() {
        let compressor = LogCompressor::new();
        let schema = Schema::standard();
        let input = "2024-01-01 00:00:00 count 42\n";
        let archive = compressor
            .compress_with_schema(&schema, input.as_bytes())
            .unwrap();
        let message = archive.message(0).unwrap();
        assert!(message.vars.contains(&42));
    }

    #[test]
    fn test_segments_assigned_by_message_index() {
        let config = ParserConfig::new().with_segment_size(2);
        let compressor = LogCompressor::with_config(config);
        let archive = compressor.compress_heuristic("a 1\nb 2\nc 3\nd 4\ne 5\n");
        assert_eq!(archive.message(0).unwrap().segment_id, 0);
        assert_eq!(archive.message(1).unwrap().segment_id, 0);
        assert_eq!(archive.message(2).unwrap().segment_id, 1);
        assert_eq!(archive.message(4).unwrap().segment_id, 2);
    }

    #[test]
    fn test_json_round_trip() {
        let compressor = LogCompressor::new();
        let archive = compressor.compress_heuristic("user=alice id=42\n");
        let json = archive.to_json().unwrap();
        let restored = Archive::from_json(&json).unwrap();
        assert_eq!(
            restored.decompress_message(0).unwrap(),
            "user=alice id=42\n"
        );
    }

    #[test]
    fn test_stats_track_compression() {
        let compressor = LogCompressor::new();
        compressor.compress_heuristic("user=alice id=42\nuser=bob id=43\n");
        let snapshot = compressor.stats().snapshot();
        assert_eq!(snapshot.messages, 2);
        assert_eq!(snapshot.logtypes, 1);
        assert_eq!(snapshot.var_dict_entries, 2);
    }
}

//! Logtype skeletons and message assembly.
//!
//! A logtype is the static skeleton of a log message: its text with
//! each variable replaced by a one-byte delimiter. Two delimiter bytes
//! exist: [`NON_DOUBLE_DELIM`] stands for dictionary, integer, and hex
//! variables, [`DOUBLE_DELIM`] for floats. In schema mode every
//! `NonDouble` delimiter is followed by a one-byte schema tag naming
//! the rule the variable matched; the heuristic path writes no tags.

use log::error;
use serde::{Deserialize, Serialize};

use crate::dictionary::VariableDictionary;
use crate::encoder;
use crate::error::{LogPackError, Result};
use crate::heuristic;

/// Placeholder byte for dictionary, integer, and hex variables.
pub const NON_DOUBLE_DELIM: u8 = 0x11;

/// Placeholder byte for float variables.
pub const DOUBLE_DELIM: u8 = 0x12;

/// The kind of placeholder at a variable position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VarDelim {
    /// Dictionary, integer, or hex variable.
    NonDouble,
    /// Float variable.
    Double,
}

/// Position metadata for one variable inside a logtype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VarInfo {
    /// Byte offset of the delimiter inside the logtype value.
    pub offset: usize,
    /// Delimiter kind at that offset.
    pub delim: VarDelim,
    /// Schema tag following the delimiter, in schema mode.
    pub schema_tag: Option<u8>,
}

/// A logtype skeleton under construction or interned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Logtype {
    value: Vec<u8>,
    vars: Vec<VarInfo>,
}

impl Logtype {
    /// Create an empty logtype.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty logtype with byte capacity reserved.
    ///
    /// Reserving the message length up front avoids reallocation while
    /// the skeleton is assembled.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            value: Vec::with_capacity(capacity),
            vars: Vec::new(),
        }
    }

    /// Clear content, keeping allocations.
    pub fn clear(&mut self) {
        self.value.clear();
        self.vars.clear();
    }

    /// Append static message text.
    pub fn push_static(&mut self, text: &[u8]) {
        self.value.extend_from_slice(text);
    }

    /// Append a `NonDouble` variable position, with its schema tag in
    /// schema mode.
    pub fn add_non_double_var(&mut self, schema_tag: Option<u8>) {
        let offset = self.value.len();
        append_non_double_var(&mut self.value, schema_tag);
        self.vars.push(VarInfo {
            offset,
            delim: VarDelim::NonDouble,
            schema_tag,
        });
    }

    /// Append a `Double` (float) variable position.
    pub fn add_double_var(&mut self) {
        let offset = self.value.len();
        append_double_var(&mut self.value);
        self.vars.push(VarInfo {
            offset,
            delim: VarDelim::Double,
            schema_tag: None,
        });
    }

    /// The skeleton bytes.
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Number of variable positions.
    pub fn num_vars(&self) -> usize {
        self.vars.len()
    }

    /// Metadata of the `i`th variable position.
    pub fn var_info(&self, i: usize) -> Option<&VarInfo> {
        self.vars.get(i)
    }
}

/// Append a `NonDouble` placeholder to a raw pattern.
pub fn append_non_double_var(pattern: &mut Vec<u8>, schema_tag: Option<u8>) {
    pattern.push(NON_DOUBLE_DELIM);
    if let Some(tag) = schema_tag {
        pattern.push(tag);
    }
}

/// Append a `Double` placeholder to a raw pattern.
pub fn append_double_var(pattern: &mut Vec<u8>) {
    pattern.push(DOUBLE_DELIM);
}

/// Split a message into a logtype and encoded variables, interning
/// dictionary variables (heuristic tokenization).
///
/// Each variable is encoded as an integer if possible, as a float
/// otherwise, and falls back to the variable dictionary. Returns the
/// logtype, the encoded variable slots, and the ids of the dictionary
/// entries used, in first-occurrence order.
pub fn encode_and_add_to_dictionary(
    message: &[u8],
    var_dict: &mut VariableDictionary,
) -> (Logtype, Vec<i64>, Vec<u64>) {
    let mut logtype = Logtype::with_capacity(message.len());
    let mut encoded_vars = Vec::new();
    let mut var_ids = Vec::new();

    let mut last_end = 0;
    while let Some(bounds) = heuristic::next_var_bounds(message, last_end) {
        logtype.push_static(&message[last_end..bounds.begin]);
        last_end = bounds.end;

        let var = &message[bounds.begin..bounds.end];
        let var_str = String::from_utf8_lossy(var);
        if let Some(encoded) = encoder::encode_integer(&var_str) {
            logtype.add_non_double_var(None);
            encoded_vars.push(encoded);
        } else if let Some(encoded) = encoder::encode_float(&var_str) {
            logtype.add_double_var();
            encoded_vars.push(encoded);
        } else {
            let (id, _) = var_dict.add_entry(&var_str);
            var_ids.push(id);
            logtype.add_non_double_var(None);
            encoded_vars.push(encoder::encode_dict_id(id));
        }
    }
    logtype.push_static(&message[last_end..]);

    (logtype, encoded_vars, var_ids)
}

/// Context needed to decode schema-tagged variables.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DecodeTags {
    /// Tag of the `int` schema rule, when one exists.
    pub int_tag: Option<u8>,
    /// Tag of the `hex` schema rule, when one exists.
    pub hex_tag: Option<u8>,
}

/// Reconstruct a message from a logtype and its encoded variables.
///
/// `var_dicts` is indexed by schema tag; heuristic archives pass a
/// single dictionary. Fails with [`LogPackError::VariableCountMismatch`]
/// when the counts disagree and with [`LogPackError::UnknownSchemaTag`]
/// when a non-dictionary variable carries a tag that is neither the
/// int nor the hex rule.
pub fn decode_variables_into_message(
    logtype: &Logtype,
    var_dicts: &[VariableDictionary],
    encoded_vars: &[i64],
    tags: DecodeTags,
) -> Result<Vec<u8>> {
    let num_vars = logtype.num_vars();
    if num_vars != encoded_vars.len() {
        error!(
            "logtype has {} variables but {} were supplied",
            num_vars,
            encoded_vars.len()
        );
        return Err(LogPackError::VariableCountMismatch {
            expected: num_vars,
            given: encoded_vars.len(),
        });
    }

    let value = logtype.value();
    let mut message = Vec::with_capacity(value.len() * 2);
    let mut static_begin = 0;
    for i in 0..num_vars {
        let info = match logtype.var_info(i) {
            Some(info) => *info,
            None => break,
        };
        message.extend_from_slice(&value[static_begin..info.offset]);

        let encoded = encoded_vars[i];
        match info.delim {
            VarDelim::Double => {
                message.extend_from_slice(encoder::decode_float_to_string(encoded).as_bytes());
            }
            VarDelim::NonDouble => {
                if encoder::is_dict_id(encoded) {
                    let id = encoder::decode_dict_id(encoded);
                    let dict_index = match info.schema_tag {
                        Some(tag) => tag as usize,
                        None => 0,
                    };
                    let dict_value = var_dicts
                        .get(dict_index)
                        .and_then(|dict| dict.get_value(id))
                        .ok_or(LogPackError::BadParam {
                            message: format!("dictionary id {} is out of range", id),
                        })?;
                    message.extend_from_slice(dict_value.as_bytes());
                } else {
                    match info.schema_tag {
                        None => {
                            // Heuristic logtypes only pack integers here
                            message.extend_from_slice(encoded.to_string().as_bytes());
                        }
                        Some(tag) if Some(tag) == tags.int_tag => {
                            message.extend_from_slice(encoded.to_string().as_bytes());
                        }
                        Some(tag) if Some(tag) == tags.hex_tag => {
                            message.extend_from_slice(
                                encoder::decode_hex_to_string(encoded).as_bytes(),
                            );
                        }
                        Some(tag) => {
                            error!("encoded variable carries unknown schema tag {}", tag);
                            return Err(LogPackError::UnknownSchemaTag { tag });
                        }
                    }
                }
            }
        }

        // Step past the delimiter byte and its tag, when present
        static_begin = info.offset + 1 + usize::from(info.schema_tag.is_some());
    }
    message.extend_from_slice(&value[static_begin..]);

    Ok(message)
}

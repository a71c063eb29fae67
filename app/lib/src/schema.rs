//! Schema definitions for the schema-driven tokenizer.
//!
//! A schema names the delimiters that separate tokens and a list of
//! variable rules, each a named regex pattern. Rule order matters: when
//! two rules accept the same token, the one declared first wins.
//!
//! Schemas are built programmatically or loaded from a simple line
//! format:
//!
//! ```text
//! // comment
//! delimiters: \t\r\n:,!;%
//! timestamp:\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}
//! int:-{0,1}\d+
//! float:-{0,1}\d+\.\d+
//! hex:[a-fA-F]+
//! ```
//!
//! The rule named `timestamp` is special: the parser turns it into the
//! start-of-message timestamp detectors instead of a variable. The
//! names `int`, `float`, and `hex` select the bit-packed encoders at
//! compression time; any other name gets its own variable dictionary.

use std::fs;
use std::path::Path;

use crate::automata::RegexAst;
use crate::error::{LogPackError, Result};

/// The rule name with start-of-message timestamp semantics.
pub const TIMESTAMP_RULE_NAME: &str = "timestamp";

/// One schema variable rule.
#[derive(Debug, Clone)]
pub struct SchemaVar {
    /// Rule name, e.g. `int` or `ip`.
    pub name: String,
    /// Line in the schema file the rule came from (1-indexed).
    pub line_num: usize,
    /// Parsed pattern.
    pub ast: RegexAst,
}

/// A parsed schema: delimiters plus ordered variable rules.
#[derive(Debug, Clone)]
pub struct Schema {
    delimiters: Vec<u8>,
    vars: Vec<SchemaVar>,
}

impl Schema {
    /// Create an empty schema.
    pub fn new() -> Self {
        Self {
            delimiters: Vec::new(),
            vars: Vec::new(),
        }
    }

    /// A ready-made schema covering common log content.
    ///
    /// Declares the heuristic delimiter set, a `YYYY-MM-DD hh:mm:ss`
    /// timestamp, and `int`, `float`, and `hex` variables.
    pub fn standard() -> Self {
        let mut schema = Schema::new();
        schema.set_delimiters(b" \t\r\n:,!;%=");
        // Patterns are static, so parsing cannot fail
        let _ = schema.add_variable(
            TIMESTAMP_RULE_NAME,
            r"\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}",
            0,
        );
        let _ = schema.add_variable("int", r"-{0,1}\d+", 0);
        let _ = schema.add_variable("float", r"-{0,1}\d+\.\d+", 0);
        let _ = schema.add_variable("hex", r"(0x){0,1}([0-9a-f]+|[0-9A-F]+)", 0);
        schema
    }

    /// Replace the delimiter set.
    pub fn set_delimiters(&mut self, delimiters: &[u8]) {
        self.delimiters = delimiters.to_vec();
        self.delimiters.sort_unstable();
        self.delimiters.dedup();
    }

    /// Add a variable rule from a pattern string.
    ///
    /// `line_num` is reported in parse errors.
    pub fn add_variable(&mut self, name: &str, pattern: &str, line_num: usize) -> Result<()> {
        let ast = RegexAst::parse(pattern, line_num)?;
        self.vars.push(SchemaVar {
            name: name.to_string(),
            line_num,
            ast,
        });
        Ok(())
    }

    /// The delimiter set.
    pub fn delimiters(&self) -> &[u8] {
        &self.delimiters
    }

    /// The variable rules, in declaration order.
    pub fn vars(&self) -> &[SchemaVar] {
        &self.vars
    }

    /// Load a schema from the line-based file format.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::load_from_str(&content)
    }

    /// Parse the line-based schema format from a string.
    pub fn load_from_str(content: &str) -> Result<Self> {
        let mut schema = Schema::new();
        for (index, raw_line) in content.lines().enumerate() {
            let line_num = index + 1;
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with("//") || line.starts_with('#') {
                continue;
            }
            let (name, value) = line.split_once(':').ok_or_else(|| LogPackError::Schema {
                line: line_num,
                message: "expected 'name:pattern'".to_string(),
            })?;
            let name = name.trim();
            if name == "delimiters" {
                // Everything after the colon counts, so a leading space
                // declares the space delimiter
                schema.set_delimiters(&unescape_delimiters(value, line_num)?);
            } else {
                if name.is_empty() {
                    return Err(LogPackError::Schema {
                        line: line_num,
                        message: "rule name is empty".to_string(),
                    });
                }
                schema.add_variable(name, value, line_num)?;
            }
        }
        if schema.delimiters.is_empty() {
            return Err(LogPackError::Schema {
                line: 0,
                message: "schema must declare a 'delimiters:' line".to_string(),
            });
        }
        Ok(schema)
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::new()
    }
}

/// Expand `\t`, `\r`, `\n`, and `\\` escapes in a delimiters line.
fn unescape_delimiters(value: &str, line_num: usize) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('t') => out.push(b'\t'),
                Some('r') => out.push(b'\r'),
                Some('n') => out.push(b'\n'),
                Some('\\') => out.push(b'\\'),
                Some(other) if other.is_ascii() => out.push(other as u8),
                _ => {
                    return Err(LogPackError::Schema {
                        line: line_num,
                        message: "bad escape in delimiters".to_string(),
                    })
                }
            }
        } else if c.is_ascii() {
            out.push(c as u8);
        } else {
            return Err(LogPackError::Schema {
                line: line_num,
                message: "delimiters must be ASCII".to_string(),
            });
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_schema_shape() {
        let schema = Schema::standard();
        assert!(schema.delimiters().contains(&b' '));
        assert!(schema.delimiters().contains(&b'\n'));
        let names: Vec<&str> = schema.vars().iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["timestamp", "int", "float", "hex"]);
    }

    #[test]
    fn test_load_from_str() {
        let schema = Schema::load_from_str(
            "// a comment\n\
             delimiters: \\t\\r\\n:,!;%\n\
             timestamp:\\d{4}-\\d{2}-\\d{2} \\d{2}:\\d{2}:\\d{2}\n\
             int:-{0,1}\\d+\n",
        )
        .unwrap();
        assert!(schema.delimiters().contains(&b' '));
        assert!(schema.delimiters().contains(&b'\t'));
        assert!(schema.delimiters().contains(&b'%'));
        assert_eq!(schema.vars().len(), 2);
        assert_eq!(schema.vars()[1].name, "int");
        assert_eq!(schema.vars()[1].line_num, 4);
    }

    #[test]
    fn test_load_rejects_missing_delimiters() {
        let result = Schema::load_from_str("int:\\d+\n");
        assert!(matches!(result, Err(LogPackError::Schema { .. })));
    }

    #[test]
    fn test_load_rejects_bad_pattern() {
        let result = Schema::load_from_str("delimiters: \nint:(\\d+\n");
        assert!(matches!(
            result,
            Err(LogPackError::Schema { line: 2, .. })
        ));
    }

    #[test]
    fn test_delimiters_deduplicated() {
        let mut schema = Schema::new();
        schema.set_delimiters(b"  ::");
        assert_eq!(schema.delimiters(), b" :");
    }
}

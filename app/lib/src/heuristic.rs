//! Heuristic message tokenizer.
//!
//! When no schema is configured, messages are split on a fixed delimiter
//! set and each token is classified as variable or static text by simple
//! byte classifiers. A token is a variable when any of the following
//! holds:
//!
//! - it contains a decimal digit,
//! - it could be a multi-digit hex value (every byte in `[0-9a-fA-F]`,
//!   length at least 2),
//! - it directly follows `=` and contains a letter, with no wildcard
//!   before the first letter.
//!
//! Two entry points share the classifier: [`next_var_bounds`] walks a
//! log message during compression (wildcards are ordinary bytes there),
//! and [`next_query_token_bounds`] walks a search string, where `*`/`?`
//! and `\` escapes are significant.

/// The fixed delimiter set of the heuristic tokenizer.
///
/// `=` is a delimiter so that `key=value` pairs split at the equals
/// sign; the `=`-preceded classifier rule below depends on this.
pub const DELIMITERS: &[u8] = b" \t\r\n:,!;%=";

/// Whether a byte is a heuristic delimiter.
#[inline]
pub fn is_delim(c: u8) -> bool {
    matches!(
        c,
        b' ' | b'\t' | b'\r' | b'\n' | b':' | b',' | b'!' | b';' | b'%' | b'='
    )
}

/// Whether a byte is a search wildcard.
#[inline]
pub fn is_wildcard(c: u8) -> bool {
    c == b'*' || c == b'?'
}

#[inline]
fn is_alphabet(c: u8) -> bool {
    c.is_ascii_alphabetic()
}

/// Whether a token could be a multi-digit hex value.
pub fn could_be_multi_digit_hex_value(value: &[u8]) -> bool {
    value.len() >= 2 && value.iter().all(|c| c.is_ascii_hexdigit())
}

/// Bounds of one token found in a message or search string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenBounds {
    /// Byte offset of the first byte of the token.
    pub begin: usize,
    /// Byte offset one past the last byte of the token.
    pub end: usize,
    /// Whether the classifier considers the token a variable.
    pub is_var: bool,
}

/// Find the next variable in a log message, starting at `search_start`.
///
/// Static tokens are skipped; the caller appends the bytes between
/// variables to the logtype verbatim. Wildcard and escape characters
/// have no meaning inside a message.
pub fn next_var_bounds(message: &[u8], search_start: usize) -> Option<TokenBounds> {
    let len = message.len();
    let mut end = search_start;

    loop {
        // Start at the end of the previous token and skip delimiters
        let mut begin = end;
        while begin < len && is_delim(message[begin]) {
            begin += 1;
        }
        if begin >= len {
            return None;
        }

        end = begin;
        let mut contains_digit = false;
        let mut contains_alphabet = false;
        while end < len && !is_delim(message[end]) {
            let c = message[end];
            if c.is_ascii_digit() {
                contains_digit = true;
            } else if is_alphabet(c) {
                contains_alphabet = true;
            }
            end += 1;
        }

        let token = &message[begin..end];
        let is_var = contains_digit
            || could_be_multi_digit_hex_value(token)
            || (begin > 0 && message[begin - 1] == b'=' && contains_alphabet);
        if is_var {
            return Some(TokenBounds {
                begin,
                end,
                is_var: true,
            });
        }
    }
}

/// Find the next potential variable in a search string.
///
/// Differs from [`next_var_bounds`] in three ways: a `\` escape retains
/// the following delimiter as part of the token, wildcards are tracked
/// (a token containing one is returned even when the classifier says
/// static, since it may still match a variable), and the `=`-prefix rule
/// requires no wildcard before the first letter.
///
/// Returns tokens that are definite variables or contain a wildcard;
/// plain static text is skipped.
pub fn next_query_token_bounds(value: &[u8], search_start: usize) -> Option<TokenBounds> {
    let len = value.len();
    let mut end = search_start;

    loop {
        let mut begin = end;
        let mut contains_wildcard = false;

        // Advance the start cursor past delimiters and escapes until a
        // non-delimiter or wildcard is seen
        let mut is_escaped = false;
        while begin < len {
            let c = value[begin];
            if is_escaped {
                is_escaped = false;
                if !is_delim(c) {
                    // Escaped non-delimiter: step back to keep the escape
                    begin -= 1;
                    break;
                }
            } else if c == b'\\' {
                is_escaped = true;
            } else if is_wildcard(c) {
                contains_wildcard = true;
                break;
            } else if !is_delim(c) {
                break;
            }
            begin += 1;
        }
        if begin >= len {
            return None;
        }

        // Advance the end cursor to the next unescaped delimiter
        let mut contains_digit = false;
        let mut contains_alphabet = false;
        is_escaped = false;
        end = begin;
        while end < len {
            let c = value[end];
            if is_escaped {
                is_escaped = false;
                if is_delim(c) {
                    // Escaped delimiter: step back to keep the escape
                    end -= 1;
                    break;
                }
            } else if c == b'\\' {
                is_escaped = true;
            } else if is_wildcard(c) {
                contains_wildcard = true;
            } else if is_delim(c) {
                break;
            }
            if c.is_ascii_digit() {
                contains_digit = true;
            } else if is_alphabet(c) {
                contains_alphabet = true;
            }
            end += 1;
        }

        let token = &value[begin..end];
        let mut is_var = contains_digit || could_be_multi_digit_hex_value(token);
        if !is_var && begin > 0 && value[begin - 1] == b'=' && contains_alphabet {
            // Variable only if no wildcard appears before the first letter
            let mut found_wildcard_before_alphabet = false;
            let mut escaped = false;
            for &c in token {
                if escaped {
                    escaped = false;
                    if is_alphabet(c) {
                        break;
                    }
                } else if c == b'\\' {
                    escaped = true;
                } else if is_wildcard(c) {
                    found_wildcard_before_alphabet = true;
                    break;
                } else if is_alphabet(c) {
                    break;
                }
            }
            is_var = !found_wildcard_before_alphabet;
        }

        if is_var || contains_wildcard {
            return Some(TokenBounds { begin, end, is_var });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_vars(message: &str) -> Vec<(&str, bool)> {
        let bytes = message.as_bytes();
        let mut out = Vec::new();
        let mut pos = 0;
        while let Some(bounds) = next_var_bounds(bytes, pos) {
            out.push((&message[bounds.begin..bounds.end], bounds.is_var));
            pos = bounds.end;
        }
        out
    }

    fn all_query_tokens(query: &str) -> Vec<(&str, bool)> {
        let bytes = query.as_bytes();
        let mut out = Vec::new();
        let mut pos = 0;
        while let Some(bounds) = next_query_token_bounds(bytes, pos) {
            out.push((&query[bounds.begin..bounds.end], bounds.is_var));
            pos = bounds.end;
        }
        out
    }

    #[test]
    fn test_digit_tokens_are_vars() {
        assert_eq!(
            all_vars("took 42 ms"),
            vec![("42", true)]
        );
    }

    #[test]
    fn test_hex_tokens_are_vars() {
        assert_eq!(all_vars("addr deadbeef end"), vec![("deadbeef", true)]);
        // Single hex digit is not a multi-digit hex value
        assert_eq!(all_vars("grade f today"), Vec::<(&str, bool)>::new());
    }

    #[test]
    fn test_equals_prefix_is_var() {
        assert_eq!(all_vars("user=alice done"), vec![("alice", true)]);
    }

    #[test]
    fn test_mixed_message() {
        assert_eq!(
            all_vars("user=alice id=42 load=3.14"),
            vec![("alice", true), ("42", true), ("3.14", true)]
        );
    }

    #[test]
    fn test_delimiters_split_tokens() {
        assert_eq!(all_vars("a:1,b;2"), vec![("1", true), ("2", true)]);
    }

    #[test]
    fn test_partition_reconstructs_message() {
        // Interleaving static gaps and variable tokens yields the input
        let message = "request from 10.0.0.1 port 8080 status=ok";
        let bytes = message.as_bytes();
        let mut reconstructed = Vec::new();
        let mut pos = 0;
        while let Some(bounds) = next_var_bounds(bytes, pos) {
            reconstructed.extend_from_slice(&bytes[pos..bounds.begin]);
            reconstructed.extend_from_slice(&bytes[bounds.begin..bounds.end]);
            pos = bounds.end;
        }
        reconstructed.extend_from_slice(&bytes[pos..]);
        assert_eq!(reconstructed, bytes);
    }

    #[test]
    fn test_query_tokens_skip_static_text() {
        assert_eq!(
            all_query_tokens("error in module 7"),
            vec![("7", true)]
        );
    }

    #[test]
    fn test_query_wildcard_token_is_returned() {
        assert_eq!(
            all_query_tokens("load=* status"),
            vec![("*", false)]
        );
    }

    #[test]
    fn test_query_wildcard_with_digits_is_var() {
        assert_eq!(all_query_tokens("id 4*2"), vec![("4*2", true)]);
    }

    #[test]
    fn test_query_escaped_delimiter_ends_token() {
        // The escaped colon ends the first token; the escape pair stays
        // in the static text between tokens
        assert_eq!(all_query_tokens("key\\:9"), vec![("9", true)]);
    }

    #[test]
    fn test_query_equals_wildcard_before_alphabet() {
        // Wildcard before the first letter blocks the =-prefix rule
        assert_eq!(all_query_tokens("user=*x"), vec![("*x", false)]);
        assert_eq!(all_query_tokens("user=x*"), vec![("x*", true)]);
    }

    #[test]
    fn test_could_be_multi_digit_hex() {
        assert!(could_be_multi_digit_hex_value(b"ff"));
        assert!(could_be_multi_digit_hex_value(b"1A2b"));
        assert!(!could_be_multi_digit_hex_value(b"f"));
        assert!(!could_be_multi_digit_hex_value(b"fg"));
    }
}

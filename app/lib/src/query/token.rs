//! Query tokens for the heuristic planner.
//!
//! A [`QueryToken`] is one potential-variable token of the search
//! string, classified by what it could stand for in a logtype. Tokens
//! containing wildcards are often ambiguous: `4*` could be static
//! text, a dictionary or integer variable, or a float variable. The
//! planner enumerates every assignment of ambiguous tokens to concrete
//! roles; [`QueryToken::change_to_next_possible_type`] steps one token
//! to its next role, odometer style.

use crate::encoder;

/// What a token stands for in a candidate logtype.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    /// A lone `*`.
    Wildcard,
    /// Static logtype text.
    Logtype,
    /// A dictionary, integer, or hex variable.
    DictOrIntVar,
    /// A float variable.
    DoubleVar,
}

/// One classified token of the search string.
#[derive(Debug, Clone)]
pub struct QueryToken {
    value: String,
    begin_pos: usize,
    end_pos: usize,
    cannot_convert_to_non_dict_var: bool,
    contains_wildcards: bool,
    has_greedy_wildcard_in_middle: bool,
    has_prefix_greedy_wildcard: bool,
    has_suffix_greedy_wildcard: bool,
    /// The single role, when unambiguous.
    fixed_type: Option<TokenType>,
    /// Candidate roles, when ambiguous.
    possible_types: Vec<TokenType>,
    current_type_ix: usize,
}

impl QueryToken {
    /// Classify the token `query_string[begin_pos..end_pos]`.
    ///
    /// `is_var` is the heuristic tokenizer's verdict for the token.
    pub fn new(query_string: &str, begin_pos: usize, end_pos: usize, is_var: bool) -> Self {
        let value = match query_string.get(begin_pos..end_pos) {
            Some(slice) => slice.to_string(),
            // The bounds came from a byte scan; fall back when they
            // split a multi-byte character
            None => String::from_utf8_lossy(&query_string.as_bytes()[begin_pos..end_pos])
                .into_owned(),
        };

        let mut token = Self {
            value,
            begin_pos,
            end_pos,
            cannot_convert_to_non_dict_var: false,
            contains_wildcards: false,
            has_greedy_wildcard_in_middle: false,
            has_prefix_greedy_wildcard: false,
            has_suffix_greedy_wildcard: false,
            fixed_type: None,
            possible_types: Vec::new(),
            current_type_ix: 0,
        };

        if token.value == "*" {
            token.has_prefix_greedy_wildcard = true;
            token.contains_wildcards = true;
            token.fixed_type = Some(TokenType::Wildcard);
            return token;
        }

        let bytes = token.value.as_bytes();
        token.has_prefix_greedy_wildcard = bytes[0] == b'*';
        token.has_suffix_greedy_wildcard = bytes[bytes.len() - 1] == b'*';
        token.has_greedy_wildcard_in_middle =
            bytes[1..bytes.len() - 1].contains(&b'*');
        token.contains_wildcards = token.has_prefix_greedy_wildcard
            || token.has_suffix_greedy_wildcard
            || token.has_greedy_wildcard_in_middle;

        if !is_var {
            if !token.contains_wildcards {
                token.fixed_type = Some(TokenType::Logtype);
            } else {
                token.possible_types = vec![
                    TokenType::Logtype,
                    TokenType::DictOrIntVar,
                    TokenType::DoubleVar,
                ];
            }
        } else {
            let mut without_wildcards = token.value.as_str();
            if token.has_prefix_greedy_wildcard {
                without_wildcards = &without_wildcards[1..];
            }
            if token.has_suffix_greedy_wildcard {
                without_wildcards = &without_wildcards[..without_wildcards.len() - 1];
            }
            let converts = encoder::encode_integer(without_wildcards).is_some()
                || encoder::encode_float(without_wildcards).is_some();
            if !converts {
                token.fixed_type = Some(TokenType::DictOrIntVar);
                token.cannot_convert_to_non_dict_var = true;
            } else {
                token.possible_types = vec![TokenType::DictOrIntVar, TokenType::DoubleVar];
            }
        }
        token
    }

    /// The token text, wildcards included.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Byte offset of the token in the search string.
    pub fn begin_pos(&self) -> usize {
        self.begin_pos
    }

    /// Byte offset one past the token.
    pub fn end_pos(&self) -> usize {
        self.end_pos
    }

    /// Whether the wildcard-stripped value fits no non-dictionary
    /// encoding, forcing a dictionary lookup.
    pub fn cannot_convert_to_non_dict_var(&self) -> bool {
        self.cannot_convert_to_non_dict_var
    }

    /// Whether the token contains any wildcard.
    pub fn contains_wildcards(&self) -> bool {
        self.contains_wildcards
    }

    /// Whether a `*` sits strictly inside the token.
    pub fn has_greedy_wildcard_in_middle(&self) -> bool {
        self.has_greedy_wildcard_in_middle
    }

    /// Whether the token starts with `*`.
    pub fn has_prefix_greedy_wildcard(&self) -> bool {
        self.has_prefix_greedy_wildcard
    }

    /// Whether the token ends with `*`.
    pub fn has_suffix_greedy_wildcard(&self) -> bool {
        self.has_suffix_greedy_wildcard
    }

    /// Whether more than one role is possible.
    pub fn is_ambiguous_token(&self) -> bool {
        self.fixed_type.is_none()
    }

    /// The currently selected role.
    pub fn current_type(&self) -> TokenType {
        match self.fixed_type {
            Some(fixed) => fixed,
            None => self.possible_types[self.current_type_ix],
        }
    }

    /// Whether the token is a lone `*`.
    pub fn is_wildcard(&self) -> bool {
        self.current_type() == TokenType::Wildcard
    }

    /// Whether the current role is a variable.
    pub fn is_var(&self) -> bool {
        matches!(
            self.current_type(),
            TokenType::DictOrIntVar | TokenType::DoubleVar
        )
    }

    /// Whether the current role is a float variable.
    pub fn is_double_var(&self) -> bool {
        self.current_type() == TokenType::DoubleVar
    }

    /// Step to the next candidate role.
    ///
    /// Returns false when the roles wrapped around, meaning every
    /// combination that includes this token has been visited.
    pub fn change_to_next_possible_type(&mut self) -> bool {
        if self.possible_types.is_empty() {
            return false;
        }
        if self.current_type_ix < self.possible_types.len() - 1 {
            self.current_type_ix += 1;
            true
        } else {
            self.current_type_ix = 0;
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(value: &str, is_var: bool) -> QueryToken {
        QueryToken::new(value, 0, value.len(), is_var)
    }

    #[test]
    fn test_lone_star_is_wildcard() {
        let token = token("*", false);
        assert!(token.is_wildcard());
        assert!(!token.is_ambiguous_token());
        assert!(token.contains_wildcards());
    }

    #[test]
    fn test_static_text_is_logtype() {
        let token = token("error", false);
        assert_eq!(token.current_type(), TokenType::Logtype);
        assert!(!token.is_ambiguous_token());
        assert!(!token.is_var());
    }

    #[test]
    fn test_wildcard_static_is_fully_ambiguous() {
        let token = token("err*", false);
        assert!(token.is_ambiguous_token());
        assert_eq!(token.current_type(), TokenType::Logtype);
    }

    #[test]
    fn test_numeric_var_is_int_or_float_ambiguous() {
        let token = token("42*", true);
        assert!(token.is_ambiguous_token());
        assert!(!token.cannot_convert_to_non_dict_var());
        assert_eq!(token.current_type(), TokenType::DictOrIntVar);
    }

    #[test]
    fn test_non_encodable_var_is_dict_only() {
        let token = token("alice", true);
        assert!(!token.is_ambiguous_token());
        assert!(token.cannot_convert_to_non_dict_var());
        assert_eq!(token.current_type(), TokenType::DictOrIntVar);
    }

    #[test]
    fn test_wildcard_positions() {
        let token = token("*a*b*", true);
        assert!(token.has_prefix_greedy_wildcard());
        assert!(token.has_suffix_greedy_wildcard());
        assert!(token.has_greedy_wildcard_in_middle());
    }

    #[test]
    fn test_change_type_cycles() {
        let mut token = token("42*", true);
        assert_eq!(token.current_type(), TokenType::DictOrIntVar);
        assert!(token.change_to_next_possible_type());
        assert_eq!(token.current_type(), TokenType::DoubleVar);
        assert!(!token.change_to_next_possible_type());
        assert_eq!(token.current_type(), TokenType::DictOrIntVar);
    }
}

//! Finite automata for schema-driven tokenization.
//!
//! Schema rule patterns are parsed into [`RegexAst`] values, lowered
//! onto a shared [`Nfa`], and compiled into a [`Dfa`] whose accepting
//! states carry rule-id tags. The DFA also supports language
//! intersection, which the query planner uses to ask which schema
//! variable types a search fragment could match.

pub mod dfa;
pub mod nfa;
pub mod regex;

pub use dfa::{Dfa, TagList};
pub use nfa::{Nfa, StateId};
pub use regex::RegexAst;

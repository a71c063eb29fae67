//! Query planning against compressed archives.
//!
//! A wildcard search string is turned into a [`Query`]: a set of
//! [`SubQuery`] alternatives, each pairing candidate logtypes with
//! ordered variable constraints. Heuristic archives are planned with
//! the token-role enumeration in [`planner`]; schema archives use the
//! DFA-intersection strategy in [`intersect`]. Both are sound: a
//! message matching the search string always satisfies some produced
//! subquery (or the match-all signal).

pub mod interp;
pub mod intersect;
pub mod planner;
pub mod subquery;
pub mod token;

pub use interp::{InterpToken, QueryInterpretation};
pub use subquery::{Query, QueryVar, SubQuery};
pub use token::QueryToken;

use crate::archive::{Archive, TokenizationMode};
use crate::config::SearchConfig;
use crate::error::{LogPackError, Result};
use crate::lexer::{Lexer, LexerMode};
use crate::schema::Schema;

/// Plan a search with the strategy matching the archive's mode.
///
/// Schema archives need the schema they were compressed with, to build
/// the search lexers.
pub fn plan_query(
    archive: &Archive,
    search_string: &str,
    config: &SearchConfig,
    schema: Option<&Schema>,
) -> Result<Query> {
    match archive.mode() {
        TokenizationMode::Heuristic => {
            planner::plan_query_heuristic(archive, search_string, config)
        }
        TokenizationMode::Schema => {
            let schema = schema.ok_or_else(|| LogPackError::BadParam {
                message: "schema archives require the schema for planning".to_string(),
            })?;
            let forward = Lexer::from_schema(schema, LexerMode::Search)?;
            let reverse = Lexer::from_schema(schema, LexerMode::SearchReversed)?;
            intersect::plan_query_schema(archive, search_string, config, &forward, &reverse)
        }
    }
}

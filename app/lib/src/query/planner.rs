//! Heuristic query planning.
//!
//! Turns a wildcard search string into a [`Query`] against a
//! heuristically tokenized archive. The search string is bracketed in
//! `*`, split into potential-variable tokens, and every assignment of
//! ambiguous tokens to concrete roles yields one candidate subquery:
//! a logtype pattern matched against the logtype dictionary plus
//! ordered variable constraints. A pattern that collapses to `*`
//! matches everything and supersedes all subqueries.

use std::collections::BTreeSet;

use crate::archive::Archive;
use crate::config::SearchConfig;
use crate::encoder;
use crate::error::{LogPackError, Result};
use crate::heuristic;
use crate::logtype::{append_double_var, append_non_double_var};
use crate::query::subquery::{Query, SubQuery};
use crate::query::token::QueryToken;
use crate::wildcard::sanitize_search_string;

/// How likely a candidate subquery is to match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Matchability {
    /// The subquery may match some message.
    MayMatch,
    /// The subquery cannot match any message.
    WontMatch,
    /// The subquery matches every message, superseding all others.
    SupersedesAllSubQueries,
}

/// Plan a search against a heuristically tokenized archive.
///
/// Returns the query; [`Query::matches_all`] is set when the search
/// collapses to match-everything.
pub fn plan_query_heuristic(
    archive: &Archive,
    search_string: &str,
    config: &SearchConfig,
) -> Result<Query> {
    if search_string.is_empty() {
        return Err(LogPackError::BadParam {
            message: "search string is empty".to_string(),
        });
    }

    let processed = sanitize_search_string(search_string);
    let mut query = Query::new(processed.clone(), config.ignore_case);

    // Split into potential-variable tokens
    let bytes = processed.as_bytes();
    let mut tokens: Vec<QueryToken> = Vec::new();
    let mut search_start = 0;
    while let Some(bounds) = heuristic::next_query_token_bounds(bytes, search_start) {
        tokens.push(QueryToken::new(
            &processed,
            bounds.begin,
            bounds.end,
            bounds.is_var,
        ));
        search_start = bounds.end;
    }

    // Ambiguous tokens drive the enumeration; tokens with a wildcard in
    // the middle are excluded since they fall back to decompression
    // plus wildcard matching
    let ambiguous: Vec<usize> = tokens
        .iter()
        .enumerate()
        .filter(|(_, t)| !t.has_greedy_wildcard_in_middle() && t.is_ambiguous_token())
        .map(|(ix, _)| ix)
        .collect();

    // One subquery per combination of ambiguous token roles
    loop {
        let mut sub_query = SubQuery::new();
        let matchability = generate_logtypes_and_vars_for_subquery(
            archive,
            &processed,
            &tokens,
            config.ignore_case,
            &mut sub_query,
        );
        match matchability {
            Matchability::SupersedesAllSubQueries => {
                query.set_matches_all();
                return Ok(query);
            }
            Matchability::MayMatch => query.add_sub_query(sub_query),
            Matchability::WontMatch => {}
        }

        let mut type_of_one_token_changed = false;
        for &ix in &ambiguous {
            if tokens[ix].change_to_next_possible_type() {
                type_of_one_token_changed = true;
                break;
            }
        }
        if !type_of_one_token_changed {
            break;
        }
    }

    Ok(query)
}

/// Build the logtype pattern and variable constraints for the current
/// assignment of token roles.
fn generate_logtypes_and_vars_for_subquery(
    archive: &Archive,
    processed: &str,
    tokens: &[QueryToken],
    ignore_case: bool,
    sub_query: &mut SubQuery,
) -> Matchability {
    let bytes = processed.as_bytes();
    let mut last_token_end = 0;
    let mut logtype: Vec<u8> = Vec::with_capacity(processed.len());
    for token in tokens {
        logtype.extend_from_slice(&bytes[last_token_end..token.begin_pos()]);
        last_token_end = token.end_pos();

        if token.is_wildcard() {
            logtype.push(b'*');
        } else if token.has_greedy_wildcard_in_middle() {
            // The pieces around an interior wildcard would each need
            // ambiguous handling; fall back to decompression plus
            // wildcard matching
            sub_query.mark_wildcard_match_required();
            if !token.is_var() {
                logtype.push(b'*');
            } else {
                logtype.push(b'*');
                append_non_double_var(&mut logtype, None);
                logtype.push(b'*');
            }
        } else if !token.is_var() {
            logtype.extend_from_slice(token.value().as_bytes());
        } else if !process_var_token(token, archive, ignore_case, sub_query, &mut logtype) {
            return Matchability::WontMatch;
        }
    }
    logtype.extend_from_slice(&bytes[last_token_end..]);

    if logtype == b"*" {
        return Matchability::SupersedesAllSubQueries;
    }

    let possible_logtypes = archive
        .logtype_dict()
        .entries_matching_wildcard(&logtype, ignore_case);
    if possible_logtypes.is_empty() {
        return Matchability::WontMatch;
    }
    sub_query.set_possible_logtypes(&possible_logtypes);
    sub_query.calculate_ids_of_matching_segments();
    Matchability::MayMatch
}

/// Process a token assigned a variable role.
///
/// Returns false when the token cannot match anything.
fn process_var_token(
    token: &QueryToken,
    archive: &Archive,
    ignore_case: bool,
    sub_query: &mut SubQuery,
    logtype: &mut Vec<u8>,
) -> bool {
    // Even a precise variable is re-checked by decompressing, so the
    // match lands at the right position in the message
    sub_query.mark_wildcard_match_required();

    if !token.contains_wildcards() {
        return encode_and_search_dictionary(
            token.value(),
            archive,
            ignore_case,
            logtype,
            sub_query,
        );
    }

    if token.has_prefix_greedy_wildcard() {
        logtype.push(b'*');
    }
    if token.is_double_var() {
        append_double_var(logtype);
    } else {
        append_non_double_var(logtype, None);
        if token.cannot_convert_to_non_dict_var()
            && !wildcard_search_dictionary(token.value(), archive, ignore_case, sub_query)
        {
            // Not in the dictionary, so no message contains it
            return false;
        }
    }
    if token.has_suffix_greedy_wildcard() {
        logtype.push(b'*');
    }
    true
}

/// Encode a concrete variable, falling back to an exact dictionary
/// lookup. Extends the logtype pattern and the constraints on success.
fn encode_and_search_dictionary(
    value: &str,
    archive: &Archive,
    ignore_case: bool,
    logtype: &mut Vec<u8>,
    sub_query: &mut SubQuery,
) -> bool {
    if let Some(encoded) = encoder::encode_integer(value) {
        append_non_double_var(logtype, None);
        sub_query.add_non_dict_var(encoded);
        return true;
    }
    if let Some(encoded) = encoder::encode_float(value) {
        append_double_var(logtype);
        sub_query.add_non_dict_var(encoded);
        return true;
    }
    let entry = archive
        .var_dicts()
        .iter()
        .find_map(|dict| dict.entry_matching_value(value, ignore_case));
    match entry {
        Some(entry) => {
            append_non_double_var(logtype, None);
            sub_query.add_dict_var(encoder::encode_dict_id(entry.id), entry);
            true
        }
        None => false,
    }
}

/// Wildcard-match the variable dictionaries and add an imprecise
/// constraint from the matches.
fn wildcard_search_dictionary(
    pattern: &str,
    archive: &Archive,
    ignore_case: bool,
    sub_query: &mut SubQuery,
) -> bool {
    for dict in archive.var_dicts() {
        let entries = dict.entries_matching_wildcard(pattern, ignore_case);
        if !entries.is_empty() {
            let encoded: BTreeSet<i64> = entries
                .iter()
                .map(|e| encoder::encode_dict_id(e.id))
                .collect();
            sub_query.add_imprecise_dict_var(encoded, &entries);
            return true;
        }
    }
    false
}

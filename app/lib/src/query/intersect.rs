//! DFA-intersection query planning for schema archives.
//!
//! Every contiguous substring of the sanitized search string is asked
//! "which schema variable types could you match?". Substrings without
//! interior wildcards are answered with the forward or reverse lexer
//! directly; the general case builds a DFA for the substring (with `*`
//! rewritten to the regex wildcard) and intersects it with the schema
//! DFA. A dynamic-programming table over end positions then assembles
//! every decomposition of the search string into static text and typed
//! variables, and each resulting [`QueryInterpretation`] becomes a
//! candidate subquery.

use std::collections::BTreeSet;

use crate::archive::Archive;
use crate::automata::{Dfa, Nfa, RegexAst};
use crate::config::SearchConfig;
use crate::encoder;
use crate::error::{LogPackError, Result};
use crate::lexer::Lexer;
use crate::logtype::{append_double_var, append_non_double_var};
use crate::query::interp::{InterpToken, QueryInterpretation};
use crate::query::subquery::{Query, SubQuery};
use crate::wildcard::sanitize_search_string;

/// Plan a search against a schema-tokenized archive.
///
/// `forward` and `reverse` are search-mode lexers built from the same
/// schema the archive was compressed with.
pub fn plan_query_schema(
    archive: &Archive,
    search_string: &str,
    config: &SearchConfig,
    forward: &Lexer,
    reverse: &Lexer,
) -> Result<Query> {
    if search_string.is_empty() {
        return Err(LogPackError::BadParam {
            message: "search string is empty".to_string(),
        });
    }

    let processed = sanitize_search_string(search_string);
    let mut query = Query::new(processed.clone(), config.ignore_case);
    if processed == "*" {
        query.set_matches_all();
        return Ok(query);
    }

    let interpretations = build_interpretations(processed.as_bytes(), forward, reverse)?;

    // Expand wildcard int/float variables with encoded-in-segment
    // companions, then build one subquery per interpretation
    let mut seen: BTreeSet<QueryInterpretation> = interpretations.clone();
    let mut worklist: Vec<QueryInterpretation> = interpretations.into_iter().collect();
    let mut next = 0;
    while next < worklist.len() {
        let interp = worklist[next].clone();
        next += 1;

        for (ix, token) in interp.tokens().iter().enumerate() {
            if let InterpToken::Variable {
                type_id,
                has_wildcard: true,
                is_encoded: false,
                ..
            } = token
            {
                if is_encodable_type(forward, *type_id) {
                    let mut companion = interp.clone();
                    companion.set_is_encoded(ix, true);
                    if seen.insert(companion.clone()) {
                        worklist.push(companion);
                    }
                }
            }
        }

        if let Some(sub_query) = subquery_for_interpretation(archive, config, forward, &interp)? {
            query.add_sub_query(sub_query);
        }
    }

    Ok(query)
}

fn is_encodable_type(lexer: &Lexer, type_id: u32) -> bool {
    matches!(lexer.symbol_name(type_id), Some("int" | "float" | "hex"))
}

/// All decompositions of `bytes` into static text and typed variables.
fn build_interpretations(
    bytes: &[u8],
    forward: &Lexer,
    reverse: &Lexer,
) -> Result<BTreeSet<QueryInterpretation>> {
    let n = bytes.len();
    let mut matrix: Vec<BTreeSet<QueryInterpretation>> = vec![BTreeSet::new(); n];

    for i in 0..n {
        for j in 0..=i {
            let mut current: Vec<u8> = bytes[j..=i].to_vec();
            let mut suffixes: Vec<QueryInterpretation> = Vec::new();

            if current == b"*" {
                let mut suffix = QueryInterpretation::new();
                suffix.append_static(b"*");
                suffixes.push(suffix);
            } else {
                // Borrow a star from the neighbor cells so the fragment
                // classifier sees the wildcard context
                let prev_star = j > 0 && bytes[j - 1] == b'*';
                let next_star = i + 1 < n && bytes[i + 1] == b'*';
                if prev_star {
                    current.insert(0, b'*');
                }
                if next_star {
                    current.push(b'*');
                }
                let contains_wildcard = current.contains(&b'*');

                // Only delimiter-surrounded fragments can be variables
                let surrounded_by_delims = (j == 0
                    || current[0] == b'*'
                    || forward.is_delimiter(bytes[j - 1]))
                    && (i == n - 1
                        || current.last() == Some(&b'*')
                        || forward.is_delimiter(bytes[i + 1]));

                let mut schema_types: Vec<u32> = Vec::new();
                if surrounded_by_delims {
                    schema_types = var_types_for_fragment(&current, forward, reverse)?;
                    for &type_id in &schema_types {
                        let start_star = current[0] == b'*' && !prev_star;
                        let end_star = current.last() == Some(&b'*') && !next_star;
                        let mut suffix = QueryInterpretation::new();
                        if start_star {
                            suffix.append_static(b"*");
                        }
                        suffix.append_variable(
                            type_id,
                            current.clone(),
                            contains_wildcard,
                            false,
                        );
                        if end_star {
                            suffix.append_static(b"*");
                        }
                        suffixes.push(suffix);
                        // Without a wildcard only the top priority type
                        // can have matched at compression time
                        if !contains_wildcard {
                            break;
                        }
                    }
                }

                if schema_types.is_empty() || contains_wildcard || !surrounded_by_delims {
                    // Not guaranteed to be a variable: keep it as static
                    // text, without the borrowed stars
                    let start_k = usize::from(prev_star);
                    let end_k = current.len() - usize::from(next_star);
                    let mut suffix = QueryInterpretation::new();
                    suffix.append_static(&current[start_k..end_k]);
                    suffixes.push(suffix);
                }
            }

            if j > 0 {
                let prefixes: Vec<QueryInterpretation> = matrix[j - 1].iter().cloned().collect();
                for prefix in prefixes {
                    for suffix in &suffixes {
                        let mut combined = prefix.clone();
                        combined.append(suffix);
                        matrix[i].insert(combined);
                    }
                }
            } else {
                matrix[i].extend(suffixes);
            }
        }
    }

    Ok(matrix.pop().unwrap_or_default())
}

/// Schema variable types a fragment could match.
///
/// Fragments with at most an edge wildcard are classified with a plain
/// forward or reverse scan; interior wildcards take the DFA
/// intersection route.
fn var_types_for_fragment(
    fragment: &[u8],
    forward: &Lexer,
    reverse: &Lexer,
) -> Result<Vec<u32>> {
    let leading = fragment.first() == Some(&b'*');
    let trailing = fragment.len() > 1 && fragment.last() == Some(&b'*');
    let interior = fragment.len() > 2 && fragment[1..fragment.len() - 1].contains(&b'*');

    if interior || (leading && trailing) {
        let search_dfa = fragment_dfa(fragment)?;
        return Ok(forward
            .dfa()
            .intersect(&search_dfa)
            .into_iter()
            .collect());
    }
    if trailing {
        return Ok(forward.scan_str_with_trailing_wildcard(&fragment[..fragment.len() - 1]));
    }
    if leading {
        let mut reversed: Vec<u8> = fragment[1..].to_vec();
        reversed.reverse();
        return Ok(reverse.scan_str_with_trailing_wildcard(&reversed));
    }
    Ok(forward.scan_str(fragment).into_iter().collect())
}

/// Compile a search fragment into a DFA, rewriting `*` to the regex
/// any-character wildcard and escaping everything else.
fn fragment_dfa(fragment: &[u8]) -> Result<Dfa> {
    let mut regex = String::with_capacity(fragment.len() * 2);
    for &byte in fragment {
        let c = char::from(byte);
        if byte == b'*' {
            regex.push_str(".*");
        } else {
            if "\\()[]{}|+?.^-".contains(c) {
                regex.push('\\');
            }
            regex.push(c);
        }
    }
    let ast = RegexAst::parse(&regex, 0)?;
    let mut nfa = Nfa::new();
    nfa.add_rule(0, &ast);
    Ok(Dfa::from_nfa(&nfa))
}

/// Build the subquery for one interpretation, or `None` when a
/// required dictionary lookup fails.
fn subquery_for_interpretation(
    archive: &Archive,
    config: &SearchConfig,
    forward: &Lexer,
    interp: &QueryInterpretation,
) -> Result<Option<SubQuery>> {
    let mut sub_query = SubQuery::new();
    let mut logtype: Vec<u8> = Vec::new();

    for token in interp.tokens() {
        match token {
            InterpToken::Static(text) => logtype.extend_from_slice(text),
            InterpToken::Variable {
                type_id,
                value,
                has_wildcard,
                is_encoded,
            } => {
                let name = forward.symbol_name(*type_id).unwrap_or("");
                let tag = *type_id as u8;
                let value_str = String::from_utf8_lossy(value);

                if *is_encoded {
                    // The variable is assumed bit-packed in a segment;
                    // only the decompressed text can confirm the match
                    sub_query.mark_wildcard_match_required();
                    match name {
                        "float" => append_double_var(&mut logtype),
                        _ => append_non_double_var(&mut logtype, Some(tag)),
                    }
                    continue;
                }

                let encoded = match name {
                    "int" => encoder::encode_integer(&value_str),
                    "float" => encoder::encode_float(&value_str),
                    "hex" => encoder::encode_hex(&value_str),
                    _ => None,
                };
                if let Some(encoded) = encoded {
                    if name == "float" {
                        append_double_var(&mut logtype);
                    } else {
                        append_non_double_var(&mut logtype, Some(tag));
                    }
                    sub_query.add_non_dict_var(encoded);
                    continue;
                }

                // Dictionary variable of this schema type
                append_non_double_var(&mut logtype, Some(tag));
                let dict = match archive.var_dicts().get(*type_id as usize) {
                    Some(dict) => dict,
                    None => return Ok(None),
                };
                if *has_wildcard {
                    sub_query.mark_wildcard_match_required();
                    let entries = dict.entries_matching_wildcard(&value_str, config.ignore_case);
                    if entries.is_empty() {
                        return Ok(None);
                    }
                    let encoded_set: BTreeSet<i64> = entries
                        .iter()
                        .map(|e| encoder::encode_dict_id(e.id))
                        .collect();
                    sub_query.add_imprecise_dict_var(encoded_set, &entries);
                } else {
                    match dict.entry_matching_value(&value_str, config.ignore_case) {
                        Some(entry) => {
                            sub_query.add_dict_var(encoder::encode_dict_id(entry.id), entry)
                        }
                        None => return Ok(None),
                    }
                }
            }
        }
    }

    let possible_logtypes = archive
        .logtype_dict()
        .entries_matching_wildcard(&logtype, config.ignore_case);
    if possible_logtypes.is_empty() {
        return Ok(None);
    }
    sub_query.set_possible_logtypes(&possible_logtypes);
    sub_query.calculate_ids_of_matching_segments();
    Ok(Some(sub_query))
}

//! Queries and subqueries produced by the planner.
//!
//! A [`Query`] holds the sanitized search string and a list of
//! [`SubQuery`] alternatives; a message matches the query when it
//! matches any subquery. Each subquery pairs a set of candidate
//! logtypes with ordered variable constraints and remembers whether a
//! final wildcard match against the decompressed text is still
//! required.

use std::collections::BTreeSet;

use crate::dictionary::{DictEntry, LogtypeDictEntry};

/// One variable constraint inside a subquery.
#[derive(Debug, Clone)]
pub enum QueryVar {
    /// The variable slot must equal this encoded value.
    EncodedValue(i64),
    /// The variable must be this dictionary entry.
    DictEntry {
        /// Encoded dictionary-id slot value.
        encoded: i64,
        /// Id of the dictionary entry.
        entry_id: u64,
        /// Segments containing the entry.
        segments: BTreeSet<u32>,
    },
    /// The variable must be one of the dictionary entries a wildcard
    /// matched; imprecise, so a final wildcard re-check is required.
    WildcardDictMatch {
        /// Encoded slot values of all matched entries.
        encoded: BTreeSet<i64>,
        /// Ids of all matched entries.
        entry_ids: BTreeSet<u64>,
        /// Union of the matched entries' segments.
        segments: BTreeSet<u32>,
    },
}

impl QueryVar {
    /// Whether an encoded message variable satisfies this constraint.
    pub fn matches(&self, var: i64) -> bool {
        match self {
            QueryVar::EncodedValue(encoded) => *encoded == var,
            QueryVar::DictEntry { encoded, .. } => *encoded == var,
            QueryVar::WildcardDictMatch { encoded, .. } => encoded.contains(&var),
        }
    }

    /// Segment restriction this constraint imposes, if any.
    fn segments(&self) -> Option<&BTreeSet<u32>> {
        match self {
            QueryVar::EncodedValue(_) => None,
            QueryVar::DictEntry { segments, .. } => Some(segments),
            QueryVar::WildcardDictMatch { segments, .. } => Some(segments),
        }
    }
}

/// One alternative interpretation of the search string.
#[derive(Debug, Clone, Default)]
pub struct SubQuery {
    possible_logtype_ids: BTreeSet<u64>,
    logtype_segments: BTreeSet<u32>,
    vars: Vec<QueryVar>,
    wildcard_match_required: bool,
    segment_ids: BTreeSet<u32>,
}

impl SubQuery {
    /// Create an empty subquery.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all state for reuse.
    pub fn clear(&mut self) {
        self.possible_logtype_ids.clear();
        self.logtype_segments.clear();
        self.vars.clear();
        self.wildcard_match_required = false;
        self.segment_ids.clear();
    }

    /// Require a final wildcard match of the decompressed message.
    pub fn mark_wildcard_match_required(&mut self) {
        self.wildcard_match_required = true;
    }

    /// Whether a final wildcard match is required.
    pub fn wildcard_match_required(&self) -> bool {
        self.wildcard_match_required
    }

    /// Add an exact encoded-value constraint.
    pub fn add_non_dict_var(&mut self, encoded: i64) {
        self.vars.push(QueryVar::EncodedValue(encoded));
    }

    /// Add an exact dictionary-entry constraint.
    pub fn add_dict_var(&mut self, encoded: i64, entry: &DictEntry) {
        self.vars.push(QueryVar::DictEntry {
            encoded,
            entry_id: entry.id,
            segments: entry.segments.clone(),
        });
    }

    /// Add an imprecise constraint from a wildcard dictionary match.
    pub fn add_imprecise_dict_var(&mut self, encoded: BTreeSet<i64>, entries: &[&DictEntry]) {
        let mut entry_ids = BTreeSet::new();
        let mut segments = BTreeSet::new();
        for entry in entries {
            entry_ids.insert(entry.id);
            segments.extend(entry.segments.iter().copied());
        }
        self.vars.push(QueryVar::WildcardDictMatch {
            encoded,
            entry_ids,
            segments,
        });
    }

    /// The ordered variable constraints.
    pub fn vars(&self) -> &[QueryVar] {
        &self.vars
    }

    /// Record the logtypes this subquery could match.
    pub fn set_possible_logtypes(&mut self, entries: &[&LogtypeDictEntry]) {
        self.possible_logtype_ids = entries.iter().map(|e| e.id).collect();
        self.logtype_segments = entries
            .iter()
            .flat_map(|e| e.segments.iter().copied())
            .collect();
    }

    /// Candidate logtype ids.
    pub fn possible_logtype_ids(&self) -> &BTreeSet<u64> {
        &self.possible_logtype_ids
    }

    /// Whether `logtype_id` is a candidate.
    pub fn matches_logtype(&self, logtype_id: u64) -> bool {
        self.possible_logtype_ids.contains(&logtype_id)
    }

    /// Whether a message's variables satisfy every constraint in order.
    ///
    /// Constraints may be separated by arbitrary extra variables, since
    /// a `*` in the logtype pattern can swallow variables.
    pub fn matches_vars(&self, vars: &[i64]) -> bool {
        if vars.len() < self.vars.len() {
            return false;
        }
        let mut constraint_ix = 0;
        for &var in vars {
            if constraint_ix == self.vars.len() {
                break;
            }
            if self.vars[constraint_ix].matches(var) {
                constraint_ix += 1;
            }
        }
        constraint_ix == self.vars.len()
    }

    /// Intersect the logtype segments with every constraint's segments.
    ///
    /// Call after the logtypes and all variable constraints are set.
    pub fn calculate_ids_of_matching_segments(&mut self) {
        let mut segments = self.logtype_segments.clone();
        for var in &self.vars {
            if let Some(var_segments) = var.segments() {
                segments = segments.intersection(var_segments).copied().collect();
            }
        }
        self.segment_ids = segments;
    }

    /// Segments that may contain matches.
    pub fn segment_ids(&self) -> &BTreeSet<u32> {
        &self.segment_ids
    }
}

/// A planned search.
#[derive(Debug, Clone, Default)]
pub struct Query {
    subqueries: Vec<SubQuery>,
    search_string: String,
    ignore_case: bool,
    matches_all: bool,
    time_range: Option<(i64, i64)>,
}

impl Query {
    /// Create a query for the given sanitized search string.
    pub fn new(search_string: String, ignore_case: bool) -> Self {
        Self {
            subqueries: Vec::new(),
            search_string,
            ignore_case,
            matches_all: false,
            time_range: None,
        }
    }

    /// The sanitized search string.
    pub fn search_string(&self) -> &str {
        &self.search_string
    }

    /// Whether matching ignores ASCII case.
    pub fn ignore_case(&self) -> bool {
        self.ignore_case
    }

    /// Restrict the search to a timestamp range.
    pub fn set_time_range(&mut self, begin: i64, end: i64) {
        self.time_range = Some((begin, end));
    }

    /// The timestamp range, if one was set.
    pub fn time_range(&self) -> Option<(i64, i64)> {
        self.time_range
    }

    /// Whether the search matches every message.
    pub fn matches_all(&self) -> bool {
        self.matches_all
    }

    /// Mark the search as matching every message and drop the now
    /// redundant subqueries.
    pub fn set_matches_all(&mut self) {
        self.matches_all = true;
        self.subqueries.clear();
    }

    /// Append a subquery.
    pub fn add_sub_query(&mut self, sub_query: SubQuery) {
        self.subqueries.push(sub_query);
    }

    /// The subquery alternatives.
    pub fn subqueries(&self) -> &[SubQuery] {
        &self.subqueries
    }

    /// Whether any subquery survived planning.
    pub fn contains_sub_queries(&self) -> bool {
        !self.subqueries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: u64, segments: &[u32]) -> DictEntry {
        DictEntry {
            id,
            value: format!("value{}", id),
            segments: segments.iter().copied().collect(),
        }
    }

    #[test]
    fn test_query_var_matches() {
        let var = QueryVar::EncodedValue(42);
        assert!(var.matches(42));
        assert!(!var.matches(43));

        let var = QueryVar::WildcardDictMatch {
            encoded: [1, 2, 3].into_iter().collect(),
            entry_ids: BTreeSet::new(),
            segments: BTreeSet::new(),
        };
        assert!(var.matches(2));
        assert!(!var.matches(4));
    }

    #[test]
    fn test_matches_vars_in_order_with_gaps() {
        let mut sub_query = SubQuery::new();
        sub_query.add_non_dict_var(1);
        sub_query.add_non_dict_var(2);
        assert!(sub_query.matches_vars(&[1, 2]));
        assert!(sub_query.matches_vars(&[9, 1, 9, 2, 9]));
        assert!(!sub_query.matches_vars(&[2, 1]));
        assert!(!sub_query.matches_vars(&[1]));
    }

    #[test]
    fn test_segment_intersection() {
        let mut sub_query = SubQuery::new();
        sub_query.add_dict_var(100, &entry(0, &[1, 2, 3]));
        let logtype_entry = LogtypeDictEntry {
            id: 7,
            logtype: crate::logtype::Logtype::new(),
            segments: [2, 3, 4].into_iter().collect(),
        };
        sub_query.set_possible_logtypes(&[&logtype_entry]);
        sub_query.calculate_ids_of_matching_segments();
        assert_eq!(
            sub_query.segment_ids().iter().copied().collect::<Vec<_>>(),
            vec![2, 3]
        );
    }

    #[test]
    fn test_matches_all_clears_subqueries() {
        let mut query = Query::new("*".to_string(), false);
        query.add_sub_query(SubQuery::new());
        query.set_matches_all();
        assert!(query.matches_all());
        assert!(!query.contains_sub_queries());
    }
}

//! Interning dictionaries for variables and logtypes.
//!
//! The variable dictionary maps variable strings that the encoders
//! cannot represent to compact ids; the logtype dictionary interns
//! logtype skeletons. Both support exact and wildcard lookup for the
//! query planner and track which archive segments contain each entry.
//!
//! During compression a dictionary has one exclusive writer; the query
//! planner reads a point-in-time snapshot. Concurrent writing and
//! reading of the same dictionary is unsupported.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::logtype::Logtype;
use crate::wildcard::wildcard_match;

/// One interned variable string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DictEntry {
    /// Dense id, assigned in first-occurrence order.
    pub id: u64,
    /// The variable string.
    pub value: String,
    /// Ids of the segments containing a message that uses this entry.
    pub segments: BTreeSet<u32>,
}

/// Interning table for dictionary variables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VariableDictionary {
    entries: Vec<DictEntry>,
    #[serde(skip)]
    index: HashMap<String, u64>,
}

impl VariableDictionary {
    /// Create an empty dictionary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern `value`, returning its id and whether it was new.
    pub fn add_entry(&mut self, value: &str) -> (u64, bool) {
        if let Some(&id) = self.index.get(value) {
            return (id, false);
        }
        let id = self.entries.len() as u64;
        self.entries.push(DictEntry {
            id,
            value: value.to_string(),
            segments: BTreeSet::new(),
        });
        self.index.insert(value.to_string(), id);
        (id, true)
    }

    /// Record that `id` occurs in `segment`.
    pub fn add_entry_to_segment(&mut self, id: u64, segment: u32) {
        if let Some(entry) = self.entries.get_mut(id as usize) {
            entry.segments.insert(segment);
        }
    }

    /// The string behind `id`.
    pub fn get_value(&self, id: u64) -> Option<&str> {
        self.entries.get(id as usize).map(|e| e.value.as_str())
    }

    /// The entry whose value equals `value`.
    pub fn entry_matching_value(&self, value: &str, ignore_case: bool) -> Option<&DictEntry> {
        if !ignore_case {
            return self
                .index
                .get(value)
                .and_then(|&id| self.entries.get(id as usize));
        }
        self.entries
            .iter()
            .find(|e| e.value.eq_ignore_ascii_case(value))
    }

    /// Every entry whose value matches the wildcard `pattern`.
    pub fn entries_matching_wildcard(&self, pattern: &str, ignore_case: bool) -> Vec<&DictEntry> {
        self.entries
            .iter()
            .filter(|e| wildcard_match(e.value.as_bytes(), pattern.as_bytes(), !ignore_case))
            .collect()
    }

    /// Number of interned strings.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the dictionary is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rebuild the lookup index (after deserialization).
    pub fn rebuild_index(&mut self) {
        self.index = self
            .entries
            .iter()
            .map(|e| (e.value.clone(), e.id))
            .collect();
    }
}

/// One interned logtype.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogtypeDictEntry {
    /// Dense id, assigned in first-occurrence order.
    pub id: u64,
    /// The logtype skeleton.
    pub logtype: Logtype,
    /// Ids of the segments containing a message with this logtype.
    pub segments: BTreeSet<u32>,
}

/// Interning table for logtypes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogtypeDictionary {
    entries: Vec<LogtypeDictEntry>,
    #[serde(skip)]
    index: HashMap<Vec<u8>, u64>,
}

impl LogtypeDictionary {
    /// Create an empty dictionary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a logtype, returning its id and whether it was new.
    pub fn add_entry(&mut self, logtype: Logtype) -> (u64, bool) {
        if let Some(&id) = self.index.get(logtype.value()) {
            return (id, false);
        }
        let id = self.entries.len() as u64;
        self.index.insert(logtype.value().to_vec(), id);
        self.entries.push(LogtypeDictEntry {
            id,
            logtype,
            segments: BTreeSet::new(),
        });
        (id, true)
    }

    /// Record that `id` occurs in `segment`.
    pub fn add_entry_to_segment(&mut self, id: u64, segment: u32) {
        if let Some(entry) = self.entries.get_mut(id as usize) {
            entry.segments.insert(segment);
        }
    }

    /// The entry behind `id`.
    pub fn entry(&self, id: u64) -> Option<&LogtypeDictEntry> {
        self.entries.get(id as usize)
    }

    /// Every entry whose skeleton matches the wildcard `pattern`.
    pub fn entries_matching_wildcard(
        &self,
        pattern: &[u8],
        ignore_case: bool,
    ) -> Vec<&LogtypeDictEntry> {
        self.entries
            .iter()
            .filter(|e| wildcard_match(e.logtype.value(), pattern, !ignore_case))
            .collect()
    }

    /// Number of interned logtypes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the dictionary is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rebuild the lookup index (after deserialization).
    pub fn rebuild_index(&mut self) {
        self.index = self
            .entries
            .iter()
            .map(|e| (e.logtype.value().to_vec(), e.id))
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logtype::Logtype;

    #[test]
    fn test_add_entry_interns() {
        let mut dict = VariableDictionary::new();
        let (id_a, new_a) = dict.add_entry("alice");
        let (id_b, new_b) = dict.add_entry("bob");
        let (id_a2, new_a2) = dict.add_entry("alice");
        assert_eq!((id_a, new_a), (0, true));
        assert_eq!((id_b, new_b), (1, true));
        assert_eq!((id_a2, new_a2), (0, false));
        assert_eq!(dict.get_value(0), Some("alice"));
        assert_eq!(dict.len(), 2);
    }

    #[test]
    fn test_entry_matching_value_case() {
        let mut dict = VariableDictionary::new();
        dict.add_entry("Alice");
        assert!(dict.entry_matching_value("alice", false).is_none());
        assert_eq!(
            dict.entry_matching_value("alice", true).map(|e| e.id),
            Some(0)
        );
    }

    #[test]
    fn test_entries_matching_wildcard() {
        let mut dict = VariableDictionary::new();
        dict.add_entry("alice");
        dict.add_entry("alina");
        dict.add_entry("bob");
        let matches: Vec<u64> = dict
            .entries_matching_wildcard("al*", false)
            .iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(matches, vec![0, 1]);
    }

    #[test]
    fn test_segment_tracking() {
        let mut dict = VariableDictionary::new();
        let (id, _) = dict.add_entry("alice");
        dict.add_entry_to_segment(id, 3);
        dict.add_entry_to_segment(id, 3);
        dict.add_entry_to_segment(id, 7);
        let entry = dict.entry_matching_value("alice", false).unwrap();
        assert_eq!(entry.segments.iter().copied().collect::<Vec<_>>(), vec![3, 7]);
    }

    #[test]
    fn test_logtype_dictionary_interns_by_value() {
        let mut dict = LogtypeDictionary::new();
        let mut logtype = Logtype::new();
        logtype.push_static(b"took ");
        logtype.add_non_double_var(None);
        let (id_a, new_a) = dict.add_entry(logtype.clone());
        let (id_b, new_b) = dict.add_entry(logtype);
        assert_eq!((id_a, new_a), (0, true));
        assert_eq!((id_b, new_b), (0, false));
        assert_eq!(dict.len(), 1);
    }

    #[test]
    fn test_rebuild_index_after_roundtrip() {
        let mut dict = VariableDictionary::new();
        dict.add_entry("alice");
        let json = serde_json::to_string(&dict).unwrap();
        let mut restored: VariableDictionary = serde_json::from_str(&json).unwrap();
        restored.rebuild_index();
        assert_eq!(
            restored.entry_matching_value("alice", false).map(|e| e.id),
            Some(0)
        );
    }
}

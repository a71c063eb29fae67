//! Deterministic finite automata compiled from NFAs.
//!
//! DFA states hold a dense 256-way byte transition table and an
//! ascending list of accepting rule ids (the *tags*). The tag at index
//! 0 is the highest priority match, mirroring schema declaration order.

use std::collections::BTreeSet;

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use crate::automata::nfa::{Nfa, StateId};

/// Sentinel for "no transition" in the dense table.
const NO_STATE: StateId = StateId::MAX;

/// Ascending rule-id list carried by an accepting DFA state.
pub type TagList = SmallVec<[u32; 4]>;

/// One DFA state: a dense byte transition table plus tags.
#[derive(Debug, Clone)]
pub struct DfaState {
    transitions: [StateId; 256],
    tags: TagList,
}

impl DfaState {
    fn new() -> Self {
        Self {
            transitions: [NO_STATE; 256],
            tags: TagList::new(),
        }
    }

    /// Accepting rule ids, ascending; empty when not accepting.
    pub fn tags(&self) -> &[u32] {
        &self.tags
    }

    /// Whether this state accepts.
    pub fn is_accepting(&self) -> bool {
        !self.tags.is_empty()
    }
}

/// A DFA produced by subset construction over an [`Nfa`].
#[derive(Debug, Clone)]
pub struct Dfa {
    states: Vec<DfaState>,
}

impl Dfa {
    /// Compile `nfa` into a DFA.
    pub fn from_nfa(nfa: &Nfa) -> Self {
        let mut dfa = Dfa { states: Vec::new() };
        let mut subset_ids: FxHashMap<Vec<StateId>, StateId> = FxHashMap::default();
        let mut subsets: Vec<Vec<StateId>> = Vec::new();

        let mut start = vec![nfa.root()];
        nfa.epsilon_closure(&mut start);
        let root = dfa.intern_subset(nfa, &mut subset_ids, &mut subsets, start);

        let mut worklist = vec![root];
        while let Some(state_id) = worklist.pop() {
            let subset = subsets[state_id as usize].clone();
            for byte in 0u16..256 {
                let mut moved = nfa.move_on_byte(&subset, byte as u8);
                if moved.is_empty() {
                    continue;
                }
                nfa.epsilon_closure(&mut moved);
                let existed = subset_ids.contains_key(&moved);
                let dest = dfa.intern_subset(nfa, &mut subset_ids, &mut subsets, moved);
                if !existed {
                    worklist.push(dest);
                }
                dfa.states[state_id as usize].transitions[byte as usize] = dest;
            }
        }
        dfa
    }

    fn intern_subset(
        &mut self,
        nfa: &Nfa,
        subset_ids: &mut FxHashMap<Vec<StateId>, StateId>,
        subsets: &mut Vec<Vec<StateId>>,
        subset: Vec<StateId>,
    ) -> StateId {
        if let Some(&id) = subset_ids.get(&subset) {
            return id;
        }
        let id = self.states.len() as StateId;
        let mut state = DfaState::new();
        let mut tags: Vec<u32> = subset
            .iter()
            .filter_map(|&nfa_state| nfa.state(nfa_state).accepting)
            .collect();
        tags.sort_unstable();
        tags.dedup();
        state.tags = TagList::from_vec(tags);
        self.states.push(state);
        subsets.push(subset.clone());
        subset_ids.insert(subset, id);
        id
    }

    /// The start state.
    pub fn root(&self) -> StateId {
        0
    }

    /// Number of states.
    pub fn num_states(&self) -> usize {
        self.states.len()
    }

    /// Transition from `state` on `byte`, if one exists.
    pub fn next(&self, state: StateId, byte: u8) -> Option<StateId> {
        let dest = self.states[state as usize].transitions[byte as usize];
        if dest == NO_STATE {
            None
        } else {
            Some(dest)
        }
    }

    /// Accepting tags of a state, ascending.
    pub fn tags(&self, state: StateId) -> &[u32] {
        self.states[state as usize].tags()
    }

    /// Whether a state accepts.
    pub fn is_accepting(&self, state: StateId) -> bool {
        self.states[state as usize].is_accepting()
    }

    /// Run the DFA over `input` from the root.
    ///
    /// Returns the final state, or `None` if the DFA died.
    pub fn run(&self, input: &[u8]) -> Option<StateId> {
        let mut state = self.root();
        for &byte in input {
            state = self.next(state, byte)?;
        }
        Some(state)
    }

    /// Tags of every state reachable from `from`, including `from`.
    ///
    /// This answers "which rules could still accept if arbitrary bytes
    /// follow", the question posed by a trailing `*` in a query token.
    pub fn reachable_tags(&self, from: StateId) -> BTreeSet<u32> {
        let mut tags = BTreeSet::new();
        let mut visited: FxHashSet<StateId> = FxHashSet::default();
        let mut stack = vec![from];
        visited.insert(from);
        while let Some(state) = stack.pop() {
            tags.extend(self.tags(state).iter().copied());
            for byte in 0u16..256 {
                if let Some(next) = self.next(state, byte as u8) {
                    if visited.insert(next) {
                        stack.push(next);
                    }
                }
            }
        }
        tags
    }

    /// Rule ids of `self` whose language intersects the language of
    /// `other`.
    ///
    /// Walks the product automaton and collects `self`'s tags from
    /// every product state in which both sides accept.
    pub fn intersect(&self, other: &Dfa) -> BTreeSet<u32> {
        let mut tags = BTreeSet::new();
        let mut visited: FxHashSet<(StateId, StateId)> = FxHashSet::default();
        let mut stack = vec![(self.root(), other.root())];
        visited.insert((self.root(), other.root()));
        while let Some((a, b)) = stack.pop() {
            if self.is_accepting(a) && other.is_accepting(b) {
                tags.extend(self.tags(a).iter().copied());
            }
            for byte in 0u16..256 {
                if let (Some(next_a), Some(next_b)) =
                    (self.next(a, byte as u8), other.next(b, byte as u8))
                {
                    if visited.insert((next_a, next_b)) {
                        stack.push((next_a, next_b));
                    }
                }
            }
        }
        tags
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automata::regex::RegexAst;

    fn dfa_for(rules: &[(u32, &str)]) -> Dfa {
        let mut nfa = Nfa::new();
        for &(id, pattern) in rules {
            let ast = RegexAst::parse(pattern, 1).unwrap();
            nfa.add_rule(id, &ast);
        }
        Dfa::from_nfa(&nfa)
    }

    fn accepts(dfa: &Dfa, input: &str) -> Vec<u32> {
        dfa.run(input.as_bytes())
            .map(|state| dfa.tags(state).to_vec())
            .unwrap_or_default()
    }

    #[test]
    fn test_single_rule_acceptance() {
        let dfa = dfa_for(&[(0, "[0-9]+")]);
        assert_eq!(accepts(&dfa, "123"), vec![0]);
        assert_eq!(accepts(&dfa, "12a"), Vec::<u32>::new());
        assert_eq!(accepts(&dfa, ""), Vec::<u32>::new());
    }

    #[test]
    fn test_tags_are_sorted_by_rule_id() {
        // "123" matches both rules; the lower id comes first
        let dfa = dfa_for(&[(2, "[0-9a-f]+"), (1, "[0-9]+")]);
        assert_eq!(accepts(&dfa, "123"), vec![1, 2]);
        assert_eq!(accepts(&dfa, "12f"), vec![2]);
    }

    #[test]
    fn test_alternation_and_repetition() {
        let dfa = dfa_for(&[(0, "(ab|cd)+")]);
        assert_eq!(accepts(&dfa, "abcdab"), vec![0]);
        assert_eq!(accepts(&dfa, "abc"), Vec::<u32>::new());
    }

    #[test]
    fn test_bounded_repetition() {
        let dfa = dfa_for(&[(0, "a{2,3}")]);
        assert!(accepts(&dfa, "a").is_empty());
        assert_eq!(accepts(&dfa, "aa"), vec![0]);
        assert_eq!(accepts(&dfa, "aaa"), vec![0]);
        assert!(accepts(&dfa, "aaaa").is_empty());
    }

    #[test]
    fn test_negated_class() {
        let dfa = dfa_for(&[(0, "[^ ]+")]);
        assert_eq!(accepts(&dfa, "abc"), vec![0]);
        assert!(accepts(&dfa, "a c").is_empty());
    }

    #[test]
    fn test_intersect_reports_overlapping_rules() {
        let schema = dfa_for(&[(0, "[0-9]+"), (1, "[a-z]+"), (2, "[0-9]+\\.[0-9]+")]);
        // "12." then any one character: built from the query fragment "12.",
        // whose '.' was replaced by the regex wildcard
        let query = dfa_for(&[(0, "12.")]);
        let tags = schema.intersect(&query);
        // "12" then one char intersects ints ("120".."129") but not the
        // letter rule; the float rule needs at least four characters
        assert!(tags.contains(&0));
        assert!(!tags.contains(&1));
        assert!(!tags.contains(&2));
    }

    #[test]
    fn test_intersect_empty_when_disjoint() {
        let schema = dfa_for(&[(0, "[0-9]+")]);
        let query = dfa_for(&[(0, "[a-z]+")]);
        assert!(schema.intersect(&query).is_empty());
    }

    #[test]
    fn test_reachable_tags_for_trailing_wildcard() {
        let schema = dfa_for(&[(0, "[0-9]+"), (1, "[0-9]+\\.[0-9]+")]);
        // After consuming "12", both the int rule and the float rule are
        // still reachable
        let state = schema.run(b"12").unwrap();
        let tags = schema.reachable_tags(state);
        assert!(tags.contains(&0));
        assert!(tags.contains(&1));
        // After "12.", only the float rule can still accept
        let state = schema.run(b"12.").unwrap();
        let tags = schema.reachable_tags(state);
        assert!(!tags.contains(&0));
        assert!(tags.contains(&1));
    }
}

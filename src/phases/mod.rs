//! Implementation of the phases of a recipe expansion.
//!
//! ## Overview
//!
//! An expansion runs 3 phases in a loop until it reaches a fixed point:
//! 1. Discovery - Add every recipe that auto-qualifies against the wanted set
//! 2. Static Expansion - Flatten `expand` lists into an ordered recipe list
//! 3. Fragment Evaluation - Evaluate every fragment and deep-merge the results
//!
//! Phase 3 may find a recipe that is not wanted yet (through
//! `include.recipes`). The run is then abandoned and the orchestrator starts
//! over at phase 1 with the larger wanted set and a fresh accumulator.
//!
//! Each phase depends only on the previous phases and the foundation layers
//! (repository, fragment, conditions, merge).

pub mod discovery;
pub mod evaluation;
pub mod expansion;
pub mod orchestrator;

// Phase aliases, in execution order
pub use discovery as phase1;
pub use evaluation as phase3;
pub use expansion as phase2;

pub use evaluation::{Accumulator, Evaluation};
pub use orchestrator::{expand, Expansion};

/// Push `id` unless it is already present, keeping first-occurrence order
pub(crate) fn push_unique(list: &mut Vec<String>, id: &str) -> bool {
    if list.iter().any(|existing| existing == id) {
        false
    } else {
        list.push(id.to_string());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_unique() {
        let mut list = vec!["a".to_string()];
        assert!(push_unique(&mut list, "b"));
        assert!(!push_unique(&mut list, "a"));
        assert_eq!(list, vec!["a", "b"]);
    }
}

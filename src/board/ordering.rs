//! Display order of notes inside a column.
//!
//! Each note points at its predecessor; a column is normally a single chain
//! starting at the note whose `predecessor_id` is `None`. The server keeps
//! that invariant, but while a patch is half applied (or if data is simply
//! broken) a column can have several heads, dangling links or cycles. The
//! ordering here is total for any input and never loops:
//!
//! 1. walk every head, in collection order;
//! 2. walk every orphan (predecessor not in this column), in collection order;
//! 3. walk whatever is left (cycle members, losing siblings), in collection order.

use std::collections::{BTreeMap, HashMap, HashSet};

use funban_common::{Note, NoteState};

/// Order the notes of one column. `notes` must all share the same state and
/// be given in collection order.
pub fn order_column<'a, I>(notes: I) -> Vec<&'a Note>
where
    I: IntoIterator<Item = &'a Note>,
{
    let notes: Vec<&Note> = notes.into_iter().collect();
    let ids: HashSet<i64> = notes.iter().map(|n| n.id).collect();

    let mut successors: HashMap<i64, Vec<usize>> = HashMap::new();
    for (idx, note) in notes.iter().enumerate() {
        if let Some(pred) = note.predecessor_id {
            successors.entry(pred).or_default().push(idx);
        }
    }

    let mut walker = ChainWalker {
        notes: &notes,
        successors: &successors,
        visited: vec![false; notes.len()],
        ordered: Vec::with_capacity(notes.len()),
    };

    for (idx, note) in notes.iter().enumerate() {
        if note.predecessor_id.is_none() {
            walker.walk_from(idx);
        }
    }

    for (idx, note) in notes.iter().enumerate() {
        if note.predecessor_id.is_some_and(|pred| !ids.contains(&pred)) {
            walker.walk_from(idx);
        }
    }

    for idx in 0..notes.len() {
        walker.walk_from(idx);
    }

    walker.ordered
}

struct ChainWalker<'n, 'a> {
    notes: &'n [&'a Note],
    successors: &'n HashMap<i64, Vec<usize>>,
    visited: Vec<bool>,
    ordered: Vec<&'a Note>,
}

impl<'a> ChainWalker<'_, 'a> {
    fn walk_from(&mut self, start: usize) {
        let mut current = Some(start);
        while let Some(idx) = current {
            if self.visited[idx] {
                break;
            }
            self.visited[idx] = true;
            let note = self.notes[idx];
            self.ordered.push(note);

            // First unvisited claimant wins; any others are picked up later.
            current = self
                .successors
                .get(&note.id)
                .and_then(|claimants| claimants.iter().copied().find(|&i| !self.visited[i]));
        }
    }
}

/// Split the flat collection by column and order each column.
/// Every state is present in the result, empty columns included.
pub fn ordered_columns(notes: &[Note]) -> BTreeMap<NoteState, Vec<&Note>> {
    NoteState::ALL
        .into_iter()
        .map(|state| {
            let column = order_column(notes.iter().filter(|n| n.state == state));
            (state, column)
        })
        .collect()
}

//! Batcher - groups documents by destination
//!
//! Groups come out in order of first appearance; inside a group the input
//! order is kept. Size limits are applied later by chunking.

use std::collections::HashMap;

use contracts::{Batch, BatchEntry, Destination};

/// Group `(destination, entry)` pairs into one batch per destination
pub fn group<I>(entries: I) -> Vec<Batch>
where
    I: IntoIterator<Item = (Destination, BatchEntry)>,
{
    let mut index: HashMap<Destination, usize> = HashMap::new();
    let mut groups: Vec<Batch> = Vec::new();

    for (destination, entry) in entries {
        let slot = *index.entry(destination.clone()).or_insert_with(|| {
            groups.push(Batch::new(destination, Vec::new()));
            groups.len() - 1
        });
        groups[slot].push(entry);
    }

    groups
}

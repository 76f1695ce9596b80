//! Topic hierarchy resolver.
//!
//! Turns flat parent-pointer topic records plus packaged items into a pruned
//! forest. Topics live in one arena indexed by id; children are referenced by
//! arena index until the owned tree is materialized.

use std::collections::HashMap;

use thiserror::Error;
use tracing::{instrument, warn};

use crate::domain::{PackagedItem, ParentRef, TopicId, TopicNode, TopicRecord};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("Topic parent chain forms a cycle through topic {0}")]
    Cycle(TopicId),
}

/// Output of a resolution pass
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    /// Roots in source order, each with at least one item in its subtree
    pub forest: Vec<TopicNode>,

    /// Items whose topic assignment is missing or unknown
    pub unassigned: Vec<PackagedItem>,

    /// Items attached to topics that no root reaches
    pub unreachable: Vec<PackagedItem>,

    /// Topics whose parent id does not exist
    pub orphans: Vec<TopicId>,
}

impl Resolution {
    pub fn item_count(&self) -> usize {
        self.forest.iter().map(TopicNode::item_count).sum()
    }
}

struct Slot<'a> {
    record: &'a TopicRecord,
    children: Vec<usize>,
    items: Vec<PackagedItem>,
}

/// Build the pruned topic forest for a set of packaged items
#[instrument(skip_all, fields(topics = topics.len(), items = items.len()))]
pub fn resolve_forest(
    topics: &[TopicRecord],
    items: Vec<PackagedItem>,
) -> Result<Resolution, ResolveError> {
    let mut resolution = Resolution::default();

    // Index by id; first declaration wins
    let mut slots: Vec<Slot<'_>> = Vec::with_capacity(topics.len());
    let mut index: HashMap<TopicId, usize> = HashMap::with_capacity(topics.len());
    for record in topics {
        if index.contains_key(&record.id) {
            warn!(topic = %record.id, "Duplicate topic id, keeping first declaration");
            continue;
        }
        index.insert(record.id, slots.len());
        slots.push(Slot {
            record,
            children: Vec::new(),
            items: Vec::new(),
        });
    }

    // Attach items to their topics
    for item in items {
        match item.item.topic_id().and_then(|id| index.get(&id)) {
            Some(&slot) => slots[slot].items.push(item),
            None => {
                warn!(
                    item = %item.item.source_id(),
                    topic = ?item.item.topic_id(),
                    "Topic not found for item"
                );
                resolution.unassigned.push(item);
            }
        }
    }

    detect_cycles(&slots, &index)?;

    // Parent -> children edges, in declaration order
    let mut roots = Vec::new();
    for position in 0..slots.len() {
        let record = slots[position].record;
        match record.parent {
            Some(ParentRef::Root) => roots.push(position),
            Some(ParentRef::Topic(parent_id)) => match index.get(&parent_id) {
                Some(&parent) => slots[parent].children.push(position),
                None => {
                    warn!(topic = %record.id, parent = %parent_id, "Parent topic not found");
                    resolution.orphans.push(record.id);
                }
            },
            None => {}
        }
    }

    for root in roots {
        if let Some(node) = materialize(&mut slots, root) {
            resolution.forest.push(node);
        }
    }

    for slot in &mut slots {
        if !slot.items.is_empty() {
            warn!(
                topic = %slot.record.id,
                count = slot.items.len(),
                "Items attached to a topic no root reaches"
            );
            resolution.unreachable.append(&mut slot.items);
        }
    }

    Ok(resolution)
}

/// Fail if any parent chain loops back on itself
fn detect_cycles(slots: &[Slot<'_>], index: &HashMap<TopicId, usize>) -> Result<(), ResolveError> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        InProgress,
        Done,
    }

    let mut marks = vec![Mark::Unvisited; slots.len()];
    for start in 0..slots.len() {
        let mut chain = Vec::new();
        let mut current = Some(start);

        while let Some(position) = current {
            match marks[position] {
                Mark::Done => break,
                Mark::InProgress => return Err(ResolveError::Cycle(slots[position].record.id)),
                Mark::Unvisited => {
                    marks[position] = Mark::InProgress;
                    chain.push(position);
                    current = match slots[position].record.parent {
                        Some(ParentRef::Topic(parent)) => index.get(&parent).copied(),
                        _ => None,
                    };
                }
            }
        }

        for position in chain {
            marks[position] = Mark::Done;
        }
    }
    Ok(())
}

/// Move a slot's subtree out of the arena, pruning empty branches
fn materialize(slots: &mut [Slot<'_>], position: usize) -> Option<TopicNode> {
    let child_positions = std::mem::take(&mut slots[position].children);
    let children: Vec<TopicNode> = child_positions
        .into_iter()
        .filter_map(|child| materialize(slots, child))
        .collect();

    let slot = &mut slots[position];
    let items = std::mem::take(&mut slot.items);
    if items.is_empty() && children.is_empty() {
        return None;
    }

    Some(TopicNode {
        id: slot.record.id,
        label: slot.record.label.clone(),
        children,
        items,
    })
}

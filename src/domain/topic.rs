//! Resolved topic tree nodes.

use serde::{Deserialize, Serialize};

use super::item::PackagedItem;
use super::records::TopicId;

/// A topic with its materialized children and attached content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicNode {
    pub id: TopicId,
    pub label: String,

    /// Children in source declaration order
    pub children: Vec<TopicNode>,

    /// Content attached directly to this topic
    pub items: Vec<PackagedItem>,
}

impl TopicNode {
    pub fn new(id: TopicId, label: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
            children: Vec::new(),
            items: Vec::new(),
        }
    }

    /// Number of items in this node's whole subtree
    pub fn item_count(&self) -> usize {
        self.items.len() + self.children.iter().map(TopicNode::item_count).sum::<usize>()
    }

    /// True when nothing in the subtree carries content
    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.children.iter().all(TopicNode::is_empty)
    }

    /// Depth-first iterator over this node and all descendants
    pub fn walk(&self) -> Vec<&TopicNode> {
        let mut out = vec![self];
        for child in &self.children {
            out.extend(child.walk());
        }
        out
    }
}

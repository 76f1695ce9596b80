//! Domain types for the content assembly pipeline.
//!
//! This module contains the core data structures:
//! - Records: raw topic and content entries from the source files
//! - Items: located content, packaged content, archives
//! - Topics: resolved tree nodes

pub mod item;
pub mod records;
pub mod topic;

// Re-export commonly used types
pub use item::{AddressScheme, ArchiveRef, ContentItem, DependencyBundle, PackagedItem};
pub use records::{ContentRecord, ParentRef, RecordKey, TopicId, TopicRecord};
pub use topic::TopicNode;

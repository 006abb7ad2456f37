//! Arena nodes
//!
//! Nodes live in the document's arena and refer to each other by
//! [`NodeId`]. Child lists own their entries; the `parent` link is a plain
//! handle used for upward search only.

use std::sync::Arc;

use super::compressed::CompressedFragment;
use super::value::Value;
use crate::schema::Association;
use crate::stream::Bookmark;

/// Handle of a node inside a [`super::Document`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Position in the arena
    pub fn index(&self) -> usize {
        self.0
    }
}

/// How much of a node's subtree has been materialized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadState {
    /// Bookmarked; nothing below the size field read yet
    None,
    /// Attributes and primitive children known, some child containers
    /// still unread
    Partial,
    /// Whole subtree materialized
    #[default]
    Full,
}

#[derive(Debug)]
pub(crate) struct Node {
    pub(crate) parent: Option<NodeId>,
    pub(crate) data: NodeData,
}

#[derive(Debug)]
pub(crate) enum NodeData {
    Fragment(FragmentData),
    Container(ContainerData),
    Primitive(PrimitiveData),
}

#[derive(Debug, Default)]
pub(crate) struct FragmentData {
    pub(crate) children: Vec<NodeId>,
    pub(crate) load_state: LoadState,
}

#[derive(Debug)]
pub(crate) struct ContainerData {
    pub(crate) association: Arc<Association>,
    pub(crate) attributes: Vec<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) load_state: LoadState,
    pub(crate) bookmark: Option<Bookmark>,
    /// Compression policy for children added by role
    pub(crate) compress_children: bool,
}

#[derive(Debug)]
pub(crate) struct PrimitiveData {
    pub(crate) association: Arc<Association>,
    pub(crate) is_attribute: bool,
    pub(crate) content: PrimitiveContent,
}

#[derive(Debug)]
pub(crate) enum PrimitiveContent {
    Value(Value),
    Compressed(CompressedFragment),
}

impl Node {
    pub(crate) fn new(data: NodeData) -> Self {
        Self { parent: None, data }
    }

    pub(crate) fn association(&self) -> Option<&Arc<Association>> {
        match &self.data {
            NodeData::Fragment(_) => None,
            NodeData::Container(c) => Some(&c.association),
            NodeData::Primitive(p) => Some(&p.association),
        }
    }

    pub(crate) fn children(&self) -> &[NodeId] {
        match &self.data {
            NodeData::Fragment(f) => &f.children,
            NodeData::Container(c) => &c.children,
            NodeData::Primitive(_) => &[],
        }
    }

    pub(crate) fn children_mut(&mut self) -> Option<&mut Vec<NodeId>> {
        match &mut self.data {
            NodeData::Fragment(f) => Some(&mut f.children),
            NodeData::Container(c) => Some(&mut c.children),
            NodeData::Primitive(_) => None,
        }
    }

    pub(crate) fn compressed(&self) -> Option<&CompressedFragment> {
        match &self.data {
            NodeData::Primitive(PrimitiveData {
                content: PrimitiveContent::Compressed(c),
                ..
            }) => Some(c),
            _ => None,
        }
    }

    pub(crate) fn is_attribute(&self) -> bool {
        matches!(&self.data, NodeData::Primitive(p) if p.is_attribute)
    }
}

/// Owned, structural copy of a subtree
///
/// Snapshots compare equal when two subtrees carry the same associations
/// (id and name), the same attribute and child order and the same values.
/// Compressed wrappers compare by their decompressed content.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeSnapshot {
    /// Document body or fragment
    Fragment {
        /// Children in order
        children: Vec<NodeSnapshot>,
    },
    /// Container
    Container {
        /// Association id
        id: u32,
        /// Association name
        name: String,
        /// Attributes in order
        attributes: Vec<NodeSnapshot>,
        /// Children in order
        children: Vec<NodeSnapshot>,
    },
    /// Valued primitive
    Primitive {
        /// Association id
        id: u32,
        /// Association name
        name: String,
        /// Attribute position
        attribute: bool,
        /// Value
        value: Value,
    },
    /// Compressed fragment
    Compressed {
        /// Association id
        id: u32,
        /// Association name
        name: String,
        /// Decompressed content
        content: Vec<NodeSnapshot>,
    },
}

impl NodeSnapshot {
    /// Association name, if the node has one
    pub fn name(&self) -> Option<&str> {
        match self {
            NodeSnapshot::Fragment { .. } => None,
            NodeSnapshot::Container { name, .. }
            | NodeSnapshot::Primitive { name, .. }
            | NodeSnapshot::Compressed { name, .. } => Some(name),
        }
    }

    /// Children, or the content of a compressed wrapper
    pub fn children(&self) -> &[NodeSnapshot] {
        match self {
            NodeSnapshot::Fragment { children } | NodeSnapshot::Container { children, .. } => {
                children
            }
            NodeSnapshot::Compressed { content, .. } => content,
            NodeSnapshot::Primitive { .. } => &[],
        }
    }
}

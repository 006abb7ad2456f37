//! The document arena
//!
//! A [`Document`] owns every node of its tree in one arena. The body is a
//! fragment created with the document; everything else is created detached
//! and then appended. Detached nodes stay in the arena, so a [`NodeId`]
//! never dangles within the document that issued it.

use std::sync::Arc;

use super::compressed::CompressedFragment;
use super::header::Header;
use super::node::{
    ContainerData, FragmentData, LoadState, Node, NodeData, NodeId, NodeSnapshot,
    PrimitiveContent, PrimitiveData,
};
use super::value::Value;
use crate::error::{Error, FormatError, Result};
use crate::names::names_equal;
use crate::schema::builtin::{self, ids};
use crate::schema::{Association, NodeKind, PrimitiveType, Scope, Translation};
use crate::stream::Bookmark;

/// Name reported for fragments, which carry no association
pub const FRAGMENT_NAME: &str = "#fragment";

/// A DML document
#[derive(Debug)]
pub struct Document {
    nodes: Vec<Node>,
    body: NodeId,
    global: Arc<Translation>,
    header: Option<Header>,
}

impl Document {
    /// Create an empty document with `global` as its top-level translation
    pub fn new(global: Arc<Translation>) -> Self {
        Self {
            nodes: vec![Node::new(NodeData::Fragment(FragmentData::default()))],
            body: NodeId(0),
            global,
            header: None,
        }
    }

    /// The body fragment holding the top-level nodes
    pub fn body(&self) -> NodeId {
        self.body
    }

    /// The translation in force at the top level
    pub fn global_translation(&self) -> &Arc<Translation> {
        &self.global
    }

    /// Replace the top-level translation
    pub fn set_global_translation(&mut self, global: Arc<Translation>) {
        self.global = global;
    }

    /// The document header, if any
    pub fn header(&self) -> Option<&Header> {
        self.header.as_ref()
    }

    /// Set or clear the document header
    pub fn set_header(&mut self, header: Option<Header>) {
        self.header = header;
    }

    /// Number of nodes in the arena, detached ones included
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    fn push(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node::new(data));
        id
    }

    // ---- creation ----

    /// Create a detached, fully loaded container.
    ///
    /// `association` is expected to declare a container.
    pub fn new_container(&mut self, association: Arc<Association>) -> NodeId {
        self.push(NodeData::Container(ContainerData {
            association,
            attributes: Vec::new(),
            children: Vec::new(),
            load_state: LoadState::Full,
            bookmark: None,
            compress_children: false,
        }))
    }

    /// Create a detached container identified by name only
    pub fn new_inline_container(&mut self, name: &str) -> NodeId {
        self.new_container(Arc::new(Association::inline(name, NodeKind::Container)))
    }

    /// Create a detached element-position primitive
    pub fn new_primitive(&mut self, association: Arc<Association>, value: Value) -> Result<NodeId> {
        self.new_valued(association, value, false)
    }

    /// Create a detached attribute-position primitive
    pub fn new_attribute(&mut self, association: Arc<Association>, value: Value) -> Result<NodeId> {
        self.new_valued(association, value, true)
    }

    /// Create a detached string primitive identified by name only
    pub fn new_untyped(&mut self, name: &str, text: impl Into<String>, is_attribute: bool) -> NodeId {
        let association = Arc::new(Association::inline(
            name,
            NodeKind::Primitive(PrimitiveType::String),
        ));
        self.push(NodeData::Primitive(PrimitiveData {
            association,
            is_attribute,
            content: PrimitiveContent::Value(Value::String(text.into())),
        }))
    }

    fn new_valued(
        &mut self,
        association: Arc<Association>,
        value: Value,
        is_attribute: bool,
    ) -> Result<NodeId> {
        if !value.fits(&association) {
            return Err(FormatError::TypeMismatch {
                name: association.name().to_string(),
                expected: association.kind().to_string(),
                found: value.primitive_type().to_string(),
            }
            .into());
        }
        Ok(self.push(NodeData::Primitive(PrimitiveData {
            association,
            is_attribute,
            content: PrimitiveContent::Value(value),
        })))
    }

    /// Create a detached, empty fragment
    pub fn new_fragment(&mut self) -> NodeId {
        self.push(NodeData::Fragment(FragmentData::default()))
    }

    /// Create a detached compressed fragment with empty content
    pub fn new_compressed(&mut self, association: Arc<Association>) -> Result<NodeId> {
        if association.primitive_type() != Some(PrimitiveType::CompressedFragment) {
            return Err(FormatError::TypeMismatch {
                name: association.name().to_string(),
                expected: association.kind().to_string(),
                found: PrimitiveType::CompressedFragment.to_string(),
            }
            .into());
        }
        let content = self.new_fragment();
        let id = self.push(NodeData::Primitive(PrimitiveData {
            association,
            is_attribute: false,
            content: PrimitiveContent::Compressed(CompressedFragment::new(content)),
        }));
        self.node_mut(content).parent = Some(id);
        Ok(id)
    }

    /// Create a detached `DML:Compressed` fragment holding `nodes`
    pub fn wrap_compressed(&mut self, nodes: Vec<NodeId>) -> Result<NodeId> {
        let wrapper = self.new_compressed(builtin_association(ids::COMPRESSED)?)?;
        for node in nodes {
            self.append_child(wrapper, node)?;
        }
        Ok(wrapper)
    }

    // ---- structure queries ----

    /// Structural parent
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    /// Element children of a fragment or container
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).children()
    }

    /// Attributes of a container
    pub fn attributes(&self, id: NodeId) -> &[NodeId] {
        match &self.node(id).data {
            NodeData::Container(c) => &c.attributes,
            _ => &[],
        }
    }

    /// Position of a node in its parent's attribute or child list
    pub fn index_in_parent(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        let list = if self.is_attribute(id) {
            self.attributes(parent)
        } else {
            self.children(parent)
        };
        list.iter().position(|n| *n == id)
    }

    /// Association bound to a node; fragments have none
    pub fn association(&self, id: NodeId) -> Option<&Arc<Association>> {
        self.node(id).association()
    }

    /// External name of a node
    pub fn name(&self, id: NodeId) -> &str {
        self.association(id)
            .map(|a| a.name())
            .unwrap_or(FRAGMENT_NAME)
    }

    /// Concrete kind of a node; fragments have none
    pub fn kind(&self, id: NodeId) -> Option<NodeKind> {
        match &self.node(id).data {
            NodeData::Fragment(_) => None,
            NodeData::Container(_) => Some(NodeKind::Container),
            NodeData::Primitive(p) => Some(NodeKind::Primitive(match &p.content {
                PrimitiveContent::Value(v) => v.primitive_type(),
                PrimitiveContent::Compressed(_) => PrimitiveType::CompressedFragment,
            })),
        }
    }

    /// Check if a node is a fragment
    pub fn is_fragment(&self, id: NodeId) -> bool {
        matches!(self.node(id).data, NodeData::Fragment(_))
    }

    /// Check if a node is a container
    pub fn is_container(&self, id: NodeId) -> bool {
        matches!(self.node(id).data, NodeData::Container(_))
    }

    /// Check if a node is a primitive
    pub fn is_primitive(&self, id: NodeId) -> bool {
        matches!(self.node(id).data, NodeData::Primitive(_))
    }

    /// Check if a node is an attribute-position primitive
    pub fn is_attribute(&self, id: NodeId) -> bool {
        self.node(id).is_attribute()
    }

    /// Value of a valued primitive
    pub fn value(&self, id: NodeId) -> Option<&Value> {
        match &self.node(id).data {
            NodeData::Primitive(PrimitiveData {
                content: PrimitiveContent::Value(v),
                ..
            }) => Some(v),
            _ => None,
        }
    }

    /// The compressed fragment held by a node
    pub fn compressed(&self, id: NodeId) -> Option<&CompressedFragment> {
        self.node(id).compressed()
    }

    /// Content fragment of a compressed node
    pub fn compressed_content(&self, id: NodeId) -> Option<NodeId> {
        self.compressed(id).map(|c| c.content())
    }

    /// First top-level container, skipping comments and other primitives
    pub fn root_container(&self) -> Option<NodeId> {
        self.top_level_containers().into_iter().next()
    }

    /// All top-level containers
    pub fn top_level_containers(&self) -> Vec<NodeId> {
        let (children, _) = self.logical_children(self.body);
        children
            .into_iter()
            .filter(|c| self.is_container(*c))
            .collect()
    }

    /// Children with compressed wrappers flattened.
    ///
    /// Returns the logical children of a fragment, container or compressed
    /// node, and whether any compressed wrapper was crossed on the way.
    pub fn logical_children(&self, id: NodeId) -> (Vec<NodeId>, bool) {
        let mut out = Vec::new();
        let mut saw_compression = false;
        let start = self.compressed_content(id).unwrap_or(id);
        if start != id {
            saw_compression = true;
        }
        self.collect_logical(start, &mut out, &mut saw_compression);
        (out, saw_compression)
    }

    fn collect_logical(&self, id: NodeId, out: &mut Vec<NodeId>, saw: &mut bool) {
        for &child in self.children(id) {
            match self.compressed_content(child) {
                Some(content) => {
                    *saw = true;
                    self.collect_logical(content, out, saw);
                }
                None => out.push(child),
            }
        }
    }

    /// First logical child with the given name
    pub fn child_named(&self, id: NodeId, name: &str) -> Option<NodeId> {
        self.logical_children(id)
            .0
            .into_iter()
            .find(|c| names_equal(self.name(*c), name))
    }

    /// Whether any ancestor of the node is a compressed fragment.
    ///
    /// A pure walk up the parent chain; no content is decoded.
    pub fn is_compressed(&self, id: NodeId) -> bool {
        let mut current = self.parent(id);
        while let Some(node) = current {
            if self.compressed(node).is_some() {
                return true;
            }
            current = self.parent(node);
        }
        false
    }

    /// The scope in force inside a node: the global translation plus the
    /// local translations of the node and its container ancestors
    pub fn scope_of(&self, id: NodeId) -> Scope {
        let mut locals = Vec::new();
        let mut current = Some(id);
        while let Some(node) = current {
            if let Some(local) = self.association(node).and_then(|a| a.local_translation()) {
                locals.push(Arc::clone(local));
            }
            current = self.parent(node);
        }

        let mut scope = Scope::new(Arc::clone(&self.global));
        for local in locals.into_iter().rev() {
            scope.push(local);
        }
        scope
    }

    /// The node, its attributes and all descendants in document order,
    /// descending into compressed content
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(node) = stack.pop() {
            out.push(node);
            let mut next: Vec<NodeId> = self.attributes(node).to_vec();
            next.extend_from_slice(self.children(node));
            if let Some(content) = self.compressed_content(node) {
                next.push(content);
            }
            stack.extend(next.into_iter().rev());
        }
        out
    }

    // ---- attributes ----

    /// Attribute with the given name (case-insensitive)
    pub fn attribute(&self, id: NodeId, name: &str) -> Option<NodeId> {
        self.attributes(id)
            .iter()
            .copied()
            .find(|a| names_equal(self.name(*a), name))
    }

    /// Value of the named attribute
    pub fn attribute_value(&self, id: NodeId, name: &str) -> Option<&Value> {
        self.attribute(id, name).and_then(|a| self.value(a))
    }

    /// Text of the named string attribute
    pub fn attribute_str(&self, id: NodeId, name: &str) -> Option<&str> {
        self.attribute_value(id, name).and_then(|v| v.as_str())
    }

    /// The named attribute as an unsigned integer, or `default` if absent
    /// or not numeric
    pub fn attribute_u64_or(&self, id: NodeId, name: &str, default: u64) -> u64 {
        self.attribute_value(id, name)
            .and_then(|v| v.as_u64())
            .unwrap_or(default)
    }

    /// The named attribute as text, or `default` if absent
    pub fn attribute_str_or<'a>(&'a self, id: NodeId, name: &str, default: &'a str) -> &'a str {
        self.attribute_str(id, name).unwrap_or(default)
    }

    /// Set an attribute, replacing any attribute of the same name in place
    pub fn set_attribute(
        &mut self,
        id: NodeId,
        association: Arc<Association>,
        value: Value,
    ) -> Result<NodeId> {
        let name = association.name().to_string();
        let attribute = self.new_attribute(association, value)?;
        match self.attribute(id, &name) {
            Some(existing) => self.replace_node(existing, attribute)?,
            None => self.append_child(id, attribute)?,
        }
        Ok(attribute)
    }

    // ---- mutation ----

    /// Append a detached node.
    ///
    /// Attribute primitives go to the container's attribute list, anything
    /// else to its children. Appending to a compressed node appends to its
    /// content.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.insert_at(parent, None, child)
    }

    /// Insert a detached node at `index` in the matching list
    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) -> Result<()> {
        self.insert_at(parent, Some(index), child)
    }

    fn insert_at(&mut self, parent: NodeId, index: Option<usize>, child: NodeId) -> Result<()> {
        let target = self.compressed_content(parent).unwrap_or(parent);
        self.check_attachable(target, child)?;

        let is_attribute = self.is_attribute(child);
        let list = match (&mut self.node_mut(target).data, is_attribute) {
            (NodeData::Container(c), true) => &mut c.attributes,
            (NodeData::Container(c), false) => &mut c.children,
            (NodeData::Fragment(f), false) => &mut f.children,
            _ => {
                let what = if is_attribute { "an attribute" } else { "a child" };
                return Err(Error::Value(format!(
                    "'{}' cannot take {}",
                    self.name(target),
                    what
                )));
            }
        };
        let at = index.unwrap_or(list.len()).min(list.len());
        list.insert(at, child);

        self.node_mut(child).parent = Some(target);
        self.touch(target);
        Ok(())
    }

    fn check_attachable(&self, target: NodeId, child: NodeId) -> Result<()> {
        if child == self.body || self.is_fragment(child) {
            return Err(Error::Value("a fragment cannot be a child".to_string()));
        }
        if let Some(parent) = self.parent(child) {
            return Err(Error::Value(format!(
                "'{}' is already a child of '{}'",
                self.name(child),
                self.name(parent)
            )));
        }
        let mut current = Some(target);
        while let Some(node) = current {
            if node == child {
                return Err(Error::Value(format!(
                    "'{}' cannot be added below itself",
                    self.name(child)
                )));
            }
            current = self.parent(node);
        }
        Ok(())
    }

    /// Remove a node from its parent; the node stays in the arena
    pub fn detach(&mut self, id: NodeId) -> Result<()> {
        let parent = self.parent(id).ok_or_else(|| {
            Error::Value(format!("'{}' has no parent", self.name(id)))
        })?;
        let is_attribute = self.is_attribute(id);
        match &mut self.node_mut(parent).data {
            NodeData::Container(c) if is_attribute => c.attributes.retain(|n| *n != id),
            NodeData::Container(c) => c.children.retain(|n| *n != id),
            NodeData::Fragment(f) => f.children.retain(|n| *n != id),
            NodeData::Primitive(_) => {
                return Err(Error::Value("compressed content cannot be detached".to_string()))
            }
        }
        self.node_mut(id).parent = None;
        self.touch(parent);
        Ok(())
    }

    /// Remove `child` from `parent`
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        let target = self.compressed_content(parent).unwrap_or(parent);
        if self.parent(child) != Some(target) {
            return Err(Error::Value(format!(
                "'{}' is not a child of '{}'",
                self.name(child),
                self.name(parent)
            )));
        }
        self.detach(child)
    }

    /// Put a detached node at the position of an attached one
    pub fn replace_node(&mut self, old: NodeId, new: NodeId) -> Result<()> {
        if self.is_attribute(old) != self.is_attribute(new) {
            return Err(Error::Value(format!(
                "cannot replace '{}' with '{}' of a different position",
                self.name(old),
                self.name(new)
            )));
        }
        let parent = self.parent(old).ok_or_else(|| {
            Error::Value(format!("'{}' has no parent", self.name(old)))
        })?;
        let index = self.index_in_parent(old).unwrap_or(0);
        self.check_attachable(parent, new)?;
        self.detach(old)?;
        self.insert_at(parent, Some(index), new)
    }

    /// Replace the value of a primitive
    pub fn set_value(&mut self, id: NodeId, value: Value) -> Result<()> {
        let node = self.node_mut(id);
        match &mut node.data {
            NodeData::Primitive(PrimitiveData {
                association,
                content: PrimitiveContent::Value(current),
                ..
            }) => {
                if !value.fits(association) {
                    return Err(FormatError::TypeMismatch {
                        name: association.name().to_string(),
                        expected: association.kind().to_string(),
                        found: value.primitive_type().to_string(),
                    }
                    .into());
                }
                *current = value;
            }
            _ => {
                return Err(Error::Value(format!(
                    "'{}' does not hold a value",
                    self.name(id)
                )))
            }
        }
        self.touch(id);
        Ok(())
    }

    /// Assign a new content fragment to a compressed node.
    ///
    /// Always invalidates the encode cache, even if the new content encodes
    /// to the same bytes. The previous content is detached.
    pub fn set_compressed_content(&mut self, id: NodeId, fragment: NodeId) -> Result<()> {
        if !self.is_fragment(fragment) || fragment == self.body {
            return Err(Error::Value("compressed content must be a fragment".to_string()));
        }
        if self.parent(fragment).is_some() {
            return Err(Error::Value("fragment is already attached".to_string()));
        }
        let mut current = Some(id);
        while let Some(node) = current {
            if node == fragment {
                return Err(Error::Value(format!(
                    "'{}' cannot compress a fragment that contains it",
                    self.name(id)
                )));
            }
            current = self.parent(node);
        }
        let previous = match &mut self.node_mut(id).data {
            NodeData::Primitive(PrimitiveData {
                content: PrimitiveContent::Compressed(c),
                ..
            }) => {
                let previous = c.content();
                c.set_content(fragment);
                previous
            }
            _ => {
                return Err(Error::Value(format!(
                    "'{}' is not a compressed fragment",
                    self.name(id)
                )))
            }
        };
        self.node_mut(previous).parent = None;
        self.node_mut(fragment).parent = Some(id);
        if let Some(parent) = self.parent(id) {
            self.touch(parent);
        }
        Ok(())
    }

    /// Invalidate the encode cache of every compressed node at or above `id`
    fn touch(&mut self, id: NodeId) {
        let mut current = Some(id);
        while let Some(node) = current {
            if let NodeData::Primitive(PrimitiveData {
                content: PrimitiveContent::Compressed(c),
                ..
            }) = &mut self.node_mut(node).data
            {
                c.invalidate();
            }
            current = self.parent(node);
        }
    }

    pub(crate) fn compressed_mut(&mut self, id: NodeId) -> Option<&mut CompressedFragment> {
        match &mut self.node_mut(id).data {
            NodeData::Primitive(PrimitiveData {
                content: PrimitiveContent::Compressed(c),
                ..
            }) => Some(c),
            _ => None,
        }
    }

    // ---- roles and compression policy ----

    /// Compression policy of a container
    pub fn compress_children(&self, id: NodeId) -> bool {
        matches!(&self.node(id).data, NodeData::Container(c) if c.compress_children)
    }

    /// Set the compression policy used when children are replaced by role
    pub fn set_compress_children(&mut self, id: NodeId, compress: bool) -> Result<()> {
        match &mut self.node_mut(id).data {
            NodeData::Container(c) => {
                c.compress_children = compress;
                Ok(())
            }
            _ => Err(Error::Value(format!("'{}' is not a container", self.name(id)))),
        }
    }

    /// Replace the children playing a role.
    ///
    /// Removes every child named `role` of the given kind, also inside
    /// compressed wrappers (a wrapper left empty is removed too), then
    /// appends `nodes`. The new nodes are wrapped in a compressed fragment
    /// when the container's compression policy is set and the container is
    /// not already below a compressed ancestor.
    pub fn replace_children_by_role(
        &mut self,
        container: NodeId,
        role: &str,
        kind: NodeKind,
        nodes: Vec<NodeId>,
    ) -> Result<()> {
        self.remove_role(container, role, kind)?;
        if nodes.is_empty() {
            return Ok(());
        }

        if self.compress_children(container) && !self.is_compressed(container) {
            let wrapper = self.wrap_compressed(nodes)?;
            self.append_child(container, wrapper)
        } else {
            for node in nodes {
                self.append_child(container, node)?;
            }
            Ok(())
        }
    }

    fn remove_role(&mut self, parent: NodeId, role: &str, kind: NodeKind) -> Result<()> {
        for child in self.children(parent).to_vec() {
            if let Some(content) = self.compressed_content(child) {
                self.remove_role(content, role, kind)?;
                if self.children(content).is_empty() {
                    self.detach(child)?;
                }
            } else if self.kind(child) == Some(kind) && names_equal(self.name(child), role) {
                self.detach(child)?;
            }
        }
        Ok(())
    }

    // ---- load state ----

    /// How much of a node's subtree is materialized
    pub fn load_state(&self, id: NodeId) -> LoadState {
        match &self.node(id).data {
            NodeData::Fragment(f) => f.load_state,
            NodeData::Container(c) => c.load_state,
            NodeData::Primitive(_) => LoadState::Full,
        }
    }

    pub(crate) fn set_load_state(&mut self, id: NodeId, state: LoadState) {
        match &mut self.node_mut(id).data {
            NodeData::Fragment(f) => f.load_state = state,
            NodeData::Container(c) => c.load_state = state,
            NodeData::Primitive(_) => {}
        }
    }

    /// Stream position of a partially loaded container's children
    pub fn bookmark(&self, id: NodeId) -> Option<Bookmark> {
        match &self.node(id).data {
            NodeData::Container(c) => c.bookmark,
            _ => None,
        }
    }

    pub(crate) fn set_bookmark(&mut self, id: NodeId, bookmark: Option<Bookmark>) {
        if let NodeData::Container(c) = &mut self.node_mut(id).data {
            c.bookmark = bookmark;
        }
    }

    // ---- snapshots ----

    /// Owned structural copy of a subtree
    pub fn snapshot(&self, id: NodeId) -> NodeSnapshot {
        let snap_all = |ids: &[NodeId]| -> Vec<NodeSnapshot> {
            ids.iter().map(|n| self.snapshot(*n)).collect()
        };
        match &self.node(id).data {
            NodeData::Fragment(f) => NodeSnapshot::Fragment {
                children: snap_all(&f.children),
            },
            NodeData::Container(c) => NodeSnapshot::Container {
                id: c.association.id(),
                name: c.association.name().to_string(),
                attributes: snap_all(&c.attributes),
                children: snap_all(&c.children),
            },
            NodeData::Primitive(p) => match &p.content {
                PrimitiveContent::Value(value) => NodeSnapshot::Primitive {
                    id: p.association.id(),
                    name: p.association.name().to_string(),
                    attribute: p.is_attribute,
                    value: value.clone(),
                },
                PrimitiveContent::Compressed(c) => NodeSnapshot::Compressed {
                    id: p.association.id(),
                    name: p.association.name().to_string(),
                    content: snap_all(self.children(c.content())),
                },
            },
        }
    }
}

/// A built-in association of the base translation
pub(crate) fn builtin_association(id: u32) -> Result<Arc<Association>> {
    builtin::base()
        .get(id)
        .cloned()
        .ok_or_else(|| Error::Value(format!("no built-in association with id {:#x}", id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ElementType;

    fn translation() -> Arc<Translation> {
        let mut t = Translation::new();
        t.include(&builtin::base()).unwrap();
        t.add(Association::container(1, "Image")).unwrap();
        t.add(Association::primitive(2, "Width", PrimitiveType::UInt))
            .unwrap();
        t.add(Association::array(3, "Data", PrimitiveType::Array, ElementType::UInt8))
            .unwrap();
        Arc::new(t)
    }

    fn assoc(doc: &Document, id: u32) -> Arc<Association> {
        Arc::clone(doc.global_translation().get(id).unwrap())
    }

    fn image_doc() -> (Document, NodeId) {
        let mut doc = Document::new(translation());
        let image = doc.new_container(assoc(&doc, 1));
        let body = doc.body();
        doc.append_child(body, image).unwrap();
        (doc, image)
    }

    fn data(doc: &mut Document, bytes: Vec<u8>) -> NodeId {
        let a = assoc(doc, 3);
        doc.new_primitive(a, Value::Array(crate::dom::ArrayValue::UInt8(bytes)))
            .unwrap()
    }

    #[test]
    fn test_attributes_and_children_are_separate() {
        let (mut doc, image) = image_doc();
        let width = assoc(&doc, 2);
        doc.set_attribute(image, width, Value::UInt(640)).unwrap();
        let d = data(&mut doc, vec![1, 2]);
        doc.append_child(image, d).unwrap();

        assert_eq!(doc.attributes(image).len(), 1);
        assert_eq!(doc.children(image), &[d]);
        assert_eq!(doc.attribute_u64_or(image, "width", 0), 640);
        assert_eq!(doc.attribute_u64_or(image, "Height", 7), 7);
    }

    #[test]
    fn test_set_attribute_replaces_in_place() {
        let (mut doc, image) = image_doc();
        let width = assoc(&doc, 2);
        doc.set_attribute(image, Arc::clone(&width), Value::UInt(1)).unwrap();
        doc.set_attribute(image, width, Value::UInt(2)).unwrap();
        assert_eq!(doc.attributes(image).len(), 1);
        assert_eq!(doc.attribute_u64_or(image, "Width", 0), 2);
    }

    #[test]
    fn test_type_mismatch_rejected() {
        let mut doc = Document::new(translation());
        let width = assoc(&doc, 2);
        let err = doc.new_primitive(width, Value::String("wide".into())).unwrap_err();
        assert!(matches!(err, Error::Format(FormatError::TypeMismatch { .. })));
    }

    #[test]
    fn test_append_rejects_attached_and_cycles() {
        let (mut doc, image) = image_doc();
        let inner = doc.new_container(assoc(&doc, 1));
        doc.append_child(image, inner).unwrap();

        assert!(doc.append_child(image, inner).is_err());
        doc.detach(image).unwrap();
        assert!(doc.append_child(inner, image).is_err());
    }

    #[test]
    fn test_is_compressed_walks_ancestors() {
        let (mut doc, image) = image_doc();
        let d = data(&mut doc, vec![1]);
        let wrapper = doc.wrap_compressed(vec![d]).unwrap();
        doc.append_child(image, wrapper).unwrap();

        assert!(doc.is_compressed(d));
        assert!(!doc.is_compressed(wrapper));
        assert!(!doc.is_compressed(image));
    }

    #[test]
    fn test_logical_children_flatten_compression() {
        let (mut doc, image) = image_doc();
        let a = data(&mut doc, vec![1]);
        let b = data(&mut doc, vec![2]);
        doc.append_child(image, a).unwrap();
        let wrapper = doc.wrap_compressed(vec![b]).unwrap();
        doc.append_child(image, wrapper).unwrap();

        let (children, saw) = doc.logical_children(image);
        assert_eq!(children, vec![a, b]);
        assert!(saw);
        assert_eq!(doc.logical_children(doc.body()), (vec![image], false));
    }

    #[test]
    fn test_mutation_invalidates_compressed_ancestors() {
        let (mut doc, image) = image_doc();
        let d = data(&mut doc, vec![1]);
        let wrapper = doc.wrap_compressed(vec![d]).unwrap();
        doc.append_child(image, wrapper).unwrap();

        doc.compressed(wrapper)
            .unwrap()
            .encoded_with(|| Ok(vec![0]))
            .unwrap();
        assert!(doc.compressed(wrapper).unwrap().is_cached());

        doc.set_value(d, Value::Array(crate::dom::ArrayValue::UInt8(vec![9])))
            .unwrap();
        assert!(!doc.compressed(wrapper).unwrap().is_cached());
    }

    #[test]
    fn test_reassigning_content_bumps_generation() {
        let mut doc = Document::new(translation());
        let wrapper = doc.wrap_compressed(Vec::new()).unwrap();
        let before = doc.compressed(wrapper).unwrap().generation();

        let fresh = doc.new_fragment();
        doc.set_compressed_content(wrapper, fresh).unwrap();
        assert!(doc.compressed(wrapper).unwrap().generation() > before);
        assert_eq!(doc.compressed_content(wrapper), Some(fresh));
    }

    #[test]
    fn test_content_cannot_contain_its_wrapper() {
        let mut doc = Document::new(translation());
        let fragment = doc.new_fragment();
        let wrapper = doc.wrap_compressed(Vec::new()).unwrap();
        doc.append_child(fragment, wrapper).unwrap();
        let before = doc.compressed_content(wrapper);

        assert!(matches!(
            doc.set_compressed_content(wrapper, fragment),
            Err(Error::Value(_))
        ));
        assert_eq!(doc.compressed_content(wrapper), before);
        assert_eq!(doc.parent(wrapper), Some(fragment));
        assert!(!doc.is_compressed(wrapper));
    }

    #[test]
    fn test_replace_by_role_removes_through_wrappers() {
        let (mut doc, image) = image_doc();
        let old = data(&mut doc, vec![1]);
        let wrapper = doc.wrap_compressed(vec![old]).unwrap();
        doc.append_child(image, wrapper).unwrap();

        let new = data(&mut doc, vec![2]);
        doc.replace_children_by_role(
            image,
            "Data",
            NodeKind::Primitive(PrimitiveType::Array),
            vec![new],
        )
        .unwrap();

        assert_eq!(doc.children(image), &[new]);
        assert_eq!(doc.parent(wrapper), None);
    }

    #[test]
    fn test_replace_by_role_applies_compression_policy() {
        let (mut doc, image) = image_doc();
        doc.set_compress_children(image, true).unwrap();
        let new = data(&mut doc, vec![2]);
        doc.replace_children_by_role(
            image,
            "Data",
            NodeKind::Primitive(PrimitiveType::Array),
            vec![new],
        )
        .unwrap();

        let wrapper = doc.children(image)[0];
        assert!(doc.compressed(wrapper).is_some());
        assert!(doc.is_compressed(new));
    }

    #[test]
    fn test_scope_of_includes_local_translations() {
        let mut local = Translation::new();
        local
            .add(Association::primitive(1, "Format", PrimitiveType::String))
            .unwrap();
        let mut global = Translation::new();
        global
            .add(Association::container(10, "Image").with_local_translation(Arc::new(local)))
            .unwrap();
        let mut doc = Document::new(Arc::new(global));
        let image = doc.new_container(Arc::clone(doc.global_translation().get(10).unwrap()));
        let body = doc.body();
        doc.append_child(body, image).unwrap();

        assert!(doc.scope_of(image).get_association("Format").is_some());
        assert!(doc.scope_of(body).get_association("Format").is_none());
    }

    #[test]
    fn test_snapshot_ignores_compression_bookkeeping() {
        let (mut doc, image) = image_doc();
        let d = data(&mut doc, vec![1, 2, 3]);
        doc.append_child(image, d).unwrap();
        let snap = doc.snapshot(image);
        assert_eq!(snap.name(), Some("Image"));
        assert_eq!(snap.children().len(), 1);
    }
}

//! Folding of imported text into typed primitives
//!
//! Two passes run over the `#text` nodes an import produced. Adjacent text
//! siblings are first concatenated into one node. Then every text node that
//! is the only child of an attribute-less container replaces that container
//! with a primitive of the container's name, typed when the name resolves
//! in the enclosing scope and the text parses as the declared type. The
//! document root is never replaced, so it stays a container.

use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, trace};

use super::TEXT_NODE_NAME;
use crate::dom::{Document, NodeId, Value};
use crate::error::Result;
use crate::schema::Scope;

/// What an optimization run changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OptimizeStats {
    /// Text nodes folded into a preceding text sibling
    pub merged: usize,
    /// Containers replaced by primitives
    pub promoted: usize,
}

impl OptimizeStats {
    /// Check whether the run left the document untouched
    pub fn is_noop(&self) -> bool {
        self.merged == 0 && self.promoted == 0
    }
}

/// Fold every `#text` node of a document. Running it twice changes nothing
/// the second time.
pub fn optimize(doc: &mut Document) -> Result<OptimizeStats> {
    let view: &Document = doc;
    let text_nodes: Vec<NodeId> = view
        .descendants(view.body())
        .into_iter()
        .filter(|&id| is_text_node(view, id))
        .collect();
    optimize_tracked(doc, &text_nodes)
}

/// Fold the given text nodes, in document order
pub(crate) fn optimize_tracked(doc: &mut Document, text_nodes: &[NodeId]) -> Result<OptimizeStats> {
    let mut stats = OptimizeStats::default();
    let mut live: HashSet<NodeId> = text_nodes.iter().copied().collect();

    for &node in text_nodes {
        if !live.contains(&node) {
            continue;
        }
        stats.merged += merge_following(doc, node, &mut live)?;
    }

    for &node in text_nodes {
        if live.contains(&node) && promote(doc, node)? {
            stats.promoted += 1;
        }
    }

    if !stats.is_noop() {
        debug!(
            merged = stats.merged,
            promoted = stats.promoted,
            "folded imported text"
        );
    }
    Ok(stats)
}

/// Build a primitive for `text`, typed if `name` resolves to a primitive
/// association whose type accepts the text, otherwise an untyped string
pub(super) fn typed_or_untyped(
    doc: &mut Document,
    scope: &Scope,
    name: &str,
    text: &str,
    is_attribute: bool,
) -> Result<NodeId> {
    let typed = scope
        .get_association(name)
        .filter(|a| !a.is_container())
        .and_then(|a| {
            let value = Value::parse(a.primitive_type()?, text)?;
            value.fits(a).then(|| (Arc::clone(a), value))
        });

    match typed {
        Some((association, value)) if is_attribute => doc.new_attribute(association, value),
        Some((association, value)) => doc.new_primitive(association, value),
        None => {
            trace!(name, "no typed match, keeping text untyped");
            Ok(doc.new_untyped(name, text, is_attribute))
        }
    }
}

fn is_text_node(doc: &Document, id: NodeId) -> bool {
    !doc.is_attribute(id)
        && doc
            .association(id)
            .map_or(false, |a| a.is_inline() && a.name() == TEXT_NODE_NAME)
        && matches!(doc.value(id), Some(Value::String(_)))
}

fn text_of(doc: &Document, id: NodeId) -> String {
    doc.value(id)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Absorb the run of live text siblings following `node`
fn merge_following(doc: &mut Document, node: NodeId, live: &mut HashSet<NodeId>) -> Result<usize> {
    let Some(parent) = doc.parent(node) else {
        return Ok(0);
    };
    let mut merged = 0;
    while let Some(index) = doc.index_in_parent(node) {
        let next = match doc.children(parent).get(index + 1) {
            Some(&next) if live.contains(&next) => next,
            _ => break,
        };
        let mut text = text_of(doc, node);
        text.push_str(&text_of(doc, next));
        doc.set_value(node, Value::String(text))?;
        doc.remove_child(parent, next)?;
        live.remove(&next);
        merged += 1;
    }
    Ok(merged)
}

fn promote(doc: &mut Document, text: NodeId) -> Result<bool> {
    let Some(parent) = doc.parent(text) else {
        return Ok(false);
    };
    if !doc.is_container(parent)
        || doc.children(parent).len() != 1
        || !doc.attributes(parent).is_empty()
    {
        return Ok(false);
    }
    let Some(grandparent) = doc.parent(parent) else {
        return Ok(false);
    };
    if grandparent == doc.body() {
        return Ok(false);
    }

    let name = doc.name(parent).to_string();
    let content = text_of(doc, text);
    let scope = doc.scope_of(grandparent);
    let primitive = typed_or_untyped(doc, &scope, &name, &content, false)?;
    doc.replace_node(parent, primitive)?;
    trace!(name = name.as_str(), "promoted text container");
    Ok(true)
}

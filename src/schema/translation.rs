//! Translations: ordered, composable scopes of associations

use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::Arc;

use super::association::Association;
use super::primitive_sets::{merge_into, PrimitiveSet};
use crate::error::{Result, SchemaError};
use crate::names::lookup_key;

/// Outcome of looking a name up in a single translation
#[derive(Debug, Clone, Copy)]
pub enum NameMatch<'a> {
    /// No association has this name
    None,
    /// Exactly one association has this name
    One(&'a Arc<Association>),
    /// Several associations share this name
    Ambiguous,
}

/// A scope of associations
///
/// Entries keep declaration order, which is the order re-serialization and
/// code generation use. Ids are unique within one translation; names need
/// not be, since DML allows several associations to share a name as long as
/// their types differ.
#[derive(Debug, Clone, Default)]
pub struct Translation {
    uri: Option<String>,
    entries: IndexMap<u32, Arc<Association>>,
    by_name: HashMap<String, Vec<u32>>,
    required: Vec<PrimitiveSet>,
}

impl Translation {
    /// Create an empty translation
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty translation identified by a URI
    pub fn with_uri(uri: impl Into<String>) -> Self {
        Self {
            uri: Some(uri.into()),
            ..Self::default()
        }
    }

    /// URI identifying this translation, if any
    pub fn uri(&self) -> Option<&str> {
        self.uri.as_deref()
    }

    /// Add an association.
    ///
    /// Re-adding an identical declaration is tolerated; a different
    /// association with an id already in scope is a schema error.
    pub fn add(&mut self, association: impl Into<Arc<Association>>) -> Result<()> {
        let association = association.into();
        if association.is_inline() {
            return Err(SchemaError::Malformed(format!(
                "'{}' uses the reserved id 0",
                association.name()
            ))
            .into());
        }

        if let Some(existing) = self.entries.get(&association.id()) {
            if existing.same_declaration(&association) {
                return Ok(());
            }
            return Err(SchemaError::DuplicateId {
                id: association.id(),
                existing: existing.name().to_string(),
                name: association.name().to_string(),
            }
            .into());
        }

        self.by_name
            .entry(lookup_key(association.name()))
            .or_default()
            .push(association.id());
        self.entries.insert(association.id(), association);
        Ok(())
    }

    /// Add every association and requirement of another translation
    pub fn include(&mut self, other: &Translation) -> Result<()> {
        for association in other.entries.values() {
            self.add(Arc::clone(association))?;
        }
        for set in &other.required {
            self.require(set.clone());
        }
        Ok(())
    }

    /// Declare a primitive-set requirement (duplicates are dropped)
    pub fn require(&mut self, set: PrimitiveSet) {
        merge_into(&mut self.required, set);
    }

    /// Required primitive sets, in order of first appearance
    pub fn required_sets(&self) -> &[PrimitiveSet] {
        &self.required
    }

    /// Look up an association by id
    pub fn get(&self, id: u32) -> Option<&Arc<Association>> {
        self.entries.get(&id)
    }

    /// Look up an association by name (case-insensitive) in this scope only
    pub fn lookup(&self, name: &str) -> NameMatch<'_> {
        match self.by_name.get(&lookup_key(name)).map(Vec::as_slice) {
            None | Some([]) => NameMatch::None,
            Some([id]) => self
                .entries
                .get(id)
                .map(NameMatch::One)
                .unwrap_or(NameMatch::None),
            Some(_) => NameMatch::Ambiguous,
        }
    }

    /// All associations sharing a name (case-insensitive)
    pub fn all_named(&self, name: &str) -> Vec<&Arc<Association>> {
        self.by_name
            .get(&lookup_key(name))
            .map(|ids| ids.iter().filter_map(|id| self.entries.get(id)).collect())
            .unwrap_or_default()
    }

    /// Associations in declaration order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Association>> {
        self.entries.values()
    }

    /// Number of associations
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the translation declares nothing
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

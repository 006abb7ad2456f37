//! Lookup scopes: the chain of translations in force at a point in a document
//!
//! The document's global translation sits at the bottom of the chain; each
//! enclosing container whose association carries a local translation pushes
//! one level. Upward search walks the chain from the innermost level out.

use std::sync::Arc;
use tracing::debug;

use super::association::Association;
use super::translation::{NameMatch, Translation};

/// Chain of translations, outermost first
#[derive(Debug, Clone)]
pub struct Scope {
    levels: Vec<Arc<Translation>>,
}

impl Scope {
    /// Create a scope holding only the global translation
    pub fn new(global: Arc<Translation>) -> Self {
        Self {
            levels: vec![global],
        }
    }

    /// Push a nested translation
    pub fn push(&mut self, translation: Arc<Translation>) {
        self.levels.push(translation);
    }

    /// Pop the innermost translation; the global level is never popped
    pub fn pop(&mut self) -> Option<Arc<Translation>> {
        if self.levels.len() > 1 {
            self.levels.pop()
        } else {
            None
        }
    }

    /// The scope in force inside a node of `association`
    pub fn enter(&self, association: &Association) -> Scope {
        let mut inner = self.clone();
        if let Some(local) = association.local_translation() {
            inner.push(Arc::clone(local));
        }
        inner
    }

    /// The innermost translation
    pub fn innermost(&self) -> &Arc<Translation> {
        // `levels` always holds the global translation
        &self.levels[self.levels.len() - 1]
    }

    /// Number of levels, including the global one
    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    /// Resolve a name to an association.
    ///
    /// Each level is searched on its own, innermost first. No match climbs
    /// to the next level out; a single match wins; several matches in one
    /// level make the name ambiguous and resolution stops with `None`, so
    /// callers fall back to untyped handling instead of guessing.
    pub fn get_association(&self, name: &str) -> Option<&Arc<Association>> {
        for translation in self.levels.iter().rev() {
            match translation.lookup(name) {
                NameMatch::One(association) => return Some(association),
                NameMatch::Ambiguous => {
                    debug!(name, "ambiguous association name, no definitive match");
                    return None;
                }
                NameMatch::None => continue,
            }
        }
        None
    }

    /// Resolve an id to an association, innermost level first
    pub fn get_by_id(&self, id: u32) -> Option<&Arc<Association>> {
        self.levels.iter().rev().find_map(|t| t.get(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::types::PrimitiveType;

    fn global() -> Arc<Translation> {
        let mut t = Translation::new();
        t.add(Association::container(1, "Image")).unwrap();
        t.add(Association::primitive(2, "Width", PrimitiveType::UInt)).unwrap();
        t.add(Association::primitive(3, "Value", PrimitiveType::Int)).unwrap();
        Arc::new(t)
    }

    fn local() -> Arc<Translation> {
        let mut t = Translation::new();
        t.add(Association::primitive(20, "Width", PrimitiveType::Double)).unwrap();
        t.add(Association::primitive(21, "Value", PrimitiveType::Int)).unwrap();
        t.add(Association::primitive(22, "Value", PrimitiveType::String)).unwrap();
        Arc::new(t)
    }

    #[test]
    fn test_inner_scope_shadows_outer() {
        let mut scope = Scope::new(global());
        scope.push(local());

        assert_eq!(scope.get_association("width").map(|a| a.id()), Some(20));
        assert_eq!(scope.get_association("Image").map(|a| a.id()), Some(1));
    }

    #[test]
    fn test_ambiguity_does_not_climb() {
        let mut scope = Scope::new(global());
        scope.push(local());

        // The global scope has exactly one "Value", but the local level is
        // ambiguous and resolution stops there.
        assert!(scope.get_association("Value").is_none());
        scope.pop();
        assert_eq!(scope.get_association("Value").map(|a| a.id()), Some(3));
    }

    #[test]
    fn test_enter_pushes_local_translation() {
        let scope = Scope::new(global());
        let image = Association::container(1, "Image").with_local_translation(local());

        let inner = scope.enter(&image);
        assert_eq!(inner.depth(), 2);
        assert_eq!(inner.get_by_id(21).map(|a| a.name()), Some("Value"));
        assert_eq!(inner.get_by_id(1).map(|a| a.name()), Some("Image"));
        assert_eq!(scope.depth(), 1);
    }

    #[test]
    fn test_global_level_is_never_popped() {
        let mut scope = Scope::new(global());
        assert!(scope.pop().is_none());
        assert_eq!(scope.depth(), 1);
    }
}

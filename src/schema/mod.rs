//! Schema registry and translation resolution
//!
//! A document's vocabulary is defined by translations: ordered scopes of
//! [`Association`]s binding ids and names to node kinds. Translations compose
//! by inclusion, nest through container-local translations, and declare the
//! primitive sets a stream must support.

pub mod association;
pub mod builtin;
pub mod primitive_sets;
pub mod resolution;
pub mod resolver;
pub mod scope;
pub mod translation;
pub mod types;

pub use association::{Association, INLINE_ID};
pub use primitive_sets::PrimitiveSet;
pub use resolution::{FileResolver, MemoryResolver, NoResolver, ResourceResolution};
pub use resolver::{ResolvedTranslation, TranslationResolver};
pub use scope::Scope;
pub use translation::{NameMatch, Translation};
pub use types::{ElementType, NodeKind, PrimitiveType};

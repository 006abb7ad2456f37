//! Resource resolution: mapping include URIs to translations
//!
//! Resolving a translation include needs a caller-supplied capability that
//! maps a URI to an already known or loadable translation. The built-in URIs
//! never reach it; see [`super::builtin::lookup`].

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use super::resolver::TranslationResolver;
use super::translation::Translation;
use crate::codec::{self, ReadOptions};
use crate::error::{Result, ResultExt, SchemaError};
use crate::loaders::{Loader, ResourceFormat};
use crate::locations::Location;
use crate::xml::{self, ImportOptions};

/// Maps translation URIs to translations
pub trait ResourceResolution {
    /// Resolve a URI.
    ///
    /// `Ok(None)` means the URI is unknown to this resolver; the caller
    /// reports it as an unresolved include. Errors are reserved for
    /// resources that exist but cannot be loaded.
    fn resolve(&self, uri: &str) -> Result<Option<Arc<Translation>>>;
}

/// Resolver that knows no external translations
#[derive(Debug, Clone, Copy, Default)]
pub struct NoResolver;

impl ResourceResolution for NoResolver {
    fn resolve(&self, _uri: &str) -> Result<Option<Arc<Translation>>> {
        Ok(None)
    }
}

/// Resolver over translations registered in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryResolver {
    translations: HashMap<String, Arc<Translation>>,
}

impl MemoryResolver {
    /// Create an empty resolver
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a translation under a URI
    pub fn insert(&mut self, uri: impl Into<String>, translation: Arc<Translation>) {
        self.translations.insert(uri.into(), translation);
    }

    /// Register a translation under a URI (builder form)
    pub fn with(mut self, uri: impl Into<String>, translation: Translation) -> Self {
        self.insert(uri, Arc::new(translation));
        self
    }

    /// Register a translation under its own URI
    pub fn register(&mut self, translation: Arc<Translation>) -> Result<()> {
        let uri = translation
            .uri()
            .ok_or_else(|| SchemaError::Malformed("translation has no URI".to_string()))?
            .to_string();
        self.insert(uri, translation);
        Ok(())
    }
}

impl ResourceResolution for MemoryResolver {
    fn resolve(&self, uri: &str) -> Result<Option<Arc<Translation>>> {
        Ok(self.translations.get(uri).cloned())
    }
}

/// Resolver loading translation documents from the file system
///
/// Relative URIs resolve against the base directory. `.xml` files are read
/// as XML, anything else as binary DML. Loaded translations are cached, and
/// a translation that includes itself, directly or not, is reported as a
/// circular include.
#[derive(Debug)]
pub struct FileResolver {
    base_dir: Option<PathBuf>,
    loader: Loader,
    cache: RefCell<HashMap<String, Arc<Translation>>>,
    loading: RefCell<Vec<String>>,
}

impl FileResolver {
    /// Create a resolver rooted at `base_dir`
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: Some(base_dir.as_ref().to_path_buf()),
            loader: Loader::new(),
            cache: RefCell::new(HashMap::new()),
            loading: RefCell::new(Vec::new()),
        }
    }

    /// Create a resolver that only accepts absolute paths
    pub fn without_base() -> Self {
        Self {
            base_dir: None,
            loader: Loader::new(),
            cache: RefCell::new(HashMap::new()),
            loading: RefCell::new(Vec::new()),
        }
    }

    /// Set the loader
    pub fn with_loader(mut self, loader: Loader) -> Self {
        self.loader = loader;
        self
    }

    fn load(&self, location: &Location) -> Result<Arc<Translation>> {
        let resource = self.loader.load(location)?;
        let limits = self.loader.limits().clone();

        let document = match resource.format {
            ResourceFormat::Xml => {
                let options = ImportOptions::default().with_limits(limits.clone());
                xml::import_xml(&resource.bytes[..], self, &options)?
            }
            ResourceFormat::Binary => {
                let options = ReadOptions::default().with_limits(limits.clone());
                codec::read_document(&resource.bytes[..], self, &options)?
            }
        };

        let resolved = TranslationResolver::new(self)
            .with_limits(limits)
            .resolve_document(&document)?;
        Ok(resolved.translation)
    }
}

impl ResourceResolution for FileResolver {
    fn resolve(&self, uri: &str) -> Result<Option<Arc<Translation>>> {
        let location = Location::parse(uri, self.base_dir.as_deref());
        let key = location.as_str();

        if let Some(cached) = self.cache.borrow().get(&key) {
            return Ok(Some(Arc::clone(cached)));
        }

        match &location {
            Location::Path(path) if path.is_file() => {}
            _ => return Ok(None),
        }

        if self.loading.borrow().contains(&key) {
            return Err(SchemaError::CircularInclude(uri.to_string()).into());
        }
        self.loader
            .limits()
            .check_include_depth(self.loading.borrow().len() + 1)?;

        debug!(uri, path = %key, "loading translation");
        self.loading.borrow_mut().push(key.clone());
        let result = self.load(&location);
        self.loading.borrow_mut().pop();

        let translation = result.within(uri)?;
        self.cache
            .borrow_mut()
            .insert(key, Arc::clone(&translation));
        Ok(Some(translation))
    }
}

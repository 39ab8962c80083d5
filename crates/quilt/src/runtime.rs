//! In-process model of the generated loader
//!
//! Mirrors the resolution rules of the artifact preamble so they can be
//! exercised without a JavaScript engine: path expansion, the single
//! `index` fallback, memoized instances, circular requires observing a
//! partially populated exports table, and eviction of modules whose factory
//! fails.
//!
//! Instances live in a registry of shared handles keyed by path. A placeholder
//! with empty exports is registered before a factory runs, which is what lets
//! a cycle terminate. Evicting a path drops its handle.

use std::{cell::RefCell, fmt, rc::Rc};

use indexmap::IndexMap;
use log::trace;
use rustc_hash::FxHashMap;

/// Whether `name` is resolved against the requiring module's directory
pub fn is_relative(name: &str) -> bool {
    let rest = name
        .strip_prefix("..")
        .or_else(|| name.strip_prefix('.'));
    matches!(rest, Some(rest) if rest.is_empty() || rest.starts_with('/'))
}

/// Canonical module key for `name` requested from `root`
pub fn expand(root: &str, name: &str) -> String {
    let joined;
    let path = if is_relative(name) {
        joined = format!("{root}/{name}");
        joined.as_str()
    } else {
        name
    };

    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            ".." => {
                segments.pop();
            }
            "." | "" => {}
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// Every segment of `path` but the last
pub fn dirname(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').collect();
    segments[..segments.len() - 1].join("/")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    ModuleNotFound(String),
    Factory { path: String, message: String },
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ModuleNotFound(name) => write!(f, "module '{name}' not found"),
            Self::Factory { path, message } => write!(f, "{path}: {message}"),
        }
    }
}

impl std::error::Error for LoadError {}

/// Shared exports table. Clones refer to the same table.
#[derive(Debug, Clone, Default)]
pub struct Exports(Rc<RefCell<IndexMap<String, String>>>);

impl Exports {
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.0.borrow_mut().insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.0.borrow().get(key).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    /// Whether both handles point at the same table
    pub fn same_as(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

/// The `module` argument handed to a factory
#[derive(Debug)]
pub struct Module {
    pub id: String,
    exports: RefCell<Exports>,
}

impl Module {
    pub fn exports(&self) -> Exports {
        self.exports.borrow().clone()
    }

    /// `module.exports = value`
    pub fn set_exports(&self, exports: Exports) {
        *self.exports.borrow_mut() = exports;
    }
}

pub type Factory = Rc<dyn Fn(&Exports, &mut Require<'_>, &Module) -> Result<(), LoadError>>;

/// The `require` argument handed to a factory, bound to the module's directory
pub struct Require<'a> {
    loader: &'a mut Loader,
    root: String,
}

impl fmt::Debug for Require<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Require").field("root", &self.root).finish()
    }
}

impl Require<'_> {
    pub fn require(&mut self, name: &str) -> Result<Exports, LoadError> {
        let root = self.root.clone();
        self.loader.require(name, &root)
    }
}

#[derive(Default)]
pub struct Loader {
    factories: FxHashMap<String, Factory>,
    cache: FxHashMap<String, Rc<Module>>,
}

impl fmt::Debug for Loader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Loader")
            .field("factories", &self.factories.len())
            .field("cached", &self.cache.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Loader {
    /// Merge factories into the table; existing names are replaced
    pub fn define(&mut self, bundle: impl IntoIterator<Item = (String, Factory)>) {
        self.factories.extend(bundle);
    }

    /// The public entry point: resolve `name` from the bundle root
    pub fn entry(&mut self, name: &str) -> Result<Exports, LoadError> {
        self.require(name, "")
    }

    pub fn is_instantiated(&self, path: &str) -> bool {
        self.cache.contains_key(path)
    }

    /// Number of live module instances
    pub fn instance_count(&self) -> usize {
        self.cache.len()
    }

    fn cached(&self, path: &str) -> Option<Exports> {
        self.cache.get(path).map(|module| module.exports())
    }

    fn require(&mut self, name: &str, root: &str) -> Result<Exports, LoadError> {
        let mut path = expand(root, name);
        if let Some(exports) = self.cached(&path) {
            return Ok(exports);
        }

        let factory = match self.factories.get(&path) {
            Some(factory) => Rc::clone(factory),
            None => {
                path = expand(&path, "./index");
                if let Some(exports) = self.cached(&path) {
                    return Ok(exports);
                }
                match self.factories.get(&path) {
                    Some(factory) => Rc::clone(factory),
                    None => return Err(LoadError::ModuleNotFound(name.to_owned())),
                }
            }
        };

        let module = Rc::new(Module {
            id: path.clone(),
            exports: RefCell::new(Exports::default()),
        });
        self.cache.insert(path.clone(), Rc::clone(&module));
        trace!("Instantiating '{path}'");

        let exports = module.exports();
        let mut require = Require {
            loader: self,
            root: dirname(&path),
        };
        match factory(&exports, &mut require, &*module) {
            Ok(()) => Ok(module.exports()),
            Err(err) => {
                self.cache.remove(&path);
                Err(err)
            }
        }
    }
}

/// The ambient global object an artifact is evaluated against
#[derive(Debug, Default)]
pub struct Realm {
    bindings: IndexMap<String, Loader>,
}

impl Realm {
    /// Install a loader under `identifier` unless one is already bound, and
    /// return the bound loader
    pub fn install(&mut self, identifier: &str) -> &mut Loader {
        self.bindings.entry(identifier.to_owned()).or_default()
    }

    pub fn binding(&mut self, identifier: &str) -> Option<&mut Loader> {
        self.bindings.get_mut(identifier)
    }
}

//! Per-extension translation
//!
//! A translator turns the raw text of one file into the body of a module
//! factory. The registry maps extensions (without the dot) to translators.
//! Optional translators that cannot be satisfied at setup are left out of the
//! registry, which makes files with that extension invisible to the bundle.

use std::{fmt, path::Path, sync::Arc};

use anyhow::{Context, Result};
use indexmap::IndexMap;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::command::CommandSpec;

pub trait Translator: Send + Sync {
    fn translate(&self, source: &str, path: &Path) -> Result<String>;
}

impl<F> Translator for F
where
    F: Fn(&str, &Path) -> Result<String> + Send + Sync,
{
    fn translate(&self, source: &str, path: &Path) -> Result<String> {
        self(source, path)
    }
}

/// Translators shipped with the crate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Builtin {
    /// Source is already a module body
    Identity,
    /// JSON document exported as the module value
    Json,
    /// Raw text exported as a string
    Text,
}

impl Translator for Builtin {
    fn translate(&self, source: &str, _path: &Path) -> Result<String> {
        match self {
            Self::Identity => Ok(source.to_owned()),
            Self::Json => {
                serde_json::from_str::<serde_json::Value>(source).context("invalid JSON")?;
                Ok(format!("module.exports = {};", source.trim()))
            }
            Self::Text => Ok(format!(
                "module.exports = {};",
                serde_json::to_string(source)?
            )),
        }
    }
}

impl fmt::Display for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identity => write!(f, "identity"),
            Self::Json => write!(f, "json"),
            Self::Text => write!(f, "text"),
        }
    }
}

/// Translator backed by an external program
#[derive(Debug, Clone)]
pub struct CommandTranslator {
    spec: CommandSpec,
    wrap_exports: bool,
}

impl CommandTranslator {
    /// Returns `None` when the program cannot be found
    pub fn discover(spec: &CommandSpec, wrap_exports: bool) -> Option<Self> {
        let program = spec.locate()?;
        debug!("Found `{}` at {}", spec.command, program.display());
        Some(Self {
            spec: spec.clone(),
            wrap_exports,
        })
    }
}

impl Translator for CommandTranslator {
    fn translate(&self, source: &str, path: &Path) -> Result<String> {
        let output = self.spec.run(source, Some(path))?;
        if self.wrap_exports {
            Ok(format!("module.exports = {output}"))
        } else {
            Ok(output)
        }
    }
}

/// Configured translator for one extension
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TranslatorSpec {
    Builtin {
        builtin: Builtin,
    },
    Command {
        command: String,
        #[serde(default)]
        args: Vec<String>,
        /// Prefix the output with `module.exports = `, for template compilers
        /// that emit a bare function expression
        #[serde(default, rename = "wrap-exports")]
        wrap_exports: bool,
    },
}

#[derive(Clone, Default)]
pub struct TranslatorRegistry {
    translators: IndexMap<String, Arc<dyn Translator>>,
}

impl fmt::Debug for TranslatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TranslatorRegistry")
            .field("extensions", &self.translators.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl TranslatorRegistry {
    /// Registry holding the always-available translators
    pub fn with_builtins() -> Self {
        let mut registry = Self::default();
        registry.register("js", Builtin::Identity);
        registry.register("json", Builtin::Json);
        registry
    }

    /// Build the registry for a configuration. Command translators whose
    /// program is missing are skipped with a warning.
    pub fn from_specs<'a>(specs: impl IntoIterator<Item = (&'a String, &'a TranslatorSpec)>) -> Self {
        let mut registry = Self::with_builtins();
        for (extension, spec) in specs {
            match spec {
                TranslatorSpec::Builtin { builtin } => {
                    registry.register(extension.as_str(), *builtin);
                }
                TranslatorSpec::Command {
                    command,
                    args,
                    wrap_exports,
                } => {
                    let spec = CommandSpec {
                        command: command.clone(),
                        args: args.clone(),
                    };
                    let available = CommandTranslator::discover(&spec, *wrap_exports);
                    if !registry.register_optional(extension.as_str(), available) {
                        warn!(
                            "`{command}` is not installed; '.{extension}' files will not be bundled"
                        );
                    }
                }
            }
        }
        registry
    }

    /// Register or replace the translator for an extension
    pub fn register(&mut self, extension: impl Into<String>, translator: impl Translator + 'static) {
        let extension = extension.into();
        debug!("Registering translator for '.{extension}'");
        self.translators.insert(extension, Arc::new(translator));
    }

    /// Register a translator that may be unavailable. Returns whether it was
    /// registered.
    pub fn register_optional<T: Translator + 'static>(
        &mut self,
        extension: impl Into<String>,
        translator: Option<T>,
    ) -> bool {
        match translator {
            Some(translator) => {
                self.register(extension, translator);
                true
            }
            None => false,
        }
    }

    pub fn translator_for(&self, extension: &str) -> Option<&dyn Translator> {
        self.translators.get(extension).map(Arc::as_ref)
    }

    /// Owned handle, for running the translator off the async thread
    pub fn shared(&self, extension: &str) -> Option<Arc<dyn Translator>> {
        self.translators.get(extension).cloned()
    }

    pub fn supports(&self, extension: &str) -> bool {
        self.translators.contains_key(extension)
    }

    pub fn extensions(&self) -> impl Iterator<Item = &str> {
        self.translators.keys().map(String::as_str)
    }
}

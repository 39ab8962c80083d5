//! Source aggregation
//!
//! Turns the configured root paths into an insertion-ordered map from logical
//! module name to translated source. Roots are processed in configured order
//! and files within a root in sorted path order, so a name produced by a later
//! root replaces the record of an earlier one.

use std::{
    fmt, io,
    path::{Path, PathBuf},
};

use indexmap::IndexMap;
use log::{debug, trace};

use crate::{
    cache::{CompileCache, MarkerTable},
    error::{BundleError, Result},
    translator::TranslatorRegistry,
    walker::{SourceFile, TreeWalk, extension_of},
};

/// One module of the current pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleRecord {
    pub name: String,
    /// Path relative to its root, for diagnostics
    pub display_path: String,
    pub source: String,
}

/// Logical name to module, in insertion order
pub type ModuleMap = IndexMap<String, ModuleRecord>;

/// State carried from one build to the next
#[derive(Debug, Default)]
pub struct BuildState {
    pub markers: MarkerTable,
    pub compile_cache: CompileCache,
    /// Set whenever a file is translated instead of served from the cache
    pub recompiled: bool,
}

/// Per-file compile step with its cache
#[derive(Debug)]
pub struct Compiler<'a> {
    registry: &'a TranslatorRegistry,
    state: &'a mut BuildState,
    cache_enabled: bool,
}

impl<'a> Compiler<'a> {
    pub fn new(
        registry: &'a TranslatorRegistry,
        state: &'a mut BuildState,
        cache_enabled: bool,
    ) -> Self {
        Self {
            registry,
            state,
            cache_enabled,
        }
    }

    /// Translate one file, reusing the cached translation while its marker is
    /// unchanged
    pub async fn compile(&mut self, path: &Path) -> Result<String> {
        if self.cache_enabled {
            if let Some(cached) = self
                .state
                .compile_cache
                .lookup(path, &self.state.markers)
            {
                trace!("Compile cache hit for {}", path.display());
                return Ok(cached.to_owned());
            }
        }

        let extension = extension_of(path);
        let translator =
            self.registry
                .shared(extension)
                .ok_or_else(|| BundleError::NoTranslator {
                    extension: extension.to_owned(),
                })?;

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|err| BundleError::filesystem(path, err))?;
        let contents = String::from_utf8_lossy(&bytes).into_owned();

        self.state.recompiled = true;
        trace!("Translating {}", path.display());
        let owned_path = path.to_path_buf();
        let translated = tokio::task::spawn_blocking(move || {
            translator.translate(&contents, &owned_path)
        })
        .await
        .map_err(|err| translation_error(path, &err))?
        .map_err(|err| translation_error(path, &err))?;

        if self.cache_enabled {
            if let Some(marker) = self.state.markers.get(path) {
                self.state
                    .compile_cache
                    .store(path, marker, translated.clone());
            }
        }
        Ok(translated)
    }

    /// Collect every module under the given roots
    pub async fn gather(&mut self, roots: &[PathBuf]) -> Result<ModuleMap> {
        let mut modules = ModuleMap::new();
        for root in roots {
            let candidates = self.candidates(root).await?;
            debug!(
                "Root {} yielded {} candidate files",
                root.display(),
                candidates.len()
            );

            for file in candidates {
                if !self.registry.supports(file.extension()) {
                    trace!("Skipping {} (unsupported extension)", file.path.display());
                    continue;
                }
                let source = self.compile(&file.path).await?;
                let name = file.logical_name();
                if let Some(previous) = modules.get(&name) {
                    debug!(
                        "Module '{name}' from {} replaces {}",
                        file.display_path(),
                        previous.display_path
                    );
                }
                modules.insert(
                    name.clone(),
                    ModuleRecord {
                        name,
                        display_path: file.display_path(),
                        source,
                    },
                );
            }
        }
        Ok(modules)
    }

    async fn candidates(&mut self, root: &Path) -> Result<Vec<SourceFile>> {
        let metadata = tokio::fs::metadata(root)
            .await
            .map_err(|err| BundleError::filesystem(root, err))?;

        if metadata.is_dir() {
            let owned_root = root.to_path_buf();
            let (files, markers) = tokio::task::spawn_blocking(move || {
                let mut markers = MarkerTable::default();
                let files = TreeWalk::new(&owned_root, &mut markers).collect_sorted();
                (files, markers)
            })
            .await
            .map_err(|err| BundleError::filesystem(root, io::Error::from(err)))?;
            self.state.markers.merge(markers);
            return files;
        }

        // A file root is a single module named relative to its own directory
        let modified = metadata
            .modified()
            .map_err(|err| BundleError::filesystem(root, err))?;
        self.state.markers.record(root, modified);
        let relative = root
            .file_name()
            .map_or_else(|| root.to_path_buf(), PathBuf::from);
        Ok(vec![SourceFile {
            path: root.to_path_buf(),
            relative,
        }])
    }
}

fn translation_error(path: &Path, err: &dyn fmt::Display) -> BundleError {
    BundleError::Translation {
        path: path.to_path_buf(),
        message: format!("{err:#}"),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;

    fn write(path: &Path, contents: &str) {
        fs::create_dir_all(path.parent().expect("fixture has a parent")).expect("mkdir");
        fs::write(path, contents).expect("write fixture");
    }

    #[tokio::test]
    async fn test_compile_without_translator_is_an_error() {
        let temp = TempDir::new().expect("tempdir");
        let path = temp.path().join("view.eco");
        write(&path, "<%= @name %>");

        let registry = TranslatorRegistry::with_builtins();
        let mut state = BuildState::default();
        let err = Compiler::new(&registry, &mut state, true)
            .compile(&path)
            .await
            .expect_err("no translator for eco");
        assert!(matches!(err, BundleError::NoTranslator { ref extension } if extension == "eco"));
        assert!(!state.recompiled);
    }

    #[tokio::test]
    async fn test_gather_names_modules_relative_to_root() {
        let temp = TempDir::new().expect("tempdir");
        let lib = temp.path().join("lib");
        write(&lib.join("app.js"), "exports.app = true;");
        write(&lib.join("models/user.js"), "exports.user = true;");
        write(&lib.join("README.md"), "# not a module");
        let single = temp.path().join("vendor/config.json");
        write(&single, "{\"debug\": false}");

        let registry = TranslatorRegistry::with_builtins();
        let mut state = BuildState::default();
        let modules = Compiler::new(&registry, &mut state, true)
            .gather(&[lib, single])
            .await
            .expect("gather succeeds");

        assert_eq!(
            modules.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["app", "models/user", "config"]
        );
        assert_eq!(modules["models/user"].display_path, "models/user.js");
        assert_eq!(modules["config"].source, "module.exports = {\"debug\": false};");
        assert!(state.recompiled);
        assert_eq!(state.compile_cache.len(), 3);
    }

    #[tokio::test]
    async fn test_second_pass_hits_cache() {
        let temp = TempDir::new().expect("tempdir");
        write(&temp.path().join("a.js"), "exports.a = 1;");

        let registry = TranslatorRegistry::with_builtins();
        let mut state = BuildState::default();
        let roots = [temp.path().to_path_buf()];

        Compiler::new(&registry, &mut state, true)
            .gather(&roots)
            .await
            .expect("first pass");
        state.recompiled = false;

        let modules = Compiler::new(&registry, &mut state, true)
            .gather(&roots)
            .await
            .expect("second pass");
        assert!(!state.recompiled);
        assert_eq!(modules["a"].source, "exports.a = 1;");
    }
}

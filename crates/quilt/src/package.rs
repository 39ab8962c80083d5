//! Build orchestration
//!
//! A [`Package`] owns its configuration, translator registry, and the caches
//! that carry over between builds. `build` takes `&mut self`, so one package
//! never runs two builds at once; callers that share a package across tasks
//! serialize access themselves (see [`crate::serve`]).

use std::path::Path;

use log::{debug, info};

use crate::{
    compaction::{CommandCompactor, CompactionStage, Compactor},
    config::Config,
    dependencies,
    error::Result,
    loader,
    sources::{BuildState, Compiler},
    translator::{Translator, TranslatorRegistry},
};

#[derive(Debug)]
pub struct Package {
    config: Config,
    registry: TranslatorRegistry,
    state: BuildState,
    compaction: CompactionStage,
}

impl Package {
    /// Validate the configuration and set up translators. Command translators
    /// that are not installed are left out rather than failing here.
    pub fn new(config: Config) -> Result<Self> {
        let config = config.validated()?;
        let registry = TranslatorRegistry::from_specs(&config.translators);
        let compactor = config
            .compactor
            .clone()
            .map(CommandCompactor::new)
            .unwrap_or_default();
        debug!(
            "Package '{}' over {} roots, translating {:?}",
            config.identifier,
            config.paths.len(),
            registry.extensions().collect::<Vec<_>>()
        );
        Ok(Self {
            config,
            registry,
            state: BuildState::default(),
            compaction: CompactionStage::new(compactor),
        })
    }

    /// Register a translator, replacing any configured for the extension
    #[must_use]
    pub fn with_translator(
        mut self,
        extension: impl Into<String>,
        translator: impl Translator + 'static,
    ) -> Self {
        self.registry.register(extension, translator);
        self
    }

    /// Replace the compactor used when compression is enabled
    #[must_use]
    pub fn with_compactor(mut self, compactor: impl Compactor + 'static) -> Self {
        self.compaction = CompactionStage::new(compactor);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &TranslatorRegistry {
        &self.registry
    }

    /// Translate a single file through the compile cache
    pub async fn compile(&mut self, path: &Path) -> Result<String> {
        Compiler::new(&self.registry, &mut self.state, self.config.cache)
            .compile(path)
            .await
    }

    /// Produce the artifact: dependencies, then the loader with every module
    pub async fn build(&mut self) -> Result<String> {
        self.state.recompiled = false;

        let Self {
            config,
            registry,
            state,
            compaction,
        } = self;

        let mut compiler = Compiler::new(registry, state, config.cache);
        let joined = tokio::try_join!(
            dependencies::concatenate(&config.dependencies),
            compiler.gather(&config.paths),
        );
        // Retranslated sources stay in the compile cache even if this pass fails
        if state.recompiled {
            compaction.invalidate();
        }
        let (prelude, modules) = joined?;

        let module_count = modules.len();
        let bundle = format!(
            "{prelude}\n{}",
            loader::assemble(&config.identifier, &modules)
        );

        let bundle = if config.compress {
            let reuse = config.cache && !state.recompiled;
            compaction.run(bundle, reuse, config.cache).await?
        } else {
            bundle
        };

        info!(
            "Built {module_count} modules ({} bytes{})",
            bundle.len(),
            if state.recompiled { "" } else { ", all cached" }
        );
        Ok(bundle)
    }
}

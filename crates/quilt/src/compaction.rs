//! Whole-bundle compaction
//!
//! The compactor itself is an external collaborator. The stage keeps the last
//! compacted artifact and hands it back when the pass that produced the
//! current artifact translated nothing. Any translation drops the kept result,
//! even when the build it happened in fails later.

use std::{fmt, sync::Arc};

use anyhow::Result;
use log::debug;

use crate::{
    command::CommandSpec,
    error::{self, BundleError},
};

pub trait Compactor: Send + Sync {
    fn compact(&self, bundle: &str) -> Result<String>;
}

impl<F> Compactor for F
where
    F: Fn(&str) -> Result<String> + Send + Sync,
{
    fn compact(&self, bundle: &str) -> Result<String> {
        self(bundle)
    }
}

/// Compactor that pipes the bundle through an external minifier
#[derive(Debug, Clone)]
pub struct CommandCompactor {
    spec: CommandSpec,
}

impl CommandCompactor {
    pub fn new(spec: CommandSpec) -> Self {
        Self { spec }
    }
}

impl Default for CommandCompactor {
    fn default() -> Self {
        Self::new(CommandSpec::new("terser", &["--compress", "--mangle"]))
    }
}

impl Compactor for CommandCompactor {
    fn compact(&self, bundle: &str) -> Result<String> {
        self.spec.run(bundle, None)
    }
}

pub struct CompactionStage {
    compactor: Arc<dyn Compactor>,
    cached: Option<String>,
}

impl fmt::Debug for CompactionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompactionStage")
            .field("cached", &self.cached.is_some())
            .finish_non_exhaustive()
    }
}

impl CompactionStage {
    pub fn new(compactor: impl Compactor + 'static) -> Self {
        Self {
            compactor: Arc::new(compactor),
            cached: None,
        }
    }

    /// Forget the remembered result; its sources have been retranslated
    pub fn invalidate(&mut self) {
        if self.cached.take().is_some() {
            debug!("Dropped compacted bundle");
        }
    }

    pub fn has_cached(&self) -> bool {
        self.cached.is_some()
    }

    /// Compact `bundle`, or reuse the previous result when `reuse` is allowed
    /// and one exists. Results are only remembered when `remember` is set.
    pub async fn run(&mut self, bundle: String, reuse: bool, remember: bool) -> error::Result<String> {
        if reuse {
            if let Some(cached) = &self.cached {
                debug!("Reusing compacted bundle; nothing was recompiled");
                return Ok(cached.clone());
            }
        }

        let compactor = Arc::clone(&self.compactor);
        let original_len = bundle.len();
        let compacted = tokio::task::spawn_blocking(move || compactor.compact(&bundle))
            .await
            .map_err(|err| BundleError::Compaction(err.to_string()))?
            .map_err(|err| BundleError::Compaction(format!("{err:#}")))?;
        debug!(
            "Compacted bundle from {original_len} to {} bytes",
            compacted.len()
        );
        if remember {
            self.cached = Some(compacted.clone());
        }
        Ok(compacted)
    }
}

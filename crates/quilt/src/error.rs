//! Error taxonomy for a bundling pass
//!
//! Every failure aborts the whole `build()` call. Unsupported extensions are not
//! represented here: they are a skip decision made by the source aggregator.

use std::{io, path::PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    /// Stat, read, or directory-listing failure
    #[error("{}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A file reached the compiler without a registered translator
    #[error("no translator for '.{extension}' files")]
    NoTranslator { extension: String },

    /// The translator for a file reported a failure
    #[error("can't compile {}\n{message}", path.display())]
    Translation { path: PathBuf, message: String },

    /// The compaction collaborator reported a failure
    #[error("{0}")]
    Compaction(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl BundleError {
    pub(crate) fn filesystem(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }

    /// Stage name used when reporting the failure
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Filesystem { .. } => "filesystem",
            Self::NoTranslator { .. } | Self::Translation { .. } => "translation",
            Self::Compaction(_) => "compaction",
            Self::Config(_) => "configuration",
        }
    }
}

pub type Result<T, E = BundleError> = std::result::Result<T, E>;

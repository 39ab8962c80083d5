//! Bundle configuration
//!
//! Loaded from `quilt.toml` (explicit path, then the working directory, then
//! the user configuration directory) and immutable once a [`crate::Package`]
//! has been built from it.

use std::{
    fs,
    path::{Component, Path, PathBuf},
};

use anyhow::{Context, Result};
use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{command::CommandSpec, dirs, error::BundleError, translator::TranslatorSpec};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct Config {
    /// Global binding the loader is installed under
    pub identifier: String,
    /// Source roots, files or directories, in precedence order
    pub paths: Vec<PathBuf>,
    /// Files prepended verbatim, in order
    pub dependencies: Vec<PathBuf>,
    /// Extension (without dot) to translator
    pub translators: IndexMap<String, TranslatorSpec>,
    pub compress: bool,
    pub cache: bool,
    /// Minifier used when `compress` is set
    pub compactor: Option<CommandSpec>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            identifier: "require".to_owned(),
            paths: vec![PathBuf::from("lib")],
            dependencies: Vec::new(),
            translators: IndexMap::new(),
            compress: false,
            cache: true,
            compactor: None,
        }
    }
}

impl Config {
    /// Load configuration, falling back to defaults when no file exists
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        let local = PathBuf::from(dirs::CONFIG_FILE_NAME);
        if local.is_file() {
            return Self::from_file(&local);
        }

        if let Some(user) = dirs::user_config_file().filter(|path| path.is_file()) {
            return Self::from_file(&user);
        }

        debug!("No configuration file found, using defaults");
        Ok(Self::default())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from {}", path.display());
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("invalid configuration in {}", path.display()))
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        Ok(config)
    }

    /// Check the invariants a package relies on and normalise root paths
    pub fn validated(mut self) -> Result<Self, BundleError> {
        if self.identifier.trim().is_empty() {
            return Err(BundleError::Config(
                "identifier must not be empty".to_owned(),
            ));
        }
        if self.paths.is_empty() {
            return Err(BundleError::Config(
                "at least one source path is required".to_owned(),
            ));
        }
        self.paths = self.paths.iter().map(|path| normalize(path)).collect();
        Ok(self)
    }
}

/// Lexically drop `.` segments and trailing separators
pub fn normalize(path: &Path) -> PathBuf {
    let normalized: PathBuf = path
        .components()
        .filter(|component| !matches!(component, Component::CurDir))
        .collect();
    if normalized.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        normalized
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::translator::Builtin;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.identifier, "require");
        assert_eq!(config.paths, vec![PathBuf::from("lib")]);
        assert!(config.cache);
        assert!(!config.compress);
    }

    #[test]
    fn test_parse_full_file() {
        let config = Config::from_toml(
            r#"
identifier = "app"
paths = ["./src/", "vendor/plugins"]
dependencies = ["vendor/zepto.js"]
compress = true
cache = false
compactor = { command = "uglifyjs", args = ["-c", "-m"] }

[translators.coffee]
command = "coffee"
args = ["--stdio", "--print", "--bare"]

[translators.jade]
command = "jade"
args = ["--client"]
wrap-exports = true

[translators.html]
builtin = "text"
"#,
        )
        .expect("valid config");

        assert_eq!(config.identifier, "app");
        assert_eq!(config.dependencies, vec![PathBuf::from("vendor/zepto.js")]);
        assert_eq!(
            config.compactor,
            Some(CommandSpec::new("uglifyjs", &["-c", "-m"]))
        );
        assert_eq!(
            config.translators["html"],
            TranslatorSpec::Builtin {
                builtin: Builtin::Text
            }
        );
        assert_eq!(
            config.translators["jade"],
            TranslatorSpec::Command {
                command: "jade".to_owned(),
                args: vec!["--client".to_owned()],
                wrap_exports: true,
            }
        );

        let config = config.validated().expect("valid");
        assert_eq!(
            config.paths,
            vec![PathBuf::from("src"), PathBuf::from("vendor/plugins")]
        );
    }

    #[test]
    fn test_unknown_keys_rejected() {
        assert!(Config::from_toml("compres = true").is_err());
    }

    #[test]
    fn test_validation() {
        let empty_identifier = Config {
            identifier: " ".to_owned(),
            ..Default::default()
        };
        assert!(matches!(
            empty_identifier.validated(),
            Err(BundleError::Config(_))
        ));

        let no_paths = Config {
            paths: Vec::new(),
            ..Default::default()
        };
        assert!(no_paths.validated().is_err());
    }
}

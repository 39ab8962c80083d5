//! Platform directories

use std::path::PathBuf;

use etcetera::BaseStrategy;

/// Name of the project configuration file
pub const CONFIG_FILE_NAME: &str = "quilt.toml";

/// `<user config dir>/quilt`, if a home directory can be determined
pub fn user_config_dir() -> Option<PathBuf> {
    etcetera::choose_base_strategy()
        .ok()
        .map(|strategy| strategy.config_dir().join("quilt"))
}

/// `<user config dir>/quilt/quilt.toml`
pub fn user_config_file() -> Option<PathBuf> {
    user_config_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}

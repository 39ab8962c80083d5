//! Bundles a tree of CommonJS-style modules into a single script that installs
//! a `require` loader and defines every module as a named factory.

pub mod cache;
pub mod command;
pub mod compaction;
pub mod config;
pub mod dependencies;
pub mod dirs;
pub mod error;
pub mod loader;
pub mod package;
pub mod runtime;
pub mod serve;
pub mod sources;
pub mod translator;
pub mod walker;

pub use config::Config;
pub use error::BundleError;
pub use package::Package;

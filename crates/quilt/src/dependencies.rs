//! Verbatim dependency prelude
//!
//! Dependency files are placed ahead of the loader untouched: no translation
//! and no extension filtering. Bytes that are not valid UTF-8 are replaced
//! rather than failing the build.

use std::path::PathBuf;

use futures::future::try_join_all;
use log::debug;

use crate::error::{BundleError, Result};

/// Read every dependency and join them with newlines, in configured order
pub async fn concatenate(paths: &[PathBuf]) -> Result<String> {
    let reads = paths.iter().map(|path| async move {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|err| BundleError::filesystem(path, err))?;
        Ok::<_, BundleError>(String::from_utf8_lossy(&bytes).into_owned())
    });
    let contents = try_join_all(reads).await?;
    debug!("Concatenated {} dependencies", contents.len());
    Ok(contents.join("\n"))
}

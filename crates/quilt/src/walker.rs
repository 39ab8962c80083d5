//! Source tree enumeration
//!
//! Walks a root directory depth-first, parents before children, pruning any
//! entry whose name starts with a dot. Every visited path has its modification
//! time recorded in the marker table, directories included.

use std::{
    io,
    path::{Path, PathBuf},
};

use log::{debug, trace};
use walkdir::{DirEntry, FilterEntry, WalkDir};

use crate::{
    cache::MarkerTable,
    error::{BundleError, Result},
};

/// A regular file found under a root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Path as reachable from the working directory
    pub path: PathBuf,
    /// Path relative to the root it was found under
    pub relative: PathBuf,
}

impl SourceFile {
    /// Module name: the relative path with its final extension removed,
    /// always `/`-separated
    pub fn logical_name(&self) -> String {
        let stem = self.relative.with_extension("");
        slash_path(&stem)
    }

    /// Relative path for diagnostics
    pub fn display_path(&self) -> String {
        slash_path(&self.relative)
    }

    /// Extension without the leading dot, empty when there is none
    pub fn extension(&self) -> &str {
        extension_of(&self.path)
    }
}

pub fn extension_of(path: &Path) -> &str {
    path.extension().and_then(|ext| ext.to_str()).unwrap_or("")
}

fn slash_path(path: &Path) -> String {
    path.components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}

fn is_visible(entry: &DirEntry) -> bool {
    entry.depth() == 0 || !is_hidden(entry)
}

/// Lazy walk over one root; consumed once
pub struct TreeWalk<'a> {
    root: PathBuf,
    entries: FilterEntry<walkdir::IntoIter, fn(&DirEntry) -> bool>,
    markers: &'a mut MarkerTable,
}

impl std::fmt::Debug for TreeWalk<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeWalk").field("root", &self.root).finish()
    }
}

impl<'a> TreeWalk<'a> {
    pub fn new(root: &Path, markers: &'a mut MarkerTable) -> Self {
        let entries = WalkDir::new(root)
            .follow_links(true)
            .into_iter()
            .filter_entry(is_visible as fn(&DirEntry) -> bool);
        Self {
            root: root.to_path_buf(),
            entries,
            markers,
        }
    }

    /// Drain the walk and return every file sorted by its path string.
    /// The first error discards everything collected so far.
    pub fn collect_sorted(self) -> Result<Vec<SourceFile>> {
        let root = self.root.clone();
        let mut files = self.collect::<Result<Vec<_>>>()?;
        files.sort_by(|a, b| a.path.as_os_str().cmp(b.path.as_os_str()));
        debug!("Found {} files under {}", files.len(), root.display());
        Ok(files)
    }

    fn visit(&mut self, entry: &DirEntry) -> Result<Option<SourceFile>> {
        let path = entry.path();
        let metadata = entry
            .metadata()
            .map_err(|err| walk_error(path, err))?;
        let modified = metadata
            .modified()
            .map_err(|err| BundleError::filesystem(path, err))?;
        self.markers.record(path, modified);

        if !metadata.is_file() {
            return Ok(None);
        }

        let relative = path
            .strip_prefix(&self.root)
            .map_err(|_| {
                BundleError::filesystem(
                    path,
                    io::Error::other(format!("not under root {}", self.root.display())),
                )
            })?
            .to_path_buf();
        trace!("Visited {}", path.display());
        Ok(Some(SourceFile {
            path: path.to_path_buf(),
            relative,
        }))
    }
}

impl Iterator for TreeWalk<'_> {
    type Item = Result<SourceFile>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.entries.next()? {
                Ok(entry) => entry,
                Err(err) => {
                    let path = err
                        .path()
                        .map_or_else(|| self.root.clone(), Path::to_path_buf);
                    return Some(Err(walk_error(&path, err)));
                }
            };
            match self.visit(&entry) {
                Ok(Some(file)) => return Some(Ok(file)),
                Ok(None) => {}
                Err(err) => return Some(Err(err)),
            }
        }
    }
}

fn walk_error(path: &Path, err: walkdir::Error) -> BundleError {
    let source = if err.io_error().is_some() {
        err.into_io_error()
            .unwrap_or_else(|| io::Error::other("directory walk failed"))
    } else {
        io::Error::other(err.to_string())
    };
    BundleError::filesystem(path, source)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().expect("fixture has a parent")).expect("mkdir");
        fs::write(path, "").expect("write fixture");
    }

    #[test]
    fn test_walk_skips_hidden_and_sorts() {
        let temp = TempDir::new().expect("tempdir");
        let root = temp.path();
        touch(&root.join("zeta.js"));
        touch(&root.join("alpha/beta.js"));
        touch(&root.join(".hidden.js"));
        touch(&root.join(".git/config.js"));
        touch(&root.join("alpha/.secret/inner.js"));

        let mut markers = MarkerTable::default();
        let files = TreeWalk::new(root, &mut markers)
            .collect_sorted()
            .expect("walk succeeds");

        let names: Vec<String> = files.iter().map(SourceFile::display_path).collect();
        assert_eq!(names, vec!["alpha/beta.js", "zeta.js"]);

        // Root, alpha/, and both files were stamped; hidden entries were not
        assert_eq!(markers.len(), 4);
        assert!(markers.get(&root.join(".git")).is_none());
        assert!(markers.get(&root.join("alpha")).is_some());
    }

    #[test]
    fn test_sort_compares_whole_path_strings() {
        let temp = TempDir::new().expect("tempdir");
        let root = temp.path();
        touch(&root.join("a/b.js"));
        touch(&root.join("a.js"));
        touch(&root.join("a-b.js"));

        let mut markers = MarkerTable::default();
        let files = TreeWalk::new(root, &mut markers)
            .collect_sorted()
            .expect("walk succeeds");

        let names: Vec<String> = files.iter().map(SourceFile::display_path).collect();
        assert_eq!(names, vec!["a-b.js", "a.js", "a/b.js"]);
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let temp = TempDir::new().expect("tempdir");
        let mut markers = MarkerTable::default();
        let result = TreeWalk::new(&temp.path().join("missing"), &mut markers).collect_sorted();
        assert!(matches!(result, Err(BundleError::Filesystem { .. })));
    }

    #[test]
    fn test_logical_name_strips_final_extension() {
        let file = SourceFile {
            path: PathBuf::from("lib/views/list.html.eco"),
            relative: PathBuf::from("views/list.html.eco"),
        };
        assert_eq!(file.logical_name(), "views/list.html");
        assert_eq!(file.extension(), "eco");
    }
}

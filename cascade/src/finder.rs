//! Resolution of relative file names through a cascading file system.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;

use eyre::Result;
use log::{debug, warn};

use crate::fs::maybe_canonicalize;
use crate::Error;

/// Something that can locate a file given a resource category (e.g.
/// `"views"`), a path relative to that category and a file extension.
pub trait FileFinder {
    /// Returns the absolute path of the first matching file, or `None` if no
    /// such file exists.
    fn find_file(&self, category: &str, relative: &str, extension: &str) -> Option<PathBuf>;
}

impl<F: FileFinder + ?Sized> FileFinder for &F {
    fn find_file(&self, category: &str, relative: &str, extension: &str) -> Option<PathBuf> {
        (**self).find_file(category, relative, extension)
    }
}

impl<F: FileFinder + ?Sized> FileFinder for Box<F> {
    fn find_file(&self, category: &str, relative: &str, extension: &str) -> Option<PathBuf> {
        (**self).find_file(category, relative, extension)
    }
}

impl<F: FileFinder + ?Sized> FileFinder for Rc<F> {
    fn find_file(&self, category: &str, relative: &str, extension: &str) -> Option<PathBuf> {
        (**self).find_file(category, relative, extension)
    }
}

impl<F: FileFinder + ?Sized> FileFinder for Arc<F> {
    fn find_file(&self, category: &str, relative: &str, extension: &str) -> Option<PathBuf> {
        (**self).find_file(category, relative, extension)
    }
}

/// A file finder that searches an ordered list of root directories, so that
/// files in earlier roots (e.g. an application) override files at the same
/// relative location in later ones (e.g. modules, then the system defaults).
#[derive(Debug, Clone, Default)]
pub struct CascadingFinder {
    roots: Vec<PathBuf>,
}

impl CascadingFinder {
    /// Constructor. Roots are given in priority order. Roots that do not exist
    /// are skipped.
    pub fn new<I, P>(roots: I) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut finder = Self::default();
        for root in roots {
            finder.push_root(root)?;
        }
        Ok(finder)
    }

    /// Add a root with lower priority than all existing roots. Returns whether
    /// the root was added.
    pub fn push_root<P: AsRef<Path>>(&mut self, root: P) -> Result<bool> {
        let root = root.as_ref();
        match maybe_canonicalize(root)? {
            Some(root) => {
                debug!("Adding root path {}", root.display());
                self.roots.push(root);
                Ok(true)
            }
            None => {
                warn!("Skipping non-existent root path: {}", root.display());
                Ok(false)
            }
        }
    }

    /// The roots searched by this finder, highest priority first.
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// List all of the files in the given category across all roots.
    ///
    /// Keys are paths relative to the category directory, using `/` as the
    /// separator. Where more than one root provides a file at the same
    /// relative path, the highest-priority one wins.
    pub fn list_files(&self, category: &str) -> Result<BTreeMap<String, PathBuf>, Error> {
        let mut found = BTreeMap::new();
        for root in &self.roots {
            let base = root.join(category);
            if !base.is_dir() {
                continue;
            }
            let pattern = format!(
                "{}/**/*",
                glob::Pattern::escape(&base.to_string_lossy())
            );
            let paths =
                glob::glob(&pattern).map_err(|e| Error::SourceFilePattern(pattern.clone(), e))?;
            for path in paths {
                let path = path?;
                if !path.is_file() {
                    continue;
                }
                let key = match path.strip_prefix(&base) {
                    Ok(rel) => rel
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy())
                        .collect::<Vec<_>>()
                        .join("/"),
                    Err(_) => continue,
                };
                found.entry(key).or_insert(path);
            }
        }
        Ok(found)
    }
}

impl FileFinder for CascadingFinder {
    fn find_file(&self, category: &str, relative: &str, extension: &str) -> Option<PathBuf> {
        let file = if extension.is_empty() {
            relative.to_string()
        } else {
            format!("{}.{}", relative, extension)
        };
        let found = self
            .roots
            .iter()
            .map(|root| root.join(category).join(&file))
            .find(|candidate| candidate.is_file());
        match &found {
            Some(path) => debug!("Found {}/{} at {}", category, file, path.display()),
            None => debug!("No file {}/{} in any root", category, file),
        }
        found
    }
}

//! Filesystem discovery.
//!
//! [`Extractor`] walks a directory tree with `walkdir` and lazily yields the
//! absolute paths of files that survive its [`FilterChain`]. Pruned
//! directories are never opened. [`collect_documents`] drains an extractor
//! and reads each file into a [`Document`].

use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::ExtractError;
use crate::filter::{Candidate, FilterChain, FilterOptions, Verdict, PRUNED_DIRS};
use crate::models::Document;

/// A filesystem root plus the filters applied beneath it.
#[derive(Debug, Clone)]
pub struct Extractor {
    root: PathBuf,
    chain: FilterChain,
    follow_links: bool,
}

impl Extractor {
    /// Build an extractor from enumerated options.
    ///
    /// Fails if `root` cannot be resolved or any pattern fails to compile.
    pub fn new(root: impl AsRef<Path>, options: &FilterOptions) -> Result<Self, ExtractError> {
        let chain = FilterChain::from_options(options)?;
        Self::with_chain(root, chain)
    }

    /// Build an extractor with an explicit chain, for custom filter orderings.
    pub fn with_chain(root: impl AsRef<Path>, chain: FilterChain) -> Result<Self, ExtractError> {
        let root = root.as_ref();
        let root = std::fs::canonicalize(root).map_err(|source| ExtractError::Root {
            path: root.to_path_buf(),
            source,
        })?;
        Ok(Self {
            root,
            chain,
            follow_links: false,
        })
    }

    pub fn follow_links(mut self, yes: bool) -> Self {
        self.follow_links = yes;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Start a fresh walk from the root.
    pub fn files(&self) -> Files<'_> {
        let walker = WalkDir::new(&self.root)
            .follow_links(self.follow_links)
            .into_iter();
        Files {
            walker,
            root: &self.root,
            chain: &self.chain,
            done: false,
        }
    }
}

/// Lazy sequence of accepted file paths from one walk.
///
/// Yields `Err` at most once: a traversal error ends the walk.
pub struct Files<'a> {
    walker: walkdir::IntoIter,
    root: &'a Path,
    chain: &'a FilterChain,
    done: bool,
}

impl Iterator for Files<'_> {
    type Item = Result<PathBuf, ExtractError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            let entry = match self.walker.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    self.done = true;
                    return Some(Err(ExtractError::Traversal(e)));
                }
            };

            // The root itself is never filtered.
            if entry.depth() == 0 {
                if entry.file_type().is_file() {
                    return Some(Ok(entry.into_path()));
                }
                continue;
            }

            let is_dir = entry.file_type().is_dir();
            if is_dir && PRUNED_DIRS.iter().any(|d| entry.file_name() == *d) {
                debug!(path = %entry.path().display(), "pruning directory");
                self.walker.skip_current_dir();
                continue;
            }

            let path = entry.path();
            let relative = path.strip_prefix(self.root).unwrap_or(path);
            let candidate = Candidate {
                path,
                relative,
                is_dir,
            };

            match self.chain.evaluate(&candidate) {
                Verdict::SkipSubtree if is_dir => {
                    debug!(path = %path.display(), "skipping subtree");
                    self.walker.skip_current_dir();
                }
                Verdict::SkipSubtree | Verdict::SkipFile => {}
                Verdict::Accept if is_dir => {}
                Verdict::Accept => {
                    let file_type = entry.file_type();
                    if file_type.is_file() || (file_type.is_symlink() && path.is_file()) {
                        return Some(Ok(entry.into_path()));
                    }
                    debug!(path = %path.display(), "skipping non-regular file");
                }
            }
        }
    }
}

/// Read a file into a [`Document`]. Invalid UTF-8 is replaced, not rejected.
pub fn read_document(path: &Path) -> std::io::Result<Document> {
    let bytes = std::fs::read(path)?;
    let size = bytes.len() as u64;
    let text = String::from_utf8_lossy(&bytes).into_owned();
    Ok(Document::from_file(path, text, size))
}

/// Walk the extractor and load every accepted file.
///
/// Unreadable and empty files are skipped with a warning; a traversal error
/// aborts the walk.
pub fn collect_documents(extractor: &Extractor) -> Result<Vec<Document>, ExtractError> {
    let mut documents = Vec::new();
    for path in extractor.files() {
        let path = path?;
        match read_document(&path) {
            Ok(doc) if doc.text.is_empty() => {
                warn!(path = %path.display(), "skipping empty file");
            }
            Ok(doc) => documents.push(doc),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not read file");
            }
        }
    }
    Ok(documents)
}

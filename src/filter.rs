//! Path filters applied during directory traversal.
//!
//! A [`FilterChain`] is an ordered list of [`Filter`]s. Each filesystem entry
//! is turned into a [`Candidate`] and run through the chain; the first filter
//! that does not [`Accept`](Verdict::Accept) decides the outcome.
//!
//! | Filter | Applies to | Verdict on match |
//! |--------|------------|------------------|
//! | [`Filter::Extensions`] | files | `SkipFile` when the extension is not allowed |
//! | [`Filter::Hidden`] | files and directories | `SkipSubtree` / `SkipFile` |
//! | [`Filter::IgnoreRegex`] | files | `SkipFile` |
//! | [`Filter::Gitignore`] | files and directories | `SkipSubtree` / `SkipFile` |
//!
//! Directories listed in [`PRUNED_DIRS`] are pruned by the extractor before
//! any filter runs.

use globset::{Glob, GlobSet, GlobSetBuilder};
use regex::Regex;
use std::collections::HashSet;
use std::path::{Component, Path};

use crate::error::ExtractError;

/// Directory names that are never descended into.
pub const PRUNED_DIRS: &[&str] = &[".git", ".hg", ".svn", "node_modules"];

/// Outcome of evaluating a filter against one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    /// Exclude this entry only.
    SkipFile,
    /// Exclude this entry and, for a directory, everything beneath it.
    SkipSubtree,
}

/// A filesystem entry being considered by the walk.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    /// Absolute path of the entry.
    pub path: &'a Path,
    /// Path relative to the walk root.
    pub relative: &'a Path,
    pub is_dir: bool,
}

/// Enumerated filter configuration, validated once by [`FilterChain::from_options`].
#[derive(Debug, Clone, Default)]
pub struct FilterOptions {
    /// Allowed file extensions, case-insensitive, with or without the leading dot.
    /// Empty means every extension is accepted.
    pub extensions: Vec<String>,
    pub ignore_hidden: bool,
    /// Regular expressions matched against the absolute path of each file.
    pub ignore_patterns: Vec<String>,
    /// Patterns from `.gitignore` at the walk root. Loaded by the caller.
    pub gitignore_patterns: Vec<String>,
}

/// A single predicate in a [`FilterChain`].
#[derive(Debug, Clone)]
pub enum Filter {
    Extensions(HashSet<String>),
    Hidden,
    IgnoreRegex(Vec<Regex>),
    Gitignore(GlobSet),
}

impl Filter {
    /// Build an extension filter. Entries are lower-cased and stripped of a leading dot.
    pub fn extensions<I, S>(exts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Filter::Extensions(
            exts.into_iter()
                .map(|e| e.as_ref().trim_start_matches('.').to_lowercase())
                .filter(|e| !e.is_empty())
                .collect(),
        )
    }

    /// Compile regex ignore patterns. A malformed pattern is a configuration error.
    pub fn ignore_regex<I, S>(patterns: I) -> Result<Self, ExtractError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let regexes = patterns
            .into_iter()
            .map(|p| {
                Regex::new(p.as_ref()).map_err(|e| {
                    ExtractError::Config(format!("invalid ignore pattern '{}': {}", p.as_ref(), e))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Filter::IgnoreRegex(regexes))
    }

    /// Compile `.gitignore`-style lines into a glob set.
    ///
    /// Blank lines, `#` comments and `!` negations are dropped. A pattern
    /// without an inner `/` matches at any depth; every pattern also matches
    /// everything beneath a matching directory.
    pub fn gitignore<I, S>(lines: I) -> Result<Self, ExtractError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut builder = GlobSetBuilder::new();
        for line in lines {
            let line = line.as_ref().trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }
            let anchored = line.starts_with('/');
            let pattern = line.trim_start_matches('/').trim_end_matches('/');
            if pattern.is_empty() {
                continue;
            }

            let mut globs = vec![pattern.to_string(), format!("{}/**", pattern)];
            if !anchored && !pattern.contains('/') {
                globs.push(format!("**/{}", pattern));
                globs.push(format!("**/{}/**", pattern));
            }
            for glob in globs {
                let compiled = Glob::new(&glob).map_err(|e| {
                    ExtractError::Config(format!("invalid .gitignore pattern '{}': {}", line, e))
                })?;
                builder.add(compiled);
            }
        }
        let set = builder
            .build()
            .map_err(|e| ExtractError::Config(format!("invalid .gitignore patterns: {}", e)))?;
        Ok(Filter::Gitignore(set))
    }

    pub fn evaluate(&self, candidate: &Candidate<'_>) -> Verdict {
        match self {
            Filter::Extensions(allowed) => {
                if candidate.is_dir {
                    return Verdict::Accept;
                }
                let ext = candidate
                    .path
                    .extension()
                    .map(|e| e.to_string_lossy().to_lowercase());
                match ext {
                    Some(ext) if allowed.contains(&ext) => Verdict::Accept,
                    _ => Verdict::SkipFile,
                }
            }
            Filter::Hidden => hidden_verdict(candidate),
            Filter::IgnoreRegex(regexes) => {
                if candidate.is_dir {
                    return Verdict::Accept;
                }
                let path = candidate.path.to_string_lossy();
                if regexes.iter().any(|r| r.is_match(&path)) {
                    Verdict::SkipFile
                } else {
                    Verdict::Accept
                }
            }
            Filter::Gitignore(set) => {
                if set.is_match(candidate.relative) {
                    skip_entry(candidate)
                } else {
                    Verdict::Accept
                }
            }
        }
    }
}

fn skip_entry(candidate: &Candidate<'_>) -> Verdict {
    if candidate.is_dir {
        Verdict::SkipSubtree
    } else {
        Verdict::SkipFile
    }
}

fn is_hidden_name(name: &std::ffi::OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

fn hidden_verdict(candidate: &Candidate<'_>) -> Verdict {
    let names: Vec<_> = candidate
        .relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(name) => Some(name),
            _ => None,
        })
        .collect();

    let Some((leaf, parents)) = names.split_last() else {
        return Verdict::Accept;
    };
    if parents.iter().any(|n| is_hidden_name(n)) {
        return Verdict::SkipSubtree;
    }
    if is_hidden_name(leaf) {
        return skip_entry(candidate);
    }
    Verdict::Accept
}

/// Ordered, immutable sequence of filters.
#[derive(Debug, Clone, Default)]
pub struct FilterChain {
    filters: Vec<Filter>,
}

impl FilterChain {
    pub fn new(filters: Vec<Filter>) -> Self {
        Self { filters }
    }

    /// Build the chain for a set of options.
    ///
    /// Registration order: hidden, gitignore, regex, extensions.
    pub fn from_options(options: &FilterOptions) -> Result<Self, ExtractError> {
        let mut filters = Vec::new();
        if options.ignore_hidden {
            filters.push(Filter::Hidden);
        }
        if !options.gitignore_patterns.is_empty() {
            filters.push(Filter::gitignore(&options.gitignore_patterns)?);
        }
        if !options.ignore_patterns.is_empty() {
            filters.push(Filter::ignore_regex(&options.ignore_patterns)?);
        }
        if !options.extensions.is_empty() {
            filters.push(Filter::extensions(&options.extensions));
        }
        Ok(Self { filters })
    }

    /// Run every filter in order, stopping at the first non-accepting verdict.
    pub fn evaluate(&self, candidate: &Candidate<'_>) -> Verdict {
        for filter in &self.filters {
            let verdict = filter.evaluate(candidate);
            if verdict != Verdict::Accept {
                return verdict;
            }
        }
        Verdict::Accept
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

/// Read `.gitignore` lines from `root`, or nothing when the file is absent.
pub fn read_gitignore(root: &Path) -> Vec<String> {
    match std::fs::read_to_string(root.join(".gitignore")) {
        Ok(content) => content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .map(String::from)
            .collect(),
        Err(_) => Vec::new(),
    }
}

//! Lexical resolution of request paths under the served root.
//!
//! Resolution never touches the filesystem: `.` and `..` segments are
//! dropped rather than navigated, and the joined result is checked to be a
//! component-wise descendant of the root before it is returned. Shared
//! assets (the landing page, the player script) are looked up at the root
//! no matter which stream directory they were requested from.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use crate::{Error, Result, StreamId};

/// Outcome of resolving a request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    /// Absolute filesystem path to serve.
    pub path: PathBuf,
    /// Stream to tune before serving, when the request named a tune document
    /// inside a directory.
    pub tune: Option<StreamId>,
}

/// Maps request paths onto a fixed served root.
#[derive(Debug, Clone)]
pub struct PathResolver {
    root: PathBuf,
    default_document: String,
    tune_documents: HashSet<String>,
    shared: HashSet<String>,
}

impl PathResolver {
    /// Create a resolver for an absolute root.
    ///
    /// The default document is appended to directory requests and is always
    /// a tune document.
    pub fn new<P: Into<PathBuf>, S: Into<String>>(root: P, default_document: S) -> Result<Self> {
        let root = root.into();
        if !root.is_absolute() {
            return Err(Error::invalid_input(format!(
                "served root must be absolute: {}",
                root.display()
            )));
        }

        let default_document = default_document.into();
        if default_document.is_empty() || default_document.contains('/') {
            return Err(Error::invalid_input(format!(
                "default document must be a bare file name: {default_document:?}"
            )));
        }

        let mut tune_documents = HashSet::new();
        tune_documents.insert(default_document.clone());

        Ok(Self {
            root,
            default_document,
            tune_documents,
            shared: HashSet::new(),
        })
    }

    /// File names served from the root regardless of the requested directory.
    #[must_use]
    pub fn with_shared_resources<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.shared.extend(names.into_iter().map(Into::into));
        self
    }

    /// Additional file names that trigger tuning of their parent directory.
    #[must_use]
    pub fn with_tune_documents<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tune_documents
            .extend(names.into_iter().map(Into::into));
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn default_document(&self) -> &str {
        &self.default_document
    }

    pub fn is_shared(&self, name: &str) -> bool {
        self.shared.contains(name)
    }

    /// Resolve an already percent-decoded request path.
    ///
    /// The path is taken literally: `?` and `#` are ordinary file name
    /// characters here, so strip any query before decoding.
    pub fn resolve(&self, path: &str) -> Result<Resolved> {
        if path.contains('\0') {
            return Err(Error::PathTraversal(path.escape_default().to_string()));
        }

        let mut segments: Vec<&str> = path
            .split('/')
            .filter(|s| !matches!(*s, "" | "." | ".."))
            .collect();

        if path.ends_with('/') || segments.is_empty() {
            segments.push(&self.default_document);
        }

        let mut resolved = self.root.clone();
        for segment in &segments {
            resolved.push(segment);
        }

        if !is_descendant(&self.root, &resolved) {
            return Err(Error::PathTraversal(path.to_string()));
        }

        // Non-empty: a directory request pushed the default document above.
        let file_name = segments[segments.len() - 1];

        let tune = match segments.len() {
            n if n >= 2 && self.tune_documents.contains(file_name) => {
                Some(StreamId::new(segments[n - 2]))
            }
            _ => None,
        };

        if self.is_shared(file_name) {
            resolved = self.root.join(file_name);
        }

        Ok(Resolved {
            path: resolved,
            tune,
        })
    }
}

/// Strict lexical containment: `path` lies below `root` and contains no
/// component that could climb back out.
fn is_descendant(root: &Path, path: &Path) -> bool {
    let Ok(rest) = path.strip_prefix(root) else {
        return false;
    };

    let mut components = rest.components().peekable();
    if components.peek().is_none() {
        return false;
    }

    components.all(|c| matches!(c, Component::Normal(_)))
}

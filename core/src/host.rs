//! Interfaces to the host editor and workspace
//!
//! The pipeline only needs line text by row, the last row of a buffer and
//! path/project resolution. [`TextBuffer`] and [`ProjectSet`] are the plain
//! implementations used by the CLI and the tests.

use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// Read access to one text buffer
pub trait HostBuffer: Send + Sync {
    /// Path of the file backing the buffer, if any
    fn file_path(&self) -> Option<PathBuf>;

    fn line_count(&self) -> usize;

    fn line_text(&self, row: u32) -> Option<String>;

    fn last_row(&self) -> u32 {
        self.line_count().saturating_sub(1) as u32
    }

    /// Bumped on every content change
    fn revision(&self) -> u64;
}

#[derive(Debug)]
struct BufferContent {
    lines: Vec<String>,
    revision: u64,
}

/// In-memory buffer
#[derive(Debug)]
pub struct TextBuffer {
    path: Option<PathBuf>,
    content: RwLock<BufferContent>,
}

impl TextBuffer {
    pub fn from_text(text: &str) -> Self {
        Self {
            path: None,
            content: RwLock::new(BufferContent {
                lines: split_lines(text),
                revision: 0,
            }),
        }
    }

    pub fn with_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Read a file into a buffer
    pub async fn open<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path).await?;
        Ok(Self::from_text(&text).with_path(path))
    }

    /// Replace the whole content
    pub fn set_text(&self, text: &str) {
        let mut content = self.content.write().unwrap_or_else(|e| e.into_inner());
        content.lines = split_lines(text);
        content.revision += 1;
    }
}

impl HostBuffer for TextBuffer {
    fn file_path(&self) -> Option<PathBuf> {
        self.path.clone()
    }

    fn line_count(&self) -> usize {
        self.content
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .lines
            .len()
    }

    fn line_text(&self, row: u32) -> Option<String> {
        self.content
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .lines
            .get(row as usize)
            .cloned()
    }

    fn revision(&self) -> u64 {
        self.content
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .revision
    }
}

pub(crate) fn split_lines(text: &str) -> Vec<String> {
    text.lines().map(str::to_string).collect()
}

/// A workspace root and its display name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub root: PathBuf,
    pub name: String,
}

/// Path and project resolution
pub trait ProjectResolver: Send + Sync {
    /// Owning project of `path`
    fn project_for(&self, path: &Path) -> Option<Project>;

    /// Workspace-relative display path
    fn relativize(&self, path: &Path) -> String;

    fn projects(&self) -> Vec<Project>;
}

/// Fixed list of project roots
#[derive(Debug, Clone, Default)]
pub struct ProjectSet {
    projects: Vec<Project>,
}

impl ProjectSet {
    pub fn new<I, P>(roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let projects = roots
            .into_iter()
            .map(|root| {
                let root = root.into();
                let name = root
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| root.display().to_string());
                Project { root, name }
            })
            .collect();
        Self { projects }
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }
}

impl ProjectResolver for ProjectSet {
    fn project_for(&self, path: &Path) -> Option<Project> {
        // nested roots resolve to the deepest one
        self.projects
            .iter()
            .filter(|p| path.starts_with(&p.root))
            .max_by_key(|p| p.root.components().count())
            .cloned()
    }

    fn relativize(&self, path: &Path) -> String {
        match self.project_for(path) {
            Some(project) => path
                .strip_prefix(&project.root)
                .map(|rel| {
                    rel.components()
                        .map(|c| c.as_os_str().to_string_lossy())
                        .collect::<Vec<_>>()
                        .join("/")
                })
                .unwrap_or_else(|_| path.display().to_string()),
            None => path.display().to_string(),
        }
    }

    fn projects(&self) -> Vec<Project> {
        self.projects.clone()
    }
}

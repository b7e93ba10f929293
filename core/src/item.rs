//! Item data model shared by sources, the reducer pipeline and the item store

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::{Path, PathBuf};

/// A zero-based source location
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Point {
    pub row: u32,
    pub column: u32,
}

impl Point {
    pub fn new(row: u32, column: u32) -> Self {
        Self { row, column }
    }
}

impl PartialOrd for Point {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Point {
    fn cmp(&self, other: &Self) -> Ordering {
        self.row
            .cmp(&other.row)
            .then_with(|| self.column.cmp(&other.column))
    }
}

/// A source match span
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub start: Point,
    pub end: Point,
}

impl Range {
    pub fn new(start: Point, end: Point) -> Self {
        Self { start, end }
    }
}

/// Kind of a synthetic grouping row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HeaderKind {
    Project,
    File,
}

/// Header payload for synthetic rows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub kind: HeaderKind,
    /// Rendered display text
    pub text: String,
    /// Project root this header groups (project headers only)
    pub project_root: Option<PathBuf>,
}

/// One addressable result row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Raw display text, pre-truncation
    pub text: String,

    /// Source location
    pub point: Point,

    /// Match span when the source supports ranges
    pub range: Option<Range>,

    /// Owning file; absent only for single-buffer sources
    pub file_path: Option<PathBuf>,

    /// Synthetic rows (prompt, headers) are excluded from counts and navigation
    pub skip: bool,

    pub header: Option<Header>,

    /// Assigned `"<row>: "` style prefix
    #[serde(default)]
    pub line_header: Option<String>,

    /// Row index in the item store; assigned on insertion
    #[serde(skip)]
    pub row: usize,
}

impl Item {
    /// Create a normal item at the given point
    pub fn new<S: Into<String>>(text: S, point: Point) -> Self {
        Self {
            text: text.into(),
            point,
            range: None,
            file_path: None,
            skip: false,
            header: None,
            line_header: None,
            row: 0,
        }
    }

    pub fn with_file_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.file_path = Some(path.into());
        self
    }

    pub fn with_range(mut self, range: Range) -> Self {
        self.range = Some(range);
        self
    }

    /// The synthetic row reserved at index 0 of every item store
    pub fn prompt() -> Self {
        Self {
            text: String::new(),
            point: Point::default(),
            range: None,
            file_path: None,
            skip: true,
            header: None,
            line_header: None,
            row: 0,
        }
    }

    /// A synthetic project header row
    pub fn project_header<S: Into<String>>(text: S, project_root: PathBuf) -> Self {
        let text = text.into();
        Self {
            text: text.clone(),
            point: Point::default(),
            range: None,
            file_path: None,
            skip: true,
            header: Some(Header {
                kind: HeaderKind::Project,
                text,
                project_root: Some(project_root),
            }),
            line_header: None,
            row: 0,
        }
    }

    /// A synthetic file header row
    pub fn file_header<S: Into<String>>(text: S, file_path: PathBuf) -> Self {
        let text = text.into();
        Self {
            text: text.clone(),
            point: Point::default(),
            range: None,
            file_path: Some(file_path),
            skip: true,
            header: Some(Header {
                kind: HeaderKind::File,
                text,
                project_root: None,
            }),
            line_header: None,
            row: 0,
        }
    }

    /// Addressable, selectable row
    pub fn is_normal(&self) -> bool {
        !self.skip
    }

    pub fn is_header(&self) -> bool {
        self.header.is_some()
    }

    pub fn is_project_header(&self) -> bool {
        matches!(&self.header, Some(h) if h.kind == HeaderKind::Project)
    }

    pub fn is_file_header(&self) -> bool {
        matches!(&self.header, Some(h) if h.kind == HeaderKind::File)
    }

    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    pub fn belongs_to(&self, path: &Path) -> bool {
        self.file_path.as_deref() == Some(path)
    }

    /// Cross-refresh identity: same file and same point
    pub fn same_location(&self, other: &Item) -> bool {
        self.file_path == other.file_path && self.point == other.point
    }
}

//! The item reducer: an ordered list of stages folded over a per-refresh state
//!
//! Each batch from a source becomes the state's `source_items` and `items`,
//! then every enabled stage runs in order and its patch is merged back. The
//! working `items` are what the store shows for the batch; `all_items`
//! collects the raw (unfiltered, header-free) items that become the cache.

pub mod headers;
pub mod stages;

pub use headers::{HeaderTemplates, LineHeaderWidth};

use crate::host::ProjectResolver;
use crate::item::Item;
use crate::query::FilterSpec;
use crate::source::SourceCapabilities;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

/// Rows and cache of a file-scoped refresh in progress
#[derive(Debug, Clone)]
pub struct SpliceState {
    pub file_path: PathBuf,
    /// Rows rendered before the refresh, prompt excluded
    pub previous_rows: Vec<Item>,
    pub previous_cache: Vec<Item>,
    /// Rendered rows for the file gathered so far
    pub new_rows: Vec<Item>,
    pub new_raw: Vec<Item>,
}

/// Working state of one refresh
#[derive(Debug, Clone, Default)]
pub struct PipelineState {
    pub filter_spec: FilterSpec,
    pub file_filter: Option<FilterSpec>,
    pub excluded_files: HashSet<PathBuf>,

    /// The batch was replayed from the cache
    pub from_cache: bool,

    /// Current batch as produced by the source
    pub source_items: Vec<Item>,
    /// Current batch after the stages that ran so far
    pub items: Vec<Item>,
    pub all_items: Vec<Item>,

    /// Path exclusion removed something this refresh
    pub items_excluded: bool,

    pub max_row_hint: Option<u32>,
    pub max_row_seen: Option<u32>,
    pub max_column_seen: Option<u32>,

    pub project_headers: HashSet<PathBuf>,
    pub file_headers: HashSet<PathBuf>,

    pub splice: Option<SpliceState>,
    /// Full row list produced by the splice stage
    pub rendered: Option<Vec<Item>>,
}

impl PipelineState {
    pub fn new(filter_spec: FilterSpec) -> Self {
        Self {
            filter_spec,
            ..Default::default()
        }
    }

    pub fn with_file_filter(mut self, file_filter: Option<FilterSpec>) -> Self {
        self.file_filter = file_filter.filter(|f| !f.is_empty());
        self
    }

    pub fn with_excluded_files(mut self, excluded: HashSet<PathBuf>) -> Self {
        self.excluded_files = excluded;
        self
    }

    pub fn with_max_row_hint(mut self, max_row: Option<u32>) -> Self {
        self.max_row_hint = max_row;
        self
    }

    /// Turn this refresh into a partial one for `file_path`
    pub fn prepare_splice(
        &mut self,
        file_path: PathBuf,
        previous_rows: Vec<Item>,
        previous_cache: Vec<Item>,
    ) {
        for row in &previous_rows {
            if let Some(header) = &row.header {
                if let Some(root) = &header.project_root {
                    self.project_headers.insert(root.clone());
                }
            }
            if row.is_file_header() {
                if let Some(path) = row.file_path().filter(|p| *p != file_path.as_path()) {
                    self.file_headers.insert(path.to_path_buf());
                }
            }
        }

        let normal = previous_cache.iter().filter(|i| i.is_normal());
        self.max_row_seen = normal.clone().map(|i| i.point.row).max();
        self.max_column_seen = normal.map(|i| i.point.column).max();

        self.splice = Some(SpliceState {
            file_path,
            previous_rows,
            previous_cache,
            new_rows: Vec::new(),
            new_raw: Vec::new(),
        });
    }

    /// Merge a stage's patch
    pub fn apply(&mut self, patch: StatePatch) {
        let StatePatch {
            items,
            source_items,
            all_items,
            items_excluded,
            max_row_seen,
            max_column_seen,
            project_headers,
            file_headers,
            splice,
            rendered,
        } = patch;

        if let Some(items) = items {
            self.items = items;
        }
        if let Some(source_items) = source_items {
            self.source_items = source_items;
        }
        if let Some(all_items) = all_items {
            self.all_items = all_items;
        }
        if let Some(excluded) = items_excluded {
            self.items_excluded = excluded;
        }
        if max_row_seen.is_some() {
            self.max_row_seen = max_row_seen;
        }
        if max_column_seen.is_some() {
            self.max_column_seen = max_column_seen;
        }
        if let Some(headers) = project_headers {
            self.project_headers = headers;
        }
        if let Some(headers) = file_headers {
            self.file_headers = headers;
        }
        if splice.is_some() {
            self.splice = splice;
        }
        if rendered.is_some() {
            self.rendered = rendered;
        }
    }
}

/// Fields changed by one stage
#[derive(Debug, Clone, Default)]
pub struct StatePatch {
    pub items: Option<Vec<Item>>,
    pub source_items: Option<Vec<Item>>,
    pub all_items: Option<Vec<Item>>,
    pub items_excluded: Option<bool>,
    pub max_row_seen: Option<u32>,
    pub max_column_seen: Option<u32>,
    pub project_headers: Option<HashSet<PathBuf>>,
    pub file_headers: Option<HashSet<PathBuf>>,
    pub splice: Option<SpliceState>,
    pub rendered: Option<Vec<Item>>,
}

/// Shared inputs of the stages
#[derive(Clone)]
pub struct ReducerContext {
    pub resolver: Arc<dyn ProjectResolver>,
    pub templates: Arc<HeaderTemplates>,
    pub show_column: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    PathExclusion,
    TextFilter,
    LineHeader,
    ProjectHeader,
    FileHeader,
    IncrementalSplice,
    CollectAll,
}

impl Stage {
    pub fn run(self, state: &PipelineState, context: &ReducerContext) -> Option<StatePatch> {
        match self {
            Stage::PathExclusion => stages::path_exclusion(state, context),
            Stage::TextFilter => stages::text_filter(state, context),
            Stage::LineHeader => stages::line_header(state, context),
            Stage::ProjectHeader => stages::project_header(state, context),
            Stage::FileHeader => stages::file_header(state, context),
            Stage::IncrementalSplice => stages::incremental_splice(state, context),
            Stage::CollectAll => stages::collect_all(state, context),
        }
    }
}

/// Ordered stages plus their shared context
#[derive(Clone)]
pub struct ItemReducer {
    stages: Vec<Stage>,
    context: ReducerContext,
}

impl ItemReducer {
    pub fn new(stages: Vec<Stage>, context: ReducerContext) -> Self {
        Self { stages, context }
    }

    /// Stages enabled for a source, in pipeline order
    pub fn for_capabilities(capabilities: &SourceCapabilities, context: ReducerContext) -> Self {
        let candidates = [
            (Stage::PathExclusion, !capabilities.bound_to_single_file),
            (Stage::TextFilter, true),
            (Stage::LineHeader, capabilities.show_line_header),
            (Stage::ProjectHeader, capabilities.show_project_header),
            (Stage::FileHeader, capabilities.show_file_header),
            (Stage::IncrementalSplice, capabilities.supports_file_scoped_refresh),
            (Stage::CollectAll, true),
        ];
        let stages = candidates
            .into_iter()
            .filter_map(|(stage, enabled)| enabled.then_some(stage))
            .collect();
        Self::new(stages, context)
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Fold one batch through every stage
    pub fn reduce(&self, state: &mut PipelineState, batch: Vec<Item>) {
        state.items = batch.clone();
        state.source_items = batch;

        for stage in &self.stages {
            if let Some(patch) = stage.run(state, &self.context) {
                state.apply(patch);
            }
        }
    }
}

//! Reducer stages
//!
//! Each stage reads the state and returns the fields it changes, or `None`
//! when it has nothing to do. Header stages consult the "already inserted"
//! sets, so running a stage twice over the same input inserts nothing new.

use super::headers::LineHeaderWidth;
use super::{PipelineState, ReducerContext, SpliceState, StatePatch};
use crate::item::Item;
use std::borrow::Cow;
use std::path::Path;

/// Drop items of excluded files, then apply the file path filter
pub fn path_exclusion(state: &PipelineState, context: &ReducerContext) -> Option<StatePatch> {
    if state.excluded_files.is_empty() && state.file_filter.is_none() {
        return None;
    }

    let before = state.items.len();
    let mut items: Vec<Item> = state
        .items
        .iter()
        .filter(|item| {
            !item
                .file_path()
                .is_some_and(|path| state.excluded_files.contains(path))
        })
        .cloned()
        .collect();

    if let Some(filter) = &state.file_filter {
        items = filter.filter_items(&items, |item| {
            Cow::Owned(
                item.file_path()
                    .map(|path| context.resolver.relativize(path))
                    .unwrap_or_default(),
            )
        });
    }

    let removed = items.len() < before;
    Some(StatePatch {
        items: Some(items),
        items_excluded: Some(state.items_excluded || removed),
        ..Default::default()
    })
}

pub fn text_filter(state: &PipelineState, _context: &ReducerContext) -> Option<StatePatch> {
    if state.filter_spec.is_empty() {
        return None;
    }

    let items = state
        .filter_spec
        .filter_items(&state.items, |item| Cow::Borrowed(item.text.as_str()));
    Some(StatePatch {
        items: Some(items),
        ..Default::default()
    })
}

/// Assign `<row>: ` prefixes to the working items and the raw batch
pub fn line_header(state: &PipelineState, context: &ReducerContext) -> Option<StatePatch> {
    if state.from_cache {
        return None;
    }

    let normal: Vec<&Item> = state.source_items.iter().filter(|i| i.is_normal()).collect();
    let batch_max_row = normal.iter().map(|i| i.point.row).max();
    let max_row = [state.max_row_hint, state.max_row_seen, batch_max_row]
        .into_iter()
        .flatten()
        .max()?;

    let max_column = context.show_column.then(|| {
        [state.max_column_seen, normal.iter().map(|i| i.point.column).max()]
            .into_iter()
            .flatten()
            .max()
            .unwrap_or(0)
    });

    let width = LineHeaderWidth::for_max(max_row, max_column);
    let assign = |item: &Item| {
        let mut item = item.clone();
        if item.is_normal() {
            item.line_header = Some(width.format(item.point.row, item.point.column));
        }
        item
    };

    Some(StatePatch {
        items: Some(state.items.iter().map(assign).collect()),
        source_items: Some(state.source_items.iter().map(assign).collect()),
        max_row_seen: Some(max_row),
        max_column_seen: max_column,
        ..Default::default()
    })
}

pub fn project_header(state: &PipelineState, context: &ReducerContext) -> Option<StatePatch> {
    let mut inserted = state.project_headers.clone();
    let mut items = Vec::with_capacity(state.items.len());
    let mut changed = false;

    for item in &state.items {
        if item.is_normal() {
            let project = item
                .file_path()
                .and_then(|path| context.resolver.project_for(path));
            if let Some(project) = project {
                if inserted.insert(project.root.clone()) {
                    let text = context.templates.render_project(&project);
                    items.push(Item::project_header(text, project.root));
                    changed = true;
                }
            }
        }
        items.push(item.clone());
    }

    changed.then(|| StatePatch {
        items: Some(items),
        project_headers: Some(inserted),
        ..Default::default()
    })
}

pub fn file_header(state: &PipelineState, context: &ReducerContext) -> Option<StatePatch> {
    let mut inserted = state.file_headers.clone();
    let mut items = Vec::with_capacity(state.items.len());
    let mut changed = false;

    for item in &state.items {
        if item.is_normal() {
            if let Some(path) = item.file_path() {
                if inserted.insert(path.to_path_buf()) {
                    let text = context
                        .templates
                        .render_file(&context.resolver.relativize(path), path);
                    items.push(Item::file_header(text, path.to_path_buf()));
                    changed = true;
                }
            }
        }
        items.push(item.clone());
    }

    changed.then(|| StatePatch {
        items: Some(items),
        file_headers: Some(inserted),
        ..Default::default()
    })
}

/// Replace the changed file's run in the previous rows and the cache
pub fn incremental_splice(state: &PipelineState, _context: &ReducerContext) -> Option<StatePatch> {
    let splice = state.splice.as_ref()?;

    let mut new_rows = splice.new_rows.clone();
    new_rows.extend(state.items.iter().cloned());
    let mut new_raw = splice.new_raw.clone();
    new_raw.extend(state.source_items.iter().filter(|i| i.is_normal()).cloned());

    let rendered = replace_file_run(&splice.previous_rows, &splice.file_path, &new_rows);
    let all_items = replace_file_run(&splice.previous_cache, &splice.file_path, &new_raw);

    Some(StatePatch {
        rendered: Some(rendered),
        all_items: Some(all_items),
        splice: Some(SpliceState {
            new_rows,
            new_raw,
            ..splice.clone()
        }),
        ..Default::default()
    })
}

/// Accumulate the raw normal items as the next cache
pub fn collect_all(state: &PipelineState, _context: &ReducerContext) -> Option<StatePatch> {
    if state.splice.is_some() {
        return None;
    }

    let mut all_items = state.all_items.clone();
    all_items.extend(state.source_items.iter().filter(|i| i.is_normal()).cloned());
    Some(StatePatch {
        all_items: Some(all_items),
        ..Default::default()
    })
}

/// Swap the first contiguous run of `path`'s rows for `replacement`;
/// append when `path` has no rows
pub fn replace_file_run(rows: &[Item], path: &Path, replacement: &[Item]) -> Vec<Item> {
    let Some(start) = rows.iter().position(|item| item.belongs_to(path)) else {
        let mut result = rows.to_vec();
        result.extend(replacement.iter().cloned());
        return result;
    };
    let end = rows[start..]
        .iter()
        .position(|item| !item.belongs_to(path))
        .map_or(rows.len(), |offset| start + offset);

    let mut result = Vec::with_capacity(rows.len() - (end - start) + replacement.len());
    result.extend(rows[..start].iter().cloned());
    result.extend(replacement.iter().cloned());
    result.extend(rows[end..].iter().cloned());
    result
}

//! Ordered row list with selection and circular navigation
//!
//! Row 0 is always the prompt pseudo-item; every other row is a normal item
//! or a header. An item's `row` field always equals its index.

use crate::error::StoreError;
use crate::events::{EventBus, NarrowEvent};
use crate::item::{Item, Point};
use std::borrow::Cow;
use std::ops::Range;
use std::path::Path;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Previous,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FindOptions {
    pub direction: Direction,
    /// Test the start row first instead of last
    pub include_start_row: bool,
}

impl FindOptions {
    pub fn next() -> Self {
        Self {
            direction: Direction::Next,
            include_start_row: false,
        }
    }

    pub fn previous() -> Self {
        Self {
            direction: Direction::Previous,
            include_start_row: false,
        }
    }

    pub fn including_start(mut self) -> Self {
        self.include_start_row = true;
        self
    }
}

/// One row prepared for display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedRow {
    pub row: usize,
    pub text: String,
    pub truncated: bool,
    pub is_header: bool,
    pub selected: bool,
}

#[derive(Debug)]
pub struct ItemStore {
    items: Vec<Item>,
    selected_row: Option<usize>,
    previously_selected: Option<Item>,
    destroyed: bool,
    events: EventBus,
}

impl ItemStore {
    pub fn new(events: EventBus) -> Self {
        Self {
            items: vec![Item::prompt()],
            selected_row: None,
            previously_selected: None,
            destroyed: false,
            events,
        }
    }

    fn ensure_alive(&self) -> StoreResult<()> {
        if self.destroyed {
            Err(StoreError::Destroyed)
        } else {
            Ok(())
        }
    }

    /// Append rows; returns the row range they occupy
    pub fn add_items(&mut self, batch: Vec<Item>) -> StoreResult<Range<usize>> {
        self.ensure_alive()?;
        let start = self.items.len();
        for (offset, mut item) in batch.into_iter().enumerate() {
            item.row = start + offset;
            self.items.push(item);
        }
        Ok(start..self.items.len())
    }

    /// Truncate to the prompt row; the selection is remembered as previous
    pub fn reset(&mut self) -> StoreResult<()> {
        self.ensure_alive()?;
        if let Some(item) = self.selected_item().cloned() {
            self.previously_selected = Some(item);
        }
        self.items.truncate(1);
        self.selected_row = None;
        Ok(())
    }

    /// Reset, then add `rows`
    pub fn replace_items(&mut self, rows: Vec<Item>) -> StoreResult<Range<usize>> {
        self.reset()?;
        self.add_items(rows)
    }

    pub fn destroy(&mut self) {
        self.items.truncate(1);
        self.selected_row = None;
        self.destroyed = true;
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Row count including the prompt
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True when only the prompt row is present
    pub fn is_empty(&self) -> bool {
        self.items.len() <= 1
    }

    /// Rows after the prompt
    pub fn items(&self) -> &[Item] {
        &self.items[1..]
    }

    pub fn item_for_row(&self, row: usize) -> Option<&Item> {
        self.items.get(row)
    }

    pub fn is_prompt_row(&self, row: usize) -> bool {
        row == 0
    }

    pub fn normal_items(&self, file_path: Option<&Path>) -> Vec<&Item> {
        self.items
            .iter()
            .filter(|item| item.is_normal())
            .filter(|item| file_path.map_or(true, |path| item.belongs_to(path)))
            .collect()
    }

    pub fn normal_item_count(&self) -> usize {
        self.items.iter().filter(|item| item.is_normal()).count()
    }

    pub fn has_normal_item(&self) -> bool {
        self.items.iter().any(|item| item.is_normal())
    }

    pub fn selected_row(&self) -> Option<usize> {
        self.selected_row
    }

    pub fn selected_item(&self) -> Option<&Item> {
        self.selected_row.and_then(|row| self.items.get(row))
    }

    pub fn previously_selected_item(&self) -> Option<&Item> {
        self.previously_selected.as_ref()
    }

    /// Select a normal row; selecting the prompt or a header is a contract breach
    pub fn select_row(&mut self, row: usize) -> StoreResult<()> {
        self.ensure_alive()?;
        let item = self.items.get(row).ok_or(StoreError::RowOutOfRange {
            row,
            len: self.items.len(),
        })?;
        if item.skip {
            return Err(StoreError::NotSelectable { row });
        }

        if self.selected_row != Some(row) {
            if let Some(previous) = self.selected_item().cloned() {
                self.previously_selected = Some(previous);
            }
            self.selected_row = Some(row);
            self.events.emit(NarrowEvent::SelectionChanged { row });
        }
        Ok(())
    }

    /// Select `item`; headers are ignored and return `Ok(false)`
    pub fn select_item(&mut self, item: &Item) -> StoreResult<bool> {
        self.ensure_alive()?;
        if item.skip {
            return Ok(false);
        }

        let row = match self.items.get(item.row) {
            Some(current) if current.is_normal() && current.same_location(item) => Some(item.row),
            _ => self.find_equal_location_item(item),
        };
        match row {
            Some(row) => self.select_row(row).map(|_| true),
            None => Ok(false),
        }
    }

    /// Walk rows circularly from `start_row` until `predicate` matches
    pub fn find_item<P>(
        &self,
        start_row: usize,
        options: FindOptions,
        predicate: P,
    ) -> Option<usize>
    where
        P: Fn(&Item) -> bool,
    {
        let len = self.items.len();
        if len == 0 {
            return None;
        }
        let start = start_row % len;
        let offsets = if options.include_start_row { 0..len } else { 1..len + 1 };

        offsets
            .map(|offset| match options.direction {
                Direction::Next => (start + offset) % len,
                Direction::Previous => (start + len - offset % len) % len,
            })
            .find(|&row| predicate(&self.items[row]))
    }

    pub fn find_normal_item(&self, start_row: usize, options: FindOptions) -> Option<usize> {
        self.find_item(start_row, options, |item| item.is_normal())
    }

    /// Like [`Self::find_normal_item`] but the prompt row is also a stop
    pub fn find_prompt_or_normal_item(
        &self,
        start_row: usize,
        options: FindOptions,
    ) -> Option<usize> {
        self.find_item(start_row, options, |item| item.row == 0 || item.is_normal())
    }

    /// Next normal item in another file than the selected one
    pub fn find_different_file_item(&self, direction: Direction) -> Option<usize> {
        let start = self.selected_row.unwrap_or(0);
        let current = self.selected_item().and_then(|item| item.file_path.clone());
        let options = FindOptions {
            direction,
            include_start_row: false,
        };
        let found = self.find_item(start, options, |item| {
            item.is_normal() && item.file_path != current
        })?;

        if direction == Direction::Previous {
            // land on the first item of that file, not its last
            let file = self.items[found].file_path.clone();
            let mut row = found;
            while row > 1 {
                let previous = &self.items[row - 1];
                if !previous.is_normal() || previous.file_path != file {
                    break;
                }
                row -= 1;
            }
            return Some(row);
        }
        Some(found)
    }

    pub fn first_item_for_file(&self, path: &Path) -> Option<usize> {
        self.find_item(0, FindOptions::next(), |item| {
            item.is_normal() && item.belongs_to(path)
        })
    }

    /// Last normal item at or before `point`, else the first normal item
    pub fn find_closest_item_for_position(
        &self,
        point: Point,
        file_path: Option<&Path>,
    ) -> Option<usize> {
        let candidates = self.normal_items(file_path);
        candidates
            .iter()
            .rev()
            .find(|item| item.point <= point)
            .or_else(|| candidates.first())
            .map(|item| item.row)
    }

    pub fn find_equal_location_item(&self, item: &Item) -> Option<usize> {
        self.items
            .iter()
            .find(|candidate| candidate.is_normal() && candidate.same_location(item))
            .map(|candidate| candidate.row)
    }

    pub fn select_equal_location_item(&mut self, item: &Item) -> StoreResult<bool> {
        self.ensure_alive()?;
        match self.find_equal_location_item(item) {
            Some(row) => self.select_row(row).map(|_| true),
            None => Ok(false),
        }
    }

    pub fn select_first_normal_item(&mut self) -> StoreResult<bool> {
        self.ensure_alive()?;
        match self.find_normal_item(0, FindOptions::next()) {
            Some(row) => self.select_row(row).map(|_| true),
            None => Ok(false),
        }
    }

    /// Move the selection to the next/previous normal item
    pub fn select_next(&mut self, direction: Direction) -> StoreResult<Option<usize>> {
        self.ensure_alive()?;
        let options = FindOptions {
            direction,
            include_start_row: false,
        };
        let row = self.find_normal_item(self.selected_row.unwrap_or(0), options);
        if let Some(row) = row {
            self.select_row(row)?;
        }
        Ok(row)
    }

    pub fn select_different_file(&mut self, direction: Direction) -> StoreResult<Option<usize>> {
        self.ensure_alive()?;
        let row = self.find_different_file_item(direction);
        if let Some(row) = row {
            self.select_row(row)?;
        }
        Ok(row)
    }

    pub fn select_closest_item_for_position(
        &mut self,
        point: Point,
        file_path: Option<&Path>,
    ) -> StoreResult<Option<usize>> {
        self.ensure_alive()?;
        let row = self.find_closest_item_for_position(point, file_path);
        if let Some(row) = row {
            self.select_row(row)?;
        }
        Ok(row)
    }

    /// Rows `first_row..first_row + height`, clamped to the list
    pub fn window(&self, first_row: usize, height: usize) -> &[Item] {
        let start = first_row.min(self.items.len());
        let end = start.saturating_add(height).min(self.items.len());
        &self.items[start..end]
    }

    /// Display text of a row: line header plus text cut at `max_width` columns
    pub fn render_row(&self, row: usize, max_width: usize, indicator: &str) -> Option<RenderedRow> {
        let item = self.items.get(row)?;
        let (text, truncated) = truncate_to_width(&item.text, max_width, indicator);
        let text = match &item.line_header {
            Some(prefix) if item.is_normal() => format!("{}{}", prefix, text),
            _ => text.into_owned(),
        };

        Some(RenderedRow {
            row,
            text,
            truncated,
            is_header: item.is_header(),
            selected: self.selected_row == Some(row),
        })
    }
}

/// Cut `text` to at most `max_width` display columns, indicator included
pub fn truncate_to_width<'a>(
    text: &'a str,
    max_width: usize,
    indicator: &str,
) -> (Cow<'a, str>, bool) {
    if text.width() <= max_width {
        return (Cow::Borrowed(text), false);
    }

    let budget = max_width.saturating_sub(indicator.width());
    let mut width = 0;
    let mut end = 0;
    for (index, ch) in text.char_indices() {
        let char_width = ch.width().unwrap_or(0);
        if width + char_width > budget {
            break;
        }
        width += char_width;
        end = index + ch.len_utf8();
    }

    (Cow::Owned(format!("{}{}", &text[..end], indicator)), true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn store_with(items: Vec<Item>) -> ItemStore {
        let mut store = ItemStore::new(EventBus::default());
        store.add_items(items).unwrap();
        store
    }

    fn at(path: &str, row: u32) -> Item {
        Item::new(format!("{}:{}", path, row), Point::new(row, 0)).with_file_path(path)
    }

    fn grouped() -> ItemStore {
        store_with(vec![
            Item::file_header("## a", PathBuf::from("a")),
            at("a", 1),
            at("a", 5),
            Item::file_header("## b", PathBuf::from("b")),
            at("b", 2),
            at("b", 8),
        ])
    }

    #[test]
    fn test_rows_match_indices() {
        let mut store = grouped();
        assert!(store.items().iter().enumerate().all(|(i, item)| item.row == i + 1));
        assert_eq!(store.normal_item_count(), 4);

        let range = store.add_items(vec![at("c", 0)]).unwrap();
        assert_eq!(range, 7..8);
        store.reset().unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn test_find_item_wraps_both_ways() {
        let store = grouped();
        assert_eq!(store.find_normal_item(6, FindOptions::next()), Some(2));
        assert_eq!(store.find_normal_item(2, FindOptions::previous()), Some(6));
        assert_eq!(store.find_normal_item(2, FindOptions::next().including_start()), Some(2));
        assert_eq!(store.find_prompt_or_normal_item(6, FindOptions::next()), Some(0));
        assert_eq!(store.find_item(1, FindOptions::next(), |_| false), None);
    }

    #[test]
    fn test_start_row_checked_last() {
        let store = store_with(vec![at("a", 0)]);
        assert_eq!(store.find_normal_item(1, FindOptions::next()), Some(1));
    }

    #[test]
    fn test_different_file_navigation() {
        let mut store = grouped();
        store.select_row(2).unwrap();
        assert_eq!(store.select_different_file(Direction::Next).unwrap(), Some(5));
        assert_eq!(store.select_different_file(Direction::Previous).unwrap(), Some(2));
    }

    #[test]
    fn test_first_item_for_file() {
        let store = grouped();
        assert_eq!(store.first_item_for_file(Path::new("b")), Some(5));
        assert_eq!(store.first_item_for_file(Path::new("zz")), None);
    }

    #[test]
    fn test_closest_item_for_position() {
        let store = grouped();
        let closest = |row, path| {
            store.find_closest_item_for_position(Point::new(row, 0), Some(Path::new(path)))
        };
        assert_eq!(closest(6, "a"), Some(3));
        assert_eq!(closest(0, "b"), Some(5));
        assert_eq!(store.find_closest_item_for_position(Point::new(2, 0), None), Some(5));
    }

    #[test]
    fn test_selection_contract() {
        let mut store = grouped();
        let header = store.item_for_row(1).unwrap().clone();
        assert_eq!(store.select_item(&header), Ok(false));
        assert_eq!(store.select_row(1), Err(StoreError::NotSelectable { row: 1 }));
        assert_eq!(store.select_row(0), Err(StoreError::NotSelectable { row: 0 }));
        assert_eq!(store.select_row(42), Err(StoreError::RowOutOfRange { row: 42, len: 7 }));

        store.destroy();
        assert_eq!(store.select_first_normal_item(), Err(StoreError::Destroyed));
        assert_eq!(store.add_items(vec![]), Err(StoreError::Destroyed));
    }

    #[tokio::test]
    async fn test_selection_emits_event_and_tracks_previous() {
        let mut store = grouped();
        let mut events = store.events.subscribe();

        store.select_row(2).unwrap();
        store.select_next(Direction::Next).unwrap();
        assert_eq!(events.recv().await.unwrap(), NarrowEvent::SelectionChanged { row: 2 });
        assert_eq!(events.recv().await.unwrap(), NarrowEvent::SelectionChanged { row: 3 });
        assert_eq!(store.previously_selected_item().unwrap().point, Point::new(1, 0));
    }

    #[test]
    fn test_select_equal_location_after_replace() {
        let mut store = grouped();
        store.select_row(3).unwrap();
        let selected = store.selected_item().unwrap().clone();

        store
            .replace_items(vec![at("z", 0), at("a", 5), at("a", 1)])
            .unwrap();
        assert_eq!(store.previously_selected_item(), Some(&selected));
        assert_eq!(store.select_equal_location_item(&selected), Ok(true));
        assert_eq!(store.selected_row(), Some(2));
    }

    #[test]
    fn test_window_clamps() {
        let store = grouped();
        assert_eq!(store.window(5, 10).len(), 2);
        assert!(store.window(20, 3).is_empty());
        assert_eq!(store.window(0, 2)[1].row, 1);
    }

    #[test]
    fn test_render_row_truncates_by_width() {
        let mut item = Item::new("日本語テキスト", Point::new(0, 0));
        item.line_header = Some("1: ".to_string());
        let mut store = store_with(vec![item]);
        store.select_row(1).unwrap();

        let row = store.render_row(1, 7, "…").unwrap();
        assert_eq!(row.text, "1: 日本語…");
        assert!(row.truncated && row.selected);

        let row = store.render_row(1, 100, "…").unwrap();
        assert_eq!(row.text, "1: 日本語テキスト");
        assert!(!row.truncated);
    }

    #[test]
    fn test_truncate_ascii() {
        assert_eq!(truncate_to_width("abcdef", 4, "..").0, "ab..");
        assert_eq!(truncate_to_width("abc", 3, "..").0, "abc");
    }
}

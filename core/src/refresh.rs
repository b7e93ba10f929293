//! Refresh control: cache, cancellation and selection restore
//!
//! A refresh moves `Idle -> Refreshing -> Finalizing -> Idle`, or to
//! `Cancelled` when a newer refresh (or `cancel`/`destroy`) supersedes it.
//! Every refresh gets a new generation number; source messages carrying an
//! older generation are dropped without touching the store.

use crate::config::NarrowSettings;
use crate::error::Result;
use crate::events::{EventBus, NarrowEvent};
use crate::host::ProjectResolver;
use crate::item::Item;
use crate::pipeline::{HeaderTemplates, ItemReducer, PipelineState, ReducerContext};
use crate::query::{
    parse_query, FilterOptions, FilterSpec, ParseOptions, ParsedQuery, SearchOptions, SearchToggle,
};
use crate::source::{
    BatchSink, CompletionGuard, Generation, ItemSource, SourceContext, SourceEvent, SourceMessage,
};
use crate::store::ItemStore;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshPhase {
    Idle,
    Refreshing,
    Finalizing,
    Cancelled,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshOptions {
    /// Ignore the cache and run the source
    pub force: bool,

    /// Select the first item instead of restoring the previous selection
    pub select_first_item: bool,

    /// Re-run the source for this file only and splice the result in
    pub file_path: Option<PathBuf>,
}

impl RefreshOptions {
    pub fn forced() -> Self {
        Self {
            force: true,
            ..Default::default()
        }
    }

    pub fn for_file<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            file_path: Some(path.into()),
            ..Default::default()
        }
    }
}

/// What a query update changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryChange {
    pub search_term_changed: bool,
}

impl QueryChange {
    /// Options for the refresh that should follow this change
    pub fn refresh_options(&self) -> RefreshOptions {
        RefreshOptions {
            force: self.search_term_changed,
            select_first_item: true,
            file_path: None,
        }
    }
}

struct InFlight {
    generation: Generation,
    options: RefreshOptions,
    pipeline: PipelineState,
    reducer: ItemReducer,
    restore: Option<Item>,
    task: Option<JoinHandle<()>>,
    splice: bool,
    cacheable: bool,
}

/// Owns the store of one narrow UI and runs its refreshes
pub struct RefreshController {
    source: Arc<dyn ItemSource>,
    settings: NarrowSettings,
    reducer_context: ReducerContext,

    query: String,
    parsed: ParsedQuery,
    search_options: SearchOptions,
    filter_spec: FilterSpec,
    file_filter: Option<FilterSpec>,
    excluded_files: HashSet<PathBuf>,

    store: ItemStore,
    events: EventBus,
    cached_items: Option<Vec<Item>>,

    generation: Generation,
    phase: RefreshPhase,
    in_flight: Option<InFlight>,
    sender: mpsc::UnboundedSender<SourceMessage>,
    receiver: mpsc::UnboundedReceiver<SourceMessage>,

    rendered_once: bool,
    warned_unavailable: bool,
    items_excluded: bool,
}

impl RefreshController {
    pub fn new(
        source: Arc<dyn ItemSource>,
        resolver: Arc<dyn ProjectResolver>,
        settings: NarrowSettings,
    ) -> Result<Self> {
        let templates = HeaderTemplates::new(
            &settings.project_header_template,
            &settings.file_header_template,
        )?;
        let search_options = SearchOptions::new(
            settings.search_use_regex,
            settings.search_whole_word,
            settings.case_sensitivity_for_search_term,
        );
        let events = EventBus::default();
        let (sender, receiver) = mpsc::unbounded_channel();

        Ok(Self {
            reducer_context: ReducerContext {
                resolver,
                templates: Arc::new(templates),
                show_column: settings.show_column_on_line_header,
            },
            source,
            settings,
            query: String::new(),
            parsed: ParsedQuery::default(),
            search_options,
            filter_spec: FilterSpec::default(),
            file_filter: None,
            excluded_files: HashSet::new(),
            store: ItemStore::new(events.clone()),
            events,
            cached_items: None,
            generation: 0,
            phase: RefreshPhase::Idle,
            in_flight: None,
            sender,
            receiver,
            rendered_once: false,
            warned_unavailable: false,
            items_excluded: false,
        })
    }

    pub fn source(&self) -> &Arc<dyn ItemSource> {
        &self.source
    }

    pub fn settings(&self) -> &NarrowSettings {
        &self.settings
    }

    pub fn store(&self) -> &ItemStore {
        &self.store
    }

    /// Store access for navigation and selection
    pub fn store_mut(&mut self) -> &mut ItemStore {
        &mut self.store
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn phase(&self) -> RefreshPhase {
        self.phase
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn is_refreshing(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn parsed_query(&self) -> &ParsedQuery {
        &self.parsed
    }

    pub fn search_options(&self) -> &SearchOptions {
        &self.search_options
    }

    pub fn filter_spec(&self) -> &FilterSpec {
        &self.filter_spec
    }

    pub fn cached_items(&self) -> Option<&[Item]> {
        self.cached_items.as_deref()
    }

    /// Path exclusion removed items in the last refresh
    pub fn items_excluded(&self) -> bool {
        self.items_excluded
    }

    pub fn excluded_files(&self) -> &HashSet<PathBuf> {
        &self.excluded_files
    }

    pub fn is_destroyed(&self) -> bool {
        self.store.is_destroyed()
    }

    /// Parse `query` and rebuild the filter; a changed search term drops the cache
    pub fn set_query(&mut self, query: &str) -> QueryChange {
        let capabilities = self.source.capabilities();
        let negate = self.settings.negate_narrow_query_by_ending_exclamation;

        let parsed = parse_query(
            query,
            ParseOptions {
                negate_by_ending_exclamation: negate,
                use_first_query_as_search_term: capabilities.first_query_as_search_term,
            },
        );
        self.filter_spec = FilterSpec::new(
            &parsed.filter_query(),
            FilterOptions {
                negate_by_ending_exclamation: negate,
                sensitivity: self.settings.case_sensitivity_for_narrow_query,
            },
        );

        let search_term_changed = capabilities.first_query_as_search_term
            && self.set_search_term(parsed.search_term.as_deref().unwrap_or_default());

        self.query = query.to_string();
        self.parsed = parsed;
        QueryChange { search_term_changed }
    }

    /// Set the search term directly; returns whether it changed
    pub fn set_search_term(&mut self, term: &str) -> bool {
        if term == self.search_options.search_term() {
            return false;
        }
        self.search_options.set_search_term(term);
        self.invalidate_cache();
        true
    }

    /// Flip a search option; the cache no longer matches afterwards
    pub fn toggle_search_option(&mut self, toggle: SearchToggle) -> bool {
        let value = self.search_options.toggle(toggle);
        self.invalidate_cache();
        value
    }

    pub fn exclude_file<P: Into<PathBuf>>(&mut self, path: P) {
        self.excluded_files.insert(path.into());
    }

    pub fn clear_excluded_files(&mut self) {
        self.excluded_files.clear();
    }

    /// Narrow items by their workspace-relative path
    pub fn set_file_filter(&mut self, query: &str) {
        let negate = self.settings.negate_narrow_query_by_ending_exclamation;
        let spec = FilterSpec::new(
            query,
            FilterOptions {
                negate_by_ending_exclamation: negate,
                sensitivity: self.settings.case_sensitivity_for_narrow_query,
            },
        );
        self.file_filter = (!spec.is_empty()).then_some(spec);
    }

    pub fn invalidate_cache(&mut self) {
        self.cached_items = None;
    }

    /// Start a refresh without waiting for it; returns its generation
    pub fn begin_refresh(&mut self, options: RefreshOptions) -> Result<Generation> {
        if self.store.is_destroyed() {
            return Err(crate::error::StoreError::Destroyed.into());
        }
        self.cancel_in_flight();

        self.generation += 1;
        let generation = self.generation;
        self.phase = RefreshPhase::Refreshing;
        self.events.emit(NarrowEvent::RefreshStarted { generation });

        let capabilities = self.source.capabilities();
        let restore = self
            .store
            .selected_item()
            .or_else(|| self.store.previously_selected_item())
            .cloned();

        let scoped_file = options
            .file_path
            .clone()
            .filter(|_| capabilities.supports_file_scoped_refresh);
        let splice = scoped_file.is_some() && self.cached_items.is_some();
        let use_cache = !splice && !options.force && self.cached_items.is_some();

        let mut pipeline = PipelineState::new(self.filter_spec.clone())
            .with_file_filter(
                self.file_filter
                    .clone()
                    .filter(|_| capabilities.support_file_path_filter),
            )
            .with_excluded_files(self.excluded_files.clone())
            .with_max_row_hint(self.source.max_row());
        if let (true, Some(path)) = (splice, &options.file_path) {
            let previous_cache = self.cached_items.clone().unwrap_or_default();
            pipeline.prepare_splice(path.clone(), self.store.items().to_vec(), previous_cache);
        } else {
            self.store.reset()?;
        }

        let reducer = ItemReducer::for_capabilities(&capabilities, self.reducer_context.clone());

        self.in_flight = Some(InFlight {
            generation,
            options,
            pipeline,
            reducer,
            restore,
            task: None,
            splice,
            // a cold file-scoped run only holds that file's items
            cacheable: splice || scoped_file.is_none(),
        });

        if use_cache {
            let cached = self.cached_items.clone().unwrap_or_default();
            tracing::debug!("Refresh {} served from cache ({} items)", generation, cached.len());
            if let Some(in_flight) = self.in_flight.as_mut() {
                in_flight.pipeline.from_cache = true;
            }
            self.apply_batch(cached)?;
            self.finalize()?;
            return Ok(generation);
        }

        let search_regex = self.search_options.search_regex().cloned();
        if capabilities.needs_search_regex && search_regex.is_none() {
            tracing::debug!("Refresh {} has no search pattern, completing empty", generation);
            if let Some(in_flight) = self.in_flight.as_mut() {
                in_flight.cacheable = false;
            }
            self.finalize()?;
            return Ok(generation);
        }

        let context = SourceContext {
            search_term: self.search_options.search_term().to_string(),
            search_regex,
            ignore_case: self.search_options.ignore_case(),
            file_path: scoped_file,
        };
        let sink = BatchSink::new(generation, self.sender.clone());
        let source = Arc::clone(&self.source);
        let task = tokio::spawn(async move {
            let guard = CompletionGuard::new(sink.clone());
            let result = source.get_items(context, sink).await;
            guard.finish(result);
        });

        if let Some(in_flight) = self.in_flight.as_mut() {
            in_flight.task = Some(task);
        }
        tracing::debug!("Refresh {} started for {}", generation, self.source.name());
        Ok(generation)
    }

    /// Start a refresh and wait until it is finalized
    pub async fn refresh(&mut self, options: RefreshOptions) -> Result<()> {
        let generation = self.begin_refresh(options)?;
        self.wait_for(generation).await
    }

    /// [`Self::refresh`] after the configured debounce delay
    ///
    /// Dropping the returned future before the delay elapses starts nothing.
    pub async fn refresh_after_delay(&mut self, options: RefreshOptions) -> Result<()> {
        tokio::time::sleep(Duration::from_millis(self.settings.refresh_delay_ms)).await;
        self.refresh(options).await
    }

    /// Process source messages until `generation` is no longer in flight
    pub async fn wait_for(&mut self, generation: Generation) -> Result<()> {
        while self
            .in_flight
            .as_ref()
            .is_some_and(|in_flight| in_flight.generation == generation)
        {
            match self.receiver.recv().await {
                Some(message) => {
                    self.handle_message(message)?;
                }
                None => break,
            }
        }
        Ok(())
    }

    /// Apply every message already queued; returns how many were current
    pub fn pump(&mut self) -> Result<usize> {
        let mut applied = 0;
        while let Ok(message) = self.receiver.try_recv() {
            if self.handle_message(message)? {
                applied += 1;
            }
        }
        Ok(applied)
    }

    /// Apply one source message; stale generations are ignored
    pub fn handle_message(&mut self, message: SourceMessage) -> Result<bool> {
        let current = self
            .in_flight
            .as_ref()
            .is_some_and(|in_flight| in_flight.generation == message.generation);
        if !current {
            tracing::debug!(
                "Dropping message from stale refresh {} (current {})",
                message.generation,
                self.generation
            );
            return Ok(false);
        }

        match message.event {
            SourceEvent::Batch(items) => self.apply_batch(items)?,
            SourceEvent::Unavailable { tool } => {
                if let Some(in_flight) = self.in_flight.as_mut() {
                    in_flight.cacheable = false;
                }
                if !self.warned_unavailable {
                    self.warned_unavailable = true;
                    self.events.emit(NarrowEvent::Warning {
                        message: format!("{} is not available, no items to show", tool),
                    });
                }
            }
            SourceEvent::Failed { message } => {
                tracing::warn!("Source {} failed: {}", self.source.name(), message);
                if let Some(in_flight) = self.in_flight.as_mut() {
                    in_flight.cacheable = false;
                }
                self.events.emit(NarrowEvent::Warning { message });
                self.finalize()?;
            }
            SourceEvent::Complete => self.finalize()?,
        }
        Ok(true)
    }

    fn apply_batch(&mut self, items: Vec<Item>) -> Result<()> {
        let Some(in_flight) = self.in_flight.as_mut() else {
            return Ok(());
        };
        // sources that learn their size while reading report it by now
        if in_flight.pipeline.max_row_hint.is_none() {
            in_flight.pipeline.max_row_hint = self.source.max_row();
        }
        in_flight.reducer.reduce(&mut in_flight.pipeline, items);

        let rows = if in_flight.splice {
            let rendered = in_flight.pipeline.rendered.clone().unwrap_or_default();
            self.store.replace_items(rendered)?
        } else {
            let batch = std::mem::take(&mut in_flight.pipeline.items);
            self.store.add_items(batch)?
        };

        if in_flight.splice || !rows.is_empty() {
            self.events.emit(NarrowEvent::ItemsUpdated {
                generation: in_flight.generation,
                rows,
            });
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<()> {
        // a file-scoped refresh without any batch still removes the file's old rows
        let splice_pending = self
            .in_flight
            .as_ref()
            .is_some_and(|in_flight| in_flight.splice && in_flight.pipeline.rendered.is_none());
        if splice_pending {
            self.apply_batch(Vec::new())?;
        }

        let Some(in_flight) = self.in_flight.take() else {
            return Ok(());
        };
        self.phase = RefreshPhase::Finalizing;

        let InFlight {
            generation,
            options,
            pipeline,
            restore,
            cacheable,
            ..
        } = in_flight;

        self.items_excluded = pipeline.items_excluded;
        self.cached_items = cacheable.then_some(pipeline.all_items);

        let count = self.store.normal_item_count();
        if count > 0 || !self.rendered_once {
            let restored = match (&restore, options.select_first_item) {
                (Some(item), false) => self.store.select_equal_location_item(item)?,
                _ => false,
            };
            if !restored {
                self.store.select_first_normal_item()?;
            }
        }
        self.rendered_once = true;

        self.events.emit(NarrowEvent::ItemsFinalized { generation, count });
        self.phase = RefreshPhase::Idle;
        tracing::debug!("Refresh {} finalized with {} items", generation, count);
        Ok(())
    }

    fn cancel_in_flight(&mut self) -> bool {
        let Some(in_flight) = self.in_flight.take() else {
            return false;
        };
        if let Some(task) = in_flight.task {
            task.abort();
        }
        self.source.cancel();
        self.phase = RefreshPhase::Cancelled;
        tracing::debug!("Cancelled refresh {}", in_flight.generation);
        true
    }

    /// Stop the in-flight refresh; its late messages become no-ops
    pub fn cancel(&mut self) {
        if self.cancel_in_flight() {
            self.generation += 1;
        }
    }

    /// Cancel work and tear down the store; later refreshes fail
    pub fn destroy(&mut self) {
        self.cancel();
        self.store.destroy();
        tracing::debug!("Destroyed narrow for {}", self.source.name());
    }

    /// Refresh only `path` when it already contributes to the cache
    pub async fn refresh_file(&mut self, path: &Path) -> Result<()> {
        self.refresh(RefreshOptions::for_file(path)).await
    }
}

impl Drop for RefreshController {
    fn drop(&mut self) {
        self.cancel_in_flight();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, StoreError};
    use crate::host::{ProjectSet, TextBuffer};
    use crate::item::Point;
    use crate::source::{BufferScanSource, SourceCapabilities};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct ScriptedSource {
        capabilities: SourceCapabilities,
        batches: Mutex<Vec<Vec<Item>>>,
        calls: AtomicUsize,
        hold_next: AtomicBool,
        held: Mutex<Option<BatchSink>>,
        unavailable: bool,
        scopes: Mutex<Vec<Option<PathBuf>>>,
    }

    impl ScriptedSource {
        fn new(capabilities: SourceCapabilities, batches: Vec<Vec<Item>>) -> Self {
            Self {
                capabilities,
                batches: Mutex::new(batches),
                ..Default::default()
            }
        }

        fn set_batches(&self, batches: Vec<Vec<Item>>) {
            *self.batches.lock().unwrap() = batches;
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ItemSource for ScriptedSource {
        fn name(&self) -> &str {
            "scripted"
        }

        fn capabilities(&self) -> SourceCapabilities {
            self.capabilities
        }

        async fn get_items(&self, context: SourceContext, sink: BatchSink) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.scopes.lock().unwrap().push(context.file_path.clone());
            if self.unavailable {
                sink.unavailable("fake-rg");
                return Ok(());
            }
            if self.hold_next.swap(false, Ordering::SeqCst) {
                *self.held.lock().unwrap() = Some(sink.clone());
                futures::future::pending::<()>().await;
            }

            let batches = self.batches.lock().unwrap().clone();
            for batch in batches {
                let batch = match &context.file_path {
                    Some(path) => batch.into_iter().filter(|i| i.belongs_to(path)).collect(),
                    None => batch,
                };
                sink.send_batch(batch);
            }
            Ok(())
        }
    }

    fn at(path: &str, row: u32, text: &str) -> Item {
        Item::new(text, Point::new(row, 0)).with_file_path(path)
    }

    fn texts(store: &ItemStore) -> Vec<&str> {
        store.items().iter().map(|i| i.text.as_str()).collect()
    }

    fn controller(source: Arc<ScriptedSource>, roots: &[&str]) -> RefreshController {
        RefreshController::new(
            source,
            Arc::new(ProjectSet::new(roots.iter().copied())),
            NarrowSettings::default(),
        )
        .unwrap()
    }

    fn fruit() -> Vec<Vec<Item>> {
        vec![["apple", "grape", "lemmon"]
            .iter()
            .enumerate()
            .map(|(row, text)| Item::new(*text, Point::new(row as u32, 0)))
            .collect()]
    }

    #[tokio::test]
    async fn test_filter_query_and_first_selection() {
        let source = Arc::new(ScriptedSource::new(
            SourceCapabilities {
                show_line_header: true,
                bound_to_single_file: true,
                ..Default::default()
            },
            fruit(),
        ));
        let mut narrow = controller(source.clone(), &[]);

        let change = narrow.set_query("l");
        assert!(!change.search_term_changed);
        narrow.refresh(change.refresh_options()).await.unwrap();

        assert_eq!(texts(narrow.store()), vec!["apple", "lemmon"]);
        assert_eq!(narrow.store().selected_row(), Some(1));
        assert_eq!(narrow.store().selected_item().unwrap().text, "apple");
        assert_eq!(narrow.cached_items().unwrap().len(), 3);
        assert_eq!(narrow.phase(), RefreshPhase::Idle);
    }

    #[tokio::test]
    async fn test_query_change_reuses_cache() {
        let source = Arc::new(ScriptedSource::new(SourceCapabilities::default(), fruit()));
        let mut narrow = controller(source.clone(), &[]);

        narrow.refresh(RefreshOptions::default()).await.unwrap();
        assert_eq!(narrow.store().normal_item_count(), 3);

        let change = narrow.set_query("gr");
        narrow.refresh(change.refresh_options()).await.unwrap();
        assert_eq!(texts(narrow.store()), vec!["grape"]);

        let change = narrow.set_query("!gr");
        narrow.refresh(change.refresh_options()).await.unwrap();
        assert_eq!(texts(narrow.store()), vec!["apple", "lemmon"]);
        assert_eq!(source.calls(), 1);

        narrow.refresh(RefreshOptions::forced()).await.unwrap();
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_buffer_scan_uses_first_token_as_search_term() {
        let buffer = Arc::new(TextBuffer::from_text("apple\ngrape\nlemmon\n"));
        let mut narrow = RefreshController::new(
            Arc::new(BufferScanSource::new(buffer)),
            Arc::new(ProjectSet::default()),
            NarrowSettings::default(),
        )
        .unwrap();

        let change = narrow.set_query("l !app");
        assert!(change.search_term_changed);
        assert!(narrow.cached_items().is_none());
        narrow.refresh(change.refresh_options()).await.unwrap();

        assert_eq!(texts(narrow.store()), vec!["lemmon"]);
        assert_eq!(narrow.store().items()[0].line_header.as_deref(), Some("3: "));
    }

    #[tokio::test]
    async fn test_project_headers_follow_arrival_order() {
        let source = Arc::new(ScriptedSource::new(
            SourceCapabilities {
                show_line_header: true,
                show_project_header: true,
                show_file_header: true,
                ..Default::default()
            },
            vec![
                vec![at("/work/proj2/b.rs", 0, "itemB")],
                vec![at("/work/proj1/a.rs", 0, "itemA")],
            ],
        ));
        let mut narrow = controller(source, &["/work/proj1", "/work/proj2"]);
        narrow.refresh(RefreshOptions::default()).await.unwrap();

        assert_eq!(
            texts(narrow.store()),
            vec!["# proj2", "## b.rs", "itemB", "# proj1", "## a.rs", "itemA"]
        );
        assert_eq!(narrow.store().selected_item().unwrap().text, "itemB");
    }

    #[tokio::test]
    async fn test_late_batch_of_cancelled_refresh_is_ignored() {
        let source = Arc::new(ScriptedSource::new(
            SourceCapabilities::default(),
            vec![vec![Item::new("from B", Point::new(0, 0))]],
        ));
        source.hold_next.store(true, Ordering::SeqCst);
        let mut narrow = controller(source.clone(), &[]);

        let first = narrow.begin_refresh(RefreshOptions::default()).unwrap();
        while source.held.lock().unwrap().is_none() {
            tokio::task::yield_now().await;
        }

        narrow.refresh(RefreshOptions::forced()).await.unwrap();
        assert_eq!(texts(narrow.store()), vec!["from B"]);

        let late = source.held.lock().unwrap().take().unwrap();
        assert_eq!(late.generation(), first);
        late.send_batch(vec![Item::new("from A", Point::new(0, 0))]);
        late.complete();

        assert_eq!(narrow.pump().unwrap(), 0);
        assert_eq!(texts(narrow.store()), vec!["from B"]);
    }

    #[tokio::test]
    async fn test_cancel_leaves_store_untouched() {
        let source = Arc::new(ScriptedSource::new(SourceCapabilities::default(), fruit()));
        source.hold_next.store(true, Ordering::SeqCst);
        let mut narrow = controller(source.clone(), &[]);

        narrow.begin_refresh(RefreshOptions::default()).unwrap();
        while source.held.lock().unwrap().is_none() {
            tokio::task::yield_now().await;
        }
        narrow.cancel();
        assert_eq!(narrow.phase(), RefreshPhase::Cancelled);

        let late = source.held.lock().unwrap().take().unwrap();
        late.send_batch(vec![Item::new("late", Point::new(0, 0))]);
        assert_eq!(narrow.pump().unwrap(), 0);
        assert!(narrow.store().is_empty());
    }

    #[tokio::test]
    async fn test_selection_restored_by_location() {
        let file_items = |rows: &[u32]| -> Vec<Item> {
            rows.iter()
                .map(|row| at("/p/file.txt", *row, &format!("line {}", row)))
                .collect()
        };
        let source = Arc::new(ScriptedSource::new(
            SourceCapabilities::default(),
            vec![file_items(&[1, 2, 3, 4, 5, 6])],
        ));
        let mut narrow = controller(source.clone(), &["/p"]);
        narrow.refresh(RefreshOptions::default()).await.unwrap();

        let row = narrow
            .store()
            .find_equal_location_item(&at("/p/file.txt", 5, ""))
            .unwrap();
        narrow.store_mut().select_row(row).unwrap();

        let mut reordered = vec![at("/p/other.txt", 0, "other")];
        reordered.extend(file_items(&[6, 5, 1]));
        source.set_batches(vec![reordered]);
        narrow.refresh(RefreshOptions::forced()).await.unwrap();

        let selected = narrow.store().selected_item().unwrap();
        assert_eq!(selected.point, Point::new(5, 0));
        assert_eq!(selected.row, 3);

        source.set_batches(vec![file_items(&[9, 10])]);
        narrow.refresh(RefreshOptions::forced()).await.unwrap();
        assert_eq!(narrow.store().selected_item().unwrap().text, "line 9");
    }

    #[tokio::test]
    async fn test_select_first_item_overrides_restore() {
        let source = Arc::new(ScriptedSource::new(SourceCapabilities::default(), fruit()));
        let mut narrow = controller(source, &[]);
        narrow.refresh(RefreshOptions::default()).await.unwrap();
        narrow.store_mut().select_row(3).unwrap();

        narrow
            .refresh(RefreshOptions {
                select_first_item: true,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(narrow.store().selected_row(), Some(1));
    }

    #[tokio::test]
    async fn test_missing_search_term_completes_empty() {
        let source = Arc::new(ScriptedSource::new(
            SourceCapabilities {
                needs_search_regex: true,
                first_query_as_search_term: true,
                ..Default::default()
            },
            fruit(),
        ));
        let mut narrow = controller(source.clone(), &[]);
        let mut events = narrow.events().subscribe();

        narrow.refresh(RefreshOptions::default()).await.unwrap();
        assert_eq!(source.calls(), 0);
        assert!(narrow.store().is_empty());
        assert!(narrow.cached_items().is_none());

        assert!(matches!(events.recv().await.unwrap(), NarrowEvent::RefreshStarted { .. }));
        assert!(matches!(
            events.recv().await.unwrap(),
            NarrowEvent::ItemsFinalized { count: 0, .. }
        ));
    }

    #[tokio::test]
    async fn test_unavailable_tool_warns_once() {
        let source = Arc::new(ScriptedSource {
            unavailable: true,
            ..Default::default()
        });
        let mut narrow = controller(source, &[]);
        let mut events = narrow.events().subscribe();

        narrow.refresh(RefreshOptions::default()).await.unwrap();
        narrow.refresh(RefreshOptions::default()).await.unwrap();

        let mut warnings = 0;
        while let Ok(event) = events.try_recv() {
            if matches!(event, NarrowEvent::Warning { .. }) {
                warnings += 1;
            }
        }
        assert_eq!(warnings, 1);
        assert!(narrow.store().is_empty());
    }

    #[tokio::test]
    async fn test_file_scoped_refresh_splices() {
        let capabilities = SourceCapabilities {
            show_line_header: true,
            show_file_header: true,
            supports_file_scoped_refresh: true,
            ..Default::default()
        };
        let source = Arc::new(ScriptedSource::new(
            capabilities,
            vec![vec![
                at("/p/a.rs", 0, "a0"),
                at("/p/b.rs", 0, "b0"),
                at("/p/c.rs", 0, "c0"),
            ]],
        ));
        let mut narrow = controller(source.clone(), &["/p"]);
        narrow.refresh(RefreshOptions::default()).await.unwrap();

        source.set_batches(vec![vec![at("/p/b.rs", 0, "b0"), at("/p/b.rs", 4, "b4")]]);
        narrow.refresh_file(Path::new("/p/b.rs")).await.unwrap();
        assert_eq!(
            texts(narrow.store()),
            vec!["## a.rs", "a0", "## b.rs", "b0", "b4", "## c.rs", "c0"]
        );
        assert_eq!(narrow.cached_items().unwrap().len(), 4);

        source.set_batches(vec![]);
        narrow.refresh_file(Path::new("/p/b.rs")).await.unwrap();
        assert_eq!(texts(narrow.store()), vec!["## a.rs", "a0", "## c.rs", "c0"]);
    }

    #[tokio::test]
    async fn test_cold_file_scoped_refresh_keeps_scope() {
        let source = Arc::new(ScriptedSource::new(
            SourceCapabilities {
                show_file_header: true,
                supports_file_scoped_refresh: true,
                ..Default::default()
            },
            vec![vec![at("/p/a.rs", 0, "a0"), at("/p/b.rs", 0, "b0")]],
        ));
        let mut narrow = controller(source.clone(), &["/p"]);

        narrow.refresh_file(Path::new("/p/b.rs")).await.unwrap();
        assert_eq!(
            *source.scopes.lock().unwrap(),
            vec![Some(PathBuf::from("/p/b.rs"))]
        );
        assert_eq!(texts(narrow.store()), vec!["## b.rs", "b0"]);
        assert!(narrow.cached_items().is_none());

        narrow.refresh(RefreshOptions::default()).await.unwrap();
        assert_eq!(source.scopes.lock().unwrap()[1], None);
        assert_eq!(texts(narrow.store()), vec!["## a.rs", "a0", "## b.rs", "b0"]);
    }

    #[tokio::test]
    async fn test_scope_ignored_without_file_scoped_support() {
        let source = Arc::new(ScriptedSource::new(
            SourceCapabilities::default(),
            vec![vec![at("/p/a.rs", 0, "a0"), at("/p/b.rs", 0, "b0")]],
        ));
        let mut narrow = controller(source.clone(), &["/p"]);

        narrow.refresh_file(Path::new("/p/b.rs")).await.unwrap();
        assert_eq!(*source.scopes.lock().unwrap(), vec![None]);
        assert_eq!(texts(narrow.store()), vec!["a0", "b0"]);
    }

    #[tokio::test]
    async fn test_excluded_files_are_filtered_from_cache() {
        let source = Arc::new(ScriptedSource::new(
            SourceCapabilities {
                support_file_path_filter: true,
                ..Default::default()
            },
            vec![vec![at("/p/a.rs", 0, "a"), at("/p/b.rs", 0, "b")]],
        ));
        let mut narrow = controller(source.clone(), &["/p"]);
        narrow.refresh(RefreshOptions::default()).await.unwrap();

        narrow.exclude_file("/p/a.rs");
        narrow.refresh(RefreshOptions::default()).await.unwrap();
        assert_eq!(texts(narrow.store()), vec!["b"]);
        assert!(narrow.items_excluded());

        narrow.clear_excluded_files();
        narrow.set_file_filter("a.rs");
        narrow.refresh(RefreshOptions::default()).await.unwrap();
        assert_eq!(texts(narrow.store()), vec!["a"]);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_file_filter_needs_source_support() {
        let source = Arc::new(ScriptedSource::new(
            SourceCapabilities::default(),
            vec![vec![at("/p/a.rs", 0, "a"), at("/p/b.rs", 0, "b")]],
        ));
        let mut narrow = controller(source, &["/p"]);
        narrow.set_file_filter("a.rs");
        narrow.refresh(RefreshOptions::default()).await.unwrap();
        assert_eq!(texts(narrow.store()), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_file_scan_line_header_spans_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fruits.txt");
        let mut text = String::from("apple\napple pie\n");
        text.push_str(&"x\n".repeat(200));
        tokio::fs::write(&path, text).await.unwrap();

        let mut narrow = RefreshController::new(
            Arc::new(crate::source::FileScanSource::new(&path)),
            Arc::new(ProjectSet::default()),
            NarrowSettings::default(),
        )
        .unwrap();
        let change = narrow.set_query("apple");
        narrow.refresh(change.refresh_options()).await.unwrap();

        let headers: Vec<_> = narrow
            .store()
            .items()
            .iter()
            .map(|item| item.line_header.clone().unwrap_or_default())
            .collect();
        assert_eq!(headers, vec!["  1: ", "  2: "]);
    }

    #[tokio::test]
    async fn test_destroyed_controller_rejects_refresh() {
        let source = Arc::new(ScriptedSource::new(SourceCapabilities::default(), fruit()));
        let mut narrow = controller(source, &[]);
        narrow.destroy();

        let result = narrow.refresh(RefreshOptions::default()).await;
        assert!(matches!(result, Err(Error::Store(StoreError::Destroyed))));
        assert!(narrow.is_destroyed());
    }
}

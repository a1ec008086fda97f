//! Document store.
//!
//! # Responsibility
//! - Own the document, its formula engine and the drag controller.
//! - Route every UI mutation through tree/drag operations, keep sheets in
//!   sync with table payloads and schedule debounced saves.
//! - Drive the two-phase save protocol and document hydration.
//!
//! # Invariants
//! - Every applied structural or content mutation refreshes
//!   `meta.last_modified` and restarts the save timer.
//! - No-op mutations (unknown ids) change nothing, including the timer.
//! - At most one save is in flight; a save that comes due meanwhile is
//!   re-queued, never overlapped.
//! - Failed saves and loads never discard local document state.

pub mod config;
pub mod debounce;

use crate::chart::{self, ChartProjection, ChartSource};
use crate::drag::DragController;
use crate::model::document::{Document, MAX_GRID_COLUMNS};
use crate::model::section::{default_sections, reconcile_sections, Section, SectionId};
use crate::model::widget::{ChartConfig, Widget, WidgetId, WidgetKind, WidgetPatch, WidgetPayload};
use crate::sheet::SheetEngine;
use crate::sync::{
    CanonicalSectionSource, CanvasLoader, CanvasPersistence, PayloadSealer, PersistenceError,
    PersistenceResult, PlaintextSealer, SaveRequest, SavedRecord, SyncStatus,
};
use crate::text;
use crate::tree;
use chrono::Utc;
use log::{debug, error, info, warn};
use std::time::Instant;

pub use config::StoreConfig;
pub use debounce::SaveDebouncer;

const DEFAULT_PROJECT_TITLE: &str = "My Growth Strategy";
const RESET_PROJECT_TITLE: &str = "New Project";

/// Save handed to the caller for execution across the async boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSave {
    pub ticket: u64,
    pub request: SaveRequest,
}

/// Result of a successful `load_from`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// No persisted document; local state kept and reconciled.
    Empty,
    Loaded { document_id: String },
}

/// Single point of truth for one open document.
pub struct DocumentStore {
    document: Document,
    sheets: SheetEngine,
    drag: DragController,
    is_exporting: bool,
    status: SyncStatus,
    debouncer: SaveDebouncer,
    save_in_flight: Option<u64>,
    resave_queued: bool,
    next_ticket: u64,
    sealer: Box<dyn PayloadSealer>,
    config: StoreConfig,
}

impl Default for DocumentStore {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

impl DocumentStore {
    /// Creates a store holding a fresh document with the starter sections.
    pub fn new(config: StoreConfig) -> Self {
        let mut document = Document::empty(Utc::now());
        document.project.title = DEFAULT_PROJECT_TITLE.to_string();
        document.sections = default_sections();
        Self::from_document(document, config)
    }

    /// Wraps an existing document and builds its sheets.
    pub fn from_document(document: Document, config: StoreConfig) -> Self {
        Self::with_sealer(document, config, Box::new(PlaintextSealer))
    }

    pub fn with_sealer(
        document: Document,
        config: StoreConfig,
        sealer: Box<dyn PayloadSealer>,
    ) -> Self {
        let mut store = Self {
            document,
            sheets: SheetEngine::new(),
            drag: DragController::new(config.cancel_policy),
            is_exporting: false,
            status: SyncStatus::default(),
            debouncer: SaveDebouncer::new(config.save_debounce()),
            save_in_flight: None,
            resave_queued: false,
            next_ticket: 1,
            sealer,
            config,
        };
        store.rebuild_sheets();
        store
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn sections(&self) -> &[Section] {
        &self.document.sections
    }

    pub fn section(&self, section_id: &str) -> Option<&Section> {
        self.document.section(section_id)
    }

    pub fn sheets(&self) -> &SheetEngine {
        &self.sheets
    }

    pub fn status(&self) -> &SyncStatus {
        &self.status
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn drag(&self) -> &DragController {
        &self.drag
    }

    pub fn is_exporting(&self) -> bool {
        self.is_exporting
    }

    /// Deadline of the scheduled save, if any.
    pub fn pending_save_deadline(&self) -> Option<Instant> {
        self.debouncer.deadline()
    }

    pub fn is_save_in_flight(&self) -> bool {
        self.save_in_flight.is_some()
    }

    /// Finds a widget anywhere in the document.
    pub fn find_widget(&self, widget_id: &str) -> Option<(&SectionId, &Widget)> {
        self.document.sections.iter().find_map(|section| {
            tree::find(&section.widgets, widget_id).map(|widget| (&section.id, widget))
        })
    }

    pub fn set_project_title(&mut self, title: &str) {
        self.document.project.title = title.to_string();
        self.commit("project_title", "");
    }

    pub fn set_author_name(&mut self, name: &str) {
        self.document.project.student_name = name.to_string();
        self.commit("author_name", "");
    }

    /// Sets the layout column count; only 1 to 3 are accepted.
    pub fn set_grid_columns(&mut self, columns: u8) -> bool {
        if columns == 0 || columns > MAX_GRID_COLUMNS {
            return false;
        }
        self.document.meta.grid_columns = Some(columns);
        self.commit("grid_columns", "");
        true
    }

    /// Transient UI flag; not persisted and does not schedule a save.
    pub fn set_export_mode(&mut self, is_exporting: bool) {
        self.is_exporting = is_exporting;
    }

    /// Creates a widget of `kind` with its starter payload.
    ///
    /// Returns the new id, or `None` when the section or parent is unknown.
    pub fn add_widget(
        &mut self,
        section_id: &str,
        kind: WidgetKind,
        parent_id: Option<&str>,
    ) -> Option<WidgetId> {
        let widget = Widget::new(kind);
        let widget_id = widget.id.clone();
        self.insert_widget(section_id, widget, parent_id)
            .then_some(widget_id)
    }

    /// Inserts a caller-built widget subtree.
    pub fn insert_widget(
        &mut self,
        section_id: &str,
        widget: Widget,
        parent_id: Option<&str>,
    ) -> bool {
        let Some(section) = self.document.section_mut(section_id) else {
            return false;
        };
        let subtree = [widget.clone()];
        if !tree::insert(&mut section.widgets, widget, parent_id) {
            return false;
        }
        let mut tables = 0;
        tree::walk(&subtree, &mut |node| {
            if let Some(grid) = node.table_grid() {
                self.sheets.update_sheet(&node.id, grid);
                tables += 1;
            }
        });
        info!(
            "event=widget_add module=store status=ok section_id={} widget_id={} parent_id={} tables={}",
            section_id,
            subtree[0].id,
            parent_id.unwrap_or("root"),
            tables
        );
        self.commit("widget_add", section_id);
        true
    }

    /// Shallow-merges `patch` into a widget; table edits re-ingest the sheet.
    pub fn update_widget(&mut self, section_id: &str, widget_id: &str, patch: &WidgetPatch) -> bool {
        let Some(section) = self.document.section_mut(section_id) else {
            return false;
        };
        if !tree::update(&mut section.widgets, widget_id, patch) {
            return false;
        }
        if patch.touches_table() {
            if let Some(grid) = tree::find(&section.widgets, widget_id).and_then(Widget::table_grid) {
                self.sheets.update_sheet(widget_id, grid);
            }
        }
        debug!(
            "event=widget_update module=store status=ok section_id={} widget_id={} table={}",
            section_id,
            widget_id,
            patch.touches_table()
        );
        self.commit("widget_update", section_id);
        true
    }

    /// Renders `markdown` into a text widget's display markup.
    pub fn set_text_markdown(&mut self, section_id: &str, widget_id: &str, markdown: &str) -> bool {
        let patch = WidgetPatch::content(text::render_pseudo_markdown(markdown));
        self.update_widget(section_id, widget_id, &patch)
    }

    /// Editable markdown for a text widget; `None` for other kinds.
    pub fn text_markdown(&self, widget_id: &str) -> Option<String> {
        match &self.find_widget(widget_id)?.1.payload {
            WidgetPayload::Text { content } => Some(text::revert_to_markdown(content)),
            _ => None,
        }
    }

    /// Removes a widget with its subtree and drops sheets of removed tables.
    pub fn remove_widget(&mut self, section_id: &str, widget_id: &str) -> bool {
        let Some(section) = self.document.section_mut(section_id) else {
            return false;
        };
        let Some(removed) = tree::remove(&mut section.widgets, widget_id) else {
            return false;
        };
        let removed = [removed];
        let mut dropped_sheets = 0;
        tree::walk(&removed, &mut |node| {
            if self.sheets.remove_sheet(&node.id) {
                dropped_sheets += 1;
            }
        });
        info!(
            "event=widget_remove module=store status=ok section_id={} widget_id={} removed={} dropped_sheets={}",
            section_id,
            widget_id,
            tree::count(&removed),
            dropped_sheets
        );
        self.commit("widget_remove", section_id);
        true
    }

    /// Relocates `active_id` relative to `over_id` within one section.
    pub fn move_widget(&mut self, section_id: &str, active_id: &str, over_id: &str) -> bool {
        let Some(section) = self.document.section_mut(section_id) else {
            return false;
        };
        if !crate::drag::place_widget(&mut section.widgets, active_id, over_id) {
            return false;
        }
        self.commit("widget_move", section_id);
        true
    }

    pub fn toggle_section_complete(&mut self, section_id: &str) -> bool {
        let Some(section) = self.document.section_mut(section_id) else {
            return false;
        };
        section.is_completed = !section.is_completed;
        info!(
            "event=section_toggle module=store status=ok section_id={} is_completed={}",
            section_id, section.is_completed
        );
        self.commit("section_toggle", section_id);
        true
    }

    /// Clears all content and labels; section identities are kept and the
    /// next save creates a new persisted record.
    pub fn reset_project(&mut self) {
        for section in &mut self.document.sections {
            section.widgets.clear();
            section.is_completed = false;
        }
        self.document.project.title = RESET_PROJECT_TITLE.to_string();
        self.document.project.student_name.clear();
        self.document.project.id = None;
        self.document.meta.db_id = None;
        self.document.meta.grid_columns = None;
        self.sheets.clear();
        info!("event=project_reset module=store status=ok");
        self.commit("project_reset", "");
    }

    /// Replaces the whole document and rebuilds every sheet.
    pub fn replace_document(&mut self, document: Document) {
        self.document = document;
        self.rebuild_sheets();
        self.commit("document_replace", "");
    }

    pub fn drag_start(&mut self, section_id: &str, widget_id: &str) -> bool {
        match self.document.section(section_id) {
            Some(section) => self.drag.drag_start(section_id, widget_id, &section.widgets),
            None => false,
        }
    }

    /// Commits the hover placement for the active gesture.
    pub fn drag_over(&mut self, over_id: &str) -> bool {
        let Some(section_id) = self.drag.section_id().map(str::to_string) else {
            return false;
        };
        let Some(section) = self.document.section_mut(&section_id) else {
            self.drag.drag_cancel(&mut Vec::new());
            return false;
        };
        if !self.drag.drag_over(&mut section.widgets, over_id) {
            return false;
        }
        self.commit("drag_over", &section_id);
        true
    }

    pub fn drag_end(&mut self, over_id: Option<&str>) -> bool {
        let Some(section_id) = self.drag.section_id().map(str::to_string) else {
            return false;
        };
        let Some(section) = self.document.section_mut(&section_id) else {
            self.drag.drag_cancel(&mut Vec::new());
            return false;
        };
        if !self.drag.drag_end(&mut section.widgets, over_id) {
            return false;
        }
        self.commit("drag_end", &section_id);
        true
    }

    pub fn drag_cancel(&mut self) -> bool {
        let Some(section_id) = self.drag.section_id().map(str::to_string) else {
            return false;
        };
        let Some(section) = self.document.section_mut(&section_id) else {
            self.drag.drag_cancel(&mut Vec::new());
            return false;
        };
        if !self.drag.drag_cancel(&mut section.widgets) {
            return false;
        }
        self.commit("drag_cancel", &section_id);
        true
    }

    /// Dragged widget for overlay rendering.
    pub fn overlay_widget(&self) -> Option<&Widget> {
        let section = self.document.section(self.drag.section_id()?)?;
        self.drag.overlay_widget(&section.widgets)
    }

    pub fn computed_value(&self, table_id: &str, row: usize, col: usize) -> String {
        self.sheets.get_computed_value(table_id, row, col)
    }

    pub fn chart_sources(&self) -> Vec<ChartSource> {
        chart::chart_sources(&self.document, &self.sheets)
    }

    /// Projects a chart widget; `None` when `chart_id` is not a chart.
    pub fn chart_projection(&self, chart_id: &str) -> Option<ChartProjection> {
        let (_, widget) = self.find_widget(chart_id)?;
        match &widget.payload {
            WidgetPayload::Chart { config } => Some(self.project_chart(config.as_ref())),
            _ => None,
        }
    }

    /// Projects an arbitrary configuration, e.g. while it is being edited.
    pub fn project_chart(&self, config: Option<&ChartConfig>) -> ChartProjection {
        chart::project(&self.document, &self.sheets, config, self.config.header_rows)
    }

    /// Marks the session re-authenticated and schedules a catch-up save.
    pub fn set_authenticated(&mut self, is_authenticated: bool) {
        self.status.is_authenticated = is_authenticated;
        if is_authenticated {
            self.status.sync_error = None;
            self.debouncer.schedule(Instant::now());
        } else {
            self.debouncer.cancel();
        }
    }

    /// Starts the scheduled save when its timer has elapsed.
    ///
    /// Returns `None` when nothing is due, the session is unauthenticated,
    /// or another save is in flight (the save is then re-queued).
    pub fn begin_due_save(&mut self, now: Instant) -> Option<PendingSave> {
        if !self.debouncer.take_due(now) {
            return None;
        }
        if !self.status.is_authenticated {
            debug!("event=save_skip module=store status=skipped reason=unauthenticated");
            return None;
        }
        if self.save_in_flight.is_some() {
            self.resave_queued = true;
            debug!("event=save_requeue module=store status=queued");
            return None;
        }
        self.start_save()
    }

    /// Starts a save immediately, bypassing the timer (manual retry).
    pub fn force_save(&mut self) -> Option<PendingSave> {
        self.debouncer.cancel();
        if self.save_in_flight.is_some() {
            self.resave_queued = true;
            return None;
        }
        self.start_save()
    }

    fn start_save(&mut self) -> Option<PendingSave> {
        let sealed = serde_json::to_string(&self.document)
            .map_err(PersistenceError::from)
            .and_then(|json| self.sealer.seal(&json));
        let payload = match sealed {
            Ok(payload) => payload,
            Err(err) => {
                error!(
                    "event=save_start module=store status=error error=\"{}\"",
                    err
                );
                self.status.sync_error = Some(err.to_string());
                return None;
            }
        };

        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.save_in_flight = Some(ticket);
        self.status.is_syncing = true;
        debug!(
            "event=save_start module=store status=ok ticket={} bytes={} has_id={}",
            ticket,
            payload.data.len(),
            self.document.meta.db_id.is_some()
        );
        Some(PendingSave {
            ticket,
            request: SaveRequest {
                document_id: self.document.meta.db_id.clone(),
                title: self.document.project.title.clone(),
                payload,
            },
        })
    }

    /// Completes the save identified by `ticket`. Stale tickets are ignored.
    pub fn finish_save(
        &mut self,
        ticket: u64,
        result: &PersistenceResult<SavedRecord>,
        now: Instant,
    ) -> bool {
        if self.save_in_flight != Some(ticket) {
            return false;
        }
        self.save_in_flight = None;
        self.status.is_syncing = false;

        match result {
            Ok(record) => {
                self.document.meta.db_id = Some(record.id.clone());
                self.status.last_synced_at = Some(record.updated_at);
                self.status.sync_error = None;
                info!(
                    "event=save_finish module=store status=ok ticket={} document_id={}",
                    ticket, record.id
                );
            }
            Err(PersistenceError::Unauthorized) => {
                self.status.is_authenticated = false;
                self.status.sync_error = Some(PersistenceError::Unauthorized.to_string());
                self.resave_queued = false;
                self.debouncer.cancel();
                warn!(
                    "event=save_finish module=store status=unauthorized ticket={}",
                    ticket
                );
            }
            Err(err) => {
                self.status.sync_error = Some(err.to_string());
                error!(
                    "event=save_finish module=store status=error ticket={} error=\"{}\"",
                    ticket, err
                );
            }
        }

        if self.resave_queued && self.status.is_authenticated {
            self.resave_queued = false;
            self.debouncer.schedule(now);
        }
        true
    }

    /// Runs a due save synchronously against `persistence`.
    pub fn run_due_save(
        &mut self,
        now: Instant,
        persistence: &dyn CanvasPersistence,
    ) -> Option<PersistenceResult<SavedRecord>> {
        let pending = self.begin_due_save(now)?;
        Some(self.execute(pending, now, persistence))
    }

    /// Forces a save and runs it synchronously against `persistence`.
    pub fn save_now(
        &mut self,
        persistence: &dyn CanvasPersistence,
    ) -> Option<PersistenceResult<SavedRecord>> {
        let pending = self.force_save()?;
        Some(self.execute(pending, Instant::now(), persistence))
    }

    fn execute(
        &mut self,
        pending: PendingSave,
        now: Instant,
        persistence: &dyn CanvasPersistence,
    ) -> PersistenceResult<SavedRecord> {
        let result = persistence.save(&pending.request);
        self.finish_save(pending.ticket, &result, now);
        result
    }

    /// Hydrates from the collaborators: canonical sections, then the latest
    /// persisted document.
    pub fn load_from(
        &mut self,
        canonical_source: &dyn CanonicalSectionSource,
        loader: &dyn CanvasLoader,
    ) -> PersistenceResult<LoadOutcome> {
        let started_at = Instant::now();
        let result = self.try_load(canonical_source, loader);
        match &result {
            Ok(outcome) => {
                self.debouncer.cancel();
                info!(
                    "event=document_load module=store status=ok outcome={} sections={} widgets={} duration_ms={}",
                    match outcome {
                        LoadOutcome::Empty => "empty",
                        LoadOutcome::Loaded { .. } => "loaded",
                    },
                    self.document.sections.len(),
                    self.document.widget_count(),
                    started_at.elapsed().as_millis()
                );
            }
            Err(err) => {
                if matches!(err, PersistenceError::Unauthorized) {
                    self.status.is_authenticated = false;
                }
                self.status.sync_error = Some(err.to_string());
                warn!(
                    "event=document_load module=store status=error error=\"{}\"",
                    err
                );
            }
        }
        result
    }

    fn try_load(
        &mut self,
        canonical_source: &dyn CanonicalSectionSource,
        loader: &dyn CanvasLoader,
    ) -> PersistenceResult<LoadOutcome> {
        let canonical = canonical_source.canonical_sections()?;
        let Some(record) = loader.load(None)? else {
            let local = std::mem::take(&mut self.document.sections);
            self.document.sections = reconcile_sections(&canonical, local);
            self.status.sync_error = None;
            return Ok(LoadOutcome::Empty);
        };

        let json = self.sealer.open(&record.payload)?;
        let mut document: Document = serde_json::from_str(&json)?;
        document.sections = reconcile_sections(&canonical, document.sections);
        document.meta.db_id = Some(record.id.clone());

        self.document = document;
        self.rebuild_sheets();
        self.status.last_synced_at = Some(record.updated_at);
        self.status.sync_error = None;
        Ok(LoadOutcome::Loaded {
            document_id: record.id,
        })
    }

    fn rebuild_sheets(&mut self) {
        self.sheets.clear();
        for table in self.document.table_widgets() {
            if let Some(grid) = table.table_grid() {
                self.sheets.update_sheet(&table.id, grid);
            }
        }
    }

    fn commit(&mut self, event: &str, section_id: &str) {
        self.document.touch(Utc::now());
        self.debouncer.schedule(Instant::now());
        debug!(
            "event={} module=store status=scheduled section_id={} debounce_ms={}",
            event,
            section_id,
            self.debouncer.delay().as_millis()
        );
    }
}

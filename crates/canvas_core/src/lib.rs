//! Core domain logic for the growth canvas editor.
//! This crate is the single source of truth for document invariants.

pub mod chart;
pub mod db;
pub mod drag;
pub mod logging;
pub mod model;
pub mod repo;
pub mod sheet;
pub mod store;
pub mod sync;
pub mod text;
pub mod tree;

pub use chart::{ChartProjection, ChartRecord, ChartSource, SeriesValue};
pub use drag::{place_widget, CancelPolicy, DragController, DragState};
pub use logging::{default_log_level, init_logging, logging_status, LogTarget, LoggingConfig};
pub use model::document::{Document, ProjectInfo, ProjectMeta};
pub use model::section::{reconcile_sections, CanonicalSection, Section, SectionId};
pub use model::widget::{
    ChartConfig, ChartType, LinkData, LinkProvider, Widget, WidgetId, WidgetKind, WidgetPatch,
    WidgetPayload,
};
pub use repo::canvas_repo::{CanvasRepoError, CanvasRepoResult, SqliteCanvasRepository};
pub use sheet::{coords_to_address, range_address, ErrorKind, SheetEngine};
pub use store::{DocumentStore, LoadOutcome, PendingSave, StoreConfig};
pub use sync::{
    CanonicalSectionSource, CanvasLoader, CanvasPersistence, PayloadSealer, PersistenceError,
    PersistenceResult, PlaintextSealer, SaveRequest, SavedRecord, SyncStatus,
};
pub use text::{render_pseudo_markdown, revert_to_markdown};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

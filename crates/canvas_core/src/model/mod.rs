//! Canvas document model.
//!
//! # Responsibility
//! - Define the data structures every other module reads and mutates.
//! - Own the persisted JSON shape of a canvas document.
//!
//! # Invariants
//! - Widgets are identified by a stable `WidgetId`.
//! - Only container widgets own children.
//! - Schema evolution is additive: new fields are optional.

pub mod document;
pub mod section;
pub mod table;
pub mod widget;

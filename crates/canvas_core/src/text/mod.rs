//! Text widget content transforms.
//!
//! # Responsibility
//! - Convert between the line-based pseudo-markdown authors type and the
//!   HTML fragment a text widget displays.
//!
//! # Invariants
//! - Canonical markdown survives `render_pseudo_markdown` followed by
//!   `revert_to_markdown` unchanged.

mod markdown;

pub use markdown::{render_pseudo_markdown, revert_to_markdown};

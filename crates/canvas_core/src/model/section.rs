//! Section model and canonical reconciliation.
//!
//! # Responsibility
//! - Define named top-level groupings that each own one widget forest.
//! - Reconcile locally stored sections against the canonical section list.
//!
//! # Invariants
//! - After reconciliation every canonical section appears exactly once, in
//!   canonical order, carrying the canonical id.
//! - Local widgets and completion flags are never dropped by reconciliation.

use crate::model::widget::Widget;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub type SectionId = String;

/// Section titles a fresh document starts with, in display order.
pub const DEFAULT_SECTION_TITLES: [&str; 5] = [
    "FOUNDATIONS & RETENTION",
    "ACQUISITION",
    "ACTIVATION",
    "REVENUE & MONETIZATION",
    "REFERRAL & LOOPS",
];

/// Local starter sections; ids are remapped to canonical ones on load.
pub fn default_sections() -> Vec<Section> {
    DEFAULT_SECTION_TITLES
        .iter()
        .enumerate()
        .map(|(index, title)| Section::new(format!("section_{}", index + 1), *title))
        .collect()
}

/// Top-level named grouping of widgets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub id: SectionId,
    pub title: String,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(default)]
    pub widgets: Vec<Widget>,
}

impl Section {
    pub fn new(id: impl Into<SectionId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            is_completed: false,
            widgets: Vec::new(),
        }
    }

    /// Counts every widget in this section including descendants.
    pub fn widget_count(&self) -> usize {
        self.widgets.iter().map(Widget::subtree_len).sum()
    }
}

/// Authoritative `{id, title}` pair served by the canonical-sections source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalSection {
    pub id: SectionId,
    pub title: String,
}

/// Merges `local` sections into the `canonical` ordering by title match.
///
/// Matched sections keep widgets and completion but adopt the canonical id.
/// Unmatched canonical titles become fresh empty sections. Unmatched local
/// sections that still hold widgets are appended after canonical ones; empty
/// unmatched ones are dropped. An empty canonical list returns `local` as is.
pub fn reconcile_sections(canonical: &[CanonicalSection], local: Vec<Section>) -> Vec<Section> {
    if canonical.is_empty() {
        return local;
    }

    let mut slots: Vec<Option<Section>> = local.into_iter().map(Some).collect();
    let mut first_by_title: HashMap<String, usize> = HashMap::new();
    for (index, slot) in slots.iter().enumerate() {
        if let Some(section) = slot {
            first_by_title.entry(section.title.clone()).or_insert(index);
        }
    }

    let mut merged: Vec<Section> = canonical
        .iter()
        .map(|entry| {
            let matched = first_by_title
                .get(&entry.title)
                .and_then(|index| slots[*index].take());
            match matched {
                Some(mut section) => {
                    section.id = entry.id.clone();
                    section
                }
                None => Section::new(entry.id.clone(), entry.title.clone()),
            }
        })
        .collect();

    merged.extend(
        slots
            .into_iter()
            .flatten()
            .filter(|section| !section.widgets.is_empty()),
    );
    merged
}

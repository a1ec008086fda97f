//! Document root aggregate.
//!
//! # Responsibility
//! - Hold the ordered section list plus project metadata.
//! - Define the persisted project-state JSON shape.
//!
//! # Invariants
//! - `meta.last_modified` moves forward on every structural or content
//!   mutation routed through the document store.
//! - Section order is the display order.

use crate::model::section::{Section, SectionId};
use crate::model::widget::Widget;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const SCHEMA_VERSION: &str = "1.0.0";
pub const DEFAULT_THEME: &str = "light";
pub const DEFAULT_GRID_COLUMNS: u8 = 1;
pub const MAX_GRID_COLUMNS: u8 = 3;

/// Document-level metadata used as sync signal and layout hint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectMeta {
    #[serde(default = "default_version")]
    pub version: String,
    pub last_modified: DateTime<Utc>,
    #[serde(default = "default_theme")]
    pub theme: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grid_columns: Option<u8>,
    /// Canonical persisted record id adopted after the first save.
    #[serde(rename = "dbId", default, skip_serializing_if = "Option::is_none")]
    pub db_id: Option<String>,
}

/// User-facing project labels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub student_name: String,
}

/// Root aggregate: sections, project labels and metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub meta: ProjectMeta,
    #[serde(default)]
    pub project: ProjectInfo,
    #[serde(rename = "syllabus_sections", default)]
    pub sections: Vec<Section>,
}

fn default_version() -> String {
    SCHEMA_VERSION.to_string()
}

fn default_theme() -> String {
    DEFAULT_THEME.to_string()
}

impl Document {
    /// Creates an empty document stamped at `now`.
    pub fn empty(now: DateTime<Utc>) -> Self {
        Self {
            meta: ProjectMeta {
                version: default_version(),
                last_modified: now,
                theme: default_theme(),
                grid_columns: Some(DEFAULT_GRID_COLUMNS),
                db_id: None,
            },
            project: ProjectInfo::default(),
            sections: Vec::new(),
        }
    }

    pub fn section(&self, section_id: &str) -> Option<&Section> {
        self.sections.iter().find(|section| section.id == section_id)
    }

    pub fn section_mut(&mut self, section_id: &str) -> Option<&mut Section> {
        self.sections
            .iter_mut()
            .find(|section| section.id == section_id)
    }

    pub fn section_ids(&self) -> Vec<SectionId> {
        self.sections.iter().map(|section| section.id.clone()).collect()
    }

    /// Counts widgets across all sections including descendants.
    pub fn widget_count(&self) -> usize {
        self.sections.iter().map(Section::widget_count).sum()
    }

    /// Collects every table widget in document order, depth-first.
    pub fn table_widgets(&self) -> Vec<&Widget> {
        let mut tables = Vec::new();
        for section in &self.sections {
            collect_tables(&section.widgets, &mut tables);
        }
        tables
    }

    /// Refreshes the dirty/sync timestamp.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.meta.last_modified = now;
    }
}

fn collect_tables<'a>(widgets: &'a [Widget], out: &mut Vec<&'a Widget>) {
    for widget in widgets {
        if widget.table_grid().is_some() {
            out.push(widget);
        }
        collect_tables(widget.children(), out);
    }
}

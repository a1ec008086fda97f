//! Widget domain model.
//!
//! # Responsibility
//! - Define the typed content node stored in section widget forests.
//! - Keep per-type payload fields in one tagged union so a widget can only
//!   carry the data of its own kind.
//!
//! # Invariants
//! - `id` is stable for the widget lifetime and is the only handle used by
//!   tree and drag operations.
//! - Only `WidgetPayload::Container` owns children.
//! - Serialized shape stays additive: optional fields default when absent and
//!   unknown fields are ignored.

use crate::model::table;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable widget identifier.
///
/// Kept as a string alias because persisted documents carry ids minted by
/// other clients.
pub type WidgetId = String;

const DEFAULT_TEXT_CONTENT: &str = "<h3>New title</h3><div>Write your ideas here...</div>";
const DEFAULT_CONTAINER_TITLE: &str = "New hypothesis";

static IMAGE_URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\.(jpg|jpeg|png|gif|webp|bmp|svg)$").expect("valid image url regex")
});
static VIDEO_URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\.(mp4|webm|ogg|mov)$").expect("valid video url regex"));

const FILE_EXTENSIONS: &[&str] = &[
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "zip", "rar", "txt", "csv",
];

/// Widget type tag without payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WidgetKind {
    Text,
    Image,
    Table,
    Chart,
    Link,
    Container,
}

impl WidgetKind {
    /// Returns the persisted `type` tag.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text_block",
            Self::Image => "image_base64",
            Self::Table => "table",
            Self::Chart => "graph_plot",
            Self::Link => "link_block",
            Self::Container => "accordion",
        }
    }
}

/// Chart rendering style. Projection does not depend on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartType {
    #[default]
    Bar,
    Line,
    Pie,
    Area,
}

/// Chart configuration referencing one table widget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartConfig {
    #[serde(rename = "tableId")]
    pub table_id: WidgetId,
    #[serde(rename = "chartType", default)]
    pub chart_type: ChartType,
    /// Zero-based column used for record labels.
    #[serde(rename = "xAxisColumn", default)]
    pub axis_column: usize,
    /// Zero-based columns projected as numeric series.
    #[serde(rename = "dataColumns", default)]
    pub series_columns: Vec<usize>,
}

/// Embed provider inferred from a link URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkProvider {
    Youtube,
    File,
    Generic,
    Twitter,
    Github,
    Spotify,
    Image,
    Video,
    Figma,
    Loom,
    Vimeo,
    Codepen,
    Map,
    Instagram,
    Reddit,
}

impl LinkProvider {
    /// Infers the provider tag from a URL.
    ///
    /// Media extensions win over host matches; document extensions are only
    /// checked when no host matched.
    pub fn infer(url: &str) -> Self {
        let lower = url.trim().to_ascii_lowercase();

        if IMAGE_URL_RE.is_match(&lower) {
            return Self::Image;
        }
        if VIDEO_URL_RE.is_match(&lower) {
            return Self::Video;
        }

        let hosts: &[(&[&str], LinkProvider)] = &[
            (&["youtube.com", "youtu.be"], Self::Youtube),
            (&["twitter.com", "x.com"], Self::Twitter),
            (&["github.com"], Self::Github),
            (&["spotify.com"], Self::Spotify),
            (&["figma.com"], Self::Figma),
            (&["loom.com"], Self::Loom),
            (&["vimeo.com"], Self::Vimeo),
            (&["codepen.io"], Self::Codepen),
            (&["maps.google.com", "google.com/maps"], Self::Map),
            (&["instagram.com"], Self::Instagram),
            (&["reddit.com"], Self::Reddit),
        ];
        for (needles, provider) in hosts {
            if needles.iter().any(|needle| lower.contains(needle)) {
                return *provider;
            }
        }

        let extension = lower.rsplit('.').next().unwrap_or_default();
        if FILE_EXTENSIONS.contains(&extension) {
            return Self::File;
        }

        Self::Generic
    }
}

/// Rich link embed data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkData {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<LinkProvider>,
}

impl LinkData {
    /// Builds link data with the provider inferred from `url`.
    pub fn from_url(url: impl Into<String>) -> Self {
        let url = url.into();
        let provider = LinkProvider::infer(&url);
        Self {
            url,
            title: None,
            description: None,
            provider: Some(provider),
        }
    }
}

/// Type-specific widget payload.
///
/// Serialized inline with the widget using the `type` tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WidgetPayload {
    /// Rich-text markup.
    #[serde(rename = "text_block")]
    Text {
        #[serde(default)]
        content: String,
    },
    /// Inline data URL or external reference.
    #[serde(rename = "image_base64")]
    Image {
        #[serde(default)]
        src: String,
    },
    /// Raw cell strings; row 0 is a header only by renderer convention.
    #[serde(rename = "table")]
    Table {
        #[serde(rename = "tableData", default)]
        grid: Vec<Vec<String>>,
    },
    #[serde(rename = "graph_plot")]
    Chart {
        #[serde(
            rename = "graphConfig",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        config: Option<ChartConfig>,
    },
    #[serde(rename = "link_block")]
    Link {
        #[serde(rename = "linkData", default, skip_serializing_if = "Option::is_none")]
        link: Option<LinkData>,
    },
    /// Collapsible group; the only payload owning children.
    #[serde(rename = "accordion")]
    Container {
        #[serde(default)]
        title: String,
        #[serde(default)]
        children: Vec<Widget>,
    },
}

impl WidgetPayload {
    /// Returns the starter payload for a freshly added widget.
    pub fn default_for(kind: WidgetKind) -> Self {
        match kind {
            WidgetKind::Text => Self::Text {
                content: DEFAULT_TEXT_CONTENT.to_string(),
            },
            WidgetKind::Image => Self::Image { src: String::new() },
            WidgetKind::Table => Self::Table {
                grid: table::default_grid(),
            },
            WidgetKind::Chart => Self::Chart { config: None },
            WidgetKind::Link => Self::Link { link: None },
            WidgetKind::Container => Self::Container {
                title: DEFAULT_CONTAINER_TITLE.to_string(),
                children: Vec::new(),
            },
        }
    }

    pub fn kind(&self) -> WidgetKind {
        match self {
            Self::Text { .. } => WidgetKind::Text,
            Self::Image { .. } => WidgetKind::Image,
            Self::Table { .. } => WidgetKind::Table,
            Self::Chart { .. } => WidgetKind::Chart,
            Self::Link { .. } => WidgetKind::Link,
            Self::Container { .. } => WidgetKind::Container,
        }
    }
}

/// Content node of a section widget forest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Widget {
    pub id: WidgetId,
    #[serde(flatten)]
    pub payload: WidgetPayload,
}

impl Widget {
    /// Creates a widget of `kind` with a generated id and starter payload.
    pub fn new(kind: WidgetKind) -> Self {
        Self::with_payload(Uuid::new_v4().to_string(), WidgetPayload::default_for(kind))
    }

    /// Creates a widget with caller-provided identity and payload.
    ///
    /// Used by load/import paths where identity already exists.
    pub fn with_payload(id: impl Into<WidgetId>, payload: WidgetPayload) -> Self {
        Self {
            id: id.into(),
            payload,
        }
    }

    pub fn kind(&self) -> WidgetKind {
        self.payload.kind()
    }

    pub fn is_container(&self) -> bool {
        matches!(self.payload, WidgetPayload::Container { .. })
    }

    /// Returns child widgets; empty for every non-container kind.
    pub fn children(&self) -> &[Widget] {
        match &self.payload {
            WidgetPayload::Container { children, .. } => children,
            _ => &[],
        }
    }

    /// Returns the mutable child list for containers only.
    pub fn children_mut(&mut self) -> Option<&mut Vec<Widget>> {
        match &mut self.payload {
            WidgetPayload::Container { children, .. } => Some(children),
            _ => None,
        }
    }

    /// Returns the raw grid for table widgets.
    pub fn table_grid(&self) -> Option<&[Vec<String>]> {
        match &self.payload {
            WidgetPayload::Table { grid } => Some(grid),
            _ => None,
        }
    }

    /// Counts this widget plus all descendants.
    pub fn subtree_len(&self) -> usize {
        1 + self
            .children()
            .iter()
            .map(Widget::subtree_len)
            .sum::<usize>()
    }

    /// Returns whether `id` names this widget or any descendant.
    pub fn subtree_contains(&self, id: &str) -> bool {
        self.id == id || self.children().iter().any(|child| child.subtree_contains(id))
    }

    /// Shallow-merges `patch` over this widget's payload.
    ///
    /// Fields owned by other widget kinds are ignored. Returns whether any
    /// field was applied.
    pub fn apply_patch(&mut self, patch: &WidgetPatch) -> bool {
        let mut applied = false;
        match &mut self.payload {
            WidgetPayload::Text { content } => {
                if let Some(value) = &patch.content {
                    *content = value.clone();
                    applied = true;
                }
            }
            WidgetPayload::Image { src } => {
                if let Some(value) = &patch.src {
                    *src = value.clone();
                    applied = true;
                }
            }
            WidgetPayload::Table { grid } => {
                if let Some(value) = &patch.table_data {
                    *grid = value.clone();
                    applied = true;
                }
            }
            WidgetPayload::Chart { config } => {
                if let Some(value) = &patch.graph_config {
                    *config = value.clone();
                    applied = true;
                }
            }
            WidgetPayload::Link { link } => {
                if let Some(value) = &patch.link_data {
                    *link = value.clone().map(|mut data| {
                        if data.provider.is_none() {
                            data.provider = Some(LinkProvider::infer(&data.url));
                        }
                        data
                    });
                    applied = true;
                }
            }
            WidgetPayload::Container { title, .. } => {
                if let Some(value) = &patch.title {
                    *title = value.clone();
                    applied = true;
                }
            }
        }
        applied
    }
}

/// Partial payload used by `update`.
///
/// `None` leaves the field untouched. Nested `Option`s distinguish
/// "leave as is" from "clear".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WidgetPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(
        rename = "tableData",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub table_data: Option<Vec<Vec<String>>>,
    #[serde(
        rename = "graphConfig",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub graph_config: Option<Option<ChartConfig>>,
    #[serde(rename = "linkData", default, skip_serializing_if = "Option::is_none")]
    pub link_data: Option<Option<LinkData>>,
}

impl WidgetPatch {
    pub fn content(value: impl Into<String>) -> Self {
        Self {
            content: Some(value.into()),
            ..Self::default()
        }
    }

    pub fn title(value: impl Into<String>) -> Self {
        Self {
            title: Some(value.into()),
            ..Self::default()
        }
    }

    pub fn table(grid: Vec<Vec<String>>) -> Self {
        Self {
            table_data: Some(grid),
            ..Self::default()
        }
    }

    pub fn chart(config: ChartConfig) -> Self {
        Self {
            graph_config: Some(Some(config)),
            ..Self::default()
        }
    }

    pub fn link(data: LinkData) -> Self {
        Self {
            link_data: Some(Some(data)),
            ..Self::default()
        }
    }

    /// Returns whether this patch replaces table cell data.
    pub fn touches_table(&self) -> bool {
        self.table_data.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::{
        ChartConfig, ChartType, LinkData, LinkProvider, Widget, WidgetKind, WidgetPatch,
        WidgetPayload,
    };

    #[test]
    fn infer_provider_prefers_media_extensions_over_hosts() {
        assert_eq!(
            LinkProvider::infer("https://github.com/a/b/raw/main/logo.PNG"),
            LinkProvider::Image
        );
        assert_eq!(
            LinkProvider::infer("https://cdn.example.com/clip.mp4"),
            LinkProvider::Video
        );
    }

    #[test]
    fn infer_provider_matches_known_hosts_and_files() {
        assert_eq!(
            LinkProvider::infer("https://youtu.be/dQw4w9WgXcQ"),
            LinkProvider::Youtube
        );
        assert_eq!(
            LinkProvider::infer("https://www.google.com/maps/place/x"),
            LinkProvider::Map
        );
        assert_eq!(
            LinkProvider::infer("https://example.com/report.pdf"),
            LinkProvider::File
        );
        assert_eq!(
            LinkProvider::infer("https://example.com/about"),
            LinkProvider::Generic
        );
    }

    #[test]
    fn patch_ignores_fields_owned_by_other_kinds() {
        let mut table = Widget::new(WidgetKind::Table);
        let before = table.clone();
        let patch = WidgetPatch::chart(ChartConfig {
            table_id: "t".to_string(),
            chart_type: ChartType::Line,
            axis_column: 0,
            series_columns: vec![1],
        });

        assert!(!table.apply_patch(&patch));
        assert_eq!(table, before);
    }

    #[test]
    fn link_patch_infers_missing_provider() {
        let mut link = Widget::new(WidgetKind::Link);
        let mut data = LinkData::from_url("https://www.reddit.com/r/rust");
        data.provider = None;

        assert!(link.apply_patch(&WidgetPatch::link(data)));
        match &link.payload {
            WidgetPayload::Link { link: Some(data) } => {
                assert_eq!(data.provider, Some(LinkProvider::Reddit));
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn non_container_children_are_ignored_on_load() {
        let json = r#"{"id":"w1","type":"text_block","content":"hi","children":[{"id":"x","type":"table"}]}"#;
        let widget: Widget = serde_json::from_str(json).expect("widget should parse");
        assert_eq!(widget.kind(), WidgetKind::Text);
        assert!(widget.children().is_empty());
        assert_eq!(widget.subtree_len(), 1);
    }

    #[test]
    fn serialized_widget_uses_persisted_type_tags() {
        let widget = Widget::with_payload(
            "c1",
            WidgetPayload::Container {
                title: "Group".to_string(),
                children: vec![Widget::with_payload(
                    "t1",
                    WidgetPayload::Table {
                        grid: vec![vec!["A".to_string()]],
                    },
                )],
            },
        );
        let value = serde_json::to_value(&widget).expect("widget should serialize");
        assert_eq!(value["type"], WidgetKind::Container.as_str());
        assert_eq!(value["children"][0]["type"], "table");
        assert_eq!(value["children"][0]["tableData"][0][0], "A");
    }
}

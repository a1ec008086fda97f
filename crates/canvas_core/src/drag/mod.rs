//! Drag-reorder placement and gesture state machine.
//!
//! # Responsibility
//! - Resolve `(active, over)` pairs into one remove+insert against a
//!   section forest.
//! - Track the `Idle -> Dragging -> Idle` gesture and commit every hover step.
//!
//! # Invariants
//! - A placement either applies completely or leaves the forest untouched.
//! - The dragged subtree moves as one unit; no widget is duplicated or lost.
//! - A widget is never placed inside its own subtree.

use crate::model::widget::{Widget, WidgetId};
use crate::tree::{self, Location, ParentRef};
use log::{debug, info, trace};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Reserved prefix for "drop into this container" targets.
pub const CONTAINER_DROP_PREFIX: &str = "container-";

/// Builds the drop-zone sentinel id bound to `container_id`.
pub fn drop_zone_id(container_id: &str) -> String {
    format!("{CONTAINER_DROP_PREFIX}{container_id}")
}

/// Extracts the container id from a drop-zone sentinel.
pub fn parse_drop_zone(over_id: &str) -> Option<&str> {
    over_id
        .strip_prefix(CONTAINER_DROP_PREFIX)
        .filter(|id| !id.is_empty())
}

/// Why a placement was not applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlacementRejection {
    /// Active and over ids are identical.
    SameTarget,
    /// Dragged widget is not in the forest.
    SourceNotFound(WidgetId),
    /// Over target or drop-zone container is not in the forest.
    TargetNotFound(String),
    /// Drop-zone sentinel names a widget that is not a container.
    TargetNotContainer(WidgetId),
    /// Destination lies inside the dragged subtree.
    IntoOwnSubtree(WidgetId),
}

impl Display for PlacementRejection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SameTarget => write!(f, "active and over targets are identical"),
            Self::SourceNotFound(id) => write!(f, "dragged widget not found: {id}"),
            Self::TargetNotFound(id) => write!(f, "drop target not found: {id}"),
            Self::TargetNotContainer(id) => write!(f, "drop target is not a container: {id}"),
            Self::IntoOwnSubtree(id) => write!(f, "cannot drop widget into its own subtree: {id}"),
        }
    }
}

impl Display for ParentRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Root => write!(f, "root"),
            Self::Container(id) => write!(f, "{id}"),
        }
    }
}

/// Resolved move: source location plus destination list and index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub source: Location,
    pub target: ParentRef,
    /// Pre-removal sibling index; `None` appends.
    pub target_index: Option<usize>,
}

/// Resolves where `active_id` would land when dropped on `over_id`.
pub fn resolve_placement(
    forest: &[Widget],
    active_id: &str,
    over_id: &str,
) -> Result<Placement, PlacementRejection> {
    if active_id == over_id {
        return Err(PlacementRejection::SameTarget);
    }

    let source = tree::locate(forest, active_id)
        .ok_or_else(|| PlacementRejection::SourceNotFound(active_id.to_string()))?;
    let active = tree::find(forest, active_id)
        .ok_or_else(|| PlacementRejection::SourceNotFound(active_id.to_string()))?;

    if let Some(container_id) = parse_drop_zone(over_id) {
        let container = tree::find(forest, container_id)
            .ok_or_else(|| PlacementRejection::TargetNotFound(over_id.to_string()))?;
        if !container.is_container() {
            return Err(PlacementRejection::TargetNotContainer(
                container_id.to_string(),
            ));
        }
        if active.subtree_contains(container_id) {
            return Err(PlacementRejection::IntoOwnSubtree(active_id.to_string()));
        }
        return Ok(Placement {
            source,
            target: ParentRef::Container(container_id.to_string()),
            target_index: None,
        });
    }

    if active.subtree_contains(over_id) {
        return Err(PlacementRejection::IntoOwnSubtree(active_id.to_string()));
    }
    let destination = tree::locate(forest, over_id)
        .ok_or_else(|| PlacementRejection::TargetNotFound(over_id.to_string()))?;

    Ok(Placement {
        source,
        target: destination.parent,
        target_index: Some(destination.index),
    })
}

/// Applies a resolved placement as one remove+insert.
///
/// Returns `false` with the forest unchanged if the placement no longer fits
/// the forest.
pub fn apply_placement(forest: &mut Vec<Widget>, placement: &Placement) -> bool {
    if tree::children(forest, &placement.target).is_none() {
        return false;
    }
    let Some(source_list) = tree::children_mut(forest, &placement.source.parent) else {
        return false;
    };
    if placement.source.index >= source_list.len() {
        return false;
    }
    let moved = source_list.remove(placement.source.index);

    match tree::children_mut(forest, &placement.target) {
        Some(target_list) => {
            let index = placement
                .target_index
                .unwrap_or(target_list.len())
                .min(target_list.len());
            target_list.insert(index, moved);
            true
        }
        None => {
            // Target vanished with the removal; put the node back.
            if let Some(source_list) = tree::children_mut(forest, &placement.source.parent) {
                source_list.insert(placement.source.index, moved);
            }
            false
        }
    }
}

/// Moves `active_id` to the position designated by `over_id`.
///
/// Same-list moves behave as an index shift; cross-list moves re-parent.
/// Unresolvable endpoints are a no-op.
pub fn place_widget(forest: &mut Vec<Widget>, active_id: &str, over_id: &str) -> bool {
    match resolve_placement(forest, active_id, over_id) {
        Ok(placement) => {
            let applied = apply_placement(forest, &placement);
            debug!(
                "event=widget_place module=drag status={} active_id={} over_id={} from={} to={}",
                if applied { "ok" } else { "skipped" },
                active_id,
                over_id,
                placement.source.parent,
                placement.target
            );
            applied
        }
        Err(rejection) => {
            trace_rejection(active_id, over_id, &rejection);
            false
        }
    }
}

fn trace_rejection(active_id: &str, over_id: &str, rejection: &PlacementRejection) {
    trace!(
        "event=widget_place module=drag status=rejected active_id={} over_id={} reason=\"{}\"",
        active_id,
        over_id,
        rejection
    );
}

/// What drag-cancel does with hover placements already committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelPolicy {
    /// Leave the last hover placement applied.
    #[default]
    KeepLastHover,
    /// Restore the forest captured at drag start.
    RestoreSnapshot,
}

/// Gesture state.
#[derive(Debug, Clone, PartialEq)]
pub enum DragState {
    Idle,
    Dragging {
        section_id: String,
        active_id: WidgetId,
        snapshot: Option<Vec<Widget>>,
    },
}

/// Drag gesture controller for one section at a time.
#[derive(Debug, Clone)]
pub struct DragController {
    policy: CancelPolicy,
    state: DragState,
}

impl Default for DragController {
    fn default() -> Self {
        Self::new(CancelPolicy::default())
    }
}

impl DragController {
    pub fn new(policy: CancelPolicy) -> Self {
        Self {
            policy,
            state: DragState::Idle,
        }
    }

    pub fn policy(&self) -> CancelPolicy {
        self.policy
    }

    pub fn state(&self) -> &DragState {
        &self.state
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging { .. })
    }

    pub fn active_id(&self) -> Option<&str> {
        match &self.state {
            DragState::Dragging { active_id, .. } => Some(active_id),
            DragState::Idle => None,
        }
    }

    /// Section whose forest the current gesture operates on.
    pub fn section_id(&self) -> Option<&str> {
        match &self.state {
            DragState::Dragging { section_id, .. } => Some(section_id),
            DragState::Idle => None,
        }
    }

    /// Enters `Dragging` for `active_id`; refused when the widget is unknown.
    ///
    /// A gesture already in progress is replaced.
    pub fn drag_start(&mut self, section_id: &str, active_id: &str, forest: &[Widget]) -> bool {
        if !tree::contains(forest, active_id) {
            return false;
        }
        let snapshot = match self.policy {
            CancelPolicy::RestoreSnapshot => Some(forest.to_vec()),
            CancelPolicy::KeepLastHover => None,
        };
        self.state = DragState::Dragging {
            section_id: section_id.to_string(),
            active_id: active_id.to_string(),
            snapshot,
        };
        debug!(
            "event=drag_start module=drag status=ok section_id={} active_id={}",
            section_id, active_id
        );
        true
    }

    /// Commits a tentative placement for the current hover target.
    pub fn drag_over(&mut self, forest: &mut Vec<Widget>, over_id: &str) -> bool {
        let Some(active_id) = self.active_id().map(str::to_string) else {
            return false;
        };
        place_widget(forest, &active_id, over_id)
    }

    /// Performs the final corrective commit and returns to `Idle`.
    pub fn drag_end(&mut self, forest: &mut Vec<Widget>, over_id: Option<&str>) -> bool {
        let state = std::mem::replace(&mut self.state, DragState::Idle);
        let DragState::Dragging {
            section_id,
            active_id,
            ..
        } = state
        else {
            return false;
        };
        let applied = over_id
            .map(|over_id| place_widget(forest, &active_id, over_id))
            .unwrap_or(false);
        info!(
            "event=drag_end module=drag status=ok section_id={} active_id={} final_commit={}",
            section_id, active_id, applied
        );
        applied
    }

    /// Returns to `Idle`; restores the drag-start forest under
    /// `CancelPolicy::RestoreSnapshot`. Returns whether the forest changed.
    pub fn drag_cancel(&mut self, forest: &mut Vec<Widget>) -> bool {
        let state = std::mem::replace(&mut self.state, DragState::Idle);
        let DragState::Dragging {
            section_id,
            active_id,
            snapshot,
        } = state
        else {
            return false;
        };
        let restored = match snapshot {
            Some(snapshot) if *forest != snapshot => {
                *forest = snapshot;
                true
            }
            _ => false,
        };
        info!(
            "event=drag_cancel module=drag status=ok section_id={} active_id={} restored={}",
            section_id, active_id, restored
        );
        restored
    }

    /// Returns the dragged widget for overlay rendering.
    pub fn overlay_widget<'a>(&self, forest: &'a [Widget]) -> Option<&'a Widget> {
        self.active_id().and_then(|id| tree::find(forest, id))
    }
}

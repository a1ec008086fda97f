//! Widget tree operations over one section forest.
//!
//! # Responsibility
//! - Look up, insert, patch, remove and locate widgets by id at any depth.
//! - Resolve the owning child list of a widget for relocation.
//!
//! # Invariants
//! - Not-found ids are silent no-ops reported through the return value.
//! - Removal takes the whole subtree with the node.
//! - A widget id appears at most once in a forest; inserting a duplicate id
//!   is refused.

use crate::model::widget::{Widget, WidgetId, WidgetPatch};

/// Owning list of a widget: the section's top level or a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParentRef {
    Root,
    Container(WidgetId),
}

/// Direct parent list plus index of one widget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub parent: ParentRef,
    pub index: usize,
}

/// Depth-first search; returns the first match.
pub fn find<'a>(forest: &'a [Widget], id: &str) -> Option<&'a Widget> {
    for widget in forest {
        if widget.id == id {
            return Some(widget);
        }
        if let Some(found) = find(widget.children(), id) {
            return Some(found);
        }
    }
    None
}

pub fn find_mut<'a>(forest: &'a mut [Widget], id: &str) -> Option<&'a mut Widget> {
    for widget in forest.iter_mut() {
        if widget.id == id {
            return Some(widget);
        }
        if let Some(children) = widget.children_mut() {
            if let Some(found) = find_mut(children, id) {
                return Some(found);
            }
        }
    }
    None
}

pub fn contains(forest: &[Widget], id: &str) -> bool {
    find(forest, id).is_some()
}

/// Appends `widget` to the root list or to the children of `parent_id`.
///
/// Returns `false` and leaves the forest unchanged when the parent does not
/// exist, is not a container, or when any id of `widget`'s subtree is
/// already present.
pub fn insert(forest: &mut Vec<Widget>, widget: Widget, parent_id: Option<&str>) -> bool {
    if collect_ids(std::slice::from_ref(&widget))
        .iter()
        .any(|id| contains(forest, id))
    {
        return false;
    }

    match parent_id {
        None => {
            forest.push(widget);
            true
        }
        Some(parent_id) => match find_mut(forest, parent_id).and_then(Widget::children_mut) {
            Some(children) => {
                children.push(widget);
                true
            }
            None => false,
        },
    }
}

/// Shallow-merges `patch` into the widget with `id`.
///
/// Returns `true` only when the widget exists and at least one field applied.
pub fn update(forest: &mut [Widget], id: &str, patch: &WidgetPatch) -> bool {
    find_mut(forest, id)
        .map(|widget| widget.apply_patch(patch))
        .unwrap_or(false)
}

/// Removes the widget with `id` and its subtree; returns the detached node.
pub fn remove(forest: &mut Vec<Widget>, id: &str) -> Option<Widget> {
    if let Some(index) = forest.iter().position(|widget| widget.id == id) {
        return Some(forest.remove(index));
    }
    for widget in forest.iter_mut() {
        if let Some(children) = widget.children_mut() {
            if let Some(removed) = remove(children, id) {
                return Some(removed);
            }
        }
    }
    None
}

/// Resolves the direct parent list and index of `id`.
pub fn locate(forest: &[Widget], id: &str) -> Option<Location> {
    locate_in(forest, id, &ParentRef::Root)
}

fn locate_in(widgets: &[Widget], id: &str, parent: &ParentRef) -> Option<Location> {
    for (index, widget) in widgets.iter().enumerate() {
        if widget.id == id {
            return Some(Location {
                parent: parent.clone(),
                index,
            });
        }
        if widget.is_container() {
            let nested = ParentRef::Container(widget.id.clone());
            if let Some(found) = locate_in(widget.children(), id, &nested) {
                return Some(found);
            }
        }
    }
    None
}

/// Returns the mutable child list referenced by `parent`.
pub fn children_mut<'a>(forest: &'a mut Vec<Widget>, parent: &ParentRef) -> Option<&'a mut Vec<Widget>> {
    match parent {
        ParentRef::Root => Some(forest),
        ParentRef::Container(id) => find_mut(forest, id).and_then(Widget::children_mut),
    }
}

/// Returns the child list referenced by `parent`.
pub fn children<'a>(forest: &'a [Widget], parent: &ParentRef) -> Option<&'a [Widget]> {
    match parent {
        ParentRef::Root => Some(forest),
        ParentRef::Container(id) => find(forest, id)
            .filter(|widget| widget.is_container())
            .map(Widget::children),
    }
}

/// Counts every widget in the forest including descendants.
pub fn count(forest: &[Widget]) -> usize {
    forest.iter().map(Widget::subtree_len).sum()
}

/// Collects ids in depth-first pre-order.
pub fn collect_ids(forest: &[Widget]) -> Vec<WidgetId> {
    let mut ids = Vec::new();
    walk(forest, &mut |widget| ids.push(widget.id.clone()));
    ids
}

/// Visits every widget in depth-first pre-order.
pub fn walk<'a>(forest: &'a [Widget], visit: &mut impl FnMut(&'a Widget)) {
    for widget in forest {
        visit(widget);
        walk(widget.children(), visit);
    }
}

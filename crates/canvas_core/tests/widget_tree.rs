use canvas_core::model::widget::{Widget, WidgetKind, WidgetPatch, WidgetPayload};
use canvas_core::tree::{self, ParentRef};
use proptest::prelude::*;
use std::collections::HashSet;

const KINDS: [WidgetKind; 6] = [
    WidgetKind::Text,
    WidgetKind::Image,
    WidgetKind::Table,
    WidgetKind::Chart,
    WidgetKind::Link,
    WidgetKind::Container,
];

fn container(id: &str, children: Vec<Widget>) -> Widget {
    Widget::with_payload(
        id,
        WidgetPayload::Container {
            title: id.to_string(),
            children,
        },
    )
}

fn text(id: &str) -> Widget {
    Widget::with_payload(
        id,
        WidgetPayload::Text {
            content: String::new(),
        },
    )
}

fn assert_unique_ids(forest: &[Widget]) {
    let ids = tree::collect_ids(forest);
    let unique: HashSet<&String> = ids.iter().collect();
    assert_eq!(ids.len(), unique.len(), "duplicate ids in {ids:?}");
}

#[test]
fn insert_into_nested_container_and_find_it_depth_first() {
    let mut forest = vec![container("outer", vec![container("inner", vec![])])];

    assert!(tree::insert(&mut forest, text("leaf"), Some("inner")));

    let found = tree::find(&forest, "leaf").expect("leaf should be reachable");
    assert_eq!(found.id, "leaf");
    let location = tree::locate(&forest, "leaf").unwrap();
    assert_eq!(location.parent, ParentRef::Container("inner".to_string()));
    assert_eq!(location.index, 0);
}

#[test]
fn insert_with_unknown_or_leaf_parent_is_a_no_op() {
    let mut forest = vec![text("a")];
    let before = forest.clone();

    assert!(!tree::insert(&mut forest, text("b"), Some("missing")));
    assert!(!tree::insert(&mut forest, text("b"), Some("a")));
    assert_eq!(forest, before);
}

#[test]
fn new_container_starts_with_empty_children() {
    let widget = Widget::new(WidgetKind::Container);
    assert!(widget.is_container());
    assert!(widget.children().is_empty());
}

#[test]
fn update_reaches_nested_widget_and_ignores_foreign_fields() {
    let mut forest = vec![container("c", vec![text("t")])];

    assert!(tree::update(&mut forest, "t", &WidgetPatch::content("<div>hi</div>")));
    assert!(!tree::update(&mut forest, "t", &WidgetPatch::title("ignored")));
    assert!(!tree::update(&mut forest, "missing", &WidgetPatch::content("x")));

    match &tree::find(&forest, "t").unwrap().payload {
        WidgetPayload::Text { content } => assert_eq!(content, "<div>hi</div>"),
        other => panic!("unexpected payload: {other:?}"),
    }
}

#[test]
fn remove_takes_the_whole_subtree() {
    let mut forest = vec![
        container("c", vec![text("a"), container("d", vec![text("b")])]),
        text("z"),
    ];

    let removed = tree::remove(&mut forest, "d").expect("d exists");
    assert_eq!(removed.subtree_len(), 2);
    assert_eq!(tree::count(&forest), 3);
    assert!(tree::find(&forest, "b").is_none());
    assert!(tree::remove(&mut forest, "d").is_none());
}

#[derive(Debug, Clone)]
enum Op {
    Insert { kind: usize, parent: Option<usize> },
    Update { target: usize },
    Remove { target: usize },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..KINDS.len(), proptest::option::of(any::<usize>()))
            .prop_map(|(kind, parent)| Op::Insert { kind, parent }),
        any::<usize>().prop_map(|target| Op::Update { target }),
        any::<usize>().prop_map(|target| Op::Remove { target }),
    ]
}

fn pick(forest: &[Widget], seed: usize) -> Option<String> {
    let ids = tree::collect_ids(forest);
    if ids.is_empty() {
        None
    } else {
        Some(ids[seed % ids.len()].clone())
    }
}

proptest! {
    #[test]
    fn widget_count_tracks_inserted_and_removed_nodes(ops in prop::collection::vec(op_strategy(), 1..60)) {
        let mut forest: Vec<Widget> = Vec::new();

        for op in ops {
            let before = tree::count(&forest);
            let expected = match op {
                Op::Insert { kind, parent } => {
                    let parent_id = parent.and_then(|seed| pick(&forest, seed));
                    let accepts = match &parent_id {
                        None => true,
                        Some(id) => tree::find(&forest, id).is_some_and(Widget::is_container),
                    };
                    let applied = tree::insert(&mut forest, Widget::new(KINDS[kind]), parent_id.as_deref());
                    prop_assert_eq!(applied, accepts);
                    before + usize::from(accepts)
                }
                Op::Update { target } => {
                    if let Some(id) = pick(&forest, target) {
                        tree::update(&mut forest, &id, &WidgetPatch::content("x"));
                    }
                    before
                }
                Op::Remove { target } => match pick(&forest, target) {
                    Some(id) => {
                        let size = tree::find(&forest, &id).map_or(0, Widget::subtree_len);
                        let removed = tree::remove(&mut forest, &id);
                        prop_assert!(removed.is_some());
                        before - size
                    }
                    None => before,
                },
            };

            prop_assert_eq!(tree::count(&forest), expected);
            assert_unique_ids(&forest);
        }
    }
}

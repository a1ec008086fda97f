use canvas_core::db::{open_db, open_db_in_memory};
use canvas_core::model::widget::{WidgetKind, WidgetPatch};
use canvas_core::repo::canvas_repo::{CanvasRepoError, SqliteCanvasRepository};
use canvas_core::sync::{
    CanonicalSectionSource, CanvasLoader, CanvasPersistence, PersistenceError, SaveRequest,
    SealedPayload,
};
use canvas_core::{DocumentStore, LoadOutcome, StoreConfig};

fn request(id: Option<&str>, data: &str) -> SaveRequest {
    SaveRequest {
        document_id: id.map(str::to_string),
        title: "Plan".to_string(),
        payload: SealedPayload {
            data: data.to_string(),
            iv: None,
            salt: None,
        },
    }
}

#[test]
fn save_without_id_creates_and_with_id_updates() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCanvasRepository::try_new(&conn, "owner-1").unwrap();

    let created = repo.save(&request(None, "{\"v\":1}")).unwrap();
    let updated = repo.save(&request(Some(&created.id), "{\"v\":2}")).unwrap();

    assert_eq!(updated.id, created.id);
    assert_eq!(repo.list_canvases().unwrap().len(), 1);
    let loaded = repo.load(Some(&created.id)).unwrap().unwrap();
    assert_eq!(loaded.payload.data, "{\"v\":2}");
}

#[test]
fn latest_load_picks_most_recent_canvas_of_owner() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCanvasRepository::try_new(&conn, "owner-1").unwrap();
    let other = SqliteCanvasRepository::try_new(&conn, "owner-2").unwrap();

    assert_eq!(repo.load(None).unwrap(), None);
    repo.save(&request(Some("first"), "1")).unwrap();
    let second = repo.save(&request(Some("second"), "2")).unwrap();
    other.save(&request(Some("foreign"), "3")).unwrap();

    let latest = repo.load(None).unwrap().unwrap();
    assert_eq!(latest.id, second.id);
}

#[test]
fn foreign_canvases_are_unauthorized() {
    let conn = open_db_in_memory().unwrap();
    let owner = SqliteCanvasRepository::try_new(&conn, "owner-1").unwrap();
    let intruder = SqliteCanvasRepository::try_new(&conn, "owner-2").unwrap();
    let saved = owner.save(&request(None, "mine")).unwrap();

    assert_eq!(
        intruder.save(&request(Some(&saved.id), "theirs")),
        Err(PersistenceError::Unauthorized)
    );
    assert_eq!(
        intruder.load(Some(&saved.id)),
        Err(PersistenceError::Unauthorized)
    );
    assert_eq!(
        owner.load(Some(&saved.id)).unwrap().unwrap().payload.data,
        "mine"
    );
}

#[test]
fn unknown_id_load_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCanvasRepository::try_new(&conn, "owner-1").unwrap();

    assert_eq!(repo.load(Some("nope")), Err(PersistenceError::NotFound));
    assert!(matches!(
        repo.get_canvas("nope"),
        Ok(None)
    ));
}

#[test]
fn empty_owner_is_unauthorized_for_canvases_only() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCanvasRepository::try_new(&conn, "").unwrap();

    assert_eq!(repo.save(&request(None, "x")), Err(PersistenceError::Unauthorized));
    assert_eq!(repo.load(None), Err(PersistenceError::Unauthorized));
    assert!(matches!(repo.latest_canvas(), Err(CanvasRepoError::Unauthorized)));
    assert_eq!(repo.canonical_sections().unwrap().len(), 5);
}

#[test]
fn canonical_sections_follow_order_index() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCanvasRepository::try_new(&conn, "owner-1").unwrap();

    let ids: Vec<String> = repo
        .canonical_sections()
        .unwrap()
        .into_iter()
        .map(|section| section.id)
        .collect();
    assert_eq!(
        ids,
        vec![
            "section_foundations",
            "section_acquisition",
            "section_activation",
            "section_revenue",
            "section_referral",
        ]
    );
}

#[test]
fn store_round_trips_through_sqlite_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("canvas.db");

    let saved_id = {
        let conn = open_db(&path).unwrap();
        let repo = SqliteCanvasRepository::try_new(&conn, "owner-1").unwrap();
        let mut store = DocumentStore::new(StoreConfig::default());
        store.load_from(&repo, &repo).unwrap();

        let table_id = store
            .add_widget("section_acquisition", WidgetKind::Table, None)
            .unwrap();
        store.update_widget(
            "section_acquisition",
            &table_id,
            &WidgetPatch::table(vec![
                vec!["a".to_string(), "b".to_string()],
                vec!["2".to_string(), "=A2*21".to_string()],
            ]),
        );
        store.set_project_title("Persisted");
        store.save_now(&repo).unwrap().unwrap().id
    };

    let conn = open_db(&path).unwrap();
    let repo = SqliteCanvasRepository::try_new(&conn, "owner-1").unwrap();
    let mut store = DocumentStore::new(StoreConfig::default());
    let outcome = store.load_from(&repo, &repo).unwrap();

    assert_eq!(
        outcome,
        LoadOutcome::Loaded {
            document_id: saved_id.clone()
        }
    );
    assert_eq!(store.document().project.title, "Persisted");
    assert_eq!(store.document().meta.db_id.as_deref(), Some(saved_id.as_str()));
    let table = store.document().table_widgets()[0].id.clone();
    assert_eq!(store.computed_value(&table, 1, 1), "42");
}

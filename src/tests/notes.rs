use crate::notes::{BackendJson, NoteStore};
use crate::semantic::{NoteSearchRecord, PendingEmbedding};
use chrono::{DateTime, Utc};

fn notes_path(tmp: &tempfile::TempDir) -> String {
    tmp.path().join("notes.json").to_str().unwrap().to_string()
}

fn ts(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap()
}

fn seed(tmp: &tempfile::TempDir, notes: &[NoteSearchRecord]) -> String {
    let path = notes_path(tmp);
    std::fs::write(&path, serde_json::to_vec(notes).unwrap()).unwrap();
    path
}

fn record(id: &str, folder_id: Option<&str>) -> NoteSearchRecord {
    NoteSearchRecord {
        id: id.to_string(),
        title: format!("note {id}"),
        body: "<p>body</p>".to_string(),
        tags: vec!["tag".to_string()],
        folder_id: folder_id.map(str::to_string),
        content_modified_at: Some(ts(1_700_000_000)),
        ..Default::default()
    }
}

#[test]
fn test_creates_empty_notes_file() {
    let tmp = tempfile::tempdir().unwrap();
    let path = notes_path(&tmp);

    let store = BackendJson::load(&path).unwrap();

    assert!(std::path::Path::new(&path).exists());
    assert!(store.list(None).unwrap().is_empty());
}

#[test]
fn test_list_filters_by_folder() {
    let tmp = tempfile::tempdir().unwrap();
    let path = seed(
        &tmp,
        &[
            record("1", Some("work")),
            record("2", Some("home")),
            record("3", None),
            record("4", Some("work")),
        ],
    );
    let store = BackendJson::load(&path).unwrap();

    assert_eq!(store.list(None).unwrap().len(), 4);

    let work: Vec<_> = store
        .list(Some("work"))
        .unwrap()
        .into_iter()
        .map(|n| n.id)
        .collect();
    assert_eq!(work, vec!["1", "4"]);

    assert!(store.list(Some("missing")).unwrap().is_empty());
}

#[test]
fn test_minimal_records_load() {
    let tmp = tempfile::tempdir().unwrap();
    let path = notes_path(&tmp);
    std::fs::write(&path, r#"[{"id": "1", "title": "bare"}]"#).unwrap();

    let notes = BackendJson::load(&path).unwrap().list(None).unwrap();
    assert_eq!(notes.len(), 1);
    assert!(notes[0].embedding.is_none());
    assert!(notes[0].tags.is_empty());
    assert!(notes[0].content_modified_at.is_none());
}

#[test]
fn test_malformed_file() {
    let tmp = tempfile::tempdir().unwrap();
    let path = notes_path(&tmp);
    std::fs::write(&path, "{not json").unwrap();

    assert!(BackendJson::load(&path).is_err());
}

#[test]
fn test_save_embeddings_upserts_only_embedding_fields() {
    let tmp = tempfile::tempdir().unwrap();
    let path = seed(&tmp, &[record("1", None), record("2", None)]);
    let store = BackendJson::load(&path).unwrap();

    let pending = vec![PendingEmbedding {
        id: "2".to_string(),
        embedding: vec![0.25, 0.5],
        embedding_generated_at: ts(1_700_000_500),
    }];
    assert_eq!(store.save_embeddings(&pending).unwrap(), 1);

    // survives a reload from disk
    let reloaded = BackendJson::load(&path).unwrap().list(None).unwrap();
    assert!(reloaded[0].embedding.is_none());
    assert_eq!(reloaded[1].embedding, Some(vec![0.25, 0.5]));
    assert_eq!(reloaded[1].embedding_generated_at, Some(ts(1_700_000_500)));
    assert_eq!(reloaded[1].title, "note 2");
    assert_eq!(reloaded[1].body, "<p>body</p>");
    assert_eq!(reloaded[1].content_modified_at, Some(ts(1_700_000_000)));
}

#[test]
fn test_save_embeddings_skips_unknown_ids() {
    let tmp = tempfile::tempdir().unwrap();
    let path = seed(&tmp, &[record("1", None)]);
    let store = BackendJson::load(&path).unwrap();

    let pending = vec![
        PendingEmbedding {
            id: "gone".to_string(),
            embedding: vec![1.0],
            embedding_generated_at: ts(1_700_000_500),
        },
        PendingEmbedding {
            id: "1".to_string(),
            embedding: vec![1.0],
            embedding_generated_at: ts(1_700_000_500),
        },
    ];

    assert_eq!(store.save_embeddings(&pending).unwrap(), 1);
    assert_eq!(store.save_embeddings(&[]).unwrap(), 0);
    assert_eq!(store.list(None).unwrap().len(), 1);
}

#[test]
fn test_save_embeddings_keeps_external_edits() {
    let tmp = tempfile::tempdir().unwrap();
    let path = seed(&tmp, &[record("1", None), record("2", None)]);
    let store = BackendJson::load(&path).unwrap();

    // the owning application edits note 1 and adds note 3 meanwhile
    let mut edited = record("1", None);
    edited.body = "<p>rewritten</p>".to_string();
    edited.content_modified_at = Some(ts(1_700_000_900));
    seed(&tmp, &[edited, record("2", None), record("3", Some("new"))]);

    let pending = vec![PendingEmbedding {
        id: "2".to_string(),
        embedding: vec![0.5],
        embedding_generated_at: ts(1_700_000_500),
    }];
    assert_eq!(store.save_embeddings(&pending).unwrap(), 1);

    let on_disk: Vec<NoteSearchRecord> =
        serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(on_disk.len(), 3);
    assert_eq!(on_disk[0].body, "<p>rewritten</p>");
    assert_eq!(on_disk[0].content_modified_at, Some(ts(1_700_000_900)));
    assert_eq!(on_disk[1].embedding, Some(vec![0.5]));
    assert_eq!(on_disk[2].id, "3");

    assert_eq!(store.list(None).unwrap(), on_disk);
}

#[test]
fn test_list_sees_external_changes() {
    let tmp = tempfile::tempdir().unwrap();
    let path = seed(&tmp, &[record("1", None)]);
    let store = BackendJson::load(&path).unwrap();
    assert_eq!(store.list(None).unwrap().len(), 1);

    let mut edited = record("1", None);
    edited.content_modified_at = Some(ts(1_700_000_900));
    seed(&tmp, &[edited, record("2", None)]);

    let notes = store.list(None).unwrap();
    assert_eq!(notes.len(), 2);
    assert_eq!(notes[0].content_modified_at, Some(ts(1_700_000_900)));
}

use serde_json::json;
use hpconfd::db::{DatabaseBackend, SqliteBackend, UpdateOptions, UpdateOutcome};
use uuid::Uuid;

async fn backend() -> SqliteBackend {
  let backend = SqliteBackend::in_memory().await.unwrap();
  backend.init_schema().await.unwrap();
  backend
}

#[tokio::test]
async fn test_sqlite_backend_init_schema() {
  let backend = SqliteBackend::in_memory().await.unwrap();
  backend.init_schema().await.unwrap();
  // Should not panic on re-init
  backend.init_schema().await.unwrap();
  backend.ping().await.unwrap();
  assert_eq!(backend.name(), "sqlite");
}

#[tokio::test]
async fn test_sqlite_backend_insert_and_get() {
  let backend = backend().await;

  let data = json!({"name": "winter", "setpoint": 21});
  let doc = backend.insert("config", data, None).await.unwrap().unwrap();

  assert_eq!(doc.collection, "config");
  assert_eq!(doc.data["name"], "winter");

  let retrieved = backend.get("config", doc.id).await.unwrap().unwrap();
  assert_eq!(retrieved.id, doc.id);
  assert_eq!(retrieved.data["setpoint"], 21);
}

#[tokio::test]
async fn test_sqlite_backend_get_other_collection() {
  let backend = backend().await;
  let doc = backend
    .insert("config", json!({"name": "a"}), None)
    .await
    .unwrap()
    .unwrap();
  assert!(backend.get("other", doc.id).await.unwrap().is_none());
  assert!(backend.get("config", Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_sqlite_backend_unique_insert() {
  let backend = backend().await;

  let first = backend
    .insert("config", json!({"name": "winter"}), Some("name"))
    .await
    .unwrap();
  assert!(first.is_some());

  let second = backend
    .insert("config", json!({"name": "winter", "setpoint": 5}), Some("name"))
    .await
    .unwrap();
  assert!(second.is_none());

  // Same name in another collection is fine
  let other = backend
    .insert("archive", json!({"name": "winter"}), Some("name"))
    .await
    .unwrap();
  assert!(other.is_some());

  assert_eq!(backend.list("config", None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_sqlite_backend_unique_insert_missing_field() {
  let backend = backend().await;
  assert!(backend
    .insert("config", json!({"x": 1}), Some("name"))
    .await
    .unwrap()
    .is_some());
  assert!(backend
    .insert("config", json!({"x": 2}), Some("name"))
    .await
    .unwrap()
    .is_some());
}

#[tokio::test]
async fn test_sqlite_backend_find_by_field() {
  let backend = backend().await;
  backend
    .insert("config", json!({"name": "a", "active": true}), None)
    .await
    .unwrap();
  backend
    .insert("config", json!({"name": "b", "active": false}), None)
    .await
    .unwrap();

  let active = backend
    .find_by_field("config", "active", &json!(true))
    .await
    .unwrap();
  assert_eq!(active.len(), 1);
  assert_eq!(active[0].data["name"], "a");

  let named = backend
    .find_by_field("config", "name", &json!("b"))
    .await
    .unwrap();
  assert_eq!(named.len(), 1);
}

#[tokio::test]
async fn test_sqlite_backend_update() {
  let backend = backend().await;
  let doc = backend
    .insert("config", json!({"name": "a", "setpoint": 1}), None)
    .await
    .unwrap()
    .unwrap();

  let outcome = backend
    .update(
      "config",
      doc.id,
      json!({"name": "a", "setpoint": 2}),
      UpdateOptions::default(),
    )
    .await
    .unwrap();
  match outcome {
    UpdateOutcome::Updated(updated) => assert_eq!(updated.data["setpoint"], 2),
    other => panic!("unexpected outcome: {:?}", other),
  }
}

#[tokio::test]
async fn test_sqlite_backend_update_missing() {
  let backend = backend().await;
  let outcome = backend
    .update("config", Uuid::new_v4(), json!({}), UpdateOptions::default())
    .await
    .unwrap();
  assert!(matches!(outcome, UpdateOutcome::NotFound));
}

#[tokio::test]
async fn test_sqlite_backend_update_unique_conflict() {
  let backend = backend().await;
  backend
    .insert("config", json!({"name": "a"}), None)
    .await
    .unwrap();
  let b = backend
    .insert("config", json!({"name": "b"}), None)
    .await
    .unwrap()
    .unwrap();

  let opts = UpdateOptions {
    unique: Some("name"),
    keep: None,
  };
  let outcome = backend
    .update("config", b.id, json!({"name": "a"}), opts)
    .await
    .unwrap();
  assert!(matches!(outcome, UpdateOutcome::Conflict));

  // Keeping its own name is not a conflict
  let outcome = backend
    .update("config", b.id, json!({"name": "b", "setpoint": 3}), opts)
    .await
    .unwrap();
  assert!(matches!(outcome, UpdateOutcome::Updated(_)));
}

#[tokio::test]
async fn test_sqlite_backend_update_keeps_field() {
  let backend = backend().await;
  let doc = backend
    .insert("config", json!({"name": "a", "active": true}), None)
    .await
    .unwrap()
    .unwrap();

  let opts = UpdateOptions {
    unique: None,
    keep: Some("active"),
  };
  let outcome = backend
    .update("config", doc.id, json!({"name": "a2", "active": false}), opts)
    .await
    .unwrap();
  let UpdateOutcome::Updated(updated) = outcome else {
    panic!("expected update");
  };
  assert_eq!(updated.data["name"], "a2");
  assert_eq!(updated.data["active"], true);
}

#[tokio::test]
async fn test_sqlite_backend_delete() {
  let backend = backend().await;
  let doc = backend
    .insert("config", json!({"name": "a"}), None)
    .await
    .unwrap()
    .unwrap();

  assert_eq!(backend.delete("config", doc.id).await.unwrap(), 1);
  assert_eq!(backend.delete("config", doc.id).await.unwrap(), 0);
  assert!(backend.get("config", doc.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_sqlite_backend_list_projection() {
  let backend = backend().await;
  for name in ["a", "b", "c"] {
    backend
      .insert(
        "config",
        json!({"name": name, "active": false, "setpoint": 20}),
        None,
      )
      .await
      .unwrap();
  }

  let full = backend.list("config", None).await.unwrap();
  assert_eq!(full.len(), 3);
  assert_eq!(full[0].data["setpoint"], 20);

  let projected = backend
    .list("config", Some(&["name", "active"][..]))
    .await
    .unwrap();
  let names: Vec<_> = projected.iter().map(|d| d.data["name"].clone()).collect();
  assert_eq!(names, [json!("a"), json!("b"), json!("c")]);
  for doc in &projected {
    assert!(doc.data.get("setpoint").is_none());
    assert_eq!(doc.data["active"], false);
  }
}

#[tokio::test]
async fn test_sqlite_backend_set_exclusive_flag() {
  let backend = backend().await;
  let a = backend
    .insert("config", json!({"name": "a", "active": true}), None)
    .await
    .unwrap()
    .unwrap();
  let b = backend
    .insert("config", json!({"name": "b", "active": false}), None)
    .await
    .unwrap()
    .unwrap();

  assert!(backend.set_exclusive_flag("config", b.id, "active").await.unwrap());
  let a = backend.get("config", a.id).await.unwrap().unwrap();
  let b = backend.get("config", b.id).await.unwrap().unwrap();
  assert_eq!(a.data["active"], false);
  assert_eq!(b.data["active"], true);

  // Unknown target writes nothing
  assert!(!backend
    .set_exclusive_flag("config", Uuid::new_v4(), "active")
    .await
    .unwrap());
  let b = backend.get("config", b.id).await.unwrap().unwrap();
  assert_eq!(b.data["active"], true);
}

#[tokio::test]
async fn test_sqlite_backend_rejects_bad_names() {
  let backend = backend().await;
  assert!(backend.list("Config; DROP", None).await.is_err());
  assert!(backend
    .find_by_field("config", "name') OR 1=1 --", &json!(1))
    .await
    .is_err());
  assert!(backend
    .set_exclusive_flag("config", Uuid::new_v4(), "a.b")
    .await
    .is_err());
}

#[tokio::test]
async fn test_sqlite_backend_file_persistence() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("configs.db");
  let path = path.to_str().unwrap();

  let id = {
    let backend = SqliteBackend::new(path).await.unwrap();
    backend.init_schema().await.unwrap();
    backend
      .insert("config", json!({"name": "kept"}), None)
      .await
      .unwrap()
      .unwrap()
      .id
  };

  let backend = SqliteBackend::new(path).await.unwrap();
  backend.init_schema().await.unwrap();
  let doc = backend.get("config", id).await.unwrap().unwrap();
  assert_eq!(doc.data["name"], "kept");
}

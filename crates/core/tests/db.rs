use gridkv_core::{Db, KvError, MemoryBackend, TabularBackend};
use std::sync::Arc;

fn new_db() -> (Arc<MemoryBackend>, Db) {
    let backend = Arc::new(MemoryBackend::new());
    let db = Db::new(backend.clone());
    (backend, db)
}

#[test]
fn test_table_lifecycle() {
    let (backend, db) = new_db();
    assert!(!db.has_table("users").unwrap());

    let mut table = db.create_table("users", false).unwrap();
    assert_eq!(table.name(), "users");
    assert!(db.has_table("users").unwrap());
    table.set("alice", "admin").unwrap();

    db.delete_table("users").unwrap();
    assert!(!db.has_table("users").unwrap());
    assert!(backend.sheet_names().is_empty());
}

#[test]
fn test_create_existing_table() {
    let (_backend, db) = new_db();
    db.create_table("users", false)
        .unwrap()
        .set("alice", "admin")
        .unwrap();

    assert!(matches!(
        db.create_table("users", false),
        Err(KvError::AlreadyExists { name }) if name == "users"
    ));

    // exist_ok opens the table without touching its contents
    let mut table = db.create_table("users", true).unwrap();
    assert_eq!(table.get("alice").unwrap(), "admin");
}

#[test]
fn test_get_table_missing() {
    let (_backend, db) = new_db();
    let err = db.get_table("ghost", false).unwrap_err();
    assert!(err.is_not_found());
    assert!(matches!(err, KvError::TableNotFound { name } if name == "ghost"));

    let table = db.get_table("ghost", true).unwrap();
    assert_eq!(table.name(), "ghost");
}

#[test]
fn test_delete_missing_table() {
    let (_backend, db) = new_db();
    assert!(matches!(
        db.delete_table("ghost"),
        Err(KvError::TableNotFound { .. })
    ));
}

#[test]
fn test_recreated_table_starts_empty() {
    let (_backend, db) = new_db();
    let mut table = db.create_table("scratch", false).unwrap();
    table.set("k", "v").unwrap();

    db.delete_table("scratch").unwrap();
    let mut table = db.get_table("scratch", true).unwrap();
    assert!(table.list_keys().unwrap().is_empty());
}

#[test]
fn test_tables_are_isolated() {
    let (_backend, db) = new_db();
    let mut a = db.create_table("a", false).unwrap();
    let mut b = db.create_table("b", false).unwrap();

    a.set("k", "from a").unwrap();
    b.set("k", "from b").unwrap();

    assert_eq!(a.get("k").unwrap(), "from a");
    assert_eq!(b.get("k").unwrap(), "from b");
    assert_eq!(a.list_keys().unwrap(), vec!["k"]);
}

#[test]
fn test_foreign_sheet_rejected() {
    let (backend, db) = new_db();
    backend.create_sheet("report").unwrap();
    backend
        .set_range(
            "report",
            "A1:B1",
            vec![vec!["name".to_string(), "total".to_string()]],
        )
        .unwrap();

    assert!(db.has_table("report").unwrap());
    assert!(matches!(
        db.get_table("report", true),
        Err(KvError::SchemaMismatch { .. })
    ));
}

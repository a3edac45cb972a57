// Symbol database behavior: schema, inserts, deletes, queries, merging.

use crate::database::{SymbolDatabase, SymbolRecord};
use crate::error::Error;
use crate::tests::test_helpers::create_test_project;

fn record(filename: &str, line: u32, usr: &str, is_definition: bool) -> SymbolRecord {
    SymbolRecord {
        filename: filename.to_string(),
        line,
        column: 1,
        usr: usr.to_string(),
        context: format!("context of {}", usr),
        kind: 8,
        is_definition,
    }
}

#[test]
fn schema_creation_is_idempotent_and_writes_version_once() {
    let project = create_test_project().unwrap();
    let db_path = project.path().join("test.db");
    let db = SymbolDatabase::with_file(&db_path).unwrap();
    db.create_data_model().unwrap();
    db.create_data_model().unwrap();
    assert_eq!(db.version().unwrap(), Some((0, 1)));
    assert!(db.version_matches().unwrap());
}

#[test]
fn insert_and_query_by_usr() {
    let project = create_test_project().unwrap();
    let mut db = SymbolDatabase::with_file(&project.path().join("test.db")).unwrap();
    db.create_data_model().unwrap();

    db.insert_single(&record("main.cpp", 3, "c:@F@foobar", true))
        .unwrap();
    db.insert_single(&record("main.cpp", 9, "c:@F@foobar", false))
        .unwrap();
    db.flush().unwrap();

    let rows = db.get_by_usr("c:@F@foobar").unwrap();
    assert_eq!(rows.len(), 2);

    let definitions = db.get_definition("c:@F@foobar").unwrap();
    assert_eq!(definitions.len(), 1);
    assert_eq!(definitions[0].line, 3);
}

#[test]
fn duplicate_insert_is_silently_ignored() {
    let project = create_test_project().unwrap();
    let mut db = SymbolDatabase::with_file(&project.path().join("test.db")).unwrap();
    db.create_data_model().unwrap();

    let row = record("main.cpp", 3, "c:@F@foobar", true);
    db.insert_single(&row).unwrap();
    db.insert_single(&row).unwrap();
    db.flush().unwrap();

    assert_eq!(db.get_all().unwrap().len(), 1);
}

#[test]
fn empty_usr_is_never_stored() {
    let project = create_test_project().unwrap();
    let mut db = SymbolDatabase::with_file(&project.path().join("test.db")).unwrap();
    db.create_data_model().unwrap();

    db.insert_single(&record("main.cpp", 3, "", true)).unwrap();
    db.flush().unwrap();

    assert!(db.get_all().unwrap().is_empty());
}

#[test]
fn delete_removes_only_the_named_file() {
    let project = create_test_project().unwrap();
    let mut db = SymbolDatabase::with_file(&project.path().join("test.db")).unwrap();
    db.create_data_model().unwrap();

    db.insert_single(&record("main.cpp", 3, "c:@F@foobar", true))
        .unwrap();
    db.insert_single(&record("other.cpp", 5, "c:@F@other", true))
        .unwrap();
    db.flush().unwrap();

    db.delete("main.cpp").unwrap();
    db.flush().unwrap();

    let remaining = db.get_all().unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].filename, "other.cpp");
}

#[test]
fn delete_all_keeps_the_file() {
    let project = create_test_project().unwrap();
    let db_path = project.path().join("test.db");
    let mut db = SymbolDatabase::with_file(&db_path).unwrap();
    db.create_data_model().unwrap();

    db.insert_single(&record("main.cpp", 3, "c:@F@foobar", true))
        .unwrap();
    db.flush().unwrap();
    db.delete_all().unwrap();
    db.flush().unwrap();

    assert!(db.get_all().unwrap().is_empty());
    assert!(db_path.exists());
}

#[test]
fn operations_on_a_closed_store_fail() {
    let db = SymbolDatabase::new();
    assert!(!db.is_open());
    assert!(matches!(db.get_all(), Err(Error::StoreClosed)));
    assert!(matches!(db.get_by_usr("x"), Err(Error::StoreClosed)));
    assert!(matches!(db.get_definition("x"), Err(Error::StoreClosed)));
}

#[test]
fn flushed_rows_survive_reopen() {
    let project = create_test_project().unwrap();
    let db_path = project.path().join("test.db");
    {
        let mut db = SymbolDatabase::with_file(&db_path).unwrap();
        db.create_data_model().unwrap();
        db.insert_single(&record("main.cpp", 3, "c:@F@foobar", true))
            .unwrap();
        db.flush().unwrap();
        db.close();
    }
    let db = SymbolDatabase::with_file(&db_path).unwrap();
    assert_eq!(db.get_all().unwrap().len(), 1);
}

#[test]
fn unflushed_rows_are_lost_on_close() {
    let project = create_test_project().unwrap();
    let db_path = project.path().join("test.db");
    {
        let mut db = SymbolDatabase::with_file(&db_path).unwrap();
        db.create_data_model().unwrap();
        db.flush().unwrap();
        db.insert_single(&record("main.cpp", 3, "c:@F@foobar", true))
            .unwrap();
        db.close();
    }
    let db = SymbolDatabase::with_file(&db_path).unwrap();
    assert!(db.get_all().unwrap().is_empty());
}

#[test]
fn insert_from_merges_secondary_stores() {
    let project = create_test_project().unwrap();

    let first_path = project.path().join("first.db");
    let mut first = SymbolDatabase::with_file(&first_path).unwrap();
    first.create_data_model().unwrap();
    first
        .insert_single(&record("a.cpp", 1, "c:@F@alpha", true))
        .unwrap();
    first.flush().unwrap();
    first.close();

    let second_path = project.path().join("second.db");
    let mut second = SymbolDatabase::with_file(&second_path).unwrap();
    second.create_data_model().unwrap();
    second
        .insert_single(&record("b.cpp", 2, "c:@F@beta", true))
        .unwrap();
    second.flush().unwrap();
    second.close();

    let mut target = SymbolDatabase::with_file(&project.path().join("target.db")).unwrap();
    target.create_data_model().unwrap();
    target.insert_from(&[first_path, second_path]).unwrap();

    let rows = target.get_all().unwrap();
    assert_eq!(rows.len(), 2);
}

#[test]
fn insert_from_skips_unreadable_stores() {
    let project = create_test_project().unwrap();

    let good_path = project.path().join("good.db");
    let mut good = SymbolDatabase::with_file(&good_path).unwrap();
    good.create_data_model().unwrap();
    good.insert_single(&record("a.cpp", 1, "c:@F@alpha", true))
        .unwrap();
    good.flush().unwrap();
    good.close();

    // a store that never got a schema yields no rows
    let empty_path = project.path().join("empty.db");
    std::fs::write(&empty_path, b"").unwrap();

    let mut target = SymbolDatabase::with_file(&project.path().join("target.db")).unwrap();
    target.create_data_model().unwrap();
    target.insert_from(&[empty_path, good_path]).unwrap();

    assert_eq!(target.get_all().unwrap().len(), 1);
}

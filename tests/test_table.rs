//! Integration tests for table CRUD against the in-memory driver.
//!
//! Run with: cargo test --test test_table

use odbc_table::constants::*;
use odbc_table::memory::MemoryDriver;
use odbc_table::{
    BufferType, ColumnBuffer, ColumnFlags, ColumnOwnership, Database, Error, OpenParams,
    SqlReturn, Table, TableAccessFlags, Value,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// `t(ID int PK, NAME varchar(20))`, empty.
fn database() -> (MemoryDriver, Database) {
    init_tracing();
    let driver = MemoryDriver::new();
    driver
        .create_table("t")
        .column("ID", SQL_INTEGER, 10, 0, false)
        .column("NAME", SQL_VARCHAR, 20, 0, true)
        .primary_key(["ID"])
        .build();
    let db = Database::open(driver.clone()).unwrap();
    (driver, db)
}

fn insert_rows(table: &mut Table, ids: impl IntoIterator<Item = i32>) {
    for id in ids {
        table.set_column_value(0, Value::Integer(id)).unwrap();
        table
            .set_column_value(1, Value::from(format!("name {}", id)))
            .unwrap();
        table.insert().unwrap();
    }
}

#[test]
fn test_generated_sql_for_discovered_columns() {
    let (_driver, db) = database();
    let mut table = Table::new();
    table
        .init(
            &db,
            TableAccessFlags::SELECT
                | TableAccessFlags::INSERT
                | TableAccessFlags::UPDATE_PK
                | TableAccessFlags::DELETE_PK,
            "t",
        )
        .unwrap();
    table.open(OpenParams::new()).unwrap();

    assert_eq!(table.column_indexes(), vec![0, 1]);
    assert_eq!(table.select_fields(), "ID,NAME");
    assert_eq!(table.insert_sql(), Some("INSERT INTO t (ID,NAME) VALUES(?,?)"));
    assert_eq!(table.update_pk_sql(), Some("UPDATE t SET NAME = ? WHERE ID = ?"));
    assert_eq!(table.delete_pk_sql(), Some("DELETE FROM t WHERE ID = ?"));

    let keys = table.primary_key_column_buffers();
    assert_eq!(keys.len(), 1);
    assert_eq!(keys[0].borrow().query_name(), "ID");
    assert!(!table
        .column_buffer(1)
        .unwrap()
        .borrow()
        .is_primary_key());
}

#[test]
fn test_count() {
    let (_driver, db) = database();
    let mut table = Table::new();
    table.init(&db, TableAccessFlags::ALL, "t").unwrap();
    table.open(OpenParams::new()).unwrap();

    assert_eq!(table.count("").unwrap(), 0);
    insert_rows(&mut table, 1..=10);
    assert_eq!(table.count("").unwrap(), 10);
    assert_eq!(table.count("ID > 5").unwrap(), 5);
}

#[test]
fn test_select_descending() {
    let (_driver, db) = database();
    let mut table = Table::new();
    table.init(&db, TableAccessFlags::ALL, "t").unwrap();
    table.open(OpenParams::new()).unwrap();
    insert_rows(&mut table, 1..=10);

    table.select("", "ID DESC").unwrap();
    let mut ids = Vec::new();
    while table.select_next().unwrap() {
        ids.push(table.column_value(0).unwrap());
    }
    let expected: Vec<Value> = (1..=10).rev().map(Value::Integer).collect();
    assert_eq!(ids, expected);
    assert!(!table.select_next().unwrap());
}

#[test]
fn test_scrolling() {
    let (_driver, db) = database();
    let mut table = Table::new();
    table.init(&db, TableAccessFlags::ALL, "t").unwrap();
    table.open(OpenParams::new()).unwrap();
    insert_rows(&mut table, 1..=5);

    table.select("ID > 1", "ID").unwrap();
    assert!(table.select_last().unwrap());
    assert_eq!(table.column_value(0).unwrap(), Value::Integer(5));
    assert!(table.select_prev().unwrap());
    assert_eq!(table.column_value(0).unwrap(), Value::Integer(4));
    assert!(table.select_first().unwrap());
    assert_eq!(table.column_value(0).unwrap(), Value::Integer(2));
    assert!(table.select_absolute(3).unwrap());
    assert_eq!(table.column_value(0).unwrap(), Value::Integer(4));
    assert!(table.select_relative(-1).unwrap());
    assert_eq!(table.column_value(0).unwrap(), Value::Integer(3));
    assert!(!table.select_absolute(9).unwrap());
    table.select_close().unwrap();
}

#[test]
fn test_update_and_delete_by_key() {
    let (driver, db) = database();
    let mut table = Table::new();
    table.init(&db, TableAccessFlags::ALL, "t").unwrap();
    table.open(OpenParams::new()).unwrap();
    insert_rows(&mut table, 1..=5);

    table.set_column_value(0, Value::Integer(3)).unwrap();
    table.set_column_value(1, Value::from("three")).unwrap();
    assert!(table.update(true).unwrap());

    table.select("ID = 3", "").unwrap();
    assert!(table.select_next().unwrap());
    assert_eq!(table.column_value(1).unwrap(), Value::from("three"));
    assert!(!table.select_next().unwrap());

    table.set_column_value(0, Value::Integer(3)).unwrap();
    assert!(table.delete(true).unwrap());
    assert_eq!(table.count("").unwrap(), 4);
    assert_eq!(driver.row_count("t"), Some(4));

    assert!(!table.delete(false).unwrap());
    let err = table.delete(true).unwrap_err();
    assert_eq!(err.sql_return(), Some(SqlReturn::NoData));

    table.set_column_value(0, Value::Integer(42)).unwrap();
    assert!(!table.update(false).unwrap());
}

#[test]
fn test_update_and_delete_where() {
    let (_driver, db) = database();
    let mut table = Table::new();
    table.init(&db, TableAccessFlags::ALL, "t").unwrap();
    table.open(OpenParams::new()).unwrap();
    insert_rows(&mut table, 1..=10);

    table.set_column_value(1, Value::from("bulk")).unwrap();
    assert!(table.update_where("ID > 8", true).unwrap());
    assert_eq!(table.count("NAME = 'bulk'").unwrap(), 2);

    assert!(table.delete_where("ID <= 2", true).unwrap());
    assert_eq!(table.count("").unwrap(), 8);
    assert!(!table.delete_where("ID <= 2", false).unwrap());

    assert!(matches!(
        table.delete_where("", false),
        Err(Error::IllegalArgument { .. })
    ));
    assert!(matches!(
        table.update_where("", false),
        Err(Error::IllegalArgument { .. })
    ));
}

#[test]
fn test_write_requires_access() {
    let (_driver, db) = database();
    let mut table = Table::new();
    table.init(&db, TableAccessFlags::READ, "t").unwrap();
    table.open(OpenParams::new()).unwrap();

    assert!(table.insert_sql().is_none());
    assert!(matches!(table.insert(), Err(Error::IllegalArgument { .. })));
    assert!(matches!(table.update(true), Err(Error::IllegalArgument { .. })));
    assert!(matches!(
        table.delete_where("ID = 1", false),
        Err(Error::IllegalArgument { .. })
    ));
}

#[test]
fn test_close_open_reproduces_bindings() {
    let (_driver, db) = database();
    let mut table = Table::new();
    table.init(&db, TableAccessFlags::ALL, "t").unwrap();

    table.open(OpenParams::new()).unwrap();
    let indexes = table.column_indexes();
    let sql = (
        table.select_fields().to_string(),
        table.insert_sql().map(str::to_string),
        table.update_pk_sql().map(str::to_string),
        table.delete_pk_sql().map(str::to_string),
    );
    table.close().unwrap();
    assert!(!table.is_open());
    assert_eq!(table.column_count(), 0);

    table.open(OpenParams::new()).unwrap();
    assert_eq!(table.column_indexes(), indexes);
    assert_eq!(
        (
            table.select_fields().to_string(),
            table.insert_sql().map(str::to_string),
            table.update_pk_sql().map(str::to_string),
            table.delete_pk_sql().map(str::to_string),
        ),
        sql
    );
}

#[test]
fn test_manual_columns_share_buffers() {
    let (_driver, db) = database();
    let id = ColumnBuffer::new(
        BufferType::Integer,
        "ID",
        SQL_INTEGER,
        10,
        0,
        ColumnFlags::SELECT | ColumnFlags::INSERT,
    )
    .unwrap()
    .into_ptr();
    let name = ColumnBuffer::new(
        BufferType::WChar,
        "NAME",
        SQL_WVARCHAR,
        20,
        0,
        ColumnFlags::SELECT | ColumnFlags::INSERT | ColumnFlags::NULLABLE,
    )
    .unwrap()
    .into_ptr();

    let mut table = Table::new();
    table
        .init(&db, TableAccessFlags::SELECT | TableAccessFlags::INSERT, "t")
        .unwrap();
    table.set_column(0, id.clone()).unwrap();
    table.set_column(1, name.clone()).unwrap();
    table.open(OpenParams::new()).unwrap();
    assert_eq!(table.column_ownership(1).unwrap(), ColumnOwnership::Borrowed);
    assert!(id.borrow().is_primary_key());

    id.borrow_mut().set_value(Value::Integer(7)).unwrap();
    name.borrow_mut().set_value(Value::from("größe")).unwrap();
    table.insert().unwrap();
    name.borrow_mut().set_null();
    id.borrow_mut().set_value(Value::Integer(8)).unwrap();
    table.insert().unwrap();

    table.select("", "ID").unwrap();
    assert!(table.select_next().unwrap());
    assert_eq!(id.borrow().value(), Value::Integer(7));
    assert_eq!(name.borrow().value(), Value::from("größe"));
    assert!(table.select_next().unwrap());
    assert!(name.borrow().is_null());

    table.close().unwrap();
    assert_eq!(table.column_count(), 2);
    assert!(!id.borrow().is_primary_key());
}

#[test]
fn test_composite_primary_key() {
    init_tracing();
    let driver = MemoryDriver::new();
    driver
        .create_table("LINES")
        .column("ORDER_ID", SQL_INTEGER, 10, 0, false)
        .column("LINE", SQL_SMALLINT, 5, 0, false)
        .column("QTY", SQL_DOUBLE, 15, 0, true)
        .primary_key(["ORDER_ID", "LINE"])
        .build();
    let db = Database::open(driver).unwrap();

    let mut table = Table::new();
    table.init(&db, TableAccessFlags::ALL, "LINES").unwrap();
    table.open(OpenParams::new()).unwrap();
    assert_eq!(
        table.update_pk_sql(),
        Some("UPDATE LINES SET QTY = ? WHERE ORDER_ID = ? AND LINE = ?")
    );
    assert_eq!(
        table.delete_pk_sql(),
        Some("DELETE FROM LINES WHERE ORDER_ID = ? AND LINE = ?")
    );

    for line in 1..=2 {
        table.set_column_value(0, Value::Integer(100)).unwrap();
        table.set_column_value(1, Value::SmallInt(line)).unwrap();
        table.set_column_value(2, Value::Double(1.5)).unwrap();
        table.insert().unwrap();
    }
    table.set_column_value(1, Value::SmallInt(2)).unwrap();
    table.set_column_value(2, Value::Double(4.0)).unwrap();
    assert!(table.update(true).unwrap());
    assert_eq!(table.count("QTY > 2").unwrap(), 1);
    assert_eq!(table.count("ORDER_ID = 100 AND LINE = 1 AND QTY = 1.5").unwrap(), 1);
}

#[test]
fn test_select_by_sql_stmt() {
    let (_driver, db) = database();
    let mut table = Table::new();
    table.init(&db, TableAccessFlags::ALL, "t").unwrap();
    table.open(OpenParams::new()).unwrap();
    insert_rows(&mut table, 1..=3);

    table
        .select_by_sql_stmt("SELECT ID, NAME FROM t WHERE NAME = 'name 2'")
        .unwrap();
    assert!(table.select_next().unwrap());
    assert_eq!(table.column_value(0).unwrap(), Value::Integer(2));
    assert!(!table.select_next().unwrap());
}

#[test]
fn test_rollback() {
    let (_driver, db) = database();
    let mut table = Table::new();
    table.init(&db, TableAccessFlags::ALL, "t").unwrap();
    table.open(OpenParams::new()).unwrap();

    db.set_autocommit(false).unwrap();
    insert_rows(&mut table, 1..=3);
    db.rollback().unwrap();
    assert_eq!(table.count("").unwrap(), 0);

    insert_rows(&mut table, 1..=2);
    db.commit().unwrap();
    db.rollback().unwrap();
    assert_eq!(table.count("").unwrap(), 2);
}

#[test]
fn test_duplicate_key_insert_reports_state() {
    let (_driver, db) = database();
    let mut table = Table::new();
    table.init(&db, TableAccessFlags::ALL, "t").unwrap();
    table.open(OpenParams::new()).unwrap();
    insert_rows(&mut table, [1]);

    let err = table.insert().unwrap_err();
    assert_eq!(err.sql_states(), vec!["23000"]);
    assert!(err.to_string().contains("SQLExecute"));
}

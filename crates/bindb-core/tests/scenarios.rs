//! End-to-end scenarios against the public `Database`/`Table` API (§8 seed
//! scenarios 1-6).

use bindb_core::buffer::WriteBufferConfig;
use bindb_core::column::{ColumnDef, ColumnType};
use bindb_core::value::{Row, Value};
use bindb_core::{Database, Schema};
use tempfile::TempDir;

fn text_row(name: &str) -> Row {
    let mut row = Row::new();
    row.insert("name".into(), Value::Text(name.into()));
    row
}

#[test]
fn scenario_1_insert_then_get() {
    let base = TempDir::with_prefix("bindb-scenario-").unwrap();
    let db = Database::open(base.path(), "app").unwrap();
    let schema = Schema::new(
        "app",
        "users",
        vec![ColumnDef::new("name", ColumnType::Text).with_length(16)],
    );
    let table = db.create_table("users", schema).unwrap();

    let inserted = table.insert(text_row("alice")).unwrap();
    let id = inserted.get("id").unwrap().as_text().unwrap().to_owned();
    assert_eq!(id.len(), 24);
    assert!(id.chars().all(|c| c.is_ascii_hexdigit()));

    table.flush().unwrap();
    let fetched = table.get(&id).unwrap().unwrap();
    assert_eq!(fetched.get("name"), Some(&Value::Text("alice".into())));
    assert_eq!(fetched.get("id"), Some(&Value::Id(id)));

    assert_eq!(table.stats().unwrap().file_size, table.layout().record_size as u64);
}

#[test]
fn scenario_2_delete_and_reinsert_reuses_slot() {
    let base = TempDir::with_prefix("bindb-scenario-").unwrap();
    let db = Database::open(base.path(), "app").unwrap();
    let schema = Schema::new(
        "app",
        "items",
        vec![ColumnDef::new("name", ColumnType::Text).with_length(8)],
    );
    let table = db.create_table("items", schema).unwrap();

    let a = table.insert(text_row("a")).unwrap();
    let b = table.insert(text_row("b")).unwrap();
    let c = table.insert(text_row("c")).unwrap();
    table.flush().unwrap();
    let file_size_before = table.stats().unwrap().file_size;

    let b_id = b.get("id").unwrap().as_text().unwrap().to_owned();
    assert!(table.delete(&b_id).unwrap());

    let d = table.insert(text_row("d")).unwrap();
    table.flush().unwrap();

    assert_eq!(table.stats().unwrap().file_size, file_size_before);
    assert!(table.get(&b_id).unwrap().is_none());

    for row in [&a, &c, &d] {
        let id = row.get("id").unwrap().as_text().unwrap();
        assert!(table.get(id).unwrap().is_some());
    }
}

#[test]
fn scenario_3_bulk_insert_auto_flushes_before_returning() {
    let base = TempDir::with_prefix("bindb-scenario-").unwrap();
    let db = Database::open_with_config(base.path(), "app", WriteBufferConfig::default(), 50_000).unwrap();
    let schema = Schema::new(
        "app",
        "bulk",
        vec![ColumnDef::new("name", ColumnType::Text).with_length(8)],
    );
    let table = db.create_table("bulk", schema).unwrap();

    let rows: Vec<Row> = (0..15_000).map(|i| text_row(&format!("u{i}"))).collect();
    let inserted = table.bulk_insert(rows).unwrap();
    assert_eq!(inserted.len(), 15_000);

    // Default thresholds (10,000 records) must have auto-flushed at least
    // once before bulk_insert returned.
    assert!(table.stats().unwrap().pending_writes < 15_000);

    for row in inserted.iter().take(50) {
        let id = row.get("id").unwrap().as_text().unwrap();
        assert!(table.get(id).unwrap().is_some());
    }
}

#[test]
fn scenario_4_update_is_visible_immediately() {
    let base = TempDir::with_prefix("bindb-scenario-").unwrap();
    let db = Database::open(base.path(), "app").unwrap();
    let schema = Schema::new(
        "app",
        "users",
        vec![ColumnDef::new("name", ColumnType::Text).with_length(16)],
    );
    let table = db.create_table("users", schema).unwrap();

    let inserted = table.insert(text_row("alice")).unwrap();
    let id = inserted.get("id").unwrap().as_text().unwrap().to_owned();

    let mut patch = Row::new();
    patch.insert("name".into(), Value::Text("bob".into()));
    table.update(&id, patch).unwrap();

    let fetched = table.get(&id).unwrap().unwrap();
    assert_eq!(fetched.get("name"), Some(&Value::Text("bob".into())));
}

#[test]
fn scenario_5_text_truncation_on_char_boundaries() {
    let base = TempDir::with_prefix("bindb-scenario-").unwrap();
    let db = Database::open(base.path(), "app").unwrap();
    let schema = Schema::new(
        "app",
        "texts",
        vec![ColumnDef::new("name", ColumnType::Text).with_length(4)],
    );
    let table = db.create_table("texts", schema).unwrap();

    let a = table.insert(text_row("héllo")).unwrap();
    let a_id = a.get("id").unwrap().as_text().unwrap().to_owned();
    let fetched_a = table.get(&a_id).unwrap().unwrap();
    assert_eq!(fetched_a.get("name"), Some(&Value::Text("héllo".into())));

    let b = table.insert(text_row("héééé")).unwrap();
    let b_id = b.get("id").unwrap().as_text().unwrap().to_owned();
    let fetched_b = table.get(&b_id).unwrap().unwrap();
    assert_eq!(fetched_b.get("name"), Some(&Value::Text("héééé".into())));
}

#[test]
fn scenario_6_close_then_reopen_preserves_live_rows_only() {
    let base = TempDir::with_prefix("bindb-scenario-").unwrap();
    let schema = Schema::new(
        "app",
        "users",
        vec![ColumnDef::new("name", ColumnType::Text).with_length(8)],
    );

    let mut ids = Vec::new();
    {
        let db = Database::open(base.path(), "app").unwrap();
        let table = db.create_table("users", schema.clone()).unwrap();
        for i in 0..1000 {
            let row = table.insert(text_row(&format!("u{i}"))).unwrap();
            ids.push(row.get("id").unwrap().as_text().unwrap().to_owned());
        }
        for (i, id) in ids.iter().enumerate() {
            if i % 2 == 0 {
                table.delete(id).unwrap();
            }
        }
        table.close().unwrap();
    }

    let db = Database::open(base.path(), "app").unwrap();
    let table = db.get_table("users").unwrap();
    let all = table.get_all().unwrap();
    assert_eq!(all.len(), 500);
    assert_eq!(table.stats().unwrap().row_count, 500);
}

mod common;

use common::{EVENT, ITEM, ids, save, seed_items};
use linkmodel::prelude::*;
use linkmodel::BatchMode;
use linkmodel_memory::MemoryConnection;

fn seed_events(conn: &MemoryConnection, n: i64) {
    for seq in 1..=n {
        save(
            conn,
            &EVENT,
            &[
                ("stream", Value::from("orders")),
                ("seq", Value::BigInt(seq)),
                ("payload", Value::from(format!("e{seq}"))),
            ],
        );
    }
}

#[test]
fn keyset_pages_250_rows_in_three_batches() {
    let conn = MemoryConnection::new();
    seed_items(&conn, &(1..=250).collect::<Vec<i64>>());
    conn.reset_stats();

    let cursor = BatchCursor::new(select!(&ITEM)).batch_size(100);
    assert!(matches!(cursor.mode(), BatchMode::Keyset { key: "id" }));
    let mut iter = cursor.iterate(&conn).unwrap();
    assert_eq!(iter.total_batches(), 3);

    let rows: Vec<Record> = iter.by_ref().collect::<Result<_>>().unwrap();
    assert_eq!(rows.len(), 250);
    assert_eq!(ids(&rows, "id"), (1..=250).collect::<Vec<i64>>());
    assert_eq!(iter.batches_fetched(), 3);
    assert!(!iter.is_open());
    drop(iter);

    let stats = conn.stats();
    // One count plus one query per batch.
    assert_eq!(stats.queries, 4);
    assert_eq!((stats.begins, stats.commits, stats.rollbacks), (1, 0, 1));
}

#[test]
fn composite_key_falls_back_to_offsets() {
    let conn = MemoryConnection::new();
    seed_events(&conn, 250);

    let cursor = BatchCursor::new(select!(&EVENT)).batch_size(100);
    assert_eq!(cursor.mode(), BatchMode::Offset);
    let mut iter = cursor.iterate(&conn).unwrap();
    assert_eq!(iter.total_batches(), 3);

    let rows: Vec<Record> = iter.by_ref().collect::<Result<_>>().unwrap();
    assert_eq!(ids(&rows, "seq"), (1..=250).collect::<Vec<i64>>());
    assert_eq!(iter.batches_fetched(), 3);
}

#[test]
fn explicit_ordering_uses_offsets() {
    let conn = MemoryConnection::new();
    seed_items(&conn, &(1..=250).collect::<Vec<i64>>());

    let query = select!(&ITEM).order_by(OrderBy::desc("id"));
    let cursor = BatchCursor::new(query).batch_size(100);
    assert_eq!(cursor.mode(), BatchMode::Offset);

    let rows: Vec<Record> = cursor
        .iterate(&conn)
        .unwrap()
        .collect::<Result<_>>()
        .unwrap();
    assert_eq!(ids(&rows, "id"), (1..=250).rev().collect::<Vec<i64>>());
}

#[test]
fn keyset_handles_key_gaps() {
    let conn = MemoryConnection::new();
    seed_items(&conn, &[20, 1, 10, 5, 9]);

    let mut iter = BatchCursor::new(select!(&ITEM))
        .batch_size(2)
        .iterate(&conn)
        .unwrap();
    let rows: Vec<Record> = iter.by_ref().collect::<Result<_>>().unwrap();
    assert_eq!(ids(&rows, "id"), vec![1, 5, 9, 10, 20]);
    assert_eq!(iter.batches_fetched(), 3);
}

#[test]
fn abandoned_iteration_rolls_back_without_changes() {
    let conn = MemoryConnection::new();
    seed_items(&conn, &(1..=10).collect::<Vec<i64>>());
    let before = conn.rows(&ITEM);
    conn.reset_stats();

    {
        let mut iter = BatchCursor::new(select!(&ITEM))
            .batch_size(3)
            .iterate(&conn)
            .unwrap();
        assert!(iter.next().unwrap().is_ok());
        assert!(conn.in_transaction());
    }

    assert!(!conn.in_transaction());
    assert_eq!(conn.rows(&ITEM), before);
    let stats = conn.stats();
    assert_eq!((stats.commits, stats.rollbacks), (0, 1));
    assert_eq!((stats.inserts, stats.updates, stats.deletes), (0, 0, 0));
}

#[test]
fn failed_batch_ends_iteration_and_rolls_back() {
    let conn = MemoryConnection::new();
    seed_items(&conn, &(1..=10).collect::<Vec<i64>>());
    conn.reset_stats();
    // Count and first batch succeed.
    conn.fail_queries_after(2);

    let mut iter = BatchCursor::new(select!(&ITEM))
        .batch_size(4)
        .iterate(&conn)
        .unwrap();
    let mut ok = 0;
    let mut errors = 0;
    for row in iter.by_ref() {
        match row {
            Ok(_) => ok += 1,
            Err(_) => errors += 1,
        }
    }
    assert_eq!((ok, errors), (4, 1));
    assert!(iter.next().is_none());
    assert!(!conn.in_transaction());
    assert_eq!(conn.stats().rollbacks, 1);
}

#[test]
fn settings_supply_the_batch_size() {
    let settings = Settings::from_json_str(r#"{ "batch": { "batch_size": 4 } }"#).unwrap();
    let conn = MemoryConnection::new();
    seed_items(&conn, &(1..=10).collect::<Vec<i64>>());

    let iter = settings.cursor(select!(&ITEM)).iterate(&conn).unwrap();
    assert_eq!(iter.total_batches(), 3);
}

use std::sync::Arc;

use chrono::Utc;

use daywheel::{
    window_for_day, CatalogItem, InMemoryCatalogSource, MemoryStateStore, RotationConfig,
    SqliteStateStore, StateDocument, StateStore, WindowCoordinator,
};

fn build_items(n: usize) -> Vec<CatalogItem> {
    (0..n)
        .map(|i| CatalogItem {
            id: format!("{i:02}"),
            text: format!("tip number {i}"),
            image_ref: format!("images/{i:02}.png"),
            source_ref: "catalog".to_string(),
        })
        .collect()
}

fn fixed_batch(batch: u64) -> RotationConfig {
    // Degenerate draw bounds force a known batch size.
    RotationConfig {
        min_batch: batch,
        max_batch: batch,
        seed: Some(1),
    }
}

fn prior_document(day: &str, next_start_index: u64) -> StateDocument {
    StateDocument {
        day: Some(day.to_string()),
        start_index: Some(4),
        batch_size: Some(5),
        next_start_index: Some(next_start_index),
        updated_at: Some(Utc::now()),
        ..StateDocument::default()
    }
}

#[test]
fn documented_scenario_rolls_over_as_specified() {
    // Catalog of 12 items "00".."11", prior day ended with cursor 9,
    // batch draw of 5 on the next day.
    let source = InMemoryCatalogSource::new("tips", build_items(12));
    let store = Arc::new(MemoryStateStore::with_document(prior_document(
        "20240101", 9,
    )));

    let window = window_for_day(&source, store.clone(), fixed_batch(5), "20240102").unwrap();

    let ids: Vec<&str> = window.items.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec!["09", "10", "11", "00", "01"]);
    assert_eq!(window.day, "20240102");
    assert_eq!(window.start_index, 9);

    let doc = store.read().unwrap().unwrap();
    assert_eq!(doc.day.as_deref(), Some("20240102"));
    assert_eq!(doc.start_index, Some(9));
    assert_eq!(doc.batch_size, Some(5));
    assert_eq!(doc.next_start_index, Some(2));
}

#[test]
fn repeated_calls_on_the_same_day_return_the_same_window() {
    let source = InMemoryCatalogSource::new("tips", build_items(30));
    let store = Arc::new(MemoryStateStore::new());
    let config = RotationConfig {
        min_batch: 10,
        max_batch: 15,
        seed: Some(9),
    };

    let first = window_for_day(&source, store.clone(), config.clone(), "20240110").unwrap();
    let second = window_for_day(&source, store.clone(), config, "20240110").unwrap();

    assert_eq!(first, second);
    let doc = store.read().unwrap().unwrap();
    assert_eq!(doc.batch_size, Some(first.items.len() as u64));
}

#[test]
fn consecutive_days_chain_through_the_cursor() {
    let total = 12u64;
    let source = InMemoryCatalogSource::new("tips", build_items(total as usize));
    let store = Arc::new(MemoryStateStore::new());

    let days = ["20240101", "20240102", "20240103", "20240104"];
    let mut expected_start = 0u64;
    for (i, day) in days.iter().enumerate() {
        let window = window_for_day(&source, store.clone(), fixed_batch(5), day).unwrap();
        assert_eq!(window.start_index, expected_start, "day {i} start");
        expected_start = (expected_start + 5) % total;
    }
}

#[test]
fn small_catalog_clamps_the_window_to_every_item() {
    let source = InMemoryCatalogSource::new("tips", build_items(3));
    let store = Arc::new(MemoryStateStore::new());

    let window =
        window_for_day(&source, store, RotationConfig::default(), "20240101").unwrap();
    let ids: Vec<&str> = window.items.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec!["00", "01", "02"]);
}

#[test]
fn legacy_record_seeds_the_cursor_from_start_index() {
    let legacy = StateDocument {
        day: Some("20231231".to_string()),
        start_index: Some(6),
        ..StateDocument::default()
    };
    let source = InMemoryCatalogSource::new("tips", build_items(12));
    let store = Arc::new(MemoryStateStore::with_document(legacy));

    let window = window_for_day(&source, store, fixed_batch(4), "20240101").unwrap();
    assert_eq!(window.start_index, 6);
    let ids: Vec<&str> = window.items.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec!["06", "07", "08", "09"]);
}

#[test]
fn sqlite_store_carries_the_window_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rotation.db");
    let source = InMemoryCatalogSource::new("tips", build_items(12));

    let first = {
        let store = Arc::new(SqliteStateStore::open(&path).unwrap());
        window_for_day(&source, store, fixed_batch(5), "20240102").unwrap()
    };

    // A fresh process observing the same day must see the identical window.
    let store = Arc::new(SqliteStateStore::open(&path).unwrap());
    let second = window_for_day(&source, store.clone(), fixed_batch(5), "20240102").unwrap();
    assert_eq!(first, second);

    // And the next day chains from the persisted cursor.
    let coordinator = WindowCoordinator::new(store, fixed_batch(5)).unwrap();
    let state = coordinator.ensure_window("20240103", 12).unwrap();
    assert_eq!(state.start_index, (first.start_index + 5) % 12);
}

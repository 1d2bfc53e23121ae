use std::sync::{Arc, Barrier};
use std::thread;

use chrono::Utc;

use daywheel::{
    MemoryStateStore, RotationConfig, RotationState, StateDocument, StateStore, WindowCoordinator,
};

const TOTAL: u64 = 12;
const RACERS: usize = 8;

/// Race `RACERS` independently configured coordinators on the same rollover
/// and return every state they observed.
fn race_rollover(store: Arc<MemoryStateStore>, day: &'static str) -> Vec<RotationState> {
    let barrier = Arc::new(Barrier::new(RACERS));
    let mut handles = Vec::with_capacity(RACERS);
    for racer in 0..RACERS {
        let store = store.clone();
        let barrier = barrier.clone();
        handles.push(thread::spawn(move || {
            // Distinct seeds: if coordination broke, racers would disagree
            // on the drawn batch size.
            let coordinator = WindowCoordinator::new(
                store,
                RotationConfig {
                    min_batch: 3,
                    max_batch: 9,
                    seed: Some(1000 + racer as u64),
                },
            )
            .unwrap();
            barrier.wait();
            coordinator.ensure_window(day, TOTAL).unwrap()
        }));
    }
    handles
        .into_iter()
        .map(|handle| handle.join().expect("racer panicked"))
        .collect()
}

fn assert_consistent(state: &RotationState) {
    assert!(state.start_index < TOTAL);
    assert!(state.batch_size >= 1 && state.batch_size <= TOTAL);
    assert_eq!(
        state.next_start_index,
        (state.start_index + state.batch_size) % TOTAL
    );
}

#[test]
fn racing_first_runs_converge_on_one_state() {
    let store = Arc::new(MemoryStateStore::new());
    let states = race_rollover(store.clone(), "20240101");

    let reference = &states[0];
    assert_consistent(reference);
    for state in &states {
        assert_eq!(state, reference, "every racer must observe the same state");
    }

    // Exactly one rollover committed, no matter how many racers attempted it.
    let (doc, revision) = store.snapshot().unwrap();
    assert_eq!(revision, 1);
    assert_eq!(doc.unwrap().day.as_deref(), Some("20240101"));
}

#[test]
fn racing_day_boundary_rollovers_converge() {
    let prior = StateDocument {
        day: Some("20240101".to_string()),
        start_index: Some(2),
        batch_size: Some(7),
        next_start_index: Some(9),
        updated_at: Some(Utc::now()),
        ..StateDocument::default()
    };
    let store = Arc::new(MemoryStateStore::with_document(prior));
    let states = race_rollover(store.clone(), "20240102");

    let reference = &states[0];
    assert_consistent(reference);
    assert_eq!(reference.day, "20240102");
    assert_eq!(
        reference.start_index, 9,
        "winner must seed from the previous day's cursor"
    );
    for state in &states {
        assert_eq!(state, reference);
    }

    let (_, revision) = store.snapshot().unwrap();
    assert_eq!(revision, 2, "exactly one rollover write on top of the prior");
}

#[test]
fn sequential_callers_after_the_race_see_the_committed_state() {
    let store = Arc::new(MemoryStateStore::new());
    let states = race_rollover(store.clone(), "20240103");

    let late = WindowCoordinator::new(
        store,
        RotationConfig {
            min_batch: 3,
            max_batch: 9,
            seed: Some(424242),
        },
    )
    .unwrap();
    let observed = late.ensure_window("20240103", TOTAL).unwrap();
    assert_eq!(&observed, &states[0]);
}

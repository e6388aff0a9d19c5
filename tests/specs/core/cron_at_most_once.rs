// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cron firing is at-most-once: two scheduler instances over one store
//! produce exactly one task per firing boundary.

use chrono::TimeZone as _;
use std::sync::Arc;
use sui_core::{test_support, Clock, FakeClock, ScheduleId};
use sui_engine::{Dispatcher, EngineConfig, Scheduler};
use sui_storage::Store;

fn tokyo_ms(h: u32, m: u32, s: u32) -> u64 {
    chrono_tz::Asia::Tokyo
        .with_ymd_and_hms(2024, 6, 1, h, m, s)
        .single()
        .unwrap()
        .timestamp_millis() as u64
}

struct Pair {
    store: Store,
    clock: FakeClock,
    a: Scheduler<FakeClock>,
    b: Scheduler<FakeClock>,
    _dir: tempfile::TempDir,
}

/// Two schedulers sharing one store, dispatchers left unstarted so
/// accepted requests just persist Pending rows.
fn pair() -> Pair {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(&dir.path().join("specs.db")).unwrap();
    store
        .insert_project(&test_support::project("p-1", "p1"))
        .unwrap();
    store
        .insert_spider(&test_support::spider("s-1", "p-1", "s1"))
        .unwrap();

    let clock = FakeClock::new();
    clock.set_epoch_ms(tokyo_ms(12, 0, 30));
    let config = Arc::new(EngineConfig {
        projects_root: dir.path().to_path_buf(),
        ..EngineConfig::default()
    });
    let (notice_tx, mut notice_rx) = tokio::sync::mpsc::channel(256);
    tokio::spawn(async move { while notice_rx.recv().await.is_some() {} });

    let mut make = || {
        let dispatcher = Arc::new(Dispatcher::new(
            store.clone(),
            clock.clone(),
            Arc::clone(&config),
            notice_tx.clone(),
        ));
        Scheduler::new(
            store.clone(),
            clock.clone(),
            Arc::clone(&config),
            dispatcher,
            notice_tx.clone(),
        )
    };
    let a = make();
    let b = make();
    Pair {
        store,
        clock,
        a,
        b,
        _dir: dir,
    }
}

#[tokio::test]
async fn one_firing_boundary_one_task() {
    let mut pair = pair();
    pair.store
        .insert_schedule(&test_support::schedule("sch-1", "p-1", "s-1", "*/5 * * * *"))
        .unwrap();

    pair.a.refresh().unwrap();
    pair.b.refresh().unwrap();

    // Cross the 12:05 boundary; both instances tick.
    pair.clock.set_epoch_ms(tokyo_ms(12, 5, 1));
    pair.a.tick();
    pair.b.tick();

    let tasks = pair
        .store
        .tasks_for_schedule(&ScheduleId::new("sch-1"))
        .unwrap();
    assert_eq!(tasks.len(), 1, "exactly one task per firing");
    assert_eq!(
        tasks[0].schedule_id.as_ref().unwrap(),
        &ScheduleId::new("sch-1")
    );
}

#[tokio::test]
async fn consecutive_boundaries_fire_consecutively() {
    let mut pair = pair();
    pair.store
        .insert_schedule(&test_support::schedule("sch-1", "p-1", "s-1", "*/5 * * * *"))
        .unwrap();
    pair.a.refresh().unwrap();
    pair.b.refresh().unwrap();

    for (boundary, expected_total) in [(5u32, 1usize), (10, 2), (15, 3)] {
        pair.clock.set_epoch_ms(tokyo_ms(12, boundary, 1));
        pair.a.tick();
        pair.b.tick();
        // Refresh both so the loser re-observes the new last_run.
        pair.a.refresh().unwrap();
        pair.b.refresh().unwrap();

        let tasks = pair
            .store
            .tasks_for_schedule(&ScheduleId::new("sch-1"))
            .unwrap();
        assert_eq!(tasks.len(), expected_total);

        // Complete the new run so it stops gating the next boundary.
        for task in &tasks {
            if task.status == sui_core::TaskStatus::Pending {
                let now = pair.clock.epoch_ms();
                pair.store.mark_task_running(&task.id, now).unwrap();
                pair.store
                    .finish_task(&task.id, sui_core::TaskStatus::Finished, now + 1, None)
                    .unwrap();
            }
        }
    }
}

#[tokio::test]
async fn restart_resumes_from_persisted_next_run() {
    // A scheduler that crashes mid-tick resumes from current next_run; a
    // missed boundary is silently skipped.
    let mut pair = pair();
    pair.store
        .insert_schedule(&test_support::schedule("sch-1", "p-1", "s-1", "*/5 * * * *"))
        .unwrap();
    pair.a.refresh().unwrap();

    // Two boundaries pass while "down"; a fresh instance ticks once.
    pair.clock.set_epoch_ms(tokyo_ms(12, 10, 2));
    let dir = tempfile::tempdir().unwrap();
    let config = Arc::new(EngineConfig {
        projects_root: dir.path().to_path_buf(),
        ..EngineConfig::default()
    });
    let (notice_tx, mut notice_rx) = tokio::sync::mpsc::channel(256);
    tokio::spawn(async move { while notice_rx.recv().await.is_some() {} });
    let dispatcher = Arc::new(Dispatcher::new(
        pair.store.clone(),
        pair.clock.clone(),
        Arc::clone(&config),
        notice_tx.clone(),
    ));
    let mut fresh = Scheduler::new(
        pair.store.clone(),
        pair.clock.clone(),
        config,
        dispatcher,
        notice_tx,
    );
    fresh.refresh().unwrap();
    fresh.tick();

    let tasks = pair
        .store
        .tasks_for_schedule(&ScheduleId::new("sch-1"))
        .unwrap();
    assert_eq!(tasks.len(), 1, "missed firings are not replayed");

    let schedule = pair.store.schedule(&ScheduleId::new("sch-1")).unwrap();
    assert_eq!(schedule.next_run_ms, Some(tokyo_ms(12, 15, 0)));
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_helpers::{drain_notices, notice_channel, seeded_store, test_config};
use chrono::TimeZone as _;
use sui_core::test_support;
use sui_core::{FakeClock, Notice};
use tokio::sync::mpsc;

/// Epoch ms for a Tokyo wall-clock time on 2024-06-01.
fn tokyo_ms(h: u32, m: u32, s: u32) -> u64 {
    chrono_tz::Asia::Tokyo
        .with_ymd_and_hms(2024, 6, 1, h, m, s)
        .single()
        .unwrap()
        .timestamp_millis() as u64
}

struct Fixture {
    scheduler: Scheduler<FakeClock>,
    store: Store,
    clock: FakeClock,
    notice_rx: mpsc::Receiver<Notice>,
}

/// Scheduler over an idle dispatcher (workers not started, so accepted
/// requests simply persist Pending task rows).
fn fixture(queue_capacity: usize) -> Fixture {
    let store = seeded_store();
    let clock = FakeClock::new();
    clock.set_epoch_ms(tokyo_ms(12, 0, 30));
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.queue_capacity = queue_capacity;
    let config = Arc::new(config);
    let (notice_tx, notice_rx) = notice_channel();
    let dispatcher = Arc::new(Dispatcher::new(
        store.clone(),
        clock.clone(),
        Arc::clone(&config),
        notice_tx.clone(),
    ));
    let scheduler = Scheduler::new(
        store.clone(),
        clock.clone(),
        config,
        dispatcher,
        notice_tx,
    );
    Fixture {
        scheduler,
        store,
        clock,
        notice_rx,
    }
}

#[test]
fn refresh_initialises_next_run() {
    let mut fx = fixture(8);
    fx.store
        .insert_schedule(&test_support::schedule("sch-1", "p-1", "s-1", "*/10 * * * *"))
        .unwrap();

    fx.scheduler.refresh().unwrap();

    let schedule = fx.store.schedule(&ScheduleId::new("sch-1")).unwrap();
    // Clock sits at 12:00:30 Tokyo; the next */10 boundary is 12:10:00.
    assert_eq!(schedule.next_run_ms, Some(tokyo_ms(12, 10, 0)));
}

#[test]
fn tick_before_next_run_does_nothing() {
    let mut fx = fixture(8);
    fx.store
        .insert_schedule(&test_support::schedule("sch-1", "p-1", "s-1", "*/10 * * * *"))
        .unwrap();
    fx.scheduler.refresh().unwrap();

    fx.scheduler.tick();
    assert!(fx
        .store
        .tasks_for_schedule(&ScheduleId::new("sch-1"))
        .unwrap()
        .is_empty());
}

#[test]
fn due_schedule_fires_once_and_advances() {
    let mut fx = fixture(8);
    fx.store
        .insert_schedule(&test_support::schedule("sch-1", "p-1", "s-1", "*/10 * * * *"))
        .unwrap();
    fx.scheduler.refresh().unwrap();

    // Cross the 12:10 boundary.
    fx.clock.set_epoch_ms(tokyo_ms(12, 10, 1));
    fx.scheduler.tick();

    let tasks = fx
        .store
        .tasks_for_schedule(&ScheduleId::new("sch-1"))
        .unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].schedule_id.as_ref().unwrap(), &ScheduleId::new("sch-1"));

    let schedule = fx.store.schedule(&ScheduleId::new("sch-1")).unwrap();
    assert_eq!(schedule.last_run_ms, Some(tokyo_ms(12, 10, 1)));
    assert_eq!(schedule.next_run_ms, Some(tokyo_ms(12, 20, 0)));

    // Same tick again: not due any more.
    fx.scheduler.tick();
    assert_eq!(
        fx.store
            .tasks_for_schedule(&ScheduleId::new("sch-1"))
            .unwrap()
            .len(),
        1
    );
}

#[test]
fn schedule_fired_notice_is_emitted() {
    let mut fx = fixture(8);
    fx.store
        .insert_schedule(&test_support::schedule("sch-1", "p-1", "s-1", "*/10 * * * *"))
        .unwrap();
    fx.scheduler.refresh().unwrap();
    fx.clock.set_epoch_ms(tokyo_ms(12, 10, 1));
    fx.scheduler.tick();

    let notices = drain_notices(&mut fx.notice_rx);
    let fired: Vec<&Notice> = notices
        .iter()
        .filter(|n| n.kind == EventKind::ScheduleFired)
        .collect();
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].attrs["schedule_id"], "sch-1");
    assert_eq!(fired[0].attrs["submitted"], true);
}

#[test]
fn two_instances_fire_at_most_once() {
    // Two schedulers over one store, both seeing the same due schedule:
    // the last_run CAS lets exactly one submit.
    let store = seeded_store();
    let clock = FakeClock::new();
    clock.set_epoch_ms(tokyo_ms(12, 0, 30));
    let dir = tempfile::tempdir().unwrap();
    let config = Arc::new(test_config(dir.path()));
    let (notice_tx, _rx) = notice_channel();

    store
        .insert_schedule(&test_support::schedule("sch-1", "p-1", "s-1", "*/5 * * * *"))
        .unwrap();

    let mut make = |_: usize| {
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
    let mut a = make(0);
    let mut b = make(1);

    a.refresh().unwrap();
    b.refresh().unwrap();

    clock.set_epoch_ms(tokyo_ms(12, 5, 2));
    a.tick();
    b.tick();

    let tasks = store.tasks_for_schedule(&ScheduleId::new("sch-1")).unwrap();
    assert_eq!(tasks.len(), 1, "CAS must serialise concurrent firings");
}

#[test]
fn conflict_gate_skips_but_still_advances() {
    let mut fx = fixture(8);
    fx.store
        .insert_schedule(&test_support::schedule("sch-1", "p-1", "s-1", "*/10 * * * *"))
        .unwrap();
    fx.scheduler.refresh().unwrap();

    // A pending task from the previous firing still gates the schedule.
    let mut blocker = test_support::pending_task("t-block", "p-1", "s-1");
    blocker.schedule_id = Some(ScheduleId::new("sch-1"));
    fx.store.insert_task(&blocker).unwrap();

    fx.clock.set_epoch_ms(tokyo_ms(12, 10, 1));
    fx.scheduler.tick();

    let tasks = fx
        .store
        .tasks_for_schedule(&ScheduleId::new("sch-1"))
        .unwrap();
    assert_eq!(tasks.len(), 1, "only the pre-existing blocker");
    assert_eq!(tasks[0].id, "t-block");

    // next_run advanced anyway.
    let schedule = fx.store.schedule(&ScheduleId::new("sch-1")).unwrap();
    assert_eq!(schedule.next_run_ms, Some(tokyo_ms(12, 20, 0)));
}

#[test]
fn backpressure_is_surfaced_not_retried() {
    // Queue capacity 1, two due schedules in one tick: the first firing
    // fills the queue, the second is rejected but still advances.
    let mut fx = fixture(1);
    fx.store
        .insert_schedule(&test_support::schedule("sch-1", "p-1", "s-1", "*/10 * * * *"))
        .unwrap();
    fx.store
        .insert_schedule(&test_support::schedule("sch-2", "p-1", "s-1", "*/10 * * * *"))
        .unwrap();
    fx.scheduler.refresh().unwrap();

    fx.clock.set_epoch_ms(tokyo_ms(12, 10, 1));
    fx.scheduler.tick();

    let mut submitted = 0;
    for id in ["sch-1", "sch-2"] {
        submitted += fx
            .store
            .tasks_for_schedule(&ScheduleId::new(id))
            .unwrap()
            .len();
        let schedule = fx.store.schedule(&ScheduleId::new(id)).unwrap();
        assert_eq!(schedule.next_run_ms, Some(tokyo_ms(12, 20, 0)));
    }
    assert_eq!(submitted, 1);

    let notices = drain_notices(&mut fx.notice_rx);
    let rejected: Vec<&Notice> = notices
        .iter()
        .filter(|n| n.kind == EventKind::ScheduleFired && n.attrs["submitted"] == false)
        .collect();
    assert_eq!(rejected.len(), 1);
    assert_eq!(rejected[0].attrs["reason"], "backpressure");
}

#[test]
fn invalid_cron_is_skipped_not_fatal() {
    let mut fx = fixture(8);
    fx.store
        .insert_schedule(&test_support::schedule("sch-bad", "p-1", "s-1", "not a cron"))
        .unwrap();
    fx.store
        .insert_schedule(&test_support::schedule("sch-ok", "p-1", "s-1", "*/10 * * * *"))
        .unwrap();

    fx.scheduler.refresh().unwrap();
    fx.clock.set_epoch_ms(tokyo_ms(12, 10, 1));
    fx.scheduler.tick();

    assert!(fx
        .store
        .tasks_for_schedule(&ScheduleId::new("sch-bad"))
        .unwrap()
        .is_empty());
    assert_eq!(
        fx.store
            .tasks_for_schedule(&ScheduleId::new("sch-ok"))
            .unwrap()
            .len(),
        1
    );
}

#[test]
fn next_run_values_are_strictly_increasing() {
    let mut fx = fixture(8);
    fx.store
        .insert_schedule(&test_support::schedule("sch-1", "p-1", "s-1", "*/10 * * * *"))
        .unwrap();
    fx.scheduler.refresh().unwrap();

    let mut previous = fx
        .store
        .schedule(&ScheduleId::new("sch-1"))
        .unwrap()
        .next_run_ms
        .unwrap();
    for _ in 0..3 {
        fx.clock.set_epoch_ms(previous + 1_000);
        fx.scheduler.tick();
        let next = fx
            .store
            .schedule(&ScheduleId::new("sch-1"))
            .unwrap()
            .next_run_ms
            .unwrap();
        assert!(next > previous);
        previous = next;
    }
}

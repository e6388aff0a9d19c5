// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::seeded_store;
use sui_core::test_support;
use sui_core::ScheduleId;

#[test]
fn active_schedules_filters_inactive() {
    let store = seeded_store();
    store
        .insert_schedule(&test_support::schedule("sch-1", "p-1", "s-1", "*/5 * * * *"))
        .unwrap();
    let mut inactive = test_support::schedule("sch-2", "p-1", "s-1", "0 * * * *");
    inactive.active = false;
    store.insert_schedule(&inactive).unwrap();

    let active = store.active_schedules().unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, "sch-1");
}

#[test]
fn init_next_run_only_fills_null() {
    let store = seeded_store();
    store
        .insert_schedule(&test_support::schedule("sch-1", "p-1", "s-1", "*/5 * * * *"))
        .unwrap();
    let id = ScheduleId::new("sch-1");

    assert!(store.init_next_run(&id, 1_000).unwrap());
    // Second init loses: next_run is no longer NULL.
    assert!(!store.init_next_run(&id, 2_000).unwrap());
    assert_eq!(store.schedule(&id).unwrap().next_run_ms, Some(1_000));
}

#[test]
fn reserve_firing_advances_both_stamps() {
    let store = seeded_store();
    store
        .insert_schedule(&test_support::schedule("sch-1", "p-1", "s-1", "*/5 * * * *"))
        .unwrap();
    let id = ScheduleId::new("sch-1");

    assert!(store.reserve_firing(&id, None, 10_000, Some(310_000)).unwrap());
    let schedule = store.schedule(&id).unwrap();
    assert_eq!(schedule.last_run_ms, Some(10_000));
    assert_eq!(schedule.next_run_ms, Some(310_000));
}

#[test]
fn reserve_firing_cas_loses_race() {
    // Two scheduler instances observe the same last_run; only the first
    // update can match it.
    let store = seeded_store();
    store
        .insert_schedule(&test_support::schedule("sch-1", "p-1", "s-1", "*/5 * * * *"))
        .unwrap();
    let id = ScheduleId::new("sch-1");

    assert!(store.reserve_firing(&id, None, 10_000, Some(310_000)).unwrap());
    assert!(!store.reserve_firing(&id, None, 10_001, Some(310_001)).unwrap());

    // The loser must re-observe before it can fire again.
    assert!(store
        .reserve_firing(&id, Some(10_000), 310_000, Some(610_000))
        .unwrap());
}

#[test]
fn reserve_firing_refused_for_inactive_schedule() {
    let store = seeded_store();
    let mut schedule = test_support::schedule("sch-1", "p-1", "s-1", "*/5 * * * *");
    schedule.active = false;
    store.insert_schedule(&schedule).unwrap();

    assert!(!store
        .reserve_firing(&ScheduleId::new("sch-1"), None, 10_000, Some(310_000))
        .unwrap());
}

#[test]
fn last_run_is_monotonic_under_cas() {
    let store = seeded_store();
    store
        .insert_schedule(&test_support::schedule("sch-1", "p-1", "s-1", "* * * * *"))
        .unwrap();
    let id = ScheduleId::new("sch-1");

    let mut observed = None;
    let mut last = 0u64;
    for fired_at in [1_000u64, 61_000, 121_000] {
        assert!(store
            .reserve_firing(&id, observed, fired_at, Some(fired_at + 60_000))
            .unwrap());
        assert!(fired_at > last || last == 0);
        last = fired_at;
        observed = Some(fired_at);
    }
}

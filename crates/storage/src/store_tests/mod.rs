// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Store tests over an in-memory database.

mod projects;
mod results;
mod schedules;
mod tasks;

use crate::Store;
use sui_core::test_support;

/// Fresh in-memory store with one project and one spider seeded.
pub(crate) fn seeded_store() -> Store {
    let store = Store::open_memory().unwrap();
    store
        .insert_project(&test_support::project("p-1", "p1"))
        .unwrap();
    store
        .insert_spider(&test_support::spider("s-1", "p-1", "s1"))
        .unwrap();
    store
}

mod events {
    use super::seeded_store;
    use serde_json::json;
    use sui_core::{EventKind, Notice, TaskId};

    #[test]
    fn append_and_read_back_in_order() {
        let store = seeded_store();
        let task_id = TaskId::new("t-1");
        for (i, kind) in [
            EventKind::TaskStarted,
            EventKind::TaskProgress,
            EventKind::TaskFinished,
        ]
        .into_iter()
        .enumerate()
        {
            store
                .append_event(&Notice::new(
                    kind,
                    task_id.clone(),
                    i as u64,
                    json!({"i": i}),
                ))
                .unwrap();
        }

        let notices = store.events_for_task(&task_id, 10).unwrap();
        assert_eq!(notices.len(), 3);
        assert_eq!(notices[0].kind, EventKind::TaskStarted);
        assert_eq!(notices[2].kind, EventKind::TaskFinished);
        assert_eq!(notices[1].attrs["i"], 1);
    }

    #[test]
    fn limit_keeps_newest() {
        let store = seeded_store();
        let task_id = TaskId::new("t-1");
        for i in 0..5u64 {
            store
                .append_event(&Notice::new(
                    EventKind::TaskProgress,
                    task_id.clone(),
                    i,
                    json!({"i": i}),
                ))
                .unwrap();
        }
        let notices = store.events_for_task(&task_id, 2).unwrap();
        assert_eq!(notices.len(), 2);
        assert_eq!(notices[0].attrs["i"], 3);
        assert_eq!(notices[1].attrs["i"], 4);
    }
}

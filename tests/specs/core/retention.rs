// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Retention trim: 1200 lines across three crawl sessions reduce to the
//! newest session, with a backup of the original.

use std::io::Write;
use std::sync::Arc;
use sui_engine::{ActiveTasks, EngineConfig, Retention};
use sui_core::SystemClock;

#[test]
fn oversized_file_is_trimmed_to_newest_session() {
    let root = tempfile::tempdir().unwrap();
    let project_dir = root.path().join("p1");
    std::fs::create_dir_all(&project_dir).unwrap();
    let path = project_dir.join("results_t-1.jsonl");

    let mut file = std::fs::File::create(&path).unwrap();
    for stamp in [
        "2024-06-01T00:00:00",
        "2024-06-02T00:00:00",
        "2024-06-03T00:00:00",
    ] {
        for i in 0..400 {
            writeln!(
                file,
                "{{\"rank\":{i},\"crawl_start_datetime\":\"{stamp}\"}}"
            )
            .unwrap();
        }
    }
    drop(file);

    let config = Arc::new(EngineConfig {
        projects_root: root.path().to_path_buf(),
        max_jsonl_lines: 500,
        keep_sessions: 1,
        ..EngineConfig::default()
    });
    let retention = Retention::new(SystemClock, config, ActiveTasks::default());
    let report = retention.run_once();

    assert_eq!(report.files_trimmed, 1);
    assert_eq!(report.lines_removed, 800);

    let kept = std::fs::read_to_string(&path).unwrap();
    assert_eq!(kept.lines().count(), 400);
    assert!(kept.lines().all(|l| l.contains("2024-06-03")));

    // The backup preserves the original contents.
    let backup = std::fs::read_dir(&project_dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .find(|p| p.to_string_lossy().contains(".backup_"))
        .expect("backup file must exist");
    assert_eq!(
        std::fs::read_to_string(&backup).unwrap().lines().count(),
        1200
    );
}

//! End-to-end tests: transcript trees on disk through the index, and the
//! telemetry store against a real file.

use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use tempfile::TempDir;
use vigil_core::config::{Config, MaintenanceConfig};
use vigil_core::sessions::index::{OverlayStore, RawOverlayEntry};
use vigil_core::sessions::{PageRequest, SessionIndex};
use vigil_core::store::{NewQueryEvent, QueryFilter, TelemetryStore};
use vigil_core::{AgentKind, QuerySource, SessionOrigin, TimeRange};

const PROJECT: &str = "/work/demo";

fn write_transcript(dir: &Path, session_id: &str, lines: &[String]) {
    let mut f = File::create(dir.join(format!("{}.jsonl", session_id))).unwrap();
    for line in lines {
        writeln!(f, "{}", line).unwrap();
    }
}

fn user_line(text: &str, ts: &str) -> String {
    format!(
        r#"{{"type":"user","message":{{"role":"user","content":"{}"}},"timestamp":"{}"}}"#,
        text, ts
    )
}

fn assistant_line(input: u64, output: u64, ts: &str) -> String {
    format!(
        r#"{{"type":"assistant","message":{{"usage":{{"input_tokens":{},"output_tokens":{}}}}},"timestamp":"{}"}}"#,
        input, output, ts
    )
}

/// Builds a project directory with `n` sessions, oldest first, separated by
/// short sleeps so file mtimes order them deterministically.
fn build_project(n: usize) -> (TempDir, SessionIndex) {
    let tmp = TempDir::new().unwrap();
    let index = SessionIndex::new(tmp.path(), Config::default());
    let dir = index.project_dir(PROJECT);
    std::fs::create_dir_all(&dir).unwrap();

    for i in 0..n {
        write_transcript(
            &dir,
            &format!("session-{:02}", i),
            &[
                user_line(&format!("task number {}", i), "2026-02-01T09:00:00Z"),
                assistant_line(1000, 100, "2026-02-01T09:01:00Z"),
            ],
        );
        std::thread::sleep(Duration::from_millis(20));
    }

    (tmp, index)
}

struct MapOverlay(HashMap<String, serde_json::Value>);

impl OverlayStore for MapOverlay {
    fn entry(&self, _project_path: &str, session_id: &str) -> Option<RawOverlayEntry> {
        self.0
            .get(session_id)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

fn no_overlay() -> MapOverlay {
    MapOverlay(HashMap::new())
}

// ============================================
// Session index
// ============================================

#[test]
fn test_listing_orders_newest_first() {
    let (_tmp, index) = build_project(3);
    let sessions = index.list_sessions(PROJECT, &no_overlay()).unwrap();

    assert_eq!(sessions.len(), 3);
    assert_eq!(sessions[0].session_id, "session-02");
    assert_eq!(sessions[2].session_id, "session-00");
    assert_eq!(sessions[0].project_path, PROJECT);
    assert_eq!(sessions[0].message_count, 2);
    assert_eq!(sessions[0].input_tokens, 1000);
    assert_eq!(sessions[0].duration_seconds, 60);
}

#[test]
fn test_overlay_merge_legacy_and_labeled() {
    let (_tmp, index) = build_project(3);
    let overlay = MapOverlay(HashMap::from([
        ("session-00".to_string(), serde_json::json!("auto")),
        (
            "session-01".to_string(),
            serde_json::json!({"origin": "auto", "sessionName": "batch run", "starred": true}),
        ),
    ]));

    let sessions = index.list_sessions(PROJECT, &overlay).unwrap();
    let by_id: HashMap<_, _> = sessions.iter().map(|s| (s.session_id.as_str(), s)).collect();

    let legacy = by_id["session-00"];
    assert_eq!(legacy.origin, SessionOrigin::Auto);
    assert!(legacy.session_name.is_none());

    let labeled = by_id["session-01"];
    assert_eq!(labeled.origin, SessionOrigin::Auto);
    assert_eq!(labeled.session_name.as_deref(), Some("batch run"));
    assert_eq!(labeled.starred, Some(true));

    let unlabeled = by_id["session-02"];
    assert_eq!(unlabeled.origin, SessionOrigin::User);
}

#[test]
fn test_pagination_walk_covers_full_listing() {
    let (_tmp, index) = build_project(5);
    let full = index.list_sessions(PROJECT, &no_overlay()).unwrap();

    let mut walked = Vec::new();
    let mut cursor = None;
    loop {
        let page = index
            .list_sessions_paginated(
                PROJECT,
                &PageRequest {
                    cursor: cursor.clone(),
                    limit: Some(2),
                },
                &no_overlay(),
            )
            .unwrap();
        assert_eq!(page.total_count, 5);
        walked.extend(page.sessions.iter().map(|s| s.session_id.clone()));
        if !page.has_more {
            assert!(page.next_cursor.is_none());
            break;
        }
        cursor = page.next_cursor.clone();
        assert!(cursor.is_some());
    }

    let expected: Vec<_> = full.iter().map(|s| s.session_id.clone()).collect();
    assert_eq!(walked, expected);
}

#[test]
fn test_stale_cursor_restarts_from_beginning() {
    let (_tmp, index) = build_project(3);
    let page = index
        .list_sessions_paginated(
            PROJECT,
            &PageRequest {
                cursor: Some("deleted-session".to_string()),
                limit: Some(2),
            },
            &no_overlay(),
        )
        .unwrap();

    assert_eq!(page.sessions[0].session_id, "session-02");
    assert_eq!(page.total_count, 3);
    assert!(page.has_more);
}

#[test]
fn test_unbounded_limit_with_cursor_returns_remainder() {
    let (_tmp, index) = build_project(3);
    let page = index
        .list_sessions_paginated(
            PROJECT,
            &PageRequest {
                cursor: Some("session-02".to_string()),
                limit: Some(usize::MAX),
            },
            &no_overlay(),
        )
        .unwrap();

    assert_eq!(page.sessions.len(), 2);
    assert_eq!(page.sessions[0].session_id, "session-01");
    assert!(!page.has_more);
    assert!(page.next_cursor.is_none());
}

#[test]
fn test_zero_byte_sessions_excluded_everywhere() {
    let (_tmp, index) = build_project(2);
    let dir = index.project_dir(PROJECT);
    File::create(dir.join("empty.jsonl")).unwrap();

    let sessions = index.list_sessions(PROJECT, &no_overlay()).unwrap();
    assert_eq!(sessions.len(), 2);

    let page = index
        .list_sessions_paginated(PROJECT, &PageRequest::default(), &no_overlay())
        .unwrap();
    assert_eq!(page.total_count, 2);
    assert!(!page.sessions.iter().any(|s| s.session_id == "empty"));
}

#[test]
fn test_missing_project_lists_empty() {
    let tmp = TempDir::new().unwrap();
    let index = SessionIndex::new(tmp.path(), Config::default());

    let sessions = index.list_sessions("/nowhere/at/all", &no_overlay()).unwrap();
    assert!(sessions.is_empty());

    let page = index
        .list_sessions_paginated("/nowhere/at/all", &PageRequest::default(), &no_overlay())
        .unwrap();
    assert_eq!(page.total_count, 0);
    assert!(!page.has_more);
}

#[test]
fn test_corrupt_lines_do_not_poison_sums() {
    let tmp = TempDir::new().unwrap();
    let index = SessionIndex::new(tmp.path(), Config::default());
    let dir = index.project_dir(PROJECT);
    std::fs::create_dir_all(&dir).unwrap();

    let lines = vec![
        user_line("please refactor the parser", "2026-02-01T09:00:00Z"),
        "garbage not json".to_string(),
        assistant_line(500, 50, "2026-02-01T09:02:00Z"),
        "{\"unterminated\":".to_string(),
        assistant_line(500, 50, "2026-02-01T09:04:00Z"),
    ];
    write_transcript(&dir, "messy", &lines);

    let sessions = index.list_sessions(PROJECT, &no_overlay()).unwrap();
    assert_eq!(sessions.len(), 1);
    let s = &sessions[0];
    assert_eq!(s.message_count, 3);
    assert_eq!(s.input_tokens, 1000);
    assert_eq!(s.output_tokens, 100);
    assert_eq!(
        s.first_message.as_deref(),
        Some("please refactor the parser")
    );
    assert_eq!(s.duration_seconds, 240);
}

// ============================================
// Telemetry store on disk
// ============================================

#[test]
fn test_store_file_lifecycle_and_maintenance() {
    let tmp = TempDir::new().unwrap();
    let db_path = tmp.path().join("data").join("telemetry.db");
    let maintenance = MaintenanceConfig::default();

    let store = TelemetryStore::initialize(&db_path, &maintenance).unwrap();
    let id = store
        .insert_query_event(&NewQueryEvent {
            session_id: "s1".to_string(),
            agent_type: AgentKind::Codex,
            source: QuerySource::User,
            start_time: chrono::Utc::now().timestamp_millis(),
            duration: 0,
            project_path: None,
            tab_id: None,
            is_remote: Some(false),
        })
        .unwrap();
    store.close();
    drop(store);

    // First initialize had no sidecar, so it vacuumed: backup + timestamp
    let sidecar = tmp.path().join("data").join("telemetry.db.last-vacuum");
    let backup = tmp.path().join("data").join("telemetry.db.backup");
    assert!(sidecar.exists());
    assert!(backup.exists());

    // Reopen: data persisted, fresh sidecar suppresses another vacuum
    let reopened = TelemetryStore::initialize(&db_path, &maintenance).unwrap();
    let events = reopened
        .get_query_events(TimeRange::All, &QueryFilter::default())
        .unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].id, id);
    assert_eq!(events[0].duration, 0);
    assert_eq!(events[0].project_path, None);
    assert_eq!(events[0].is_remote, Some(false));

    let csv = reopened.export_csv(TimeRange::All).unwrap();
    assert!(csv.starts_with(
        "id,sessionId,agentType,source,startTime,duration,projectPath,tabId,isRemote\n"
    ));
    assert_eq!(csv.lines().count(), 2);
}

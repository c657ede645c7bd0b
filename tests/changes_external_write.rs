mod test_support;

use rusqlite::Connection;
use serde_json::json;
use test_support::{db_path, request_ok, seed_catalog, spawn_sidecar, temp_dir};

#[test]
fn writes_by_another_process_refresh_the_caches() {
    let workspace = temp_dir("escola-changes");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let seed = seed_catalog(&mut stdin, &mut reader);
    let _ = request_ok(&mut stdin, &mut reader, "2", "schedule.load", json!({ "year": "2024" }));

    let own = request_ok(&mut stdin, &mut reader, "3", "changes.poll", json!({}));
    let own_events = own.get("events").and_then(|v| v.as_array()).expect("events");
    assert!(own_events
        .iter()
        .any(|e| e.get("table") == Some(&json!("time_slots")) && e.get("action") == Some(&json!("insert"))));
    let empty = request_ok(&mut stdin, &mut reader, "4", "changes.poll", json!({}));
    assert_eq!(
        empty.get("events").and_then(|v| v.as_array()).map(|a| a.len()),
        Some(0)
    );

    {
        let conn = Connection::open(db_path(&workspace)).expect("open db");
        conn.execute(
            "INSERT INTO class_allocations(
                id, teacher_id, subject_id, class_id, time_slot_id, day_of_week, year, semester, room
             ) VALUES('ext-1', ?, ?, ?, ?, 'Friday', '2024', '1', NULL)",
            [&seed.ana, &seed.math, &seed.class_7a, &seed.first_slot],
        )
        .expect("external insert");
    }

    // The cached year picks up the external row without an explicit reload.
    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "schedule.list",
        json!({ "year": "2024", "semester": "1", "teacherId": seed.ana }),
    );
    let rows = listed
        .get("classAllocations")
        .and_then(|v| v.as_array())
        .expect("rows");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("id"), Some(&json!("ext-1")));

    let external = request_ok(&mut stdin, &mut reader, "6", "changes.poll", json!({}));
    assert!(external
        .get("events")
        .and_then(|v| v.as_array())
        .expect("events")
        .iter()
        .any(|e| e.get("table") == Some(&json!("class_allocations"))
            && e.get("action") == Some(&json!("external"))));
}

mod test_support;

use serde_json::json;
use test_support::{error_code, request, request_ok, spawn_sidecar, temp_dir};

#[test]
fn calendar_reset_needs_the_typed_phrase() {
    let workspace = temp_dir("escola-calendar");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    for (i, (date, title, kind)) in [
        ("2024-02-13", "Carnaval", "feriado"),
        ("2024-02-14", "Conselho de classe", "evento"),
        ("2024-07-15", "Férias", "recesso"),
        ("2025-01-01", "Ano novo", "feriado"),
    ]
    .into_iter()
    .enumerate()
    {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &format!("c{}", i),
            "calendar.create",
            json!({ "date": date, "title": title, "kind": kind }),
        );
    }

    let bad_kind = request(
        &mut stdin,
        &mut reader,
        "2",
        "calendar.create",
        json!({ "date": "2024-03-01", "title": "x", "kind": "party" }),
    );
    assert_eq!(error_code(&bad_kind), Some("bad_params"));

    let feb = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "calendar.list",
        json!({ "year": 2024, "month": 2 }),
    );
    assert_eq!(
        feb.get("events").and_then(|v| v.as_array()).map(|a| a.len()),
        Some(2)
    );

    let days = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "calendar.schoolDays",
        json!({ "year": 2024, "month": 2 }),
    );
    assert_eq!(days.get("count"), Some(&json!(20)));

    let refused = request(
        &mut stdin,
        &mut reader,
        "5",
        "calendar.reset",
        json!({ "year": 2024, "confirmation": "RESETAR" }),
    );
    assert_eq!(error_code(&refused), Some("confirmation_required"));
    let year = request_ok(&mut stdin, &mut reader, "6", "calendar.list", json!({ "year": 2024 }));
    assert_eq!(
        year.get("events").and_then(|v| v.as_array()).map(|a| a.len()),
        Some(3)
    );

    let reset = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "calendar.reset",
        json!({ "year": 2024, "confirmation": "RESETAR CALENDARIO" }),
    );
    assert_eq!(reset.get("deleted"), Some(&json!(3)));
    let next_year = request_ok(&mut stdin, &mut reader, "8", "calendar.list", json!({ "year": 2025 }));
    assert_eq!(
        next_year.get("events").and_then(|v| v.as_array()).map(|a| a.len()),
        Some(1)
    );
}

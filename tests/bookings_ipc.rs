mod test_support;

use serde_json::json;
use test_support::{error_code, request, request_ok, seed_catalog, spawn_sidecar, temp_dir};

#[test]
fn second_booking_of_a_cell_is_rejected_as_slot_taken() {
    let workspace = temp_dir("escola-booking");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let seed = seed_catalog(&mut stdin, &mut reader);

    let empty = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "bookings.listWeek",
        json!({ "resourceId": seed.lab, "weekStart": "2024-03-11" }),
    );
    assert_eq!(empty.get("weekEnd").and_then(|v| v.as_str()), Some("2024-03-15"));
    assert_eq!(
        empty.get("bookings").and_then(|v| v.as_array()).map(|a| a.len()),
        Some(0)
    );

    let created = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "bookings.create",
        json!({
            "resourceId": seed.lab,
            "timeSlotId": seed.first_slot,
            "date": "2024-03-11",
            "classId": seed.class_7a,
            "subjectId": seed.math,
            "professionalId": seed.ana
        }),
    );
    let booking_id = created
        .pointer("/booking/id")
        .and_then(|v| v.as_str())
        .expect("booking id")
        .to_string();

    let taken = request(
        &mut stdin,
        &mut reader,
        "4",
        "bookings.create",
        json!({
            "resourceId": seed.lab,
            "timeSlotId": seed.first_slot,
            "date": "2024-03-11",
            "classId": seed.class_7b,
            "subjectId": seed.math,
            "professionalId": seed.bruno
        }),
    );
    assert_eq!(error_code(&taken), Some("slot_taken"));

    let week = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "bookings.listWeek",
        json!({ "resourceId": seed.lab, "weekStart": "2024-03-13" }),
    );
    let rows = week.get("bookings").and_then(|v| v.as_array()).expect("bookings");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("id").and_then(|v| v.as_str()), Some(booking_id.as_str()));
    assert_eq!(
        rows[0].get("classId").and_then(|v| v.as_str()),
        Some(seed.class_7a.as_str())
    );

    let cells = week
        .pointer("/grid/0/cells")
        .and_then(|v| v.as_array())
        .expect("grid cells");
    assert_eq!(cells.len(), 5);
    assert_eq!(cells[0].get("state"), Some(&json!("booked")));
    assert_eq!(cells[0].get("bookingId"), Some(&json!(booking_id)));
    assert_eq!(cells[1].get("state"), Some(&json!("empty")));

    // Same cell on another date is free.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "bookings.create",
        json!({
            "resourceId": seed.lab,
            "timeSlotId": seed.first_slot,
            "date": "2024-03-12",
            "classId": seed.class_7b,
            "subjectId": seed.math,
            "professionalId": seed.bruno
        }),
    );
}

#[test]
fn only_owner_or_staff_may_change_a_booking() {
    let workspace = temp_dir("escola-booking-perms");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let seed = seed_catalog(&mut stdin, &mut reader);

    let created = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "bookings.create",
        json!({
            "resourceId": seed.lab,
            "timeSlotId": seed.first_slot,
            "date": "2024-03-11",
            "classId": seed.class_7a,
            "subjectId": seed.math,
            "professionalId": seed.ana,
            "description": "Experimento"
        }),
    );
    let booking_id = created
        .pointer("/booking/id")
        .and_then(|v| v.as_str())
        .expect("booking id")
        .to_string();

    let bruno = json!({ "professionalId": seed.bruno, "role": "teacher" });
    let ana = json!({ "professionalId": seed.ana, "role": "teacher" });

    let denied = request(
        &mut stdin,
        &mut reader,
        "3",
        "bookings.delete",
        json!({ "bookingId": booking_id, "actor": bruno }),
    );
    assert_eq!(error_code(&denied), Some("forbidden"));

    let edited = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "bookings.update",
        json!({ "bookingId": booking_id, "actor": ana, "patch": { "description": "" } }),
    );
    assert!(edited.pointer("/booking/description").is_some_and(|v| v.is_null()));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "setup.update",
        json!({ "section": "bookings", "patch": { "allowTeacherEdits": false } }),
    );
    let locked = request(
        &mut stdin,
        &mut reader,
        "6",
        "bookings.update",
        json!({ "bookingId": booking_id, "actor": ana, "patch": { "description": "x" } }),
    );
    assert_eq!(error_code(&locked), Some("forbidden"));

    let coordinator = json!({ "professionalId": "someone-else", "role": "coordinator" });
    let coordinator_edit = request(
        &mut stdin,
        &mut reader,
        "6b",
        "bookings.update",
        json!({ "bookingId": booking_id, "actor": coordinator, "patch": { "description": "outro" } }),
    );
    assert_eq!(error_code(&coordinator_edit), Some("forbidden"));
    let removed = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "bookings.delete",
        json!({ "bookingId": booking_id, "actor": coordinator }),
    );
    assert_eq!(removed.get("removed"), Some(&json!(true)));
    let again = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "bookings.delete",
        json!({ "bookingId": booking_id, "actor": coordinator }),
    );
    assert_eq!(again.get("removed"), Some(&json!(false)));

    let admin = json!({ "professionalId": "someone-else", "role": "admin" });
    let missing = request(
        &mut stdin,
        &mut reader,
        "9",
        "bookings.update",
        json!({ "bookingId": booking_id, "actor": admin, "patch": {} }),
    );
    assert_eq!(error_code(&missing), Some("not_found"));
}

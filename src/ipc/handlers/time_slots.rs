use crate::ipc::error::{domain_err, err, ok};
use crate::ipc::handlers::setup::load_institution_settings;
use crate::ipc::helpers::{db_conn, parse_bool, parse_params, required_str};
use crate::ipc::types::{AppState, Request};
use crate::schedule::time_grid::{self, NewTimeSlot};
use serde_json::json;

fn handle_time_slots_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "timeSlots": [] }));
    };
    let include_all = match parse_bool(req.params.get("includeAll"), false) {
        Ok(v) => v,
        Err(msg) => return err(&req.id, "bad_params", format!("includeAll {}", msg), None),
    };

    let all = match time_grid::load_slots(conn) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let has_night_shift = load_institution_settings(conn).has_night_shift;
    let slots = if include_all {
        all
    } else {
        time_grid::visible_slots(&all, has_night_shift)
    };

    let items: Vec<serde_json::Value> = slots
        .iter()
        .map(|s| {
            json!({
                "id": s.id,
                "label": s.label,
                "startTime": s.start_time,
                "endTime": s.end_time,
                "kind": s.kind,
                "position": s.position,
                "isNight": s.is_night,
                "timeLabel": s.time_label(),
            })
        })
        .collect();
    ok(
        &req.id,
        json!({ "timeSlots": items, "hasNightShift": has_night_shift }),
    )
}

fn handle_time_slots_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(&state.db, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let new: NewTimeSlot = match parse_params(req, None) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match time_grid::create_slot(conn, &new) {
        Ok(slot) => ok(
            &req.id,
            json!({
                "timeSlotId": slot.id,
                "position": slot.position,
                "timeLabel": slot.time_label(),
            }),
        ),
        Err(e) => domain_err(&req.id, &e),
    }
}

fn handle_time_slots_reorder(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(&state.db, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let ids: Vec<String> = match parse_params(req, Some("timeSlotIds")) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match time_grid::reorder_slots(conn, &ids) {
        Ok(()) => ok(&req.id, json!({ "ok": true })),
        Err(e) => domain_err(&req.id, &e),
    }
}

fn handle_time_slots_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(&state.db, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let id = match required_str(req, "timeSlotId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match time_grid::delete_slot(conn, &id) {
        Ok(true) => ok(&req.id, json!({ "ok": true })),
        Ok(false) => err(&req.id, "not_found", "time slot not found", None),
        Err(e) => domain_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "timeSlots.list" => Some(handle_time_slots_list(state, req)),
        "timeSlots.create" => Some(handle_time_slots_create(state, req)),
        "timeSlots.reorder" => Some(handle_time_slots_reorder(state, req)),
        "timeSlots.delete" => Some(handle_time_slots_delete(state, req)),
        _ => None,
    }
}

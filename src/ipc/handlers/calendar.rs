use crate::calendar::{self, NewCalendarEvent};
use crate::ipc::error::{domain_err, err, ok};
use crate::ipc::helpers::{db_conn, parse_i32, parse_params, required_str};
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Value};

fn month_param(req: &Request) -> Result<Option<u32>, Value> {
    if req.params.get("month").map_or(true, Value::is_null) {
        return Ok(None);
    }
    let m = parse_i32(req, "month")?;
    u32::try_from(m)
        .ok()
        .filter(|m| (1..=12).contains(m))
        .map(Some)
        .ok_or_else(|| err(&req.id, "bad_params", "month must be in 1..=12", None))
}

fn handle_calendar_list(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(&state.db, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let year = match parse_i32(req, "year") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let month = match month_param(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match calendar::list_events(conn, year, month) {
        Ok(events) => ok(&req.id, json!({ "events": events })),
        Err(e) => domain_err(&req.id, &e),
    }
}

fn handle_calendar_create(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(&state.db, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let new: NewCalendarEvent = match parse_params(req, None) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match calendar::create_event(conn, &new) {
        Ok(event) => ok(&req.id, json!({ "event": event })),
        Err(e) => domain_err(&req.id, &e),
    }
}

fn handle_calendar_delete(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(&state.db, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let id = match required_str(req, "eventId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match calendar::delete_event(conn, &id) {
        Ok(removed) => ok(&req.id, json!({ "removed": removed })),
        Err(e) => domain_err(&req.id, &e),
    }
}

fn handle_calendar_reset(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(&state.db, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let year = match parse_i32(req, "year") {
        Ok(v) => v,
        Err(e) => return e,
    };
    // Compared untrimmed: the phrase has to be typed exactly.
    let confirmation = req
        .params
        .get("confirmation")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    match calendar::reset_year(conn, year, confirmation) {
        Ok(deleted) => ok(&req.id, json!({ "deleted": deleted })),
        Err(e) => domain_err(&req.id, &e),
    }
}

fn handle_calendar_school_days(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(&state.db, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let year = match parse_i32(req, "year") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let month = match month_param(req) {
        Ok(Some(m)) => m,
        Ok(None) => return err(&req.id, "bad_params", "missing month", None),
        Err(e) => return e,
    };
    let events = match calendar::list_events(conn, year, Some(month)) {
        Ok(v) => v,
        Err(e) => return domain_err(&req.id, &e),
    };
    match calendar::school_days(year, month, &events) {
        Ok(days) => ok(
            &req.id,
            json!({ "count": days.len(), "days": days }),
        ),
        Err(e) => domain_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "calendar.list" => Some(handle_calendar_list(state, req)),
        "calendar.create" => Some(handle_calendar_create(state, req)),
        "calendar.delete" => Some(handle_calendar_delete(state, req)),
        "calendar.reset" => Some(handle_calendar_reset(state, req)),
        "calendar.schoolDays" => Some(handle_calendar_school_days(state, req)),
        _ => None,
    }
}

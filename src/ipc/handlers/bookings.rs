use crate::bookings::{week_window, Actor, BookingPatch, CellState, NewBooking, Role};
use crate::error::ScheduleError;
use crate::ipc::error::{domain_err, err, ok};
use crate::ipc::handlers::setup::{load_booking_settings, load_institution_settings};
use crate::ipc::helpers::{db_conn, parse_params, required_str};
use crate::ipc::types::{AppState, Request};
use crate::schedule::time_grid;
use chrono::NaiveDate;
use serde_json::{json, Value};

const MAX_WINDOW_DAYS: i64 = 30;

fn date_param(req: &Request, key: &str) -> Result<Option<NaiveDate>, Value> {
    match req.params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_str()
            .and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok())
            .map(Some)
            .ok_or_else(|| err(&req.id, "bad_params", format!("{} must be YYYY-MM-DD", key), None)),
    }
}

fn handle_bookings_list_week(state: &mut AppState, req: &Request) -> Value {
    let AppState { db, bookings, .. } = state;
    let conn = match db_conn(db, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let resource_id = match required_str(req, "resourceId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let week_start = match date_param(req, "weekStart") {
        Ok(Some(d)) => d,
        Ok(None) => return err(&req.id, "bad_params", "missing weekStart", None),
        Err(e) => return e,
    };
    let (start, end) = match date_param(req, "weekEnd") {
        Ok(Some(end)) => (week_start, end),
        Ok(None) => week_window(week_start, load_booking_settings(conn).week_days),
        Err(e) => return e,
    };

    if (end - start).num_days() > MAX_WINDOW_DAYS {
        return err(
            &req.id,
            "bad_params",
            format!("window must span at most {} days", MAX_WINDOW_DAYS + 1),
            None,
        );
    }

    if let Err(e) = bookings.list_for_week(conn, &resource_id, start, end) {
        return domain_err(&req.id, &e);
    }
    let all_slots = match time_grid::load_slots(conn) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let slots = time_grid::visible_slots(&all_slots, load_institution_settings(conn).has_night_shift);
    let dates: Vec<NaiveDate> = start.iter_days().take_while(|d| *d <= end).collect();

    let grid: Vec<Value> = slots
        .iter()
        .map(|slot| {
            let cells: Vec<Value> = dates
                .iter()
                .map(|date| match bookings.cell(&slot.id, *date) {
                    CellState::Empty => json!({ "date": date, "state": "empty" }),
                    CellState::Booked(b) => json!({
                        "date": date,
                        "state": "booked",
                        "bookingId": b.id,
                        "classId": b.class_id,
                        "professionalId": b.professional_id,
                    }),
                })
                .collect();
            json!({ "timeSlotId": slot.id, "time": slot.time_label(), "cells": cells })
        })
        .collect();

    let window = bookings.window();
    ok(
        &req.id,
        json!({
            "resourceId": resource_id,
            "weekStart": window.map(|w| w.start),
            "weekEnd": window.map(|w| w.end),
            "bookings": bookings.bookings(),
            "grid": grid,
        }),
    )
}

fn handle_bookings_create(state: &mut AppState, req: &Request) -> Value {
    let AppState { db, bookings, .. } = state;
    let conn = match db_conn(db, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let new: NewBooking = match parse_params(req, None) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match bookings.create(conn, &new) {
        Ok(b) => ok(&req.id, json!({ "booking": b })),
        Err(e) => domain_err(&req.id, &e),
    }
}

fn handle_bookings_update(state: &mut AppState, req: &Request) -> Value {
    let AppState { db, bookings, .. } = state;
    let conn = match db_conn(db, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let id = match required_str(req, "bookingId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let actor: Actor = match parse_params(req, Some("actor")) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let patch: BookingPatch = match parse_params(req, Some("patch")) {
        Ok(v) => v,
        Err(e) => return e,
    };
    if actor.role == Role::Teacher && !load_booking_settings(conn).allow_teacher_edits {
        return domain_err(
            &req.id,
            &ScheduleError::Forbidden("teacher edits are disabled for this institution"),
        );
    }
    match bookings.update(conn, &id, &patch, &actor) {
        Ok(b) => ok(&req.id, json!({ "booking": b })),
        Err(e) => domain_err(&req.id, &e),
    }
}

fn handle_bookings_delete(state: &mut AppState, req: &Request) -> Value {
    let AppState { db, bookings, .. } = state;
    let conn = match db_conn(db, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let id = match required_str(req, "bookingId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let actor: Actor = match parse_params(req, Some("actor")) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match bookings.delete(conn, &id, &actor) {
        Ok(removed) => ok(&req.id, json!({ "removed": removed })),
        Err(e) => domain_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "bookings.listWeek" => Some(handle_bookings_list_week(state, req)),
        "bookings.create" => Some(handle_bookings_create(state, req)),
        "bookings.update" => Some(handle_bookings_update(state, req)),
        "bookings.delete" => Some(handle_bookings_delete(state, req)),
        _ => None,
    }
}

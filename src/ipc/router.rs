use super::handlers;
use super::types::{AppState, Request};
use crate::ipc::error::err;
use crate::notify::Invalidation;

pub fn handle_request(state: &mut AppState, req: Request) -> serde_json::Value {
    // Picks up commits other processes made while we were idle.
    sync_changes(state);
    let resp = dispatch(state, &req);
    sync_changes(state);
    resp
}

fn dispatch(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Some(resp) = handlers::core::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::setup::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::catalog::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::time_slots::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::schedule::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::bookings::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::calendar::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::changes::try_handle(state, req) {
        return resp;
    }

    err(
        &req.id,
        "not_implemented",
        format!("unknown method: {}", req.method),
        None,
    )
}

/// Applies pending change notifications: any touched cache is re-fetched in full.
fn sync_changes(state: &mut AppState) {
    let AppState {
        db,
        schedule,
        bookings,
        changes,
        ..
    } = state;
    let (Some(conn), Some(feed)) = (db.as_ref(), changes.as_mut()) else {
        return;
    };

    let events = match feed.drain(conn) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, "change feed drain failed");
            return;
        }
    };
    if events.is_empty() {
        return;
    }

    let inv = Invalidation::from_events(&events);
    if inv.allocations {
        if let Err(e) = schedule.reload(conn) {
            tracing::warn!(error = %e, "allocation refresh after change failed");
        }
    }
    if inv.bookings {
        if let Err(e) = bookings.reload(conn) {
            tracing::warn!(error = %e, "booking refresh after change failed");
        }
    }
}

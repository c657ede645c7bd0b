use crate::ipc::error::ok;
use crate::ipc::types::{AppState, Request};
use serde_json::json;

/// Hands the client every change seen since its last poll. The router has already
/// refreshed the caches those changes touch.
fn handle_changes_poll(state: &mut AppState, req: &Request) -> serde_json::Value {
    let events = state
        .changes
        .as_mut()
        .map(|feed| feed.take_pending())
        .unwrap_or_default();
    ok(&req.id, json!({ "events": events }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "changes.poll" => Some(handle_changes_poll(state, req)),
        _ => None,
    }
}

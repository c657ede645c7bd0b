use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use crate::ipc::error::err;
use crate::ipc::types::Request;

/// The open workspace connection. Takes the field, not the whole state, so callers can
/// still borrow the caches mutably.
pub fn db_conn<'a>(
    db: &'a Option<Connection>,
    req: &Request,
) -> Result<&'a Connection, serde_json::Value> {
    db.as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

pub fn required_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

pub fn optional_str(req: &Request, key: &str) -> Option<String> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn parse_bool(v: Option<&JsonValue>, default: bool) -> Result<bool, &'static str> {
    match v {
        None => Ok(default),
        Some(v) if v.is_null() => Ok(default),
        Some(v) => v.as_bool().ok_or("must be boolean"),
    }
}

/// Deserializes `params[key]` (or the whole params object when `key` is None).
pub fn parse_params<T: DeserializeOwned>(
    req: &Request,
    key: Option<&str>,
) -> Result<T, serde_json::Value> {
    let raw = match key {
        Some(k) => req
            .params
            .get(k)
            .cloned()
            .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", k), None))?,
        None => req.params.clone(),
    };
    serde_json::from_value(raw).map_err(|e| err(&req.id, "bad_params", e.to_string(), None))
}

pub fn parse_i32(req: &Request, key: &str) -> Result<i32, serde_json::Value> {
    let v = req.params.get(key);
    v.and_then(|v| v.as_i64())
        .or_else(|| v.and_then(|v| v.as_str()).and_then(|s| s.trim().parse().ok()))
        .and_then(|n| i32::try_from(n).ok())
        .ok_or_else(|| err(&req.id, "bad_params", format!("{} must be an integer", key), None))
}

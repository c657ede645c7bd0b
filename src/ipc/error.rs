use serde_json::json;

use crate::error::ScheduleError;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

/// Response for a failed domain operation. Conflicts carry their list in `details`.
pub fn domain_err(id: &str, e: &ScheduleError) -> serde_json::Value {
    match e {
        ScheduleError::Conflict(conflicts) => err(
            id,
            e.code(),
            e.to_string(),
            Some(json!({ "conflicts": conflicts })),
        ),
        ScheduleError::SlotTaken { table } => err(
            id,
            e.code(),
            "slot already taken; reload before trying again",
            Some(json!({ "table": table })),
        ),
        ScheduleError::Store(inner) => {
            tracing::error!(error = %inner, "store operation failed");
            err(id, e.code(), inner.to_string(), None)
        }
        _ => err(id, e.code(), e.to_string(), None),
    }
}

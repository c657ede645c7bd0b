use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::db_conn;
use crate::ipc::types::{AppState, Request};
use crate::schedule::Semester;
use serde_json::{json, Map, Value};

#[derive(Clone, Copy)]
enum SetupSection {
    Institution,
    Bookings,
}

impl SetupSection {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "institution" => Some(Self::Institution),
            "bookings" => Some(Self::Bookings),
            _ => None,
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Institution => "setup.institution",
            Self::Bookings => "setup.bookings",
        }
    }
}

fn default_section(section: SetupSection) -> Value {
    match section {
        SetupSection::Institution => json!({
            "schoolName": "",
            "hasNightShift": false,
            "defaultYear": null,
            "defaultSemester": "1"
        }),
        SetupSection::Bookings => json!({
            "weekDays": 5,
            "allowTeacherEdits": true
        }),
    }
}

/// Institution-wide switches read by the scheduling handlers.
#[derive(Clone, Debug)]
pub struct InstitutionSettings {
    pub has_night_shift: bool,
    pub default_year: Option<String>,
    pub default_semester: Semester,
}

#[derive(Clone, Debug)]
pub struct BookingSettings {
    pub week_days: u32,
    pub allow_teacher_edits: bool,
}

fn as_object_mut(value: &mut Value) -> Result<&mut Map<String, Value>, String> {
    value
        .as_object_mut()
        .ok_or_else(|| "internal setup object must be a JSON object".to_string())
}

fn parse_bool(v: &Value, key: &str) -> Result<bool, String> {
    v.as_bool().ok_or_else(|| format!("{} must be boolean", key))
}

fn parse_string_max(v: &Value, key: &str, max_len: usize) -> Result<String, String> {
    let s = v.as_str().ok_or_else(|| format!("{} must be string", key))?;
    let s = s.trim();
    if s.chars().count() > max_len {
        return Err(format!("{} length must be <= {}", key, max_len));
    }
    Ok(s.to_string())
}

fn merge_section_patch(
    section: SetupSection,
    current: &mut Value,
    patch: &Map<String, Value>,
) -> Result<(), String> {
    let obj = as_object_mut(current)?;
    for (k, v) in patch {
        match section {
            SetupSection::Institution => match k.as_str() {
                "schoolName" => {
                    obj.insert(k.clone(), Value::String(parse_string_max(v, k, 120)?));
                }
                "hasNightShift" => {
                    obj.insert(k.clone(), Value::Bool(parse_bool(v, k)?));
                }
                "defaultYear" => {
                    if v.is_null() {
                        obj.insert(k.clone(), Value::Null);
                        continue;
                    }
                    let year = parse_string_max(v, k, 4)?;
                    if year.len() != 4 || !year.bytes().all(|b| b.is_ascii_digit()) {
                        return Err("defaultYear must be a four-digit string".into());
                    }
                    obj.insert(k.clone(), Value::String(year));
                }
                "defaultSemester" => {
                    let s = parse_string_max(v, k, 1)?;
                    if Semester::parse(&s).is_none() {
                        return Err("defaultSemester must be one of: 1, 2".into());
                    }
                    obj.insert(k.clone(), Value::String(s));
                }
                _ => return Err(format!("unknown institution field: {}", k)),
            },
            SetupSection::Bookings => match k.as_str() {
                "weekDays" => {
                    let n = v
                        .as_i64()
                        .ok_or_else(|| format!("{} must be integer", k))?;
                    if n != 5 && n != 7 {
                        return Err("weekDays must be 5 or 7".into());
                    }
                    obj.insert(k.clone(), Value::from(n));
                }
                "allowTeacherEdits" => {
                    obj.insert(k.clone(), Value::Bool(parse_bool(v, k)?));
                }
                _ => return Err(format!("unknown bookings field: {}", k)),
            },
        }
    }
    Ok(())
}

fn load_section(conn: &rusqlite::Connection, section: SetupSection) -> anyhow::Result<Value> {
    let mut current = default_section(section);
    if let Some(saved) = db::settings_get_json(conn, section.key())? {
        if let Some(saved_obj) = saved.as_object() {
            // Best-effort apply: malformed historical values should not block startup.
            let _ = merge_section_patch(section, &mut current, saved_obj);
        }
    }
    Ok(current)
}

pub fn load_institution_settings(conn: &rusqlite::Connection) -> InstitutionSettings {
    let obj = load_section(conn, SetupSection::Institution)
        .unwrap_or_else(|_| default_section(SetupSection::Institution));
    InstitutionSettings {
        has_night_shift: obj
            .get("hasNightShift")
            .and_then(|v| v.as_bool())
            .unwrap_or(false),
        default_year: obj
            .get("defaultYear")
            .and_then(|v| v.as_str())
            .map(str::to_string),
        default_semester: obj
            .get("defaultSemester")
            .and_then(|v| v.as_str())
            .and_then(Semester::parse)
            .unwrap_or(Semester::First),
    }
}

pub fn load_booking_settings(conn: &rusqlite::Connection) -> BookingSettings {
    let obj = load_section(conn, SetupSection::Bookings)
        .unwrap_or_else(|_| default_section(SetupSection::Bookings));
    BookingSettings {
        week_days: obj
            .get("weekDays")
            .and_then(|v| v.as_u64())
            .map(|n| n as u32)
            .unwrap_or(5),
        allow_teacher_edits: obj
            .get("allowTeacherEdits")
            .and_then(|v| v.as_bool())
            .unwrap_or(true),
    }
}

fn handle_setup_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(&state.db, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let institution = match load_section(conn, SetupSection::Institution) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let bookings = match load_section(conn, SetupSection::Bookings) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    ok(
        &req.id,
        json!({
            "institution": institution,
            "bookings": bookings
        }),
    )
}

fn handle_setup_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(&state.db, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let Some(section_raw) = req.params.get("section").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing section", None);
    };
    let Some(section) = SetupSection::parse(section_raw) else {
        return err(&req.id, "bad_params", "unknown section", None);
    };
    let Some(patch_obj) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };

    let mut current = match load_section(conn, section) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if let Err(msg) = merge_section_patch(section, &mut current, patch_obj) {
        return err(&req.id, "bad_params", msg, None);
    }
    if let Err(e) = db::settings_set_json(conn, section.key(), &current) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    tracing::info!(section = section_raw, "settings updated");
    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "setup.get" => Some(handle_setup_get(state, req)),
        "setup.update" => Some(handle_setup_update(state, req)),
        _ => None,
    }
}

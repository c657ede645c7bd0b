use crate::error::ScheduleError;
use crate::ipc::error::{domain_err, err, ok};
use crate::ipc::helpers::{db_conn, optional_str, required_str};
use crate::ipc::types::{AppState, Request};
use rusqlite::OptionalExtension;
use serde_json::json;
use uuid::Uuid;

const NAME_MAX: usize = 120;

/// Lookup tables the schedule and bookings reference by id.
#[derive(Clone, Copy)]
enum Catalog {
    Teachers,
    Subjects,
    Classes,
    Resources,
}

impl Catalog {
    fn parse(prefix: &str) -> Option<Self> {
        match prefix {
            "teachers" => Some(Self::Teachers),
            "subjects" => Some(Self::Subjects),
            "classes" => Some(Self::Classes),
            "resources" => Some(Self::Resources),
            _ => None,
        }
    }

    fn table(self) -> &'static str {
        match self {
            Self::Teachers => "teachers",
            Self::Subjects => "subjects",
            Self::Classes => "classes",
            Self::Resources => "resources",
        }
    }

    fn id_param(self) -> &'static str {
        match self {
            Self::Teachers => "teacherId",
            Self::Subjects => "subjectId",
            Self::Classes => "classId",
            Self::Resources => "resourceId",
        }
    }

    fn singular(self) -> &'static str {
        match self {
            Self::Teachers => "teacher",
            Self::Subjects => "subject",
            Self::Classes => "class",
            Self::Resources => "resource",
        }
    }

    /// Optional second column and its wire name.
    fn extra(self) -> Option<(&'static str, &'static str)> {
        match self {
            Self::Teachers => Some(("email", "email")),
            Self::Subjects => None,
            Self::Classes => Some(("shift", "shift")),
            Self::Resources => Some(("kind", "kind")),
        }
    }
}

fn validate_extra(catalog: Catalog, value: Option<String>) -> Result<Option<String>, String> {
    match catalog {
        Catalog::Resources => match value.as_deref() {
            Some("room" | "lab" | "equipment") => Ok(value),
            Some(_) => Err("kind must be one of: room, lab, equipment".into()),
            None => Err("missing kind".into()),
        },
        Catalog::Classes => match value.as_deref() {
            None | Some("morning" | "afternoon" | "night") => Ok(value),
            Some(_) => Err("shift must be one of: morning, afternoon, night".into()),
        },
        Catalog::Teachers => match value.as_deref() {
            Some(email) if !email.contains('@') => Err("email must contain @".into()),
            _ => Ok(value),
        },
        Catalog::Subjects => Ok(None),
    }
}

fn handle_list(catalog: Catalog, state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ catalog.table(): [] }));
    };
    let extra_col = catalog.extra().map(|(col, _)| col).unwrap_or("NULL");
    let sql = format!(
        "SELECT id, name, {extra_col} FROM {} ORDER BY name",
        catalog.table()
    );
    let mut stmt = match conn.prepare(&sql) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map([], |row| {
            let id: String = row.get(0)?;
            let name: String = row.get(1)?;
            let extra: Option<String> = row.get(2)?;
            let mut item = json!({ "id": id, "name": name });
            if let Some((_, key)) = catalog.extra() {
                item[key] = json!(extra);
            }
            Ok(item)
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());
    match rows {
        Ok(items) => ok(&req.id, json!({ catalog.table(): items })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_create(catalog: Catalog, state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(&state.db, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let name = match required_str(req, "name") {
        Ok(v) => v,
        Err(e) => return e,
    };
    if name.chars().count() > NAME_MAX {
        return err(
            &req.id,
            "bad_params",
            format!("name length must be <= {}", NAME_MAX),
            None,
        );
    }
    let extra_raw = catalog.extra().and_then(|(_, key)| optional_str(req, key));
    let extra = match validate_extra(catalog, extra_raw) {
        Ok(v) => v,
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };

    let id = Uuid::new_v4().to_string();
    let res = match catalog.extra() {
        Some((col, _)) => conn.execute(
            &format!(
                "INSERT INTO {}(id, name, {col}) VALUES(?, ?, ?)",
                catalog.table()
            ),
            (&id, &name, &extra),
        ),
        None => conn.execute(
            &format!("INSERT INTO {}(id, name) VALUES(?, ?)", catalog.table()),
            (&id, &name),
        ),
    };
    if let Err(e) = res {
        return err(&req.id, "db_insert_failed", e.to_string(), None);
    }

    let mut result = json!({ catalog.id_param(): id, "name": name });
    if let Some((_, key)) = catalog.extra() {
        result[key] = json!(extra);
    }
    ok(&req.id, result)
}

fn handle_delete(catalog: Catalog, state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(&state.db, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let id = match required_str(req, catalog.id_param()) {
        Ok(v) => v,
        Err(e) => return e,
    };

    let exists: Option<i64> = match conn
        .query_row(
            &format!("SELECT 1 FROM {} WHERE id = ?", catalog.table()),
            [&id],
            |r| r.get(0),
        )
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if exists.is_none() {
        return err(
            &req.id,
            "not_found",
            format!("{} not found", catalog.singular()),
            None,
        );
    }

    // No ON DELETE CASCADE: rows still referenced by the schedule or bookings stay.
    if let Err(e) = conn.execute(
        &format!("DELETE FROM {} WHERE id = ?", catalog.table()),
        [&id],
    ) {
        return domain_err(&req.id, &ScheduleError::from_delete(catalog.singular(), e));
    }
    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let (prefix, action) = req.method.split_once('.')?;
    let catalog = Catalog::parse(prefix)?;
    match action {
        "list" => Some(handle_list(catalog, state, req)),
        "create" => Some(handle_create(catalog, state, req)),
        "delete" => Some(handle_delete(catalog, state, req)),
        _ => None,
    }
}

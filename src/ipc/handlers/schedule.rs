use crate::error::ScheduleError;
use crate::ipc::error::{domain_err, err, ok};
use crate::ipc::handlers::setup::load_institution_settings;
use crate::ipc::helpers::{db_conn, optional_str, parse_params, required_str};
use crate::ipc::types::{AppState, Request};
use crate::schedule::model::{deserialize_year, validate_year};
use crate::schedule::time_grid;
use crate::schedule::views::{filter_activities, filter_classes, teacher_week};
use crate::schedule::{
    ActivityCandidate, Candidate, NameIndex, NewClassAllocation, NewComplementaryAllocation,
    Semester, Weekday,
};
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::{json, Value};

/// `params.year`, or the institution's default year when omitted.
fn year_param(conn: &Connection, req: &Request) -> Result<String, Value> {
    let raw = match req.params.get("year") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        None | Some(Value::Null) => load_institution_settings(conn)
            .default_year
            .ok_or_else(|| err(&req.id, "bad_params", "missing year", None))?,
        Some(_) => return Err(err(&req.id, "bad_params", "year must be a string", None)),
    };
    validate_year(&raw).map_err(|e| domain_err(&req.id, &e))
}

fn semester_param(req: &Request, key: &str, default: Option<Semester>) -> Result<Semester, Value> {
    let raw = match req.params.get(key) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        None | Some(Value::Null) => {
            return default
                .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
        }
        Some(_) => return Err(err(&req.id, "bad_params", format!("{} must be 1 or 2", key), None)),
    };
    Semester::parse(&raw)
        .ok_or_else(|| err(&req.id, "bad_params", format!("{} must be 1 or 2", key), None))
}

fn default_semester(conn: &Connection) -> Option<Semester> {
    Some(load_institution_settings(conn).default_semester)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssignParams {
    class_id: String,
    subject_id: String,
    #[serde(default)]
    teacher_id: Option<String>,
    day_of_week: Weekday,
    time_slot_id: String,
    #[serde(deserialize_with = "deserialize_year")]
    year: String,
    semesters: Vec<Semester>,
    #[serde(default)]
    room: Option<String>,
}

fn handle_schedule_load(state: &mut AppState, req: &Request) -> Value {
    let AppState { db, schedule, .. } = state;
    let conn = match db_conn(db, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let year = match year_param(conn, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    if let Err(e) = schedule.refresh(conn, &year) {
        return domain_err(&req.id, &e);
    }
    ok(
        &req.id,
        json!({
            "year": schedule.loaded_year(),
            "classAllocations": schedule.class_allocations().len(),
            "activities": schedule.activities().len(),
        }),
    )
}

fn handle_schedule_list(state: &mut AppState, req: &Request) -> Value {
    let AppState { db, schedule, .. } = state;
    let conn = match db_conn(db, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let year = match year_param(conn, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let semester = match semester_param(req, "semester", default_semester(conn)) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let class_id = optional_str(req, "classId");
    let teacher_id = optional_str(req, "teacherId");
    if let Err(e) = schedule.ensure_year(conn, &year) {
        return domain_err(&req.id, &e);
    }

    let classes: Vec<_> =
        filter_classes(schedule, semester, class_id.as_deref(), teacher_id.as_deref()).collect();
    // Activities belong to teachers, not classes.
    let activities: Vec<_> = if class_id.is_some() && teacher_id.is_none() {
        Vec::new()
    } else {
        filter_activities(schedule, semester, teacher_id.as_deref()).collect()
    };
    ok(
        &req.id,
        json!({
            "classAllocations": classes,
            "activities": activities,
        }),
    )
}

fn handle_schedule_check_conflicts(state: &mut AppState, req: &Request) -> Value {
    let AppState { db, schedule, .. } = state;
    let conn = match db_conn(db, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let candidate: Candidate = match parse_params(req, Some("candidate")) {
        Ok(v) => v,
        Err(e) => return e,
    };
    if let Err(e) = schedule.ensure_year(conn, &candidate.year) {
        return domain_err(&req.id, &e);
    }
    let names = match NameIndex::load(conn) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let conflicts = schedule.check(&candidate, &names);
    ok(&req.id, json!({ "conflicts": conflicts }))
}

fn handle_schedule_assign(state: &mut AppState, req: &Request) -> Value {
    let AppState { db, schedule, .. } = state;
    let conn = match db_conn(db, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let params: AssignParams = match parse_params(req, None) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let mut semesters = params.semesters.clone();
    semesters.sort();
    semesters.dedup();
    let Some(&first) = semesters.first() else {
        return err(&req.id, "bad_params", "semesters must not be empty", None);
    };

    let base = NewClassAllocation {
        teacher_id: params.teacher_id,
        subject_id: params.subject_id,
        class_id: params.class_id,
        time_slot_id: params.time_slot_id,
        day_of_week: params.day_of_week,
        year: params.year,
        semester: first,
        room: params.room,
    };
    let base = match base.normalized() {
        Ok(v) => v,
        Err(e) => return domain_err(&req.id, &e),
    };

    if let Err(e) = schedule.ensure_year(conn, &base.year) {
        return domain_err(&req.id, &e);
    }
    let names = match NameIndex::load(conn) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let candidate = Candidate {
        teacher_id: base.teacher_id.clone(),
        class_id: base.class_id.clone(),
        day_of_week: base.day_of_week,
        time_slot_id: base.time_slot_id.clone(),
        year: base.year.clone(),
        semesters: semesters.clone(),
    };
    let conflicts = schedule.check(&candidate, &names);
    if !conflicts.is_empty() {
        tracing::info!(
            class_id = %base.class_id,
            conflicts = conflicts.len(),
            "assignment blocked by conflicts"
        );
        return domain_err(&req.id, &ScheduleError::Conflict(conflicts));
    }

    match schedule.add_class_semesters(conn, &base, &semesters) {
        Ok(saved) => ok(&req.id, json!({ "allocations": saved })),
        Err(e) => domain_err(&req.id, &e),
    }
}

fn handle_schedule_add_activity(state: &mut AppState, req: &Request) -> Value {
    let AppState { db, schedule, .. } = state;
    let conn = match db_conn(db, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let new: NewComplementaryAllocation = match parse_params(req, None) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let new = match new.normalized() {
        Ok(v) => v,
        Err(e) => return domain_err(&req.id, &e),
    };

    if let Err(e) = schedule.ensure_year(conn, &new.year) {
        return domain_err(&req.id, &e);
    }
    let names = match NameIndex::load(conn) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let candidate = ActivityCandidate {
        teacher_id: &new.teacher_id,
        day_of_week: new.day_of_week,
        time_slot_id: &new.time_slot_id,
        year: &new.year,
        semester: new.semester,
    };
    let conflicts = schedule.check_activity(&candidate, &names);
    if !conflicts.is_empty() {
        tracing::info!(
            teacher_id = %new.teacher_id,
            conflicts = conflicts.len(),
            "activity blocked by conflicts"
        );
        return domain_err(&req.id, &ScheduleError::Conflict(conflicts));
    }

    match schedule.add_activity(conn, &new) {
        Ok(a) => ok(&req.id, json!({ "activity": a })),
        Err(e) => domain_err(&req.id, &e),
    }
}

fn handle_schedule_remove(state: &mut AppState, req: &Request) -> Value {
    let AppState { db, schedule, .. } = state;
    let conn = match db_conn(db, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let id = match required_str(req, "allocationId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match schedule.remove(conn, &id) {
        Ok(removed) => ok(&req.id, json!({ "removed": removed })),
        Err(e) => domain_err(&req.id, &e),
    }
}

fn handle_schedule_remove_activity(state: &mut AppState, req: &Request) -> Value {
    let AppState { db, schedule, .. } = state;
    let conn = match db_conn(db, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let id = match required_str(req, "activityId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match schedule.remove_activity(conn, &id) {
        Ok(removed) => ok(&req.id, json!({ "removed": removed })),
        Err(e) => domain_err(&req.id, &e),
    }
}

fn handle_schedule_copy_semester(state: &mut AppState, req: &Request) -> Value {
    let AppState { db, schedule, .. } = state;
    let conn = match db_conn(db, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    // Overwrites the target semester, so the caller must say so explicitly.
    if req.params.get("confirm").and_then(|v| v.as_bool()) != Some(true) {
        return domain_err(
            &req.id,
            &ScheduleError::ConfirmationRequired(
                "copying replaces the target semester; pass confirm: true",
            ),
        );
    }
    let year = match year_param(conn, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let class_id = match required_str(req, "classId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let source = match semester_param(req, "sourceSemester", None) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let target = match semester_param(req, "targetSemester", None) {
        Ok(v) => v,
        Err(e) => return e,
    };

    match schedule.copy_semester(conn, &year, &class_id, source, target) {
        Ok(summary) => ok(&req.id, json!(summary)),
        Err(e) => domain_err(&req.id, &e),
    }
}

fn handle_schedule_teacher_week(state: &mut AppState, req: &Request) -> Value {
    let AppState { db, schedule, .. } = state;
    let conn = match db_conn(db, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let teacher_id = match required_str(req, "teacherId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let year = match year_param(conn, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let semester = match semester_param(req, "semester", default_semester(conn)) {
        Ok(v) => v,
        Err(e) => return e,
    };
    if let Err(e) = schedule.ensure_year(conn, &year) {
        return domain_err(&req.id, &e);
    }
    let all = match time_grid::load_slots(conn) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let slots = time_grid::visible_slots(&all, load_institution_settings(conn).has_night_shift);
    let rows = teacher_week(schedule, &slots, &teacher_id, semester);
    ok(
        &req.id,
        json!({
            "teacherId": teacher_id,
            "year": year,
            "semester": semester,
            "rows": rows,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "schedule.load" => Some(handle_schedule_load(state, req)),
        "schedule.list" => Some(handle_schedule_list(state, req)),
        "schedule.checkConflicts" => Some(handle_schedule_check_conflicts(state, req)),
        "schedule.assign" => Some(handle_schedule_assign(state, req)),
        "schedule.addActivity" => Some(handle_schedule_add_activity(state, req)),
        "schedule.remove" => Some(handle_schedule_remove(state, req)),
        "schedule.removeActivity" => Some(handle_schedule_remove_activity(state, req)),
        "schedule.copySemester" => Some(handle_schedule_copy_semester(state, req)),
        "schedule.teacherWeek" => Some(handle_schedule_teacher_week(state, req)),
        _ => None,
    }
}

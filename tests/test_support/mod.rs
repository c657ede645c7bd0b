#![allow(dead_code)]

use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

pub fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

pub fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_escolad");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn escolad");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

/// Sends one request and returns the whole response envelope.
pub fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({ "id": id, "method": method, "params": params });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

/// Like `request`, but asserts success and returns `result`.
pub fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

pub fn error_code(value: &serde_json::Value) -> Option<&str> {
    value.pointer("/error/code").and_then(|v| v.as_str())
}

pub fn db_path(workspace: &PathBuf) -> PathBuf {
    workspace.join("escola.sqlite3")
}

pub struct Seed {
    pub ana: String,
    pub bruno: String,
    pub class_7a: String,
    pub class_7b: String,
    pub math: String,
    pub lab: String,
    pub first_slot: String,
    pub night_slot: String,
}

/// Two teachers, two classes, one subject, one lab and a morning plus a night slot.
pub fn seed_catalog(stdin: &mut ChildStdin, reader: &mut BufReader<ChildStdout>) -> Seed {
    let id = |v: &serde_json::Value, key: &str| {
        v.get(key)
            .and_then(|v| v.as_str())
            .unwrap_or_else(|| panic!("missing {} in {}", key, v))
            .to_string()
    };
    let ana = request_ok(stdin, reader, "seed-1", "teachers.create", json!({ "name": "Ana" }));
    let bruno = request_ok(stdin, reader, "seed-2", "teachers.create", json!({ "name": "Bruno" }));
    let c7a = request_ok(stdin, reader, "seed-3", "classes.create", json!({ "name": "7A", "shift": "morning" }));
    let c7b = request_ok(stdin, reader, "seed-4", "classes.create", json!({ "name": "7B" }));
    let math = request_ok(stdin, reader, "seed-5", "subjects.create", json!({ "name": "Matemática" }));
    let lab = request_ok(
        stdin,
        reader,
        "seed-6",
        "resources.create",
        json!({ "name": "Laboratório 1", "kind": "lab" }),
    );
    let first = request_ok(
        stdin,
        reader,
        "seed-7",
        "timeSlots.create",
        json!({ "label": "1ª Aula", "startTime": "08:00", "endTime": "08:50", "kind": "class" }),
    );
    let night = request_ok(
        stdin,
        reader,
        "seed-8",
        "timeSlots.create",
        json!({ "label": "Noturno 1", "startTime": "19:00", "endTime": "19:45", "kind": "class" }),
    );
    Seed {
        ana: id(&ana, "teacherId"),
        bruno: id(&bruno, "teacherId"),
        class_7a: id(&c7a, "classId"),
        class_7b: id(&c7b, "classId"),
        math: id(&math, "subjectId"),
        lab: id(&lab, "resourceId"),
        first_slot: id(&first, "timeSlotId"),
        night_slot: id(&night, "timeSlotId"),
    }
}

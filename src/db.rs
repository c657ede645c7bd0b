use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

pub const DB_FILE_NAME: &str = "escola.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(db_path)?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS teachers(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS subjects(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS classes(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL
        )",
        [],
    )?;
    // Older workspaces predate the shift column.
    ensure_classes_shift(conn)?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS resources(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            kind TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS time_slots(
            id TEXT PRIMARY KEY,
            label TEXT NOT NULL,
            start_time TEXT NOT NULL,
            end_time TEXT NOT NULL,
            kind TEXT NOT NULL,
            position INTEGER NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_time_slots_position ON time_slots(position)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS class_allocations(
            id TEXT PRIMARY KEY,
            teacher_id TEXT,
            subject_id TEXT NOT NULL,
            class_id TEXT NOT NULL,
            time_slot_id TEXT NOT NULL,
            day_of_week TEXT NOT NULL,
            year TEXT NOT NULL,
            semester TEXT NOT NULL,
            room TEXT,
            FOREIGN KEY(teacher_id) REFERENCES teachers(id),
            FOREIGN KEY(subject_id) REFERENCES subjects(id),
            FOREIGN KEY(class_id) REFERENCES classes(id),
            FOREIGN KEY(time_slot_id) REFERENCES time_slots(id),
            UNIQUE(class_id, time_slot_id, day_of_week, year, semester)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_class_allocations_year ON class_allocations(year)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_class_allocations_teacher
         ON class_allocations(teacher_id, day_of_week, time_slot_id, year, semester)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS complementary_allocations(
            id TEXT PRIMARY KEY,
            teacher_id TEXT NOT NULL,
            day_of_week TEXT NOT NULL,
            time_slot_id TEXT NOT NULL,
            year TEXT NOT NULL,
            semester TEXT NOT NULL,
            activity TEXT NOT NULL,
            FOREIGN KEY(teacher_id) REFERENCES teachers(id),
            FOREIGN KEY(time_slot_id) REFERENCES time_slots(id)
        )",
        [],
    )?;
    // One activity per teacher and slot; backs up the pre-write duplicate check.
    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_complementary_allocations_slot
         ON complementary_allocations(teacher_id, time_slot_id, day_of_week, year, semester)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_complementary_allocations_year
         ON complementary_allocations(year)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS resource_bookings(
            id TEXT PRIMARY KEY,
            resource_id TEXT NOT NULL,
            time_slot_id TEXT NOT NULL,
            booking_date TEXT NOT NULL,
            class_id TEXT NOT NULL,
            subject_id TEXT NOT NULL,
            professional_id TEXT NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY(resource_id) REFERENCES resources(id),
            FOREIGN KEY(time_slot_id) REFERENCES time_slots(id),
            FOREIGN KEY(class_id) REFERENCES classes(id),
            FOREIGN KEY(subject_id) REFERENCES subjects(id),
            FOREIGN KEY(professional_id) REFERENCES teachers(id),
            UNIQUE(resource_id, time_slot_id, booking_date)
        )",
        [],
    )?;
    ensure_resource_bookings_description(conn)?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_resource_bookings_resource_date
         ON resource_bookings(resource_id, booking_date)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS calendar_events(
            id TEXT PRIMARY KEY,
            event_date TEXT NOT NULL,
            title TEXT NOT NULL,
            kind TEXT NOT NULL,
            description TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_calendar_events_date ON calendar_events(event_date)",
        [],
    )?;

    Ok(())
}

fn ensure_classes_shift(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "classes", "shift")? {
        return Ok(());
    }
    conn.execute("ALTER TABLE classes ADD COLUMN shift TEXT", [])?;
    Ok(())
}

fn ensure_resource_bookings_description(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "resource_bookings", "description")? {
        return Ok(());
    }
    conn.execute(
        "ALTER TABLE resource_bookings ADD COLUMN description TEXT",
        [],
    )?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

pub fn settings_get_json(
    conn: &Connection,
    key: &str,
) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value_json FROM settings WHERE key = ?",
            [key],
            |r| r.get(0),
        )
        .optional()?;
    match raw {
        Some(s) => Ok(Some(serde_json::from_str(&s)?)),
        None => Ok(None),
    }
}

pub fn settings_set_json(
    conn: &Connection,
    key: &str,
    value: &serde_json::Value,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}

/// True for UNIQUE / PRIMARY KEY constraint failures.
pub fn is_unique_violation(e: &rusqlite::Error) -> bool {
    match e {
        rusqlite::Error::SqliteFailure(f, _) => {
            f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
        }
        _ => false,
    }
}

pub fn is_foreign_key_violation(e: &rusqlite::Error) -> bool {
    match e {
        rusqlite::Error::SqliteFailure(f, _) => {
            f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY
        }
        _ => false,
    }
}

#[cfg(test)]
pub fn open_in_memory() -> Connection {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    init_schema(&conn).expect("init schema");
    conn
}

use chrono::{NaiveTime, Timelike};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, ScheduleError};

/// Slots starting at or after this hour belong to the night shift.
pub const NIGHT_SHIFT_START_HOUR: u32 = 18;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotKind {
    Class,
    Break,
    Lunch,
}

impl SlotKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Class => "class",
            Self::Break => "break",
            Self::Lunch => "lunch",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "class" => Some(Self::Class),
            "break" => Some(Self::Break),
            "lunch" => Some(Self::Lunch),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSlot {
    pub id: String,
    pub label: String,
    pub start_time: String,
    pub end_time: String,
    pub kind: SlotKind,
    pub position: i64,
    pub is_night: bool,
}

impl TimeSlot {
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        start_time: impl Into<String>,
        end_time: impl Into<String>,
        kind: SlotKind,
        position: i64,
    ) -> Self {
        let start_time = start_time.into();
        let is_night = parse_hhmm(&start_time)
            .map(|t| t.hour() >= NIGHT_SHIFT_START_HOUR)
            .unwrap_or(false);
        Self {
            id: id.into(),
            label: label.into(),
            start_time,
            end_time: end_time.into(),
            kind,
            position,
            is_night,
        }
    }

    /// Display form used in grids and conflict reports: `1ª Aula (08:00 - 08:50)`.
    pub fn time_label(&self) -> String {
        format!("{} ({} - {})", self.label, self.start_time, self.end_time)
    }

    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        let kind_raw: String = row.get(4)?;
        let kind = SlotKind::parse(&kind_raw).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                4,
                rusqlite::types::Type::Text,
                format!("unknown slot kind: {kind_raw}").into(),
            )
        })?;
        Ok(Self::new(
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            kind,
            row.get(5)?,
        ))
    }
}

pub fn parse_hhmm(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M").ok()
}

/// Slots shown for the institution's shift configuration.
///
/// Without a night shift every slot starting at 18:00 or later is dropped,
/// whatever its kind. Input order is kept.
pub fn visible_slots(all: &[TimeSlot], has_night_shift: bool) -> Vec<TimeSlot> {
    if has_night_shift {
        return all.to_vec();
    }
    all.iter().filter(|s| !s.is_night).cloned().collect()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTimeSlot {
    pub label: String,
    pub start_time: String,
    pub end_time: String,
    pub kind: SlotKind,
}

pub fn load_slots(conn: &Connection) -> rusqlite::Result<Vec<TimeSlot>> {
    let mut stmt = conn.prepare(
        "SELECT id, label, start_time, end_time, kind, position
         FROM time_slots
         ORDER BY position, id",
    )?;
    let rows = stmt.query_map([], TimeSlot::from_row)?;
    rows.collect()
}

pub fn create_slot(conn: &Connection, new: &NewTimeSlot) -> Result<TimeSlot> {
    let label = new.label.trim();
    if label.is_empty() {
        return Err(ScheduleError::invalid("label must not be empty"));
    }
    let start = parse_hhmm(&new.start_time)
        .ok_or_else(|| ScheduleError::invalid("startTime must be HH:MM"))?;
    let end = parse_hhmm(&new.end_time)
        .ok_or_else(|| ScheduleError::invalid("endTime must be HH:MM"))?;
    if end <= start {
        return Err(ScheduleError::invalid("endTime must be after startTime"));
    }

    let position: i64 = conn.query_row(
        "SELECT COALESCE(MAX(position) + 1, 0) FROM time_slots",
        [],
        |r| r.get(0),
    )?;
    let slot = TimeSlot::new(
        Uuid::new_v4().to_string(),
        label,
        start.format("%H:%M").to_string(),
        end.format("%H:%M").to_string(),
        new.kind,
        position,
    );
    conn.execute(
        "INSERT INTO time_slots(id, label, start_time, end_time, kind, position)
         VALUES(?, ?, ?, ?, ?, ?)",
        params![
            slot.id,
            slot.label,
            slot.start_time,
            slot.end_time,
            slot.kind.as_str(),
            slot.position
        ],
    )
    .map_err(|e| ScheduleError::from_write("time_slots", e))?;
    Ok(slot)
}

/// Rewrites positions to follow `ordered_ids`, which must list every slot exactly once.
pub fn reorder_slots(conn: &Connection, ordered_ids: &[String]) -> Result<()> {
    let current = load_slots(conn)?;
    let mut expected: Vec<&str> = current.iter().map(|s| s.id.as_str()).collect();
    let mut given: Vec<&str> = ordered_ids.iter().map(|s| s.as_str()).collect();
    expected.sort_unstable();
    given.sort_unstable();
    if expected != given {
        return Err(ScheduleError::invalid(
            "timeSlotIds must be a permutation of all existing slots",
        ));
    }

    let tx = conn.unchecked_transaction()?;
    for (i, id) in ordered_ids.iter().enumerate() {
        tx.execute(
            "UPDATE time_slots SET position = ? WHERE id = ?",
            params![i as i64, id],
        )?;
    }
    tx.commit()?;
    Ok(())
}

pub fn delete_slot(conn: &Connection, id: &str) -> Result<bool> {
    let exists: Option<i64> = conn
        .query_row("SELECT 1 FROM time_slots WHERE id = ?", [id], |r| r.get(0))
        .optional()?;
    if exists.is_none() {
        return Ok(false);
    }
    conn.execute("DELETE FROM time_slots WHERE id = ?", [id])
        .map_err(|e| ScheduleError::from_delete("time slot", e))?;
    Ok(true)
}

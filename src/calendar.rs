use chrono::{Datelike, NaiveDate, Weekday as ChronoWeekday};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, ScheduleError};

/// Phrase the user must type before a whole year of events is wiped.
pub const RESET_CONFIRMATION_PHRASE: &str = "RESETAR CALENDARIO";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// School day with a special note.
    Letivo,
    Feriado,
    Recesso,
    Evento,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Letivo => "letivo",
            Self::Feriado => "feriado",
            Self::Recesso => "recesso",
            Self::Evento => "evento",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "letivo" => Some(Self::Letivo),
            "feriado" => Some(Self::Feriado),
            "recesso" => Some(Self::Recesso),
            "evento" => Some(Self::Evento),
            _ => None,
        }
    }

    /// No classes happen on these days.
    pub fn suspends_classes(self) -> bool {
        matches!(self, Self::Feriado | Self::Recesso)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub id: String,
    pub date: NaiveDate,
    pub title: String,
    pub kind: EventKind,
    pub description: Option<String>,
}

impl CalendarEvent {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        let kind_raw: String = row.get(3)?;
        let kind = EventKind::parse(&kind_raw).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                3,
                rusqlite::types::Type::Text,
                format!("unknown event kind: {kind_raw}").into(),
            )
        })?;
        Ok(Self {
            id: row.get(0)?,
            date: row.get(1)?,
            title: row.get(2)?,
            kind,
            description: row.get(4)?,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCalendarEvent {
    pub date: NaiveDate,
    pub title: String,
    pub kind: EventKind,
    #[serde(default)]
    pub description: Option<String>,
}

fn year_bounds(year: i32) -> Result<(NaiveDate, NaiveDate)> {
    let start = NaiveDate::from_ymd_opt(year, 1, 1)
        .ok_or_else(|| ScheduleError::invalid("year out of range"))?;
    let end = NaiveDate::from_ymd_opt(year, 12, 31)
        .ok_or_else(|| ScheduleError::invalid("year out of range"))?;
    Ok((start, end))
}

fn month_bounds(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate)> {
    let start = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| ScheduleError::invalid("month must be in 1..=12"))?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .ok_or_else(|| ScheduleError::invalid("year out of range"))?;
    Ok((start, next.pred_opt().unwrap_or(start)))
}

pub fn list_events(conn: &Connection, year: i32, month: Option<u32>) -> Result<Vec<CalendarEvent>> {
    let (start, end) = match month {
        Some(m) => month_bounds(year, m)?,
        None => year_bounds(year)?,
    };
    let mut stmt = conn.prepare(
        "SELECT id, event_date, title, kind, description
         FROM calendar_events
         WHERE event_date >= ? AND event_date <= ?
         ORDER BY event_date, title",
    )?;
    let rows = stmt.query_map(params![start, end], CalendarEvent::from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn create_event(conn: &Connection, new: &NewCalendarEvent) -> Result<CalendarEvent> {
    let title = new.title.trim();
    if title.is_empty() {
        return Err(ScheduleError::invalid("title must not be empty"));
    }
    let event = CalendarEvent {
        id: Uuid::new_v4().to_string(),
        date: new.date,
        title: title.to_string(),
        kind: new.kind,
        description: new
            .description
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
    };
    conn.execute(
        "INSERT INTO calendar_events(id, event_date, title, kind, description)
         VALUES(?, ?, ?, ?, ?)",
        params![
            event.id,
            event.date,
            event.title,
            event.kind.as_str(),
            event.description
        ],
    )
    .map_err(|e| ScheduleError::from_write("calendar_events", e))?;
    Ok(event)
}

pub fn delete_event(conn: &Connection, id: &str) -> Result<bool> {
    Ok(conn.execute("DELETE FROM calendar_events WHERE id = ?", [id])? > 0)
}

/// Deletes every event of `year`. Refused unless `confirmation` is the exact phrase.
pub fn reset_year(conn: &Connection, year: i32, confirmation: &str) -> Result<usize> {
    if confirmation != RESET_CONFIRMATION_PHRASE {
        return Err(ScheduleError::ConfirmationRequired(
            "type the confirmation phrase exactly to reset the calendar",
        ));
    }
    let (start, end) = year_bounds(year)?;
    let n = conn.execute(
        "DELETE FROM calendar_events WHERE event_date >= ? AND event_date <= ?",
        params![start, end],
    )?;
    tracing::warn!(year, deleted = n, "academic calendar reset");
    Ok(n)
}

/// Weekdays of the month not suspended by a holiday or recess.
pub fn school_days(year: i32, month: u32, events: &[CalendarEvent]) -> Result<Vec<NaiveDate>> {
    let (start, end) = month_bounds(year, month)?;
    Ok(start
        .iter_days()
        .take_while(|d| *d <= end)
        .filter(|d| !matches!(d.weekday(), ChronoWeekday::Sat | ChronoWeekday::Sun))
        .filter(|d| {
            !events
                .iter()
                .any(|e| e.date == *d && e.kind.suspends_classes())
        })
        .collect())
}

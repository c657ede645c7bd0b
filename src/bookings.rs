//! Bookings of rooms, labs and equipment against concrete dates.
//!
//! A cell is (resource, slot, date). The store's unique key keeps each cell to one
//! booking; a losing writer gets `SlotTaken` and must re-fetch the week.

use chrono::{Datelike, Duration, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, ScheduleError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Coordinator,
    Teacher,
}

/// Who is asking to change a booking.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    pub professional_id: String,
    pub role: Role,
}

impl Actor {
    fn owns(&self, booking: &ResourceBooking) -> bool {
        self.professional_id == booking.professional_id
    }

    /// Field edits: the owner or an admin.
    pub fn may_edit(&self, booking: &ResourceBooking) -> bool {
        self.role == Role::Admin || self.owns(booking)
    }

    /// Removal: the owner, an admin or a coordinator.
    pub fn may_delete(&self, booking: &ResourceBooking) -> bool {
        matches!(self.role, Role::Admin | Role::Coordinator) || self.owns(booking)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceBooking {
    pub id: String,
    pub resource_id: String,
    pub time_slot_id: String,
    pub date: NaiveDate,
    pub class_id: String,
    pub subject_id: String,
    pub professional_id: String,
    pub description: Option<String>,
    pub created_at: String,
}

const BOOKING_COLUMNS: &str = "id, resource_id, time_slot_id, booking_date, class_id, subject_id, professional_id, description, created_at";

impl ResourceBooking {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            resource_id: row.get(1)?,
            time_slot_id: row.get(2)?,
            date: row.get(3)?,
            class_id: row.get(4)?,
            subject_id: row.get(5)?,
            professional_id: row.get(6)?,
            description: row.get(7)?,
            created_at: row.get(8)?,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBooking {
    pub resource_id: String,
    pub time_slot_id: String,
    pub date: NaiveDate,
    pub class_id: String,
    pub subject_id: String,
    pub professional_id: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Field edits on an existing booking. An empty description clears it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingPatch {
    #[serde(default)]
    pub class_id: Option<String>,
    #[serde(default)]
    pub subject_id: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellState<'a> {
    Empty,
    Booked(&'a ResourceBooking),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeekWindow {
    pub resource_id: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl WeekWindow {
    fn contains(&self, resource_id: &str, date: NaiveDate) -> bool {
        self.resource_id == resource_id && self.start <= date && date <= self.end
    }
}

/// Monday of `date`'s week through the `days`-th day (5 = Friday, 7 = Sunday).
pub fn week_window(date: NaiveDate, days: u32) -> (NaiveDate, NaiveDate) {
    let monday = date - Duration::days(date.weekday().num_days_from_monday() as i64);
    let span = days.clamp(1, 7) as i64 - 1;
    (monday, monday + Duration::days(span))
}

pub fn fetch_week(
    conn: &Connection,
    resource_id: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<ResourceBooking>> {
    if end < start {
        return Err(ScheduleError::invalid("weekEnd must not precede weekStart"));
    }
    let sql = format!(
        "SELECT {BOOKING_COLUMNS}
         FROM resource_bookings
         WHERE resource_id = ? AND booking_date >= ? AND booking_date <= ?
         ORDER BY booking_date, time_slot_id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![resource_id, start, end], ResourceBooking::from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

fn fetch_one(conn: &Connection, id: &str) -> Result<Option<ResourceBooking>> {
    let sql = format!("SELECT {BOOKING_COLUMNS} FROM resource_bookings WHERE id = ?");
    Ok(conn
        .query_row(&sql, [id], ResourceBooking::from_row)
        .optional()?)
}

/// Cached bookings of the week currently on screen.
#[derive(Debug, Default)]
pub struct BookingLedger {
    window: Option<WeekWindow>,
    bookings: Vec<ResourceBooking>,
}

impl BookingLedger {
    pub fn window(&self) -> Option<&WeekWindow> {
        self.window.as_ref()
    }

    pub fn bookings(&self) -> &[ResourceBooking] {
        &self.bookings
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Fetches one resource's bookings in `[start, end]` and makes that the cached window.
    pub fn list_for_week(
        &mut self,
        conn: &Connection,
        resource_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<&[ResourceBooking]> {
        let bookings = fetch_week(conn, resource_id, start, end)?;
        self.window = Some(WeekWindow {
            resource_id: resource_id.to_string(),
            start,
            end,
        });
        self.bookings = bookings;
        Ok(&self.bookings)
    }

    /// Re-fetches the cached window, if any.
    pub fn reload(&mut self, conn: &Connection) -> Result<()> {
        if let Some(w) = self.window.clone() {
            self.bookings = fetch_week(conn, &w.resource_id, w.start, w.end)?;
            tracing::debug!(
                resource_id = %w.resource_id,
                bookings = self.bookings.len(),
                "booking cache refreshed"
            );
        }
        Ok(())
    }

    pub fn cell(&self, time_slot_id: &str, date: NaiveDate) -> CellState<'_> {
        self.bookings
            .iter()
            .find(|b| b.time_slot_id == time_slot_id && b.date == date)
            .map_or(CellState::Empty, CellState::Booked)
    }

    /// Empty -> Booked. A taken cell fails with `SlotTaken` and nothing is written.
    pub fn create(&mut self, conn: &Connection, new: &NewBooking) -> Result<ResourceBooking> {
        for (name, v) in [
            ("resourceId", &new.resource_id),
            ("timeSlotId", &new.time_slot_id),
            ("classId", &new.class_id),
            ("subjectId", &new.subject_id),
            ("professionalId", &new.professional_id),
        ] {
            if v.trim().is_empty() {
                return Err(ScheduleError::invalid(format!("missing {name}")));
            }
        }

        let booking = ResourceBooking {
            id: Uuid::new_v4().to_string(),
            resource_id: new.resource_id.trim().to_string(),
            time_slot_id: new.time_slot_id.trim().to_string(),
            date: new.date,
            class_id: new.class_id.trim().to_string(),
            subject_id: new.subject_id.trim().to_string(),
            professional_id: new.professional_id.trim().to_string(),
            description: new
                .description
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            created_at: Utc::now().to_rfc3339(),
        };
        let inserted = conn.execute(
            "INSERT INTO resource_bookings(
                id, resource_id, time_slot_id, booking_date, class_id, subject_id,
                professional_id, description, created_at
             ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                booking.id,
                booking.resource_id,
                booking.time_slot_id,
                booking.date,
                booking.class_id,
                booking.subject_id,
                booking.professional_id,
                booking.description,
                booking.created_at
            ],
        );
        if let Err(e) = inserted {
            let e = ScheduleError::from_write("resource_bookings", e);
            if matches!(e, ScheduleError::SlotTaken { .. }) {
                tracing::info!(
                    resource_id = %booking.resource_id,
                    date = %booking.date,
                    time_slot_id = %booking.time_slot_id,
                    "booking rejected: slot already taken"
                );
            }
            return Err(e);
        }

        if self
            .window
            .as_ref()
            .is_some_and(|w| w.contains(&booking.resource_id, booking.date))
        {
            self.bookings.push(booking.clone());
        }
        Ok(booking)
    }

    /// In-place field edit; only the owner or an admin may do it.
    pub fn update(
        &mut self,
        conn: &Connection,
        id: &str,
        patch: &BookingPatch,
        actor: &Actor,
    ) -> Result<ResourceBooking> {
        let Some(mut booking) = fetch_one(conn, id)? else {
            return Err(ScheduleError::NotFound("booking"));
        };
        if !actor.may_edit(&booking) {
            return Err(ScheduleError::Forbidden(
                "only the booking owner or an administrator may edit it",
            ));
        }
        if let Some(class_id) = patch.class_id.as_deref().map(str::trim) {
            if class_id.is_empty() {
                return Err(ScheduleError::invalid("classId must not be empty"));
            }
            booking.class_id = class_id.to_string();
        }
        if let Some(subject_id) = patch.subject_id.as_deref().map(str::trim) {
            if subject_id.is_empty() {
                return Err(ScheduleError::invalid("subjectId must not be empty"));
            }
            booking.subject_id = subject_id.to_string();
        }
        if let Some(description) = patch.description.as_deref().map(str::trim) {
            booking.description = (!description.is_empty()).then(|| description.to_string());
        }

        conn.execute(
            "UPDATE resource_bookings SET class_id = ?, subject_id = ?, description = ? WHERE id = ?",
            params![booking.class_id, booking.subject_id, booking.description, booking.id],
        )
        .map_err(|e| ScheduleError::from_write("resource_bookings", e))?;

        if let Some(cached) = self.bookings.iter_mut().find(|b| b.id == booking.id) {
            *cached = booking.clone();
        }
        Ok(booking)
    }

    /// Booked -> Empty. Deleting an unknown id is a no-op returning false.
    pub fn delete(&mut self, conn: &Connection, id: &str, actor: &Actor) -> Result<bool> {
        let Some(booking) = fetch_one(conn, id)? else {
            return Ok(false);
        };
        if !actor.may_delete(&booking) {
            return Err(ScheduleError::Forbidden(
                "only the booking owner or staff may delete it",
            ));
        }
        let n = conn.execute("DELETE FROM resource_bookings WHERE id = ?", [id])?;
        self.bookings.retain(|b| b.id != id);
        Ok(n > 0)
    }
}

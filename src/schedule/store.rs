use rusqlite::{params, Connection};
use serde::Serialize;
use uuid::Uuid;

use super::conflict::{
    detect_activity_conflicts, detect_conflicts, ActivityCandidate, Candidate, Conflict,
    NameIndex,
};
use super::model::{
    ClassAllocation, ComplementaryAllocation, NewClassAllocation, NewComplementaryAllocation,
    Semester, CLASS_ALLOCATION_COLUMNS, COMPLEMENTARY_COLUMNS,
};
use crate::error::{Result, ScheduleError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CopySummary {
    pub deleted: usize,
    pub copied: usize,
}

/// In-memory view of one year's class and complementary allocations.
///
/// The database is the source of truth. The cache is only ever replaced wholesale by
/// `refresh`, apart from the read-after-write patching done by the mutators.
#[derive(Debug, Default)]
pub struct AllocationStore {
    year: Option<String>,
    classes: Vec<ClassAllocation>,
    activities: Vec<ComplementaryAllocation>,
}

impl AllocationStore {
    pub fn loaded_year(&self) -> Option<&str> {
        self.year.as_deref()
    }

    pub fn class_allocations(&self) -> &[ClassAllocation] {
        &self.classes
    }

    pub fn activities(&self) -> &[ComplementaryAllocation] {
        &self.activities
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Replaces the cache with every row of `year` (both semesters).
    pub fn refresh(&mut self, conn: &Connection, year: &str) -> Result<()> {
        let classes = {
            let sql = format!(
                "SELECT {CLASS_ALLOCATION_COLUMNS}
                 FROM class_allocations
                 WHERE year = ?
                 ORDER BY semester, class_id, day_of_week, time_slot_id"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([year], ClassAllocation::from_row)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        };
        let activities = {
            let sql = format!(
                "SELECT {COMPLEMENTARY_COLUMNS}
                 FROM complementary_allocations
                 WHERE year = ?
                 ORDER BY semester, teacher_id, day_of_week, time_slot_id"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([year], ComplementaryAllocation::from_row)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        };

        tracing::debug!(
            year,
            classes = classes.len(),
            activities = activities.len(),
            "allocation cache refreshed"
        );
        self.year = Some(year.to_string());
        self.classes = classes;
        self.activities = activities;
        Ok(())
    }

    /// Loads `year` unless it is already the cached year.
    pub fn ensure_year(&mut self, conn: &Connection, year: &str) -> Result<()> {
        if self.year.as_deref() == Some(year) {
            return Ok(());
        }
        self.refresh(conn, year)
    }

    /// Re-fetches whatever year is cached; no-op when nothing is loaded.
    pub fn reload(&mut self, conn: &Connection) -> Result<()> {
        match self.year.clone() {
            Some(year) => self.refresh(conn, &year),
            None => Ok(()),
        }
    }

    pub fn check(&self, candidate: &Candidate, names: &NameIndex) -> Vec<Conflict> {
        detect_conflicts(candidate, &self.classes, &self.activities, names)
    }

    pub fn check_activity(
        &self,
        candidate: &ActivityCandidate<'_>,
        names: &NameIndex,
    ) -> Vec<Conflict> {
        detect_activity_conflicts(candidate, &self.classes, &self.activities, names)
    }

    /// Upserts on (class, slot, weekday, year, semester); the later write wins.
    ///
    /// Does not check conflicts. Callers run `check` first.
    pub fn add_class(
        &mut self,
        conn: &Connection,
        new: &NewClassAllocation,
    ) -> Result<ClassAllocation> {
        conn.execute(
            "INSERT INTO class_allocations(
                id, teacher_id, subject_id, class_id, time_slot_id, day_of_week, year, semester, room
             ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(class_id, time_slot_id, day_of_week, year, semester) DO UPDATE SET
                teacher_id = excluded.teacher_id,
                subject_id = excluded.subject_id,
                room = excluded.room",
            params![
                Uuid::new_v4().to_string(),
                new.teacher_id,
                new.subject_id,
                new.class_id,
                new.time_slot_id,
                new.day_of_week,
                new.year,
                new.semester,
                new.room
            ],
        )
        .map_err(|e| ScheduleError::from_write("class_allocations", e))?;

        let sql = format!(
            "SELECT {CLASS_ALLOCATION_COLUMNS}
             FROM class_allocations
             WHERE class_id = ? AND time_slot_id = ? AND day_of_week = ? AND year = ? AND semester = ?"
        );
        let stored = conn.query_row(
            &sql,
            params![
                new.class_id,
                new.time_slot_id,
                new.day_of_week,
                new.year,
                new.semester
            ],
            ClassAllocation::from_row,
        )?;

        if self.year.as_deref() == Some(new.year.as_str()) {
            match self.classes.iter_mut().find(|a| a.same_cell(new)) {
                Some(slot) => *slot = stored.clone(),
                None => self.classes.push(stored.clone()),
            }
        }
        Ok(stored)
    }

    /// Upserts the same class cell into each semester, all or nothing.
    pub fn add_class_semesters(
        &mut self,
        conn: &Connection,
        base: &NewClassAllocation,
        semesters: &[Semester],
    ) -> Result<Vec<ClassAllocation>> {
        let tx = conn.unchecked_transaction()?;
        let mut saved = Vec::with_capacity(semesters.len());
        for &semester in semesters {
            let new = NewClassAllocation {
                semester,
                ..base.clone()
            };
            match self.add_class(&tx, &new) {
                Ok(a) => saved.push(a),
                Err(e) => {
                    drop(tx);
                    // The rolled-back rows may already be patched into the cache.
                    if let Err(reload) = self.reload(conn) {
                        tracing::warn!(error = %reload, "cache reload after rollback failed");
                    }
                    return Err(e);
                }
            }
        }
        tx.commit()?;
        Ok(saved)
    }

    /// Plain insert. A second activity for the same teacher and slot is refused by the store.
    pub fn add_activity(
        &mut self,
        conn: &Connection,
        new: &NewComplementaryAllocation,
    ) -> Result<ComplementaryAllocation> {
        let stored = ComplementaryAllocation {
            id: Uuid::new_v4().to_string(),
            teacher_id: new.teacher_id.clone(),
            day_of_week: new.day_of_week,
            time_slot_id: new.time_slot_id.clone(),
            year: new.year.clone(),
            semester: new.semester,
            activity: new.activity.clone(),
        };
        conn.execute(
            "INSERT INTO complementary_allocations(
                id, teacher_id, day_of_week, time_slot_id, year, semester, activity
             ) VALUES(?, ?, ?, ?, ?, ?, ?)",
            params![
                stored.id,
                stored.teacher_id,
                stored.day_of_week,
                stored.time_slot_id,
                stored.year,
                stored.semester,
                stored.activity
            ],
        )
        .map_err(|e| ScheduleError::from_write("complementary_allocations", e))?;

        if self.year.as_deref() == Some(stored.year.as_str()) {
            self.activities.push(stored.clone());
        }
        Ok(stored)
    }

    /// Deletes a class allocation. Returns false when the id was already gone.
    pub fn remove(&mut self, conn: &Connection, id: &str) -> Result<bool> {
        let n = conn.execute("DELETE FROM class_allocations WHERE id = ?", [id])?;
        self.classes.retain(|a| a.id != id);
        Ok(n > 0)
    }

    pub fn remove_activity(&mut self, conn: &Connection, id: &str) -> Result<bool> {
        let n = conn.execute("DELETE FROM complementary_allocations WHERE id = ?", [id])?;
        self.activities.retain(|a| a.id != id);
        Ok(n > 0)
    }

    /// Overwrites `target` with a copy of `source` for one class.
    ///
    /// Runs in one transaction: either the target ends up as an exact copy of the
    /// source or it keeps its previous rows.
    pub fn copy_semester(
        &mut self,
        conn: &Connection,
        year: &str,
        class_id: &str,
        source: Semester,
        target: Semester,
    ) -> Result<CopySummary> {
        if source == target {
            return Err(ScheduleError::invalid(
                "sourceSemester and targetSemester must differ",
            ));
        }

        let tx = conn.unchecked_transaction()?;
        let rows = {
            let sql = format!(
                "SELECT {CLASS_ALLOCATION_COLUMNS}
                 FROM class_allocations
                 WHERE year = ? AND semester = ? AND class_id = ?"
            );
            let mut stmt = tx.prepare(&sql)?;
            let rows = stmt.query_map(params![year, source, class_id], ClassAllocation::from_row)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        };

        let deleted = tx.execute(
            "DELETE FROM class_allocations WHERE year = ? AND semester = ? AND class_id = ?",
            params![year, target, class_id],
        )?;

        {
            let mut insert = tx.prepare(
                "INSERT INTO class_allocations(
                    id, teacher_id, subject_id, class_id, time_slot_id, day_of_week, year, semester, room
                 ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )?;
            for row in &rows {
                insert
                    .execute(params![
                        Uuid::new_v4().to_string(),
                        row.teacher_id,
                        row.subject_id,
                        row.class_id,
                        row.time_slot_id,
                        row.day_of_week,
                        row.year,
                        target,
                        row.room
                    ])
                    .map_err(|e| ScheduleError::from_write("class_allocations", e))?;
            }
        }
        tx.commit()?;

        let summary = CopySummary {
            deleted,
            copied: rows.len(),
        };
        tracing::info!(
            year,
            class_id,
            source = source.as_str(),
            target = target.as_str(),
            deleted = summary.deleted,
            copied = summary.copied,
            "semester schedule copied"
        );

        if self.year.as_deref() == Some(year) {
            self.refresh(conn, year)?;
        }
        Ok(summary)
    }
}

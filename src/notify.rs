//! Change notifications from the workspace database.
//!
//! Row changes made through our own connection arrive from SQLite's update hook.
//! Commits by other processes on the same file only show up as a bump of
//! `PRAGMA data_version`, reported as an `External` change of every watched table.

use std::collections::VecDeque;
use std::sync::mpsc::{channel, Receiver};

use rusqlite::hooks::Action;
use rusqlite::Connection;
use serde::Serialize;

const PENDING_CAP: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchedTable {
    ClassAllocations,
    ComplementaryAllocations,
    ResourceBookings,
    TimeSlots,
    CalendarEvents,
}

impl WatchedTable {
    pub const ALL: [WatchedTable; 5] = [
        WatchedTable::ClassAllocations,
        WatchedTable::ComplementaryAllocations,
        WatchedTable::ResourceBookings,
        WatchedTable::TimeSlots,
        WatchedTable::CalendarEvents,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ClassAllocations => "class_allocations",
            Self::ComplementaryAllocations => "complementary_allocations",
            Self::ResourceBookings => "resource_bookings",
            Self::TimeSlots => "time_slots",
            Self::CalendarEvents => "calendar_events",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeAction {
    Insert,
    Update,
    Delete,
    External,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    pub table: WatchedTable,
    pub action: ChangeAction,
    pub row_id: Option<i64>,
}

/// Which caches have to be re-fetched after a batch of events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Invalidation {
    pub allocations: bool,
    pub bookings: bool,
}

impl Invalidation {
    pub fn from_events(events: &[ChangeEvent]) -> Self {
        let mut inv = Self::default();
        for e in events {
            match e.table {
                WatchedTable::ClassAllocations | WatchedTable::ComplementaryAllocations => {
                    inv.allocations = true
                }
                WatchedTable::ResourceBookings => inv.bookings = true,
                // Conflict labels read slots fresh on every check.
                WatchedTable::TimeSlots | WatchedTable::CalendarEvents => {}
            }
        }
        inv
    }
}

pub struct ChangeFeed {
    rx: Receiver<ChangeEvent>,
    data_version: i64,
    pending: VecDeque<ChangeEvent>,
}

fn data_version(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row("PRAGMA data_version", [], |r| r.get(0))
}

impl ChangeFeed {
    /// Hooks `conn`. Replaces any update hook already installed on it.
    pub fn install(conn: &Connection) -> rusqlite::Result<Self> {
        let (tx, rx) = channel();
        conn.update_hook(Some(
            move |action: Action, _db: &str, table: &str, row_id: i64| {
                let Some(table) = WatchedTable::from_name(table) else {
                    return;
                };
                let action = match action {
                    Action::SQLITE_INSERT => ChangeAction::Insert,
                    Action::SQLITE_UPDATE => ChangeAction::Update,
                    Action::SQLITE_DELETE => ChangeAction::Delete,
                    _ => return,
                };
                // Receiver gone means the workspace was closed.
                let _ = tx.send(ChangeEvent {
                    table,
                    action,
                    row_id: Some(row_id),
                });
            },
        ));
        Ok(Self {
            rx,
            data_version: data_version(conn)?,
            pending: VecDeque::new(),
        })
    }

    /// Collects everything that changed since the previous call.
    pub fn drain(&mut self, conn: &Connection) -> rusqlite::Result<Vec<ChangeEvent>> {
        let mut events: Vec<ChangeEvent> = self.rx.try_iter().collect();

        let version = data_version(conn)?;
        if version != self.data_version {
            self.data_version = version;
            tracing::info!("workspace changed by another process");
            events.extend(WatchedTable::ALL.into_iter().map(|table| ChangeEvent {
                table,
                action: ChangeAction::External,
                row_id: None,
            }));
        }

        for e in &events {
            if self.pending.len() == PENDING_CAP {
                self.pending.pop_front();
            }
            self.pending.push_back(*e);
        }
        Ok(events)
    }

    /// Events not yet handed to the client, oldest first.
    pub fn take_pending(&mut self) -> Vec<ChangeEvent> {
        self.pending.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    #[test]
    fn local_writes_are_reported_per_row() {
        let conn = db::open_in_memory();
        let mut feed = ChangeFeed::install(&conn).expect("install");
        conn.execute_batch(
            "INSERT INTO time_slots(id, label, start_time, end_time, kind, position)
               VALUES('S1', '1ª Aula', '08:00', '08:50', 'class', 0);
             INSERT INTO teachers(id, name) VALUES('T1', 'Ana');
             UPDATE time_slots SET label = '1ª' WHERE id = 'S1';
             DELETE FROM time_slots WHERE id = 'S1';",
        )
        .expect("writes");

        let events = feed.drain(&conn).expect("drain");
        let actions: Vec<(WatchedTable, ChangeAction)> =
            events.iter().map(|e| (e.table, e.action)).collect();
        assert_eq!(
            actions,
            vec![
                (WatchedTable::TimeSlots, ChangeAction::Insert),
                (WatchedTable::TimeSlots, ChangeAction::Update),
                (WatchedTable::TimeSlots, ChangeAction::Delete),
            ]
        );
        assert!(feed.drain(&conn).expect("drain again").is_empty());
        assert_eq!(feed.take_pending().len(), 3);
        assert!(feed.take_pending().is_empty());
    }

    #[test]
    fn writes_from_another_connection_are_external() {
        let dir = std::env::temp_dir().join(format!("escolad-notify-{}", uuid::Uuid::new_v4()));
        let conn = db::open_db(&dir).expect("open");
        let mut feed = ChangeFeed::install(&conn).expect("install");

        let other = db::open_db(&dir).expect("open second");
        other
            .execute("INSERT INTO teachers(id, name) VALUES('T1', 'Ana')", [])
            .expect("insert from other connection");

        let events = feed.drain(&conn).expect("drain");
        assert_eq!(events.len(), WatchedTable::ALL.len());
        assert!(events.iter().all(|e| e.action == ChangeAction::External));
        let inv = Invalidation::from_events(&events);
        assert!(inv.allocations && inv.bookings);

        drop(other);
        drop(conn);
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn pending_buffer_is_bounded() {
        let conn = db::open_in_memory();
        let mut feed = ChangeFeed::install(&conn).expect("install");
        for i in 0..(PENDING_CAP + 10) {
            conn.execute(
                "INSERT INTO calendar_events(id, event_date, title, kind) VALUES(?, '2024-01-01', 't', 'evento')",
                [format!("e{i}")],
            )
            .expect("insert");
        }
        feed.drain(&conn).expect("drain");
        assert_eq!(feed.take_pending().len(), PENDING_CAP);
    }

    #[test]
    fn invalidation_maps_tables_to_caches() {
        let ev = |table| ChangeEvent {
            table,
            action: ChangeAction::Insert,
            row_id: Some(1),
        };
        assert_eq!(
            Invalidation::from_events(&[ev(WatchedTable::ComplementaryAllocations)]),
            Invalidation {
                allocations: true,
                bookings: false
            }
        );
        assert_eq!(
            Invalidation::from_events(&[ev(WatchedTable::ResourceBookings)]),
            Invalidation {
                allocations: false,
                bookings: true
            }
        );
        assert_eq!(
            Invalidation::from_events(&[ev(WatchedTable::CalendarEvents)]),
            Invalidation::default()
        );
    }
}

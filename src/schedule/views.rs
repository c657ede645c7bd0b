use serde::Serialize;

use super::model::{ClassAllocation, ComplementaryAllocation, Semester, Weekday};
use super::store::AllocationStore;
use super::time_grid::TimeSlot;

/// Class allocations of one semester, optionally narrowed to a class or a teacher.
pub fn filter_classes<'a>(
    store: &'a AllocationStore,
    semester: Semester,
    class_id: Option<&'a str>,
    teacher_id: Option<&'a str>,
) -> impl Iterator<Item = &'a ClassAllocation> + 'a {
    store
        .class_allocations()
        .iter()
        .filter(move |a| a.semester == semester)
        .filter(move |a| class_id.map_or(true, |c| a.class_id == c))
        .filter(move |a| teacher_id.map_or(true, |t| a.teacher_id.as_deref() == Some(t)))
}

pub fn filter_activities<'a>(
    store: &'a AllocationStore,
    semester: Semester,
    teacher_id: Option<&'a str>,
) -> impl Iterator<Item = &'a ComplementaryAllocation> + 'a {
    store
        .activities()
        .iter()
        .filter(move |a| a.semester == semester)
        .filter(move |a| teacher_id.map_or(true, |t| a.teacher_id == t))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WeekEntry {
    #[serde(rename_all = "camelCase")]
    Class {
        allocation_id: String,
        class_id: String,
        subject_id: String,
        room: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Activity { activity_id: String, activity: String },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekRow {
    pub time_slot_id: String,
    pub time: String,
    pub days: Vec<(Weekday, Vec<WeekEntry>)>,
}

/// One teacher's week: a row per visible slot, each day listing what the teacher does.
///
/// A day may hold more than one entry only when the schedule is already inconsistent.
pub fn teacher_week(
    store: &AllocationStore,
    slots: &[TimeSlot],
    teacher_id: &str,
    semester: Semester,
) -> Vec<WeekRow> {
    slots
        .iter()
        .map(|slot| {
            let days = Weekday::ALL
                .iter()
                .map(|&day| {
                    let mut entries: Vec<WeekEntry> =
                        filter_classes(store, semester, None, Some(teacher_id))
                            .filter(|a| a.time_slot_id == slot.id && a.day_of_week == day)
                            .map(|a| WeekEntry::Class {
                                allocation_id: a.id.clone(),
                                class_id: a.class_id.clone(),
                                subject_id: a.subject_id.clone(),
                                room: a.room.clone(),
                            })
                            .collect();
                    entries.extend(
                        filter_activities(store, semester, Some(teacher_id))
                            .filter(|a| a.time_slot_id == slot.id && a.day_of_week == day)
                            .map(|a| WeekEntry::Activity {
                                activity_id: a.id.clone(),
                                activity: a.activity.clone(),
                            }),
                    );
                    (day, entries)
                })
                .collect();
            WeekRow {
                time_slot_id: slot.id.clone(),
                time: slot.time_label(),
                days,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::schedule::model::{NewClassAllocation, NewComplementaryAllocation};
    use crate::schedule::time_grid::load_slots;

    #[test]
    fn teacher_week_places_classes_and_activities() {
        let conn = db::open_in_memory();
        conn.execute_batch(
            "INSERT INTO teachers(id, name) VALUES('T1', 'Ana');
             INSERT INTO subjects(id, name) VALUES('M1', 'Math');
             INSERT INTO classes(id, name) VALUES('C1', '7A');
             INSERT INTO time_slots(id, label, start_time, end_time, kind, position)
               VALUES('S1', '1ª Aula', '08:00', '08:50', 'class', 0),
                     ('S2', '2ª Aula', '08:50', '09:40', 'class', 1);",
        )
        .expect("seed");
        let mut store = AllocationStore::default();
        store.refresh(&conn, "2024").expect("refresh");
        store
            .add_class(
                &conn,
                &NewClassAllocation {
                    teacher_id: Some("T1".into()),
                    subject_id: "M1".into(),
                    class_id: "C1".into(),
                    time_slot_id: "S1".into(),
                    day_of_week: Weekday::Monday,
                    year: "2024".into(),
                    semester: Semester::First,
                    room: None,
                },
            )
            .expect("class");
        store
            .add_activity(
                &conn,
                &NewComplementaryAllocation {
                    teacher_id: "T1".into(),
                    day_of_week: Weekday::Wednesday,
                    time_slot_id: "S2".into(),
                    year: "2024".into(),
                    semester: Semester::First,
                    activity: "Livre".into(),
                },
            )
            .expect("activity");

        let slots = load_slots(&conn).expect("slots");
        let week = teacher_week(&store, &slots, "T1", Semester::First);
        assert_eq!(week.len(), 2);
        assert_eq!(week[0].time, "1ª Aula (08:00 - 08:50)");
        assert!(matches!(week[0].days[0].1.as_slice(), [WeekEntry::Class { class_id, .. }] if class_id == "C1"));
        assert!(week[0].days[1].1.is_empty());
        assert!(matches!(week[1].days[2].1.as_slice(), [WeekEntry::Activity { activity, .. }] if activity == "Livre"));

        assert!(teacher_week(&store, &slots, "T1", Semester::Second)
            .iter()
            .all(|row| row.days.iter().all(|(_, e)| e.is_empty())));
    }
}

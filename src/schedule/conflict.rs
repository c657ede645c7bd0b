use std::collections::HashMap;

use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use super::model::{deserialize_year, ClassAllocation, ComplementaryAllocation, Semester, Weekday};
use super::time_grid::load_slots;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    /// Teacher already teaches another class in the slot.
    Class,
    /// Teacher has a complementary activity in the slot.
    Activity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conflict {
    pub semester: Semester,
    pub day: Weekday,
    pub time: String,
    pub description: String,
    pub kind: ConflictKind,
}

/// A class period the user is about to save, possibly for several semesters at once.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub teacher_id: Option<String>,
    pub class_id: String,
    pub day_of_week: Weekday,
    pub time_slot_id: String,
    #[serde(deserialize_with = "deserialize_year")]
    pub year: String,
    pub semesters: Vec<Semester>,
}

/// A complementary activity the user is about to save.
#[derive(Debug, Clone)]
pub struct ActivityCandidate<'a> {
    pub teacher_id: &'a str,
    pub day_of_week: Weekday,
    pub time_slot_id: &'a str,
    pub year: &'a str,
    pub semester: Semester,
}

/// Display names used to word conflict descriptions. Unknown ids fall back to the id itself.
#[derive(Debug, Default, Clone)]
pub struct NameIndex {
    teachers: HashMap<String, String>,
    classes: HashMap<String, String>,
    slot_labels: HashMap<String, String>,
}

impl NameIndex {
    pub fn load(conn: &Connection) -> rusqlite::Result<Self> {
        let mut index = Self::default();
        let mut stmt = conn.prepare("SELECT id, name FROM teachers")?;
        for row in stmt.query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)))? {
            let (id, name) = row?;
            index.teachers.insert(id, name);
        }
        let mut stmt = conn.prepare("SELECT id, name FROM classes")?;
        for row in stmt.query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)))? {
            let (id, name) = row?;
            index.classes.insert(id, name);
        }
        for slot in load_slots(conn)? {
            index.slot_labels.insert(slot.id.clone(), slot.time_label());
        }
        Ok(index)
    }

    fn teacher<'a>(&'a self, id: &'a str) -> &'a str {
        self.teachers.get(id).map(String::as_str).unwrap_or(id)
    }

    fn class<'a>(&'a self, id: &'a str) -> &'a str {
        self.classes.get(id).map(String::as_str).unwrap_or(id)
    }

    fn slot<'a>(&'a self, id: &'a str) -> &'a str {
        self.slot_labels.get(id).map(String::as_str).unwrap_or(id)
    }
}

#[cfg(test)]
impl NameIndex {
    pub fn with_teacher(mut self, id: &str, name: &str) -> Self {
        self.teachers.insert(id.to_string(), name.to_string());
        self
    }

    pub fn with_class(mut self, id: &str, name: &str) -> Self {
        self.classes.insert(id.to_string(), name.to_string());
        self
    }

    pub fn with_slot_label(mut self, id: &str, label: &str) -> Self {
        self.slot_labels.insert(id.to_string(), label.to_string());
        self
    }
}

fn teaches_at(
    a: &ClassAllocation,
    teacher_id: &str,
    day: Weekday,
    slot: &str,
    year: &str,
    semester: Semester,
) -> bool {
    a.teacher_id.as_deref() == Some(teacher_id)
        && a.day_of_week == day
        && a.time_slot_id == slot
        && a.year == year
        && a.semester == semester
}

fn busy_at(
    a: &ComplementaryAllocation,
    teacher_id: &str,
    day: Weekday,
    slot: &str,
    year: &str,
    semester: Semester,
) -> bool {
    a.teacher_id == teacher_id
        && a.day_of_week == day
        && a.time_slot_id == slot
        && a.year == year
        && a.semester == semester
}

fn activity_conflict(
    a: &ComplementaryAllocation,
    teacher: &str,
    time: &str,
) -> Conflict {
    Conflict {
        semester: a.semester,
        day: a.day_of_week,
        time: time.to_string(),
        description: format!("{} tem atividade complementar: {}", teacher, a.activity),
        kind: ConflictKind::Activity,
    }
}

/// Every commitment that stops `candidate`'s teacher from taking the slot.
///
/// Re-saving the same class cell is not a conflict. Unassigned periods never conflict.
pub fn detect_conflicts(
    candidate: &Candidate,
    classes: &[ClassAllocation],
    activities: &[ComplementaryAllocation],
    names: &NameIndex,
) -> Vec<Conflict> {
    let Some(teacher_id) = candidate
        .teacher_id
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
    else {
        return Vec::new();
    };

    let day = candidate.day_of_week;
    let slot = candidate.time_slot_id.as_str();
    let year = candidate.year.as_str();
    let teacher = names.teacher(teacher_id);
    let time = names.slot(slot);

    let mut semesters = candidate.semesters.clone();
    semesters.sort();
    semesters.dedup();

    let mut out = Vec::new();
    for semester in semesters {
        for a in classes
            .iter()
            .filter(|a| teaches_at(a, teacher_id, day, slot, year, semester))
            .filter(|a| a.class_id != candidate.class_id)
        {
            out.push(Conflict {
                semester,
                day,
                time: time.to_string(),
                description: format!("{} já está na turma {}", teacher, names.class(&a.class_id)),
                kind: ConflictKind::Class,
            });
        }
        for a in activities
            .iter()
            .filter(|a| busy_at(a, teacher_id, day, slot, year, semester))
        {
            out.push(activity_conflict(a, teacher, time));
        }
    }
    out
}

/// Conflicts for recording a complementary activity.
///
/// Teaching in the slot is a class conflict; an activity already recorded there is an
/// activity conflict, so at most one activity exists per teacher and slot.
pub fn detect_activity_conflicts(
    candidate: &ActivityCandidate<'_>,
    classes: &[ClassAllocation],
    activities: &[ComplementaryAllocation],
    names: &NameIndex,
) -> Vec<Conflict> {
    let ActivityCandidate {
        teacher_id,
        day_of_week: day,
        time_slot_id: slot,
        year,
        semester,
    } = *candidate;
    let teacher = names.teacher(teacher_id);
    let time = names.slot(slot);

    let mut out: Vec<Conflict> = classes
        .iter()
        .filter(|a| teaches_at(a, teacher_id, day, slot, year, semester))
        .map(|a| Conflict {
            semester,
            day,
            time: time.to_string(),
            description: format!("{} já está na turma {}", teacher, names.class(&a.class_id)),
            kind: ConflictKind::Class,
        })
        .collect();
    out.extend(
        activities
            .iter()
            .filter(|a| busy_at(a, teacher_id, day, slot, year, semester))
            .map(|a| activity_conflict(a, teacher, time)),
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names() -> NameIndex {
        NameIndex::default()
            .with_teacher("T1", "Ana")
            .with_class("C1", "7A")
            .with_class("C2", "7B")
            .with_slot_label("S1", "1ª Aula (08:00 - 08:50)")
    }

    fn taught(class_id: &str, semester: Semester) -> ClassAllocation {
        ClassAllocation {
            id: format!("alloc-{class_id}-{}", semester.as_str()),
            teacher_id: Some("T1".into()),
            subject_id: "M1".into(),
            class_id: class_id.into(),
            time_slot_id: "S1".into(),
            day_of_week: Weekday::Monday,
            year: "2024".into(),
            semester,
            room: None,
        }
    }

    fn planning(semester: Semester) -> ComplementaryAllocation {
        ComplementaryAllocation {
            id: "act-1".into(),
            teacher_id: "T1".into(),
            day_of_week: Weekday::Monday,
            time_slot_id: "S1".into(),
            year: "2024".into(),
            semester,
            activity: "Planejamento".into(),
        }
    }

    fn candidate(class_id: &str, semesters: &[Semester]) -> Candidate {
        Candidate {
            teacher_id: Some("T1".into()),
            class_id: class_id.into(),
            day_of_week: Weekday::Monday,
            time_slot_id: "S1".into(),
            year: "2024".into(),
            semesters: semesters.to_vec(),
        }
    }

    #[test]
    fn other_class_same_slot_is_a_class_conflict() {
        let existing = vec![taught("C1", Semester::First)];
        let found = detect_conflicts(
            &candidate("C2", &[Semester::First]),
            &existing,
            &[],
            &names(),
        );
        assert_eq!(
            found,
            vec![Conflict {
                semester: Semester::First,
                day: Weekday::Monday,
                time: "1ª Aula (08:00 - 08:50)".into(),
                description: "Ana já está na turma 7A".into(),
                kind: ConflictKind::Class,
            }]
        );
    }

    #[test]
    fn resaving_same_class_is_allowed() {
        let existing = vec![taught("C1", Semester::First)];
        let found = detect_conflicts(
            &candidate("C1", &[Semester::First]),
            &existing,
            &[],
            &names(),
        );
        assert!(found.is_empty());
    }

    #[test]
    fn activity_blocks_any_class() {
        let acts = vec![planning(Semester::First)];
        for class_id in ["C1", "C2"] {
            let found =
                detect_conflicts(&candidate(class_id, &[Semester::First]), &[], &acts, &names());
            assert_eq!(found.len(), 1);
            assert_eq!(found[0].kind, ConflictKind::Activity);
            assert_eq!(found[0].description, "Ana tem atividade complementar: Planejamento");
        }
    }

    #[test]
    fn only_requested_semesters_are_checked() {
        let existing = vec![taught("C1", Semester::Second)];
        let first_only = detect_conflicts(
            &candidate("C2", &[Semester::First]),
            &existing,
            &[],
            &names(),
        );
        assert!(first_only.is_empty());

        let both = detect_conflicts(
            &candidate("C2", &[Semester::Second, Semester::First, Semester::Second]),
            &existing,
            &[],
            &names(),
        );
        assert_eq!(both.len(), 1);
        assert_eq!(both[0].semester, Semester::Second);
    }

    #[test]
    fn unassigned_period_never_conflicts() {
        let existing = vec![taught("C1", Semester::First)];
        let acts = vec![planning(Semester::First)];
        let mut c = candidate("C2", &[Semester::First]);
        c.teacher_id = None;
        assert!(detect_conflicts(&c, &existing, &acts, &names()).is_empty());
        c.teacher_id = Some("   ".into());
        assert!(detect_conflicts(&c, &existing, &acts, &names()).is_empty());
    }

    #[test]
    fn other_year_or_day_does_not_conflict() {
        let mut other_year = taught("C1", Semester::First);
        other_year.year = "2023".into();
        let mut other_day = taught("C1", Semester::First);
        other_day.day_of_week = Weekday::Tuesday;
        let found = detect_conflicts(
            &candidate("C2", &[Semester::First]),
            &[other_year, other_day],
            &[],
            &names(),
        );
        assert!(found.is_empty());
    }

    #[test]
    fn activity_candidate_sees_teaching_and_duplicates() {
        let c = ActivityCandidate {
            teacher_id: "T1",
            day_of_week: Weekday::Monday,
            time_slot_id: "S1",
            year: "2024",
            semester: Semester::First,
        };
        let found = detect_activity_conflicts(
            &c,
            &[taught("C1", Semester::First)],
            &[planning(Semester::First)],
            &names(),
        );
        let kinds: Vec<ConflictKind> = found.iter().map(|c| c.kind).collect();
        assert_eq!(kinds, vec![ConflictKind::Class, ConflictKind::Activity]);
    }

    #[test]
    fn unknown_ids_fall_back_to_raw_id() {
        let mut existing = taught("C9", Semester::First);
        existing.teacher_id = Some("T9".into());
        let mut c = candidate("C2", &[Semester::First]);
        c.teacher_id = Some("T9".into());
        let found = detect_conflicts(&c, &[existing], &[], &NameIndex::default());
        assert_eq!(found[0].description, "T9 já está na turma C9");
        assert_eq!(found[0].time, "S1");
    }
}

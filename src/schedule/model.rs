use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Result, ScheduleError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
}

impl Weekday {
    pub const ALL: [Weekday; 5] = [
        Weekday::Monday,
        Weekday::Tuesday,
        Weekday::Wednesday,
        Weekday::Thursday,
        Weekday::Friday,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Monday => "Monday",
            Self::Tuesday => "Tuesday",
            Self::Wednesday => "Wednesday",
            Self::Thursday => "Thursday",
            Self::Friday => "Friday",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.as_str() == s)
    }
}

impl ToSql for Weekday {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Weekday {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        Self::parse(value.as_str()?).ok_or(FromSqlError::InvalidType)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Semester {
    #[serde(rename = "1")]
    First,
    #[serde(rename = "2")]
    Second,
}

impl Semester {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::First => "1",
            Self::Second => "2",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "1" => Some(Self::First),
            "2" => Some(Self::Second),
            _ => None,
        }
    }
}

impl ToSql for Semester {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Semester {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        Self::parse(value.as_str()?).ok_or(FromSqlError::InvalidType)
    }
}

/// Academic years are four-digit strings ("2024").
pub fn validate_year(raw: &str) -> Result<String> {
    let year = raw.trim();
    if year.len() == 4 && year.bytes().all(|b| b.is_ascii_digit()) {
        Ok(year.to_string())
    } else {
        Err(ScheduleError::invalid("year must be a four-digit string"))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawYear {
    Text(String),
    Number(u64),
}

/// Serde field adapter: accepts `"2024"` or `2024` and yields the validated string form.
pub fn deserialize_year<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = match RawYear::deserialize(deserializer)? {
        RawYear::Text(s) => s,
        RawYear::Number(n) => n.to_string(),
    };
    validate_year(&raw).map_err(serde::de::Error::custom)
}

/// One class period: a class studies a subject at a weekday slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassAllocation {
    pub id: String,
    pub teacher_id: Option<String>,
    pub subject_id: String,
    pub class_id: String,
    pub time_slot_id: String,
    pub day_of_week: Weekday,
    pub year: String,
    pub semester: Semester,
    pub room: Option<String>,
}

impl ClassAllocation {
    pub(crate) fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            teacher_id: row.get(1)?,
            subject_id: row.get(2)?,
            class_id: row.get(3)?,
            time_slot_id: row.get(4)?,
            day_of_week: row.get(5)?,
            year: row.get(6)?,
            semester: row.get(7)?,
            room: row.get(8)?,
        })
    }

    /// Same cell of the class grid (the storage upsert key).
    pub fn same_cell(&self, other: &NewClassAllocation) -> bool {
        self.class_id == other.class_id
            && self.time_slot_id == other.time_slot_id
            && self.day_of_week == other.day_of_week
            && self.year == other.year
            && self.semester == other.semester
    }
}

pub(crate) const CLASS_ALLOCATION_COLUMNS: &str =
    "id, teacher_id, subject_id, class_id, time_slot_id, day_of_week, year, semester, room";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewClassAllocation {
    #[serde(default)]
    pub teacher_id: Option<String>,
    pub subject_id: String,
    pub class_id: String,
    pub time_slot_id: String,
    pub day_of_week: Weekday,
    #[serde(deserialize_with = "deserialize_year")]
    pub year: String,
    pub semester: Semester,
    #[serde(default)]
    pub room: Option<String>,
}

impl NewClassAllocation {
    /// Trims ids and folds blank optional fields to `None`.
    pub fn normalized(mut self) -> Result<Self> {
        self.teacher_id = non_blank(self.teacher_id);
        self.room = non_blank(self.room);
        self.year = validate_year(&self.year)?;
        for (name, v) in [
            ("subjectId", &mut self.subject_id),
            ("classId", &mut self.class_id),
            ("timeSlotId", &mut self.time_slot_id),
        ] {
            *v = v.trim().to_string();
            if v.is_empty() {
                return Err(ScheduleError::invalid(format!("missing {name}")));
            }
        }
        Ok(self)
    }
}

/// Non-teaching commitment of a teacher (planning, free period...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplementaryAllocation {
    pub id: String,
    pub teacher_id: String,
    pub day_of_week: Weekday,
    pub time_slot_id: String,
    pub year: String,
    pub semester: Semester,
    pub activity: String,
}

impl ComplementaryAllocation {
    pub(crate) fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            teacher_id: row.get(1)?,
            day_of_week: row.get(2)?,
            time_slot_id: row.get(3)?,
            year: row.get(4)?,
            semester: row.get(5)?,
            activity: row.get(6)?,
        })
    }
}

pub(crate) const COMPLEMENTARY_COLUMNS: &str =
    "id, teacher_id, day_of_week, time_slot_id, year, semester, activity";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewComplementaryAllocation {
    pub teacher_id: String,
    pub day_of_week: Weekday,
    pub time_slot_id: String,
    #[serde(deserialize_with = "deserialize_year")]
    pub year: String,
    pub semester: Semester,
    pub activity: String,
}

impl NewComplementaryAllocation {
    pub fn normalized(mut self) -> Result<Self> {
        self.year = validate_year(&self.year)?;
        self.teacher_id = self.teacher_id.trim().to_string();
        self.time_slot_id = self.time_slot_id.trim().to_string();
        self.activity = self.activity.trim().to_string();
        if self.teacher_id.is_empty() {
            return Err(ScheduleError::invalid("missing teacherId"));
        }
        if self.time_slot_id.is_empty() {
            return Err(ScheduleError::invalid("missing timeSlotId"));
        }
        if self.activity.is_empty() {
            return Err(ScheduleError::invalid("activity must not be empty"));
        }
        Ok(self)
    }
}

pub(crate) fn non_blank(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn semester_serializes_as_digit_strings() {
        assert_eq!(serde_json::to_value(Semester::First).unwrap(), "1");
        let s: Semester = serde_json::from_value(serde_json::json!("2")).unwrap();
        assert_eq!(s, Semester::Second);
        assert!(serde_json::from_value::<Semester>(serde_json::json!("3")).is_err());
    }

    #[test]
    fn blank_teacher_becomes_unassigned() {
        let new = NewClassAllocation {
            teacher_id: Some("  ".into()),
            subject_id: " m1 ".into(),
            class_id: "c1".into(),
            time_slot_id: "s1".into(),
            day_of_week: Weekday::Monday,
            year: "2024".into(),
            semester: Semester::First,
            room: Some(String::new()),
        }
        .normalized()
        .expect("valid");
        assert_eq!(new.teacher_id, None);
        assert_eq!(new.room, None);
        assert_eq!(new.subject_id, "m1");
    }

    #[test]
    fn rejects_malformed_year() {
        assert!(validate_year("24").is_err());
        assert!(validate_year("20x4").is_err());
        assert_eq!(validate_year(" 2025 ").unwrap(), "2025");
    }

    #[test]
    fn year_field_accepts_number_or_string() {
        let base = serde_json::json!({
            "teacherId": "t1",
            "dayOfWeek": "Monday",
            "timeSlotId": "s1",
            "semester": "1",
            "activity": "Planejamento"
        });
        for year in [serde_json::json!(2024), serde_json::json!("2024")] {
            let mut params = base.clone();
            params["year"] = year;
            let new: NewComplementaryAllocation =
                serde_json::from_value(params).expect("year accepted");
            assert_eq!(new.year, "2024");
        }
        let mut params = base;
        params["year"] = serde_json::json!(24);
        assert!(serde_json::from_value::<NewComplementaryAllocation>(params).is_err());
    }
}

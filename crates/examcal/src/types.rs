use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single exam as exchanged with the exam backend
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Exam {
    /// Backend-assigned identifier, absent before creation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,

    /// Exam date (YYYY-MM-DD)
    pub exam_day: NaiveDate,

    /// Start time (HH:MM:SS)
    pub exam_hour: NaiveTime,

    pub duration_min: u32,

    pub subject_code: String,

    pub subject_name: String,

    #[serde(default)]
    pub acronym: Option<String>,

    /// Degree name, e.g. "ETSINF Computer Engineering"
    pub degree: String,

    /// Year of study, 1-based
    pub course_year: u32,

    pub semester: Semester,

    #[serde(default)]
    pub exam_place: Option<String>,

    #[serde(default)]
    pub comment: Option<String>,
}

impl Exam {
    /// School the exam belongs to: the first whitespace-delimited token of the degree.
    pub fn school(&self) -> &str {
        crate::filter::school_from_degree(&self.degree)
    }

    /// Label shown in calendars and panels; acronym when present.
    pub fn short_name(&self) -> &str {
        match self.acronym.as_deref() {
            Some(acronym) if !acronym.trim().is_empty() => acronym,
            _ => &self.subject_name,
        }
    }
}

/// Term indicator. The backend is inconsistent and sends either `1` or `"1"`,
/// both are accepted; the integer form is always emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "SemesterRepr", into = "u8")]
pub enum Semester {
    First,
    Second,
}

impl Semester {
    pub fn number(self) -> u8 {
        match self {
            Semester::First => 1,
            Semester::Second => 2,
        }
    }

    /// Display label used by the university ("A" / "B")
    pub fn label(self) -> &'static str {
        match self {
            Semester::First => "A",
            Semester::Second => "B",
        }
    }
}

impl TryFrom<u8> for Semester {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Semester::First),
            2 => Ok(Semester::Second),
            other => Err(format!("invalid semester: {}", other)),
        }
    }
}

impl std::str::FromStr for Semester {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1" | "A" | "a" => Ok(Semester::First),
            "2" | "B" | "b" => Ok(Semester::Second),
            other => Err(format!("invalid semester: {}", other)),
        }
    }
}

impl From<Semester> for u8 {
    fn from(semester: Semester) -> Self {
        semester.number()
    }
}

impl fmt::Display for Semester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SemesterRepr {
    Number(u8),
    Text(String),
}

impl TryFrom<SemesterRepr> for Semester {
    type Error = String;

    fn try_from(repr: SemesterRepr) -> Result<Self, Self::Error> {
        match repr {
            SemesterRepr::Number(n) => Semester::try_from(n),
            SemesterRepr::Text(s) => s.parse(),
        }
    }
}

/// One calendar cell
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExamDay {
    pub date: NaiveDate,
    /// Day of month, 1-based
    pub day: u32,
    pub has_exams: bool,
}

/// One week of cells, Monday first. `None` is a padding cell outside the month.
pub type Week = [Option<ExamDay>; 7];

/// A month of the exam calendar
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyCalendar {
    pub year: i32,
    /// Zero-based month index (0 = January)
    pub month: u32,
    pub month_name: String,
    pub days: Vec<Week>,
}

impl MonthlyCalendar {
    /// Iterate over the real (non-padding) days of the month.
    pub fn exam_days(&self) -> impl Iterator<Item = &ExamDay> {
        self.days.iter().flat_map(|week| week.iter().flatten())
    }
}

/// A distinct subject offered by the filter form
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct SubjectSummary {
    pub name: String,
    #[serde(default)]
    pub acronym: Option<String>,
}

#[cfg(test)]
pub(crate) fn make_exam(day: &str, degree: &str, course_year: u32, semester: u8) -> Exam {
    Exam {
        id: None,
        exam_day: NaiveDate::parse_from_str(day, "%Y-%m-%d").unwrap(),
        exam_hour: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        duration_min: 120,
        subject_code: "11550".to_string(),
        subject_name: "Algoritmia".to_string(),
        acronym: Some("ALG".to_string()),
        degree: degree.to_string(),
        course_year,
        semester: Semester::try_from(semester).unwrap(),
        exam_place: Some("1G 0.1".to_string()),
        comment: None,
    }
}

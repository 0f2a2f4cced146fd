//! Exam filtering and the shared filter state.
//!
//! A selection constrains exams along five dimensions (school, degree,
//! semester, course year, subject). Within a dimension any selected value
//! matches; across dimensions all must match. A dimension with nothing
//! selected does not constrain. School is derived from the degree name.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;
use std::fmt::Display;
use std::str::FromStr;
use tokio::sync::{watch, RwLock};
use tracing::debug;

use crate::calendar;
use crate::types::{Exam, MonthlyCalendar, Semester, SubjectSummary};

/// School of a degree: its first whitespace-delimited token ("" for a blank degree).
pub fn school_from_degree(degree: &str) -> &str {
    degree.split_whitespace().next().unwrap_or("")
}

/// Single-value filter selection shared across views and used as query parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExamFilters {
    #[serde(default, deserialize_with = "empty_as_none")]
    pub school: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub degree: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub year: Option<u32>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub semester: Option<Semester>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub subject: Option<String>,
    /// Free-text search over subject name, subject code and place
    #[serde(default, rename = "q", deserialize_with = "empty_as_none")]
    pub search: Option<String>,
}

impl ExamFilters {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Select a school; everything below it is reset.
    pub fn with_school(self, school: Option<String>) -> Self {
        Self {
            school,
            degree: None,
            year: None,
            semester: None,
            subject: None,
            search: self.search,
        }
    }

    /// Select a degree; year, semester and subject are reset.
    pub fn with_degree(self, degree: Option<String>) -> Self {
        Self {
            degree,
            year: None,
            semester: None,
            subject: None,
            ..self
        }
    }

    /// Select a course year; the subject is reset.
    pub fn with_year(self, year: Option<u32>) -> Self {
        Self {
            year,
            subject: None,
            ..self
        }
    }

    /// Select a semester; the subject is reset.
    pub fn with_semester(self, semester: Option<Semester>) -> Self {
        Self {
            semester,
            subject: None,
            ..self
        }
    }

    pub fn with_subject(self, subject: Option<String>) -> Self {
        Self { subject, ..self }
    }
}

/// Multi-value selection: one set per dimension.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct FilterSelection {
    pub schools: BTreeSet<String>,
    pub degrees: BTreeSet<String>,
    pub semesters: BTreeSet<Semester>,
    pub course_years: BTreeSet<u32>,
    pub subjects: BTreeSet<String>,
    pub search: Option<String>,
}

impl FilterSelection {
    /// True when nothing is selected, i.e. the identity filter.
    pub fn is_empty(&self) -> bool {
        self.schools.is_empty()
            && self.degrees.is_empty()
            && self.semesters.is_empty()
            && self.course_years.is_empty()
            && self.subjects.is_empty()
            && self.search_term().is_none()
    }

    pub fn matches(&self, exam: &Exam) -> bool {
        dimension(&self.schools, exam.school())
            && dimension(&self.degrees, exam.degree.as_str())
            && dimension(&self.semesters, &exam.semester)
            && dimension(&self.course_years, &exam.course_year)
            && dimension(&self.subjects, exam.subject_name.as_str())
            && self.matches_search(exam)
    }

    fn search_term(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
    }

    fn matches_search(&self, exam: &Exam) -> bool {
        let Some(term) = self.search_term() else {
            return true;
        };
        exam.subject_name.to_lowercase().contains(&term)
            || exam.subject_code.to_lowercase().contains(&term)
            || exam
                .exam_place
                .as_deref()
                .is_some_and(|place| place.to_lowercase().contains(&term))
    }
}

impl From<&ExamFilters> for FilterSelection {
    fn from(filters: &ExamFilters) -> Self {
        Self {
            schools: filters.school.iter().cloned().collect(),
            degrees: filters.degree.iter().cloned().collect(),
            semesters: filters.semester.iter().copied().collect(),
            course_years: filters.year.iter().copied().collect(),
            subjects: filters.subject.iter().cloned().collect(),
            search: filters.search.clone(),
        }
    }
}

fn dimension<T, Q>(selected: &BTreeSet<T>, value: &Q) -> bool
where
    T: Ord + std::borrow::Borrow<Q>,
    Q: Ord + ?Sized,
{
    selected.is_empty() || selected.contains(value)
}

/// Keep the exams passing `selection`, in input order.
pub fn apply_filters(exams: &[Exam], selection: &FilterSelection) -> Vec<Exam> {
    if selection.is_empty() {
        return exams.to_vec();
    }
    let filtered: Vec<Exam> = exams
        .iter()
        .filter(|exam| selection.matches(exam))
        .cloned()
        .collect();
    debug!(total = exams.len(), kept = filtered.len(), "Filters applied");
    filtered
}

/// Distinct values offered by the filter form.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FilterOptions {
    pub schools: Vec<String>,
    /// Degrees of the selected school (all degrees when no school is selected)
    pub degrees: Vec<String>,
    pub course_years: Vec<u32>,
    pub semesters: Vec<Semester>,
    /// Subjects narrowed by the selected degree, year and semester
    pub subjects: Vec<SubjectSummary>,
}

impl FilterOptions {
    pub fn from_exams(exams: &[Exam], filters: &ExamFilters) -> Self {
        let schools: BTreeSet<String> = exams.iter().map(|e| e.school().to_string()).collect();

        let in_school = |e: &&Exam| filters.school.as_deref().map_or(true, |s| e.school() == s);
        let degrees: BTreeSet<String> = exams
            .iter()
            .filter(in_school)
            .map(|e| e.degree.clone())
            .collect();

        let course_years: BTreeSet<u32> = exams.iter().map(|e| e.course_year).collect();
        let semesters: BTreeSet<Semester> = exams.iter().map(|e| e.semester).collect();

        let subjects: BTreeSet<SubjectSummary> = exams
            .iter()
            .filter(in_school)
            .filter(|e| filters.degree.as_deref().map_or(true, |d| e.degree == d))
            .filter(|e| filters.year.map_or(true, |y| e.course_year == y))
            .filter(|e| filters.semester.map_or(true, |s| e.semester == s))
            .map(|e| SubjectSummary {
                name: e.subject_name.clone(),
                acronym: e.acronym.clone(),
            })
            .collect();

        Self {
            schools: schools.into_iter().filter(|s| !s.is_empty()).collect(),
            degrees: degrees.into_iter().collect(),
            course_years: course_years.into_iter().collect(),
            semesters: semesters.into_iter().collect(),
            subjects: subjects.into_iter().collect(),
        }
    }
}

/// Holds all loaded exams and the current selection.
///
/// The selection is an observed value: subscribers are notified on every
/// change. Filtered exams and calendars are derived on demand from both.
pub struct FilterStore {
    exams: RwLock<Vec<Exam>>,
    selection: watch::Sender<ExamFilters>,
}

impl FilterStore {
    pub fn new(exams: Vec<Exam>) -> Self {
        Self {
            exams: RwLock::new(exams),
            selection: watch::Sender::new(ExamFilters::default()),
        }
    }

    /// Change notification stream for the selection
    pub fn subscribe(&self) -> watch::Receiver<ExamFilters> {
        self.selection.subscribe()
    }

    pub fn current(&self) -> ExamFilters {
        self.selection.borrow().clone()
    }

    /// Replace the selection. Subscribers are only notified if it changed.
    pub fn set(&self, filters: ExamFilters) -> bool {
        self.selection.send_if_modified(|current| {
            if *current == filters {
                return false;
            }
            *current = filters;
            true
        })
    }

    /// Apply a cascading update, e.g. `store.update(|f| f.with_school(..))`.
    pub fn update(&self, change: impl FnOnce(ExamFilters) -> ExamFilters) -> bool {
        let next = change(self.current());
        self.set(next)
    }

    /// Swap in a freshly loaded exam list, returning the previous count.
    pub async fn replace_exams(&self, exams: Vec<Exam>) -> usize {
        let mut guard = self.exams.write().await;
        let old = guard.len();
        *guard = exams;
        old
    }

    pub async fn len(&self) -> usize {
        self.exams.read().await.len()
    }

    /// Exams passing the current selection.
    pub async fn filtered(&self) -> Vec<Exam> {
        let selection = FilterSelection::from(&self.current());
        self.filtered_with(&selection).await
    }

    pub async fn filtered_with(&self, selection: &FilterSelection) -> Vec<Exam> {
        let exams = self.exams.read().await;
        apply_filters(&exams, selection)
    }

    /// Calendar for the current selection.
    pub async fn calendar(&self) -> Vec<MonthlyCalendar> {
        calendar::build_calendar(&self.filtered().await)
    }

    pub async fn options(&self, filters: &ExamFilters) -> FilterOptions {
        let exams = self.exams.read().await;
        FilterOptions::from_exams(&exams, filters)
    }
}

/// Query strings and forms send "" for an unset field; JSON may send numbers.
fn empty_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    let raw = match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => return Ok(None),
        Some(serde_json::Value::String(s)) => s,
        Some(other) => other.to_string(),
    };
    if raw.trim().is_empty() {
        return Ok(None);
    }
    raw.trim().parse().map(Some).map_err(serde::de::Error::custom)
}

//! Exam data source: the exam REST backend or a local JSON export.

use reqwest::{Response, Url};
use serde::de::DeserializeOwned;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{SourceError, SourceResult};
use crate::filter::{apply_filters, ExamFilters, FilterSelection};
use crate::types::{Exam, Semester};

/// Upper bound for a whole backend request, connect included
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for the backend's `/api/exams` resource.
#[derive(Debug, Clone)]
pub struct ExamClient {
    http: reqwest::Client,
    base: Url,
}

impl ExamClient {
    /// `base_url` is the backend root, e.g. `http://localhost:8080`.
    pub fn new(base_url: &str) -> SourceResult<Self> {
        Self::with_timeout(base_url, REQUEST_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> SourceResult<Self> {
        let base = Url::parse(base_url).map_err(|e| SourceError::Url(format!("{base_url}: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(SourceError::Url(base_url.to_string()));
        }
        Ok(Self {
            http: reqwest::Client::builder().timeout(timeout).build()?,
            base,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(["api", "exams"]).extend(segments);
        }
        url
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> SourceResult<T> {
        debug!(url = %url, "GET");
        let response = self.http.get(url).send().await?;
        Ok(check_status(response)?.json().await?)
    }

    /// All exams.
    pub async fn list_exams(&self) -> SourceResult<Vec<Exam>> {
        self.get_json(self.endpoint(&[])).await
    }

    pub async fn exams_by_school(&self, school: &str) -> SourceResult<Vec<Exam>> {
        self.get_json(self.endpoint(&["school", school])).await
    }

    pub async fn exams_by_course(&self, course_year: u32, semester: Semester) -> SourceResult<Vec<Exam>> {
        let mut url = self.endpoint(&["course"]);
        url.query_pairs_mut()
            .append_pair("courseYear", &course_year.to_string())
            .append_pair("semester", &semester.to_string());
        self.get_json(url).await
    }

    pub async fn get_exam(&self, id: i64) -> SourceResult<Exam> {
        self.get_json(self.endpoint(&[&id.to_string()])).await
    }

    pub async fn create_exam(&self, exam: &Exam) -> SourceResult<Exam> {
        let response = self.http.post(self.endpoint(&[])).json(exam).send().await?;
        Ok(check_status(response)?.json().await?)
    }

    pub async fn update_exam(&self, id: i64, exam: &Exam) -> SourceResult<Exam> {
        let url = self.endpoint(&[&id.to_string()]);
        let response = self.http.put(url).json(exam).send().await?;
        Ok(check_status(response)?.json().await?)
    }

    pub async fn delete_exam(&self, id: i64) -> SourceResult<()> {
        let response = self.http.delete(self.endpoint(&[&id.to_string()])).send().await?;
        check_status(response)?;
        Ok(())
    }

    /// Exams matching `filters`.
    ///
    /// The narrowest backend endpoint is queried, then the remaining
    /// dimensions are applied locally so the result is exactly the filtered set.
    pub async fn fetch(&self, filters: &ExamFilters) -> SourceResult<Vec<Exam>> {
        let exams = match (filters.year, filters.semester, filters.school.as_deref()) {
            (Some(year), Some(semester), _) => self.exams_by_course(year, semester).await?,
            (_, _, Some(school)) => self.exams_by_school(school).await?,
            _ => self.list_exams().await?,
        };
        Ok(apply_filters(&exams, &FilterSelection::from(filters)))
    }
}

fn check_status(response: Response) -> SourceResult<Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(SourceError::Status {
            status: status.as_u16(),
            url: response.url().to_string(),
        })
    }
}

/// Where exams come from
#[derive(Debug, Clone)]
pub enum ExamSource {
    Http(ExamClient),
    /// JSON array of exams in the backend's format
    File(PathBuf),
}

impl ExamSource {
    pub async fn fetch(&self, filters: &ExamFilters) -> SourceResult<Vec<Exam>> {
        match self {
            ExamSource::Http(client) => client.fetch(filters).await,
            ExamSource::File(path) => {
                let exams = load_file(path).await?;
                Ok(apply_filters(&exams, &FilterSelection::from(filters)))
            }
        }
    }

    /// Fetch, falling back to an empty list when the source is unavailable.
    pub async fn load_or_empty(&self, filters: &ExamFilters) -> Vec<Exam> {
        match self.fetch(filters).await {
            Ok(exams) => {
                info!(count = exams.len(), source = %self, "Exams loaded");
                exams
            }
            Err(e) => {
                warn!(source = %self, error = %e, "Exam source unavailable, showing an empty calendar");
                Vec::new()
            }
        }
    }

    /// Local file to watch for changes, if any
    pub fn watched_file(&self) -> Option<&Path> {
        match self {
            ExamSource::File(path) => Some(path),
            ExamSource::Http(_) => None,
        }
    }
}

impl fmt::Display for ExamSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExamSource::Http(client) => write!(f, "{}", client.base_url()),
            ExamSource::File(path) => write!(f, "{}", path.display()),
        }
    }
}

async fn load_file(path: &Path) -> SourceResult<Vec<Exam>> {
    let content = tokio::fs::read_to_string(path).await?;
    let exams: Vec<Exam> = serde_json::from_str(&content)?;
    debug!(count = exams.len(), path = %path.display(), "Read exam export");
    Ok(exams)
}

//! Configuration loading from the environment and command-line overrides.

use std::path::PathBuf;
use tracing::warn;

use crate::error::{SourceError, SourceResult};
use crate::source::{ExamClient, ExamSource};

pub const API_URL_VAR: &str = "EXAMCAL_API_URL";
pub const EXAMS_FILE_VAR: &str = "EXAMCAL_EXAMS_FILE";
pub const PORT_VAR: &str = "EXAMCAL_PORT";

pub const DEFAULT_PORT: u16 = 8080;

/// Runtime settings
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Root of the exam backend, e.g. `http://localhost:8080`
    pub api_url: Option<String>,
    /// Local JSON export used instead of the backend
    pub exams_file: Option<PathBuf>,
    pub port: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: None,
            exams_file: None,
            port: DEFAULT_PORT,
        }
    }
}

impl Settings {
    /// Load settings from environment variables.
    ///
    /// Reads `EXAMCAL_API_URL`, `EXAMCAL_EXAMS_FILE` and `EXAMCAL_PORT`,
    /// either from the environment or from a `.env` file.
    pub fn from_env() -> Self {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = match non_empty(PORT_VAR) {
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                warn!(value = %raw, "Invalid {}, using {}", PORT_VAR, DEFAULT_PORT);
                DEFAULT_PORT
            }),
            None => DEFAULT_PORT,
        };

        Self {
            api_url: non_empty(API_URL_VAR),
            exams_file: non_empty(EXAMS_FILE_VAR).map(PathBuf::from),
            port,
        }
    }

    /// Apply command-line flags. A source given on the command line replaces
    /// both sources from the environment.
    pub fn with_overrides(
        mut self,
        api_url: Option<String>,
        exams_file: Option<PathBuf>,
        port: Option<u16>,
    ) -> Self {
        if api_url.is_some() || exams_file.is_some() {
            self.api_url = api_url;
            self.exams_file = exams_file;
        }
        if let Some(port) = port {
            self.port = port;
        }
        self
    }

    /// The configured exam source. A local file takes precedence over the backend.
    pub fn source(&self) -> SourceResult<ExamSource> {
        if let Some(path) = &self.exams_file {
            return Ok(ExamSource::File(path.clone()));
        }
        match &self.api_url {
            Some(url) => Ok(ExamSource::Http(ExamClient::new(url)?)),
            None => Err(SourceError::NoSource),
        }
    }
}

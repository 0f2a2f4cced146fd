use axum::extract::{Path as UrlPath, Query, State};
use axum::{
    response::Html,
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use notify_debouncer_mini::{new_debouncer, notify::RecursiveMode, DebounceEventResult};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tower_http::services::ServeDir;
use tracing::{debug, info, warn};

use crate::calendar;
use crate::filter::{ExamFilters, FilterOptions, FilterSelection, FilterStore};
use crate::html::{self, PageView};
use crate::source::ExamSource;
use crate::tooltip::{PlacementRequest, TooltipPosition};
use crate::types::{Exam, MonthlyCalendar};

/// Application state shared across requests
pub struct AppState {
    pub store: FilterStore,
    pub source: ExamSource,
    /// Set when the last load from the source failed
    pub notice: RwLock<Option<String>>,
}

impl AppState {
    pub fn new(source: ExamSource) -> Self {
        Self {
            store: FilterStore::new(Vec::new()),
            source,
            notice: RwLock::new(None),
        }
    }

    /// Reload all exams from the source. On failure the previous exams are
    /// kept and a notice is shown on the page.
    pub async fn reload(&self) -> bool {
        match self.source.fetch(&ExamFilters::default()).await {
            Ok(exams) => {
                let new_count = exams.len();
                let old_count = self.store.replace_exams(exams).await;
                if new_count != old_count {
                    info!(
                        total = new_count,
                        delta = new_count as i64 - old_count as i64,
                        "Exams updated"
                    );
                } else {
                    debug!(total = new_count, "No change in exam count");
                }
                *self.notice.write().await = None;
                true
            }
            Err(e) => {
                warn!(source = %self.source, error = %e, "Failed to load exams");
                *self.notice.write().await = Some(format!(
                    "Could not load exams from {}. Showing the last known data.",
                    self.source
                ));
                false
            }
        }
    }

    /// Query filters when any were given, otherwise the shared selection
    fn effective(&self, query: ExamFilters) -> ExamFilters {
        if query.is_empty() {
            self.store.current()
        } else {
            query
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/api/exams", get(exams_handler))
        .route("/api/options", get(options_handler))
        .route("/api/calendar", post(calendar_handler))
        .route("/api/day/{date}", get(day_handler))
        .route("/api/tooltip", post(tooltip_handler))
        .route("/api/filters", get(get_filters_handler).post(set_filters_handler))
        .route("/api/refresh", get(refresh_handler))
        .nest_service("/assets", ServeDir::new("assets"))
        .with_state(state)
}

/// Start the web server, watching a local export for changes
pub async fn serve(port: u16, source: ExamSource) -> anyhow::Result<()> {
    info!(source = %source, "Loading exams");
    let state = Arc::new(AppState::new(source));
    state.reload().await;
    info!(total = state.store.len().await, "Exams ready");

    if let Some(path) = state.source.watched_file() {
        start_file_watcher(path.to_path_buf(), state.clone())?;
    }
    spawn_selection_logger(state.clone());

    let app = router(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    info!("Server running at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Log every change of the shared selection with the resulting calendar size
fn spawn_selection_logger(state: Arc<AppState>) {
    let mut rx = state.store.subscribe();
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let filters = rx.borrow_and_update().clone();
            let months = state.store.calendar().await;
            info!(?filters, months = months.len(), "Filter selection changed");
        }
    });
}

/// Watch the exam export file and reload when it changes
fn start_file_watcher(file: PathBuf, state: Arc<AppState>) -> anyhow::Result<()> {
    let watch_dir = match file.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let file_name = file.file_name().map(|n| n.to_os_string());

    // Create a channel to receive events
    let (tx, mut rx) = tokio::sync::mpsc::channel(10);

    // Spawn a blocking thread for the file watcher
    std::thread::spawn(move || {
        let mut debouncer = match new_debouncer(
            Duration::from_secs(2),
            move |result: DebounceEventResult| {
                if let Ok(events) = result {
                    let touched = events
                        .iter()
                        .any(|e| e.path.file_name().map(|n| n.to_os_string()) == file_name);
                    if touched {
                        let _ = tx.blocking_send(());
                    }
                }
            },
        ) {
            Ok(debouncer) => debouncer,
            Err(e) => {
                warn!(error = %e, "Failed to create file watcher");
                return;
            }
        };

        if let Err(e) = debouncer
            .watcher()
            .watch(&watch_dir, RecursiveMode::NonRecursive)
        {
            warn!(dir = %watch_dir.display(), error = %e, "Failed to watch directory");
            return;
        }
        info!(dir = %watch_dir.display(), "Watching for exam export changes");

        // Keep the watcher alive
        loop {
            std::thread::sleep(Duration::from_secs(60));
        }
    });

    // Spawn a task to handle file change notifications
    tokio::spawn(async move {
        while rx.recv().await.is_some() {
            info!(file = %file_display(&state.source), "Detected changes in exam export");
            state.reload().await;
        }
    });

    Ok(())
}

fn file_display(source: &ExamSource) -> String {
    source
        .watched_file()
        .map(Path::display)
        .map(|d| d.to_string())
        .unwrap_or_default()
}

/// Serve the calendar page for the filters in the query string
async fn index_handler(
    State(state): State<Arc<AppState>>,
    Query(filters): Query<ExamFilters>,
) -> Html<String> {
    let selection = FilterSelection::from(&filters);
    state.store.set(filters.clone());

    // Render from this request's query; the shared selection may change meanwhile
    let exams = state.store.filtered_with(&selection).await;
    let options = state.store.options(&filters).await;
    let notice = state.notice.read().await.clone();

    let markup = html::render_page(&PageView {
        exams: &exams,
        filters: &filters,
        options: &options,
        notice: notice.as_deref(),
    });
    Html(markup.into_string())
}

/// Return filtered exams as JSON
async fn exams_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ExamFilters>,
) -> Json<Vec<Exam>> {
    let filters = state.effective(query);
    Json(state.store.filtered_with(&FilterSelection::from(&filters)).await)
}

async fn options_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ExamFilters>,
) -> Json<FilterOptions> {
    let filters = state.effective(query);
    Json(state.store.options(&filters).await)
}

/// Calendar for a multi-value selection
async fn calendar_handler(
    State(state): State<Arc<AppState>>,
    Json(selection): Json<FilterSelection>,
) -> Json<Vec<MonthlyCalendar>> {
    let exams = state.store.filtered_with(&selection).await;
    Json(calendar::build_calendar(&exams))
}

/// Exams of one day, after filters
async fn day_handler(
    State(state): State<Arc<AppState>>,
    UrlPath(date): UrlPath<NaiveDate>,
    Query(query): Query<ExamFilters>,
) -> Json<Vec<Exam>> {
    let filters = state.effective(query);
    let exams = state.store.filtered_with(&FilterSelection::from(&filters)).await;
    Json(calendar::exams_on(&exams, date).into_iter().cloned().collect())
}

async fn tooltip_handler(Json(request): Json<PlacementRequest>) -> Json<TooltipPosition> {
    Json(request.place())
}

async fn get_filters_handler(State(state): State<Arc<AppState>>) -> Json<ExamFilters> {
    Json(state.store.current())
}

async fn set_filters_handler(
    State(state): State<Arc<AppState>>,
    Json(filters): Json<ExamFilters>,
) -> Json<ExamFilters> {
    state.store.set(filters);
    Json(state.store.current())
}

/// Reload exams from the source (manual trigger)
async fn refresh_handler(State(state): State<Arc<AppState>>) -> &'static str {
    info!("Manual refresh triggered");
    if state.reload().await {
        "OK"
    } else {
        "ERROR"
    }
}

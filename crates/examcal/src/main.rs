use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, EnvFilter};

mod calendar;
mod config;
mod error;
mod filter;
mod html;
mod server;
mod source;
mod tooltip;
mod types;

use config::Settings;
use filter::{apply_filters, ExamFilters, FilterOptions, FilterSelection};
use source::ExamSource;
use tooltip::{Offset, Rect, Size};
use types::{Exam, Semester};

#[derive(Parser, Debug)]
#[command(name = "examcal")]
#[command(about = "Browse university exam dates as a filterable monthly calendar")]
struct Args {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Root URL of the exam backend (overrides EXAMCAL_API_URL)
    #[arg(long, global = true)]
    source_url: Option<String>,

    /// JSON export of exams (overrides EXAMCAL_EXAMS_FILE)
    #[arg(long, global = true)]
    exams_file: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the web server (default)
    Serve {
        /// Port to listen on (overrides EXAMCAL_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Generate a static HTML calendar (no server)
    ///
    /// Without a server behind it the page positions day tooltips in the
    /// browser, below the clicked day and kept inside the window.
    Build {
        /// Output directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        #[command(flatten)]
        filters: FilterArgs,
    },

    /// Print the month grids to the terminal
    Calendar {
        #[command(flatten)]
        filters: FilterArgs,
    },

    /// Compute a tooltip position for a target element
    Place {
        /// Target rectangle in viewport coordinates: top,left,width,height
        #[arg(long)]
        target: Rect,

        /// Measured tooltip size: width,height
        #[arg(long)]
        tooltip: Option<Size>,

        /// Viewport size: width,height
        #[arg(long)]
        viewport: Size,

        /// Page scroll offset: x,y
        #[arg(long)]
        scroll: Option<Offset>,
    },

    /// Manage exams on the backend
    Exam {
        #[command(subcommand)]
        action: ExamAction,
    },
}

#[derive(Subcommand, Debug)]
enum ExamAction {
    /// Show a single exam as JSON
    Get { id: i64 },

    /// Create an exam from a JSON file
    Create { file: PathBuf },

    /// Replace an exam with the contents of a JSON file
    Update { id: i64, file: PathBuf },

    /// Delete an exam
    Delete { id: i64 },
}

#[derive(clap::Args, Debug, Default)]
struct FilterArgs {
    /// School, e.g. ETSINF
    #[arg(long)]
    school: Option<String>,

    /// Full degree name
    #[arg(long)]
    degree: Option<String>,

    /// Course year
    #[arg(long)]
    year: Option<u32>,

    /// Semester: 1, 2, A or B
    #[arg(long)]
    semester: Option<Semester>,

    /// Subject name
    #[arg(long)]
    subject: Option<String>,

    /// Free-text search over subject name, code and place
    #[arg(short = 'q', long)]
    search: Option<String>,
}

impl From<FilterArgs> for ExamFilters {
    fn from(args: FilterArgs) -> Self {
        let filters = ExamFilters {
            search: args.search,
            ..Default::default()
        };
        filters
            .with_school(args.school)
            .with_degree(args.degree)
            .with_year(args.year)
            .with_semester(args.semester)
            .with_subject(args.subject)
    }
}

fn init_tracing(log_level: &str) {
    let mut filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    for directive in ["hyper=warn", "tower_http=warn", "reqwest=warn"] {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_max_level(Level::TRACE)
        .init();
}

/// Load every exam from the source, then narrow to `filters`.
///
/// Returns the full list (for the filter options), the filtered list and a
/// notice when the source could not be read.
async fn load_view(
    source: &ExamSource,
    filters: &ExamFilters,
) -> (Vec<Exam>, Vec<Exam>, Option<String>) {
    match source.fetch(&ExamFilters::default()).await {
        Ok(all) => {
            let filtered = apply_filters(&all, &FilterSelection::from(filters));
            info!(total = all.len(), shown = filtered.len(), "Exams loaded");
            (all, filtered, None)
        }
        Err(e) => {
            warn!(source = %source, error = %e, "Exam source unavailable");
            let notice = format!("Could not load exams from {}.", source);
            (Vec::new(), Vec::new(), Some(notice))
        }
    }
}

fn read_exam(file: &Path) -> Result<Exam> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid exam in {}", file.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_tracing(&args.log_level);

    let port = match &args.command {
        Some(Commands::Serve { port }) => *port,
        _ => None,
    };
    let settings = Settings::from_env().with_overrides(args.source_url, args.exams_file, port);

    match args.command {
        // Default to serve if no command specified
        None | Some(Commands::Serve { .. }) => {
            let source = settings.source()?;
            server::serve(settings.port, source).await?;
        }
        Some(Commands::Build { output, filters }) => {
            let source = settings.source()?;
            let filters = ExamFilters::from(filters);
            let (all, exams, notice) = load_view(&source, &filters).await;
            let options = FilterOptions::from_exams(&all, &filters);

            std::fs::create_dir_all(&output)?;
            let html_path = output.join("index.html");
            let view = html::PageView {
                exams: &exams,
                filters: &filters,
                options: &options,
                notice: notice.as_deref(),
            };
            html::generate_html(&view, &html_path)?;
            info!(path = %html_path.display(), "HTML saved");
        }
        Some(Commands::Calendar { filters }) => {
            let source = settings.source()?;
            let filters = ExamFilters::from(filters);
            let exams = source.load_or_empty(&filters).await;

            let months = calendar::build_calendar(&exams);
            if months.is_empty() {
                println!("No exams match the current filters.");
            }
            for month in &months {
                println!("{}", calendar::format_month(month));
            }
        }
        Some(Commands::Place {
            target,
            tooltip,
            viewport,
            scroll,
        }) => {
            let position = tooltip::place(
                target,
                tooltip.unwrap_or_default().measured_or_default(),
                viewport,
                scroll.unwrap_or_default(),
            );
            info!(placement = %position.placement, "Tooltip placed");
            println!("{}", serde_json::to_string_pretty(&position)?);
            println!("tooltip: {}", position.css());
            println!("arrow:   {}", position.arrow_css());
        }
        Some(Commands::Exam { action }) => {
            let ExamSource::Http(client) = settings.source()? else {
                bail!("Managing exams needs a backend: set --source-url or EXAMCAL_API_URL");
            };

            match action {
                ExamAction::Get { id } => {
                    let exam = client.get_exam(id).await?;
                    println!("{}", serde_json::to_string_pretty(&exam)?);
                }
                ExamAction::Create { file } => {
                    let exam = client.create_exam(&read_exam(&file)?).await?;
                    info!(id = ?exam.id, subject = %exam.subject_name, "Exam created");
                    println!("{}", serde_json::to_string_pretty(&exam)?);
                }
                ExamAction::Update { id, file } => {
                    let exam = client.update_exam(id, &read_exam(&file)?).await?;
                    info!(id, subject = %exam.subject_name, "Exam updated");
                    println!("{}", serde_json::to_string_pretty(&exam)?);
                }
                ExamAction::Delete { id } => {
                    client.delete_exam(id).await?;
                    info!(id, "Exam deleted");
                }
            }
        }
    }

    Ok(())
}

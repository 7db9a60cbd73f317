use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use sqlx::PgPool;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use college_analytics::config::{self, ConnectionArgs, FilterArgs};
use college_analytics::dashboard::{self, DashboardKind, DashboardView};
use college_analytics::error::FetchError;
use college_analytics::live::{ChangeEvent, LiveRefresh, PageState, Snapshot, Subscription};
use college_analytics::models::{ApplicationStatus, Filters};
use college_analytics::{db, report};

#[derive(Parser)]
#[command(name = "college-analytics")]
#[command(about = "Admission, enrollment, performance and utilization analytics for the college data store", long_about = None)]
struct Cli {
    #[command(flatten)]
    connection: ConnectionArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import applications from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Print one dashboard
    Show {
        #[arg(value_enum)]
        dashboard: DashboardKind,
        #[command(flatten)]
        filters: FilterArgs,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Print a dashboard and reprint it whenever its table changes
    Watch {
        #[arg(value_enum)]
        dashboard: DashboardKind,
        /// Table to watch; defaults to the dashboard's source table
        #[arg(long)]
        table: Option<String>,
        #[arg(long, value_enum, default_value_t = ChangeEvent::All)]
        event: ChangeEvent,
        #[command(flatten)]
        filters: FilterArgs,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Generate a markdown report covering every dashboard
    Report {
        #[command(flatten)]
        filters: FilterArgs,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Change the status of an application
    SetStatus {
        #[arg(long)]
        id: Uuid,
        #[arg(long)]
        status: ApplicationStatus,
    },
    /// Delete an application
    DeleteApplication {
        #[arg(long)]
        id: Uuid,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn render(view: &DashboardView, format: OutputFormat) -> anyhow::Result<String> {
    Ok(match format {
        OutputFormat::Text => report::render_view(view),
        OutputFormat::Json => serde_json::to_string_pretty(view)?,
    })
}

fn print_snapshot(snapshot: &Snapshot, format: OutputFormat) {
    match &snapshot.state {
        PageState::Loading => eprintln!("Loading..."),
        PageState::Ready(view) => match render(view, format) {
            Ok(rendered) => println!("{rendered}"),
            Err(error) => tracing::error!(%error, "failed to render dashboard"),
        },
        PageState::Failed(error) => eprintln!("{}", report::banner(error)),
    }
}

async fn generate_report(pool: &PgPool, filters: &Filters) -> Result<String, FetchError> {
    let views = dashboard::load_all(pool, filters).await?;
    Ok(report::build_report(filters, chrono::Utc::now(), &views))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let dotenv = config::load_dotenv();
    init_tracing();
    match dotenv {
        Ok(Some(path)) => tracing::debug!(path = %path.display(), "loaded environment file"),
        Ok(None) => {}
        Err(error) => tracing::warn!(%error, "ignoring unreadable .env file"),
    }

    let cli = Cli::parse();
    let pool = cli.connection.connect().await?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let inserted = db::import_csv(&pool, &csv).await?;
            println!("Inserted {inserted} applications from {}.", csv.display());
        }
        Commands::Show {
            dashboard,
            filters,
            format,
        } => {
            let filters = filters.into_filters()?;
            match dashboard::load(&pool, dashboard, &filters).await {
                Ok(view) => println!("{}", render(&view, format)?),
                Err(error) => {
                    eprintln!("{}", report::banner(&error));
                    std::process::exit(1);
                }
            }
        }
        Commands::Watch {
            dashboard,
            table,
            event,
            filters,
            format,
        } => {
            let filters = filters.into_filters()?;
            let subscription = Subscription {
                table: table.unwrap_or_else(|| dashboard.source_table().to_string()),
                event,
            };
            LiveRefresh::new(pool.clone(), dashboard, filters, subscription)
                .run(|snapshot| print_snapshot(snapshot, format))
                .await?;
        }
        Commands::Report { filters, out } => {
            let filters = filters.into_filters()?;
            let markdown = match generate_report(&pool, &filters).await {
                Ok(markdown) => markdown,
                Err(error) => {
                    eprintln!("{}", report::banner(&error));
                    std::process::exit(1);
                }
            };
            std::fs::write(&out, markdown)?;
            println!("Report written to {}.", out.display());
        }
        Commands::SetStatus { id, status } => {
            let updated = db::update_application_status(&pool, id, status).await?;
            if updated == 0 {
                anyhow::bail!("no application with id {id}");
            }
            println!("Application {id} is now {status}.");
        }
        Commands::DeleteApplication { id } => {
            let deleted = db::delete_application(&pool, id).await?;
            if deleted == 0 {
                anyhow::bail!("no application with id {id}");
            }
            println!("Application {id} deleted.");
        }
    }

    pool.close().await;
    Ok(())
}

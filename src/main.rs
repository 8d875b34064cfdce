mod commands;
mod render;

use anyhow::Result;
use clap::{Parser, Subcommand};
use meetgrid_core::MeetGridConfig;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Log filter variable, e.g. MEETGRID_LOG=meetgrid_core=debug
const LOG_ENV: &str = "MEETGRID_LOG";

#[derive(Parser)]
#[command(name = "meetgrid")]
#[command(about = "Propose meeting slots, mark availability and see when everyone can make it")]
struct Cli {
    /// Minutes between slots (overrides granularity_minutes from config.toml)
    #[arg(long, global = true)]
    granularity: Option<u32>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an event from candidate dates and their time windows
    Create {
        #[arg(short, long)]
        title: String,

        #[arg(short, long)]
        description: Option<String>,

        /// IANA timezone (defaults to the local zone)
        #[arg(long)]
        timezone: Option<String>,

        /// Candidate date with its window, e.g. "11/01/2024=09:00-17:00"
        #[arg(short, long = "range", required = true)]
        ranges: Vec<String>,

        /// Print a share link rooted at this URL
        #[arg(long)]
        link: Option<String>,
    },
    /// Show the slot grid of an event
    Grid { event_id: String },
    /// Toggle (or set) your availability for slots
    Mark {
        event_id: String,

        /// Your display name
        #[arg(short, long)]
        name: String,

        /// Slots as "MM/DD/YYYY HH:mm" (or "MM/DD/YYYY 9:00 AM")
        #[arg(required = true)]
        slots: Vec<String>,

        /// Mark the slots available instead of toggling
        #[arg(long, conflicts_with = "off")]
        on: bool,

        /// Mark the slots unavailable instead of toggling
        #[arg(long)]
        off: bool,
    },
    /// Show who is available when
    Show {
        event_id: String,

        /// Highlight this participant's own selection
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Follow availability changes until interrupted
    Watch {
        event_id: String,

        #[arg(short, long)]
        name: Option<String>,
    },
    /// Decode an event payload or share link
    Decode { payload: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();
    let config = load_config(cli.granularity)?;

    match cli.command {
        Commands::Create {
            title,
            description,
            timezone,
            ranges,
            link,
        } => commands::create::run(&config, title, description, timezone, ranges, link).await,
        Commands::Grid { event_id } => commands::grid::run(&config, &event_id).await,
        Commands::Mark {
            event_id,
            name,
            slots,
            on,
            off,
        } => {
            let mode = match (on, off) {
                (true, _) => commands::mark::MarkMode::Set(true),
                (_, true) => commands::mark::MarkMode::Set(false),
                _ => commands::mark::MarkMode::Toggle,
            };
            commands::mark::run(&config, &event_id, &name, &slots, mode).await
        }
        Commands::Show { event_id, name } => {
            commands::show::run(&config, &event_id, name.as_deref()).await
        }
        Commands::Watch { event_id, name } => {
            commands::watch::run(&config, &event_id, name.as_deref()).await
        }
        Commands::Decode { payload } => commands::decode::run(&payload),
    }
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config(granularity: Option<u32>) -> Result<MeetGridConfig> {
    let config = MeetGridConfig::load()?;
    match granularity {
        Some(minutes) => Ok(config.with_granularity(minutes)?),
        None => Ok(config),
    }
}

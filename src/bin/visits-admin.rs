use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use visits::config::Config;
use visits::storage;

#[derive(Parser)]
#[command(name = "visits-admin")]
#[command(about = "Visits admin management CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the visits table
    Migrate,
    /// List the most recent visits
    List {
        /// Maximum number of rows
        #[arg(short, long, default_value_t = 20)]
        limit: i64,
    },
    /// Show the most viewed pages
    Top {
        /// Maximum number of rows
        #[arg(short, long, default_value_t = 10)]
        limit: i64,
    },
}

fn format_timestamp(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ts.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let storage = storage::connect(&config.database)
        .await
        .context("failed to connect to database")?;

    match cli.command {
        Commands::Migrate => {
            storage.init().await?;
            println!("✓ Visits table is ready");
        }
        Commands::List { limit } => {
            let visits = storage.list(limit, 0).await?;
            if visits.is_empty() {
                println!("No visits recorded.");
            } else {
                println!(
                    "{:<20} {:<40} {:<40} {:>6}",
                    "Created", "URL", "Visitor", "Views"
                );
                println!("{}", "-".repeat(110));
                for visit in visits {
                    let visitor = visit
                        .user_id
                        .as_deref()
                        .or(visit.ip_address.as_deref())
                        .unwrap_or(visit.session_id.as_str());
                    println!(
                        "{:<20} {:<40} {:<40} {:>6}",
                        format_timestamp(visit.created_at),
                        format!("{}{}", visit.host, visit.path),
                        visitor,
                        visit.views
                    );
                }
            }
        }
        Commands::Top { limit } => {
            let rows = storage.top_paths(limit).await?;
            if rows.is_empty() {
                println!("No visits recorded.");
            } else {
                println!("{:<60} {:>8} {:>8}", "Page", "Visits", "Views");
                println!("{}", "-".repeat(80));
                for row in rows {
                    println!(
                        "{:<60} {:>8} {:>8}",
                        format!("{}{}", row.host, row.path),
                        row.visits,
                        row.views
                    );
                }
            }
        }
    }

    Ok(())
}

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use ledgerbook::cli::{handle_history_command, HistoryCommands};
use ledgerbook::config::{LedgerPaths, Settings};

#[derive(Parser)]
#[command(
    name = "ledgerbook",
    version,
    about = "Change history for multi-tenant bookkeeping records",
    long_about = "Ledgerbook records every create, update and delete of a tenant's \
                  bookkeeping records and lets you browse that history: who changed \
                  what, when, and the before/after values."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Browse recorded changes
    #[command(subcommand, alias = "log")]
    History(HistoryCommands),

    /// Show current configuration and paths
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize paths and settings
    let paths = LedgerPaths::new()?;
    let settings = Settings::load_or_create(&paths)?;

    init_logging(&settings)?;

    match cli.command {
        Some(Commands::History(cmd)) => {
            handle_history_command(&paths, &settings, cmd).await?;
        }
        Some(Commands::Config) => {
            println!("Ledgerbook Configuration");
            println!("========================");
            println!("Base directory: {}", paths.base_dir().display());
            println!("Data directory: {}", paths.data_dir().display());
            println!("Audit log:      {}", paths.audit_log().display());
            println!();
            println!("Settings:");
            println!("  Audit enabled:       {}", settings.audit.enabled);
            println!("  Queue capacity:      {}", settings.audit.queue_capacity);
            println!("  Default page size:   {}", settings.query.default_page_size);
            println!("  Max page size:       {}", settings.query.max_page_size);
            println!("  Stats window (days): {}", settings.query.stats_window_days);
            println!(
                "  Logging:             {} ({})",
                settings.logging.level, settings.logging.format
            );
        }
        None => {
            println!("Ledgerbook - change history for bookkeeping records");
            println!();
            println!("Run 'ledgerbook --help' for usage information.");
            println!("Run 'ledgerbook history list --owner <id>' to browse changes.");
        }
    }

    Ok(())
}

/// Log to stderr so command output on stdout stays machine-readable
fn init_logging(settings: &Settings) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level));

    match settings.logging.format.to_lowercase().as_str() {
        "json" => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()?,
        _ => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().pretty().with_writer(std::io::stderr))
            .try_init()?,
    }

    Ok(())
}

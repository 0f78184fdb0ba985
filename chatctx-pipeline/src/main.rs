use clap::{Parser, Subcommand};
use chatctx_core::{ChatCtxConfig, ChatCtxError};
use tracing_subscriber::{fmt, EnvFilter};

use chatctx_pipeline::pipeline;
use chatctx_pipeline::subsystems::{clean, extract};

#[derive(Parser, Debug)]
#[command(author, version, about = "Clean chat exports and extract a context profile per chat", long_about = None)]
struct Args {
    #[arg(short, long, env = "CHATCTX_CONFIG", default_value = "chatctx.toml")]
    config: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Clean raw exports, then extract profiles (default)
    Run,
    /// Only clean raw exports into JSON
    Clean,
    /// Only extract profiles from already-cleaned JSON
    Extract,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (holds the API key in development)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Init logging
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load config
    let config = match ChatCtxConfig::load(&args.config).map_err(ChatCtxError::from) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    let failed = match args.command.unwrap_or(Command::Run) {
        Command::Clean => {
            let report = clean::run_clean(&config)?;
            tracing::info!(
                cleaned = report.files_cleaned,
                failed = report.files_failed,
                "Cleaning finished"
            );
            report.is_total_failure()
        }
        Command::Extract => {
            let backend = extract::create_backend_from_config(&config)?;
            let report = extract::run_extract(&config, backend.as_ref()).await?;
            tracing::info!(
                written = report.profiles_written,
                failed = report.files_failed,
                "Extraction finished"
            );
            report.is_total_failure()
        }
        Command::Run => {
            // Fail on a missing key before touching any files.
            let backend = extract::create_backend_from_config(&config)?;
            pipeline::run_pipeline(&config, backend.as_ref())
                .await?
                .is_failure()
        }
    };

    if failed {
        tracing::error!("No output was produced");
        std::process::exit(1);
    }

    Ok(())
}

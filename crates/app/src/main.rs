use std::path::PathBuf;

use clap::Parser;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::writer::MakeWriterExt;

use murmur_app::runtime::{self, AppHandle, AppRuntimeOptions};
use murmur_app::settings::AppSettings;

#[derive(Parser, Debug)]
#[command(name = "murmur", about = "Desktop dictation engine", version)]
struct Cli {
    /// Path to the settings file (TOML). Defaults are used if absent.
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Input device name, overriding the settings file.
    #[arg(long)]
    device: Option<String>,
}

fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all("logs")?;
    let file_appender = RollingFileAppender::new(Rotation::DAILY, "logs", "murmur.log");
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_writer(std::io::stdout.and(non_blocking_file))
        .with_env_filter(log_level)
        .init();
    // The writer guard must outlive main for the file sink to keep flushing.
    std::mem::forget(guard);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging()?;
    let cli = Cli::parse();
    tracing::info!("starting Murmur");

    let settings = AppSettings::load(cli.settings.as_deref())?;
    let opts = AppRuntimeOptions {
        settings_path: cli.settings,
        device: cli.device,
    };

    let handle = runtime::start(settings, opts).await?;

    AppHandle::wait_for_shutdown_signal().await;
    handle.shutdown().await;
    Ok(())
}

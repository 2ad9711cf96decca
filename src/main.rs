//! bisub - bilingual subtitle pipeline
//!
//! Transcribes a video, translates the transcript, writes a subtitle track
//! and burns it back into the video with the best available encoder.

use anyhow::Result;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, Level};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use bisub::cli::Args;
use bisub::config::Config;
use bisub::probe::HostPlatform;
use bisub::runner::SystemRunner;
use bisub::translate::GoogleTranslateEndpoint;
use bisub::workflow::Workflow;

const DEFAULT_CONFIG: &str = "bisub.toml";

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let logging = setup_logging(args.verbose);
    if let Err(e) = &logging {
        eprintln!("Warning: {}", e);
    }

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report_failure(&e, logging.is_ok());
            ExitCode::from(1)
        }
    }
}

/// Fatal diagnostic: through the console layer when logging is up, else straight to stderr
fn report_failure(e: &anyhow::Error, logging_ready: bool) {
    if logging_ready {
        error!("{:#}", e);
    } else {
        eprintln!("Error: {}", failure_message(e));
    }
}

fn failure_message(e: &anyhow::Error) -> String {
    format!("{:#}", e)
}

async fn run(args: Args) -> Result<()> {
    // Flag conflicts are rejected before any stage runs
    let request = args.run_request()?;

    let mut config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            if Path::new(DEFAULT_CONFIG).exists() {
                info!("Found {} in current directory, loading...", DEFAULT_CONFIG);
                Config::from_file(DEFAULT_CONFIG)?
            } else {
                Config::default()
            }
        }
    };
    args.apply_to(&mut config);
    config.validate()?;

    let endpoint = GoogleTranslateEndpoint::new(config.translate.endpoint.clone())?;
    let workflow = Workflow::new(config, Arc::new(SystemRunner), Arc::new(endpoint), HostPlatform::current());

    let summary = workflow.run(&request).await?;
    println!("{}", summary.render());

    info!("bisub completed successfully");
    Ok(())
}

/// Create `<base>/.bisub/log`, `None` when it cannot be created
fn open_log_dir(base: &Path) -> Option<PathBuf> {
    let log_dir = base.join(".bisub").join("log");
    match std::fs::create_dir_all(&log_dir) {
        Ok(()) => Some(log_dir),
        Err(e) => {
            eprintln!("Warning: cannot create {} ({}), logging to console only", log_dir.display(), e);
            None
        }
    }
}

/// Setup logging to the console, plus a daily file when the log directory is writable
fn setup_logging(verbose: bool) -> Result<()> {
    let log_dir = std::env::current_dir().ok().and_then(|dir| open_log_dir(&dir));

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    let file_layer = log_dir.as_ref().map(|dir| {
        let (non_blocking_file, guard) = non_blocking(rolling::daily(dir, "bisub.log"));
        // Keep the guard alive for the duration of the program
        std::mem::forget(guard);

        fmt::layer()
            .with_writer(non_blocking_file)
            .with_target(false)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(false)
    });

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    match &log_dir {
        Some(dir) => info!("Logging initialized - console: {}, file: {}", log_level, dir.join("bisub.log").display()),
        None => info!("Logging initialized - console: {}", log_level),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bisub::error::BisubError;

    #[test]
    fn test_log_dir_created_under_base() {
        let temp = tempfile::tempdir().unwrap();
        let dir = open_log_dir(temp.path()).unwrap();
        assert!(dir.ends_with(".bisub/log"));
        assert!(dir.is_dir());
    }

    #[test]
    fn test_unwritable_log_dir_falls_back_to_console() {
        let temp = tempfile::tempdir().unwrap();
        // A regular file where the directory should go cannot be created into
        let blocker = temp.path().join("blocked");
        std::fs::write(&blocker, b"").unwrap();
        assert!(open_log_dir(&blocker).is_none());
    }

    #[test]
    fn test_failure_message_names_the_fatal_condition() {
        let e: anyhow::Error = BisubError::MissingInput("talk.mp4".to_string()).into();
        assert_eq!(failure_message(&e), "Input video not found: talk.mp4");

        let e: anyhow::Error = BisubError::NoEncoderAvailable.into();
        assert!(failure_message(&e).contains("libx264"));
    }
}

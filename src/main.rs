#![warn(clippy::all, rust_2018_idioms)]

use anyhow::Context;
use clap::Parser;
use std::io::BufWriter;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::prelude::*;

use cwtail::app::cli::{Cli, Settings};
use cwtail::app::credentials::{build_sdk_config, CredentialProvider};
use cwtail::app::data_plane::{CloudWatchLogsClient, LogsApi};
use cwtail::app::log_merge::{Driver, LineSink, RunOutcome};
use cwtail::app::ConfigError;

const EXIT_FAILURE: u8 = 1;
const EXIT_USAGE: u8 = 2;
const EXIT_INTERRUPTED: u8 = 130;

fn init_logging(verbose: bool, log_file: Option<&Path>) -> anyhow::Result<()> {
    // RUST_LOG overrides the verbosity flag
    let default_directive = if verbose {
        "cwtail=debug,aws_config=info"
    } else {
        "cwtail=warn"
    };
    let stderr_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));

    let file_layer = match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .append(true)
                .create(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {:?}", path))?;

            // Set restrictive permissions (owner read/write only)
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                if let Ok(metadata) = file.metadata() {
                    let mut perms = metadata.permissions();
                    perms.set_mode(0o600);
                    if let Err(e) = std::fs::set_permissions(path, perms) {
                        eprintln!("[SECURITY] Failed to set log file permissions: {}", e);
                    }
                }
            }

            let filter = tracing_subscriber::EnvFilter::builder()
                .parse("cwtail=debug,aws_config=info,aws_smithy_runtime=warn,hyper=warn")
                .context("Failed to parse log file filter")?;

            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::sync::Mutex::new(file))
                    .with_ansi(false) // No ANSI colors in file
                    .with_filter(filter),
            )
        }
        None => None,
    };

    let subscriber = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(stderr_filter),
        )
        .with(file_layer);

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    // Bridge log crate events (reqwest, hyper) to tracing
    tracing_log::LogTracer::init().context("Failed to initialize log-to-tracing bridge")?;

    Ok(())
}

fn setup_panic_handler() {
    // Write a crash report to the data dir as well as stderr
    std::panic::set_hook(Box::new(|panic_info| {
        let crash_msg = format!(
            "cwtail crashed!\n\
             Panic occurred at: {}\n\
             Details: {}\n\
             Backtrace:\n{:?}\n",
            panic_info
                .location()
                .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
                .unwrap_or_else(|| "unknown location".to_string()),
            panic_info
                .payload()
                .downcast_ref::<&str>()
                .copied()
                .or_else(|| panic_info.payload().downcast_ref::<String>().map(|s| s.as_str()))
                .unwrap_or("unknown panic"),
            std::backtrace::Backtrace::force_capture()
        );

        if let Some(proj_dirs) = directories::ProjectDirs::from("com", "", "cwtail") {
            let log_dir = proj_dirs.data_dir().join("logs");
            let _ = std::fs::create_dir_all(&log_dir);
            let crash_log_path = log_dir.join("crash.log");

            if let Ok(mut file) = std::fs::OpenOptions::new()
                .append(true)
                .create(true)
                .open(&crash_log_path)
            {
                use std::io::Write;
                let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
                let _ = writeln!(file, "\n=== CRASH at {} ===\n{}", timestamp, crash_msg);
            }

            eprintln!("\n{}", crash_msg);
            eprintln!("Crash log written to: {:?}", crash_log_path);
        } else {
            eprintln!("\n{}", crash_msg);
        }
    }));
}

/// First Ctrl-C cancels cooperatively, a second one exits immediately.
fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            tracing::warn!("Unable to listen for Ctrl-C");
            return;
        }
        tracing::debug!("Interrupt received, stopping after the current step");
        cancel.cancel();

        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Interrupted");
            std::process::exit(i32::from(EXIT_INTERRUPTED));
        }
    });
}

async fn run(settings: Settings, cancel: CancellationToken) -> anyhow::Result<RunOutcome> {
    let credentials = CredentialProvider::new(settings.profile.clone(), settings.config_path.clone())
        .acquire()
        .await?;
    let sdk_config = build_sdk_config(&credentials, &settings.region).await;
    let api: Arc<dyn LogsApi> = Arc::new(CloudWatchLogsClient::new(&sdk_config));

    let stdout = std::io::stdout();
    let mut sink = LineSink::new(BufWriter::new(stdout.lock()), settings.output)
        .with_flush_each(settings.request.follow);

    let mut driver = Driver::new(api, settings.request, cancel);
    let outcome = driver.run(&mut sink).await;

    // Keep whatever was already printed, even on failure
    let flushed = sink.flush();
    let outcome = outcome?;
    flushed?;
    Ok(outcome)
}

fn main() -> ExitCode {
    setup_panic_handler();

    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.verbose, cli.log_file.as_deref()) {
        eprintln!("Error: {:#}", e);
        return ExitCode::from(EXIT_FAILURE);
    }

    tracing::debug!("Options: {:?}", cli);

    let settings = match cli.into_settings(chrono::Utc::now()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_USAGE);
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: failed to start runtime: {}", e);
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    let cancel = CancellationToken::new();
    let result = runtime.block_on(async {
        spawn_interrupt_handler(cancel.clone());
        run(settings, cancel.clone()).await
    });

    match result {
        Ok(RunOutcome::Completed { events, streams }) => {
            tracing::info!("Done: {} events from {} streams", events, streams);
            ExitCode::SUCCESS
        }
        Ok(RunOutcome::Cancelled { events, .. }) => {
            eprintln!("Interrupted after {} events", events);
            ExitCode::from(EXIT_INTERRUPTED)
        }
        Err(e) if e.downcast_ref::<ConfigError>().is_some() => {
            eprintln!("Error: {}", e);
            ExitCode::from(EXIT_USAGE)
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

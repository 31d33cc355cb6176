//! `cmdwatch` -- launch one command on the job service and wait for it.
//!
//! Activates a command tracker (push listener + watchdog), optionally
//! bridges the backend's push socket onto the event bus, launches the
//! command and prints its outcome as JSON.
//!
//! # Usage
//!
//! ```text
//! cmdwatch <launch-path> [json-body]
//! ```
//!
//! # Environment variables
//!
//! See [`TrackerConfig::from_env`]. `RUST_LOG` controls log verbosity
//! (default `cmdwatch=info`).

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context};
use cmdwatch_core::extract_error_message;
use cmdwatch_events::{EventBus, PushBridge};
use cmdwatch_tracker::{CommandOutcome, CommandTracker, HttpJobService, TrackerConfig};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cmdwatch=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run().await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "cmdwatch failed");
            ExitCode::FAILURE
        }
    }
}

/// Returns whether the command succeeded.
async fn run() -> anyhow::Result<bool> {
    let mut args = std::env::args().skip(1);
    let Some(path) = args.next() else {
        bail!("usage: cmdwatch <launch-path> [json-body]");
    };
    let body: serde_json::Value = match args.next() {
        Some(raw) => serde_json::from_str(&raw).context("json-body is not valid JSON")?,
        None => serde_json::json!({}),
    };

    let config = TrackerConfig::from_env()?;
    let service = Arc::new(HttpJobService::new(&config)?);
    let bus = Arc::new(EventBus::default());

    let bridge_cancel = CancellationToken::new();
    let bridge_task = config.push_url.clone().map(|url| {
        let bus = Arc::clone(&bus);
        let cancel = bridge_cancel.clone();
        tokio::spawn(async move {
            PushBridge::new(url).run(&bus, cancel).await;
        })
    });
    if bridge_task.is_none() {
        tracing::info!("CMDWATCH_PUSH_URL not set, relying on the watchdog alone");
    }

    let tracker = CommandTracker::activate(service, &bus, &config);

    tracing::info!(path = %path, api_url = %config.api_url, "Launching command");
    let result = tokio::select! {
        launched = launch_and_report(&tracker, &path, &body) => launched,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted, abandoning pending commands");
            Ok(false)
        }
    };

    tracker.teardown().await;
    bridge_cancel.cancel();
    if let Some(task) = bridge_task {
        let _ = task.await;
    }

    result
}

async fn launch_and_report(
    tracker: &CommandTracker,
    path: &str,
    body: &serde_json::Value,
) -> anyhow::Result<bool> {
    let handle = tracker.launch_and_wait(path, body).await?;
    tracing::info!(correlation_id = %handle.id(), "Waiting for command");

    let Some(outcome) = handle.wait().await else {
        bail!("command tracker stopped before the command finished");
    };

    match outcome {
        CommandOutcome::Succeeded(response) => {
            let results = response
                .result
                .map(|r| serde_json::Value::Array(r.results))
                .unwrap_or(serde_json::Value::Null);
            println!("{}", serde_json::to_string_pretty(&results)?);
            Ok(true)
        }
        CommandOutcome::Failed(response) => {
            let message = extract_error_message(&response)
                .unwrap_or_else(|| "command failed without detail".to_string());
            println!("{}", serde_json::json!({ "error": message }));
            Ok(false)
        }
    }
}

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use colored::Colorize;
use serde_json::json;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::sleep;

use txlog_core::{Callback, Level, LogError, LogSession, MessageRecord, Options};
use txlog_logging::RecordWriter;

use crate::viz::{describe, print_chart};

pub struct DemoOptions {
    pub verbosity: Option<Level>,
    pub output: Option<PathBuf>,
    pub json: bool,
    pub width: usize,
}

/// Simulate one request handled by several concurrent tasks. The record is
/// delivered when the slowest task lets go of its session clone.
pub async fn handle_demo_command(options: DemoOptions) -> Result<()> {
    let writer = match &options.output {
        Some(path) => Some(Arc::new(
            RecordWriter::create(path)
                .with_context(|| format!("Failed to open {}", path.display()))?,
        )),
        None => None,
    };

    let (tx, rx) = oneshot::channel();
    let session_options = match options.verbosity {
        Some(level) => Options::default().with_verbosity(level),
        None => Options::default(),
    };
    let forward = move |record: MessageRecord| {
        let _ = tx.send(record);
    };
    let callback: Callback = match &writer {
        Some(writer) => Box::new(writer.callback_then(forward)),
        None => Box::new(forward),
    };
    let session = LogSession::builder()
        .options(session_options)
        .callback(callback)
        .build()?;

    run_request(session).await?;

    let record = rx
        .await
        .context("Session finished without delivering a record")?;

    if options.json {
        println!("{}", serde_json::to_string_pretty(&record)?);
        return Ok(());
    }

    println!("{}", describe(0, &record).dimmed());
    print_chart(&record, options.width)?;
    if let Some(path) = &options.output {
        eprintln!(
            "  {} {}",
            "->".bright_green(),
            format!("Record appended to {}", path.display()).bold()
        );
    }
    Ok(())
}

/// Handle the request, then wait for work that outlives the reply.
async fn run_request(session: LogSession) -> Result<()> {
    let refresh = simulate_request(session).await?;
    refresh.await.context("cache refresh task panicked")??;
    Ok(())
}

/// Returns the background cache refresh, which still holds a session clone.
async fn simulate_request(session: LogSession) -> Result<JoinHandle<Result<(), LogError>>> {
    session.info([json!("request received"), json!({"path": "/profile/42"})]);
    session.event("accepted")?;
    session.set("path", "/profile/42");

    let download = tokio::spawn({
        let session = session.clone();
        async move {
            let _timer = session.timer("download file")?;
            sleep(Duration::from_millis(100)).await;
            session.debug(["downloaded avatar"]);
            Ok::<_, LogError>(())
        }
    });

    let cache = session.timer("cache lookup")?;
    sleep(Duration::from_millis(30)).await;
    cache.stop();
    session.debug_with(|| [json!("cache miss"), json!({"key": "profile:42"})]);

    // Refreshing the cache outlives the reply; the record waits for it.
    let refresh = tokio::spawn({
        let session = session.clone();
        async move {
            let _timer = session.timer("update cache")?;
            sleep(Duration::from_millis(85)).await;
            session.info(["cache refreshed"]);
            Ok::<_, LogError>(())
        }
    });

    let db = session.timer("DB lookup")?;
    sleep(Duration::from_millis(50)).await;
    db.stop();
    session.set("rows", 1);

    download.await.context("download task panicked")??;

    session.timed("sent reply", || {
        session.set("status", 200);
    })?;
    session.info(["reply sent"]);
    Ok(refresh)
}

//! updrop command line: submit files to the store and watch progress.
//!
//! Endpoint resolution order: `--endpoint`, then `UPDROP_ENDPOINT`, then
//! the local default.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use updrop_compress::ImageCompressor;
use updrop_store_client::HttpStoreClient;
use updrop_uploads::{StagedFile, UploadEvent, UploadManager, UploadStatus};

const DEFAULT_ENDPOINT: &str = "http://localhost:3333/uploads";

#[derive(Parser)]
#[command(name = "updrop", about = "Upload files to the remote store")]
struct Cli {
    /// Store upload endpoint
    #[arg(long)]
    endpoint: Option<String>,

    /// Files to upload
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let endpoint = cli
        .endpoint
        .or_else(|| std::env::var("UPDROP_ENDPOINT").ok())
        .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());

    let mut files = Vec::with_capacity(cli.files.len());
    for path in &cli.files {
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("file")
            .to_string();
        files.push(StagedFile::new(name, data));
    }

    let manager = UploadManager::new(
        Arc::new(ImageCompressor::new()),
        Arc::new(HttpStoreClient::new(endpoint)),
    );
    let mut events = manager
        .take_events()
        .await
        .context("event stream already taken")?;

    let ids = manager.submit(files);
    info!(count = ids.len(), "uploads submitted");

    // Change notifications are best-effort; re-check the projection on a
    // short timeout so a dropped event cannot stall the loop.
    let mut last_percentage = None;
    loop {
        let progress = manager.overall_progress();
        if last_percentage != Some(progress.percentage) {
            info!(percent = progress.percentage, "overall progress");
            last_percentage = Some(progress.percentage);
        }
        if !progress.any_in_progress {
            break;
        }

        match tokio::time::timeout(Duration::from_millis(250), events.recv()).await {
            Ok(Some(UploadEvent::Finished { id, status })) => {
                let upload = manager.get(&id);
                let name = upload.as_ref().map(|u| u.name.as_str()).unwrap_or("?");
                match status {
                    UploadStatus::Completed => {
                        let url = upload
                            .as_ref()
                            .and_then(|u| u.remote_url.as_deref())
                            .unwrap_or("");
                        info!(name, url, "upload completed");
                    }
                    UploadStatus::Failed => warn!(name, "upload failed"),
                    UploadStatus::Cancelled => warn!(name, "upload cancelled"),
                    UploadStatus::InProgress => {}
                }
            }
            Ok(Some(UploadEvent::Updated { .. })) => {}
            Ok(None) => break,
            Err(_) => {}
        }
    }

    let failed = manager
        .uploads()
        .iter()
        .filter(|u| u.status == UploadStatus::Failed)
        .count();
    if failed > 0 {
        anyhow::bail!("{failed} upload(s) failed");
    }
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

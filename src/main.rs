use std::path::Path;

use receipt_ingest::config::Config;
use receipt_ingest::ocr_client::{HttpOcrEngine, recognize_with_timeout};
use receipt_ingest::receipt_db::ReceiptStore;
use receipt_ingest::{OcrFragment, OcrPayload, ReceiptPipeline, ScanOutcome};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: receipt_ingest <scan IMAGE | parse OCR_JSON | stats>";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = Config::load_default()?;

    // RUST_LOG wins over the configured filter
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.log_filter));
    tracing_subscriber::fmt()
        .with_target(true)
        .with_level(true)
        .with_env_filter(filter)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = args.first().map(String::as_str);

    // Registry problems are fatal before any scan runs.
    let pipeline = ReceiptPipeline::with_builtin_registry()?;

    if let Some(parent) = Path::new(&cfg.db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let db = ReceiptStore::new(&cfg.db_path)?;

    match (command, args.get(1)) {
        (Some("scan"), Some(image_path)) => {
            let image = tokio::fs::read(image_path).await?;
            let engine = HttpOcrEngine::from_config(&cfg.ocr);
            if !engine.is_reachable().await {
                warn!(url = %engine.base_url(), "OCR health check failed, trying anyway");
            }

            let payload = match recognize_with_timeout(&engine, &image, cfg.ocr.timeout()).await {
                Ok(payload) => payload,
                Err(e) => {
                    error!(error = %e, image = %image_path, "OCR failed; retry the capture");
                    return Err(e.into());
                }
            };
            let outcome = pipeline.process(&payload.results);
            report(&db, &outcome)?;
        }
        (Some("parse"), Some(json_path)) => {
            let content = tokio::fs::read_to_string(json_path).await?;
            let fragments = read_fragments(&content)?;
            info!(path = %json_path, fragments = fragments.len(), "Loaded OCR output");
            let outcome = pipeline.process(&fragments);
            report(&db, &outcome)?;
        }
        (Some("stats"), _) => {}
        _ => {
            eprintln!("{USAGE}");
            return Err(USAGE.into());
        }
    }

    let (total, valid, needs_review, rejected) = db.get_counts()?;
    info!(
        receipts_total = total,
        valid, needs_review, rejected, "Database statistics"
    );

    Ok(())
}

/// Accepts either the OCR service response or a bare fragment array.
fn read_fragments(content: &str) -> Result<Vec<OcrFragment>, serde_json::Error> {
    match serde_json::from_str::<OcrPayload>(content) {
        Ok(payload) => Ok(payload.results),
        Err(_) => serde_json::from_str::<Vec<OcrFragment>>(content),
    }
}

fn report(db: &ReceiptStore, outcome: &ScanOutcome) -> Result<(), Box<dyn std::error::Error>> {
    let uid = db.save(&outcome.receipt, &outcome.verdict)?;
    if let Some(first) = outcome.verdict.issues.first() {
        info!(uid = %uid, issue = %first, "First issue");
    }
    println!("{}", serde_json::to_string_pretty(outcome)?);
    Ok(())
}

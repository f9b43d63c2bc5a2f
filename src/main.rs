// =============================================================================
// alpha-fusion — one-shot runner
// =============================================================================
//
// Loads the pipeline config, reads an observation bundle (JSON) gathered by
// the collectors, runs every modality branch concurrently and persists the
// resulting signal:
//
//   ALPHA_HISTORY          append-only JSONL history (idempotent)
//   <history>.latest.json  most recent signal, replaced atomically
//   <history>.latest.md    Markdown report
//
// Scheduling and delivery are left to the caller (cron, systemd timer, ...).
// =============================================================================

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use alpha_fusion::history::{self, AppendOutcome, SignalHistory};
use alpha_fusion::report;
use alpha_fusion::sentiment::LexiconClassifier;
use alpha_fusion::{ObservationBundle, PipelineConfig, SignalPipeline};

const DEFAULT_CONFIG_PATH: &str = "alpha_config.json";
const DEFAULT_HISTORY_PATH: &str = "signals.jsonl";

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config_path = std::env::var("ALPHA_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let mut config = if Path::new(&config_path).exists() {
        PipelineConfig::load(&config_path)?
    } else {
        warn!(path = %config_path, "config file not found, using defaults");
        PipelineConfig::default()
    };

    if let Ok(symbol) = std::env::var("ALPHA_SYMBOL") {
        let symbol = symbol.trim().to_uppercase();
        if !symbol.is_empty() {
            config.symbol = symbol;
        }
    }

    let history_path = PathBuf::from(
        std::env::var("ALPHA_HISTORY").unwrap_or_else(|_| DEFAULT_HISTORY_PATH.to_string()),
    );

    // ── 2. Observations ──────────────────────────────────────────────────
    let bundle = match std::env::args().nth(1) {
        Some(path) => load_bundle(Path::new(&path))?,
        None => {
            warn!("no observation bundle given, running with empty batches");
            ObservationBundle::new(Utc::now())
        }
    };

    info!(
        symbol = %config.symbol,
        as_of = %bundle.as_of,
        candles = bundle.candles.len(),
        news = bundle.news.len(),
        futures = bundle.futures.len(),
        onchain = bundle.onchain.len(),
        orderbook = bundle.orderbook.len(),
        "observation bundle ready"
    );

    // ── 3. Run ───────────────────────────────────────────────────────────
    let pipeline = Arc::new(SignalPipeline::new(config, Arc::new(LexiconClassifier::default()))?);
    let signal = pipeline.run_concurrent(Arc::new(bundle)).await?;

    // ── 4. Persist ───────────────────────────────────────────────────────
    let history = SignalHistory::new(&history_path);
    if history.append(&signal)? == AppendOutcome::Duplicate {
        warn!(content_hash = %signal.content_hash, "identical signal already in history");
    }

    let latest_path = history_path.with_extension("latest.json");
    history::write_latest(&signal, &latest_path)?;

    let report_path = history_path.with_extension("latest.md");
    history::write_atomic(&report_path, &report::render_markdown(&signal))?;

    info!(
        direction = %signal.direction_final,
        confidence = signal.conf_final,
        fused = signal.fused.fused_score,
        report = %report_path.display(),
        "done"
    );
    Ok(())
}

fn load_bundle(path: &Path) -> Result<ObservationBundle> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read observation bundle from {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("failed to parse observation bundle from {}", path.display()))
}

// src/main.rs
use anyhow::{bail, Context, Result};
use counterparty_matching::config::MatchingConfig;
use counterparty_matching::models::processing::Decision;
use counterparty_matching::orchestrator::{
    DocumentPair, FieldPresenceTypeDetector, JsonExtractor, MatchingOrchestrator,
};
use counterparty_matching::store::{InMemoryStore, LoanIqStore, RecordStore};
use counterparty_matching::utils::{db_connect, load_env};
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One line of the batch manifest: paths to pre-extracted form records.
#[derive(Debug, Deserialize)]
struct ManifestEntry {
    reference_id: String,
    primary: PathBuf,
    #[serde(default)]
    tax: Option<PathBuf>,
}

struct CliArgs {
    manifest: PathBuf,
    store_fixture: Option<PathBuf>,
    output: Option<PathBuf>,
}

fn parse_args() -> Result<CliArgs> {
    let mut manifest = None;
    let mut store_fixture = None;
    let mut output = None;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--store-fixture" => {
                store_fixture = Some(PathBuf::from(
                    args.next().context("--store-fixture requires a path")?,
                ));
            }
            "--output" => {
                output = Some(PathBuf::from(args.next().context("--output requires a path")?));
            }
            "--help" | "-h" => {
                eprintln!(
                    "Usage: counterparty-matching <manifest.json> [--store-fixture records.json] [--output results.json]"
                );
                std::process::exit(0);
            }
            other if manifest.is_none() => manifest = Some(PathBuf::from(other)),
            other => bail!("Unexpected argument: {}", other),
        }
    }

    Ok(CliArgs {
        manifest: manifest.context("A batch manifest path is required")?,
        store_fixture,
        output,
    })
}

fn load_document_pairs(manifest_path: &Path) -> Result<Vec<DocumentPair>> {
    let manifest_raw = fs::read(manifest_path)
        .with_context(|| format!("Failed to read manifest {}", manifest_path.display()))?;
    let entries: Vec<ManifestEntry> =
        serde_json::from_slice(&manifest_raw).context("Failed to parse batch manifest")?;
    let base = manifest_path.parent().unwrap_or_else(|| Path::new("."));

    let mut pairs = Vec::with_capacity(entries.len());
    for entry in entries {
        let primary_path = base.join(&entry.primary);
        let primary_content = fs::read(&primary_path)
            .with_context(|| format!("Failed to read {}", primary_path.display()))?;

        let (tax_content, tax_filename) = match entry.tax {
            Some(tax) => {
                let tax_path = base.join(&tax);
                let content = fs::read(&tax_path)
                    .with_context(|| format!("Failed to read {}", tax_path.display()))?;
                (Some(content), Some(tax_path.display().to_string()))
            }
            None => (None, None),
        };

        pairs.push(DocumentPair {
            reference_id: entry.reference_id,
            primary_content,
            primary_filename: primary_path.display().to_string(),
            tax_content,
            tax_filename,
        });
    }
    Ok(pairs)
}

async fn build_store(args: &CliArgs, config: &MatchingConfig) -> Result<Arc<dyn RecordStore>> {
    match &args.store_fixture {
        Some(path) => {
            let raw = fs::read(path)
                .with_context(|| format!("Failed to read store fixture {}", path.display()))?;
            let records = serde_json::from_slice(&raw).context("Failed to parse store fixture")?;
            let store = InMemoryStore::new(records);
            info!("Using in-memory store fixture with {} records", store.len());
            Ok(Arc::new(store))
        }
        None => {
            let pool = db_connect::connect().await?;
            Ok(Arc::new(LoanIqStore::with_cache(
                pool,
                config.identifier_cache_capacity,
                config.identifier_cache_ttl,
            )))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    load_env();
    info!("Starting counterparty matching batch run");

    let args = parse_args()?;
    let config = MatchingConfig::from_env();
    config.log_config();

    let store = build_store(&args, &config).await?;
    let orchestrator = Arc::new(MatchingOrchestrator::new(
        store,
        Arc::new(JsonExtractor),
        Arc::new(FieldPresenceTypeDetector),
        config,
    ));

    let pairs = load_document_pairs(&args.manifest)?;
    info!("Loaded {} document pairs from manifest", pairs.len());

    let progress = ProgressBar::new(pairs.len() as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("█▉▊▋▌▍▎▏  "),
    );
    progress.set_message("Matching records...");

    let results = Arc::clone(&orchestrator)
        .process_batch(pairs, Some(progress.clone()))
        .await;
    progress.finish_with_message("Batch complete");
    orchestrator.shutdown().await;

    let mut counts = [0usize; 4];
    for result in &results {
        let slot = match result.decision {
            Decision::Match => 0,
            Decision::ManualReview => 1,
            Decision::NoMatch => 2,
            Decision::Error => 3,
        };
        counts[slot] += 1;

        let reference = result
            .metadata
            .get("reference_id")
            .and_then(|v| v.as_str())
            .unwrap_or("?");
        match &result.selected_match {
            Some(selected) => info!(
                "{}: {:?} -> {} (ID {}, score {:.1}, {})",
                reference,
                result.decision,
                selected.entity.full_name,
                selected.entity.entity_id,
                selected.score(),
                selected.confidence()
            ),
            None => info!("{}: {:?}", reference, result.decision),
        }
    }

    info!(
        "Batch summary: {} matched, {} manual review, {} no match, {} errors",
        counts[0], counts[1], counts[2], counts[3]
    );

    if let Some(output) = args.output {
        let serialized =
            serde_json::to_string_pretty(&results).context("Failed to serialize results")?;
        fs::write(&output, serialized)
            .with_context(|| format!("Failed to write {}", output.display()))?;
        info!("Results written to {}", output.display());
    }

    Ok(())
}

// src/bin/reconstruct_history.rs
use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info, warn};
use serde_json::Value as JsonValue;
use std::path::PathBuf;
use std::time::Instant;

use weather_lib::narrative::{CONFIDENCE_FIELD, PREDICTION_FIELD};
use weather_lib::timeseries::{MergePolicy, Pivoter, RawNarrowRecord};
use weather_lib::utils::artifact_config::ArtifactConfig;
use weather_lib::utils::env::load_env;
use weather_lib::utils::progress_config::ProgressConfig;
use weather_lib::WeatherService;

#[derive(Parser)]
#[command(author, version, about = "Pivot narrow sensor history into observations", long_about = None)]
struct ReconstructArgs {
    /// JSON array or JSON-lines file of {time, field, value} records
    #[arg(long)]
    input: PathBuf,

    /// Attach a weather prediction to every complete observation
    #[arg(long)]
    classify: bool,

    /// Locale for logged confidence wording (en, it)
    #[arg(long)]
    locale: Option<String>,

    /// Keep the first value reported for a repeated (time, field) pair
    #[arg(long)]
    first_write_wins: bool,

    /// Directory holding the descriptor and model
    #[arg(long)]
    artifact_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();
    load_env();
    let args = ReconstructArgs::parse();
    let start = Instant::now();

    let contents = std::fs::read_to_string(&args.input)
        .with_context(|| format!("Failed to read {}", args.input.display()))?;
    let records = parse_records(&contents)?;
    info!("Read {} narrow records from {}", records.len(), args.input.display());

    let policy = if args.first_write_wins {
        MergePolicy::FirstWriteWins
    } else {
        MergePolicy::LastWriteWins
    };
    let mut outcome = Pivoter::new(policy).pivot_raw(records);
    info!(
        "Reconstructed {} observations ({} records skipped)",
        outcome.observations.len(),
        outcome.warnings.len()
    );

    if args.classify {
        let mut config = ArtifactConfig::from_env();
        if let Some(dir) = &args.artifact_dir {
            config = config.with_artifact_dir(dir);
        }
        config.log_config();
        let service = WeatherService::load(&config).context("Failed to load weather classifier")?;
        let locale = args.locale.as_deref().unwrap_or(&config.default_locale);

        let progress = ProgressConfig::from_env();
        let pb = progress.create_bar(outcome.observations.len() as u64, "Classifying observations");
        let mut classified = 0usize;

        for obs in outcome.observations.iter_mut() {
            match service.judge(&obs.to_raw_observation(), Some(locale)) {
                Ok(judgment) => {
                    debug!("{}: {} ({})", obs.time, judgment.label, judgment.tier_label);
                    obs.fields
                        .insert(PREDICTION_FIELD.to_string(), JsonValue::from(judgment.label));
                    obs.fields.insert(
                        CONFIDENCE_FIELD.to_string(),
                        JsonValue::from(percent(judgment.confidence)),
                    );
                    classified += 1;
                }
                Err(e) => debug!("Leaving {} unclassified: {}", obs.time, e),
            }
            pb.inc(1);
        }
        pb.finish_with_message(format!("Classified {} observations", classified));

        let skipped = outcome.observations.len() - classified;
        if skipped > 0 {
            warn!("{} observations lacked features and were left unclassified", skipped);
        }
    }

    println!(
        "{}",
        serde_json::to_string_pretty(&outcome.observations)
            .context("Failed to serialize observations")?
    );
    info!("Done in {:.2?}", start.elapsed());
    Ok(())
}

/// A JSON array of records, or one record per non-blank line.
///
/// Individual records are read leniently; incomplete ones are reported by the
/// pivot. Only an array that is not valid JSON fails the whole input.
fn parse_records(contents: &str) -> Result<Vec<RawNarrowRecord>> {
    let trimmed = contents.trim_start();
    if trimmed.starts_with('[') {
        let values: Vec<JsonValue> =
            serde_json::from_str(trimmed).context("Input is not a valid JSON array")?;
        return Ok(values.into_iter().map(RawNarrowRecord::from_json).collect());
    }

    let mut records = Vec::new();
    for (line_no, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let value = serde_json::from_str::<JsonValue>(line).unwrap_or_else(|e| {
            warn!("Line {} is not valid JSON: {}", line_no + 1, e);
            JsonValue::String(line.to_string())
        });
        records.push(RawNarrowRecord::from_json(value));
    }
    Ok(records)
}

/// Probability as a percentage with one decimal, the way devices store it.
fn percent(confidence: f64) -> f64 {
    (confidence * 1000.0).round() / 10.0
}

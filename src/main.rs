// src/main.rs
use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};
use serde_json::json;
use std::path::PathBuf;
use std::time::Instant;
use uuid::Uuid;

use weather_lib::models::RawObservation;
use weather_lib::utils::artifact_config::ArtifactConfig;
use weather_lib::utils::env::load_env;
use weather_lib::{ErrorPayload, WeatherError, WeatherService};

#[derive(Parser)]
#[command(author, version, about = "Classify one sensor observation", long_about = None)]
struct Args {
    /// Observation as a JSON object, e.g. '{"temperature": 21.5, "humidity": 60, "pressure": 101325}'
    payload: String,

    /// Locale for the confidence wording (en, it)
    #[arg(long)]
    locale: Option<String>,

    /// Include the N most probable labels in the output
    #[arg(long)]
    top_k: Option<usize>,

    /// Directory holding the descriptor and model
    #[arg(long)]
    artifact_dir: Option<PathBuf>,
}

fn main() {
    env_logger::init();
    load_env();

    match run(Args::parse()) {
        Ok(output) => println!("{}", output),
        Err(err) => {
            let payload = error_payload(&err);
            error!("Request failed: {}", payload.error);
            match serde_json::to_string(&payload) {
                Ok(body) => eprintln!("{}", body),
                Err(_) => eprintln!("{}", payload.error),
            }
            std::process::exit(1);
        }
    }
}

/// Typed errors keep their kind; anything else is reported as a runtime error.
fn error_payload(err: &anyhow::Error) -> ErrorPayload {
    match err.downcast_ref::<WeatherError>() {
        Some(weather_err) => ErrorPayload::from(weather_err),
        None => ErrorPayload {
            error: format!("{:#}", err),
            kind: "RuntimeError".to_string(),
        },
    }
}

fn run(args: Args) -> Result<String> {
    let start = Instant::now();
    let request_id = Uuid::new_v4().to_string();

    let mut config = ArtifactConfig::from_env();
    if let Some(dir) = &args.artifact_dir {
        config = config.with_artifact_dir(dir);
    }
    if let Some(k) = args.top_k {
        config.top_k = k;
    }
    config.log_config();

    let service = WeatherService::load(&config)?;
    let raw = RawObservation::from_json_str(&args.payload)?;
    let locale = args.locale.as_deref().unwrap_or(&config.default_locale);
    let judgment = service.judge(&raw, Some(locale))?;

    let mut output = json!({
        "prediction": judgment.label,
        "confidence": judgment.confidence,
        "tier": judgment.tier_label,
        "request_id": request_id,
    });
    if args.top_k.is_some_and(|k| k > 1) {
        let ranking = service.rank(&raw, config.top_k)?;
        output["ranking"] =
            serde_json::to_value(ranking).context("Failed to serialize ranking")?;
    }

    info!(
        "Request {} classified as {} ({}) in {:.2?}",
        request_id,
        judgment.label,
        judgment.tier_label,
        start.elapsed()
    );
    serde_json::to_string(&output).context("Failed to serialize prediction")
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device, Tensor};
    use serde_json::Value as JsonValue;
    use std::collections::HashMap;

    const PAYLOAD: &str = r#"{"temperature": 14.2, "humidity": 88, "pressure": 100900}"#;

    fn write_artifacts(dir: &std::path::Path) {
        std::fs::write(
            dir.join("preprocess.json"),
            r#"{
                "features": ["temperature", "humidity", "pressure"],
                "scaler": {"mean": [20.0, 50.0, 101.0], "std": [5.0, 10.0, 1.0]},
                "labels": ["sunny", "rainy", "cloudy"]
            }"#,
        )
        .unwrap();
        let mut tensors = HashMap::new();
        tensors.insert(
            "layers.0.weight".to_string(),
            Tensor::zeros((3, 3), DType::F32, &Device::Cpu).unwrap(),
        );
        tensors.insert(
            "layers.0.bias".to_string(),
            Tensor::new(&[0.0f32, 3.0, 1.0], &Device::Cpu).unwrap(),
        );
        candle_core::safetensors::save(&tensors, dir.join("weather_model.safetensors")).unwrap();
    }

    fn args(dir: &std::path::Path, payload: &str) -> Args {
        Args {
            payload: payload.to_string(),
            locale: None,
            top_k: None,
            artifact_dir: Some(dir.to_path_buf()),
        }
    }

    #[test]
    fn test_run_prints_prediction() {
        let dir = tempfile::tempdir().unwrap();
        write_artifacts(dir.path());

        let output: JsonValue =
            serde_json::from_str(&run(args(dir.path(), PAYLOAD)).unwrap()).unwrap();
        assert_eq!(output["prediction"], "rainy");
        // softmax([0, 3, 1]) puts ~0.84 on "rainy".
        assert_eq!(output["tier"], "very likely");
        assert!(Uuid::parse_str(output["request_id"].as_str().unwrap()).is_ok());
        assert!(output.get("ranking").is_none());
    }

    #[test]
    fn test_run_with_locale_and_ranking() {
        let dir = tempfile::tempdir().unwrap();
        write_artifacts(dir.path());

        let mut request = args(dir.path(), PAYLOAD);
        request.locale = Some("it-IT".to_string());
        request.top_k = Some(2);
        let output: JsonValue = serde_json::from_str(&run(request).unwrap()).unwrap();

        assert_eq!(output["tier"], "molto probabilmente");
        let ranking = output["ranking"].as_array().unwrap();
        assert_eq!(ranking.len(), 2);
        assert_eq!(ranking[0]["label"], "rainy");
        assert_eq!(ranking[1]["label"], "cloudy");

        let mut single = args(dir.path(), PAYLOAD);
        single.top_k = Some(1);
        let output: JsonValue = serde_json::from_str(&run(single).unwrap()).unwrap();
        assert!(output.get("ranking").is_none());
    }

    #[test]
    fn test_failures_map_to_error_payloads() {
        let dir = tempfile::tempdir().unwrap();
        let err = run(args(dir.path(), PAYLOAD)).unwrap_err();
        assert_eq!(error_payload(&err).kind, "ConfigurationError");

        write_artifacts(dir.path());
        let err = run(args(dir.path(), r#"{"temperature": 14.2}"#)).unwrap_err();
        let payload = error_payload(&err);
        assert_eq!(payload.kind, "ValidationError");
        assert!(payload.error.contains("humidity"));

        let err = anyhow::anyhow!("stdout closed").context("Failed to write prediction");
        let payload = error_payload(&err);
        assert_eq!(payload.kind, "RuntimeError");
        assert_eq!(payload.error, "Failed to write prediction: stdout closed");
    }
}

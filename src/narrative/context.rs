// src/narrative/context.rs
//! Plain-text context blocks handed to the downstream narrative generator.

use serde_json::Value as JsonValue;
use std::fmt::Display;

use crate::narrative::verbalizer::{Locale, Tier};
use crate::preprocess::PRESSURE_PA_THRESHOLD;
use crate::timeseries::PivotedObservation;

/// Field under which a classified observation stores its label.
pub const PREDICTION_FIELD: &str = "weather_prediction";
/// Field under which a classified observation stores its confidence, in percent.
pub const CONFIDENCE_FIELD: &str = "prediction_confidence";

struct Strings {
    data_header: &'static str,
    no_readings: &'static str,
    weather_header: &'static str,
    predicted: &'static str,
    device: &'static str,
    unknown: &'static str,
    temperature: &'static str,
    humidity: &'static str,
    pressure: &'static str,
    light: &'static str,
    noise: &'static str,
    tof: &'static str,
    weather: &'static str,
    confidence: &'static str,
    location: &'static str,
    time: &'static str,
}

const EN: Strings = Strings {
    data_header: "PARK SENSOR DATA:",
    no_readings: "PARK SENSOR DATA:\n(No sensor readings available)",
    weather_header: "WEATHER PREDICTION:",
    predicted: "Predicted conditions",
    device: "Device",
    unknown: "Unknown",
    temperature: "Temperature",
    humidity: "Humidity",
    pressure: "Pressure",
    light: "Light",
    noise: "Noise",
    tof: "TOF Distance",
    weather: "Weather Prediction",
    confidence: "Confidence",
    location: "Location",
    time: "Time",
};

const IT: Strings = Strings {
    data_header: "DATI SENSORI PARCO:",
    no_readings: "DATI SENSORI PARCO:\n(Nessuna lettura sensore disponibile)",
    weather_header: "PREVISIONE METEO:",
    predicted: "Condizioni previste",
    device: "Dispositivo",
    unknown: "Sconosciuto",
    temperature: "Temperatura",
    humidity: "Umidità",
    pressure: "Pressione",
    light: "Luce",
    noise: "Rumore",
    tof: "Distanza TOF",
    weather: "Previsione Meteo",
    confidence: "Confidenza",
    location: "Posizione",
    time: "Ora",
};

fn strings(locale: Locale) -> &'static Strings {
    match locale {
        Locale::En => &EN,
        Locale::It => &IT,
    }
}

/// Header plus one sentence pairing the label with its certainty tier.
/// `None` when there is no usable prediction.
pub fn weather_context(label: &str, confidence: f64, locale: Locale) -> Option<String> {
    if label.trim().is_empty() || label == "Unknown" || !(confidence > 0.0) {
        return None;
    }
    let s = strings(locale);
    let tier = Tier::from_confidence(confidence).label(locale);
    Some(format!("{}\n{}: {} ({})", s.weather_header, s.predicted, label, tier))
}

/// Renders one observation as an indented block, skipping absent fields.
pub fn format_observation<T: Display>(obs: &PivotedObservation<T>, locale: Locale) -> String {
    let s = strings(locale);
    let device = obs
        .get("device_id")
        .map(text)
        .unwrap_or_else(|| s.unknown.to_string());
    let mut parts = vec![format!("{} {}:", s.device, device)];

    if let Some(v) = number(obs, "temperature") {
        parts.push(format!("  {}: {:.1}°C", s.temperature, v));
    }
    if let Some(v) = number(obs, "humidity") {
        parts.push(format!("  {}: {}%", s.humidity, v));
    }
    if let Some(v) = number(obs, "pressure") {
        let unit = if v > PRESSURE_PA_THRESHOLD { "Pa" } else { "kPa" };
        parts.push(format!("  {}: {:.1} {}", s.pressure, v, unit));
    }
    if let Some(v) = number(obs, "light") {
        parts.push(format!("  {}: {}", s.light, v));
    }
    if let Some(v) = number(obs, "noise") {
        parts.push(format!("  {}: {} dB", s.noise, v));
    }
    if let Some(v) = number(obs, "tof") {
        parts.push(format!("  {}: {} cm", s.tof, v));
    }
    if let Some(v) = obs.get(PREDICTION_FIELD) {
        parts.push(format!("  {}: {}", s.weather, text(v)));
    }
    if let Some(v) = number(obs, CONFIDENCE_FIELD) {
        parts.push(format!("  {}: {:.1}%", s.confidence, v));
    }
    if let (Some(lat), Some(lon)) = (number(obs, "latitude"), number(obs, "longitude")) {
        parts.push(format!("  {}: ({:.5}, {:.5})", s.location, lat, lon));
    }
    parts.push(format!("  {}: {}", s.time, obs.time));

    parts.join("\n")
}

/// All observations under a localized header, or a placeholder when empty.
pub fn sensor_context<T: Display>(observations: &[PivotedObservation<T>], locale: Locale) -> String {
    let s = strings(locale);
    if observations.is_empty() {
        return s.no_readings.to_string();
    }
    let readings: Vec<String> = observations
        .iter()
        .map(|obs| format_observation(obs, locale))
        .collect();
    format!("{}\n\n{}", s.data_header, readings.join("\n\n"))
}

/// First observation carrying a stored prediction, as (label, confidence in
/// [0, 1]). Stored confidences are percentages.
pub fn latest_prediction<T>(observations: &[PivotedObservation<T>]) -> Option<(String, f64)> {
    observations.iter().find_map(|obs| {
        let label = obs.get(PREDICTION_FIELD)?.as_str()?.to_string();
        let pct = number(obs, CONFIDENCE_FIELD)?;
        Some((label, pct / 100.0))
    })
}

fn number<T>(obs: &PivotedObservation<T>, field: &str) -> Option<f64> {
    match obs.get(field)? {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn text(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// src/timeseries/pivot.rs
use chrono::{DateTime, NaiveDateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

use crate::errors::MalformedRecord;
use crate::models::RawObservation;

/// Key the timestamp is written under when an observation is serialized.
pub const TIME_KEY: &str = "time";

/// One (timestamp, field, value) row with an already-typed timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct NarrowRecord<T> {
    pub time: T,
    pub field: String,
    pub value: JsonValue,
}

impl<T> NarrowRecord<T> {
    pub fn new(time: T, field: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        Self {
            time,
            field: field.into(),
            value: value.into(),
        }
    }
}

/// A narrow row as delivered by the time-series store, nothing checked yet.
/// Accepts both plain (`time`/`field`/`value`) and Flux-style
/// (`_time`/`_field`/`_value`) column names. Missing or mistyped columns are
/// reported by [`Pivoter::pivot_raw`], not by deserialization.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct RawNarrowRecord {
    #[serde(alias = "_time", default)]
    pub time: JsonValue,
    #[serde(alias = "_field", default)]
    pub field: JsonValue,
    #[serde(alias = "_value", default)]
    pub value: JsonValue,
}

impl RawNarrowRecord {
    pub fn new(
        time: impl Into<JsonValue>,
        field: impl Into<String>,
        value: impl Into<JsonValue>,
    ) -> Self {
        Self {
            time: time.into(),
            field: JsonValue::String(field.into()),
            value: value.into(),
        }
    }

    /// Reads one record from any JSON value. Non-objects come back with no
    /// time or field and are dropped when pivoted.
    pub fn from_json(value: JsonValue) -> Self {
        match value {
            JsonValue::Object(mut map) => Self {
                time: take_column(&mut map, TIME_KEY, "_time"),
                field: take_column(&mut map, "field", "_field"),
                value: take_column(&mut map, "value", "_value"),
            },
            other => Self {
                value: other,
                ..Self::default()
            },
        }
    }

    /// Field name, or why the record cannot carry one.
    fn field_name(&self) -> Result<&str, String> {
        match &self.field {
            JsonValue::String(s) if s.trim().is_empty() => Err("empty field name".to_string()),
            JsonValue::String(s) if s == TIME_KEY => {
                Err(format!("'{}' is reserved for the timestamp", TIME_KEY))
            }
            JsonValue::String(s) => Ok(s),
            JsonValue::Null if self.time.is_null() => Err("not a time-series record".to_string()),
            JsonValue::Null => Err("missing field name".to_string()),
            other => Err(format!("field name is not a string: {}", other)),
        }
    }
}

fn take_column(map: &mut serde_json::Map<String, JsonValue>, plain: &str, flux: &str) -> JsonValue {
    map.remove(plain)
        .or_else(|| map.remove(flux))
        .unwrap_or(JsonValue::Null)
}

/// All fields reported for one instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PivotedObservation<T> {
    pub time: T,
    #[serde(flatten)]
    pub fields: BTreeMap<String, JsonValue>,
}

impl<T> PivotedObservation<T> {
    pub fn new(time: T) -> Self {
        Self {
            time,
            fields: BTreeMap::new(),
        }
    }

    pub fn get(&self, field: &str) -> Option<&JsonValue> {
        self.fields.get(field)
    }

    /// Field map as a raw observation, ready for feature building.
    pub fn to_raw_observation(&self) -> RawObservation {
        let mut raw = RawObservation::new();
        for (k, v) in &self.fields {
            raw.insert(k.clone(), v.clone());
        }
        raw
    }
}

/// How a second value for the same (timestamp, field) is reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergePolicy {
    /// Later record in source order replaces the earlier one.
    #[default]
    LastWriteWins,
    /// First record in source order is kept.
    FirstWriteWins,
}

impl MergePolicy {
    pub fn merge(self, fields: &mut BTreeMap<String, JsonValue>, field: String, value: JsonValue) {
        match self {
            MergePolicy::LastWriteWins => {
                if let Some(previous) = fields.insert(field, value) {
                    debug!("Overwrote earlier value {} for duplicate field", previous);
                }
            }
            MergePolicy::FirstWriteWins => {
                fields.entry(field).or_insert(value);
            }
        }
    }
}

/// Observations reconstructed from one batch, plus the rows that were dropped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PivotOutcome {
    pub observations: Vec<PivotedObservation<DateTime<Utc>>>,
    pub warnings: Vec<MalformedRecord>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Pivoter {
    policy: MergePolicy,
}

impl Pivoter {
    pub fn new(policy: MergePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> MergePolicy {
        self.policy
    }

    /// Groups records by timestamp and returns observations in ascending time.
    /// Records named [`TIME_KEY`] are skipped since that key holds the
    /// timestamp in the serialized observation.
    ///
    /// The whole batch is materialized: group membership has to be final
    /// before the sort.
    pub fn pivot<T, I>(&self, records: I) -> Vec<PivotedObservation<T>>
    where
        T: Ord + Hash + Clone,
        I: IntoIterator<Item = NarrowRecord<T>>,
    {
        let mut slots: HashMap<T, usize> = HashMap::new();
        let mut observations: Vec<PivotedObservation<T>> = Vec::new();

        for record in records {
            if record.field == TIME_KEY {
                warn!("Skipping record that reuses the reserved '{}' field", TIME_KEY);
                continue;
            }
            let idx = *slots.entry(record.time.clone()).or_insert_with(|| {
                observations.push(PivotedObservation::new(record.time.clone()));
                observations.len() - 1
            });
            self.policy
                .merge(&mut observations[idx].fields, record.field, record.value);
        }

        observations.sort_by(|a, b| a.time.cmp(&b.time));
        observations
    }

    /// Parses timestamps, drops rows that cannot be placed in time, and pivots
    /// the rest.
    pub fn pivot_raw<I>(&self, records: I) -> PivotOutcome
    where
        I: IntoIterator<Item = RawNarrowRecord>,
    {
        let mut warnings = Vec::new();
        let mut typed = Vec::new();

        for (index, record) in records.into_iter().enumerate() {
            let parsed = record
                .field_name()
                .and_then(|field| Ok((parse_timestamp(&record.time)?, field.to_string())));

            match parsed {
                Ok((time, field)) => typed.push(NarrowRecord {
                    time,
                    field,
                    value: record.value,
                }),
                Err(reason) => {
                    let warning = MalformedRecord {
                        index,
                        raw_timestamp: json_text(&record.time),
                        field: json_text(&record.field),
                        reason,
                    };
                    warn!("Skipping malformed time-series {}", warning);
                    warnings.push(warning);
                }
            }
        }

        let observations = self.pivot(typed);
        if !warnings.is_empty() {
            warn!(
                "Pivot dropped {} malformed records, kept {} observations",
                warnings.len(),
                observations.len()
            );
        }
        PivotOutcome {
            observations,
            warnings,
        }
    }
}

/// Accepts RFC 3339 strings, or `YYYY-MM-DD[ T]HH:MM:SS[.f]` read as UTC.
pub fn parse_timestamp(raw: &JsonValue) -> Result<DateTime<Utc>, String> {
    let text = match raw {
        JsonValue::String(s) => s.trim(),
        JsonValue::Null => return Err("missing timestamp".to_string()),
        other => return Err(format!("timestamp is not a string: {}", other)),
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(naive.and_utc());
        }
    }
    Err(format!("unparsable timestamp '{}'", text))
}

fn json_text(raw: &JsonValue) -> String {
    match raw {
        JsonValue::String(s) => s.clone(),
        JsonValue::Null => String::new(),
        other => other.to_string(),
    }
}

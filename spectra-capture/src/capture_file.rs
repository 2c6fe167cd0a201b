use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CaptureError, FormatIssue};

/// Version written into every capture file.
pub const CAPTURE_FORMAT_VERSION: &str = "1.0";

/// Family name reported for documents that do not carry one.
pub const UNKNOWN_FAMILY: &str = "unknown";

/// Summary numbers stored alongside the captured observations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureStatistics {
    #[serde(default)]
    pub total_trials: usize,
    #[serde(default)]
    pub unique_tensors: usize,
    #[serde(default)]
    pub total_callbacks: u64,
}

/// Persisted form of a sealed trial.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    #[serde(default)]
    pub trial_id: usize,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub inference_time_ms: f64,
    /// `(address, count)` pairs in first-seen order; written as a JSON object.
    #[serde(default, with = "ordered_counts")]
    pub tensor_counts: Vec<(String, u64)>,
    #[serde(default)]
    pub tensor_order: Vec<String>,
}

impl TrialRecord {
    pub fn counts(&self) -> HashMap<&str, u64> {
        self.tensor_counts.iter().map(|(address, count)| (address.as_str(), *count)).collect()
    }
}

/// The capture file: versioned JSON holding the global order and every sealed trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureFile {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub tool: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub created: String,
    #[serde(default = "default_family")]
    pub model_family: String,
    #[serde(default)]
    pub statistics: CaptureStatistics,
    #[serde(default)]
    pub tensor_order: Vec<String>,
    #[serde(default)]
    pub trials: Vec<TrialRecord>,
}

fn default_version() -> String {
    CAPTURE_FORMAT_VERSION.to_string()
}

fn default_family() -> String {
    UNKNOWN_FAMILY.to_string()
}

impl CaptureFile {
    /// Parses and validates a capture document.
    pub fn from_json_str(contents: &str) -> Result<Self, CaptureError> {
        let value: Value =
            serde_json::from_str(contents).map_err(|err| FormatIssue::MalformedJson(err.to_string()))?;
        Self::from_value(value)
    }

    /// Validates an already parsed document and converts it into a capture.
    pub fn from_value(value: Value) -> Result<Self, CaptureError> {
        validate_capture_value(&value)?;
        serde_json::from_value(value).map_err(|err| CaptureError::from(FormatIssue::Structure(err.to_string())))
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Writes the capture as pretty JSON, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<PathBuf> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let contents = self.to_json_pretty().context("Failed to encode capture file")?;
        fs::write(path, contents).with_context(|| format!("Failed to write capture file {}", path.display()))?;

        Ok(path.to_path_buf())
    }

    pub fn trial(&self, trial_id: usize) -> Option<&TrialRecord> {
        self.trials.get(trial_id)
    }

    /// Sums per-trial counts for every address seen in any trial.
    pub fn aggregated_counts(&self) -> HashMap<&str, u64> {
        let mut totals = HashMap::new();
        for (address, count) in self.trials.iter().flat_map(|trial| trial.tensor_counts.iter()) {
            *totals.entry(address.as_str()).or_insert(0) += *count;
        }
        totals
    }
}

/// A document is a capture if it is an object holding `tensor_order` or `trials`.
pub fn validate_capture_value(value: &Value) -> Result<(), FormatIssue> {
    match value.as_object() {
        Some(document) if document.contains_key("tensor_order") || document.contains_key("trials") => Ok(()),
        _ => Err(FormatIssue::MissingCaptureKeys),
    }
}

/// Serializes `(address, count)` pairs as a JSON object without losing their order.
mod ordered_counts {
    use std::fmt;

    use serde::{
        Deserializer, Serializer,
        de::{MapAccess, Visitor},
    };

    pub fn serialize<S: Serializer>(counts: &[(String, u64)], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(counts.iter().map(|(address, count)| (address, count)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<(String, u64)>, D::Error> {
        struct CountsVisitor;

        impl<'de> Visitor<'de> for CountsVisitor {
            type Value = Vec<(String, u64)>;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a map of tensor address to observation count")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut counts = Vec::with_capacity(map.size_hint().unwrap_or_default());
                while let Some((address, count)) = map.next_entry::<String, u64>()? {
                    counts.push((address, count));
                }
                Ok(counts)
            }
        }

        deserializer.deserialize_map(CountsVisitor)
    }
}

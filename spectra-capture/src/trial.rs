use std::collections::HashMap;

use crate::capture_file::TrialRecord;

/// Insertion-ordered observation counts keyed by opaque tensor address.
///
/// Addresses are compared for equality only. Their order is the order in which
/// they were first observed, never their lexical order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TensorTally {
    order: Vec<String>,
    counts: HashMap<String, u64>,
}

impl TensorTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one observation, appending the address to the order on first sight.
    pub fn observe(&mut self, address: &str) {
        match self.counts.get_mut(address) {
            Some(count) => *count += 1,
            None => {
                self.order.push(address.to_string());
                self.counts.insert(address.to_string(), 1);
            }
        }
    }

    pub fn order(&self) -> &[String] {
        &self.order
    }

    pub fn count(&self, address: &str) -> u64 {
        self.counts.get(address).copied().unwrap_or_default()
    }

    pub fn unique(&self) -> usize {
        self.order.len()
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Iterates `(address, count)` pairs in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> + '_ {
        self.order.iter().map(|address| (address.as_str(), self.count(address)))
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.counts.clear();
    }
}

/// Data collected during a single inference run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialData {
    pub trial_id: usize,
    pub prompt: String,
    pub response: String,
    pub inference_time_ms: f64,
    pub tensors: TensorTally,
}

impl TrialData {
    pub fn new(trial_id: usize, prompt: &str) -> Self {
        Self {
            trial_id,
            prompt: prompt.to_string(),
            response: String::new(),
            inference_time_ms: 0.0,
            tensors: TensorTally::new(),
        }
    }
}

impl From<&TrialData> for TrialRecord {
    fn from(trial: &TrialData) -> Self {
        TrialRecord {
            trial_id: trial.trial_id,
            prompt: trial.prompt.clone(),
            response: trial.response.clone(),
            inference_time_ms: trial.inference_time_ms,
            tensor_counts: trial
                .tensors
                .iter()
                .map(|(address, count)| (address.to_string(), count))
                .collect(),
            tensor_order: trial.tensors.order().to_vec(),
        }
    }
}

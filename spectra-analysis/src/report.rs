#[cfg(test)]
#[path = "../tests/unit/report_test.rs"]
mod report_test;

use std::{collections::BTreeMap, fmt, iter};

use rayon::prelude::*;
use spectra_capture::{CaptureFile, CaptureStatistics};

use crate::{
    error::{Result, SpectraError},
    layout::{LayoutStrategy, PositionLabel, RoleCycleLayout},
    profiles::{Category, EMBEDDING_LAYER, OUTPUT_LAYER, OUTPUT_NORM_LAYER, get_layer_count, get_profile, is_special_layer},
};

const PREVIEW_CHARS: usize = 50;
const EDGE_LAYERS: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct TrialSummary {
    pub trial_id: usize,
    pub prompt: String,
    pub response: String,
    pub inference_time_ms: f64,
    pub unique_tensors: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayerStats {
    pub layer: i64,
    /// Roles in observation order.
    pub roles: Vec<&'static str>,
    pub total_count: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryShare {
    pub category: Category,
    pub count: u64,
    pub percent: f64,
    pub color: &'static str,
}

/// Offline summary of a capture file interpreted as one model family.
#[derive(Debug, Clone)]
pub struct CaptureReport {
    pub tool: String,
    pub created: String,
    pub capture_family: String,
    pub profile_description: &'static str,
    pub total_layers: usize,
    pub statistics: CaptureStatistics,
    pub trials: Vec<TrialSummary>,
    /// Sorted by layer number, sentinels included.
    pub layers: Vec<LayerStats>,
    /// Categories with at least one observation, largest first.
    pub categories: Vec<CategoryShare>,
}

impl CaptureReport {
    pub fn build(capture: &CaptureFile, family: &str, size: &str) -> Result<Self> {
        let profile = get_profile(family).ok_or_else(|| SpectraError::UnknownFamily(family.to_string()))?;
        let total_layers = get_layer_count(family, size);

        let mut statistics = capture.statistics.clone();
        if statistics.total_trials == 0 {
            statistics.total_trials = capture.trials.len();
        }

        let trials = capture
            .trials
            .iter()
            .map(|trial| TrialSummary {
                trial_id: trial.trial_id,
                prompt: trial.prompt.clone(),
                response: trial.response.clone(),
                inference_time_ms: trial.inference_time_ms,
                unique_tensors: trial.tensor_counts.len(),
            })
            .collect();

        // Captures written without a global order still carry one per trial.
        let order = match capture.trials.first() {
            Some(first) if capture.tensor_order.is_empty() => first.tensor_order.as_slice(),
            _ => capture.tensor_order.as_slice(),
        };
        let counts = capture.aggregated_counts();
        let layout = RoleCycleLayout::for_profile(profile, total_layers);

        let labelled = order
            .par_iter()
            .enumerate()
            .map(|(index, address)| (layout.label(index), counts.get(address.as_str()).copied().unwrap_or_default()))
            .collect::<Vec<(PositionLabel, u64)>>();

        let mut layers = BTreeMap::<i64, LayerStats>::new();
        for (label, count) in &labelled {
            let stats = layers.entry(label.layer).or_insert_with(|| LayerStats {
                layer: label.layer,
                roles: Vec::new(),
                total_count: 0,
            });
            stats.roles.push(label.role);
            stats.total_count += count;
        }

        let mut category_counts = profile
            .categories
            .iter()
            .map(|(category, _)| (*category, 0u64))
            .chain(iter::once((Category::Unknown, 0)))
            .collect::<Vec<_>>();
        for (label, count) in &labelled {
            if let Some(slot) = category_counts.iter_mut().find(|(category, _)| *category == label.category) {
                slot.1 += count;
            }
        }

        let total: u64 = category_counts.iter().map(|(_, count)| count).sum();
        let mut categories = category_counts
            .into_iter()
            .filter(|(_, count)| *count > 0)
            .map(|(category, count)| CategoryShare {
                category,
                count,
                percent: count as f64 / total as f64 * 100.0,
                color: category.color(),
            })
            .collect::<Vec<_>>();
        categories.sort_by(|a, b| b.count.cmp(&a.count));

        Ok(Self {
            tool: capture.tool.clone(),
            created: capture.created.clone(),
            capture_family: capture.model_family.clone(),
            profile_description: profile.description,
            total_layers,
            statistics,
            trials,
            layers: layers.into_values().collect(),
            categories,
        })
    }

    pub fn layer(&self, layer: i64) -> Option<&LayerStats> {
        self.layers.iter().find(|stats| stats.layer == layer)
    }

    pub fn regular_layers(&self) -> impl Iterator<Item = &LayerStats> {
        self.layers.iter().filter(|stats| !is_special_layer(stats.layer))
    }
}

fn preview(text: &str) -> String {
    text.chars().take(PREVIEW_CHARS).collect()
}

fn or_unknown(value: &str) -> &str {
    if value.is_empty() { "Unknown" } else { value }
}

impl fmt::Display for CaptureReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Capture Info:")?;
        writeln!(f, "  Tool: {}", or_unknown(&self.tool))?;
        writeln!(f, "  Created: {}", or_unknown(&self.created))?;
        writeln!(f, "  Model Family: {}", self.capture_family)?;
        writeln!(f)?;
        writeln!(f, "Model Profile: {}", self.profile_description)?;
        writeln!(f, "Layer Count: {}", self.total_layers)?;
        writeln!(f)?;

        writeln!(f, "Statistics:")?;
        writeln!(f, "  Total trials: {}", self.statistics.total_trials)?;
        writeln!(f, "  Unique tensors: {}", self.statistics.unique_tensors)?;
        writeln!(f, "  Total callbacks: {}", self.statistics.total_callbacks)?;
        writeln!(f)?;

        if !self.trials.is_empty() {
            writeln!(f, "Trial Summary:")?;
            for trial in &self.trials {
                writeln!(f, "  Trial {}:", trial.trial_id)?;
                writeln!(f, "    Prompt: {}...", preview(&trial.prompt))?;
                writeln!(f, "    Response: {}...", preview(&trial.response))?;
                writeln!(f, "    Inference: {:.1}ms", trial.inference_time_ms)?;
                writeln!(f, "    Tensors: {}", trial.unique_tensors)?;
            }
            writeln!(f)?;
        }

        writeln!(f, "Layer Analysis:")?;
        if let Some(stats) = self.layer(EMBEDDING_LAYER) {
            writeln!(f, "  Embedding (Layer {EMBEDDING_LAYER}):")?;
            writeln!(f, "    Tensors: {}", stats.roles.len())?;
            writeln!(f, "    Total observations: {}", stats.total_count)?;
        }

        let regular = self.regular_layers().collect::<Vec<_>>();
        for stats in regular.iter().take(EDGE_LAYERS) {
            writeln!(f, "  Layer {}:", stats.layer)?;
            writeln!(f, "    Tensors: {}", stats.roles.len())?;
            writeln!(f, "    Total observations: {}", stats.total_count)?;
            writeln!(f, "    Types: {}", stats.roles.join(", "))?;
        }
        if regular.len() > EDGE_LAYERS * 2 {
            writeln!(f, "  ... ({} more layers) ...", regular.len() - EDGE_LAYERS * 2)?;
        }
        let tail_start = regular.len().saturating_sub(EDGE_LAYERS).max(EDGE_LAYERS.min(regular.len()));
        for stats in &regular[tail_start..] {
            writeln!(f, "  Layer {}:", stats.layer)?;
            writeln!(f, "    Tensors: {}", stats.roles.len())?;
            writeln!(f, "    Total observations: {}", stats.total_count)?;
        }

        if let Some(stats) = self.layer(OUTPUT_NORM_LAYER) {
            writeln!(f, "  Output Norm (Layer {OUTPUT_NORM_LAYER}):")?;
            writeln!(f, "    Total observations: {}", stats.total_count)?;
        }
        if let Some(stats) = self.layer(OUTPUT_LAYER) {
            writeln!(f, "  Output (Layer {OUTPUT_LAYER}):")?;
            writeln!(f, "    Total observations: {}", stats.total_count)?;
        }
        writeln!(f)?;

        writeln!(f, "Category Breakdown:")?;
        for share in &self.categories {
            writeln!(
                f,
                "  {:15} {:8} observations ({:5.1}%) {}",
                share.category.as_str(),
                share.count,
                share.percent,
                share.color
            )?;
        }
        Ok(())
    }
}

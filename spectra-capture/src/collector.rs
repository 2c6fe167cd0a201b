use std::{
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard},
    time::Instant,
};

use anyhow::Result;
use chrono::{Local, SecondsFormat};
use log::{info, warn};

use crate::{
    callback::{Phase, format_address},
    capture_file::{CAPTURE_FORMAT_VERSION, CaptureFile, CaptureStatistics, TrialRecord},
    error::CaptureError,
    trial::{TensorTally, TrialData},
};

/// Author written into capture files unless overridden.
const DEFAULT_AUTHOR: &str = "spectra";

/// Snapshot of the collector counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectorStatistics {
    pub total_callbacks: u64,
    pub unique_tensors: usize,
    pub total_trials: usize,
    pub model_family: String,
}

/// Collects tensor observations during inference and groups them into trials.
///
/// Every operation runs under one lock guarding all collector state, so an
/// observation is never split across a trial boundary.
#[derive(Debug)]
pub struct TensorCollector {
    model_family: String,
    author: String,
    state: Mutex<CollectorState>,
}

#[derive(Debug, Default)]
struct CollectorState {
    enabled: bool,
    tensors: TensorTally,
    trials: Vec<TrialData>,
    current: Option<OpenTrial>,
    total_callbacks: u64,
}

#[derive(Debug)]
struct OpenTrial {
    data: TrialData,
    started: Instant,
}

impl TensorCollector {
    pub fn new(model_family: &str) -> Self {
        Self {
            model_family: model_family.to_lowercase(),
            author: DEFAULT_AUTHOR.to_string(),
            state: Mutex::new(CollectorState::default()),
        }
    }

    pub fn with_author(mut self, author: &str) -> Self {
        self.author = author.to_string();
        self
    }

    pub fn model_family(&self) -> &str {
        &self.model_family
    }

    fn lock(&self) -> Result<MutexGuard<'_, CollectorState>, CaptureError> {
        self.state.lock().map_err(|_| CaptureError::Poisoned)
    }

    pub fn enable(&self) -> Result<(), CaptureError> {
        self.lock()?.enabled = true;
        Ok(())
    }

    pub fn disable(&self) -> Result<(), CaptureError> {
        self.lock()?.enabled = false;
        Ok(())
    }

    pub fn is_enabled(&self) -> Result<bool, CaptureError> {
        Ok(self.lock()?.enabled)
    }

    /// Drops all counts, orders, trials (including an open one) and the callback counter.
    pub fn clear(&self) -> Result<(), CaptureError> {
        let mut state = self.lock()?;
        state.tensors.clear();
        state.trials.clear();
        state.current = None;
        state.total_callbacks = 0;
        Ok(())
    }

    /// Opens a new trial and enables collection. Returns the trial id.
    ///
    /// Fails with [`CaptureError::InvalidState`] while another trial is open.
    pub fn start_trial(&self, prompt: &str) -> Result<usize, CaptureError> {
        let mut state = self.lock()?;

        if let Some(open) = &state.current {
            return Err(CaptureError::InvalidState(format!(
                "trial {} is still open; end it before starting another",
                open.data.trial_id
            )));
        }

        let trial_id = state.trials.len();
        state.current = Some(OpenTrial { data: TrialData::new(trial_id, prompt), started: Instant::now() });
        state.enabled = true;

        info!("Started trial {trial_id}");
        Ok(trial_id)
    }

    /// Disables collection, seals the open trial and returns it.
    pub fn end_trial(&self, response: &str) -> Result<TrialData, CaptureError> {
        let mut state = self.lock()?;
        state.enabled = false;

        let OpenTrial { mut data, started } = state
            .current
            .take()
            .ok_or_else(|| CaptureError::InvalidState("no active trial to end".to_string()))?;

        data.inference_time_ms = started.elapsed().as_secs_f64() * 1000.0;
        data.response = response.to_string();
        state.trials.push(data.clone());

        info!(
            "Ended trial {}: {} unique tensors, {} total observations, {:.1}ms",
            data.trial_id,
            data.tensors.unique(),
            data.tensors.total(),
            data.inference_time_ms
        );

        Ok(data)
    }

    /// Records one engine callback for a raw tensor pointer.
    pub fn record_tensor(&self, tensor: usize, is_ask: bool) -> bool {
        match Phase::from_ask_flag(is_ask) {
            Phase::Ask => self.record_observation("", Phase::Ask),
            Phase::Computed => self.record_observation(&format_address(tensor), Phase::Computed),
        }
    }

    /// Records one observation event. Always returns `true`.
    ///
    /// Nothing is recorded while collection is disabled. Faults are logged and swallowed.
    pub fn record_observation(&self, address: &str, phase: Phase) -> bool {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(_) => {
                warn!("Collector state lock is poisoned; dropping observation");
                return true;
            }
        };

        if !state.enabled {
            return true;
        }

        state.total_callbacks += 1;

        if phase == Phase::Ask {
            return true;
        }

        state.tensors.observe(address);
        if let Some(open) = state.current.as_mut() {
            open.data.tensors.observe(address);
        }

        true
    }

    pub fn statistics(&self) -> Result<CollectorStatistics, CaptureError> {
        let state = self.lock()?;
        Ok(CollectorStatistics {
            total_callbacks: state.total_callbacks,
            unique_tensors: state.tensors.unique(),
            total_trials: state.trials.len(),
            model_family: self.model_family.clone(),
        })
    }

    pub fn trial_count(&self) -> Result<usize, CaptureError> {
        Ok(self.lock()?.trials.len())
    }

    /// Global observation count for an address across all trials.
    pub fn global_count(&self, address: &str) -> Result<u64, CaptureError> {
        Ok(self.lock()?.tensors.count(address))
    }

    /// Snapshot of the collected data as a capture file. Does not mutate state.
    pub fn serialize(&self) -> Result<CaptureFile, CaptureError> {
        let state = self.lock()?;

        Ok(CaptureFile {
            version: CAPTURE_FORMAT_VERSION.to_string(),
            tool: format!("spectra-capture {}", env!("CARGO_PKG_VERSION")),
            author: self.author.clone(),
            created: Local::now().to_rfc3339_opts(SecondsFormat::Micros, false),
            model_family: self.model_family.clone(),
            statistics: CaptureStatistics {
                total_trials: state.trials.len(),
                unique_tensors: state.tensors.unique(),
                total_callbacks: state.total_callbacks,
            },
            tensor_order: state.tensors.order().to_vec(),
            trials: state.trials.iter().map(TrialRecord::from).collect(),
        })
    }

    /// Serializes under the lock, then writes the file outside of it.
    pub fn save_to_json(&self, path: &Path) -> Result<PathBuf> {
        let capture = self.serialize()?;
        let path = capture.save(path)?;
        info!("Saved capture to {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
#[path = "../tests/unit/service_test.rs"]
mod service_test;

use std::{
    collections::{BTreeMap, HashMap},
    path::{Path, PathBuf},
    sync::Arc,
};

use log::{info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize, Serializer};
use spectra_capture::{CaptureFile, CaptureStatistics, FormatIssue};

use crate::{
    error::{Result, SpectraError},
    files::{
        CaptureFileEntry, list_capture_files, parse_capture_document, read_capture_file, resolve_capture_path,
        sanitize_filename, save_upload,
    },
    layout::{EvenSplitLayout, LayoutStrategy, RoleCycleLayout},
    palette::{category_colors, flow_colors, tensor_colors, tensor_flows},
    profiles::{Category, ModelProfile, get_layer_count, get_profile, supported_models},
    session::{LoadedCapture, SessionStore},
};

pub const SERVICE_NAME: &str = "Spectra API";

pub const ENDPOINTS: &[&str] = &[
    "/api/models",
    "/api/files",
    "/api/load",
    "/api/status",
    "/api/analyze",
    "/api/tensor-grid",
    "/api/upload",
    "/api/colors",
    "/api/flows",
];

const DEFAULT_MODEL_SIZE: &str = "7b";

/// Pairs serialized as a JSON object, keeping their order.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedMap<K, V>(pub Vec<(K, V)>);

impl<K: Serialize, V: Serialize> Serialize for OrderedMap<K, V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(key, value)| (key, value)))
    }
}

impl<K, V> FromIterator<(K, V)> for OrderedMap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

fn default_model_size() -> String {
    DEFAULT_MODEL_SIZE.to_string()
}

/// Body of analyze and tensor-grid queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    pub model_family: String,
    #[serde(default = "default_model_size")]
    pub model_size: String,
    /// Restricts the query to one trial; the whole capture when absent.
    #[serde(default)]
    pub trial_id: Option<usize>,
}

pub type TensorGridRequest = AnalyzeRequest;

impl AnalyzeRequest {
    pub fn new(model_family: &str) -> Self {
        Self { model_family: model_family.to_string(), model_size: default_model_size(), trial_id: None }
    }

    pub fn with_size(mut self, model_size: &str) -> Self {
        self.model_size = model_size.to_string();
        self
    }

    pub fn with_trial(mut self, trial_id: usize) -> Self {
        self.trial_id = Some(trial_id);
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileSummary {
    pub description: &'static str,
    pub variants: &'static [&'static str],
    pub layer_counts: OrderedMap<&'static str, usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelsResponse {
    pub supported_models: Vec<&'static str>,
    pub profiles: OrderedMap<&'static str, ProfileSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileListing {
    pub files: Vec<CaptureFileEntry>,
    pub directory: String,
}

/// What a status or load reply says about a capture.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaptureSummary {
    pub filepath: String,
    pub model_family: String,
    pub trials: usize,
    pub unique_tensors: usize,
}

impl CaptureSummary {
    fn new(path: &Path, capture: &CaptureFile) -> Self {
        Self {
            filepath: path.display().to_string(),
            model_family: capture.model_family.clone(),
            trials: capture.trials.len(),
            unique_tensors: capture.tensor_order.len(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoadSummary {
    pub status: &'static str,
    #[serde(flatten)]
    pub capture: CaptureSummary,
    pub statistics: CaptureStatistics,
}

#[derive(Debug, Clone, Serialize)]
pub struct Status {
    pub status: &'static str,
    pub loaded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    #[serde(flatten)]
    pub capture: Option<CaptureSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MappedTensor {
    pub address: String,
    pub observation_index: usize,
    pub layer: i64,
    #[serde(rename = "type")]
    pub role: &'static str,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzeResponse {
    pub model_family: String,
    pub model_size: String,
    pub total_layers: usize,
    pub total_tensors: usize,
    pub tensors: Vec<MappedTensor>,
    pub layers: BTreeMap<i64, Vec<MappedTensor>>,
    pub categories: OrderedMap<Category, &'static [&'static str]>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridCell {
    pub address: String,
    pub layer: i64,
    #[serde(rename = "type")]
    pub role: &'static str,
    pub type_index: usize,
    pub category: Category,
    pub count: u64,
    /// Count relative to the largest count in the selection, in `[0, 1]`.
    pub intensity: f64,
    pub color: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct TensorGridResponse {
    pub model_family: String,
    pub model_size: String,
    pub total_layers: usize,
    pub tensors_per_layer: usize,
    pub tensor_types: &'static [&'static str],
    pub grid: Vec<GridCell>,
    pub max_count: u64,
    pub colors: BTreeMap<&'static str, &'static str>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadResponse {
    pub status: &'static str,
    pub filename: String,
    pub filepath: String,
    pub size_bytes: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ColorsResponse {
    pub tensor_colors: BTreeMap<&'static str, &'static str>,
    pub flow_colors: BTreeMap<&'static str, &'static str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FlowsResponse {
    pub flows: BTreeMap<&'static str, Vec<(&'static str, &'static str)>>,
    pub colors: BTreeMap<&'static str, &'static str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiIndex {
    pub name: &'static str,
    pub version: &'static str,
    pub endpoints: &'static [&'static str],
}

/// The observation order and counts a query runs over.
struct Selection<'a> {
    order: &'a [String],
    counts: HashMap<&'a str, u64>,
}

impl<'a> Selection<'a> {
    /// One trial's own order and counts, or the global order with counts summed
    /// over every trial.
    fn from_capture(capture: &'a CaptureFile, trial_id: Option<usize>) -> Result<Self> {
        match trial_id {
            Some(trial_id) => {
                let trial = capture.trial(trial_id).ok_or_else(|| SpectraError::NotFound(format!("Trial {trial_id}")))?;
                Ok(Self { order: &trial.tensor_order, counts: trial.counts() })
            }
            None => Ok(Self { order: &capture.tensor_order, counts: capture.aggregated_counts() }),
        }
    }

    fn count(&self, address: &str) -> u64 {
        self.counts.get(address).copied().unwrap_or_default()
    }
}

/// Queries over capture files in one data directory.
///
/// The service holds at most one loaded capture at a time. Analyze and grid queries run
/// against that capture; loading another one replaces it for every later query.
#[derive(Debug)]
pub struct CaptureService {
    data_dir: PathBuf,
    session: SessionStore,
}

impl CaptureService {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self { data_dir: data_dir.into(), session: SessionStore::new() }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn index(&self) -> ApiIndex {
        ApiIndex { name: SERVICE_NAME, version: env!("CARGO_PKG_VERSION"), endpoints: ENDPOINTS }
    }

    pub fn models(&self) -> ModelsResponse {
        let profiles = supported_models()
            .into_iter()
            .filter_map(get_profile)
            .map(|profile| {
                let summary = ProfileSummary {
                    description: profile.description,
                    variants: profile.variants,
                    layer_counts: profile.layer_counts.iter().copied().collect(),
                };
                (profile.family, summary)
            })
            .collect();

        ModelsResponse { supported_models: supported_models(), profiles }
    }

    pub fn list_files(&self) -> Result<FileListing> {
        let files = list_capture_files(&self.data_dir)?;
        Ok(FileListing { files, directory: self.data_dir.display().to_string() })
    }

    /// Reads, validates and installs a capture file as the current one.
    pub fn load(&self, filepath: &str) -> Result<LoadSummary> {
        let path = resolve_capture_path(&self.data_dir, filepath);
        let capture = read_capture_file(&path).inspect_err(|err| warn!("Rejected load of {}: {err}", path.display()))?;

        let summary = LoadSummary {
            status: "loaded",
            capture: CaptureSummary::new(&path, &capture),
            statistics: capture.statistics.clone(),
        };
        info!(
            "Loaded {} ({}, {} trials, {} unique tensors)",
            summary.capture.filepath, summary.capture.model_family, summary.capture.trials, summary.capture.unique_tensors
        );

        self.session.replace(LoadedCapture { path, capture });
        Ok(summary)
    }

    pub fn status(&self) -> Status {
        match self.session.current() {
            Some(loaded) => Status {
                status: "ready",
                loaded: true,
                message: None,
                capture: Some(CaptureSummary::new(&loaded.path, &loaded.capture)),
            },
            None => Status {
                status: "ready",
                loaded: false,
                message: Some("No data loaded. Use /api/load to load a capture file."),
                capture: None,
            },
        }
    }

    /// Checks shared by analyze and grid queries, in order: a capture is loaded, then
    /// the family is known.
    fn prepare(&self, request: &AnalyzeRequest) -> Result<(Arc<LoadedCapture>, &'static ModelProfile, usize)> {
        let loaded = self.session.current().ok_or_else(|| SpectraError::InvalidState("No data loaded".to_string()))?;
        let profile =
            get_profile(&request.model_family).ok_or_else(|| SpectraError::UnknownFamily(request.model_family.clone()))?;

        Ok((loaded, profile, get_layer_count(&request.model_family, &request.model_size)))
    }

    /// Maps every observation of the selection with the role-cycle layout.
    pub fn analyze(&self, request: &AnalyzeRequest) -> Result<AnalyzeResponse> {
        let (loaded, profile, total_layers) = self.prepare(request)?;
        let selection = Selection::from_capture(&loaded.capture, request.trial_id)?;
        let layout = RoleCycleLayout::for_profile(profile, total_layers);

        let tensors = selection
            .order
            .par_iter()
            .enumerate()
            .map(|(index, address)| {
                let label = layout.label(index);
                MappedTensor {
                    address: address.clone(),
                    observation_index: index,
                    layer: label.layer,
                    role: label.role,
                    count: selection.count(address),
                }
            })
            .collect::<Vec<_>>();

        let mut layers = BTreeMap::<i64, Vec<MappedTensor>>::new();
        for tensor in &tensors {
            layers.entry(tensor.layer).or_default().push(tensor.clone());
        }

        Ok(AnalyzeResponse {
            model_family: request.model_family.clone(),
            model_size: request.model_size.clone(),
            total_layers,
            total_tensors: tensors.len(),
            tensors,
            layers,
            categories: profile.categories.iter().copied().collect(),
        })
    }

    /// Lays the selection out as a layer by role grid with the even-split layout.
    pub fn tensor_grid(&self, request: &TensorGridRequest) -> Result<TensorGridResponse> {
        let (loaded, profile, total_layers) = self.prepare(request)?;
        let selection = Selection::from_capture(&loaded.capture, request.trial_id)?;
        let layout = EvenSplitLayout::new(profile, total_layers, selection.order.len());

        let max_count = selection.counts.values().copied().max().unwrap_or(1);

        let grid = selection
            .order
            .par_iter()
            .enumerate()
            .map(|(index, address)| {
                let label = layout.label(index);
                let count = selection.count(address);
                GridCell {
                    address: address.clone(),
                    layer: label.layer,
                    role: label.role,
                    type_index: label.type_index,
                    category: label.category,
                    count,
                    intensity: if max_count > 0 { count as f64 / max_count as f64 } else { 0.0 },
                    color: label.category.color(),
                }
            })
            .collect::<Vec<_>>();

        Ok(TensorGridResponse {
            model_family: request.model_family.clone(),
            model_size: request.model_size.clone(),
            total_layers,
            tensors_per_layer: layout.tensors_per_layer(),
            tensor_types: profile.tensor_types,
            grid,
            max_count,
            colors: category_colors(),
        })
    }

    /// Stores an uploaded capture in the data directory without loading it.
    pub fn upload(&self, filename: &str, contents: &[u8]) -> Result<UploadResponse> {
        self.store_upload(filename, contents).inspect_err(|err| warn!("Rejected upload of {filename}: {err}"))
    }

    fn store_upload(&self, filename: &str, contents: &[u8]) -> Result<UploadResponse> {
        if !filename.ends_with(".json") {
            return Err(FormatIssue::UnsupportedExtension.into());
        }

        let safe_name = sanitize_filename(filename);
        let document = parse_capture_document(contents)?;
        // Same structure check as a load, so anything stored here can be loaded later.
        CaptureFile::from_value(document.clone())?;

        let path = save_upload(&self.data_dir, &safe_name, &document)?;
        let stored_name = path.file_name().map(|name| name.to_string_lossy().into_owned()).unwrap_or(safe_name);
        info!("Stored upload {filename} as {} ({} bytes)", path.display(), contents.len());

        Ok(UploadResponse {
            status: "uploaded",
            filename: stored_name,
            filepath: path.display().to_string(),
            size_bytes: contents.len(),
        })
    }

    pub fn colors(&self) -> ColorsResponse {
        ColorsResponse { tensor_colors: tensor_colors(), flow_colors: flow_colors() }
    }

    pub fn flows(&self) -> FlowsResponse {
        FlowsResponse { flows: tensor_flows(), colors: flow_colors() }
    }
}

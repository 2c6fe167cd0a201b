//! # spectra-analysis
//!
//! Interprets captured tensor observations as positions inside a transformer.
//!
//! The capture only knows opaque addresses in first-seen order. This crate maps each
//! position of that order to a layer and a tensor role using static per-family
//! [`profiles`], and answers the queries a visualizer needs through [`CaptureService`].
//!
//! ## Example
//!
//! ```rust
//! use spectra_analysis::{LayoutStrategy, RoleCycleLayout, map_position};
//!
//! let label = map_position(10, "llama", 32);
//! assert_eq!((label.layer, label.role), (1, "attn_norm"));
//!
//! let layout = RoleCycleLayout::new("llama", 32);
//! assert_eq!(layout.label(289).role, "output_norm");
//! ```

mod error;
pub mod files;
pub mod layout;
pub mod palette;
pub mod profiles;
pub mod report;
pub mod service;
pub mod session;

pub use error::{Result, SpectraError};
pub use layout::{EvenSplitLayout, LayoutStrategy, PositionLabel, RoleCycleLayout, map_position};
pub use profiles::{
    Category, ModelProfile, estimate_tensors_per_layer, get_layer_count, get_profile, get_tensor_categories,
    supported_models,
};
pub use report::CaptureReport;
pub use service::{AnalyzeRequest, CaptureService, TensorGridRequest};
pub use session::{LoadedCapture, SessionStore};

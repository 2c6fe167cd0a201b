//! # spectra-capture
//!
//! Records which tensors an inference engine evaluates during a forward pass.
//!
//! The engine only reports an opaque tensor pointer and a two-phase flag for every
//! evaluated node. [`TensorCollector`] counts the computed phase per address, keeps
//! the first-seen order globally and per trial, and serializes everything into a
//! [`CaptureFile`].
//!
//! ## Example
//!
//! ```rust
//! use spectra_capture::{SyntheticEngine, TensorCollector};
//!
//! # fn main() -> anyhow::Result<()> {
//! let collector = TensorCollector::new("llama");
//! let engine = SyntheticEngine::new(32, 9);
//!
//! collector.start_trial("What is the capital of France?")?;
//! engine.run(&collector, 4);
//! let trial = collector.end_trial("Paris.")?;
//!
//! assert_eq!(trial.tensors.unique(), engine.graph_len());
//! # Ok(())
//! # }
//! ```

pub mod callback;
pub mod capture_file;
pub mod collector;
mod error;
pub mod replay;
pub mod trial;

pub use callback::{EvalCallback, NativeEvalCallback, Phase, collector_user_data, eval_callback, format_address};
pub use capture_file::{
    CAPTURE_FORMAT_VERSION, CaptureFile, CaptureStatistics, TrialRecord, UNKNOWN_FAMILY, validate_capture_value,
};
pub use collector::{CollectorStatistics, TensorCollector};
pub use error::{CaptureError, FormatIssue};
pub use replay::SyntheticEngine;
pub use trial::{TensorTally, TrialData};

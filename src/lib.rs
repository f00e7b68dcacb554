//! Labelled waveform preparation for a double-pulse classifier.
//!
//! ```text
//!  catalog ──► partition (drives RecordLoader) ──► rescale ──► PreparedData
//! ```
//!
//! A [`DatasetBundle`] is built once per call and is read-only afterwards.

pub mod catalog;
pub mod config;
pub mod data;
pub mod error;
pub mod export;
pub mod partition;
pub mod pipeline;
pub mod rescale;

pub use catalog::{CatalogKind, DatasetSpec};
pub use config::{PrepConfig, SplitOrder};
pub use data::loader::{FileRecordLoader, MemoryRecordLoader, RecordLoader};
pub use data::model::{DatasetBundle, Label, Partition, PartitionKind, WAVEFORM_LEN, Waveform};
pub use error::{PrepError, Result};
pub use pipeline::{DataSource, PreparedData, prepare, prepare_evaluation_data, prepare_training_data};
pub use rescale::{FitMask, Rescaler, ScaleParams};

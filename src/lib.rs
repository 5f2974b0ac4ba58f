pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use adapters::build_engine;
pub use config::{ExportSettings, DEFAULT_MODEL_ID, DEFAULT_OUTPUT_DIR};
pub use core::ExportEngine;
pub use domain::model::{ExportLayout, ExportReport, ModelSpec, QuantizationConfig, QuantizationPreset};
pub use utils::error::{ExportError, Result};

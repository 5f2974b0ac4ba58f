pub mod export;
pub mod finalize;
pub mod preset;

pub use crate::domain::model::{ExportLayout, ExportReport, ModelSpec, QuantizationConfig};
pub use crate::domain::ports::{
    ConfigProvider, GraphExporter, GraphQuantizer, PresetProvider, TokenizerExporter,
};
pub use crate::utils::error::Result;

pub use export::ExportEngine;

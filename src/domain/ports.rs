use crate::domain::model::{
    ExportLayout, ExporterBackend, ModelSpec, QuantizationConfig, QuantizationPreset,
};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

pub trait ConfigProvider: Send + Sync {
    fn model_id(&self) -> &str;
    fn revision(&self) -> &str;
    fn output_dir(&self) -> &str;
    fn presets(&self) -> &[QuantizationPreset];
    fn per_channel(&self) -> bool;
    fn exporter(&self) -> ExporterBackend;
    fn optimum_cli(&self) -> &str;
    fn hub_endpoint(&self) -> Option<&str>;
    fn hub_cache_dir(&self) -> Option<&str>;
    fn onnx_file(&self) -> &str;
    fn download_progress(&self) -> bool;

    fn model_spec(&self) -> ModelSpec {
        ModelSpec::new(self.model_id()).with_revision(self.revision())
    }

    fn layout(&self) -> ExportLayout {
        ExportLayout::new(self.output_dir())
    }
}

/// Exports pretrained weights into an ONNX graph directory.
#[async_trait]
pub trait GraphExporter: Send + Sync {
    async fn export(&self, model: &ModelSpec, target_dir: &Path) -> Result<()>;
}

/// Writes `tokenizer.json` (and companions) into the output directory.
#[async_trait]
pub trait TokenizerExporter: Send + Sync {
    async fn save(&self, model: &ModelSpec, output_dir: &Path) -> Result<PathBuf>;
}

/// Dynamic quantization of an exported graph directory into `save_dir`.
#[async_trait]
pub trait GraphQuantizer: Send + Sync {
    async fn quantize(
        &self,
        model_dir: &Path,
        save_dir: &Path,
        config: &QuantizationConfig,
    ) -> Result<()>;
}

/// 建構量化設定，可能因 CPU 不支援而失敗
pub trait PresetProvider: Send + Sync {
    fn build(&self, preset: QuantizationPreset, per_channel: bool) -> Result<QuantizationConfig>;
}

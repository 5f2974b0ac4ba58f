#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
pub use cli::CliConfig;

use crate::adapters::hub::DEFAULT_ONNX_FILE;
use crate::adapters::optimum::DEFAULT_OPTIMUM_CLI;
use crate::core::ConfigProvider;
use crate::domain::model::{ExporterBackend, QuantizationPreset};
use crate::utils::error::Result;
use crate::utils::validation::{
    validate_non_empty_list, validate_non_empty_string, validate_path, validate_repo_id,
    validate_url, Validate,
};
use toml_config::TomlConfig;

pub const DEFAULT_MODEL_ID: &str = "BAAI/bge-reranker-v2-m3";
pub const DEFAULT_OUTPUT_DIR: &str = "./models";

/// 合併命令列與 TOML 後的最終設定
#[derive(Debug, Clone, PartialEq)]
pub struct ExportSettings {
    pub model_id: String,
    pub revision: String,
    pub output_dir: String,
    pub presets: Vec<QuantizationPreset>,
    pub per_channel: bool,
    pub exporter: ExporterBackend,
    pub optimum_cli: String,
    pub hub_endpoint: Option<String>,
    pub hub_cache_dir: Option<String>,
    /// hub 後端下載的 ONNX 檔案路徑 (repo 內)
    pub onnx_file: String,
    pub download_progress: bool,
    pub monitor: bool,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            model_id: DEFAULT_MODEL_ID.to_string(),
            revision: "main".to_string(),
            output_dir: DEFAULT_OUTPUT_DIR.to_string(),
            presets: QuantizationPreset::default_chain(),
            per_channel: false,
            exporter: ExporterBackend::default(),
            optimum_cli: DEFAULT_OPTIMUM_CLI.to_string(),
            hub_endpoint: None,
            hub_cache_dir: None,
            onnx_file: DEFAULT_ONNX_FILE.to_string(),
            download_progress: true,
            monitor: false,
        }
    }
}

impl ExportSettings {
    pub fn from_toml(toml: TomlConfig) -> Self {
        let defaults = Self::default();
        Self {
            model_id: toml.model.id.unwrap_or(defaults.model_id),
            revision: toml.model.revision.unwrap_or(defaults.revision),
            output_dir: toml.output.dir.unwrap_or(defaults.output_dir),
            presets: toml.quantization.presets.unwrap_or(defaults.presets),
            per_channel: toml.quantization.per_channel.unwrap_or(defaults.per_channel),
            exporter: toml.export.backend.unwrap_or(defaults.exporter),
            optimum_cli: toml.export.optimum_cli.unwrap_or(defaults.optimum_cli),
            hub_endpoint: toml.hub.endpoint,
            hub_cache_dir: toml.hub.cache_dir,
            onnx_file: toml.export.onnx_file.unwrap_or(defaults.onnx_file),
            download_progress: toml.hub.progress.unwrap_or(defaults.download_progress),
            monitor: toml.monitoring.enabled,
        }
    }

    /// 命令列參數覆蓋 TOML 設定
    #[cfg(feature = "cli")]
    pub fn resolve(cli: &CliConfig) -> Result<Self> {
        let mut settings = match &cli.config {
            Some(path) => {
                tracing::info!("📁 Loading configuration from: {}", path.display());
                Self::from_toml(TomlConfig::from_file(path)?)
            }
            None => Self::default(),
        };

        if let Some(model_id) = &cli.model_id {
            settings.model_id = model_id.clone();
        }
        if let Some(revision) = &cli.revision {
            settings.revision = revision.clone();
        }
        if let Some(output_dir) = &cli.output_dir {
            settings.output_dir = output_dir.clone();
        }
        if !cli.presets.is_empty() {
            settings.presets = cli.presets.clone();
        }
        if let Some(exporter) = cli.exporter {
            settings.exporter = exporter;
        }
        if let Some(optimum_cli) = &cli.optimum_cli {
            settings.optimum_cli = optimum_cli.clone();
        }
        if let Some(endpoint) = &cli.hub_endpoint {
            settings.hub_endpoint = Some(endpoint.clone());
        }
        if let Some(cache_dir) = &cli.hub_cache_dir {
            settings.hub_cache_dir = Some(cache_dir.clone());
        }
        if let Some(onnx_file) = &cli.onnx_file {
            settings.onnx_file = onnx_file.clone();
        }
        // JSON 日誌時不畫進度條
        if cli.log_json {
            settings.download_progress = false;
        }
        settings.per_channel |= cli.per_channel;
        settings.monitor |= cli.monitor;

        Ok(settings)
    }
}

impl ConfigProvider for ExportSettings {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn revision(&self) -> &str {
        &self.revision
    }

    fn output_dir(&self) -> &str {
        &self.output_dir
    }

    fn presets(&self) -> &[QuantizationPreset] {
        &self.presets
    }

    fn per_channel(&self) -> bool {
        self.per_channel
    }

    fn exporter(&self) -> ExporterBackend {
        self.exporter
    }

    fn optimum_cli(&self) -> &str {
        &self.optimum_cli
    }

    fn hub_endpoint(&self) -> Option<&str> {
        self.hub_endpoint.as_deref()
    }

    fn hub_cache_dir(&self) -> Option<&str> {
        self.hub_cache_dir.as_deref()
    }

    fn onnx_file(&self) -> &str {
        &self.onnx_file
    }

    fn download_progress(&self) -> bool {
        self.download_progress
    }
}

impl Validate for ExportSettings {
    fn validate(&self) -> Result<()> {
        // tokenizer 一律從 hub 下載，所以 model id 必須是 repo id
        validate_repo_id("model.id", &self.model_id)?;
        validate_non_empty_string("model.revision", &self.revision)?;
        validate_path("output.dir", &self.output_dir)?;
        validate_non_empty_list("quantization.presets", &self.presets)?;
        validate_non_empty_string("export.optimum_cli", &self.optimum_cli)?;
        validate_non_empty_string("export.onnx_file", &self.onnx_file)?;

        if let Some(endpoint) = &self.hub_endpoint {
            validate_url("hub.endpoint", endpoint)?;
        }
        if let Some(cache_dir) = &self.hub_cache_dir {
            validate_path("hub.cache_dir", cache_dir)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_embedded_constants() {
        let settings = ExportSettings::default();

        assert_eq!(settings.model_id, "BAAI/bge-reranker-v2-m3");
        assert_eq!(settings.output_dir, "./models");
        assert_eq!(
            settings.presets,
            vec![QuantizationPreset::Avx512Vnni, QuantizationPreset::Avx2]
        );
        assert_eq!(settings.exporter, ExporterBackend::OptimumCli);
        assert_eq!(settings.onnx_file, "onnx/model.onnx");
        assert!(settings.download_progress);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_model_spec_and_layout_come_from_provider() {
        let settings = ExportSettings {
            model_id: "org/model".to_string(),
            revision: "v2".to_string(),
            output_dir: "/tmp/out".to_string(),
            ..ExportSettings::default()
        };

        let spec = settings.model_spec();
        assert_eq!(spec.model_id, "org/model");
        assert_eq!(spec.revision, "v2");
        assert_eq!(
            settings.layout().temp_dir(),
            std::path::PathBuf::from("/tmp/out/temp_onnx")
        );
    }

    #[test]
    fn test_toml_values_override_defaults() {
        let toml = TomlConfig::from_toml_str(
            r#"
[model]
id = "org/other"

[quantization]
presets = ["avx2"]
"#,
        )
        .unwrap();

        let settings = ExportSettings::from_toml(toml);
        assert_eq!(settings.model_id, "org/other");
        assert_eq!(settings.output_dir, "./models");
        assert_eq!(settings.presets, vec![QuantizationPreset::Avx2]);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let settings = ExportSettings {
            presets: vec![],
            ..ExportSettings::default()
        };
        assert!(settings.validate().is_err());

        let settings = ExportSettings {
            hub_endpoint: Some("ftp://mirror".to_string()),
            ..ExportSettings::default()
        };
        assert!(settings.validate().is_err());

        let settings = ExportSettings {
            model_id: "not-a-repo".to_string(),
            ..ExportSettings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[cfg(feature = "cli")]
    #[test]
    fn test_cli_overrides_toml_file() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"[model]\nid = \"org/from-file\"\n[output]\ndir = \"/tmp/file-out\"\n")
            .unwrap();

        let cli = CliConfig {
            config: Some(file.path().to_path_buf()),
            output_dir: Some("/tmp/cli-out".to_string()),
            per_channel: true,
            ..CliConfig::default()
        };

        let settings = ExportSettings::resolve(&cli).unwrap();
        assert_eq!(settings.model_id, "org/from-file");
        assert_eq!(settings.output_dir, "/tmp/cli-out");
        assert!(settings.per_channel);
        assert!(settings.download_progress);
    }

    #[cfg(feature = "cli")]
    #[test]
    fn test_json_logging_disables_download_progress() {
        let cli = CliConfig {
            log_json: true,
            hub_cache_dir: Some("/tmp/hf-cache".to_string()),
            onnx_file: Some("onnx/model_fp16.onnx".to_string()),
            ..CliConfig::default()
        };

        let settings = ExportSettings::resolve(&cli).unwrap();
        assert!(!settings.download_progress);
        assert_eq!(settings.hub_cache_dir(), Some("/tmp/hf-cache"));
        assert_eq!(settings.onnx_file(), "onnx/model_fp16.onnx");
    }
}

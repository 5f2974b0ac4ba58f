//! `optimum-cli` backed exporter and quantizer.
//!
//! Graph export and INT8 kernels live in Hugging Face Optimum / ONNX Runtime;
//! these adapters only build the command line and check the exit status.

use crate::domain::model::{ModelSpec, QuantizationConfig};
use crate::domain::ports::{GraphExporter, GraphQuantizer};
use crate::utils::error::{ExportError, Result};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

pub const DEFAULT_OPTIMUM_CLI: &str = "optimum-cli";
pub const SEQUENCE_CLASSIFICATION_TASK: &str = "text-classification";
/// huggingface_hub 讀取的 mirror 設定
pub const HF_ENDPOINT_ENV: &str = "HF_ENDPOINT";

fn command(program: &str, args: &[String]) -> Command {
    tracing::debug!("Running: {} {}", program, args.join(" "));
    let mut command = Command::new(program);
    command.args(args);
    command
}

// optimum 的下載與轉換進度直接輸出到終端機，只檢查結束狀態
async fn run_command(program: &str, mut command: Command) -> Result<()> {
    let status = command
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .await
        .map_err(|source| ExportError::CommandSpawn {
            program: program.to_string(),
            source,
        })?;

    if !status.success() {
        return Err(ExportError::CommandFailed {
            program: program.to_string(),
            status: status.to_string(),
        });
    }
    Ok(())
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// `optimum-cli export onnx`
#[derive(Debug, Clone)]
pub struct OptimumCliExporter {
    program: String,
    task: String,
    endpoint: Option<String>,
}

impl OptimumCliExporter {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            task: SEQUENCE_CLASSIFICATION_TASK.to_string(),
            endpoint: None,
        }
    }

    /// 讓子程序從同一個 hub mirror 下載權重
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn build_args(&self, model: &ModelSpec, target_dir: &Path) -> Vec<String> {
        let mut args = vec![
            "export".to_string(),
            "onnx".to_string(),
            "--model".to_string(),
            model.model_id.clone(),
            "--task".to_string(),
            self.task.clone(),
        ];
        if model.revision != "main" {
            args.push("--revision".to_string());
            args.push(model.revision.clone());
        }
        args.push(path_arg(target_dir));
        args
    }

    fn export_command(&self, model: &ModelSpec, target_dir: &Path) -> Command {
        let mut command = command(&self.program, &self.build_args(model, target_dir));
        if let Some(endpoint) = &self.endpoint {
            command.env(HF_ENDPOINT_ENV, endpoint);
        }
        command
    }
}

impl Default for OptimumCliExporter {
    fn default() -> Self {
        Self::new(DEFAULT_OPTIMUM_CLI)
    }
}

#[async_trait]
impl GraphExporter for OptimumCliExporter {
    async fn export(&self, model: &ModelSpec, target_dir: &Path) -> Result<()> {
        tracing::info!(
            "📦 Exporting {} via {} into {}",
            model.model_id,
            self.program,
            target_dir.display()
        );
        run_command(&self.program, self.export_command(model, target_dir)).await
    }
}

/// `optimum-cli onnxruntime quantize`
#[derive(Debug, Clone)]
pub struct OptimumCliQuantizer {
    program: String,
}

impl OptimumCliQuantizer {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn build_args(
        &self,
        model_dir: &Path,
        save_dir: &Path,
        config: &QuantizationConfig,
    ) -> Result<Vec<String>> {
        // CLI 只支援 dynamic quantization
        if config.is_static {
            return Err(ExportError::ProcessingError {
                message: "static quantization is not supported by optimum-cli quantize"
                    .to_string(),
            });
        }

        let mut args = vec![
            "onnxruntime".to_string(),
            "quantize".to_string(),
            "--onnx_model".to_string(),
            path_arg(model_dir),
            format!("--{}", config.preset.name()),
        ];
        if config.per_channel {
            args.push("--per_channel".to_string());
        }
        args.push("-o".to_string());
        args.push(path_arg(save_dir));
        Ok(args)
    }
}

impl Default for OptimumCliQuantizer {
    fn default() -> Self {
        Self::new(DEFAULT_OPTIMUM_CLI)
    }
}

#[async_trait]
impl GraphQuantizer for OptimumCliQuantizer {
    async fn quantize(
        &self,
        model_dir: &Path,
        save_dir: &Path,
        config: &QuantizationConfig,
    ) -> Result<()> {
        let args = self.build_args(model_dir, save_dir, config)?;
        tracing::info!(
            preset = %config.preset,
            weights = ?config.weights_dtype,
            activations = ?config.activations_dtype,
            per_channel = config.per_channel,
            "⚙️ Quantizing {}",
            model_dir.display()
        );
        run_command(&self.program, command(&self.program, &args)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::preset::dynamic_config;
    use crate::domain::model::QuantizationPreset;

    #[test]
    fn test_export_args_default_revision() {
        let exporter = OptimumCliExporter::default();
        let args = exporter.build_args(
            &ModelSpec::new("BAAI/bge-reranker-v2-m3"),
            Path::new("models/temp_onnx"),
        );

        assert_eq!(
            args,
            vec![
                "export",
                "onnx",
                "--model",
                "BAAI/bge-reranker-v2-m3",
                "--task",
                "text-classification",
                "models/temp_onnx",
            ]
        );
    }

    #[test]
    fn test_export_args_pinned_revision() {
        let exporter = OptimumCliExporter::default();
        let model = ModelSpec::new("org/model").with_revision("v2");
        let args = exporter.build_args(&model, Path::new("out"));

        let position = args.iter().position(|a| a == "--revision").unwrap();
        assert_eq!(args[position + 1], "v2");
        assert_eq!(args.last().unwrap(), "out");
    }

    #[test]
    fn test_export_command_forwards_hub_endpoint() {
        let model = ModelSpec::new("org/model");

        let mirrored = OptimumCliExporter::default().with_endpoint("https://mirror.example.com");
        let command = mirrored.export_command(&model, Path::new("out"));
        let envs: Vec<_> = command.as_std().get_envs().collect();
        assert_eq!(
            envs,
            vec![(
                std::ffi::OsStr::new(HF_ENDPOINT_ENV),
                Some(std::ffi::OsStr::new("https://mirror.example.com"))
            )]
        );

        let direct = OptimumCliExporter::default().export_command(&model, Path::new("out"));
        assert_eq!(direct.as_std().get_envs().count(), 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_is_command_failed() {
        let err = run_command("false", command("false", &[]))
            .await
            .unwrap_err();
        match err {
            ExportError::CommandFailed { program, .. } => assert_eq!(program, "false"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_quantize_args_use_preset_flag() {
        let quantizer = OptimumCliQuantizer::default();
        let config = dynamic_config(QuantizationPreset::Avx512Vnni, true);
        let args = quantizer
            .build_args(Path::new("models/temp_onnx"), Path::new("models"), &config)
            .unwrap();

        assert_eq!(
            args,
            vec![
                "onnxruntime",
                "quantize",
                "--onnx_model",
                "models/temp_onnx",
                "--avx512_vnni",
                "--per_channel",
                "-o",
                "models",
            ]
        );
    }

    #[test]
    fn test_static_config_rejected() {
        let quantizer = OptimumCliQuantizer::default();
        let mut config = dynamic_config(QuantizationPreset::Avx2, false);
        config.is_static = true;

        assert!(quantizer
            .build_args(Path::new("a"), Path::new("b"), &config)
            .is_err());
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let quantizer = OptimumCliQuantizer::new("definitely-not-an-installed-optimum-cli");
        let config = dynamic_config(QuantizationPreset::Avx2, false);

        let err = quantizer
            .quantize(Path::new("a"), Path::new("b"), &config)
            .await
            .unwrap_err();
        assert!(matches!(err, ExportError::CommandSpawn { .. }));
    }
}

use crate::domain::model::{ExporterBackend, QuantizationPreset};
use clap::Parser;
use std::path::PathBuf;

/// 不帶任何參數時使用內建的 model id 與輸出目錄
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "onnx-quant-export")]
#[command(about = "Export a Hugging Face sequence-classification model to INT8 ONNX")]
pub struct CliConfig {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Hub model id (org/name)
    #[arg(long)]
    pub model_id: Option<String>,

    #[arg(long)]
    pub revision: Option<String>,

    #[arg(long)]
    pub output_dir: Option<String>,

    /// Preset probe order, e.g. avx512_vnni,avx2
    #[arg(long, value_delimiter = ',')]
    pub presets: Vec<QuantizationPreset>,

    #[arg(long)]
    pub per_channel: bool,

    /// optimum-cli or hub
    #[arg(long)]
    pub exporter: Option<ExporterBackend>,

    #[arg(long)]
    pub optimum_cli: Option<String>,

    #[arg(long)]
    pub hub_endpoint: Option<String>,

    /// Local cache directory for hub downloads
    #[arg(long)]
    pub hub_cache_dir: Option<String>,

    /// Graph file inside the repo for the hub exporter
    #[arg(long)]
    pub onnx_file: Option<String>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON")]
    pub log_json: bool,

    #[arg(long, help = "Log CPU and memory usage per step")]
    pub monitor: bool,

    /// Show the resolved settings and preset probe without exporting
    #[arg(long)]
    pub dry_run: bool,
}

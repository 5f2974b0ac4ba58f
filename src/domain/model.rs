use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const TEMP_DIR_NAME: &str = "temp_onnx";
pub const STAGING_DIR_NAME: &str = "quantized";
pub const QUANTIZED_MODEL_FILE: &str = "model_quantized.onnx";
pub const UNSUFFIXED_MODEL_FILE: &str = "model.onnx";
pub const TOKENIZER_FILE: &str = "tokenizer.json";

/// 要匯出的遠端模型
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub model_id: String,
    pub revision: String,
}

impl ModelSpec {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            revision: "main".to_string(),
        }
    }

    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = revision.into();
        self
    }
}

/// 輸出目錄的固定檔案配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportLayout {
    output_dir: PathBuf,
}

impl ExportLayout {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.output_dir.join(TEMP_DIR_NAME)
    }

    /// 量化器的輸出目錄，位於暫存目錄內
    pub fn staging_dir(&self) -> PathBuf {
        self.temp_dir().join(STAGING_DIR_NAME)
    }

    pub fn quantized_model_path(&self) -> PathBuf {
        self.output_dir.join(QUANTIZED_MODEL_FILE)
    }

    /// 量化器有時直接輸出 model.onnx
    pub fn unsuffixed_model_path(&self) -> PathBuf {
        self.output_dir.join(UNSUFFIXED_MODEL_FILE)
    }

    pub fn tokenizer_path(&self) -> PathBuf {
        self.output_dir.join(TOKENIZER_FILE)
    }
}

/// Instruction-set specific quantization presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuantizationPreset {
    Avx512Vnni,
    Avx512,
    Avx2,
    Arm64,
}

impl QuantizationPreset {
    pub const ALL: [QuantizationPreset; 4] = [
        QuantizationPreset::Avx512Vnni,
        QuantizationPreset::Avx512,
        QuantizationPreset::Avx2,
        QuantizationPreset::Arm64,
    ];

    /// 預設的探測順序：先 AVX512-VNNI，失敗則退回 AVX2
    pub fn default_chain() -> Vec<QuantizationPreset> {
        vec![QuantizationPreset::Avx512Vnni, QuantizationPreset::Avx2]
    }

    pub fn name(&self) -> &'static str {
        match self {
            QuantizationPreset::Avx512Vnni => "avx512_vnni",
            QuantizationPreset::Avx512 => "avx512",
            QuantizationPreset::Avx2 => "avx2",
            QuantizationPreset::Arm64 => "arm64",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            QuantizationPreset::Avx512Vnni => "AVX512-VNNI",
            QuantizationPreset::Avx512 => "AVX512",
            QuantizationPreset::Avx2 => "AVX2",
            QuantizationPreset::Arm64 => "ARM64",
        }
    }
}

impl fmt::Display for QuantizationPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for QuantizationPreset {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        QuantizationPreset::ALL
            .iter()
            .copied()
            .find(|preset| preset.name() == normalized)
            .ok_or_else(|| {
                format!(
                    "unknown preset '{}', expected one of: avx512_vnni, avx512, avx2, arm64",
                    s
                )
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantType {
    QInt8,
    QUInt8,
}

/// 一組已確認可用的量化設定
///
/// `weights_dtype` / `activations_dtype` 描述 preset 對應的 INT8 型別，
/// 實際 kernel 由 preset 旗標決定。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuantizationConfig {
    pub preset: QuantizationPreset,
    pub is_static: bool,
    pub activations_dtype: QuantType,
    pub weights_dtype: QuantType,
    pub per_channel: bool,
}

/// Which exporter turns hub weights into an ONNX graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExporterBackend {
    #[default]
    OptimumCli,
    Hub,
}

impl FromStr for ExporterBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "optimum-cli" | "optimum" => Ok(ExporterBackend::OptimumCli),
            "hub" => Ok(ExporterBackend::Hub),
            other => Err(format!(
                "unknown exporter '{}', expected optimum-cli or hub",
                other
            )),
        }
    }
}

impl fmt::Display for ExporterBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExporterBackend::OptimumCli => f.write_str("optimum-cli"),
            ExporterBackend::Hub => f.write_str("hub"),
        }
    }
}

/// 完成後的匯出摘要
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReport {
    pub model_path: PathBuf,
    pub tokenizer_path: PathBuf,
    pub model_size_bytes: u64,
    pub preset: QuantizationPreset,
}

impl ExportReport {
    pub fn model_size_mb(&self) -> f64 {
        self.model_size_bytes as f64 / (1024.0 * 1024.0)
    }

    pub fn summary(&self) -> String {
        format!(
            "Export complete!\n  Model: {} ({:.1} MB)\n  Tokenizer: {}",
            self.model_path.display(),
            self.model_size_mb(),
            self.tokenizer_path.display()
        )
    }
}

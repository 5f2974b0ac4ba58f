use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Hub request failed: {0}")]
    HubError(#[from] hf_hub::api::tokio::ApiError),

    #[error("Tokenizer error: {message}")]
    TokenizerError { message: String },

    #[error("Failed to launch `{program}`: {source}")]
    CommandSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{program}` exited with {status}")]
    CommandFailed { program: String, status: String },

    #[error("Quantization preset {preset} unavailable: {reason}")]
    PresetUnavailable { preset: String, reason: String },

    #[error("No quantization preset could be built (tried: {})", .tried.join(", "))]
    NoPresetAvailable { tried: Vec<String> },

    #[error("Expected {kind} at {}", .path.display())]
    MissingArtifact { kind: String, path: PathBuf },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value for {field} ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Processing error: {message}")]
    ProcessingError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Network,
    Toolchain,
    Filesystem,
    Postcondition,
    Processing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Medium,
    High,
    Critical,
}

impl ErrorSeverity {
    pub fn exit_code(&self) -> i32 {
        match self {
            ErrorSeverity::High => 1,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::Critical => 3,
        }
    }
}

impl ExportError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ExportError::IoError(_) => ErrorCategory::Filesystem,
            ExportError::HubError(_) => ErrorCategory::Network,
            ExportError::CommandSpawn { .. } | ExportError::CommandFailed { .. } => {
                ErrorCategory::Toolchain
            }
            ExportError::MissingArtifact { .. } => ErrorCategory::Postcondition,
            ExportError::ConfigError { .. }
            | ExportError::MissingConfigError { .. }
            | ExportError::InvalidConfigValueError { .. }
            | ExportError::ConfigValidationError { .. } => ErrorCategory::Configuration,
            ExportError::TokenizerError { .. }
            | ExportError::PresetUnavailable { .. }
            | ExportError::NoPresetAvailable { .. }
            | ExportError::ProcessingError { .. } => ErrorCategory::Processing,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Postcondition | ErrorCategory::Processing => ErrorSeverity::High,
            ErrorCategory::Configuration
            | ErrorCategory::Toolchain
            | ErrorCategory::Filesystem => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            ExportError::HubError(_) => {
                "檢查網路連線與 model id，私有模型請設定 HF_TOKEN".to_string()
            }
            ExportError::CommandSpawn { program, .. } => format!(
                "找不到 `{}`，請先執行 pip install \"optimum[exporters,onnxruntime]\"",
                program
            ),
            ExportError::CommandFailed { program, .. } => {
                format!("查看上方 `{}` 的輸出訊息，確認模型支援 ONNX 匯出", program)
            }
            ExportError::NoPresetAvailable { .. } | ExportError::PresetUnavailable { .. } => {
                "在 --presets 加上 avx2 作為可攜式備援".to_string()
            }
            ExportError::MissingArtifact { path, .. } => format!(
                "量化器未產生預期檔案，請檢查 {} 的內容",
                path.parent()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| ".".to_string())
            ),
            ExportError::TokenizerError { .. } => {
                "確認模型 repo 內含有效的 tokenizer.json".to_string()
            }
            ExportError::IoError(_) => "檢查輸出目錄的權限與磁碟空間".to_string(),
            ExportError::ConfigError { .. }
            | ExportError::MissingConfigError { .. }
            | ExportError::InvalidConfigValueError { .. }
            | ExportError::ConfigValidationError { .. } => {
                "檢查命令列參數或 TOML 設定檔".to_string()
            }
            ExportError::ProcessingError { .. } => "使用 --verbose 重新執行以取得詳細日誌".to_string(),
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => format!("設定錯誤: {}", self),
            ErrorCategory::Network => format!("下載失敗: {}", self),
            ErrorCategory::Toolchain => format!("外部工具執行失敗: {}", self),
            ErrorCategory::Filesystem => format!("檔案系統錯誤: {}", self),
            ErrorCategory::Postcondition => format!("匯出結果不完整: {}", self),
            ErrorCategory::Processing => format!("處理失敗: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, ExportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_artifact_names_path() {
        let err = ExportError::MissingArtifact {
            kind: "quantized model".to_string(),
            path: PathBuf::from("models/model_quantized.onnx"),
        };

        assert_eq!(
            err.to_string(),
            "Expected quantized model at models/model_quantized.onnx"
        );
        assert_eq!(err.category(), ErrorCategory::Postcondition);
        assert_eq!(err.severity().exit_code(), 1);
    }

    #[test]
    fn test_every_fatal_error_exits_non_zero() {
        let errors = vec![
            ExportError::IoError(std::io::Error::new(std::io::ErrorKind::Other, "disk")),
            ExportError::ConfigError {
                message: "bad".to_string(),
            },
            ExportError::NoPresetAvailable {
                tried: vec!["avx512_vnni".to_string()],
            },
            ExportError::CommandFailed {
                program: "optimum-cli".to_string(),
                status: "exit status: 1".to_string(),
            },
        ];

        for err in errors {
            assert!(err.severity().exit_code() > 0, "{:?}", err);
        }
    }

    #[test]
    fn test_no_preset_message_lists_candidates() {
        let err = ExportError::NoPresetAvailable {
            tried: vec!["avx512_vnni".to_string(), "arm64".to_string()],
        };
        assert!(err.to_string().contains("avx512_vnni, arm64"));
    }
}

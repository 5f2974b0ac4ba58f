use crate::domain::model::{
    ExportLayout, ExportReport, QuantizationPreset, QUANTIZED_MODEL_FILE, UNSUFFIXED_MODEL_FILE,
};
use crate::utils::error::{ExportError, Result};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Model files the quantizer may have written into the staging directory,
/// preferred name first.
async fn staged_model(layout: &ExportLayout) -> Result<Option<PathBuf>> {
    let staging = layout.staging_dir();
    for name in [QUANTIZED_MODEL_FILE, UNSUFFIXED_MODEL_FILE] {
        let candidate = staging.join(name);
        if fs::try_exists(&candidate).await? {
            return Ok(Some(candidate));
        }
    }
    Ok(None)
}

async fn remove_stale_models(layout: &ExportLayout) -> Result<()> {
    for path in [layout.quantized_model_path(), layout.unsuffixed_model_path()] {
        if fs::try_exists(&path).await? {
            tracing::debug!("Removing previous {}", path.display());
            fs::remove_file(&path).await?;
        }
    }
    Ok(())
}

/// 把 staging 目錄裡的量化結果搬到 `model_quantized.onnx`
///
/// 量化器輸出 `model.onnx` 時一併改名。前一次執行留下的模型只在有新結果時
/// 才被取代；量化器沒有產生任何檔案時也會清掉舊檔，讓驗證回報缺檔。
pub async fn promote_quantized_model(layout: &ExportLayout) -> Result<bool> {
    let staged = staged_model(layout).await?;
    remove_stale_models(layout).await?;

    let Some(staged) = staged else {
        tracing::warn!(
            "⚠️ Quantizer finished without writing a model into {}",
            layout.staging_dir().display()
        );
        return Ok(false);
    };

    let target = layout.quantized_model_path();
    if staged.file_name() != target.file_name() {
        tracing::info!(
            "📝 Renaming quantizer output {} to {}",
            UNSUFFIXED_MODEL_FILE,
            QUANTIZED_MODEL_FILE
        );
    }
    tracing::debug!("Moving {} -> {}", staged.display(), target.display());
    fs::rename(&staged, &target).await?;
    Ok(true)
}

/// 移除暫存的未量化模型目錄
pub async fn remove_temp_dir(temp_dir: &Path) -> Result<bool> {
    if fs::try_exists(temp_dir).await? {
        fs::remove_dir_all(temp_dir).await?;
        tracing::debug!("🧹 Removed {}", temp_dir.display());
        return Ok(true);
    }
    Ok(false)
}

async fn require_file(kind: &str, path: &Path) -> Result<u64> {
    match fs::metadata(path).await {
        Ok(meta) if meta.is_file() => Ok(meta.len()),
        Ok(_) => Err(ExportError::MissingArtifact {
            kind: kind.to_string(),
            path: path.to_path_buf(),
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ExportError::MissingArtifact {
            kind: kind.to_string(),
            path: path.to_path_buf(),
        }),
        Err(e) => Err(e.into()),
    }
}

/// Checks that both final artifacts exist, model first.
pub async fn verify_artifacts(
    layout: &ExportLayout,
    preset: QuantizationPreset,
) -> Result<ExportReport> {
    let model_path = layout.quantized_model_path();
    let tokenizer_path = layout.tokenizer_path();

    let model_size_bytes = require_file("quantized model", &model_path).await?;
    require_file("tokenizer", &tokenizer_path).await?;

    Ok(ExportReport {
        model_path,
        tokenizer_path,
        model_size_bytes,
        preset,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn staged_layout(dir: &TempDir) -> ExportLayout {
        let layout = ExportLayout::new(dir.path());
        std::fs::create_dir_all(layout.staging_dir()).unwrap();
        layout
    }

    #[tokio::test]
    async fn test_unsuffixed_staged_model_is_renamed() {
        let dir = TempDir::new().unwrap();
        let layout = staged_layout(&dir);
        std::fs::write(layout.staging_dir().join("model.onnx"), b"onnx").unwrap();

        assert!(promote_quantized_model(&layout).await.unwrap());
        assert_eq!(std::fs::read(layout.quantized_model_path()).unwrap(), b"onnx");
        assert!(!layout.unsuffixed_model_path().exists());
    }

    #[tokio::test]
    async fn test_suffixed_staged_model_preferred() {
        let dir = TempDir::new().unwrap();
        let layout = staged_layout(&dir);
        std::fs::write(layout.staging_dir().join("model_quantized.onnx"), b"quantized").unwrap();
        std::fs::write(layout.staging_dir().join("model.onnx"), b"other").unwrap();

        assert!(promote_quantized_model(&layout).await.unwrap());
        assert_eq!(
            std::fs::read(layout.quantized_model_path()).unwrap(),
            b"quantized"
        );
    }

    #[tokio::test]
    async fn test_previous_models_replaced_tokenizer_kept() {
        let dir = TempDir::new().unwrap();
        let layout = staged_layout(&dir);
        std::fs::write(layout.quantized_model_path(), b"old").unwrap();
        std::fs::write(layout.unsuffixed_model_path(), b"old").unwrap();
        std::fs::write(layout.tokenizer_path(), b"{}").unwrap();
        std::fs::write(layout.staging_dir().join("model_quantized.onnx"), b"new").unwrap();

        promote_quantized_model(&layout).await.unwrap();

        assert_eq!(std::fs::read(layout.quantized_model_path()).unwrap(), b"new");
        assert!(!layout.unsuffixed_model_path().exists());
        assert!(layout.tokenizer_path().exists());
    }

    #[tokio::test]
    async fn test_empty_staging_clears_previous_model() {
        let dir = TempDir::new().unwrap();
        let layout = staged_layout(&dir);
        std::fs::write(layout.quantized_model_path(), b"old").unwrap();

        assert!(!promote_quantized_model(&layout).await.unwrap());
        assert!(!layout.quantized_model_path().exists());
    }

    #[tokio::test]
    async fn test_remove_missing_temp_dir_is_noop() {
        let dir = TempDir::new().unwrap();
        let layout = ExportLayout::new(dir.path());
        assert!(!remove_temp_dir(&layout.temp_dir()).await.unwrap());
    }

    #[tokio::test]
    async fn test_directory_in_place_of_model_is_missing() {
        let dir = TempDir::new().unwrap();
        let layout = ExportLayout::new(dir.path());
        std::fs::create_dir(layout.quantized_model_path()).unwrap();
        std::fs::write(layout.tokenizer_path(), b"{}").unwrap();

        let err = verify_artifacts(&layout, QuantizationPreset::Avx2)
            .await
            .unwrap_err();
        assert!(matches!(err, ExportError::MissingArtifact { .. }));
    }
}

//! Hugging Face Hub downloads: pre-exported ONNX graphs and tokenizers.

use crate::domain::model::{ModelSpec, TOKENIZER_FILE, UNSUFFIXED_MODEL_FILE};
use crate::domain::ports::{GraphExporter, TokenizerExporter};
use crate::utils::error::{ExportError, Result};
use async_trait::async_trait;
use hf_hub::api::tokio::{Api, ApiBuilder, ApiError, ApiRepo};
use hf_hub::{Repo, RepoType};
use reqwest::StatusCode;
use std::path::{Path, PathBuf};
use tokenizers::Tokenizer;

/// 已匯出 ONNX 圖在 repo 內的慣用位置
pub const DEFAULT_ONNX_FILE: &str = "onnx/model.onnx";

/// tokenizer `save_pretrained` 會一併寫出的檔案
pub const TOKENIZER_COMPANION_FILES: [&str; 2] =
    ["tokenizer_config.json", "special_tokens_map.json"];

/// Shared hub client settings.
#[derive(Debug, Clone, Default)]
pub struct HubClient {
    endpoint: Option<String>,
    token: Option<String>,
    cache_dir: Option<PathBuf>,
    progress: bool,
}

impl HubClient {
    pub fn new() -> Self {
        Self {
            token: Self::resolve_token(),
            progress: true,
            ..Self::default()
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// HF_TOKEN 優先，否則交給 hf-hub 讀取本機快取的 token
    pub fn resolve_token() -> Option<String> {
        normalize_token(std::env::var("HF_TOKEN").ok())
    }

    fn build_api(&self) -> Result<Api> {
        let mut builder = ApiBuilder::new().with_progress(self.progress);

        if let Some(endpoint) = &self.endpoint {
            builder = builder.with_endpoint(endpoint.clone());
        }
        if let Some(cache_dir) = &self.cache_dir {
            builder = builder.with_cache_dir(cache_dir.clone());
        }
        if self.token.is_some() {
            builder = builder.with_token(self.token.clone());
        }

        Ok(builder.build()?)
    }

    pub fn repo(&self, model: &ModelSpec) -> Result<ApiRepo> {
        let api = self.build_api()?;
        Ok(api.repo(Repo::with_revision(
            model.model_id.clone(),
            RepoType::Model,
            model.revision.clone(),
        )))
    }
}

fn normalize_token(raw: Option<String>) -> Option<String> {
    raw.map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

/// 只有 404 代表 repo 裡沒有這個檔案
fn is_not_found(err: &ApiError) -> bool {
    matches!(err, ApiError::RequestError(e) if e.status() == Some(StatusCode::NOT_FOUND))
}

/// 下載單一檔案並複製到目的地
async fn fetch_into(repo: &ApiRepo, file: &str, dest: &Path) -> Result<()> {
    let cached = repo.get(file).await?;
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::copy(&cached, dest).await?;
    tracing::debug!("⬇️ {} -> {}", file, dest.display());
    Ok(())
}

/// Optional files: a 404 means "not in this repo", any other failure propagates.
async fn fetch_optional(repo: &ApiRepo, file: &str, dest: &Path) -> Result<bool> {
    match repo.get(file).await {
        Ok(cached) => {
            tokio::fs::copy(&cached, dest).await?;
            tracing::debug!("⬇️ {} -> {}", file, dest.display());
            Ok(true)
        }
        Err(e) if is_not_found(&e) => {
            tracing::debug!("Skipping optional {}: not in repo", file);
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

/// Fetches a graph someone already exported (e.g. `onnx/model.onnx`) instead
/// of running the exporter locally.
#[derive(Debug, Clone)]
pub struct HubOnnxExporter {
    client: HubClient,
    onnx_file: String,
}

impl HubOnnxExporter {
    pub fn new(client: HubClient) -> Self {
        Self {
            client,
            onnx_file: DEFAULT_ONNX_FILE.to_string(),
        }
    }

    pub fn with_onnx_file(mut self, file: impl Into<String>) -> Self {
        self.onnx_file = file.into();
        self
    }
}

#[async_trait]
impl GraphExporter for HubOnnxExporter {
    async fn export(&self, model: &ModelSpec, target_dir: &Path) -> Result<()> {
        tracing::info!(
            "📦 Downloading pre-exported {} from {}",
            self.onnx_file,
            model.model_id
        );
        let repo = self.client.repo(model)?;
        tokio::fs::create_dir_all(target_dir).await?;

        fetch_into(&repo, &self.onnx_file, &target_dir.join(UNSUFFIXED_MODEL_FILE)).await?;

        // 大於 2GB 的模型會把權重放在外部資料檔
        let external_data = format!("{}_data", self.onnx_file);
        fetch_optional(
            &repo,
            &external_data,
            &target_dir.join(format!("{}_data", UNSUFFIXED_MODEL_FILE)),
        )
        .await?;
        fetch_optional(&repo, "config.json", &target_dir.join("config.json")).await?;

        Ok(())
    }
}

/// Downloads `tokenizer.json`, validates it by loading it, and saves it.
#[derive(Debug, Clone)]
pub struct HubTokenizerExporter {
    client: HubClient,
}

impl HubTokenizerExporter {
    pub fn new(client: HubClient) -> Self {
        Self { client }
    }
}

/// 載入 tokenizer.json 驗證格式後重新寫出
pub async fn resave_tokenizer(source: PathBuf, dest: PathBuf) -> Result<usize> {
    tokio::task::spawn_blocking(move || -> Result<usize> {
        let tokenizer = Tokenizer::from_file(&source).map_err(|e| ExportError::TokenizerError {
            message: format!("failed to load {}: {}", source.display(), e),
        })?;
        let vocab_size = tokenizer.get_vocab_size(true);
        tokenizer
            .save(&dest, true)
            .map_err(|e| ExportError::TokenizerError {
                message: format!("failed to save {}: {}", dest.display(), e),
            })?;
        Ok(vocab_size)
    })
    .await
    .map_err(|e| ExportError::ProcessingError {
        message: format!("tokenizer task panicked: {}", e),
    })?
}

#[async_trait]
impl TokenizerExporter for HubTokenizerExporter {
    async fn save(&self, model: &ModelSpec, output_dir: &Path) -> Result<PathBuf> {
        let repo = self.client.repo(model)?;
        let cached = repo.get(TOKENIZER_FILE).await?;
        let dest = output_dir.join(TOKENIZER_FILE);

        let vocab_size = resave_tokenizer(cached, dest.clone()).await?;
        tracing::info!(vocab_size, "🔤 Tokenizer saved to {}", dest.display());

        for companion in TOKENIZER_COMPANION_FILES {
            fetch_optional(&repo, companion, &output_dir.join(companion)).await?;
        }

        Ok(dest)
    }
}

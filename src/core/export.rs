use crate::core::finalize::{promote_quantized_model, remove_temp_dir, verify_artifacts};
use crate::core::preset::{select_quantization_config, CpuPresetProvider};
use crate::domain::model::{ExportLayout, ExportReport, ModelSpec, QuantizationPreset};
use crate::domain::ports::{GraphExporter, GraphQuantizer, PresetProvider, TokenizerExporter};
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;

/// Runs the export → tokenizer → quantize → finalize sequence.
pub struct ExportEngine {
    exporter: Box<dyn GraphExporter>,
    tokenizer: Box<dyn TokenizerExporter>,
    quantizer: Box<dyn GraphQuantizer>,
    presets: Box<dyn PresetProvider>,
    preset_chain: Vec<QuantizationPreset>,
    per_channel: bool,
    monitor: SystemMonitor,
}

impl ExportEngine {
    pub fn new(
        exporter: Box<dyn GraphExporter>,
        tokenizer: Box<dyn TokenizerExporter>,
        quantizer: Box<dyn GraphQuantizer>,
    ) -> Self {
        Self {
            exporter,
            tokenizer,
            quantizer,
            presets: Box::new(CpuPresetProvider),
            preset_chain: QuantizationPreset::default_chain(),
            per_channel: false,
            monitor: SystemMonitor::new(false),
        }
    }

    pub fn with_preset_provider(mut self, presets: Box<dyn PresetProvider>) -> Self {
        self.presets = presets;
        self
    }

    pub fn with_preset_chain(mut self, chain: Vec<QuantizationPreset>) -> Self {
        self.preset_chain = chain;
        self
    }

    pub fn with_per_channel(mut self, per_channel: bool) -> Self {
        self.per_channel = per_channel;
        self
    }

    pub fn with_monitoring(mut self, enabled: bool) -> Self {
        self.monitor = SystemMonitor::new(enabled);
        self
    }

    pub async fn run(&self, model: &ModelSpec, layout: &ExportLayout) -> Result<ExportReport> {
        println!(
            "Exporting {} to ONNX with INT8 quantization...",
            model.model_id
        );
        tracing::info!(
            model_id = %model.model_id,
            revision = %model.revision,
            output_dir = %layout.output_dir().display(),
            "🚀 Starting export"
        );

        tokio::fs::create_dir_all(layout.output_dir()).await?;
        let temp_dir = layout.temp_dir();

        // Step 1: 下載並匯出成 ONNX (暫存目錄)
        println!("Step 1/4: Downloading model and exporting to ONNX...");
        self.exporter.export(model, &temp_dir).await?;
        self.monitor.log_stats("Export");

        // Step 2: tokenizer
        println!("Step 2/4: Saving tokenizer...");
        let tokenizer_path = self.tokenizer.save(model, layout.output_dir()).await?;
        tracing::debug!("Tokenizer written to {}", tokenizer_path.display());
        self.monitor.log_stats("Tokenizer");

        // Step 3: INT8 dynamic quantization
        println!("Step 3/4: Applying INT8 dynamic quantization...");
        let config =
            select_quantization_config(self.presets.as_ref(), &self.preset_chain, self.per_channel)?;
        // 先寫到 staging，失敗時上一次的模型保持不動
        let staging_dir = layout.staging_dir();
        tokio::fs::create_dir_all(&staging_dir).await?;
        self.quantizer
            .quantize(&temp_dir, &staging_dir, &config)
            .await?;
        self.monitor.log_stats("Quantize");

        // Step 4: 搬移、清理、驗證
        println!("Step 4/4: Cleaning up...");
        promote_quantized_model(layout).await?;
        remove_temp_dir(&temp_dir).await?;

        let report = verify_artifacts(layout, config.preset).await?;

        println!("\n{}", report.summary());
        tracing::info!(
            size_bytes = report.model_size_bytes,
            preset = %report.preset,
            "✅ Export complete"
        );
        self.monitor.log_final_stats();

        Ok(report)
    }
}

// Adapters layer: concrete implementations of the export ports.

pub mod hub;
pub mod optimum;

use crate::core::ExportEngine;
use crate::domain::model::ExporterBackend;
use crate::domain::ports::{ConfigProvider, GraphExporter};
use hub::{HubClient, HubOnnxExporter, HubTokenizerExporter};
use optimum::{OptimumCliExporter, OptimumCliQuantizer};

pub fn hub_client<C: ConfigProvider + ?Sized>(config: &C) -> HubClient {
    let mut client = HubClient::new().with_progress(config.download_progress());
    if let Some(endpoint) = config.hub_endpoint() {
        client = client.with_endpoint(endpoint);
    }
    if let Some(cache_dir) = config.hub_cache_dir() {
        client = client.with_cache_dir(cache_dir);
    }
    client
}

pub fn graph_exporter<C: ConfigProvider + ?Sized>(config: &C) -> Box<dyn GraphExporter> {
    match config.exporter() {
        ExporterBackend::OptimumCli => {
            let exporter = OptimumCliExporter::new(config.optimum_cli());
            match config.hub_endpoint() {
                Some(endpoint) => Box::new(exporter.with_endpoint(endpoint)),
                None => Box::new(exporter),
            }
        }
        ExporterBackend::Hub => Box::new(
            HubOnnxExporter::new(hub_client(config)).with_onnx_file(config.onnx_file()),
        ),
    }
}

/// 依設定組裝完整的匯出引擎
pub fn build_engine<C: ConfigProvider + ?Sized>(config: &C) -> ExportEngine {
    ExportEngine::new(
        graph_exporter(config),
        Box::new(HubTokenizerExporter::new(hub_client(config))),
        Box::new(OptimumCliQuantizer::new(config.optimum_cli())),
    )
    .with_preset_chain(config.presets().to_vec())
    .with_per_channel(config.per_channel())
}

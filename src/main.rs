use clap::Parser;
use onnx_quant_export::core::preset::CpuPresetProvider;
use onnx_quant_export::core::ConfigProvider;
use onnx_quant_export::utils::{logger, validation::Validate};
use onnx_quant_export::{build_engine, CliConfig, ExportSettings};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    // 初始化日誌
    if cli.log_json {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting onnx-quant-export");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    let settings = match ExportSettings::resolve(&cli).and_then(|s| s.validate().map(|_| s)) {
        Ok(settings) => settings,
        Err(e) => {
            tracing::error!("❌ Configuration validation failed: {}", e);
            tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
            eprintln!("❌ {}", e.user_friendly_message());
            std::process::exit(e.severity().exit_code());
        }
    };

    if cli.dry_run {
        tracing::info!("🔍 DRY RUN MODE - nothing will be downloaded or written");
        print_plan(&settings);
        return Ok(());
    }

    if settings.monitor {
        tracing::info!("🔍 System monitoring enabled");
    }

    let engine = build_engine(&settings).with_monitoring(settings.monitor);

    match engine.run(&settings.model_spec(), &settings.layout()).await {
        Ok(report) => {
            tracing::info!(
                "📁 Model saved to: {} ({} bytes)",
                report.model_path.display(),
                report.model_size_bytes
            );
        }
        Err(e) => {
            tracing::error!(
                "❌ Export failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 建議: {}", e.recovery_suggestion());

            std::process::exit(e.severity().exit_code());
        }
    }

    Ok(())
}

fn print_plan(settings: &ExportSettings) {
    let layout = settings.layout();

    println!("📋 Export plan");
    println!("  Model:      {} @ {}", settings.model_id, settings.revision);
    println!("  Exporter:   {}", settings.exporter);
    if let Some(endpoint) = settings.hub_endpoint() {
        println!("  Hub:        {}", endpoint);
    }
    println!("  Output:     {}", layout.output_dir().display());
    println!("  Temp dir:   {}", layout.temp_dir().display());
    println!("  Per-channel: {}", settings.per_channel);
    println!("  Preset probe:");
    for preset in &settings.presets {
        match CpuPresetProvider::probe(*preset) {
            Ok(()) => println!("    ✅ {}", preset.display_name()),
            Err(reason) => println!("    ⛔ {} ({})", preset.display_name(), reason),
        }
    }
}

//! Quantization preset construction and probe-with-fallback selection.

use crate::domain::model::{QuantType, QuantizationConfig, QuantizationPreset};
use crate::domain::ports::PresetProvider;
use crate::utils::error::{ExportError, Result};

/// 以目前 CPU 的指令集能力建構 preset
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuPresetProvider;

impl CpuPresetProvider {
    /// 偵測 preset 所需的 CPU 指令集，不支援時回傳原因
    pub fn probe(preset: QuantizationPreset) -> std::result::Result<(), String> {
        match preset {
            QuantizationPreset::Avx512Vnni => probe_x86(&["avx512f", "avx512vnni"]),
            QuantizationPreset::Avx512 => probe_x86(&["avx512f"]),
            // AVX2 是可攜式備援
            QuantizationPreset::Avx2 => Ok(()),
            QuantizationPreset::Arm64 => {
                if cfg!(target_arch = "aarch64") {
                    Ok(())
                } else {
                    Err(format!("requires aarch64, running on {}", std::env::consts::ARCH))
                }
            }
        }
    }
}

#[cfg(target_arch = "x86_64")]
fn probe_x86(features: &[&str]) -> std::result::Result<(), String> {
    let missing: Vec<&str> = features
        .iter()
        .copied()
        .filter(|feature| !x86_feature_detected(feature))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(format!("CPU lacks {}", missing.join(", ")))
    }
}

#[cfg(target_arch = "x86_64")]
fn x86_feature_detected(feature: &str) -> bool {
    match feature {
        "avx512f" => is_x86_feature_detected!("avx512f"),
        "avx512vnni" => is_x86_feature_detected!("avx512vnni"),
        "avx2" => is_x86_feature_detected!("avx2"),
        _ => false,
    }
}

#[cfg(not(target_arch = "x86_64"))]
fn probe_x86(_features: &[&str]) -> std::result::Result<(), String> {
    Err(format!("requires x86_64, running on {}", std::env::consts::ARCH))
}

impl PresetProvider for CpuPresetProvider {
    fn build(&self, preset: QuantizationPreset, per_channel: bool) -> Result<QuantizationConfig> {
        Self::probe(preset).map_err(|reason| ExportError::PresetUnavailable {
            preset: preset.name().to_string(),
            reason,
        })?;
        Ok(dynamic_config(preset, per_channel))
    }
}

/// Dynamic (calibration-free) INT8 settings for a preset.
pub fn dynamic_config(preset: QuantizationPreset, per_channel: bool) -> QuantizationConfig {
    let weights_dtype = match preset {
        QuantizationPreset::Avx2 => QuantType::QUInt8,
        QuantizationPreset::Avx512Vnni | QuantizationPreset::Avx512 | QuantizationPreset::Arm64 => {
            QuantType::QInt8
        }
    };

    QuantizationConfig {
        preset,
        is_static: false,
        activations_dtype: QuantType::QUInt8,
        weights_dtype,
        per_channel,
    }
}

/// Try each preset in order and keep the first one that builds.
///
/// Any error from a candidate counts as "unavailable"; no distinction is made
/// between a missing CPU feature and other failures.
pub fn select_quantization_config<P: PresetProvider + ?Sized>(
    provider: &P,
    chain: &[QuantizationPreset],
    per_channel: bool,
) -> Result<QuantizationConfig> {
    if chain.is_empty() {
        return Err(ExportError::MissingConfigError {
            field: "quantization.presets".to_string(),
        });
    }

    let mut tried = Vec::with_capacity(chain.len());
    for (index, preset) in chain.iter().enumerate() {
        match provider.build(*preset, per_channel) {
            Ok(config) => {
                if index == 0 {
                    println!("  Using {} quantization config", preset.display_name());
                } else {
                    println!(
                        "  Using {} quantization config ({} not available)",
                        preset.display_name(),
                        chain[..index]
                            .iter()
                            .map(|p| p.display_name())
                            .collect::<Vec<_>>()
                            .join(", ")
                    );
                }
                tracing::info!(preset = %preset, "✅ Quantization preset selected");
                return Ok(config);
            }
            Err(e) => {
                tracing::warn!(preset = %preset, "⚠️ Preset rejected, trying next: {}", e);
                tried.push(preset.name().to_string());
            }
        }
    }

    Err(ExportError::NoPresetAvailable { tried })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct ScriptedProvider {
        unavailable: Vec<QuantizationPreset>,
        calls: Mutex<Vec<QuantizationPreset>>,
    }

    impl ScriptedProvider {
        fn rejecting(unavailable: Vec<QuantizationPreset>) -> Self {
            Self {
                unavailable,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl PresetProvider for ScriptedProvider {
        fn build(&self, preset: QuantizationPreset, per_channel: bool) -> Result<QuantizationConfig> {
            self.calls.lock().unwrap().push(preset);
            if self.unavailable.contains(&preset) {
                return Err(ExportError::ProcessingError {
                    message: format!("{} exploded", preset),
                });
            }
            Ok(dynamic_config(preset, per_channel))
        }
    }

    #[test]
    fn test_first_available_preset_wins() {
        let provider = ScriptedProvider::rejecting(vec![]);
        let config =
            select_quantization_config(&provider, &QuantizationPreset::default_chain(), false)
                .unwrap();

        assert_eq!(config.preset, QuantizationPreset::Avx512Vnni);
        assert_eq!(*provider.calls.lock().unwrap(), vec![QuantizationPreset::Avx512Vnni]);
    }

    #[test]
    fn test_any_error_falls_back_to_next_candidate() {
        let provider = ScriptedProvider::rejecting(vec![QuantizationPreset::Avx512Vnni]);
        let config =
            select_quantization_config(&provider, &QuantizationPreset::default_chain(), true)
                .unwrap();

        assert_eq!(config.preset, QuantizationPreset::Avx2);
        assert!(config.per_channel);
        assert!(!config.is_static);
    }

    #[test]
    fn test_exhausted_chain_reports_every_candidate() {
        let provider = ScriptedProvider::rejecting(vec![
            QuantizationPreset::Avx512,
            QuantizationPreset::Arm64,
        ]);
        let err = select_quantization_config(
            &provider,
            &[QuantizationPreset::Avx512, QuantizationPreset::Arm64],
            false,
        )
        .unwrap_err();

        match err {
            ExportError::NoPresetAvailable { tried } => {
                assert_eq!(tried, vec!["avx512".to_string(), "arm64".to_string()])
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_empty_chain_is_config_error() {
        let provider = ScriptedProvider::rejecting(vec![]);
        let err = select_quantization_config(&provider, &[], false).unwrap_err();
        assert!(matches!(err, ExportError::MissingConfigError { .. }));
    }

    #[test]
    fn test_avx2_always_builds_on_cpu_provider() {
        let config = CpuPresetProvider
            .build(QuantizationPreset::Avx2, false)
            .unwrap();
        assert_eq!(config.weights_dtype, QuantType::QUInt8);
        assert_eq!(config.activations_dtype, QuantType::QUInt8);
    }

    #[cfg(not(target_arch = "aarch64"))]
    #[test]
    fn test_arm64_rejected_off_aarch64() {
        let err = CpuPresetProvider
            .build(QuantizationPreset::Arm64, false)
            .unwrap_err();
        assert!(matches!(err, ExportError::PresetUnavailable { .. }));
    }
}

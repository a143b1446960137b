//! Bundle image collection and selection for vision prompts.
//!
//! A bundle directory holds everything one forecast run downloaded:
//! `charts/metadata.json` + chart PNGs, `satellite/satellite/*`, and
//! `models/*`. Selection favors temporal depth: four pressure charts and
//! four wave-model frames beat a wider mix of single frames.

use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::ImageConfig;
use crate::llm::{ImageAttachment, ImageDetail};

/// Hard upper bound on images per vision call (cost ceiling).
pub const IMAGE_HARD_CAP: usize = 10;

/// Raw image inventory of one bundle.
#[derive(Debug, Clone, Default)]
pub struct BundleImages {
    pub pressure_charts: Vec<PathBuf>,
    pub satellite: Vec<PathBuf>,
    pub wave_models: Vec<PathBuf>,
    pub sst_charts: Vec<PathBuf>,
}

impl BundleImages {
    pub fn total(&self) -> usize {
        self.pressure_charts.len() + self.satellite.len() + self.wave_models.len() + self.sst_charts.len()
    }
}

/// Image category for selection bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageType {
    PressureChart,
    WaveModel,
    Satellite,
    SstChart,
}

impl ImageType {
    pub fn as_str(self) -> &'static str {
        match self {
            ImageType::PressureChart => "pressure_chart",
            ImageType::WaveModel => "wave_model",
            ImageType::Satellite => "satellite",
            ImageType::SstChart => "sst_chart",
        }
    }
}

/// One image chosen for the vision prompt.
#[derive(Debug, Clone)]
pub struct SelectedImage {
    pub path: PathBuf,
    pub detail: ImageDetail,
    pub image_type: ImageType,
    pub description: String,
}

impl SelectedImage {
    pub fn attachment(&self) -> ImageAttachment {
        ImageAttachment {
            path: self.path.clone(),
            detail: self.detail,
        }
    }
}

/// Walk a bundle directory and inventory its images.
///
/// Chart files come from `charts/metadata.json` (entries with
/// `status == "success"`); `sst_*`/`sea_surface_temp*` names are split out
/// as SST. A missing bundle directory yields an empty inventory.
pub fn collect_bundle_images(data_dir: &Path, bundle_id: &str) -> BundleImages {
    let bundle_path = data_dir.join(bundle_id);
    let mut images = BundleImages::default();

    let charts_dir = bundle_path.join("charts");
    let metadata_file = charts_dir.join("metadata.json");
    if metadata_file.exists() {
        match std::fs::read_to_string(&metadata_file)
            .map_err(|e| e.to_string())
            .and_then(|s| serde_json::from_str::<Value>(&s).map_err(|e| e.to_string()))
        {
            Ok(Value::Array(entries)) => {
                for entry in entries {
                    let status = entry.get("status").and_then(Value::as_str);
                    let file_path = entry.get("file_path").and_then(Value::as_str);
                    if status == Some("success") {
                        if let Some(file_path) = file_path {
                            let lower = file_path.to_lowercase();
                            if lower.contains("sst") || lower.contains("sea_surface_temp") {
                                images.sst_charts.push(PathBuf::from(file_path));
                            } else {
                                images.pressure_charts.push(PathBuf::from(file_path));
                            }
                        }
                    }
                }
            }
            Ok(_) => warn!(path = %metadata_file.display(), "Chart metadata is not an array"),
            Err(e) => warn!(path = %metadata_file.display(), error = %e, "Failed to read chart metadata"),
        }
    }

    let satellite_dir = bundle_path.join("satellite").join("satellite");
    images.satellite = glob_images(&satellite_dir);

    let models_dir = bundle_path.join("models");
    images.wave_models = glob_images(&models_dir);

    info!(
        total = images.total(),
        pressure = images.pressure_charts.len(),
        sst = images.sst_charts.len(),
        satellite = images.satellite.len(),
        wave_models = images.wave_models.len(),
        "Collected bundle images"
    );
    images
}

fn glob_images(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut paths: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| matches!(e.to_ascii_lowercase().as_str(), "png" | "jpg" | "jpeg"))
        })
        .collect();
    paths.sort();
    paths
}

/// Select the most valuable images within the cap.
///
/// Priority: up to 4 pressure charts in temporal order, up to 4 wave-model
/// frames, 1 latest satellite frame, 1 SST chart, each at its configured
/// detail level. Never returns more than `min(config.max_images, 10)`.
pub fn select_critical_images(images: &BundleImages, config: &ImageConfig) -> Vec<SelectedImage> {
    let cap = config.max_images.min(IMAGE_HARD_CAP);
    let mut selected = Vec::new();

    for (i, chart) in images.pressure_charts.iter().take(4).enumerate() {
        if selected.len() >= cap {
            return selected;
        }
        selected.push(SelectedImage {
            path: chart.clone(),
            detail: ImageDetail::from_str_lossy(&config.detail_pressure),
            image_type: ImageType::PressureChart,
            description: format!("Pressure forecast T+{}hr", i * 24),
        });
    }

    for (i, wave) in images.wave_models.iter().take(4).enumerate() {
        if selected.len() >= cap {
            return selected;
        }
        selected.push(SelectedImage {
            path: wave.clone(),
            detail: ImageDetail::from_str_lossy(&config.detail_wave),
            image_type: ImageType::WaveModel,
            description: format!("Wave model T+{}hr", i * 24),
        });
    }

    if let Some(sat) = images.satellite.first() {
        if selected.len() < cap {
            selected.push(SelectedImage {
                path: sat.clone(),
                detail: ImageDetail::from_str_lossy(&config.detail_satellite),
                image_type: ImageType::Satellite,
                description: "Latest satellite imagery".to_string(),
            });
        }
    }

    if let Some(sst) = images.sst_charts.first() {
        if selected.len() < cap {
            selected.push(SelectedImage {
                path: sst.clone(),
                detail: ImageDetail::from_str_lossy(&config.detail_sst),
                image_type: ImageType::SstChart,
                description: "Sea surface temperature anomaly".to_string(),
            });
        }
    }

    selected
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inventory(pressure: usize, wave: usize, sat: usize, sst: usize) -> BundleImages {
        BundleImages {
            pressure_charts: (0..pressure).map(|i| PathBuf::from(format!("p{i}.png"))).collect(),
            wave_models: (0..wave).map(|i| PathBuf::from(format!("w{i}.png"))).collect(),
            satellite: (0..sat).map(|i| PathBuf::from(format!("s{i}.png"))).collect(),
            sst_charts: (0..sst).map(|i| PathBuf::from(format!("t{i}.png"))).collect(),
        }
    }

    #[test]
    fn selection_respects_priorities_and_cap() {
        let config = ImageConfig::default();
        let selected = select_critical_images(&inventory(8, 8, 3, 2), &config);

        assert_eq!(selected.len(), 10);
        let pressure = selected.iter().filter(|s| s.image_type == ImageType::PressureChart).count();
        let wave = selected.iter().filter(|s| s.image_type == ImageType::WaveModel).count();
        let sat = selected.iter().filter(|s| s.image_type == ImageType::Satellite).count();
        let sst = selected.iter().filter(|s| s.image_type == ImageType::SstChart).count();
        assert_eq!((pressure, wave, sat, sst), (4, 4, 1, 1));

        assert_eq!(selected[0].description, "Pressure forecast T+0hr");
        assert_eq!(selected[1].description, "Pressure forecast T+24hr");
        assert_eq!(selected[0].detail, ImageDetail::High);
        assert_eq!(selected[9].detail, ImageDetail::Low);
    }

    #[test]
    fn never_more_than_four_of_one_type() {
        let config = ImageConfig::default();
        let selected = select_critical_images(&inventory(20, 0, 0, 0), &config);
        assert_eq!(selected.len(), 4);
    }

    #[test]
    fn configured_cap_is_clamped_to_hard_limit() {
        let config = ImageConfig {
            max_images: 50,
            ..Default::default()
        };
        let selected = select_critical_images(&inventory(10, 10, 5, 5), &config);
        assert_eq!(selected.len(), IMAGE_HARD_CAP);

        let config = ImageConfig {
            max_images: 3,
            ..Default::default()
        };
        let selected = select_critical_images(&inventory(10, 10, 5, 5), &config);
        assert_eq!(selected.len(), 3);
    }

    #[test]
    fn missing_bundle_yields_empty_inventory() {
        let images = collect_bundle_images(Path::new("/nonexistent"), "bundle-x");
        assert_eq!(images.total(), 0);
        assert!(select_critical_images(&images, &ImageConfig::default()).is_empty());
    }

    #[test]
    fn bundle_walk_classifies_sst() {
        let dir = tempfile::tempdir().unwrap();
        let bundle = dir.path().join("b1");
        let charts = bundle.join("charts");
        std::fs::create_dir_all(&charts).unwrap();
        std::fs::create_dir_all(bundle.join("satellite/satellite")).unwrap();
        std::fs::create_dir_all(bundle.join("models")).unwrap();

        for name in ["surface_0.png", "sst_anomaly.png"] {
            std::fs::write(charts.join(name), b"png").unwrap();
        }
        std::fs::write(bundle.join("satellite/satellite/goes.png"), b"png").unwrap();
        std::fs::write(bundle.join("models/ww3_24.png"), b"png").unwrap();

        let metadata = serde_json::json!([
            { "status": "success", "file_path": charts.join("surface_0.png").to_str().unwrap() },
            { "status": "success", "file_path": charts.join("sst_anomaly.png").to_str().unwrap() },
            { "status": "failed", "file_path": charts.join("missing.png").to_str().unwrap() }
        ]);
        std::fs::write(charts.join("metadata.json"), metadata.to_string()).unwrap();

        let images = collect_bundle_images(dir.path(), "b1");
        assert_eq!(images.pressure_charts.len(), 1);
        assert_eq!(images.sst_charts.len(), 1);
        assert_eq!(images.satellite.len(), 1);
        assert_eq!(images.wave_models.len(), 1);
    }
}

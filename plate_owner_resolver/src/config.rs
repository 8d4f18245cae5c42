use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;

use crate::error::ConfigError;

/// Everything the recognition binaries need, loaded from a TOML file.
/// Every field has a default so an empty file is a valid configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// SQLite file holding the plate registry.
    pub registry_db: String,
    pub pipeline: PipelineConfig,
    pub resolver: ResolverConfig,
    pub detector: DetectorConfig,
    pub ocr: OcrConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            registry_db: "registry.db".to_string(),
            pipeline: PipelineConfig::default(),
            resolver: ResolverConfig::default(),
            detector: DetectorConfig::default(),
            ocr: OcrConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Detector class that denotes a license plate.
    pub expected_class_id: i32,
    pub confidence_threshold: f32,
    /// Margin in pixels added on every side of a box before cropping.
    pub crop_padding: i32,
    pub ocr_allowlist: String,
    /// Owner text reported when a plate has no registered owner.
    pub no_owner_placeholder: String,
    pub preprocess: PreprocessConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            expected_class_id: 0,
            confidence_threshold: 0.25,
            crop_padding: 5,
            ocr_allowlist: "0123456789ABCDEFGHKLMNPRSTUVXYZ-.".to_string(),
            no_owner_placeholder: "No information".to_string(),
            preprocess: PreprocessConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Crops lower than this are upscaled.
    pub min_height: i32,
    /// Crops narrower than this are upscaled.
    pub min_width: i32,
    pub upscale_factor: f64,
    pub clahe_clip_limit: f64,
    pub clahe_tile_grid: i32,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            min_height: 50,
            min_width: 100,
            upscale_factor: 3.0,
            clahe_clip_limit: 2.0,
            clahe_tile_grid: 8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Minimum similarity (0-100) for a registry entry to be accepted.
    pub match_threshold: u8,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self { match_threshold: 80 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum YoloLayout {
    /// `[1, 4 + classes, anchors]`
    Yolov8,
    /// `[1, anchors, 5 + classes]`
    Yolov5,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub model_path: String,
    pub input_size: i32,
    pub min_score: f32,
    pub nms_threshold: f32,
    pub layout: YoloLayout,
    pub use_gpu: bool,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            model_path: "models/best.onnx".to_string(),
            input_size: 640,
            min_score: 0.25,
            nms_threshold: 0.7,
            layout: YoloLayout::Yolov8,
            use_gpu: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    pub tessdata_dir: String,
    pub language: String,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            tessdata_dir: "models".to_string(),
            language: "eng".to_string(),
        }
    }
}

impl AppConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the file (or defaults when `path` is `None`), then applies
    /// environment overrides and validates the result.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.display().to_string(),
                    source,
                })?;
                toml::from_str(&text)?
            }
            None => AppConfig::default(),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(db) = env::var("PLATES_REGISTRY_DB") {
            self.registry_db = db;
        }
        if let Ok(model) = env::var("PLATES_DETECTOR_MODEL") {
            self.detector.model_path = model;
        }
        if let Ok(dir) = env::var("PLATES_TESSDATA_DIR") {
            self.ocr.tessdata_dir = dir;
        }
        if let Ok(use_gpu) = env::var("PLATES_USE_GPU") {
            if let Ok(use_gpu) = use_gpu.parse::<bool>() {
                self.detector.use_gpu = use_gpu;
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let pipeline = &self.pipeline;
        if !(0.0..=1.0).contains(&pipeline.confidence_threshold) {
            return Err(invalid(
                "pipeline.confidence_threshold",
                format!("{} is outside [0, 1]", pipeline.confidence_threshold),
            ));
        }
        if pipeline.crop_padding < 0 {
            return Err(invalid("pipeline.crop_padding", "must not be negative"));
        }
        let preprocess = &pipeline.preprocess;
        if preprocess.upscale_factor <= 0.0 {
            return Err(invalid("pipeline.preprocess.upscale_factor", "must be positive"));
        }
        if preprocess.clahe_tile_grid <= 0 {
            return Err(invalid("pipeline.preprocess.clahe_tile_grid", "must be positive"));
        }
        if preprocess.clahe_clip_limit <= 0.0 {
            return Err(invalid("pipeline.preprocess.clahe_clip_limit", "must be positive"));
        }
        if self.resolver.match_threshold > 100 {
            return Err(invalid(
                "resolver.match_threshold",
                format!("{} is above 100", self.resolver.match_threshold),
            ));
        }
        if self.detector.input_size <= 0 {
            return Err(invalid("detector.input_size", "must be positive"));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

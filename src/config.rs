//! Run configuration, loaded from a JSON file.
//!
//! The file has two sections: `platform` (endpoint and token for the REST
//! backend, absent for offline use) and `workflow` (dataset, region,
//! sentinel, preview style, export settings). Defaults follow the canopy
//! height workflow this tool was written for.

use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::types::{
    CanopyError, CanopyResult, Crs, ExportDescriptor, Region, StyleRange, DEFAULT_MAX_PIXELS,
    DEFAULT_SENTINEL,
};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Remote platform connection; leave out to run against a local backend.
    #[serde(default)]
    pub platform: Option<PlatformConfig>,
    pub workflow: WorkflowConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlatformConfig {
    /// Base URL of the platform's raster API.
    pub endpoint: String,
    /// Pre-issued bearer token. Acquiring and refreshing credentials is the
    /// platform's concern, not this tool's.
    #[serde(default)]
    pub token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowConfig {
    /// Dataset identifier to resolve on the platform.
    pub dataset: String,
    /// Region of interest the raster is clipped to.
    pub region: Region,
    /// Value written into no-data pixels.
    #[serde(default = "default_sentinel")]
    pub sentinel: f64,
    /// Preview color range; set to null to skip the preview stage.
    #[serde(default = "default_preview")]
    pub preview: Option<StyleRange>,
    pub export: ExportConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExportConfig {
    pub description: String,
    pub folder: String,
    pub file_name_prefix: String,
    pub scale: Option<f64>,
    pub crs: Option<Crs>,
    /// Export extent; defaults to the workflow region.
    #[serde(default)]
    pub region: Option<Region>,
    #[serde(default = "default_max_pixels")]
    pub max_pixels: u64,
}

fn default_sentinel() -> f64 {
    DEFAULT_SENTINEL
}

fn default_preview() -> Option<StyleRange> {
    Some(StyleRange {
        min: 0.0,
        max: 30.0,
    })
}

fn default_max_pixels() -> u64 {
    DEFAULT_MAX_PIXELS
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> CanopyResult<Self> {
        let file = File::open(path.as_ref())?;
        let config: Config = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> CanopyResult<()> {
        if self.workflow.dataset.is_empty() {
            return Err(CanopyError::Config("dataset must not be empty".to_string()));
        }
        if !self.workflow.sentinel.is_finite() {
            return Err(CanopyError::Config("sentinel must be finite".to_string()));
        }
        self.workflow.region.validate()?;
        Ok(())
    }
}

impl WorkflowConfig {
    /// Build the export descriptor, falling back to the workflow region when
    /// the export section does not declare its own extent.
    pub fn export_descriptor(&self) -> ExportDescriptor {
        ExportDescriptor {
            description: self.export.description.clone(),
            folder: self.export.folder.clone(),
            file_name_prefix: self.export.file_name_prefix.clone(),
            region: Some(
                self.export
                    .region
                    .clone()
                    .unwrap_or_else(|| self.region.clone()),
            ),
            scale: self.export.scale,
            crs: self.export.crs,
            max_pixels: self.export.max_pixels,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "platform": { "endpoint": "https://rasters.example.org", "token": "t0ken" },
        "workflow": {
            "dataset": "canopy-v1",
            "region": {
                "ring": [[0.0, 0.0], [1000.0, 0.0], [1000.0, 1000.0], [0.0, 1000.0]],
                "crs": "EPSG:4326"
            },
            "export": {
                "description": "Canopy 10m",
                "folder": "earth_engine",
                "file_name_prefix": "canopy",
                "scale": 10.0,
                "crs": "EPSG:4326"
            }
        }
    }"#;

    #[test]
    fn test_parse_with_defaults() {
        let config: Config = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(config.workflow.dataset, "canopy-v1");
        assert_eq!(config.workflow.sentinel, DEFAULT_SENTINEL);
        let preview = config.workflow.preview.unwrap();
        assert_eq!(preview.min, 0.0);
        assert_eq!(preview.max, 30.0);
        assert_eq!(config.workflow.export.max_pixels, DEFAULT_MAX_PIXELS);
    }

    #[test]
    fn test_export_descriptor_inherits_region() {
        let config: Config = serde_json::from_str(SAMPLE).unwrap();
        let descriptor = config.workflow.export_descriptor();
        assert_eq!(descriptor.region.as_ref(), Some(&config.workflow.region));
        assert_eq!(descriptor.scale, Some(10.0));
        assert!(descriptor.check_for_submission().is_ok());
    }

    #[test]
    fn test_null_preview_disables_stage() {
        let mut value: serde_json::Value = serde_json::from_str(SAMPLE).unwrap();
        value["workflow"]["preview"] = serde_json::Value::Null;
        let config: Config = serde_json::from_value(value).unwrap();
        assert!(config.workflow.preview.is_none());
    }

    #[test]
    fn test_validate_rejects_empty_dataset() {
        let mut value: serde_json::Value = serde_json::from_str(SAMPLE).unwrap();
        value["workflow"]["dataset"] = serde_json::Value::String(String::new());
        let config: Config = serde_json::from_value(value).unwrap();
        assert!(matches!(config.validate(), Err(CanopyError::Config(_))));
    }

    #[test]
    fn test_from_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("canopia.json");
        std::fs::write(&path, SAMPLE).unwrap();
        let config = Config::from_file(&path).unwrap();
        assert_eq!(
            config.platform.unwrap().endpoint,
            "https://rasters.example.org"
        );
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::core::geometry;

/// Sentinel written into no-data pixels by the fill stage.
pub const DEFAULT_SENTINEL: f64 = -9999.0;

/// Default ceiling on exported pixel counts.
pub const DEFAULT_MAX_PIXELS: u64 = 10_000_000_000_000;

/// Opaque reference to a raster living on the remote platform.
///
/// Handles never carry pixel data; each pipeline stage derives a new handle
/// from its input, so a handle stays valid after later stages run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RasterHandle {
    /// Platform-assigned identifier for this (possibly derived) raster.
    pub id: String,
    /// Identifier of the source dataset the raster was derived from.
    pub dataset: String,
}

/// Coordinate reference system of a raster or region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Crs {
    /// Geographic coordinates, EPSG:4326 (longitude, latitude)
    Geographic,
    /// Projected coordinates (e.g., UTM, Web Mercator)
    Projected { epsg: u32 },
}

impl Crs {
    pub fn epsg_code(&self) -> u32 {
        match self {
            Crs::Geographic => 4326,
            Crs::Projected { epsg } => *epsg,
        }
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg_code())
    }
}

impl FromStr for Crs {
    type Err = CanopyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s
            .strip_prefix("EPSG:")
            .ok_or_else(|| CanopyError::Config(format!("invalid CRS string: {}", s)))?;
        let epsg: u32 = code
            .parse()
            .map_err(|_| CanopyError::Config(format!("invalid EPSG code: {}", code)))?;
        if epsg == 4326 {
            Ok(Crs::Geographic)
        } else {
            Ok(Crs::Projected { epsg })
        }
    }
}

// On the wire and in config files a CRS is its EPSG string ("EPSG:4326").
impl Serialize for Crs {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Crs {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Axis-aligned bounding box in CRS linear units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}

/// Region of interest: a single closed polygon ring in a declared CRS.
///
/// The ring is stored as `[x, y]` vertex pairs. A ring that does not repeat
/// its first vertex is treated as implicitly closed; `validate` rejects
/// degenerate and self-intersecting rings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub ring: Vec<[f64; 2]>,
    pub crs: Crs,
}

impl Region {
    pub fn new(ring: Vec<[f64; 2]>, crs: Crs) -> Self {
        Region { ring, crs }
    }

    /// Axis-aligned rectangle, the common case for export extents.
    pub fn rectangle(min_x: f64, min_y: f64, max_x: f64, max_y: f64, crs: Crs) -> Self {
        Region {
            ring: vec![
                [min_x, min_y],
                [max_x, min_y],
                [max_x, max_y],
                [min_x, max_y],
                [min_x, min_y],
            ],
            crs,
        }
    }

    /// Ring with the closing vertex appended if the input left it implicit.
    pub fn closed_ring(&self) -> Vec<[f64; 2]> {
        geometry::close_ring(&self.ring)
    }

    /// Check that the ring is a valid, non-self-intersecting closed polygon.
    pub fn validate(&self) -> CanopyResult<()> {
        for v in &self.ring {
            if !v[0].is_finite() || !v[1].is_finite() {
                return Err(CanopyError::InvalidGeometry(
                    "ring contains non-finite coordinates".to_string(),
                ));
            }
        }
        let ring = self.closed_ring();
        if ring.len() < 4 {
            return Err(CanopyError::InvalidGeometry(format!(
                "ring has {} distinct vertices, need at least 3",
                ring.len().saturating_sub(1)
            )));
        }
        if geometry::signed_area(&ring) == 0.0 {
            return Err(CanopyError::InvalidGeometry(
                "ring encloses zero area".to_string(),
            ));
        }
        if geometry::is_self_intersecting(&ring) {
            return Err(CanopyError::InvalidGeometry(
                "ring is self-intersecting".to_string(),
            ));
        }
        Ok(())
    }

    pub fn bounding_box(&self) -> CanopyResult<BoundingBox> {
        if self.ring.is_empty() {
            return Err(CanopyError::InvalidGeometry("empty ring".to_string()));
        }
        let mut bbox = BoundingBox {
            min_x: f64::INFINITY,
            min_y: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            max_y: f64::NEG_INFINITY,
        };
        for v in &self.ring {
            bbox.min_x = bbox.min_x.min(v[0]);
            bbox.min_y = bbox.min_y.min(v[1]);
            bbox.max_x = bbox.max_x.max(v[0]);
            bbox.max_y = bbox.max_y.max(v[1]);
        }
        Ok(bbox)
    }

    /// Point-in-polygon test against the closed ring.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        geometry::point_in_ring(x, y, &self.closed_ring())
    }
}

/// Value range used to clamp the preview color scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StyleRange {
    pub min: f64,
    pub max: f64,
}

/// Everything the export sink needs to materialize a raster to storage.
///
/// `region`, `scale` and `crs` are optional so a partially specified
/// descriptor can be built up from config; `validate` reports every missing
/// required field before submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportDescriptor {
    /// Human-readable name for the export job.
    pub description: String,
    /// Destination storage container (folder) name.
    pub folder: String,
    /// Base name for the output file(s).
    pub file_name_prefix: String,
    /// Output extent; pixels outside it are not exported.
    pub region: Option<Region>,
    /// Output pixel size in the output CRS's linear units.
    pub scale: Option<f64>,
    /// Target projection for the output.
    pub crs: Option<Crs>,
    /// Hard ceiling on output pixel count.
    pub max_pixels: u64,
}

impl Default for ExportDescriptor {
    fn default() -> Self {
        ExportDescriptor {
            description: String::new(),
            folder: String::new(),
            file_name_prefix: String::new(),
            region: None,
            scale: None,
            crs: None,
            max_pixels: DEFAULT_MAX_PIXELS,
        }
    }
}

impl ExportDescriptor {
    /// Check that every required field is present and well-formed.
    pub fn validate(&self) -> CanopyResult<()> {
        let mut missing = Vec::new();
        if self.folder.is_empty() {
            missing.push("folder");
        }
        if self.file_name_prefix.is_empty() {
            missing.push("file_name_prefix");
        }
        if self.region.is_none() {
            missing.push("region");
        }
        if self.scale.is_none() {
            missing.push("scale");
        }
        if self.crs.is_none() {
            missing.push("crs");
        }
        if !missing.is_empty() {
            return Err(CanopyError::InvalidDescriptor(format!(
                "missing required fields: {}",
                missing.join(", ")
            )));
        }
        let scale = self.scale.unwrap();
        if !scale.is_finite() || scale <= 0.0 {
            return Err(CanopyError::InvalidDescriptor(format!(
                "scale must be a positive number, got {}",
                scale
            )));
        }
        if self.max_pixels == 0 {
            return Err(CanopyError::InvalidDescriptor(
                "max_pixels must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Output raster shape as (rows, columns) over the region bounding box.
    pub fn output_shape(&self) -> CanopyResult<(u64, u64)> {
        self.validate()?;
        let region = self.region.as_ref().unwrap();
        let scale = self.scale.unwrap();
        let bbox = region.bounding_box()?;
        let cols = (bbox.width() / scale).ceil().max(1.0);
        let rows = (bbox.height() / scale).ceil().max(1.0);
        Ok((rows as u64, cols as u64))
    }

    /// Estimated output pixel count over the region bounding box.
    pub fn estimated_pixels(&self) -> CanopyResult<u64> {
        let (rows, cols) = self.output_shape()?;
        Ok(rows.saturating_mul(cols))
    }

    /// Full pre-submission check: required fields plus the pixel ceiling.
    pub fn check_for_submission(&self) -> CanopyResult<()> {
        let estimated = self.estimated_pixels()?;
        if estimated > self.max_pixels {
            return Err(CanopyError::InvalidDescriptor(format!(
                "estimated {} output pixels exceeds max_pixels ceiling of {}",
                estimated, self.max_pixels
            )));
        }
        Ok(())
    }
}

/// Lifecycle of an export job. Only `Submitted` is produced locally; the
/// remaining states are decoded from the platform's job-status channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportState {
    Submitted,
    Running,
    Succeeded,
    Failed,
}

impl fmt::Display for ExportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportState::Submitted => write!(f, "submitted"),
            ExportState::Running => write!(f, "running"),
            ExportState::Succeeded => write!(f, "succeeded"),
            ExportState::Failed => write!(f, "failed"),
        }
    }
}

/// Handle to an asynchronous export job on the remote platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportJob {
    pub id: String,
    pub description: String,
    pub state: ExportState,
    pub submitted_at: DateTime<Utc>,
}

/// Error types for the canopy export workflow
#[derive(Debug, thiserror::Error)]
pub enum CanopyError {
    #[error("dataset not found: {0}")]
    NotFound(String),

    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("invalid export descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("platform error: {0}")]
    Platform(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for workflow operations
pub type CanopyResult<T> = Result<T, CanopyError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Region {
        Region::rectangle(0.0, 0.0, 1000.0, 1000.0, Crs::Geographic)
    }

    #[test]
    fn test_crs_round_trip() {
        assert_eq!(Crs::Geographic.to_string(), "EPSG:4326");
        assert_eq!("EPSG:4326".parse::<Crs>().unwrap(), Crs::Geographic);
        assert_eq!(
            "EPSG:32618".parse::<Crs>().unwrap(),
            Crs::Projected { epsg: 32618 }
        );
        assert!("utm18n".parse::<Crs>().is_err());
    }

    #[test]
    fn test_descriptor_reports_all_missing_fields() {
        let descriptor = ExportDescriptor {
            description: "Canopy".to_string(),
            ..ExportDescriptor::default()
        };
        let err = descriptor.validate().unwrap_err();
        match err {
            CanopyError::InvalidDescriptor(msg) => {
                assert!(msg.contains("region"));
                assert!(msg.contains("scale"));
                assert!(msg.contains("crs"));
                assert!(msg.contains("folder"));
            }
            other => panic!("expected InvalidDescriptor, got {:?}", other),
        }
    }

    #[test]
    fn test_descriptor_output_shape() {
        let descriptor = ExportDescriptor {
            description: "Canopy".to_string(),
            folder: "exports".to_string(),
            file_name_prefix: "canopy".to_string(),
            region: Some(square()),
            scale: Some(10.0),
            crs: Some(Crs::Geographic),
            max_pixels: DEFAULT_MAX_PIXELS,
        };
        assert_eq!(descriptor.output_shape().unwrap(), (100, 100));
        assert_eq!(descriptor.estimated_pixels().unwrap(), 10_000);
        assert!(descriptor.check_for_submission().is_ok());
    }

    #[test]
    fn test_descriptor_pixel_ceiling() {
        // ~2e13 pixels at scale 1 against the 1e13 ceiling
        let descriptor = ExportDescriptor {
            description: "too big".to_string(),
            folder: "exports".to_string(),
            file_name_prefix: "big".to_string(),
            region: Some(Region::rectangle(
                0.0,
                0.0,
                4_472_136.0,
                4_472_136.0,
                Crs::Projected { epsg: 3857 },
            )),
            scale: Some(1.0),
            crs: Some(Crs::Projected { epsg: 3857 }),
            max_pixels: DEFAULT_MAX_PIXELS,
        };
        let err = descriptor.check_for_submission().unwrap_err();
        assert!(matches!(err, CanopyError::InvalidDescriptor(_)));
    }

    #[test]
    fn test_descriptor_rejects_bad_scale() {
        let descriptor = ExportDescriptor {
            description: "zero scale".to_string(),
            folder: "exports".to_string(),
            file_name_prefix: "canopy".to_string(),
            region: Some(square()),
            scale: Some(0.0),
            crs: Some(Crs::Geographic),
            max_pixels: DEFAULT_MAX_PIXELS,
        };
        assert!(matches!(
            descriptor.validate(),
            Err(CanopyError::InvalidDescriptor(_))
        ));
    }

    #[test]
    fn test_region_validate_rejects_bowtie() {
        let bowtie = Region::new(
            vec![[0.0, 0.0], [2.0, 2.0], [2.0, 0.0], [0.0, 2.0]],
            Crs::Geographic,
        );
        assert!(matches!(
            bowtie.validate(),
            Err(CanopyError::InvalidGeometry(_))
        ));
    }

    #[test]
    fn test_region_validate_accepts_rectangle() {
        assert!(square().validate().is_ok());
    }

    #[test]
    fn test_region_bounding_box() {
        let bbox = square().bounding_box().unwrap();
        assert_eq!(bbox.width(), 1000.0);
        assert_eq!(bbox.height(), 1000.0);
    }
}

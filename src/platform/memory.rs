//! In-process platform backend over `ndarray` grids.
//!
//! Backs the full capability interface without any network: clipping and
//! filling run against local pixel grids, exports are validated and
//! recorded. This is the test double for the pipeline and the engine behind
//! offline dry runs. No-data is represented as NaN.

use chrono::Utc;
use ndarray::Array2;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use crate::platform::RasterPlatform;
use crate::types::{
    CanopyError, CanopyResult, Crs, ExportDescriptor, ExportJob, ExportState, RasterHandle,
    Region, StyleRange,
};

/// Georeferencing of a grid: top-left corner plus square pixel size, in the
/// CRS's linear units. Row indices grow downward (decreasing y).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridTransform {
    pub top_left_x: f64,
    pub top_left_y: f64,
    pub pixel_size: f64,
}

impl GridTransform {
    /// Center coordinates of the pixel at (row, col).
    pub fn pixel_center(&self, row: usize, col: usize) -> (f64, f64) {
        (
            self.top_left_x + (col as f64 + 0.5) * self.pixel_size,
            self.top_left_y - (row as f64 + 0.5) * self.pixel_size,
        )
    }
}

/// A locally materialized raster: grid, georeferencing, CRS.
#[derive(Debug, Clone)]
pub struct MemoryRaster {
    pub grid: Array2<f32>,
    pub transform: GridTransform,
    pub crs: Crs,
}

impl MemoryRaster {
    /// Number of pixels holding a defined (non-NaN) value.
    pub fn defined_pixel_count(&self) -> usize {
        self.grid.iter().filter(|v| !v.is_nan()).count()
    }

    /// True if any pixel is still no-data.
    pub fn has_undefined_pixels(&self) -> bool {
        self.grid.iter().any(|v| v.is_nan())
    }
}

/// Preview request recorded by [`MemoryPlatform::display`].
#[derive(Debug, Clone)]
pub struct PreviewRecord {
    pub handle: RasterHandle,
    pub region: Region,
    pub style: StyleRange,
}

/// Export request recorded by [`MemoryPlatform::export_to_storage`].
#[derive(Debug, Clone)]
pub struct ExportRecord {
    pub job: ExportJob,
    pub handle: RasterHandle,
    pub descriptor: ExportDescriptor,
    /// Output raster shape as (rows, columns).
    pub output_shape: (u64, u64),
}

/// In-memory implementation of the platform capability interface.
///
/// Handles are never mutated: every operation derives a fresh raster under a
/// new handle id, so earlier handles keep their pixels.
#[derive(Debug, Default)]
pub struct MemoryPlatform {
    datasets: HashMap<String, MemoryRaster>,
    rasters: RefCell<HashMap<String, MemoryRaster>>,
    previews: RefCell<Vec<PreviewRecord>>,
    exports: RefCell<Vec<ExportRecord>>,
    next_id: Cell<u64>,
}

impl MemoryPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a dataset under `id`, making it resolvable by `load_raster`.
    pub fn with_dataset(mut self, id: &str, raster: MemoryRaster) -> Self {
        self.datasets.insert(id.to_string(), raster);
        self
    }

    /// Snapshot of the raster behind `handle`, if it exists.
    pub fn raster(&self, handle: &RasterHandle) -> Option<MemoryRaster> {
        self.rasters.borrow().get(&handle.id).cloned()
    }

    /// Preview requests recorded so far.
    pub fn previews(&self) -> Vec<PreviewRecord> {
        self.previews.borrow().clone()
    }

    /// Export requests recorded so far.
    pub fn exports(&self) -> Vec<ExportRecord> {
        self.exports.borrow().clone()
    }

    fn register(&self, dataset: &str, raster: MemoryRaster) -> RasterHandle {
        let n = self.next_id.get() + 1;
        self.next_id.set(n);
        let handle = RasterHandle {
            id: format!("raster/{:04}", n),
            dataset: dataset.to_string(),
        };
        self.rasters.borrow_mut().insert(handle.id.clone(), raster);
        handle
    }

    fn lookup(&self, handle: &RasterHandle) -> CanopyResult<MemoryRaster> {
        self.rasters
            .borrow()
            .get(&handle.id)
            .cloned()
            .ok_or_else(|| CanopyError::Platform(format!("unknown raster handle: {}", handle.id)))
    }
}

impl RasterPlatform for MemoryPlatform {
    fn load_raster(&self, dataset_id: &str) -> CanopyResult<RasterHandle> {
        let raster = self
            .datasets
            .get(dataset_id)
            .cloned()
            .ok_or_else(|| CanopyError::NotFound(dataset_id.to_string()))?;
        log::debug!("resolved dataset {}", dataset_id);
        Ok(self.register(dataset_id, raster))
    }

    fn clip(&self, raster: &RasterHandle, region: &Region) -> CanopyResult<RasterHandle> {
        region.validate()?;
        let source = self.lookup(raster)?;
        if region.crs != source.crs {
            return Err(CanopyError::InvalidGeometry(format!(
                "region CRS {} does not match raster CRS {}",
                region.crs, source.crs
            )));
        }

        let ring = region.closed_ring();
        let mut grid = source.grid.clone();
        for ((row, col), value) in grid.indexed_iter_mut() {
            let (x, y) = source.transform.pixel_center(row, col);
            if !crate::core::geometry::point_in_ring(x, y, &ring) {
                *value = f32::NAN;
            }
        }
        log::debug!(
            "clipped {} to region with {} vertices",
            raster.id,
            region.ring.len()
        );
        Ok(self.register(
            &raster.dataset,
            MemoryRaster {
                grid,
                transform: source.transform,
                crs: source.crs,
            },
        ))
    }

    fn fill_missing(&self, raster: &RasterHandle, sentinel: f64) -> CanopyResult<RasterHandle> {
        let source = self.lookup(raster)?;
        let mut grid = source.grid.clone();
        let mut filled = 0usize;
        for value in grid.iter_mut() {
            if value.is_nan() {
                *value = sentinel as f32;
                filled += 1;
            }
        }
        log::debug!("filled {} no-data pixels with {}", filled, sentinel);
        Ok(self.register(
            &raster.dataset,
            MemoryRaster {
                grid,
                transform: source.transform,
                crs: source.crs,
            },
        ))
    }

    fn display(
        &self,
        raster: &RasterHandle,
        region: &Region,
        style: &StyleRange,
    ) -> CanopyResult<()> {
        self.lookup(raster)?;
        self.previews.borrow_mut().push(PreviewRecord {
            handle: raster.clone(),
            region: region.clone(),
            style: *style,
        });
        Ok(())
    }

    fn export_to_storage(
        &self,
        raster: &RasterHandle,
        descriptor: &ExportDescriptor,
    ) -> CanopyResult<ExportJob> {
        // Descriptor problems are reported before the handle is touched.
        descriptor.check_for_submission()?;
        self.lookup(raster)?;

        let output_shape = descriptor.output_shape()?;
        let job = ExportJob {
            id: format!("job/{:04}", self.exports.borrow().len() + 1),
            description: descriptor.description.clone(),
            state: ExportState::Submitted,
            submitted_at: Utc::now(),
        };
        self.exports.borrow_mut().push(ExportRecord {
            job: job.clone(),
            handle: raster.clone(),
            descriptor: descriptor.clone(),
            output_shape,
        });
        log::info!(
            "accepted export {} ({} x {} pixels)",
            job.id,
            output_shape.0,
            output_shape.1
        );
        Ok(job)
    }

    fn job_status(&self, job_id: &str) -> CanopyResult<ExportState> {
        self.exports
            .borrow()
            .iter()
            .find(|record| record.job.id == job_id)
            .map(|record| record.job.state)
            .ok_or_else(|| CanopyError::Platform(format!("unknown job: {}", job_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canopy_raster() -> MemoryRaster {
        // 20x20 grid, 10-unit pixels, origin at (0, 200); two no-data holes
        let mut grid = Array2::from_elem((20, 20), 12.5f32);
        grid[[3, 4]] = f32::NAN;
        grid[[10, 11]] = f32::NAN;
        MemoryRaster {
            grid,
            transform: GridTransform {
                top_left_x: 0.0,
                top_left_y: 200.0,
                pixel_size: 10.0,
            },
            crs: Crs::Geographic,
        }
    }

    fn platform() -> MemoryPlatform {
        MemoryPlatform::new().with_dataset("canopy-v1", canopy_raster())
    }

    #[test]
    fn test_load_unknown_dataset() {
        let platform = platform();
        match platform.load_raster("no-such-layer") {
            Err(CanopyError::NotFound(dataset)) => assert_eq!(dataset, "no-such-layer"),
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_clip_masks_outside_pixels() {
        let platform = platform();
        let handle = platform.load_raster("canopy-v1").unwrap();
        // Left half of the grid
        let region = Region::rectangle(0.0, 0.0, 100.0, 200.0, Crs::Geographic);
        let clipped = platform.clip(&handle, &region).unwrap();

        let raster = platform.raster(&clipped).unwrap();
        // 10 of 20 columns survive, minus the hole at column 4
        assert_eq!(raster.defined_pixel_count(), 20 * 10 - 1);
        // Source handle is untouched
        let source = platform.raster(&handle).unwrap();
        assert_eq!(source.defined_pixel_count(), 20 * 20 - 2);
    }

    #[test]
    fn test_clip_rejects_crs_mismatch() {
        let platform = platform();
        let handle = platform.load_raster("canopy-v1").unwrap();
        let region = Region::rectangle(0.0, 0.0, 100.0, 200.0, Crs::Projected { epsg: 3857 });
        assert!(matches!(
            platform.clip(&handle, &region),
            Err(CanopyError::InvalidGeometry(_))
        ));
    }

    #[test]
    fn test_fill_replaces_nodata() {
        let platform = platform();
        let handle = platform.load_raster("canopy-v1").unwrap();
        let filled = platform.fill_missing(&handle, -9999.0).unwrap();

        let raster = platform.raster(&filled).unwrap();
        assert!(!raster.has_undefined_pixels());
        assert_eq!(raster.grid[[3, 4]], -9999.0);
        assert_eq!(raster.grid[[0, 0]], 12.5);
    }

    #[test]
    fn test_job_status_of_unknown_job() {
        let platform = platform();
        assert!(matches!(
            platform.job_status("job/9999"),
            Err(CanopyError::Platform(_))
        ));
    }
}

//! The remote platform seam.
//!
//! Every pipeline stage is one call against [`RasterPlatform`]. The trait is
//! injected into the pipeline so the HTTP-backed client can be swapped for
//! the in-memory backend in tests or offline runs.

pub mod memory;
pub mod rest;

pub use memory::{GridTransform, MemoryPlatform, MemoryRaster};
pub use rest::RestPlatform;

use crate::types::{
    CanopyResult, ExportDescriptor, ExportJob, ExportState, RasterHandle, Region, StyleRange,
};

/// Capability interface of the remote geospatial platform.
///
/// All operations are synchronous from the caller's perspective;
/// `export_to_storage` is fire-and-forget and returns as soon as the job is
/// accepted. The remote side owns the job lifecycle after that.
pub trait RasterPlatform {
    /// Resolve a dataset identifier to a raster handle. Purely referential:
    /// no pixel data moves.
    fn load_raster(&self, dataset_id: &str) -> CanopyResult<RasterHandle>;

    /// Derive a raster restricted to `region`; pixels outside it become
    /// no-data.
    fn clip(&self, raster: &RasterHandle, region: &Region) -> CanopyResult<RasterHandle>;

    /// Derive a raster with every no-data pixel replaced by `sentinel`.
    /// Idempotent: a second application changes nothing.
    fn fill_missing(&self, raster: &RasterHandle, sentinel: f64) -> CanopyResult<RasterHandle>;

    /// Ask the platform to center a viewport on `region` and overlay the
    /// raster, color-clamped to `style`. Presentation only.
    fn display(
        &self,
        raster: &RasterHandle,
        region: &Region,
        style: &StyleRange,
    ) -> CanopyResult<()>;

    /// Submit an asynchronous export of `raster` described by `descriptor`.
    /// Rejects incomplete or over-ceiling descriptors before submission.
    fn export_to_storage(
        &self,
        raster: &RasterHandle,
        descriptor: &ExportDescriptor,
    ) -> CanopyResult<ExportJob>;

    /// One read-only poll of a submitted job's state.
    fn job_status(&self, job_id: &str) -> CanopyResult<ExportState>;
}

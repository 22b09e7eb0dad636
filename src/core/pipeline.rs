//! The four-stage export pipeline: load, clip, fill, then preview and
//! export off the same filled raster.
//!
//! Data flows strictly forward. The first error in the load/clip/fill/export
//! chain aborts the run; the preview stage is presentational and must never
//! block the export, so its failures are logged and dropped.

use crate::config::WorkflowConfig;
use crate::platform::RasterPlatform;
use crate::types::{CanopyResult, ExportJob};

/// Runs the canopy export workflow against an injected platform backend.
pub struct CanopyPipeline<'a, P: RasterPlatform> {
    platform: &'a P,
}

impl<'a, P: RasterPlatform> CanopyPipeline<'a, P> {
    pub fn new(platform: &'a P) -> Self {
        CanopyPipeline { platform }
    }

    /// Execute the workflow and return the submitted export job.
    pub fn run(&self, workflow: &WorkflowConfig) -> CanopyResult<ExportJob> {
        let descriptor = workflow.export_descriptor();

        log::info!("loading dataset {}", workflow.dataset);
        let source = self.platform.load_raster(&workflow.dataset)?;

        let clipped = self.platform.clip(&source, &workflow.region)?;
        let filled = self.platform.fill_missing(&clipped, workflow.sentinel)?;

        if let Some(style) = &workflow.preview {
            // Preview is independent of the export; an unsupported
            // environment must not stop the job submission.
            if let Err(e) = self.platform.display(&filled, &workflow.region, style) {
                log::warn!("preview failed, continuing with export: {}", e);
            }
        }

        let job = self.platform.export_to_storage(&filled, &descriptor)?;
        log::info!("export job {} {}", job.id, job.state);
        Ok(job)
    }
}

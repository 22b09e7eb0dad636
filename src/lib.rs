//! canopia: a small clip-and-export workflow for remote canopy height rasters
//!
//! This crate drives a remote geospatial platform through four stages: resolve
//! a canopy height dataset, clip it to a region of interest, replace no-data
//! pixels with a sentinel, then preview and export the result. The platform is
//! reached through the [`platform::RasterPlatform`] capability trait, with an
//! HTTP backend for real runs and an in-memory backend for tests and offline
//! use.

pub mod config;
pub mod core;
pub mod platform;
pub mod types;

// Re-export main types for easier access
pub use config::{Config, WorkflowConfig};
pub use core::CanopyPipeline;
pub use platform::{MemoryPlatform, RasterPlatform, RestPlatform};
pub use types::{
    CanopyError, CanopyResult, Crs, ExportDescriptor, ExportJob, ExportState, RasterHandle,
    Region, StyleRange,
};

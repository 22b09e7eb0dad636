//! Local workflow logic: polygon predicates and the export pipeline.

pub mod geometry;
pub mod pipeline;

pub use pipeline::CanopyPipeline;

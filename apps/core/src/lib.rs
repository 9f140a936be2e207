// Papo V1 Response Pipeline
// Prepares generation requests from inbound chat messages and validates
// raw model output into the persona's final voice.

pub mod analysis;
pub mod cache;
pub mod clock;
pub mod config;
pub mod context;
pub mod database;
pub mod error;
pub mod metrics;
pub mod models;
pub mod output;
pub mod pipeline;
pub mod telemetry;
pub mod traits;

pub use config::PipelineConfig;
pub use error::PipelineError;
pub use pipeline::{Postprocessor, Preprocessor, ProcessOptions, ResponsePipeline};

#[cfg(test)]
mod tests;

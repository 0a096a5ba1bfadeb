pub mod cli;
pub mod config;
pub mod error;
pub mod loaders;
pub mod models;
pub mod pipeline;
pub mod processors;
pub mod readers;
pub mod utils;
pub mod weather;
pub mod writers;

pub use error::{PipelineError, Result};
pub use pipeline::{Pipeline, RunSummary};

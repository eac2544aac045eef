pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod recon;
pub mod report;
pub mod server;

pub use error::PipelineError;

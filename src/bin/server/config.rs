//! Configuration types shared by the CLI and server modes.

use std::path::PathBuf;

/// Configuration for the extraction pipeline
#[derive(Clone)]
pub struct ExtractorConfig {
    pub corner_model: PathBuf,
    pub field_model: PathBuf,
    pub rec_model: PathBuf,
    pub charset: PathBuf,
    pub device: String,
    pub crop_dump_dir: Option<PathBuf>,
}

/// Configuration for the HTTP server
#[derive(Clone)]
pub struct ServerConfig {
    pub extractor: ExtractorConfig,
    pub host: String,
    pub port: u16,
}

//! Extraction engine shared between CLI and server modes.

use crate::config::ExtractorConfig;
#[cfg(feature = "cuda")]
use idcard_ocr::core::config::OrtExecutionProvider;
use idcard_ocr::core::config::OrtSessionConfig;
use idcard_ocr::{ExtractError, IdCardOCR, IdCardOCRBuilder, IdCardOCRResult};
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Failed to load image: {0}")]
    ImageLoad(String),

    #[error("Failed to download image: {0}")]
    Download(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error(transparent)]
    Pipeline(#[from] ExtractError),
}

/// Request to extract fields from a card photo
#[derive(Debug, Deserialize)]
pub struct ExtractRequest {
    /// URL of the image to process
    pub url: String,
}

/// Response from field extraction
#[derive(Debug, Serialize)]
pub struct ExtractResponse {
    pub success: bool,
    /// Recognized field texts in canonical layout order
    pub data: Vec<String>,
    pub request_id: String,
    pub image_width: u32,
    pub image_height: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Machine-readable code for layout validation rejections
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_time_ms: Option<f64>,
}

impl ExtractResponse {
    pub fn error(request_id: &str, message: String, reason: Option<&str>) -> Self {
        Self {
            success: false,
            data: Vec::new(),
            request_id: request_id.to_string(),
            image_width: 0,
            image_height: 0,
            error: Some(message),
            reason: reason.map(str::to_string),
            processing_time_ms: None,
        }
    }
}

/// Extraction engine wrapper for thread-safe access
pub struct ExtractEngine {
    pipeline: IdCardOCR,
}

impl ExtractEngine {
    /// Create a new extraction engine with the given configuration
    pub fn new(config: &ExtractorConfig) -> Result<Self, EngineError> {
        // Validate model files exist before paying for session construction
        for (name, path) in [
            ("Corner detection model", &config.corner_model),
            ("Field detection model", &config.field_model),
            ("Recognition model", &config.rec_model),
            ("Character dictionary", &config.charset),
        ] {
            if !path.exists() {
                return Err(EngineError::ModelNotFound(format!(
                    "{name} not found: {}",
                    path.display()
                )));
            }
        }

        let ort_config = parse_device_config(&config.device)?;

        let mut builder = IdCardOCRBuilder::new(
            &config.corner_model,
            &config.field_model,
            &config.rec_model,
            &config.charset,
        );

        if let Some(config) = ort_config {
            builder = builder.ort_session(config);
        }

        if let Some(dir) = &config.crop_dump_dir {
            builder = builder.crop_dump_dir(dir);
        }

        Ok(Self {
            pipeline: builder.build()?,
        })
    }

    /// Process an image under the given request id and return the extraction result
    pub fn process(
        &self,
        image: &RgbImage,
        request_id: &str,
    ) -> Result<IdCardOCRResult, EngineError> {
        Ok(self.pipeline.extract_fields_with_id(image, request_id)?)
    }

    /// Convert internal result to API response
    pub fn result_to_response(
        result: &IdCardOCRResult,
        image_width: u32,
        image_height: u32,
        processing_time_ms: f64,
    ) -> ExtractResponse {
        ExtractResponse {
            success: true,
            data: result.fields.clone(),
            request_id: result.request_id.clone(),
            image_width,
            image_height,
            error: None,
            reason: None,
            processing_time_ms: Some(processing_time_ms),
        }
    }
}

/// Download bytes from a URL
pub async fn download_bytes(url: &str) -> Result<Vec<u8>, EngineError> {
    let response = reqwest::get(url)
        .await
        .map_err(|e| EngineError::Download(format!("Failed to fetch URL: {}", e)))?;

    if !response.status().is_success() {
        return Err(EngineError::Download(format!(
            "HTTP error: {}",
            response.status()
        )));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| EngineError::Download(format!("Failed to read response body: {}", e)))?;

    Ok(bytes.to_vec())
}

/// Download an image from a URL
pub async fn download_image(url: &str) -> Result<RgbImage, EngineError> {
    let bytes = download_bytes(url).await?;
    load_image_from_bytes(&bytes)
}

/// Load an image from bytes
pub fn load_image_from_bytes(bytes: &[u8]) -> Result<RgbImage, EngineError> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| EngineError::ImageLoad(format!("Failed to decode image: {}", e)))?;

    Ok(img.to_rgb8())
}

/// Load an image from a file path
pub fn load_image_from_path(path: &std::path::Path) -> Result<RgbImage, EngineError> {
    let img = image::open(path)
        .map_err(|e| EngineError::ImageLoad(format!("Failed to load image: {}", e)))?;

    Ok(img.to_rgb8())
}

/// Parse device string and create OrtSessionConfig
fn parse_device_config(device: &str) -> Result<Option<OrtSessionConfig>, EngineError> {
    let device_lower = device.to_lowercase();

    if device_lower == "cpu" {
        return Ok(None);
    }

    #[cfg(feature = "cuda")]
    {
        if device_lower.starts_with("cuda") {
            let device_id = if device_lower == "cuda" {
                0
            } else if let Some(id_str) = device_lower.strip_prefix("cuda:") {
                id_str.parse::<i32>().map_err(|_| {
                    EngineError::Config(format!("Invalid CUDA device ID: {}", device))
                })?
            } else {
                return Err(EngineError::Config(format!(
                    "Invalid device format: {}. Expected 'cuda' or 'cuda:N'",
                    device
                )));
            };

            let config = OrtSessionConfig::new().with_execution_providers(vec![
                OrtExecutionProvider::CUDA {
                    device_id: Some(device_id),
                },
                OrtExecutionProvider::CPU,
            ]);

            return Ok(Some(config));
        }
    }

    #[cfg(not(feature = "cuda"))]
    {
        if device_lower.starts_with("cuda") {
            return Err(EngineError::Config(format!(
                "CUDA device '{}' requested but CUDA feature is not enabled",
                device
            )));
        }
    }

    Err(EngineError::Config(format!(
        "Unsupported device: {}",
        device
    )))
}

/// Thread-safe extraction engine wrapped in Arc
pub type SharedExtractEngine = Arc<ExtractEngine>;

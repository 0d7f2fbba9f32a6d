//! CLI mode for one-shot field extraction.

use crate::config::ExtractorConfig;
use crate::engine::{download_image, load_image_from_path, ExtractEngine};
use idcard_ocr::IdCardOCRResult;
use std::path::Path;
use std::time::Instant;
use tracing::info;

/// Process an image fetched from a URL
pub async fn process_url(
    url: &str,
    config: &ExtractorConfig,
    output_format: &str,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let start = Instant::now();

    info!("Downloading image from URL...");
    let image = download_image(url).await?;
    let download_time = start.elapsed();
    info!(
        "Downloaded {}x{} image in {:.2}ms",
        image.width(),
        image.height(),
        download_time.as_secs_f64() * 1000.0
    );

    run_extraction(image, config, output_format)
}

/// Process a local image file
pub fn process_file(
    path: &Path,
    config: &ExtractorConfig,
    output_format: &str,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let start = Instant::now();

    info!("Loading image from file...");
    let image = load_image_from_path(path)?;
    let load_time = start.elapsed();
    info!(
        "Loaded {}x{} image in {:.2}ms",
        image.width(),
        image.height(),
        load_time.as_secs_f64() * 1000.0
    );

    run_extraction(image, config, output_format)
}

/// Run the extraction pipeline over a decoded image and print the result
fn run_extraction(
    image: image::RgbImage,
    config: &ExtractorConfig,
    output_format: &str,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    info!("Initializing extraction engine...");
    let init_start = Instant::now();
    let engine = ExtractEngine::new(config)?;
    info!(
        "Engine initialized in {:.2}ms",
        init_start.elapsed().as_secs_f64() * 1000.0
    );

    info!(
        "Extracting fields ({}x{})...",
        image.width(),
        image.height()
    );
    let extract_start = Instant::now();
    let request_id = uuid::Uuid::new_v4().to_string();
    let result = engine.process(&image, &request_id)?;
    let processing_time = extract_start.elapsed();
    info!(
        "Extraction completed in {:.2}ms",
        processing_time.as_secs_f64() * 1000.0
    );

    output_result(
        &result,
        image.width(),
        image.height(),
        output_format,
        processing_time.as_secs_f64() * 1000.0,
    )
}

/// Output the extraction result in the specified format
fn output_result(
    result: &IdCardOCRResult,
    image_width: u32,
    image_height: u32,
    format: &str,
    processing_time_ms: f64,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    match format {
        "json" => {
            let response = ExtractEngine::result_to_response(
                result,
                image_width,
                image_height,
                processing_time_ms,
            );
            println!("{}", serde_json::to_string(&response)?);
        }
        "text" => {
            for text in &result.fields {
                println!("{}", text);
            }
        }
        _ => {
            println!("\n=== Extraction Results ===");
            println!("Request: {}", result.request_id);
            println!("Image size: {}x{}", image_width, image_height);
            println!(
                "Rectified card: {}x{}",
                result.rectified_img.width(),
                result.rectified_img.height()
            );
            println!("Processing time: {:.2}ms", processing_time_ms);
            println!(
                "Optional field: {}",
                if result.optional_present {
                    "present"
                } else {
                    "absent"
                }
            );
            println!();

            if result.fields.is_empty() {
                println!("No fields recognized.");
            } else {
                println!("--- Fields ---");
                for (position, text) in result.fields.iter().enumerate() {
                    println!("[{}] \"{}\"", position, text);
                }
            }

            println!();
            println!("--- Layout ---");
            for region in &result.field_boxes {
                println!(
                    "class {}: [{:.1}, {:.1}] - [{:.1}, {:.1}] ({:.1}%)",
                    region.class_id,
                    region.bbox.x1,
                    region.bbox.y1,
                    region.bbox.x2,
                    region.bbox.y2,
                    region.confidence * 100.0
                );
            }
        }
    }

    Ok(())
}

//! YOLO Single-Class-Family Detection Model
//!
//! This module wraps a YOLO-style ONNX detection model behind the
//! [`RegionDetector`] trait. The same wrapper serves both detection stages of
//! the pipeline; only the model file, thresholds, and downstream ordering
//! tables differ between the corner detector and the field detector.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use image::{RgbImage, imageops};
use ndarray::{Array4, ArrayView2, Axis, Ix3};
use ort::session::Session;
use ort::value::TensorRef;
use tracing::debug;

use crate::core::config::OrtSessionConfig;
use crate::core::errors::ExtractError;
use crate::core::traits::RegionDetector;
use crate::processors::{BoundingBox, Detection, suppress_overlaps};

/// Gray value used to pad the letterbox area, normalized to `[0, 1]`.
const LETTERBOX_FILL: f32 = 114.0 / 255.0;

/// How the source image was placed into the square model input.
///
/// The image is scaled uniformly by `scale` and anchored at the top-left of
/// the input tensor; everything outside `content_width` x `content_height`
/// is padding. Decoding divides coordinates by `scale` to land back in
/// source-pixel space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LetterboxMapping {
    /// Uniform scale applied to the source image.
    pub scale: f32,
    /// Width of the scaled content inside the input tensor.
    pub content_width: u32,
    /// Height of the scaled content inside the input tensor.
    pub content_height: u32,
}

/// Computes the letterbox placement for a source image of the given size.
pub fn letterbox_mapping(src_width: u32, src_height: u32, input_size: u32) -> LetterboxMapping {
    let scale = (input_size as f32 / src_width as f32).min(input_size as f32 / src_height as f32);
    let content_width = ((src_width as f32 * scale).round() as u32).clamp(1, input_size);
    let content_height = ((src_height as f32 * scale).round() as u32).clamp(1, input_size);

    LetterboxMapping {
        scale,
        content_width,
        content_height,
    }
}

/// Converts an image into the `[1, 3, S, S]` NCHW tensor the model consumes.
///
/// The image is resized preserving aspect ratio, placed at the top-left of a
/// square canvas filled with the letterbox gray, and scaled to `[0, 1]`.
pub fn image_to_input(image: &RgbImage, input_size: u32) -> (Array4<f32>, LetterboxMapping) {
    let mapping = letterbox_mapping(image.width(), image.height(), input_size);
    let resized = imageops::resize(
        image,
        mapping.content_width,
        mapping.content_height,
        imageops::FilterType::Triangle,
    );

    let size = input_size as usize;
    let mut input = Array4::from_elem([1, 3, size, size], LETTERBOX_FILL);
    for (x, y, pixel) in resized.enumerate_pixels() {
        let x = x as usize;
        let y = y as usize;
        let [r, g, b] = pixel.0;
        input[[0, 0, y, x]] = r as f32 / 255.0;
        input[[0, 1, y, x]] = g as f32 / 255.0;
        input[[0, 2, y, x]] = b as f32 / 255.0;
    }

    (input, mapping)
}

/// Decodes raw prediction rows into detections in source-image coordinates.
///
/// Each row is `[cx, cy, w, h, objectness, class scores...]` in input-tensor
/// coordinates. A row survives when `objectness * best_class_score` reaches
/// `confidence_threshold`; its box is mapped back through the letterbox scale
/// and clamped to the source image bounds.
pub fn decode_predictions(
    predictions: &ArrayView2<'_, f32>,
    confidence_threshold: f32,
    mapping: LetterboxMapping,
    src_width: u32,
    src_height: u32,
) -> Vec<Detection> {
    let mut detections = Vec::new();

    for row in predictions.axis_iter(Axis(0)) {
        let objectness = row[4];
        let (class_id, class_score) = row
            .iter()
            .skip(5)
            .enumerate()
            .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(index, score)| (index as u32, *score))
            .unwrap_or((0, 0.0));

        let confidence = objectness * class_score;
        if confidence < confidence_threshold {
            continue;
        }

        let cx = row[0] / mapping.scale;
        let cy = row[1] / mapping.scale;
        let half_w = row[2] / mapping.scale / 2.0;
        let half_h = row[3] / mapping.scale / 2.0;

        let mut bbox = BoundingBox::new(cx - half_w, cy - half_h, cx + half_w, cy + half_h);
        bbox.clamp_to(src_width as f32, src_height as f32);

        detections.push(Detection::new(bbox, class_id, confidence));
    }

    detections
}

/// YOLO-family detector backed by an ONNX Runtime session.
///
/// The session is guarded by a mutex because ONNX Runtime requires exclusive
/// access while running; the wrapper itself is `Send + Sync` and can be
/// shared behind an `Arc` by concurrent request handlers.
pub struct YoloDetector {
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
    input_size: u32,
    confidence_threshold: f32,
    iou_threshold: f32,
    model_path: PathBuf,
}

impl fmt::Debug for YoloDetector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("YoloDetector")
            .field("model_path", &self.model_path)
            .field("input_size", &self.input_size)
            .field("confidence_threshold", &self.confidence_threshold)
            .field("iou_threshold", &self.iou_threshold)
            .finish()
    }
}

impl RegionDetector for YoloDetector {
    fn detect(&self, image: &RgbImage) -> Result<Vec<Detection>, ExtractError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(ExtractError::InvalidInput {
                message: "detection input image has zero pixels".to_string(),
            });
        }

        let (input, mapping) = image_to_input(image, self.input_size);

        let mut session = self.session.lock().map_err(|_| {
            ExtractError::config_error_detailed(
                "model session",
                "session mutex poisoned by a previous panic",
            )
        })?;
        let outputs = session.run(ort::inputs![
            self.input_name.as_str() => TensorRef::from_array_view(&input)?
        ])?;

        let tensor = outputs
            .get(self.output_name.as_str())
            .ok_or_else(|| {
                ExtractError::config_error_detailed(
                    "detector output",
                    format!("model has no output named '{}'", self.output_name),
                )
            })?
            .try_extract_array::<f32>()?;
        let predictions = tensor.into_dimensionality::<Ix3>()?;

        let row_len = predictions.shape()[2];
        if row_len < 6 {
            return Err(ExtractError::config_error_detailed(
                "detector output",
                format!("prediction rows carry {row_len} values, at least 6 required"),
            ));
        }

        let decoded = decode_predictions(
            &predictions.index_axis(Axis(0), 0),
            self.confidence_threshold,
            mapping,
            image.width(),
            image.height(),
        );
        let detections = suppress_overlaps(&decoded, self.iou_threshold);

        debug!(
            model = %self.model_path.display(),
            raw = decoded.len(),
            kept = detections.len(),
            "detector pass complete"
        );

        Ok(detections)
    }
}

/// Builder for [`YoloDetector`].
#[derive(Debug, Clone)]
pub struct YoloDetectorBuilder {
    input_name: String,
    output_name: String,
    input_size: u32,
    confidence_threshold: f32,
    iou_threshold: f32,
    session_config: Option<OrtSessionConfig>,
}

impl Default for YoloDetectorBuilder {
    fn default() -> Self {
        Self {
            input_name: "images".to_string(),
            output_name: "output0".to_string(),
            input_size: 640,
            confidence_threshold: 0.25,
            iou_threshold: 0.45,
            session_config: None,
        }
    }
}

impl YoloDetectorBuilder {
    /// Creates a new builder with the standard YOLO defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the name of the model's input tensor.
    pub fn input_name(mut self, name: impl Into<String>) -> Self {
        self.input_name = name.into();
        self
    }

    /// Sets the name of the model's output tensor.
    pub fn output_name(mut self, name: impl Into<String>) -> Self {
        self.output_name = name.into();
        self
    }

    /// Sets the square input resolution. Must be a positive multiple of 32.
    pub fn input_size(mut self, size: u32) -> Self {
        self.input_size = size;
        self
    }

    /// Sets the minimum `objectness * class score` a row must reach.
    pub fn confidence_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    /// Sets the IoU threshold for the detector's duplicate suppression.
    pub fn iou_threshold(mut self, threshold: f32) -> Self {
        self.iou_threshold = threshold;
        self
    }

    /// Sets the ONNX Runtime session configuration.
    pub fn session_config(mut self, config: OrtSessionConfig) -> Self {
        self.session_config = Some(config);
        self
    }

    /// Validates the configuration, loads the model file, and builds the
    /// detector.
    pub fn build(self, model_path: impl AsRef<Path>) -> Result<YoloDetector, ExtractError> {
        if self.input_size == 0 || self.input_size % 32 != 0 {
            return Err(ExtractError::config_error_detailed(
                "detector input size",
                format!("{} is not a positive multiple of 32", self.input_size),
            ));
        }
        for (name, value) in [
            ("detector confidence threshold", self.confidence_threshold),
            ("detector iou threshold", self.iou_threshold),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(ExtractError::config_error_detailed(
                    name,
                    format!("{value} is outside (0, 1]"),
                ));
            }
        }

        let path = model_path.as_ref();
        if !path.exists() {
            return Err(ExtractError::model_load(
                path.display().to_string(),
                "model file not found",
                Some("check that the path points to an exported .onnx file"),
                None,
            ));
        }
        if !path.is_file() {
            return Err(ExtractError::model_load(
                path.display().to_string(),
                "path is not a regular file",
                None,
                None,
            ));
        }

        let mut builder = Session::builder()?;
        if let Some(config) = &self.session_config {
            builder = config.apply(builder)?;
        }
        let session = builder.commit_from_file(path).map_err(|e| {
            ExtractError::model_load(
                path.display().to_string(),
                "onnx runtime rejected the model",
                Some("ensure the file is a valid ONNX graph"),
                Some(Box::new(e)),
            )
        })?;

        debug!(
            model = %path.display(),
            input_size = self.input_size,
            "loaded detection model"
        );

        Ok(YoloDetector {
            session: Mutex::new(session),
            input_name: self.input_name,
            output_name: self.output_name,
            input_size: self.input_size,
            confidence_threshold: self.confidence_threshold,
            iou_threshold: self.iou_threshold,
            model_path: path.to_path_buf(),
        })
    }
}

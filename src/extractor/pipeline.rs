//! High-level extraction pipeline API.
//!
//! This module provides `IdCardOCRBuilder` for constructing the two-pass
//! extraction pipeline (corner landmarks, then layout fields) with a fluent
//! API, and `IdCardOCR`, the runtime that walks a photograph through corner
//! resolution, rectification, field resolution, cropping and recognition.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use image::RgbImage;
use tracing::{debug, info};
use uuid::Uuid;

use crate::core::config::{ConfigValidator, CornerConfig, FieldConfig, OrtSessionConfig};
use crate::core::errors::{ExtractError, ExtractionStage};
use crate::core::traits::{RegionDetector, TextRecognizer};
use crate::extractor::result::IdCardOCRResult;
use crate::extractor::stages::{merge_optional_fields, resolve_corners, resolve_fields};
use crate::models::detection::YoloDetectorBuilder;
use crate::models::recognition::CtcRecognizerBuilder;
use crate::utils::{crop_field, rectify_document};

/// Extraction runtime for photographed identity documents.
///
/// The runtime holds no per-request state; one instance can serve concurrent
/// requests behind an `Arc`. Detectors and the recognizer sit behind trait
/// objects, so tests drive the pipeline with scripted stand-ins.
#[derive(Debug)]
pub struct IdCardOCR {
    corner_detector: Box<dyn RegionDetector>,
    field_detector: Box<dyn RegionDetector>,
    recognizer: Box<dyn TextRecognizer>,
    corner_config: CornerConfig,
    field_config: FieldConfig,
    crop_dump_dir: Option<PathBuf>,
}

impl IdCardOCR {
    /// Assembles a pipeline from already-built components.
    ///
    /// Both layout configurations are validated here; an invalid table or
    /// threshold is a startup failure, never a per-request one.
    pub fn from_parts(
        corner_detector: Box<dyn RegionDetector>,
        field_detector: Box<dyn RegionDetector>,
        recognizer: Box<dyn TextRecognizer>,
        corner_config: CornerConfig,
        field_config: FieldConfig,
        crop_dump_dir: Option<PathBuf>,
    ) -> Result<Self, ExtractError> {
        corner_config.validate()?;
        field_config.validate()?;

        Ok(Self {
            corner_detector,
            field_detector,
            recognizer,
            corner_config,
            field_config,
            crop_dump_dir,
        })
    }

    /// Extracts the ordered field texts from a card photograph.
    ///
    /// Tags the run with a fresh request id; see
    /// [`extract_fields_with_id`](Self::extract_fields_with_id).
    pub fn extract_fields(&self, image: &RgbImage) -> Result<IdCardOCRResult, ExtractError> {
        self.extract_fields_with_id(image, &Uuid::new_v4().to_string())
    }

    /// Extracts the ordered field texts from a card photograph, tagging the
    /// run (logs and the crop dump namespace) with the caller's request id.
    ///
    /// Stages run strictly in order: corner detection, corner resolution,
    /// rectification, field detection, field resolution, cropping,
    /// recognition, assembly. A failed stage is terminal; in particular the
    /// field detector never runs when the corner layout was rejected.
    pub fn extract_fields_with_id(
        &self,
        image: &RgbImage,
        request_id: &str,
    ) -> Result<IdCardOCRResult, ExtractError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(ExtractError::InvalidInput {
                message: "input image has zero pixels".to_string(),
            });
        }

        let started = Instant::now();

        debug!(
            request_id,
            stage = %ExtractionStage::CornerDetection,
            "detecting corner landmarks"
        );
        let corner_detections = self.corner_detector.detect(image)?;

        debug!(
            request_id,
            stage = %ExtractionStage::CornerResolution,
            detections = corner_detections.len(),
            "resolving corner quad"
        );
        let corners = resolve_corners(&corner_detections, &self.corner_config)?;

        debug!(
            request_id,
            stage = %ExtractionStage::Rectification,
            "rectifying document"
        );
        let rectified = rectify_document(image, &corners)?;

        debug!(
            request_id,
            stage = %ExtractionStage::FieldDetection,
            "detecting layout fields"
        );
        let field_detections = self.field_detector.detect(&rectified)?;

        debug!(
            request_id,
            stage = %ExtractionStage::FieldResolution,
            detections = field_detections.len(),
            "resolving field layout"
        );
        let fields = resolve_fields(&field_detections, &self.field_config)?;
        let optional_present = fields
            .iter()
            .any(|d| d.class_id == self.field_config.optional_class);

        debug!(
            request_id,
            stage = %ExtractionStage::Cropping,
            count = fields.len(),
            "cropping field regions"
        );
        let mut crops = Vec::with_capacity(fields.len());
        for field in &fields {
            crops.push(crop_field(&rectified, &field.bbox)?);
        }
        if let Some(dir) = &self.crop_dump_dir {
            self.dump_crops(dir, request_id, &crops)?;
        }

        debug!(
            request_id,
            stage = %ExtractionStage::Recognition,
            "recognizing field crops"
        );
        // list index 0 is the reserved portrait region
        let mut texts = Vec::with_capacity(crops.len().saturating_sub(1));
        for (index, crop) in crops.iter().enumerate().skip(1) {
            let text = self
                .recognizer
                .recognize(crop)
                .map_err(|e| ExtractError::recognition_failure(index, e.to_string()))?;
            texts.push(text);
        }

        debug!(
            request_id,
            stage = %ExtractionStage::Assembly,
            optional = optional_present,
            "assembling field list"
        );
        let final_fields = if optional_present {
            merge_optional_fields(texts, &self.field_config.merge)
        } else {
            texts
        };

        info!(
            request_id,
            fields = final_fields.len(),
            optional = optional_present,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "extraction complete"
        );

        Ok(IdCardOCRResult {
            request_id: request_id.to_string(),
            fields: final_fields,
            field_boxes: fields,
            corners,
            rectified_img: Arc::new(rectified),
            optional_present,
        })
    }

    /// Persists the field crops under `<dir>/<request-id>/<index>.jpg`.
    fn dump_crops(
        &self,
        dir: &Path,
        request_id: &str,
        crops: &[RgbImage],
    ) -> Result<(), ExtractError> {
        let target = dir.join(request_id);
        std::fs::create_dir_all(&target)?;

        for (index, crop) in crops.iter().enumerate() {
            let path = target.join(format!("{index}.jpg"));
            crop.save(&path).map_err(|e| {
                ExtractError::processing(
                    ExtractionStage::Cropping,
                    format!("failed to persist crop {} to '{}'", index, path.display()),
                    e,
                )
            })?;
        }

        debug!(request_id, dir = %target.display(), count = crops.len(), "dumped field crops");
        Ok(())
    }
}

/// Builder for constructing the extraction pipeline.
///
/// # Example
///
/// ```no_run
/// use idcard_ocr::extractor::IdCardOCRBuilder;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let ocr = IdCardOCRBuilder::new(
///     "models/corner.onnx",
///     "models/field.onnx",
///     "models/rec.onnx",
///     "models/charset.txt",
/// )
/// .build()?;
///
/// let image = image::open("card.jpg")?.to_rgb8();
/// let result = ocr.extract_fields(&image)?;
/// for (position, text) in result.fields.iter().enumerate() {
///     println!("{position}: {text}");
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct IdCardOCRBuilder {
    corner_model: PathBuf,
    field_model: PathBuf,
    recognition_model: PathBuf,
    charset_path: PathBuf,

    corner_config: CornerConfig,
    field_config: FieldConfig,
    ort_session_config: Option<OrtSessionConfig>,
    crop_dump_dir: Option<PathBuf>,

    detector_input_size: u32,
    corner_confidence_threshold: f32,
    corner_iou_threshold: f32,
    field_confidence_threshold: f32,
    field_iou_threshold: f32,
}

impl IdCardOCRBuilder {
    /// Creates a new builder with the calibrated service defaults.
    ///
    /// # Arguments
    ///
    /// * `corner_model` - Path to the corner landmark detection ONNX model
    /// * `field_model` - Path to the field layout detection ONNX model
    /// * `recognition_model` - Path to the text recognition ONNX model
    /// * `charset_path` - Path to the recognizer's character dictionary
    pub fn new(
        corner_model: impl Into<PathBuf>,
        field_model: impl Into<PathBuf>,
        recognition_model: impl Into<PathBuf>,
        charset_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            corner_model: corner_model.into(),
            field_model: field_model.into(),
            recognition_model: recognition_model.into(),
            charset_path: charset_path.into(),
            corner_config: CornerConfig::default(),
            field_config: FieldConfig::default(),
            ort_session_config: None,
            crop_dump_dir: None,
            detector_input_size: 640,
            corner_confidence_threshold: 0.25,
            corner_iou_threshold: 0.45,
            // the field model is calibrated much stricter than the corner one
            field_confidence_threshold: 0.70,
            field_iou_threshold: 0.70,
        }
    }

    /// Sets the corner resolution configuration.
    pub fn corner_config(mut self, config: CornerConfig) -> Self {
        self.corner_config = config;
        self
    }

    /// Sets the field resolution configuration.
    pub fn field_config(mut self, config: FieldConfig) -> Self {
        self.field_config = config;
        self
    }

    /// Sets the ONNX Runtime session configuration.
    ///
    /// This configuration is applied to all models in the pipeline.
    pub fn ort_session(mut self, config: OrtSessionConfig) -> Self {
        self.ort_session_config = Some(config);
        self
    }

    /// Persists field crops under `<dir>/<request-id>/<index>.jpg`.
    pub fn crop_dump_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.crop_dump_dir = Some(dir.into());
        self
    }

    /// Sets the square input resolution for both detectors.
    pub fn detector_input_size(mut self, size: u32) -> Self {
        self.detector_input_size = size;
        self
    }

    /// Sets the corner detector's confidence and IoU thresholds.
    pub fn corner_thresholds(mut self, confidence: f32, iou: f32) -> Self {
        self.corner_confidence_threshold = confidence;
        self.corner_iou_threshold = iou;
        self
    }

    /// Sets the field detector's confidence and IoU thresholds.
    pub fn field_thresholds(mut self, confidence: f32, iou: f32) -> Self {
        self.field_confidence_threshold = confidence;
        self.field_iou_threshold = iou;
        self
    }

    /// Builds the extraction runtime.
    ///
    /// This instantiates both detector sessions and the recognizer session
    /// and validates the layout configuration.
    pub fn build(self) -> Result<IdCardOCR, ExtractError> {
        let mut corner_builder = YoloDetectorBuilder::new()
            .input_size(self.detector_input_size)
            .confidence_threshold(self.corner_confidence_threshold)
            .iou_threshold(self.corner_iou_threshold);
        let mut field_builder = YoloDetectorBuilder::new()
            .input_size(self.detector_input_size)
            .confidence_threshold(self.field_confidence_threshold)
            .iou_threshold(self.field_iou_threshold);
        let mut recognizer_builder = CtcRecognizerBuilder::new();

        if let Some(session_config) = &self.ort_session_config {
            corner_builder = corner_builder.session_config(session_config.clone());
            field_builder = field_builder.session_config(session_config.clone());
            recognizer_builder = recognizer_builder.session_config(session_config.clone());
        }

        let corner_detector = corner_builder.build(&self.corner_model)?;
        let field_detector = field_builder.build(&self.field_model)?;
        let recognizer = recognizer_builder.build(&self.recognition_model, &self.charset_path)?;

        IdCardOCR::from_parts(
            Box::new(corner_detector),
            Box::new(field_detector),
            Box::new(recognizer),
            self.corner_config,
            self.field_config,
            self.crop_dump_dir,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::{BoundingBox, Detection};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct ScriptedDetector {
        batch: Vec<Detection>,
        calls: Arc<AtomicUsize>,
    }

    impl RegionDetector for ScriptedDetector {
        fn detect(&self, _image: &RgbImage) -> Result<Vec<Detection>, ExtractError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.batch.clone())
        }
    }

    #[derive(Debug)]
    struct CountingRecognizer {
        calls: Arc<AtomicUsize>,
    }

    impl TextRecognizer for CountingRecognizer {
        fn recognize(&self, _image: &RgbImage) -> Result<String, ExtractError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("text-{n}"))
        }
    }

    #[derive(Debug)]
    struct FailingRecognizer;

    impl TextRecognizer for FailingRecognizer {
        fn recognize(&self, _image: &RgbImage) -> Result<String, ExtractError> {
            Err(ExtractError::InvalidInput {
                message: "scripted failure".to_string(),
            })
        }
    }

    fn det(class_id: u32, x1: f32, y1: f32, x2: f32, y2: f32, confidence: f32) -> Detection {
        Detection::new(BoundingBox::new(x1, y1, x2, y2), class_id, confidence)
    }

    /// Corner boxes for the 200x120 test photo; the resolved quad becomes
    /// (10,10) (190,10) (190,140) (10,140) after the bottom offset.
    fn corner_batch() -> Vec<Detection> {
        vec![
            det(0, 5.0, 5.0, 15.0, 15.0, 0.9),
            det(1, 185.0, 5.0, 195.0, 15.0, 0.9),
            det(2, 185.0, 105.0, 195.0, 115.0, 0.9),
            det(3, 5.0, 105.0, 15.0, 115.0, 0.9),
        ]
    }

    fn field_batch(classes: &[u32]) -> Vec<Detection> {
        classes
            .iter()
            .enumerate()
            .map(|(i, &class_id)| {
                let y = i as f32 * 10.0;
                det(class_id, 5.0, y + 1.0, 50.0, y + 9.0, 0.9)
            })
            .collect()
    }

    struct Harness {
        pipeline: IdCardOCR,
        corner_calls: Arc<AtomicUsize>,
        field_calls: Arc<AtomicUsize>,
        recognizer_calls: Arc<AtomicUsize>,
    }

    fn harness(corner_batch: Vec<Detection>, field_batch: Vec<Detection>) -> Harness {
        harness_with_dump(corner_batch, field_batch, None)
    }

    fn harness_with_dump(
        corner_batch: Vec<Detection>,
        field_batch: Vec<Detection>,
        crop_dump_dir: Option<PathBuf>,
    ) -> Harness {
        let corner_calls = Arc::new(AtomicUsize::new(0));
        let field_calls = Arc::new(AtomicUsize::new(0));
        let recognizer_calls = Arc::new(AtomicUsize::new(0));

        let pipeline = IdCardOCR::from_parts(
            Box::new(ScriptedDetector {
                batch: corner_batch,
                calls: corner_calls.clone(),
            }),
            Box::new(ScriptedDetector {
                batch: field_batch,
                calls: field_calls.clone(),
            }),
            Box::new(CountingRecognizer {
                calls: recognizer_calls.clone(),
            }),
            CornerConfig::default(),
            FieldConfig::default(),
            crop_dump_dir,
        )
        .unwrap();

        Harness {
            pipeline,
            corner_calls,
            field_calls,
            recognizer_calls,
        }
    }

    fn photo() -> RgbImage {
        RgbImage::from_pixel(200, 120, image::Rgb([200, 200, 200]))
    }

    #[test]
    fn test_missing_corner_stops_before_field_detection() {
        let mut corners = corner_batch();
        corners.pop();
        let h = harness(corners, field_batch(&[0, 1, 2, 3, 4, 5, 6, 8, 9]));

        let err = h.pipeline.extract_fields(&photo()).unwrap_err();

        assert!(matches!(
            err,
            ExtractError::CornerCountMismatch {
                expected: 4,
                found: 3
            }
        ));
        assert_eq!(h.corner_calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.field_calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.recognizer_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_degenerate_quad_stops_before_field_detection() {
        let corners = vec![
            det(0, 5.0, 5.0, 15.0, 15.0, 0.9),
            det(1, 5.0, 5.0, 15.0, 15.0, 0.9),
            det(2, 5.0, 5.0, 15.0, 15.0, 0.9),
            det(3, 5.0, 5.0, 15.0, 15.0, 0.9),
        ];
        let h = harness(corners, field_batch(&[0, 1, 2, 3, 4, 5, 6, 8, 9]));

        let err = h.pipeline.extract_fields(&photo()).unwrap_err();

        assert!(matches!(err, ExtractError::DegenerateGeometry { .. }));
        assert_eq!(h.field_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_nine_fields_without_optional() {
        let h = harness(corner_batch(), field_batch(&[0, 1, 2, 3, 4, 5, 6, 8, 9]));

        let result = h.pipeline.extract_fields(&photo()).unwrap();

        // portrait excluded, no merge
        assert_eq!(result.fields.len(), 8);
        assert!(!result.optional_present);
        assert_eq!(result.fields[0], "text-0");
        assert_eq!(h.recognizer_calls.load(Ordering::SeqCst), 8);
        // the rectified 180x130 card travels with the result
        assert_eq!(result.rectified_img.width(), 180);
        assert_eq!(result.rectified_img.height(), 130);
        assert_eq!(result.corners[2], crate::processors::Point2f::new(190.0, 140.0));
    }

    #[test]
    fn test_nine_fields_with_optional_is_rejected() {
        let h = harness(corner_batch(), field_batch(&[0, 1, 2, 3, 4, 5, 6, 7, 8]));

        let err = h.pipeline.extract_fields(&photo()).unwrap_err();

        assert!(matches!(
            err,
            ExtractError::InsufficientFieldsWithOptional {
                required: 10,
                found: 9
            }
        ));
        assert_eq!(h.recognizer_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_ten_fields_with_optional_merges() {
        let h = harness(corner_batch(), field_batch(&[0, 1, 2, 3, 4, 5, 6, 7, 8, 9]));

        let result = h.pipeline.extract_fields(&photo()).unwrap();

        assert!(result.optional_present);
        assert_eq!(h.recognizer_calls.load(Ordering::SeqCst), 9);
        // nine recognized entries merge down to eight
        assert_eq!(result.fields.len(), 8);
        assert_eq!(result.fields[6], "text-6, text-7");
        assert_eq!(result.fields[7], "text-8");
    }

    #[test]
    fn test_duplicate_box_suppressed_but_counted() {
        let mut fields = field_batch(&[0, 1, 2, 3, 4, 5, 6, 7, 8, 9]);
        let mut duplicate = fields[5];
        duplicate.confidence = 0.5;
        fields.push(duplicate);
        let h = harness(corner_batch(), fields);

        let result = h.pipeline.extract_fields(&photo()).unwrap();

        assert_eq!(result.field_boxes.len(), 10);
        assert_eq!(result.field_boxes[5].confidence, 0.9);
        assert_eq!(result.fields.len(), 8);
    }

    #[test]
    fn test_recognizer_failure_carries_field_index() {
        let pipeline = IdCardOCR::from_parts(
            Box::new(ScriptedDetector {
                batch: corner_batch(),
                calls: Arc::new(AtomicUsize::new(0)),
            }),
            Box::new(ScriptedDetector {
                batch: field_batch(&[0, 1, 2, 3, 4, 5, 6, 8, 9]),
                calls: Arc::new(AtomicUsize::new(0)),
            }),
            Box::new(FailingRecognizer),
            CornerConfig::default(),
            FieldConfig::default(),
            None,
        )
        .unwrap();

        let err = pipeline.extract_fields(&photo()).unwrap_err();

        // the portrait crop at index 0 is skipped, so the first recognized
        // crop is index 1
        match err {
            ExtractError::RecognitionFailure { index, message } => {
                assert_eq!(index, 1);
                assert!(message.contains("scripted failure"));
            }
            other => panic!("expected RecognitionFailure, got {other:?}"),
        }
    }

    #[test]
    fn test_crop_dump_uses_request_namespace() {
        let dump_root = std::env::temp_dir().join(format!(
            "idcard-ocr-dump-test-{}",
            std::process::id()
        ));
        let h = harness_with_dump(
            corner_batch(),
            field_batch(&[0, 1, 2, 3, 4, 5, 6, 7, 8, 9]),
            Some(dump_root.clone()),
        );

        let result = h
            .pipeline
            .extract_fields_with_id(&photo(), "scenario-dump")
            .unwrap();

        assert_eq!(result.request_id, "scenario-dump");
        let namespace = dump_root.join("scenario-dump");
        for index in 0..10 {
            assert!(
                namespace.join(format!("{index}.jpg")).is_file(),
                "missing crop {index}"
            );
        }

        std::fs::remove_dir_all(&dump_root).ok();
    }

    #[test]
    fn test_empty_image_is_rejected() {
        let h = harness(corner_batch(), field_batch(&[0, 1, 2, 3, 4, 5, 6, 8, 9]));
        let err = h
            .pipeline
            .extract_fields(&RgbImage::new(0, 0))
            .unwrap_err();

        assert!(matches!(err, ExtractError::InvalidInput { .. }));
        assert_eq!(h.corner_calls.load(Ordering::SeqCst), 0);
    }
}

//! CTC Text Recognition Model
//!
//! This module wraps a CTC-decoded recognition ONNX model behind the
//! [`TextRecognizer`] trait. Field crops are resized to a fixed height,
//! right-padded to a fixed width, and the per-timestep class logits are
//! greedily decoded against a character dictionary.

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
use crate::core::traits::TextRecognizer;

/// Parses a character dictionary from file contents.
///
/// One entry per line; line `i` is the character the model emits as class
/// `i + 1` (class 0 is the CTC blank and has no line). Windows line endings
/// are tolerated.
pub fn parse_charset(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(|line| line.trim_end_matches('\r').to_string())
        .collect()
}

/// Loads and validates a character dictionary file.
pub fn load_charset(path: &Path) -> Result<Vec<String>, ExtractError> {
    if !path.exists() || !path.is_file() {
        return Err(ExtractError::model_load(
            path.display().to_string(),
            "character dictionary not found",
            Some("one character per line; the CTC blank is implicit class 0"),
            None,
        ));
    }

    let charset = parse_charset(&std::fs::read_to_string(path)?);
    if charset.is_empty() {
        return Err(ExtractError::config_error_detailed(
            "character dictionary",
            format!("'{}' contains no entries", path.display()),
        ));
    }

    Ok(charset)
}

/// Converts a field crop into the `[1, 3, H, W]` NCHW tensor the model
/// consumes.
///
/// The crop is resized to `input_height` preserving aspect ratio, the width
/// is capped at `max_width`, and pixels are normalized to `[-1, 1]`. The
/// area right of the content stays at 0.0, the normalized mid-gray.
pub fn crop_to_input(image: &RgbImage, input_height: u32, max_width: u32) -> Array4<f32> {
    let scale = input_height as f32 / image.height() as f32;
    let content_width = ((image.width() as f32 * scale).round() as u32).clamp(1, max_width);
    let resized = imageops::resize(
        image,
        content_width,
        input_height,
        imageops::FilterType::Triangle,
    );

    let mut input = Array4::zeros([1, 3, input_height as usize, max_width as usize]);
    for (x, y, pixel) in resized.enumerate_pixels() {
        let x = x as usize;
        let y = y as usize;
        let [r, g, b] = pixel.0;
        input[[0, 0, y, x]] = (r as f32 / 255.0 - 0.5) / 0.5;
        input[[0, 1, y, x]] = (g as f32 / 255.0 - 0.5) / 0.5;
        input[[0, 2, y, x]] = (b as f32 / 255.0 - 0.5) / 0.5;
    }

    input
}

/// Greedily decodes CTC logits of shape `[sequence_length, vocab]`.
///
/// Per timestep the highest-scoring class wins; blanks (class 0) and
/// repeats of the previous timestep's class are dropped, and the rest map
/// through the charset. Classes beyond the charset are skipped.
pub fn ctc_greedy_decode(logits: &ArrayView2<'_, f32>, charset: &[String]) -> String {
    let mut text = String::new();
    let mut previous = None;

    for timestep in logits.axis_iter(Axis(0)) {
        let best = timestep
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(index, _)| index)
            .unwrap_or(0);

        if best != 0 && previous != Some(best) {
            if let Some(entry) = charset.get(best - 1) {
                text.push_str(entry);
            }
        }
        previous = Some(best);
    }

    text
}

/// CTC recognition model backed by an ONNX Runtime session.
pub struct CtcRecognizer {
    session: Mutex<Session>,
    charset: Vec<String>,
    input_name: String,
    output_name: String,
    input_height: u32,
    max_width: u32,
    model_path: PathBuf,
}

impl fmt::Debug for CtcRecognizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CtcRecognizer")
            .field("model_path", &self.model_path)
            .field("charset_len", &self.charset.len())
            .field("input_height", &self.input_height)
            .field("max_width", &self.max_width)
            .finish()
    }
}

impl CtcRecognizer {
    /// The loaded character dictionary, without the blank.
    pub fn charset(&self) -> &[String] {
        &self.charset
    }
}

impl TextRecognizer for CtcRecognizer {
    fn recognize(&self, image: &RgbImage) -> Result<String, ExtractError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(ExtractError::InvalidInput {
                message: "recognition input image has zero pixels".to_string(),
            });
        }

        let input = crop_to_input(image, self.input_height, self.max_width);

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
                    "recognizer output",
                    format!("model has no output named '{}'", self.output_name),
                )
            })?
            .try_extract_array::<f32>()?;
        let logits = tensor.into_dimensionality::<Ix3>()?;

        let text = ctc_greedy_decode(&logits.index_axis(Axis(0), 0), &self.charset);

        debug!(chars = text.chars().count(), "recognizer pass complete");

        Ok(text)
    }
}

/// Builder for [`CtcRecognizer`].
#[derive(Debug, Clone)]
pub struct CtcRecognizerBuilder {
    input_name: String,
    output_name: String,
    input_height: u32,
    max_width: u32,
    session_config: Option<OrtSessionConfig>,
}

impl Default for CtcRecognizerBuilder {
    fn default() -> Self {
        Self {
            input_name: "x".to_string(),
            output_name: "fetch_name_0".to_string(),
            input_height: 48,
            max_width: 320,
            session_config: None,
        }
    }
}

impl CtcRecognizerBuilder {
    /// Creates a new builder with the standard recognition defaults.
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

    /// Sets the fixed input height crops are resized to.
    pub fn input_height(mut self, height: u32) -> Self {
        self.input_height = height;
        self
    }

    /// Sets the width cap of the model input.
    pub fn max_width(mut self, width: u32) -> Self {
        self.max_width = width;
        self
    }

    /// Sets the ONNX Runtime session configuration.
    pub fn session_config(mut self, config: OrtSessionConfig) -> Self {
        self.session_config = Some(config);
        self
    }

    /// Validates the configuration, loads the model and dictionary files,
    /// and builds the recognizer.
    pub fn build(
        self,
        model_path: impl AsRef<Path>,
        charset_path: impl AsRef<Path>,
    ) -> Result<CtcRecognizer, ExtractError> {
        if self.input_height == 0 {
            return Err(ExtractError::config_error_detailed(
                "recognizer input height",
                "must be positive",
            ));
        }
        if self.max_width == 0 {
            return Err(ExtractError::config_error_detailed(
                "recognizer max width",
                "must be positive",
            ));
        }

        let charset = load_charset(charset_path.as_ref())?;

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
            charset_len = charset.len(),
            "loaded recognition model"
        );

        Ok(CtcRecognizer {
            session: Mutex::new(session),
            charset,
            input_name: self.input_name,
            output_name: self.output_name,
            input_height: self.input_height,
            max_width: self.max_width,
            model_path: path.to_path_buf(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn charset_of(entries: &[&str]) -> Vec<String> {
        entries.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_charset_strips_line_endings() {
        let charset = parse_charset("0\r\n1\n \nz\n");
        assert_eq!(charset, charset_of(&["0", "1", " ", "z"]));
    }

    #[test]
    fn test_greedy_decode_collapses_repeats_and_drops_blanks() {
        let charset = charset_of(&["a", "b"]);
        // a, a (repeat), blank, a (re-emitted after blank), b, b (repeat)
        let logits = Array2::from_shape_vec(
            (6, 3),
            vec![
                0.1, 0.8, 0.1, //
                0.1, 0.9, 0.0, //
                0.9, 0.05, 0.05, //
                0.0, 1.0, 0.0, //
                0.0, 0.2, 0.8, //
                0.1, 0.2, 0.7,
            ],
        )
        .unwrap();

        assert_eq!(ctc_greedy_decode(&logits.view(), &charset), "aab");
    }

    #[test]
    fn test_greedy_decode_all_blank_is_empty() {
        let charset = charset_of(&["a"]);
        let logits = Array2::from_shape_vec((3, 2), vec![0.9, 0.1, 0.8, 0.2, 1.0, 0.0]).unwrap();
        assert_eq!(ctc_greedy_decode(&logits.view(), &charset), "");
    }

    #[test]
    fn test_greedy_decode_skips_out_of_charset_classes() {
        let charset = charset_of(&["a"]);
        // class 3 has no charset entry, class 1 does
        let logits =
            Array2::from_shape_vec((2, 4), vec![0.0, 0.1, 0.1, 0.8, 0.0, 0.9, 0.0, 0.1]).unwrap();
        assert_eq!(ctc_greedy_decode(&logits.view(), &charset), "a");
    }

    #[test]
    fn test_crop_to_input_shape_and_padding() {
        let image = RgbImage::from_pixel(96, 48, image::Rgb([255, 255, 255]));
        let input = crop_to_input(&image, 48, 320);

        assert_eq!(input.shape(), &[1, 3, 48, 320]);
        // white content normalizes to +1, padding stays at mid-gray 0
        assert!((input[[0, 0, 0, 0]] - 1.0).abs() < 1e-6);
        assert!(input[[0, 0, 0, 319]].abs() < 1e-6);
    }

    #[test]
    fn test_crop_to_input_caps_width() {
        let image = RgbImage::from_pixel(4000, 40, image::Rgb([0, 0, 0]));
        let input = crop_to_input(&image, 48, 320);

        assert_eq!(input.shape(), &[1, 3, 48, 320]);
        assert!((input[[0, 0, 0, 319]] + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_build_rejects_missing_charset() {
        let result =
            CtcRecognizerBuilder::new().build("model.onnx", "/nonexistent/charset.txt");
        assert!(matches!(result, Err(ExtractError::ModelLoad { .. })));
    }

    #[test]
    fn test_build_rejects_zero_height() {
        let result = CtcRecognizerBuilder::new()
            .input_height(0)
            .build("model.onnx", "charset.txt");
        assert!(matches!(result, Err(ExtractError::ConfigError { .. })));
    }
}

//! Core error types for the extraction pipeline.
//!
//! This module defines the fundamental error types used throughout the ID
//! card extraction system, including the main ExtractError enum and the
//! ExtractionStage enum. Validation failures (wrong corner count, too few
//! fields, degenerate geometry) are ordinary values of the domain, so they
//! get dedicated variants with stable reason codes instead of being folded
//! into generic processing errors.

use thiserror::Error;

/// Enum representing different stages of the extraction pipeline.
///
/// This enum is used to identify which stage of the pipeline an error
/// occurred in, providing context for debugging and error handling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExtractionStage {
    /// Error occurred while running the corner detector.
    CornerDetection,
    /// Error occurred while resolving corner detections into a quad.
    CornerResolution,
    /// Error occurred during perspective rectification.
    Rectification,
    /// Error occurred while running the field detector.
    FieldDetection,
    /// Error occurred while resolving field detections into the layout.
    FieldResolution,
    /// Error occurred while cropping field regions.
    Cropping,
    /// Error occurred while recognizing text in a field crop.
    Recognition,
    /// Error occurred while assembling the final field list.
    Assembly,
}

impl std::fmt::Display for ExtractionStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractionStage::CornerDetection => write!(f, "corner detection"),
            ExtractionStage::CornerResolution => write!(f, "corner resolution"),
            ExtractionStage::Rectification => write!(f, "rectification"),
            ExtractionStage::FieldDetection => write!(f, "field detection"),
            ExtractionStage::FieldResolution => write!(f, "field resolution"),
            ExtractionStage::Cropping => write!(f, "cropping"),
            ExtractionStage::Recognition => write!(f, "recognition"),
            ExtractionStage::Assembly => write!(f, "assembly"),
        }
    }
}

/// Enum representing various errors that can occur during extraction.
///
/// Domain failures (the card did not pass a layout check) carry the counts
/// the check compared so callers can report them precisely; infrastructure
/// failures wrap their underlying sources.
#[derive(Error, Debug)]
pub enum ExtractError {
    /// The corner detector did not find exactly the four distinct corner
    /// classes the card layout requires.
    #[error("corner detection expected {expected} distinct corner classes, found {found}")]
    CornerCountMismatch {
        /// Number of distinct corner classes required.
        expected: usize,
        /// Number of distinct corner classes found.
        found: usize,
    },

    /// The field detector returned fewer boxes than the layout requires.
    #[error("field detection produced {found} boxes, at least {required} required")]
    InsufficientFields {
        /// Minimum number of boxes required.
        required: usize,
        /// Number of boxes the detector produced.
        found: usize,
    },

    /// The field detector saw the optional class but still returned fewer
    /// boxes than the raised minimum.
    #[error(
        "field detection produced {found} boxes, at least {required} required when the optional class is present"
    )]
    InsufficientFieldsWithOptional {
        /// Minimum number of boxes required with the optional class present.
        required: usize,
        /// Number of boxes the detector produced.
        found: usize,
    },

    /// The resolved corner quad cannot describe a physical card.
    #[error("corner geometry is degenerate: {details}")]
    DegenerateGeometry {
        /// What the geometry screen rejected.
        details: String,
    },

    /// Text recognition failed for one field crop.
    #[error("text recognition failed for field {index}: {message}")]
    RecognitionFailure {
        /// Canonical index of the field whose crop failed.
        index: usize,
        /// Description of the underlying failure.
        message: String,
    },

    /// Error occurred while loading an image.
    #[error("image load")]
    ImageLoad(#[source] image::ImageError),

    /// Error occurred during a pipeline stage.
    #[error("{stage} failed: {context}")]
    Processing {
        /// The stage of the pipeline where the error occurred.
        stage: ExtractionStage,
        /// Additional context about the error.
        context: String,
        /// The underlying error that caused this error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Error indicating invalid input.
    #[error("invalid input: {message}")]
    InvalidInput {
        /// A message describing the invalid input.
        message: String,
    },

    /// Error indicating a configuration problem.
    #[error("configuration: {message}")]
    ConfigError {
        /// A message describing the configuration error.
        message: String,
    },

    /// Error loading a model file, with context and suggestions.
    #[error("model load failed for '{model_path}': {reason}{suggestion}")]
    ModelLoad {
        /// Path to the model that failed to load.
        model_path: String,
        /// Short reason string.
        reason: String,
        /// Optional suggestion (prefixed with '; ' when present).
        suggestion: String,
        /// Underlying source error.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Error from the ONNX Runtime session.
    #[error(transparent)]
    Session(#[from] ort::Error),

    /// Error from tensor shape operations.
    #[error("tensor operation")]
    Tensor(#[from] ndarray::ShapeError),

    /// IO error.
    #[error("io")]
    Io(#[from] std::io::Error),
}

impl From<image::ImageError> for ExtractError {
    /// Converts an image::ImageError to ExtractError::ImageLoad.
    fn from(error: image::ImageError) -> Self {
        Self::ImageLoad(error)
    }
}

impl From<crate::core::config::ConfigError> for ExtractError {
    /// Converts a ConfigError to ExtractError::ConfigError.
    fn from(error: crate::core::config::ConfigError) -> Self {
        Self::ConfigError {
            message: error.to_string(),
        }
    }
}

impl ExtractError {
    /// Stable machine-readable code for domain failures.
    ///
    /// Infrastructure errors (IO, session, configuration) have no reason
    /// code; API layers surface them as plain internal errors.
    pub fn reason_code(&self) -> Option<&'static str> {
        match self {
            Self::CornerCountMismatch { .. } => Some("corner-count-mismatch"),
            Self::InsufficientFields { .. } => Some("insufficient-fields"),
            Self::InsufficientFieldsWithOptional { .. } => {
                Some("insufficient-fields-with-optional")
            }
            Self::DegenerateGeometry { .. } => Some("degenerate-geometry"),
            Self::RecognitionFailure { .. } => Some("recognition-failure"),
            _ => None,
        }
    }

    /// True for failures where the image was understood but the card did
    /// not pass a layout check.
    ///
    /// These are expected outcomes for bad photographs, as opposed to
    /// errors in the input transport or the runtime itself.
    pub fn is_validation_failure(&self) -> bool {
        matches!(
            self,
            Self::CornerCountMismatch { .. }
                | Self::InsufficientFields { .. }
                | Self::InsufficientFieldsWithOptional { .. }
                | Self::DegenerateGeometry { .. }
        )
    }

    /// Creates a corner-count validation failure.
    pub fn corner_count_mismatch(expected: usize, found: usize) -> Self {
        Self::CornerCountMismatch { expected, found }
    }

    /// Creates a field-count validation failure.
    pub fn insufficient_fields(required: usize, found: usize) -> Self {
        Self::InsufficientFields { required, found }
    }

    /// Creates a field-count validation failure for the raised minimum that
    /// applies when the optional class was detected.
    pub fn insufficient_fields_with_optional(required: usize, found: usize) -> Self {
        Self::InsufficientFieldsWithOptional { required, found }
    }

    /// Creates a degenerate-geometry validation failure.
    pub fn degenerate_geometry(details: impl Into<String>) -> Self {
        Self::DegenerateGeometry {
            details: details.into(),
        }
    }

    /// Creates a recognition failure for the field at `index`.
    pub fn recognition_failure(index: usize, message: impl Into<String>) -> Self {
        Self::RecognitionFailure {
            index,
            message: message.into(),
        }
    }

    /// Creates a configuration error with enhanced context and details.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// # use idcard_ocr::core::errors::ExtractError;
    /// let err = ExtractError::config_error_detailed(
    ///     "class ordering",
    ///     "class id 11 produced by the detector is not present in the order table"
    /// );
    /// assert!(matches!(err, ExtractError::ConfigError { .. }));
    /// ```
    pub fn config_error_detailed(context: impl Into<String>, details: impl Into<String>) -> Self {
        Self::ConfigError {
            message: format!("{}: {}", context.into(), details.into()),
        }
    }

    /// Creates a configuration error with a suggestion for recovery.
    pub fn config_error_with_suggestion(
        context: impl Into<String>,
        details: impl Into<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::ConfigError {
            message: format!(
                "{}: {}; suggestion: {}",
                context.into(),
                details.into(),
                suggestion.into()
            ),
        }
    }

    /// Wraps an error that occurred in a specific pipeline stage.
    pub fn processing(
        stage: ExtractionStage,
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Processing {
            stage,
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// Creates a model-load error with an optional underlying source.
    pub fn model_load(
        model_path: impl Into<String>,
        reason: impl Into<String>,
        suggestion: Option<&str>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::ModelLoad {
            model_path: model_path.into(),
            reason: reason.into(),
            suggestion: suggestion.map(|s| format!("; {s}")).unwrap_or_default(),
            source,
        }
    }
}

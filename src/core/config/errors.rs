//! Configuration errors and the validation trait.

use std::path::Path;
use thiserror::Error;

/// Errors that can occur during configuration validation.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Error indicating that a model path does not exist.
    #[error("model path does not exist: {path}")]
    ModelPathNotFound {
        /// The path that was checked.
        path: std::path::PathBuf,
    },

    /// Error indicating that a configuration is structurally invalid.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// A message describing the problem.
        message: String,
    },

    /// Error indicating that a configured value is out of range.
    #[error("validation failed: {message}")]
    ValidationFailed {
        /// A message describing the out-of-range value.
        message: String,
    },
}

/// A trait for validating configuration parameters.
///
/// Configurations are plain data that can be deserialized from anywhere;
/// `validate` is called once when the pipeline is built, so invalid setups
/// fail at startup instead of mid-request.
pub trait ConfigValidator {
    /// Validates the configuration.
    fn validate(&self) -> Result<(), ConfigError>;

    /// Returns the recommended default configuration.
    fn get_defaults() -> Self
    where
        Self: Sized;

    /// Validates that a model path exists and is a file.
    fn validate_model_path(&self, path: &Path) -> Result<(), ConfigError> {
        if !path.exists() {
            Err(ConfigError::ModelPathNotFound {
                path: path.to_path_buf(),
            })
        } else if !path.is_file() {
            Err(ConfigError::InvalidConfig {
                message: format!("model path is not a file: {}", path.display()),
            })
        } else {
            Ok(())
        }
    }

    /// Validates that a threshold lies in `(0, 1]`.
    fn validate_unit_threshold(&self, name: &str, value: f32) -> Result<(), ConfigError> {
        if value > 0.0 && value <= 1.0 {
            Ok(())
        } else {
            Err(ConfigError::ValidationFailed {
                message: format!("{name} must be in (0, 1], got {value}"),
            })
        }
    }

    /// Validates that a dimension-like value is finite and strictly positive.
    fn validate_positive(&self, name: &str, value: f32) -> Result<(), ConfigError> {
        if value.is_finite() && value > 0.0 {
            Ok(())
        } else {
            Err(ConfigError::ValidationFailed {
                message: format!("{name} must be a positive finite number, got {value}"),
            })
        }
    }
}

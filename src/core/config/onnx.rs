//! ONNX Runtime session configuration.

use ort::execution_providers::ExecutionProviderDispatch;
use ort::session::builder::{GraphOptimizationLevel, SessionBuilder};
use serde::{Deserialize, Serialize};

/// Graph optimization levels for ONNX Runtime.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub enum OrtGraphOptimizationLevel {
    /// Disable all optimizations.
    DisableAll,
    /// Enable basic optimizations.
    #[default]
    Level1,
    /// Enable extended optimizations.
    Level2,
    /// Enable all optimizations.
    Level3,
    /// Enable all optimizations (alias for Level3).
    All,
}

/// Execution providers for ONNX Runtime.
///
/// Only the providers this crate actually ships against are listed;
/// requesting CUDA without the `cuda` feature is a session error at build
/// time, not a silent CPU fallback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum OrtExecutionProvider {
    /// CPU execution provider (always available).
    #[default]
    CPU,
    /// NVIDIA CUDA execution provider.
    CUDA {
        /// CUDA device ID (default: 0).
        device_id: Option<i32>,
    },
}

/// Configuration for ONNX Runtime sessions.
///
/// One instance is shared by all three model sessions of a pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrtSessionConfig {
    /// Number of threads used to parallelize execution within nodes.
    pub intra_threads: Option<usize>,
    /// Number of threads used to parallelize execution across nodes.
    pub inter_threads: Option<usize>,
    /// Graph optimization level.
    pub optimization_level: Option<OrtGraphOptimizationLevel>,
    /// Execution providers in order of preference.
    pub execution_providers: Option<Vec<OrtExecutionProvider>>,
}

impl OrtSessionConfig {
    /// Creates a new OrtSessionConfig with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of intra-op threads.
    pub fn with_intra_threads(mut self, threads: usize) -> Self {
        self.intra_threads = Some(threads);
        self
    }

    /// Sets the number of inter-op threads.
    pub fn with_inter_threads(mut self, threads: usize) -> Self {
        self.inter_threads = Some(threads);
        self
    }

    /// Sets the graph optimization level.
    pub fn with_optimization_level(mut self, level: OrtGraphOptimizationLevel) -> Self {
        self.optimization_level = Some(level);
        self
    }

    /// Sets the execution providers.
    pub fn with_execution_providers(mut self, providers: Vec<OrtExecutionProvider>) -> Self {
        self.execution_providers = Some(providers);
        self
    }

    /// Adds a single execution provider.
    pub fn add_execution_provider(mut self, provider: OrtExecutionProvider) -> Self {
        if let Some(ref mut providers) = self.execution_providers {
            providers.push(provider);
        } else {
            self.execution_providers = Some(vec![provider]);
        }
        self
    }

    /// Applies this configuration to an ONNX Runtime session builder.
    ///
    /// # Errors
    ///
    /// Returns the runtime's error for invalid settings, or when a provider
    /// is requested whose cargo feature is not compiled in.
    pub fn apply(&self, mut builder: SessionBuilder) -> Result<SessionBuilder, ort::Error> {
        if let Some(intra) = self.intra_threads {
            builder = builder.with_intra_threads(intra)?;
        }
        if let Some(inter) = self.inter_threads {
            builder = builder.with_inter_threads(inter)?;
        }
        if let Some(level) = self.optimization_level {
            let mapped = match level {
                OrtGraphOptimizationLevel::DisableAll => GraphOptimizationLevel::Disable,
                OrtGraphOptimizationLevel::Level1 => GraphOptimizationLevel::Level1,
                OrtGraphOptimizationLevel::Level2 => GraphOptimizationLevel::Level2,
                // upstream treats All as an alias for its highest level
                OrtGraphOptimizationLevel::Level3 | OrtGraphOptimizationLevel::All => {
                    GraphOptimizationLevel::Level3
                }
            };
            builder = builder.with_optimization_level(mapped)?;
        }
        if let Some(eps) = &self.execution_providers {
            let providers = build_execution_providers(eps)?;
            if !providers.is_empty() {
                builder = builder.with_execution_providers(providers)?;
            }
        }
        Ok(builder)
    }
}

fn build_execution_providers(
    eps: &[OrtExecutionProvider],
) -> Result<Vec<ExecutionProviderDispatch>, ort::Error> {
    let mut providers = Vec::new();

    for ep in eps {
        match ep {
            OrtExecutionProvider::CPU => {
                providers.push(ort::execution_providers::CPUExecutionProvider::default().build());
            }
            #[cfg(feature = "cuda")]
            OrtExecutionProvider::CUDA { device_id } => {
                let mut cuda_provider = ort::execution_providers::CUDAExecutionProvider::default();
                if let Some(id) = device_id {
                    cuda_provider = cuda_provider.with_device_id(*id);
                }
                providers.push(cuda_provider.build());
            }
            #[cfg(not(feature = "cuda"))]
            OrtExecutionProvider::CUDA { .. } => {
                return Err(ort::Error::new(
                    "CUDA execution provider requested but cuda feature is not enabled",
                ));
            }
        }
    }

    Ok(providers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ort_session_config_builder() {
        let config = OrtSessionConfig::new()
            .with_intra_threads(4)
            .with_inter_threads(2)
            .with_optimization_level(OrtGraphOptimizationLevel::Level2)
            .add_execution_provider(OrtExecutionProvider::CPU);

        assert_eq!(config.intra_threads, Some(4));
        assert_eq!(config.inter_threads, Some(2));
        assert!(matches!(
            config.optimization_level,
            Some(OrtGraphOptimizationLevel::Level2)
        ));
        assert_eq!(
            config.execution_providers,
            Some(vec![OrtExecutionProvider::CPU])
        );
    }

    #[test]
    fn test_add_execution_provider_appends() {
        let config = OrtSessionConfig::new()
            .add_execution_provider(OrtExecutionProvider::CUDA { device_id: Some(1) })
            .add_execution_provider(OrtExecutionProvider::CPU);

        let providers = config.execution_providers.unwrap();
        assert_eq!(providers.len(), 2);
        assert!(matches!(
            providers[0],
            OrtExecutionProvider::CUDA { device_id: Some(1) }
        ));
    }
}

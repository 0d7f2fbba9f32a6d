//! Image-level helpers shared across the extraction pipeline.
//!
//! Perspective rectification, field cropping and logging setup live here;
//! detection post-processing stays under [`crate::processors`].

pub mod crop;
pub mod transform;

pub use crop::crop_field;
pub use transform::rectify_document;

/// Initializes the tracing subscriber for logging.
///
/// Installs an environment-filtered fmt subscriber. Call once at process
/// start; filtering follows `RUST_LOG`.
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();
}

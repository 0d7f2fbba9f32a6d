//! Detection models.
//!
//! Both pipeline stages that locate regions (card corners, layout fields)
//! run the same YOLO-family wrapper with different weights and thresholds.

pub mod yolo;

pub use yolo::{
    LetterboxMapping, YoloDetector, YoloDetectorBuilder, decode_predictions, image_to_input,
    letterbox_mapping,
};

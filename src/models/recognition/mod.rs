//! Text recognition models.

pub mod ctc;

pub use ctc::{
    CtcRecognizer, CtcRecognizerBuilder, crop_to_input, ctc_greedy_decode, load_charset,
    parse_charset,
};

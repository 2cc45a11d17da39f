//! Text cleanup shared by the native and OCR extraction paths.

mod confusables;
mod normalize;
mod patterns;

pub use confusables::correct_confusables;
pub use normalize::{char_len, count_words, normalize};

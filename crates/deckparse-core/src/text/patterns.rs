//! Regex patterns for text cleanup.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // C0/C1 controls and invisible format characters. Whitespace controls
    // (tab, newlines, VT, FF, NEL) are left for the whitespace pass.
    pub static ref CONTROL_CHARS: Regex = Regex::new(
        r"[\x00-\x08\x0E-\x1F\x7F-\x84\x86-\x9F\u{200B}-\u{200D}\u{2060}\u{FEFF}]"
    ).unwrap();

    pub static ref DOUBLE_QUOTES: Regex = Regex::new(
        r"[\u{201C}\u{201D}\u{201E}\u{201F}\u{2033}\u{00AB}\u{00BB}]"
    ).unwrap();

    pub static ref SINGLE_QUOTES: Regex = Regex::new(
        r"[\u{2018}\u{2019}\u{201A}\u{201B}\u{2032}]"
    ).unwrap();

    pub static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();

    pub static ref SPACE_BEFORE_PUNCT: Regex = Regex::new(r"\s+([,.!?;:])").unwrap();

    pub static ref SPACE_AFTER_PUNCT: Regex = Regex::new(r"([,.!?;:])\s+").unwrap();
}

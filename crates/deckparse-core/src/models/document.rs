//! Parsed document data model.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::pdf::parse_pdf_date;

/// Result of parsing one PDF: every page plus the joined text and statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedDocument {
    /// Full text: page texts joined with `--- Page N ---` markers.
    pub text: String,

    /// Number of pages in the source PDF.
    pub page_count: u32,

    /// Per-page results, ordered by page number starting at 1.
    pub pages: Vec<PageResult>,

    /// Document information dictionary.
    pub metadata: DocumentMetadata,

    /// Aggregated statistics.
    pub extraction_stats: ExtractionStats,

    /// Document-level problems that did not stop the parse.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl ParsedDocument {
    /// Look up a page by its 1-based number.
    pub fn page(&self, number: u32) -> Option<&PageResult> {
        number
            .checked_sub(1)
            .and_then(|idx| self.pages.get(idx as usize))
    }

    /// Pages whose text contains `needle`, case-insensitively.
    pub fn search(&self, needle: &str) -> Vec<&PageResult> {
        let needle = needle.to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }
        self.pages
            .iter()
            .filter(|p| p.text.to_lowercase().contains(&needle))
            .collect()
    }

    /// Pages that hit a non-fatal failure.
    pub fn degraded_pages(&self) -> impl Iterator<Item = &PageResult> {
        self.pages.iter().filter(|p| p.degraded)
    }

    /// Method that produced most of the text, for coarse bookkeeping.
    pub fn dominant_method(&self) -> ExtractionMethod {
        if self.extraction_stats.pages_with_ocr > self.extraction_stats.pages_with_text {
            ExtractionMethod::Ocr
        } else {
            ExtractionMethod::Text
        }
    }
}

/// Text of a single page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResult {
    /// Page number (1-indexed).
    pub page_number: u32,

    /// Normalized page text.
    pub text: String,

    /// Where the text came from.
    pub extraction_method: ExtractionMethod,

    /// Number of whitespace-separated words in `text`.
    pub word_count: usize,

    /// The OCR path failed and the page fell back to its text layer.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub degraded: bool,

    /// What went wrong on a degraded page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Source of a page's final text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMethod {
    /// Native PDF text layer.
    #[default]
    Text,
    /// Optical character recognition of the rendered page.
    Ocr,
}

impl ExtractionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Ocr => "ocr",
        }
    }
}

impl std::fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fields of the PDF document information dictionary.
///
/// Every field is optional; missing entries are omitted when serialized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub producer: Option<String>,

    /// Raw PDF date string, e.g. `D:20240131120000+01'00'`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_date: Option<String>,

    /// Raw PDF date string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modification_date: Option<String>,
}

impl DocumentMetadata {
    /// True when no field is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// `creation_date` parsed as a timestamp.
    pub fn creation_datetime(&self) -> Option<DateTime<FixedOffset>> {
        self.creation_date.as_deref().and_then(parse_pdf_date)
    }

    /// `modification_date` parsed as a timestamp.
    pub fn modification_datetime(&self) -> Option<DateTime<FixedOffset>> {
        self.modification_date.as_deref().and_then(parse_pdf_date)
    }
}

/// Counters computed over all pages of a parse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionStats {
    /// Characters across all page texts.
    pub total_characters: usize,

    /// Sum of page word counts.
    pub total_words: usize,

    /// Pages whose non-empty text came from the text layer.
    pub pages_with_text: u32,

    /// Pages whose text came from OCR.
    #[serde(rename = "pagesWithOCR")]
    pub pages_with_ocr: u32,

    /// Wall-clock time of the parse call.
    pub processing_time_ms: u64,
}

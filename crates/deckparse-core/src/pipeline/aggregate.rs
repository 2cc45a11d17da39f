//! Joins page results into a [`ParsedDocument`].

use std::time::Instant;

use crate::models::document::{
    DocumentMetadata, ExtractionMethod, ExtractionStats, PageResult, ParsedDocument,
};
use crate::text::char_len;

/// Marker line placed before each page's text in the joined document text.
pub fn page_marker(page_number: u32) -> String {
    format!("--- Page {} ---", page_number)
}

/// Join page texts in order, each preceded by its marker. Empty pages are skipped.
pub fn join_pages(pages: &[PageResult]) -> String {
    pages
        .iter()
        .filter(|p| !p.text.is_empty())
        .map(|p| format!("{}\n{}", page_marker(p.page_number), p.text))
        .collect::<Vec<_>>()
        .join("\n\n")
        .trim()
        .to_string()
}

/// Count characters, words and extraction methods across pages.
pub fn compute_stats(pages: &[PageResult], processing_time_ms: u64) -> ExtractionStats {
    let mut stats = ExtractionStats {
        processing_time_ms,
        ..ExtractionStats::default()
    };

    for page in pages {
        stats.total_characters += char_len(&page.text);
        stats.total_words += page.word_count;
        match page.extraction_method {
            ExtractionMethod::Ocr => stats.pages_with_ocr += 1,
            ExtractionMethod::Text if !page.text.is_empty() => stats.pages_with_text += 1,
            ExtractionMethod::Text => {}
        }
    }

    stats
}

/// Build the final document. `started` is when the parse call began.
pub(crate) fn assemble(
    pages: Vec<PageResult>,
    metadata: DocumentMetadata,
    warnings: Vec<String>,
    started: Instant,
) -> ParsedDocument {
    let processing_time_ms = started.elapsed().as_millis() as u64;
    let extraction_stats = compute_stats(&pages, processing_time_ms);

    ParsedDocument {
        text: join_pages(&pages),
        page_count: pages.len() as u32,
        pages,
        metadata,
        extraction_stats,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn page(number: u32, text: &str, method: ExtractionMethod) -> PageResult {
        PageResult {
            page_number: number,
            text: text.to_string(),
            extraction_method: method,
            word_count: text.split_whitespace().count(),
            degraded: false,
            warning: None,
        }
    }

    #[test]
    fn test_join_pages_with_markers() {
        let pages = vec![
            page(1, "Acme Robotics", ExtractionMethod::Text),
            page(2, "", ExtractionMethod::Text),
            page(3, "Market size $4B", ExtractionMethod::Ocr),
        ];
        assert_eq!(
            join_pages(&pages),
            "--- Page 1 ---\nAcme Robotics\n\n--- Page 3 ---\nMarket size $4B"
        );
    }

    #[test]
    fn test_join_pages_all_empty() {
        let pages = vec![page(1, "", ExtractionMethod::Text)];
        assert_eq!(join_pages(&pages), "");
    }

    #[test]
    fn test_stats_sum_pages() {
        let pages = vec![
            page(1, "Our team", ExtractionMethod::Text),
            page(2, "", ExtractionMethod::Text),
            page(3, "Traction: 40 pilots", ExtractionMethod::Ocr),
        ];
        let stats = compute_stats(&pages, 42);

        assert_eq!(stats.total_words, 5);
        assert_eq!(stats.total_characters, 8 + 19);
        assert_eq!(stats.pages_with_text, 1);
        assert_eq!(stats.pages_with_ocr, 1);
        assert_eq!(stats.processing_time_ms, 42);
        assert!(stats.pages_with_text + stats.pages_with_ocr <= pages.len() as u32);
    }

    #[test]
    fn test_assemble_counts_pages() {
        let pages = vec![
            page(1, "Problem", ExtractionMethod::Text),
            page(2, "Solution", ExtractionMethod::Text),
        ];
        let doc = assemble(pages, DocumentMetadata::default(), Vec::new(), Instant::now());
        assert_eq!(doc.page_count, 2);
        assert_eq!(doc.pages.len(), 2);
        assert!(doc.text.starts_with("--- Page 1 ---\nProblem"));
        assert!(doc.warnings.is_empty());
    }
}

//! PDF loading and native text-layer extraction using lopdf and pdf-extract.

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::OnceLock;

use lopdf::content::Content;
use lopdf::{Document, Encoding, Object, ObjectId};
use tracing::{debug, trace, warn};

use super::Result;
use super::metadata;
use crate::error::PdfError;
use crate::models::document::DocumentMetadata;

/// A loaded, decrypted PDF with its page tree resolved.
pub struct PdfDocument {
    document: Document,
    raw_data: Vec<u8>,
    page_ids: Vec<ObjectId>,
    /// Per-page text from pdf-extract, computed once on first lopdf failure.
    fallback_pages: OnceLock<Option<Vec<String>>>,
}

impl PdfDocument {
    /// Open a PDF from bytes.
    ///
    /// Fails when the bytes are not a PDF, when the document is encrypted with
    /// a non-empty password, or when it has no pages.
    pub fn load(data: &[u8]) -> Result<Self> {
        let mut doc = Document::load_mem(data).map_err(|e| PdfError::Parse(e.to_string()))?;

        let raw_data = if doc.is_encrypted() {
            if doc.decrypt("").is_err() {
                return Err(PdfError::Encrypted);
            }
            debug!("Decrypted PDF with empty password");

            // pdf-extract re-parses the bytes, so hand it the decrypted copy
            let mut decrypted = Vec::new();
            doc.save_to(&mut decrypted)
                .map_err(|e| PdfError::Parse(format!("failed to save decrypted PDF: {}", e)))?;
            decrypted
        } else {
            data.to_vec()
        };

        // get_pages is keyed by page number, so values come out in page order
        let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
        if page_ids.is_empty() {
            return Err(PdfError::NoPages);
        }

        debug!("Loaded PDF with {} pages", page_ids.len());

        Ok(Self {
            document: doc,
            raw_data,
            page_ids,
            fallback_pages: OnceLock::new(),
        })
    }

    /// Number of pages.
    pub fn page_count(&self) -> u32 {
        self.page_ids.len() as u32
    }

    /// Object id of a 1-indexed page.
    pub fn page_id(&self, page: u32) -> Result<ObjectId> {
        page.checked_sub(1)
            .and_then(|idx| self.page_ids.get(idx as usize))
            .copied()
            .ok_or(PdfError::InvalidPage(page))
    }

    /// The underlying lopdf document.
    pub fn inner(&self) -> &Document {
        &self.document
    }

    /// The PDF bytes, decrypted when the input was encrypted.
    pub fn raw_data(&self) -> &[u8] {
        &self.raw_data
    }

    /// Read the document information dictionary.
    pub fn metadata(&self) -> Result<DocumentMetadata> {
        metadata::read_info(&self.document)
    }

    /// Read the metadata, degrading to an empty value on any failure.
    pub fn metadata_or_default(&self) -> DocumentMetadata {
        match self.metadata() {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!("Could not read PDF metadata: {}", e);
                DocumentMetadata::default()
            }
        }
    }

    /// Extract the native text layer of a page.
    ///
    /// Text runs are joined with single spaces and the result is trimmed.
    pub fn native_text(&self, page: u32) -> Result<String> {
        let page_id = self.page_id(page)?;

        let raw = match text_runs(&self.document, page_id) {
            Ok(runs) => runs.join(" "),
            Err(e) => {
                debug!("lopdf text extraction failed on page {}: {}, trying pdf-extract", page, e);
                self.fallback_page_text(page).ok_or_else(|| {
                    PdfError::TextExtraction(format!("page {}: {}", page, e))
                })?
            }
        };

        let joined = join_runs(&raw);
        trace!("Page {} text layer: {} chars", page, joined.chars().count());
        Ok(joined)
    }

    fn fallback_page_text(&self, page: u32) -> Option<String> {
        let pages = self.fallback_pages.get_or_init(|| {
            let data = &self.raw_data;
            match panic::catch_unwind(AssertUnwindSafe(|| {
                pdf_extract::extract_text_from_mem_by_pages(data)
            })) {
                Ok(Ok(pages)) => Some(pages),
                Ok(Err(e)) => {
                    debug!("pdf-extract failed: {}", e);
                    None
                }
                Err(_) => {
                    warn!("pdf-extract panicked while reading the text layer");
                    None
                }
            }
        });

        pages
            .as_ref()
            .and_then(|pages| pages.get(page as usize - 1))
            .cloned()
    }
}

/// Decode every text-showing operator of a page into its own run.
///
/// Fails when text is drawn with a font whose encoding lopdf cannot resolve.
fn text_runs(doc: &Document, page_id: ObjectId) -> std::result::Result<Vec<String>, String> {
    let encodings: BTreeMap<Vec<u8>, Encoding> = doc
        .get_page_fonts(page_id)
        .map_err(|e| e.to_string())?
        .into_iter()
        .filter_map(|(name, font)| match font.get_font_encoding(doc) {
            Ok(encoding) => Some((name, encoding)),
            Err(e) => {
                trace!("Font {} has no usable encoding: {}", String::from_utf8_lossy(&name), e);
                None
            }
        })
        .collect();
    let content = doc
        .get_page_content(page_id)
        .and_then(|data| Content::decode(&data))
        .map_err(|e| e.to_string())?;

    let mut encoding = None;
    let mut runs = Vec::new();
    for op in &content.operations {
        match op.operator.as_str() {
            "Tf" => {
                encoding = op
                    .operands
                    .first()
                    .and_then(|o| o.as_name().ok())
                    .and_then(|name| encodings.get(name));
            }
            "Tj" | "TJ" | "'" | "\"" => {
                let Some(encoding) = encoding else {
                    return Err(format!("no usable encoding for text drawn by {}", op.operator));
                };
                let mut run = String::new();
                collect_run(&mut run, encoding, &op.operands).map_err(|e| e.to_string())?;
                runs.push(run);
            }
            _ => {}
        }
    }
    Ok(runs)
}

fn collect_run(run: &mut String, encoding: &Encoding, operands: &[Object]) -> lopdf::Result<()> {
    for operand in operands {
        match operand {
            Object::String(bytes, _) => run.push_str(&Document::decode_text(encoding, bytes)?),
            Object::Array(items) => collect_run(run, encoding, items)?,
            // Large negative kerning inside TJ is a word gap
            Object::Integer(i) if *i < -100 => run.push(' '),
            Object::Real(r) if *r < -100.0 => run.push(' '),
            _ => {}
        }
    }
    Ok(())
}

/// Collapse whitespace between runs to single spaces and trim.
fn join_runs(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Look up a page attribute, following `/Parent` links for inheritable keys.
pub(crate) fn inherited_attribute<'a>(
    doc: &'a Document,
    page_id: ObjectId,
    key: &[u8],
) -> Option<&'a Object> {
    let mut node_id = page_id;
    // Bounded walk guards against cyclic page trees
    for _ in 0..32 {
        let Ok(Object::Dictionary(dict)) = doc.get_object(node_id) else {
            return None;
        };
        if let Ok(value) = dict.get(key) {
            return doc.dereference(value).ok().map(|(_, obj)| obj);
        }
        match dict.get(b"Parent") {
            Ok(Object::Reference(parent_id)) => node_id = *parent_id,
            _ => return None,
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{PdfFixture, PageSpec};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_load_rejects_garbage() {
        let err = PdfDocument::load(b"definitely not a pdf").err().unwrap();
        assert!(matches!(err, PdfError::Parse(_)));
    }

    #[test]
    fn test_load_counts_pages() {
        let bytes = PdfFixture::new()
            .page(PageSpec::text("Problem statement for founders"))
            .page(PageSpec::blank())
            .page(PageSpec::text("Solution"))
            .build();
        let doc = PdfDocument::load(&bytes).unwrap();
        assert_eq!(doc.page_count(), 3);
        assert!(doc.page_id(3).is_ok());
        assert!(matches!(doc.page_id(0), Err(PdfError::InvalidPage(0))));
        assert!(matches!(doc.page_id(4), Err(PdfError::InvalidPage(4))));
    }

    #[test]
    fn test_native_text_reads_text_layer() {
        let bytes = PdfFixture::new()
            .page(PageSpec::text("Hello Investors"))
            .page(PageSpec::blank())
            .build();
        let doc = PdfDocument::load(&bytes).unwrap();
        assert!(doc.native_text(1).unwrap().contains("Hello Investors"));
        assert_eq!(doc.native_text(2).unwrap(), "");
    }

    #[test]
    fn test_native_text_rejects_out_of_range_page() {
        let bytes = PdfFixture::new().page(PageSpec::blank()).build();
        let doc = PdfDocument::load(&bytes).unwrap();
        assert!(matches!(doc.native_text(2), Err(PdfError::InvalidPage(2))));
    }

    #[test]
    fn test_separate_runs_are_joined_with_spaces() {
        let bytes = PdfFixture::new()
            .page(PageSpec::runs(&["Seed", "Round", "closing Q3"]))
            .build();
        let doc = PdfDocument::load(&bytes).unwrap();
        assert_eq!(doc.native_text(1).unwrap(), "Seed Round closing Q3");
    }

    #[test]
    fn test_join_runs_uses_single_spaces() {
        assert_eq!(join_runs("  Seed round \n\n  $2M  \n"), "Seed round $2M");
        assert_eq!(join_runs("\n \n"), "");
    }

    #[test]
    fn test_missing_metadata_degrades_to_default() {
        let bytes = PdfFixture::new().page(PageSpec::blank()).build();
        let doc = PdfDocument::load(&bytes).unwrap();
        assert!(doc.metadata_or_default().is_empty());
    }
}

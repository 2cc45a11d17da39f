//! Document information dictionary and PDF date strings.

use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone};
use lopdf::{Dictionary, Document, Object};
use tracing::trace;

use crate::error::PdfError;
use crate::models::document::DocumentMetadata;

/// Read the `/Info` dictionary referenced from the trailer.
///
/// A document without `/Info` yields empty metadata; a malformed one is an error
/// so the caller can decide how to degrade.
pub(crate) fn read_info(doc: &Document) -> Result<DocumentMetadata, PdfError> {
    let Ok(info) = doc.trailer.get(b"Info") else {
        trace!("PDF has no Info dictionary");
        return Ok(DocumentMetadata::default());
    };

    let dict = match doc.dereference(info) {
        Ok((_, Object::Dictionary(dict))) => dict,
        Ok(_) => return Err(PdfError::Metadata("Info is not a dictionary".to_string())),
        Err(e) => return Err(PdfError::Metadata(e.to_string())),
    };

    Ok(DocumentMetadata {
        title: text_entry(doc, dict, b"Title"),
        author: text_entry(doc, dict, b"Author"),
        subject: text_entry(doc, dict, b"Subject"),
        creator: text_entry(doc, dict, b"Creator"),
        producer: text_entry(doc, dict, b"Producer"),
        creation_date: text_entry(doc, dict, b"CreationDate"),
        modification_date: text_entry(doc, dict, b"ModDate"),
    })
}

fn text_entry(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<String> {
    let value = dict.get(key).ok()?;
    let (_, value) = doc.dereference(value).ok()?;
    let bytes = match value {
        Object::String(bytes, _) => bytes.as_slice(),
        Object::Name(name) => name.as_slice(),
        _ => return None,
    };

    let text = decode_text_string(bytes);
    let text = text.trim_matches(|c: char| c.is_whitespace() || c == '\0');
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

/// Decode a PDF text string: UTF-16BE or UTF-8 with a byte order mark,
/// otherwise UTF-8 when valid and Latin-1 as a last resort.
pub fn decode_text_string(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    if let Some(rest) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8_lossy(rest).into_owned();
    }
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

/// Parse a PDF date string (`D:YYYYMMDDHHmmSSOHH'mm'`).
///
/// Everything after the year is optional. A missing offset is read as UTC.
pub fn parse_pdf_date(raw: &str) -> Option<DateTime<FixedOffset>> {
    let s = raw.trim();
    let s = s.strip_prefix("D:").unwrap_or(s);

    let digits_end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (digits, zone) = s.split_at(digits_end);
    if digits.len() < 4 || digits.len() % 2 != 0 || digits.len() > 14 {
        return None;
    }

    let field = |start: usize, default: u32| -> Option<u32> {
        match digits.get(start..start + 2) {
            Some(part) => part.parse().ok(),
            None => Some(default),
        }
    };

    let year: i32 = digits[0..4].parse().ok()?;
    let naive = NaiveDate::from_ymd_opt(year, field(4, 1)?, field(6, 1)?)?
        .and_hms_opt(field(8, 0)?, field(10, 0)?, field(12, 0)?)?;

    let offset = parse_offset(zone)?;
    offset.from_local_datetime(&naive).single()
}

fn parse_offset(zone: &str) -> Option<FixedOffset> {
    let mut chars = zone.chars();
    let sign = match chars.next() {
        None | Some('Z') => return FixedOffset::east_opt(0),
        Some('+') => 1,
        Some('-') => -1,
        Some(_) => return None,
    };

    let rest: String = chars.filter(|c| c.is_ascii_digit()).collect();
    let hours: i32 = rest.get(0..2)?.parse().ok()?;
    let minutes: i32 = rest.get(2..4).and_then(|m| m.parse().ok()).unwrap_or(0);
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::PdfDocument;
    use crate::testing::{PageSpec, PdfFixture};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_reads_info_dictionary() {
        let bytes = PdfFixture::new()
            .page(PageSpec::blank())
            .info("Title", Object::string_literal("Acme Seed Deck"))
            .info("Author", Object::string_literal("Jane Founder"))
            .info("CreationDate", Object::string_literal("D:20240301093000+01'00'"))
            .build();
        let doc = PdfDocument::load(&bytes).unwrap();
        let metadata = doc.metadata().unwrap();

        assert_eq!(metadata.title.as_deref(), Some("Acme Seed Deck"));
        assert_eq!(metadata.author.as_deref(), Some("Jane Founder"));
        assert_eq!(metadata.subject, None);
        assert_eq!(
            metadata.creation_datetime().unwrap().to_rfc3339(),
            "2024-03-01T09:30:00+01:00"
        );
    }

    #[test]
    fn test_non_dictionary_info_is_an_error() {
        let bytes = PdfFixture::new().page(PageSpec::blank()).build();
        let mut doc = lopdf::Document::load_mem(&bytes).unwrap();
        doc.trailer.set("Info", Object::Integer(7));
        assert!(matches!(read_info(&doc), Err(PdfError::Metadata(_))));
    }

    #[test]
    fn test_blank_entries_are_omitted() {
        let bytes = PdfFixture::new()
            .page(PageSpec::blank())
            .info("Title", Object::string_literal("   "))
            .build();
        let doc = PdfDocument::load(&bytes).unwrap();
        assert!(doc.metadata().unwrap().is_empty());
    }

    #[test]
    fn test_decode_utf16_text_string() {
        let bytes = [0xFE, 0xFF, 0x00, 0x44, 0x00, 0xE9, 0x00, 0x6B];
        assert_eq!(decode_text_string(&bytes), "Dék");
    }

    #[test]
    fn test_decode_latin1_fallback() {
        assert_eq!(decode_text_string(&[0x43, 0x61, 0x66, 0xE9]), "Café");
    }

    #[test]
    fn test_parse_pdf_date_variants() {
        assert_eq!(
            parse_pdf_date("D:2023").unwrap().to_rfc3339(),
            "2023-01-01T00:00:00+00:00"
        );
        assert_eq!(
            parse_pdf_date("D:20231224183000-05'00'").unwrap().to_rfc3339(),
            "2023-12-24T18:30:00-05:00"
        );
        assert_eq!(
            parse_pdf_date("20231224").unwrap().to_rfc3339(),
            "2023-12-24T00:00:00+00:00"
        );
        assert!(parse_pdf_date("D:20231345").is_none());
        assert!(parse_pdf_date("yesterday").is_none());
    }
}

//! Page-aware text extraction for uploaded documents

use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::types::{FileType, PageText, ParsedDocument};

/// Page separator recognised in plain-text uploads
const FORM_FEED: char = '\u{000C}';

/// Replace glyphs that PDF text extraction commonly leaves behind
fn cleanup_pdf_text(text: &str) -> String {
    text.replace('\0', "")
        .replace('\u{00A0}', " ") // Non-breaking space
        .replace('\u{00AD}', "") // Soft hyphen
        .replace('\u{FB00}', "ff")
        .replace('\u{FB01}', "fi")
        .replace('\u{FB02}', "fl")
        .replace('\u{FB03}', "ffi")
        .replace('\u{FB04}', "ffl")
}

/// Turns uploaded bytes into ordered page texts
pub struct DocumentParser;

impl DocumentParser {
    /// Parse a file based on its extension
    pub fn parse(filename: &str, data: &[u8]) -> Result<ParsedDocument> {
        let file_type = FileType::from_filename(filename);

        let pages = match file_type {
            FileType::Pdf => Self::parse_pdf(filename, data)?,
            FileType::Txt | FileType::Markdown => Self::parse_text(data),
            FileType::Unknown => {
                return Err(Error::document_parse(
                    filename,
                    "unsupported file type (expected .pdf, .txt or .md)",
                ))
            }
        };

        Ok(ParsedDocument {
            file_type,
            pages,
            content_hash: hash_bytes(data),
        })
    }

    /// Extract PDF text page by page
    fn parse_pdf(filename: &str, data: &[u8]) -> Result<Vec<PageText>> {
        // pdf-extract panics on some malformed font tables
        let extracted = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem_by_pages(data));

        let pages = match extracted {
            Ok(Ok(pages)) => pages,
            Ok(Err(e)) => {
                tracing::warn!("pdf-extract failed on {}: {}, trying lopdf", filename, e);
                Self::extract_pdf_pages_fallback(filename, data)?
            }
            Err(_) => {
                tracing::warn!("pdf-extract panicked on {}, trying lopdf", filename);
                Self::extract_pdf_pages_fallback(filename, data)?
            }
        };

        Ok(pages
            .iter()
            .enumerate()
            .map(|(i, text)| PageText {
                page: i as u32 + 1,
                text: cleanup_pdf_text(text),
            })
            .collect())
    }

    /// Fallback PDF text extraction using lopdf directly
    fn extract_pdf_pages_fallback(filename: &str, data: &[u8]) -> Result<Vec<String>> {
        let doc = lopdf::Document::load_mem(data)
            .map_err(|e| Error::document_parse(filename, format!("Failed to load PDF: {}", e)))?;

        if doc.is_encrypted() {
            return Err(Error::document_parse(filename, "PDF is encrypted"));
        }

        let page_numbers: Vec<u32> = doc.get_pages().keys().copied().collect();
        let mut pages = Vec::with_capacity(page_numbers.len());

        for page_num in page_numbers {
            match doc.extract_text(&[page_num]) {
                Ok(text) => pages.push(text),
                Err(e) => {
                    // Keep numbering aligned with the physical pages
                    tracing::debug!("Could not extract page {} of {}: {}", page_num, filename, e);
                    pages.push(String::new());
                }
            }
        }

        Ok(pages)
    }

    /// Plain text or markdown; form feeds separate pages
    fn parse_text(data: &[u8]) -> Vec<PageText> {
        let content = String::from_utf8_lossy(data);

        content
            .split(FORM_FEED)
            .enumerate()
            .map(|(i, text)| PageText {
                page: i as u32 + 1,
                text: text.to_string(),
            })
            .collect()
    }
}

/// Hash uploaded bytes for deduplication
fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

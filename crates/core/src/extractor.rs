use crate::error::BatchError;
use crate::models::Conversion;
use crate::text::{clean_text, find_doi, has_content};
use lopdf::Document;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractionOptions {
    /// Prefix each page with a `[Page N]` marker line.
    pub page_markers: bool,
    pub clean: bool,
}

impl Default for ExtractionOptions {
    fn default() -> Self {
        Self {
            page_markers: false,
            clean: true,
        }
    }
}

pub trait PdfExtractor {
    /// Returns the non-empty pages of the document in page order.
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, BatchError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, BatchError> {
        let document = Document::load(path).map_err(|error| BatchError::PdfParse(error.to_string()))?;

        let mut pages = Vec::new();
        for (page_no, _page_id) in document.get_pages() {
            let text = document
                .extract_text(&[page_no])
                .map_err(|error| BatchError::PdfParse(error.to_string()))?;

            if has_content(&text) {
                pages.push(PageText {
                    number: page_no,
                    text,
                });
            }
        }

        Ok(pages)
    }
}

pub fn join_pages(pages: &[PageText], options: ExtractionOptions) -> Result<String, BatchError> {
    let parts = pages
        .iter()
        .map(|page| {
            if options.page_markers {
                format!("[Page {}]\n{}", page.number, page.text)
            } else {
                page.text.clone()
            }
        })
        .collect::<Vec<_>>();

    let joined = parts.join("\n\n");
    if options.clean {
        clean_text(&joined)
    } else {
        Ok(joined)
    }
}

/// Extracts one PDF into a single text document.
///
/// A document with no non-whitespace text converts to [`Conversion::Empty`]
/// rather than an error.
pub fn extract_document_text<E>(
    extractor: &E,
    path: &Path,
    options: ExtractionOptions,
) -> Result<Conversion, BatchError>
where
    E: PdfExtractor + ?Sized,
{
    let pages = extractor.extract_pages(path)?;
    let text = join_pages(&pages, options)?;

    if !has_content(&text) {
        return Ok(Conversion::Empty);
    }

    let doi = find_doi(&text)?;
    Ok(Conversion::Text {
        text,
        pages: Some(pages.len()),
        doi,
    })
}

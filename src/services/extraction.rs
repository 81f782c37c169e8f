use scraper::{ElementRef, Html};
use thiserror::Error;
use tracing::{debug, warn};

use crate::text_map::normalize;

/// Elements followed by a line break in the extracted text
const BLOCK_ELEMENTS: &[&str] = &["p", "div", "h1", "h2", "h3", "h4", "h5", "h6", "br"];
/// Elements whose text never reaches the reader
const SKIPPED_ELEMENTS: &[&str] = &["head", "script", "style", "template"];

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("document is not valid UTF-8: {0}")]
    InvalidEncoding(#[from] std::str::Utf8Error),
    #[error("none of the {0} chapters could be read")]
    NoReadableChapters(usize),
}

impl ExtractionError {
    pub fn user_message(&self) -> &'static str {
        "Failed to process the document."
    }
}

/// Turns a document payload into one cleaned plain-text string. A readable
/// document without any text gives an empty string.
pub trait TextExtractor {
    fn extract(&self, payload: &[u8]) -> Result<String, ExtractionError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, payload: &[u8]) -> Result<String, ExtractionError> {
        let text = std::str::from_utf8(payload)?;
        Ok(normalize(text))
    }
}

/// Text of an (X)HTML document, one line per block element
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlExtractor;

impl TextExtractor for HtmlExtractor {
    fn extract(&self, payload: &[u8]) -> Result<String, ExtractionError> {
        let markup = std::str::from_utf8(payload)?;
        Ok(normalize(&html_text(markup)))
    }
}

/// Joins chapter documents with a blank line between them.
///
/// Unreadable chapters are skipped; the extraction fails only if none of
/// them can be read.
pub fn extract_chapters(chapters: &[&[u8]]) -> Result<String, ExtractionError> {
    let mut texts = Vec::with_capacity(chapters.len());
    for (index, chapter) in chapters.iter().enumerate() {
        match std::str::from_utf8(chapter) {
            Ok(markup) => texts.push(html_text(markup)),
            Err(e) => warn!("skipping chapter {}: {}", index, e),
        }
    }

    if texts.is_empty() {
        return Err(ExtractionError::NoReadableChapters(chapters.len()));
    }
    debug!("extracted {} of {} chapters", texts.len(), chapters.len());
    Ok(normalize(&texts.join("\n\n")))
}

fn html_text(markup: &str) -> String {
    let document = Html::parse_document(markup);
    element_text(document.root_element())
}

fn element_text(element: ElementRef<'_>) -> String {
    let mut parts: Vec<String> = Vec::new();

    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                parts.push(trimmed.to_string());
            }
        } else if let Some(child_element) = ElementRef::wrap(child) {
            if SKIPPED_ELEMENTS.contains(&child_element.value().name()) {
                continue;
            }
            let text = element_text(child_element);
            if !text.is_empty() {
                parts.push(text);
            }
        }
    }

    if BLOCK_ELEMENTS.contains(&element.value().name()) {
        parts.push("\n".to_string());
    }
    parts.join(" ")
}

//! PDF text extraction for `summarize`.

use lopdf::Document;
use tracing::debug;

use crate::error::ServiceError;

pub trait TextExtractor: Send + Sync {
    fn extract_text(&self, bytes: &[u8]) -> Result<String, ServiceError>;
}

/// Extracts text from every page, in page order.
#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfExtractor;

impl TextExtractor for LopdfExtractor {
    fn extract_text(&self, bytes: &[u8]) -> Result<String, ServiceError> {
        let doc = Document::load_mem(bytes).map_err(|e| ServiceError::Extraction(e.to_string()))?;
        let pages: Vec<u32> = doc.get_pages().keys().copied().collect();
        debug!(pages = pages.len(), bytes = bytes.len(), "extracting pdf text");
        if pages.is_empty() {
            return Ok(String::new());
        }
        doc.extract_text(&pages)
            .map_err(|e| ServiceError::Extraction(e.to_string()))
    }
}

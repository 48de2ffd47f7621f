pub mod als;
pub mod pdftotext;
pub mod xlsx;

use crate::error::BunnrenskError;

/// Text of a single PDF page, one entry per layout line.
#[derive(Debug, Clone, Default)]
pub struct PageContent {
    pub page_number: usize,
    pub lines: Vec<String>,
}

/// Backend that turns report PDF bytes into layout-preserving page text.
pub trait TextExtractor: Send + Sync {
    fn extract_pages(&self, pdf_bytes: &[u8]) -> Result<Vec<PageContent>, BunnrenskError>;

    /// Name of this extraction backend (for diagnostics).
    fn backend_name(&self) -> &str;
}

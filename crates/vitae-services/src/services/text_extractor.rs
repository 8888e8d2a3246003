//! Resume text extraction

use async_trait::async_trait;
use bytes::Bytes;
use vitae_core::PipelineError;

#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Extract readable text from an uploaded document.
    ///
    /// Unreadable input and documents without any text are both
    /// [`PipelineError::Extraction`].
    async fn extract_text(&self, data: Bytes) -> Result<String, PipelineError>;
}

/// Signature every PDF starts with
pub const PDF_MAGIC: &[u8] = b"%PDF-";

pub fn is_pdf(data: &[u8]) -> bool {
    data.starts_with(PDF_MAGIC)
}

/// PDF text extraction backed by `pdf-extract`, run on the blocking pool.
#[cfg(feature = "document")]
#[derive(Debug, Clone, Default)]
pub struct PdfTextExtractor;

#[cfg(feature = "document")]
impl PdfTextExtractor {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(feature = "document")]
#[async_trait]
impl TextExtractor for PdfTextExtractor {
    async fn extract_text(&self, data: Bytes) -> Result<String, PipelineError> {
        if !is_pdf(&data) {
            return Err(PipelineError::Extraction(
                "file is not a PDF document".to_string(),
            ));
        }

        let size_bytes = data.len();
        let text = tokio::task::spawn_blocking(move || extract_pdf_text(&data))
            .await
            .map_err(|e| PipelineError::Extraction(format!("PDF extraction task failed: {}", e)))??;

        tracing::debug!(
            size_bytes = size_bytes,
            text_len = text.len(),
            "PDF text extracted"
        );

        Ok(text)
    }
}

#[cfg(feature = "document")]
fn extract_pdf_text(document_data: &Bytes) -> Result<String, PipelineError> {
    use std::io::Write;

    let mut temp = tempfile::NamedTempFile::new().map_err(|e| {
        PipelineError::Extraction(format!("Failed to create temp file for PDF: {}", e))
    })?;
    temp.write_all(document_data)
        .and_then(|_| temp.flush())
        .map_err(|e| PipelineError::Extraction(format!("Failed to write PDF to temp file: {}", e)))?;

    let text = pdf_extract::extract_text(temp.path()).map_err(|e| {
        tracing::warn!(error = %e, "PDF text extraction failed");
        PipelineError::Extraction(format!("PDF text extraction failed: {}", e))
    })?;

    let trimmed = text.trim();
    if trimmed.is_empty() {
        tracing::warn!("PDF text extraction returned empty");
        return Err(PipelineError::Extraction(
            "document contains no extractable text".to_string(),
        ));
    }

    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pdf_magic_detection() {
        assert!(is_pdf(b"%PDF-1.7\n..."));
        assert!(!is_pdf(b"PK\x03\x04"));
        assert!(!is_pdf(b""));
    }

    #[cfg(feature = "document")]
    #[tokio::test]
    async fn test_non_pdf_is_extraction_error() {
        let err = PdfTextExtractor::new()
            .extract_text(Bytes::from_static(b"plain text resume"))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Extraction(_)));
    }

    #[cfg(feature = "document")]
    #[tokio::test]
    async fn test_corrupt_pdf_is_extraction_error() {
        let err = PdfTextExtractor::new()
            .extract_text(Bytes::from_static(b"%PDF-1.4\nnot really a pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Extraction(_)));
    }
}

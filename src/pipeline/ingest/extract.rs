use std::path::Path;

use super::IngestError;

/// Text extraction seam. The pipeline only ever sees plain text; format
/// handling stays behind this trait.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<String, IngestError>;
}

/// Reads UTF-8 text files (.txt, .md). Anything else is unsupported here.
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, path: &Path) -> Result<String, IngestError> {
        if !path.exists() {
            return Err(IngestError::MissingFile(path.to_path_buf()));
        }

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        if !matches!(extension.as_str(), "txt" | "md" | "text") {
            return Err(IngestError::UnsupportedFormat(extension));
        }

        let text = std::fs::read_to_string(path)?;
        if text.trim().is_empty() {
            return Err(IngestError::EmptyText);
        }
        Ok(text)
    }
}

//! Document value objects.
//!
//! A [`SourceDocument`] is what the caller uploads; a [`NormalizedDocument`]
//! is the uniform representation every later stage consumes.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Media type of flattened spreadsheet text.
pub const MEDIA_TYPE_TEXT: &str = "text/plain";

/// Media type of page documents passed through as binary.
pub const MEDIA_TYPE_PDF: &str = "application/pdf";

/// A raw uploaded document: a name, an optional declared media type, and bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct SourceDocument {
    /// File name as uploaded (used for format detection and attribution).
    pub name: String,

    /// Media type declared by the uploader, if any.
    pub media_type: Option<String>,

    /// Raw file contents.
    pub bytes: Vec<u8>,
}

impl SourceDocument {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            media_type: None,
            bytes: bytes.into(),
        }
    }

    pub fn with_media_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = Some(media_type.into());
        self
    }

    /// Read a document from disk. The file name becomes the document name.
    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(name, bytes))
    }

    /// Lower-cased file extension, without the dot.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.name)
            .extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
    }
}

impl std::fmt::Debug for SourceDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceDocument")
            .field("name", &self.name)
            .field("media_type", &self.media_type)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

/// How a normalized payload must be handed to the generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    /// Spreadsheet flattened to text; inlined into the prompt.
    Tabular,
    /// Binary page document; attached base64-encoded, never inspected.
    Opaque,
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentKind::Tabular => f.write_str("tabular"),
            DocumentKind::Opaque => f.write_str("opaque"),
        }
    }
}

/// The uniform intermediate representation of one uploaded file.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedDocument {
    pub name: String,
    pub kind: DocumentKind,
    /// `text/plain` for tabular payloads, the declared type for opaque ones.
    pub media_type: String,
    /// Sheet text for tabular documents, base64 for opaque ones.
    pub payload: String,
}

impl NormalizedDocument {
    pub fn tabular(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: DocumentKind::Tabular,
            media_type: MEDIA_TYPE_TEXT.into(),
            payload: text.into(),
        }
    }

    pub fn opaque(
        name: impl Into<String>,
        media_type: impl Into<String>,
        base64: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: DocumentKind::Opaque,
            media_type: media_type.into(),
            payload: base64.into(),
        }
    }

    pub fn is_tabular(&self) -> bool {
        self.kind == DocumentKind::Tabular
    }

    /// Payload length in characters.
    pub fn char_len(&self) -> usize {
        self.payload.chars().count()
    }
}

impl std::fmt::Debug for NormalizedDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NormalizedDocument")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("media_type", &self.media_type)
            .field("payload_len", &self.payload.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_is_lowercased() {
        let doc = SourceDocument::new("Bilancio_2023.XLSX", vec![1, 2, 3]);
        assert_eq!(doc.extension().as_deref(), Some("xlsx"));
        assert_eq!(SourceDocument::new("README", vec![]).extension(), None);
    }

    #[test]
    fn debug_hides_bytes() {
        let doc = SourceDocument::new("a.pdf", vec![0u8; 2048]);
        let dbg = format!("{doc:?}");
        assert!(dbg.contains("2048"));
        assert!(!dbg.contains("0, 0, 0"));
    }

    #[test]
    fn constructors_set_kind_and_media_type() {
        let t = NormalizedDocument::tabular("pl.csv", "--- SHEET: \"Sheet1\" ---");
        assert!(t.is_tabular());
        assert_eq!(t.media_type, MEDIA_TYPE_TEXT);

        let o = NormalizedDocument::opaque("notes.pdf", MEDIA_TYPE_PDF, "JVBERi0=");
        assert_eq!(o.kind, DocumentKind::Opaque);
        assert_eq!(o.media_type, "application/pdf");
    }

    #[test]
    fn char_len_counts_characters_not_bytes() {
        let doc = NormalizedDocument::tabular("x.csv", "ÀÈ");
        assert_eq!(doc.char_len(), 2);
    }

    #[tokio::test]
    async fn from_path_uses_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("PL_2023.csv");
        std::fs::write(&path, "a,b\n1,2\n").unwrap();

        let doc = SourceDocument::from_path(&path).await.unwrap();
        assert_eq!(doc.name, "PL_2023.csv");
        assert_eq!(doc.bytes, b"a,b\n1,2\n");
    }
}

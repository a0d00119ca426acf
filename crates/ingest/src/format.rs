//! Format detection at the selection boundary.
//!
//! Runs before any byte is parsed: a document whose declared media type and
//! file name both fail to match an accepted format is rejected here.
//!
//! Browsers declare spreadsheet media types loosely (a `.csv` often arrives
//! as `application/vnd.ms-excel`), so a declared type only settles whether
//! the document is a PDF. The tabular sub-format comes from the extension.

use finsight_core::document::MEDIA_TYPE_PDF;
use finsight_core::{DocumentKind, Error, Result, SourceDocument};

/// Every format the normalizer accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Xlsx,
    Xls,
    Ods,
    Csv,
    Pdf,
}

impl DocumentFormat {
    pub fn kind(self) -> DocumentKind {
        match self {
            DocumentFormat::Pdf => DocumentKind::Opaque,
            _ => DocumentKind::Tabular,
        }
    }

    fn from_media_type(media_type: &str) -> Option<Self> {
        let essence = media_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            MEDIA_TYPE_PDF => Some(DocumentFormat::Pdf),
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => {
                Some(DocumentFormat::Xlsx)
            }
            "application/vnd.ms-excel" => Some(DocumentFormat::Xls),
            "application/vnd.oasis.opendocument.spreadsheet" => Some(DocumentFormat::Ods),
            "text/csv" => Some(DocumentFormat::Csv),
            _ => None,
        }
    }

    fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "xlsx" => Some(DocumentFormat::Xlsx),
            "xls" => Some(DocumentFormat::Xls),
            "ods" => Some(DocumentFormat::Ods),
            "csv" => Some(DocumentFormat::Csv),
            "pdf" => Some(DocumentFormat::Pdf),
            _ => None,
        }
    }
}

/// Decide how `doc` will be normalized.
///
/// A declared `application/pdf` always means PDF. Otherwise a recognised
/// extension decides, and the declared type is consulted only when the
/// extension says nothing. Neither matching is an [`Error::UnsupportedFormat`].
pub fn classify(doc: &SourceDocument) -> Result<DocumentFormat> {
    let declared = doc.media_type.as_deref().and_then(DocumentFormat::from_media_type);
    if declared == Some(DocumentFormat::Pdf) {
        return Ok(DocumentFormat::Pdf);
    }

    doc.extension()
        .as_deref()
        .and_then(DocumentFormat::from_extension)
        .or(declared)
        .ok_or_else(|| Error::UnsupportedFormat {
            name: doc.name.clone(),
        })
}

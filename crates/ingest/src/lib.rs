//! Document normalization for FinSight.
//!
//! Turns each uploaded file into exactly one [`NormalizedDocument`]:
//!
//! - **Tabular** (`.xlsx .xls .ods .csv`): every non-empty sheet flattened to
//!   text behind a sheet marker (see [`tabular`]).
//! - **Opaque** (`.pdf`): bytes base64-encoded as-is, never inspected.
//!
//! Batches are de-duplicated by name (first wins), format-checked up front,
//! then normalized concurrently and returned in upload order.

pub mod format;
pub mod tabular;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use finsight_core::document::MEDIA_TYPE_PDF;
use finsight_core::{Error, NormalizedDocument, Result, SourceDocument};
use futures::future::try_join_all;
use std::collections::HashSet;
use tracing::{debug, info};

pub use format::{DocumentFormat, classify};

/// Normalize a single document.
pub fn normalize(doc: &SourceDocument) -> Result<NormalizedDocument> {
    let format = classify(doc)?;
    match format {
        DocumentFormat::Pdf => {
            debug!(document = %doc.name, bytes = doc.bytes.len(), "Encoding opaque document");
            Ok(NormalizedDocument::opaque(
                &doc.name,
                MEDIA_TYPE_PDF,
                STANDARD.encode(&doc.bytes),
            ))
        }
        _ => {
            let text = tabular::flatten(&doc.name, &doc.bytes, format)?;
            Ok(NormalizedDocument::tabular(&doc.name, text))
        }
    }
}

/// Keep the first document of each name, preserving order.
pub fn dedupe_by_name(docs: Vec<SourceDocument>) -> Vec<SourceDocument> {
    let mut seen = HashSet::new();
    docs.into_iter()
        .filter(|doc| {
            let fresh = seen.insert(doc.name.clone());
            if !fresh {
                debug!(document = %doc.name, "Dropping duplicate upload");
            }
            fresh
        })
        .collect()
}

/// Normalize a batch of uploads.
///
/// Every document is format-checked before any is parsed, so one unsupported
/// file rejects the batch without wasted work. Parsing fans out to the
/// blocking pool; results come back in upload order. The first failure
/// fails the batch.
pub async fn normalize_all(docs: Vec<SourceDocument>) -> Result<Vec<NormalizedDocument>> {
    let docs = dedupe_by_name(docs);
    for doc in &docs {
        classify(doc)?;
    }

    let count = docs.len();
    let tasks = docs.into_iter().map(|doc| async move {
        let name = doc.name.clone();
        tokio::task::spawn_blocking(move || normalize(&doc))
            .await
            .map_err(|e| Error::DocumentDecode {
                name,
                reason: format!("normalization task failed: {e}"),
            })?
    });

    let normalized = try_join_all(tasks).await?;
    info!(documents = count, "Normalized uploaded documents");
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use finsight_core::DocumentKind;

    fn csv(name: &str, body: &str) -> SourceDocument {
        SourceDocument::new(name, body.as_bytes().to_vec())
    }

    #[test]
    fn pdf_is_base64_passthrough() {
        let bytes = b"%PDF-1.7\n\x00\xff binary".to_vec();
        let doc = SourceDocument::new("Notes.pdf", bytes.clone());
        let normalized = normalize(&doc).unwrap();
        assert_eq!(normalized.kind, DocumentKind::Opaque);
        assert_eq!(normalized.media_type, "application/pdf");
        assert_eq!(STANDARD.decode(&normalized.payload).unwrap(), bytes);
    }

    #[test]
    fn zero_length_pdf_encodes_to_empty_string() {
        let normalized = normalize(&SourceDocument::new("blank.pdf", Vec::new())).unwrap();
        assert_eq!(normalized.kind, DocumentKind::Opaque);
        assert!(normalized.payload.is_empty());
    }

    #[test]
    fn pdf_media_type_ignores_the_declared_one() {
        let doc = SourceDocument::new("Notes.pdf", b"%PDF-1.7".to_vec())
            .with_media_type("application/octet-stream");
        let normalized = normalize(&doc).unwrap();
        assert_eq!(normalized.media_type, MEDIA_TYPE_PDF);
    }

    #[test]
    fn csv_declared_as_excel_still_parses() {
        let doc = csv("PL_2023.csv", "Voce,2023\nRicavi,100\n")
            .with_media_type("application/vnd.ms-excel");
        let normalized = normalize(&doc).unwrap();
        assert_eq!(normalized.kind, DocumentKind::Tabular);
        assert!(normalized.payload.contains("\"Ricavi\""));
    }

    #[test]
    fn csv_is_tabular() {
        let normalized = normalize(&csv("pl.csv", "Ricavi,100\n")).unwrap();
        assert_eq!(normalized.kind, DocumentKind::Tabular);
        assert!(normalized.payload.contains("--- SHEET: \"Sheet1\" ---"));
    }

    #[test]
    fn duplicates_keep_first_occurrence() {
        let docs = vec![
            csv("a.csv", "first\n"),
            csv("b.csv", "other\n"),
            csv("a.csv", "second\n"),
        ];
        let unique = dedupe_by_name(docs);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].bytes, b"first\n");
        assert_eq!(unique[1].name, "b.csv");
    }

    #[tokio::test]
    async fn normalize_all_preserves_upload_order() {
        let docs = vec![
            csv("z.csv", "late,1\n"),
            SourceDocument::new("m.pdf", b"%PDF".to_vec()),
            csv("a.csv", "early,2\n"),
        ];
        let normalized = normalize_all(docs).await.unwrap();
        let names: Vec<&str> = normalized.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["z.csv", "m.pdf", "a.csv"]);
    }

    #[tokio::test]
    async fn normalize_all_drops_duplicate_names() {
        let docs = vec![csv("a.csv", "x,1\n"), csv("a.csv", "y,2\n")];
        let normalized = normalize_all(docs).await.unwrap();
        assert_eq!(normalized.len(), 1);
        assert!(normalized[0].payload.contains("\"x\""));
    }

    #[tokio::test]
    async fn unsupported_file_rejects_the_batch() {
        let docs = vec![
            csv("a.csv", "x,1\n"),
            SourceDocument::new("memo.docx", vec![1, 2, 3]),
        ];
        let err = normalize_all(docs).await.unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat { name } if name == "memo.docx"));
    }

    #[tokio::test]
    async fn empty_tabular_document_fails_the_batch() {
        let docs = vec![csv("ok.csv", "x,1\n"), csv("empty.csv", "")];
        let err = normalize_all(docs).await.unwrap_err();
        assert!(matches!(err, Error::EmptyDocument { name } if name == "empty.csv"));
    }
}

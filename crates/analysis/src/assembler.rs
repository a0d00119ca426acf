//! Context assembly for the analysis call.
//!
//! Builds the instruction block and the ordered attachment list sent to the
//! generator:
//!
//! 1. **Instructions**: analyst role, target language, multi-sheet and
//!    cross-document guidance, depth rules, radar dimensions
//! 2. **Attachments**: one per document in upload order, each preceded by a
//!    delimiter line; tabular payloads are capped by character count
//!
//! # Determinism
//!
//! Identical inputs always produce identical requests. No random or
//! time-dependent logic is used during assembly.

use finsight_config::LimitsConfig;
use finsight_core::{DocumentKind, Language, NormalizedDocument, Part};
use std::borrow::Cow;
use tracing::debug;

/// Appended once to a tabular payload cut at its cap.
pub const TRUNCATION_MARKER: &str = "\n...[TRUNCATED]";

/// Character caps for inlined tabular payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Cap when exactly one document is submitted.
    pub single_document_chars: usize,
    /// Per-document cap when several documents are submitted.
    pub per_document_chars: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            single_document_chars: 900_000,
            per_document_chars: 500_000,
        }
    }
}

impl From<&LimitsConfig> for Limits {
    fn from(config: &LimitsConfig) -> Self {
        Self {
            single_document_chars: config.single_document_chars,
            per_document_chars: config.per_document_chars,
        }
    }
}

impl Limits {
    /// The cap that applies to each document of a batch of `count`.
    pub fn cap_for(&self, count: usize) -> usize {
        if count > 1 {
            self.per_document_chars
        } else {
            self.single_document_chars
        }
    }
}

/// A normalized document ready to be sent, after truncation.
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub document: NormalizedDocument,
    /// Whether the payload was cut at its cap.
    pub truncated: bool,
}

/// Everything the analysis call needs, minus the credential.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub instructions: String,
    pub language: Language,
    pub attachments: Vec<Attachment>,
}

impl GenerationRequest {
    /// The attachments rendered as ordered request parts.
    pub fn parts(&self) -> Vec<Part> {
        attachment_parts(&self.attachments)
    }
}

/// Cut `text` to at most `cap` characters, appending [`TRUNCATION_MARKER`]
/// when anything was removed. Returns whether a cut happened.
pub fn truncate(text: &str, cap: usize) -> (Cow<'_, str>, bool) {
    match text.char_indices().nth(cap) {
        None => (Cow::Borrowed(text), false),
        Some((byte_idx, _)) => {
            let mut cut = String::with_capacity(byte_idx + TRUNCATION_MARKER.len());
            cut.push_str(&text[..byte_idx]);
            cut.push_str(TRUNCATION_MARKER);
            (Cow::Owned(cut), true)
        }
    }
}

/// The delimiter line that precedes attachment `index` (zero-based).
pub fn delimiter(index: usize, total: usize, document: &NormalizedDocument) -> String {
    format!(
        "=== DOCUMENT {}/{}: \"{}\" ({}) ===",
        index + 1,
        total,
        document.name,
        document.kind
    )
}

/// Render attachments as request parts, each behind its delimiter.
///
/// Tabular documents become one text part; opaque documents become a
/// delimiter text part followed by the inline binary.
pub fn attachment_parts(attachments: &[Attachment]) -> Vec<Part> {
    let total = attachments.len();
    let mut parts = Vec::with_capacity(total * 2);
    for (i, attachment) in attachments.iter().enumerate() {
        let doc = &attachment.document;
        let header = delimiter(i, total, doc);
        match doc.kind {
            DocumentKind::Tabular => {
                parts.push(Part::text(format!("{header}\n{}", doc.payload)));
            }
            DocumentKind::Opaque => {
                parts.push(Part::text(header));
                parts.push(Part::Inline {
                    name: doc.name.clone(),
                    media_type: doc.media_type.clone(),
                    data: doc.payload.clone(),
                });
            }
        }
    }
    parts
}

/// Builds [`GenerationRequest`]s. Stateless apart from its limits.
#[derive(Debug, Clone, Default)]
pub struct ContextAssembler {
    limits: Limits,
}

impl ContextAssembler {
    pub fn new(limits: Limits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }

    /// Apply the batch caps to every tabular document, preserving order.
    pub fn attach(&self, documents: &[NormalizedDocument]) -> Vec<Attachment> {
        let cap = self.limits.cap_for(documents.len());
        documents
            .iter()
            .map(|doc| match doc.kind {
                DocumentKind::Opaque => Attachment {
                    document: doc.clone(),
                    truncated: false,
                },
                DocumentKind::Tabular => {
                    let (payload, truncated) = truncate(&doc.payload, cap);
                    if truncated {
                        debug!(document = %doc.name, cap, chars = doc.char_len(), "Truncated tabular payload");
                    }
                    Attachment {
                        document: NormalizedDocument {
                            payload: payload.into_owned(),
                            ..doc.clone()
                        },
                        truncated,
                    }
                }
            })
            .collect()
    }

    /// Assemble the analysis request for `documents` in `language`.
    pub fn assemble(&self, documents: &[NormalizedDocument], language: Language) -> GenerationRequest {
        let attachments = self.attach(documents);
        debug!(
            documents = attachments.len(),
            truncated = attachments.iter().filter(|a| a.truncated).count(),
            language = %language,
            "Assembled analysis request"
        );
        GenerationRequest {
            instructions: analysis_instructions(language, documents.len()),
            language,
            attachments,
        }
    }
}

/// The instruction block for a full analysis.
pub fn analysis_instructions(language: Language, document_count: usize) -> String {
    let lang = language.display_name();
    let mut text = format!(
        r#"Role: You are "FinSight CFO", a world-class Virtual CFO and financial analyst.

TARGET LANGUAGE: {lang}
All textual output (summaries, insights, labels, titles) MUST be written in {lang}.

TASK:
Perform a deep-dive financial analysis of the attached documents. Each document is
preceded by a line of the form === DOCUMENT <n>/<total>: "<name>" (<kind>) ===.

MULTI-SHEET DATA:
Tabular documents may contain data from several sheets, each introduced by
--- SHEET: "<name>" --- and followed by its rows as a JSON matrix. Analyze ALL
sheets (for example the income statement in one sheet and the balance sheet in
another) and combine them consistently.
"#
    );

    if document_count > 1 {
        text.push_str(&format!(
            r#"
CROSS-DOCUMENT SYNTHESIS ({document_count} documents):
- Documents covering the same topic for different periods form a time series:
  align them by period and describe the trend.
- Documents covering different topics (income statement, balance sheet, notes)
  are complementary facets of the same company: combine them to compute ratios.
- Attribute figures to the document they come from when sources disagree.
"#
        ));
    }

    text.push_str(&format!(
        r#"
ENTITY EXTRACTION:
Find the exact legal entity name (e.g. "Rossi S.r.l.", "Mario Rossi SpA") in the
headers, the first page, the first rows or the file names. If it is missing,
infer the sector and describe the company by it.

DEPTH OF ANALYSIS:
- Do not be generic. Use technical terms (EBITDA, NFP, ROE, ROS, financial leverage).
- The executive summary must be at least 200 words.
- Every analysis section must be at least 150 words.
- Explain the reasons behind the numbers.

HEALTH RADAR (scores 0-100, exactly five entries, labels in {lang}):
- Profitability
- Liquidity
- Solvency
- Efficiency
- Growth

OUTPUT:
Return a single strict JSON object following the response schema. No prose, no
Markdown.
"#
    ));

    text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tabular(name: &str, payload: &str) -> NormalizedDocument {
        NormalizedDocument::tabular(name, payload.to_string())
    }

    #[test]
    fn payload_at_cap_is_untouched() {
        let text = "a".repeat(10);
        let (out, cut) = truncate(&text, 10);
        assert!(!cut);
        assert_eq!(out, text);
    }

    #[test]
    fn one_over_cap_is_cut_with_single_marker() {
        let text = "a".repeat(11);
        let (out, cut) = truncate(&text, 10);
        assert!(cut);
        assert_eq!(out, format!("{}{}", "a".repeat(10), TRUNCATION_MARKER));
        assert_eq!(out.matches("[TRUNCATED]").count(), 1);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let text = "€€€€";
        let (out, cut) = truncate(text, 2);
        assert!(cut);
        assert!(out.starts_with("€€\n"));
    }

    #[test]
    fn single_document_uses_single_cap() {
        let limits = Limits {
            single_document_chars: 8,
            per_document_chars: 4,
        };
        let assembler = ContextAssembler::new(limits);
        let attached = assembler.attach(&[tabular("a.csv", "12345678")]);
        assert!(!attached[0].truncated);
        assert_eq!(attached[0].document.payload, "12345678");
    }

    #[test]
    fn several_documents_use_per_document_cap() {
        let limits = Limits {
            single_document_chars: 8,
            per_document_chars: 4,
        };
        let assembler = ContextAssembler::new(limits);
        let attached = assembler.attach(&[tabular("a.csv", "12345678"), tabular("b.csv", "1234")]);
        assert!(attached[0].truncated);
        assert_eq!(attached[0].document.payload, format!("1234{TRUNCATION_MARKER}"));
        assert!(!attached[1].truncated);
    }

    #[test]
    fn opaque_documents_are_never_truncated() {
        let limits = Limits {
            single_document_chars: 2,
            per_document_chars: 2,
        };
        let doc = NormalizedDocument::opaque("n.pdf", "application/pdf", "JVBERi0xLjcK");
        let attached = ContextAssembler::new(limits).attach(std::slice::from_ref(&doc));
        assert_eq!(attached[0].document, doc);
    }

    #[test]
    fn parts_follow_upload_order_with_delimiters() {
        let docs = [
            tabular("PL_2023.xlsx", "--- SHEET: \"CE\" ---"),
            NormalizedDocument::opaque("Notes.pdf", "application/pdf", "JVBE"),
        ];
        let request = ContextAssembler::default().assemble(&docs, Language::It);
        let parts = request.parts();
        assert_eq!(parts.len(), 3);
        match &parts[0] {
            Part::Text { text } => {
                assert!(text.starts_with("=== DOCUMENT 1/2: \"PL_2023.xlsx\" (tabular) ==="));
                assert!(text.contains("SHEET"));
            }
            other => panic!("expected text part, got {other:?}"),
        }
        assert_eq!(
            parts[1],
            Part::text("=== DOCUMENT 2/2: \"Notes.pdf\" (opaque) ===")
        );
        assert!(matches!(&parts[2], Part::Inline { name, .. } if name == "Notes.pdf"));
    }

    #[test]
    fn instructions_name_the_language_and_radar() {
        let text = analysis_instructions(Language::De, 1);
        assert!(text.contains("TARGET LANGUAGE: Deutsch"));
        for dim in ["Profitability", "Liquidity", "Solvency", "Efficiency", "Growth"] {
            assert!(text.contains(dim));
        }
        assert!(!text.contains("CROSS-DOCUMENT"));
    }

    #[test]
    fn several_documents_add_synthesis_guidance() {
        let text = analysis_instructions(Language::En, 3);
        assert!(text.contains("CROSS-DOCUMENT SYNTHESIS (3 documents)"));
    }

    #[test]
    fn assembly_is_deterministic() {
        let docs = [tabular("a.csv", "x"), tabular("b.csv", "y")];
        let assembler = ContextAssembler::default();
        assert_eq!(
            assembler.assemble(&docs, Language::Fr),
            assembler.assemble(&docs, Language::Fr)
        );
    }
}

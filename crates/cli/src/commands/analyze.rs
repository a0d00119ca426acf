//! `finsight analyze`: One-shot report generation.

use finsight_core::{Language, Report};
use std::path::PathBuf;

pub async fn run(
    files: Vec<PathBuf>,
    lang: Option<Language>,
    api_key: Option<String>,
    out: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = super::open_session(lang)?;
    let documents = super::read_documents(&files).await?;

    eprintln!("  Analyzing {} document(s) in {}...", documents.len(), session.language().display_name());
    let report = match session.analyze(documents, api_key.as_deref()).await {
        Ok(report) => report,
        Err(e) => {
            super::explain(&e);
            return Err(e.into());
        }
    };

    eprintln!("{}", summary(report));
    super::write_json(report, out.as_deref())
}

/// A short human-readable digest for the terminal.
pub fn summary(report: &Report) -> String {
    let mut lines = vec![
        String::new(),
        format!("  {}", report.company_name),
        format!("  Health score: {:.0}/100", report.financial_health_score),
    ];
    for point in &report.health_radar {
        lines.push(format!("    {:<16} {:>3.0}", point.subject, point.score));
    }
    lines.push(format!(
        "  {} KPI(s), {} recommendation(s)",
        report.kpis.len(),
        report.recommendations.len()
    ));
    lines.push(String::new());
    lines.join("\n")
}

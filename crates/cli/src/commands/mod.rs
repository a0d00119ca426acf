pub mod analyze;
pub mod chat;
pub mod init;
pub mod schema;

use finsight_analysis::Session;
use finsight_config::AppConfig;
use finsight_core::{Language, SourceDocument};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Load the config, pick the default provider and open a session.
pub fn open_session(lang: Option<Language>) -> Result<Session, Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let router = finsight_providers::build_from_config(&config);
    let provider = router
        .default()
        .ok_or_else(|| format!("Provider '{}' is not available", config.default_provider))?;

    debug!(
        provider = %config.default_provider,
        model = %config.default_model,
        registered = ?router.list(),
        "Opening session"
    );

    let mut session = Session::from_config(provider, &config);
    if let Some(lang) = lang {
        session.set_language(lang);
    }
    Ok(session)
}

/// Read every path into a document, in argument order.
pub async fn read_documents(
    paths: &[PathBuf],
) -> Result<Vec<SourceDocument>, Box<dyn std::error::Error>> {
    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
        let doc = SourceDocument::from_path(path)
            .await
            .map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
        documents.push(doc);
    }
    Ok(documents)
}

/// Print setup help when the failure is a missing or rejected key.
pub fn explain(err: &finsight_core::Error) {
    if !err.requires_credential() {
        return;
    }
    eprintln!();
    eprintln!("  ERROR: {err}");
    eprintln!();
    eprintln!("  Pass --api-key, or set one of these environment variables:");
    for name in finsight_analysis::credentials::ENV_KEYS {
        eprintln!("    {name}");
    }
    eprintln!();
    eprintln!("  Or add api_key to your config file:");
    eprintln!("    {}", config_path().display());
    eprintln!();
}

pub fn config_path() -> PathBuf {
    AppConfig::config_dir().join("config.toml")
}

/// Pretty JSON to `out`, or stdout when no path is given.
pub fn write_json(
    value: &impl serde::Serialize,
    out: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let json = serde_json::to_string_pretty(value)?;
    match out {
        Some(path) => {
            std::fs::write(path, json + "\n")?;
            eprintln!("  Report written to {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn read_documents_keeps_argument_order() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("b.csv");
        let b = dir.path().join("a.pdf");
        std::fs::write(&a, "x,1\n").unwrap();
        std::fs::write(&b, b"%PDF-1.4").unwrap();

        let docs = read_documents(&[a, b]).await.unwrap();
        let names: Vec<_> = docs.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["b.csv", "a.pdf"]);
    }

    #[tokio::test]
    async fn missing_file_names_the_path() {
        let err = read_documents(&[PathBuf::from("/nonexistent/PL_2023.xlsx")])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("PL_2023.xlsx"));
    }

    #[test]
    fn write_json_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        write_json(&serde_json::json!({"companyName": "Rossi"}), Some(&path)).unwrap();
        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["companyName"], "Rossi");
    }
}

//! The analysis session: one report, its source documents and the chat
//! history that edits it.
//!
//! Every operation takes `&mut self`, so a session never has more than one
//! generation request in flight. A request that fails leaves the report and
//! history as they were; a request whose future is dropped also restores the
//! previous status.

use finsight_config::AppConfig;
use finsight_core::{
    ChatHistory, ChatTurn, Error, Language, NormalizedDocument, Provider, Report, ResponseFormat,
    Result, SourceDocument,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::assembler::{ContextAssembler, Limits};
use crate::credentials::CredentialChain;
use crate::invoker::AnalysisInvoker;
use crate::patch::{self, ChatSettings, PatchEngine};
use crate::schema::SchemaContract;
use crate::validator;

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Idle,
    Parsing,
    Analyzing,
    Complete,
    Patching,
    Error,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Parsing => "parsing",
            SessionStatus::Analyzing => "analyzing",
            SessionStatus::Complete => "complete",
            SessionStatus::Patching => "patching",
            SessionStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// The result of one successful chat turn.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchOutcome {
    pub answer: String,
    /// Top-level report fields the turn overwrote; empty for a plain answer.
    pub changed_fields: Vec<String>,
}

impl PatchOutcome {
    pub fn changed_report(&self) -> bool {
        !self.changed_fields.is_empty()
    }
}

/// Sets a status for the duration of a request and puts the previous one
/// back if the request is abandoned before it settles.
struct StatusGuard<'a> {
    status: &'a mut SessionStatus,
    previous: SessionStatus,
    settled: bool,
}

impl<'a> StatusGuard<'a> {
    fn enter(status: &'a mut SessionStatus, next: SessionStatus) -> Self {
        let previous = std::mem::replace(status, next);
        Self {
            status,
            previous,
            settled: false,
        }
    }

    fn set(&mut self, next: SessionStatus) {
        *self.status = next;
    }

    fn settle(mut self, last: SessionStatus) {
        *self.status = last;
        self.settled = true;
    }
}

impl Drop for StatusGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            *self.status = self.previous;
        }
    }
}

/// A single analyze-then-edit session.
pub struct Session {
    id: Uuid,
    language: Language,
    status: SessionStatus,
    report: Option<Report>,
    documents: Vec<NormalizedDocument>,
    history: ChatHistory,
    assembler: ContextAssembler,
    invoker: AnalysisInvoker,
    patch: PatchEngine,
    contract: SchemaContract,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("language", &self.language)
            .field("status", &self.status)
            .field("has_report", &self.report.is_some())
            .field("documents", &self.documents.len())
            .field("history", &self.history.len())
            .field("invoker", &self.invoker)
            .finish()
    }
}

impl Session {
    pub fn new(invoker: AnalysisInvoker, language: Language) -> Self {
        Self {
            id: Uuid::new_v4(),
            language,
            status: SessionStatus::Idle,
            report: None,
            documents: Vec::new(),
            history: ChatHistory::new(),
            assembler: ContextAssembler::default(),
            invoker,
            patch: PatchEngine::default(),
            contract: SchemaContract::report(),
        }
    }

    /// Build a session from the loaded configuration.
    ///
    /// The credential chain ends with the key configured for `provider`.
    pub fn from_config(provider: Arc<dyn Provider>, config: &AppConfig) -> Self {
        let name = provider.name().to_string();
        let model = config
            .providers
            .get(&name)
            .and_then(|p| p.default_model.clone())
            .unwrap_or_else(|| config.default_model.clone());
        let credentials = CredentialChain::standard(config.api_key_for(&name));
        let invoker = AnalysisInvoker::new(provider, credentials, model)
            .with_temperature(config.default_temperature)
            .with_max_tokens(config.default_max_tokens)
            .with_deadline(config.request_timeout());
        let language = config.language.parse().unwrap_or_else(|e: String| {
            warn!(error = %e, "Falling back to the default report language");
            Language::default()
        });

        Self::new(invoker, language)
            .with_limits(Limits::from(&config.limits))
            .with_chat_settings(ChatSettings::from(&config.chat))
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.assembler = ContextAssembler::new(limits);
        self
    }

    pub fn with_chat_settings(mut self, settings: ChatSettings) -> Self {
        self.patch = PatchEngine::new(settings);
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn language(&self) -> Language {
        self.language
    }

    /// Takes effect from the next request.
    pub fn set_language(&mut self, language: Language) {
        self.language = language;
    }

    pub fn report(&self) -> Option<&Report> {
        self.report.as_ref()
    }

    pub fn documents(&self) -> &[NormalizedDocument] {
        &self.documents
    }

    pub fn history(&self) -> &ChatHistory {
        &self.history
    }

    pub fn contract(&self) -> &SchemaContract {
        &self.contract
    }

    /// Normalize `sources`, generate a report and make it current.
    ///
    /// On success the documents are replaced and the history cleared. On
    /// failure the status becomes [`SessionStatus::Error`] and the previous
    /// report stays in place.
    pub async fn analyze(
        &mut self,
        sources: Vec<SourceDocument>,
        explicit_key: Option<&str>,
    ) -> Result<&Report> {
        info!(session = %self.id, documents = sources.len(), language = %self.language, "Starting analysis");

        let assembler = &self.assembler;
        let invoker = &self.invoker;
        let contract = &self.contract;
        let language = self.language;
        let mut guard = StatusGuard::enter(&mut self.status, SessionStatus::Parsing);

        let outcome = async {
            let documents = finsight_ingest::normalize_all(sources).await?;
            guard.set(SessionStatus::Analyzing);
            let request = assembler.assemble(&documents, language);
            let raw = invoker.invoke(&request, contract, explicit_key).await?;
            let report = validator::parse_report(&raw, contract)?;
            Ok::<_, Error>((report, documents))
        }
        .await;

        match outcome {
            Ok((report, documents)) => {
                guard.settle(SessionStatus::Complete);
                info!(
                    session = %self.id,
                    company = %report.company_name,
                    score = report.financial_health_score,
                    "Analysis complete"
                );
                self.documents = documents;
                self.history.clear();
                Ok(&*self.report.insert(report))
            }
            Err(e) => {
                guard.settle(SessionStatus::Error);
                warn!(session = %self.id, error = %e, "Analysis failed");
                Err(e)
            }
        }
    }

    /// Answer or apply one chat instruction against the current report.
    pub async fn ask(&mut self, instruction: &str, explicit_key: Option<&str>) -> Result<PatchOutcome> {
        let Some(report) = self.report.as_ref() else {
            return Err(Error::NoReport);
        };

        let attachments = self.assembler.attach(&self.documents);
        let engine = &self.patch;
        let invoker = &self.invoker;
        let contract = &self.contract;
        let history = &self.history;
        let language = self.language;
        let guard = StatusGuard::enter(&mut self.status, SessionStatus::Patching);

        let outcome = async {
            let request =
                engine.build_request(report, history, instruction, language, &attachments, contract)?;
            let raw = invoker
                .send(&request.instructions, request.parts, ResponseFormat::Json, explicit_key)
                .await?;
            let result = validator::parse_patch(&raw)?;
            let (updated, changed) = patch::apply(report, &result, contract)?;
            Ok::<_, Error>((result.answer, updated, changed))
        }
        .await;

        guard.settle(SessionStatus::Complete);
        let (answer, updated, changed_fields) = outcome.inspect_err(|e| {
            warn!(session = %self.id, error = %e, "Chat turn failed");
        })?;

        info!(session = %self.id, changed = ?changed_fields, "Chat turn applied");
        self.history.push(ChatTurn::user(instruction));
        self.history.push(ChatTurn::assistant(answer.clone()));
        self.report = Some(updated);

        Ok(PatchOutcome {
            answer,
            changed_fields,
        })
    }

    /// Drop the report, documents and history and return to idle.
    pub fn reset(&mut self) {
        info!(session = %self.id, "Session reset");
        self.id = Uuid::new_v4();
        self.status = SessionStatus::Idle;
        self.report = None;
        self.documents.clear();
        self.history.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{ScriptedProvider, report_json, text_response};
    use finsight_core::{ChatRole, ProviderError};
    use std::time::Duration;

    fn session(provider: Arc<ScriptedProvider>) -> Session {
        let invoker = AnalysisInvoker::new(provider, CredentialChain::new(), "gemini-2.5-flash");
        Session::new(invoker, Language::En)
    }

    fn csv() -> SourceDocument {
        SourceDocument::new("pl.csv", "Voce,2023\nRicavi,1200\n")
    }

    async fn analyzed(script: Vec<std::result::Result<finsight_core::ProviderResponse, ProviderError>>) -> (Session, Arc<ScriptedProvider>) {
        let mut all = vec![Ok(text_response(&report_json().to_string()))];
        all.extend(script);
        let provider = Arc::new(ScriptedProvider::new(all));
        let mut session = session(provider.clone());
        session.analyze(vec![csv()], Some("k")).await.unwrap();
        (session, provider)
    }

    #[tokio::test]
    async fn analyze_produces_a_complete_report() {
        let (session, provider) = analyzed(vec![]).await;
        assert_eq!(session.status(), SessionStatus::Complete);
        assert_eq!(session.report().unwrap().company_name, "Rossi S.r.l.");
        assert_eq!(session.documents().len(), 1);
        assert!(session.history().is_empty());

        let sent = provider.requests();
        assert!(sent[0].system.contains("English"));
    }

    #[tokio::test]
    async fn failed_analysis_keeps_previous_report() {
        let (mut session, _) = analyzed(vec![Ok(text_response("not json"))]).await;
        let before = session.report().cloned();

        let err = session.analyze(vec![csv()], Some("k")).await.unwrap_err();
        assert!(matches!(err, Error::MalformedResponse(_)));
        assert_eq!(session.status(), SessionStatus::Error);
        assert_eq!(session.report().cloned(), before);
    }

    #[tokio::test]
    async fn unsupported_upload_fails_before_generation() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let mut session = session(provider.clone());
        let err = session
            .analyze(vec![SourceDocument::new("notes.docx", vec![1, 2])], Some("k"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat { .. }));
        assert_eq!(session.status(), SessionStatus::Error);
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn missing_key_routes_to_credential_entry() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let mut session = session(provider);
        let err = session.analyze(vec![csv()], None).await.unwrap_err();
        assert!(err.requires_credential());
    }

    #[tokio::test]
    async fn ask_without_report_is_no_report() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let mut session = session(provider.clone());
        let err = session.ask("What is EBITDA?", Some("k")).await.unwrap_err();
        assert!(matches!(err, Error::NoReport));
        assert_eq!(session.status(), SessionStatus::Idle);
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn answer_only_turn_leaves_report_unchanged() {
        let (mut session, _) =
            analyzed(vec![Ok(text_response(r#"{"answer": "EBITDA is 1.2M."}"#))]).await;
        let before = session.report().cloned();

        let outcome = session.ask("What is EBITDA?", Some("k")).await.unwrap();
        assert_eq!(outcome.answer, "EBITDA is 1.2M.");
        assert!(!outcome.changed_report());
        assert_eq!(session.report().cloned(), before);
        assert_eq!(session.history().len(), 2);
        assert_eq!(session.history().turns()[0].role, ChatRole::User);
        assert_eq!(session.history().turns()[1].content, "EBITDA is 1.2M.");
        assert_eq!(session.status(), SessionStatus::Complete);
    }

    #[tokio::test]
    async fn patch_turn_overwrites_only_named_fields() {
        let reply = r#"{"answer": "Rewritten.", "updatedAnalysis": {"executiveSummary": "Shorter."}}"#;
        let (mut session, provider) = analyzed(vec![Ok(text_response(reply))]).await;
        let before = session.report().cloned().unwrap();

        let outcome = session.ask("Shorten the summary", Some("k")).await.unwrap();
        assert_eq!(outcome.changed_fields, vec!["executiveSummary".to_string()]);

        let after = session.report().unwrap();
        assert_eq!(after.executive_summary, "Shorter.");
        assert_eq!(after.kpis, before.kpis);
        assert_eq!(after.health_radar, before.health_radar);

        let patch_request = &provider.requests()[1];
        assert_eq!(patch_request.response_format, ResponseFormat::Json);
        assert!(patch_request.system.contains("Rossi S.r.l."));
    }

    #[tokio::test]
    async fn failed_turn_changes_nothing() {
        let bad = r#"{"answer": "Done.", "updatedAnalysis": {"financialHealthScore": 250}}"#;
        let (mut session, _) = analyzed(vec![
            Ok(text_response(bad)),
            Err(ProviderError::Network("reset".into())),
        ])
        .await;
        let before = session.report().cloned();

        assert!(matches!(
            session.ask("Raise the score", Some("k")).await,
            Err(Error::MalformedResponse(_))
        ));
        assert!(session.ask("Again", Some("k")).await.is_err());

        assert_eq!(session.report().cloned(), before);
        assert!(session.history().is_empty());
        assert_eq!(session.status(), SessionStatus::Complete);
    }

    #[tokio::test]
    async fn new_analysis_clears_history() {
        let (mut session, _) = analyzed(vec![
            Ok(text_response(r#"{"answer": "ok"}"#)),
            Ok(text_response(&report_json().to_string())),
        ])
        .await;
        session.ask("Hi", Some("k")).await.unwrap();
        assert_eq!(session.history().len(), 2);

        session.analyze(vec![csv()], Some("k")).await.unwrap();
        assert!(session.history().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_request_restores_status() {
        let (mut session, _) = analyzed(vec![]).await;
        let slow = Arc::new(
            ScriptedProvider::new(vec![Ok(text_response(r#"{"answer": "late"}"#))])
                .with_delay(Duration::from_secs(60)),
        );
        session.invoker = AnalysisInvoker::new(slow, CredentialChain::new(), "m");
        let before = session.report().cloned();

        let abandoned =
            tokio::time::timeout(Duration::from_secs(1), session.ask("Slow question", Some("k"))).await;
        assert!(abandoned.is_err());
        assert_eq!(session.status(), SessionStatus::Complete);
        assert_eq!(session.report().cloned(), before);
        assert!(session.history().is_empty());
    }

    #[tokio::test]
    async fn reset_returns_to_idle() {
        let (mut session, _) = analyzed(vec![]).await;
        let old_id = session.id();
        session.reset();
        assert_eq!(session.status(), SessionStatus::Idle);
        assert!(session.report().is_none());
        assert!(session.documents().is_empty());
        assert_ne!(session.id(), old_id);
    }

    #[test]
    fn from_config_uses_configured_language() {
        let mut config = AppConfig::default();
        config.language = "de".into();
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let session = Session::from_config(provider, &config);
        assert_eq!(session.language(), Language::De);
        assert_eq!(session.status(), SessionStatus::Idle);
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&SessionStatus::Patching).unwrap(), "\"patching\"");
        assert_eq!(SessionStatus::Analyzing.to_string(), "analyzing");
    }
}

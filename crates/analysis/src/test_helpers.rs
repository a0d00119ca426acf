//! Shared fixtures for the analysis tests.

use async_trait::async_trait;
use finsight_core::{Provider, ProviderError, ProviderRequest, ProviderResponse, Report};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// A complete, contract-conformant report as the generator would return it.
pub fn report_json() -> serde_json::Value {
    serde_json::json!({
        "companyName": "Rossi S.r.l.",
        "reportDate": "FY 2023",
        "executiveSummary": "Solid year.",
        "financialHealthScore": 72,
        "healthRadar": [
            {"subject": "Profitability", "A": 70, "fullMark": 100},
            {"subject": "Liquidity", "A": 60, "fullMark": 100},
            {"subject": "Solvency", "A": 80, "fullMark": 100},
            {"subject": "Efficiency", "A": 65, "fullMark": 100},
            {"subject": "Growth", "A": 55, "fullMark": 100}
        ],
        "kpis": [
            {"label": "EBITDA", "value": "1.2M", "unit": "EUR", "trend": "up", "color": "green", "insight": "Growing."},
            {"label": "ROE", "value": 12.5, "trend": "neutral", "color": "blue", "insight": "Stable."}
        ],
        "historicalData": [
            {"period": "2022", "revenue": 10.0, "profit": 1.0, "costs": 9.0, "ebitdaMargin": 15.0, "cashFlow": 0.5},
            {"period": "2023", "revenue": 12.0, "profit": 1.5, "costs": 10.5, "ebitdaMargin": 17.0, "cashFlow": 0.8}
        ],
        "swotAnalysis": {
            "strengths": ["Brand"],
            "weaknesses": ["Debt"],
            "opportunities": ["Export"],
            "threats": ["Rates"]
        },
        "profitabilityAnalysis": {"title": "Profitability", "content": "Margins improved."},
        "liquidityAnalysis": {"title": "Liquidity", "content": "Adequate."},
        "growthAnalysis": {"title": "Growth", "content": "Steady."},
        "strategicInsights": ["Focus on export"],
        "recommendations": ["Refinance debt"]
    })
}

pub fn sample_report() -> Report {
    serde_json::from_value(report_json()).unwrap()
}

pub fn text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        text: text.to_string(),
        usage: None,
        model: "scripted".into(),
        finish_reason: Some("STOP".into()),
    }
}

/// Replays canned responses in order and records every request it sees.
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Result<ProviderResponse, ProviderError>>>,
    seen: Mutex<Vec<ProviderRequest>>,
    delay: Option<Duration>,
}

impl ScriptedProvider {
    pub fn new(script: Vec<Result<ProviderResponse, ProviderError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            seen: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Sleep before answering, to exercise deadlines and cancellation.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.seen.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.seen.lock().unwrap().push(request);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::NotConfigured("script exhausted".into())))
    }
}

//! The financial report domain object and its nested value types.
//!
//! Field names on the wire are camelCase because the report is produced by,
//! and round-tripped through, a generation backend that speaks JSON.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

/// A complete financial analysis of one company.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub company_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_date: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub methodology: Option<String>,

    pub executive_summary: String,

    /// Overall score, 0–100.
    pub financial_health_score: f64,

    /// Exactly five scored dimensions.
    pub health_radar: Vec<RadarPoint>,

    pub kpis: Vec<Kpi>,

    pub historical_data: Vec<HistoricalRecord>,

    pub swot_analysis: Swot,

    pub profitability_analysis: AnalysisSection,

    pub liquidity_analysis: AnalysisSection,

    pub growth_analysis: AnalysisSection,

    pub strategic_insights: Vec<String>,

    pub recommendations: Vec<String>,

    /// Sections added through conversational edits.
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub custom_sections: Vec<CustomSection>,
}

impl Report {
    /// Top-level wire keys, in declaration order.
    pub const FIELDS: [&'static str; 15] = [
        "companyName",
        "reportDate",
        "methodology",
        "executiveSummary",
        "financialHealthScore",
        "healthRadar",
        "kpis",
        "historicalData",
        "swotAnalysis",
        "profitabilityAnalysis",
        "liquidityAnalysis",
        "growthAnalysis",
        "strategicInsights",
        "recommendations",
        "customSections",
    ];

    /// Whether `key` names a top-level report field.
    pub fn is_field(key: &str) -> bool {
        Self::FIELDS.contains(&key)
    }

    /// Overwrite a single top-level field from its JSON value.
    ///
    /// Returns `Ok(false)` when `key` is not a report field. On a type
    /// mismatch the field is left as it was.
    pub fn set_field(&mut self, key: &str, value: serde_json::Value) -> Result<bool, serde_json::Error> {
        match key {
            "companyName" => self.company_name = decode(value)?,
            "reportDate" => self.report_date = decode(value)?,
            "methodology" => self.methodology = decode(value)?,
            "executiveSummary" => self.executive_summary = decode(value)?,
            "financialHealthScore" => self.financial_health_score = decode(value)?,
            "healthRadar" => self.health_radar = decode(value)?,
            "kpis" => self.kpis = decode(value)?,
            "historicalData" => self.historical_data = decode(value)?,
            "swotAnalysis" => self.swot_analysis = decode(value)?,
            "profitabilityAnalysis" => self.profitability_analysis = decode(value)?,
            "liquidityAnalysis" => self.liquidity_analysis = decode(value)?,
            "growthAnalysis" => self.growth_analysis = decode(value)?,
            "strategicInsights" => self.strategic_insights = decode(value)?,
            "recommendations" => self.recommendations = decode(value)?,
            "customSections" => {
                // A null list clears the custom sections.
                let sections: Option<Vec<CustomSection>> = decode(value)?;
                self.custom_sections = sections.unwrap_or_default();
            }
            _ => return Ok(false),
        }
        Ok(true)
    }
}

fn decode<T: DeserializeOwned>(value: serde_json::Value) -> Result<T, serde_json::Error> {
    serde_json::from_value(value)
}

/// Generators send `null` for optional members they leave out.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// One axis of the health radar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadarPoint {
    /// Localized dimension label.
    pub subject: String,

    /// Score 0–100.
    #[serde(rename = "A")]
    pub score: f64,

    /// Scale maximum, always 100.
    #[serde(
        rename = "fullMark",
        default = "default_full_mark",
        deserialize_with = "full_mark_or_default"
    )]
    pub full_mark: f64,
}

fn default_full_mark() -> f64 {
    100.0
}

fn full_mark_or_default<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or_else(default_full_mark))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KpiColor {
    Green,
    Red,
    Blue,
    Yellow,
}

/// A KPI value as produced by the generator: either text ("12.4%") or a number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KpiValue {
    Number(f64),
    Text(String),
}

impl std::fmt::Display for KpiValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KpiValue::Number(n) => write!(f, "{n}"),
            KpiValue::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kpi {
    pub label: String,
    pub value: KpiValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    pub trend: Trend,
    pub color: KpiColor,
    pub insight: String,
}

/// Figures for one reporting period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalRecord {
    pub period: String,
    pub revenue: f64,
    pub profit: f64,
    pub costs: f64,
    /// EBITDA margin as a percentage (0–100).
    #[serde(rename = "ebitdaMargin")]
    pub ebitda_margin_percent: f64,
    pub cash_flow: f64,
    /// Additional numeric series the generator chose to chart.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Swot {
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub opportunities: Vec<String>,
    pub threats: Vec<String>,
}

/// A narrative section (profitability, liquidity, growth).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSection {
    pub title: String,
    pub content: String,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub key_takeaways: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Bar,
    Line,
    Area,
    Composed,
}

/// One plotted series of a [`ChartSpec`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSeries {
    pub key: String,
    pub color: String,
    pub name: String,
}

/// A chart description embedded in a custom section. Rendering is the
/// caller's concern; only the data travels here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartSpec {
    pub title: String,
    #[serde(rename = "type")]
    pub kind: ChartKind,
    pub data: Vec<serde_json::Map<String, serde_json::Value>>,
    pub x_axis_key: String,
    pub data_keys: Vec<ChartSeries>,
}

/// A user-requested section added through chat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomSection {
    #[serde(default = "new_section_id", deserialize_with = "section_id_or_new")]
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chart: Option<ChartSpec>,
}

fn new_section_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn section_id_or_new<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_else(new_section_id))
}

//! The report schema contract.
//!
//! One versioned descriptor drives both sides of the exchange: it renders the
//! JSON-Schema document sent with the analysis request, and it validates
//! whatever comes back before the typed [`Report`](finsight_core::Report) is
//! built. Keeping both in one place means the request and the check cannot
//! drift apart.

use serde_json::{Map, Value, json};

/// Version tag of the report contract.
pub const SCHEMA_VERSION: &str = "report/v1";

/// Number of dimensions on the health radar.
pub const RADAR_DIMENSIONS: usize = 5;

/// The shape of one field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    String,
    Number { min: Option<f64>, max: Option<f64> },
    /// A string or a number (KPI values).
    StringOrNumber,
    Enum(&'static [&'static str]),
    Array {
        items: Box<FieldKind>,
        exact_len: Option<usize>,
    },
    Object(Vec<FieldSpec>),
    /// Any JSON object (chart data rows).
    FreeForm,
}

/// A named field with its kind.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    pub description: &'static str,
}

impl FieldSpec {
    fn required(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: true,
            description: "",
        }
    }

    fn optional(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: false,
            description: "",
        }
    }

    fn describe(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }
}

/// One contract violation, located by its JSON path.
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// The versioned report contract.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaContract {
    version: &'static str,
    fields: Vec<FieldSpec>,
}

fn string() -> FieldKind {
    FieldKind::String
}

fn number() -> FieldKind {
    FieldKind::Number {
        min: None,
        max: None,
    }
}

fn score() -> FieldKind {
    FieldKind::Number {
        min: Some(0.0),
        max: Some(100.0),
    }
}

fn list(items: FieldKind) -> FieldKind {
    FieldKind::Array {
        items: Box::new(items),
        exact_len: None,
    }
}

fn section() -> FieldKind {
    FieldKind::Object(vec![
        FieldSpec::required("title", string()),
        FieldSpec::required("content", string()).describe("Long, detailed analysis."),
        FieldSpec::optional("keyTakeaways", list(string())),
    ])
}

impl SchemaContract {
    /// The `report/v1` contract.
    pub fn report() -> Self {
        let radar_point = FieldKind::Object(vec![
            FieldSpec::required("subject", string())
                .describe("Dimension name in the target language."),
            FieldSpec::required("A", score()).describe("Value 0-100."),
            FieldSpec::optional(
                "fullMark",
                FieldKind::Number {
                    min: Some(100.0),
                    max: Some(100.0),
                },
            )
            .describe("Always 100."),
        ]);

        let kpi = FieldKind::Object(vec![
            FieldSpec::required("label", string()).describe("KPI name in the target language."),
            FieldSpec::required("value", FieldKind::StringOrNumber),
            FieldSpec::optional("unit", string()),
            FieldSpec::required("trend", FieldKind::Enum(&["up", "down", "neutral"])),
            FieldSpec::required("color", FieldKind::Enum(&["green", "red", "blue", "yellow"])),
            FieldSpec::required("insight", string()).describe("Brief insight in the target language."),
        ]);

        let period = FieldKind::Object(vec![
            FieldSpec::required("period", string()),
            FieldSpec::required("revenue", number()),
            FieldSpec::required("profit", number()),
            FieldSpec::required("costs", number()),
            FieldSpec::required("ebitdaMargin", number()).describe("Percentage (0-100)."),
            FieldSpec::required("cashFlow", number()),
        ]);

        let swot = FieldKind::Object(vec![
            FieldSpec::required("strengths", list(string())),
            FieldSpec::required("weaknesses", list(string())),
            FieldSpec::required("opportunities", list(string())),
            FieldSpec::required("threats", list(string())),
        ]);

        let chart = FieldKind::Object(vec![
            FieldSpec::required("title", string()),
            FieldSpec::required("type", FieldKind::Enum(&["bar", "line", "area", "composed"])),
            FieldSpec::required("data", list(FieldKind::FreeForm))
                .describe("Rows keyed by xAxisKey and every dataKeys key."),
            FieldSpec::required("xAxisKey", string()),
            FieldSpec::required(
                "dataKeys",
                list(FieldKind::Object(vec![
                    FieldSpec::required("key", string()),
                    FieldSpec::required("color", string()).describe("Hex color."),
                    FieldSpec::required("name", string()),
                ])),
            ),
        ]);

        let custom_section = FieldKind::Object(vec![
            FieldSpec::optional("id", string()),
            FieldSpec::required("title", string()),
            FieldSpec::required("content", string()),
            FieldSpec::optional("chart", chart),
        ]);

        let fields = vec![
            FieldSpec::required("companyName", string())
                .describe("The exact company name found in the documents."),
            FieldSpec::optional("reportDate", string()).describe("Reference date (e.g. 'FY 2023')."),
            FieldSpec::optional("methodology", string())
                .describe("Brief note on how data was read and interpreted."),
            FieldSpec::required("executiveSummary", string())
                .describe("Very detailed discursive analysis (min 200 words)."),
            FieldSpec::required("financialHealthScore", score()).describe("General score 0-100."),
            FieldSpec::required(
                "healthRadar",
                FieldKind::Array {
                    items: Box::new(radar_point),
                    exact_len: Some(RADAR_DIMENSIONS),
                },
            )
            .describe("5 dimensions for the radar chart."),
            FieldSpec::required("kpis", list(kpi)),
            FieldSpec::required("historicalData", list(period)),
            FieldSpec::required("swotAnalysis", swot),
            FieldSpec::required("profitabilityAnalysis", section()),
            FieldSpec::required("liquidityAnalysis", section()),
            FieldSpec::required("growthAnalysis", section()),
            FieldSpec::required("strategicInsights", list(string())),
            FieldSpec::required("recommendations", list(string())),
            FieldSpec::optional("customSections", list(custom_section)),
        ];

        Self {
            version: SCHEMA_VERSION,
            fields,
        }
    }

    pub fn version(&self) -> &str {
        self.version
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Names of the top-level fields that must be present.
    pub fn mandatory(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().filter(|f| f.required).map(|f| f.name)
    }

    /// The full JSON-Schema document for a complete report.
    pub fn to_json_schema(&self) -> Value {
        object_schema(&self.fields, true)
    }

    /// Same shape, nothing required at the top level. Used for the
    /// `updatedAnalysis` member of a patch envelope.
    pub fn to_partial_json_schema(&self) -> Value {
        object_schema(&self.fields, false)
    }

    /// Schema of the conversational patch envelope.
    pub fn patch_envelope_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "answer": {
                    "type": "string",
                    "description": "Reply to the user, in the target language."
                },
                "updatedAnalysis": self.to_partial_json_schema(),
            },
            "required": ["answer"],
        })
    }

    /// Check a complete report value, collecting every violation.
    pub fn validate(&self, value: &Value) -> Result<(), Vec<Violation>> {
        let mut violations = Vec::new();
        check_object(&self.fields, value, "$", &mut violations);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }
}

impl Default for SchemaContract {
    fn default() -> Self {
        Self::report()
    }
}

fn object_schema(fields: &[FieldSpec], enforce_required: bool) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();
    for field in fields {
        let mut schema = kind_schema(&field.kind);
        if !field.description.is_empty() {
            schema["description"] = json!(field.description);
        }
        properties.insert(field.name.into(), schema);
        if field.required && enforce_required {
            required.push(json!(field.name));
        }
    }
    let mut schema = json!({ "type": "object", "properties": properties });
    if !required.is_empty() {
        schema["required"] = Value::Array(required);
    }
    schema
}

fn kind_schema(kind: &FieldKind) -> Value {
    match kind {
        FieldKind::String => json!({ "type": "string" }),
        FieldKind::Number { min, max } => {
            let mut schema = json!({ "type": "number" });
            if let Some(min) = min {
                schema["minimum"] = json!(min);
            }
            if let Some(max) = max {
                schema["maximum"] = json!(max);
            }
            schema
        }
        FieldKind::StringOrNumber => json!({ "type": ["string", "number"] }),
        FieldKind::Enum(values) => json!({ "type": "string", "enum": values }),
        FieldKind::Array { items, exact_len } => {
            let mut schema = json!({ "type": "array", "items": kind_schema(items) });
            if let Some(n) = exact_len {
                schema["minItems"] = json!(n);
                schema["maxItems"] = json!(n);
            }
            schema
        }
        FieldKind::Object(fields) => object_schema(fields, true),
        FieldKind::FreeForm => json!({ "type": "object" }),
    }
}

fn check_object(fields: &[FieldSpec], value: &Value, path: &str, out: &mut Vec<Violation>) {
    let Some(obj) = value.as_object() else {
        out.push(violation(path, "expected an object"));
        return;
    };
    for field in fields {
        let field_path = format!("{path}.{}", field.name);
        match obj.get(field.name) {
            None | Some(Value::Null) => {
                if field.required {
                    out.push(violation(&field_path, "missing required field"));
                }
            }
            Some(v) => check_kind(&field.kind, v, &field_path, out),
        }
    }
}

fn check_kind(kind: &FieldKind, value: &Value, path: &str, out: &mut Vec<Violation>) {
    match kind {
        FieldKind::String => {
            if !value.is_string() {
                out.push(violation(path, "expected a string"));
            }
        }
        FieldKind::Number { min, max } => match value.as_f64() {
            None => out.push(violation(path, "expected a number")),
            Some(n) => {
                if min.is_some_and(|min| n < min) || max.is_some_and(|max| n > max) {
                    out.push(violation(
                        path,
                        &format!(
                            "{n} is outside [{}, {}]",
                            min.map_or("-inf".into(), |m| m.to_string()),
                            max.map_or("inf".into(), |m| m.to_string())
                        ),
                    ));
                }
            }
        },
        FieldKind::StringOrNumber => {
            if !(value.is_string() || value.is_number()) {
                out.push(violation(path, "expected a string or a number"));
            }
        }
        FieldKind::Enum(allowed) => match value.as_str() {
            Some(s) if allowed.contains(&s) => {}
            _ => out.push(violation(
                path,
                &format!("expected one of {}", allowed.join(", ")),
            )),
        },
        FieldKind::Array { items, exact_len } => {
            let Some(arr) = value.as_array() else {
                out.push(violation(path, "expected an array"));
                return;
            };
            if let Some(n) = exact_len
                && arr.len() != *n
            {
                out.push(violation(
                    path,
                    &format!("expected exactly {n} entries, got {}", arr.len()),
                ));
            }
            for (i, item) in arr.iter().enumerate() {
                check_kind(items, item, &format!("{path}[{i}]"), out);
            }
        }
        FieldKind::Object(fields) => check_object(fields, value, path, out),
        FieldKind::FreeForm => {
            if !value.is_object() {
                out.push(violation(path, "expected an object"));
            }
        }
    }
}

fn violation(path: &str, message: &str) -> Violation {
    Violation {
        path: path.into(),
        message: message.into(),
    }
}

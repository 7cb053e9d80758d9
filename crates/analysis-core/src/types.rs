use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

use crate::timeline::{FinancialTimeline, PeriodLabel, RatioTimeline};

const NOT_AVAILABLE: &str = "N/A";

/// Provider key for the current-period net profit margin (percent).
pub const CURRENT_PROFIT_MARGIN_KEY: &str = "netProfitMarginAnnual";

/// Provider metric that is either a number or unavailable.
///
/// Numbers, numeric strings, nulls and the literal "N/A" all fold into this
/// type at deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum MetricValue {
    Known(f64),
    #[default]
    Unknown,
}

impl MetricValue {
    pub fn known(self) -> Option<f64> {
        match self {
            MetricValue::Known(v) => Some(v),
            MetricValue::Unknown => None,
        }
    }
}

impl From<f64> for MetricValue {
    fn from(value: f64) -> Self {
        if value.is_finite() {
            MetricValue::Known(value)
        } else {
            MetricValue::Unknown
        }
    }
}

impl From<Option<f64>> for MetricValue {
    fn from(value: Option<f64>) -> Self {
        value.map(MetricValue::from).unwrap_or_default()
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Known(v) => write!(f, "{}", v),
            MetricValue::Unknown => f.write_str(NOT_AVAILABLE),
        }
    }
}

impl Serialize for MetricValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            MetricValue::Known(v) => serializer.serialize_f64(*v),
            MetricValue::Unknown => serializer.serialize_str(NOT_AVAILABLE),
        }
    }
}

impl<'de> Deserialize<'de> for MetricValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = serde_json::Value::deserialize(deserializer)?;
        Ok(match raw {
            serde_json::Value::Number(n) => n.as_f64().into(),
            serde_json::Value::String(text) => text.trim().parse::<f64>().ok().into(),
            _ => MetricValue::Unknown,
        })
    }
}

fn not_available() -> String {
    NOT_AVAILABLE.to_string()
}

fn text_or_not_available<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let text = Option::<String>::deserialize(deserializer)?;
    Ok(text
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(not_available))
}

/// Historical series attached to a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MultiYearData {
    #[serde(default)]
    pub financial_data: FinancialTimeline,
    #[serde(default)]
    pub ratios_timeline: RatioTimeline,
}

/// Current and historical data fetched for one ticker at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanySnapshot {
    #[serde(default = "not_available", deserialize_with = "text_or_not_available")]
    pub name: String,
    #[serde(default = "not_available", deserialize_with = "text_or_not_available")]
    pub sector: String,
    #[serde(default = "not_available", deserialize_with = "text_or_not_available")]
    pub industry: String,
    #[serde(rename = "marketCap", default)]
    pub market_cap: MetricValue,
    #[serde(rename = "currentPrice", default)]
    pub current_price: MetricValue,
    #[serde(rename = "52WeekHigh", default)]
    pub week_52_high: MetricValue,
    #[serde(rename = "52WeekLow", default)]
    pub week_52_low: MetricValue,
    #[serde(default = "not_available", deserialize_with = "text_or_not_available")]
    pub description: String,
    #[serde(default)]
    pub metric: BTreeMap<String, MetricValue>,
    #[serde(default)]
    pub multi_year_data: Option<MultiYearData>,
}

impl Default for CompanySnapshot {
    fn default() -> Self {
        Self {
            name: not_available(),
            sector: not_available(),
            industry: not_available(),
            market_cap: MetricValue::Unknown,
            current_price: MetricValue::Unknown,
            week_52_high: MetricValue::Unknown,
            week_52_low: MetricValue::Unknown,
            description: not_available(),
            metric: BTreeMap::new(),
            multi_year_data: None,
        }
    }
}

impl CompanySnapshot {
    /// Current-period metric by provider key; missing keys are `Unknown`.
    pub fn metric(&self, key: &str) -> MetricValue {
        self.metric.get(key).copied().unwrap_or_default()
    }

    pub fn has_historical_data(&self) -> bool {
        self.multi_year_data
            .as_ref()
            .map_or(false, |data| !data.financial_data.is_empty())
    }
}

/// One regulatory filing descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecFiling {
    #[serde(default = "not_available", deserialize_with = "text_or_not_available")]
    pub form: String,
    #[serde(default = "not_available", deserialize_with = "text_or_not_available")]
    pub date: String,
    #[serde(default)]
    pub link: String,
}

/// Raw per-year financial report record from a fundamentals provider.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AnnualReport {
    #[serde(alias = "year", alias = "date", alias = "fiscalDateEnding")]
    pub period: PeriodLabel,
    #[serde(rename = "totalRevenue", default)]
    pub total_revenue: Option<f64>,
    #[serde(rename = "netIncome", default)]
    pub net_income: Option<f64>,
}

/// How an analysis was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnalysisMethod {
    #[serde(rename = "RAG-Enhanced")]
    RagEnhanced,
    #[serde(rename = "Standard AI")]
    StandardAi,
    Error,
}

impl AnalysisMethod {
    pub fn to_label(&self) -> &'static str {
        match self {
            AnalysisMethod::RagEnhanced => "RAG-Enhanced",
            AnalysisMethod::StandardAi => "Standard AI",
            AnalysisMethod::Error => "Error",
        }
    }
}

impl fmt::Display for AnalysisMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_label())
    }
}

/// Narrative answer to one user query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub analysis: String,
    pub method: AnalysisMethod,
    /// Historical documents actually placed in the prompt
    pub context_sources: usize,
    /// Non-fatal problem met on the way, e.g. a retrieval index that failed to build
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

impl AnalysisResult {
    pub fn rag_enhanced(analysis: String, context_sources: usize) -> Self {
        Self {
            analysis,
            method: AnalysisMethod::RagEnhanced,
            context_sources,
            notice: None,
        }
    }

    pub fn standard(analysis: String) -> Self {
        Self {
            analysis,
            method: AnalysisMethod::StandardAi,
            context_sources: 0,
            notice: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            analysis: message,
            method: AnalysisMethod::Error,
            context_sources: 0,
            notice: None,
        }
    }

    pub fn with_notice(mut self, notice: Option<String>) -> Self {
        self.notice = notice;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
}

/// Three-way stability classification shared by revenue range and margin volatility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StabilityClass {
    #[serde(rename = "highly stable")]
    HighlyStable,
    #[serde(rename = "moderately stable")]
    ModeratelyStable,
    #[serde(rename = "volatile")]
    Volatile,
}

impl StabilityClass {
    /// Classify `value` as highly stable below `stable_below`, moderately
    /// stable below `moderate_below`, volatile otherwise.
    pub fn classify(value: f64, stable_below: f64, moderate_below: f64) -> Self {
        if value < stable_below {
            StabilityClass::HighlyStable
        } else if value < moderate_below {
            StabilityClass::ModeratelyStable
        } else {
            StabilityClass::Volatile
        }
    }

    pub fn to_label(&self) -> &'static str {
        match self {
            StabilityClass::HighlyStable => "highly stable",
            StabilityClass::ModeratelyStable => "moderately stable",
            StabilityClass::Volatile => "volatile",
        }
    }
}

/// Forward-looking estimate derived from ratio history, without the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PredictiveInsight {
    RevenuePrediction {
        metric: String,
        /// Percent
        predicted_value: f64,
        confidence: Confidence,
        reasoning: String,
    },
    MarginStability {
        metric: String,
        stability: StabilityClass,
        average_margin: f64,
        /// Population standard deviation of the margin series
        volatility: f64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_metric_value_from_provider_json() {
        let values: Vec<MetricValue> =
            serde_json::from_value(json!([28.5, "N/A", null, "12.5", true])).unwrap();
        assert_eq!(
            values,
            vec![
                MetricValue::Known(28.5),
                MetricValue::Unknown,
                MetricValue::Unknown,
                MetricValue::Known(12.5),
                MetricValue::Unknown,
            ]
        );
    }

    #[test]
    fn test_metric_value_display_and_serialize() {
        assert_eq!(MetricValue::Known(1.5).to_string(), "1.5");
        assert_eq!(MetricValue::Unknown.to_string(), "N/A");
        assert_eq!(serde_json::to_value(MetricValue::Unknown).unwrap(), json!("N/A"));
        assert_eq!(MetricValue::from(f64::NAN), MetricValue::Unknown);
    }

    #[test]
    fn test_snapshot_deserialize_with_defaults() {
        let snapshot: CompanySnapshot = serde_json::from_value(json!({
            "name": "Apple Inc",
            "sector": null,
            "marketCap": 2900000.0,
            "currentPrice": "N/A",
            "52WeekHigh": 199.6,
            "metric": {"peNormalizedAnnual": 28.5, "52WeekHighDate": "2024-07-15"},
            "multi_year_data": {
                "financial_data": {
                    "revenue": {"dates": [2021, 2022], "values": [365.8e9, 394.3e9]}
                }
            }
        }))
        .unwrap();

        assert_eq!(snapshot.name, "Apple Inc");
        assert_eq!(snapshot.sector, "N/A");
        assert_eq!(snapshot.current_price, MetricValue::Unknown);
        assert_eq!(snapshot.metric("peNormalizedAnnual"), MetricValue::Known(28.5));
        assert_eq!(snapshot.metric("52WeekHighDate"), MetricValue::Unknown);
        assert_eq!(snapshot.metric("missing"), MetricValue::Unknown);
        assert!(snapshot.has_historical_data());
    }

    #[test]
    fn test_snapshot_without_history() {
        let snapshot: CompanySnapshot =
            serde_json::from_value(json!({"multi_year_data": {"financial_data": {}}})).unwrap();
        assert!(!snapshot.has_historical_data());
        assert!(!CompanySnapshot::default().has_historical_data());
    }

    #[test]
    fn test_annual_report_aliases() {
        let reports: Vec<AnnualReport> = serde_json::from_value(json!([
            {"year": 2022, "totalRevenue": 100.0, "netIncome": null},
            {"fiscalDateEnding": "2021-12-31", "totalRevenue": 90.0}
        ]))
        .unwrap();
        assert_eq!(reports[0].period, PeriodLabel::Year(2022));
        assert_eq!(reports[0].net_income, None);
        assert_eq!(reports[1].period, PeriodLabel::Text("2021-12-31".into()));
    }

    #[test]
    fn test_analysis_method_serializes_to_labels() {
        let result = AnalysisResult::rag_enhanced("text".into(), 2);
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["method"], "RAG-Enhanced");
        assert_eq!(value["context_sources"], 2);
        assert!(value.get("notice").is_none());
        assert_eq!(AnalysisMethod::StandardAi.to_string(), "Standard AI");
    }

    #[test]
    fn test_predictive_insight_tagging() {
        let insight = PredictiveInsight::MarginStability {
            metric: "Profit Margin Stability".into(),
            stability: StabilityClass::HighlyStable,
            average_margin: 20.0,
            volatility: 1.0,
        };
        let value = serde_json::to_value(&insight).unwrap();
        assert_eq!(value["type"], "margin_stability");
        assert_eq!(value["stability"], "highly stable");
    }
}

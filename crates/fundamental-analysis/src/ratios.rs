use analysis_core::{CompanySnapshot, MetricValue, CURRENT_PROFIT_MARGIN_KEY};

/// Display label and provider metric key for each current-period ratio.
const RATIO_FIELDS: &[(&str, &str)] = &[
    ("P/E Ratio", "peNormalizedAnnual"),
    ("Debt/Equity", "totalDebt/totalEquityAnnual"),
    ("ROE", "roeAnnual"),
    ("Current Ratio", "currentRatioAnnual"),
    ("Price/Sales", "psAnnual"),
    ("Quick Ratio", "quickRatioAnnual"),
    ("Gross Margin", "grossMarginAnnual"),
    ("EBITDA Margin", "ebitdaMarginAnnual"),
];

/// Label and provider metric key for each line of the trend summary.
const TREND_FIELDS: &[(&str, &str)] = &[
    ("Revenue Growth YoY", "revenueGrowthTTMYoy"),
    ("Net Profit Margin", CURRENT_PROFIT_MARGIN_KEY),
    ("EPS Growth YoY", "epsGrowthTTMYoy"),
    ("Return on Assets", "roaAnnual"),
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurrentRatio {
    pub label: &'static str,
    pub value: MetricValue,
}

/// Key ratios from the snapshot's current metrics, in display order.
pub fn compute_ratios(snapshot: &CompanySnapshot) -> Vec<CurrentRatio> {
    RATIO_FIELDS
        .iter()
        .map(|&(label, key)| CurrentRatio {
            label,
            value: snapshot.metric(key),
        })
        .collect()
}

/// Look up one computed ratio by label.
pub fn ratio_value(ratios: &[CurrentRatio], label: &str) -> MetricValue {
    ratios
        .iter()
        .find(|r| r.label == label)
        .map(|r| r.value)
        .unwrap_or_default()
}

fn format_percent(value: MetricValue) -> String {
    match value {
        MetricValue::Known(v) => format!("{:.2}%", v * 100.0),
        MetricValue::Unknown => "N/A".to_string(),
    }
}

/// Multi-line textual trend summary used in prompts.
pub fn summarize_trends(snapshot: &CompanySnapshot) -> String {
    TREND_FIELDS
        .iter()
        .map(|(label, key)| format!("{}: {}", label, format_percent(snapshot.metric(key))))
        .collect::<Vec<_>>()
        .join("\n")
}

use analysis_core::{
    metric, Confidence, FinancialTimeline, MetricValue, RatioTimeline, Series, StabilityClass,
    CURRENT_PROFIT_MARGIN_KEY,
};
use statrs::statistics::Statistics;
use std::collections::BTreeMap;

use crate::document::{
    Document, DocumentCorpus, DocumentFacts, DocumentKind, DocumentMetadata, GrowthOutlook,
    TrendDirection,
};

/// Periods compared by the trend and projection documents
const WINDOW: usize = 3;

const PROJECTION_CAP: f64 = 15.0;
const PROJECTION_FLOOR: f64 = 1.0;

/// Max/min revenue ratio bands
const RANGE_STABLE_BELOW: f64 = 1.5;
const RANGE_MODERATE_BELOW: f64 = 2.0;

/// Converts normalized timelines into natural-language documents.
///
/// Expects ascending timelines. Absent metric families simply produce no
/// documents; synthesis itself never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentSynthesizer;

impl DocumentSynthesizer {
    pub fn new() -> Self {
        Self
    }

    pub fn synthesize(
        &self,
        ticker: &str,
        financial: &FinancialTimeline,
        ratios: &RatioTimeline,
        current_metrics: &BTreeMap<String, MetricValue>,
    ) -> DocumentCorpus {
        let mut docs = DocBuilder {
            ticker,
            documents: Vec::new(),
        };

        let revenue = financial.non_empty(metric::REVENUE);
        if let Some(revenue) = revenue {
            self.revenue_documents(&mut docs, revenue);
        }
        if let Some(net_income) = financial.non_empty(metric::NET_INCOME) {
            self.net_income_documents(&mut docs, net_income);
        }
        let growth = ratios.non_empty(metric::REVENUE_GROWTH);
        if let Some(growth) = growth {
            self.growth_documents(&mut docs, growth);
        }
        let margins = ratios.non_empty(metric::PROFIT_MARGIN);
        if let Some(margins) = margins {
            self.margin_documents(&mut docs, margins);
        }
        if let Some(revenue) = revenue {
            self.trend_document(&mut docs, revenue);
        }
        if let Some(growth) = growth {
            self.projection_document(&mut docs, growth);
        }
        if let Some(margins) = margins {
            let current = current_metrics
                .get(CURRENT_PROFIT_MARGIN_KEY)
                .copied()
                .unwrap_or_default();
            if let MetricValue::Known(current) = current {
                self.comparison_document(&mut docs, current, margins);
            }
        }
        if let Some(revenue) = revenue {
            self.stability_document(&mut docs, revenue);
        }

        tracing::debug!("Synthesized {} documents for {}", docs.documents.len(), ticker);
        DocumentCorpus::new(ticker, docs.documents)
    }

    fn revenue_documents(&self, docs: &mut DocBuilder<'_>, revenue: &Series) {
        let values = revenue.values();
        for (i, (date, value)) in revenue.iter().enumerate() {
            let mut text = format!(
                "In {}, {} reported total revenue of ${:.2} billion.",
                date,
                docs.ticker,
                value / 1e9
            );
            if let Some(&prev) = i.checked_sub(1).and_then(|p| values.get(p)) {
                if prev != 0.0 {
                    let growth = (value - prev) / prev * 100.0;
                    text.push_str(&format!(
                        " This represents a {:+.1}% change from the previous year.",
                        growth
                    ));
                }
            }
            docs.push(text, DocumentKind::Revenue, period_facts(date, value));
        }
    }

    fn net_income_documents(&self, docs: &mut DocBuilder<'_>, net_income: &Series) {
        let values = net_income.values();
        for (i, (date, value)) in net_income.iter().enumerate() {
            let mut text = format!(
                "In {}, {} reported net income of ${:.2} billion.",
                date,
                docs.ticker,
                value / 1e9
            );
            if let Some(&prev) = i.checked_sub(1).and_then(|p| values.get(p)) {
                if prev != 0.0 {
                    let change = (value - prev) / prev * 100.0;
                    text.push_str(&format!(
                        " Net income {} by {:.1}% year-over-year.",
                        if change > 0.0 { "increased" } else { "decreased" },
                        change.abs()
                    ));
                }
            }
            docs.push(text, DocumentKind::NetIncome, period_facts(date, value));
        }
    }

    fn growth_documents(&self, docs: &mut DocBuilder<'_>, growth: &Series) {
        for (date, rate) in growth.iter() {
            let text = format!(
                "In {}, {} experienced {} revenue growth of {:+.1}%.",
                date,
                docs.ticker,
                describe_growth(rate),
                rate
            );
            docs.push(text, DocumentKind::RevenueGrowth, period_facts(date, rate));
        }
    }

    fn margin_documents(&self, docs: &mut DocBuilder<'_>, margins: &Series) {
        for (date, margin) in margins.iter() {
            let text = format!(
                "In {}, {} maintained a {} profit margin of {:.1}%.",
                date,
                docs.ticker,
                describe_margin(margin),
                margin
            );
            docs.push(text, DocumentKind::ProfitMargin, period_facts(date, margin));
        }
    }

    /// Compares the two most recent year-over-year revenue growth rates.
    fn trend_document(&self, docs: &mut DocBuilder<'_>, revenue: &Series) {
        if revenue.len() < WINDOW {
            return;
        }
        let window = revenue.tail(WINDOW);
        let (dates, values) = (window.dates(), window.values());
        if values[0] == 0.0 || values[1] == 0.0 {
            return;
        }

        let earlier = (values[1] - values[0]) / values[0] * 100.0;
        let recent = (values[2] - values[1]) / values[1] * 100.0;
        let trend = if recent > earlier {
            TrendDirection::Accelerating
        } else if recent < earlier {
            TrendDirection::Decelerating
        } else {
            TrendDirection::Stable
        };

        let period = format!("{}-{}", dates[0], dates[2]);
        let text = format!(
            "Over the period {}, {} shows {} revenue growth patterns. Growth was {:.1}% in {} and {:.1}% in {}.",
            period,
            docs.ticker,
            trend.to_label(),
            earlier,
            dates[1],
            recent,
            dates[2]
        );
        docs.push(
            text,
            DocumentKind::TrendAnalysis,
            DocumentFacts::Trend {
                period,
                trend,
                earlier_growth: earlier,
                recent_growth: recent,
            },
        );
    }

    /// Projects next-period growth from the magnitudes of the last three growth rates.
    fn projection_document(&self, docs: &mut DocBuilder<'_>, growth: &Series) {
        if growth.len() < WINDOW {
            return;
        }
        let window = growth.tail(WINDOW);
        let magnitudes: Vec<f64> = window
            .values()
            .iter()
            .filter(|v| v.is_finite())
            .map(|v| v.abs())
            .collect();
        if magnitudes.is_empty() {
            return;
        }

        let average = magnitudes.as_slice().mean();
        let (prediction, projected) = match magnitudes.as_slice() {
            [earlier, .., recent] if *recent > earlier * 1.1 => {
                (GrowthOutlook::Improving, (recent * 1.05).min(PROJECTION_CAP))
            }
            [earlier, .., recent] if *recent < earlier * 0.9 => {
                (GrowthOutlook::Declining, (recent * 0.95).max(PROJECTION_FLOOR))
            }
            _ => (GrowthOutlook::Stable, average),
        };

        let dates = window.dates();
        let text = format!(
            "Based on {}'s historical performance from {} to {}, the company shows {} growth trends with average growth of {:.1}%. If trends continue, projected growth for next year could be around {:.1}%.",
            docs.ticker,
            dates[0],
            dates[dates.len() - 1],
            prediction.to_label(),
            average,
            projected
        );
        docs.push(
            text,
            DocumentKind::PredictiveAnalysis,
            DocumentFacts::Projection {
                prediction,
                average_growth: average,
                projected_growth: projected,
                confidence: Confidence::Medium,
            },
        );
    }

    fn comparison_document(&self, docs: &mut DocBuilder<'_>, current: f64, margins: &Series) {
        let historical_average = margins.values().mean();
        let comparison = if current > historical_average {
            "improved"
        } else {
            "declined"
        };
        let text = format!(
            "{} current profit margin of {:.1}% has {} compared to historical average of {:.1}%.",
            docs.ticker, current, comparison, historical_average
        );
        docs.push(
            text,
            DocumentKind::Comparison,
            DocumentFacts::Comparison {
                metric: metric::PROFIT_MARGIN.to_string(),
                current,
                historical_average,
            },
        );
    }

    fn stability_document(&self, docs: &mut DocBuilder<'_>, revenue: &Series) {
        if revenue.len() < 2 {
            return;
        }
        let values = revenue.values();
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let range_factor = if min > 0.0 { max / min } else { 1.0 };
        let stability =
            StabilityClass::classify(range_factor, RANGE_STABLE_BELOW, RANGE_MODERATE_BELOW);

        let text = format!(
            "{} shows {} revenue patterns with a range factor of {:.1}x over the analyzed period.",
            docs.ticker,
            stability.to_label(),
            range_factor
        );
        docs.push(
            text,
            DocumentKind::Stability,
            DocumentFacts::Stability {
                metric: metric::REVENUE.to_string(),
                range_factor,
                stability,
            },
        );
    }
}

struct DocBuilder<'a> {
    ticker: &'a str,
    documents: Vec<Document>,
}

impl DocBuilder<'_> {
    fn push(&mut self, text: String, kind: DocumentKind, facts: DocumentFacts) {
        let metadata = DocumentMetadata {
            kind,
            ticker: self.ticker.to_string(),
            facts,
        };
        self.documents.push(Document::new(text, metadata));
    }
}

fn period_facts(date: &str, value: f64) -> DocumentFacts {
    DocumentFacts::Period {
        year: date.to_string(),
        value,
    }
}

fn describe_growth(rate: f64) -> &'static str {
    if rate > 10.0 {
        "strong"
    } else if rate > 5.0 {
        "moderate"
    } else if rate > 0.0 {
        "modest"
    } else {
        "negative"
    }
}

fn describe_margin(margin: f64) -> &'static str {
    if margin > 20.0 {
        "excellent"
    } else if margin > 15.0 {
        "strong"
    } else if margin > 10.0 {
        "healthy"
    } else {
        "concerning"
    }
}

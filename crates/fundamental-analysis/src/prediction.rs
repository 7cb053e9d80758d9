use analysis_core::{metric, Confidence, PredictiveInsight, RatioTimeline, StabilityClass};
use statrs::statistics::Statistics;

/// Minimum ratio periods before any estimate is attempted
const MIN_PERIODS: usize = 3;

const GROWTH_CEILING: f64 = 12.0;
const GROWTH_FLOOR_DECLINING: f64 = 2.0;
const GROWTH_FLOOR: f64 = 1.0;
const DEFAULT_GROWTH: f64 = 5.0;

/// Margin standard deviation bands (percentage points)
const MARGIN_STABLE_BELOW: f64 = 2.0;
const MARGIN_MODERATE_BELOW: f64 = 5.0;

/// Forward-looking estimates from ratio history. Pure: holds no state.
#[derive(Debug, Clone, Copy, Default)]
pub struct PredictiveInsightEstimator;

impl PredictiveInsightEstimator {
    pub fn new() -> Self {
        Self
    }

    /// Zero, one or two insights depending on available history.
    pub fn predict(&self, ratios: &RatioTimeline) -> Vec<PredictiveInsight> {
        let mut insights = Vec::new();

        if let Some(insight) = self.revenue_prediction(ratios) {
            insights.push(insight);
        }
        if let Some(insight) = self.margin_stability(ratios) {
            insights.push(insight);
        }

        tracing::debug!("Produced {} predictive insights", insights.len());
        insights
    }

    fn revenue_prediction(&self, ratios: &RatioTimeline) -> Option<PredictiveInsight> {
        let growth = ratios.get(metric::REVENUE_GROWTH)?;
        if growth.len() < MIN_PERIODS {
            return None;
        }

        let recent: Vec<f64> = growth
            .tail(MIN_PERIODS)
            .values()
            .iter()
            .filter(|v| v.is_finite())
            .map(|v| v.abs())
            .collect();

        let (predicted_value, confidence) = match recent.as_slice() {
            [] => (DEFAULT_GROWTH, Confidence::Low),
            [only] => (*only, Confidence::Low),
            [.., previous, latest] => {
                let predicted = if latest > previous {
                    (latest * 1.02).min(GROWTH_CEILING).max(GROWTH_FLOOR)
                } else {
                    (latest * 0.98).max(GROWTH_FLOOR_DECLINING).min(GROWTH_CEILING)
                };
                (predicted, Confidence::Medium)
            }
        };

        Some(PredictiveInsight::RevenuePrediction {
            metric: "Revenue Growth".to_string(),
            predicted_value,
            confidence,
            reasoning: format!("Based on {} years of historical data", recent.len()),
        })
    }

    fn margin_stability(&self, ratios: &RatioTimeline) -> Option<PredictiveInsight> {
        let margins = ratios.get(metric::PROFIT_MARGIN)?.values();
        if margins.len() < MIN_PERIODS {
            return None;
        }

        let volatility = margins.population_std_dev();
        let average_margin = margins.mean();

        Some(PredictiveInsight::MarginStability {
            metric: "Profit Margin Stability".to_string(),
            stability: StabilityClass::classify(volatility, MARGIN_STABLE_BELOW, MARGIN_MODERATE_BELOW),
            average_margin,
            volatility,
        })
    }
}

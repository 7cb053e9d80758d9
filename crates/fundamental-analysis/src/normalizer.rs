use analysis_core::{
    metric, AnalysisError, AnnualReport, FinancialTimeline, MultiYearData, RatioTimeline, Series, Timeline,
};
use std::collections::HashMap;

/// Periods kept per series after normalization
pub const DEFAULT_MAX_PERIODS: usize = 6;

/// Turns provider records or provider timelines into ascending, truncated
/// timelines plus the ratios derived from them.
///
/// Every timeline that leaves the normalizer is sorted oldest-first, so
/// growth math downstream never sees provider-native ordering.
#[derive(Debug, Clone)]
pub struct TimelineNormalizer {
    max_periods: usize,
}

impl TimelineNormalizer {
    pub fn new() -> Self {
        Self {
            max_periods: DEFAULT_MAX_PERIODS,
        }
    }

    pub fn with_max_periods(max_periods: usize) -> Self {
        Self {
            max_periods: max_periods.max(1),
        }
    }

    /// Normalize raw per-year report records.
    ///
    /// Records with neither revenue nor net income are not usable periods.
    /// A missing field on a usable period counts as zero. Later records for
    /// an already-seen period replace the earlier one.
    pub fn normalize(
        &self,
        records: &[AnnualReport],
    ) -> Result<(FinancialTimeline, RatioTimeline), AnalysisError> {
        let mut periods: Vec<(String, f64, f64)> = Vec::new();
        let mut index_by_period: HashMap<String, usize> = HashMap::new();

        for record in records {
            if record.total_revenue.is_none() && record.net_income.is_none() {
                continue;
            }
            let period = String::from(record.period.clone());
            let row = (
                period.clone(),
                record.total_revenue.unwrap_or(0.0),
                record.net_income.unwrap_or(0.0),
            );
            match index_by_period.get(&period) {
                Some(&i) => periods[i] = row,
                None => {
                    index_by_period.insert(period, periods.len());
                    periods.push(row);
                }
            }
        }

        if periods.is_empty() {
            tracing::debug!("No usable annual periods in {} records", records.len());
            return Ok((Timeline::new(), Timeline::new()));
        }

        let revenue = Series::from_pairs(periods.iter().map(|(p, r, _)| (p.clone(), *r)))?;
        let net_income = Series::from_pairs(periods.iter().map(|(p, _, n)| (p.clone(), *n)))?;

        let mut financial = Timeline::new();
        financial.insert(metric::REVENUE, revenue);
        financial.insert(metric::NET_INCOME, net_income);

        Ok(self.normalize_timeline(&financial))
    }

    /// Sort and truncate an already-shaped financial timeline, then derive ratios.
    pub fn normalize_timeline(&self, financial: &FinancialTimeline) -> (FinancialTimeline, RatioTimeline) {
        let normalized: FinancialTimeline = financial
            .iter()
            .filter(|(_, series)| !series.is_empty())
            .map(|(name, series)| (name.to_string(), series.sorted().tail(self.max_periods)))
            .collect();

        let ratios = derive_ratios(&normalized);
        (normalized, ratios)
    }

    /// Normalize a snapshot's attached history: re-derive ratios from the
    /// financial series, then keep provider ratios the derivation lacks.
    pub fn normalize_history(&self, data: &MultiYearData) -> (FinancialTimeline, RatioTimeline) {
        let (financial, mut ratios) = self.normalize_timeline(&data.financial_data);
        self.merge_provided_ratios(&mut ratios, &data.ratios_timeline);
        (financial, ratios)
    }

    /// Sort and truncate provider ratio series, keeping only names absent from `derived`.
    pub fn merge_provided_ratios(&self, derived: &mut RatioTimeline, provided: &RatioTimeline) {
        for (name, series) in provided.iter() {
            if series.is_empty() || derived.non_empty(name).is_some() {
                continue;
            }
            derived.insert(name, series.sorted().tail(self.max_periods));
        }
    }
}

impl Default for TimelineNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Derive `revenue_growth` and `profit_margin` from an ascending financial timeline.
///
/// Growth skips periods whose previous revenue is zero; margin covers only
/// periods present in both revenue and net income with non-zero revenue.
pub fn derive_ratios(financial: &FinancialTimeline) -> RatioTimeline {
    let mut ratios = Timeline::new();

    if let Some(revenue) = financial.non_empty(metric::REVENUE) {
        let growth: Vec<(String, f64)> = revenue
            .dates()
            .windows(2)
            .zip(revenue.values().windows(2))
            .filter(|(_, v)| v[0] != 0.0)
            .map(|(d, v)| (d[1].clone(), (v[1] - v[0]) / v[0] * 100.0))
            .collect();
        if !growth.is_empty() {
            // Dates come from a validated series, so they are unique
            if let Ok(series) = Series::from_pairs(growth) {
                ratios.insert(metric::REVENUE_GROWTH, series);
            }
        }

        if let Some(net_income) = financial.non_empty(metric::NET_INCOME) {
            let margins: Vec<(String, f64)> = revenue
                .iter()
                .filter(|(_, rev)| *rev != 0.0)
                .filter_map(|(date, rev)| {
                    net_income
                        .get(date)
                        .map(|income| (date.to_string(), income / rev * 100.0))
                })
                .collect();
            if !margins.is_empty() {
                if let Ok(series) = Series::from_pairs(margins) {
                    ratios.insert(metric::PROFIT_MARGIN, series);
                }
            }
        }
    }

    ratios
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::PeriodLabel;

    fn report(year: i64, revenue: Option<f64>, net_income: Option<f64>) -> AnnualReport {
        AnnualReport {
            period: PeriodLabel::Year(year),
            total_revenue: revenue,
            net_income,
        }
    }

    fn series(pairs: &[(&str, f64)]) -> Series {
        Series::from_pairs(pairs.iter().map(|(d, v)| (d.to_string(), *v))).unwrap()
    }

    fn assert_close(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len(), "{:?} vs {:?}", actual, expected);
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-9, "{:?} vs {:?}", actual, expected);
        }
    }

    #[test]
    fn test_normalize_sorts_newest_first_input() {
        let records = vec![
            report(2022, Some(99.0), Some(9.0)),
            report(2021, Some(110.0), Some(11.0)),
            report(2020, Some(100.0), Some(10.0)),
        ];
        let (financial, ratios) = TimelineNormalizer::new().normalize(&records).unwrap();

        let revenue = financial.get(metric::REVENUE).unwrap();
        assert!(revenue.is_ascending());
        assert_eq!(revenue.values(), &[100.0, 110.0, 99.0]);

        let growth = ratios.get(metric::REVENUE_GROWTH).unwrap();
        assert_eq!(growth.dates(), &["2021".to_string(), "2022".to_string()]);
        assert_close(growth.values(), &[10.0, -10.0]);
    }

    #[test]
    fn test_normalize_missing_fields_count_as_zero() {
        let records = vec![
            report(2020, Some(100.0), None),
            report(2021, None, None),
            report(2022, Some(200.0), Some(50.0)),
        ];
        let (financial, ratios) = TimelineNormalizer::new().normalize(&records).unwrap();

        assert_eq!(financial.get(metric::NET_INCOME).unwrap().values(), &[0.0, 50.0]);
        assert_close(ratios.get(metric::PROFIT_MARGIN).unwrap().values(), &[0.0, 25.0]);
    }

    #[test]
    fn test_normalize_no_usable_periods_is_empty() {
        let (financial, ratios) = TimelineNormalizer::new()
            .normalize(&[report(2020, None, None)])
            .unwrap();
        assert!(financial.is_empty());
        assert!(ratios.is_empty());

        let (financial, _) = TimelineNormalizer::new().normalize(&[]).unwrap();
        assert!(financial.is_empty());
    }

    #[test]
    fn test_normalize_truncates_to_recent_periods() {
        let records: Vec<AnnualReport> = (2012..2024)
            .rev()
            .map(|y| report(y, Some(y as f64), Some(1.0)))
            .collect();
        let (financial, _) = TimelineNormalizer::new().normalize(&records).unwrap();
        let revenue = financial.get(metric::REVENUE).unwrap();
        assert_eq!(revenue.len(), DEFAULT_MAX_PERIODS);
        assert_eq!(revenue.dates().first().unwrap(), "2018");
        assert_eq!(revenue.dates().last().unwrap(), "2023");
    }

    #[test]
    fn test_duplicate_period_last_record_wins() {
        let records = vec![report(2021, Some(1.0), Some(1.0)), report(2021, Some(5.0), Some(2.0))];
        let (financial, _) = TimelineNormalizer::new().normalize(&records).unwrap();
        assert_eq!(financial.get(metric::REVENUE).unwrap().values(), &[5.0]);
    }

    #[test]
    fn test_margin_uses_date_intersection() {
        let mut financial = Timeline::new();
        financial.insert(metric::REVENUE, series(&[("2022", 200.0), ("2021", 100.0), ("2020", 50.0)]));
        financial.insert(metric::NET_INCOME, series(&[("2021", 10.0), ("2022", 50.0), ("2019", 3.0)]));

        let (_, ratios) = TimelineNormalizer::new().normalize_timeline(&financial);
        let margin = ratios.get(metric::PROFIT_MARGIN).unwrap();
        assert_eq!(margin.dates(), &["2021".to_string(), "2022".to_string()]);
        assert_close(margin.values(), &[10.0, 25.0]);
    }

    #[test]
    fn test_growth_skips_zero_previous_revenue() {
        let mut financial = Timeline::new();
        financial.insert(metric::REVENUE, series(&[("2020", 0.0), ("2021", 100.0), ("2022", 150.0)]));
        let ratios = derive_ratios(&financial);
        let growth = ratios.get(metric::REVENUE_GROWTH).unwrap();
        assert_eq!(growth.dates(), &["2022".to_string()]);
        assert_close(growth.values(), &[50.0]);
    }

    #[test]
    fn test_normalize_history_rederives_growth() {
        let mut financial = Timeline::new();
        financial.insert(metric::REVENUE, series(&[("2022", 99.0), ("2021", 110.0), ("2020", 100.0)]));
        let mut provided = Timeline::new();
        // provider growth computed on newest-first data has the wrong sign
        provided.insert(metric::REVENUE_GROWTH, series(&[("2021", -9.09), ("2022", 11.11)]));

        let (_, ratios) = TimelineNormalizer::new().normalize_history(&MultiYearData {
            financial_data: financial,
            ratios_timeline: provided,
        });
        assert_close(ratios.get(metric::REVENUE_GROWTH).unwrap().values(), &[10.0, -10.0]);
    }

    #[test]
    fn test_merge_provided_ratios_keeps_derived() {
        let normalizer = TimelineNormalizer::new();
        let mut derived = Timeline::new();
        derived.insert(metric::REVENUE_GROWTH, series(&[("2022", 10.0)]));

        let mut provided = Timeline::new();
        provided.insert(metric::REVENUE_GROWTH, series(&[("2022", 99.0)]));
        provided.insert("operating_margin", series(&[("2022", 30.0), ("2021", 28.0)]));

        normalizer.merge_provided_ratios(&mut derived, &provided);
        assert_eq!(derived.get(metric::REVENUE_GROWTH).unwrap().values(), &[10.0]);
        assert_eq!(derived.get("operating_margin").unwrap().values(), &[28.0, 30.0]);
    }
}

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::AnalysisError;

/// Well-known series names in financial and ratio timelines.
pub mod metric {
    pub const REVENUE: &str = "revenue";
    pub const NET_INCOME: &str = "net_income";
    pub const REVENUE_GROWTH: &str = "revenue_growth";
    pub const PROFIT_MARGIN: &str = "profit_margin";
}

/// Period label as delivered by data providers: text ("2022", "2022-12-31")
/// or a bare year number.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum PeriodLabel {
    Text(String),
    Year(i64),
}

impl From<PeriodLabel> for String {
    fn from(label: PeriodLabel) -> Self {
        match label {
            PeriodLabel::Text(text) => text,
            PeriodLabel::Year(year) => year.to_string(),
        }
    }
}

/// Chronological ordering key for a period label: the leading four-digit
/// year, then the full label. Labels without a leading year sort last.
pub fn period_order_key(label: &str) -> (i32, &str) {
    let year = label
        .get(..4)
        .filter(|prefix| prefix.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|prefix| prefix.parse().ok())
        .unwrap_or(i32::MAX);
    (year, label)
}

/// One metric over time: parallel `dates` and `values` of equal length,
/// with unique dates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSeries")]
pub struct Series {
    dates: Vec<String>,
    values: Vec<f64>,
}

#[derive(Deserialize)]
struct RawSeries {
    #[serde(default)]
    dates: Vec<PeriodLabel>,
    #[serde(default)]
    values: Vec<Option<f64>>,
}

impl TryFrom<RawSeries> for Series {
    type Error = AnalysisError;

    fn try_from(raw: RawSeries) -> Result<Self, Self::Error> {
        // Null amounts count as zero
        Series::new(
            raw.dates.into_iter().map(String::from).collect(),
            raw.values.into_iter().map(|v| v.unwrap_or(0.0)).collect(),
        )
    }
}

impl Series {
    pub fn new(dates: Vec<String>, values: Vec<f64>) -> Result<Self, AnalysisError> {
        if dates.len() != values.len() {
            return Err(AnalysisError::InvalidData(format!(
                "series has {} dates but {} values",
                dates.len(),
                values.len()
            )));
        }

        let mut seen = HashSet::with_capacity(dates.len());
        if let Some(duplicate) = dates.iter().find(|d| !seen.insert(d.as_str())) {
            return Err(AnalysisError::InvalidData(format!(
                "duplicate period '{}' in series",
                duplicate
            )));
        }

        Ok(Self { dates, values })
    }

    pub fn from_pairs<I>(pairs: I) -> Result<Self, AnalysisError>
    where
        I: IntoIterator<Item = (String, f64)>,
    {
        let (dates, values): (Vec<String>, Vec<f64>) = pairs.into_iter().unzip();
        Self::new(dates, values)
    }

    pub fn dates(&self) -> &[String] {
        &self.dates
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.dates
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }

    pub fn get(&self, date: &str) -> Option<f64> {
        self.iter().find(|(d, _)| *d == date).map(|(_, v)| v)
    }

    /// Copy of this series ordered oldest period first.
    pub fn sorted(&self) -> Series {
        let mut pairs: Vec<(&str, f64)> = self.iter().collect();
        pairs.sort_by(|a, b| period_order_key(a.0).cmp(&period_order_key(b.0)));
        Series {
            dates: pairs.iter().map(|(d, _)| d.to_string()).collect(),
            values: pairs.iter().map(|(_, v)| *v).collect(),
        }
    }

    /// The most recent `n` periods (assumes the series is already sorted).
    pub fn tail(&self, n: usize) -> Series {
        let start = self.len().saturating_sub(n);
        Series {
            dates: self.dates[start..].to_vec(),
            values: self.values[start..].to_vec(),
        }
    }

    pub fn is_ascending(&self) -> bool {
        self.dates
            .windows(2)
            .all(|w| period_order_key(&w[0]) < period_order_key(&w[1]))
    }
}

/// Mapping from series name to its values over time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timeline(BTreeMap<String, Series>);

/// Raw amounts per metric (`revenue`, `net_income`, ...).
pub type FinancialTimeline = Timeline;

/// Derived ratios per name (`revenue_growth`, `profit_margin`).
pub type RatioTimeline = Timeline;

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Series> {
        self.0.get(name)
    }

    /// Series by name, treating an empty series as absent.
    pub fn non_empty(&self, name: &str) -> Option<&Series> {
        self.0.get(name).filter(|s| !s.is_empty())
    }

    pub fn insert(&mut self, name: impl Into<String>, series: Series) {
        self.0.insert(name.into(), series);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Series)> + '_ {
        self.0.iter().map(|(name, series)| (name.as_str(), series))
    }

    /// True when no series holds any period.
    pub fn is_empty(&self) -> bool {
        self.0.values().all(Series::is_empty)
    }
}

impl FromIterator<(String, Series)> for Timeline {
    fn from_iter<I: IntoIterator<Item = (String, Series)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

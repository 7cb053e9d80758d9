use analysis_core::{Confidence, StabilityClass};
use serde::Serialize;
use std::fmt;

/// Which computation produced a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Revenue,
    NetIncome,
    RevenueGrowth,
    ProfitMargin,
    TrendAnalysis,
    PredictiveAnalysis,
    Comparison,
    Stability,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Accelerating,
    Decelerating,
    Stable,
}

impl TrendDirection {
    pub fn to_label(&self) -> &'static str {
        match self {
            TrendDirection::Accelerating => "accelerating",
            TrendDirection::Decelerating => "decelerating",
            TrendDirection::Stable => "stable",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GrowthOutlook {
    Improving,
    Declining,
    Stable,
}

impl GrowthOutlook {
    pub fn to_label(&self) -> &'static str {
        match self {
            GrowthOutlook::Improving => "improving",
            GrowthOutlook::Declining => "declining",
            GrowthOutlook::Stable => "stable",
        }
    }
}

/// Values behind a document, enough to tell which computation produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DocumentFacts {
    Period {
        year: String,
        value: f64,
    },
    Trend {
        period: String,
        trend: TrendDirection,
        earlier_growth: f64,
        recent_growth: f64,
    },
    Projection {
        prediction: GrowthOutlook,
        average_growth: f64,
        projected_growth: f64,
        confidence: Confidence,
    },
    Comparison {
        metric: String,
        current: f64,
        historical_average: f64,
    },
    Stability {
        metric: String,
        range_factor: f64,
        stability: StabilityClass,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentMetadata {
    #[serde(rename = "type")]
    pub kind: DocumentKind,
    pub ticker: String,
    #[serde(flatten)]
    pub facts: DocumentFacts,
}

/// One retrieval unit: a sentence about a single financial fact plus its metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    text: String,
    metadata: DocumentMetadata,
}

impl Document {
    pub fn new(text: String, metadata: DocumentMetadata) -> Self {
        Self { text, metadata }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn metadata(&self) -> &DocumentMetadata {
        &self.metadata
    }

    pub fn kind(&self) -> DocumentKind {
        self.metadata.kind
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// All documents synthesized for one company snapshot. Immutable once built.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DocumentCorpus {
    ticker: String,
    documents: Vec<Document>,
}

impl DocumentCorpus {
    pub fn new(ticker: impl Into<String>, documents: Vec<Document>) -> Self {
        Self {
            ticker: ticker.into(),
            documents,
        }
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Document> {
        self.documents.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Document> + '_ {
        self.documents.iter()
    }

    pub fn of_kind(&self, kind: DocumentKind) -> impl Iterator<Item = &Document> + '_ {
        self.documents.iter().filter(move |d| d.kind() == kind)
    }
}

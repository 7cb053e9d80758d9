use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use crate::document::{Document, DocumentCorpus, DocumentMetadata};
use crate::error::{RetrievalError, RetrievalResult};
use crate::tokenizer::Tokenizer;

/// Vectorizer and ranking settings.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalConfig {
    /// Vocabulary cap, most frequent terms across the corpus win
    pub max_features: usize,
    pub ngram_range: (usize, usize),
    /// Hits must score strictly above this
    pub similarity_floor: f64,
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            max_features: 1000,
            ngram_range: (1, 2),
            similarity_floor: 0.05,
            top_k: 3,
        }
    }
}

/// Sparse L2-normalized TF-IDF vector, sorted by term index.
type SparseVector = Vec<(usize, f64)>;

/// A retrieved document with its cosine similarity and corpus position.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredDocument {
    pub document: Document,
    pub score: f64,
    pub position: usize,
}

/// Ranked hits, best first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetrievalHits {
    hits: Vec<ScoredDocument>,
}

impl RetrievalHits {
    pub fn documents(&self) -> Vec<&str> {
        self.hits.iter().map(|h| h.document.text()).collect()
    }

    pub fn metadatas(&self) -> Vec<&DocumentMetadata> {
        self.hits.iter().map(|h| h.document.metadata()).collect()
    }

    pub fn scores(&self) -> Vec<f64> {
        self.hits.iter().map(|h| h.score).collect()
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScoredDocument> + '_ {
        self.hits.iter()
    }
}

/// TF-IDF index over one document corpus.
///
/// Smoothed idf (`ln((1 + n) / (1 + df)) + 1`) and L2-normalized rows, so
/// cosine similarity reduces to a dot product. Immutable after `build`;
/// queries take `&self` and may run concurrently.
#[derive(Debug, Clone)]
pub struct RetrievalIndex {
    corpus: DocumentCorpus,
    tokenizer: Tokenizer,
    vocabulary: HashMap<String, usize>,
    idf: Vec<f64>,
    vectors: Vec<SparseVector>,
    similarity_floor: f64,
}

impl RetrievalIndex {
    pub fn build(corpus: DocumentCorpus, config: &RetrievalConfig) -> RetrievalResult<Self> {
        if corpus.is_empty() {
            return Err(RetrievalError::EmptyCorpus);
        }

        let tokenizer = Tokenizer::new().with_ngram_range(config.ngram_range.0, config.ngram_range.1);
        let analyzed: Vec<Vec<String>> = corpus.iter().map(|d| tokenizer.analyze(d.text())).collect();

        // term -> (total count, document frequency), alphabetical
        let mut stats: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
        for terms in &analyzed {
            let mut seen_here: Vec<&str> = Vec::new();
            for term in terms {
                let entry = stats.entry(term.as_str()).or_insert((0, 0));
                entry.0 += 1;
                if !seen_here.contains(&term.as_str()) {
                    seen_here.push(term.as_str());
                    entry.1 += 1;
                }
            }
        }

        if stats.is_empty() {
            return Err(RetrievalError::EmptyVocabulary);
        }

        let mut ranked: Vec<(&str, usize, usize)> =
            stats.iter().map(|(term, (count, df))| (*term, *count, *df)).collect();
        if ranked.len() > config.max_features {
            // stable sort keeps alphabetical order among equal counts
            ranked.sort_by(|a, b| b.1.cmp(&a.1));
            ranked.truncate(config.max_features);
            ranked.sort_by(|a, b| a.0.cmp(b.0));
        }

        let n_docs = corpus.len() as f64;
        let vocabulary: HashMap<String, usize> = ranked
            .iter()
            .enumerate()
            .map(|(i, (term, _, _))| (term.to_string(), i))
            .collect();
        let idf: Vec<f64> = ranked
            .iter()
            .map(|(_, _, df)| ((1.0 + n_docs) / (1.0 + *df as f64)).ln() + 1.0)
            .collect();

        let mut index = Self {
            corpus,
            tokenizer,
            vocabulary,
            idf,
            vectors: Vec::new(),
            similarity_floor: config.similarity_floor,
        };
        index.vectors = analyzed.iter().map(|terms| index.vectorize(terms)).collect();

        tracing::debug!(
            "Built retrieval index for {}: {} documents, {} terms",
            index.corpus.ticker(),
            index.corpus.len(),
            index.idf.len()
        );
        Ok(index)
    }

    pub fn corpus(&self) -> &DocumentCorpus {
        &self.corpus
    }

    pub fn vocabulary_len(&self) -> usize {
        self.idf.len()
    }

    /// Up to `top_k` documents scoring above the similarity floor, best first.
    ///
    /// Ties keep corpus order. A query with no known terms yields no hits.
    pub fn query(&self, query: &str, top_k: usize) -> RetrievalHits {
        let query_vector = self.vectorize(&self.tokenizer.analyze(query));
        if query_vector.is_empty() {
            tracing::debug!("Query shares no terms with the {} corpus", self.corpus.ticker());
            return RetrievalHits::default();
        }

        let mut scored: Vec<(usize, f64)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(i, v)| (i, dot(&query_vector, v)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

        let hits = scored
            .into_iter()
            .take(top_k)
            .filter(|(_, score)| *score > self.similarity_floor)
            .filter_map(|(position, score)| {
                self.corpus.get(position).map(|document| ScoredDocument {
                    document: document.clone(),
                    score,
                    position,
                })
            })
            .collect();

        RetrievalHits { hits }
    }

    fn vectorize(&self, terms: &[String]) -> SparseVector {
        let mut counts: BTreeMap<usize, f64> = BTreeMap::new();
        for term in terms {
            if let Some(&i) = self.vocabulary.get(term) {
                *counts.entry(i).or_insert(0.0) += 1.0;
            }
        }

        let mut vector: SparseVector = counts
            .into_iter()
            .map(|(i, tf)| (i, tf * self.idf[i]))
            .collect();
        let norm = vector.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
        if norm > 0.0 {
            for (_, w) in vector.iter_mut() {
                *w /= norm;
            }
        }
        vector
    }
}

fn dot(a: &[(usize, f64)], b: &[(usize, f64)]) -> f64 {
    let (mut i, mut j, mut sum) = (0, 0, 0.0);
    while i < a.len() && j < b.len() {
        match a[i].0.cmp(&b[j].0) {
            Ordering::Less => i += 1,
            Ordering::Greater => j += 1,
            Ordering::Equal => {
                sum += a[i].1 * b[j].1;
                i += 1;
                j += 1;
            }
        }
    }
    sum
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{DocumentFacts, DocumentKind};
    use crate::synthesizer::DocumentSynthesizer;
    use analysis_core::{metric, MetricValue, Series, Timeline, CURRENT_PROFIT_MARGIN_KEY};
    use std::collections::BTreeMap as Map;

    fn doc(text: &str) -> Document {
        Document::new(
            text.to_string(),
            DocumentMetadata {
                kind: DocumentKind::Revenue,
                ticker: "T".to_string(),
                facts: DocumentFacts::Period {
                    year: "2022".to_string(),
                    value: 0.0,
                },
            },
        )
    }

    fn corpus(texts: &[&str]) -> DocumentCorpus {
        DocumentCorpus::new("T", texts.iter().map(|t| doc(t)).collect())
    }

    fn tick_corpus() -> DocumentCorpus {
        let revenue = Series::from_pairs([
            ("2020".to_string(), 80e9),
            ("2021".to_string(), 100e9),
            ("2022".to_string(), 90e9),
        ])
        .unwrap();
        let mut financial = Timeline::new();
        financial.insert(metric::REVENUE, revenue);
        let ratios = fundamental_analysis::derive_ratios(&financial);
        DocumentSynthesizer::new().synthesize("TICK", &financial, &ratios, &Map::new())
    }

    #[test]
    fn test_empty_corpus_is_rejected() {
        let err = RetrievalIndex::build(DocumentCorpus::default(), &RetrievalConfig::default()).unwrap_err();
        assert_eq!(err, RetrievalError::EmptyCorpus);
        assert_eq!(err.to_string(), "No financial data available");
    }

    #[test]
    fn test_stop_word_only_corpus_has_no_vocabulary() {
        let err = RetrievalIndex::build(corpus(&["the and of", "a I"]), &RetrievalConfig::default())
            .unwrap_err();
        assert_eq!(err, RetrievalError::EmptyVocabulary);
    }

    #[test]
    fn test_document_retrieves_itself_first() {
        let texts = [
            "Revenue grew strongly in 2021",
            "Net income declined sharply in 2022",
            "Profit margin remained healthy",
        ];
        let index = RetrievalIndex::build(corpus(&texts), &RetrievalConfig::default()).unwrap();
        for (position, text) in texts.iter().enumerate() {
            let hits = index.query(text, 3);
            let best = hits.iter().next().unwrap();
            assert_eq!(best.position, position);
            assert!((best.score - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_synthesized_documents_retrieve_themselves() {
        let mut financial = Timeline::new();
        financial.insert(
            metric::REVENUE,
            Series::from_pairs([
                ("2020".to_string(), 80e9),
                ("2021".to_string(), 100e9),
                ("2022".to_string(), 90e9),
                ("2023".to_string(), 99e9),
            ])
            .unwrap(),
        );
        financial.insert(
            metric::NET_INCOME,
            Series::from_pairs([
                ("2020".to_string(), 8e9),
                ("2021".to_string(), 15e9),
                ("2022".to_string(), 12e9),
                ("2023".to_string(), 14e9),
            ])
            .unwrap(),
        );
        let ratios = fundamental_analysis::derive_ratios(&financial);
        let mut metrics = Map::new();
        metrics.insert(CURRENT_PROFIT_MARGIN_KEY.to_string(), MetricValue::Known(14.0));
        let corpus = DocumentSynthesizer::new().synthesize("TICK", &financial, &ratios, &metrics);
        assert!(corpus.len() >= 14);

        let index = RetrievalIndex::build(corpus, &RetrievalConfig::default()).unwrap();
        for (position, document) in index.corpus().iter().enumerate() {
            let hits = index.query(document.text(), 3);
            let best = hits.iter().next().unwrap();
            assert_eq!(best.position, position, "{}", document.text());
            assert!((best.score - 1.0).abs() < 1e-9, "{}", document.text());
        }
    }

    #[test]
    fn test_hits_respect_floor_and_order() {
        let index = RetrievalIndex::build(tick_corpus(), &RetrievalConfig::default()).unwrap();
        let hits = index.query("revenue growth stability", 10);
        let scores = hits.scores();
        assert!(!scores.is_empty());
        assert!(scores.iter().all(|s| *s > 0.05));
        assert!(scores.windows(2).all(|w| w[0] >= w[1]));
        assert!(index.query("revenue", 2).len() <= 2);
    }

    #[test]
    fn test_unknown_query_terms_yield_no_hits() {
        let index = RetrievalIndex::build(tick_corpus(), &RetrievalConfig::default()).unwrap();
        assert!(index.query("dividends", 3).is_empty());
        assert!(index.query("", 3).is_empty());
    }

    #[test]
    fn test_queries_are_deterministic() {
        let a = RetrievalIndex::build(tick_corpus(), &RetrievalConfig::default()).unwrap();
        let b = RetrievalIndex::build(tick_corpus(), &RetrievalConfig::default()).unwrap();
        let query = "How has revenue changed?";
        assert_eq!(a.query(query, 3), b.query(query, 3));
        assert_eq!(a.query(query, 3), a.query(query, 3));
    }

    #[test]
    fn test_revenue_question_surfaces_negative_growth() {
        let index = RetrievalIndex::build(tick_corpus(), &RetrievalConfig::default()).unwrap();
        assert_eq!(index.corpus().len(), 7);

        let hits = index.query("How has revenue changed?", 3);
        assert_eq!(hits.len(), 3);
        assert!(hits.metadatas().iter().all(|m| m.ticker == "TICK"));
        assert!(hits
            .documents()
            .iter()
            .any(|text| text.contains("2022") && text.contains("negative revenue growth")));
    }

    #[test]
    fn test_vocabulary_cap_keeps_most_frequent_terms() {
        let config = RetrievalConfig {
            max_features: 2,
            ngram_range: (1, 1),
            ..RetrievalConfig::default()
        };
        let index = RetrievalIndex::build(
            corpus(&["revenue revenue margin", "revenue income margin", "growth"]),
            &config,
        )
        .unwrap();
        assert_eq!(index.vocabulary_len(), 2);
        assert!(index.query("growth", 3).is_empty());
        assert!(!index.query("margin", 3).is_empty());
    }
}

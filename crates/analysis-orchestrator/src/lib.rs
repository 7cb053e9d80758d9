use analysis_core::{
    AnalysisResult, CompanySnapshot, FinancialTimeline, PredictiveInsight, RatioTimeline, SecFiling,
    Timeline, CURRENT_PROFIT_MARGIN_KEY,
};
use fundamental_analysis::{
    compute_ratios, summarize_trends, CurrentRatio, PredictiveInsightEstimator, TimelineNormalizer,
};
use llm_client::{GenerationRequest, LlmConfig, LlmError, LlmResult, TextGenerator};
use rag_retrieval::{
    snapshot_version, DocumentSynthesizer, IndexCache, RetrievalConfig, RetrievalError, RetrievalHits,
    RetrievalIndex, DEFAULT_CACHE_TTL_SECS,
};
use std::sync::Arc;
use std::time::Duration;

pub mod prompt;
pub mod validation;

pub use prompt::{
    basic_overview, build_rag_prompt, build_standard_prompt, format_ratios_for_prompt,
    format_sec_filings_for_prompt, PromptContext,
};
pub use validation::{validate_response, MIN_ANALYSIS_CHARS};


const REMEDY: &str = "Please try a simpler query or check the model API key.";

/// Orchestration settings
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub retrieval: RetrievalConfig,
    pub temperature: f32,
    pub max_output_tokens: u32,
    /// Bound on a single model call
    pub model_timeout: Duration,
    pub cache_ttl_secs: i64,
    /// Suffix RAG analyses with the number of historical sources used
    pub append_source_note: bool,
}

impl OrchestratorConfig {
    pub fn from_llm_config(llm: &LlmConfig) -> Self {
        Self {
            retrieval: RetrievalConfig::default(),
            temperature: llm.temperature,
            max_output_tokens: llm.max_output_tokens,
            model_timeout: llm.timeout,
            cache_ttl_secs: std::env::var("RAG_CACHE_TTL_SECS")
                .ok()
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(DEFAULT_CACHE_TTL_SECS),
            append_source_note: true,
        }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self::from_llm_config(&LlmConfig::default())
    }
}

/// Which prompt an attempt used
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PromptPath {
    Rag,
    Standard,
}

/// Answers user queries about one company snapshot, grounding the model in
/// retrieved historical documents when possible.
///
/// Every failure resolves to an `AnalysisResult`; `analyze` never errors.
pub struct AnalysisOrchestrator {
    generator: Arc<dyn TextGenerator>,
    config: OrchestratorConfig,
    normalizer: TimelineNormalizer,
    synthesizer: DocumentSynthesizer,
    estimator: PredictiveInsightEstimator,
    /// Retrieval indexes per (ticker, snapshot version)
    index_cache: IndexCache,
}

impl AnalysisOrchestrator {
    pub fn new(generator: Arc<dyn TextGenerator>, config: OrchestratorConfig) -> Self {
        let index_cache = IndexCache::new(config.cache_ttl_secs);
        Self {
            generator,
            config,
            normalizer: TimelineNormalizer::new(),
            synthesizer: DocumentSynthesizer::new(),
            estimator: PredictiveInsightEstimator::new(),
            index_cache,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn cached_indexes(&self) -> usize {
        self.index_cache.len()
    }

    /// Answer `query` about `snapshot`.
    ///
    /// Uses retrieved historical context unless `force_standard` is set, the
    /// snapshot has no history, or nothing relevant is retrieved. A failed
    /// attempt gets one retry on the standard prompt before an `Error`
    /// result is returned.
    pub async fn analyze(
        &self,
        snapshot: &CompanySnapshot,
        filings: &[SecFiling],
        query: &str,
        ticker: &str,
        force_standard: bool,
    ) -> AnalysisResult {
        let ticker = ticker.trim().to_uppercase();
        tracing::info!("Starting analysis for {} (force_standard: {})", ticker, force_standard);

        let ratios = compute_ratios(snapshot);
        let trends = summarize_trends(snapshot);
        let ctx = PromptContext {
            snapshot,
            ratios: &ratios,
            trends: &trends,
            filings,
            query,
        };

        let mut notice = None;
        let hits = if force_standard {
            None
        } else {
            match self.retrieve(snapshot, &ticker, query) {
                Ok(hits) => hits,
                Err(e) => {
                    tracing::warn!("Retrieval index unavailable for {}: {}", ticker, e);
                    notice = Some(format!("Historical context unavailable: {}", e));
                    None
                }
            }
        };

        let first_path = if hits.is_some() { PromptPath::Rag } else { PromptPath::Standard };
        let first = match &hits {
            Some(hits) => {
                let documents = hits.documents();
                self.invoke(build_rag_prompt(&ctx, &documents)).await
            }
            None => self.invoke(build_standard_prompt(&ctx)).await,
        };

        let result = match (first, hits) {
            (Ok(text), Some(hits)) => {
                let sources = hits.len();
                tracing::info!("RAG-enhanced analysis for {} with {} sources", ticker, sources);
                let analysis = if self.config.append_source_note {
                    text + &prompt::source_note(sources)
                } else {
                    text
                };
                AnalysisResult::rag_enhanced(analysis, sources)
            }
            (Ok(text), None) => {
                tracing::info!("Standard analysis for {}", ticker);
                AnalysisResult::standard(text)
            }
            (Err(first_err), _) => {
                tracing::warn!(
                    "{:?} attempt failed for {}: {}; retrying with standard prompt",
                    first_path,
                    ticker,
                    first_err
                );
                match self.invoke(build_standard_prompt(&ctx)).await {
                    Ok(text) => AnalysisResult::standard(text),
                    Err(retry_err) => {
                        tracing::warn!("Standard retry failed for {}: {}", ticker, retry_err);
                        AnalysisResult::error(error_message(&retry_err, snapshot, &ratios))
                    }
                }
            }
        };

        result.with_notice(notice)
    }

    /// Forward-looking insights from the snapshot's normalized ratio history.
    pub fn predict_insights(&self, snapshot: &CompanySnapshot) -> Vec<PredictiveInsight> {
        let (_, ratios) = self.historical_timelines(snapshot);
        self.estimator.predict(&ratios)
    }

    /// Normalized history of a snapshot; empty when it carries none.
    pub fn historical_timelines(&self, snapshot: &CompanySnapshot) -> (FinancialTimeline, RatioTimeline) {
        match &snapshot.multi_year_data {
            Some(data) => self.normalizer.normalize_history(data),
            None => (Timeline::new(), Timeline::new()),
        }
    }

    /// Ranked historical documents for `query`, or `None` when there is no
    /// history or nothing clears the similarity floor.
    fn retrieve(
        &self,
        snapshot: &CompanySnapshot,
        ticker: &str,
        query: &str,
    ) -> Result<Option<RetrievalHits>, RetrievalError> {
        if !snapshot.has_historical_data() {
            tracing::info!("No historical data for {}, using standard path", ticker);
            return Ok(None);
        }

        let (financial, ratios) = self.historical_timelines(snapshot);
        let version = snapshot_version(
            ticker,
            &financial,
            &ratios,
            snapshot.metric(CURRENT_PROFIT_MARGIN_KEY),
        );

        let index = self.index_cache.get_or_build(ticker, &version, || {
            let corpus = self
                .synthesizer
                .synthesize(ticker, &financial, &ratios, &snapshot.metric);
            RetrievalIndex::build(corpus, &self.config.retrieval)
        })?;

        let hits = index.query(query, self.config.retrieval.top_k);
        tracing::debug!("Retrieved {} documents for {} (scores: {:?})", hits.len(), ticker, hits.scores());
        if hits.is_empty() {
            tracing::info!("No relevant historical context for {}, using standard path", ticker);
            return Ok(None);
        }
        Ok(Some(hits))
    }

    /// One bounded, validated model call.
    async fn invoke(&self, prompt: String) -> LlmResult<String> {
        let request = GenerationRequest {
            prompt,
            temperature: self.config.temperature,
            max_output_tokens: self.config.max_output_tokens,
        };

        tracing::debug!(
            "Invoking {} ({} prompt characters)",
            self.generator.backend_name(),
            request.prompt.len()
        );
        let text = tokio::time::timeout(self.config.model_timeout, self.generator.generate(&request))
            .await
            .map_err(|_| LlmError::Timeout(self.config.model_timeout.as_secs()))??;

        validate_response(&text)
    }
}

fn error_message(err: &LlmError, snapshot: &CompanySnapshot, ratios: &[CurrentRatio]) -> String {
    format!(
        "Analysis unavailable: {}. {}\n\n{}",
        err,
        REMEDY,
        basic_overview(snapshot, ratios)
    )
}

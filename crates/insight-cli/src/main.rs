//! insight-cli: analyze one company snapshot with retrieval-grounded model
//! analysis and print predictive insights as JSON.
//!
//! Usage:
//!   cargo run -p insight-cli -- --snapshot aapl.json --ticker AAPL --query "How has revenue changed?"
//!   cargo run -p insight-cli -- --snapshot aapl.json --records annual.json --filings filings.json
//!   cargo run -p insight-cli -- --snapshot aapl.json --ticker AAPL --standard
//!   cargo run -p insight-cli -- --snapshot aapl.json --insights-only

use analysis_core::{
    metric, AnalysisResult, AnnualReport, CompanySnapshot, MultiYearData, PredictiveInsight, SecFiling,
};
use analysis_orchestrator::{AnalysisOrchestrator, OrchestratorConfig};
use anyhow::Context;
use fundamental_analysis::{PredictiveInsightEstimator, TimelineNormalizer};
use llm_client::{GeminiClient, LlmConfig};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

const DEFAULT_QUERY: &str = "Provide a comprehensive financial analysis of this company.";

#[derive(Serialize)]
struct Report {
    ticker: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    analysis: Option<AnalysisResult>,
    predictive_insights: Vec<PredictiveInsight>,
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str())
}

fn read_json<T: DeserializeOwned>(path: &str) -> anyhow::Result<T> {
    let raw = std::fs::read_to_string(Path::new(path)).with_context(|| format!("reading {}", path))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "insight_cli=info,analysis_orchestrator=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let force_standard = args.iter().any(|a| a == "--standard");
    let insights_only = args.iter().any(|a| a == "--insights-only");

    let snapshot_path = flag_value(&args, "--snapshot").context("--snapshot <file> is required")?;
    let mut snapshot: CompanySnapshot = read_json(snapshot_path)?;

    let normalizer = TimelineNormalizer::new();
    if let Some(records_path) = flag_value(&args, "--records") {
        let records: Vec<AnnualReport> = read_json(records_path)?;
        let (financial_data, ratios_timeline) = normalizer.normalize(&records)?;
        tracing::info!(
            "Loaded {} annual records ({} usable periods)",
            records.len(),
            financial_data.get(metric::REVENUE).map_or(0, |s| s.len())
        );
        snapshot.multi_year_data = Some(MultiYearData {
            financial_data,
            ratios_timeline,
        });
    }

    let filings: Vec<SecFiling> = match flag_value(&args, "--filings") {
        Some(path) => read_json(path)?,
        None => Vec::new(),
    };
    let ticker = flag_value(&args, "--ticker").unwrap_or("UNKNOWN").to_uppercase();
    let query = flag_value(&args, "--query").unwrap_or(DEFAULT_QUERY);

    let predictive_insights = match &snapshot.multi_year_data {
        Some(data) => {
            let (_, ratios) = normalizer.normalize_history(data);
            PredictiveInsightEstimator::new().predict(&ratios)
        }
        None => Vec::new(),
    };

    let analysis = if insights_only {
        None
    } else {
        let llm_config = LlmConfig::default();
        let client = GeminiClient::new(&llm_config)?;
        tracing::info!("Using Gemini model {}", client.model());
        let orchestrator =
            AnalysisOrchestrator::new(Arc::new(client), OrchestratorConfig::from_llm_config(&llm_config));
        Some(
            orchestrator
                .analyze(&snapshot, &filings, query, &ticker, force_standard)
                .await,
        )
    };

    let report = Report {
        ticker,
        analysis,
        predictive_insights,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

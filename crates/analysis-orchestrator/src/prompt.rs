use analysis_core::{CompanySnapshot, MetricValue, SecFiling};
use fundamental_analysis::{ratio_value, CurrentRatio};

/// Filings listed in a prompt
const MAX_PROMPT_FILINGS: usize = 3;

/// Description characters kept in the standard prompt
const DESCRIPTION_CHARS: usize = 300;

/// Current-period inputs shared by every prompt for one query.
pub struct PromptContext<'a> {
    pub snapshot: &'a CompanySnapshot,
    pub ratios: &'a [CurrentRatio],
    pub trends: &'a str,
    pub filings: &'a [SecFiling],
    pub query: &'a str,
}

/// `- Label: value` per known ratio.
pub fn format_ratios_for_prompt(ratios: &[CurrentRatio]) -> String {
    let lines: Vec<String> = ratios
        .iter()
        .filter_map(|r| r.value.known().map(|v| format!("- {}: {}", r.label, v)))
        .collect();

    if lines.is_empty() {
        "No ratio data available".to_string()
    } else {
        lines.join("\n")
    }
}

/// The most recent filings as `- FORM filed on DATE`.
pub fn format_sec_filings_for_prompt(filings: &[SecFiling]) -> String {
    if filings.is_empty() {
        return "No recent SEC filings available".to_string();
    }
    filings
        .iter()
        .take(MAX_PROMPT_FILINGS)
        .map(|f| format!("- {} filed on {}", f.form, f.date))
        .collect::<Vec<_>>()
        .join("\n")
}

fn current_data_lines(ctx: &PromptContext<'_>) -> Vec<String> {
    vec![
        format!("Company: {}", ctx.snapshot.name),
        format!("Sector: {}", ctx.snapshot.sector),
        format!("Current Price: ${}", ctx.snapshot.current_price),
        format!("Market Cap: ${}", ctx.snapshot.market_cap),
        String::new(),
        "Key Financial Ratios:".to_string(),
        format_ratios_for_prompt(ctx.ratios),
        String::new(),
        "Financial Trends:".to_string(),
        ctx.trends.to_string(),
        String::new(),
        format!("Recent SEC Filings ({} filings):", ctx.filings.len()),
        format_sec_filings_for_prompt(ctx.filings),
    ]
}

/// Prompt built from current-period data only.
pub fn build_standard_prompt(ctx: &PromptContext<'_>) -> String {
    let description: String = ctx.snapshot.description.chars().take(DESCRIPTION_CHARS).collect();

    let mut lines = vec![
        "You are a professional financial analyst. Based on the following company data, please provide a comprehensive analysis.".to_string(),
        String::new(),
        "Company Analysis Data:".to_string(),
        String::new(),
    ];
    lines.extend(current_data_lines(ctx));
    lines.extend([
        String::new(),
        "Company Description:".to_string(),
        format!("{}...", description),
        String::new(),
        format!("User Question: {}", ctx.query),
        String::new(),
        "Please provide a detailed, professional analysis that includes:".to_string(),
        "1. Key financial insights".to_string(),
        "2. Risk factors and opportunities".to_string(),
        "3. Market position assessment".to_string(),
        "4. Investment considerations".to_string(),
        String::new(),
        "Keep your response informative, well-structured, and professional.".to_string(),
    ]);
    lines.join("\n")
}

/// Prompt grounding the analysis in retrieved historical documents.
pub fn build_rag_prompt(ctx: &PromptContext<'_>, context_documents: &[&str]) -> String {
    let mut lines = vec![
        "You are a professional financial analyst with access to comprehensive historical data.".to_string(),
        String::new(),
        "HISTORICAL FINANCIAL CONTEXT:".to_string(),
    ];
    lines.extend(
        context_documents
            .iter()
            .enumerate()
            .map(|(i, doc)| format!("Historical Context {}: {}", i + 1, doc)),
    );
    lines.extend([String::new(), "CURRENT COMPANY DATA:".to_string()]);
    lines.extend(current_data_lines(ctx));
    lines.extend([
        String::new(),
        format!("User Question: {}", ctx.query),
        String::new(),
        "Based on this historical context and current data, provide a comprehensive analysis that:".to_string(),
        "1. References specific historical trends and patterns".to_string(),
        "2. Compares current performance to historical performance".to_string(),
        "3. Identifies key changes in business trajectory".to_string(),
        "4. Provides data-driven insights about future prospects".to_string(),
        "5. Highlights concerning or encouraging trends".to_string(),
        String::new(),
        "Make your analysis specific, referencing actual numbers and time periods.".to_string(),
    ]);
    lines.join("\n")
}

/// Suffix noting how many historical documents grounded the analysis.
pub fn source_note(context_sources: usize) -> String {
    format!(
        "\n\n---\n**Enhanced with Historical Context**: Analysis incorporates {} relevant historical data points.",
        context_sources
    )
}

/// Offline summary used when the model cannot produce an analysis.
pub fn basic_overview(snapshot: &CompanySnapshot, ratios: &[CurrentRatio]) -> String {
    let metric = |label: &str| -> MetricValue { ratio_value(ratios, label) };
    [
        format!("**Basic Analysis for {}**", snapshot.name),
        String::new(),
        "**Company Overview:**".to_string(),
        format!("- Sector: {}", snapshot.sector),
        format!("- Current Price: ${}", snapshot.current_price),
        format!("- Market Cap: ${}", snapshot.market_cap),
        String::new(),
        "**Key Metrics:**".to_string(),
        format!("- P/E Ratio: {}", metric("P/E Ratio")),
        format!("- Debt/Equity: {}", metric("Debt/Equity")),
        format!("- ROE: {}", metric("ROE")),
        String::new(),
        "**Note:** This is a basic analysis. AI analysis is currently unavailable.".to_string(),
    ]
    .join("\n")
}

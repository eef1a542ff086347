//! Plain-text rendering of answers for the terminal.

use docqa_rag::composer::GENERAL_SECTION;
use docqa_rag::{ChatResponse, IndexStats};

/// Render a response as the ANSWER / SOURCE / CONFIDENCE block.
pub fn format_response(response: &ChatResponse) -> String {
    let mut lines = vec!["ANSWER:".to_string(), response.answer.clone(), String::new()];

    if !response.sources.is_empty() {
        lines.push("SOURCE (Matched from PDF):".to_string());
        for source in &response.sources {
            lines.push(format!(
                "  • {} | Page {} | Section: {} | Relevance: {:.2}%",
                source.document,
                source.page,
                source.section.as_deref().unwrap_or(GENERAL_SECTION),
                source.similarity * 100.0
            ));
        }
        lines.push(String::new());
    }

    lines.push(format!("CONFIDENCE: {}", response.confidence));
    lines.join("\n")
}

/// One-line index summary.
pub fn format_stats(stats: &IndexStats) -> String {
    format!("{} chunks from {} documents", stats.total_chunks, stats.total_documents)
}

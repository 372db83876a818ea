//! Query command implementation

use crate::config::Config;
use crate::meta::MetaDb;
use crate::search::{QueryEngine, RankedItem};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Query result for CLI display
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub query: String,
    pub results: Vec<RankedItem>,
    /// Close matches offered when nothing ranked
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
}

const SUGGESTION_LIMIT: usize = 5;

/// Execute a query; Ctrl-C cancels it
pub async fn cmd_query(config: &Config, db: &MetaDb, query: &str, limit: usize) -> QueryResult {
    info!("Querying: {}", query);

    let engine = QueryEngine::new(db.clone(), config);
    let cancel = CancellationToken::new();
    let guard = cancel.clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            guard.cancel();
        }
    });

    let mut results = engine.query(query, &cancel).await;
    interrupt.abort();
    results.truncate(limit);

    let suggestions = if results.is_empty() && !cancel.is_cancelled() {
        engine.suggest(query, SUGGESTION_LIMIT).await
    } else {
        Vec::new()
    };

    QueryResult {
        query: query.to_string(),
        results,
        suggestions,
    }
}

/// Print query results to console
pub fn print_query_results(result: &QueryResult) {
    println!("\n🔍 Query: {}\n", result.query);

    if result.results.is_empty() {
        println!("No matches.");
        if !result.suggestions.is_empty() {
            println!("\nClose matches:");
            for path in &result.suggestions {
                println!("  • {}", path);
            }
        }
        return;
    }
    println!("Found {} results:\n", result.results.len());

    for (i, item) in result.results.iter().enumerate() {
        let how = match item.match_details.confidence {
            Some(confidence) => format!("semantic {:.2}", confidence),
            None => "exact".to_string(),
        };
        println!("{}. [score: {:.3}, {}] {}", i + 1, item.score, how, item.title);
        println!("   {}", item.path);
        if !item.metadata.tags.is_empty() {
            println!("   Tags: {}", item.metadata.tags.join(", "));
        }
        println!();
    }
}

// System status display — shows DB stats, snapshot count, latest run.

use anyhow::Result;
use colored::Colorize;
use std::path::Path;

use crate::config::{Config, EmbedderBackend};
use crate::ledger::Ledger;

/// Display system status to the terminal.
pub async fn show(ledger: Option<&Ledger>, config: &Config) -> Result<()> {
    let Some(ledger) = ledger.filter(|_| Path::new(&config.db_path).exists()) else {
        println!("Database: not initialized");
        println!("\nRun `keyplot init` to set up the database.");
        return Ok(());
    };

    // Database file size
    let file_size = std::fs::metadata(&config.db_path)
        .map(|m| format_bytes(m.len()))
        .unwrap_or_else(|_| "unknown".to_string());
    println!("Database: {} ({})", config.db_path, file_size);

    let embedder = match config.embedder_backend {
        EmbedderBackend::Local => format!("local (dimension {})", config.embedding_dimension),
        EmbedderBackend::Remote => format!("remote ({})", config.embedding_model),
    };
    println!("Embedder: {embedder}");
    println!(
        "Interest: {}",
        config
            .interest_url
            .as_deref()
            .unwrap_or("search volume from input")
    );

    let count = ledger.count().await?;
    println!("Snapshots: {count}");

    match ledger.latest().await? {
        Some(latest) => {
            println!(
                "Latest run: {} ({} clusters from {} keywords, {})",
                latest.taken_at.format("%Y-%m-%d %H:%M:%S UTC"),
                latest.clusters.len(),
                latest.keyword_count,
                latest.method
            );
            if latest.degraded {
                println!("  {}", "Latest run was degraded (provider fallback)".yellow());
            }
        }
        None => {
            println!("Latest run: never");
            println!("  Run `keyplot cluster --file keywords.txt` to record one");
        }
    }

    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

//! Status command - what is currently indexed

use anyhow::Result;
use colored::*;

use codebase_rag::RagPipeline;

pub fn run(pipeline: &RagPipeline, json: bool) -> Result<()> {
    let status = pipeline.status()?;
    let db_path = &pipeline.config().paths.db;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("{}", "Index Status".bold());
    println!();
    println!("  {} Corpus: {}", "→".dimmed(), status.corpus_path.cyan());

    if status.stats.files == 0 {
        println!(
            "  {} Nothing indexed yet. Run {} first.",
            "!".yellow().bold(),
            "rag index".cyan()
        );
        return Ok(());
    }

    println!(
        "  {} {} files, {} chunks",
        "→".dimmed(),
        status.stats.files.to_string().cyan(),
        status.stats.chunks.to_string().cyan()
    );
    if let Some(embedder) = &status.stats.embedder {
        println!("  {} Embedder: {}", "→".dimmed(), embedder);
    }

    let file_size = std::fs::metadata(db_path).map(|m| m.len()).unwrap_or(0);
    println!(
        "  {} Size: {:.2} KB ({})",
        "→".dimmed(),
        file_size as f64 / 1024.0,
        db_path.display()
    );
    if let Some(ts) = status.stats.last_indexed {
        let dt = chrono::DateTime::from_timestamp(ts, 0)
            .map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "Unknown".to_string());
        println!("  {} Last indexed: {}", "→".dimmed(), dt);
    }

    Ok(())
}

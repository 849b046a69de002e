//! Index command - Build the corpus index

use anyhow::Result;
use colored::Colorize;

use codebase_rag::RagPipeline;

/// Run index command
pub fn run(pipeline: &RagPipeline, force: bool, json: bool) -> Result<()> {
    if !json {
        if force {
            println!("{} Dropping existing index for {}", "→".dimmed(), pipeline.corpus_display().cyan());
        }
        println!("{} Building index ({})...", "→".dimmed(), pipeline.config().embedding);
    }

    let stats = pipeline.build_index(force)?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "ok": true,
                "force": force,
                "indexed": stats.indexed,
                "skipped": stats.skipped,
                "removed": stats.removed,
                "chunks": stats.chunks,
                "durationMs": stats.duration_ms,
            })
        );
        return Ok(());
    }

    println!();
    println!(
        "{} Indexed {} files ({} chunks) in {:.2}s",
        "✓".green().bold(),
        stats.indexed.to_string().cyan(),
        stats.chunks,
        stats.duration_ms as f64 / 1000.0
    );
    if stats.skipped > 0 {
        println!("  {} {} files unchanged", "→".dimmed(), stats.skipped);
    }
    if stats.removed > 0 {
        println!("  {} {} files removed from the index", "→".dimmed(), stats.removed);
    }
    println!(
        "  {} Index saved to: {}",
        "→".dimmed(),
        pipeline.config().paths.db.display()
    );

    Ok(())
}

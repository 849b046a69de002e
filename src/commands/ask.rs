//! Ask command - answer a question from the indexed corpus

use anyhow::Result;
use colored::Colorize;

use codebase_rag::{RagPipeline, NO_CONTEXT_ANSWER};

const PREVIEW_CHARS: usize = 100;

pub fn run(pipeline: &RagPipeline, question: &str, top_k: Option<usize>, json: bool) -> Result<()> {
    let response = pipeline.ask(question, top_k)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    if response.answer == NO_CONTEXT_ANSWER {
        println!("{} {}", "!".yellow().bold(), response.answer);
        println!("  {} Run {} first?", "→".dimmed(), "rag index".cyan());
        return Ok(());
    }

    println!("{}", "Answer".bold());
    println!();
    for line in response.answer.lines() {
        println!("  {}", line);
    }
    println!();
    println!(
        "{} {} matches in {}ms",
        "→".dimmed(),
        response.matches.len(),
        response.duration_ms
    );
    println!();

    for (i, m) in response.matches.iter().enumerate() {
        let score_str = format!("{:.4}", m.score);
        let score_colored = if m.score > 0.8 {
            score_str.green()
        } else if m.score > 0.6 {
            score_str.yellow()
        } else {
            score_str.dimmed()
        };
        println!(
            "{}. [{}] {}",
            (i + 1).to_string().bold(),
            score_colored,
            m.file_path.cyan()
        );

        let first_line = m.content.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
        // char-aware for non-ASCII sources
        let preview = if first_line.chars().count() > PREVIEW_CHARS {
            format!("{}...", first_line.chars().take(PREVIEW_CHARS).collect::<String>())
        } else {
            first_line.to_string()
        };
        println!("   {}", preview.trim().dimmed());
    }

    Ok(())
}

//! Eval command - score retrieval against the QA set

use anyhow::Result;
use colored::Colorize;

use codebase_rag::RagPipeline;

/// The report always goes to stdout as JSON; progress goes to stderr.
pub fn run(pipeline: &RagPipeline, top_k: Option<usize>, skip_index: bool) -> Result<()> {
    if !skip_index {
        eprintln!("{} Updating index before evaluation...", "→".dimmed());
        let stats = pipeline.build_index(false)?;
        eprintln!(
            "{} {} files indexed, {} unchanged",
            "✓".green().bold(),
            stats.indexed,
            stats.skipped
        );
    }

    let report = pipeline.run_evaluation(top_k)?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    eprintln!(
        "{} {}/{} passed (pass rate {:.2}, hit rate {:.2}, recall {:.2})",
        if report.pass_rate >= 1.0 { "✓".green().bold() } else { "!".yellow().bold() },
        report.per_question.iter().filter(|r| r.passed).count(),
        report.total,
        report.pass_rate,
        report.retrieval_hit_rate,
        report.average_keyword_recall
    );

    Ok(())
}

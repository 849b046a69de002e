//! Retrieval evaluation against a fixed question set.
//!
//! Each case names the file that should be retrieved and keywords the
//! retrieved passages should contain. The report aggregates hit rate, keyword recall
//! and pass rate over all cases.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{AnswerResponse, RagPipeline};
use crate::error::{RagError, Result};

pub const DEFAULT_MIN_KEYWORD_RECALL: f64 = 0.6;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QaCase {
    pub id: String,
    pub question: String,
    /// Path suffix a retrieved match must end with.
    pub expected_file: String,
    pub expected_keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_keyword_recall: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvalResult {
    pub id: String,
    pub question: String,
    pub expected_file: String,
    pub top_match_files: Vec<String>,
    pub retrieval_hit: bool,
    /// Rounded to 2 decimals.
    pub keyword_recall: f64,
    pub passed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvalReport {
    pub corpus_path: String,
    pub total: usize,
    pub retrieval_hit_rate: f64,
    pub average_keyword_recall: f64,
    pub pass_rate: f64,
    pub per_question: Vec<EvalResult>,
}

pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

pub fn load_qa_set(path: &Path) -> Result<Vec<QaCase>> {
    let raw = fs::read_to_string(path).map_err(|e| {
        RagError::EvaluationData(format!("cannot read {}: {}", path.display(), e))
    })?;
    let cases: Vec<QaCase> = serde_json::from_str(&raw).map_err(|e| {
        RagError::EvaluationData(format!("invalid QA set {}: {}", path.display(), e))
    })?;

    if let Some(case) = cases.iter().find(|c| c.question.trim().is_empty()) {
        return Err(RagError::EvaluationData(format!(
            "case {:?} has an empty question",
            case.id
        )));
    }
    Ok(cases)
}

/// Score one answered case.
///
/// The hit test is a case-sensitive path suffix match; keywords are looked
/// up case-insensitively in the retrieved passages, not in the answer.
pub fn score_case(case: &QaCase, response: &AnswerResponse) -> EvalResult {
    let top_match_files: Vec<String> = response
        .matches
        .iter()
        .map(|m| m.file_path.clone())
        .collect();
    let retrieval_hit = top_match_files
        .iter()
        .any(|file| file.ends_with(&case.expected_file));

    let recall = if case.expected_keywords.is_empty() {
        0.0
    } else {
        let retrieved = response
            .matches
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
            .to_lowercase();
        let found = case
            .expected_keywords
            .iter()
            .filter(|keyword| retrieved.contains(&keyword.to_lowercase()))
            .count();
        found as f64 / case.expected_keywords.len() as f64
    };
    let threshold = case.min_keyword_recall.unwrap_or(DEFAULT_MIN_KEYWORD_RECALL);

    EvalResult {
        id: case.id.clone(),
        question: case.question.clone(),
        expected_file: case.expected_file.clone(),
        top_match_files,
        retrieval_hit,
        keyword_recall: round_to(recall, 2),
        passed: retrieval_hit && recall >= threshold,
    }
}

/// Aggregate per-case results. Every rate is 0.0 for an empty set.
pub fn summarize(corpus_path: String, results: Vec<EvalResult>) -> EvalReport {
    let total = results.len();
    let rate = |count: usize| {
        if total == 0 {
            0.0
        } else {
            round_to(count as f64 / total as f64, 2)
        }
    };

    let hits = results.iter().filter(|r| r.retrieval_hit).count();
    let passes = results.iter().filter(|r| r.passed).count();
    let average_keyword_recall = if total == 0 {
        0.0
    } else {
        round_to(
            results.iter().map(|r| r.keyword_recall).sum::<f64>() / total as f64,
            2,
        )
    };

    EvalReport {
        corpus_path,
        total,
        retrieval_hit_rate: rate(hits),
        average_keyword_recall,
        pass_rate: rate(passes),
        per_question: results,
    }
}

/// Answer every case of the configured QA set with `top_k` passages.
pub fn run_evaluation(pipeline: &RagPipeline, top_k: usize) -> Result<EvalReport> {
    let cases = load_qa_set(&pipeline.config().paths.qa_set)?;
    info!(cases = cases.len(), top_k, "running evaluation");

    let mut results = Vec::with_capacity(cases.len());
    for case in &cases {
        let response = pipeline.ask(&case.question, Some(top_k))?;
        let result = score_case(case, &response);
        debug!(id = %result.id, hit = result.retrieval_hit, recall = result.keyword_recall, "case scored");
        results.push(result);
    }

    Ok(summarize(pipeline.corpus_display(), results))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::test_support::config_at;
    use crate::rag::ChunkMatch;
    use crate::search::backend::testing::StaticBackend;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn case(id: &str, expected_file: &str, keywords: &[&str]) -> QaCase {
        QaCase {
            id: id.to_string(),
            question: format!("question {}", id),
            expected_file: expected_file.to_string(),
            expected_keywords: keywords.iter().map(|k| k.to_string()).collect(),
            min_keyword_recall: None,
        }
    }

    /// Response whose matches are `(file, content)` pairs.
    fn response(matches: &[(&str, &str)]) -> AnswerResponse {
        AnswerResponse {
            question: "q".to_string(),
            answer: String::new(),
            matches: matches
                .iter()
                .map(|(file, content)| ChunkMatch {
                    file_path: file.to_string(),
                    score: 0.5,
                    content: content.to_string(),
                })
                .collect(),
            duration_ms: 1,
        }
    }

    #[test]
    fn test_full_recall_passes() {
        let qa = case("auth", "auth.ts", &["bearer", "signature"]);
        let result = score_case(
            &qa,
            &response(&[("sample-codebase/src/auth.ts", "check the Bearer token signature")]),
        );
        assert!(result.retrieval_hit);
        assert_eq!(result.keyword_recall, 1.0);
        assert!(result.passed);
    }

    #[test]
    fn test_partial_recall_against_threshold() {
        let qa = case("rate-limit", "src/rateLimiter.ts", &["token", "bucket", "refill"]);
        let result = score_case(
            &qa,
            &response(&[
                ("sample-codebase/src/rateLimiter.ts", "token"),
                ("sample-codebase/src/orders.ts", "bucket"),
            ]),
        );
        assert!(result.retrieval_hit);
        assert_eq!(result.keyword_recall, 0.67);
        assert!(result.passed);

        let result = score_case(&qa, &response(&[("sample-codebase/src/rateLimiter.ts", "token only")]));
        assert_eq!(result.keyword_recall, 0.33);
        assert!(!result.passed);
    }

    #[test]
    fn test_threshold_uses_unrounded_recall() {
        let mut qa = case("t", "a.ts", &["one", "two", "three"]);
        qa.min_keyword_recall = Some(0.67);
        // 2/3 rounds to 0.67 but is below it
        let result = score_case(&qa, &response(&[("a.ts", "one two")]));
        assert_eq!(result.keyword_recall, 0.67);
        assert!(!result.passed);
    }

    #[test]
    fn test_keyword_match_ignores_case() {
        let qa = case("c", "a.ts", &["RateLimiter", "WINDOW"]);
        let result = score_case(&qa, &response(&[("a.ts", "class ratelimiter { window }")]));
        assert_eq!(result.keyword_recall, 1.0);
    }

    #[test]
    fn test_keywords_may_span_passages() {
        let qa = case("s", "a.ts", &["alpha", "beta"]);
        let result = score_case(&qa, &response(&[("a.ts", "alpha"), ("b.ts", "beta")]));
        assert_eq!(result.keyword_recall, 1.0);
        assert_eq!(result.top_match_files, vec!["a.ts", "b.ts"]);
    }

    #[test]
    fn test_empty_keywords_give_zero_recall() {
        let qa = case("e", "a.ts", &[]);
        let result = score_case(&qa, &response(&[("a.ts", "anything")]));
        assert!(result.retrieval_hit);
        assert_eq!(result.keyword_recall, 0.0);
        assert!(!result.passed);
    }

    #[test]
    fn test_hit_requires_case_sensitive_suffix() {
        let qa = case("s", "auth.ts", &["x"]);
        assert!(score_case(&qa, &response(&[("src/oauth.ts", "x"), ("src/auth.ts", "x")])).retrieval_hit);
        assert!(!score_case(&qa, &response(&[("src/auth.tsx", "x")])).retrieval_hit);
        assert!(!score_case(&qa, &response(&[("src/Auth.ts", "x")])).retrieval_hit);
        assert!(!score_case(&qa, &response(&[])).retrieval_hit);
    }

    #[test]
    fn test_summary_rates() {
        let qa = case("a", "a.ts", &["yes"]);
        let results = vec![
            score_case(&qa, &response(&[("a.ts", "yes")])),
            score_case(&qa, &response(&[("a.ts", "no")])),
            score_case(&qa, &response(&[("b.ts", "yes")])),
            score_case(&qa, &response(&[("x/a.ts", "yes")])),
        ];
        let report = summarize("sample-codebase".to_string(), results);
        assert_eq!(report.total, 4);
        assert_eq!(report.pass_rate, 0.5);
        assert_eq!(report.retrieval_hit_rate, 0.75);
        assert_eq!(report.average_keyword_recall, 0.75);
        assert_eq!(report.per_question.len(), 4);
    }

    #[test]
    fn test_empty_set_reports_zero() {
        let report = summarize("c".to_string(), Vec::new());
        assert_eq!(report.total, 0);
        assert_eq!(report.retrieval_hit_rate, 0.0);
        assert_eq!(report.average_keyword_recall, 0.0);
        assert_eq!(report.pass_rate, 0.0);
        assert!(report.per_question.is_empty());
    }

    #[test]
    fn test_report_serializes_camel_case() {
        let result = score_case(&case("a", "a.ts", &["k"]), &response(&[("a.ts", "k")]));
        let json = serde_json::to_value(summarize("c".to_string(), vec![result])).unwrap();
        assert_eq!(json["corpusPath"], "c");
        assert_eq!(json["perQuestion"][0]["topMatchFiles"][0], "a.ts");
        assert_eq!(json["perQuestion"][0]["retrievalHit"], true);
        assert_eq!(json["perQuestion"][0]["keywordRecall"], 1.0);
    }

    #[test]
    fn test_load_qa_set_errors() {
        let dir = TempDir::new().unwrap();
        let missing = load_qa_set(&dir.path().join("none.json")).unwrap_err();
        assert!(matches!(missing, RagError::EvaluationData(_)));

        let bad = dir.path().join("bad.json");
        fs::write(&bad, "{ not json").unwrap();
        assert!(matches!(load_qa_set(&bad), Err(RagError::EvaluationData(_))));

        let blank = dir.path().join("blank.json");
        fs::write(
            &blank,
            r#"[{"id": "b", "question": "  ", "expectedFile": "a.ts", "expectedKeywords": []}]"#,
        )
        .unwrap();
        assert!(matches!(load_qa_set(&blank), Err(RagError::EvaluationData(_))));

        let no_keywords = dir.path().join("no-keywords.json");
        fs::write(&no_keywords, r#"[{"id": "a", "question": "q?", "expectedFile": "a.ts"}]"#).unwrap();
        let err = load_qa_set(&no_keywords).unwrap_err();
        assert!(matches!(err, RagError::EvaluationData(_)));
        assert!(err.to_string().contains("expectedKeywords"));
    }

    #[test]
    fn test_run_evaluation_over_static_backend() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("data")).unwrap();
        fs::write(
            dir.path().join("data/qa-set.json"),
            r#"[
                {"id": "auth", "question": "bearer token check", "expectedFile": "src/auth.ts",
                 "expectedKeywords": ["bearer", "token"]},
                {"id": "refund", "question": "refund policy", "expectedFile": "src/billing.ts",
                 "expectedKeywords": ["refund"], "minKeywordRecall": 1.0}
            ]"#,
        )
        .unwrap();
        let auth = dir.path().join("sample-codebase/src/auth.ts");
        let backend = StaticBackend::new(&[(auth.to_str().unwrap(), 0.9, "verify the bearer token")]);
        let pipeline = RagPipeline::new(config_at(dir.path(), &[]), Arc::new(backend));

        let report = pipeline.run_evaluation(Some(3)).unwrap();
        assert_eq!(report.corpus_path, "sample-codebase");
        assert_eq!(report.total, 2);
        assert!(report.per_question[0].passed);
        assert_eq!(report.per_question[0].top_match_files, vec!["sample-codebase/src/auth.ts"]);
        assert!(!report.per_question[1].retrieval_hit);
        assert_eq!(report.pass_rate, 0.5);
    }

    #[test]
    fn test_missing_qa_set_is_reported() {
        let dir = TempDir::new().unwrap();
        let pipeline = RagPipeline::new(config_at(dir.path(), &[]), Arc::new(StaticBackend::default()));
        assert!(matches!(pipeline.run_evaluation(None), Err(RagError::EvaluationData(_))));
    }
}

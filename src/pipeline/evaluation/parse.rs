use serde::{Deserialize, Serialize};

use super::EvaluationError;

/// Expected shape of one branch's model response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchVerdict {
    pub feedback: String,
    pub fulfilled: bool,
    pub score: f64,
}

/// Fixed result substituted when a single branch's response cannot be
/// parsed. The batch as a whole still completes.
pub fn fallback_verdict() -> BranchVerdict {
    BranchVerdict {
        feedback: "Could not generate feedback for this criterion.".to_string(),
        fulfilled: false,
        score: 0.0,
    }
}

/// Parse one model response into a verdict.
///
/// Models wrap JSON in code fences often enough that we strip them first.
/// A score outside [0, 10] is a format violation, not a value to clamp.
pub fn parse_verdict(raw: &str) -> Result<BranchVerdict, EvaluationError> {
    let cleaned = strip_code_fences(raw);
    let verdict: BranchVerdict = serde_json::from_str(cleaned)
        .map_err(|e| EvaluationError::ResponseParsing(e.to_string()))?;

    if !(0.0..=10.0).contains(&verdict.score) {
        return Err(EvaluationError::ResponseParsing(format!(
            "score {} outside [0, 10]",
            verdict.score
        )));
    }

    Ok(verdict)
}

fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_open.strip_suffix("```").unwrap_or(without_open).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_json() {
        let verdict = parse_verdict(
            r#"{"feedback": "The ratio appears in section 4.", "fulfilled": true, "score": 8.5}"#,
        )
        .unwrap();
        assert!(verdict.fulfilled);
        assert_eq!(verdict.score, 8.5);
        assert!(verdict.feedback.contains("section 4"));
    }

    #[test]
    fn parses_fenced_json() {
        let raw = "```json\n{\"feedback\": \"Not found.\", \"fulfilled\": false, \"score\": 0}\n```";
        let verdict = parse_verdict(raw).unwrap();
        assert!(!verdict.fulfilled);
        assert_eq!(verdict.score, 0.0);
    }

    #[test]
    fn garbage_is_a_parse_error() {
        let result = parse_verdict("I'm sorry, I can't answer that.");
        assert!(matches!(result, Err(EvaluationError::ResponseParsing(_))));
    }

    #[test]
    fn missing_field_is_a_parse_error() {
        let result = parse_verdict(r#"{"feedback": "x", "score": 5}"#);
        assert!(matches!(result, Err(EvaluationError::ResponseParsing(_))));
    }

    #[test]
    fn out_of_range_score_is_a_parse_error() {
        let result = parse_verdict(r#"{"feedback": "x", "fulfilled": true, "score": 11}"#);
        assert!(matches!(result, Err(EvaluationError::ResponseParsing(_))));

        let result = parse_verdict(r#"{"feedback": "x", "fulfilled": true, "score": -1}"#);
        assert!(matches!(result, Err(EvaluationError::ResponseParsing(_))));
    }

    #[test]
    fn boundary_scores_accepted() {
        assert_eq!(
            parse_verdict(r#"{"feedback": "x", "fulfilled": false, "score": 0}"#).unwrap().score,
            0.0
        );
        assert_eq!(
            parse_verdict(r#"{"feedback": "x", "fulfilled": true, "score": 10}"#).unwrap().score,
            10.0
        );
    }

    #[test]
    fn fallback_is_unfulfilled_generic() {
        let fallback = fallback_verdict();
        assert!(!fallback.fulfilled);
        assert_eq!(fallback.score, 0.0);
        assert!(fallback.feedback.contains("Could not generate feedback"));
    }
}

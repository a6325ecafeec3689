//! Auditor verdict parse cascade (spec §6 "Auditor verdict grammar").
//!
//! Ported from `agents/auditor/agent.py`'s `parse_audit_markdown_response`
//! and its helpers. The auditor model is free-text and may answer with a
//! JSON object, a JSON object embedded in prose or fenced in backticks, a
//! Python-dict-style quasi-JSON object (single quotes), or a markdown
//! `# SAFE: / # REASON: / # EXPLANATION:` block. Every stage is tried in
//! order; if none parse, the verdict defaults to unsafe (spec §7 failure
//! kind 8: audit parse failure is treated as `safe: false`, never a hard
//! error).

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::models::AuditVerdict;

/// Parse an auditor model's raw text response into a verdict.
///
/// Defaults to `safe: false` if no stage below can extract a verdict —
/// this function never returns `Err`; a parse failure is itself a finding.
pub fn parse_audit_response(auditor_output: &str) -> AuditVerdict {
    if let Some(verdict) = parse_json_verdict(auditor_output) {
        return verdict;
    }
    parse_markdown_verdict(auditor_output)
}

/// Stage 1 + 2 + 3: direct JSON, fenced/embedded JSON, quasi-JSON fallback.
fn parse_json_verdict(auditor_output: &str) -> Option<AuditVerdict> {
    // Stage 1: the whole response parses as JSON and contains the verdict
    // fields somewhere in its structure.
    if let Ok(value) = serde_json::from_str::<Value>(auditor_output) {
        if let Some(verdict) = find_verdict_in_json(&value) {
            return Some(verdict);
        }
    }

    // Stage 2: extract a `{...}` object from a fenced code block or from
    // anywhere in the prose, then try JSON first and a single-quote
    // substitution second.
    if let Some(candidate) = extract_json_candidate(auditor_output) {
        if let Ok(value) = serde_json::from_str::<Value>(&candidate) {
            if let Some(verdict) = find_verdict_in_json(&value) {
                return Some(verdict);
            }
        }
        let requoted = candidate.replace('\'', "\"");
        if let Ok(value) = serde_json::from_str::<Value>(&requoted) {
            if let Some(verdict) = find_verdict_in_json(&value) {
                return Some(verdict);
            }
        }
    }

    // Stage 3: the whole response, with single quotes swapped for double
    // quotes, parses as JSON (Python-dict-style quasi-JSON).
    let requoted_whole = auditor_output.replace('\'', "\"");
    if let Ok(value) = serde_json::from_str::<Value>(&requoted_whole) {
        if let Some(verdict) = find_verdict_in_json(&value) {
            return Some(verdict);
        }
    }

    None
}

fn json_fence_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```|(\{.*\})").expect("static JSON fence regex is valid")
    })
}

fn extract_json_candidate(text: &str) -> Option<String> {
    let captures = json_fence_pattern().captures(text)?;
    captures
        .get(1)
        .or_else(|| captures.get(2))
        .map(|m| m.as_str().to_string())
}

/// Recursively search a JSON value for an object carrying (case-
/// insensitively) `safe`, `reason` and `explanation` keys.
fn find_verdict_in_json(value: &Value) -> Option<AuditVerdict> {
    match value {
        Value::Object(map) => {
            let mut safe_val = None;
            let mut reason_val = None;
            let mut explanation_val = None;
            for (key, val) in map {
                match key.to_uppercase().as_str() {
                    "SAFE" => safe_val = Some(val),
                    "REASON" => reason_val = Some(val),
                    "EXPLANATION" => explanation_val = Some(val),
                    _ => {}
                }
            }
            if let (Some(safe), Some(reason), Some(explanation)) = (safe_val, reason_val, explanation_val) {
                return Some(AuditVerdict {
                    safe: value_as_bool(safe),
                    reason: value_as_string(reason),
                    explanation: value_as_string(explanation),
                });
            }
            for val in map.values() {
                if let Some(verdict) = find_verdict_in_json(val) {
                    return Some(verdict);
                }
            }
            None
        }
        Value::Array(items) => items.iter().find_map(find_verdict_in_json),
        _ => None,
    }
}

fn value_as_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

fn value_as_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn safe_line_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?im)^\s*#+\s*SAFE:\s*(true|false)").expect("static markdown SAFE regex is valid")
    })
}

fn reason_line_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?ims)^\s*#+\s*REASON:\s*(.*?)\s*$").expect("static markdown REASON regex is valid")
    })
}

fn explanation_line_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?ims)^\s*#+\s*EXPLANATION:\s*(.*?)\s*$").expect("static markdown EXPLANATION regex is valid")
    })
}

/// Stage 4: markdown `# SAFE:` / `# REASON:` / `# EXPLANATION:` headers.
/// Defaults to an unsafe verdict if even this fails to find a `SAFE` line.
fn parse_markdown_verdict(auditor_output: &str) -> AuditVerdict {
    let safe = safe_line_pattern()
        .captures(auditor_output)
        .map(|c| c[1].eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    let mut reason = reason_line_pattern()
        .captures(auditor_output)
        .map(|c| c[1].trim().to_string())
        .unwrap_or_else(|| "N/A".to_string());

    let mut explanation = explanation_line_pattern()
        .captures(auditor_output)
        .map(|c| c[1].trim().to_string())
        .unwrap_or_else(|| "N/A".to_string());

    if !safe && reason == "N/A" {
        reason = "Unable to determine safety from auditor response.".to_string();
    }
    if !safe && explanation == "N/A" {
        explanation = format!("Auditor response format was unexpected: '{auditor_output}'.");
    }

    AuditVerdict { safe, reason, explanation }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_direct_json_object() {
        let verdict = parse_audit_response(r#"{"safe": true, "reason": "benign", "explanation": "just ls"}"#);
        assert!(verdict.safe);
        assert_eq!(verdict.reason, "benign");
    }

    #[test]
    fn parses_json_case_insensitive_keys() {
        let verdict = parse_audit_response(r#"{"SAFE": false, "Reason": "destructive", "EXPLANATION": "rm -rf /"}"#);
        assert!(!verdict.safe);
        assert_eq!(verdict.reason, "destructive");
    }

    #[test]
    fn parses_json_fenced_in_backticks() {
        let text = "Let me think about this.\n```json\n{\"safe\": false, \"reason\": \"bad\", \"explanation\": \"nope\"}\n```\nDone.";
        let verdict = parse_audit_response(text);
        assert!(!verdict.safe);
        assert_eq!(verdict.reason, "bad");
    }

    #[test]
    fn parses_embedded_json_without_fence() {
        let text = "My verdict is {\"safe\": true, \"reason\": \"ok\", \"explanation\": \"fine\"} and that's final.";
        let verdict = parse_audit_response(text);
        assert!(verdict.safe);
    }

    #[test]
    fn parses_quasi_json_single_quotes() {
        let text = "{'safe': false, 'reason': 'dangerous', 'explanation': 'deletes data'}";
        let verdict = parse_audit_response(text);
        assert!(!verdict.safe);
        assert_eq!(verdict.reason, "dangerous");
    }

    #[test]
    fn falls_back_to_markdown_headers() {
        let text = "# SAFE: false\n# REASON: destructive command\n# EXPLANATION: rm -rf deletes everything";
        let verdict = parse_audit_response(text);
        assert!(!verdict.safe);
        assert_eq!(verdict.reason, "destructive command");
        assert_eq!(verdict.explanation, "rm -rf deletes everything");
    }

    #[test]
    fn markdown_headers_case_insensitive_and_multi_hash() {
        let text = "## safe: TRUE\n## reason: looks fine\n## explanation: read-only command";
        let verdict = parse_audit_response(text);
        assert!(verdict.safe);
        assert_eq!(verdict.reason, "looks fine");
    }

    #[test]
    fn total_parse_failure_defaults_to_unsafe() {
        let verdict = parse_audit_response("I cannot determine this at all, sorry.");
        assert!(!verdict.safe);
        assert_eq!(verdict.reason, "Unable to determine safety from auditor response.");
        assert_eq!(
            verdict.explanation,
            "Auditor response format was unexpected: 'I cannot determine this at all, sorry.'."
        );
    }

    #[test]
    fn nested_json_verdict_is_found_recursively() {
        let text = r#"{"response": {"verdict": {"safe": true, "reason": "ok", "explanation": "fine"}}}"#;
        let verdict = parse_audit_response(text);
        assert!(verdict.safe);
    }
}

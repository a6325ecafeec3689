//! `[STEP]`-delimited plan parser (spec §4.3).
//!
//! Ported from `plan_parser.py::parse_plan`: normalize line endings, split
//! the planner's raw text on a `[STEP]` delimiter in any of its three
//! positions (leading, trailing, or interior), trim and discard empty
//! segments, and number what remains into [`RecipeStep`]s. The planner's
//! `fallback_action` is never populated by this parser — it always returns
//! `None` for it, matching the Python source exactly; a fallback can only
//! ever come from a later design (spec §4.3 notes this is intentional).

use regex::Regex;
use std::sync::OnceLock;

use crate::models::{RecipeStep, ToolKind};

fn delimiter_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)\n\[STEP\]\n|^\[STEP\]\n|\n\[STEP\]$").expect("static plan delimiter regex is valid")
    })
}

/// Parse a planner's raw text into recipe steps.
///
/// Returns `(steps, fallback_action)`; `fallback_action` is always `None`
/// from this parser, per `plan_parser.py`.
pub fn parse_plan(plan_str: &str) -> (Vec<RecipeStep>, Option<RecipeStep>) {
    let normalized = plan_str.replace("\r\n", "\n");
    let normalized = normalized.trim();

    if normalized.is_empty() {
        return (Vec::new(), None);
    }

    let segments: Vec<&str> = delimiter_pattern()
        .split(normalized)
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .collect();

    if segments.is_empty() {
        return (Vec::new(), None);
    }

    let steps = segments
        .into_iter()
        .enumerate()
        .map(|(i, segment)| {
            let n = i + 1;
            RecipeStep {
                description: format!("Execute command block {n}"),
                expected_outcome: format!("Command block {n} executed successfully"),
                action: segment.to_string(),
                tool: ToolKind::ShellTool,
            }
        })
        .collect();

    (steps, None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_plan_returns_no_steps() {
        let (steps, fallback) = parse_plan("");
        assert!(steps.is_empty());
        assert!(fallback.is_none());
    }

    #[test]
    fn whitespace_only_plan_returns_no_steps() {
        let (steps, _) = parse_plan("   \n\n  ");
        assert!(steps.is_empty());
    }

    #[test]
    fn single_step_with_leading_delimiter() {
        let (steps, fallback) = parse_plan("[STEP]\nls -la");
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].action, "ls -la");
        assert_eq!(steps[0].tool, ToolKind::ShellTool);
        assert_eq!(steps[0].description, "Execute command block 1");
        assert_eq!(steps[0].expected_outcome, "Command block 1 executed successfully");
        assert!(fallback.is_none());
    }

    #[test]
    fn multiple_steps_split_on_interior_delimiter() {
        let (steps, _) = parse_plan("cd /tmp\nls\n[STEP]\nrm -rf build\n[STEP]\nmake");
        assert_eq!(steps.len(), 3);
        assert_eq!(steps[0].action, "cd /tmp\nls");
        assert_eq!(steps[1].action, "rm -rf build");
        assert_eq!(steps[2].action, "make");
        assert_eq!(steps[1].description, "Execute command block 2");
    }

    #[test]
    fn trailing_delimiter_is_stripped_as_empty_segment() {
        let (steps, _) = parse_plan("echo hi\n[STEP]");
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].action, "echo hi");
    }

    #[test]
    fn delimiter_matching_is_case_insensitive() {
        let (steps, _) = parse_plan("[step]\necho one\n[Step]\necho two");
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].action, "echo one");
        assert_eq!(steps[1].action, "echo two");
    }

    #[test]
    fn crlf_line_endings_are_normalized() {
        let (steps, _) = parse_plan("echo one\r\n[STEP]\r\necho two");
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].action, "echo one");
        assert_eq!(steps[1].action, "echo two");
    }

    #[test]
    fn segments_are_trimmed_of_surrounding_whitespace() {
        let (steps, _) = parse_plan("  \n  echo one  \n  [STEP]\n   echo two   ");
        assert_eq!(steps[0].action, "echo one");
        assert_eq!(steps[1].action, "echo two");
    }

    #[test]
    fn no_delimiter_yields_single_step() {
        let (steps, _) = parse_plan("just one command, no delimiter");
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].action, "just one command, no delimiter");
    }

    #[test]
    fn step_followed_by_more_text_on_the_same_line_does_not_split() {
        let (steps, _) = parse_plan("foo\n[STEP]bar");
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].action, "foo\n[STEP]bar");
    }

    #[test]
    fn fallback_action_is_always_none() {
        let (_, fallback) = parse_plan("[STEP]\na\n[STEP]\nb\n[STEP]\nc");
        assert!(fallback.is_none());
    }
}

//! Canonical event-type constants for the sentinel NDJSON event stream.
//!
//! Every record the [`crate::emitter::Emitter`] writes to standard output
//! carries one of these strings in its `type` field (spec §6). Three of
//! them (`debug_log`, `info_log`, `warn_log`) are categorized logs subject
//! to verbosity filtering; the rest are unconditionally emitted.
//!
//! # Categories
//!
//! | Category        | Types                                          |
//! |------------------|------------------------------------------------|
//! | Categorized logs | `debug_log`, `info_log`, `warn_log`             |
//! | Lifecycle        | `plan`, `result`, `final_summary`               |
//! | Safety           | `unsafe`, `deny_current_action`                 |
//! | Approval         | `request_approval`                              |
//! | Failure          | `error`                                         |

/// Debug-level categorized log line (`{message, location}`).
pub const DEBUG_LOG: &str = "debug_log";
/// Info-level categorized log line (`{message, location}`).
pub const INFO_LOG: &str = "info_log";
/// Warn-level categorized log line (`{message, location}`).
pub const WARN_LOG: &str = "warn_log";

/// An unrecoverable or reportable error (`{message, location?}`).
pub const ERROR: &str = "error";

/// An auditor verdict of `safe == false` (`{reason, explanation}`).
pub const UNSAFE: &str = "unsafe";

/// The parsed initial plan
/// (`{request, recipe_steps: [...], fallback_action?}`).
pub const PLAN: &str = "plan";

/// A pending user-approval request (`{description, action, tool}`).
pub const REQUEST_APPROVAL: &str = "request_approval";

/// The outcome of one mediated tool invocation
/// (`{status, interpret_message, output?}`).
pub const RESULT: &str = "result";

/// The terminal event of a command-loop turn
/// (`{summary, nutshell, status, reason?}`).
pub const FINAL_SUMMARY: &str = "final_summary";

/// The run is being cancelled at the current action (`{message}`).
pub const DENY_CURRENT_ACTION: &str = "deny_current_action";

/// The categorized-log event types, i.e. the ones subject to verbosity
/// filtering in [`crate::emitter::Emitter`].
pub const CATEGORIZED_LOGS: &[&str] = &[DEBUG_LOG, INFO_LOG, WARN_LOG];

/// All canonical event-type constants, for iteration and validation.
pub const ALL_EVENTS: &[&str] = &[
    DEBUG_LOG,
    INFO_LOG,
    WARN_LOG,
    ERROR,
    UNSAFE,
    PLAN,
    REQUEST_APPROVAL,
    RESULT,
    FINAL_SUMMARY,
    DENY_CURRENT_ACTION,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categorized_log_constants() {
        assert_eq!(DEBUG_LOG, "debug_log");
        assert_eq!(INFO_LOG, "info_log");
        assert_eq!(WARN_LOG, "warn_log");
    }

    #[test]
    fn lifecycle_constants() {
        assert_eq!(PLAN, "plan");
        assert_eq!(RESULT, "result");
        assert_eq!(FINAL_SUMMARY, "final_summary");
    }

    #[test]
    fn safety_and_approval_constants() {
        assert_eq!(UNSAFE, "unsafe");
        assert_eq!(DENY_CURRENT_ACTION, "deny_current_action");
        assert_eq!(REQUEST_APPROVAL, "request_approval");
    }

    #[test]
    fn all_events_has_no_duplicates() {
        let mut seen = std::collections::HashSet::new();
        for event in ALL_EVENTS {
            assert!(seen.insert(event), "Duplicate in ALL_EVENTS: {event}");
        }
    }

    #[test]
    fn all_events_count() {
        assert_eq!(ALL_EVENTS.len(), 10);
    }

    #[test]
    fn categorized_logs_is_subset_of_all_events() {
        for event in CATEGORIZED_LOGS {
            assert!(ALL_EVENTS.contains(event));
        }
    }

    #[test]
    fn only_categorized_logs_are_filterable() {
        for event in ALL_EVENTS {
            let is_categorized = CATEGORIZED_LOGS.contains(event);
            let is_lifecycle_or_safety = !is_categorized;
            assert!(is_categorized || is_lifecycle_or_safety);
        }
    }
}

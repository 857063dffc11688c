//! Stuck-loop detection
//!
//! The loop tracks tool-call repetition and consecutive no-result rounds so
//! it can nudge the model with a hint or cut the session short instead of
//! burning rounds on searches that will never land.

use scout_ai::ToolCall;
use std::collections::HashMap;

/// Thresholds governing the agent loop
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Hard cap on provider round trips per question
    pub max_rounds: usize,
    /// Force completion after this many consecutive all-empty rounds
    pub force_after_empty: usize,
    /// Force completion once this many tool calls have run while the loop is
    /// already struggling (see `min_empty_for_call_cap`)
    pub max_calls_with_empty: usize,
    /// How many consecutive empty rounds count as "struggling" for the
    /// call-count cutoff
    pub min_empty_for_call_cap: usize,
    /// Inject the search-guidance hint after this many consecutive empty
    /// rounds (a repeated call triggers it immediately)
    pub hint_after_empty: usize,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_rounds: 10,
            force_after_empty: 3,
            max_calls_with_empty: 8,
            min_empty_for_call_cap: 2,
            hint_after_empty: 2,
        }
    }
}

/// Per-question loop state
#[derive(Debug, Default)]
pub(crate) struct LoopState {
    /// Tool calls seen so far, keyed by canonical identity
    history: HashMap<String, u32>,
    pub(crate) consecutive_empty: usize,
    pub(crate) total_calls: usize,
    pub(crate) hint_injected: bool,
}

impl LoopState {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Record a tool call; returns true when the identical call was already
    /// made this question.
    pub(crate) fn record_call(&mut self, call: &ToolCall) -> bool {
        self.total_calls += 1;
        let count = self.history.entry(call_key(call)).or_insert(0);
        *count += 1;
        *count > 1
    }

    /// Fold one round's outcome into the empty-round counter and decide
    /// whether the hint should be active from the next round on.
    pub(crate) fn finish_round(&mut self, had_useful_result: bool, had_repeat: bool, config: &LoopConfig) {
        if had_useful_result {
            self.consecutive_empty = 0;
        } else {
            self.consecutive_empty += 1;
        }
        if (self.consecutive_empty >= config.hint_after_empty || had_repeat) && !self.hint_injected
        {
            self.hint_injected = true;
        }
    }

    /// Whether the loop should stop asking the model and assemble an answer
    /// from what it already has.
    pub(crate) fn should_force_completion(&self, config: &LoopConfig) -> bool {
        self.consecutive_empty >= config.force_after_empty
            || (self.total_calls >= config.max_calls_with_empty
                && self.consecutive_empty >= config.min_empty_for_call_cap)
    }
}

/// Canonical identity of a tool call: name plus serialized arguments.
/// `serde_json` keeps object keys sorted, so argument order in the original
/// request does not matter.
fn call_key(call: &ToolCall) -> String {
    format!("{}\u{1}{}", call.name, call.arguments)
}

/// Whether a tool result carries no usable signal: too short, or one of the
/// standard no-result phrasings.
pub(crate) fn is_empty_result(result: &str) -> bool {
    let lower = result.to_lowercase();
    lower.contains("no files found")
        || lower.contains("no matches")
        || lower.contains("not found")
        || lower.len() < 30
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(name: &str, args: serde_json::Value) -> ToolCall {
        ToolCall::new("call_x", name, args)
    }

    #[test]
    fn test_empty_result_detection() {
        assert!(is_empty_result("No files found"));
        assert!(is_empty_result("Pattern NOT FOUND in directory"));
        assert!(is_empty_result("short"));
        assert!(!is_empty_result(
            "Found 2 matches\n\nsrc/main.rs:\n  Line 1: fn main() {}"
        ));
    }

    #[test]
    fn test_repeat_detection_ignores_call_id() {
        let mut state = LoopState::new();
        assert!(!state.record_call(&ToolCall::new("id_1", "grep", json!({"pattern": "x"}))));
        assert!(state.record_call(&ToolCall::new("id_2", "grep", json!({"pattern": "x"}))));
    }

    #[test]
    fn test_repeat_detection_key_order_insensitive() {
        let mut state = LoopState::new();
        let a: serde_json::Value =
            serde_json::from_str(r#"{"pattern": "x", "path": "src"}"#).unwrap();
        let b: serde_json::Value =
            serde_json::from_str(r#"{"path": "src", "pattern": "x"}"#).unwrap();
        assert!(!state.record_call(&call("grep", a)));
        assert!(state.record_call(&call("grep", b)));
    }

    #[test]
    fn test_different_args_not_repeats() {
        let mut state = LoopState::new();
        assert!(!state.record_call(&call("grep", json!({"pattern": "x"}))));
        assert!(!state.record_call(&call("grep", json!({"pattern": "y"}))));
        assert!(!state.record_call(&call("glob", json!({"pattern": "x"}))));
    }

    #[test]
    fn test_force_after_consecutive_empty() {
        let config = LoopConfig::default();
        let mut state = LoopState::new();
        for _ in 0..2 {
            state.finish_round(false, false, &config);
            assert!(!state.should_force_completion(&config));
        }
        state.finish_round(false, false, &config);
        assert!(state.should_force_completion(&config));
    }

    #[test]
    fn test_useful_round_resets_empty_counter() {
        let config = LoopConfig::default();
        let mut state = LoopState::new();
        state.finish_round(false, false, &config);
        state.finish_round(false, false, &config);
        state.finish_round(true, false, &config);
        assert_eq!(state.consecutive_empty, 0);
        assert!(!state.should_force_completion(&config));
    }

    #[test]
    fn test_force_on_call_budget_with_empty_rounds() {
        let config = LoopConfig::default();
        let mut state = LoopState::new();
        for i in 0..8 {
            state.record_call(&call("grep", json!({"pattern": format!("p{i}")})));
        }
        state.finish_round(false, false, &config);
        state.finish_round(false, false, &config);
        assert!(state.should_force_completion(&config));
    }

    #[test]
    fn test_many_calls_alone_do_not_force() {
        let config = LoopConfig::default();
        let mut state = LoopState::new();
        for i in 0..9 {
            state.record_call(&call("grep", json!({"pattern": format!("p{i}")})));
        }
        state.finish_round(true, false, &config);
        assert!(!state.should_force_completion(&config));
    }

    #[test]
    fn test_hint_on_repeat() {
        let config = LoopConfig::default();
        let mut state = LoopState::new();
        state.finish_round(true, true, &config);
        assert!(state.hint_injected);
    }

    #[test]
    fn test_hint_on_empty_rounds() {
        let config = LoopConfig::default();
        let mut state = LoopState::new();
        state.finish_round(false, false, &config);
        assert!(!state.hint_injected);
        state.finish_round(false, false, &config);
        assert!(state.hint_injected);
    }
}

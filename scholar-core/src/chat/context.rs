//! Keeping the prompt under the character ceiling.

use crate::provider::{Message, Role};
use crate::tracker::truncate_chars;

pub(crate) const PRUNED_MARKER: &str = "[earlier search result removed to fit the context limit]";

const ELLIPSIS_CHARS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PruneReport {
    pub pruned: usize,
    /// Latest-round results that had to be cut short.
    pub truncated: usize,
    /// Context size after pruning, system message included.
    pub chars: usize,
}

/// Size of `turns` plus everything sent ahead of them.
pub(crate) fn context_chars(base_chars: usize, turns: &[Message]) -> usize {
    base_chars + turns.iter().map(Message::char_len).sum::<usize>()
}

/// Brings the context under `max_chars`.
///
/// `base_chars` is the size of everything sent ahead of `turns` (the system
/// message). The oldest tool-result turns before `protect_from` are replaced
/// with a short marker first. If that is not enough, the tool results of the
/// latest round (at or after `protect_from`) are each cut to an equal share of
/// the remaining budget. User and assistant turns are never touched, so every
/// tool call keeps its result turn.
pub(crate) fn prune_tool_results(
    turns: &mut [Message],
    base_chars: usize,
    max_chars: usize,
    protect_from: usize,
) -> PruneReport {
    let mut total = context_chars(base_chars, turns);
    let mut pruned = 0;
    let marker_len = PRUNED_MARKER.chars().count();

    for turn in turns.iter_mut().take(protect_from) {
        if total <= max_chars {
            break;
        }
        if turn.role != Role::Tool || turn.content == PRUNED_MARKER {
            continue;
        }

        let len = turn.char_len();
        if len <= marker_len {
            continue;
        }

        total = total - len + marker_len;
        turn.content = PRUNED_MARKER.to_string();
        pruned += 1;
    }

    let mut truncated = 0;
    if total > max_chars {
        let latest: Vec<usize> = (protect_from..turns.len())
            .filter(|&i| turns[i].role == Role::Tool)
            .collect();

        if !latest.is_empty() {
            let latest_chars: usize = latest.iter().map(|&i| turns[i].char_len()).sum();
            let budget = max_chars.saturating_sub(total - latest_chars);
            let share = budget / latest.len();

            for i in latest {
                let len = turns[i].char_len();
                if len <= share {
                    continue;
                }
                let clipped = clip(&turns[i].content, share);
                total = total - len + clipped.chars().count();
                turns[i].content = clipped;
                truncated += 1;
            }
        }
    }

    PruneReport {
        pruned,
        truncated,
        chars: total,
    }
}

/// Cuts `text` to exactly `max` characters, ellipsis included.
fn clip(text: &str, max: usize) -> String {
    if max <= ELLIPSIS_CHARS {
        return text.chars().take(max).collect();
    }
    truncate_chars(text, max - ELLIPSIS_CHARS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ToolCall;

    fn turns() -> Vec<Message> {
        vec![
            Message::user("question"),
            Message::assistant_tool_calls("", vec![ToolCall::new("s", serde_json::json!({}))]),
            Message::tool("s", "a".repeat(100)),
            Message::tool("s", "b".repeat(100)),
            Message::assistant_tool_calls("", vec![ToolCall::new("s", serde_json::json!({}))]),
            Message::tool("s", "c".repeat(100)),
        ]
    }

    #[test]
    fn test_under_limit_untouched() {
        let mut turns = turns();
        let report = prune_tool_results(&mut turns, 10, 10_000, 4);
        assert_eq!(report.pruned, 0);
        assert_eq!(turns[2].content, "a".repeat(100));
    }

    #[test]
    fn test_prunes_oldest_first() {
        let mut turns = turns();
        let total: usize = 10 + turns.iter().map(Message::char_len).sum::<usize>();

        // One replacement is enough.
        let report = prune_tool_results(&mut turns, 10, total - 40, 4);
        assert_eq!(report.pruned, 1);
        assert_eq!(turns[2].content, PRUNED_MARKER);
        assert_eq!(turns[3].content, "b".repeat(100));
        assert!(report.chars <= total - 40);
    }

    #[test]
    fn test_never_drops_query_or_call_turns() {
        let mut turns = turns();
        let report = prune_tool_results(&mut turns, 10, 0, 4);

        assert_eq!(report.pruned, 2);
        assert_eq!(report.truncated, 1);
        assert_eq!(turns.len(), 6);
        assert_eq!(turns[0].content, "question");
        assert_eq!(turns[1].tool_calls.as_ref().map(Vec::len), Some(1));
        assert_eq!(turns[5].role, Role::Tool);
    }

    #[test]
    fn test_older_results_pruned_before_latest_round_is_cut() {
        let mut turns = turns();
        let total = context_chars(10, &turns);

        // Pruning both older results frees enough; the latest round stays whole.
        let report = prune_tool_results(&mut turns, 10, total - 80, 4);
        assert_eq!(report.pruned, 2);
        assert_eq!(report.truncated, 0);
        assert_eq!(turns[5].content, "c".repeat(100));
    }

    #[test]
    fn test_oversized_latest_round_is_cut_to_fit() {
        let mut turns = vec![
            Message::user("question"),
            Message::assistant_tool_calls("", vec![ToolCall::new("s", serde_json::json!({}))]),
            Message::tool("s", "a".repeat(4000)),
            Message::tool("s", "b".repeat(4000)),
        ];
        let report = prune_tool_results(&mut turns, 100, 3000, 1);

        assert_eq!(report.pruned, 0);
        assert_eq!(report.truncated, 2);
        assert!(report.chars <= 3000);
        assert_eq!(report.chars, context_chars(100, &turns));
        assert_eq!(turns.len(), 4);
        assert!(turns[2].content.starts_with("aaa"));
        assert!(turns[2].content.ends_with("..."));
        assert!(turns[3].content.starts_with("bbb"));
    }

    #[test]
    fn test_tiny_budget_still_bounded() {
        let mut turns = vec![Message::user("q"), Message::tool("s", "x".repeat(50))];
        let report = prune_tool_results(&mut turns, 0, 3, 1);

        assert_eq!(turns[1].content, "xx");
        assert_eq!(report.chars, 3);
    }
}

//! Usage aggregation across models and context-window estimation
//!
//! Live sessions report usage per model; the supervisor wants one rolled-up
//! figure plus a "how full is the context" percentage. Absence of usage is
//! meaningful here: a session that has reported nothing yet must stay
//! distinguishable from one that reported zeros.

use crate::types::{AgentKind, ModelUsage, UsageStats};
use std::collections::HashMap;

/// Fallback context window when neither the per-model data nor the agent
/// supplies one.
pub const DEFAULT_CONTEXT_WINDOW: u64 = 200_000;

/// Roll per-model usage up into a single [`UsageStats`].
///
/// When the map has entries, token fields sum across models and the
/// context window takes the maximum of the per-model windows, on the
/// reasoning that the limiting window for a mixed-model session is the
/// largest one actually in play. An empty map falls back to `fallback`'s
/// top-level fields (agents that report only a session total). When no
/// window is available from either source, [`DEFAULT_CONTEXT_WINDOW`]
/// applies. `cost_usd` is passed through from the caller, which tracked it
/// incrementally.
pub fn aggregate_model_usage(
    models: &HashMap<String, ModelUsage>,
    fallback: Option<&ModelUsage>,
    cost_usd: f64,
) -> UsageStats {
    let mut stats = UsageStats {
        total_cost_usd: cost_usd,
        context_window: DEFAULT_CONTEXT_WINDOW,
        ..UsageStats::default()
    };

    let mut max_window: Option<u64> = None;

    if models.is_empty() {
        if let Some(usage) = fallback {
            stats.input_tokens = usage.input_tokens;
            stats.output_tokens = usage.output_tokens;
            stats.cache_read_input_tokens = usage.cache_read_input_tokens;
            stats.cache_creation_input_tokens = usage.cache_creation_input_tokens;
            if usage.context_window > 0 {
                max_window = Some(usage.context_window);
            }
        }
    } else {
        for usage in models.values() {
            stats.input_tokens += usage.input_tokens;
            stats.output_tokens += usage.output_tokens;
            stats.cache_read_input_tokens += usage.cache_read_input_tokens;
            stats.cache_creation_input_tokens += usage.cache_creation_input_tokens;

            if usage.context_window > 0 {
                let window = usage.context_window;
                max_window = Some(max_window.map_or(window, |w| w.max(window)));
            }
        }
    }

    if let Some(window) = max_window {
        stats.context_window = window;
    }

    stats
}

/// Estimate context usage as a percentage, or `None` when it cannot be
/// computed.
///
/// Output tokens are excluded from the numerator: only input tokens
/// occupy the window, generated ones do not count. The result is capped
/// at 100 since a reported-full window cannot be fuller.
///
/// `Some(0.0)` and `None` mean different things to a caller: zeros say the
/// session is live but empty, `None` says there is nothing to estimate
/// against (no usable window at all).
pub fn estimate_context_usage(stats: Option<&UsageStats>, agent: Option<AgentKind>) -> Option<f64> {
    let stats = stats?;

    // No usage yet is a known state, reported as an explicit zero rather
    // than "unknowable"
    if stats.input_tokens + stats.output_tokens == 0 {
        return Some(0.0);
    }

    let window = if stats.context_window > 0 {
        stats.context_window
    } else {
        // An unspecified agent has no default window to fall back on
        let fallback = agent.map(|a| a.default_context_window()).unwrap_or(0);
        if fallback == 0 {
            return None;
        }
        fallback
    };

    let pct = stats.input_tokens as f64 / window as f64 * 100.0;
    Some(pct.min(100.0))
}

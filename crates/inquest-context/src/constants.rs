//! Shared constants for context-window enforcement.

/// Default per-call token budget for a single tool result.
pub const DEFAULT_TOOL_RESULT_MAX_TOKENS: u64 = 2_000;

/// Default fraction of the input budget the compactor preserves verbatim.
pub const DEFAULT_PRESERVE_FRACTION: f64 = 0.5;

/// Suffix of the synthetic body compaction leaves in place of old tool
/// results. The full marker is `"{n} tool results omitted for space"`.
pub const OMISSION_MARKER_SUFFIX: &str = " tool results omitted for space";

/// Build the omission marker for `n` replaced tool results.
#[must_use]
pub fn omission_marker(n: usize) -> String {
    format!("{n}{OMISSION_MARKER_SUFFIX}")
}

/// Whether a message body is an omission marker from a previous
/// compaction run. Markers must never be re-summarized.
#[must_use]
pub fn is_omission_marker(content: &str) -> bool {
    content
        .strip_suffix(OMISSION_MARKER_SUFFIX)
        .is_some_and(|head| !head.is_empty() && head.bytes().all(|b| b.is_ascii_digit()))
}

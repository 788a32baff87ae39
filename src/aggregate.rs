//! Merging many per-testcase results into one pipeline-level result.

use crate::verdict::{ExecutionResult, Verdict};

/// Fold an ordered collection of per-testcase results into one final
/// record:
///
/// * `status`: the most severe verdict present ([crate::verdict::SEVERITY]
///   order; `AC` only when every input is `AC`),
/// * `time_ms` / `memory_kib`: the maximum across inputs,
/// * `score`: the minimum across inputs (one failing testcase caps the
///   achievable score),
/// * `continue_next`: always `false` — aggregation is terminal.
///
/// An absent entry stands for a missing or malformed outcome and counts
/// as `WE` with zero time, memory, and score.  Zero testcases is a valid
/// configuration and yields the explicit fallback `AC, 0, 0, 100`.
pub fn aggregate(results: &[Option<ExecutionResult>]) -> ExecutionResult {
    let mut merged = ExecutionResult {
        status: Verdict::AC,
        time_ms: 0.0,
        memory_kib: 0.0,
        score: 100,
        continue_next: false,
    };
    for r in results {
        let r = r.clone().unwrap_or_else(ExecutionResult::judge_error);
        if r.status.severity() < merged.status.severity() {
            merged.status = r.status;
        }
        merged.time_ms = merged.time_ms.max(r.time_ms);
        merged.memory_kib = merged.memory_kib.max(r.memory_kib);
        merged.score = merged.score.min(r.score);
    }
    merged
}

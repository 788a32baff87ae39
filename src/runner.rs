//! The sandboxed-runner capability the scheduler consumes.
//!
//! The crate deliberately ships no isolation mechanism; privilege drop,
//! filesystem setup, and resource metering belong to the implementation
//! behind [Sandbox] (see the `judge-local` client for a systemd-backed
//! one, and the integration tests for a scripted fake).

use crate::error::Result;
use std::path::PathBuf;
use std::time::Duration;

/// One sandbox invocation: run `script` with `env`, killing the process
/// if it outlives `time_ceiling` or exceeds `memory_ceiling_kib`.
///
/// `env` is an ordered sequence; bindings are applied in dependency
/// declaration order, statics first.
#[derive(Debug, Clone)]
pub struct RunSpec {
    pub script: PathBuf,
    pub env: Vec<(String, String)>,
    pub time_ceiling: Duration,
    pub memory_ceiling_kib: u64,
}

/// What the sandbox reports about one invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum RunReport {
    /// The process finished on its own within the ceilings.
    ///
    /// The scheduler re-validates `time_ms` and `memory_kib` against the
    /// nominal limits itself; a report within the ceiling may still turn
    /// into `TLE` or `MLE`.
    Completed {
        exit_code: i32,
        time_ms: f64,
        memory_kib: f64,
    },
    /// The sandbox killed the process at a ceiling before completion.
    Killed,
}

/// The capability that actually isolates and meters a process.
///
/// Returning `Err` means the invocation could not even start (environment
/// setup failure); the scheduler classifies that as `WE` on the node.
#[async_trait::async_trait]
pub trait Sandbox: Send + Sync {
    async fn run(&self, spec: RunSpec) -> Result<RunReport>;
}

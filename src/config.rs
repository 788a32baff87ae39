//! Explicit pipeline configuration, threaded into the scheduler rather
//! than read from process-global state.  The only environment-variable
//! surface of the crate is the per-node contract in [crate::constant].

use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

fn one_sec() -> Duration {
    Duration::from_millis(1000)
}

fn thirty_sec() -> Duration {
    Duration::from_millis(30000)
}

fn mem_256_mib() -> u64 {
    // KiB
    256 * 1024
}

fn out_32_mib() -> u64 {
    // KiB
    32 * 1024
}

fn full_score() -> i64 {
    100
}

/// How the scheduler classifies failures of a step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum StepRole {
    /// Compilation: a crash or a missed ceiling is `CE` and stops the
    /// pipeline.
    Build,
    /// Submission code: failures are per-testcase verdicts and the
    /// pipeline continues.
    #[default]
    Run,
}

/// The step's own verdict function, applied only after the run passed
/// every limit with exit code 0.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub enum Check {
    /// Surviving the run is enough: `AC` with the step's accept score.
    #[default]
    None,
    /// Compare the produced output against an expected resource,
    /// whitespace-normalized.  Both sides name environment variables of
    /// the step; a binding resolving to a directory is read through its
    /// well-known `output.txt`.
    TextCompare {
        expected_env: String,
        actual_env: String,
    },
}

/// Per-execution overrides, keyed by node name in
/// [PipelineConfig::steps].
#[serde_with::serde_as]
#[derive(Debug, Clone, Deserialize)]
pub struct StepConfig {
    #[serde(default)]
    pub role: StepRole,
    /// Nominal time limit override, in milliseconds.
    #[serde_as(as = "Option<serde_with::DurationMilliSeconds<u64>>")]
    #[serde(default, rename = "time_limit_ms")]
    pub time_limit: Option<Duration>,
    pub memory_limit_kib: Option<u64>,
    #[serde(default)]
    pub check: Check,
    /// Record the outcome as `Hidden`: computed, continuation-relevant,
    /// not disclosed.
    #[serde(default)]
    pub hidden: bool,
    /// Score awarded on `AC`.
    #[serde(default = "full_score")]
    pub ac_score: i64,
}

impl Default for StepConfig {
    fn default() -> Self {
        Self {
            role: StepRole::default(),
            time_limit: None,
            memory_limit_kib: None,
            check: Check::default(),
            hidden: false,
            ac_score: full_score(),
        }
    }
}

/// Limits and per-step behavior for one judging run.
#[serde_with::serde_as]
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Nominal time limit for run steps, in milliseconds.
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    #[serde(default = "one_sec", rename = "time_limit_ms")]
    pub time_limit: Duration,
    /// The more generous default ceiling for build steps.
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    #[serde(default = "thirty_sec", rename = "build_time_limit_ms")]
    pub build_time_limit: Duration,
    #[serde(default = "mem_256_mib")]
    pub memory_limit_kib: u64,
    /// Ceiling on the size of a checked output file.
    #[serde(default = "out_32_mib")]
    pub output_limit_kib: u64,
    #[serde(default)]
    pub steps: HashMap<String, StepConfig>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            time_limit: one_sec(),
            build_time_limit: thirty_sec(),
            memory_limit_kib: mem_256_mib(),
            output_limit_kib: out_32_mib(),
            steps: HashMap::new(),
        }
    }
}

impl PipelineConfig {
    /// The effective step configuration for a node, defaults filled in.
    pub(crate) fn step(&self, name: &str) -> StepConfig {
        self.steps.get(name).cloned().unwrap_or_default()
    }

    /// The nominal time limit of a step (never the inflated ceiling).
    pub(crate) fn step_time_limit(&self, step: &StepConfig) -> Duration {
        step.time_limit.unwrap_or(match step.role {
            StepRole::Build => self.build_time_limit,
            StepRole::Run => self.time_limit,
        })
    }

    pub(crate) fn step_memory_limit_kib(&self, step: &StepConfig) -> u64 {
        step.memory_limit_kib.unwrap_or(self.memory_limit_kib)
    }
}

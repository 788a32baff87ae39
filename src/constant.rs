//! Names with a fixed meaning across the pipeline boundary.

/// Environment variables forming the static per-node contract, set on
/// every execution in addition to its declared dependency bindings.
pub mod env_var {
    /// Nominal time limit of the step, in milliseconds.
    pub const TIME_LIMIT_MS: &str = "TIME_LIMIT_MS";
    /// Memory limit of the step, in KiB.
    pub const MEMORY_LIMIT_KIB: &str = "MEMORY_LIMIT_KIB";
    /// The node's own output directory.  Payload files written here are
    /// visible to every execution that declares a dependency on the node.
    pub const OUTPUT_DIR: &str = "OUTPUT_DIR";
}

/// File name of the persisted outcome artifact inside a node's output
/// directory.
pub const OUTCOME_FILE: &str = "outcome.json";

/// Well-known payload file a run step leaves for the checker.
pub const OUTPUT_FILE: &str = "output.txt";

/// The sandbox ceiling is the nominal time limit inflated by this factor,
/// absorbing sandbox overhead.  Verdicts always compare the *reported*
/// time against the nominal limit, never against the ceiling.
pub const TIME_CEILING_FACTOR: f64 = 1.1;

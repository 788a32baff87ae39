//! The verdict taxonomy, the per-execution result record, and the JSON
//! outcome artifact exchanged between scheduler, downstream nodes, and the
//! aggregator.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Classified outcome of one execution node.
///
/// The two/three-letter tags are the wire codes used inside outcome
/// artifacts; `Hidden` and `EarlyExit` never appear as a `status` code on
/// the wire (they are carried structurally, see [Outcome]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verdict {
    /// Accepted.
    AC,
    /// Wrong answer.
    WA,
    /// Time limit exceeded.
    TLE,
    /// Memory limit exceeded.
    MLE,
    /// Output limit exceeded.
    OLE,
    /// Runtime error (non-zero exit).
    RE,
    /// Compile error.
    CE,
    /// Judge/infrastructure error: the platform, not the submission.
    WE,
    /// Verdict intentionally not disclosed.
    Hidden,
    /// The pipeline terminated before this node ran.
    EarlyExit,
}

/// Aggregation precedence, most severe first.
///
/// The placement of `Hidden` and `EarlyExit` between the failing verdicts
/// and `AC` is a product decision, fixed here and covered by tests rather
/// than re-derived at call sites.
pub const SEVERITY: [Verdict; 10] = [
    Verdict::CE,
    Verdict::WE,
    Verdict::RE,
    Verdict::MLE,
    Verdict::TLE,
    Verdict::OLE,
    Verdict::WA,
    Verdict::Hidden,
    Verdict::EarlyExit,
    Verdict::AC,
];

impl Verdict {
    /// Rank in [SEVERITY]; lower is more severe.
    pub fn severity(self) -> usize {
        SEVERITY
            .iter()
            .position(|&v| v == self)
            .expect("SEVERITY lists every verdict")
    }
}

/// The result record produced exactly once per execution node.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionResult {
    pub status: Verdict,
    pub time_ms: f64,
    pub memory_kib: f64,
    /// 0 to 100.
    pub score: i64,
    /// `false` stops the scheduler from starting any further node.
    pub continue_next: bool,
}

impl ExecutionResult {
    pub fn new(status: Verdict, time_ms: f64, memory_kib: f64, score: i64) -> Self {
        Self {
            status,
            time_ms,
            memory_kib,
            score,
            continue_next: status != Verdict::CE,
        }
    }

    /// The record for a node the pipeline never started.
    pub fn early_exit() -> Self {
        Self {
            status: Verdict::EarlyExit,
            time_ms: 0.0,
            memory_kib: 0.0,
            score: 0,
            continue_next: false,
        }
    }

    /// The record standing in for a missing or malformed result.
    pub fn judge_error() -> Self {
        Self {
            status: Verdict::WE,
            time_ms: 0.0,
            memory_kib: 0.0,
            score: 0,
            continue_next: true,
        }
    }
}

/// Continuation signal as persisted in an outcome artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContinueStatus {
    Continue,
    EarlyExit,
}

/// The frontend-displayable part of an outcome artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayableResult {
    pub status: Verdict,
    pub time: f64,
    pub memory: f64,
    pub score: i64,
    pub message: Option<String>,
}

/// Result payload of a node that actually ran.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ResultKind {
    /// Disclosed to the consumer.
    Displayable(DisplayableResult),
    /// Computed but intentionally not disclosed (e.g. validation steps).
    Hidden,
}

/// Outcome artifact of a node that ran to a result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    pub result: ResultKind,
    pub continue_status: ContinueStatus,
}

/// The persisted outcome of one node: either a finished record, or the
/// bare `"EarlyExit"` sentinel for nodes that never ran.
///
/// This is the sole interchange format between the scheduler, downstream
/// nodes, and the aggregator, and round-trips exactly through JSON.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Finished(OutcomeRecord),
    EarlyExit,
}

const EARLY_EXIT_SENTINEL: &str = "EarlyExit";

impl Serialize for Outcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Finished(record) => record.serialize(serializer),
            Self::EarlyExit => serializer.serialize_str(EARLY_EXIT_SENTINEL),
        }
    }
}

impl<'de> Deserialize<'de> for Outcome {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Wire {
            Sentinel(String),
            Record(OutcomeRecord),
        }
        match Wire::deserialize(deserializer)? {
            Wire::Record(record) => Ok(Self::Finished(record)),
            Wire::Sentinel(s) if s == EARLY_EXIT_SENTINEL => Ok(Self::EarlyExit),
            Wire::Sentinel(s) => Err(D::Error::unknown_variant(&s, &[EARLY_EXIT_SENTINEL])),
        }
    }
}

impl Outcome {
    /// Build the artifact for a finished node.
    ///
    /// `hidden` drops the displayable payload but keeps the continuation
    /// signal, so the pipeline shape is unaffected.
    pub fn finished(result: &ExecutionResult, message: Option<String>, hidden: bool) -> Self {
        let continue_status = if result.continue_next {
            ContinueStatus::Continue
        } else {
            ContinueStatus::EarlyExit
        };
        let kind = if hidden {
            ResultKind::Hidden
        } else {
            ResultKind::Displayable(DisplayableResult {
                status: result.status,
                time: result.time_ms,
                memory: result.memory_kib,
                score: result.score,
                message,
            })
        };
        Self::Finished(OutcomeRecord {
            result: kind,
            continue_status,
        })
    }

    /// The verdict this outcome carries, for annotation lookups.
    pub fn verdict(&self) -> Verdict {
        match self {
            Self::EarlyExit => Verdict::EarlyExit,
            Self::Finished(record) => match &record.result {
                ResultKind::Hidden => Verdict::Hidden,
                ResultKind::Displayable(d) => d.status,
            },
        }
    }

    /// Whether the scheduler may start further nodes after this one.
    pub fn continues(&self) -> bool {
        match self {
            Self::EarlyExit => false,
            Self::Finished(record) => record.continue_status == ContinueStatus::Continue,
        }
    }

    /// Flatten into the in-memory record shape consumed by the aggregator.
    pub fn to_execution_result(&self) -> ExecutionResult {
        match self {
            Self::EarlyExit => ExecutionResult::early_exit(),
            Self::Finished(record) => {
                let continue_next = record.continue_status == ContinueStatus::Continue;
                match &record.result {
                    ResultKind::Hidden => ExecutionResult {
                        status: Verdict::Hidden,
                        time_ms: 0.0,
                        memory_kib: 0.0,
                        score: 0,
                        continue_next,
                    },
                    ResultKind::Displayable(d) => ExecutionResult {
                        status: d.status,
                        time_ms: d.time,
                        memory_kib: d.memory,
                        score: d.score,
                        continue_next,
                    },
                }
            }
        }
    }
}

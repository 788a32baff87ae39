use std::path::PathBuf;

/// A defect in the schema document itself.
///
/// These are configuration errors: they abort before any execution runs
/// and are never converted into a verdict.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// A name unusable as a single path component under the work
    /// directory.
    #[error("`{0}` is not a valid node name")]
    InvalidName(String),
    /// Two nodes (of any kind) share one name.
    #[error("name `{0}` is declared more than once")]
    DuplicateName(String),
    /// An execution references a name no declaration provides.
    #[error("execution `{referrer}` references undeclared name `{target}`")]
    UndeclaredReference { referrer: String, target: String },
    /// The `script_name` of an execution resolved to a non-script node.
    #[error("execution `{referrer}` names `{target}` as its script, but it is not one")]
    NotAScript { referrer: String, target: String },
    /// The execution graph is not acyclic.  The named node lies on a cycle.
    #[error("dependency cycle through execution `{0}`")]
    CyclicDependency(String),
}

/// The error type of `judge_pipeline`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A schema-level defect (undeclared reference, duplicate, cycle).
    #[error(transparent)]
    Schema(#[from] SchemaError),
    /// An error reading or writing files under the work directory.
    #[error("input/output error: {0}")]
    Io(#[from] std::io::Error),
    /// An error encoding or decoding a JSON document (schema or artifact).
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    /// A `RuntimeTextFile` resource for which no content was supplied.
    #[error("no content supplied for runtime text resource `{0}`")]
    MissingRuntimeText(String),
    /// A dependency binding whose source never resolved at run time.
    ///
    /// With a validated graph this indicates a scheduling defect in the
    /// judge, so it is classified `WE`, never a submission verdict.
    #[error("unresolved binding: {0}")]
    UnresolvedBinding(String),
    /// A check referencing an environment variable the node was never
    /// given.
    #[error("check references unbound environment variable `{0}`")]
    UnboundCheckVar(String),
    /// A path that cannot be represented as UTF-8 for the sandbox.
    #[error("non-UTF8 path {}", .0.display())]
    BadPathEncoding(PathBuf),
    /// A sandbox invocation that could not start at all.
    ///
    /// The scheduler converts this into a `WE` verdict on the node; it
    /// only crosses the scheduler boundary when raised outside a node run.
    #[error("sandbox failure: {0}")]
    Sandbox(String),
}

/// Alias for a [Result][std::result::Result] with the error type [Error].
pub type Result<T> = std::result::Result<T, Error>;

//! Walks the schema graph in dependency order, runs every execution node
//! through the sandbox, classifies outcomes, and persists one artifact
//! per node.
//!
//! Nodes with no dependency relationship run concurrently; a node starts
//! only after every source it references has resolved and its artifact is
//! durably on disk.  Node-local failures never escape as errors: they are
//! always converted into a verdict record so downstream consumers have
//! one uniform shape to read.

use crate::compare;
use crate::config::{Check, PipelineConfig, StepConfig, StepRole};
use crate::constant::{env_var, OUTCOME_FILE, OUTPUT_FILE, TIME_CEILING_FACTOR};
use crate::error::{Error, Result};
use crate::runner::{RunReport, RunSpec, Sandbox};
use crate::schema::{Execution, Graph, ResourceKind};
use crate::verdict::{ExecutionResult, Outcome, Verdict};
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub struct Scheduler<S: Sandbox> {
    graph: Graph,
    sandbox: S,
    config: PipelineConfig,
    work_dir: PathBuf,
}

impl<S: Sandbox> Scheduler<S> {
    pub fn new(graph: Graph, sandbox: S, config: PipelineConfig, work_dir: PathBuf) -> Self {
        Self {
            graph,
            sandbox,
            config,
            work_dir,
        }
    }

    /// Run the whole pipeline and return the outcome of every execution
    /// node.  `runtime_texts` supplies the content of each
    /// `RuntimeTextFile` resource by name.
    ///
    /// The map always holds a terminal entry for every execution node,
    /// even under total infrastructure failure.
    pub async fn run(self, runtime_texts: &HashMap<String, String>) -> Result<HashMap<String, Outcome>> {
        let paths = self.materialize(runtime_texts)?;
        info!(
            "pipeline start: {} execution(s) under {}",
            self.graph.topological_order().len(),
            self.work_dir.display()
        );

        let mut pending: Vec<String> = self.graph.topological_order().to_vec();
        let mut outcomes: HashMap<String, Outcome> = HashMap::new();
        let mut stop = false;
        while !pending.is_empty() && !stop {
            // A node is ready once every execution it depends on has a
            // recorded (and persisted) outcome.
            let (ready, blocked): (Vec<_>, Vec<_>) = pending.into_iter().partition(|name| {
                let exec = self
                    .graph
                    .execution(name)
                    .expect("topological order only lists executions");
                exec.dependencies
                    .iter()
                    .filter(|d| self.graph.execution(&d.ref_to).is_some())
                    .all(|d| outcomes.contains_key(&d.ref_to))
            });
            pending = blocked;
            if ready.is_empty() {
                // Unreachable on a validated DAG.
                warn!("no runnable node despite {} pending", pending.len());
                break;
            }
            debug!("wave: {:?}", ready);
            let wave = ready.iter().map(|name| {
                let exec = self
                    .graph
                    .execution(name)
                    .expect("topological order only lists executions");
                self.run_node(exec, &paths)
            });
            // Everything in the wave runs to completion even if one node
            // decides to stop the pipeline; finished results are kept.
            for (name, outcome) in futures::future::join_all(wave).await {
                stop = stop || !outcome.continues();
                outcomes.insert(name, outcome);
            }
        }

        // Whatever never started is terminal as well.
        for name in pending {
            if let Some(dir) = paths.get(&name) {
                if let Err(e) = persist_outcome(dir, &Outcome::EarlyExit) {
                    error!("failed to persist early exit of `{}`: {}", name, e);
                }
            }
            outcomes.insert(name, Outcome::EarlyExit);
        }
        info!("pipeline done: {} outcome(s)", outcomes.len());
        Ok(outcomes)
    }

    /// Write every resource and script below the work directory and
    /// create one output directory per execution node.
    fn materialize(&self, runtime_texts: &HashMap<String, String>) -> Result<HashMap<String, PathBuf>> {
        let resource_dir = self.work_dir.join("resources");
        let script_dir = self.work_dir.join("scripts");
        let node_dir = self.work_dir.join("nodes");
        for d in [&resource_dir, &script_dir, &node_dir] {
            fs::create_dir_all(d)?;
        }

        let mut paths = HashMap::new();
        for r in &self.graph.schema().resources {
            let path = match r {
                ResourceKind::TextFile(t) => {
                    let p = resource_dir.join(&t.name);
                    fs::write(&p, &t.content)?;
                    p
                }
                ResourceKind::RuntimeTextFile(t) => {
                    let content = runtime_texts
                        .get(&t.name)
                        .ok_or_else(|| Error::MissingRuntimeText(t.name.clone()))?;
                    let p = resource_dir.join(&t.name);
                    fs::write(&p, content)?;
                    p
                }
                ResourceKind::EmptyDirectory(d) => {
                    let p = resource_dir.join(&d.name);
                    fs::create_dir_all(&p)?;
                    p
                }
            };
            paths.insert(r.name().to_owned(), path);
        }
        for s in &self.graph.schema().scripts {
            let p = script_dir.join(&s.name);
            fs::write(&p, &s.content)?;
            paths.insert(s.name.clone(), p);
        }
        for e in &self.graph.schema().executions {
            let p = node_dir.join(&e.name);
            fs::create_dir_all(&p)?;
            paths.insert(e.name.clone(), p);
        }
        Ok(paths)
    }

    /// Run one node to a persisted outcome.  Never fails: judge-side
    /// defects become a `WE` record on the node.
    async fn run_node(
        &self,
        exec: &Execution,
        paths: &HashMap<String, PathBuf>,
    ) -> (String, Outcome) {
        let step = self.config.step(&exec.name);
        let mut outcome = self.exec_node(exec, &step, paths).await;
        match paths.get(&exec.name) {
            None => error!("no output directory for `{}`", exec.name),
            Some(dir) => {
                if let Err(e) = persist_outcome(dir, &outcome) {
                    // An unreadable artifact is a platform defect; report
                    // the node as such rather than leaving a stale file.
                    error!("failed to persist outcome of `{}`: {}", exec.name, e);
                    outcome = we_outcome(&step, e.to_string());
                    if let Err(e) = persist_outcome(dir, &outcome) {
                        error!("giving up on artifact for `{}`: {}", exec.name, e);
                    }
                }
            }
        }
        (exec.name.clone(), outcome)
    }

    async fn exec_node(
        &self,
        exec: &Execution,
        step: &StepConfig,
        paths: &HashMap<String, PathBuf>,
    ) -> Outcome {
        let nominal = self.config.step_time_limit(step);
        let memory_limit_kib = self.config.step_memory_limit_kib(step);

        let env = match self.node_env(exec, nominal, memory_limit_kib, paths) {
            Ok(env) => env,
            Err(e) => {
                // A binding that cannot be resolved here is a scheduling
                // defect, not something the runner gets to judge.
                error!("dependency resolution failed for `{}`: {}", exec.name, e);
                return we_outcome(step, e.to_string());
            }
        };
        let script = match paths.get(&exec.script_name) {
            Some(p) => p.clone(),
            None => {
                error!("script `{}` was never materialized", exec.script_name);
                return we_outcome(step, format!("missing script `{}`", exec.script_name));
            }
        };

        let spec = RunSpec {
            script,
            env: env.clone(),
            time_ceiling: nominal.mul_f64(TIME_CEILING_FACTOR),
            memory_ceiling_kib: memory_limit_kib,
        };
        info!(
            "running `{}` (time {} ms, memory {} KiB)",
            exec.name,
            nominal.as_millis(),
            memory_limit_kib
        );
        let report = match self.sandbox.run(spec).await {
            Ok(report) => report,
            Err(e) => {
                warn!("sandbox could not start `{}`: {}", exec.name, e);
                return we_outcome(step, e.to_string());
            }
        };
        let result = self.classify(step, nominal, memory_limit_kib, report, &env);
        debug!(
            "`{}` -> {:?} ({} ms, {} KiB, score {})",
            exec.name, result.status, result.time_ms, result.memory_kib, result.score
        );
        Outcome::finished(&result, None, step.hidden)
    }

    /// The static per-node contract followed by the declared dependency
    /// bindings, in declaration order.
    fn node_env(
        &self,
        exec: &Execution,
        nominal: Duration,
        memory_limit_kib: u64,
        paths: &HashMap<String, PathBuf>,
    ) -> Result<Vec<(String, String)>> {
        let own_dir = paths.get(&exec.name).ok_or_else(|| {
            Error::UnresolvedBinding(format!("no output directory for `{}`", exec.name))
        })?;
        let mut env = vec![
            (
                env_var::TIME_LIMIT_MS.to_owned(),
                nominal.as_millis().to_string(),
            ),
            (
                env_var::MEMORY_LIMIT_KIB.to_owned(),
                memory_limit_kib.to_string(),
            ),
            (env_var::OUTPUT_DIR.to_owned(), utf8_path(own_dir)?.to_owned()),
        ];
        for dep in &exec.dependencies {
            let path = paths.get(&dep.ref_to).ok_or_else(|| {
                Error::UnresolvedBinding(format!(
                    "dependency `{}` of `{}`",
                    dep.ref_to, exec.name
                ))
            })?;
            env.push((dep.envvar_name.clone(), utf8_path(path)?.to_owned()));
        }
        Ok(env)
    }

    /// Turn a sandbox report into a verdict.  The nominal limits decide
    /// here; the inflated ceiling only bounds the sandbox itself, and the
    /// runner's own opinion of the outcome is never trusted.
    fn classify(
        &self,
        step: &StepConfig,
        nominal: Duration,
        memory_limit_kib: u64,
        report: RunReport,
        env: &[(String, String)],
    ) -> ExecutionResult {
        let nominal_ms = nominal.as_secs_f64() * 1000.0;
        match report {
            RunReport::Killed => {
                let status = match step.role {
                    // A build that cannot finish within its own generous
                    // ceiling counts as a failed build.
                    StepRole::Build => Verdict::CE,
                    StepRole::Run => Verdict::TLE,
                };
                ExecutionResult::new(status, nominal_ms, 0.0, 0)
            }
            RunReport::Completed {
                exit_code,
                time_ms,
                memory_kib,
            } => {
                if time_ms > nominal_ms {
                    // Over the nominal limit is TLE even on exit 0.
                    ExecutionResult::new(Verdict::TLE, time_ms, memory_kib, 0)
                } else if exit_code != 0 {
                    let status = match step.role {
                        StepRole::Build => Verdict::CE,
                        StepRole::Run => Verdict::RE,
                    };
                    ExecutionResult::new(status, time_ms, memory_kib, 0)
                } else if memory_kib > memory_limit_kib as f64 {
                    ExecutionResult::new(Verdict::MLE, time_ms, memory_kib, 0)
                } else {
                    self.apply_check(step, env, time_ms, memory_kib)
                }
            }
        }
    }

    fn apply_check(
        &self,
        step: &StepConfig,
        env: &[(String, String)],
        time_ms: f64,
        memory_kib: f64,
    ) -> ExecutionResult {
        let status = match &step.check {
            Check::None => Verdict::AC,
            Check::TextCompare {
                expected_env,
                actual_env,
            } => match self.compare_outputs(expected_env, actual_env, env) {
                Ok(status) => status,
                Err(e) => {
                    warn!("check failed on the judge side: {}", e);
                    Verdict::WE
                }
            },
        };
        let score = if status == Verdict::AC { step.ac_score } else { 0 };
        ExecutionResult::new(status, time_ms, memory_kib, score)
    }

    fn compare_outputs(
        &self,
        expected_env: &str,
        actual_env: &str,
        env: &[(String, String)],
    ) -> Result<Verdict> {
        let expected_path = payload_path(lookup_env(env, expected_env)?);
        let actual_path = payload_path(lookup_env(env, actual_env)?);
        let actual_len = match fs::metadata(&actual_path) {
            Ok(m) => m.len(),
            // A run that produced nothing is the submission's fault.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Verdict::WA),
            Err(e) => return Err(e.into()),
        };
        if actual_len > self.config.output_limit_kib * 1024 {
            return Ok(Verdict::OLE);
        }
        let expected = fs::read_to_string(&expected_path)?;
        let actual = fs::read_to_string(&actual_path)?;
        Ok(if compare::text_equal(&expected, &actual) {
            Verdict::AC
        } else {
            Verdict::WA
        })
    }
}

fn we_outcome(step: &StepConfig, message: String) -> Outcome {
    Outcome::finished(&ExecutionResult::judge_error(), Some(message), step.hidden)
}

fn lookup_env(env: &[(String, String)], key: &str) -> Result<PathBuf> {
    env.iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| PathBuf::from(v))
        .ok_or_else(|| Error::UnboundCheckVar(key.to_owned()))
}

/// A binding that points at a directory is read through the well-known
/// payload file inside it.
fn payload_path(p: PathBuf) -> PathBuf {
    if p.is_dir() {
        p.join(OUTPUT_FILE)
    } else {
        p
    }
}

fn utf8_path(p: &Path) -> Result<&str> {
    p.to_str().ok_or_else(|| Error::BadPathEncoding(p.to_path_buf()))
}

/// Write the artifact so it appears atomic to readers: a full temporary
/// file first, then a rename within the same directory.
fn persist_outcome(dir: &Path, outcome: &Outcome) -> Result<()> {
    let json = serde_json::to_vec(outcome)?;
    let tmp = dir.join(".outcome.json.tmp");
    fs::write(&tmp, &json)?;
    fs::rename(&tmp, dir.join(OUTCOME_FILE))?;
    Ok(())
}

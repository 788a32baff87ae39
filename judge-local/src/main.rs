mod error;
mod sandbox;
pub mod util;

pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::util;
    pub use log::{debug, error, info, warn};
    pub use serde::Deserialize;
    pub use std::path::{Path, PathBuf};
    pub use std::time::Duration;
}

use clap::{Args, Parser};
use judge_pipeline::aggregate::aggregate;
use judge_pipeline::config::{PipelineConfig, StepRole};
use judge_pipeline::schema::Graph;
use judge_pipeline::scheduler::Scheduler;
use judge_pipeline::{ExecutionResult, Outcome};
use log4rs::{
    append::{
        console::{ConsoleAppender, Target},
        file::FileAppender,
    },
    config::{Appender, Config, Root},
    encode::pattern::PatternEncoder,
    filter::threshold::ThresholdFilter,
};
use prelude::*;
use std::collections::HashMap;
use std::fs::create_dir_all;
use std::process::exit;

#[derive(serde_with::DeserializeFromStr, Debug, Clone, Copy)]
struct LogLevel(log::LevelFilter);

impl std::str::FromStr for LogLevel {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "error" | "Error" => Self(log::LevelFilter::Error),
            "warn" | "Warn" => Self(log::LevelFilter::Warn),
            "info" | "Info" => Self(log::LevelFilter::Info),
            "debug" | "Debug" => Self(log::LevelFilter::Debug),
            "trace" | "Trace" => Self(log::LevelFilter::Trace),
            _ => return Err(Error::BadLogLevel(s.to_string())),
        })
    }
}

impl From<LogLevel> for log::LevelFilter {
    fn from(l: LogLevel) -> Self {
        l.0
    }
}

#[derive(Debug, Default, Args, Deserialize)]
struct Flags {
    /// Dump the log onto stderr.
    #[clap(long)]
    #[serde(default)]
    stderr: Option<bool>,
    /// Log level.
    #[clap(long)]
    log_level: Option<LogLevel>,
    /// Directory holding materialized pipelines and the log.
    #[clap(long)]
    run_dir: Option<PathBuf>,
}

fn parse_input(s: &str) -> Result<(String, PathBuf)> {
    match s.split_once('=') {
        Some((name, path)) if !name.is_empty() => Ok((name.to_owned(), path.into())),
        _ => Err(Error::BadInputBinding(s.to_owned())),
    }
}

#[derive(Debug, Parser)]
struct Cli {
    /// The schema document to execute.
    #[clap(parse(from_os_str))]
    schema: PathBuf,
    /// Content for one runtime text resource, as name=path.
    #[clap(long = "input", parse(try_from_str = parse_input))]
    input: Vec<(String, PathBuf)>,
    /// Override config file
    #[clap(long, parse(from_os_str))]
    etc: Option<PathBuf>,

    #[clap(flatten)]
    cfg: Flags,
}

fn bin_sh() -> String {
    "/bin/sh".to_owned()
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    config: Flags,
    #[serde(default)]
    pipeline: PipelineConfig,
    /// Executions aggregated into the final report.  Empty means every
    /// execution that is not a build step.
    #[serde(default)]
    summary: Vec<String>,
    /// Interpreter each script is fed to inside the sandbox.
    #[serde(default = "bin_sh")]
    interpreter: String,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            config: Flags::default(),
            pipeline: PipelineConfig::default(),
            summary: Vec::new(),
            interpreter: bin_sh(),
        }
    }
}

impl ConfigFile {
    fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = util::load_file(path)?;
        toml::from_str(&content).map_err(Error::TOMLParseError)
    }
}

async fn judge(cli: &Cli, etc: &ConfigFile, run_dir: &Path) -> Result<ExecutionResult> {
    let graph = Graph::parse(&util::load_file(&cli.schema)?).map_err(Error::Pipeline)?;

    let mut runtime_texts = HashMap::new();
    for (name, path) in &cli.input {
        runtime_texts.insert(name.clone(), util::load_file(path)?);
    }

    let summary: Vec<String> = if etc.summary.is_empty() {
        graph
            .topological_order()
            .iter()
            .filter(|n| {
                etc.pipeline
                    .steps
                    .get(n.as_str())
                    .map_or(true, |s| s.role != StepRole::Build)
            })
            .cloned()
            .collect()
    } else {
        etc.summary.clone()
    };

    // Generate an "unique" name for the work directory.
    let work_dir = run_dir.join(format!("pipeline-{}", uuid::Uuid::new_v4().simple()));
    let sandbox = sandbox::SystemdSandbox::new(etc.interpreter.clone());
    let sched = Scheduler::new(graph, sandbox, etc.pipeline.clone(), work_dir.clone());
    let outcomes = sched.run(&runtime_texts).await.map_err(Error::Pipeline);

    if std::fs::remove_dir_all(&work_dir).is_err() {
        error!("failed to remove directory {}", work_dir.display());
    }
    let outcomes = outcomes?;

    for name in &summary {
        match outcomes.get(name) {
            Some(o) => info!("`{}`: {:?}", name, o.verdict()),
            None => warn!("summary node `{}` has no outcome", name),
        }
    }
    let results: Vec<Option<ExecutionResult>> = summary
        .iter()
        .map(|n| outcomes.get(n).map(|o| o.to_execution_result()))
        .collect();
    Ok(aggregate(&results))
}

/// The terminal report for a failed run, or `None` when the failure is a
/// configuration defect (broken schema, unbound runtime text) rather than
/// a platform one.  A platform failure must still end with a result:
/// judge error, zero score.
fn failure_report(e: &Error) -> Option<Outcome> {
    use judge_pipeline::Error as PipelineError;
    match e {
        Error::Pipeline(PipelineError::Schema(_))
        | Error::Pipeline(PipelineError::MissingRuntimeText(_)) => None,
        Error::Pipeline(_) => Some(Outcome::finished(
            &aggregate(&[None]),
            Some(e.to_string()),
            false,
        )),
        _ => None,
    }
}

#[async_std::main]
async fn main() {
    let cli = Cli::parse();

    let etc = match &cli.etc {
        Some(path) => match ConfigFile::load(path) {
            Ok(etc) => etc,
            // Without a valid configuration the limits are unknowable.
            Err(e) => panic!("config file {} is broken: {}", path.display(), e),
        },
        None => ConfigFile::default(),
    };

    let run_dir = cli
        .cfg
        .run_dir
        .as_ref()
        .or(etc.config.run_dir.as_ref())
        .cloned()
        .unwrap_or_else(|| PathBuf::from("run"));
    create_dir_all(&run_dir).unwrap();

    // Initialize logging.
    let log_level = cli
        .cfg
        .log_level
        .or(etc.config.log_level)
        .map_or_else(|| log::LevelFilter::Info, LogLevel::into);

    let use_stderr = cli.cfg.stderr.or(etc.config.stderr).unwrap_or(false);

    let stderr_level = if use_stderr {
        log_level
    } else {
        // Dump errors to stderr even if it's not enabled for normal log.
        log::LevelFilter::Error
    };

    let console_fmt = "{h({d(%Y-%m-%d %H:%M:%S)(utc)} - {l}: {m}{n})}";
    let stderr = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new(console_fmt)))
        .build();

    let text_fmt = "{d(%Y-%m-%d %H:%M:%S)(utc)} - {l}: {m}{n}";
    let log_path = run_dir.join("judge.log");
    let log_file = FileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(text_fmt)))
        .append(false)
        .build(log_path)
        .unwrap();

    let config = Config::builder()
        .appender(
            Appender::builder()
                .filter(Box::new(ThresholdFilter::new(stderr_level)))
                .build("stderr", Box::new(stderr)),
        )
        .appender(Appender::builder().build("file", Box::new(log_file)))
        .build(
            Root::builder()
                .appenders(["stderr", "file"])
                .build(log_level),
        )
        .unwrap();
    log4rs::init_config(config).unwrap();

    match judge(&cli, &etc, &run_dir).await {
        Ok(result) => {
            info!("final verdict = {:?}", result.status);
            let report = Outcome::finished(&result, None, false);
            match serde_json::to_string(&report) {
                Ok(json) => println!("{}", json),
                Err(e) => {
                    error!("error: {}", Error::JSONError(e));
                    exit(1);
                }
            }
        }
        Err(e) => {
            error!("error: {}", e);
            if let Some(report) = failure_report(&e) {
                if let Ok(json) = serde_json::to_string(&report) {
                    println!("{}", json);
                }
            }
            exit(1);
        }
    }
}

//! A [Sandbox] backed by Systemd transient services in the user session.

use crate::prelude::*;
use byte_unit::Byte;
use judge_pipeline::runner::{RunReport, RunSpec, Sandbox};

pub struct SystemdSandbox {
    interpreter: String,
}

impl SystemdSandbox {
    pub fn new(interpreter: String) -> Self {
        Self { interpreter }
    }
}

fn sandbox_err<E: std::fmt::Display>(e: E) -> judge_pipeline::Error {
    judge_pipeline::Error::Sandbox(e.to_string())
}

#[async_trait::async_trait]
impl Sandbox for SystemdSandbox {
    async fn run(&self, spec: RunSpec) -> judge_pipeline::Result<RunReport> {
        let script = spec
            .script
            .to_str()
            .ok_or_else(|| judge_pipeline::Error::BadPathEncoding(spec.script.clone()))?;

        // The transient unit offers no environment setter, so the
        // per-node contract is spliced in through env(1).
        let mut run = systemd_run::RunUser::new("/usr/bin/env");
        for (k, v) in &spec.env {
            run = run.arg(format!("{}={}", k, v));
        }
        debug!("starting transient unit for {}", script);
        let finished = run
            .arg(&self.interpreter)
            .arg(script)
            .service_name(format!("judge-local-{}", uuid::Uuid::new_v4().simple()))
            .collect_on_fail()
            .private_network()
            .private_ipc()
            .runtime_max(spec.time_ceiling)
            .memory_max(Byte::from_u64(spec.memory_ceiling_kib.saturating_mul(1024)))
            .memory_swap_max(Byte::from_u64(0))
            .start()
            .await
            .map_err(sandbox_err)?
            .wait()
            .await
            .map_err(sandbox_err)?;

        let wall = finished.wall_time_usage();
        if finished.is_failed() && wall >= spec.time_ceiling {
            return Ok(RunReport::Killed);
        }
        // The unit reports neither an exit code nor peak memory usage:
        // any failure within the ceiling counts as exit 1, and memory
        // stays unmetered.
        Ok(RunReport::Completed {
            exit_code: if finished.is_failed() { 1 } else { 0 },
            time_ms: wall.as_secs_f64() * 1000.0,
            memory_kib: 0.0,
        })
    }
}

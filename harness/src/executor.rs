use std::fs::File;
use std::io::Write;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use camino::Utf8PathBuf;
use serde::Serialize;

use crate::plan::{CommandSpec, JobPlan, StageAction};

/// How often a worker polls a running child while a batch deadline is set.
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Exit code recorded when a stage could not even be spawned (missing or
/// non-executable tool).
pub const SPAWN_FAILURE_CODE: i32 = -1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Success,
    /// First failing stage (zero-based) and its exit code.
    StageFailed { stage: usize, code: i32 },
    /// Killed at the batch deadline while a stage was still running.
    TimedOut,
    /// Never started: the batch deadline expired first.
    Skipped,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "ok"),
            Self::StageFailed { stage, code } => {
                write!(f, "FAILED (stage {stage}, exit code {code})")
            }
            Self::TimedOut => write!(f, "TIMED OUT"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

/// Outcome of one job. Created once by the executor, never mutated.
#[derive(Debug, Clone, Serialize)]
pub struct JobResult {
    pub name: String,
    pub status: JobStatus,
    pub log_path: Utf8PathBuf,
    #[serde(rename = "wall_time_ms")]
    #[serde(serialize_with = "as_millis")]
    pub wall_time: Duration,
}

fn as_millis<S: serde::Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis() as u64)
}

/// Execute one plan's stages as a strict chain: stop at the first stage
/// that exits non-zero, append every stage's combined output to the
/// per-job log, and honor the batch deadline by killing an in-flight stage.
pub fn run_job(plan: &JobPlan, deadline: Option<Instant>) -> JobResult {
    let started = Instant::now();
    let status = run_stages(plan, deadline);
    JobResult {
        name: plan.name.clone(),
        status,
        log_path: plan.log_path.clone(),
        wall_time: started.elapsed(),
    }
}

fn run_stages(plan: &JobPlan, deadline: Option<Instant>) -> JobStatus {
    if std::fs::create_dir_all(&plan.work_dir).is_err() {
        return JobStatus::StageFailed {
            stage: 0,
            code: SPAWN_FAILURE_CODE,
        };
    }
    let mut log = match File::create(&plan.log_path) {
        Ok(file) => file,
        Err(_) => {
            return JobStatus::StageFailed {
                stage: 0,
                code: SPAWN_FAILURE_CODE,
            };
        }
    };

    for (index, stage) in plan.stages.iter().enumerate() {
        let command = match &stage.action {
            StageAction::Run(command) => command,
            StageAction::Skip => {
                let _ = writeln!(log, "=== {} === skipped (target run disabled)", stage.kind.name());
                continue;
            }
        };

        let _ = writeln!(
            log,
            "=== {} === {} {}",
            stage.kind.name(),
            command.program,
            command.args.join(" ")
        );

        match run_stage(plan, command, &log, deadline) {
            StageOutcome::Success => {}
            StageOutcome::Failed(code) => {
                let _ = writeln!(log, "=== {} exited with code {code} ===", stage.kind.name());
                return JobStatus::StageFailed { stage: index, code };
            }
            StageOutcome::SpawnError(err) => {
                let _ = writeln!(log, "failed to spawn {}: {err}", command.program);
                return JobStatus::StageFailed {
                    stage: index,
                    code: SPAWN_FAILURE_CODE,
                };
            }
            StageOutcome::DeadlineExpired => {
                let _ = writeln!(log, "=== {} killed at batch deadline ===", stage.kind.name());
                return JobStatus::TimedOut;
            }
        }
    }

    JobStatus::Success
}

enum StageOutcome {
    Success,
    Failed(i32),
    SpawnError(std::io::Error),
    DeadlineExpired,
}

fn run_stage(
    plan: &JobPlan,
    command: &CommandSpec,
    log: &File,
    deadline: Option<Instant>,
) -> StageOutcome {
    let (stdout, stderr) = match (log.try_clone(), log.try_clone()) {
        (Ok(out), Ok(err)) => (Stdio::from(out), Stdio::from(err)),
        _ => (Stdio::null(), Stdio::null()),
    };

    let mut child = match Command::new(&command.program)
        .args(&command.args)
        .current_dir(&plan.work_dir)
        .stdin(Stdio::null())
        .stdout(stdout)
        .stderr(stderr)
        .spawn()
    {
        Ok(child) => child,
        Err(err) => return StageOutcome::SpawnError(err),
    };

    let status = if let Some(deadline) = deadline {
        loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {}
                Err(err) => return StageOutcome::SpawnError(err),
            }

            if Instant::now() >= deadline {
                // The child is terminated and reaped so a hung simulator
                // cannot outlive the batch.
                let _ = child.kill();
                let _ = child.wait();
                return StageOutcome::DeadlineExpired;
            }
            std::thread::sleep(WAIT_POLL_INTERVAL);
        }
    } else {
        // No deadline: block until the stage exits. Termination of the
        // simulate stage is the CPU model's own tick budget's job.
        match child.wait() {
            Ok(status) => status,
            Err(err) => return StageOutcome::SpawnError(err),
        }
    };

    if status.success() {
        StageOutcome::Success
    } else {
        StageOutcome::Failed(status.code().unwrap_or(SPAWN_FAILURE_CODE))
    }
}

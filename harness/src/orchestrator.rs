use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::executor::{self, JobResult, JobStatus};
use crate::plan::JobPlan;
use crate::report::Report;

/// Fans independent job plans out over a bounded worker pool and folds the
/// per-job results into one report.
#[derive(Debug)]
pub struct Orchestrator {
    jobs: usize,
    deadline: Option<Duration>,
}

impl Orchestrator {
    pub fn new(jobs: usize, deadline: Option<Duration>) -> Self {
        Self {
            jobs: jobs.max(1),
            deadline,
        }
    }

    /// Run every plan to completion (or to the batch deadline). Results are
    /// recorded by input position, so identical inputs produce identical
    /// reports regardless of worker count.
    pub fn execute(&self, plans: &[JobPlan]) -> Report {
        scrub(plans);

        let deadline = self.deadline.map(|limit| Instant::now() + limit);
        let queue: Mutex<VecDeque<(usize, &JobPlan)>> =
            Mutex::new(plans.iter().enumerate().collect());
        let slots: Vec<Mutex<Option<JobResult>>> =
            plans.iter().map(|_| Mutex::new(None)).collect();
        let total = plans.len();

        let workers = self.jobs.min(total.max(1));
        std::thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|| {
                    loop {
                        let job = queue.lock().expect("job queue poisoned").pop_front();
                        let Some((index, plan)) = job else { break };

                        let result = if deadline.is_some_and(|d| Instant::now() >= d) {
                            // Deadline already passed: record the job as
                            // never attempted instead of spawning anything.
                            JobResult {
                                name: plan.name.clone(),
                                status: JobStatus::Skipped,
                                log_path: plan.log_path.clone(),
                                wall_time: Duration::ZERO,
                            }
                        } else {
                            executor::run_job(plan, deadline)
                        };

                        println!("[{}/{}] {}: {}", index + 1, total, result.name, result.status);
                        *slots[index].lock().expect("result slot poisoned") = Some(result);
                    }
                });
            }
        });

        let results: Vec<JobResult> = slots
            .into_iter()
            .map(|slot| {
                slot.into_inner()
                    .expect("result slot poisoned")
                    .expect("worker pool exited with an unfinished job")
            })
            .collect();
        Report::from_results(results)
    }
}

/// Remove stale per-job outputs before a batch so a rerun over the same
/// working directories cannot observe state from an aborted prior run.
fn scrub(plans: &[JobPlan]) {
    for plan in plans {
        for path in [&plan.log_path, &plan.signature] {
            if path.exists() {
                let _ = std::fs::remove_file(path);
            }
        }
    }
}

//! Compliance test-pipeline orchestrator: turns test descriptors into
//! compile/extract/pack/simulate jobs, runs them on a bounded worker pool,
//! and aggregates a machine-readable report.

mod config;
mod descriptor;
mod error;
mod executor;
mod orchestrator;
mod plan;
mod report;

pub mod isa;

pub use config::{BuildConfig, DEFAULT_MAX_TICKS, IsaSpec};
pub use descriptor::{TestDescriptor, discover, load_test_list};
pub use error::HarnessError;
pub use executor::{JobResult, JobStatus, SPAWN_FAILURE_CODE, run_job};
pub use orchestrator::Orchestrator;
pub use plan::{CommandSpec, JobPlan, STAGE_COUNT, Stage, StageAction, StageKind, build};
pub use report::{FailureDetail, Report};

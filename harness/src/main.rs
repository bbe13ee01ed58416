use std::time::Duration;

use anyhow::{Context, Result, bail};
use camino::Utf8PathBuf;
use clap::Parser;
use harness::{BuildConfig, Orchestrator, TestDescriptor};

#[derive(Parser)]
#[command(name = "arch-run")]
#[command(about = "Run an architecture compliance suite against a CPU model")]
#[command(version)]
struct Args {
    /// Build configuration file (toolchain, image geometry, tool paths)
    #[arg(long)]
    config: Utf8PathBuf,

    /// Explicit test list (ordered YAML sequence of descriptors)
    #[arg(long, conflicts_with = "suite")]
    test_list: Option<Utf8PathBuf>,

    /// Discover tests from a suite tree instead of an explicit list
    #[arg(long, requires = "work_root")]
    suite: Option<Utf8PathBuf>,

    /// Root for per-test working directories in discovery mode
    #[arg(long)]
    work_root: Option<Utf8PathBuf>,

    /// Worker count override (default: config `jobs`, then host parallelism)
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Compile only: replace the simulate stage with a no-op
    #[arg(long)]
    no_run: bool,

    /// Wall-clock deadline for the whole batch, in seconds
    #[arg(long)]
    deadline: Option<u64>,

    /// Write the JSON report here as well as to stdout
    #[arg(long)]
    report: Option<Utf8PathBuf>,
}

fn load_descriptors(args: &Args, default_features: &[String]) -> Result<Vec<TestDescriptor>> {
    let mut descriptors = if let Some(list) = &args.test_list {
        harness::load_test_list(list)?
    } else if let Some(suite) = &args.suite {
        let work_root = args
            .work_root
            .as_ref()
            .context("--suite requires --work-root")?;
        harness::discover(suite, work_root)?
    } else {
        bail!("either --test-list or --suite is required");
    };

    for descriptor in &mut descriptors {
        if descriptor.features.is_empty() {
            descriptor.features = default_features.to_vec();
        }
    }
    Ok(descriptors)
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = BuildConfig::load(&args.config)?;
    if let Some(jobs) = args.jobs {
        config.jobs = jobs;
    }
    if args.no_run {
        config.target_run = false;
    }
    if let Some(deadline) = args.deadline {
        config.deadline_secs = Some(deadline);
    }

    let default_features = config.default_features()?;
    let descriptors = load_descriptors(&args, &default_features)?;
    if descriptors.is_empty() {
        bail!("no tests to run");
    }

    // Plan construction failures are per-test outcomes: collect them and
    // keep building the rest of the batch.
    let mut plans = Vec::with_capacity(descriptors.len());
    let mut plan_failures = Vec::new();
    for descriptor in &descriptors {
        match harness::build(descriptor, &config) {
            Ok(plan) => plans.push(plan),
            Err(err) => plan_failures.push((descriptor.name.clone(), err)),
        }
    }

    let orchestrator = Orchestrator::new(config.jobs, config.deadline_secs.map(Duration::from_secs));
    let mut report = orchestrator.execute(&plans);
    for (name, err) in &plan_failures {
        eprintln!("{name}: plan construction failed: {err}");
        report.push_plan_failure(name, err);
    }

    println!("{}", report.summary_line());
    println!("{}", report.to_json()?);
    if let Some(path) = &args.report {
        report.write_json(path)?;
    }

    if !report.all_passed() {
        std::process::exit(1);
    }
    Ok(())
}

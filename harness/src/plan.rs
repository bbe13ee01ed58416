use camino::Utf8PathBuf;

use crate::config::BuildConfig;
use crate::descriptor::TestDescriptor;
use crate::error::HarnessError;
use crate::isa;

/// Number of stages in every job plan. Fixed and total: compile, extract,
/// pack, simulate.
pub const STAGE_COUNT: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    Compile,
    Extract,
    Pack,
    Simulate,
}

impl StageKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Compile => "compile",
            Self::Extract => "extract",
            Self::Pack => "pack",
            Self::Simulate => "simulate",
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::Compile),
            1 => Some(Self::Extract),
            2 => Some(Self::Pack),
            3 => Some(Self::Simulate),
            _ => None,
        }
    }
}

/// Structured argv for one external tool invocation. Never interpolated
/// through a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

#[derive(Debug, Clone)]
pub enum StageAction {
    Run(CommandSpec),
    /// Compile-only mode: the stage still "runs" and reports success so
    /// downstream tooling sees a completed pipeline.
    Skip,
}

#[derive(Debug, Clone)]
pub struct Stage {
    pub kind: StageKind,
    pub action: StageAction,
}

/// Fully resolved command sequence for one compliance test. Either built
/// completely or not at all; building touches no filesystem state.
#[derive(Debug, Clone)]
pub struct JobPlan {
    pub name: String,
    pub work_dir: Utf8PathBuf,
    pub log_path: Utf8PathBuf,
    /// Where the simulate stage must leave the signature region dump.
    pub signature: Utf8PathBuf,
    pub stages: Vec<Stage>,
}

/// Build the job plan for one descriptor: derive the canonical ISA string
/// and bind all four stage command lines.
pub fn build(descriptor: &TestDescriptor, config: &BuildConfig) -> Result<JobPlan, HarnessError> {
    // The caller resolves the run-level default feature set into the
    // descriptor; an empty set still yields the bare base string.
    let march = isa::march(config.xlen, &descriptor.features)?;

    let elf = format!("{}.elf", descriptor.name);
    let bin = format!("{}.bin", descriptor.name);
    let hex = format!("{}.hex", descriptor.name);
    let signature = descriptor.work_dir.join(format!("{}.signature", descriptor.name));

    let mut compile_args = vec![
        format!("-march={march}"),
        "-mabi=ilp32".to_owned(),
        "-static".to_owned(),
        "-mcmodel=medany".to_owned(),
        "-fvisibility=hidden".to_owned(),
        "-nostdlib".to_owned(),
        "-nostartfiles".to_owned(),
        "-g".to_owned(),
        format!("-T{}", config.linker_script()),
        format!("-I{}", config.env_dir()),
        format!("-I{}", config.suite_env),
    ];
    for macro_name in &descriptor.macros {
        compile_args.push(format!("-D{macro_name}"));
    }
    compile_args.push(descriptor.source.to_string());
    compile_args.push("-o".to_owned());
    compile_args.push(elf.clone());

    let compile = CommandSpec {
        program: format!("{}gcc", config.toolchain_prefix),
        args: compile_args,
    };

    let extract = CommandSpec {
        program: format!("{}objcopy", config.toolchain_prefix),
        args: vec!["-O".to_owned(), "binary".to_owned(), elf, bin.clone()],
    };

    let pack = CommandSpec {
        program: config.packer.to_string(),
        args: vec![
            format!("--microcode={}", config.microcode_image),
            format!("--microcode-base={:#x}", config.microcode_base),
            format!("--size={:#x}", config.rom_size),
            bin,
            hex.clone(),
        ],
    };

    let simulate = if config.target_run {
        StageAction::Run(CommandSpec {
            program: config.simulator.to_string(),
            args: vec![
                "--image".to_owned(),
                hex,
                "--rom-size".to_owned(),
                format!("{:#x}", config.rom_size),
                "--microcode-base".to_owned(),
                format!("{:#x}", config.microcode_base),
                "--max-ticks".to_owned(),
                config.max_ticks.to_string(),
                "--signature".to_owned(),
                signature.to_string(),
            ],
        })
    } else {
        StageAction::Skip
    };

    let stages = vec![
        Stage {
            kind: StageKind::Compile,
            action: StageAction::Run(compile),
        },
        Stage {
            kind: StageKind::Extract,
            action: StageAction::Run(extract),
        },
        Stage {
            kind: StageKind::Pack,
            action: StageAction::Run(pack),
        },
        Stage {
            kind: StageKind::Simulate,
            action: simulate,
        },
    ];
    debug_assert_eq!(stages.len(), STAGE_COUNT);

    Ok(JobPlan {
        log_path: descriptor.work_dir.join(format!("{}.log", descriptor.name)),
        name: descriptor.name.clone(),
        work_dir: descriptor.work_dir.clone(),
        signature,
        stages,
    })
}

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;

use crate::error::HarnessError;
use crate::isa;

/// Default simulated tick budget baked into the simulate stage. Termination
/// of a well-behaved test is the CPU model's own responsibility through this
/// budget, not a wall-clock timeout.
pub const DEFAULT_MAX_TICKS: u64 = 3_000_000;

fn default_xlen() -> u8 {
    32
}

fn default_true() -> bool {
    true
}

fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn default_max_ticks() -> u64 {
    DEFAULT_MAX_TICKS
}

/// Process-wide build configuration. Loaded once, read-only for the run.
#[derive(Debug, Clone, Deserialize)]
pub struct BuildConfig {
    /// Cross-toolchain prefix, e.g. `riscv32-corev-elf-`.
    pub toolchain_prefix: String,
    #[serde(default = "default_xlen")]
    pub xlen: u8,

    /// Total ROM image size in bytes.
    pub rom_size: u64,
    /// Fixed offset of the shared microcode blob within the ROM image.
    pub microcode_base: u64,

    /// Plugin root; `<plugin_root>/env` holds the linker script and the
    /// model-side include headers.
    pub plugin_root: Utf8PathBuf,
    /// Architecture-test environment include directory.
    pub suite_env: Utf8PathBuf,
    /// Shared microcode image merged into every packed ROM.
    pub microcode_image: Utf8PathBuf,
    /// Raw-binary to ROM-image packer executable.
    pub packer: Utf8PathBuf,
    /// Cycle-accurate CPU model executable.
    pub simulator: Utf8PathBuf,

    /// RISCOF-style ISA specification; `hart0.ISA` supplies the default
    /// feature set for descriptors that declare none.
    #[serde(default)]
    pub isa_spec: Option<Utf8PathBuf>,
    #[serde(default)]
    pub platform_spec: Option<Utf8PathBuf>,

    /// When false the simulate stage is replaced by a no-op (compile-only).
    #[serde(default = "default_true")]
    pub target_run: bool,
    /// Worker-pool size; defaults to host parallelism.
    #[serde(default = "default_jobs")]
    pub jobs: usize,
    /// Maximum simulated ticks handed to the simulate stage.
    #[serde(default = "default_max_ticks")]
    pub max_ticks: u64,
    /// Optional wall-clock deadline for the whole batch, in seconds.
    #[serde(default)]
    pub deadline_secs: Option<u64>,
}

impl BuildConfig {
    /// Load and validate a configuration file.
    pub fn load(path: &Utf8Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {path}"))?;
        let config: Self = serde_yaml::from_str(&text)
            .with_context(|| format!("failed to parse config {path}"))?;
        config.validate()?;
        Ok(config)
    }

    /// Environment include directory under the plugin root.
    pub fn env_dir(&self) -> Utf8PathBuf {
        self.plugin_root.join("env")
    }

    /// Linker script shared by all compile stages.
    pub fn linker_script(&self) -> Utf8PathBuf {
        self.env_dir().join("link.ld")
    }

    /// Check every required path once, before any job starts. A missing
    /// toolchain collaborator makes the whole run pointless.
    pub fn validate(&self) -> Result<(), HarnessError> {
        if self.toolchain_prefix.is_empty() {
            return Err(HarnessError::invalid_config(
                "toolchain_prefix must not be empty",
                self.plugin_root.clone(),
            ));
        }

        let required: &[(&str, Utf8PathBuf)] = &[
            ("environment include dir", self.env_dir()),
            ("linker script", self.linker_script()),
            ("suite environment dir", self.suite_env.clone()),
            ("microcode image", self.microcode_image.clone()),
            ("packer executable", self.packer.clone()),
            ("simulator executable", self.simulator.clone()),
        ];
        for (what, path) in required {
            if !path.exists() {
                return Err(HarnessError::invalid_config(
                    format!("missing {what}"),
                    path.clone(),
                ));
            }
        }

        for path in [&self.isa_spec, &self.platform_spec].into_iter().flatten() {
            if !path.exists() {
                return Err(HarnessError::invalid_config(
                    "missing specification file",
                    path.clone(),
                ));
            }
        }

        Ok(())
    }

    /// Default feature set for descriptors that declare none, read from the
    /// ISA specification file if one is configured.
    pub fn default_features(&self) -> Result<Vec<String>> {
        match &self.isa_spec {
            Some(path) => {
                let spec = IsaSpec::load(path)?;
                Ok(spec.features())
            }
            None => Ok(Vec::new()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Hart {
    #[serde(rename = "ISA")]
    isa: String,
}

/// Minimal reader for a RISCOF ISA specification: only `hart0.ISA` matters
/// to the orchestrator.
#[derive(Debug, Deserialize)]
pub struct IsaSpec {
    hart0: Hart,
}

impl IsaSpec {
    pub fn load(path: &Utf8Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read ISA spec {path}"))?;
        serde_yaml::from_str(&text).with_context(|| format!("failed to parse ISA spec {path}"))
    }

    pub fn isa_string(&self) -> &str {
        &self.hart0.isa
    }

    pub fn features(&self) -> Vec<String> {
        isa::features_from_isa_string(&self.hart0.isa)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn isa_spec_parses_hart0() {
        let spec: IsaSpec = serde_yaml::from_str("hart0:\n  ISA: RV32IMCZbkb\n").unwrap();
        assert_eq!(spec.isa_string(), "RV32IMCZbkb");
        assert_eq!(spec.features(), vec!["I", "M", "C", "Zbkb"]);
    }

    #[test]
    fn config_defaults() {
        let config: BuildConfig = serde_yaml::from_str(
            "toolchain_prefix: riscv32-corev-elf-\n\
             rom_size: 0x200000\n\
             microcode_base: 0x1ff000\n\
             plugin_root: /tmp/plugin\n\
             suite_env: /tmp/env\n\
             microcode_image: /tmp/microcode.hex\n\
             packer: /usr/bin/bin2hex\n\
             simulator: /usr/bin/cpu-model\n",
        )
        .unwrap();
        assert_eq!(config.xlen, 32);
        assert!(config.target_run);
        assert_eq!(config.max_ticks, DEFAULT_MAX_TICKS);
        assert_eq!(config.rom_size, 0x20_0000);
        assert_eq!(config.microcode_base, 0x1f_f000);
        assert!(config.jobs >= 1);
        assert_eq!(config.linker_script(), "/tmp/plugin/env/link.ld");
    }

    #[test]
    fn empty_prefix_is_invalid() {
        let config: BuildConfig = serde_yaml::from_str(
            "toolchain_prefix: ''\n\
             rom_size: 0x200000\n\
             microcode_base: 0x1ff000\n\
             plugin_root: /tmp/plugin\n\
             suite_env: /tmp/env\n\
             microcode_image: /tmp/microcode.hex\n\
             packer: /usr/bin/bin2hex\n\
             simulator: /usr/bin/cpu-model\n",
        )
        .unwrap();
        assert!(matches!(
            config.validate(),
            Err(HarnessError::ConfigurationInvalid { .. })
        ));
    }
}

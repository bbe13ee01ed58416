use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use glob::glob;
use serde::Deserialize;

/// One compliance test as supplied by the suite loader. Immutable; the
/// orchestrator only ever borrows descriptors.
#[derive(Debug, Clone, Deserialize)]
pub struct TestDescriptor {
    /// Unique test name; artifact, log, and signature names derive from it.
    pub name: String,
    /// Assembly source of the test.
    pub source: Utf8PathBuf,
    /// Per-test scratch directory, unique per test so jobs never share
    /// writable paths.
    pub work_dir: Utf8PathBuf,
    /// Preprocessor macros, each emitted as `-D<macro>`.
    #[serde(default)]
    pub macros: Vec<String>,
    /// ISA feature labels (`I`, `M`, ...). Empty means "use the run-level
    /// default feature set".
    #[serde(default)]
    pub features: Vec<String>,
}

/// Load an ordered test list. The file is a YAML sequence, not a map, so
/// input order (and with it report order) is deterministic.
pub fn load_test_list(path: &Utf8Path) -> Result<Vec<TestDescriptor>> {
    let text =
        std::fs::read_to_string(path).with_context(|| format!("failed to read test list {path}"))?;
    serde_yaml::from_str(&text).with_context(|| format!("failed to parse test list {path}"))
}

/// Discover test sources in a riscv-arch-test style suite tree
/// (`<suite>/**/src/*.S`), one descriptor per source. Results are sorted by
/// path so discovery order does not depend on directory iteration order.
pub fn discover(suite_dir: &Utf8Path, work_root: &Utf8Path) -> Result<Vec<TestDescriptor>> {
    let pattern = format!("{suite_dir}/**/src/*.S");
    let mut sources = Vec::new();
    for entry in glob(&pattern)? {
        let path = entry?;
        if !path.is_file() {
            continue;
        }
        let path = Utf8PathBuf::try_from(path).context("non-UTF8 path in test suite")?;
        sources.push(path);
    }
    sources.sort();

    let mut descriptors = Vec::with_capacity(sources.len());
    for source in sources {
        let name = source
            .file_stem()
            .context("test source has no file name")?
            .to_owned();
        descriptors.push(TestDescriptor {
            work_dir: work_root.join(&name),
            name,
            source,
            macros: Vec::new(),
            features: Vec::new(),
        });
    }
    Ok(descriptors)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_preserves_order() {
        let list = "\
- name: add-01
  source: /suite/I/src/add-01.S
  work_dir: /work/add-01
  macros: [RV32I, TEST_CASE_1]
  features: [I]
- name: mul-01
  source: /suite/M/src/mul-01.S
  work_dir: /work/mul-01
  features: [I, M]
";
        let descriptors: Vec<TestDescriptor> = serde_yaml::from_str(list).unwrap();
        assert_eq!(descriptors.len(), 2);
        assert_eq!(descriptors[0].name, "add-01");
        assert_eq!(descriptors[0].macros, vec!["RV32I", "TEST_CASE_1"]);
        assert_eq!(descriptors[1].name, "mul-01");
        assert!(descriptors[1].macros.is_empty());
    }

    #[test]
    fn discover_is_sorted_and_names_work_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let suite = Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();
        for (group, test) in [("M", "mul-01"), ("I", "add-01")] {
            let src = suite.join(group).join("src");
            std::fs::create_dir_all(&src).unwrap();
            std::fs::write(src.join(format!("{test}.S")), ".text\n").unwrap();
        }

        let work_root = suite.join("work");
        let descriptors = discover(&suite, &work_root).unwrap();
        let names: Vec<&str> = descriptors.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["add-01", "mul-01"]);
        assert_eq!(descriptors[0].work_dir, work_root.join("add-01"));
    }
}

//! Declarative YAML test specification
//!
//! A spec file is one `describe` block holding a list of tests. The step type
//! is supplied by each suite, tagged by `action`.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{QaError, QaResult};

/// One YAML file: a named group of tests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecFile<S> {
    /// Group title, prefixed to every test title
    pub describe: String,

    /// Tags applied to every test in the file
    #[serde(default)]
    pub tags: Vec<String>,

    /// Tests in declaration order
    pub tests: Vec<CaseSpec<S>>,

    /// File the spec was loaded from
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

/// A single test: an ordered list of steps
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseSpec<S> {
    pub name: String,

    #[serde(default)]
    pub tags: Vec<String>,

    /// Focus the run on this test
    #[serde(default)]
    pub only: bool,

    /// Report the test as skipped without running it
    #[serde(default)]
    pub skip: bool,

    pub steps: Vec<S>,
}

impl<S: DeserializeOwned> SpecFile<S> {
    /// Parse a spec from YAML string
    pub fn from_yaml(yaml: &str) -> QaResult<Self> {
        let spec: Self = serde_yaml::from_str(yaml)?;
        spec.validate()?;
        Ok(spec)
    }

    /// Parse a spec from a YAML file
    pub fn from_file(path: &Path) -> QaResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut spec = Self::from_yaml(&content)
            .map_err(|e| QaError::SpecParse(format!("{}: {}", path.display(), e)))?;
        spec.source = Some(path.to_path_buf());
        Ok(spec)
    }

    /// Load all spec files below a directory, sorted by path
    pub fn load_all(dir: &Path) -> QaResult<Vec<Self>> {
        if !dir.is_dir() {
            return Err(QaError::SpecParse(format!(
                "spec directory not found: {}",
                dir.display()
            )));
        }

        let mut paths: Vec<PathBuf> = walkdir::WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .map(|e| e.into_path())
            .filter(|p| {
                p.extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
            .collect();
        paths.sort();

        paths.iter().map(|p| Self::from_file(p)).collect()
    }
}

impl<S> SpecFile<S> {
    fn validate(&self) -> QaResult<()> {
        if self.describe.trim().is_empty() {
            return Err(QaError::SpecParse("describe must not be empty".into()));
        }
        for case in &self.tests {
            if case.name.trim().is_empty() {
                return Err(QaError::SpecParse(format!(
                    "test without a name in '{}'",
                    self.describe
                )));
            }
            if case.steps.is_empty() {
                return Err(QaError::SpecParse(format!(
                    "test '{}' has no steps",
                    case.name
                )));
            }
        }
        Ok(())
    }
}

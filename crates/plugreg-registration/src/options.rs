//! Run options and the precondition checks that need no remote call.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Serialize;

use crate::error::{RegistrationError, Result};

/// How remote components missing from the mapping are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationMode {
    /// Create or update only; nothing is deleted.
    #[default]
    Upsert,
    /// Delete undeclared components under the assembly, then upsert.
    Delsert,
}

impl RegistrationMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Upsert => "upsert",
            Self::Delsert => "delsert",
        }
    }
}

impl fmt::Display for RegistrationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RegistrationMode {
    type Err = RegistrationError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "upsert" => Ok(Self::Upsert),
            "delsert" => Ok(Self::Delsert),
            other => Err(RegistrationError::precondition(format!(
                "unknown registration type '{other}' (expected upsert or delsert)"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RegistrationOptions {
    pub mode: RegistrationMode,
    pub assembly_path: PathBuf,
    pub use_split_assembly: bool,
    pub project_file_path: Option<PathBuf>,
    pub is_workflow_activity_assembly: bool,
    pub mapping_path: Option<PathBuf>,
    pub solution_name: Option<String>,
}

impl RegistrationOptions {
    pub fn new(mode: RegistrationMode, assembly_path: impl Into<PathBuf>) -> Self {
        Self {
            mode,
            assembly_path: assembly_path.into(),
            use_split_assembly: false,
            project_file_path: None,
            is_workflow_activity_assembly: false,
            mapping_path: None,
            solution_name: None,
        }
    }

    pub fn with_mapping(mut self, path: impl Into<PathBuf>) -> Self {
        self.mapping_path = Some(path.into());
        self
    }

    pub fn with_solution(mut self, solution: impl Into<String>) -> Self {
        self.solution_name = Some(solution.into());
        self
    }

    /// Registers one assembly per type, located relative to `project_file`.
    pub fn with_split_assembly(mut self, project_file: impl Into<PathBuf>) -> Self {
        self.use_split_assembly = true;
        self.project_file_path = Some(project_file.into());
        self
    }

    pub fn workflow_activity(mut self, is_workflow_activity_assembly: bool) -> Self {
        self.is_workflow_activity_assembly = is_workflow_activity_assembly;
        self
    }

    /// Blank solution names mean "no solution".
    pub fn solution(&self) -> Option<&str> {
        self.solution_name
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Checks every local precondition.
    pub fn validate(&self) -> Result<()> {
        if let Some(mapping) = &self.mapping_path {
            require_file(mapping, "mapping document")?;
        }
        if !self.use_split_assembly {
            return Ok(());
        }

        match &self.project_file_path {
            Some(project) => require_file(project, "project file")?,
            None => {
                return Err(RegistrationError::precondition(
                    "split assembly registration requires a project file path",
                ));
            }
        }
        if self.mode == RegistrationMode::Delsert {
            return Err(RegistrationError::precondition(
                "split assembly registration does not support delsert",
            ));
        }
        if self.mapping_path.is_none() {
            return Err(RegistrationError::precondition(
                "split assembly registration requires a mapping document",
            ));
        }
        Ok(())
    }
}

fn require_file(path: &Path, what: &str) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(RegistrationError::precondition(format!(
            "{what} not found: {}",
            path.display()
        )))
    }
}

//! Project branch naming convention.

/// Maps between project names and Git branch names (`SRS/<project>` by default).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectBranchConvention {
    prefix: String,
}

impl Default for ProjectBranchConvention {
    fn default() -> Self {
        Self::new("SRS/")
    }
}

impl ProjectBranchConvention {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Extracts the project name from a branch, if the branch follows the convention.
    pub fn project_from_branch<'a>(&self, branch: &'a str) -> Option<&'a str> {
        branch
            .trim()
            .strip_prefix(self.prefix.as_str())
            .filter(|project| !project.is_empty())
    }

    pub fn branch_for_project(&self, project: &str) -> String {
        format!("{}{}", self.prefix, project)
    }
}

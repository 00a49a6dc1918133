//! Deployment environments and branch classification results.

use serde::{Serialize, Serializer};

/// Logical deployment target derived from a branch name.
///
/// The key space is fixed: `production`, `staging`, `develop` and the
/// parametrized `sandbox.features.<name>` family. `Passthrough` carries a
/// normalized name that matched the Gitflow prefix but none of the mapping
/// rules (e.g. `mainline`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EnvironmentKey {
    Production,
    Staging,
    Develop,
    SandboxFeature(String),
    Passthrough(String),
}

impl EnvironmentKey {
    /// Dotted path segments of the key inside the service metadata record.
    ///
    /// `sandbox.features.feature-login` yields `["sandbox", "features", "feature-login"]`.
    pub fn path_segments(&self) -> Vec<&str> {
        match self {
            EnvironmentKey::Production => vec!["production"],
            EnvironmentKey::Staging => vec!["staging"],
            EnvironmentKey::Develop => vec!["develop"],
            EnvironmentKey::SandboxFeature(name) => vec!["sandbox", "features", name.as_str()],
            EnvironmentKey::Passthrough(name) => vec![name.as_str()],
        }
    }
}

impl std::fmt::Display for EnvironmentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnvironmentKey::Production => f.write_str("production"),
            EnvironmentKey::Staging => f.write_str("staging"),
            EnvironmentKey::Develop => f.write_str("develop"),
            EnvironmentKey::SandboxFeature(name) => write!(f, "sandbox.features.{}", name),
            EnvironmentKey::Passthrough(name) => f.write_str(name),
        }
    }
}

impl Serialize for EnvironmentKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Result of running a branch name through the Gitflow classifier.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ClassifiedBranch {
    /// Lowercased branch name with `/` and `.` replaced by `-`.
    pub normalized_name: String,

    /// Whether the raw name starts with a Gitflow prefix.
    pub is_gitflow: bool,

    /// Target environment; `None` unless `is_gitflow`.
    pub target_environment: Option<EnvironmentKey>,
}

impl ClassifiedBranch {
    pub fn is_release(&self) -> bool {
        self.normalized_name.starts_with("release-")
    }
}

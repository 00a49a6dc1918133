//! Gitflow branch classification.
//!
//! Maps a raw branch name to its normalized form and deployment environment.
//! Environment resolution walks [`ENVIRONMENT_RULES`] in order; the first rule
//! whose predicate matches the normalized name decides the key.

use std::sync::OnceLock;

use regex::Regex;

use crate::domain::{ClassifiedBranch, EnvironmentKey};

/// Anchored, case-sensitive Gitflow prefix check on the raw branch name.
const GITFLOW_BRANCH_PATTERN: &str = "^(feature|develop|release|main)";

fn gitflow_branch_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(GITFLOW_BRANCH_PATTERN).expect("gitflow pattern compiles"))
}

/// Whether the raw branch name starts with one of the Gitflow prefixes.
pub fn is_gitflow_branch(branch_name: &str) -> bool {
    gitflow_branch_regex().is_match(branch_name)
}

/// Replace every `/` and `.` with `-`, then lowercase.
///
/// The result is used both for stack naming and for environment resolution,
/// so it must stay stable: a change here orphans stacks created under the
/// old naming.
pub fn normalize_branch_name(branch_name: &str) -> String {
    branch_name.replace(['/', '.'], "-").to_lowercase()
}

/// One entry of the branch → environment rule table.
pub struct EnvironmentRule {
    pub name: &'static str,
    pub matches: fn(&str) -> bool,
    pub resolve: fn(&str, &str) -> EnvironmentKey,
}

/// Precedence-ordered mapping rules over normalized branch names.
pub const ENVIRONMENT_RULES: &[EnvironmentRule] = &[
    EnvironmentRule {
        name: "main",
        matches: |name| name == "main",
        resolve: |_, _| EnvironmentKey::Production,
    },
    EnvironmentRule {
        name: "release",
        matches: |name| name.starts_with("release"),
        resolve: |_, _| EnvironmentKey::Staging,
    },
    EnvironmentRule {
        name: "develop",
        matches: |name| name == "develop",
        resolve: |_, _| EnvironmentKey::Develop,
    },
    EnvironmentRule {
        name: "feature",
        matches: |name| name.starts_with("feature"),
        resolve: |name, project_key| {
            EnvironmentKey::SandboxFeature(canonical_feature_name(name, project_key))
        },
    },
];

/// Strip one leading `feature-` from names like `feature-feature-checkout`.
///
/// Returns `None` when the name is not doubled.
pub fn strip_doubled_feature_prefix(name: &str) -> Option<String> {
    name.strip_prefix("feature-")
        .filter(|rest| rest.starts_with("feature"))
        .map(str::to_string)
}

/// Collapse `feature-{project_key}...` to `feature...`.
///
/// Returns `None` when the name does not carry the project key, or the key
/// is empty.
pub fn collapse_project_key(name: &str, project_key: &str) -> Option<String> {
    if project_key.is_empty() {
        return None;
    }
    let keyed_prefix = format!("feature-{}", project_key);
    name.strip_prefix(keyed_prefix.as_str())
        .map(|rest| format!("feature{}", rest))
}

/// Final sandbox name for a normalized feature branch.
///
/// The doubled-prefix rewrite takes precedence; the project-key rewrite only
/// applies when the name was not doubled.
pub fn canonical_feature_name(name: &str, project_key: &str) -> String {
    strip_doubled_feature_prefix(name)
        .or_else(|| collapse_project_key(name, project_key))
        .unwrap_or_else(|| name.to_string())
}

/// Resolve the environment key for an already normalized branch name.
///
/// Falls back to the normalized name itself when no rule matches.
pub fn resolve_environment(normalized_name: &str, project_key: &str) -> EnvironmentKey {
    ENVIRONMENT_RULES
        .iter()
        .find(|rule| (rule.matches)(normalized_name))
        .map(|rule| (rule.resolve)(normalized_name, project_key))
        .unwrap_or_else(|| EnvironmentKey::Passthrough(normalized_name.to_string()))
}

/// Classify a raw branch name.
pub fn classify(branch_name: &str, project_key: &str) -> ClassifiedBranch {
    let normalized_name = normalize_branch_name(branch_name);
    let is_gitflow = is_gitflow_branch(branch_name);
    let target_environment =
        is_gitflow.then(|| resolve_environment(&normalized_name, project_key));

    ClassifiedBranch {
        normalized_name,
        is_gitflow,
        target_environment,
    }
}

//! Patch policy: how many bytes may change, and in which functions.
//!
//! Policies can be built in code, taken from [`PatchPolicy::default`], or
//! loaded from a YAML/JSON file. Fields missing from a file fall back to the
//! defaults.

use std::fs;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};

/// Default cap on differing bytes.
pub const DEFAULT_MAX_CHANGES: usize = 200;

/// Default marker every patched function name must contain.
pub const DEFAULT_REQUIRED_MARKER: &str = "babi";

/// Default markers that rule a function out even when it carries the required marker.
pub const DEFAULT_DENIED_MARKERS: &[&str] = &["main", "signal_handler"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatchPolicy {
    /// Largest number of differing bytes accepted.
    pub max_changes: usize,
    /// Substring that must appear in the name of every touched function.
    pub required_marker: String,
    /// Substrings that reject a touched function outright.
    pub denied_markers: Vec<String>,
}

impl Default for PatchPolicy {
    fn default() -> Self {
        Self {
            max_changes: DEFAULT_MAX_CHANGES,
            required_marker: DEFAULT_REQUIRED_MARKER.to_string(),
            denied_markers: DEFAULT_DENIED_MARKERS.iter().map(|m| m.to_string()).collect(),
        }
    }
}

/// How a policy judges a single function name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FunctionVerdict {
    Allowed,
    /// The name lacks the required marker.
    Foreign,
    /// The name contains this denied marker.
    Denied(String),
}

impl PatchPolicy {
    pub fn new(
        max_changes: usize,
        required_marker: impl Into<String>,
        denied_markers: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            max_changes,
            required_marker: required_marker.into(),
            denied_markers: denied_markers.into_iter().map(Into::into).collect(),
        }
    }

    /// Judge a function name. The required marker is checked first.
    pub fn judge(&self, function_name: &str) -> FunctionVerdict {
        if !function_name.contains(&self.required_marker) {
            return FunctionVerdict::Foreign;
        }
        match self.denied_markers.iter().find(|marker| function_name.contains(marker.as_str())) {
            Some(marker) => FunctionVerdict::Denied(marker.clone()),
            None => FunctionVerdict::Allowed,
        }
    }

    /// Reject policies that cannot accept any patch at all.
    pub fn check(&self) -> Result<()> {
        if self.max_changes == 0 {
            bail!("max_changes must be at least 1");
        }
        Ok(())
    }

    /// Load a policy from a `.yaml`/`.yml`/`.json` file.
    pub fn load(path: &Path) -> Result<Self> {
        let body = fs::read_to_string(path)
            .with_context(|| format!("Failed to read policy file {}", path.display()))?;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
        let policy: PatchPolicy = match ext {
            "json" => serde_json::from_str(&body)
                .with_context(|| format!("Failed to parse policy JSON {}", path.display()))?,
            "yaml" | "yml" => serde_yaml::from_str(&body)
                .with_context(|| format!("Failed to parse policy YAML {}", path.display()))?,
            other => {
                return Err(anyhow!(
                    "Unsupported policy file extension `{other}` (expected yaml, yml, or json)"
                ))
            }
        };
        policy.check().with_context(|| format!("Invalid policy in {}", path.display()))?;
        Ok(policy)
    }

    /// Serialize the policy in the format implied by `path`'s extension.
    pub fn to_file_contents(&self, path: &Path) -> Result<String> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
        match ext {
            "json" => serde_json::to_string_pretty(self).context("Failed to serialize policy JSON"),
            "yaml" | "yml" => serde_yaml::to_string(self).context("Failed to serialize policy YAML"),
            other => Err(anyhow!(
                "Unsupported policy file extension `{other}` (expected yaml, yml, or json)"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_matches_challenge_rules() {
        let policy = PatchPolicy::default();
        assert_eq!(policy.max_changes, 200);
        assert_eq!(policy.required_marker, "babi");
        assert_eq!(policy.denied_markers, vec!["main", "signal_handler"]);
    }

    #[test]
    fn judge_applies_required_then_denied() {
        let policy = PatchPolicy::default();
        assert_eq!(policy.judge("babi_parse"), FunctionVerdict::Allowed);
        assert_eq!(policy.judge("libc_strcpy"), FunctionVerdict::Foreign);
        assert_eq!(policy.judge("babi_main"), FunctionVerdict::Denied("main".into()));
        assert_eq!(
            policy.judge("babi_signal_handler"),
            FunctionVerdict::Denied("signal_handler".into())
        );
        // A denied marker alone does not matter when the required marker is absent.
        assert_eq!(policy.judge("main"), FunctionVerdict::Foreign);
    }

    #[test]
    fn markers_match_as_substrings() {
        let policy = PatchPolicy::new(10, "babi", ["main"]);
        assert_eq!(policy.judge("_ZN4babi6domainE"), FunctionVerdict::Denied("main".into()));
        assert_eq!(policy.judge("xbabix"), FunctionVerdict::Allowed);
    }

    #[test]
    fn zero_cap_is_rejected() {
        let policy = PatchPolicy::new(0, "babi", Vec::<String>::new());
        assert!(policy.check().is_err());
    }

    #[test]
    fn partial_yaml_falls_back_to_defaults() {
        let policy: PatchPolicy = serde_yaml::from_str("max_changes: 16\n").unwrap();
        assert_eq!(policy.max_changes, 16);
        assert_eq!(policy.required_marker, "babi");
        assert_eq!(policy.denied_markers.len(), 2);
    }
}

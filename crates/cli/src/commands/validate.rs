use std::path::Path;

use anyhow::Result;
use patchguard_core::{PatchPolicy, PatchValidator, ValidationError, ValidationReport};
use serde_json::json;

/// Prefix of the single line a wrapping harness may relay to untrusted users.
pub const PUBLIC_PREFIX: &str = "PUBLIC: ";

/// Final line printed after every accepted patch record.
pub const ACCEPTED_LINE: &str = "all good";

/// Build the effective policy: the policy file (or defaults), then explicit flags.
///
/// An empty `deny` keeps the file's (or default) denied markers; `no_deny`
/// clears them.
pub fn resolve_policy(
    policy_file: Option<&Path>,
    max_changes: Option<usize>,
    required_marker: Option<String>,
    deny: Vec<String>,
    no_deny: bool,
) -> Result<PatchPolicy> {
    let mut policy = match policy_file {
        Some(path) => PatchPolicy::load(path)?,
        None => PatchPolicy::default(),
    };
    if let Some(max) = max_changes {
        policy.max_changes = max;
    }
    if let Some(marker) = required_marker {
        policy.required_marker = marker;
    }
    if no_deny {
        policy.denied_markers.clear();
    } else if !deny.is_empty() {
        policy.denied_markers = deny;
    }
    policy.check()?;
    Ok(policy)
}

/// Validate `modified` against `original` and print the verdict.
///
/// Returns `Ok(true)` when the patch is accepted and `Ok(false)` when it is
/// rejected; either way the verdict has already been printed.
pub fn validate_command(
    modified: &str,
    original: &str,
    policy: PatchPolicy,
    json: bool,
) -> Result<bool> {
    let validator = PatchValidator::new(policy);
    match validator.validate_paths(modified, original) {
        Ok(report) => {
            if json {
                let body = json!({ "status": "accepted", "report": report });
                println!("{}", serde_json::to_string_pretty(&body)?);
            } else {
                for line in accepted_lines(&report) {
                    println!("{line}");
                }
            }
            Ok(true)
        }
        Err(err) => {
            if json {
                let body = json!({
                    "status": "rejected",
                    "kind": err.kind(),
                    "message": err.to_string(),
                });
                println!("{}", serde_json::to_string_pretty(&body)?);
            } else {
                println!("{}", public_line(&err));
            }
            Ok(false)
        }
    }
}

/// Console lines for an accepted patch: one per record, then [`ACCEPTED_LINE`].
pub fn accepted_lines(report: &ValidationReport) -> Vec<String> {
    report
        .patches
        .iter()
        .map(ToString::to_string)
        .chain(std::iter::once(ACCEPTED_LINE.to_string()))
        .collect()
}

/// Verdict printed when validation could not start (e.g. a broken policy file).
pub fn aborted_output(err: &anyhow::Error, json: bool) -> String {
    if json {
        let body = json!({
            "status": "rejected",
            "kind": "invalid_policy",
            "message": err.to_string(),
        });
        format!("{body:#}")
    } else {
        format!("{PUBLIC_PREFIX}{err}")
    }
}

pub fn public_line(err: &ValidationError) -> String {
    format!("{PUBLIC_PREFIX}{err}")
}

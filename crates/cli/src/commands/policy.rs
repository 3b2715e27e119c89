use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use patchguard_core::PatchPolicy;

/// Write the default policy to `path` (YAML or JSON, by extension).
pub fn init_policy_command(path: &str, force: bool) -> Result<()> {
    let path = Path::new(path);
    if path.exists() && !force {
        return Err(anyhow!(
            "Policy file already exists: {} (use --force to overwrite)",
            path.display()
        ));
    }

    let policy = PatchPolicy::default();
    let contents = policy.to_file_contents(path)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    fs::write(path, contents)
        .with_context(|| format!("Failed to write policy file {}", path.display()))?;

    println!("Wrote default policy:");
    println!("  Path: {}", path.display());
    println!("  Max changes: {}", policy.max_changes);
    println!("  Required marker: {}", policy.required_marker);
    println!("  Denied markers: {}", policy.denied_markers.join(", "));
    Ok(())
}

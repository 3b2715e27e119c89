use patchguard_core::{version, PatchValidator};

#[test]
fn version_is_non_empty() {
    let v = version();
    assert!(!v.is_empty());
}

#[test]
fn default_validator_uses_default_policy() {
    let validator = PatchValidator::default();
    assert_eq!(validator.policy().max_changes, 200);
    assert_eq!(validator.policy().required_marker, "babi");
}

//! Core data model: functions, patch records, and validation reports.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::policy::PatchPolicy;

/// A named function occupying `[address, address + size)` in virtual memory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionInfo {
    pub name: String,
    pub address: u64,
    pub size: u64,
}

impl FunctionInfo {
    pub fn new(name: impl Into<String>, address: u64, size: u64) -> Self {
        Self { name: name.into(), address, size }
    }

    /// One past the last address of the function.
    pub fn end(&self) -> u64 {
        self.address.saturating_add(self.size)
    }

    pub fn contains(&self, address: u64) -> bool {
        self.address <= address && address < self.end()
    }
}

/// One accepted byte change, attributed to its enclosing function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchRecord {
    /// File offset of the changed byte.
    pub offset: u64,
    /// Virtual address the offset maps to.
    pub address: u64,
    pub function: String,
    /// Distance from the function's base address.
    pub function_offset: u64,
    pub original: u8,
    pub patched: u8,
}

impl fmt::Display for PatchRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "patching {:#x}({}+{:#x}) [{:#x}] => [{:#x}]",
            self.offset, self.function, self.function_offset, self.original, self.patched
        )
    }
}

/// Identity of one of the two compared images.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSummary {
    pub path: Option<String>,
    pub len: usize,
    pub sha256: String,
}

/// Outcome of a successful validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub modified: ImageSummary,
    pub original: ImageSummary,
    pub policy: PatchPolicy,
    pub patches: Vec<PatchRecord>,
    /// RFC 3339 timestamp of when the check ran.
    pub checked_at: String,
}

impl ValidationReport {
    pub fn is_noop(&self) -> bool {
        self.patches.is_empty()
    }
}

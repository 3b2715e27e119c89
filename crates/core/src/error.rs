//! Error types for patch validation.
//!
//! The `Display` form of every [`ValidationError`] is the safe, public summary
//! of a rejection. Anything that may leak internals (I/O errors, parser
//! failures) is kept as a `source` and only surfaces through
//! [`ValidationError::diagnostic`].

use std::error::Error as _;
use std::path::PathBuf;

use thiserror::Error;

/// Failure to turn raw bytes into an image layout.
#[derive(Debug, Error)]
pub enum ImageError {
    /// The bytes could not be parsed as an object file at all.
    #[error("parse error: {0}")]
    Parse(#[from] goblin::error::Error),

    /// The bytes parsed, but as a format we cannot attribute patches in.
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(&'static str),
}

/// Reasons a patch is rejected. Validation stops at the first one.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("unable to read image {}", path.display())]
    UnreadableImage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("size mismatch ({modified} != {original})")]
    SizeMismatch { modified: usize, original: usize },

    #[error("too many changes (differences > {limit})")]
    TooManyChanges { limit: usize },

    #[error("invalid elf")]
    InvalidImage(#[source] ImageError),

    #[error("patch at offset {offset:#x} is not valid")]
    UnmappedOffset { offset: u64 },

    #[error("patch at offset {offset:#x} is not in a valid function")]
    NotInFunction { offset: u64, address: u64 },

    #[error("patch at offset {offset:#x}({function}+{function_offset:#x}) is not part of main program")]
    ForbiddenFunction { offset: u64, function: String, function_offset: u64 },

    #[error("patch at offset {offset:#x}({function}+{function_offset:#x}) is not allowed")]
    BlacklistedFunction { offset: u64, function: String, function_offset: u64, marker: String },
}

impl ValidationError {
    /// Stable snake_case identifier for the rejection reason.
    pub fn kind(&self) -> &'static str {
        match self {
            ValidationError::UnreadableImage { .. } => "unreadable_image",
            ValidationError::SizeMismatch { .. } => "size_mismatch",
            ValidationError::TooManyChanges { .. } => "too_many_changes",
            ValidationError::InvalidImage(_) => "invalid_image",
            ValidationError::UnmappedOffset { .. } => "unmapped_offset",
            ValidationError::NotInFunction { .. } => "not_in_function",
            ValidationError::ForbiddenFunction { .. } => "forbidden_function",
            ValidationError::BlacklistedFunction { .. } => "blacklisted_function",
        }
    }

    /// Internal detail behind the public message, if there is any.
    ///
    /// This walks the `source` chain, so it is `None` for rejections that are
    /// fully described by their `Display` output.
    pub fn diagnostic(&self) -> Option<String> {
        let mut parts = Vec::new();
        let mut current = self.source();
        while let Some(err) = current {
            parts.push(err.to_string());
            current = err.source();
        }
        match self {
            ValidationError::NotInFunction { address, .. } => {
                parts.push(format!("virtual address {address:#x} is outside every function"))
            }
            ValidationError::BlacklistedFunction { marker, .. } => {
                parts.push(format!("function name contains denied marker `{marker}`"))
            }
            _ => {}
        }
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(": "))
        }
    }
}

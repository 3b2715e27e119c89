//! patchguard-core
//!
//! Core library for deciding whether a byte-level patch to an executable is
//! acceptable.
//!
//! A patch is the set of bytes that differ between a modified image and its
//! original. Each differing byte is attributed to the function that encloses
//! it in the original image's symbol table, and the enclosing function's name
//! is checked against a [`policy::PatchPolicy`].
//!
//! All substantive logic lives here so it can be tested without real
//! executables (see [`image::SymbolTable`]) and reused from any frontend.

pub mod error;
pub mod image;
pub mod model;
pub mod policy;
pub mod services;

pub use error::{ImageError, ValidationError};
pub use image::{Image, ImageLayout, SymbolTable};
pub use model::{FunctionInfo, PatchRecord, ValidationReport};
pub use policy::PatchPolicy;
pub use services::validator::PatchValidator;

/// Returns the library version as encoded at compile time.
///
/// Useful for tests and for frontends to report consistent version info.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

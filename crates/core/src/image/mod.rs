//! Raw images and their address layout.
//!
//! - `Image`: the bytes of one file plus where they came from.
//! - `ImageLayout`: the two lookups validation needs from a parsed original
//!   (file offset to virtual address, virtual address to function).
//! - `SymbolTable`: an in-memory `ImageLayout`, built either by hand (tests,
//!   fabricated layouts) or from an ELF file via [`elf::load_layout`].

pub mod elf;

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::ValidationError;
use crate::model::{FunctionInfo, ImageSummary};

/// Raw contents of a binary file. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    path: Option<PathBuf>,
    bytes: Vec<u8>,
}

impl Image {
    /// Read the whole file at `path` into memory.
    pub fn read(path: impl AsRef<Path>) -> Result<Self, ValidationError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|source| ValidationError::UnreadableImage {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self { path: Some(path.to_path_buf()), bytes })
    }

    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self { path: None, bytes: bytes.into() }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Hex-encoded SHA-256 of the contents.
    pub fn sha256(&self) -> String {
        let digest = Sha256::digest(&self.bytes);
        format!("{:x}", digest)
    }

    pub fn summary(&self) -> ImageSummary {
        ImageSummary {
            path: self.path.as_ref().map(|p| p.display().to_string()),
            len: self.len(),
            sha256: self.sha256(),
        }
    }
}

/// Address lookups over a parsed original image.
pub trait ImageLayout {
    /// Virtual address of the byte at `file_offset`, if that byte is loaded.
    fn translate(&self, file_offset: u64) -> Option<u64>;

    /// Function whose range contains `address`. First match wins.
    fn function_containing(&self, address: u64) -> Option<&FunctionInfo>;
}

impl<T: ImageLayout + ?Sized> ImageLayout for &T {
    fn translate(&self, file_offset: u64) -> Option<u64> {
        (**self).translate(file_offset)
    }

    fn function_containing(&self, address: u64) -> Option<&FunctionInfo> {
        (**self).function_containing(address)
    }
}

/// A file range that is loaded at a fixed virtual address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappedRegion {
    pub file_offset: u64,
    pub file_size: u64,
    pub virtual_address: u64,
}

impl MappedRegion {
    pub fn new(file_offset: u64, file_size: u64, virtual_address: u64) -> Self {
        Self { file_offset, file_size, virtual_address }
    }

    pub fn translate(&self, file_offset: u64) -> Option<u64> {
        let delta = file_offset.checked_sub(self.file_offset)?;
        if delta < self.file_size {
            self.virtual_address.checked_add(delta)
        } else {
            None
        }
    }
}

/// Function table plus offset-to-address regions of one image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolTable {
    regions: Vec<MappedRegion>,
    functions: Vec<FunctionInfo>,
    /// `(name, address)` of every entry in `functions`.
    seen: HashSet<(String, u64)>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_region(mut self, file_offset: u64, file_size: u64, virtual_address: u64) -> Self {
        self.push_region(MappedRegion::new(file_offset, file_size, virtual_address));
        self
    }

    pub fn with_function(mut self, name: impl Into<String>, address: u64, size: u64) -> Self {
        self.push_function(FunctionInfo::new(name, address, size));
        self
    }

    pub fn push_region(&mut self, region: MappedRegion) {
        self.regions.push(region);
    }

    /// Append a function unless the same name is already known at the same address.
    pub fn push_function(&mut self, function: FunctionInfo) {
        if self.seen.insert((function.name.clone(), function.address)) {
            self.functions.push(function);
        }
    }

    pub fn regions(&self) -> &[MappedRegion] {
        &self.regions
    }

    /// Functions in symbol-table order.
    pub fn functions(&self) -> &[FunctionInfo] {
        &self.functions
    }

    pub fn function_named(&self, name: &str) -> Option<&FunctionInfo> {
        self.functions.iter().find(|f| f.name == name)
    }
}

impl ImageLayout for SymbolTable {
    fn translate(&self, file_offset: u64) -> Option<u64> {
        self.regions.iter().find_map(|region| region.translate(file_offset))
    }

    fn function_containing(&self, address: u64) -> Option<&FunctionInfo> {
        self.functions.iter().find(|f| f.contains(address))
    }
}

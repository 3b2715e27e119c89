use std::path::Path;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::error::{ImageError, ValidationError};
use crate::image::{elf, Image, ImageLayout};
use crate::model::{PatchRecord, ValidationReport};
use crate::policy::{FunctionVerdict, PatchPolicy};
use crate::services::diff::differing_offsets;

/// Checks a modified image against its original under a [`PatchPolicy`].
///
/// The validator holds nothing but the policy; every call derives its own
/// diff and layout, so one instance can be shared freely.
#[derive(Debug, Clone, Default)]
pub struct PatchValidator {
    policy: PatchPolicy,
}

impl PatchValidator {
    pub fn new(policy: PatchPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &PatchPolicy {
        &self.policy
    }

    /// Read both files, parse the original as ELF, and validate the patch.
    pub fn validate_paths(
        &self,
        modified: impl AsRef<Path>,
        original: impl AsRef<Path>,
    ) -> Result<ValidationReport, ValidationError> {
        let modified = Image::read(modified).map_err(rejected)?;
        let original = Image::read(original).map_err(rejected)?;

        let patches = self.validate_images(&modified, &original, elf::load_layout)?;

        Ok(ValidationReport {
            modified: modified.summary(),
            original: original.summary(),
            policy: self.policy.clone(),
            patches,
            checked_at: Utc::now().to_rfc3339(),
        })
    }

    /// Validate two in-memory images.
    ///
    /// `load_layout` is only invoked on the original's bytes, and only once the
    /// diff is known to be non-empty and within the change cap.
    pub fn validate_images<L, F>(
        &self,
        modified: &Image,
        original: &Image,
        load_layout: F,
    ) -> Result<Vec<PatchRecord>, ValidationError>
    where
        L: ImageLayout,
        F: FnOnce(&[u8]) -> Result<L, ImageError>,
    {
        let offsets =
            differing_offsets(modified.bytes(), original.bytes(), self.policy.max_changes)
                .map_err(rejected)?;
        debug!(changes = offsets.len(), limit = self.policy.max_changes, "computed diff");
        if offsets.is_empty() {
            return Ok(Vec::new());
        }

        let layout = load_layout(original.bytes())
            .map_err(|err| rejected(ValidationError::InvalidImage(err)))?;

        self.attribute(&offsets, modified.bytes(), original.bytes(), &layout).map_err(rejected)
    }

    /// Validate two in-memory images against an already-built layout.
    pub fn validate_with_layout<L: ImageLayout>(
        &self,
        modified: &Image,
        original: &Image,
        layout: &L,
    ) -> Result<Vec<PatchRecord>, ValidationError> {
        self.validate_images(modified, original, |_: &[u8]| Ok::<_, ImageError>(layout))
    }

    fn attribute<L: ImageLayout>(
        &self,
        offsets: &[usize],
        modified: &[u8],
        original: &[u8],
        layout: &L,
    ) -> Result<Vec<PatchRecord>, ValidationError> {
        let mut records = Vec::with_capacity(offsets.len());

        for &index in offsets {
            let offset = index as u64;
            let address =
                layout.translate(offset).ok_or(ValidationError::UnmappedOffset { offset })?;
            let (function, function_offset) = layout
                .function_containing(address)
                .and_then(|f| address.checked_sub(f.address).map(|delta| (f, delta)))
                .ok_or(ValidationError::NotInFunction { offset, address })?;
            debug!(offset, address, function = %function.name, "attributed change");

            match self.policy.judge(&function.name) {
                FunctionVerdict::Foreign => {
                    return Err(ValidationError::ForbiddenFunction {
                        offset,
                        function: function.name.clone(),
                        function_offset,
                    })
                }
                FunctionVerdict::Denied(marker) => {
                    return Err(ValidationError::BlacklistedFunction {
                        offset,
                        function: function.name.clone(),
                        function_offset,
                        marker,
                    })
                }
                FunctionVerdict::Allowed => {}
            }

            let record = PatchRecord {
                offset,
                address,
                function: function.name.clone(),
                function_offset,
                original: original[index],
                patched: modified[index],
            };
            info!("{record}");
            records.push(record);
        }

        Ok(records)
    }
}

fn rejected(err: ValidationError) -> ValidationError {
    match err.diagnostic() {
        Some(detail) => warn!(kind = err.kind(), %detail, "patch rejected: {err}"),
        None => warn!(kind = err.kind(), "patch rejected: {err}"),
    }
    err
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::image::SymbolTable;
    use crate::model::FunctionInfo;

    /// Layout that counts lookups, to prove which steps ran.
    struct CountingLayout {
        inner: SymbolTable,
        lookups: Cell<usize>,
    }

    impl ImageLayout for CountingLayout {
        fn translate(&self, file_offset: u64) -> Option<u64> {
            self.lookups.set(self.lookups.get() + 1);
            self.inner.translate(file_offset)
        }

        fn function_containing(&self, address: u64) -> Option<&FunctionInfo> {
            self.lookups.set(self.lookups.get() + 1);
            self.inner.function_containing(address)
        }
    }

    fn images_with_changes(count: usize) -> (Image, Image) {
        let original = vec![0u8; 1024];
        let mut modified = original.clone();
        for byte in modified.iter_mut().skip(512).take(count) {
            *byte = 0x90;
        }
        (Image::from_bytes(modified), Image::from_bytes(original))
    }

    fn table() -> SymbolTable {
        SymbolTable::new().with_region(0, 1024, 0x401000).with_function("babi_parse", 0x401000, 0x300)
    }

    #[test]
    fn empty_diff_never_loads_a_layout() {
        let (_, original) = images_with_changes(0);
        let validator = PatchValidator::default();
        let records = validator
            .validate_images(&original, &original, |_: &[u8]| -> Result<SymbolTable, ImageError> {
                panic!("layout should not be loaded for identical images")
            })
            .unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn over_cap_fails_before_any_lookup() {
        let (modified, original) = images_with_changes(4);
        let validator = PatchValidator::new(PatchPolicy::new(3, "babi", ["main"]));
        let layout = CountingLayout { inner: table(), lookups: Cell::new(0) };
        let err = validator.validate_with_layout(&modified, &original, &layout).unwrap_err();
        assert!(matches!(err, ValidationError::TooManyChanges { limit: 3 }));
        assert_eq!(layout.lookups.get(), 0);
    }

    #[test]
    fn at_cap_is_attributed() {
        let (modified, original) = images_with_changes(3);
        let validator = PatchValidator::new(PatchPolicy::new(3, "babi", ["main"]));
        let layout = CountingLayout { inner: table(), lookups: Cell::new(0) };
        let records = validator.validate_with_layout(&modified, &original, &layout).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(layout.lookups.get(), 6);
        assert_eq!(
            records.iter().map(|r| r.function_offset).collect::<Vec<_>>(),
            vec![0x200, 0x201, 0x202]
        );
    }

    #[test]
    fn loader_failure_becomes_invalid_image() {
        let (modified, original) = images_with_changes(1);
        let err = PatchValidator::default()
            .validate_images(&modified, &original, |_: &[u8]| {
                Err::<SymbolTable, _>(ImageError::UnsupportedFormat("PE"))
            })
            .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidImage(ImageError::UnsupportedFormat("PE"))));
    }

    /// Layout that hands back a function starting above the looked-up address.
    struct MisalignedLayout {
        function: FunctionInfo,
    }

    impl ImageLayout for MisalignedLayout {
        fn translate(&self, file_offset: u64) -> Option<u64> {
            Some(file_offset)
        }

        fn function_containing(&self, _address: u64) -> Option<&FunctionInfo> {
            Some(&self.function)
        }
    }

    #[test]
    fn function_above_address_is_not_in_function() {
        let (modified, original) = images_with_changes(1);
        let layout = MisalignedLayout { function: FunctionInfo::new("babi_parse", 0x401000, 0x300) };
        let err = PatchValidator::default()
            .validate_with_layout(&modified, &original, &layout)
            .unwrap_err();
        assert!(matches!(err, ValidationError::NotInFunction { offset: 512, address: 512 }));
    }

    #[test]
    fn first_violation_stops_validation() {
        let original = vec![0u8; 32];
        let mut modified = original.clone();
        modified[4] = 1;
        modified[20] = 1;
        let layout = SymbolTable::new()
            .with_region(0, 32, 0x1000)
            .with_function("babi_main", 0x1000, 0x10)
            .with_function("outside", 0x1010, 0x10);
        let err = PatchValidator::default()
            .validate_with_layout(&Image::from_bytes(modified), &Image::from_bytes(original), &layout)
            .unwrap_err();
        match err {
            ValidationError::BlacklistedFunction { offset, function, function_offset, marker } => {
                assert_eq!(offset, 4);
                assert_eq!(function, "babi_main");
                assert_eq!(function_offset, 4);
                assert_eq!(marker, "main");
            }
            other => panic!("expected BlacklistedFunction, got {other:?}"),
        }
    }
}

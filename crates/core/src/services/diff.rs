use crate::error::ValidationError;

/// Offsets (ascending) where `modified` and `original` differ.
///
/// Stops scanning as soon as more than `limit` differences have been seen, so
/// the full diff of a heavily modified image is never materialized.
pub fn differing_offsets(
    modified: &[u8],
    original: &[u8],
    limit: usize,
) -> Result<Vec<usize>, ValidationError> {
    if modified.len() != original.len() {
        return Err(ValidationError::SizeMismatch {
            modified: modified.len(),
            original: original.len(),
        });
    }

    let mut offsets = Vec::new();
    for (offset, (new, old)) in modified.iter().zip(original).enumerate() {
        if new != old {
            offsets.push(offset);
            if offsets.len() > limit {
                return Err(ValidationError::TooManyChanges { limit });
            }
        }
    }
    Ok(offsets)
}

//! Canonical block coordinates under a symmetry descriptor.
//!
//! Within each group, the coordinate components are read at the group's
//! mode positions in ascending mode order and sorted ascending (stably).
//! A coordinate is unique when no group needs reordering.

use crate::error::{Result, TensorError};
use crate::index_vec::{identity_permutation, invert_permutation, ModeVec};
use crate::symmetry::SymmetryDescriptor;

/// Result of resolving one coordinate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueInfo {
    /// True if the coordinate is its own canonical representative.
    pub is_unique: bool,
    /// Canonical representative of the coordinate.
    pub canonical: ModeVec,
    /// Sorting permutation: `canonical[m] == coordinate[permutation[m]]`.
    pub permutation: ModeVec,
    /// Inverse of `permutation`.
    pub inverse_permutation: ModeVec,
}

/// Resolve the canonical representative of `coordinate` under `symmetry`.
///
/// # Example
///
/// ```
/// use psym_tensor::{get_unique_info, SymmetryDescriptor};
///
/// let sym = SymmetryDescriptor::fully_symmetric(2).unwrap();
/// let info = get_unique_info(&sym, &[1, 0]).unwrap();
/// assert!(!info.is_unique);
/// assert_eq!(info.canonical.as_slice(), &[0, 1]);
/// assert_eq!(info.permutation.as_slice(), &[1, 0]);
/// ```
pub fn get_unique_info(symmetry: &SymmetryDescriptor, coordinate: &[usize]) -> Result<UniqueInfo> {
    let order = symmetry.order();
    if coordinate.len() != order {
        return Err(TensorError::ShapeMismatch {
            expected: vec![order],
            actual: vec![coordinate.len()],
        });
    }

    let mut canonical: ModeVec = coordinate.iter().copied().collect();
    let mut permutation = identity_permutation(order);
    let mut is_unique = true;

    for group in symmetry.groups() {
        if group.len() < 2 {
            continue;
        }
        let mut positions: ModeVec = group.iter().copied().collect();
        positions.sort_unstable();
        if positions
            .windows(2)
            .all(|w| coordinate[w[0]] <= coordinate[w[1]])
        {
            continue;
        }
        is_unique = false;
        let mut sources = positions.clone();
        sources.sort_by_key(|&p| coordinate[p]);
        for (&dst, &src) in positions.iter().zip(&sources) {
            canonical[dst] = coordinate[src];
            permutation[dst] = src;
        }
    }

    let inverse_permutation = invert_permutation(&permutation)?;
    Ok(UniqueInfo {
        is_unique,
        canonical,
        permutation,
        inverse_permutation,
    })
}

/// Canonical representative of `coordinate`.
pub fn canonical_of(symmetry: &SymmetryDescriptor, coordinate: &[usize]) -> Result<ModeVec> {
    get_unique_info(symmetry, coordinate).map(|info| info.canonical)
}

/// True if `coordinate` is canonical under `symmetry`.
pub fn is_unique(symmetry: &SymmetryDescriptor, coordinate: &[usize]) -> Result<bool> {
    get_unique_info(symmetry, coordinate).map(|info| info.is_unique)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index_vec::is_identity;

    #[test]
    fn test_unique_coordinate() {
        let sym = SymmetryDescriptor::fully_symmetric(3).unwrap();
        let info = get_unique_info(&sym, &[0, 1, 1]).unwrap();
        assert!(info.is_unique);
        assert_eq!(info.canonical.as_slice(), &[0, 1, 1]);
        assert!(is_identity(&info.permutation));
        assert!(is_identity(&info.inverse_permutation));
    }

    #[test]
    fn test_sorting_permutation() {
        let sym = SymmetryDescriptor::fully_symmetric(3).unwrap();
        let coord = [2, 0, 1];
        let info = get_unique_info(&sym, &coord).unwrap();
        assert!(!info.is_unique);
        assert_eq!(info.canonical.as_slice(), &[0, 1, 2]);
        assert_eq!(info.permutation.as_slice(), &[1, 2, 0]);
        assert_eq!(info.inverse_permutation.as_slice(), &[2, 0, 1]);
        for m in 0..3 {
            assert_eq!(info.canonical[m], coord[info.permutation[m]]);
        }
    }

    #[test]
    fn test_stable_on_ties() {
        let sym = SymmetryDescriptor::fully_symmetric(3).unwrap();
        let info = get_unique_info(&sym, &[1, 0, 1]).unwrap();
        assert_eq!(info.canonical.as_slice(), &[0, 1, 1]);
        assert_eq!(info.permutation.as_slice(), &[1, 0, 2]);
    }

    #[test]
    fn test_groups_are_independent() {
        // Modes {0, 2} symmetric, mode 1 free, mode 3 free.
        let sym = SymmetryDescriptor::from_groups(&[&[2, 0], &[1], &[3]]).unwrap();
        let info = get_unique_info(&sym, &[3, 0, 1, 0]).unwrap();
        assert!(!info.is_unique);
        assert_eq!(info.canonical.as_slice(), &[1, 0, 3, 0]);
        assert_eq!(info.permutation.as_slice(), &[2, 1, 0, 3]);
    }

    #[test]
    fn test_nonsymmetric_always_unique() {
        let sym = SymmetryDescriptor::nonsymmetric(3).unwrap();
        assert!(is_unique(&sym, &[2, 1, 0]).unwrap());
        assert_eq!(canonical_of(&sym, &[2, 1, 0]).unwrap().as_slice(), &[2, 1, 0]);
    }

    #[test]
    fn test_rejects_wrong_length() {
        let sym = SymmetryDescriptor::nonsymmetric(2).unwrap();
        assert!(matches!(
            get_unique_info(&sym, &[0]),
            Err(TensorError::ShapeMismatch { .. })
        ));
    }
}

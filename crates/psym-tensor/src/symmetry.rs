//! Symmetry descriptors: ordered groups of mutually interchangeable modes.

use std::fmt;

use crate::error::{Result, TensorError};
use crate::index_vec::{check_order, validate_permutation, ModeVec, MAX_ORDER};

/// Partition of the modes of an order-`d` tensor into symmetry groups.
///
/// `modes` is the concatenation, group by group, of each group's members.
/// A descriptor always satisfies `sum(group_lens) == order`, every group is
/// non-empty, and `modes` is a permutation of `0..order`.
///
/// # Example
///
/// ```
/// use psym_tensor::SymmetryDescriptor;
///
/// // Modes 0 and 2 are interchangeable, mode 1 stands alone.
/// let sym = SymmetryDescriptor::from_groups(&[&[0, 2], &[1]]).unwrap();
/// assert_eq!(sym.order(), 3);
/// assert_eq!(sym.group_of(2).unwrap(), 0);
/// assert_eq!(sym.group_mode_offset(1).unwrap(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SymmetryDescriptor {
    group_lens: ModeVec,
    modes: ModeVec,
}

impl SymmetryDescriptor {
    /// Create a descriptor from group lengths and the concatenated member list.
    pub fn new(group_lens: &[usize], modes: &[usize]) -> Result<Self> {
        check_order(modes.len(), MAX_ORDER)?;
        if group_lens.iter().any(|&l| l == 0) {
            return Err(TensorError::InvalidSymmetry(format!(
                "empty group in {:?}",
                group_lens
            )));
        }
        let total: usize = group_lens.iter().sum();
        if total != modes.len() {
            return Err(TensorError::InvalidSymmetry(format!(
                "group lengths {:?} sum to {} but {} modes were given",
                group_lens,
                total,
                modes.len()
            )));
        }
        validate_permutation(modes)
            .map_err(|_| TensorError::InvalidSymmetry(format!("modes {:?}", modes)))?;
        Ok(Self {
            group_lens: group_lens.iter().copied().collect(),
            modes: modes.iter().copied().collect(),
        })
    }

    /// Create a descriptor from explicit groups.
    ///
    /// Members are sorted ascending inside each group.
    pub fn from_groups(groups: &[&[usize]]) -> Result<Self> {
        let group_lens: ModeVec = groups.iter().map(|g| g.len()).collect();
        let mut modes = ModeVec::new();
        for group in groups {
            let start = modes.len();
            modes.extend(group.iter().copied());
            modes[start..].sort_unstable();
        }
        Self::new(&group_lens, &modes)
    }

    /// Every mode in its own group.
    pub fn nonsymmetric(order: usize) -> Result<Self> {
        check_order(order, MAX_ORDER)?;
        Ok(Self {
            group_lens: ModeVec::from_elem(1, order),
            modes: (0..order).collect(),
        })
    }

    /// All modes in one group.
    pub fn fully_symmetric(order: usize) -> Result<Self> {
        check_order(order, MAX_ORDER)?;
        let group_lens = if order == 0 {
            ModeVec::new()
        } else {
            ModeVec::from_elem(order, 1)
        };
        Ok(Self {
            group_lens,
            modes: (0..order).collect(),
        })
    }

    /// Number of modes.
    pub fn order(&self) -> usize {
        self.modes.len()
    }

    /// Number of symmetry groups.
    pub fn num_groups(&self) -> usize {
        self.group_lens.len()
    }

    /// Group lengths in group order.
    pub fn group_lens(&self) -> &[usize] {
        &self.group_lens
    }

    /// Concatenated group members.
    pub fn modes(&self) -> &[usize] {
        &self.modes
    }

    /// True if every group has a single member.
    pub fn is_nonsymmetric(&self) -> bool {
        self.group_lens.iter().all(|&l| l == 1)
    }

    /// Index of the group containing `mode`.
    pub fn group_of(&self, mode: usize) -> Result<usize> {
        let pos = self
            .modes
            .iter()
            .position(|&m| m == mode)
            .ok_or_else(|| {
                TensorError::SymmetryPrecondition(format!(
                    "mode {} is not a mode of an order-{} tensor",
                    mode,
                    self.order()
                ))
            })?;
        let mut end = 0;
        for (g, &len) in self.group_lens.iter().enumerate() {
            end += len;
            if pos < end {
                return Ok(g);
            }
        }
        unreachable!("group lengths cover every mode position")
    }

    /// Number of members of group `g`.
    pub fn group_size(&self, g: usize) -> Result<usize> {
        self.group_lens
            .get(g)
            .copied()
            .ok_or_else(|| self.no_such_group(g))
    }

    /// Position of group `g`'s first member in [`modes`](Self::modes).
    pub fn group_mode_offset(&self, g: usize) -> Result<usize> {
        if g >= self.num_groups() {
            return Err(self.no_such_group(g));
        }
        Ok(self.group_lens[..g].iter().sum())
    }

    /// Members of group `g` in descriptor order.
    pub fn group_modes(&self, g: usize) -> Result<&[usize]> {
        let start = self.group_mode_offset(g)?;
        Ok(&self.modes[start..start + self.group_lens[g]])
    }

    /// Iterate over the groups in order.
    pub fn groups(&self) -> impl Iterator<Item = &[usize]> + '_ {
        let mut start = 0;
        self.group_lens.iter().map(move |&len| {
            let group = &self.modes[start..start + len];
            start += len;
            group
        })
    }

    fn no_such_group(&self, g: usize) -> TensorError {
        TensorError::SymmetryPrecondition(format!(
            "group {} does not exist ({} groups)",
            g,
            self.num_groups()
        ))
    }

    /// Split the group containing `split_modes[0]` in two.
    ///
    /// The first new group holds exactly `split_modes` in the given order; the
    /// second holds the remaining members in their current order. Other groups
    /// are untouched. An empty `split_modes`, a size-1 group, or a split that
    /// names the whole group leaves the descriptor unchanged.
    ///
    /// # Errors
    /// [`TensorError::SymmetryPrecondition`] if the split modes do not all
    /// belong to one group or repeat a mode.
    pub fn split_group(&self, split_modes: &[usize]) -> Result<Self> {
        let Some(&first) = split_modes.first() else {
            return Ok(self.clone());
        };
        let g = self.group_of(first)?;
        for (i, &m) in split_modes.iter().enumerate() {
            if self.group_of(m)? != g {
                return Err(TensorError::SymmetryPrecondition(format!(
                    "mode {} is not in group {} with mode {}",
                    m, g, first
                )));
            }
            if split_modes[..i].contains(&m) {
                return Err(TensorError::SymmetryPrecondition(format!(
                    "mode {} repeated in split {:?}",
                    m, split_modes
                )));
            }
        }
        let len = self.group_lens[g];
        if len == 1 || split_modes.len() == len {
            return Ok(self.clone());
        }

        let start = self.group_mode_offset(g)?;
        let members = &self.modes[start..start + len];
        let mut modes = ModeVec::with_capacity(self.order());
        modes.extend_from_slice(&self.modes[..start]);
        modes.extend_from_slice(split_modes);
        modes.extend(members.iter().copied().filter(|m| !split_modes.contains(m)));
        modes.extend_from_slice(&self.modes[start + len..]);

        let mut group_lens = ModeVec::with_capacity(self.num_groups() + 1);
        group_lens.extend_from_slice(&self.group_lens[..g]);
        group_lens.push(split_modes.len());
        group_lens.push(len - split_modes.len());
        group_lens.extend_from_slice(&self.group_lens[g + 1..]);

        Ok(Self { group_lens, modes })
    }

    /// Weaken the symmetry to what survives a slice starting at `offset`.
    ///
    /// For every group whose members have a mixed zero / non-zero offset
    /// pattern, the non-zero members are split into their own group.
    /// All-zero and all-non-zero groups are kept whole.
    pub fn refine_by_slice_offset(&self, offset: &[usize]) -> Result<Self> {
        if offset.len() != self.order() {
            return Err(TensorError::ShapeMismatch {
                expected: vec![self.order()],
                actual: vec![offset.len()],
            });
        }
        let mut refined = self.clone();
        // Groups added by a split are uniform and never split again, so
        // walking the original group count is enough.
        let mut g = 0;
        while g < refined.num_groups() {
            let nonzero: ModeVec = refined
                .group_modes(g)?
                .iter()
                .copied()
                .filter(|&m| offset[m] != 0)
                .collect();
            let len = refined.group_lens[g];
            if !nonzero.is_empty() && nonzero.len() < len {
                refined = refined.split_group(&nonzero)?;
                g += 1;
            }
            g += 1;
        }
        Ok(refined)
    }

    /// Refine by the position of a view in a `[2; order]` partition grid.
    ///
    /// Bit `m` of `linear_offset` is the offset of mode `m`.
    pub fn refine_by_linear_offset(&self, linear_offset: usize) -> Result<Self> {
        let order = self.order();
        if order < usize::BITS as usize && linear_offset >> order != 0 {
            return Err(TensorError::IndexOutOfBounds {
                index: vec![linear_offset],
                shape: vec![1 << order],
            });
        }
        let offset: ModeVec = (0..order).map(|m| (linear_offset >> m) & 1).collect();
        self.refine_by_slice_offset(&offset)
    }
}

impl fmt::Display for SymmetryDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (g, group) in self.groups().enumerate() {
            if g > 0 {
                write!(f, " ")?;
            }
            write!(f, "{:?}", group)?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_validates() {
        assert!(SymmetryDescriptor::new(&[2, 1], &[0, 2, 1]).is_ok());
        assert!(SymmetryDescriptor::new(&[2, 2], &[0, 2, 1]).is_err());
        assert!(SymmetryDescriptor::new(&[2, 1], &[0, 0, 1]).is_err());
        assert!(SymmetryDescriptor::new(&[0, 3], &[0, 1, 2]).is_err());
        assert!(matches!(
            SymmetryDescriptor::nonsymmetric(MAX_ORDER + 1),
            Err(TensorError::OrderTooLarge { .. })
        ));
    }

    #[test]
    fn test_queries() {
        let sym = SymmetryDescriptor::from_groups(&[&[1], &[3, 0, 2]]).unwrap();
        assert_eq!(sym.modes(), &[1, 0, 2, 3]);
        assert_eq!(sym.num_groups(), 2);
        assert_eq!(sym.group_of(1).unwrap(), 0);
        assert_eq!(sym.group_of(3).unwrap(), 1);
        assert_eq!(sym.group_size(1).unwrap(), 3);
        assert_eq!(sym.group_mode_offset(0).unwrap(), 0);
        assert_eq!(sym.group_mode_offset(1).unwrap(), 1);
        assert_eq!(sym.group_modes(1).unwrap(), &[0, 2, 3]);
        assert!(sym.group_of(4).is_err());
        assert!(sym.group_size(2).is_err());
        assert_eq!(sym.to_string(), "[[1] [0, 2, 3]]");
    }

    #[test]
    fn test_constructors() {
        let ns = SymmetryDescriptor::nonsymmetric(3).unwrap();
        assert!(ns.is_nonsymmetric());
        assert_eq!(ns.group_lens(), &[1, 1, 1]);
        let fs = SymmetryDescriptor::fully_symmetric(3).unwrap();
        assert_eq!(fs.group_lens(), &[3]);
        assert!(!fs.is_nonsymmetric());
        assert_eq!(SymmetryDescriptor::fully_symmetric(0).unwrap().num_groups(), 0);
    }

    #[test]
    fn test_split_group() {
        let sym = SymmetryDescriptor::from_groups(&[&[0], &[1, 2, 3, 4]]).unwrap();
        let split = sym.split_group(&[3, 1]).unwrap();
        assert_eq!(split.group_lens(), &[1, 2, 2]);
        assert_eq!(split.modes(), &[0, 3, 1, 2, 4]);
    }

    #[test]
    fn test_split_group_noops() {
        let sym = SymmetryDescriptor::from_groups(&[&[0], &[1, 2]]).unwrap();
        assert_eq!(sym.split_group(&[]).unwrap(), sym);
        assert_eq!(sym.split_group(&[0]).unwrap(), sym);
        assert_eq!(sym.split_group(&[2, 1]).unwrap(), sym);
    }

    #[test]
    fn test_split_group_rejects_cross_group() {
        let sym = SymmetryDescriptor::from_groups(&[&[0, 1], &[2, 3]]).unwrap();
        assert!(matches!(
            sym.split_group(&[0, 2]),
            Err(TensorError::SymmetryPrecondition(_))
        ));
        assert!(sym.split_group(&[0, 0]).is_err());
    }

    #[test]
    fn test_refine_by_slice_offset() {
        let sym = SymmetryDescriptor::fully_symmetric(3).unwrap();
        assert_eq!(sym.refine_by_slice_offset(&[0, 0, 0]).unwrap(), sym);
        assert_eq!(sym.refine_by_slice_offset(&[2, 1, 4]).unwrap(), sym);

        let refined = sym.refine_by_slice_offset(&[0, 3, 0]).unwrap();
        assert_eq!(refined.group_lens(), &[1, 2]);
        assert_eq!(refined.modes(), &[1, 0, 2]);
    }

    #[test]
    fn test_refine_multiple_groups() {
        let sym = SymmetryDescriptor::from_groups(&[&[0, 1], &[2, 3]]).unwrap();
        let refined = sym.refine_by_slice_offset(&[1, 0, 0, 1]).unwrap();
        assert_eq!(refined.group_lens(), &[1, 1, 1, 1]);
        assert_eq!(refined.modes(), &[0, 1, 3, 2]);
    }

    #[test]
    fn test_refine_by_linear_offset() {
        let sym = SymmetryDescriptor::fully_symmetric(3).unwrap();
        // 0b010: only mode 1 is offset.
        let refined = sym.refine_by_linear_offset(2).unwrap();
        assert_eq!(refined, sym.refine_by_slice_offset(&[0, 1, 0]).unwrap());
        assert_eq!(sym.refine_by_linear_offset(0).unwrap(), sym);
        assert_eq!(sym.refine_by_linear_offset(7).unwrap(), sym);
        assert!(sym.refine_by_linear_offset(8).is_err());
    }
}

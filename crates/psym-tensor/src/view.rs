//! Tensor views and FLAME-style partitioning.
//!
//! A [`TensorView`] is a window onto a [`TensorBase`](crate::TensorBase):
//! logical shape, offset into the base, and the permutation from logical to
//! physical modes. Logical mode `i` of a view addresses physical mode
//! `permutation[i]` of its base at position `offset[i] + idx[i]`.
//!
//! Partitioning never touches storage. The resulting views are
//! [`Ownership::Aliased`] and carry the symmetry that survives their offset.

use crate::base::BaseId;
use crate::error::{Result, TensorError};
use crate::index_vec::{column_major_strides, linear_index, product, ModeVec};
use crate::odometer::MultiIndexIter;
use crate::symmetry::SymmetryDescriptor;

/// Whether a view is responsible for releasing its base.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// The canonical view; releases the base.
    Owning,
    /// Shares another view's base; never releases it.
    Aliased,
}

/// Which part receives the requested extent when partitioning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// The first part has the requested extent.
    Top,
    /// The second part has the requested extent.
    Bottom,
}

/// Logical window onto a base.
#[derive(Debug, Clone, PartialEq)]
pub struct TensorView {
    pub(crate) size: ModeVec,
    pub(crate) inner_size: ModeVec,
    pub(crate) offset: ModeVec,
    pub(crate) stride: ModeVec,
    pub(crate) permutation: ModeVec,
    pub(crate) ownership: Ownership,
    pub(crate) symmetry: SymmetryDescriptor,
    pub(crate) base: BaseId,
}

impl TensorView {
    /// Number of modes.
    pub fn order(&self) -> usize {
        self.size.len()
    }

    /// Logical extent per mode.
    pub fn size(&self) -> &[usize] {
        &self.size
    }

    /// Scalar extent per mode. Equal to [`size`](Self::size) unless the view
    /// is a blocked container.
    pub fn inner_size(&self) -> &[usize] {
        &self.inner_size
    }

    /// Offset into the base, per logical mode.
    pub fn offset(&self) -> &[usize] {
        &self.offset
    }

    /// Column-major stride of the logical shape.
    pub fn stride(&self) -> &[usize] {
        &self.stride
    }

    /// Logical to physical mode map.
    pub fn permutation(&self) -> &[usize] {
        &self.permutation
    }

    pub fn ownership(&self) -> Ownership {
        self.ownership
    }

    /// True for the view that owns its base.
    pub fn is_canonical(&self) -> bool {
        self.ownership == Ownership::Owning
    }

    pub fn symmetry(&self) -> &SymmetryDescriptor {
        &self.symmetry
    }

    /// Handle of the referenced base.
    pub fn base_id(&self) -> BaseId {
        self.base
    }

    /// Physical coordinate in the base of logical index `idx`.
    pub(crate) fn physical_index(&self, idx: &[usize]) -> ModeVec {
        let mut phys = ModeVec::from_elem(0, self.order());
        for (i, &p) in self.permutation.iter().enumerate() {
            phys[p] = self.offset[i] + idx[i];
        }
        phys
    }

    /// Split along `mode` into two adjacent views.
    ///
    /// With [`Side::Top`] the first part has extent `b`, with
    /// [`Side::Bottom`] the second part does. `b` is clamped to the extent.
    ///
    /// # Example
    ///
    /// ```
    /// use psym_tensor::{Side, TensorStore};
    ///
    /// let mut store = TensorStore::<f64>::new();
    /// let a = store.create_tensor_with_buffer(&[4, 3], None).unwrap();
    /// let (a1, a2) = a.part_1x2(0, 1, Side::Top).unwrap();
    /// assert_eq!(a1.size(), &[1, 3]);
    /// assert_eq!(a2.size(), &[3, 3]);
    /// assert_eq!(a2.offset(), &[1, 0]);
    /// ```
    pub fn part_1x2(&self, mode: usize, b: usize, side: Side) -> Result<(TensorView, TensorView)> {
        self.check_mode(mode)?;
        let extent = self.size[mode];
        let b = b.min(extent);
        let first = match side {
            Side::Top => b,
            Side::Bottom => extent - b,
        };

        let mut a1 = self.alias();
        a1.resize_mode(mode, first)?;
        a1.refine_symmetry()?;

        let mut a2 = self.alias();
        a2.resize_mode(mode, extent - first)?;
        a2.offset[mode] += first;
        a2.refine_symmetry()?;

        Ok((a1, a2))
    }

    /// Repartition a 1x2 split into 1x3, moving `b` along `mode`.
    ///
    /// [`Side::Top`] takes the last `b` of `at` as the middle part;
    /// [`Side::Bottom`] takes the first `b` of `ab`.
    pub fn repart_1x2_to_1x3(
        at: &TensorView,
        ab: &TensorView,
        mode: usize,
        b: usize,
        side: Side,
    ) -> Result<(TensorView, TensorView, TensorView)> {
        match side {
            Side::Top => {
                let (a0, a1) = at.part_1x2(mode, b, Side::Bottom)?;
                ab.check_mode(mode)?;
                Ok((a0, a1, ab.alias()))
            }
            Side::Bottom => {
                let (a1, a2) = ab.part_1x2(mode, b, Side::Top)?;
                at.check_mode(mode)?;
                Ok((at.alias(), a1, a2))
            }
        }
    }

    /// Collapse a 1x3 split back to 1x2 along `mode`.
    ///
    /// [`Side::Top`] merges the middle part into the second part;
    /// [`Side::Bottom`] merges it into the first.
    pub fn cont_with_1x3_to_1x2(
        a0: &TensorView,
        a1: &TensorView,
        a2: &TensorView,
        mode: usize,
        side: Side,
    ) -> Result<(TensorView, TensorView)> {
        match side {
            Side::Top => Ok((a0.alias(), Self::merge_1x2(a1, a2, mode)?)),
            Side::Bottom => Ok((Self::merge_1x2(a0, a1, mode)?, a2.alias())),
        }
    }

    /// Merge two adjacent views of the same base along `mode`.
    ///
    /// The merged view keeps the symmetry of `a1`.
    pub fn merge_1x2(a1: &TensorView, a2: &TensorView, mode: usize) -> Result<TensorView> {
        a1.check_mode(mode)?;
        let adjacent = a1.base == a2.base
            && a1.order() == a2.order()
            && a1.permutation == a2.permutation
            && a2.offset[mode] == a1.offset[mode] + a1.size[mode]
            && (0..a1.order())
                .filter(|&m| m != mode)
                .all(|m| a1.size[m] == a2.size[m] && a1.offset[m] == a2.offset[m]);
        if !adjacent {
            return Err(TensorError::InvalidPartition(format!(
                "views at offsets {:?} and {:?} are not adjacent along mode {}",
                a1.offset, a2.offset, mode
            )));
        }
        let mut merged = a1.alias();
        merged.resize_mode(mode, a1.size[mode] + a2.size[mode])?;
        merged.inner_size[mode] = a1.inner_size[mode] + a2.inner_size[mode];
        Ok(merged)
    }

    /// Split every mode in two.
    ///
    /// Returns `2^order` views indexed column-major over a `[2; order]`
    /// grid: bit `m` of the index selects the second half along mode `m`.
    pub fn part_2powm(&self, sizes: &[usize], sides: &[Side]) -> Result<Vec<TensorView>> {
        let order = self.order();
        if sizes.len() != order || sides.len() != order {
            return Err(TensorError::ShapeMismatch {
                expected: vec![order, order],
                actual: vec![sizes.len(), sides.len()],
            });
        }
        let mut parts = vec![self.alias()];
        for mode in 0..order {
            let mut upper = Vec::with_capacity(parts.len());
            for part in parts.iter_mut() {
                let (first, second) = part.part_1x2(mode, sizes[mode], sides[mode])?;
                *part = first;
                upper.push(second);
            }
            parts.extend(upper);
        }
        // Refine from the parent once rather than compounding the per-mode splits.
        for part in parts.iter_mut() {
            part.symmetry = self.symmetry.refine_by_slice_offset(&part.offset)?;
        }
        Ok(parts)
    }

    /// Repartition a `2^order` split into a `3^order` split.
    ///
    /// `parts` is laid out as [`part_2powm`](Self::part_2powm) returns it.
    /// Along each mode `m` in turn, every pair of parts is repartitioned as
    /// [`repart_1x2_to_1x3`](Self::repart_1x2_to_1x3) does with `sizes[m]`
    /// and `sides[m]`. The result is indexed column-major over `[3; order]`.
    pub fn repart_2powm_to_3powm(
        parts: &[TensorView],
        sizes: &[usize],
        sides: &[Side],
    ) -> Result<Vec<TensorView>> {
        let order = grid_order(parts, 2)?;
        if sizes.len() != order || sides.len() != order {
            return Err(TensorError::ShapeMismatch {
                expected: vec![order, order],
                actual: vec![sizes.len(), sides.len()],
            });
        }
        let mut shape = ModeVec::from_elem(2, order);
        let mut grid = parts.to_vec();
        for mode in 0..order {
            grid = regrid(&grid, &mut shape, mode, 3, |line| {
                let (a0, a1, a2) =
                    Self::repart_1x2_to_1x3(&line[0], &line[1], mode, sizes[mode], sides[mode])?;
                Ok(vec![a0, a1, a2])
            })?;
        }
        Ok(grid)
    }

    /// Collapse a `3^order` split back to `2^order`.
    ///
    /// Along each mode `m`, every triple is collapsed as
    /// [`cont_with_1x3_to_1x2`](Self::cont_with_1x3_to_1x2) does with
    /// `sides[m]`.
    pub fn cont_with_3powm_to_2powm(
        parts: &[TensorView],
        sides: &[Side],
    ) -> Result<Vec<TensorView>> {
        let order = grid_order(parts, 3)?;
        if sides.len() != order {
            return Err(TensorError::ShapeMismatch {
                expected: vec![order],
                actual: vec![sides.len()],
            });
        }
        let mut shape = ModeVec::from_elem(3, order);
        let mut grid = parts.to_vec();
        for mode in 0..order {
            grid = regrid(&grid, &mut shape, mode, 2, |line| {
                let (at, ab) =
                    Self::cont_with_1x3_to_1x2(&line[0], &line[1], &line[2], mode, sides[mode])?;
                Ok(vec![at, ab])
            })?;
        }
        Ok(grid)
    }

    /// Merge a `2^order` split back into one view.
    ///
    /// The merged view keeps the symmetry of `parts[0]`.
    pub fn merge_2powm(parts: &[TensorView]) -> Result<TensorView> {
        let order = grid_order(parts, 2)?;
        let mut shape = ModeVec::from_elem(2, order);
        let mut grid = parts.to_vec();
        for mode in 0..order {
            grid = regrid(&grid, &mut shape, mode, 1, |line| {
                Ok(vec![Self::merge_1x2(&line[0], &line[1], mode)?])
            })?;
        }
        grid.into_iter()
            .next()
            .ok_or_else(|| TensorError::InvalidPartition("empty partition".to_string()))
    }

    fn check_mode(&self, mode: usize) -> Result<()> {
        if mode >= self.order() {
            return Err(TensorError::InvalidPartition(format!(
                "mode {} out of range for order {}",
                mode,
                self.order()
            )));
        }
        Ok(())
    }

    fn alias(&self) -> TensorView {
        TensorView {
            ownership: Ownership::Aliased,
            ..self.clone()
        }
    }

    fn resize_mode(&mut self, mode: usize, extent: usize) -> Result<()> {
        let per_element = if self.size[mode] == 0 {
            1
        } else {
            self.inner_size[mode] / self.size[mode]
        };
        self.size[mode] = extent;
        self.inner_size[mode] = extent * per_element;
        self.stride = column_major_strides(&self.size)?;
        Ok(())
    }

    fn refine_symmetry(&mut self) -> Result<()> {
        self.symmetry = self.symmetry.refine_by_slice_offset(&self.offset)?;
        Ok(())
    }
}

/// Order of a partition grid holding `per_mode^order` parts.
fn grid_order(parts: &[TensorView], per_mode: usize) -> Result<usize> {
    let order = parts
        .first()
        .map(TensorView::order)
        .ok_or_else(|| TensorError::InvalidPartition("empty partition".to_string()))?;
    let expected = u32::try_from(order)
        .ok()
        .and_then(|exp| per_mode.checked_pow(exp));
    if expected != Some(parts.len()) || parts.iter().any(|p| p.order() != order) {
        return Err(TensorError::InvalidPartition(format!(
            "{} parts of order {} do not form a {}^{} grid",
            parts.len(),
            order,
            per_mode,
            order
        )));
    }
    Ok(order)
}

/// Replace every line of `grid` along `mode` by the parts `f` returns,
/// growing or shrinking that mode of `shape` to `to`.
fn regrid<F>(
    grid: &[TensorView],
    shape: &mut ModeVec,
    mode: usize,
    to: usize,
    mut f: F,
) -> Result<Vec<TensorView>>
where
    F: FnMut(&[TensorView]) -> Result<Vec<TensorView>>,
{
    let from = shape[mode];
    let old_stride = column_major_strides(shape)?;
    let mut lines = shape.clone();
    lines[mode] = 1;
    shape[mode] = to;
    let new_stride = column_major_strides(shape)?;

    let mut next: Vec<Option<TensorView>> = vec![None; product(shape)?];
    for coord in MultiIndexIter::new(&lines) {
        let src = linear_index(&coord, &old_stride);
        let line: Vec<TensorView> = (0..from)
            .map(|k| grid[src + k * old_stride[mode]].clone())
            .collect();
        let dst = linear_index(&coord, &new_stride);
        for (k, part) in f(&line)?.into_iter().take(to).enumerate() {
            next[dst + k * new_stride[mode]] = Some(part);
        }
    }
    next.into_iter()
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| TensorError::InvalidPartition("incomplete partition grid".to_string()))
}

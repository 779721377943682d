//! Partially-symmetric blocked tensors.
//!
//! Only canonical blocks (block coordinates already sorted inside every
//! symmetry group) get storage. Every other block is rebound to its
//! canonical block's base with the permutation that maps its modes onto
//! the canonical block's modes.

use tracing::{debug, trace};

use crate::alloc::{try_with_capacity, BufferAllocator};
use crate::base::BaseData;
use crate::error::{Result, TensorError};
use crate::index_vec::{
    column_major_strides, elementwise_quotient, linear_index, multiset_coefficient, product,
    ModeVec,
};
use crate::scalar::Scalar;
use crate::store::{check_symmetric_extents, TensorStore};
use crate::symmetry::SymmetryDescriptor;
use crate::unique::get_unique_info;
use crate::view::{Ownership, TensorView};

/// Number of canonical blocks of a grid with extents `blocked_size`.
///
/// Equals `prod_g C(n_g + L_g - 1, L_g)` for groups of length `L_g` over
/// `n_g` blocks.
///
/// # Example
///
/// ```
/// use psym_tensor::{unique_block_count, SymmetryDescriptor};
///
/// let sym = SymmetryDescriptor::fully_symmetric(2).unwrap();
/// assert_eq!(unique_block_count(&[2, 2], &sym).unwrap(), 3);
/// ```
pub fn unique_block_count(
    blocked_size: &[usize],
    symmetry: &SymmetryDescriptor,
) -> Result<usize> {
    check_symmetric_extents(symmetry, blocked_size)?;
    symmetry
        .groups()
        .try_fold(1usize, |acc, group| {
            multiset_coefficient(blocked_size[group[0]], group.len())
                .and_then(|count| acc.checked_mul(count))
        })
        .ok_or_else(|| TensorError::SizeOverflow {
            shape: blocked_size.to_vec(),
        })
}

/// One step of the attach plan.
enum Placement {
    /// Canonical block at this array position takes the next buffer.
    Store { position: usize },
    /// Block at `position` aliases the block at `canonical`.
    Alias {
        position: usize,
        canonical: usize,
        permutation: ModeVec,
    },
}

/// Checked attach: the container stride to install and one step per block
/// in enumeration order.
struct AttachPlan {
    stride: ModeVec,
    steps: Vec<Placement>,
}

impl<T: Scalar, A: BufferAllocator<T>> TensorStore<T, A> {
    /// Create a partially-symmetric blocked tensor whose blocks have no
    /// buffers yet.
    ///
    /// Modes of one group must share the flat extent and the block extent.
    pub fn create_blocked_psym_tensor_without_buffer(
        &mut self,
        flat_size: &[usize],
        block_size: &[usize],
        symmetry: SymmetryDescriptor,
    ) -> Result<TensorView> {
        let blocked_size = elementwise_quotient(flat_size, block_size)?;
        check_symmetric_extents(&symmetry, &blocked_size)?;
        check_symmetric_extents(&symmetry, block_size)?;
        self.build_blocked(flat_size, block_size, symmetry)
    }

    /// Create a partially-symmetric blocked tensor with storage for its
    /// canonical blocks only.
    ///
    /// # Example
    ///
    /// ```
    /// use psym_tensor::{SymmetryDescriptor, TensorStore};
    ///
    /// let mut store = TensorStore::<f64>::new();
    /// let sym = SymmetryDescriptor::fully_symmetric(2).unwrap();
    /// let t = store.create_blocked_psym_tensor(&[4, 4], None, &[2, 2], sym).unwrap();
    ///
    /// let upper = store.block(&t, &[0, 1]).unwrap().clone();
    /// let lower = store.block(&t, &[1, 0]).unwrap().clone();
    /// assert!(upper.is_canonical());
    /// assert!(!lower.is_canonical());
    /// assert_eq!(lower.base_id(), upper.base_id());
    /// assert_eq!(lower.permutation(), &[1, 0]);
    /// ```
    pub fn create_blocked_psym_tensor(
        &mut self,
        flat_size: &[usize],
        blocked_stride: Option<&[usize]>,
        block_size: &[usize],
        symmetry: SymmetryDescriptor,
    ) -> Result<TensorView> {
        let view =
            self.create_blocked_psym_tensor_without_buffer(flat_size, block_size, symmetry)?;
        let n_unique = unique_block_count(&view.size, &view.symmetry)?;
        let block_len = product(block_size)?;
        let lens = vec![block_len; n_unique];
        let staged = self
            .plan_psym_attach(&view, &lens, blocked_stride)
            .and_then(|plan| Ok((plan, self.allocate_many(n_unique, block_len)?)));
        match staged {
            Ok((plan, buffers)) => {
                self.apply_psym_attach(&view, plan, buffers)?;
                Ok(view)
            }
            Err(err) => {
                self.free_blocked_psym_tensor(view)?;
                Err(err)
            }
        }
    }

    /// Attach one buffer per canonical block and alias every other block.
    ///
    /// Buffers are consumed in block enumeration order. `stride`, when
    /// given, becomes the container's block-array layout. Every check runs
    /// before the container or any block changes.
    ///
    /// # Errors
    /// [`TensorError::BufferCountMismatch`] unless exactly one buffer per
    /// canonical block is supplied, and
    /// [`TensorError::SymmetryPrecondition`] if the enumeration order
    /// reaches a block before its canonical block.
    pub fn attach_buffers_psym(
        &mut self,
        view: &TensorView,
        buffers: Vec<Vec<T>>,
        stride: Option<&[usize]>,
    ) -> Result<()> {
        let lens: Vec<usize> = buffers.iter().map(Vec::len).collect();
        let plan = self.plan_psym_attach(view, &lens, stride)?;
        self.apply_psym_attach(view, plan, buffers)
    }

    /// Resolve every block coordinate against buffers of lengths `lens`
    /// under the candidate layout, without touching the store.
    fn plan_psym_attach(
        &self,
        view: &TensorView,
        lens: &[usize],
        stride: Option<&[usize]>,
    ) -> Result<AttachPlan> {
        let blocks = self.owned_blocks(view)?;
        let symmetry = &view.symmetry;
        let n_unique = unique_block_count(&view.size, symmetry)?;
        if lens.len() != n_unique {
            return Err(TensorError::BufferCountMismatch {
                expected: n_unique,
                actual: lens.len(),
            });
        }
        for block in blocks {
            if !block.is_canonical() || self.is_attached(block)? {
                return Err(TensorError::BufferAlreadyAttached);
            }
        }
        let stride = match stride {
            Some(stride) => self.check_container_stride(view, stride)?,
            None => self.base(view.base)?.stride.clone(),
        };

        let mut steps = try_with_capacity(blocks.len())?;
        let mut stored = vec![false; blocks.len()];
        let mut lens = lens.iter().copied();
        for coord in self.block_coords(view)? {
            let position = linear_index(&coord, &stride);
            let info = get_unique_info(symmetry, &coord)?;
            if info.is_unique {
                self.check_attachable(&blocks[position], lens.next().unwrap_or(0))?;
                stored[position] = true;
                steps.push(Placement::Store { position });
            } else {
                let canonical = linear_index(&info.canonical, &stride);
                if !stored[canonical] {
                    return Err(TensorError::SymmetryPrecondition(format!(
                        "block {:?} is visited before its canonical block {:?}",
                        coord.as_slice(),
                        info.canonical.as_slice()
                    )));
                }
                steps.push(Placement::Alias {
                    position,
                    canonical,
                    permutation: info.inverse_permutation,
                });
            }
        }
        Ok(AttachPlan { stride, steps })
    }

    /// Install a checked plan: the layout, the buffers, then the aliases.
    fn apply_psym_attach(
        &mut self,
        view: &TensorView,
        plan: AttachPlan,
        buffers: Vec<Vec<T>>,
    ) -> Result<()> {
        let mut blocks = self.owned_blocks(view)?.to_vec();
        let n_unique = buffers.len();
        self.base_mut(view.base)?.stride = plan.stride;

        let mut buffers = buffers.into_iter();
        for step in plan.steps {
            match step {
                Placement::Store { position } => {
                    let buffer = buffers.next().ok_or(TensorError::BufferCountMismatch {
                        expected: n_unique,
                        actual: 0,
                    })?;
                    self.attach_buffer(&blocks[position], buffer, None)?;
                }
                Placement::Alias {
                    position,
                    canonical,
                    permutation,
                } => {
                    let own = blocks[position].base;
                    self.release_base(own)?;
                    blocks[position] = alias_block(&blocks[canonical], &permutation)?;
                    trace!(
                        position,
                        canonical,
                        permutation = ?permutation.as_slice(),
                        "aliased block"
                    );
                }
            }
        }

        self.base_mut(view.base)?.data = BaseData::Tensor(blocks);
        debug!(
            base = %view.base,
            symmetry = %view.symmetry,
            n_unique,
            "attached psym buffers"
        );
        Ok(())
    }

    /// Release a partially-symmetric blocked tensor.
    ///
    /// Blocks are visited in enumeration order; each canonical block's base
    /// is released once and aliased blocks are skipped.
    pub fn free_blocked_psym_tensor(&mut self, view: TensorView) -> Result<()> {
        let blocks = self.owned_blocks(&view)?;
        let stride = &self.base(view.base)?.stride;
        let mut owned = Vec::new();
        for coord in self.block_coords(&view)? {
            let block = &blocks[linear_index(&coord, stride)];
            if block.is_canonical() {
                owned.push(block.base);
            }
        }
        self.release_blocks(&owned)?;
        self.release_base(view.base)?;
        debug!(base = %view.base, n_freed = owned.len(), "freed psym tensor");
        Ok(())
    }
}

/// View of `canonical`'s storage seen through `permutation`.
fn alias_block(canonical: &TensorView, permutation: &[usize]) -> Result<TensorView> {
    let size: ModeVec = permutation.iter().map(|&p| canonical.size[p]).collect();
    Ok(TensorView {
        inner_size: size.clone(),
        offset: ModeVec::from_elem(0, size.len()),
        stride: column_major_strides(&size)?,
        permutation: permutation.iter().copied().collect(),
        ownership: Ownership::Aliased,
        symmetry: canonical.symmetry.clone(),
        base: canonical.base,
        size,
    })
}

//! Random fills that respect a tensor's symmetry.

use rand::Rng;
use tracing::debug;

use crate::alloc::BufferAllocator;
use crate::base::BaseData;
use crate::error::{Result, TensorError};
use crate::index_vec::{linear_index, ModeVec};
use crate::odometer::MultiIndexIter;
use crate::scalar::Scalar;
use crate::store::TensorStore;
use crate::view::TensorView;

/// Per-mode random factors: `factors[m][i]` is the factor of index `i`
/// along mode `m`. Modes of one group share a vector.
fn group_factors<T: Scalar, R: Rng + ?Sized>(
    view: &TensorView,
    flat_size: &[usize],
    rng: &mut R,
) -> Result<Vec<Vec<T>>> {
    let mut factors = vec![Vec::new(); view.order()];
    for group in view.symmetry.groups() {
        let values: Vec<T> = (0..flat_size[group[0]])
            .map(|_| T::from_f64(rng.random()))
            .collect();
        for &m in group {
            if flat_size[m] != values.len() {
                return Err(TensorError::SymmetryPrecondition(format!(
                    "mode {} has extent {} but shares a group with extent {}",
                    m,
                    flat_size[m],
                    values.len()
                )));
            }
            factors[m] = values.clone();
        }
    }
    Ok(factors)
}

fn element<T: Scalar>(factors: &[Vec<T>], global: &[usize]) -> T {
    global
        .iter()
        .enumerate()
        .fold(T::one(), |acc, (m, &g)| acc * factors[m][g])
}

impl<T: Scalar, A: BufferAllocator<T>> TensorStore<T, A> {
    /// Fill a tensor with random values invariant under its symmetry.
    ///
    /// Each symmetry group draws one vector `v_g` uniform in `[0, 1)`; the
    /// element at global index `G` is the product over modes `m` of
    /// `v_group(m)[G[m]]`. For blocked tensors only canonical blocks are
    /// written, so aliased blocks read consistent values.
    ///
    /// # Example
    ///
    /// ```
    /// use psym_tensor::{SymmetryDescriptor, TensorStore};
    /// use rand::SeedableRng;
    /// use rand_chacha::ChaCha8Rng;
    ///
    /// let mut store = TensorStore::<f64>::new();
    /// let sym = SymmetryDescriptor::fully_symmetric(2).unwrap();
    /// let t = store.create_blocked_psym_tensor(&[4, 4], None, &[2, 2], sym).unwrap();
    /// store.fill_random_psym(&t, &mut ChaCha8Rng::seed_from_u64(1)).unwrap();
    /// let upper = store.get_flat(&t, &[0, 3]).unwrap();
    /// assert_eq!(upper, store.get_flat(&t, &[3, 0]).unwrap());
    /// ```
    pub fn fill_random_psym<R: Rng + ?Sized>(
        &mut self,
        view: &TensorView,
        rng: &mut R,
    ) -> Result<()> {
        if !view.is_canonical() {
            return Err(TensorError::NotOwning);
        }
        let base = self.base(view.base)?;
        let flat_size: ModeVec = base.inner_size.clone();
        let grid: ModeVec = base.size.clone();
        let grid_stride: ModeVec = base.stride.clone();
        let blocks = match &base.data {
            BaseData::Tensor(blocks) => Some(blocks.clone()),
            BaseData::Scalar(_) => None,
            BaseData::Unattached => return Err(TensorError::NoBuffer),
        };
        let factors = group_factors::<T, _>(view, &flat_size, rng)?;

        let Some(blocks) = blocks else {
            for idx in MultiIndexIter::new(view.size()) {
                let value = element(&factors, &idx);
                self.set(view, &idx, value)?;
            }
            return Ok(());
        };

        let mut filled = 0usize;
        for coord in MultiIndexIter::new(&grid) {
            let block = &blocks[linear_index(&coord, &grid_stride)];
            if !block.is_canonical() {
                continue;
            }
            let mut global = ModeVec::from_elem(0, coord.len());
            for local in MultiIndexIter::new(block.size()) {
                for m in 0..coord.len() {
                    global[m] = coord[m] * block.size[m] + local[m];
                }
                self.set(block, &local, element(&factors, &global))?;
            }
            filled += 1;
        }
        debug!(base = %view.base, filled, "filled canonical blocks");
        Ok(())
    }
}

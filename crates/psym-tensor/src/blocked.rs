//! Blocked tensors: a grid of uniform dense blocks behind one container.
//!
//! The container base holds the block array, laid out by the container
//! stride; each block is a dense tensor with its own base.

use tracing::debug;

use crate::alloc::{try_with_capacity, BufferAllocator};
use crate::base::{BaseData, BaseId};
use crate::error::{Result, TensorError};
use crate::index_vec::{
    check_in_bounds, check_same_len, column_major_strides, elementwise_quotient, linear_index,
    product, required_len, validate_stride, ModeVec,
};
use crate::odometer::MultiIndexIter;
use crate::scalar::Scalar;
use crate::store::TensorStore;
use crate::symmetry::SymmetryDescriptor;
use crate::view::TensorView;

impl<T: Scalar, A: BufferAllocator<T>> TensorStore<T, A> {
    /// Build the container and its bufferless blocks.
    pub(crate) fn build_blocked(
        &mut self,
        flat_size: &[usize],
        block_size: &[usize],
        symmetry: SymmetryDescriptor,
    ) -> Result<TensorView> {
        self.check_order(flat_size.len())?;
        let blocked_size = elementwise_quotient(flat_size, block_size)?;
        product(flat_size)?;
        let n_blocks = product(&blocked_size)?;
        let stride = column_major_strides(&blocked_size)?;

        let mut blocks = try_with_capacity(n_blocks)?;
        for _ in 0..n_blocks {
            blocks.push(self.create_tensor(block_size, None)?);
        }

        let mut view = self.new_view(
            &blocked_size,
            flat_size,
            stride,
            n_blocks,
            BaseData::Tensor(blocks),
        )?;
        view.symmetry = symmetry;
        debug!(
            base = %view.base,
            flat_size = ?flat_size,
            blocked_size = ?blocked_size.as_slice(),
            n_blocks,
            "built blocked container"
        );
        Ok(view)
    }

    /// Create a blocked tensor whose blocks have no buffers yet.
    ///
    /// Every `flat_size[m]` must be a multiple of `block_size[m]`.
    pub fn create_blocked_tensor_without_buffer(
        &mut self,
        flat_size: &[usize],
        block_size: &[usize],
    ) -> Result<TensorView> {
        let symmetry = SymmetryDescriptor::nonsymmetric(flat_size.len())?;
        self.build_blocked(flat_size, block_size, symmetry)
    }

    /// Create a blocked tensor and allocate one buffer per block.
    ///
    /// `blocked_stride` lays out the block array (column-major when `None`).
    ///
    /// # Example
    ///
    /// ```
    /// use psym_tensor::TensorStore;
    ///
    /// let mut store = TensorStore::<f64>::new();
    /// let t = store.create_blocked_tensor(&[4, 6], None, &[2, 3]).unwrap();
    /// assert_eq!(t.size(), &[2, 2]);
    /// assert_eq!(store.blocks(&t).unwrap().len(), 4);
    /// ```
    pub fn create_blocked_tensor(
        &mut self,
        flat_size: &[usize],
        blocked_stride: Option<&[usize]>,
        block_size: &[usize],
    ) -> Result<TensorView> {
        let view = self.create_blocked_tensor_without_buffer(flat_size, block_size)?;
        let n_blocks = product(&view.size)?;
        let block_len = product(block_size)?;
        let staged = blocked_stride
            .map(|stride| self.check_container_stride(&view, stride))
            .transpose()
            .and_then(|_| self.allocate_many(n_blocks, block_len));
        match staged {
            Ok(buffers) => {
                self.attach_buffers_to_blocked_tensor(&view, buffers, blocked_stride)?;
                Ok(view)
            }
            Err(err) => {
                self.free_blocked_tensor(view)?;
                Err(err)
            }
        }
    }

    /// Attach `buffers[i]` to the block at array position `i`.
    ///
    /// `stride`, when given, becomes the container's block-array layout.
    pub fn attach_buffers_to_blocked_tensor(
        &mut self,
        view: &TensorView,
        buffers: Vec<Vec<T>>,
        stride: Option<&[usize]>,
    ) -> Result<()> {
        let blocks = self.owned_blocks(view)?.to_vec();
        if buffers.len() != blocks.len() {
            return Err(TensorError::BufferCountMismatch {
                expected: blocks.len(),
                actual: buffers.len(),
            });
        }
        for (block, buffer) in blocks.iter().zip(&buffers) {
            self.check_attachable(block, buffer.len())?;
        }
        if let Some(stride) = stride {
            let stride = self.check_container_stride(view, stride)?;
            self.base_mut(view.base)?.stride = stride;
        }
        for (block, buffer) in blocks.iter().zip(buffers) {
            self.attach_buffer(block, buffer, None)?;
        }
        Ok(())
    }

    /// Release a blocked tensor: every owning block, then the container.
    ///
    /// Aliased blocks are skipped. Nothing is released if any owning block
    /// is already gone.
    pub fn free_blocked_tensor(&mut self, view: TensorView) -> Result<()> {
        let blocks = self.owned_blocks(&view)?.to_vec();
        let owned: Vec<BaseId> = blocks
            .iter()
            .filter(|b| b.is_canonical())
            .map(|b| b.base)
            .collect();
        self.release_blocks(&owned)?;
        self.release_base(view.base)?;
        debug!(base = %view.base, n_freed = owned.len(), "freed blocked tensor");
        Ok(())
    }

    pub(crate) fn release_blocks(&mut self, owned: &[BaseId]) -> Result<()> {
        if let Some(&missing) = owned.iter().find(|&&id| !self.contains(id)) {
            return Err(TensorError::StaleBase(missing));
        }
        for &id in owned {
            self.release_base(id)?;
        }
        Ok(())
    }

    /// Block array of a blocked view, in storage order.
    pub fn blocks(&self, view: &TensorView) -> Result<&[TensorView]> {
        match &self.base(view.base)?.data {
            BaseData::Tensor(blocks) => Ok(blocks),
            _ => Err(TensorError::NotBlocked),
        }
    }

    /// Block array of a container the view owns.
    pub(crate) fn owned_blocks(&self, view: &TensorView) -> Result<&[TensorView]> {
        if !view.is_canonical() {
            return Err(TensorError::NotOwning);
        }
        self.blocks(view)
    }

    /// Block at physical block coordinate `coord` of the view's container.
    pub fn block(&self, view: &TensorView, coord: &[usize]) -> Result<&TensorView> {
        let base = self.base(view.base)?;
        let blocks = match &base.data {
            BaseData::Tensor(blocks) => blocks,
            _ => return Err(TensorError::NotBlocked),
        };
        check_in_bounds(coord, &base.size)?;
        Ok(&blocks[linear_index(coord, &base.stride)])
    }

    /// Check a replacement block-array layout for a container.
    ///
    /// The stride must map the block grid one-to-one onto the array.
    pub(crate) fn check_container_stride(
        &self,
        view: &TensorView,
        stride: &[usize],
    ) -> Result<ModeVec> {
        let base = self.base(view.base)?;
        check_same_len(&base.size, stride)?;
        validate_stride(&base.size, stride)?;
        let reach = required_len(&base.size, stride)?;
        if reach != base.capacity {
            return Err(TensorError::InvalidStride(format!(
                "stride {:?} addresses {} blocks, container holds {}",
                stride, reach, base.capacity
            )));
        }
        Ok(stride.iter().copied().collect())
    }

    /// Check that a block can take a buffer of `len` elements.
    pub(crate) fn check_attachable(&self, block: &TensorView, len: usize) -> Result<()> {
        if !block.is_canonical() {
            return Err(TensorError::BufferAlreadyAttached);
        }
        let base = self.base(block.base)?;
        if base.is_attached() {
            return Err(TensorError::BufferAlreadyAttached);
        }
        let required = required_len(&base.size, &base.stride)?;
        if len < required {
            return Err(TensorError::BufferTooSmall {
                required,
                actual: len,
            });
        }
        Ok(())
    }

    /// Resolve scalar index `idx` of a blocked view to a block and its
    /// local index.
    pub(crate) fn locate_block(
        &self,
        view: &TensorView,
        idx: &[usize],
    ) -> Result<(TensorView, ModeVec)> {
        check_in_bounds(idx, &view.inner_size)?;
        let order = view.order();
        let mut coord = ModeVec::from_elem(0, order);
        let mut within = ModeVec::from_elem(0, order);
        for m in 0..order {
            let extent = view.inner_size[m] / view.size[m];
            coord[m] = idx[m] / extent;
            within[m] = idx[m] % extent;
        }
        let phys = view.physical_index(&coord);
        let block = self.block(view, &phys)?.clone();
        // The container's mode permutation applies inside the block too.
        let mut local = ModeVec::from_elem(0, order);
        for (i, &p) in view.permutation.iter().enumerate() {
            local[p] = within[i];
        }
        Ok((block, local))
    }

    /// Iterate over the physical block coordinates of a container with the
    /// configured direction.
    pub(crate) fn block_coords(&self, view: &TensorView) -> Result<MultiIndexIter> {
        let base = self.base(view.base)?;
        if !base.is_blocked() {
            return Err(TensorError::NotBlocked);
        }
        Ok(MultiIndexIter::with_order(
            &base.size,
            self.options().iteration_order,
        ))
    }
}

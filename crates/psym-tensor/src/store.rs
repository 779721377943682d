//! Arena owning every tensor base, plus dense builders and element access.
//!
//! Views refer to bases by [`BaseId`]. Only an [`Ownership::Owning`] view
//! can release its base, and a released id is never handed out again, so a
//! second release reports [`TensorError::StaleBase`] instead of touching
//! freed memory.

use std::collections::HashMap;

use tracing::debug;

use crate::alloc::{try_with_capacity, BufferAllocator, Global};
use crate::base::{BaseData, BaseId, TensorBase};
use crate::error::{Result, TensorError};
use crate::index_vec::{
    check_in_bounds, check_order, check_same_len, column_major_strides, identity_permutation,
    linear_index, multi_index, product, required_len, validate_stride, ModeVec,
};
use crate::options::StoreOptions;
use crate::scalar::Scalar;
use crate::symmetry::SymmetryDescriptor;
use crate::view::{Ownership, TensorView};

/// Owner of all tensor bases created through it.
///
/// # Example
///
/// ```
/// use psym_tensor::TensorStore;
///
/// let mut store = TensorStore::<f64>::new();
/// let t = store.create_tensor_with_buffer(&[2, 3], None).unwrap();
/// store.set(&t, &[1, 2], 4.0).unwrap();
/// assert_eq!(store.get(&t, &[1, 2]).unwrap(), 4.0);
/// store.free_tensor(t).unwrap();
/// assert_eq!(store.num_bases(), 0);
/// ```
#[derive(Debug)]
pub struct TensorStore<T: Scalar, A: BufferAllocator<T> = Global> {
    bases: HashMap<BaseId, TensorBase<T>>,
    next_id: u64,
    allocator: A,
    options: StoreOptions,
}

impl<T: Scalar> TensorStore<T, Global> {
    /// Create a store with default options and the global allocator.
    pub fn new() -> Self {
        Self {
            bases: HashMap::new(),
            next_id: 0,
            allocator: Global,
            options: StoreOptions::default(),
        }
    }

    /// Create a store with the global allocator.
    pub fn with_options(options: StoreOptions) -> Result<Self> {
        Self::with_allocator(Global, options)
    }
}

impl<T: Scalar> Default for TensorStore<T, Global> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Scalar, A: BufferAllocator<T>> TensorStore<T, A> {
    /// Create a store drawing buffers from `allocator`.
    pub fn with_allocator(allocator: A, options: StoreOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            bases: HashMap::new(),
            next_id: 0,
            allocator,
            options,
        })
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    pub fn allocator(&self) -> &A {
        &self.allocator
    }

    /// Number of live bases.
    pub fn num_bases(&self) -> usize {
        self.bases.len()
    }

    /// True if `id` refers to a live base.
    pub fn contains(&self, id: BaseId) -> bool {
        self.bases.contains_key(&id)
    }

    /// Look up a live base.
    pub fn base(&self, id: BaseId) -> Result<&TensorBase<T>> {
        self.bases.get(&id).ok_or(TensorError::StaleBase(id))
    }

    pub(crate) fn base_mut(&mut self, id: BaseId) -> Result<&mut TensorBase<T>> {
        self.bases.get_mut(&id).ok_or(TensorError::StaleBase(id))
    }

    pub(crate) fn insert_base(&mut self, base: TensorBase<T>) -> BaseId {
        let id = BaseId(self.next_id);
        self.next_id += 1;
        self.bases.insert(id, base);
        id
    }

    /// Remove a base and hand its scalar buffer back to the allocator.
    pub(crate) fn release_base(&mut self, id: BaseId) -> Result<()> {
        let base = self.bases.remove(&id).ok_or(TensorError::StaleBase(id))?;
        if let BaseData::Scalar(buffer) = base.data {
            self.allocator.release(buffer);
        }
        Ok(())
    }

    pub(crate) fn check_order(&self, order: usize) -> Result<()> {
        check_order(order, self.options.max_order)
    }

    pub(crate) fn allocate(&self, len: usize) -> Result<Vec<T>> {
        self.allocator
            .allocate(len, T::from_f64(self.options.fill_value))
    }

    /// Allocate `count` buffers of `len` elements.
    ///
    /// On failure every buffer already obtained goes back to the allocator.
    pub(crate) fn allocate_many(&self, count: usize, len: usize) -> Result<Vec<Vec<T>>> {
        let mut buffers = try_with_capacity(count)?;
        for _ in 0..count {
            match self.allocate(len) {
                Ok(buffer) => buffers.push(buffer),
                Err(err) => {
                    for buffer in buffers {
                        self.allocator.release(buffer);
                    }
                    return Err(err);
                }
            }
        }
        Ok(buffers)
    }

    /// Stride for a fresh base: the caller's, validated, or column-major.
    fn resolve_stride(size: &[usize], stride: Option<&[usize]>) -> Result<ModeVec> {
        match stride {
            Some(stride) => {
                validate_stride(size, stride)?;
                Ok(stride.iter().copied().collect())
            }
            None => column_major_strides(size),
        }
    }

    /// Register a base and return its owning, nonsymmetric view.
    pub(crate) fn new_view(
        &mut self,
        size: &[usize],
        inner_size: &[usize],
        stride: ModeVec,
        capacity: usize,
        data: BaseData<T>,
    ) -> Result<TensorView> {
        let order = size.len();
        let view_stride = column_major_strides(size)?;
        let symmetry = SymmetryDescriptor::nonsymmetric(order)?;
        let base = self.insert_base(TensorBase {
            size: size.iter().copied().collect(),
            inner_size: inner_size.iter().copied().collect(),
            stride,
            capacity,
            data,
        });
        Ok(TensorView {
            size: size.iter().copied().collect(),
            inner_size: inner_size.iter().copied().collect(),
            offset: ModeVec::from_elem(0, order),
            stride: view_stride,
            permutation: identity_permutation(order),
            ownership: Ownership::Owning,
            symmetry,
            base,
        })
    }

    /// Create a dense tensor without a buffer.
    ///
    /// The base records `stride` (column-major when `None`) and the capacity
    /// a buffer will need. Attach one with [`attach_buffer`](Self::attach_buffer).
    pub fn create_tensor(
        &mut self,
        size: &[usize],
        stride: Option<&[usize]>,
    ) -> Result<TensorView> {
        let (stride, capacity) = self.dense_layout(size, stride)?;
        self.new_view(size, size, stride, capacity, BaseData::Unattached)
    }

    /// Create a dense tensor and allocate its buffer.
    pub fn create_tensor_with_buffer(
        &mut self,
        size: &[usize],
        stride: Option<&[usize]>,
    ) -> Result<TensorView> {
        let (stride, capacity) = self.dense_layout(size, stride)?;
        let buffer = self.allocate(capacity)?;
        self.new_view(size, size, stride, capacity, BaseData::Scalar(buffer))
    }

    /// Validated base stride and buffer capacity of a dense tensor.
    fn dense_layout(&self, size: &[usize], stride: Option<&[usize]>) -> Result<(ModeVec, usize)> {
        self.check_order(size.len())?;
        let stride = Self::resolve_stride(size, stride)?;
        let capacity = required_len(size, &stride)?;
        Ok((stride, capacity))
    }

    /// Create a dense tensor carrying `symmetry`.
    ///
    /// Modes of one symmetry group must have equal extents.
    pub fn create_symmetric_tensor(
        &mut self,
        size: &[usize],
        stride: Option<&[usize]>,
        symmetry: SymmetryDescriptor,
    ) -> Result<TensorView> {
        check_symmetric_extents(&symmetry, size)?;
        let mut view = self.create_tensor_with_buffer(size, stride)?;
        view.symmetry = symmetry;
        Ok(view)
    }

    /// Bind a caller-supplied buffer to a bufferless dense tensor.
    ///
    /// `stride` replaces the recorded base stride when given.
    pub fn attach_buffer(
        &mut self,
        view: &TensorView,
        buffer: Vec<T>,
        stride: Option<&[usize]>,
    ) -> Result<()> {
        if !view.is_canonical() {
            return Err(TensorError::NotOwning);
        }
        let base = self.base_mut(view.base)?;
        match base.data {
            BaseData::Unattached => {}
            BaseData::Scalar(_) => return Err(TensorError::BufferAlreadyAttached),
            BaseData::Tensor(_) => return Err(TensorError::NotScalar),
        }
        let stride = match stride {
            Some(stride) => {
                check_same_len(&base.size, stride)?;
                validate_stride(&base.size, stride)?;
                stride.iter().copied().collect()
            }
            None => base.stride.clone(),
        };
        let required = required_len(&base.size, &stride)?;
        if buffer.len() < required {
            return Err(TensorError::BufferTooSmall {
                required,
                actual: buffer.len(),
            });
        }
        base.stride = stride;
        base.capacity = buffer.len();
        base.data = BaseData::Scalar(buffer);
        Ok(())
    }

    /// Release a dense tensor and its buffer.
    ///
    /// Only the owning view may release; blocked tensors go through
    /// [`free_blocked_tensor`](Self::free_blocked_tensor).
    pub fn free_tensor(&mut self, view: TensorView) -> Result<()> {
        if !view.is_canonical() {
            return Err(TensorError::NotOwning);
        }
        if self.base(view.base)?.is_blocked() {
            return Err(TensorError::NotScalar);
        }
        self.release_base(view.base)?;
        debug!(base = %view.base, size = ?view.size(), "freed tensor");
        Ok(())
    }

    /// True if the view's base has a buffer or block array.
    pub fn is_attached(&self, view: &TensorView) -> Result<bool> {
        Ok(self.base(view.base)?.is_attached())
    }

    /// Linear position of the view's first element inside its base buffer.
    pub fn buffer_offset(&self, view: &TensorView) -> Result<usize> {
        let base = self.base(view.base)?;
        Ok(view
            .permutation
            .iter()
            .zip(&view.offset)
            .map(|(&p, &o)| o * base.stride[p])
            .sum())
    }

    /// Scalar buffer behind a dense view.
    pub fn scalars(&self, view: &TensorView) -> Result<&[T]> {
        match &self.base(view.base)?.data {
            BaseData::Scalar(buffer) => Ok(buffer),
            BaseData::Unattached => Err(TensorError::NoBuffer),
            BaseData::Tensor(_) => Err(TensorError::NotScalar),
        }
    }

    /// Buffer position of logical index `idx` of a dense view.
    fn scalar_position(&self, view: &TensorView, idx: &[usize]) -> Result<usize> {
        check_in_bounds(idx, &view.size)?;
        let base = self.base(view.base)?;
        let len = match &base.data {
            BaseData::Scalar(buffer) => buffer.len(),
            BaseData::Unattached => return Err(TensorError::NoBuffer),
            BaseData::Tensor(_) => return Err(TensorError::NotScalar),
        };
        let phys = view.physical_index(idx);
        check_in_bounds(&phys, &base.size)?;
        let pos = linear_index(&phys, &base.stride);
        if pos >= len {
            return Err(TensorError::BufferTooSmall {
                required: pos + 1,
                actual: len,
            });
        }
        Ok(pos)
    }

    /// Read element `idx` of a dense view.
    pub fn get(&self, view: &TensorView, idx: &[usize]) -> Result<T> {
        let pos = self.scalar_position(view, idx)?;
        self.scalars(view).map(|buffer| buffer[pos])
    }

    /// Write element `idx` of a dense view.
    ///
    /// Every view sharing the base observes the write.
    pub fn set(&mut self, view: &TensorView, idx: &[usize], value: T) -> Result<()> {
        let pos = self.scalar_position(view, idx)?;
        match &mut self.base_mut(view.base)?.data {
            BaseData::Scalar(buffer) => {
                buffer[pos] = value;
                Ok(())
            }
            _ => Err(TensorError::NotScalar),
        }
    }

    /// Scalar extent of the view per mode.
    pub fn flat_size(&self, view: &TensorView) -> ModeVec {
        view.inner_size.clone()
    }

    /// Scalar extent of the view's whole base per mode.
    pub fn base_scalar_size(&self, view: &TensorView) -> Result<ModeVec> {
        Ok(self.base(view.base)?.inner_size.clone())
    }

    /// Read scalar element `idx` of any view, following block aliases.
    pub fn get_flat(&self, view: &TensorView, idx: &[usize]) -> Result<T> {
        match self.base(view.base)?.data {
            BaseData::Tensor(_) => {
                let (block, local) = self.locate_block(view, idx)?;
                self.get(&block, &local)
            }
            _ => self.get(view, idx),
        }
    }

    /// Write scalar element `idx` of any view, following block aliases.
    ///
    /// Writing through an aliased block writes its canonical block.
    pub fn set_flat(&mut self, view: &TensorView, idx: &[usize], value: T) -> Result<()> {
        match self.base(view.base)?.data {
            BaseData::Tensor(_) => {
                let (block, local) = self.locate_block(view, idx)?;
                self.set(&block, &local, value)
            }
            _ => self.set(view, idx, value),
        }
    }

    /// Materialize the view as a dense column-major vector.
    pub fn to_flat_vec(&self, view: &TensorView) -> Result<Vec<T>> {
        let size = &view.inner_size;
        let len = product(size)?;
        let mut out = try_with_capacity(len)?;
        for linear in 0..len {
            out.push(self.get_flat(view, &multi_index(linear, size))?);
        }
        Ok(out)
    }
}

/// Check that all modes of each group share one extent.
pub(crate) fn check_symmetric_extents(
    symmetry: &SymmetryDescriptor,
    size: &[usize],
) -> Result<()> {
    if symmetry.order() != size.len() {
        return Err(TensorError::ShapeMismatch {
            expected: vec![size.len()],
            actual: vec![symmetry.order()],
        });
    }
    for group in symmetry.groups() {
        let first = size[group[0]];
        if let Some(&m) = group.iter().find(|&&m| size[m] != first) {
            return Err(TensorError::SymmetryPrecondition(format!(
                "modes {} and {} share a group but have extents {} and {}",
                group[0], m, first, size[m]
            )));
        }
    }
    Ok(())
}

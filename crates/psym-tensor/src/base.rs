//! Storage records owned by the store.

use std::fmt;

use crate::index_vec::ModeVec;
use crate::view::TensorView;

/// Handle of a [`TensorBase`] inside a [`TensorStore`](crate::TensorStore).
///
/// Ids are never reused, so a handle to a released base stays invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BaseId(pub(crate) u64);

impl fmt::Display for BaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Contents of a base.
#[derive(Debug, Clone, PartialEq)]
pub enum BaseData<T> {
    /// No buffer attached yet.
    Unattached,
    /// Flat numeric buffer.
    Scalar(Vec<T>),
    /// Block array of a blocked tensor, indexed by the base stride.
    Tensor(Vec<TensorView>),
}

/// Physical storage record: shape, layout and buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct TensorBase<T> {
    pub(crate) size: ModeVec,
    pub(crate) inner_size: ModeVec,
    pub(crate) stride: ModeVec,
    pub(crate) capacity: usize,
    pub(crate) data: BaseData<T>,
}

impl<T> TensorBase<T> {
    /// Number of modes.
    pub fn order(&self) -> usize {
        self.size.len()
    }

    /// Physical extent per mode (blocks for a blocked base).
    pub fn size(&self) -> &[usize] {
        &self.size
    }

    /// Scalar extent per mode.
    pub fn inner_size(&self) -> &[usize] {
        &self.inner_size
    }

    /// Physical stride per mode.
    pub fn stride(&self) -> &[usize] {
        &self.stride
    }

    /// Number of elements (or blocks) the buffer holds.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn data(&self) -> &BaseData<T> {
        &self.data
    }

    /// True if a buffer or block array is attached.
    pub fn is_attached(&self) -> bool {
        !matches!(self.data, BaseData::Unattached)
    }

    /// True if this base holds a block array.
    pub fn is_blocked(&self) -> bool {
        matches!(self.data, BaseData::Tensor(_))
    }

    /// Scalar buffer, if any.
    pub fn scalars(&self) -> Option<&[T]> {
        match &self.data {
            BaseData::Scalar(buf) => Some(buf),
            _ => None,
        }
    }

    /// Block array, if any.
    pub fn blocks(&self) -> Option<&[TensorView]> {
        match &self.data {
            BaseData::Tensor(blocks) => Some(blocks),
            _ => None,
        }
    }
}

//! Blocked tensor storage with partial permutation symmetry.
//!
//! A tensor whose values are invariant under permuting some groups of modes
//! only needs one stored block per equivalence class of blocks. This crate
//! tiles a tensor into uniform blocks, stores the canonical block of each
//! class, and aliases every other block to it through a mode permutation.
//!
//! # Design
//!
//! - A [`TensorStore`] owns every [`TensorBase`] and hands out
//!   [`TensorView`]s that refer to bases by [`BaseId`]
//! - A view is either [`Ownership::Owning`] (releases its base) or
//!   [`Ownership::Aliased`] (shares another view's base)
//! - Buffers come from a pluggable [`BufferAllocator`]
//!
//! # Core Types
//!
//! - [`SymmetryDescriptor`]: groups of interchangeable modes
//! - [`MultiIndexIter`]: odometer over all coordinates of a box
//! - [`UniqueInfo`]: canonical representative of a block coordinate
//! - [`TensorStore`]: builders for dense, blocked and partially-symmetric
//!   blocked tensors, element access, text rendering and release
//!
//! # Example
//!
//! ```
//! use psym_tensor::{SymmetryDescriptor, TensorStore};
//!
//! // A symmetric 4x4 matrix split into 2x2 blocks stores 3 of its 4 blocks.
//! let mut store = TensorStore::<f64>::new();
//! let sym = SymmetryDescriptor::fully_symmetric(2).unwrap();
//! let t = store
//!     .create_blocked_psym_tensor(&[4, 4], None, &[2, 2], sym)
//!     .unwrap();
//!
//! store.set_flat(&t, &[0, 3], 1.5).unwrap();
//! assert_eq!(store.get_flat(&t, &[3, 0]).unwrap(), 1.5);
//!
//! store.free_blocked_psym_tensor(t).unwrap();
//! assert_eq!(store.num_bases(), 0);
//! ```

mod alloc;
mod base;
mod blocked;
mod error;
mod fill;
mod format;
mod index_vec;
mod odometer;
mod options;
mod psym;
mod scalar;
mod store;
mod symmetry;
mod unique;
mod view;


pub use alloc::{BufferAllocator, CountingAllocator, Global};
pub use base::{BaseData, BaseId, TensorBase};
pub use error::{Result, TensorError};
pub use index_vec::{
    binomial, column_major_strides, elementwise_product, elementwise_quotient,
    identity_permutation, invert_permutation, is_identity, linear_index, multi_index,
    multiset_coefficient, permute_array, product, required_len, validate_stride, ModeVec,
    MAX_ORDER,
};
pub use odometer::{IterationOrder, MultiIndexIter};
pub use options::StoreOptions;
pub use psym::unique_block_count;
pub use scalar::Scalar;
pub use store::TensorStore;
pub use symmetry::SymmetryDescriptor;
pub use unique::{canonical_of, get_unique_info, is_unique, UniqueInfo};
pub use view::{Ownership, Side, TensorView};

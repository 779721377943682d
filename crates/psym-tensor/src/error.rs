//! Error types for tensor construction, attachment and release.

use thiserror::Error;

use crate::base::BaseId;

/// Error type for tensor store operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TensorError {
    /// Requested order exceeds the supported maximum.
    #[error("Order {order} exceeds the maximum supported order {max}")]
    OrderTooLarge { order: usize, max: usize },

    /// Two per-mode arrays disagree in length or value.
    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// A flat extent is not a multiple of its block extent.
    #[error("Mode {mode}: size {size} is not divisible by block size {block}")]
    NotDivisible {
        mode: usize,
        size: usize,
        block: usize,
    },

    /// A block extent of zero was requested.
    #[error("Mode {mode}: block size must be positive")]
    ZeroExtent { mode: usize },

    /// The allocator could not provide a buffer.
    #[error("Failed to allocate a buffer of {len} elements")]
    AllocationFailed { len: usize },

    /// An element count or stride does not fit in `usize`.
    #[error("Shape {shape:?} overflows the addressable element count")]
    SizeOverflow { shape: Vec<usize> },

    /// Malformed symmetry descriptor.
    #[error("Invalid symmetry: {0}")]
    InvalidSymmetry(String),

    /// A symmetry operation was applied outside its preconditions.
    #[error("Symmetry precondition violated: {0}")]
    SymmetryPrecondition(String),

    /// Invalid permutation.
    #[error("Invalid permutation: {0}")]
    InvalidPermutation(String),

    /// Index is out of bounds.
    #[error("Index {index:?} out of bounds for shape {shape:?}")]
    IndexOutOfBounds {
        index: Vec<usize>,
        shape: Vec<usize>,
    },

    /// The base was already released or never existed in this store.
    #[error("Base {0} is not live in this store")]
    StaleBase(BaseId),

    /// The view already has a buffer attached.
    #[error("Buffer already attached")]
    BufferAlreadyAttached,

    /// The view has no buffer attached.
    #[error("No buffer attached")]
    NoBuffer,

    /// Operation requires a blocked tensor.
    #[error("Operation requires a blocked tensor")]
    NotBlocked,

    /// Operation requires a tensor of scalars.
    #[error("Operation requires a scalar (non-blocked) tensor")]
    NotScalar,

    /// Operation requires the owning view of a base.
    #[error("Operation requires the owning view of a base")]
    NotOwning,

    /// Number of supplied buffers does not match the number of stored blocks.
    #[error("Expected {expected} buffers, got {actual}")]
    BufferCountMismatch { expected: usize, actual: usize },

    /// Supplied buffer is too short for the requested layout.
    #[error("Buffer of {actual} elements is too small, {required} required")]
    BufferTooSmall { required: usize, actual: usize },

    /// Stride does not describe a valid layout.
    #[error("Invalid stride: {0}")]
    InvalidStride(String),

    /// Partition request does not fit the view.
    #[error("Invalid partition: {0}")]
    InvalidPartition(String),

    /// Invalid store configuration.
    #[error("Invalid options: {0}")]
    InvalidOptions(String),
}

/// Result type for tensor store operations.
pub type Result<T> = std::result::Result<T, TensorError>;

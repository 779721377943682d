//! Store configuration.

use crate::error::{Result, TensorError};
use crate::index_vec::MAX_ORDER;
use crate::odometer::IterationOrder;

/// Options for a [`TensorStore`](crate::TensorStore).
#[derive(Debug, Clone, PartialEq)]
pub struct StoreOptions {
    /// Largest tensor order the store accepts (at most [`MAX_ORDER`]).
    pub max_order: usize,
    /// Initial value of every buffer the store allocates.
    pub fill_value: f64,
    /// Direction used when enumerating block coordinates.
    pub iteration_order: IterationOrder,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            max_order: MAX_ORDER,
            fill_value: 0.0,
            iteration_order: IterationOrder::LastFastest,
        }
    }
}

impl StoreOptions {
    /// Set the maximum accepted order.
    pub fn with_max_order(mut self, max_order: usize) -> Self {
        self.max_order = max_order;
        self
    }

    /// Set the initial buffer value.
    pub fn with_fill_value(mut self, fill_value: f64) -> Self {
        self.fill_value = fill_value;
        self
    }

    /// Set the block enumeration direction.
    pub fn with_iteration_order(mut self, iteration_order: IterationOrder) -> Self {
        self.iteration_order = iteration_order;
        self
    }

    /// Check the options against compile-time limits.
    pub fn validate(&self) -> Result<()> {
        if self.max_order > MAX_ORDER {
            return Err(TensorError::InvalidOptions(format!(
                "max_order {} exceeds {}",
                self.max_order, MAX_ORDER
            )));
        }
        if !self.fill_value.is_finite() {
            return Err(TensorError::InvalidOptions(format!(
                "fill_value {} is not finite",
                self.fill_value
            )));
        }
        Ok(())
    }
}

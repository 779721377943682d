//! Multi-index enumeration over an order-`d` box.
//!
//! [`MultiIndexIter`] is the single odometer every builder and the release
//! path use to visit block coordinates.

use crate::index_vec::{product, ModeVec};

/// Which mode the odometer increments first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IterationOrder {
    /// Mode `order - 1` varies fastest (lexicographic order).
    #[default]
    LastFastest,
    /// Mode `0` varies fastest (colexicographic order).
    FirstFastest,
}

/// Lazy, finite, restartable enumeration of every coordinate in a box.
///
/// An order-0 box has exactly one (empty) coordinate. A box with any zero
/// extent has none.
///
/// # Example
///
/// ```
/// use psym_tensor::MultiIndexIter;
///
/// let coords: Vec<Vec<usize>> = MultiIndexIter::new(&[2, 2]).map(|c| c.to_vec()).collect();
/// assert_eq!(coords, vec![vec![0, 0], vec![0, 1], vec![1, 0], vec![1, 1]]);
/// ```
#[derive(Debug, Clone)]
pub struct MultiIndexIter {
    shape: ModeVec,
    order: IterationOrder,
    current: Option<ModeVec>,
    remaining: usize,
}

impl MultiIndexIter {
    /// Enumerate `shape` with the last mode varying fastest.
    pub fn new(shape: &[usize]) -> Self {
        Self::with_order(shape, IterationOrder::LastFastest)
    }

    /// Enumerate `shape` in the given direction.
    pub fn with_order(shape: &[usize], order: IterationOrder) -> Self {
        let mut iter = Self {
            shape: shape.iter().copied().collect(),
            order,
            current: None,
            remaining: 0,
        };
        iter.restart();
        iter
    }

    /// Rewind to the zero coordinate.
    ///
    /// Boxes holding more than `usize::MAX` coordinates report a saturated
    /// length.
    pub fn restart(&mut self) {
        self.remaining = product(&self.shape).unwrap_or(usize::MAX);
        self.current = if self.remaining == 0 {
            None
        } else {
            Some(ModeVec::from_elem(0, self.shape.len()))
        };
    }

    /// Shape being enumerated.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Enumeration direction.
    pub fn iteration_order(&self) -> IterationOrder {
        self.order
    }

    /// Increment with carry; returns false once the carry passes the slowest mode.
    fn advance(shape: &[usize], order: IterationOrder, idx: &mut ModeVec) -> bool {
        let d = shape.len();
        for step in 0..d {
            let m = match order {
                IterationOrder::LastFastest => d - 1 - step,
                IterationOrder::FirstFastest => step,
            };
            idx[m] += 1;
            if idx[m] < shape[m] {
                return true;
            }
            idx[m] = 0;
        }
        false
    }
}

impl Iterator for MultiIndexIter {
    type Item = ModeVec;

    fn next(&mut self) -> Option<ModeVec> {
        let out = self.current.clone()?;
        self.remaining -= 1;
        let keep = match self.current.as_mut() {
            Some(idx) => Self::advance(&self.shape, self.order, idx),
            None => false,
        };
        if !keep {
            self.current = None;
        }
        Some(out)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for MultiIndexIter {}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(iter: MultiIndexIter) -> Vec<Vec<usize>> {
        iter.map(|c| c.to_vec()).collect()
    }

    #[test]
    fn test_last_fastest() {
        let coords = collect(MultiIndexIter::new(&[2, 3]));
        assert_eq!(
            coords,
            vec![
                vec![0, 0],
                vec![0, 1],
                vec![0, 2],
                vec![1, 0],
                vec![1, 1],
                vec![1, 2]
            ]
        );
    }

    #[test]
    fn test_first_fastest() {
        let coords = collect(MultiIndexIter::with_order(
            &[2, 2],
            IterationOrder::FirstFastest,
        ));
        assert_eq!(
            coords,
            vec![vec![0, 0], vec![1, 0], vec![0, 1], vec![1, 1]]
        );
    }

    #[test]
    fn test_degenerate_shapes() {
        assert_eq!(collect(MultiIndexIter::new(&[])), vec![Vec::<usize>::new()]);
        assert!(collect(MultiIndexIter::new(&[3, 0, 2])).is_empty());
        assert_eq!(collect(MultiIndexIter::new(&[1, 1])), vec![vec![0, 0]]);
    }

    #[test]
    fn test_exact_size_and_restart() {
        let mut iter = MultiIndexIter::new(&[2, 3, 4]);
        assert_eq!(iter.len(), 24);
        iter.next();
        iter.next();
        assert_eq!(iter.len(), 22);
        assert_eq!(iter.by_ref().count(), 22);
        assert!(iter.next().is_none());
        iter.restart();
        assert_eq!(iter.next().map(|c| c.to_vec()), Some(vec![0, 0, 0]));
    }
}

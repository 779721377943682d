//! Per-mode index vectors and the arithmetic on them.
//!
//! Every per-mode array (sizes, strides, offsets, permutations, coordinates)
//! is a [`ModeVec`], an inline small vector sized for [`MAX_ORDER`] modes.
//! Orders above the maximum still work but spill to the heap; the store
//! rejects them up front with [`TensorError::OrderTooLarge`].

use smallvec::SmallVec;

use crate::error::{Result, TensorError};

/// Maximum tensor order supported by the store.
pub const MAX_ORDER: usize = 8;

/// Small vector holding one entry per mode.
pub type ModeVec = SmallVec<[usize; MAX_ORDER]>;

/// Check that `order` does not exceed `max`.
pub fn check_order(order: usize, max: usize) -> Result<()> {
    if order > max {
        return Err(TensorError::OrderTooLarge { order, max });
    }
    Ok(())
}

/// Check that two per-mode arrays have the same length.
pub(crate) fn check_same_len(expected: &[usize], actual: &[usize]) -> Result<()> {
    if expected.len() != actual.len() {
        return Err(TensorError::ShapeMismatch {
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        });
    }
    Ok(())
}

fn overflow(shape: &[usize]) -> TensorError {
    TensorError::SizeOverflow {
        shape: shape.to_vec(),
    }
}

/// Product of all entries (1 for an empty slice, 0 if any entry is 0).
///
/// # Errors
/// [`TensorError::SizeOverflow`] if the product does not fit in `usize`.
pub fn product(values: &[usize]) -> Result<usize> {
    if values.contains(&0) {
        return Ok(0);
    }
    values
        .iter()
        .try_fold(1usize, |acc, &v| acc.checked_mul(v))
        .ok_or_else(|| overflow(values))
}

/// Elementwise product `a[m] * b[m]`.
pub fn elementwise_product(a: &[usize], b: &[usize]) -> Result<ModeVec> {
    check_same_len(a, b)?;
    a.iter()
        .zip(b)
        .map(|(&x, &y)| x.checked_mul(y).ok_or_else(|| overflow(a)))
        .collect()
}

/// Elementwise exact quotient `a[m] / b[m]`.
///
/// # Errors
/// [`TensorError::ZeroExtent`] if any divisor is zero and
/// [`TensorError::NotDivisible`] if a division leaves a remainder.
pub fn elementwise_quotient(a: &[usize], b: &[usize]) -> Result<ModeVec> {
    check_same_len(a, b)?;
    a.iter()
        .zip(b)
        .enumerate()
        .map(|(mode, (&size, &block))| {
            if block == 0 {
                return Err(TensorError::ZeroExtent { mode });
            }
            if size % block != 0 {
                return Err(TensorError::NotDivisible { mode, size, block });
            }
            Ok(size / block)
        })
        .collect()
}

/// Generalized column-major strides: `stride[0] = 1`,
/// `stride[m] = stride[m-1] * size[m-1]`.
///
/// # Errors
/// [`TensorError::SizeOverflow`] if a stride or the total element count
/// does not fit in `usize`.
///
/// # Example
///
/// ```
/// use psym_tensor::column_major_strides;
///
/// assert_eq!(column_major_strides(&[2, 3, 4]).unwrap().as_slice(), &[1, 2, 6]);
/// assert!(column_major_strides(&[1 << 33, 1 << 33, 1 << 33]).is_err());
/// ```
pub fn column_major_strides(size: &[usize]) -> Result<ModeVec> {
    let mut stride = ModeVec::with_capacity(size.len());
    let mut acc = 1usize;
    for &s in size {
        stride.push(acc);
        acc = acc.checked_mul(s).ok_or_else(|| overflow(size))?;
    }
    Ok(stride)
}

/// Linear index `sum(idx[m] * stride[m])`.
pub fn linear_index(idx: &[usize], stride: &[usize]) -> usize {
    idx.iter().zip(stride).map(|(&i, &s)| i * s).sum()
}

/// Inverse of [`linear_index`] for column-major strides of `size`.
pub fn multi_index(mut linear: usize, size: &[usize]) -> ModeVec {
    let mut idx = ModeVec::with_capacity(size.len());
    for &s in size {
        if s == 0 {
            idx.push(0);
            continue;
        }
        idx.push(linear % s);
        linear /= s;
    }
    idx
}

/// Check that `idx` lies inside the box `size`.
pub fn check_in_bounds(idx: &[usize], size: &[usize]) -> Result<()> {
    if idx.len() != size.len() || idx.iter().zip(size).any(|(&i, &s)| i >= s) {
        return Err(TensorError::IndexOutOfBounds {
            index: idx.to_vec(),
            shape: size.to_vec(),
        });
    }
    Ok(())
}

/// Number of elements a buffer needs to hold every index of `size` under
/// `stride` (zero for an empty box).
///
/// # Errors
/// [`TensorError::SizeOverflow`] if the largest linear index does not fit
/// in `usize`.
pub fn required_len(size: &[usize], stride: &[usize]) -> Result<usize> {
    if size.contains(&0) {
        return Ok(0);
    }
    size.iter()
        .zip(stride)
        .try_fold(1usize, |acc, (&n, &s)| {
            (n - 1).checked_mul(s).and_then(|r| acc.checked_add(r))
        })
        .ok_or_else(|| overflow(size))
}

/// Check that `stride` maps the box `size` injectively into linear indices.
///
/// Modes of extent one are ignored. The remaining modes, ordered by stride,
/// must each step over the full extent of the previous one.
pub fn validate_stride(size: &[usize], stride: &[usize]) -> Result<()> {
    check_same_len(size, stride)?;
    if size.iter().any(|&s| s == 0) {
        return Ok(());
    }
    let mut modes: ModeVec = (0..size.len()).filter(|&m| size[m] > 1).collect();
    modes.sort_by_key(|&m| stride[m]);
    let mut reach = 1;
    for &m in &modes {
        if stride[m] < reach {
            return Err(TensorError::InvalidStride(format!(
                "stride {:?} overlaps for size {:?}",
                stride, size
            )));
        }
        reach = stride[m].saturating_mul(size[m]);
    }
    Ok(())
}

/// Identity permutation of length `order`.
pub fn identity_permutation(order: usize) -> ModeVec {
    (0..order).collect()
}

/// Check whether `perm` is the identity.
pub fn is_identity(perm: &[usize]) -> bool {
    perm.iter().enumerate().all(|(i, &p)| i == p)
}

/// Check that `perm` is a permutation of `0..perm.len()`.
pub fn validate_permutation(perm: &[usize]) -> Result<()> {
    let mut seen: ModeVec = SmallVec::from_elem(0, perm.len());
    for &p in perm {
        if p >= perm.len() || seen[p] != 0 {
            return Err(TensorError::InvalidPermutation(format!("{:?}", perm)));
        }
        seen[p] = 1;
    }
    Ok(())
}

/// Inverse permutation: `inv[perm[i]] = i`.
pub fn invert_permutation(perm: &[usize]) -> Result<ModeVec> {
    validate_permutation(perm)?;
    let mut inv: ModeVec = SmallVec::from_elem(0, perm.len());
    for (i, &p) in perm.iter().enumerate() {
        inv[p] = i;
    }
    Ok(inv)
}

/// Gather `values` through `perm`: `out[i] = values[perm[i]]`.
pub fn permute_array(values: &[usize], perm: &[usize]) -> Result<ModeVec> {
    check_same_len(values, perm)?;
    validate_permutation(perm)?;
    Ok(perm.iter().map(|&p| values[p]).collect())
}

/// Binomial coefficient `C(n, k)`, or `None` if an intermediate product
/// overflows.
pub fn binomial(n: usize, k: usize) -> Option<usize> {
    if k > n {
        return Some(0);
    }
    let k = k.min(n - k);
    // Each partial product is itself a binomial coefficient, so the
    // division is exact.
    (0..k).try_fold(1usize, |acc, i| acc.checked_mul(n - i).map(|p| p / (i + 1)))
}

/// Number of size-`k` multisets drawn from `n` values, `C(n + k - 1, k)`,
/// or `None` on overflow.
pub fn multiset_coefficient(n: usize, k: usize) -> Option<usize> {
    if k == 0 {
        return Some(1);
    }
    if n == 0 {
        return Some(0);
    }
    binomial(n.checked_add(k - 1)?, k)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_order() {
        assert!(check_order(MAX_ORDER, MAX_ORDER).is_ok());
        assert_eq!(
            check_order(MAX_ORDER + 1, MAX_ORDER),
            Err(TensorError::OrderTooLarge {
                order: MAX_ORDER + 1,
                max: MAX_ORDER
            })
        );
    }

    #[test]
    fn test_elementwise_ops() {
        assert_eq!(
            elementwise_product(&[2, 3], &[4, 5]).unwrap().as_slice(),
            &[8, 15]
        );
        assert_eq!(
            elementwise_quotient(&[4, 6], &[2, 3]).unwrap().as_slice(),
            &[2, 2]
        );
        assert!(matches!(
            elementwise_product(&[1], &[1, 2]),
            Err(TensorError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_quotient_rejects_remainder_and_zero() {
        assert_eq!(
            elementwise_quotient(&[4, 5], &[2, 2]),
            Err(TensorError::NotDivisible {
                mode: 1,
                size: 5,
                block: 2
            })
        );
        assert_eq!(
            elementwise_quotient(&[4], &[0]),
            Err(TensorError::ZeroExtent { mode: 0 })
        );
    }

    #[test]
    fn test_column_major_strides() {
        assert_eq!(column_major_strides(&[]).unwrap().as_slice(), &[] as &[usize]);
        assert_eq!(column_major_strides(&[5]).unwrap().as_slice(), &[1]);
        assert_eq!(
            column_major_strides(&[2, 3, 4]).unwrap().as_slice(),
            &[1, 2, 6]
        );
        assert_eq!(column_major_strides(&[0, 7]).unwrap().as_slice(), &[1, 0]);
    }

    #[test]
    fn test_column_major_strides_overflow() {
        let huge = [1usize << 33; 3];
        assert_eq!(
            column_major_strides(&huge),
            Err(TensorError::SizeOverflow {
                shape: huge.to_vec()
            })
        );
        // Strides fit but the element count does not.
        assert!(column_major_strides(&[2, usize::MAX]).is_err());
    }

    #[test]
    fn test_product_overflow() {
        assert_eq!(product(&[2, 3, 4]), Ok(24));
        assert_eq!(product(&[]), Ok(1));
        assert_eq!(product(&[usize::MAX, 0, 2]), Ok(0));
        assert!(matches!(
            product(&[1 << 40, 1 << 40]),
            Err(TensorError::SizeOverflow { .. })
        ));
        assert!(matches!(
            elementwise_product(&[1 << 40], &[1 << 40]),
            Err(TensorError::SizeOverflow { .. })
        ));
    }

    #[test]
    fn test_linear_multi_roundtrip() {
        let size = [2, 3, 4];
        let stride = column_major_strides(&size).unwrap();
        for linear in 0..product(&size).unwrap() {
            let idx = multi_index(linear, &size);
            assert_eq!(linear_index(&idx, &stride), linear);
        }
    }

    #[test]
    fn test_required_len() {
        assert_eq!(required_len(&[2, 3], &[1, 2]), Ok(6));
        assert_eq!(required_len(&[2, 3], &[1, 4]), Ok(10));
        assert_eq!(required_len(&[2, 0], &[1, 2]), Ok(0));
        assert_eq!(required_len(&[], &[]), Ok(1));
        assert!(matches!(
            required_len(&[3, 2], &[1, usize::MAX]),
            Err(TensorError::SizeOverflow { .. })
        ));
        assert!(matches!(
            required_len(&[2], &[usize::MAX]),
            Err(TensorError::SizeOverflow { .. })
        ));
    }

    #[test]
    fn test_validate_stride() {
        assert!(validate_stride(&[2, 3], &[1, 2]).is_ok());
        assert!(validate_stride(&[2, 3], &[3, 1]).is_ok());
        assert!(validate_stride(&[2, 3], &[1, 4]).is_ok());
        // Size-one modes may carry any stride.
        assert!(validate_stride(&[2, 1], &[1, 0]).is_ok());
        assert!(matches!(
            validate_stride(&[2, 3], &[1, 1]),
            Err(TensorError::InvalidStride(_))
        ));
    }

    #[test]
    fn test_permutations() {
        let perm = [2, 0, 1];
        let inv = invert_permutation(&perm).unwrap();
        assert_eq!(inv.as_slice(), &[1, 2, 0]);
        assert_eq!(
            permute_array(&[10, 20, 30], &perm).unwrap().as_slice(),
            &[30, 10, 20]
        );
        assert!(is_identity(&identity_permutation(4)));
        assert!(!is_identity(&perm));
        assert!(invert_permutation(&[0, 0]).is_err());
        assert!(invert_permutation(&[0, 2]).is_err());
    }

    #[test]
    fn test_binomial() {
        assert_eq!(binomial(5, 2), Some(10));
        assert_eq!(binomial(5, 0), Some(1));
        assert_eq!(binomial(2, 3), Some(0));
        assert_eq!(binomial(10, 7), Some(120));
        assert_eq!(binomial(usize::MAX, 3), None);
    }

    #[test]
    fn test_multiset_coefficient() {
        assert_eq!(multiset_coefficient(2, 2), Some(3));
        assert_eq!(multiset_coefficient(3, 3), Some(10));
        assert_eq!(multiset_coefficient(4, 1), Some(4));
        assert_eq!(multiset_coefficient(0, 0), Some(1));
        assert_eq!(multiset_coefficient(0, 2), Some(0));
        assert_eq!(multiset_coefficient(usize::MAX, 2), None);
    }
}

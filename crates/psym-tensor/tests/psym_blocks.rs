use anyhow::Result;
use approx::assert_relative_eq;
use num_complex::Complex64;
use psym_tensor::{
    get_unique_info, is_identity, unique_block_count, CountingAllocator, MultiIndexIter,
    Ownership, StoreOptions, SymmetryDescriptor, TensorStore, TensorView,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

#[test]
fn test_symmetric_matrix_two_by_two_blocks() -> Result<()> {
    let mut store = TensorStore::<f64>::new();
    let sym = SymmetryDescriptor::fully_symmetric(2)?;
    let t = store.create_blocked_psym_tensor(&[4, 4], None, &[2, 2], sym.clone())?;

    assert_eq!(t.size(), &[2, 2]);
    assert_eq!(unique_block_count(t.size(), &sym)?, 3);

    for coord in [[0, 0], [0, 1], [1, 1]] {
        let block = store.block(&t, &coord)?;
        assert_eq!(block.ownership(), Ownership::Owning);
        assert!(is_identity(block.permutation()));
    }
    let lower = store.block(&t, &[1, 0])?;
    let upper = store.block(&t, &[0, 1])?;
    assert_eq!(lower.ownership(), Ownership::Aliased);
    assert_eq!(lower.base_id(), upper.base_id());
    assert_eq!(lower.permutation(), &[1, 0]);

    let info = get_unique_info(&sym, &[1, 0])?;
    assert!(!info.is_unique);
    assert_eq!(info.canonical.as_slice(), &[0, 1]);
    assert_eq!(info.inverse_permutation.as_slice(), lower.permutation());

    store.free_blocked_psym_tensor(t)?;
    assert_eq!(store.num_bases(), 0);
    Ok(())
}

#[test]
fn test_counting_allocator_balances() -> Result<()> {
    let mut store =
        TensorStore::<f64, _>::with_allocator(CountingAllocator::new(), StoreOptions::default())?;
    let sym = SymmetryDescriptor::from_groups(&[&[0, 1, 3], &[2]])?;
    let t = store.create_blocked_psym_tensor(&[8, 8, 6, 8], None, &[2, 2, 3, 2], sym)?;

    // C(4 + 3 - 1, 3) * C(2, 1)
    let n_unique = 20 * 2;
    let n_blocks = 4 * 4 * 2 * 4;
    assert_eq!(store.blocks(&t)?.len(), n_blocks);
    assert_eq!(store.allocator().allocations(), n_unique);
    assert_eq!(store.allocator().allocated_elements(), n_unique * 24);

    store.free_blocked_psym_tensor(t)?;
    assert_eq!(store.allocator().releases(), n_unique);
    assert_eq!(store.allocator().released_elements(), n_unique * 24);
    assert_eq!(store.allocator().live(), 0);
    Ok(())
}

#[test]
fn test_flat_view_of_symmetric_tensor() -> Result<()> {
    let mut store = TensorStore::<f64>::new();
    let sym = SymmetryDescriptor::fully_symmetric(3)?;
    let t = store.create_blocked_psym_tensor(&[6, 6, 6], None, &[2, 2, 2], sym)?;
    store.fill_random_psym(&t, &mut ChaCha8Rng::seed_from_u64(5))?;

    let flat = store.to_flat_vec(&t)?;
    assert_eq!(flat.len(), 216);
    let at = |i: usize, j: usize, k: usize| flat[i + 6 * j + 36 * k];
    for i in 0..6 {
        for j in 0..6 {
            for k in 0..6 {
                let v = at(i, j, k);
                assert_relative_eq!(v, at(j, i, k));
                assert_relative_eq!(v, at(k, j, i));
                assert_relative_eq!(v, at(i, k, j));
            }
        }
    }
    Ok(())
}

#[test]
fn test_writes_through_alias_reach_canonical_block() -> Result<()> {
    let mut store = TensorStore::<f64>::new();
    let sym = SymmetryDescriptor::fully_symmetric(2)?;
    let t = store.create_blocked_psym_tensor(&[6, 6], None, &[3, 3], sym)?;

    // (4, 1) is in aliased block (1, 0).
    store.set_flat(&t, &[4, 1], 2.5)?;
    assert_eq!(store.get_flat(&t, &[1, 4])?, 2.5);

    let canonical = store.block(&t, &[0, 1])?.clone();
    assert_eq!(store.get(&canonical, &[1, 1])?, 2.5);
    Ok(())
}

#[test]
fn test_custom_block_stride() -> Result<()> {
    let mut store = TensorStore::<f64>::new();
    let sym = SymmetryDescriptor::fully_symmetric(2)?;
    // Row-major block array.
    let t = store.create_blocked_psym_tensor(&[6, 6], Some(&[3, 1]), &[2, 2], sym)?;

    let blocks = store.blocks(&t)?;
    let stored: Vec<bool> = blocks.iter().map(|b| b.is_canonical()).collect();
    // Row-major positions of (r, c): upper triangle stored.
    assert_eq!(
        stored,
        vec![true, true, true, false, true, true, false, false, true]
    );

    store.set_flat(&t, &[0, 5], 3.0)?;
    assert_eq!(store.get_flat(&t, &[5, 0])?, 3.0);
    store.free_blocked_psym_tensor(t)?;
    Ok(())
}

#[test]
fn test_complex_elements() -> Result<()> {
    let mut store = TensorStore::<Complex64>::new();
    let sym = SymmetryDescriptor::fully_symmetric(2)?;
    let t = store.create_blocked_psym_tensor(&[2, 2], None, &[1, 1], sym)?;
    store.set_flat(&t, &[0, 1], Complex64::new(1.0, -2.0))?;
    assert_eq!(store.get_flat(&t, &[1, 0])?, Complex64::new(1.0, -2.0));
    Ok(())
}

#[test]
fn test_unsorted_group_members_alias_like_sorted() -> Result<()> {
    let reversed = SymmetryDescriptor::new(&[2], &[1, 0])?;
    let split = SymmetryDescriptor::new(&[3], &[2, 0, 1])?.split_group(&[0])?;
    assert_eq!(split.modes(), &[0, 2, 1]);

    let cases = [
        (
            reversed,
            SymmetryDescriptor::fully_symmetric(2)?,
            vec![4, 4],
            vec![2, 2],
            (0, 1),
        ),
        (
            split,
            SymmetryDescriptor::from_groups(&[&[0], &[1, 2]])?,
            vec![2, 4, 4],
            vec![1, 2, 2],
            (1, 2),
        ),
    ];
    let stored = |blocks: &[TensorView]| -> Vec<bool> {
        blocks.iter().map(TensorView::is_canonical).collect()
    };
    for (unsorted, sorted, flat_size, block_size, (p, q)) in cases {
        let mut store = TensorStore::<f64>::new();
        let a = store.create_blocked_psym_tensor(&flat_size, None, &block_size, unsorted)?;
        let b = store.create_blocked_psym_tensor(&flat_size, None, &block_size, sorted)?;
        assert_eq!(stored(store.blocks(&a)?), stored(store.blocks(&b)?));

        for (n, idx) in MultiIndexIter::new(&flat_size).enumerate() {
            store.set_flat(&a, &idx, n as f64)?;
            store.set_flat(&b, &idx, n as f64)?;
        }
        assert_eq!(store.to_flat_vec(&a)?, store.to_flat_vec(&b)?);
        for idx in MultiIndexIter::new(&flat_size) {
            let mut mirrored = idx.clone();
            mirrored.swap(p, q);
            assert_eq!(store.get_flat(&a, &idx)?, store.get_flat(&a, &mirrored)?);
        }
    }
    Ok(())
}

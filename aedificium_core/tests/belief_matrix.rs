use aedificium_core::*;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

fn m(rows: &[&[f64]]) -> BeliefMatrix {
    BeliefMatrix::from_rows(rows.iter().map(|r| r.to_vec()).collect()).unwrap()
}

fn random_symmetric(rng: &mut ChaCha20Rng, n: usize, lo: f64) -> BeliefMatrix {
    let mut rows = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in i..n {
            let v = rng.gen_range(lo..1.0);
            rows[i][j] = v;
            rows[j][i] = v;
        }
    }
    BeliefMatrix::from_rows(rows).unwrap()
}

/// Symmetric with hard zeros. A random pairing of the rooms is always
/// present, so the live rows have a perfect matching.
fn random_sparse_symmetric(rng: &mut ChaCha20Rng, n: usize) -> BeliefMatrix {
    let mut rows = vec![vec![0.0; n]; n];
    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(rng);
    for pair in order.chunks(2) {
        let (a, b) = (pair[0], pair[pair.len() - 1]);
        let v = rng.gen_range(0.1..1.0);
        rows[a][b] = v;
        rows[b][a] = v;
    }
    for i in 0..n {
        for j in i..n {
            if rows[i][j] == 0.0 && rng.gen_bool(0.3) {
                let v = rng.gen_range(0.1..1.0);
                rows[i][j] = v;
                rows[j][i] = v;
            }
        }
    }
    BeliefMatrix::from_rows(rows).unwrap()
}

fn max_abs_diff(a: &BeliefMatrix, b: &BeliefMatrix) -> f64 {
    assert_eq!(a.size(), b.size());
    let mut worst = 0.0_f64;
    for i in 0..a.size() {
        for j in 0..a.size() {
            worst = worst.max((a.get(i, j) - b.get(i, j)).abs());
        }
    }
    worst
}

#[test]
fn sentinel_is_empty_and_degenerate() {
    let e = BeliefMatrix::empty();
    assert!(e.is_empty());
    assert_eq!(e.size(), 1);
    assert_eq!(e.entropy(), 0.0);
    assert!(!e.is_valid());
    assert_eq!(BeliefMatrix::create(0), e);
    assert_eq!(BeliefMatrix::default(), e);

    // A real 1x1 observation is not the sentinel.
    let one = m(&[&[0.7]]);
    assert!(!one.is_empty());
    assert!(one.is_valid());
}

#[test]
fn create_with_value_fills_every_entry() {
    let c = BeliefMatrix::create_with_value(3, 0.25);
    assert_eq!(c.size(), 3);
    assert_eq!(c.count_non_zero(), 9);
    assert!(c.row(1).iter().all(|&v| v == 0.25));
}

#[test]
fn from_rows_rejects_non_square() {
    assert_eq!(
        BeliefMatrix::from_rows(vec![vec![1.0, 0.0]]),
        Err(ExplorerError::NotSquare)
    );
    assert_eq!(BeliefMatrix::from_rows(vec![]), Err(ExplorerError::NotSquare));
}

#[test]
fn two_by_two_counts_and_validity() {
    let x = m(&[&[0.1, 0.9], &[0.9, 0.1]]);
    assert_eq!(x.count_non_zero(), 4);
    assert!(x.is_valid());
}

#[test]
fn merge_of_permutation_and_identity_is_symmetric_and_stochastic() {
    let a = m(&[&[0.0, 1.0], &[1.0, 0.0]]);
    let b = m(&[&[1.0, 0.0], &[0.0, 1.0]]);
    let r = a.merge(&b);
    for i in 0..2 {
        let sum: f64 = r.row(i).iter().sum();
        assert!((sum - 1.0).abs() < 1e-9, "row {i} sums to {sum}");
        for j in 0..2 {
            assert!((r.get(i, j) - r.get(j, i)).abs() < 1e-12);
        }
    }
}

#[test]
fn normalize_is_idempotent() {
    let mut rng = ChaCha20Rng::seed_from_u64(42);
    for n in 1..=7 {
        for _ in 0..5 {
            let mut once = random_symmetric(&mut rng, n, 0.01);
            once.soft_max_normalize();
            let mut twice = once.clone();
            twice.soft_max_normalize();
            assert!(max_abs_diff(&once, &twice) < 1e-9, "n = {n}");
        }
    }
}

#[test]
fn normalize_is_idempotent_with_hard_zeros() {
    let mut rng = ChaCha20Rng::seed_from_u64(43);
    for n in 1..=6 {
        for _ in 0..8 {
            let raw = random_sparse_symmetric(&mut rng, n);
            let mut once = raw.clone();
            once.soft_max_normalize();
            let mut twice = once.clone();
            twice.soft_max_normalize();
            assert!(max_abs_diff(&once, &twice) < 1e-9, "n = {n}: {raw}");
            for i in 0..n {
                let sum: f64 = once.row(i).iter().sum();
                assert!((sum - 1.0).abs() < 1e-9, "n = {n}, row {i} sums to {sum}");
                for j in 0..n {
                    assert_eq!(once.get(i, j), once.get(j, i));
                    if raw.get(i, j) == 0.0 {
                        assert_eq!(once.get(i, j), 0.0);
                    }
                }
            }
        }
    }
}

#[test]
fn self_loop_with_a_leaf_neighbour_is_a_fixed_point() {
    let mut x = BeliefMatrix::observations(2, [(0, 1, 1.0), (0, 1, 1.0), (0, 0, 1.0)]);
    x.soft_max_normalize();
    let mut y = x.clone();
    y.soft_max_normalize();
    assert!(max_abs_diff(&x, &y) < 1e-12);
    for i in 0..2 {
        assert!((x.row(i).iter().sum::<f64>() - 1.0).abs() < 1e-12);
    }
}

#[test]
fn normalized_rows_sum_to_one_and_stay_symmetric() {
    let mut rng = ChaCha20Rng::seed_from_u64(7);
    for n in 2..=6 {
        let mut x = random_symmetric(&mut rng, n, 0.05);
        x.soft_max_normalize();
        for i in 0..n {
            let sum: f64 = x.row(i).iter().sum();
            assert!((sum - 1.0).abs() < 1e-9);
            for j in 0..n {
                assert_eq!(x.get(i, j), x.get(j, i));
                assert!((0.0..=1.0).contains(&x.get(i, j)));
            }
        }
    }
}

#[test]
fn uniform_matrix_stays_uniform() {
    let mut x = BeliefMatrix::create_with_value(4, 3.0);
    x.soft_max_normalize();
    for i in 0..4 {
        for j in 0..4 {
            assert!((x.get(i, j) - 0.25).abs() < 1e-9);
        }
    }
}

#[test]
fn normalize_leaves_the_sentinel_alone() {
    let mut e = BeliefMatrix::empty();
    e.soft_max_normalize();
    assert!(e.is_empty());
}

#[test]
fn uniform_half_entropy_counts_upper_triangle() {
    for n in 1..=8 {
        let x = BeliefMatrix::create_with_value(n, 0.5);
        let expected = (n * (n + 1) / 2) as f64;
        assert!((x.entropy() - expected).abs() < 1e-9, "n = {n}");
    }
}

#[test]
fn entropy_is_never_negative() {
    let mut rng = ChaCha20Rng::seed_from_u64(3);
    for _ in 0..50 {
        let n = rng.gen_range(1..6);
        let x = random_symmetric(&mut rng, n, 0.0);
        assert!(x.entropy() >= 0.0);
        let mut y = x.clone();
        y.soft_max_normalize();
        assert!(y.entropy() >= 0.0);
    }
    // Hard zeros and ones are clipped rather than producing NaN.
    let hard = m(&[&[0.0, 1.0], &[1.0, 0.0]]);
    assert!(hard.entropy().is_finite());
    assert!(hard.entropy() >= 0.0);
}

#[test]
fn validity_requires_mass_in_every_row_and_column() {
    assert!(!m(&[&[0.0, 0.0], &[0.0, 1.0]]).is_valid());
    assert!(!m(&[&[1.0, 0.0, 0.0], &[0.0, 1.0, 0.0], &[0.0, 0.0, 0.0]]).is_valid());
    assert!(m(&[&[0.0, 1.0], &[1.0, 0.0]]).is_valid());
    assert!(BeliefMatrix::create_with_value(3, 0.2).is_valid());
    // Denormal mass sits below the floor.
    assert!(!m(&[&[1e-310, 0.0], &[0.0, 1.0]]).is_valid());
}

#[test]
fn merge_order_does_not_change_entropy() {
    let mut rng = ChaCha20Rng::seed_from_u64(11);
    for _ in 0..25 {
        let n = rng.gen_range(1..6);
        let a = random_symmetric(&mut rng, n, 0.0);
        let b = random_symmetric(&mut rng, n, 0.0);
        let ab = a.merge(&b);
        let ba = b.merge(&a);
        assert!((ab.entropy() - ba.entropy()).abs() < 1e-9);
    }
}

#[test]
fn merge_widens_the_smaller_operand() {
    let small = m(&[&[0.0, 1.0], &[1.0, 0.0]]);
    let evidence = BeliefMatrix::observation(3, 1, 2, 1.0);
    let r = small.merge(&evidence);
    assert_eq!(r.size(), 3);
    assert!(r.get(1, 2) > 0.0);
    assert_eq!(r.get(0, 2), 0.0);

    let from_empty = BeliefMatrix::empty().merge(&evidence);
    let mut expected = evidence.clone();
    expected.soft_max_normalize();
    assert_eq!(from_empty, expected);
}

#[test]
fn observations_accumulate_symmetrically() {
    let e = BeliefMatrix::observations(3, [(0, 1, 1.0), (1, 0, 2.0), (2, 2, 1.0), (5, 0, 1.0)]);
    assert_eq!(e.get(0, 1), 3.0);
    assert_eq!(e.get(1, 0), 3.0);
    assert_eq!(e.get(2, 2), 1.0);
    assert_eq!(e.count_non_zero(), 3);
}

#[test]
fn argmax_prefers_lowest_index_on_ties() {
    let x = m(&[&[0.4, 0.4, 0.2], &[0.4, 0.0, 0.6], &[0.2, 0.6, 0.2]]);
    assert_eq!(x.argmax_in_row(0), Some(0));
    assert_eq!(x.argmax_in_row(1), Some(2));
    assert_eq!(BeliefMatrix::create(2).argmax_in_row(0), None);
    assert_eq!(x.argmax_in_row(9), None);
}

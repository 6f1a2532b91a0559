use indexmap::IndexSet;

use crate::angmom::sh_sparsity::{
    molden_mls, nonzero_cart_tuples, nonzero_cart_tuples_pair,
    nonzero_hermite_tuples, ShSparsity,
};

#[test]
fn test_sh_sparsity_molden_mls() {
    assert_eq!(molden_mls(0), vec![0]);
    assert_eq!(molden_mls(1), vec![0, 1, -1]);
    assert_eq!(molden_mls(3), vec![0, 1, -1, 2, -2, 3, -3]);
    for l in 0..=6 {
        let mls = molden_mls(l);
        assert_eq!(mls.len(), 2 * l as usize + 1);
        assert_eq!(mls[1..], molden_mls(l + 1)[1..mls.len()]);
    }
}

#[test]
fn test_sh_sparsity_cart_p_d() {
    // ===
    // p
    // ===
    assert_eq!(
        nonzero_cart_tuples(1, 0).unwrap(),
        IndexSet::from([(0, 0, 1)])
    );
    assert_eq!(
        nonzero_cart_tuples(1, 1).unwrap(),
        IndexSet::from([(1, 0, 0)])
    );
    assert_eq!(
        nonzero_cart_tuples(1, -1).unwrap(),
        IndexSet::from([(0, 1, 0)])
    );

    // ===
    // d
    // ===
    let d0 = nonzero_cart_tuples(2, 0).unwrap();
    assert_eq!(
        d0.iter().copied().collect::<Vec<_>>(),
        vec![(2, 0, 0), (0, 2, 0), (0, 0, 2)]
    );
    assert_eq!(
        nonzero_cart_tuples(2, 1).unwrap(),
        IndexSet::from([(1, 0, 1)])
    );
    assert_eq!(
        nonzero_cart_tuples(2, -1).unwrap(),
        IndexSet::from([(0, 1, 1)])
    );
    let d2 = nonzero_cart_tuples(2, 2).unwrap();
    assert_eq!(
        d2.iter().copied().collect::<Vec<_>>(),
        vec![(2, 0, 0), (0, 2, 0)]
    );
    assert_eq!(
        nonzero_cart_tuples(2, -2).unwrap(),
        IndexSet::from([(1, 1, 0)])
    );
}

#[test]
fn test_sh_sparsity_cart_f() {
    let f3 = nonzero_cart_tuples(3, 3).unwrap();
    assert_eq!(
        f3.iter().copied().collect::<Vec<_>>(),
        vec![(3, 0, 0), (1, 2, 0)]
    );
    let fm3 = nonzero_cart_tuples(3, -3).unwrap();
    assert_eq!(
        fm3.iter().copied().collect::<Vec<_>>(),
        vec![(2, 1, 0), (0, 3, 0)]
    );
}

#[test]
fn test_sh_sparsity_cart_parity() {
    for l in 0..=8u32 {
        for m in molden_mls(l) {
            let tuples = nonzero_cart_tuples(l, m).unwrap();
            assert!(!tuples.is_empty());
            for (i, j, k) in tuples {
                assert_eq!(i + j + k, l);
                assert_eq!(j % 2 == 0, m >= 0);
                assert_eq!(k % 2, (l - m.unsigned_abs()) % 2);
            }
        }
    }
}

#[test]
fn test_sh_sparsity_cart_invalid_m() {
    assert!(nonzero_cart_tuples(1, 2).is_err());
    assert!(nonzero_cart_tuples(0, -1).is_err());
    assert!(nonzero_cart_tuples_pair(2, 0, 1, -2).is_err());
}

#[test]
fn test_sh_sparsity_hermite_closure() {
    let dxy = nonzero_cart_tuples(2, -2).unwrap();
    let dxy_herm = nonzero_hermite_tuples(&dxy);
    assert_eq!(
        dxy_herm.iter().copied().collect::<Vec<_>>(),
        vec![(0, 0, 0), (1, 0, 0), (0, 1, 0), (1, 1, 0)]
    );

    let s_herm = nonzero_hermite_tuples(&nonzero_cart_tuples(0, 0).unwrap());
    assert_eq!(s_herm, IndexSet::from([(0, 0, 0)]));

    for l in 0..=6u32 {
        for m in molden_mls(l) {
            let carts = nonzero_cart_tuples(l, m).unwrap();
            let herms = nonzero_hermite_tuples(&carts);
            assert!(carts.iter().all(|tuv| herms.contains(tuv)));
            assert!(herms.contains(&(0, 0, 0)));
            assert!(herms.iter().all(|(t, u, v)| t + u + v <= l));
        }
    }
}

#[test]
fn test_sh_sparsity_pair() {
    // p_x * p_y
    let pair = nonzero_cart_tuples_pair(1, 1, 1, -1).unwrap();
    assert_eq!(pair, IndexSet::from([(1, 1, 0)]));

    // d_xy * p_z
    let pair = nonzero_cart_tuples_pair(2, -2, 1, 0).unwrap();
    assert_eq!(pair, IndexSet::from([(1, 1, 1)]));

    // d_{x^2-y^2} * p_x
    let pair = nonzero_cart_tuples_pair(2, 2, 1, 1).unwrap();
    assert_eq!(
        pair.iter().copied().collect::<Vec<_>>(),
        vec![(3, 0, 0), (1, 2, 0)]
    );
}

#[test]
fn test_sh_sparsity_memo() {
    let sparsity = ShSparsity::new(4).unwrap();
    let dxy = sparsity.component(2, -2).unwrap();
    assert_eq!(dxy.hermite_positions(), vec![0, 1, 2, 5]);
    assert!(sparsity.component(5, 0).is_err());

    // p_x p_y on a pair: down-closure of (1, 1, 0).
    assert_eq!(
        sparsity.pair_hermite_positions(1, 1, 1, -1).unwrap(),
        vec![0, 1, 2, 5]
    );
}

#[test]
fn test_sh_sparsity_pair_positions_follow_pair_monomials() {
    let sparsity = ShSparsity::new(3).unwrap();
    for (la, lb) in [(1, 1), (2, 1), (3, 2)] {
        for (&ma, &mb) in itertools::iproduct!(molden_mls(la).iter(), molden_mls(lb).iter()) {
            let positions = sparsity.pair_hermite_positions(la, ma, lb, mb).unwrap();
            let expected = nonzero_hermite_tuples(
                &nonzero_cart_tuples_pair(la, ma, lb, mb).unwrap(),
            )
            .iter()
            .map(|tuv| crate::angmom::hermite::hermite_position(*tuv))
            .collect::<Vec<_>>();
            assert_eq!(positions, expected);
        }
    }
    assert!(sparsity.pair_hermite_positions(4, 0, 1, 0).is_err());
}

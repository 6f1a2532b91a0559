use approx::assert_abs_diff_eq;
use nalgebra::Vector3;
use ndarray::{Array2, Array3};

use crate::angmom::hermite::{hermite_position, hermite_tuples, HermiteTuple};
use crate::angmom::sh_sparsity::ShSparsity;
use crate::integrals::contraction::ContractionSide;
use crate::integrals::kernel::{
    generate_kernel, AngularMomenta, ContractionScheme, KernelFamily, KernelSpec, KernelVariant,
};
use crate::integrals::layout::{EcoeffsKind, VariantLayout};
use crate::integrals::program::{Buffer, StageKind, Workspace};
use crate::integrals::rints::rints_reference;

const FNX: [f64; 8] = [0.91, 0.47, 0.29, 0.2, 0.15, 0.12, 0.1, 0.085];
const ALPHA: f64 = 0.65;
const FAC: f64 = 1.2;
const A_OVER_P: f64 = 0.35;
const B_OVER_P: f64 = 0.65;
const C_OVER_Q: f64 = 0.4;
const UNITS: [HermiteTuple; 3] = [(1, 0, 0), (0, 1, 0), (0, 0, 1)];

fn xpq() -> Vector3<f64> {
    Vector3::new(0.3, -0.25, 0.45)
}

/// E-coefficients with non-zero values only where the solid-harmonic decomposition allows them.
/// The bra layout is `(n_sph, n_hermites)` and the ket layout is `(n_hermites, n_sph)`.
fn masked(side: &ContractionSide, sparsity: &ShSparsity, ket: bool, seed: f64) -> Array2<f64> {
    let sparse = side.sparse_hermite_positions(sparsity).unwrap();
    let (nh, ns) = (side.n_hermites(), side.n_sph());
    let value = |t: usize, s: usize| {
        if sparse[s].contains(&t) {
            ((5 * t + 3 * s + 1) as f64 * seed).sin()
        } else {
            0.0
        }
    };
    if ket {
        Array2::from_shape_fn((nh, ns), |(t, s)| value(t, s))
    } else {
        Array2::from_shape_fn((ns, nh), |(s, t)| value(t, s))
    }
}

struct Reference {
    bra: ContractionSide,
    ket: ContractionSide,
    e_bra: Array2<f64>,
    e_bra_deriv: Vec<Array2<f64>>,
    e_ket: Array2<f64>,
    e_ket_deriv: Vec<Array2<f64>>,
}

impl Reference {
    fn new(angmoms: AngularMomenta) -> Self {
        let sparsity = ShSparsity::new(angmoms.lmax()).unwrap();
        let bra = angmoms.bra();
        let ket = angmoms.ket();
        Self {
            bra,
            ket,
            e_bra: masked(&bra, &sparsity, false, 0.37),
            e_bra_deriv: [0.23, 0.61, 0.83]
                .map(|seed| masked(&bra, &sparsity, false, seed))
                .to_vec(),
            e_ket: masked(&ket, &sparsity, true, 0.29),
            e_ket_deriv: [0.17, 0.47, 0.71]
                .map(|seed| masked(&ket, &sparsity, true, seed))
                .to_vec(),
        }
    }

    /// The dense bra-by-ket R-integral block raised by `increment`.
    fn rints(&self, increment: HermiteTuple) -> Array2<f64> {
        let (dt, du, dv) = increment;
        let lbra = self.bra.hermite_degree();
        let lket = self.ket.hermite_degree();
        let r = rints_reference(lbra + lket + dt + du + dv, ALPHA, &FNX, &xpq()).unwrap();
        let bra_tuples = hermite_tuples(lbra);
        let ket_tuples = hermite_tuples(lket);
        Array2::from_shape_fn((bra_tuples.len(), ket_tuples.len()), |(i, j)| {
            let (tb, ub, vb) = bra_tuples[i];
            let (tk, uk, vk) = ket_tuples[j];
            let sign = if (tk + uk + vk) % 2 == 0 { 1.0 } else { -1.0 };
            sign * FAC * r[hermite_position((tb + tk + dt, ub + uk + du, vb + vk + dv))]
        })
    }

    fn plain(&self, increment: HermiteTuple) -> Array2<f64> {
        self.e_bra.dot(&self.rints(increment).dot(&self.e_ket))
    }

    /// Runs the generated kernel with the same inputs.
    fn run(&self, spec: &KernelSpec, scheme: ContractionScheme) -> Array3<f64> {
        let program = generate_kernel(spec, scheme).unwrap();
        let mut workspace = Workspace::builder()
            .alpha(ALPHA)
            .fac(FAC)
            .xpq(xpq())
            .a_over_p(A_OVER_P)
            .b_over_p(B_OVER_P)
            .c_over_q(C_OVER_Q)
            .build()
            .unwrap();
        let flatten = |arrays: &[Array2<f64>]| {
            arrays
                .iter()
                .flat_map(|array| array.iter().copied())
                .collect::<Vec<_>>()
        };
        workspace.set_buffer(Buffer::Fnx, FNX.to_vec());
        workspace.set_buffer(Buffer::EcoeffsBra, flatten(&[self.e_bra.clone()]));
        workspace.set_buffer(Buffer::EcoeffsBraDeriv, flatten(&self.e_bra_deriv));
        workspace.set_buffer(Buffer::EcoeffsKet, flatten(&[self.e_ket.clone()]));
        workspace.set_buffer(Buffer::EcoeffsKetDeriv, flatten(&self.e_ket_deriv));
        workspace.execute(&program).unwrap();
        workspace.batch(&program).unwrap()
    }
}

fn assert_batch_eq(batch: &Array3<f64>, expected: &[Array2<f64>]) {
    assert_eq!(batch.dim().0, expected.len());
    for (c, component) in expected.iter().enumerate() {
        assert_eq!(batch.dim().1, component.nrows());
        assert_eq!(batch.dim().2, component.ncols());
        for ((b, k), value) in component.indexed_iter() {
            assert_abs_diff_eq!(batch[[c, b, k]], *value, epsilon = 1e-10);
        }
    }
}

fn check(
    angmoms: AngularMomenta,
    variant: KernelVariant,
    expected: fn(&Reference) -> Vec<Array2<f64>>,
) {
    let spec = KernelSpec::new(angmoms, variant).unwrap();
    let reference = Reference::new(angmoms);
    let expected = expected(&reference);
    assert_eq!(expected.len(), spec.n_components());
    for scheme in [ContractionScheme::TwoStage, ContractionScheme::Shark] {
        assert_batch_eq(&reference.run(&spec, scheme), &expected);
    }
}

fn eri2_gradient(reference: &Reference) -> Vec<Array2<f64>> {
    let da = UNITS.map(|unit| reference.plain(unit)).to_vec();
    let db = da.iter().map(|block| block.mapv(|v| -v)).collect::<Vec<_>>();
    [da, db].concat()
}

fn eri2_hessian(reference: &Reference) -> Vec<Array2<f64>> {
    (0..36)
        .map(|n| {
            let (row, col) = (n / 6, n % 6);
            let (ti, ui, vi) = UNITS[row % 3];
            let (tj, uj, vj) = UNITS[col % 3];
            let sign = if (row < 3) == (col < 3) { 1.0 } else { -1.0 };
            sign * &reference.plain((ti + tj, ui + uj, vi + vj))
        })
        .collect()
}

fn eri3_gradient(reference: &Reference) -> Vec<Array2<f64>> {
    let r0_e = reference.rints((0, 0, 0)).dot(&reference.e_ket);
    let p = UNITS.map(|unit| reference.plain(unit));
    let s = [0, 1, 2].map(|i| reference.e_bra_deriv[i].dot(&r0_e));
    let da = [0, 1, 2].map(|i| A_OVER_P * &p[i] + &s[i]);
    let dc = [0, 1, 2].map(|i| p[i].mapv(|v| -v));
    let db = [0, 1, 2].map(|i| (&da[i] + &dc[i]).mapv(|v| -v));
    [da, db, dc].concat()
}

fn eri4_gradient(reference: &Reference) -> Vec<Array2<f64>> {
    let r0 = reference.rints((0, 0, 0));
    let r0_e = r0.dot(&reference.e_ket);
    let p = UNITS.map(|unit| reference.plain(unit));
    let s = [0, 1, 2].map(|i| reference.e_bra_deriv[i].dot(&r0_e));
    let t = [0, 1, 2].map(|i| {
        let x = r0.dot(&reference.e_ket_deriv[i])
            - C_OVER_Q * &reference.rints(UNITS[i]).dot(&reference.e_ket);
        reference.e_bra.dot(&x)
    });
    let da = [0, 1, 2].map(|i| A_OVER_P * &p[i] + &s[i]);
    let db = [0, 1, 2].map(|i| B_OVER_P * &p[i] - &s[i]);
    let dd = [0, 1, 2].map(|i| (&da[i] + &db[i] + &t[i]).mapv(|v| -v));
    [da, db, t, dd].concat()
}

fn spin_orbit(reference: &Reference) -> Vec<Array2<f64>> {
    let x = UNITS.map(|unit| reference.rints(unit).dot(&reference.e_ket));
    let de = &reference.e_bra_deriv;
    vec![
        de[1].dot(&x[2]) - de[2].dot(&x[1]),
        de[2].dot(&x[0]) - de[0].dot(&x[2]),
        de[0].dot(&x[1]) - de[1].dot(&x[0]),
    ]
}

#[test]
fn test_layout_eri2_derivatives() {
    check(AngularMomenta::Two(1, 2), KernelVariant::Deriv1, eri2_gradient);
    check(AngularMomenta::Two(0, 0), KernelVariant::Deriv1, eri2_gradient);
    check(AngularMomenta::Two(2, 1), KernelVariant::Deriv2, eri2_hessian);
    check(AngularMomenta::Two(0, 3), KernelVariant::Deriv2, eri2_hessian);
}

#[test]
fn test_layout_eri3_gradient() {
    check(AngularMomenta::Three(1, 0, 1), KernelVariant::Deriv1, eri3_gradient);
    check(AngularMomenta::Three(2, 1, 2), KernelVariant::Deriv1, eri3_gradient);
}

#[test]
fn test_layout_eri4_gradient() {
    check(AngularMomenta::Four(1, 0, 1, 0), KernelVariant::Deriv1, eri4_gradient);
    check(AngularMomenta::Four(1, 1, 2, 1), KernelVariant::Deriv1, eri4_gradient);
}

#[test]
fn test_layout_spin_orbit() {
    check(AngularMomenta::Three(1, 1, 1), KernelVariant::Soc, spin_orbit);
    check(AngularMomenta::Three(2, 0, 2), KernelVariant::Soc, spin_orbit);
    check(AngularMomenta::Four(1, 1, 1, 1), KernelVariant::Soc, spin_orbit);
}

#[test]
fn test_layout_spin_orbit_differs_from_gradient() {
    let angmoms = AngularMomenta::Three(1, 1, 2);
    let soc = generate_kernel(
        &KernelSpec::new(angmoms, KernelVariant::Soc).unwrap(),
        ContractionScheme::TwoStage,
    )
    .unwrap();
    let d1 = generate_kernel(
        &KernelSpec::new(angmoms, KernelVariant::Deriv1).unwrap(),
        ContractionScheme::TwoStage,
    )
    .unwrap();
    assert_ne!(soc.stages, d1.stages);
    assert_ne!(
        soc.stage(StageKind::ContractionBra),
        d1.stage(StageKind::ContractionBra)
    );
    // Every spin-orbit bra term reads the differentiated bra E-coefficients.
    assert!(soc
        .stage(StageKind::ContractionBra)
        .unwrap()
        .instructions
        .iter()
        .all(|ins| ins.slots()[1].buffer == Buffer::EcoeffsBraDeriv));
    assert!(!soc.buffer_sizes().contains_key(&Buffer::EcoeffsKetDeriv));
    assert!(d1.buffer_sizes().contains_key(&Buffer::EcoeffsBraDeriv));
}

#[test]
fn test_layout_structure() {
    let supported = [
        (KernelFamily::Eri2, KernelVariant::Base, 1, 1, 1),
        (KernelFamily::Eri2, KernelVariant::Deriv1, 3, 3, 6),
        (KernelFamily::Eri2, KernelVariant::Deriv2, 6, 6, 36),
        (KernelFamily::Eri3, KernelVariant::Base, 1, 1, 1),
        (KernelFamily::Eri3, KernelVariant::Deriv1, 4, 6, 9),
        (KernelFamily::Eri3, KernelVariant::Soc, 3, 6, 3),
        (KernelFamily::Eri4, KernelVariant::Base, 1, 1, 1),
        (KernelFamily::Eri4, KernelVariant::Deriv1, 4, 9, 12),
        (KernelFamily::Eri4, KernelVariant::Soc, 3, 6, 3),
    ];
    for (family, variant, n_rints_blocks, n_bra_terms, n_components) in supported {
        let layout = VariantLayout::new(family, variant).unwrap();
        assert_eq!(layout.rints_blocks.len(), n_rints_blocks);
        assert_eq!(layout.bra_terms.len(), n_bra_terms);
        assert_eq!(layout.n_components, n_components);
        if variant == KernelVariant::Base {
            assert_eq!(layout.bra_target(), Buffer::Batch);
        } else {
            assert_eq!(layout.bra_target(), Buffer::Partials);
        }
        // Every batch component is assembled by at least one update.
        for c in 0..n_components {
            assert!(variant == KernelVariant::Base
                || layout.batch_updates.iter().any(|update| update.dst == c));
        }
    }

    assert!(VariantLayout::new(KernelFamily::Eri3, KernelVariant::Deriv2).is_err());
    assert!(VariantLayout::new(KernelFamily::Eri4, KernelVariant::Deriv2).is_err());
    assert!(VariantLayout::new(KernelFamily::Eri2, KernelVariant::Soc).is_err());

    // Only the four-centre gradient differentiates the ket E-coefficients.
    let eri4 = VariantLayout::new(KernelFamily::Eri4, KernelVariant::Deriv1).unwrap();
    assert_eq!(
        eri4.ket_terms
            .iter()
            .filter(|term| matches!(term.ecoeffs, EcoeffsKind::Deriv(_)))
            .count(),
        3
    );
    assert_eq!(eri4.ket_updates.len(), 3);
    let eri3 = VariantLayout::new(KernelFamily::Eri3, KernelVariant::Deriv1).unwrap();
    assert!(eri3
        .ket_terms
        .iter()
        .all(|term| term.ecoeffs == EcoeffsKind::Plain));
    assert!(eri3.ket_updates.is_empty());
}

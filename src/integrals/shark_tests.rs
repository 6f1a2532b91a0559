use approx::assert_abs_diff_eq;
use nalgebra::Vector3;

use crate::angmom::sh_sparsity::ShSparsity;
use crate::integrals::contraction::{expected_stage1_count, ContractionSide};
use crate::integrals::kernel::{
    generate_kernel, AngularMomenta, ContractionScheme, KernelFamily, KernelSpec, KernelVariant,
};
use crate::integrals::layout::VariantLayout;
use crate::integrals::program::{Buffer, KernelProgram, StageKind, Workspace};
use crate::integrals::shark::{bra_final, bra_partial, generate_shark, ket, SharkStageKey};

const FNX: [f64; 8] = [0.91, 0.47, 0.29, 0.2, 0.15, 0.12, 0.1, 0.085];

fn run(program: &KernelProgram) -> Vec<f64> {
    let sizes = program.buffer_sizes();
    let pseudo = |n: usize, seed: f64| {
        (0..n)
            .map(|i| ((i as f64 + 1.0) * seed).cos())
            .collect::<Vec<_>>()
    };
    let mut workspace = Workspace::builder()
        .alpha(0.8)
        .fac(1.1)
        .xpq(Vector3::new(-0.2, 0.35, 0.15))
        .a_over_p(0.3)
        .b_over_p(0.7)
        .c_over_q(0.45)
        .build()
        .unwrap();
    workspace.set_buffer(Buffer::Fnx, FNX.to_vec());
    for (buffer, seed) in [
        (Buffer::EcoeffsBra, 0.53),
        (Buffer::EcoeffsBraDeriv, 0.41),
        (Buffer::EcoeffsKet, 0.29),
        (Buffer::EcoeffsKetDeriv, 0.17),
    ] {
        if let Some(&size) = sizes.get(&buffer) {
            workspace.set_buffer(buffer, pseudo(size, seed));
        }
    }
    workspace.execute(program).unwrap();
    workspace.buffer(Buffer::Batch).unwrap().to_vec()
}

#[test]
fn test_shark_matches_two_stage() {
    for (angmoms, variant) in [
        (AngularMomenta::Two(2, 1), KernelVariant::Base),
        (AngularMomenta::Two(1, 2), KernelVariant::Deriv1),
        (AngularMomenta::Two(1, 3), KernelVariant::Deriv2),
        (AngularMomenta::Three(2, 1, 1), KernelVariant::Base),
        (AngularMomenta::Three(1, 1, 2), KernelVariant::Deriv1),
        (AngularMomenta::Three(0, 1, 2), KernelVariant::Soc),
        (AngularMomenta::Four(1, 1, 1, 0), KernelVariant::Base),
        (AngularMomenta::Four(2, 1, 1, 1), KernelVariant::Deriv1),
    ] {
        let spec = KernelSpec::new(angmoms, variant).unwrap();
        let two_stage = generate_kernel(&spec, ContractionScheme::TwoStage).unwrap();
        let shark = generate_kernel(&spec, ContractionScheme::Shark).unwrap();
        assert_eq!(two_stage.buffer_sizes(), shark.buffer_sizes());

        let batch_two_stage = run(&two_stage);
        let batch_shark = run(&shark);
        assert_eq!(batch_two_stage.len(), batch_shark.len());
        for (a, b) in batch_two_stage.iter().zip(batch_shark.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-10);
        }
    }
}

#[test]
fn test_shark_stage_kinds() {
    let eri2 = KernelSpec::new(AngularMomenta::Two(2, 1), KernelVariant::Base).unwrap();
    let program = generate_kernel(&eri2, ContractionScheme::Shark).unwrap();
    assert_eq!(
        program.stages.iter().map(|stage| stage.kind).collect::<Vec<_>>(),
        vec![
            StageKind::RintsRecursion,
            StageKind::RintsRollout,
            StageKind::SharkKet,
            StageKind::SharkBraPartial,
        ]
    );

    let eri4 = KernelSpec::new(AngularMomenta::Four(2, 1, 1, 0), KernelVariant::Base).unwrap();
    let program = generate_kernel(&eri4, ContractionScheme::Shark).unwrap();
    assert_eq!(
        program.stages.iter().map(|stage| stage.kind).collect::<Vec<_>>(),
        vec![
            StageKind::RintsRecursion,
            StageKind::RintsRollout,
            StageKind::SharkKet,
            StageKind::SharkBraFinal,
        ]
    );

    let eri4_d1 =
        KernelSpec::new(AngularMomenta::Four(2, 1, 1, 0), KernelVariant::Deriv1).unwrap();
    let program = generate_kernel(&eri4_d1, ContractionScheme::Shark).unwrap();
    assert_eq!(
        program.stages.iter().map(|stage| stage.kind).collect::<Vec<_>>(),
        vec![
            StageKind::RintsRecursion,
            StageKind::RintsRollout,
            StageKind::SharkKet,
            StageKind::KetCombination,
            StageKind::SharkBraFinal,
            StageKind::BatchCombination,
        ]
    );
}

#[test]
fn test_shark_ket_shared_across_bra_pairs() {
    let sparsity = ShSparsity::new(3).unwrap();
    let ket_side = ContractionSide::Pair(1, 0);

    // Bra pairs (2, 1), (1, 2) and (3, 0) all have Hermite degree 3 and share one ket stage.
    let keys = [(2, 1), (1, 2), (3, 0)]
        .into_iter()
        .map(|(la, lb)| SharkStageKey::for_sides(&ContractionSide::Pair(la, lb), &ket_side)[0])
        .collect::<Vec<_>>();
    assert!(keys.iter().all(|key| *key == keys[0]));
    assert_eq!(keys[0].to_string(), "ket<3; P S>");

    let plain = VariantLayout::new(KernelFamily::Eri4, KernelVariant::Base).unwrap();
    let stage = ket(3, &ket_side, &plain, &sparsity).unwrap();
    assert_eq!(stage.kind, StageKind::SharkKet);
    assert_eq!(
        stage.n_accumulates(),
        expected_stage1_count(&ContractionSide::Pair(2, 1), &ket_side).unwrap()
    );

    let [_, bra_key] =
        SharkStageKey::for_sides(&ContractionSide::Shell(2), &ContractionSide::Shell(1));
    assert_eq!(bra_key, SharkStageKey::BraPartial { lbra: 2, lket: 1 });
}

#[test]
fn test_shark_invalid_layouts() {
    let sparsity = ShSparsity::new(2).unwrap();
    let plain = VariantLayout::new(KernelFamily::Eri2, KernelVariant::Base).unwrap();
    assert!(bra_final(
        &ContractionSide::Shell(1),
        &ContractionSide::Shell(1),
        &plain,
        &sparsity
    )
    .is_err());
    assert!(generate_shark(
        &ContractionSide::Shell(1),
        &ContractionSide::Pair(1, 1),
        &plain,
        &sparsity
    )
    .is_err());
    assert_eq!(
        bra_partial(2, 1, &plain, &sparsity).unwrap().kind,
        StageKind::SharkBraPartial
    );
}

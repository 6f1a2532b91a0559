use crate::integrals::contraction::ContractionSide;
use crate::integrals::kernel::{
    angmoms_from_label, angmoms_label, generate_kernel, AngularMomenta, ContractionScheme,
    KernelFamily, KernelSpec, KernelVariant,
};
use crate::integrals::program::{Buffer, StageKind};
use crate::permutation::OperandPermutation;

#[test]
fn test_kernel_variants_per_family() {
    assert!(KernelFamily::Eri2.supports(KernelVariant::Deriv2));
    assert!(!KernelFamily::Eri2.supports(KernelVariant::Soc));
    assert!(KernelFamily::Eri3.supports(KernelVariant::Soc));
    assert!(!KernelFamily::Eri3.supports(KernelVariant::Deriv2));
    assert!(KernelFamily::Eri4.supports(KernelVariant::Soc));
    assert!(!KernelFamily::Eri4.supports(KernelVariant::Deriv2));

    assert!(KernelSpec::new(AngularMomenta::Four(1, 0, 1, 0), KernelVariant::Deriv2).is_err());
    assert!(KernelSpec::new(AngularMomenta::Two(1, 0), KernelVariant::Soc).is_err());
    assert!(KernelSpec::new(AngularMomenta::Three(1, 0, 2), KernelVariant::Soc).is_ok());
    assert!(KernelSpec::new(AngularMomenta::Three(1, 0, 2), KernelVariant::Deriv2).is_err());
}

#[test]
fn test_kernel_n_components() {
    let n_components = |angmoms: AngularMomenta, variant: KernelVariant| {
        let spec = KernelSpec::new(angmoms, variant).unwrap();
        assert_eq!(spec.layout().unwrap().n_components, spec.n_components());
        spec.n_components()
    };
    assert_eq!(n_components(AngularMomenta::Two(1, 0), KernelVariant::Base), 1);
    assert_eq!(n_components(AngularMomenta::Two(1, 0), KernelVariant::Deriv1), 6);
    assert_eq!(n_components(AngularMomenta::Two(1, 0), KernelVariant::Deriv2), 36);
    assert_eq!(n_components(AngularMomenta::Three(1, 0, 2), KernelVariant::Deriv1), 9);
    assert_eq!(n_components(AngularMomenta::Three(1, 0, 2), KernelVariant::Soc), 3);
    assert_eq!(n_components(AngularMomenta::Four(1, 0, 2, 1), KernelVariant::Deriv1), 12);
    assert_eq!(n_components(AngularMomenta::Four(1, 0, 2, 1), KernelVariant::Soc), 3);
}

#[test]
fn test_kernel_angular_momenta() {
    let abcd = AngularMomenta::from_slice(&[2, 1, 1, 0]).unwrap();
    assert_eq!(abcd, AngularMomenta::Four(2, 1, 1, 0));
    assert_eq!(abcd.family(), KernelFamily::Eri4);
    assert_eq!(abcd.ltotal(), 4);
    assert_eq!(abcd.lmax(), 2);
    assert_eq!(abcd.bra(), ContractionSide::Pair(2, 1));
    assert_eq!(abcd.ket(), ContractionSide::Pair(1, 0));
    assert_eq!(abcd.to_string(), "(D P|P S)");
    assert_eq!(angmoms_label(&abcd), "DPPS");
    assert_eq!(angmoms_from_label("DPPS").unwrap(), abcd);
    assert_eq!(angmoms_from_label("gd").unwrap(), AngularMomenta::Two(4, 2));
    assert!(angmoms_from_label("DJ").is_err());
    assert!(angmoms_from_label("S").is_err());

    let abc = AngularMomenta::from_slice(&[0, 1, 3]).unwrap();
    assert_eq!(abc.bra(), ContractionSide::Pair(0, 1));
    assert_eq!(abc.ket(), ContractionSide::Shell(3));

    let ab = AngularMomenta::from_slice(&[4, 2]).unwrap();
    assert_eq!(ab.bra(), ContractionSide::Shell(4));
    assert_eq!(ab.to_string(), "(G|D)");

    assert!(AngularMomenta::from_slice(&[1]).is_err());
    assert!(AngularMomenta::from_slice(&[1, 1, 1, 1, 1]).is_err());

    let swap_bra = OperandPermutation::from_image(&[1, 0, 2, 3]).unwrap();
    assert_eq!(
        abcd.permute(&swap_bra).unwrap(),
        AngularMomenta::Four(1, 2, 1, 0)
    );
    assert!(abc.permute(&swap_bra).is_err());
}

#[test]
fn test_kernel_spec_naming() {
    let spec = KernelSpec::new(AngularMomenta::Four(2, 1, 1, 0), KernelVariant::Deriv1).unwrap();
    assert_eq!(spec.name(), "eri4_d1_2_1_1_0");
    assert_eq!(spec.to_string(), "ERI4 (D P|P S) [d1]");

    let spec = KernelSpec::new(AngularMomenta::Three(1, 1, 2), KernelVariant::Soc).unwrap();
    assert_eq!(spec.name(), "eri3_soc_1_1_2");
}

#[test]
fn test_kernel_generation_layout() {
    let spec = KernelSpec::new(AngularMomenta::Four(1, 1, 1, 0), KernelVariant::Deriv1).unwrap();
    let program = generate_kernel(&spec, ContractionScheme::TwoStage).unwrap();
    assert_eq!(program.spec, spec);
    assert_eq!(program.scheme, ContractionScheme::TwoStage);
    assert_eq!(
        program.stages.iter().map(|stage| stage.kind).collect::<Vec<_>>(),
        vec![
            StageKind::RintsRecursion,
            StageKind::RintsRollout,
            StageKind::ContractionKet,
            StageKind::KetCombination,
            StageKind::ContractionBra,
            StageKind::BatchCombination,
        ]
    );

    // Twelve gradient components of a (9 x 3) spherical batch; recursion up to degree 4.
    let sizes = program.buffer_sizes();
    assert_eq!(sizes[&Buffer::Batch], 12 * 9 * 3);
    assert_eq!(sizes[&Buffer::Partials], 9 * 9 * 3);
    assert_eq!(sizes[&Buffer::Fnx], 5);
    // Raised x, y, z blocks followed by the plain block.
    assert_eq!(sizes[&Buffer::Rints], 4 * 10 * 4);
    // Hermite tuples beyond the last non-zero ket coefficient are never read.
    assert_eq!(sizes[&Buffer::EcoeffsKet], 10);
    assert_eq!(sizes[&Buffer::EcoeffsKetDeriv], 2 * 4 * 3 + 10);
    assert!(sizes[&Buffer::EcoeffsBra] <= 9 * 10);
    assert!(sizes[&Buffer::EcoeffsBraDeriv] <= 3 * 9 * 10);
    assert_eq!(sizes[&Buffer::RintsXEcoeffs], 7 * 10 * 3);

    assert_eq!(program.stage(StageKind::KetCombination).unwrap().len(), 3 * 10 * 3);
    assert_eq!(
        program.stage(StageKind::BatchCombination).unwrap().len(),
        (5 * 3 + 3 * 3) * 9 * 3
    );
}

#[test]
fn test_kernel_generation_plain_has_no_combination() {
    let spec = KernelSpec::new(AngularMomenta::Three(2, 1, 1), KernelVariant::Base).unwrap();
    for scheme in [ContractionScheme::TwoStage, ContractionScheme::Shark] {
        let program = generate_kernel(&spec, scheme).unwrap();
        assert_eq!(program.stages.len(), 4);
        assert!(program.stage(StageKind::KetCombination).is_none());
        assert!(program.stage(StageKind::BatchCombination).is_none());
        let sizes = program.buffer_sizes();
        assert!(!sizes.contains_key(&Buffer::Partials));
        assert!(!sizes.contains_key(&Buffer::EcoeffsBraDeriv));
        assert!(!sizes.contains_key(&Buffer::EcoeffsKetDeriv));
    }
}

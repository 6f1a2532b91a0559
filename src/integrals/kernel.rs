//! Kernel specifications and the assembly of kernel programs.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::angmom::sh_sparsity::ShSparsity;
use crate::angmom::{angmom_label, ANGMOM_INDICES};
use crate::integrals::contraction::{self, ContractionSide};
use crate::integrals::layout::VariantLayout;
use crate::integrals::program::KernelProgram;
use crate::integrals::rints::generate_rints;
use crate::integrals::shark;
use crate::integrals::GenerationError;
use crate::permutation::OperandPermutation;

#[cfg(test)]
#[path = "kernel_tests.rs"]
mod kernel_tests;

// ------------
// KernelFamily
// ------------

/// Families of electron-repulsion integral kernels, by number of centres.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum KernelFamily {
    /// Two-centre integrals $`(a|b)`$.
    Eri2,

    /// Three-centre integrals $`(ab|c)`$.
    Eri3,

    /// Four-centre integrals $`(ab|cd)`$.
    Eri4,
}

impl KernelFamily {
    pub fn n_centres(&self) -> usize {
        match self {
            KernelFamily::Eri2 => 2,
            KernelFamily::Eri3 => 3,
            KernelFamily::Eri4 => 4,
        }
    }

    /// The kernel variants generated for this family.
    pub fn allowed_variants(&self) -> &'static [KernelVariant] {
        match self {
            KernelFamily::Eri2 => &[
                KernelVariant::Base,
                KernelVariant::Deriv1,
                KernelVariant::Deriv2,
            ],
            KernelFamily::Eri3 => &[
                KernelVariant::Base,
                KernelVariant::Deriv1,
                KernelVariant::Soc,
            ],
            KernelFamily::Eri4 => &[
                KernelVariant::Base,
                KernelVariant::Deriv1,
                KernelVariant::Soc,
            ],
        }
    }

    pub fn supports(&self, variant: KernelVariant) -> bool {
        self.allowed_variants().contains(&variant)
    }
}

impl fmt::Display for KernelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelFamily::Eri2 => write!(f, "ERI2"),
            KernelFamily::Eri3 => write!(f, "ERI3"),
            KernelFamily::Eri4 => write!(f, "ERI4"),
        }
    }
}

// -------------
// KernelVariant
// -------------

/// Variants of a kernel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum KernelVariant {
    /// Plain integrals.
    Base,

    /// First derivatives with respect to every centre.
    Deriv1,

    /// Second derivatives with respect to every pair of centres.
    Deriv2,

    /// Spin--orbit-coupling integrals.
    Soc,
}

impl fmt::Display for KernelVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelVariant::Base => write!(f, "base"),
            KernelVariant::Deriv1 => write!(f, "d1"),
            KernelVariant::Deriv2 => write!(f, "d2"),
            KernelVariant::Soc => write!(f, "soc"),
        }
    }
}

// -----------------
// ContractionScheme
// -----------------

/// Schemes for contracting R-integrals with E-coefficients.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContractionScheme {
    /// Ket contraction followed by bra contraction.
    #[default]
    TwoStage,

    /// SHARK factorisation with reusable ket and bra stages.
    Shark,
}

impl fmt::Display for ContractionScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContractionScheme::TwoStage => write!(f, "two-stage"),
            ContractionScheme::Shark => write!(f, "SHARK"),
        }
    }
}

// --------------
// AngularMomenta
// --------------

/// Angular momenta of the centres of a kernel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AngularMomenta {
    Two(u32, u32),
    Three(u32, u32, u32),
    Four(u32, u32, u32, u32),
}

impl AngularMomenta {
    /// Constructs angular momenta from a slice of two, three or four values.
    ///
    /// # Errors
    ///
    /// Errors if the slice does not hold two, three or four values.
    pub fn from_slice(ls: &[u32]) -> Result<Self, GenerationError> {
        match ls {
            [la, lb] => Ok(AngularMomenta::Two(*la, *lb)),
            [la, lb, lc] => Ok(AngularMomenta::Three(*la, *lb, *lc)),
            [la, lb, lc, ld] => Ok(AngularMomenta::Four(*la, *lb, *lc, *ld)),
            _ => Err(GenerationError(format!(
                "a kernel needs two, three or four angular momenta, but {ls:?} was given"
            ))),
        }
    }

    pub fn to_vec(&self) -> Vec<u32> {
        match self {
            AngularMomenta::Two(la, lb) => vec![*la, *lb],
            AngularMomenta::Three(la, lb, lc) => vec![*la, *lb, *lc],
            AngularMomenta::Four(la, lb, lc, ld) => vec![*la, *lb, *lc, *ld],
        }
    }

    pub fn family(&self) -> KernelFamily {
        match self {
            AngularMomenta::Two(..) => KernelFamily::Eri2,
            AngularMomenta::Three(..) => KernelFamily::Eri3,
            AngularMomenta::Four(..) => KernelFamily::Eri4,
        }
    }

    /// The total angular momentum.
    pub fn ltotal(&self) -> u32 {
        self.to_vec().iter().sum()
    }

    /// The largest angular momentum of a single centre.
    pub fn lmax(&self) -> u32 {
        self.to_vec().into_iter().max().unwrap_or(0)
    }

    /// The bra side of the contraction.
    pub fn bra(&self) -> ContractionSide {
        match self {
            AngularMomenta::Two(la, _) => ContractionSide::Shell(*la),
            AngularMomenta::Three(la, lb, _) | AngularMomenta::Four(la, lb, _, _) => {
                ContractionSide::Pair(*la, *lb)
            }
        }
    }

    /// The ket side of the contraction.
    pub fn ket(&self) -> ContractionSide {
        match self {
            AngularMomenta::Two(_, lb) => ContractionSide::Shell(*lb),
            AngularMomenta::Three(_, _, lc) => ContractionSide::Shell(*lc),
            AngularMomenta::Four(_, _, lc, ld) => ContractionSide::Pair(*lc, *ld),
        }
    }

    /// Relabels the centres with an operand permutation.
    ///
    /// # Errors
    ///
    /// Errors if the rank of the permutation does not match the number of centres.
    pub fn permute(&self, perm: &OperandPermutation) -> Result<Self, GenerationError> {
        Self::from_slice(&perm.apply(&self.to_vec())?)
    }
}

impl fmt::Display for AngularMomenta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}|{})", self.bra(), self.ket())
    }
}

// ----------
// KernelSpec
// ----------

/// Identification of a single generated kernel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct KernelSpec {
    pub angmoms: AngularMomenta,
    pub variant: KernelVariant,
}

impl KernelSpec {
    /// Constructs a kernel specification.
    ///
    /// # Errors
    ///
    /// Errors if the family of the angular momenta does not support the variant.
    pub fn new(angmoms: AngularMomenta, variant: KernelVariant) -> Result<Self, GenerationError> {
        let family = angmoms.family();
        if !family.supports(variant) {
            return Err(GenerationError(format!(
                "{family} kernels do not have a `{variant}` variant"
            )));
        }
        Ok(Self { angmoms, variant })
    }

    pub fn family(&self) -> KernelFamily {
        self.angmoms.family()
    }

    /// The block layout of this kernel's variant.
    ///
    /// # Errors
    ///
    /// Errors if the family of the angular momenta does not support the variant.
    pub fn layout(&self) -> Result<VariantLayout, GenerationError> {
        VariantLayout::new(self.family(), self.variant)
    }

    /// The number of components in the batch of this kernel: one for plain integrals, three
    /// Cartesian components per centre for first derivatives, the full Hessian over those for
    /// second derivatives, and three for spin--orbit coupling.
    pub fn n_components(&self) -> usize {
        let n_coords = 3 * self.family().n_centres();
        match self.variant {
            KernelVariant::Base => 1,
            KernelVariant::Deriv1 => n_coords,
            KernelVariant::Deriv2 => n_coords * n_coords,
            KernelVariant::Soc => 3,
        }
    }

    /// A short identifier of the kernel, *e.g.* `eri4_d1_2_1_1_0`.
    pub fn name(&self) -> String {
        let ls = self
            .angmoms
            .to_vec()
            .iter()
            .map(|l| l.to_string())
            .collect::<Vec<_>>()
            .join("_");
        format!(
            "{}_{}_{ls}",
            self.family().to_string().to_lowercase(),
            self.variant
        )
    }
}

impl fmt::Display for KernelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} [{}]", self.family(), self.angmoms, self.variant)
    }
}

// -----------------
// Kernel generation
// -----------------

/// Generates the program of a kernel.
///
/// # Arguments
///
/// * `spec` - The kernel to generate.
/// * `scheme` - The contraction scheme.
///
/// # Returns
///
/// The kernel program: the R-integral recursion and rollout, followed by the contraction stages
/// and, for derivative and spin--orbit variants, the combination stages.
///
/// # Errors
///
/// Errors if the specification is inconsistent.
pub fn generate_kernel(
    spec: &KernelSpec,
    scheme: ContractionScheme,
) -> Result<KernelProgram, GenerationError> {
    let sparsity = ShSparsity::new(spec.angmoms.lmax())?;
    generate_kernel_with_sparsity(spec, scheme, &sparsity)
}

/// Generates the program of a kernel using a pre-tabulated sparsity table.
///
/// # Errors
///
/// Errors if the specification is inconsistent or not covered by the sparsity table.
pub fn generate_kernel_with_sparsity(
    spec: &KernelSpec,
    scheme: ContractionScheme,
    sparsity: &ShSparsity,
) -> Result<KernelProgram, GenerationError> {
    let layout = spec.layout()?;
    let bra = spec.angmoms.bra();
    let ket = spec.angmoms.ket();

    let mut stages = generate_rints(
        bra.hermite_degree(),
        ket.hermite_degree(),
        &layout.rints_blocks,
    );
    match scheme {
        ContractionScheme::TwoStage => {
            stages.push(contraction::stage1(bra.hermite_degree(), &ket, &layout, sparsity)?);
            stages.extend(contraction::ket_combination(bra.hermite_degree(), &ket, &layout));
            stages.push(contraction::stage2(&bra, &ket, &layout, sparsity)?);
        }
        ContractionScheme::Shark => {
            stages.extend(shark::generate_shark(&bra, &ket, &layout, sparsity)?);
        }
    }
    stages.extend(contraction::batch_combination(&bra, &ket, &layout));

    let program = KernelProgram {
        spec: *spec,
        scheme,
        stages,
    };
    log::debug!(
        "Generated {} kernel {} with {} instructions.",
        scheme,
        spec,
        program.n_instructions()
    );
    Ok(program)
}

/// Returns a compact label of a kernel's angular momenta, *e.g.* `DPPS`.
pub fn angmoms_label(angmoms: &AngularMomenta) -> String {
    angmoms
        .to_vec()
        .into_iter()
        .map(angmom_label)
        .collect::<Vec<_>>()
        .join("")
}

/// Parses a compact label of angular momenta such as `DPPS` into angular momenta.
///
/// # Errors
///
/// Errors if a character is not an angular-momentum label, or if the label does not hold two,
/// three or four centres.
pub fn angmoms_from_label(label: &str) -> Result<AngularMomenta, GenerationError> {
    let ls = label
        .chars()
        .map(|c| {
            ANGMOM_INDICES
                .get(c.to_ascii_uppercase().to_string().as_str())
                .copied()
                .ok_or_else(|| {
                    GenerationError(format!("`{c}` is not a valid angular-momentum label"))
                })
        })
        .collect::<Result<Vec<_>, _>>()?;
    AngularMomenta::from_slice(&ls)
}

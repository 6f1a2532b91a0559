//! SHARK factorisation of the contraction stages.
//!
//! The ket stage contracts the R-integrals against the ket E-coefficients and depends only on
//! the Hermite degree of the bra and on the ket side, so it is shared by every bra shell pair of
//! the same total angular momentum. The bra side is then contracted either in the partial form,
//! for a single-shell bra keyed only on the bra and ket degrees, or in the final form, for a
//! concrete bra shell pair. Stages are shared only between kernels of the same variant.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::angmom::sh_sparsity::ShSparsity;
use crate::integrals::contraction::{
    ket_combination, rollout_bra_contraction, rollout_ket_contraction, ContractionSide,
};
use crate::integrals::layout::VariantLayout;
use crate::integrals::program::{Stage, StageKind};
use crate::integrals::GenerationError;

#[cfg(test)]
#[path = "shark_tests.rs"]
mod shark_tests;

/// Identifies a SHARK stage up to reuse: two kernels whose stages share a key share that stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SharkStageKey {
    /// Ket stage for a bra of the given Hermite degree.
    Ket { lbra: u32, ket: ContractionSide },

    /// Bra stage for a single-shell bra against a single-shell ket.
    BraPartial { lbra: u32, lket: u32 },

    /// Bra stage for a shell-pair bra.
    BraFinal {
        bra: ContractionSide,
        ket: ContractionSide,
    },
}

impl SharkStageKey {
    /// Returns the keys of the two SHARK stages needed for a bra and a ket side.
    pub fn for_sides(bra: &ContractionSide, ket: &ContractionSide) -> [SharkStageKey; 2] {
        let ket_key = SharkStageKey::Ket {
            lbra: bra.hermite_degree(),
            ket: *ket,
        };
        let bra_key = match (bra, ket) {
            (ContractionSide::Shell(lbra), ContractionSide::Shell(lket)) => {
                SharkStageKey::BraPartial {
                    lbra: *lbra,
                    lket: *lket,
                }
            }
            _ => SharkStageKey::BraFinal {
                bra: *bra,
                ket: *ket,
            },
        };
        [ket_key, bra_key]
    }
}

impl fmt::Display for SharkStageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SharkStageKey::Ket { lbra, ket } => write!(f, "ket<{lbra}; {ket}>"),
            SharkStageKey::BraPartial { lbra, lket } => write!(f, "bra1<{lbra}, {lket}>"),
            SharkStageKey::BraFinal { bra, ket } => write!(f, "bra2<{bra}; {ket}>"),
        }
    }
}

/// Generates the SHARK ket stage.
///
/// # Arguments
///
/// * `lbra` - The Hermite degree of the bra side.
/// * `ket` - The ket side.
/// * `layout` - The block layout of the kernel variant.
/// * `sparsity` - The solid-harmonic sparsity table covering the ket side.
pub fn ket(
    lbra: u32,
    ket: &ContractionSide,
    layout: &VariantLayout,
    sparsity: &ShSparsity,
) -> Result<Stage, GenerationError> {
    rollout_ket_contraction(StageKind::SharkKet, lbra, ket, &layout.ket_terms, sparsity)
}

/// Generates the SHARK bra stage for a single shell of angular momentum `lbra` against a single
/// ket shell of angular momentum `lket`.
pub fn bra_partial(
    lbra: u32,
    lket: u32,
    layout: &VariantLayout,
    sparsity: &ShSparsity,
) -> Result<Stage, GenerationError> {
    rollout_bra_contraction(
        StageKind::SharkBraPartial,
        &ContractionSide::Shell(lbra),
        ContractionSide::Shell(lket).n_sph(),
        &layout.bra_terms,
        layout.bra_target(),
        sparsity,
    )
}

/// Generates the SHARK bra stage for a concrete bra shell pair against the ket side.
///
/// # Errors
///
/// Errors if the bra side is not a shell pair.
pub fn bra_final(
    bra: &ContractionSide,
    ket: &ContractionSide,
    layout: &VariantLayout,
    sparsity: &ShSparsity,
) -> Result<Stage, GenerationError> {
    if !matches!(bra, ContractionSide::Pair(..)) {
        return Err(GenerationError(format!(
            "the final SHARK bra stage requires a shell-pair bra, but ({bra}) was given"
        )));
    }
    rollout_bra_contraction(
        StageKind::SharkBraFinal,
        bra,
        ket.n_sph(),
        &layout.bra_terms,
        layout.bra_target(),
        sparsity,
    )
}

/// Generates both SHARK contraction stages for a bra and a ket side, with the updates of the
/// ket-contracted blocks in between if the variant has any.
pub fn generate_shark(
    bra: &ContractionSide,
    ket_side: &ContractionSide,
    layout: &VariantLayout,
    sparsity: &ShSparsity,
) -> Result<Vec<Stage>, GenerationError> {
    let ket_stage = ket(bra.hermite_degree(), ket_side, layout, sparsity)?;
    let bra_stage = match (bra, ket_side) {
        (ContractionSide::Shell(lbra), ContractionSide::Shell(lket)) => {
            bra_partial(*lbra, *lket, layout, sparsity)?
        }
        (ContractionSide::Pair(..), _) => bra_final(bra, ket_side, layout, sparsity)?,
        (ContractionSide::Shell(_), ContractionSide::Pair(..)) => {
            return Err(GenerationError(format!(
                "a single-shell bra ({bra}) against a shell-pair ket ({ket_side}) is not a \
                supported SHARK layout"
            )))
        }
    };
    let mut stages = vec![ket_stage];
    stages.extend(ket_combination(bra.hermite_degree(), ket_side, layout));
    stages.push(bra_stage);
    Ok(stages)
}

//! Sparse two-stage contraction of R-integrals against E-coefficients.
//!
//! For a bra side $`B`$ and a ket side $`K`$, the rolled-out R-integrals $`R`$ (laid out
//! $`h_B \times h_K`$ per block) are contracted in two stages:
//!
//! ```math
//! X_{t_B, k} \mathrel{+}= R_{t_B, t_K} E^K_{t_K, k}, \qquad
//! I_{b, k} \mathrel{+}= E^B_{b, t_B} X_{t_B, k},
//! ```
//!
//! where a term is only emitted if the Hermite index belongs to the non-zero Hermite set of the
//! spherical component it multiplies. Which blocks and which E-coefficients each stage combines
//! is given by a [`VariantLayout`]. Derivative E-coefficients share the Hermite support of the
//! undifferentiated ones.

use std::fmt;

use itertools::iproduct;
use serde::{Deserialize, Serialize};

use crate::angmom::angmom_label;
use crate::angmom::hermite::n_hermites;
use crate::angmom::sh_sparsity::{
    molden_mls, nonzero_cart_tuples, nonzero_cart_tuples_pair, nonzero_hermite_tuples, ShSparsity,
};
use crate::integrals::layout::{BlockUpdate, BraTerm, EcoeffsKind, KetTerm, VariantLayout};
use crate::integrals::program::{Buffer, Instruction, Slot, Stage, StageKind};
use crate::integrals::GenerationError;

#[cfg(test)]
#[path = "contraction_tests.rs"]
mod contraction_tests;

// ---------------
// ContractionSide
// ---------------

/// One side of a contraction: either a single shell or a shell pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ContractionSide {
    /// A single shell of the given angular momentum.
    Shell(u32),

    /// A shell pair of the given angular momenta.
    Pair(u32, u32),
}

impl ContractionSide {
    /// The Hermite degree of this side, *i.e.* the sum of its angular momenta.
    pub fn hermite_degree(&self) -> u32 {
        match self {
            ContractionSide::Shell(l) => *l,
            ContractionSide::Pair(la, lb) => la + lb,
        }
    }

    /// The number of Hermite tuples of degree up to [`Self::hermite_degree`].
    pub fn n_hermites(&self) -> usize {
        n_hermites(self.hermite_degree())
    }

    /// The number of spherical components.
    pub fn n_sph(&self) -> usize {
        match self {
            ContractionSide::Shell(l) => 2 * (*l as usize) + 1,
            ContractionSide::Pair(la, lb) => (2 * (*la as usize) + 1) * (2 * (*lb as usize) + 1),
        }
    }

    /// Collects, for every spherical component, the canonical positions of its non-zero Hermite
    /// tuples. Spherical components are in Molden order for a shell and row-major over
    /// Molden-ordered pairs for a shell pair.
    ///
    /// # Errors
    ///
    /// Errors if the sparsity table does not cover this side.
    pub fn sparse_hermite_positions(
        &self,
        sparsity: &ShSparsity,
    ) -> Result<Vec<Vec<usize>>, GenerationError> {
        match self {
            ContractionSide::Shell(l) => molden_mls(*l)
                .into_iter()
                .map(|m| {
                    sparsity
                        .component(*l, m)
                        .map(|component| component.hermite_positions())
                })
                .collect(),
            ContractionSide::Pair(la, lb) => iproduct!(molden_mls(*la), molden_mls(*lb))
                .map(|(ma, mb)| sparsity.pair_hermite_positions(*la, ma, *lb, mb))
                .collect(),
        }
    }
}

impl fmt::Display for ContractionSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContractionSide::Shell(l) => write!(f, "{}", angmom_label(*l)),
            ContractionSide::Pair(la, lb) => {
                write!(f, "{} {}", angmom_label(*la), angmom_label(*lb))
            }
        }
    }
}

// ----------------------
// Shared rollout helpers
// ----------------------

/// Emits `RintsXEcoeffs[x][tb][k] += Rints[r][tb][tk] * E[tk][k]` for every ket term, bra
/// Hermite position `tb` of degree at most `lbra`, ket spherical component `k` and non-zero ket
/// Hermite position `tk` of `k`. `E` is [`Buffer::EcoeffsKet`] or the block of
/// [`Buffer::EcoeffsKetDeriv`] selected by the term.
pub(crate) fn rollout_ket_contraction(
    kind: StageKind,
    lbra: u32,
    ket: &ContractionSide,
    terms: &[KetTerm],
    sparsity: &ShSparsity,
) -> Result<Stage, GenerationError> {
    let ket_sparse = ket.sparse_hermite_positions(sparsity)?;
    let hb = n_hermites(lbra);
    let hk = ket.n_hermites();
    let nk = ket.n_sph();

    let mut instructions = vec![];
    for term in terms.iter() {
        let (ecoeffs, e_offset) = match term.ecoeffs {
            EcoeffsKind::Plain => (Buffer::EcoeffsKet, 0),
            EcoeffsKind::Deriv(axis) => (Buffer::EcoeffsKetDeriv, axis.index() * hk * nk),
        };
        for tb in 0..hb {
            for (k, tks) in ket_sparse.iter().enumerate() {
                for &tk in tks.iter() {
                    instructions.push(Instruction::Accumulate {
                        dst: Slot::new(
                            Buffer::RintsXEcoeffs,
                            term.x_block * hb * nk + tb * nk + k,
                        ),
                        src_a: Slot::new(Buffer::Rints, term.r_block * hb * hk + tb * hk + tk),
                        src_b: Slot::new(ecoeffs, e_offset + tk * nk + k),
                    });
                }
            }
        }
    }
    Ok(Stage::new(kind, instructions))
}

/// Emits `target[c][b][k] += E[b][tb] * RintsXEcoeffs[x][tb][k]` for every bra term, bra
/// spherical component `b`, ket spherical component `k` and non-zero bra Hermite position `tb` of
/// `b`. `E` is [`Buffer::EcoeffsBra`] or the block of [`Buffer::EcoeffsBraDeriv`] selected by the
/// term.
pub(crate) fn rollout_bra_contraction(
    kind: StageKind,
    bra: &ContractionSide,
    ket_n_sph: usize,
    terms: &[BraTerm],
    target: Buffer,
    sparsity: &ShSparsity,
) -> Result<Stage, GenerationError> {
    let bra_sparse = bra.sparse_hermite_positions(sparsity)?;
    let hb = bra.n_hermites();
    let nb = bra.n_sph();
    let nk = ket_n_sph;

    let mut instructions = vec![];
    for term in terms.iter() {
        let (ecoeffs, e_offset) = match term.ecoeffs {
            EcoeffsKind::Plain => (Buffer::EcoeffsBra, 0),
            EcoeffsKind::Deriv(axis) => (Buffer::EcoeffsBraDeriv, axis.index() * nb * hb),
        };
        for (b, tbs) in bra_sparse.iter().enumerate() {
            for k in 0..nk {
                for &tb in tbs.iter() {
                    instructions.push(Instruction::Accumulate {
                        dst: Slot::new(target, term.block * nb * nk + b * nk + k),
                        src_a: Slot::new(ecoeffs, e_offset + b * hb + tb),
                        src_b: Slot::new(
                            Buffer::RintsXEcoeffs,
                            term.x_block * hb * nk + tb * nk + k,
                        ),
                    });
                }
            }
        }
    }
    Ok(Stage::new(kind, instructions))
}

/// Emits `dst[u.dst][e] += u.factor * u.src[u.src_block][e]` for every update `u` and every
/// element `e` of a block of `block_len` elements, or nothing if there are no updates.
fn block_combination(
    kind: StageKind,
    dst: Buffer,
    block_len: usize,
    updates: &[BlockUpdate],
) -> Option<Stage> {
    if updates.is_empty() {
        return None;
    }
    let instructions = updates
        .iter()
        .flat_map(|update| {
            (0..block_len).map(move |e| Instruction::Axpy {
                dst: Slot::new(dst, update.dst * block_len + e),
                factor: update.factor,
                src: Slot::new(update.src, update.src_block * block_len + e),
            })
        })
        .collect();
    Some(Stage::new(kind, instructions))
}

// ------------------
// Two-stage rollouts
// ------------------

/// Generates the first contraction stage: R-integrals against the ket E-coefficients.
///
/// # Arguments
///
/// * `lbra` - The Hermite degree of the bra side.
/// * `ket` - The ket side.
/// * `layout` - The block layout of the kernel variant.
/// * `sparsity` - The solid-harmonic sparsity table covering the ket side.
pub fn stage1(
    lbra: u32,
    ket: &ContractionSide,
    layout: &VariantLayout,
    sparsity: &ShSparsity,
) -> Result<Stage, GenerationError> {
    rollout_ket_contraction(
        StageKind::ContractionKet,
        lbra,
        ket,
        &layout.ket_terms,
        sparsity,
    )
}

/// Generates the second contraction stage: bra E-coefficients against the stage-one
/// intermediate, producing the spherical batch or the partial blocks of the variant.
pub fn stage2(
    bra: &ContractionSide,
    ket: &ContractionSide,
    layout: &VariantLayout,
    sparsity: &ShSparsity,
) -> Result<Stage, GenerationError> {
    rollout_bra_contraction(
        StageKind::ContractionBra,
        bra,
        ket.n_sph(),
        &layout.bra_terms,
        layout.bra_target(),
        sparsity,
    )
}

/// Generates the updates of the ket-contracted blocks, if the variant has any.
pub fn ket_combination(lbra: u32, ket: &ContractionSide, layout: &VariantLayout) -> Option<Stage> {
    block_combination(
        StageKind::KetCombination,
        Buffer::RintsXEcoeffs,
        n_hermites(lbra) * ket.n_sph(),
        &layout.ket_updates,
    )
}

/// Generates the assembly of the batch components from the partial blocks, if the variant has
/// any.
pub fn batch_combination(
    bra: &ContractionSide,
    ket: &ContractionSide,
    layout: &VariantLayout,
) -> Option<Stage> {
    block_combination(
        StageKind::BatchCombination,
        Buffer::Batch,
        bra.n_sph() * ket.n_sph(),
        &layout.batch_updates,
    )
}

fn nnz_hermites(side: &ContractionSide) -> Result<usize, GenerationError> {
    let mut nnz = 0;
    match side {
        ContractionSide::Shell(l) => {
            for m in molden_mls(*l) {
                nnz += nonzero_hermite_tuples(&nonzero_cart_tuples(*l, m)?).len();
            }
        }
        ContractionSide::Pair(la, lb) => {
            for (ma, mb) in iproduct!(molden_mls(*la), molden_mls(*lb)) {
                nnz += nonzero_hermite_tuples(&nonzero_cart_tuples_pair(*la, ma, *lb, mb)?).len();
            }
        }
    }
    Ok(nnz)
}

/// Computes the number of accumulate instructions in [`stage1`] for a single ket term, directly
/// from the solid-harmonic decomposition.
///
/// This is the number of bra Hermite tuples times the total size of the non-zero Hermite sets of
/// all ket spherical components.
pub fn expected_stage1_count(
    bra: &ContractionSide,
    ket: &ContractionSide,
) -> Result<usize, GenerationError> {
    Ok(bra.n_hermites() * nnz_hermites(ket)?)
}

/// Computes the number of accumulate instructions in [`stage2`] for a single bra term, directly
/// from the solid-harmonic decomposition.
pub fn expected_stage2_count(
    bra: &ContractionSide,
    ket: &ContractionSide,
) -> Result<usize, GenerationError> {
    Ok(nnz_hermites(bra)? * ket.n_sph())
}

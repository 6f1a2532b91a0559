//! Block layouts of the kernel variants.
//!
//! Every kernel variant is assembled from the same pieces. The R-integrals are rolled out into
//! blocks, each raised by a Hermite increment on the combined index. Ket terms contract R-integral
//! blocks against the ket E-coefficients or their derivatives. Bra terms contract the resulting
//! intermediate blocks against the bra E-coefficients or their derivatives. Plain kernels write
//! their single bra term straight into the batch; derivative and spin--orbit kernels write partial
//! blocks that a final combination stage assembles into the batch components.
//!
//! For a nuclear-derivative kernel, the batch components are ordered by centre and then by
//! Cartesian axis, *e.g.* $`\partial_{A_x}, \partial_{A_y}, \partial_{A_z}, \partial_{B_x},
//! \ldots`$. Second-derivative kernels store the full Hessian row-major over such pairs.

use crate::angmom::hermite::{hermite_position, HermiteTuple};
use crate::integrals::kernel::{KernelFamily, KernelVariant};
use crate::integrals::program::{Axis, Buffer, ExponentRatio, Factor};
use crate::integrals::rints::derivative_components;
use crate::integrals::GenerationError;

#[cfg(test)]
#[path = "layout_tests.rs"]
mod layout_tests;

const AXES: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

/// E-coefficients entering a contraction term.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EcoeffsKind {
    /// The undifferentiated E-coefficients.
    Plain,

    /// The E-coefficients differentiated with respect to the first centre of their side along an
    /// axis.
    Deriv(Axis),
}

/// `RintsXEcoeffs[x_block] += Rints[r_block] * E_ket`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct KetTerm {
    pub x_block: usize,
    pub r_block: usize,
    pub ecoeffs: EcoeffsKind,
}

/// `target[block] += E_bra * RintsXEcoeffs[x_block]`, the target being [`Buffer::Batch`] or
/// [`Buffer::Partials`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BraTerm {
    pub block: usize,
    pub x_block: usize,
    pub ecoeffs: EcoeffsKind,
}

/// `dst += factor * src` over whole blocks of equal size.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BlockUpdate {
    pub dst: usize,
    pub factor: Factor,
    pub src: Buffer,
    pub src_block: usize,
}

impl BlockUpdate {
    fn new(dst: usize, factor: Factor, src: Buffer, src_block: usize) -> Self {
        Self {
            dst,
            factor,
            src,
            src_block,
        }
    }
}

fn unit(sign: i8) -> Factor {
    Factor::Unit(sign)
}

fn ratio(sign: i8, ratio: ExponentRatio) -> Factor {
    Factor::Ratio { sign, ratio }
}

// -------------
// VariantLayout
// -------------

/// The blocks and terms making up one kernel variant of one family.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VariantLayout {
    /// Hermite increments of the R-integral blocks, in block order.
    pub rints_blocks: Vec<HermiteTuple>,

    /// Ket contraction terms.
    pub ket_terms: Vec<KetTerm>,

    /// Updates of the ket-contracted blocks, applied after all ket terms.
    pub ket_updates: Vec<BlockUpdate>,

    /// Bra contraction terms.
    pub bra_terms: Vec<BraTerm>,

    /// Updates assembling the batch components, applied in order after all bra terms. Empty
    /// when the bra terms write the batch directly.
    pub batch_updates: Vec<BlockUpdate>,

    /// The number of batch components.
    pub n_components: usize,
}

impl VariantLayout {
    /// Constructs the layout of a variant of a kernel family.
    ///
    /// # Errors
    ///
    /// Errors if the family does not support the variant.
    pub fn new(family: KernelFamily, variant: KernelVariant) -> Result<Self, GenerationError> {
        if !family.supports(variant) {
            return Err(GenerationError(format!(
                "{family} kernels do not have a `{variant}` variant"
            )));
        }
        let layout = match (family, variant) {
            (_, KernelVariant::Base) => Self::plain(),
            (KernelFamily::Eri2, KernelVariant::Deriv1) => Self::eri2_gradient(),
            (KernelFamily::Eri2, KernelVariant::Deriv2) => Self::eri2_hessian(),
            (KernelFamily::Eri3, KernelVariant::Deriv1) => Self::eri3_gradient(),
            (KernelFamily::Eri4, KernelVariant::Deriv1) => Self::eri4_gradient(),
            (_, KernelVariant::Soc) => Self::spin_orbit(),
            _ => {
                return Err(GenerationError(format!(
                    "no layout is defined for `{variant}` {family} kernels"
                )))
            }
        };
        log::debug!(
            "Layout of `{variant}` {family} kernels: {} R-integral blocks, {} ket terms, {} bra \
            terms, {} components.",
            layout.rints_blocks.len(),
            layout.ket_terms.len(),
            layout.bra_terms.len(),
            layout.n_components
        );
        Ok(layout)
    }

    /// The buffer written by the bra terms.
    pub fn bra_target(&self) -> Buffer {
        if self.batch_updates.is_empty() {
            Buffer::Batch
        } else {
            Buffer::Partials
        }
    }

    fn plain() -> Self {
        Self {
            rints_blocks: vec![(0, 0, 0)],
            ket_terms: vec![KetTerm {
                x_block: 0,
                r_block: 0,
                ecoeffs: EcoeffsKind::Plain,
            }],
            ket_updates: vec![],
            bra_terms: vec![BraTerm {
                block: 0,
                x_block: 0,
                ecoeffs: EcoeffsKind::Plain,
            }],
            batch_updates: vec![],
            n_components: 1,
        }
    }

    /// One plain ket and bra term per R-integral block, each producing the partial block of the
    /// same index.
    fn diagonal(n_blocks: usize) -> (Vec<KetTerm>, Vec<BraTerm>) {
        (0..n_blocks)
            .map(|i| {
                (
                    KetTerm {
                        x_block: i,
                        r_block: i,
                        ecoeffs: EcoeffsKind::Plain,
                    },
                    BraTerm {
                        block: i,
                        x_block: i,
                        ecoeffs: EcoeffsKind::Plain,
                    },
                )
            })
            .unzip()
    }

    /// $`(a|b)`$ gradients: $`\partial_{A_i} = \partial_{P_i}`$ acting on $`R`$, and
    /// $`\partial_{B_i} = -\partial_{A_i}`$.
    fn eri2_gradient() -> Self {
        let rints_blocks = derivative_components(1);
        let (ket_terms, bra_terms) = Self::diagonal(rints_blocks.len());
        let batch_updates = (0..3)
            .map(|i| BlockUpdate::new(i, unit(1), Buffer::Partials, i))
            .chain((0..3).map(|i| BlockUpdate::new(3 + i, unit(-1), Buffer::Partials, i)))
            .collect();
        Self {
            rints_blocks,
            ket_terms,
            ket_updates: vec![],
            bra_terms,
            batch_updates,
            n_components: 6,
        }
    }

    /// $`(a|b)`$ Hessian over $`(A_x, A_y, A_z, B_x, B_y, B_z)`$, row-major. Every entry is a
    /// second-order R-integral block, negated when the two differentiated centres differ.
    fn eri2_hessian() -> Self {
        let rints_blocks = derivative_components(2);
        let (ket_terms, bra_terms) = Self::diagonal(rints_blocks.len());
        let unit_tuple = |i: usize| -> HermiteTuple {
            match i {
                0 => (1, 0, 0),
                1 => (0, 1, 0),
                _ => (0, 0, 1),
            }
        };
        // The degree-two block starts at canonical position four.
        let pair_block = |i: usize, j: usize| {
            let (ti, ui, vi) = unit_tuple(i);
            let (tj, uj, vj) = unit_tuple(j);
            hermite_position((ti + tj, ui + uj, vi + vj)) - 4
        };
        let batch_updates = (0..6)
            .flat_map(|row| (0..6).map(move |col| (row, col)))
            .map(|(row, col)| {
                let sign = if (row < 3) == (col < 3) { 1 } else { -1 };
                BlockUpdate::new(
                    row * 6 + col,
                    unit(sign),
                    Buffer::Partials,
                    pair_block(row % 3, col % 3),
                )
            })
            .collect();
        Self {
            rints_blocks,
            ket_terms,
            ket_updates: vec![],
            bra_terms,
            batch_updates,
            n_components: 36,
        }
    }

    /// $`(ab|c)`$ gradients over $`(A, B, C)`$.
    ///
    /// With $`P_i = E^{ab} R_i E^c`$ and $`S_i = (\partial_{A_i} E^{ab}) R E^c`$:
    ///
    /// ```math
    /// \partial_{A_i} = \tfrac{a}{p} P_i + S_i, \qquad
    /// \partial_{C_i} = -P_i, \qquad
    /// \partial_{B_i} = -(\partial_{A_i} + \partial_{C_i}).
    /// ```
    fn eri3_gradient() -> Self {
        let mut rints_blocks = derivative_components(1);
        rints_blocks.push((0, 0, 0));
        let ket_terms = (0..4)
            .map(|i| KetTerm {
                x_block: i,
                r_block: i,
                ecoeffs: EcoeffsKind::Plain,
            })
            .collect();
        let bra_terms = (0..3)
            .map(|i| BraTerm {
                block: i,
                x_block: i,
                ecoeffs: EcoeffsKind::Plain,
            })
            .chain(AXES.iter().enumerate().map(|(i, axis)| BraTerm {
                block: 3 + i,
                x_block: 3,
                ecoeffs: EcoeffsKind::Deriv(*axis),
            }))
            .collect();

        let mut batch_updates = vec![];
        for i in 0..3 {
            batch_updates.push(BlockUpdate::new(
                i,
                ratio(1, ExponentRatio::BraFirst),
                Buffer::Partials,
                i,
            ));
            batch_updates.push(BlockUpdate::new(i, unit(1), Buffer::Partials, 3 + i));
            batch_updates.push(BlockUpdate::new(6 + i, unit(-1), Buffer::Partials, i));
        }
        for i in 0..3 {
            batch_updates.push(BlockUpdate::new(3 + i, unit(-1), Buffer::Batch, i));
            batch_updates.push(BlockUpdate::new(3 + i, unit(-1), Buffer::Batch, 6 + i));
        }
        Self {
            rints_blocks,
            ket_terms,
            ket_updates: vec![],
            bra_terms,
            batch_updates,
            n_components: 9,
        }
    }

    /// $`(ab|cd)`$ gradients over $`(A, B, C, D)`$.
    ///
    /// With $`P_i = E^{ab} R_i E^{cd}`$, $`S_i = (\partial_{A_i} E^{ab}) R E^{cd}`$ and
    /// $`T_i = E^{ab} [R (\partial_{C_i} E^{cd}) - \tfrac{c}{q} R_i E^{cd}]`$:
    ///
    /// ```math
    /// \partial_{A_i} = \tfrac{a}{p} P_i + S_i, \qquad
    /// \partial_{B_i} = \tfrac{b}{p} P_i - S_i, \qquad
    /// \partial_{C_i} = T_i, \qquad
    /// \partial_{D_i} = -(\partial_{A_i} + \partial_{B_i} + \partial_{C_i}).
    /// ```
    fn eri4_gradient() -> Self {
        let mut rints_blocks = derivative_components(1);
        rints_blocks.push((0, 0, 0));
        let ket_terms = (0..4)
            .map(|i| KetTerm {
                x_block: i,
                r_block: i,
                ecoeffs: EcoeffsKind::Plain,
            })
            .chain(AXES.iter().enumerate().map(|(i, axis)| KetTerm {
                x_block: 4 + i,
                r_block: 3,
                ecoeffs: EcoeffsKind::Deriv(*axis),
            }))
            .collect();
        let ket_updates = (0..3)
            .map(|i| {
                BlockUpdate::new(
                    4 + i,
                    ratio(-1, ExponentRatio::KetFirst),
                    Buffer::RintsXEcoeffs,
                    i,
                )
            })
            .collect();
        let bra_terms = AXES
            .iter()
            .enumerate()
            .flat_map(|(i, axis)| {
                [
                    BraTerm {
                        block: i,
                        x_block: i,
                        ecoeffs: EcoeffsKind::Plain,
                    },
                    BraTerm {
                        block: 3 + i,
                        x_block: 3,
                        ecoeffs: EcoeffsKind::Deriv(*axis),
                    },
                    BraTerm {
                        block: 6 + i,
                        x_block: 4 + i,
                        ecoeffs: EcoeffsKind::Plain,
                    },
                ]
            })
            .collect();

        let mut batch_updates = vec![];
        for i in 0..3 {
            batch_updates.extend([
                BlockUpdate::new(i, ratio(1, ExponentRatio::BraFirst), Buffer::Partials, i),
                BlockUpdate::new(i, unit(1), Buffer::Partials, 3 + i),
                BlockUpdate::new(3 + i, ratio(1, ExponentRatio::BraSecond), Buffer::Partials, i),
                BlockUpdate::new(3 + i, unit(-1), Buffer::Partials, 3 + i),
                BlockUpdate::new(6 + i, unit(1), Buffer::Partials, 6 + i),
            ]);
        }
        for i in 0..3 {
            batch_updates.extend(
                [i, 3 + i, 6 + i].map(|src| BlockUpdate::new(9 + i, unit(-1), Buffer::Batch, src)),
            );
        }
        Self {
            rints_blocks,
            ket_terms,
            ket_updates,
            bra_terms,
            batch_updates,
            n_components: 12,
        }
    }

    /// Spin--orbit coupling: the cross product of the bra E-coefficient derivatives with the
    /// first-order R-integral blocks, $`I_x = \partial_y E\, X_z - \partial_z E\, X_y`$ and
    /// cyclically, where $`X_i = R_i E^{\mathrm{ket}}`$.
    fn spin_orbit() -> Self {
        let rints_blocks = derivative_components(1);
        let ket_terms = (0..3)
            .map(|i| KetTerm {
                x_block: i,
                r_block: i,
                ecoeffs: EcoeffsKind::Plain,
            })
            .collect();
        // Partial 2c is dE_d X_e and partial 2c + 1 is dE_e X_d for the cyclic triple (c, d, e).
        let bra_terms = (0..3)
            .flat_map(|c| {
                let d = (c + 1) % 3;
                let e = (c + 2) % 3;
                [
                    BraTerm {
                        block: 2 * c,
                        x_block: e,
                        ecoeffs: EcoeffsKind::Deriv(AXES[d]),
                    },
                    BraTerm {
                        block: 2 * c + 1,
                        x_block: d,
                        ecoeffs: EcoeffsKind::Deriv(AXES[e]),
                    },
                ]
            })
            .collect();
        let batch_updates = (0..3)
            .flat_map(|c| {
                [
                    BlockUpdate::new(c, unit(1), Buffer::Partials, 2 * c),
                    BlockUpdate::new(c, unit(-1), Buffer::Partials, 2 * c + 1),
                ]
            })
            .collect();
        Self {
            rints_blocks,
            ket_terms,
            ket_updates: vec![],
            bra_terms,
            batch_updates,
            n_components: 3,
        }
    }
}

//! Generation of the Boys-seeded Hermite Coulomb (R-integral) recursion.
//!
//! The auxiliary integrals satisfy
//!
//! ```math
//! R^{(n)}_{000} = (-2\alpha)^n F_n(x), \qquad
//! R^{(n)}_{t+1,u,v} = X_{PQ} R^{(n+1)}_{tuv} + t R^{(n+1)}_{t-1,u,v},
//! ```
//!
//! and analogously along $`y`$ and $`z`$. The generated recursion runs in place in a single
//! buffer laid out by [`rbuffer_position`]: auxiliary orders are visited in descending order, and
//! within each order the target degrees are visited in descending order, so that every right-hand
//! side still holds its order-$`(n+1)`$ value when it is read.

use std::f64::consts::PI;

use indexmap::IndexMap;
use nalgebra::Vector3;

use crate::angmom::hermite::{
    hermite_tuples, hermite_tuples_of_degree, rbuffer_position, HermiteTuple,
};
use crate::integrals::program::{Axis, Buffer, Expr, Instruction, Slot, Stage, StageKind};
use crate::integrals::GenerationError;

#[cfg(test)]
#[path = "rints_tests.rs"]
mod rints_tests;

/// Calculates the prefactor $`2\pi^{5/2} / (pq\sqrt{p+q})`$ applied in the R-integral rollout.
///
/// # Arguments
///
/// * `p` - The combined exponent of the bra.
/// * `q` - The combined exponent of the ket.
pub fn rints_prefactor(p: f64, q: f64) -> f64 {
    2.0 * PI.powf(2.5) / (p * q * (p + q).sqrt())
}

/// Returns the derivative components of a given order as Hermite increments, *i.e.* `[(0, 0,
/// 0)]` for order zero, `x, y, z` for order one, and `xx, xy, xz, yy, yz, zz` for order two.
pub fn derivative_components(deriv_order: u32) -> Vec<HermiteTuple> {
    hermite_tuples_of_degree(deriv_order)
}

/// Generates the in-place R-integral recursion up to total degree `lab`.
///
/// The stage begins with `lab + 1` Boys seeds and continues with one three-term recurrence per
/// Hermite tuple of degree $`m \ge 1`$ per auxiliary order $`n < l_{ab} - m + 1`$. After the
/// stage, the buffer holds $`R^{(0)}_{tuv}`$ for every $`t + u + v \le l_{ab}`$.
pub fn rints_recursion(lab: u32) -> Stage {
    let mut instructions = (0..=lab)
        .map(|n| Instruction::Assign {
            dst: Slot::new(Buffer::RBuffer, rbuffer_position(lab, n, (0, 0, 0))),
            expr: Expr::BoysSeed {
                fnx: Slot::new(Buffer::Fnx, n as usize),
                order: n,
            },
        })
        .collect::<Vec<_>>();

    let rr_slot =
        |n: u32, tuv: HermiteTuple| Slot::new(Buffer::RBuffer, rbuffer_position(lab, n, tuv));

    for n in (0..lab).rev() {
        for m in (1..=(lab - n)).rev() {
            for (t, u, v) in hermite_tuples_of_degree(m) {
                let (axis, first, second) = if t > 0 {
                    (
                        Axis::X,
                        rr_slot(n + 1, (t - 1, u, v)),
                        (t > 1).then(|| (t - 1, rr_slot(n + 1, (t - 2, u, v)))),
                    )
                } else if u > 0 {
                    (
                        Axis::Y,
                        rr_slot(n + 1, (t, u - 1, v)),
                        (u > 1).then(|| (u - 1, rr_slot(n + 1, (t, u - 2, v)))),
                    )
                } else {
                    (
                        Axis::Z,
                        rr_slot(n + 1, (t, u, v - 1)),
                        (v > 1).then(|| (v - 1, rr_slot(n + 1, (t, u, v - 2)))),
                    )
                };
                instructions.push(Instruction::Assign {
                    dst: rr_slot(n, (t, u, v)),
                    expr: Expr::Recurrence {
                        axis,
                        first,
                        second,
                    },
                });
            }
        }
    }
    Stage::new(StageKind::RintsRecursion, instructions)
}

/// Generates the rollout of the recursion buffer into the bra-by-ket R-integral layout.
///
/// For every block increment $`\mathbf{d}`$, bra Hermite tuple $`(t, u, v)`$ of degree at most
/// `lbra` and ket Hermite tuple $`(t', u', v')`$ of degree at most `lket`, the stage writes
///
/// ```math
/// (-1)^{t'+u'+v'}\, \mathrm{fac}\, R^{(0)}_{t+t'+d_x,\, u+u'+d_y,\, v+v'+d_z}
/// ```
///
/// into position `c * hb * hk + i * hk + j`, where `c`, `i` and `j` are the positions of the
/// block, bra tuple and ket tuple, and `hb`, `hk` are the numbers of bra and ket Hermite tuples.
///
/// # Arguments
///
/// * `lbra` - The Hermite degree of the bra side.
/// * `lket` - The Hermite degree of the ket side.
/// * `blocks` - The Hermite increments raised on the combined index, one per block.
pub fn rints_rollout(lbra: u32, lket: u32, blocks: &[HermiteTuple]) -> Stage {
    let lab = lbra + lket + max_increment(blocks);
    let bra_tuples = hermite_tuples(lbra);
    let ket_tuples = hermite_tuples(lket);
    let hb = bra_tuples.len();
    let hk = ket_tuples.len();

    let mut instructions = Vec::with_capacity(blocks.len() * hb * hk);
    for (c, &(dt, du, dv)) in blocks.iter().enumerate() {
        for (j, &(tk, uk, vk)) in ket_tuples.iter().enumerate() {
            let sign = if (tk + uk + vk) % 2 == 0 { 1 } else { -1 };
            for (i, &(tb, ub, vb)) in bra_tuples.iter().enumerate() {
                let tuv = (tb + tk + dt, ub + uk + du, vb + vk + dv);
                instructions.push(Instruction::Assign {
                    dst: Slot::new(Buffer::Rints, c * hb * hk + i * hk + j),
                    expr: Expr::Scaled {
                        sign,
                        src: Slot::new(Buffer::RBuffer, rbuffer_position(lab, 0, tuv)),
                    },
                });
            }
        }
    }
    Stage::new(StageKind::RintsRollout, instructions)
}

fn max_increment(blocks: &[HermiteTuple]) -> u32 {
    blocks.iter().map(|(t, u, v)| t + u + v).max().unwrap_or(0)
}

/// Generates the recursion and rollout stages for a bra of Hermite degree `lbra` and a ket of
/// Hermite degree `lket`, the recursion reaching the highest block increment.
pub fn generate_rints(lbra: u32, lket: u32, blocks: &[HermiteTuple]) -> Vec<Stage> {
    vec![
        rints_recursion(lbra + lket + max_increment(blocks)),
        rints_rollout(lbra, lket, blocks),
    ]
}

/// Evaluates $`R^{(0)}_{tuv}`$ for all $`t + u + v \le l_{ab}`$ by direct recursion, without
/// unrolling or in-place storage.
///
/// # Arguments
///
/// * `lab` - The maximum total degree.
/// * `alpha` - The combined exponent.
/// * `fnx` - Boys-function values $`F_0(x), \ldots, F_{l_{ab}}(x)`$.
/// * `xyz` - The separation vector $`\mathbf{X}_{PQ}`$.
///
/// # Returns
///
/// The R-integrals in canonical Hermite order.
///
/// # Errors
///
/// Errors if fewer than `lab + 1` Boys-function values are supplied.
pub fn rints_reference(
    lab: u32,
    alpha: f64,
    fnx: &[f64],
    xyz: &Vector3<f64>,
) -> Result<Vec<f64>, GenerationError> {
    if fnx.len() <= lab as usize {
        return Err(GenerationError(format!(
            "{} Boys-function values supplied but {} are required",
            fnx.len(),
            lab + 1
        )));
    }

    fn r(
        n: u32,
        tuv: HermiteTuple,
        alpha: f64,
        fnx: &[f64],
        xyz: &Vector3<f64>,
        memo: &mut IndexMap<(u32, HermiteTuple), f64>,
    ) -> f64 {
        if let Some(value) = memo.get(&(n, tuv)) {
            return *value;
        }
        let (t, u, v) = tuv;
        let value = if t > 0 {
            let mut value = xyz[0] * r(n + 1, (t - 1, u, v), alpha, fnx, xyz, memo);
            if t > 1 {
                value += f64::from(t - 1) * r(n + 1, (t - 2, u, v), alpha, fnx, xyz, memo);
            }
            value
        } else if u > 0 {
            let mut value = xyz[1] * r(n + 1, (t, u - 1, v), alpha, fnx, xyz, memo);
            if u > 1 {
                value += f64::from(u - 1) * r(n + 1, (t, u - 2, v), alpha, fnx, xyz, memo);
            }
            value
        } else if v > 0 {
            let mut value = xyz[2] * r(n + 1, (t, u, v - 1), alpha, fnx, xyz, memo);
            if v > 1 {
                value += f64::from(v - 1) * r(n + 1, (t, u, v - 2), alpha, fnx, xyz, memo);
            }
            value
        } else {
            fnx[n as usize] * (-2.0 * alpha).powi(n as i32)
        };
        memo.insert((n, tuv), value);
        value
    }

    let mut memo = IndexMap::new();
    let values = hermite_tuples(lab)
        .into_iter()
        .map(|tuv| r(0, tuv, alpha, fnx, xyz, &mut memo))
        .collect::<Vec<_>>();
    Ok(values)
}

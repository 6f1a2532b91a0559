//! Sparsity patterns of real solid harmonics in Cartesian and Hermite Gaussian bases.
//!
//! A real solid harmonic $`S_{lm}`$ expands in Cartesian monomials $`x^i y^j z^k`$ with
//! $`i + j + k = l`$, but only a subset of the monomials carries a non-zero coefficient. The
//! McMurchie--Davidson expansion of such a monomial into Hermite Gaussians $`\Lambda_{tuv}`$ only
//! involves $`t \le i`$, $`u \le j`$ and $`v \le k`$. These two facts together decide which
//! contraction terms in a generated kernel are structurally zero.

use indexmap::{IndexMap, IndexSet};
use itertools::iproduct;

use crate::angmom::hermite::{hermite_position, HermiteTuple};
use crate::integrals::GenerationError;

#[cfg(test)]
#[path = "sh_sparsity_tests.rs"]
mod sh_sparsity_tests;

/// A Cartesian monomial exponent triple $`(i, j, k)`$.
pub type CartTuple = (u32, u32, u32);

/// Returns the $`m`$ values of a shell of angular momentum `l` in Molden order, *i.e.*
/// $`0, +1, -1, +2, -2, \ldots, +l, -l`$.
pub fn molden_mls(l: u32) -> Vec<i32> {
    let l = l as i32;
    (0..=l)
        .flat_map(|absm| {
            if absm == 0 {
                vec![0]
            } else {
                vec![absm, -absm]
            }
        })
        .collect()
}

fn sort_canonical(tuples: &mut IndexSet<HermiteTuple>) {
    tuples.sort_by(|a, b| hermite_position(*a).cmp(&hermite_position(*b)));
}

/// Determines the Cartesian monomials with non-zero coefficients in the real solid harmonic
/// $`S_{lm}`$.
///
/// With $`v_0 = 0`$ for $`m \ge 0`$ and $`v_0 = 1/2`$ otherwise, the monomials are
/// $`(2t + |m| - 2(u + v),\ 2(u + v),\ l - 2t - |m|)`$ for $`0 \le t \le \lfloor (l - |m|)/2
/// \rfloor`$, $`0 \le u \le t`$ and $`v = v_0, v_0 + 1, \ldots, \lfloor |m|/2 - v_0 \rfloor +
/// v_0`$. The half-integer $`v`$ is tracked in doubled units.
///
/// # Arguments
///
/// * `l` - The angular momentum.
/// * `m` - The magnetic quantum number.
///
/// # Returns
///
/// The set of non-zero monomials, sorted in canonical order.
///
/// # Errors
///
/// Errors if $`|m| > l`$.
pub fn nonzero_cart_tuples(l: u32, m: i32) -> Result<IndexSet<CartTuple>, GenerationError> {
    let absm = m.unsigned_abs();
    if absm > l {
        return Err(GenerationError(format!(
            "|m| = {absm} exceeds l = {l} for a real solid harmonic"
        )));
    }
    let tmax = (l - absm) / 2;
    // Doubled values of `v`: even for m >= 0, odd for m < 0.
    let (v2_min, v2_max) = if m >= 0 {
        (0, 2 * (absm / 2))
    } else {
        (1, 2 * ((absm - 1) / 2) + 1)
    };

    let mut tuples = IndexSet::new();
    for t in 0..=tmax {
        for u in 0..=t {
            for v2 in (v2_min..=v2_max).step_by(2) {
                let ly = 2 * u + v2;
                let lx = 2 * t + absm - ly;
                let lz = l - 2 * t - absm;
                tuples.insert((lx, ly, lz));
            }
        }
    }
    sort_canonical(&mut tuples);
    Ok(tuples)
}

/// Determines the Hermite tuples reachable from a set of Cartesian monomials, *i.e.* the
/// down-closure of the set: for every $`(i, j, k)`$, every $`(t, u, v)`$ with $`t \le i`$,
/// $`u \le j`$, $`v \le k`$.
///
/// The result is sorted in canonical Hermite order.
pub fn nonzero_hermite_tuples(cart_tuples: &IndexSet<CartTuple>) -> IndexSet<HermiteTuple> {
    let mut tuples = cart_tuples
        .iter()
        .flat_map(|&(i, j, k)| iproduct!(0..=i, 0..=j, 0..=k))
        .collect::<IndexSet<_>>();
    sort_canonical(&mut tuples);
    tuples
}

/// Determines the non-zero Cartesian monomials of the product $`S_{l_a m_a} S_{l_b m_b}`$ on a
/// shell pair, which is the Minkowski sum of the two individual sets.
///
/// # Errors
///
/// Errors if either $`|m_a| > l_a`$ or $`|m_b| > l_b`$.
pub fn nonzero_cart_tuples_pair(
    la: u32,
    ma: i32,
    lb: u32,
    mb: i32,
) -> Result<IndexSet<CartTuple>, GenerationError> {
    let a_tuples = nonzero_cart_tuples(la, ma)?;
    let b_tuples = nonzero_cart_tuples(lb, mb)?;
    let mut tuples = iproduct!(a_tuples.iter(), b_tuples.iter())
        .map(|(&(ia, ja, ka), &(ib, jb, kb))| (ia + ib, ja + jb, ka + kb))
        .collect::<IndexSet<_>>();
    sort_canonical(&mut tuples);
    Ok(tuples)
}

// ----------
// ShSparsity
// ----------

/// The sparsity pattern of a single solid-harmonic component.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShComponentSparsity {
    /// Non-zero Cartesian monomials.
    pub cart_tuples: IndexSet<CartTuple>,

    /// Non-zero Hermite tuples.
    pub hermite_tuples: IndexSet<HermiteTuple>,
}

impl ShComponentSparsity {
    /// Canonical positions of the non-zero Hermite tuples, in ascending order.
    pub fn hermite_positions(&self) -> Vec<usize> {
        self.hermite_tuples
            .iter()
            .map(|tuv| hermite_position(*tuv))
            .collect()
    }
}

/// A memo table of solid-harmonic sparsity patterns for all $`(l, m)`$ with
/// $`l \le l_{\mathrm{max}}`$.
#[derive(Clone, Debug)]
pub struct ShSparsity {
    lmax: u32,
    components: IndexMap<(u32, i32), ShComponentSparsity>,
}

impl ShSparsity {
    /// Tabulates the sparsity patterns of every solid-harmonic component up to `lmax`.
    pub fn new(lmax: u32) -> Result<Self, GenerationError> {
        let components = (0..=lmax)
            .flat_map(|l| molden_mls(l).into_iter().map(move |m| (l, m)))
            .map(|(l, m)| {
                let cart_tuples = nonzero_cart_tuples(l, m)?;
                let hermite_tuples = nonzero_hermite_tuples(&cart_tuples);
                Ok((
                    (l, m),
                    ShComponentSparsity {
                        cart_tuples,
                        hermite_tuples,
                    },
                ))
            })
            .collect::<Result<IndexMap<_, _>, GenerationError>>()?;
        log::debug!(
            "Tabulated solid-harmonic sparsity for {} components up to l = {lmax}.",
            components.len()
        );
        Ok(Self { lmax, components })
    }

    /// Retrieves the sparsity pattern of $`S_{lm}`$.
    ///
    /// # Errors
    ///
    /// Errors if $`(l, m)`$ is not tabulated.
    pub fn component(&self, l: u32, m: i32) -> Result<&ShComponentSparsity, GenerationError> {
        self.components.get(&(l, m)).ok_or_else(|| {
            GenerationError(format!(
                "no sparsity pattern tabulated for (l, m) = ({l}, {m}) with lmax = {}",
                self.lmax
            ))
        })
    }

    /// Canonical positions of the non-zero Hermite tuples of the product $`S_{l_a m_a} S_{l_b
    /// m_b}`$ on a shell pair.
    pub fn pair_hermite_positions(
        &self,
        la: u32,
        ma: i32,
        lb: u32,
        mb: i32,
    ) -> Result<Vec<usize>, GenerationError> {
        self.component(la, ma)?;
        self.component(lb, mb)?;
        let pair_carts = nonzero_cart_tuples_pair(la, ma, lb, mb)?;
        Ok(nonzero_hermite_tuples(&pair_carts)
            .iter()
            .map(|tuv| hermite_position(*tuv))
            .collect())
    }
}

//! Canonical numbering of Hermite Gaussian derivative indices $`(t, u, v)`$.
//!
//! Every flattened buffer in the generated kernels is addressed through the functions in this
//! module. Hermite tuples are ordered first by ascending degree $`t + u + v`$ and then, within a
//! degree, lexicographically by decreasing $`t`$ and then decreasing $`u`$.

#[cfg(test)]
#[path = "hermite_tests.rs"]
mod hermite_tests;

/// A Hermite index triple $`(t, u, v)`$.
pub type HermiteTuple = (u32, u32, u32);

/// Calculates the number of Hermite tuples with degrees $`0`$ to $`l`$ inclusive, *i.e.*
/// $`(l+1)(l+2)(l+3)/6`$.
///
/// # Arguments
///
/// * `l` - The maximum degree.
///
/// # Returns
///
/// The number of Hermite tuples.
pub fn n_hermites(l: u32) -> usize {
    let l = l as usize;
    (l + 1) * (l + 2) * (l + 3) / 6
}

/// Calculates the number of Cartesian tuples of a single degree $`l`$, *i.e.*
/// $`(l+1)(l+2)/2`$.
pub fn n_carts(l: u32) -> usize {
    let l = l as usize;
    (l + 1) * (l + 2) / 2
}

/// Calculates the position of a tuple $`(t, u, v)`$ amongst all tuples of the same degree.
///
/// With $`j = u + v`$, the intra-degree index is $`j(j+1)/2 + v`$.
pub fn index_cart(_t: u32, u: u32, v: u32) -> usize {
    let uv = (u + v) as usize;
    uv * (uv + 1) / 2 + v as usize
}

/// Calculates the canonical position of a Hermite tuple amongst all tuples of degrees up to and
/// including its own degree.
///
/// # Arguments
///
/// * `tuv` - The Hermite tuple.
///
/// # Returns
///
/// The offset of all strictly lower-degree blocks plus the intra-degree index.
pub fn hermite_position(tuv: HermiteTuple) -> usize {
    let (t, u, v) = tuv;
    let degree = t + u + v;
    let offset = if degree == 0 {
        0
    } else {
        n_hermites(degree - 1)
    };
    offset + index_cart(t, u, v)
}

/// Enumerates all Hermite tuples of degree exactly `n` in canonical intra-degree order.
pub fn hermite_tuples_of_degree(n: u32) -> Vec<HermiteTuple> {
    let mut tuples = Vec::with_capacity(n_carts(n));
    for t in (0..=n).rev() {
        for u in (0..=(n - t)).rev() {
            tuples.push((t, u, n - t - u));
        }
    }
    tuples
}

/// Enumerates all Hermite tuples of degrees $`0`$ to $`l`$ in canonical order.
///
/// The `k`-th element of the returned vector has canonical position `k`.
pub fn hermite_tuples(l: u32) -> Vec<HermiteTuple> {
    (0..=l).flat_map(hermite_tuples_of_degree).collect()
}

/// Calculates the slot in the in-place R-integral recursion buffer holding $`R^{(n)}_{tuv}`$.
///
/// Degree-zero tuples live in the seed slot `n`. Every other tuple has a single slot shared by
/// all auxiliary orders, located at `lab` plus its canonical position.
pub fn rbuffer_position(lab: u32, n: u32, tuv: HermiteTuple) -> usize {
    let (t, u, v) = tuv;
    if t + u + v == 0 {
        n as usize
    } else {
        lab as usize + hermite_position(tuv)
    }
}

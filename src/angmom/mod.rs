//! Angular momentum index algebra for Hermite Gaussians and real solid harmonics.

use phf::phf_map;

pub mod hermite;
pub mod sh_sparsity;

/// Alphabetical labels of angular momenta.
pub static ANGMOM_LABELS: [&str; 13] = [
    "S", "P", "D", "F", "G", "H", "I", "K", "L", "M", "N", "O", "Q",
];

/// Indices of alphabetical labels of angular momenta.
pub static ANGMOM_INDICES: phf::Map<&'static str, u32> = phf_map! {
    "S" => 0,
    "P" => 1,
    "D" => 2,
    "F" => 3,
    "G" => 4,
    "H" => 5,
    "I" => 6,
    "K" => 7,
    "L" => 8,
    "M" => 9,
    "N" => 10,
    "O" => 11,
    "Q" => 12,
};

/// Returns the alphabetical label of an angular momentum, or its numerical value if no label is
/// defined.
pub fn angmom_label(l: u32) -> String {
    usize::try_from(l)
        .ok()
        .and_then(|l_usize| ANGMOM_LABELS.get(l_usize))
        .map(|label| (*label).to_string())
        .unwrap_or_else(|| format!("l{l}"))
}

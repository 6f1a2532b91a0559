//! Permutations of the operand centres of a kernel.
//!
//! A kernel generated for one angular-momentum tuple serves every tuple obtained from it by
//! relabelling its centres within the bra or within the ket. Such a relabelling is an
//! [`OperandPermutation`]: its image maps each centre of the relabelled kernel to the centre of
//! the generated kernel it reads from.

use std::collections::HashSet;
use std::fmt;
use std::ops::Mul;

use derive_builder::Builder;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::integrals::GenerationError;


/// A structure to manage permutations of the centres of a kernel.
#[derive(Builder, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[builder(build_fn(validate = "Self::validate"))]
pub struct OperandPermutation {
    /// The number of centres on which the permutation acts.
    rank: usize,

    /// The image of the ordered centres $`0, 1, \ldots, n - 1`$ under the permutation, where
    /// $`n`$ is [`Self::rank`].
    #[builder(setter(custom))]
    image: Vec<usize>,
}

impl OperandPermutationBuilder {
    fn image(&mut self, image: &[usize]) -> &mut Self {
        self.image = Some(image.to_vec());
        self
    }

    fn validate(&self) -> Result<(), String> {
        let rank = self.rank.ok_or("The rank of the permutation has not been set.")?;
        let image = self
            .image
            .as_ref()
            .ok_or("The image of the permutation has not been set.")?;
        if image.len() != rank {
            return Err(format!(
                "The permutation image `{image:?}` does not contain {rank} elements."
            ));
        }
        let distinct = image.iter().copied().collect::<HashSet<usize>>();
        if distinct.len() != rank || image.iter().any(|&i| i >= rank) {
            return Err(format!(
                "The permutation image `{image:?}` is not a rearrangement of 0..{rank}."
            ));
        }
        Ok(())
    }
}

impl OperandPermutation {
    /// Returns a builder to construct a new permutation.
    #[must_use]
    fn builder() -> OperandPermutationBuilder {
        OperandPermutationBuilder::default()
    }

    /// Constructs a permutation from its image.
    ///
    /// # Errors
    ///
    /// Errors if the image is not a rearrangement of $`0, 1, \ldots, n - 1`$.
    pub fn from_image(image: &[usize]) -> Result<Self, GenerationError> {
        Self::builder()
            .rank(image.len())
            .image(image)
            .build()
            .map_err(|err| GenerationError(err.to_string()))
    }

    /// Constructs the identity permutation on `rank` centres.
    pub fn identity(rank: usize) -> Self {
        Self {
            rank,
            image: (0..rank).collect(),
        }
    }

    /// Constructs the transposition of two centres.
    ///
    /// # Errors
    ///
    /// Errors if either centre is out of range.
    pub fn transposition(rank: usize, i: usize, j: usize) -> Result<Self, GenerationError> {
        let mut image = (0..rank).collect::<Vec<_>>();
        if i >= rank || j >= rank {
            return Err(GenerationError(format!(
                "cannot swap centres {i} and {j} of a rank-{rank} permutation"
            )));
        }
        image.swap(i, j);
        Self::from_image(&image)
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn image(&self) -> &Vec<usize> {
        &self.image
    }

    /// Obtains the cycle representation of the permutation, longest cycles first.
    pub fn cycles(&self) -> Vec<Vec<usize>> {
        let mut remaining_indices = (0..self.rank).rev().collect::<IndexSet<usize>>();
        let mut cycles: Vec<Vec<usize>> = Vec::with_capacity(self.rank);
        while let Some(start) = remaining_indices.pop() {
            let mut cycle: Vec<usize> = vec![start];
            let mut idx = start;
            while self.image[idx] != start {
                idx = self.image[idx];
                remaining_indices.shift_remove(&idx);
                cycle.push(idx);
            }
            cycles.push(cycle);
        }
        cycles.sort_by_key(|cycle| (!cycle.len(), cycle.clone()));
        cycles
    }

    /// Returns `true` if this permutation is the identity permutation for this rank.
    pub fn is_identity(&self) -> bool {
        self.image == (0..self.rank).collect::<Vec<usize>>()
    }

    /// Applies the permutation to a sequence of per-centre items: the `i`-th item of the result
    /// is the `image[i]`-th item of the input.
    ///
    /// # Errors
    ///
    /// Errors if the number of items does not match the rank.
    pub fn apply<T: Clone>(&self, items: &[T]) -> Result<Vec<T>, GenerationError> {
        if items.len() != self.rank {
            return Err(GenerationError(format!(
                "a rank-{} permutation cannot act on {} items",
                self.rank,
                items.len()
            )));
        }
        Ok(self.image.iter().map(|&i| items[i].clone()).collect())
    }
}

impl fmt::Display for OperandPermutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_identity() {
            return write!(f, "()");
        }
        for cycle in self.cycles().iter().filter(|cycle| cycle.len() > 1) {
            write!(
                f,
                "({})",
                cycle
                    .iter()
                    .map(|i| i.to_string())
                    .collect::<Vec<_>>()
                    .join(" ")
            )?;
        }
        Ok(())
    }
}

// ---
// Mul
// ---
impl Mul<&'_ OperandPermutation> for &OperandPermutation {
    type Output = OperandPermutation;

    fn mul(self, rhs: &OperandPermutation) -> Self::Output {
        assert_eq!(
            self.rank, rhs.rank,
            "The ranks of two multiplying permutations do not match."
        );
        OperandPermutation {
            rank: self.rank,
            image: rhs.image.iter().map(|&ri| self.image[ri]).collect(),
        }
    }
}

impl Mul<OperandPermutation> for OperandPermutation {
    type Output = OperandPermutation;

    fn mul(self, rhs: OperandPermutation) -> Self::Output {
        &self * &rhs
    }
}

//! Generation of unrolled McMurchie--Davidson electron-repulsion integral kernels.
//!
//! A kernel is described by a [`kernel::KernelSpec`] and generated into a
//! [`program::KernelProgram`]: an ordered list of stages, each a flat list of typed assign and
//! accumulate instructions over named buffers. Generation runs in three steps:
//!
//! 1. the Boys-seeded R-integral recursion and its rollout ([`rints`]),
//! 2. the sparse contraction of the R-integrals against E-coefficients, either in two stages
//!    ([`contraction`]) or in the SHARK factorisation ([`shark`]),
//! 3. assembly of the stages per kernel ([`kernel`]), following the block layout of the kernel
//!    variant ([`layout`]).

use std::error::Error;
use std::fmt;

pub mod contraction;
pub mod kernel;
pub mod layout;
pub mod program;
pub mod rints;
pub mod shark;

/// Error arising while generating a kernel from an invalid angular-momentum configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationError(pub String);

impl fmt::Display for GenerationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Kernel generation error: {}.", self.0)
    }
}

impl Error for GenerationError {}

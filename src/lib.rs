//! # mdgen: A Generator of McMurchie–Davidson Electron-Repulsion Integral Kernels
//!
//! `mdgen` generates unrolled kernels for two-, three- and four-centre electron-repulsion
//! integrals over solid-harmonic Gaussian shells in the McMurchie–Davidson scheme. A kernel is
//! produced as a typed program of assign and accumulate instructions over flat, named buffers,
//! which can be rendered into source code by an emitter or interpreted directly.
//!
//! The crate is organised bottom-up:
//! - [`angmom`]: the canonical numbering of Hermite indices and the Cartesian/Hermite sparsity of
//!   real solid harmonics,
//! - [`integrals`]: the Boys-seeded R-integral recursion, the sparse two-stage and SHARK
//!   contractions against E-coefficients, and the assembly of kernel programs,
//! - [`permutation`]: relabellings of the centres of a kernel,
//! - [`drivers`]: the emission of complete kernel sets with symmetry deduplication,
//! - [`interfaces`] and [`io`]: the YAML input, the command-line interface and file handling.
//!
//! Usages of most items are illustrated in their test functions.
//!
//! ## Example
//!
//! ```
//! use mdgen::integrals::kernel::{
//!     generate_kernel, AngularMomenta, ContractionScheme, KernelSpec, KernelVariant,
//! };
//!
//! let spec = KernelSpec::new(AngularMomenta::Four(1, 0, 1, 0), KernelVariant::Base).unwrap();
//! let program = generate_kernel(&spec, ContractionScheme::TwoStage).unwrap();
//! assert_eq!(program.stages.len(), 4);
//! ```
//!
//! ## License
//!
//! GNU Lesser General Public License v3.0.

pub mod angmom;
pub mod drivers;
pub mod integrals;
pub mod interfaces;
pub mod io;
pub mod permutation;

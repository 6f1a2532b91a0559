//! Typed instruction lists produced by the kernel generators, and a direct interpreter for them.
//!
//! Every generated kernel is a [`KernelProgram`]: an ordered sequence of [`Stage`]s, each of which
//! is a flat, loop-free list of [`Instruction`]s over named flat [`Buffer`]s addressed by
//! compile-time-constant offsets. A renderer can turn a program into source code in any target
//! language; [`Workspace`] evaluates it directly.

use std::error::Error;
use std::fmt;

use derive_builder::Builder;
use indexmap::IndexMap;
use nalgebra::Vector3;
use ndarray::Array3;
use serde::{Deserialize, Serialize};

use crate::integrals::kernel::{ContractionScheme, KernelSpec};

#[cfg(test)]
#[path = "program_tests.rs"]
mod program_tests;

// ------
// Buffer
// ------

/// Named flat buffers read or written by a kernel program.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Buffer {
    /// Externally supplied Boys-function values $`F_n(x)`$.
    Fnx,

    /// In-place R-integral recursion scratch buffer.
    RBuffer,

    /// Rolled-out R-integrals, one bra-by-ket block per derivative component.
    Rints,

    /// Externally supplied E-coefficients of the bra side.
    EcoeffsBra,

    /// Externally supplied first derivatives of the bra E-coefficients with respect to the first
    /// bra centre, one block per Cartesian axis.
    EcoeffsBraDeriv,

    /// Externally supplied E-coefficients of the ket side.
    EcoeffsKet,

    /// Externally supplied first derivatives of the ket E-coefficients with respect to the first
    /// ket centre, one block per Cartesian axis.
    EcoeffsKetDeriv,

    /// Intermediate product of R-integrals and ket E-coefficients.
    RintsXEcoeffs,

    /// Bra-contracted blocks combined into the batch components by derivative and spin-orbit
    /// kernels.
    Partials,

    /// Final spherical integral batch.
    Batch,
}

impl Buffer {
    /// Returns `true` if the buffer has to be supplied by the caller of a kernel.
    pub fn is_input(&self) -> bool {
        matches!(
            self,
            Buffer::Fnx
                | Buffer::EcoeffsBra
                | Buffer::EcoeffsBraDeriv
                | Buffer::EcoeffsKet
                | Buffer::EcoeffsKetDeriv
        )
    }
}

impl fmt::Display for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Buffer::Fnx => write!(f, "fnx"),
            Buffer::RBuffer => write!(f, "rbuff"),
            Buffer::Rints => write!(f, "rints"),
            Buffer::EcoeffsBra => write!(f, "ecoeffs_bra"),
            Buffer::EcoeffsBraDeriv => write!(f, "ecoeffs_bra_deriv"),
            Buffer::EcoeffsKet => write!(f, "ecoeffs_ket"),
            Buffer::EcoeffsKetDeriv => write!(f, "ecoeffs_ket_deriv"),
            Buffer::RintsXEcoeffs => write!(f, "rints_x_ecoeffs"),
            Buffer::Partials => write!(f, "partials"),
            Buffer::Batch => write!(f, "batch"),
        }
    }
}

/// A single element of a named buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Slot {
    pub buffer: Buffer,
    pub offset: usize,
}

impl Slot {
    pub fn new(buffer: Buffer, offset: usize) -> Self {
        Self { buffer, offset }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.buffer, self.offset)
    }
}

/// Cartesian axes of the separation vector $`\mathbf{X}_{PQ}`$.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub fn index(&self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::X => write!(f, "x"),
            Axis::Y => write!(f, "y"),
            Axis::Z => write!(f, "z"),
        }
    }
}

// ------
// Factor
// ------

/// Exponent ratios supplied per primitive quartet to nuclear-derivative kernels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExponentRatio {
    /// $`a/p`$ of the first bra centre.
    BraFirst,

    /// $`b/p`$ of the second bra centre.
    BraSecond,

    /// $`c/q`$ of the first ket centre.
    KetFirst,
}

impl fmt::Display for ExponentRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExponentRatio::BraFirst => write!(f, "a_over_p"),
            ExponentRatio::BraSecond => write!(f, "b_over_p"),
            ExponentRatio::KetFirst => write!(f, "c_over_q"),
        }
    }
}

/// Scalar factors of [`Instruction::Axpy`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Factor {
    /// $`\pm 1`$.
    Unit(i8),

    /// A signed exponent ratio.
    Ratio { sign: i8, ratio: ExponentRatio },
}

impl fmt::Display for Factor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Factor::Unit(sign) => write!(f, "{sign}"),
            Factor::Ratio { sign, ratio } => {
                let sign_str = if *sign < 0 { "-" } else { "" };
                write!(f, "{sign_str}{ratio}")
            }
        }
    }
}

// -----------
// Instruction
// -----------

/// Right-hand sides of assignments.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Expr {
    /// $`F_n(x) (-2\alpha)^n`$.
    BoysSeed { fnx: Slot, order: u32 },

    /// $`X_{\mathrm{axis}} \cdot \mathrm{first} + \mathrm{factor} \cdot \mathrm{second}`$.
    Recurrence {
        axis: Axis,
        first: Slot,
        second: Option<(u32, Slot)>,
    },

    /// $`\mathrm{sign} \cdot \mathrm{fac} \cdot \mathrm{src}`$.
    Scaled { sign: i8, src: Slot },
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::BoysSeed { fnx, order } => write!(f, "{fnx} * (-2 * alpha)^{order}"),
            Expr::Recurrence {
                axis,
                first,
                second,
            } => {
                write!(f, "{axis} * {first}")?;
                if let Some((factor, slot)) = second {
                    write!(f, " + {factor} * {slot}")?;
                }
                Ok(())
            }
            Expr::Scaled { sign, src } => {
                let sign_str = if *sign < 0 { "-" } else { "" };
                write!(f, "{sign_str}fac * {src}")
            }
        }
    }
}

/// A single loop-free operation of a kernel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    /// `dst = expr`.
    Assign { dst: Slot, expr: Expr },

    /// `dst += src_a * src_b`.
    Accumulate { dst: Slot, src_a: Slot, src_b: Slot },

    /// `dst += factor * src`.
    Axpy { dst: Slot, factor: Factor, src: Slot },
}

impl Instruction {
    /// Returns every slot touched by this instruction, destination first.
    pub fn slots(&self) -> Vec<Slot> {
        match self {
            Instruction::Assign { dst, expr } => {
                let mut slots = vec![*dst];
                match expr {
                    Expr::BoysSeed { fnx, .. } => slots.push(*fnx),
                    Expr::Recurrence { first, second, .. } => {
                        slots.push(*first);
                        if let Some((_, slot)) = second {
                            slots.push(*slot);
                        }
                    }
                    Expr::Scaled { src, .. } => slots.push(*src),
                }
                slots
            }
            Instruction::Accumulate { dst, src_a, src_b } => vec![*dst, *src_a, *src_b],
            Instruction::Axpy { dst, src, .. } => vec![*dst, *src],
        }
    }

    /// Returns the destination slot of this instruction.
    pub fn dst(&self) -> &Slot {
        match self {
            Instruction::Assign { dst, .. }
            | Instruction::Accumulate { dst, .. }
            | Instruction::Axpy { dst, .. } => dst,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Assign { dst, expr } => write!(f, "{dst} = {expr};"),
            Instruction::Accumulate { dst, src_a, src_b } => {
                write!(f, "{dst} += {src_a} * {src_b};")
            }
            Instruction::Axpy { dst, factor, src } => write!(f, "{dst} += {factor} * {src};"),
        }
    }
}

// -----
// Stage
// -----

/// The role of a stage within a kernel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StageKind {
    /// Boys-seeded R-integral recursion.
    RintsRecursion,

    /// Scaled, sign-adjusted copy of the R-integrals into the bra-by-ket layout.
    RintsRollout,

    /// Two-stage contraction against the ket E-coefficients.
    ContractionKet,

    /// Two-stage contraction against the bra E-coefficients.
    ContractionBra,

    /// SHARK ket stage, depending only on the bra Hermite degree and the ket side.
    SharkKet,

    /// SHARK bra stage for a single-shell bra, depending only on the bra and ket degrees.
    SharkBraPartial,

    /// SHARK bra stage for a shell-pair bra.
    SharkBraFinal,

    /// Linear combination of the ket-contracted blocks.
    KetCombination,

    /// Linear combination of the bra-contracted blocks into the batch components.
    BatchCombination,
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageKind::RintsRecursion => write!(f, "R-integral recursion"),
            StageKind::RintsRollout => write!(f, "R-integral rollout"),
            StageKind::ContractionKet => write!(f, "Ket contraction"),
            StageKind::ContractionBra => write!(f, "Bra contraction"),
            StageKind::SharkKet => write!(f, "SHARK ket"),
            StageKind::SharkBraPartial => write!(f, "SHARK bra (partial)"),
            StageKind::SharkBraFinal => write!(f, "SHARK bra (final)"),
            StageKind::KetCombination => write!(f, "Ket combination"),
            StageKind::BatchCombination => write!(f, "Batch combination"),
        }
    }
}

/// An ordered, loop-free list of instructions with a single role.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    pub kind: StageKind,
    pub instructions: Vec<Instruction>,
}

impl Stage {
    pub fn new(kind: StageKind, instructions: Vec<Instruction>) -> Self {
        Self { kind, instructions }
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Counts the accumulate instructions in this stage.
    pub fn n_accumulates(&self) -> usize {
        self.instructions
            .iter()
            .filter(|ins| matches!(ins, Instruction::Accumulate { .. }))
            .count()
    }
}

// -------------
// KernelProgram
// -------------

/// A complete generated kernel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelProgram {
    /// The kernel being implemented.
    pub spec: KernelSpec,

    /// The contraction scheme used to generate the contraction stages.
    pub scheme: ContractionScheme,

    /// The stages in execution order.
    pub stages: Vec<Stage>,
}

impl KernelProgram {
    /// Determines the number of elements each buffer must hold for this program to run.
    pub fn buffer_sizes(&self) -> IndexMap<Buffer, usize> {
        let mut sizes = IndexMap::<Buffer, usize>::new();
        self.stages
            .iter()
            .flat_map(|stage| stage.instructions.iter())
            .flat_map(|ins| ins.slots())
            .for_each(|slot| {
                let size = sizes.entry(slot.buffer).or_insert(0);
                *size = (*size).max(slot.offset + 1);
            });
        sizes.sort_keys();
        sizes
    }

    /// Retrieves the first stage of a given kind, if any.
    pub fn stage(&self, kind: StageKind) -> Option<&Stage> {
        self.stages.iter().find(|stage| stage.kind == kind)
    }

    pub fn n_instructions(&self) -> usize {
        self.stages.iter().map(Stage::len).sum()
    }
}

impl fmt::Display for KernelProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Kernel: {} ({})", self.spec, self.scheme)?;
        for stage in self.stages.iter() {
            writeln!(f, "// {} ({} instructions)", stage.kind, stage.len())?;
            for ins in stage.instructions.iter() {
                writeln!(f, "{ins}")?;
            }
        }
        Ok(())
    }
}

// ------------
// ProgramError
// ------------

/// Error arising while interpreting a kernel program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramError(pub String);

impl fmt::Display for ProgramError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Kernel program error: {}.", self.0)
    }
}

impl Error for ProgramError {}

// ---------
// Workspace
// ---------

/// A direct interpreter for kernel programs.
///
/// Input buffers ([`Buffer::is_input`]) must be supplied with [`Workspace::set_buffer`] before
/// [`Workspace::execute`] is called. All other buffers are zero-initialised on every execution.
#[derive(Builder, Clone, Debug)]
pub struct Workspace {
    /// The combined exponent $`\alpha`$ entering the Boys seeds.
    alpha: f64,

    /// The overall prefactor applied in the R-integral rollout.
    #[builder(default = "1.0")]
    fac: f64,

    /// The separation vector $`\mathbf{X}_{PQ}`$.
    xpq: Vector3<f64>,

    /// $`a/p`$, read only by nuclear-derivative kernels.
    #[builder(default = "0.0")]
    a_over_p: f64,

    /// $`b/p`$, read only by nuclear-derivative kernels.
    #[builder(default = "0.0")]
    b_over_p: f64,

    /// $`c/q`$, read only by nuclear-derivative kernels.
    #[builder(default = "0.0")]
    c_over_q: f64,

    #[builder(setter(skip), default = "IndexMap::new()")]
    buffers: IndexMap<Buffer, Vec<f64>>,
}

impl Workspace {
    /// Returns a builder to construct a new [`Workspace`].
    pub fn builder() -> WorkspaceBuilder {
        WorkspaceBuilder::default()
    }

    /// Supplies the values of a buffer.
    pub fn set_buffer(&mut self, buffer: Buffer, values: Vec<f64>) {
        self.buffers.insert(buffer, values);
    }

    /// Retrieves the current values of a buffer.
    ///
    /// # Errors
    ///
    /// Errors if the buffer has neither been supplied nor produced.
    pub fn buffer(&self, buffer: Buffer) -> Result<&[f64], ProgramError> {
        self.buffers
            .get(&buffer)
            .map(|values| values.as_slice())
            .ok_or_else(|| ProgramError(format!("buffer `{buffer}` is not available")))
    }

    /// Retrieves the batch produced by a program as an array of shape
    /// `(n_components, n_bra, n_ket)`, the spherical axes in Molden order.
    ///
    /// # Errors
    ///
    /// Errors if the program has not been executed in this workspace.
    pub fn batch(&self, program: &KernelProgram) -> Result<Array3<f64>, ProgramError> {
        let shape = (
            program.spec.n_components(),
            program.spec.angmoms.bra().n_sph(),
            program.spec.angmoms.ket().n_sph(),
        );
        Array3::from_shape_vec(shape, self.buffer(Buffer::Batch)?.to_vec()).map_err(|err| {
            ProgramError(format!("batch of `{}` has an unexpected size: {err}", program.spec))
        })
    }

    /// Executes a program, stage by stage and instruction by instruction.
    ///
    /// # Errors
    ///
    /// Errors if an input buffer is missing or too short.
    pub fn execute(&mut self, program: &KernelProgram) -> Result<(), ProgramError> {
        for (buffer, size) in program.buffer_sizes() {
            if buffer.is_input() {
                let supplied = self
                    .buffers
                    .get(&buffer)
                    .ok_or_else(|| ProgramError(format!("input buffer `{buffer}` not supplied")))?;
                if supplied.len() < size {
                    return Err(ProgramError(format!(
                        "input buffer `{buffer}` holds {} values but {size} are required",
                        supplied.len()
                    )));
                }
            } else {
                self.buffers.insert(buffer, vec![0.0; size]);
            }
        }

        for stage in program.stages.iter() {
            log::debug!(
                "Executing stage `{}` of `{}` ({} instructions).",
                stage.kind,
                program.spec,
                stage.len()
            );
            for ins in stage.instructions.iter() {
                self.apply(ins)?;
            }
        }
        Ok(())
    }

    fn read(&self, slot: &Slot) -> Result<f64, ProgramError> {
        self.buffers
            .get(&slot.buffer)
            .and_then(|values| values.get(slot.offset))
            .copied()
            .ok_or_else(|| ProgramError(format!("slot `{slot}` is out of range")))
    }

    fn slot_mut(&mut self, slot: &Slot) -> Result<&mut f64, ProgramError> {
        self.buffers
            .get_mut(&slot.buffer)
            .and_then(|values| values.get_mut(slot.offset))
            .ok_or_else(|| ProgramError(format!("slot `{slot}` is out of range")))
    }

    fn evaluate(&self, expr: &Expr) -> Result<f64, ProgramError> {
        match expr {
            Expr::BoysSeed { fnx, order } => {
                let exponent = i32::try_from(*order)
                    .map_err(|err| ProgramError(format!("invalid Boys order: {err}")))?;
                Ok(self.read(fnx)? * (-2.0 * self.alpha).powi(exponent))
            }
            Expr::Recurrence {
                axis,
                first,
                second,
            } => {
                let mut value = self.xpq[axis.index()] * self.read(first)?;
                if let Some((factor, slot)) = second {
                    value += f64::from(*factor) * self.read(slot)?;
                }
                Ok(value)
            }
            Expr::Scaled { sign, src } => Ok(f64::from(*sign) * self.fac * self.read(src)?),
        }
    }

    fn factor(&self, factor: &Factor) -> f64 {
        match factor {
            Factor::Unit(sign) => f64::from(*sign),
            Factor::Ratio { sign, ratio } => {
                let value = match ratio {
                    ExponentRatio::BraFirst => self.a_over_p,
                    ExponentRatio::BraSecond => self.b_over_p,
                    ExponentRatio::KetFirst => self.c_over_q,
                };
                f64::from(*sign) * value
            }
        }
    }

    fn apply(&mut self, ins: &Instruction) -> Result<(), ProgramError> {
        match ins {
            Instruction::Assign { dst, expr } => {
                let value = self.evaluate(expr)?;
                *self.slot_mut(dst)? = value;
            }
            Instruction::Accumulate { dst, src_a, src_b } => {
                let value = self.read(src_a)? * self.read(src_b)?;
                *self.slot_mut(dst)? += value;
            }
            Instruction::Axpy { dst, factor, src } => {
                let value = self.factor(factor) * self.read(src)?;
                *self.slot_mut(dst)? += value;
            }
        }
        Ok(())
    }
}

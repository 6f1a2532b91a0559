//! Driver for the emission of a complete set of electron-repulsion integral kernels.
//!
//! Only one kernel is generated per class of angular-momentum tuples related by swapping the
//! centres within the bra or within the ket. The other members of the class are recorded as
//! aliases of the generated kernel, each with the [`OperandPermutation`] that relabels its
//! centres. Swapping the bra with the ket is never treated as a relabelling since it reorders
//! the operands supplied by the caller.

use std::fmt;
use std::path::PathBuf;

use anyhow::{self, format_err};
use counter::Counter;
use derive_builder::Builder;
use indexmap::IndexSet;
use itertools::Itertools;
use log;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::angmom::sh_sparsity::ShSparsity;
use crate::drivers::MdgenDriver;
use crate::integrals::kernel::{
    angmoms_label, generate_kernel_with_sparsity, AngularMomenta, ContractionScheme,
    KernelFamily, KernelSpec, KernelVariant,
};
use crate::integrals::program::KernelProgram;
use crate::integrals::GenerationError;
use crate::io::format::{
    log_subtitle, log_title, mdgen_error, mdgen_output, nice_bool, write_subtitle, MdgenOutput,
};
use crate::io::{write_mdgen_binary, MdgenFileType};
use crate::permutation::OperandPermutation;


const DEFAULT_L_MAX: u32 = 6;
const DEFAULT_L_MAX_GENERATE: u32 = 4;

// ==================
// Struct definitions
// ==================

// ----------
// Parameters
// ----------

/// A structure containing control parameters for kernel emission.
#[derive(Clone, Builder, Debug, Serialize, Deserialize)]
#[builder(build_fn(validate = "Self::validate"))]
#[serde(default)]
pub struct KernelEmissionParams {
    /// The maximum total angular momentum of any kernel. Explicitly requested shell tuples
    /// exceeding this are rejected before any generation takes place.
    #[builder(default = "DEFAULT_L_MAX")]
    pub l_max: u32,

    /// The maximum total angular momentum of the kernels actually generated. Kernels above this
    /// but within [`Self::l_max`] are skipped and reported as such.
    #[builder(default = "DEFAULT_L_MAX_GENERATE")]
    pub l_max_generate: u32,

    /// The kernel families to enumerate. Ignored if [`Self::shell_tuples`] is given.
    #[builder(
        setter(custom),
        default = "vec![KernelFamily::Eri2, KernelFamily::Eri3, KernelFamily::Eri4]"
    )]
    pub families: Vec<KernelFamily>,

    /// The kernel variants to generate. Each family only generates the variants it supports.
    #[builder(
        setter(custom),
        default = "vec![
            KernelVariant::Base,
            KernelVariant::Deriv1,
            KernelVariant::Deriv2,
            KernelVariant::Soc,
        ]"
    )]
    pub variants: Vec<KernelVariant>,

    /// The contraction scheme of the generated kernels.
    #[builder(default)]
    pub scheme: ContractionScheme,

    /// Explicit angular-momentum tuples, each of two, three or four values. If `None`, all
    /// canonical tuples of the requested families are enumerated.
    #[builder(setter(custom), default = "None")]
    pub shell_tuples: Option<Vec<Vec<u32>>>,

    /// Optional name for saving the result as a binary file of type [`MdgenFileType::Krn`]. If
    /// `None`, the result will not be saved.
    #[builder(default = "None")]
    pub result_save_name: Option<PathBuf>,
}

impl KernelEmissionParams {
    /// Returns a builder to construct a [`KernelEmissionParams`] structure.
    pub fn builder() -> KernelEmissionParamsBuilder {
        KernelEmissionParamsBuilder::default()
    }
}

impl KernelEmissionParamsBuilder {
    pub fn families(&mut self, families: &[KernelFamily]) -> &mut Self {
        self.families = Some(families.to_vec());
        self
    }

    pub fn variants(&mut self, variants: &[KernelVariant]) -> &mut Self {
        self.variants = Some(variants.to_vec());
        self
    }

    pub fn shell_tuples(&mut self, shell_tuples: &[Vec<u32>]) -> &mut Self {
        self.shell_tuples = Some(Some(shell_tuples.to_vec()));
        self
    }

    fn validate(&self) -> Result<(), String> {
        let l_max = self.l_max.unwrap_or(DEFAULT_L_MAX);
        if let Some(Some(shell_tuples)) = self.shell_tuples.as_ref() {
            check_shell_tuples(shell_tuples, l_max).map_err(|err| err.to_string())?;
        }
        Ok(())
    }
}

impl Default for KernelEmissionParams {
    fn default() -> Self {
        Self::builder()
            .build()
            .expect("Unable to construct a default `KernelEmissionParams`.")
    }
}

impl fmt::Display for KernelEmissionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Maximum total angular momentum: {}", self.l_max)?;
        writeln!(
            f,
            "Maximum total angular momentum to generate: {}",
            self.l_max_generate
        )?;
        if let Some(shell_tuples) = self.shell_tuples.as_ref() {
            writeln!(
                f,
                "Requested shell tuples: {}",
                shell_tuples
                    .iter()
                    .map(|tuple| format!("({})", tuple.iter().join(" ")))
                    .join(", ")
            )?;
        } else {
            writeln!(
                f,
                "Kernel families: {}",
                self.families.iter().map(|family| family.to_string()).join(", ")
            )?;
        }
        writeln!(
            f,
            "Kernel variants: {}",
            self.variants.iter().map(|variant| variant.to_string()).join(", ")
        )?;
        writeln!(f, "Contraction scheme: {}", self.scheme)?;
        writeln!(
            f,
            "Save kernel-emission results to file: {}",
            if let Some(name) = self.result_save_name.as_ref() {
                format!("{}.{}", name.display(), MdgenFileType::Krn.ext())
            } else {
                nice_bool(false)
            }
        )?;
        writeln!(f)?;

        Ok(())
    }
}

// ----------------
// Generated kernel
// ----------------

/// A generated kernel together with the relabelled kernels it serves.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GeneratedKernel {
    /// The canonical kernel for which code has been generated.
    pub spec: KernelSpec,

    /// The generated program.
    pub program: KernelProgram,

    /// The relabelled kernels served by [`Self::program`]. The permutation applied to the
    /// centres of [`Self::spec`] gives the centres of the alias.
    pub aliases: Vec<(OperandPermutation, KernelSpec)>,
}

impl GeneratedKernel {
    /// The number of kernels instantiated from this program, including the canonical one.
    pub fn n_instantiations(&self) -> usize {
        1 + self.aliases.len()
    }
}

// ------
// Result
// ------

/// A structure to contain kernel-emission results.
#[derive(Clone, Builder, Debug, Serialize, Deserialize)]
pub struct KernelEmissionResult {
    /// The control parameters used to obtain this set of results.
    pub parameters: KernelEmissionParams,

    /// The generated kernels, in enumeration order.
    pub kernels: Vec<GeneratedKernel>,

    /// The canonical kernels skipped because their total angular momentum exceeds
    /// [`KernelEmissionParams::l_max_generate`].
    #[builder(default = "vec![]")]
    pub skipped: Vec<KernelSpec>,
}

impl KernelEmissionResult {
    /// Returns a builder to construct a [`KernelEmissionResult`] structure.
    fn builder() -> KernelEmissionResultBuilder {
        KernelEmissionResultBuilder::default()
    }

    /// The total number of kernels instantiated, aliases included.
    pub fn n_instantiations(&self) -> usize {
        self.kernels.iter().map(GeneratedKernel::n_instantiations).sum()
    }

    /// Locates the generated kernel serving a requested kernel.
    ///
    /// # Returns
    ///
    /// The generated kernel and the permutation relabelling its centres into those of `spec`, or
    /// `None` if no generated kernel serves `spec`.
    pub fn find(&self, spec: &KernelSpec) -> Option<(&GeneratedKernel, OperandPermutation)> {
        self.kernels.iter().find_map(|kernel| {
            if kernel.spec == *spec {
                Some((
                    kernel,
                    OperandPermutation::identity(spec.family().n_centres()),
                ))
            } else {
                kernel
                    .aliases
                    .iter()
                    .find(|(_, alias)| alias == spec)
                    .map(|(perm, _)| (kernel, perm.clone()))
            }
        })
    }
}

impl fmt::Display for KernelEmissionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_subtitle(f, "Generated kernels")?;
        writeln!(f)?;
        let count_length = self.kernels.len().max(1).to_string().len() + 1;
        writeln!(f, "{}", "┈".repeat(count_length + 78))?;
        writeln!(
            f,
            "{:>width$} {:>6} {:>14} {:>8} {:>13} {:>6}  {}",
            "#",
            "Family",
            "Shells",
            "Variant",
            "Instructions",
            "Inst.",
            "Relabellings",
            width = count_length
        )?;
        writeln!(f, "{}", "┈".repeat(count_length + 78))?;
        for (i, kernel) in self.kernels.iter().enumerate() {
            let relabellings = if kernel.aliases.is_empty() {
                "--".to_string()
            } else {
                kernel
                    .aliases
                    .iter()
                    .map(|(perm, alias)| format!("{perm} → {}", angmoms_label(&alias.angmoms)))
                    .join(", ")
            };
            writeln!(
                f,
                "{:>width$} {:>6} {:>14} {:>8} {:>13} {:>6}  {}",
                i + 1,
                kernel.spec.family().to_string(),
                kernel.spec.angmoms.to_string(),
                kernel.spec.variant.to_string(),
                kernel.program.n_instructions(),
                kernel.n_instantiations(),
                relabellings,
                width = count_length
            )?;
        }
        writeln!(f, "{}", "┈".repeat(count_length + 78))?;
        writeln!(f)?;

        let generated = self
            .kernels
            .iter()
            .map(|kernel| kernel.spec.family())
            .collect::<Counter<_>>();
        let skipped = self
            .skipped
            .iter()
            .map(|spec| spec.family())
            .collect::<Counter<_>>();
        writeln!(f, "Kernel counts per family:")?;
        for family in [KernelFamily::Eri2, KernelFamily::Eri3, KernelFamily::Eri4] {
            if generated[&family] == 0 && skipped[&family] == 0 {
                continue;
            }
            let n_instantiations: usize = self
                .kernels
                .iter()
                .filter(|kernel| kernel.spec.family() == family)
                .map(GeneratedKernel::n_instantiations)
                .sum();
            writeln!(
                f,
                "  {family}: {} generated, {n_instantiations} instantiated, {} skipped",
                generated[&family], skipped[&family],
            )?;
        }
        writeln!(
            f,
            "  Total: {} generated, {} instantiated, {} skipped",
            self.kernels.len(),
            self.n_instantiations(),
            self.skipped.len(),
        )?;
        if !self.skipped.is_empty() {
            writeln!(
                f,
                "(Kernels with a total angular momentum above {} are skipped.)",
                self.parameters.l_max_generate
            )?;
        }
        writeln!(f)?;

        Ok(())
    }
}

// ------
// Driver
// ------

/// A driver for kernel emission.
#[derive(Clone, Builder)]
pub struct KernelEmissionDriver<'a> {
    /// The control parameters for kernel emission.
    parameters: &'a KernelEmissionParams,

    /// The result of the kernel emission.
    #[builder(setter(skip), default = "None")]
    result: Option<KernelEmissionResult>,
}

impl<'a> KernelEmissionDriver<'a> {
    /// Returns a builder to construct a [`KernelEmissionDriver`] structure.
    pub fn builder() -> KernelEmissionDriverBuilder<'a> {
        KernelEmissionDriverBuilder::default()
    }

    /// Executes kernel emission.
    fn emit_kernels(&mut self) -> Result<(), anyhow::Error> {
        log_title("Kernel Emission");
        mdgen_output!("");
        let params = self.parameters;
        params.log_output_display();

        let (to_generate, skipped): (Vec<KernelSpec>, Vec<KernelSpec>) =
            requested_angmoms(params)?
                .into_iter()
                .flat_map(|angmoms| {
                    params
                        .variants
                        .iter()
                        .unique()
                        .filter(move |variant| angmoms.family().supports(**variant))
                        .map(move |variant| KernelSpec::new(angmoms, *variant))
                })
                .collect::<Result<Vec<_>, _>>()?
                .into_iter()
                .partition(|spec| spec.angmoms.ltotal() <= params.l_max_generate);
        if to_generate.is_empty() {
            log::warn!("No kernels have been selected for generation.");
        }

        log_subtitle("Kernel generation");
        mdgen_output!("");
        mdgen_output!(
            "Generating {} {} ({} skipped)...",
            to_generate.len(),
            if to_generate.len() == 1 { "kernel" } else { "kernels" },
            skipped.len()
        );
        mdgen_output!("");

        let sparsity = ShSparsity::new(params.l_max)?;
        let kernels = to_generate
            .par_iter()
            .map(|spec| generate_with_aliases(spec, params.scheme, &sparsity))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| {
                mdgen_error!("{err}");
                err
            })?;

        let ke_res = KernelEmissionResult::builder()
            .parameters(params.clone())
            .kernels(kernels)
            .skipped(skipped)
            .build()
            .map_err(|err| format_err!(err))?;
        self.result = Some(ke_res);

        // Save kernel-emission result, if requested
        if let Some(ke_res) = self.result.as_ref() {
            ke_res.log_output_display();
            if let Some(name) = params.result_save_name.as_ref() {
                write_mdgen_binary(name, MdgenFileType::Krn, ke_res)?;
                mdgen_output!(
                    "Kernel-emission results saved as {}.{}.",
                    name.display(),
                    MdgenFileType::Krn.ext()
                );
                mdgen_output!("");
            }
        }

        Ok(())
    }
}

impl MdgenDriver for KernelEmissionDriver<'_> {
    type Params = KernelEmissionParams;

    type Outcome = KernelEmissionResult;

    fn result(&self) -> Result<&Self::Outcome, anyhow::Error> {
        self.result
            .as_ref()
            .ok_or_else(|| format_err!("No kernel-emission results found."))
    }

    fn run(&mut self) -> Result<(), anyhow::Error> {
        self.emit_kernels()
    }
}

// =========
// Functions
// =========

/// Checks explicitly requested shell tuples against the maximum total angular momentum.
///
/// # Errors
///
/// Errors if a tuple does not have two, three or four values, or if its total angular momentum
/// exceeds `l_max`.
fn check_shell_tuples(
    shell_tuples: &[Vec<u32>],
    l_max: u32,
) -> Result<Vec<AngularMomenta>, GenerationError> {
    shell_tuples
        .iter()
        .map(|tuple| {
            let angmoms = AngularMomenta::from_slice(tuple)?;
            if angmoms.ltotal() > l_max {
                Err(GenerationError(format!(
                    "the requested shell tuple {tuple:?} has a total angular momentum of {}, \
                    which exceeds the maximum of {l_max}",
                    angmoms.ltotal()
                )))
            } else {
                Ok(angmoms)
            }
        })
        .collect()
}

/// All pairs $`(l_1, l_2)`$ with $`l_1 \ge l_2`$ and $`l_1 + l_2 \le l_{\mathrm{max}}`$.
fn canonical_pairs(l_max: u32) -> Vec<(u32, u32)> {
    (0..=l_max)
        .flat_map(|l1| (0..=l1).map(move |l2| (l1, l2)))
        .filter(|(l1, l2)| l1 + l2 <= l_max)
        .collect()
}

/// Enumerates the canonical angular-momentum tuples of a family with a total angular momentum of
/// at most `l_max`.
///
/// Within the bra pair of ERI3 and ERI4 kernels and the ket pair of ERI4 kernels, the first
/// angular momentum is never smaller than the second. ERI2 kernels have no relabellings, so all
/// of their tuples are canonical.
pub fn canonical_tuples(family: KernelFamily, l_max: u32) -> Vec<AngularMomenta> {
    match family {
        KernelFamily::Eri2 => (0..=l_max)
            .flat_map(|la| (0..=(l_max - la)).map(move |lb| AngularMomenta::Two(la, lb)))
            .collect(),
        KernelFamily::Eri3 => canonical_pairs(l_max)
            .into_iter()
            .flat_map(|(la, lb)| {
                (0..=(l_max - la - lb)).map(move |lc| AngularMomenta::Three(la, lb, lc))
            })
            .collect(),
        KernelFamily::Eri4 => canonical_pairs(l_max)
            .into_iter()
            .cartesian_product(canonical_pairs(l_max))
            .filter(|((la, lb), (lc, ld))| la + lb + lc + ld <= l_max)
            .map(|((la, lb), (lc, ld))| AngularMomenta::Four(la, lb, lc, ld))
            .collect(),
    }
}

/// Brings angular momenta into canonical order by sorting the bra pair and the ket pair.
pub fn canonical_angmoms(angmoms: &AngularMomenta) -> AngularMomenta {
    match *angmoms {
        AngularMomenta::Two(la, lb) => AngularMomenta::Two(la, lb),
        AngularMomenta::Three(la, lb, lc) => AngularMomenta::Three(la.max(lb), la.min(lb), lc),
        AngularMomenta::Four(la, lb, lc, ld) => {
            AngularMomenta::Four(la.max(lb), la.min(lb), lc.max(ld), lc.min(ld))
        }
    }
}

/// Determines the non-trivial relabellings of a canonical kernel that yield distinct kernels.
///
/// # Returns
///
/// No permutations if the relabelled tuples all coincide with `angmoms`, one permutation if only
/// one of the bra and ket pairs has distinct angular momenta, and three permutations (swap bra,
/// swap ket, swap both) if both have.
///
/// # Errors
///
/// Errors if a permutation cannot be constructed.
pub fn relabellings(angmoms: &AngularMomenta) -> Result<Vec<OperandPermutation>, GenerationError> {
    match *angmoms {
        AngularMomenta::Two(..) => Ok(vec![]),
        AngularMomenta::Three(la, lb, _) => {
            if la != lb {
                Ok(vec![OperandPermutation::transposition(3, 0, 1)?])
            } else {
                Ok(vec![])
            }
        }
        AngularMomenta::Four(la, lb, lc, ld) => {
            let swap_bra = OperandPermutation::transposition(4, 0, 1)?;
            let swap_ket = OperandPermutation::transposition(4, 2, 3)?;
            let perms = match (la != lb, lc != ld) {
                (false, false) => vec![],
                (true, false) => vec![swap_bra],
                (false, true) => vec![swap_ket],
                (true, true) => {
                    let swap_both = &swap_bra * &swap_ket;
                    vec![swap_bra, swap_ket, swap_both]
                }
            };
            Ok(perms)
        }
    }
}

/// Collects the canonical angular-momentum tuples requested by the parameters, without
/// duplicates and in enumeration order.
///
/// # Errors
///
/// Errors if an explicitly requested shell tuple is invalid or exceeds
/// [`KernelEmissionParams::l_max`].
pub fn requested_angmoms(
    params: &KernelEmissionParams,
) -> Result<Vec<AngularMomenta>, GenerationError> {
    let angmoms = if let Some(shell_tuples) = params.shell_tuples.as_ref() {
        check_shell_tuples(shell_tuples, params.l_max)?
            .iter()
            .map(canonical_angmoms)
            .collect::<IndexSet<_>>()
    } else {
        params
            .families
            .iter()
            .unique()
            .flat_map(|family| canonical_tuples(*family, params.l_max))
            .collect::<IndexSet<_>>()
    };
    Ok(angmoms.into_iter().collect())
}

/// Generates a canonical kernel and records the relabelled kernels it serves.
fn generate_with_aliases(
    spec: &KernelSpec,
    scheme: ContractionScheme,
    sparsity: &ShSparsity,
) -> Result<GeneratedKernel, GenerationError> {
    let program = generate_kernel_with_sparsity(spec, scheme, sparsity)?;
    let aliases = relabellings(&spec.angmoms)?
        .into_iter()
        .map(|perm| {
            let angmoms = spec.angmoms.permute(&perm)?;
            Ok((perm, KernelSpec::new(angmoms, spec.variant)?))
        })
        .collect::<Result<Vec<_>, GenerationError>>()?;
    Ok(GeneratedKernel {
        spec: *spec,
        program,
        aliases,
    })
}

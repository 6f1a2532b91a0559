//! Input specification of `mdgen` via YAML files.

use std::path::PathBuf;

use anyhow::{self, Context};
use serde::{Deserialize, Serialize};

use crate::drivers::kernel_emission::{
    KernelEmissionDriver, KernelEmissionParams, KernelEmissionResult,
};
use crate::drivers::MdgenDriver;
use crate::interfaces::InputHandle;
use crate::io::format::{log_title, mdgen_output, MdgenOutput};
use crate::io::{read_mdgen_binary, MdgenFileType};


/// An enumerated type representing possible input kinds for kernel emission from a YAML input
/// file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum KernelEmissionInputKind {
    /// Variant indicating that the parameters for the kernel-emission driver will be specified.
    Parameters(KernelEmissionParams),

    /// Variant indicating that the kernel-emission results will be read in from an `mdgen`
    /// [`MdgenFileType::Krn`] binary file. The associated path gives the name of the file without
    /// its `.mdgen.krn` extension.
    FromFile(PathBuf),
}

impl Default for KernelEmissionInputKind {
    fn default() -> Self {
        KernelEmissionInputKind::Parameters(KernelEmissionParams::default())
    }
}

/// A structure containing `mdgen` input parameters which can be serialised into and deserialised
/// from a YAML input file.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Input {
    /// Specification for kernel emission. This either specifies the parameters for kernel
    /// emission, or the name of an [`MdgenFileType::Krn`] binary file containing previously
    /// emitted kernels (without the `.mdgen.krn` extension), which are then summarised.
    ///
    /// # Default
    ///
    /// If not specified, kernels are emitted with default parameters.
    #[serde(default)]
    pub kernel_emission: KernelEmissionInputKind,
}

impl InputHandle for Input {
    fn handle(&self) -> Result<(), anyhow::Error> {
        match &self.kernel_emission {
            KernelEmissionInputKind::Parameters(ke_params) => {
                let mut ke_driver = KernelEmissionDriver::builder()
                    .parameters(ke_params)
                    .build()
                    .with_context(|| "Unable to construct a kernel-emission driver")?;
                ke_driver
                    .run()
                    .with_context(|| "Unable to run the kernel-emission driver successfully")?;
            }
            KernelEmissionInputKind::FromFile(ke_res_file) => {
                let ke_res: KernelEmissionResult =
                    read_mdgen_binary(ke_res_file, MdgenFileType::Krn).with_context(|| {
                        format!(
                            "Unable to read `{}.{}`",
                            ke_res_file.display(),
                            MdgenFileType::Krn.ext()
                        )
                    })?;
                log_title("Kernel Emission");
                mdgen_output!("");
                mdgen_output!(
                    "Kernel-emission results read in from {}.{}.",
                    ke_res_file.display(),
                    MdgenFileType::Krn.ext()
                );
                mdgen_output!("");
                ke_res.parameters.log_output_display();
                ke_res.log_output_display();
            }
        }
        Ok(())
    }
}

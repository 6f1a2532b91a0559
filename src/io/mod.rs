//! Reading and writing of `mdgen` files.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use anyhow::{self, format_err, Context};
use bincode;
use serde::{de::DeserializeOwned, Serialize};
use serde_yaml;

pub(crate) mod format;


/// An enumerated type for `mdgen` file types.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MdgenFileType {
    /// Variant for binary files containing kernel-emission results.
    Krn,
}

impl MdgenFileType {
    /// Returns the extension of the file type.
    pub fn ext(&self) -> String {
        match self {
            MdgenFileType::Krn => "mdgen.krn".to_string(),
        }
    }
}

/// Reads an `mdgen` binary file and deserialises it into an appropriate structure.
///
/// # Arguments
///
/// * `name` - The name of the file to be read in (without `mdgen`-specific extensions).
/// * `file_type` - The type of the `mdgen` file to be read in.
///
/// # Returns
///
/// A `Result` containing the structure deserialised from the read-in file.
pub fn read_mdgen_binary<T, P: AsRef<Path>>(
    name: P,
    file_type: MdgenFileType,
) -> Result<T, anyhow::Error>
where
    T: DeserializeOwned,
{
    let mut path = name.as_ref().to_path_buf();
    path.set_extension(file_type.ext());
    let mut reader = BufReader::new(
        File::open(&path).with_context(|| format!("Unable to open `{}`.", path.display()))?,
    );
    bincode::deserialize_from(&mut reader).map_err(|err| format_err!(err))
}

/// Serialises a structure and writes into an `mdgen` binary file.
///
/// # Arguments
///
/// * `name` - The name of the file to be written (without `mdgen`-specific extensions).
/// * `file_type` - The type of the `mdgen` file to be written.
///
/// # Returns
///
/// A `Result` indicating if the serialisation and writing processes have been successful.
pub fn write_mdgen_binary<T, P: AsRef<Path>>(
    name: P,
    file_type: MdgenFileType,
    value: &T,
) -> Result<(), anyhow::Error>
where
    T: Serialize,
{
    let mut path = name.as_ref().to_path_buf();
    path.set_extension(file_type.ext());
    let mut writer = BufWriter::new(
        File::create(&path).with_context(|| format!("Unable to create `{}`.", path.display()))?,
    );
    bincode::serialize_into(&mut writer, value).map_err(|err| format_err!(err))
}

/// Reads an `mdgen` configuration YAML file and deserialises it into an appropriate structure.
///
/// # Arguments
///
/// * `name` - The name of the file to be read in (with its `.yml` or `.yaml` extension).
///
/// # Returns
///
/// A `Result` containing the structure deserialised from the read-in file.
pub fn read_mdgen_yaml<T, P: AsRef<Path>>(name: P) -> Result<T, anyhow::Error>
where
    T: DeserializeOwned,
{
    let mut reader = BufReader::new(File::open(name).map_err(|err| format_err!(err))?);
    serde_yaml::from_reader(&mut reader).map_err(|err| format_err!(err))
}

/// Serialises a structure and writes into an `mdgen` configuration YAML file.
///
/// # Arguments
///
/// * `name` - The name of the YAML file to be written (without extensions). The resulting file
/// will have the `.yml` extension.
///
/// # Returns
///
/// A `Result` indicating if the serialisation and writing processes have been successful.
pub fn write_mdgen_yaml<T, P: AsRef<Path>>(name: P, value: &T) -> Result<(), anyhow::Error>
where
    T: Serialize,
{
    let mut path = name.as_ref().to_path_buf();
    path.set_extension("yml");
    let mut writer = BufWriter::new(File::create(path)?);
    serde_yaml::to_writer(&mut writer, value).map_err(|err| format_err!(err))
}

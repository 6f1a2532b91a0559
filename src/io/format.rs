//! Nice `mdgen` output formatting.

use std::fmt;

use log;

const MDGEN_BANNER_LENGTH: usize = 103;

/// Logs an error to the `mdgen-output` logger as well as to the diagnostic log.
macro_rules! mdgen_error {
    ($fmt:expr $(, $($arg:tt)*)?) => {
        log::error!($fmt, $($($arg)*)?);
        log::error!(target: "mdgen-output", $fmt, $($($arg)*)?);
    }
}

/// Logs a main output line to the `mdgen-output` logger.
macro_rules! mdgen_output {
    ($fmt:expr $(, $($arg:tt)*)?) => { log::info!(target: "mdgen-output", $fmt, $($($arg)*)?); }
}

pub(crate) use {mdgen_error, mdgen_output};

/// Logs a nicely formatted section title to the `mdgen-output` logger.
pub(crate) fn log_title(title: &str) {
    let length = title.chars().count().max(MDGEN_BANNER_LENGTH - 6);
    let bar = "─".repeat(length);
    mdgen_output!("┌──{bar}──┐");
    mdgen_output!("│§ {title:^length$} §│");
    mdgen_output!("└──{bar}──┘");
}

/// Writes a nicely formatted subtitle.
pub(crate) fn write_subtitle(f: &mut fmt::Formatter<'_>, subtitle: &str) -> fmt::Result {
    let length = subtitle.chars().count();
    let bar = "═".repeat(length);
    writeln!(f, "{subtitle}")?;
    writeln!(f, "{bar}")?;
    Ok(())
}

/// Logs a nicely formatted subtitle to the `mdgen-output` logger.
pub(crate) fn log_subtitle(subtitle: &str) {
    let length = subtitle.chars().count();
    let bar = "═".repeat(length);
    mdgen_output!("{}", subtitle);
    mdgen_output!("{}", bar);
}

/// Turns a boolean into a string of `yes` or `no`.
pub(crate) fn nice_bool(b: bool) -> String {
    if b {
        "yes".to_string()
    } else {
        "no".to_string()
    }
}

/// A trait for logging `mdgen` outputs nicely.
pub(crate) trait MdgenOutput: fmt::Debug + fmt::Display {
    /// Logs display output nicely.
    fn log_output_display(&self) {
        let lines = self.to_string();
        lines.lines().for_each(|line| {
            mdgen_output!("{line}");
        })
    }
}

// Blanket implementation
impl<T> MdgenOutput for T where T: fmt::Debug + fmt::Display {}

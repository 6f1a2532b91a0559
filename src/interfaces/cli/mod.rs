use std::path::PathBuf;

use clap::Parser;

use crate::io::format::mdgen_output;

const VERSION: Option<&str> = option_env!("CARGO_PKG_VERSION");

/// Logs a nicely formatted `mdgen` heading to the `mdgen-output` logger.
pub fn log_heading() {
    let version = if let Some(ver) = VERSION {
        format!("v{ver}")
    } else {
        "v unknown".to_string()
    };
    let bar = "─".repeat(101);
    mdgen_output!("╭{bar}╮");
    mdgen_output!("│{:101}│", "");
    mdgen_output!("│{:^101}│", "███╗   ███╗██████╗  ██████╗ ███████╗███╗   ██╗");
    mdgen_output!("│{:^101}│", "████╗ ████║██╔══██╗██╔════╝ ██╔════╝████╗  ██║");
    mdgen_output!("│{:^101}│", "██╔████╔██║██║  ██║██║  ███╗█████╗  ██╔██╗ ██║");
    mdgen_output!("│{:^101}│", "██║╚██╔╝██║██║  ██║██║   ██║██╔══╝  ██║╚██╗██║");
    mdgen_output!("│{:^101}│", "██║ ╚═╝ ██║██████╔╝╚██████╔╝███████╗██║ ╚████║");
    mdgen_output!("│{:^101}│", "╚═╝     ╚═╝╚═════╝  ╚═════╝ ╚══════╝╚═╝  ╚═══╝");
    mdgen_output!("│{:101}│", "");
    mdgen_output!(
        "│{:^101}│",
        "Unrolled McMurchie–Davidson electron-repulsion integral kernels"
    );
    mdgen_output!("│{version:>100} │");
    mdgen_output!("╰{bar}╯");
    mdgen_output!("");
}

#[derive(Parser)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to the YAML input file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Path to the output file. If not given, output is written to the console only.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

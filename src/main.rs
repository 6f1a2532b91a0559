use anyhow::{self, Context};
use clap::Parser;
use log::LevelFilter;
use log4rs::append::console::ConsoleAppender;
use log4rs::append::file::FileAppender;
use log4rs::config::{Appender, Config, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;

use mdgen::interfaces::cli::{log_heading, Cli};
use mdgen::interfaces::input::Input;
use mdgen::interfaces::InputHandle;
use mdgen::io::read_mdgen_yaml;

/// Configures `log4rs`: diagnostics go to the console, and the `mdgen-output` target goes to the
/// output file if one is given or to the console otherwise.
fn configure_logging(cli: &Cli) -> Result<(), anyhow::Error> {
    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new("{h({l}):>5} {m}{n}")))
        .build();
    let output_console = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new("{m}{n}")))
        .build();
    let mut config = Config::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .appender(Appender::builder().build("output_console", Box::new(output_console)));
    let output_appender = if let Some(output) = cli.output.as_ref() {
        let output_file = FileAppender::builder()
            .encoder(Box::new(PatternEncoder::new("{m}{n}")))
            .append(false)
            .build(output)
            .with_context(|| format!("Unable to create `{}`", output.display()))?;
        config = config.appender(Appender::builder().build("output_file", Box::new(output_file)));
        "output_file"
    } else {
        "output_console"
    };
    let config = config
        .logger(
            Logger::builder()
                .appender(output_appender)
                .additive(false)
                .build("mdgen-output", LevelFilter::Info),
        )
        .build(Root::builder().appender("stdout").build(LevelFilter::Warn))
        .with_context(|| "Unable to configure logging")?;
    log4rs::init_config(config).with_context(|| "Unable to initialise logging")?;
    Ok(())
}

fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();
    configure_logging(&cli)?;
    log_heading();

    let inp = if let Some(config) = cli.config.as_ref() {
        read_mdgen_yaml::<Input, _>(config)
            .with_context(|| format!("Unable to read the input file `{}`", config.display()))?
    } else {
        log::warn!("No input file specified. Default parameters will be used.");
        Input::default()
    };
    inp.handle()
}

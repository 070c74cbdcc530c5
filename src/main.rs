//! Exception Dump Parser - Main Entry Point

use std::io::Write;
use std::process::ExitCode;
use std::sync::Mutex;

use anyhow::Context;
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::{fmt, EnvFilter};

use exception_dump_parser::{config::Args, decode_to_string, Config};

fn main() -> ExitCode {
    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    // Handle special flags first
    if args.generate_config {
        let config = Config::default();
        println!("{}", config.to_toml()?);
        return Ok(());
    }

    // Load configuration
    let mut config = Config::load(args.config.as_ref())?;

    // Merge command line arguments into configuration
    config.merge_args(&args);
    config.validate()?;

    if args.validate_config {
        println!("Configuration is valid");
        return Ok(());
    }

    if args.show_config {
        println!("{}", config.to_toml()?);
        return Ok(());
    }

    init_logging(&config)?;
    debug!("Command line args: {:?}", args);

    let path = args.filename.context("No dump file given")?;
    info!("Decoding {} as {} layout", path.display(), config.decoder.layout);

    let data = std::fs::read(&path)
        .with_context(|| format!("Failed to read dump file {}", path.display()))?;

    let output = decode_to_string(
        &data,
        config.decoder.layout,
        config.report.format,
        &config.report_options(),
    )?;

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(output.as_bytes())?;
    if !output.ends_with('\n') {
        stdout.write_all(b"\n")?;
    }
    stdout.flush()?;
    Ok(())
}

/// Initialize logging system
fn init_logging(config: &Config) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false);

    // Configure output destination; stdout is reserved for the report
    if let Some(log_file) = &config.logging.file {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file)
            .with_context(|| format!("Failed to open log file {}", log_file.display()))?;

        subscriber.with_ansi(false).with_writer(Mutex::new(file)).init();
    } else {
        subscriber.with_writer(std::io::stderr).init();
    }

    debug!("Logging initialized with level: {}", config.logging.level);
    Ok(())
}

//! Configuration management for the exception dump parser

use std::path::PathBuf;

use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::error::{DumpError, Result};
use crate::header::Layout;
use crate::hexdump::{DEFAULT_PLACEHOLDER, DEFAULT_ROW_WIDTH};
use crate::report::ReportOptions;

const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "exception-dump-parser")]
#[command(about = "Parses ARM9/ARM11 firmware exception dumps")]
#[command(version)]
pub struct Args {
    /// Exception dump file to decode
    #[arg(required_unless_present_any = ["generate_config", "show_config", "validate_config"])]
    pub filename: Option<PathBuf>,

    /// Path to configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Wire layout of the dump (legacy for pre-versioning ARM9 dumps)
    #[arg(long, value_enum)]
    pub layout: Option<Layout>,

    /// Output format
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Bytes per hex dump row
    #[arg(long)]
    pub row_width: Option<usize>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log file path (defaults to stderr)
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Generate default configuration file
    #[arg(long)]
    pub generate_config: bool,

    /// Validate configuration and exit
    #[arg(long)]
    pub validate_config: bool,

    /// Show current configuration and exit
    #[arg(long)]
    pub show_config: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Main configuration structure
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub decoder: DecoderConfig,
    pub report: ReportConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from file or create default
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            let content = std::fs::read_to_string(path).map_err(|e| {
                DumpError::InvalidConfig(format!("Failed to read config file: {}", e))
            })?;
            let config: Config = toml::from_str(&content)
                .map_err(|e| DumpError::InvalidConfig(format!("Invalid TOML syntax: {}", e)))?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Merge command line arguments into configuration
    pub fn merge_args(&mut self, args: &Args) {
        if let Some(layout) = args.layout {
            self.decoder.layout = layout;
        }
        if let Some(format) = args.format {
            self.report.format = format;
        }
        if let Some(row_width) = args.row_width {
            self.report.row_width = row_width;
        }
        if let Some(level) = &args.log_level {
            self.logging.level = level.clone();
        }
        if args.log_file.is_some() {
            self.logging.file = args.log_file.clone();
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.report.row_width == 0 {
            return Err(DumpError::InvalidConfig(
                "report.row_width must be > 0".to_string(),
            ));
        }
        if !(' '..='~').contains(&self.report.placeholder) {
            return Err(DumpError::InvalidConfig(
                "report.placeholder must be a printable ASCII character".to_string(),
            ));
        }
        if !LOG_LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(DumpError::InvalidConfig(format!(
                "logging.level must be one of {}",
                LOG_LEVELS.join(", ")
            )));
        }
        Ok(())
    }

    /// Generate TOML configuration string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| DumpError::InvalidConfig(format!("Failed to serialize config: {}", e)))
    }

    pub fn report_options(&self) -> ReportOptions {
        ReportOptions {
            row_width: self.report.row_width,
            placeholder: self.report.placeholder,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct DecoderConfig {
    pub layout: Layout,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ReportConfig {
    pub format: OutputFormat,
    pub row_width: usize,
    pub placeholder: char,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Text,
            row_width: DEFAULT_ROW_WIDTH,
            placeholder: DEFAULT_PLACEHOLDER,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            file: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.decoder.layout, Layout::Extended);
        assert_eq!(config.report.format, OutputFormat::Text);
        assert_eq!(config.report_options(), ReportOptions::default());
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = Config::default();
        let toml_str = config.to_toml().unwrap();
        assert!(toml_str.contains("[decoder]"));
        assert!(toml_str.contains("[report]"));
        assert!(toml_str.contains("layout = \"extended\""));
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str("[decoder]\nlayout = \"legacy\"\n").unwrap();
        assert_eq!(config.decoder.layout, Layout::Legacy);
        assert_eq!(config.report.row_width, 16);
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_validation_failures() {
        let mut config = Config::default();
        config.report.row_width = 0;
        assert!(matches!(config.validate(), Err(DumpError::InvalidConfig(_))));

        let mut config = Config::default();
        config.report.placeholder = '\u{7f}';
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.logging.level = "verbose".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_merge_args_overrides() {
        let args = Args::parse_from([
            "exception-dump-parser",
            "crash_dump_00000000.dmp",
            "--layout",
            "legacy",
            "--format",
            "json",
            "--row-width",
            "8",
            "--log-level",
            "debug",
        ]);
        let mut config = Config::default();
        config.merge_args(&args);
        assert_eq!(config.decoder.layout, Layout::Legacy);
        assert_eq!(config.report.format, OutputFormat::Json);
        assert_eq!(config.report.row_width, 8);
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.file.is_none());
    }

    #[test]
    fn test_merge_args_keeps_config_values() {
        let args = Args::parse_from(["exception-dump-parser", "dump.dmp"]);
        let mut config = Config::default();
        config.report.row_width = 32;
        config.merge_args(&args);
        assert_eq!(config.report.row_width, 32);
        assert_eq!(config.decoder.layout, Layout::Extended);
    }

    #[test]
    fn test_filename_required_unless_maintenance_flag() {
        assert!(Args::try_parse_from(["exception-dump-parser"]).is_err());
        let args = Args::try_parse_from(["exception-dump-parser", "--generate-config"]).unwrap();
        assert!(args.filename.is_none());
        assert!(args.generate_config);
    }
}

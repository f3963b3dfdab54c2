//! CLI argument parsing for bridges.

use std::path::PathBuf;

use clap::Parser;

/// Common CLI arguments for all bridges.
#[derive(Parser, Debug, Clone)]
#[command(about = "modbridge device-to-MQTT bridge")]
#[command(version)]
pub struct BridgeArgs {
    /// Path to configuration file (JSON5 format).
    #[arg(short, long)]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,
}

impl BridgeArgs {
    /// Parse CLI arguments with a default config path.
    ///
    /// If no `--config` argument is provided, uses the default.
    /// Invalid arguments print usage and exit.
    pub fn parse_with_default(default_config: &'static str) -> Self {
        Self::parse_from_with_default(std::env::args_os(), default_config)
            .unwrap_or_else(|e| e.exit())
    }

    /// Parse an explicit argument list with a default config path.
    pub fn parse_from_with_default<I, T>(
        args: I,
        default_config: &'static str,
    ) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let matches = <Self as clap::CommandFactory>::command()
            .mut_arg("config", |arg| arg.required(false).default_value(default_config))
            .try_get_matches_from(args)?;

        <Self as clap::FromArgMatches>::from_arg_matches(&matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_default_config() {
        let args = BridgeArgs::parse_from_with_default(["bridge"], "modbus.json5").unwrap();
        assert_eq!(args.config, PathBuf::from("modbus.json5"));
        assert_eq!(args.log_level, None);
    }

    #[test]
    fn test_args_log_level_without_config() {
        let args =
            BridgeArgs::parse_from_with_default(["bridge", "--log-level", "trace"], "modbus.json5")
                .unwrap();
        assert_eq!(args.config, PathBuf::from("modbus.json5"));
        assert_eq!(args.log_level, Some("trace".to_string()));
    }

    #[test]
    fn test_args_overrides() {
        let args = BridgeArgs::parse_from_with_default(
            ["bridge", "--config", "/etc/modbridge/site.json5", "--log-level", "debug"],
            "modbus.json5",
        )
        .unwrap();
        assert_eq!(args.config, PathBuf::from("/etc/modbridge/site.json5"));
        assert_eq!(args.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_args_reject_unknown_flag() {
        let result = BridgeArgs::parse_from_with_default(["bridge", "--bogus"], "modbus.json5");
        assert!(result.is_err());
    }
}

//! Command-line argument parsing for the daemon binary.

use clap::Parser;

/// sandboxd — a network-accessible code execution sandbox service.
#[derive(Parser, Debug, Clone)]
#[command(name = "sandboxd", version, about)]
pub struct Args {
    /// Path to a TOML configuration file. Falls back to defaults plus
    /// environment overrides when omitted.
    #[arg(long)]
    pub config: Option<String>,

    /// Override the configured HTTP listen port.
    #[arg(long)]
    pub port: Option<u16>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_with_no_arguments() {
        let args = Args::parse_from(["sandboxd"]);
        assert!(args.config.is_none());
        assert!(args.port.is_none());
    }

    #[test]
    fn parses_config_and_port_overrides() {
        let args = Args::parse_from(["sandboxd", "--config", "custom.toml", "--port", "9001"]);
        assert_eq!(args.config.as_deref(), Some("custom.toml"));
        assert_eq!(args.port, Some(9001));
    }
}

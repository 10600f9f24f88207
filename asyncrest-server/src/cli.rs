use clap::Parser;

/// Parsed command-line arguments.
#[derive(Debug, Clone, Parser)]
#[command(name = "asyncrest-server")]
#[command(about = "REST resources with optional deferral to an in-process task queue")]
#[command(version)]
pub struct CliArgs {
    /// Path to configuration file (TOML, YAML or JSON)
    #[arg(short = 'c', long = "config-path", env = "ASYNCREST_CONFIG_PATH")]
    pub config_path: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_and_long_flags() {
        let args = CliArgs::parse_from(["asyncrest-server", "-c", "a.toml"]);
        assert_eq!(args.config_path.as_deref(), Some("a.toml"));
        let args = CliArgs::parse_from(["asyncrest-server", "--config-path=b.yaml"]);
        assert_eq!(args.config_path.as_deref(), Some("b.yaml"));
    }
}

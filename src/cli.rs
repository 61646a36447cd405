use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Clone, Debug, Parser)]
pub struct ServeArgs {
    /// Load configuration from a custom location. Defaults to: $XDG_CONFIG/pixelclutch/config.yml
    #[arg(short, long = "config", value_name = "FILE")]
    pub config_path: Option<PathBuf>,
}

#[derive(Clone, Debug, Subcommand)]
pub enum Command {
    /// Print a config template
    ConfigTemplate,
    /// Create a config file. Defaults to: $XDG_CONFIG/pixelclutch/config.yml
    ConfigInit {
        /// Create configuration at a custom location.
        #[arg(short, long = "config", value_name = "FILE")]
        config_path: Option<PathBuf>,
    },
}

#[derive(Clone, Debug, Parser)]
#[command(name = "pixelclutch", version, about = "PixelClutch web server")]
#[command(subcommand_negates_reqs(true))]
#[command(args_conflicts_with_subcommands(true))]
pub struct Cli {
    #[command(flatten)]
    pub args: ServeArgs,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_serve_and_subcommands() {
        let cli = Cli::try_parse_from(["pixelclutch", "--config", "/tmp/pc.yml"]).unwrap();
        assert_eq!(cli.args.config_path, Some(PathBuf::from("/tmp/pc.yml")));
        assert!(cli.command.is_none());

        let cli = Cli::try_parse_from(["pixelclutch", "config-template"]).unwrap();
        assert!(matches!(cli.command, Some(Command::ConfigTemplate)));

        let cli = Cli::try_parse_from(["pixelclutch", "config-init", "-c", "x.yml"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Command::ConfigInit { config_path: Some(_) })
        ));
    }
}

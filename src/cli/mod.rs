mod display;
mod query;

use crate::{
    config::ProctreeConfig,
    local_logger::{PROCTREE_U8_COLOR_CODE, init_local_logger},
    prelude::*,
    snapshot::ProviderKind,
};
use clap::{
    Parser, Subcommand,
    builder::{Styles, styling},
};

fn create_styles() -> Styles {
    styling::Styles::styled()
        .header(styling::AnsiColor::Green.on_default() | styling::Effects::BOLD)
        .usage(styling::AnsiColor::Green.on_default() | styling::Effects::BOLD)
        .literal(
            styling::Ansi256Color(PROCTREE_U8_COLOR_CODE).on_default() | styling::Effects::BOLD,
        )
        .placeholder(styling::AnsiColor::Cyan.on_default())
}

#[derive(Parser, Debug)]
#[command(version, about = "Inspect process trees", styles = create_styles())]
pub struct Cli {
    /// The configuration name to use
    /// If provided, the configuration will be loaded from ~/.config/proctree/{config-name}.yaml
    /// Otherwise, loads from ~/.config/proctree/config.yaml
    #[arg(long, env = "PROCTREE_CONFIG_NAME", global = true)]
    pub config_name: Option<String>,

    /// How many levels below the root process to include.
    /// Overrides `query.max-depth` from the configuration
    #[arg(
        long,
        env = "PROCTREE_MAX_DEPTH",
        global = true,
        allow_negative_numbers = true
    )]
    pub max_depth: Option<i32>,

    /// Overrides `provider` from the configuration
    #[arg(long, value_enum, global = true)]
    pub provider: Option<ProviderKind>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print a process and its descendants as a tree
    #[command(alias = "t")]
    Tree(query::QueryArgs),
    /// Print a process and its descendants as a flat pre-order list
    #[command(alias = "l")]
    List(query::QueryArgs),
    /// Print the CPU usage of a process and its descendants
    Cpu(query::CpuArgs),
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_local_logger()?;

    let mut config = ProctreeConfig::load_with_override(cli.config_name.as_deref(), cli.max_depth)?;
    if let Some(provider) = cli.provider {
        config.provider = provider;
    }
    debug!("Using {config:?}");

    match cli.command {
        Commands::Tree(args) => query::tree(args, &config).await?,
        Commands::List(args) => query::list(args, &config).await?,
        Commands::Cpu(args) => query::cpu(args, &config).await?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_negative_max_depth_after_subcommand() {
        let cli = Cli::try_parse_from(["proctree", "list", "42", "--max-depth", "-1"]).unwrap();
        assert_eq!(cli.max_depth, Some(-1));
        let Commands::List(args) = cli.command else {
            panic!("expected the list command");
        };
        assert_eq!(args.pid, Some(42));
    }

    #[test]
    fn test_pid_is_optional() {
        let cli = Cli::try_parse_from(["proctree", "tree", "--memory", "--json"]).unwrap();
        let Commands::Tree(args) = cli.command else {
            panic!("expected the tree command");
        };
        assert_eq!(args.pid, None);
        assert!(args.memory && args.json && !args.command_line);
    }
}

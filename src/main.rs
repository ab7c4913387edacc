use anyhow::Result;
use clap::Parser;
use pkgrepo::commands;
use pkgrepo::repository::InstallOutcome;
use pkgrepo::runtime::RealRuntime;
use std::path::PathBuf;

/// pkgrepo - EXPath package repository manager
///
/// Install and remove packages (.xar archives) in a local repository.
///
/// Examples:
///   pkgrepo init
///   pkgrepo install functx-1.0.xar
///   pkgrepo remove http://www.functx.com --version 1.0
#[derive(Parser, Debug)]
#[command(author, version = env!("PKGREPO_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Repository directory (defaults to ~/.pkgrepo; also via PKGREPO_ROOT)
    #[arg(
        long = "repo",
        short = 'r',
        env = "PKGREPO_ROOT",
        value_name = "PATH",
        global = true
    )]
    pub repo_root: Option<PathBuf>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Create an empty repository
    Init,

    /// Install a package archive
    Install(InstallArgs),

    /// Remove an installed package
    Remove(RemoveArgs),

    /// List installed packages
    List(ListArgs),
}

#[derive(clap::Args, Debug)]
pub struct InstallArgs {
    /// Path to the .xar archive
    #[arg(value_name = "XAR")]
    pub archive: PathBuf,

    /// Reinstall an already installed version without asking
    #[arg(long)]
    pub force: bool,

    /// Answer yes to every question
    #[arg(long, short = 'y')]
    pub yes: bool,
}

#[derive(clap::Args, Debug)]
pub struct RemoveArgs {
    /// Package name (URI)
    #[arg(value_name = "URI")]
    pub uri: String,

    /// Only remove this version
    #[arg(long)]
    pub version: Option<String>,

    /// Remove without asking, even if other packages depend on it
    #[arg(long)]
    pub force: bool,

    /// Answer yes to every question
    #[arg(long, short = 'y')]
    pub yes: bool,
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Print the manifest entries as JSON
    #[arg(long)]
    pub json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let runtime = RealRuntime;

    match cli.command {
        Commands::Init => commands::init(&runtime, cli.repo_root)?,
        Commands::Install(args) => {
            let outcome =
                commands::install(runtime, args.archive, args.force, args.yes, cli.repo_root)
                    .await?;
            if outcome == InstallOutcome::Cancelled {
                std::process::exit(130); // Standard exit code for Ctrl-C
            }
        }
        Commands::Remove(args) => {
            commands::remove(
                &runtime,
                &args.uri,
                args.version.as_deref(),
                args.force,
                args.yes,
                cli.repo_root,
            )?;
        }
        Commands::List(args) => commands::list(&runtime, cli.repo_root, args.json)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_install_parsing() {
        let cli = Cli::try_parse_from(["pkgrepo", "install", "hello-1.1.xar"]).unwrap();
        match cli.command {
            Commands::Install(args) => {
                assert_eq!(args.archive, PathBuf::from("hello-1.1.xar"));
                assert!(!args.force);
                assert!(!args.yes);
            }
            _ => panic!("Expected Install command"),
        }
        assert_eq!(cli.repo_root, None);
    }

    #[test]
    fn test_cli_install_flags() {
        let cli =
            Cli::try_parse_from(["pkgrepo", "install", "a.xar", "--force", "-y"]).unwrap();
        match cli.command {
            Commands::Install(args) => {
                assert!(args.force);
                assert!(args.yes);
            }
            _ => panic!("Expected Install command"),
        }
    }

    #[test]
    fn test_cli_remove_parsing() {
        let cli = Cli::try_parse_from([
            "pkgrepo",
            "remove",
            "http://example.org/lib/hello",
            "--version",
            "1.1",
        ])
        .unwrap();
        match cli.command {
            Commands::Remove(args) => {
                assert_eq!(args.uri, "http://example.org/lib/hello");
                assert_eq!(args.version.as_deref(), Some("1.1"));
                assert!(!args.force);
            }
            _ => panic!("Expected Remove command"),
        }
    }

    #[test]
    fn test_cli_global_repo_parsing() {
        let cli = Cli::try_parse_from(["pkgrepo", "--repo", "/tmp/repo", "list"]).unwrap();
        assert_eq!(cli.repo_root, Some(PathBuf::from("/tmp/repo")));

        let cli = Cli::try_parse_from(["pkgrepo", "list", "--json", "-r", "/tmp/repo"]).unwrap();
        assert_eq!(cli.repo_root, Some(PathBuf::from("/tmp/repo")));
        match cli.command {
            Commands::List(args) => assert!(args.json),
            _ => panic!("Expected List command"),
        }
    }

    #[test]
    fn test_cli_no_subcommand_fails() {
        assert!(Cli::try_parse_from(["pkgrepo", "hello.xar"]).is_err());
    }
}

use std::{
    io::Write,
    net::SocketAddr,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use log::{LevelFilter, info};
use quilt::{Config, Package, serve};

#[derive(Parser, Debug)]
#[command(name = "quilt", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to ./quilt.toml, then the user config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Global name the loader is installed under
    #[arg(long, global = true)]
    identifier: Option<String>,

    /// Source root, file or directory; repeat for several (later roots win)
    #[arg(short = 'p', long = "path", global = true)]
    paths: Vec<PathBuf>,

    /// File prepended verbatim to the bundle; repeat for several
    #[arg(short = 'd', long = "dependency", global = true)]
    dependencies: Vec<PathBuf>,

    /// Run the bundle through the configured compactor
    #[arg(long, global = true)]
    compress: bool,

    /// Translate every file on every build
    #[arg(long, global = true)]
    no_cache: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write the bundle to a file or stdout
    Build {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Serve the bundle, rebuilding on every request
    Serve {
        #[arg(long, default_value = "127.0.0.1:9294")]
        listen: SocketAddr,
        #[arg(long, default_value = "/application.js")]
        route: String,
    },
}

impl Cli {
    /// Command-line flags take precedence over the configuration file
    fn apply_overrides(&self, mut config: Config) -> Config {
        if let Some(identifier) = &self.identifier {
            config.identifier.clone_from(identifier);
        }
        if !self.paths.is_empty() {
            config.paths.clone_from(&self.paths);
        }
        if !self.dependencies.is_empty() {
            config.dependencies.clone_from(&self.dependencies);
        }
        if self.compress {
            config.compress = true;
        }
        if self.no_cache {
            config.cache = false;
        }
        config
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

async fn write_bundle(bundle: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            tokio::fs::write(path, bundle)
                .await
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!("Wrote {}", path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(bundle.as_bytes())?;
            stdout.flush()?;
        }
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = cli.apply_overrides(Config::load(cli.config.as_deref())?);
    let mut package = Package::new(config)?;

    match cli.command {
        Commands::Build { ref output } => {
            let bundle = package.build().await?;
            write_bundle(&bundle, output.as_deref()).await
        }
        Commands::Serve { listen, ref route } => serve::serve(package, listen, route).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::parse_from([
            "quilt",
            "build",
            "--path",
            "app",
            "--path",
            "plugins",
            "--identifier",
            "app",
            "--no-cache",
        ]);
        let config = cli.apply_overrides(Config::default());
        assert_eq!(config.identifier, "app");
        assert_eq!(
            config.paths,
            vec![PathBuf::from("app"), PathBuf::from("plugins")]
        );
        assert!(!config.cache);
        assert!(!config.compress);
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}

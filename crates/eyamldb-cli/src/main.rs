use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use eyamldb_core::{ConsoleLogger, EyamlResolver, HieraConfig, ResolutionMode, Scope};

/// Look up a key in an eyaml hierarchy
#[derive(Parser, Debug)]
#[command(name = "eyamldb")]
#[command(about = "Resolve keys against an eyaml hierarchy", long_about = None)]
struct Args {
    /// Key to look up
    key: String,

    /// Scope variables, e.g. `fqdn=web01.example.com environment=production`
    #[arg(value_name = "VAR=VALUE")]
    scope: Vec<String>,

    /// Path to hiera.yaml (defaults to the user, then the system location)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Collect the value of every source into an array
    #[arg(short, long, conflicts_with = "hash")]
    array: bool,

    /// Deep-merge the mappings of every source
    #[arg(long)]
    hash: bool,

    /// Extra source visited before the hierarchy
    #[arg(long, value_name = "SOURCE")]
    order_override: Option<String>,

    /// Print debug diagnostics to stderr
    #[arg(short, long)]
    debug: bool,
}

impl Args {
    fn mode(&self) -> ResolutionMode {
        if self.array {
            ResolutionMode::Array
        } else if self.hash {
            ResolutionMode::Hash
        } else {
            ResolutionMode::First
        }
    }

    fn scope(&self) -> Result<Scope> {
        let mut scope = Scope::new();
        for pair in &self.scope {
            let Some((name, value)) = pair.split_once('=') else {
                bail!("Invalid scope variable '{}': expected VAR=VALUE", pair);
            };
            scope.set(name.trim_start_matches("::"), value);
        }
        Ok(scope)
    }
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = Args::parse();
    let scope = args.scope()?;

    let config = match &args.config {
        Some(path) => HieraConfig::load(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => HieraConfig::load_default().context("Failed to load default config")?,
    };

    let logger = Arc::new(ConsoleLogger::new().verbose(args.debug));
    let resolver = EyamlResolver::from_config(&config, logger);

    let answer = resolver
        .lookup(&args.key, &scope, args.order_override.as_deref(), args.mode())
        .with_context(|| format!("Failed to look up '{}'", args.key))?;

    match answer {
        Some(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(())
        }
        None => {
            println!("null");
            process::exit(2);
        }
    }
}

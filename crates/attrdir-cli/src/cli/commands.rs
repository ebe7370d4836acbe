//! # CLI Layer
//!
//! Parses arguments, sets up logging, opens the container and dispatches to
//! [`super::handlers`]. This is the only module that writes to stdout.

use super::handlers;
use super::render::{self, Output};
use super::setup::{Cli, Commands};
use anyhow::{Context, Result};
use attrdir::api::AttrApi;
use attrdir::config::AttrConfig;
use attrdir::store::fs_backend::FsBackend;
use clap::Parser;
use std::path::Path;
use tracing::debug;
use tracing_subscriber::EnvFilter;

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let output = execute(&cli)?;
    print!("{}", render::render(&output, cli.json));
    Ok(())
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn config_for(root: &Path) -> Result<AttrConfig> {
    AttrConfig::load(Some(root)).context("Failed to load configuration")
}

fn open(root: &Path) -> Result<AttrApi<FsBackend>> {
    let backend = FsBackend::new(root.to_path_buf())?;
    let api = AttrApi::open_container(backend, config_for(root)?)
        .with_context(|| format!("Cannot open container at {}", root.display()))?;
    debug!(root = %root.display(), "opened container");
    Ok(api)
}

fn init(root: &Path) -> Result<Output> {
    let backend = FsBackend::new(root.to_path_buf())?;
    AttrApi::init(backend, config_for(root)?)?;
    Ok(Output::Message(format!(
        "Initialized container in {}",
        root.display()
    )))
}

fn execute(cli: &Cli) -> Result<Output> {
    let root = cli.root.as_path();
    match &cli.command {
        Commands::Init => init(root),
        Commands::Mkobj { path, kind } => handlers::mkobj(&mut open(root)?, path, *kind),
        Commands::Rmobj { path } => handlers::rmobj(&mut open(root)?, path),
        Commands::Objects => handlers::objects(&open(root)?),
        Commands::Create(args) => handlers::create(&mut open(root)?, args),
        Commands::Write {
            object,
            selector,
            hex,
        } => handlers::write(&mut open(root)?, object, selector, hex),
        Commands::Read { object, selector } => handlers::read(&mut open(root)?, object, selector),
        Commands::Info { object, selector } => handlers::info(&mut open(root)?, object, selector),
        Commands::Rename { object, old, new } => {
            handlers::rename(&mut open(root)?, object, old, new)
        }
        Commands::Delete { object, selector } => {
            handlers::delete(&mut open(root)?, object, selector)
        }
        Commands::Exists { object, name } => handlers::exists(&open(root)?, object, name),
        Commands::Ls { object, by, desc } => handlers::ls(&open(root)?, object, *by, *desc),
        Commands::Count { object } => handlers::count(&open(root)?, object),
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! jetc - compiles Jet expression trees and prints the bytecode listing.
//!
//! Trees are read as JSON, the interchange format an external parser
//! produces. Several trees are compiled in parallel.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use jet_compiler::ast::Expression;
use jet_compiler::{CompileError, CompilerOptions, StoreResolution, compile_batch};
use owo_colors::OwoColorize;
use tracing::debug;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// jetc - the Jet tree compiler
#[derive(Parser, Debug)]
#[command(name = "jetc")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON-serialized expression trees
    #[arg(required = true)]
    trees: Vec<PathBuf>,

    /// Compiler options file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Unresolved stores inside functions and scopes declare locals
    #[arg(long)]
    implicit_locals: bool,

    /// Omit source lines from the listing
    #[arg(long)]
    no_lines: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("{}: {:#}", "Error".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

/// Compiles every tree, printing listings and diagnostics.
///
/// Returns false when any tree failed to compile.
fn run(cli: &Cli) -> Result<bool> {
    let options = options(cli)?;
    debug!(?options, "compiler options");

    let trees = cli
        .trees
        .iter()
        .map(|path| load_tree(path))
        .collect::<Result<Vec<_>>>()?;

    let mut ok = true;
    for (path, result) in cli.trees.iter().zip(compile_batch(&trees, &options)) {
        match result {
            Ok(module) => {
                if cli.trees.len() > 1 {
                    println!("{}", format!("; {}", path.display()).dimmed());
                }
                print!("{}", module);
            }
            Err(e) => {
                report(path, &e);
                ok = false;
            }
        }
    }
    Ok(ok)
}

fn options(cli: &Cli) -> Result<CompilerOptions> {
    let mut options = match &cli.config {
        Some(path) => CompilerOptions::load(path)?,
        None => CompilerOptions::default(),
    };
    if cli.implicit_locals {
        options.store_resolution = StoreResolution::ImplicitLocal;
    }
    if cli.no_lines {
        options.emit_line_info = false;
    }
    Ok(options)
}

fn load_tree(path: &Path) -> Result<Expression> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read '{}'", path.display()))?;
    let mut tree: Expression = serde_json::from_str(&source)
        .with_context(|| format!("'{}' is not a serialized tree", path.display()))?;
    let nodes = tree.link_parents();
    debug!(path = %path.display(), nodes, "loaded tree");
    Ok(tree)
}

fn report(path: &Path, error: &CompileError) {
    match error.line() {
        Some(line) => eprintln!(
            "{}: {}:{}: {}",
            "Error".red().bold(),
            path.display(),
            line.cyan(),
            error
        ),
        None => eprintln!("{}: {}: {}", "Error".red().bold(), path.display(), error),
    }
}

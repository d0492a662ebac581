//! A small tool that loads a JSON patch from a file or stdin, applies it to
//! a fresh tree, and prints the resulting snapshot or resolves a path/query
//! against it. Glue around the core, no tree semantics of its own.

use std::io::Read;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use livetree::Tree;
use serde_json::Value;

#[derive(Debug, Parser)]
#[clap(name = "livetreectl", about = "Inspect a livetree patch from the command line")]
struct Args {
    #[clap(subcommand)]
    command: Command,

    /// Patch file to read (JSON). Reads stdin if omitted.
    #[clap(long, global = true)]
    patch_file: Option<PathBuf>,

    #[clap(flatten)]
    logging: livetree::logging::Options,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Apply the patch and print the resulting full snapshot.
    Patch,
    /// Apply the patch, then resolve `path` against the root.
    Get { path: String },
    /// Apply the patch, then run a structural `query` (JSON) against the root.
    Query { query: String },
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    args.logging.init();

    let patch_text = match &args.patch_file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("reading patch file {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("reading patch from stdin")?;
            buf
        }
    };
    let patch: Value = serde_json::from_str(&patch_text).context("parsing patch as JSON")?;

    let tree = Tree::new("livetreectl");
    tree.set(patch);
    tree.created();

    match args.command {
        Command::Patch => {
            println!("{}", serde_json::to_string_pretty(&tree.value())?);
        }
        Command::Get { path } => {
            let results: Vec<Value> = tree.get(&path).iter().map(|n| n.value()).collect();
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
        Command::Query { query } => {
            let q: Value = serde_json::from_str(&query).context("parsing query as JSON")?;
            let result = tree.query(&q).map_err(|e| anyhow::anyhow!(e.to_string()))?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
    }

    Ok(())
}

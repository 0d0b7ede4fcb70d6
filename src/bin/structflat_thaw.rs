//! structflat-thaw: Rebuild JSON values from column rows
//!
//! Reads the rows `structflat-melt` writes, one JSON array per line, and
//! inflates each back into a JSON value. Header rows are not accepted.
//!
//! Usage:
//!   structflat-melt --schema shapes.json values.jsonl | structflat-thaw --schema shapes.json

use anyhow::{Context, Result};
use clap::Parser;
use std::fs::File;
use std::io::{stdin, stdout, BufRead, BufReader, BufWriter};
use structflat::{thaw_ndjson, SchemaRegistry};

#[derive(Parser, Debug)]
#[command(name = "structflat-thaw")]
#[command(about = "Rebuild JSON values from column rows", long_about = None)]
struct Args {
    /// Input file of rows (use stdin if omitted)
    #[arg(value_name = "FILE")]
    input: Option<String>,

    /// Schema descriptor file
    #[arg(long, short = 's')]
    schema: String,

    /// Schema the rows were melted from (default: the descriptor's root)
    #[arg(long)]
    root: Option<String>,

    /// Rows carry partial values
    #[arg(long)]
    partial: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let file = File::open(&args.schema).with_context(|| format!("Failed to open schema {}", args.schema))?;
    let registry = SchemaRegistry::from_reader(BufReader::new(file)).context("Failed to load schema descriptor")?;
    let schema = match &args.root {
        Some(name) => registry.schema(name)?,
        None => registry.root()?,
    };
    let recipe = if args.partial {
        schema.partial_recipe()?
    } else {
        schema.recipe()?
    };

    let reader: Box<dyn BufRead> = if let Some(file_path) = &args.input {
        Box::new(BufReader::new(
            File::open(file_path).with_context(|| format!("Failed to open {}", file_path))?,
        ))
    } else {
        Box::new(BufReader::new(stdin()))
    };
    let mut out = BufWriter::new(stdout().lock());

    let count = thaw_ndjson(reader, &recipe, &mut out)?;
    log::info!("thawed {} values of `{}`", count, schema.name());
    Ok(())
}

//! structflat-melt: Flatten typed JSON values into column rows
//!
//! Usage:
//!   # Full values of the descriptor's root schema, one row per line
//!   structflat-melt --schema shapes.json values.jsonl
//!
//!   # Partial values of a named schema, with a header row
//!   structflat-melt --schema shapes.json --root Point --partial --header < points.jsonl
//!
//!   # Render each value through its token stream instead of flattening it
//!   structflat-melt --schema shapes.json --tokens values.jsonl

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::Value;
use std::fs::File;
use std::io::{stdin, stdout, BufRead, BufReader, BufWriter, Write};
use structflat::json::{tokens_to_json, value_from_json};
use structflat::{emit_tokens, melt_ndjson, MeltConfig, Recipe, RowWriter, SchemaRegistry};

#[derive(Parser, Debug)]
#[command(name = "structflat-melt")]
#[command(about = "Flatten typed JSON values into column rows", long_about = None)]
struct Args {
    /// Input file of newline-delimited JSON values (use stdin if omitted)
    #[arg(value_name = "FILE")]
    input: Option<String>,

    /// Schema descriptor file
    #[arg(long, short = 's')]
    schema: String,

    /// Schema to read values as (default: the descriptor's root)
    #[arg(long)]
    root: Option<String>,

    /// Accept partial values; rows then start with a field-set column
    #[arg(long)]
    partial: bool,

    /// Write token-rendered JSON instead of rows
    #[arg(long)]
    tokens: bool,

    /// Write a header row of column names first
    #[arg(long)]
    header: bool,

    /// Separator for nested column names (default: "_")
    #[arg(long)]
    separator: Option<String>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let defaults = MeltConfig::default();
    let config = MeltConfig {
        header: args.header,
        separator: args.separator.unwrap_or_else(|| defaults.separator.clone()),
        ..defaults
    };

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
    let out = BufWriter::new(stdout().lock());

    let count = if args.tokens {
        render_tokens(reader, &recipe, out)?
    } else {
        let mut writer = RowWriter::new(out, config);
        melt_ndjson(reader, &recipe, &mut writer)?
    };

    log::info!("melted {} values of `{}`", count, schema.name());
    Ok(())
}

/// Pass every value through its token stream and write the rendered JSON
fn render_tokens<R: BufRead, W: Write>(reader: R, recipe: &Recipe, mut out: W) -> Result<usize> {
    let ty = &recipe.root().ty;
    let mut count = 0;
    for line in reader.lines() {
        let line = line.context("Failed to read line")?;
        if line.trim().is_empty() {
            continue;
        }
        let record: Value = serde_json::from_str(&line).context("Failed to parse JSON")?;
        let value = value_from_json(ty, &record)?;
        let rendered = tokens_to_json(&mut emit_tokens(ty.clone(), value))?;
        writeln!(out, "{}", serde_json::to_string(&rendered)?)?;
        count += 1;
    }
    out.flush()?;
    Ok(count)
}

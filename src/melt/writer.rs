use crate::json::value_to_json;
use crate::melt::config::MeltConfig;
use crate::melt::plan::Recipe;
use crate::value::Value;
use anyhow::{Context, Result};
use serde_json::Value as Json;
use std::io::Write;

/// Writes flat rows as JSON Lines, one JSON array per row
pub struct RowWriter<W: Write> {
    writer: W,
    config: MeltConfig,
    rows: usize,
}

impl<W: Write> RowWriter<W> {
    pub fn new(writer: W, config: MeltConfig) -> Self {
        RowWriter {
            writer,
            config,
            rows: 0,
        }
    }

    /// Write the recipe's column names when the config asks for a header
    pub fn write_header(&mut self, recipe: &Recipe) -> Result<()> {
        if !self.config.header {
            return Ok(());
        }
        let names: Vec<Json> = recipe
            .columns(&self.config)?
            .into_iter()
            .map(|column| Json::String(column.name))
            .collect();
        self.write_json(&Json::Array(names))
    }

    pub fn write_row(&mut self, columns: &[Value]) -> Result<()> {
        let row = Json::Array(columns.iter().map(value_to_json).collect());
        self.write_json(&row)?;
        self.rows += 1;
        Ok(())
    }

    pub fn write_json(&mut self, json: &Json) -> Result<()> {
        let line = serde_json::to_string(json).context("Failed to serialize row")?;
        writeln!(self.writer, "{}", line).context("Failed to write row")
    }

    /// Rows written so far, header excluded
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush().context("Failed to flush writer")
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

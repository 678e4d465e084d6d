use anyhow::Result;
use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{Attribute, Cell, Color as TableColor, Table};
use serde::Serialize;
use std::io::{self, Write};

use sessmigrate::{CommittedProgress, MigrationSummary};

use crate::theme::{ACCENT, DIM, Tone};

/// Output format options for the final summary
#[derive(Clone, Debug, ValueEnum, Default, PartialEq)]
pub enum OutputFormat {
    /// Formatted table output (default)
    #[default]
    Table,
    /// JSON output for scripting
    Json,
    /// Compact single-line output
    Compact,
}

/// Global CLI options that affect output and behavior
#[derive(Clone, Debug, Default)]
pub struct GlobalOptions {
    pub output_format: OutputFormat,
    pub quiet: bool,
    pub verbose: bool,
    pub no_color: bool,
}

/// Trait for data that can be displayed as a table
pub trait TableDisplay {
    fn to_table(&self, options: &GlobalOptions) -> Table;
    fn to_compact(&self) -> String;
}

/// Output manager handles formatting and display
pub struct OutputManager {
    pub options: GlobalOptions,
}

impl OutputManager {
    pub fn new(options: GlobalOptions) -> Self {
        Self { options }
    }

    /// Whether human-oriented chatter should be printed at all.
    pub fn is_interactive(&self) -> bool {
        !self.options.quiet && !matches!(self.options.output_format, OutputFormat::Json)
    }

    /// Display data according to the configured output format
    pub fn display<T>(&self, data: &T) -> Result<()>
    where
        T: Serialize + TableDisplay,
    {
        match self.options.output_format {
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(data)?;
                println!("{json}");
            }
            OutputFormat::Table if !self.options.quiet => {
                let table = data.to_table(&self.options);
                println!("{table}");
            }
            OutputFormat::Table => {}
            OutputFormat::Compact => {
                println!("{}", data.to_compact());
            }
        }
        Ok(())
    }

    /// `<mark> <message>` in the tone's colour, or plain under `--no-color`.
    pub fn line(&self, tone: Tone, message: &str) -> String {
        if self.options.no_color {
            return format!("{} {message}", tone.mark());
        }
        let color = tone.color();
        format!("{} {}", tone.mark().color(color).bold(), message.color(color))
    }

    fn say(&self, tone: Tone, message: &str) {
        if self.is_interactive() {
            println!("{}", self.line(tone, message));
        }
    }

    pub fn success(&self, message: &str) {
        self.say(Tone::Done, message);
    }

    pub fn warning(&self, message: &str) {
        self.say(Tone::Caution, message);
    }

    pub fn info(&self, message: &str) {
        self.say(Tone::Note, message);
    }

    /// Errors go to stderr even under `--quiet`.
    pub fn error(&self, message: &str) {
        eprintln!("{}", self.line(Tone::Failed, message));
    }

    pub fn verbose(&self, message: &str) {
        if self.options.verbose && !self.options.quiet {
            eprintln!("{}", self.line(Tone::Detail, message));
        }
    }

    pub fn heading(&self, text: &str) {
        if !self.is_interactive() {
            return;
        }
        if self.options.no_color {
            println!("\n== {text} ==");
        } else {
            println!("\n{}", text.color(ACCENT).bold().underline());
        }
    }

    /// Aligned `label  value` setting line.
    pub fn field(&self, label: &str, value: &str) {
        if !self.is_interactive() {
            return;
        }
        let label = format!("{label:<12}");
        if self.options.no_color {
            println!("  {label} {value}");
        } else {
            println!("  {} {value}", label.color(DIM));
        }
    }

    /// Starts a `step... ` line, completed by [`OutputManager::end_step`].
    pub fn begin_step(&self, message: &str) {
        if self.is_interactive() {
            print!("{}... ", self.line(Tone::Note, message));
            let _ = io::stdout().flush();
        }
    }

    pub fn end_step(&self, outcome: &str) {
        if !self.is_interactive() {
            return;
        }
        if self.options.no_color {
            println!("{outcome}");
        } else {
            println!("{}", outcome.color(Tone::Done.color()));
        }
    }
}

fn themed_table(options: &GlobalOptions) -> Table {
    let mut table = Table::new();
    if options.no_color {
        table.load_preset(comfy_table::presets::ASCII_FULL);
    } else {
        table.load_preset(comfy_table::presets::UTF8_FULL_CONDENSED);
    }
    table
}

fn header_cell(text: &str, options: &GlobalOptions) -> Cell {
    let cell = Cell::new(text).add_attribute(Attribute::Bold);
    if options.no_color {
        cell
    } else {
        cell.fg(TableColor::Cyan)
    }
}

impl TableDisplay for MigrationSummary {
    fn to_table(&self, options: &GlobalOptions) -> Table {
        let mut table = themed_table(options);
        table.set_header(vec![header_cell("Metric", options), header_cell("Value", options)]);
        table.add_row(vec![Cell::new("Total"), Cell::new(self.total)]);
        table.add_row(vec![Cell::new("Written"), Cell::new(self.processed)]);
        table.add_row(vec![Cell::new("Skipped (expired)"), Cell::new(self.skipped)]);
        table.add_row(vec![Cell::new("Flushes"), Cell::new(self.flushes)]);
        table.add_row(vec![Cell::new("Elapsed"), Cell::new(format!("{:.3}s", self.elapsed_secs))]);
        table.add_row(vec![
            Cell::new("Throughput"),
            Cell::new(format!("{:.3}/s", self.throughput_per_second)),
        ]);
        if self.cancelled {
            table.add_row(vec![Cell::new("Cancelled"), Cell::new("yes")]);
        }
        table
    }

    fn to_compact(&self) -> String {
        format!("{self} skipped={}", self.skipped)
    }
}

impl TableDisplay for CommittedProgress {
    fn to_table(&self, options: &GlobalOptions) -> Table {
        let mut table = themed_table(options);
        table.set_header(vec![header_cell("Committed", options), header_cell("Value", options)]);
        table.add_row(vec![Cell::new("Chunks"), Cell::new(self.chunks)]);
        table.add_row(vec![Cell::new("Written"), Cell::new(self.processed)]);
        table.add_row(vec![Cell::new("Skipped (expired)"), Cell::new(self.skipped)]);
        table
    }

    fn to_compact(&self) -> String {
        format!(
            "committed chunks={} written={} skipped={}",
            self.chunks, self.processed, self.skipped
        )
    }
}

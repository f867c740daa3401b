use std::io::{self, Write};

use camino::Utf8Path;
use serde::Serialize;

use crate::catalogue::CatalogueResult;

/// Rows printed per aggregate in the terminal summary.
const SUMMARY_ROWS: usize = 10;

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Human,
    Json,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_catalogue(result: &CatalogueResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

pub struct TextOutput;

impl TextOutput {
    pub fn print_catalogue(result: &CatalogueResult, out: Option<&Utf8Path>) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        Self::write_catalogue(&mut stdout, result, out)
    }

    pub fn write_catalogue<W: Write>(
        writer: &mut W,
        result: &CatalogueResult,
        out: Option<&Utf8Path>,
    ) -> io::Result<()> {
        let green = "\x1b[32m";
        let yellow = "\x1b[33m";
        let cyan = "\x1b[36m";
        let reset = "\x1b[0m";

        writeln!(writer, "{cyan}VIROMEdash self catalogue{reset}")?;
        writeln!(
            writer,
            "{green}Accessions: {} requested, {} catalogued{reset}",
            result.requested,
            result.merged.rows.len()
        )?;
        if !result.unresolved.is_empty() {
            let missing = result
                .unresolved
                .iter()
                .map(|accession| accession.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            writeln!(writer, "{yellow}No record found: {missing}{reset}")?;
        }
        if result.unparsed_dates > 0 {
            writeln!(
                writer,
                "{yellow}Unreadable collection dates: {}{reset}",
                result.unparsed_dates
            )?;
        }

        for table in [&result.countries, &result.hosts] {
            writeln!(writer, "{cyan}{}{reset}", table.column)?;
            for row in table.top(SUMMARY_ROWS).rows {
                writeln!(writer, "  {:>6}  {}", row.count, row.key)?;
            }
        }
        writeln!(writer, "{cyan}Years{reset}")?;
        for row in &result.years.rows {
            writeln!(writer, "  {}  {:>6}  {:>6}", row.year, row.count, row.cumulative)?;
        }
        if let Some(path) = out {
            writeln!(writer, "{green}Merged table written to {path}{reset}")?;
        }
        Ok(())
    }
}

/*!
 * Export functionality for analytics results
 *
 * Any serializable row type (cohort entries, PDC results, PMPM results,
 * episode rows) can be written as a JSON array, JSON Lines or CSV.
 */

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use crate::{ClaimsError, ExportFormat, Result};

/// Trait for implementing result row exporters
pub trait RowExporter {
    /// Write all rows to `path`, replacing any existing file
    fn export<T: Serialize>(&self, rows: &[T], path: &Path) -> Result<()>;

    /// Get the export format
    fn format(&self) -> ExportFormat;
}

/// JSON exporter for result rows
pub struct JsonExporter {
    /// Whether to pretty-print the JSON
    pub pretty_print: bool,
    /// Whether to export as JSON Lines (one record per line)
    pub json_lines: bool,
}

impl Default for JsonExporter {
    fn default() -> Self {
        Self {
            pretty_print: true,
            json_lines: false,
        }
    }
}

impl JsonExporter {
    /// Create a new JSON exporter
    pub fn new() -> Self {
        Self::default()
    }

    /// Set pretty printing
    pub fn with_pretty_print(mut self, pretty: bool) -> Self {
        self.pretty_print = pretty;
        self
    }

    /// Set JSON Lines format
    pub fn as_json_lines(mut self) -> Self {
        self.json_lines = true;
        self.pretty_print = false;
        self
    }
}

impl RowExporter for JsonExporter {
    fn export<T: Serialize>(&self, rows: &[T], path: &Path) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        if self.json_lines {
            for row in rows {
                let json = serde_json::to_string(row)?;
                writeln!(writer, "{}", json)?;
            }
        } else if self.pretty_print {
            serde_json::to_writer_pretty(&mut writer, rows)?;
        } else {
            serde_json::to_writer(&mut writer, rows)?;
        }

        writer.flush()?;
        log::info!("Exported {} rows as {} to {}", rows.len(), self.format(), path.display());
        Ok(())
    }

    fn format(&self) -> ExportFormat {
        if self.json_lines {
            ExportFormat::JsonLines
        } else {
            ExportFormat::Json
        }
    }
}

/// CSV exporter for flat result rows
///
/// Rows must serialize to a flat record; nested values such as a full
/// [`crate::data_types::MedicalClaim`] are rejected with an export error.
pub struct CsvExporter {
    /// Field delimiter
    pub delimiter: u8,
    /// Whether to write a header row
    pub include_headers: bool,
}

impl Default for CsvExporter {
    fn default() -> Self {
        Self {
            delimiter: b',',
            include_headers: true,
        }
    }
}

impl CsvExporter {
    /// Create a new CSV exporter
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the field delimiter
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Set whether to write a header row
    pub fn with_headers(mut self, include: bool) -> Self {
        self.include_headers = include;
        self
    }

    fn export_error(&self, err: csv::Error) -> ClaimsError {
        ClaimsError::Export {
            message: err.to_string(),
            format: ExportFormat::Csv,
            suggestion: Some("CSV export needs flat rows; use JSON for nested results".to_string()),
        }
    }
}

impl RowExporter for CsvExporter {
    fn export<T: Serialize>(&self, rows: &[T], path: &Path) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = csv::WriterBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(self.include_headers)
            .from_writer(BufWriter::new(file));

        for row in rows {
            writer.serialize(row).map_err(|e| self.export_error(e))?;
        }
        writer.flush()?;

        log::info!("Exported {} rows as CSV to {}", rows.len(), path.display());
        Ok(())
    }

    fn format(&self) -> ExportFormat {
        ExportFormat::Csv
    }
}

/// Export rows to `path` using the default exporter for `format`
pub fn export_rows<T: Serialize, P: AsRef<Path>>(rows: &[T], path: P, format: ExportFormat) -> Result<()> {
    let path = path.as_ref();
    match format {
        ExportFormat::Json => JsonExporter::new().export(rows, path),
        ExportFormat::JsonLines => JsonExporter::new().as_json_lines().export(rows, path),
        ExportFormat::Csv => CsvExporter::new().export(rows, path),
    }
}

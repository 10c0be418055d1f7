/*!
 * Error handling for claims analytics operations
 *
 * Provides detailed error types with context, suggestions, and recovery guidance.
 * Empty results (no qualifying claims, no fills) are never errors; these types
 * only describe configuration problems, malformed input and I/O failures.
 */

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use serde::{Serialize, Deserialize};

/// Claims analytics result type
pub type Result<T> = std::result::Result<T, ClaimsError>;

/// Error types with context and suggestions
#[derive(Error, Debug)]
pub enum ClaimsError {
    /// File I/O errors with context
    #[error("I/O error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
        context: ErrorContext,
    },

    /// CSV parsing errors with location information
    #[error("CSV parsing error at line {line:?}: {message}")]
    CsvParse {
        message: String,
        line: Option<usize>,
        column: Option<String>,
        context: ErrorContext,
    },

    /// A required column is absent from an input table
    #[error("Missing required column '{column}' in {table}")]
    MissingColumn {
        column: String,
        table: String,
        suggestion: String,
    },

    /// A record holds a value that cannot be used as-is
    #[error("Data quality error in record {record:?}, field '{field}': {message}")]
    DataQuality {
        message: String,
        record: Option<String>,
        field: String,
        value: Option<String>,
        context: ErrorContext,
    },

    /// Date parsing errors with format hints
    #[error("Date parsing error: {message}")]
    DateParse {
        message: String,
        value: String,
        expected_format: String,
    },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        suggestion: Option<String>,
    },

    /// Export errors
    #[error("Export error: {message}")]
    Export {
        message: String,
        format: ExportFormat,
        suggestion: Option<String>,
    },

    /// Generic errors with custom message
    #[error("{message}")]
    Custom {
        message: String,
        suggestion: Option<String>,
    },
}

/// Error context providing additional information
#[derive(Debug, Default, Clone)]
pub struct ErrorContext {
    pub file_path: Option<PathBuf>,
    pub line_number: Option<usize>,
    pub column_name: Option<String>,
    pub member_id: Option<String>,
}

/// Output format for exported result rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    #[default]
    Json,
    JsonLines,
    Csv,
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportFormat::Json => write!(f, "JSON"),
            ExportFormat::JsonLines => write!(f, "JSON Lines"),
            ExportFormat::Csv => write!(f, "CSV"),
        }
    }
}

impl ClaimsError {
    /// Create a file not found error with a helpful suggestion
    pub fn file_not_found(path: PathBuf) -> Self {
        let message = format!("File not found: {}", path.display());
        let suggestion = format!(
            "Check if the file exists at '{}'. Make sure the path is correct and you have read permissions.",
            path.display()
        );

        Self::Custom {
            message,
            suggestion: Some(suggestion),
        }
    }

    /// Create a missing column error for the given input table
    pub fn missing_column(column: &str, table: &str) -> Self {
        Self::MissingColumn {
            column: column.to_string(),
            table: table.to_string(),
            suggestion: format!(
                "Add a '{}' column to the {} input or map an existing column to it in the [columns] configuration",
                column, table
            ),
        }
    }

    /// Create a data quality error for a single record field
    pub fn data_quality(
        message: impl Into<String>,
        record: Option<&str>,
        field: &str,
        value: Option<&str>,
    ) -> Self {
        Self::DataQuality {
            message: message.into(),
            record: record.map(str::to_string),
            field: field.to_string(),
            value: value.map(str::to_string),
            context: ErrorContext::default(),
        }
    }

    /// Create a date parsing error with format information
    pub fn date_parse_with_format(value: &str, expected_format: &str) -> Self {
        Self::DateParse {
            message: format!("Cannot parse '{}' as date", value),
            value: value.to_string(),
            expected_format: expected_format.to_string(),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>, suggestion: Option<&str>) -> Self {
        Self::Configuration {
            message: message.into(),
            suggestion: suggestion.map(str::to_string),
        }
    }

    /// Attach a line number and file to a data quality error raised while reading
    pub fn at_line(mut self, path: Option<PathBuf>, line: usize) -> Self {
        if let Self::DataQuality { context, .. } | Self::CsvParse { context, .. } = &mut self {
            context.line_number = Some(line);
            if path.is_some() {
                context.file_path = path;
            }
        }
        self
    }

    /// Get a user-friendly error message with suggestions
    pub fn user_message(&self) -> String {
        match self {
            Self::MissingColumn { suggestion, .. } => {
                format!("{}\n\nSuggestion: {}", self, suggestion)
            }
            Self::DataQuality { context, value, .. } => {
                let mut message = self.to_string();
                if let Some(value) = value {
                    message.push_str(&format!("\n\nOffending value: '{}'", value));
                }
                if let Some(line) = context.line_number {
                    message.push_str(&format!("\nLine: {}", line));
                }
                message
            }
            Self::DateParse { expected_format, .. } => {
                format!("{}\n\nExpected format: {}", self, expected_format)
            }
            Self::Configuration { suggestion: Some(sug), .. }
            | Self::Export { suggestion: Some(sug), .. }
            | Self::Custom { suggestion: Some(sug), .. } => {
                format!("{}\n\nSuggestion: {}", self, sug)
            }
            _ => self.to_string(),
        }
    }
}

// Convenience conversions
impl From<std::io::Error> for ClaimsError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
            source: err,
            context: ErrorContext::default(),
        }
    }
}

impl From<csv::Error> for ClaimsError {
    fn from(err: csv::Error) -> Self {
        let (line, message) = match err.position() {
            Some(pos) => (Some(pos.line() as usize), err.to_string()),
            None => (None, err.to_string()),
        };

        Self::CsvParse {
            message,
            line,
            column: None,
            context: ErrorContext::default(),
        }
    }
}

impl From<serde_json::Error> for ClaimsError {
    fn from(err: serde_json::Error) -> Self {
        ClaimsError::Export {
            message: err.to_string(),
            format: ExportFormat::Json,
            suggestion: Some("Check if the data is serializable to JSON.".to_string()),
        }
    }
}

impl From<::config::ConfigError> for ClaimsError {
    fn from(err: ::config::ConfigError) -> Self {
        ClaimsError::Configuration {
            message: err.to_string(),
            suggestion: Some("Check the config file and CLAIMS_* environment variables".to_string()),
        }
    }
}

use std::{fmt, io};

use csv::Error as CsvError;
use regex::Error as RegexError;
use serde::{Deserialize, Serialize};
use serde_json::Error as JsonError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
pub enum TaxomapError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Propagation did not converge: {0}")]
    Convergence(String),
    #[error("Custom error: {0}")]
    Custom(String),
    #[error("File System error: {0}")]
    Io(String),
    #[error("Item Not Found: {0}")]
    NotFound(String),
    #[error("You do not have permission to access this resource")]
    PermissionDenied,
    #[error("(De)Serialization error: {0}")]
    Serialization(String),
    #[error("Malformed table '{table}': {message}")]
    Table { table: String, message: String },
    #[error("Malformed taxonomy entry '{id}': {message}")]
    Taxonomy { id: String, message: String },
}

impl TaxomapError {
    pub fn taxonomy(id: impl Into<String>, message: impl Into<String>) -> Self {
        TaxomapError::Taxonomy {
            id: id.into(),
            message: message.into(),
        }
    }

    pub fn table(table: impl Into<String>, message: impl Into<String>) -> Self {
        TaxomapError::Table {
            table: table.into(),
            message: message.into(),
        }
    }

    /// True for errors that stem from bad input data rather than the environment.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            TaxomapError::Taxonomy { .. }
                | TaxomapError::Table { .. }
                | TaxomapError::Serialization(_)
                | TaxomapError::Config(_)
        )
    }
}

impl From<toml::de::Error> for TaxomapError {
    fn from(src: toml::de::Error) -> TaxomapError {
        TaxomapError::Config(format!("Toml deserialization error: {src}"))
    }
}

impl From<toml::ser::Error> for TaxomapError {
    fn from(src: toml::ser::Error) -> TaxomapError {
        TaxomapError::Serialization(format!("Toml serialization error: {src}"))
    }
}

impl From<JsonError> for TaxomapError {
    fn from(src: JsonError) -> TaxomapError {
        TaxomapError::Serialization(format!("JSON (de)serialization error: {src}"))
    }
}

impl From<CsvError> for TaxomapError {
    fn from(src: CsvError) -> TaxomapError {
        match src.kind() {
            csv::ErrorKind::Io(err) => TaxomapError::Io(format!("CSV IOError: {}", err.kind())),
            _ => TaxomapError::Serialization(format!("CSV (de)serialization error: {src}")),
        }
    }
}

impl From<io::Error> for TaxomapError {
    fn from(x: io::Error) -> Self {
        match x.kind() {
            io::ErrorKind::NotFound => TaxomapError::NotFound(format!("{x}")),
            io::ErrorKind::PermissionDenied => TaxomapError::PermissionDenied,
            _ => TaxomapError::Io(format!("IOError: {}", x.kind())),
        }
    }
}

impl From<fmt::Error> for TaxomapError {
    fn from(x: fmt::Error) -> Self {
        TaxomapError::Custom(format!("{x}"))
    }
}

impl From<RegexError> for TaxomapError {
    fn from(x: RegexError) -> Self {
        TaxomapError::Serialization(format!("Regex parse failed: {x}"))
    }
}

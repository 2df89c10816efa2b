use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CommissionError {
    #[error("Could not detect the sheet layout: missing columns {}", .missing.join("; "))]
    FormatDetection { missing: Vec<String> },

    #[error("Column for '{field}' is ambiguous: matched {}", .columns.join(", "))]
    MappingAmbiguity { field: String, columns: Vec<String> },

    #[error("Saved column mapping does not fit this sheet: {0}")]
    MappingOverride(String),

    #[error("Invalid commission rate {0}: must be >= 0")]
    InvalidRate(Decimal),

    #[error("Unsupported file '{0}': expected .csv, .xlsx, .xlsm, .xls or .ods")]
    UnsupportedFile(String),

    #[error("Amounts too large to compute the {0}")]
    Overflow(&'static str),

    #[error("Sheet has no header row")]
    EmptySheet,

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Excel error: {0}")]
    Excel(#[from] calamine::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CommissionError>;

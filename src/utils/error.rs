use crate::domain::model::{IndicatorKind, Region};
use thiserror::Error;

/// Source could not be turned into a raw table. Always fatal.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("cannot read data source '{path}': {source}")]
    Unreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("data source '{path}' is not valid delimited text: {source}")]
    Malformed {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error("data source '{path}' is missing required columns: {}", .columns.join(", "))]
    MissingColumns { path: String, columns: Vec<String> },
}

/// A single row could not be normalized. The row is skipped.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NormalizationError {
    #[error("unknown region code '{code}'")]
    UnknownRegion { code: String },

    #[error("unparseable period '{value}'")]
    InvalidPeriod { value: String },

    #[error("invalid value '{value}' in column '{column}'")]
    InvalidValue { column: String, value: String },

    #[error("missing value for column '{column}'")]
    MissingField { column: String },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AggregationError {
    #[error("no valid {kind} records for region {region}")]
    MissingIndicator { region: Region, kind: IndicatorKind },
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("cannot write '{destination}': {source}")]
    Write {
        destination: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot encode '{destination}': {reason}")]
    Encode { destination: String, reason: String },
}

#[derive(Error, Debug)]
pub enum EtlError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Aggregation(#[from] AggregationError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[cfg(feature = "fetch")]
    #[error("Download failed: {0}")]
    FetchError(#[from] reqwest::Error),

    #[cfg(feature = "fetch")]
    #[error("Archive error: {0}")]
    ArchiveError(#[from] zip::result::ZipError),

    #[error("Archive '{source_url}' contains no data file")]
    EmptyArchive { source_url: String },

    #[error("Configuration error in '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Input,
    Data,
    Output,
    Network,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Medium,
    High,
    Critical,
}

impl ErrorSeverity {
    /// Process exit code for a run that ended with this severity.
    pub fn exit_code(&self) -> i32 {
        match self {
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }
}

impl EtlError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            EtlError::Load(_) => ErrorCategory::Input,
            EtlError::Aggregation(_) => ErrorCategory::Data,
            EtlError::Export(_) | EtlError::IoError(_) => ErrorCategory::Output,
            #[cfg(feature = "fetch")]
            EtlError::FetchError(_) => ErrorCategory::Network,
            #[cfg(feature = "fetch")]
            EtlError::ArchiveError(_) => ErrorCategory::Input,
            EtlError::EmptyArchive { .. } => ErrorCategory::Input,
            EtlError::ConfigValidationError { .. } | EtlError::InvalidConfigValueError { .. } => {
                ErrorCategory::Configuration
            }
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Configuration | ErrorCategory::Input | ErrorCategory::Data => {
                ErrorSeverity::High
            }
            ErrorCategory::Output => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            EtlError::Load(LoadError::Unreadable { .. }) => {
                "Check the input path, or run fetch-permits to download the dataset"
            }
            EtlError::Load(LoadError::Malformed { .. }) => {
                "Check the delimiter setting and the file encoding (UTF-8 expected)"
            }
            EtlError::Load(LoadError::MissingColumns { .. }) => {
                "Check the source layout and the column names in [source.columns]"
            }
            EtlError::Aggregation(_) => {
                "Make sure every selected region has new-build, apartment and renovation data"
            }
            EtlError::Export(_) | EtlError::IoError(_) => {
                "Check that the output directory is writable and has free space"
            }
            #[cfg(feature = "fetch")]
            EtlError::FetchError(_) => "Check the network connection and the download URL",
            #[cfg(feature = "fetch")]
            EtlError::ArchiveError(_) => "The downloaded archive is damaged; try downloading again",
            EtlError::EmptyArchive { .. } => "The archive layout changed; extract the data file manually",
            EtlError::ConfigValidationError { .. } | EtlError::InvalidConfigValueError { .. } => {
                "Fix the configuration value and run again"
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::Input => format!("Could not read input data: {}", self),
            ErrorCategory::Data => format!("Input data is incomplete: {}", self),
            ErrorCategory::Output => format!("Could not write results: {}", self),
            ErrorCategory::Network => format!("Download failed: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;

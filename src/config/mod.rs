#[cfg(feature = "cli")]
pub mod cli;
pub mod settings;
pub mod toml_config;

#[cfg(feature = "cli")]
pub use cli::CliConfig;
pub use settings::{
    ColumnNames, ExportLayout, ExportSettings, ShareScale, SourceLayout, SourceSettings,
    DEFAULT_ABSENT_MARKER, DEFAULT_DECIMALS, DEFAULT_TREND_WINDOW,
};
pub use toml_config::TomlConfig;

use crate::domain::ports::ConfigProvider;
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{validate_path, validate_positive_number, Validate};

/// Checks shared by every configuration source.
pub fn validate_provider<C: ConfigProvider>(config: &C) -> Result<()> {
    validate_path("input", config.input_path())?;
    validate_path("output_path", config.output_path())?;
    validate_positive_number("trend.window", config.trend_window(), 1)?;

    if config.regions().is_empty() {
        return Err(EtlError::ConfigValidationError {
            field: "normalize.regions".to_string(),
            message: "At least one region must be selected".to_string(),
        });
    }

    config.source().validate()?;
    config.export().validate()
}

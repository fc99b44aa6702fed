use crate::domain::model::{IndicatorKind, Region};
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{validate_non_empty_string, validate_range, Validate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const DEFAULT_TREND_WINDOW: usize = 12;
pub const DEFAULT_ABSENT_MARKER: &str = "NA";
pub const DEFAULT_DECIMALS: usize = 3;

/// Shape of the input file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum SourceLayout {
    /// Statbel layout: one row per unit and month, one column per measure.
    #[default]
    Wide,
    /// One row per observation: region, period, indicator code, value.
    Long,
}

impl SourceLayout {
    pub fn default_delimiter(&self) -> char {
        match self {
            SourceLayout::Wide => '|',
            SourceLayout::Long => ',',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnNames {
    /// Defaults to `REFNIS` for the wide layout and `region` for the long one.
    pub region: Option<String>,
    /// Geographic level column; rows not at region level are dropped.
    pub level: Option<String>,
    pub year: String,
    pub month: String,
    pub new_build: String,
    pub apartments: String,
    pub renovation: String,
    pub period: String,
    pub indicator: String,
    pub value: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            region: None,
            level: Some("CD_REFNIS_LEVEL".to_string()),
            year: "CD_YEAR".to_string(),
            month: "CD_PERIOD".to_string(),
            new_build: "MS_DWELLING_RES_NEW".to_string(),
            apartments: "MS_APARTMENT_RES_NEW".to_string(),
            renovation: "MS_BUILDING_RES_RENOVATION".to_string(),
            period: "period".to_string(),
            indicator: "indicator".to_string(),
            value: "value".to_string(),
        }
    }
}

impl ColumnNames {
    pub fn region(&self, layout: SourceLayout) -> &str {
        match (&self.region, layout) {
            (Some(column), _) => column.as_str(),
            (None, SourceLayout::Wide) => "REFNIS",
            (None, SourceLayout::Long) => "region",
        }
    }

    pub fn measure(&self, kind: IndicatorKind) -> &str {
        match kind {
            IndicatorKind::NewBuild => &self.new_build,
            IndicatorKind::Apartments => &self.apartments,
            IndicatorKind::Renovation => &self.renovation,
        }
    }

    pub fn required(&self, layout: SourceLayout) -> Vec<&str> {
        match layout {
            SourceLayout::Wide => {
                let mut cols = vec![
                    self.region(layout),
                    self.year.as_str(),
                    self.month.as_str(),
                ];
                if let Some(level) = &self.level {
                    cols.push(level.as_str());
                }
                cols.extend(IndicatorKind::ALL.iter().map(|k| self.measure(*k)));
                cols
            }
            SourceLayout::Long => vec![
                self.region(layout),
                self.period.as_str(),
                self.indicator.as_str(),
                self.value.as_str(),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
    pub layout: SourceLayout,
    pub delimiter: Option<char>,
    pub columns: ColumnNames,
    /// Extra region codes on top of the built-in REFNIS codes and names.
    pub region_codes: HashMap<String, Region>,
    /// Extra indicator codes for the long layout.
    pub indicator_codes: HashMap<String, IndicatorKind>,
}

impl SourceSettings {
    pub fn for_layout(layout: SourceLayout) -> Self {
        Self {
            layout,
            ..Self::default()
        }
    }

    pub fn delimiter(&self) -> char {
        self.delimiter
            .unwrap_or_else(|| self.layout.default_delimiter())
    }
}

impl Validate for SourceSettings {
    fn validate(&self) -> Result<()> {
        let delimiter = self.delimiter();
        if !delimiter.is_ascii() || delimiter == '"' || delimiter == '\n' {
            return Err(EtlError::InvalidConfigValueError {
                field: "source.delimiter".to_string(),
                value: delimiter.to_string(),
                reason: "Delimiter must be a single ASCII character other than quote or newline"
                    .to_string(),
            });
        }

        for column in self.columns.required(self.layout) {
            validate_non_empty_string("source.columns", column)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum ExportLayout {
    /// One row per period, a monthly and a trend column per region.
    #[default]
    Wide,
    /// One row per region and period.
    Long,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShareScale {
    #[default]
    Fraction,
    Percent,
}

impl ShareScale {
    pub fn factor(&self) -> f64 {
        match self {
            ShareScale::Fraction => 1.0,
            ShareScale::Percent => 100.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    pub layout: ExportLayout,
    pub absent_marker: String,
    pub decimals: usize,
    pub share_scale: ShareScale,
    pub summary: bool,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            layout: ExportLayout::Wide,
            absent_marker: DEFAULT_ABSENT_MARKER.to_string(),
            decimals: DEFAULT_DECIMALS,
            share_scale: ShareScale::Fraction,
            summary: true,
        }
    }
}

impl Validate for ExportSettings {
    fn validate(&self) -> Result<()> {
        validate_range("export.decimals", self.decimals, 0, 10)?;
        if self.absent_marker.contains(['\n', '\r']) {
            return Err(EtlError::InvalidConfigValueError {
                field: "export.absent_marker".to_string(),
                value: self.absent_marker.clone(),
                reason: "Marker cannot contain line breaks".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wide_layout_requires_measure_columns() {
        let cols = ColumnNames::default();
        let required = cols.required(SourceLayout::Wide);
        assert!(required.contains(&"MS_APARTMENT_RES_NEW"));
        assert!(required.contains(&"CD_REFNIS_LEVEL"));
        assert_eq!(required.len(), 7);
    }

    #[test]
    fn test_long_layout_defaults() {
        let source = SourceSettings::for_layout(SourceLayout::Long);
        assert_eq!(source.delimiter(), ',');
        assert_eq!(
            source.columns.required(SourceLayout::Long),
            vec!["region", "period", "indicator", "value"]
        );
    }

    #[test]
    fn test_non_ascii_delimiter_rejected() {
        let source = SourceSettings {
            delimiter: Some('§'),
            ..SourceSettings::default()
        };
        assert!(source.validate().is_err());
    }

    #[test]
    fn test_export_decimals_range() {
        let mut export = ExportSettings::default();
        assert!(export.validate().is_ok());
        export.decimals = 42;
        assert!(export.validate().is_err());
    }
}

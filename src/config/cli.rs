use crate::config::settings::{
    ExportLayout, ExportSettings, ShareScale, SourceLayout, SourceSettings, DEFAULT_ABSENT_MARKER,
    DEFAULT_DECIMALS, DEFAULT_TREND_WINDOW,
};
use crate::domain::model::Region;
use crate::domain::ports::ConfigProvider;
use crate::utils::error::Result;
use crate::utils::validation::Validate;
use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "permit-trends")]
#[command(about = "Monthly building-permit series and 12-month trends per Belgian region")]
pub struct CliConfig {
    /// Delimited permits file (Statbel TF_BUILDING_PERMITS export by default)
    #[arg(long, default_value = "data/TF_BUILDING_PERMITS.txt")]
    pub input: String,

    #[arg(long, default_value = "./output")]
    pub output_path: String,

    #[arg(long, value_enum, default_value_t = SourceLayout::Wide)]
    pub layout: SourceLayout,

    /// Field delimiter; `|` for the wide layout and `,` for the long one when omitted
    #[arg(long)]
    pub delimiter: Option<char>,

    /// Regions to keep; all three when omitted
    #[arg(long, value_enum, value_delimiter = ',')]
    pub regions: Vec<Region>,

    #[arg(long, default_value_t = DEFAULT_TREND_WINDOW)]
    pub trend_window: usize,

    #[arg(long, default_value = DEFAULT_ABSENT_MARKER)]
    pub absent_marker: String,

    #[arg(long, default_value_t = DEFAULT_DECIMALS)]
    pub decimals: usize,

    #[arg(long, value_enum, default_value_t = ExportLayout::Wide)]
    pub export_layout: ExportLayout,

    /// Write apartment shares as percentages instead of fractions
    #[arg(long)]
    pub share_percent: bool,

    /// Skip run_summary.json
    #[arg(long)]
    pub no_summary: bool,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON lines")]
    pub json_logs: bool,

    #[arg(long, help = "Log per-phase timing and memory usage")]
    pub monitor: bool,
}

impl ConfigProvider for CliConfig {
    fn input_path(&self) -> &str {
        &self.input
    }

    fn output_path(&self) -> &str {
        &self.output_path
    }

    fn source(&self) -> SourceSettings {
        SourceSettings {
            delimiter: self.delimiter,
            ..SourceSettings::for_layout(self.layout)
        }
    }

    fn regions(&self) -> Vec<Region> {
        if self.regions.is_empty() {
            return Region::ALL.to_vec();
        }
        let mut regions = self.regions.clone();
        regions.sort();
        regions.dedup();
        regions
    }

    fn trend_window(&self) -> usize {
        self.trend_window
    }

    fn export(&self) -> ExportSettings {
        ExportSettings {
            layout: self.export_layout,
            absent_marker: self.absent_marker.clone(),
            decimals: self.decimals,
            share_scale: if self.share_percent {
                ShareScale::Percent
            } else {
                ShareScale::Fraction
            },
            summary: !self.no_summary,
        }
    }
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        crate::config::validate_provider(self)
    }
}

use crate::core::aggregator::{aggregate, Aggregates};
use crate::core::exporter::export_analysis;
use crate::core::loader::load_table;
use crate::core::normalizer::Normalizer;
use crate::core::trend::trailing_average;
use crate::domain::model::{Analysis, ExportReport, Indicator, RawTable, SeriesBundle};
use crate::domain::ports::{ConfigProvider, Pipeline, Storage};
use crate::utils::error::Result;

/// Loads a permit extract, derives the monthly series with their trailing
/// means and writes the export tables.
///
/// `input` resolves the source path, `output` receives the exported files.
pub struct PermitPipeline<S: Storage, C: ConfigProvider> {
    input: S,
    output: S,
    config: C,
}

impl<S: Storage, C: ConfigProvider> PermitPipeline<S, C> {
    pub fn new(input: S, output: S, config: C) -> Self {
        Self {
            input,
            output,
            config,
        }
    }
}

impl<S: Storage, C: ConfigProvider> Pipeline for PermitPipeline<S, C> {
    fn extract(&self) -> Result<RawTable> {
        let source = self.config.source();
        tracing::debug!(
            "Loading {:?} layout from {}",
            source.layout,
            self.input.describe(self.config.input_path())
        );
        let table = load_table(&self.input, self.config.input_path(), &source)?;
        Ok(table)
    }

    fn transform(&self, table: RawTable) -> Result<Analysis> {
        let regions = self.config.regions();
        let window = self.config.trend_window();

        let normalizer = Normalizer::new(&self.config.source(), &regions);
        let (records, report) = normalizer.normalize(&table);
        tracing::debug!(
            "Normalized {} records from {} rows",
            report.records,
            report.rows_seen
        );

        let Aggregates {
            series,
            mut share_inputs,
        } = aggregate(&records, &regions)?;
        let series = series
            .into_iter()
            .map(|(key, monthly)| {
                let trend = trailing_average(&monthly, window);
                let inputs = match key.indicator {
                    Indicator::ApartmentShare => share_inputs.remove(&key.region),
                    _ => None,
                };
                (
                    key,
                    SeriesBundle {
                        monthly,
                        trend,
                        inputs,
                    },
                )
            })
            .collect();

        Ok(Analysis {
            regions,
            trend_window: window,
            report,
            series,
        })
    }

    fn load(&self, analysis: &Analysis) -> Result<ExportReport> {
        let report = export_analysis(
            &self.output,
            self.config.output_path(),
            analysis,
            &self.config.export(),
        )?;
        Ok(report)
    }
}

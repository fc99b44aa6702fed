use crate::domain::model::{Analysis, ExportReport};
use crate::domain::ports::Pipeline;
use crate::utils::error::Result;
use crate::utils::monitor::RunMonitor;

/// What a completed run produced.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub analysis: Analysis,
    pub export: ExportReport,
}

pub struct EtlEngine<P: Pipeline> {
    pipeline: P,
    monitor: RunMonitor,
}

impl<P: Pipeline> EtlEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: RunMonitor::new(monitor_enabled),
        }
    }

    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    /// Runs extract, transform and load in order. The first failing stage
    /// ends the run and nothing after it is attempted.
    pub fn run(&self) -> Result<RunOutcome> {
        tracing::info!("🚀 Starting permit trend run");

        tracing::info!("📥 Extracting data...");
        let table = self.pipeline.extract()?;
        tracing::info!("Extracted {} rows", table.len());
        self.monitor.phase_done("extract");

        tracing::info!("🔄 Transforming data...");
        let analysis = self.pipeline.transform(table)?;
        tracing::info!(
            "Built {} series from {} records ({} rows skipped, {} filtered)",
            analysis.series.len(),
            analysis.report.records,
            analysis.report.rows_skipped,
            analysis.report.rows_filtered
        );
        self.monitor.phase_done("transform");

        tracing::info!("💾 Writing output...");
        let export = self.pipeline.load(&analysis)?;
        tracing::info!(
            "Wrote {} files to {}",
            export.files.len(),
            export.output_dir
        );
        self.monitor.phase_done("load");
        self.monitor.finish();

        Ok(RunOutcome { analysis, export })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{NormalizeReport, RawTable};
    use crate::utils::error::{EtlError, ExportError};
    use std::cell::RefCell;
    use std::collections::BTreeMap;

    #[derive(Default)]
    struct RecordingPipeline {
        calls: RefCell<Vec<&'static str>>,
        fail_transform: bool,
    }

    impl Pipeline for RecordingPipeline {
        fn extract(&self) -> Result<RawTable> {
            self.calls.borrow_mut().push("extract");
            Ok(RawTable::default())
        }

        fn transform(&self, _table: RawTable) -> Result<Analysis> {
            self.calls.borrow_mut().push("transform");
            if self.fail_transform {
                return Err(EtlError::Export(ExportError::Encode {
                    destination: "nowhere".to_string(),
                    reason: "boom".to_string(),
                }));
            }
            Ok(Analysis {
                regions: vec![],
                trend_window: 12,
                report: NormalizeReport::default(),
                series: BTreeMap::new(),
            })
        }

        fn load(&self, _analysis: &Analysis) -> Result<ExportReport> {
            self.calls.borrow_mut().push("load");
            Ok(ExportReport {
                output_dir: "out".to_string(),
                files: vec!["new_build.csv".to_string()],
            })
        }
    }

    #[test]
    fn test_run_calls_stages_in_order() {
        let engine = EtlEngine::new(RecordingPipeline::default());
        let outcome = engine.run().unwrap();

        assert_eq!(*engine.pipeline().calls.borrow(), vec!["extract", "transform", "load"]);
        assert_eq!(outcome.export.output_dir, "out");
        assert_eq!(outcome.analysis.trend_window, 12);
    }

    #[test]
    fn test_failed_stage_stops_the_run() {
        let engine = EtlEngine::new_with_monitoring(
            RecordingPipeline {
                fail_transform: true,
                ..RecordingPipeline::default()
            },
            true,
        );

        assert!(engine.run().is_err());
        assert_eq!(*engine.pipeline().calls.borrow(), vec!["extract", "transform"]);
    }
}

use crate::config::{ExportLayout, ExportSettings};
use crate::domain::model::{Analysis, ExportReport, Indicator, Period, Region, SeriesBundle};
use crate::domain::ports::Storage;
use crate::utils::error::ExportError;
use serde::Serialize;
use std::collections::BTreeSet;

pub const SUMMARY_FILE: &str = "run_summary.json";

pub fn table_file_name(indicator: Indicator) -> String {
    format!("{}.csv", indicator.slug())
}

/// Writes one CSV per indicator and, if enabled, the run summary.
/// Existing files are overwritten.
pub fn export_analysis<S: Storage>(
    storage: &S,
    output_dir: &str,
    analysis: &Analysis,
    settings: &ExportSettings,
) -> Result<ExportReport, ExportError> {
    let mut files = Vec::new();

    for indicator in Indicator::ALL {
        let name = table_file_name(indicator);
        let bytes = render_table(analysis, indicator, settings)
            .map_err(|reason| encode_error(storage, &name, reason))?;
        write(storage, &name, &bytes)?;
        tracing::debug!("Wrote {} ({} bytes)", storage.describe(&name), bytes.len());
        files.push(name);
    }

    if settings.summary {
        let summary = RunSummary::new(analysis, &files);
        let mut bytes = serde_json::to_vec_pretty(&summary)
            .map_err(|e| encode_error(storage, SUMMARY_FILE, e.to_string()))?;
        bytes.push(b'\n');
        write(storage, SUMMARY_FILE, &bytes)?;
        files.push(SUMMARY_FILE.to_string());
    }

    Ok(ExportReport {
        output_dir: output_dir.to_string(),
        files,
    })
}

fn write<S: Storage>(storage: &S, name: &str, bytes: &[u8]) -> Result<(), ExportError> {
    storage
        .write_file(name, bytes)
        .map_err(|source| ExportError::Write {
            destination: storage.describe(name),
            source,
        })
}

fn encode_error<S: Storage>(storage: &S, name: &str, reason: String) -> ExportError {
    ExportError::Encode {
        destination: storage.describe(name),
        reason,
    }
}

/// Renders the CSV table for one indicator across the analysed regions.
pub fn render_table(
    analysis: &Analysis,
    indicator: Indicator,
    settings: &ExportSettings,
) -> Result<Vec<u8>, String> {
    let bundles = analysis.indicator(indicator);
    let cells = CellFormat::new(indicator, settings);
    let mut writer = csv::Writer::from_writer(Vec::new());

    let written = match settings.layout {
        ExportLayout::Wide => write_wide(&mut writer, &bundles, &cells),
        ExportLayout::Long => write_long(&mut writer, &bundles, &cells),
    };
    written.map_err(|e| e.to_string())?;

    writer.into_inner().map_err(|e| e.to_string())
}

fn write_wide(
    writer: &mut csv::Writer<Vec<u8>>,
    bundles: &[(Region, &SeriesBundle)],
    cells: &CellFormat,
) -> csv::Result<()> {
    let mut header = vec!["period".to_string()];
    for (region, _) in bundles {
        header.push(format!("{}_monthly", region.slug()));
        header.push(format!("{}_trend", region.slug()));
        if cells.with_inputs() {
            header.push(format!("{}_apartments", region.slug()));
            header.push(format!("{}_dwellings", region.slug()));
        }
    }
    writer.write_record(&header)?;

    let periods: BTreeSet<Period> = bundles
        .iter()
        .flat_map(|(_, bundle)| bundle.monthly.periods())
        .collect();

    for period in periods {
        let mut row = vec![period.to_string()];
        for (_, bundle) in bundles {
            let monthly = bundle.monthly.get(period).and_then(|p| p.value);
            let trend = bundle.trend.get(period).and_then(|p| p.value);
            row.push(cells.monthly(monthly));
            row.push(cells.trend(trend));
            if cells.with_inputs() {
                let (apartments, dwellings) = share_inputs(bundle, period);
                row.push(cells.count(apartments));
                row.push(cells.count(dwellings));
            }
        }
        writer.write_record(&row)?;
    }

    writer.flush()?;
    Ok(())
}

fn write_long(
    writer: &mut csv::Writer<Vec<u8>>,
    bundles: &[(Region, &SeriesBundle)],
    cells: &CellFormat,
) -> csv::Result<()> {
    let mut header = vec!["period", "region", "monthly", "trend"];
    if cells.with_inputs() {
        header.extend(["apartments", "dwellings"]);
    }
    writer.write_record(&header)?;

    for (region, bundle) in bundles {
        for (point, trend) in bundle.monthly.points().iter().zip(&bundle.trend.points) {
            let mut row = vec![
                point.period.to_string(),
                region.slug().to_string(),
                cells.monthly(point.value),
                cells.trend(trend.value),
            ];
            if cells.with_inputs() {
                let (apartments, dwellings) = share_inputs(bundle, point.period);
                row.push(cells.count(apartments));
                row.push(cells.count(dwellings));
            }
            writer.write_record(&row)?;
        }
    }

    writer.flush()?;
    Ok(())
}

/// Summed apartments and dwellings behind a share cell, if recorded.
fn share_inputs(bundle: &SeriesBundle, period: Period) -> (Option<f64>, Option<f64>) {
    let Some(inputs) = &bundle.inputs else {
        return (None, None);
    };
    (
        inputs.apartments.get(period).and_then(|p| p.value),
        inputs.dwellings.get(period).and_then(|p| p.value),
    )
}

struct CellFormat {
    absent: String,
    decimals: usize,
    /// Scale for ratio indicators; `None` for counts.
    ratio_scale: Option<f64>,
}

impl CellFormat {
    fn new(indicator: Indicator, settings: &ExportSettings) -> Self {
        Self {
            absent: settings.absent_marker.clone(),
            decimals: settings.decimals,
            ratio_scale: indicator
                .is_ratio()
                .then(|| settings.share_scale.factor()),
        }
    }

    /// Ratio tables also carry the counts the ratio was computed from.
    fn with_inputs(&self) -> bool {
        self.ratio_scale.is_some()
    }

    fn monthly(&self, value: Option<f64>) -> String {
        match self.ratio_scale {
            Some(scale) => self.scaled(value, scale),
            None => self.count(value),
        }
    }

    // counts keep their exact shortest form
    fn count(&self, value: Option<f64>) -> String {
        match value {
            None => self.absent.clone(),
            Some(v) => format!("{}", v),
        }
    }

    fn scaled(&self, value: Option<f64>, scale: f64) -> String {
        match value {
            None => self.absent.clone(),
            Some(v) => format!("{:.*}", self.decimals, v * scale),
        }
    }

    fn trend(&self, value: Option<f64>) -> String {
        self.scaled(value, self.ratio_scale.unwrap_or(1.0))
    }
}

#[derive(Debug, Serialize)]
struct RunSummary<'a> {
    rows_read: usize,
    rows_skipped: usize,
    rows_filtered: usize,
    records: usize,
    trend_window: usize,
    regions: &'a [Region],
    series: Vec<SeriesSummary>,
    files: &'a [String],
}

#[derive(Debug, Serialize)]
struct SeriesSummary {
    region: Region,
    indicator: Indicator,
    points: usize,
    absent_points: usize,
    trend_points: usize,
    first_period: Option<Period>,
    last_period: Option<Period>,
}

impl<'a> RunSummary<'a> {
    fn new(analysis: &'a Analysis, files: &'a [String]) -> Self {
        let series = analysis
            .series
            .iter()
            .map(|(key, bundle)| SeriesSummary {
                region: key.region,
                indicator: key.indicator,
                points: bundle.monthly.len(),
                absent_points: bundle
                    .monthly
                    .points()
                    .iter()
                    .filter(|p| p.value.is_none())
                    .count(),
                trend_points: bundle.trend.defined(),
                first_period: bundle.monthly.first_period(),
                last_period: bundle.monthly.last_period(),
            })
            .collect();

        Self {
            rows_read: analysis.report.rows_seen,
            rows_skipped: analysis.report.rows_skipped,
            rows_filtered: analysis.report.rows_filtered,
            records: analysis.report.records,
            trend_window: analysis.trend_window,
            regions: &analysis.regions,
            series,
            files,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ShareScale;
    use crate::core::trend::trailing_average;
    use crate::domain::model::{NormalizeReport, SeriesKey, ShareInputs, TimeSeries};
    use std::cell::RefCell;
    use std::collections::{BTreeMap, HashMap};
    use std::io;

    #[derive(Default)]
    struct MemoryStorage {
        files: RefCell<HashMap<String, Vec<u8>>>,
        read_only: bool,
    }

    impl Storage for MemoryStorage {
        fn read_file(&self, path: &str) -> io::Result<Vec<u8>> {
            self.files
                .borrow()
                .get(path)
                .cloned()
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.to_string()))
        }

        fn write_file(&self, path: &str, data: &[u8]) -> io::Result<()> {
            if self.read_only {
                return Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"));
            }
            self.files.borrow_mut().insert(path.to_string(), data.to_vec());
            Ok(())
        }

        fn describe(&self, path: &str) -> String {
            format!("mem://{}", path)
        }
    }

    fn series(values: &[(u32, Option<f64>)]) -> TimeSeries {
        let map: BTreeMap<Period, Option<f64>> = values
            .iter()
            .map(|&(m, v)| (Period::new(2023, m).unwrap(), v))
            .collect();
        TimeSeries::from_map(map)
    }

    fn bundle(values: &[(u32, Option<f64>)], window: usize) -> SeriesBundle {
        let monthly = series(values);
        let trend = trailing_average(&monthly, window);
        SeriesBundle {
            monthly,
            trend,
            inputs: None,
        }
    }

    /// Share bundle built from `(month, apartments, dwellings)` sums.
    fn share_bundle(sums: &[(u32, f64, f64)]) -> SeriesBundle {
        let shares: Vec<(u32, Option<f64>)> = sums
            .iter()
            .map(|&(m, a, d)| (m, (d > 0.0).then(|| a / d)))
            .collect();
        let apartments: Vec<(u32, Option<f64>)> = sums.iter().map(|&(m, a, _)| (m, Some(a))).collect();
        let dwellings: Vec<(u32, Option<f64>)> = sums.iter().map(|&(m, _, d)| (m, Some(d))).collect();
        SeriesBundle {
            inputs: Some(ShareInputs {
                apartments: series(&apartments),
                dwellings: series(&dwellings),
            }),
            ..bundle(&shares, 1)
        }
    }

    fn analysis() -> Analysis {
        let mut series = BTreeMap::new();
        let regions = vec![Region::Flanders, Region::Brussels];
        series.insert(
            SeriesKey::new(Region::Flanders, Indicator::NewBuild),
            bundle(&[(1, Some(100.0)), (2, Some(120.0)), (3, Some(110.0))], 2),
        );
        series.insert(
            SeriesKey::new(Region::Brussels, Indicator::NewBuild),
            bundle(&[(2, Some(30.0)), (3, Some(40.0))], 2),
        );
        for region in &regions {
            series.insert(
                SeriesKey::new(*region, Indicator::Renovation),
                bundle(&[(1, Some(5.0))], 2),
            );
        }
        series.insert(
            SeriesKey::new(Region::Flanders, Indicator::ApartmentShare),
            share_bundle(&[(1, 40.0, 100.0), (2, 0.0, 0.0), (3, 55.0, 110.0)]),
        );
        series.insert(
            SeriesKey::new(Region::Brussels, Indicator::ApartmentShare),
            share_bundle(&[(2, 27.0, 30.0)]),
        );

        Analysis {
            regions,
            trend_window: 2,
            report: NormalizeReport {
                rows_seen: 10,
                rows_skipped: 1,
                rows_filtered: 2,
                records: 21,
            },
            series,
        }
    }

    fn render(indicator: Indicator, settings: &ExportSettings) -> String {
        String::from_utf8(render_table(&analysis(), indicator, settings).unwrap()).unwrap()
    }

    #[test]
    fn test_wide_table_unions_periods_and_marks_absent() {
        let csv = render(Indicator::NewBuild, &ExportSettings::default());
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(
            lines,
            vec![
                "period,flanders_monthly,flanders_trend,brussels_monthly,brussels_trend",
                "2023-01,100,NA,NA,NA",
                "2023-02,120,110.000,30,NA",
                "2023-03,110,115.000,40,35.000",
            ]
        );
    }

    #[test]
    fn test_share_table_as_percent() {
        let settings = ExportSettings {
            share_scale: ShareScale::Percent,
            decimals: 1,
            absent_marker: String::new(),
            ..ExportSettings::default()
        };
        let csv = render(Indicator::ApartmentShare, &settings);
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(
            lines,
            vec![
                "period,flanders_monthly,flanders_trend,flanders_apartments,flanders_dwellings,\
                 brussels_monthly,brussels_trend,brussels_apartments,brussels_dwellings",
                "2023-01,40.0,40.0,40,100,,,,",
                "2023-02,,,0,0,90.0,90.0,27,30",
                "2023-03,50.0,50.0,55,110,,,,",
            ]
        );
    }

    #[test]
    fn test_long_share_table_shows_counts_behind_absent_share() {
        let settings = ExportSettings {
            layout: ExportLayout::Long,
            ..ExportSettings::default()
        };
        let csv = render(Indicator::ApartmentShare, &settings);
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines[0], "period,region,monthly,trend,apartments,dwellings");
        assert_eq!(lines[1], "2023-01,flanders,0.400,0.400,40,100");
        assert_eq!(lines[2], "2023-02,flanders,NA,NA,0,0");
        assert_eq!(lines[4], "2023-02,brussels,0.900,0.900,27,30");
    }

    #[test]
    fn test_share_without_recorded_inputs_leaves_count_cells_absent() {
        let mut analysis = analysis();
        analysis.series.insert(
            SeriesKey::new(Region::Brussels, Indicator::ApartmentShare),
            bundle(&[(2, Some(0.9))], 1),
        );
        let bytes =
            render_table(&analysis, Indicator::ApartmentShare, &ExportSettings::default()).unwrap();
        let csv = String::from_utf8(bytes).unwrap();

        assert!(csv.contains("2023-02,NA,NA,0,0,0.900,0.900,NA,NA\n"));
    }

    #[test]
    fn test_long_layout_rows_per_region_and_period() {
        let settings = ExportSettings {
            layout: ExportLayout::Long,
            ..ExportSettings::default()
        };
        let csv = render(Indicator::NewBuild, &settings);
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines[0], "period,region,monthly,trend");
        assert_eq!(lines[1], "2023-01,flanders,100,NA");
        assert_eq!(lines[4], "2023-02,brussels,30,NA");
        assert_eq!(lines.len(), 6);
    }

    #[test]
    fn test_export_writes_all_tables_and_summary() {
        let storage = MemoryStorage::default();
        let report =
            export_analysis(&storage, "out", &analysis(), &ExportSettings::default()).unwrap();

        assert_eq!(
            report.files,
            vec![
                "new_build.csv",
                "renovation.csv",
                "apartment_share.csv",
                "run_summary.json"
            ]
        );

        let summary: serde_json::Value =
            serde_json::from_slice(&storage.read_file(SUMMARY_FILE).unwrap()).unwrap();
        assert_eq!(summary["rows_skipped"], 1);
        assert_eq!(summary["trend_window"], 2);
        assert_eq!(summary["regions"], serde_json::json!(["flanders", "brussels"]));
        assert_eq!(summary["series"][0]["first_period"], "2023-01");
    }

    #[test]
    fn test_export_is_deterministic() {
        let first = MemoryStorage::default();
        let second = MemoryStorage::default();
        export_analysis(&first, "out", &analysis(), &ExportSettings::default()).unwrap();
        export_analysis(&second, "out", &analysis(), &ExportSettings::default()).unwrap();

        assert_eq!(*first.files.borrow(), *second.files.borrow());
    }

    #[test]
    fn test_unwritable_destination_names_the_file() {
        let storage = MemoryStorage {
            read_only: true,
            ..MemoryStorage::default()
        };
        let err = export_analysis(&storage, "out", &analysis(), &ExportSettings::default())
            .unwrap_err();

        match err {
            ExportError::Write { destination, source } => {
                assert_eq!(destination, "mem://new_build.csv");
                assert_eq!(source.kind(), io::ErrorKind::PermissionDenied);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}

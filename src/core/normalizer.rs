use crate::config::{ColumnNames, SourceLayout, SourceSettings};
use crate::domain::model::{
    IndicatorKind, NormalizeReport, Period, PermitRecord, RawRow, RawTable, Region,
};
use crate::utils::error::NormalizationError;
use std::collections::HashMap;

/// REFNIS geographic level of the three regions.
const REGION_LEVEL: &str = "2";

const REGION_ALIASES: &[(&str, Region)] = &[
    ("02000", Region::Flanders),
    ("flanders", Region::Flanders),
    ("vlaams gewest", Region::Flanders),
    ("vlaanderen", Region::Flanders),
    ("région flamande", Region::Flanders),
    ("region flamande", Region::Flanders),
    ("03000", Region::Wallonia),
    ("wallonia", Region::Wallonia),
    ("waals gewest", Region::Wallonia),
    ("wallonië", Region::Wallonia),
    ("région wallonne", Region::Wallonia),
    ("region wallonne", Region::Wallonia),
    ("04000", Region::Brussels),
    ("brussels", Region::Brussels),
    ("brussels hoofdstedelijk gewest", Region::Brussels),
    ("région de bruxelles-capitale", Region::Brussels),
    ("region de bruxelles-capitale", Region::Brussels),
];

const INDICATOR_ALIASES: &[(&str, IndicatorKind)] = &[
    ("new_build", IndicatorKind::NewBuild),
    ("new-build", IndicatorKind::NewBuild),
    ("ms_dwelling_res_new", IndicatorKind::NewBuild),
    ("nieuwbouw_woningen_totaal", IndicatorKind::NewBuild),
    ("renovation", IndicatorKind::Renovation),
    ("ms_building_res_renovation", IndicatorKind::Renovation),
    ("renovatie_gebouwen_wonen", IndicatorKind::Renovation),
    ("apartments", IndicatorKind::Apartments),
    ("ms_apartment_res_new", IndicatorKind::Apartments),
    ("nieuwbouw_appartementen", IndicatorKind::Apartments),
];

/// Lookup key: lowercase, and numeric codes without leading zeros so that
/// `2000` and `02000` match.
fn code_key(code: &str) -> String {
    let code = code.trim().to_lowercase();
    if !code.is_empty() && code.bytes().all(|b| b.is_ascii_digit()) {
        let stripped = code.trim_start_matches('0');
        if stripped.is_empty() {
            "0".to_string()
        } else {
            stripped.to_string()
        }
    } else {
        code
    }
}

enum RowOutcome {
    Records(Vec<PermitRecord>),
    /// Valid row outside the scope of the analysis.
    Filtered,
}

pub struct Normalizer {
    layout: SourceLayout,
    columns: ColumnNames,
    regions: Vec<Region>,
    region_codes: HashMap<String, Region>,
    indicator_codes: HashMap<String, IndicatorKind>,
}

impl Normalizer {
    pub fn new(source: &SourceSettings, regions: &[Region]) -> Self {
        let mut region_codes: HashMap<String, Region> = REGION_ALIASES
            .iter()
            .map(|(code, region)| (code_key(code), *region))
            .collect();
        region_codes.extend(
            source
                .region_codes
                .iter()
                .map(|(code, region)| (code_key(code), *region)),
        );

        let mut indicator_codes: HashMap<String, IndicatorKind> = INDICATOR_ALIASES
            .iter()
            .map(|(code, kind)| (code_key(code), *kind))
            .collect();
        indicator_codes.extend(
            source
                .indicator_codes
                .iter()
                .map(|(code, kind)| (code_key(code), *kind)),
        );

        Self {
            layout: source.layout,
            columns: source.columns.clone(),
            regions: regions.to_vec(),
            region_codes,
            indicator_codes,
        }
    }

    pub fn resolve_region(&self, code: &str) -> Result<Region, NormalizationError> {
        self.region_codes
            .get(&code_key(code))
            .copied()
            .ok_or_else(|| NormalizationError::UnknownRegion {
                code: code.to_string(),
            })
    }

    pub fn resolve_indicator(&self, code: &str) -> Option<IndicatorKind> {
        self.indicator_codes.get(&code_key(code)).copied()
    }

    /// Normalizes every row. Rows that fail are logged, counted and
    /// skipped; the run carries on.
    pub fn normalize(&self, table: &RawTable) -> (Vec<PermitRecord>, NormalizeReport) {
        let mut records = Vec::with_capacity(table.len());
        // rows the loader could not decode count as skipped
        let mut report = NormalizeReport {
            rows_seen: table.len() + table.rows_rejected,
            rows_skipped: table.rows_rejected,
            ..NormalizeReport::default()
        };

        for row in &table.rows {
            match self.normalize_row(row) {
                Ok(RowOutcome::Records(mut produced)) => records.append(&mut produced),
                Ok(RowOutcome::Filtered) => report.rows_filtered += 1,
                Err(e) => {
                    tracing::warn!(line = row.line, "Skipping row: {}", e);
                    report.rows_skipped += 1;
                }
            }
        }

        report.records = records.len();
        if report.rows_skipped > 0 {
            tracing::warn!(
                "⚠️ Skipped {} of {} rows that could not be normalized",
                report.rows_skipped,
                report.rows_seen
            );
        }
        tracing::debug!(?report, "normalization finished");

        (records, report)
    }

    fn normalize_row(&self, row: &RawRow) -> Result<RowOutcome, NormalizationError> {
        match self.layout {
            SourceLayout::Wide => self.normalize_wide(row),
            SourceLayout::Long => self.normalize_long(row),
        }
    }

    fn region_in_scope(&self, row: &RawRow) -> Result<Option<Region>, NormalizationError> {
        let column = self.columns.region(self.layout);
        let code = required(row, column)?;
        let region = self.resolve_region(code)?;
        Ok(self.regions.contains(&region).then_some(region))
    }

    fn normalize_wide(&self, row: &RawRow) -> Result<RowOutcome, NormalizationError> {
        if let Some(level_column) = &self.columns.level {
            // municipalities, provinces and the national total share the file
            if row.get(level_column) != Some(REGION_LEVEL) {
                return Ok(RowOutcome::Filtered);
            }
        }

        let Some(region) = self.region_in_scope(row)? else {
            return Ok(RowOutcome::Filtered);
        };

        let year_raw = required(row, &self.columns.year)?;
        let month_raw = required(row, &self.columns.month)?;
        let invalid_period = || NormalizationError::InvalidPeriod {
            value: format!("{}/{}", year_raw, month_raw),
        };
        let year: i32 = year_raw.parse().map_err(|_| invalid_period())?;
        let month: u32 = month_raw.parse().map_err(|_| invalid_period())?;
        if month == 0 {
            // annual total
            return Ok(RowOutcome::Filtered);
        }
        let period = Period::new(year, month).ok_or_else(invalid_period)?;

        let mut records = Vec::with_capacity(IndicatorKind::ALL.len());
        for kind in IndicatorKind::ALL {
            let column = self.columns.measure(kind);
            // an empty cell means no data for that measure, never zero
            if let Some(raw) = row.get(column) {
                records.push(PermitRecord {
                    region,
                    period,
                    kind,
                    value: parse_count(column, raw)?,
                });
            }
        }

        Ok(RowOutcome::Records(records))
    }

    fn normalize_long(&self, row: &RawRow) -> Result<RowOutcome, NormalizationError> {
        let Some(region) = self.region_in_scope(row)? else {
            return Ok(RowOutcome::Filtered);
        };

        let period_raw = required(row, &self.columns.period)?;
        let period = Period::parse(period_raw).ok_or_else(|| NormalizationError::InvalidPeriod {
            value: period_raw.to_string(),
        })?;

        let indicator_raw = required(row, &self.columns.indicator)?;
        let Some(kind) = self.resolve_indicator(indicator_raw) else {
            tracing::trace!(line = row.line, indicator = indicator_raw, "untracked indicator");
            return Ok(RowOutcome::Filtered);
        };

        let value_column = &self.columns.value;
        let value = parse_count(value_column, required(row, value_column)?)?;

        Ok(RowOutcome::Records(vec![PermitRecord {
            region,
            period,
            kind,
            value,
        }]))
    }
}

fn required<'a>(row: &'a RawRow, column: &str) -> Result<&'a str, NormalizationError> {
    row.get(column).ok_or_else(|| NormalizationError::MissingField {
        column: column.to_string(),
    })
}

fn parse_count(column: &str, raw: &str) -> Result<f64, NormalizationError> {
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 => Ok(value),
        _ => Err(NormalizationError::InvalidValue {
            column: column.to_string(),
            value: raw.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::loader::parse_table;

    fn wide_table(body: &str) -> RawTable {
        let text = format!(
            "REFNIS|CD_REFNIS_LEVEL|CD_YEAR|CD_PERIOD|MS_DWELLING_RES_NEW|MS_APARTMENT_RES_NEW|MS_BUILDING_RES_RENOVATION\n{}",
            body
        );
        parse_table(text.as_bytes(), b'|', "mem").unwrap()
    }

    fn long_table(body: &str) -> RawTable {
        let text = format!("region,period,indicator,value\n{}", body);
        parse_table(text.as_bytes(), b',', "mem").unwrap()
    }

    fn wide() -> Normalizer {
        Normalizer::new(&SourceSettings::default(), &Region::ALL)
    }

    fn long() -> Normalizer {
        Normalizer::new(&SourceSettings::for_layout(SourceLayout::Long), &Region::ALL)
    }

    #[test]
    fn test_region_codes_and_names_resolve() {
        let normalizer = wide();
        assert_eq!(normalizer.resolve_region("02000"), Ok(Region::Flanders));
        assert_eq!(normalizer.resolve_region("2000"), Ok(Region::Flanders));
        assert_eq!(normalizer.resolve_region("WAALS GEWEST"), Ok(Region::Wallonia));
        assert_eq!(normalizer.resolve_region(" brussels "), Ok(Region::Brussels));
        assert!(normalizer.resolve_region("05000").is_err());
    }

    #[test]
    fn test_configured_region_codes_extend_builtin_ones() {
        let mut source = SourceSettings::for_layout(SourceLayout::Long);
        source.region_codes.insert("VLA".to_string(), Region::Flanders);
        let normalizer = Normalizer::new(&source, &Region::ALL);

        assert_eq!(normalizer.resolve_region("vla"), Ok(Region::Flanders));
        assert_eq!(normalizer.resolve_region("04000"), Ok(Region::Brussels));
    }

    #[test]
    fn test_wide_row_expands_into_one_record_per_measure() {
        let table = wide_table("02000|2|2023|3|100|40|80\n");
        let (records, report) = wide().normalize(&table);

        assert_eq!(records.len(), 3);
        assert_eq!(report.records, 3);
        let apartments = records
            .iter()
            .find(|r| r.kind == IndicatorKind::Apartments)
            .unwrap();
        assert_eq!(apartments.region, Region::Flanders);
        assert_eq!(apartments.period, Period::new(2023, 3).unwrap());
        assert_eq!(apartments.value, 40.0);
    }

    #[test]
    fn test_wide_filters_other_levels_and_annual_totals() {
        let table = wide_table(
            "01000|1|2023|1|500|200|300\n\
             11002|4|2023|1|5|2|3\n\
             02000|2|2023|0|1200|480|960\n\
             02000|2|2023|1|100|40|80\n",
        );
        let (records, report) = wide().normalize(&table);

        assert_eq!(records.len(), 3);
        assert_eq!(report.rows_filtered, 3);
        assert_eq!(report.rows_skipped, 0);
    }

    #[test]
    fn test_wide_empty_cell_yields_no_record() {
        let table = wide_table("03000|2|2023|1|60||70\n");
        let (records, _) = wide().normalize(&table);

        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.kind != IndicatorKind::Apartments));
    }

    #[test]
    fn test_wide_bad_month_and_bad_value_are_skipped() {
        let table = wide_table(
            "02000|2|2023|13|100|40|80\n\
             02000|2|2023|2|lots|40|80\n\
             02000|2|2023|3|-5|40|80\n\
             02000|2|2023|4|100|40|80\n",
        );
        let (records, report) = wide().normalize(&table);

        assert_eq!(report.rows_skipped, 3);
        assert_eq!(records.len(), 3);
    }

    #[test]
    fn test_unknown_region_code_is_skipped_and_counted() {
        let table = long_table(
            "flanders,2023-01,new_build,100\n\
             atlantis,2023-01,new_build,7\n\
             wallonia,2023-01,new_build,50\n",
        );
        let (records, report) = long().normalize(&table);

        assert_eq!(report.rows_seen, 3);
        assert_eq!(report.rows_skipped, 1);
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_long_unparseable_period_is_skipped() {
        let table = long_table(
            "flanders,2023-01,new_build,100\n\
             flanders,Q1 2023,new_build,100\n",
        );
        let (records, report) = long().normalize(&table);

        assert_eq!(report.rows_skipped, 1);
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_long_untracked_indicator_is_filtered() {
        let table = long_table(
            "flanders,2023-01,MS_VOLUME_NONRES_NEW,9000\n\
             flanders,2023-01,MS_APARTMENT_RES_NEW,12\n",
        );
        let (records, report) = long().normalize(&table);

        assert_eq!(report.rows_filtered, 1);
        assert_eq!(report.rows_skipped, 0);
        assert_eq!(records[0].kind, IndicatorKind::Apartments);
    }

    #[test]
    fn test_regions_outside_scope_are_filtered() {
        let normalizer = Normalizer::new(
            &SourceSettings::for_layout(SourceLayout::Long),
            &[Region::Brussels],
        );
        let table = long_table(
            "flanders,2023-01,new_build,100\n\
             brussels,2023-01,new_build,20\n",
        );
        let (records, report) = normalizer.normalize(&table);

        assert_eq!(report.rows_filtered, 1);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].region, Region::Brussels);
    }

    #[test]
    fn test_long_missing_value_is_skipped() {
        let table = long_table("flanders,2023-01,new_build,\n");
        let (records, report) = long().normalize(&table);

        assert!(records.is_empty());
        assert_eq!(report.rows_skipped, 1);
    }

    #[test]
    fn test_undecodable_rows_from_loader_count_as_skipped() {
        let bytes = b"region,period,indicator,value\n\
flanders,2023-01,new_build,100\n\
fl\xe9nders,2023-02,new_build,5\n";
        let table = parse_table(bytes, b',', "mem").unwrap();
        let (records, report) = long().normalize(&table);

        assert_eq!(records.len(), 1);
        assert_eq!(report.rows_seen, 2);
        assert_eq!(report.rows_skipped, 1);
        assert_eq!(report.records, 1);
    }
}

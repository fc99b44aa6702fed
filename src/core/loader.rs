use crate::config::SourceSettings;
use crate::domain::model::{RawRow, RawTable};
use crate::domain::ports::Storage;
use crate::utils::error::LoadError;
use csv::{ReaderBuilder, StringRecord, Trim};
use std::collections::HashMap;

/// Reads `path` from `storage` and checks the columns the layout needs.
pub fn load_table<S: Storage>(
    storage: &S,
    path: &str,
    source: &SourceSettings,
) -> Result<RawTable, LoadError> {
    let location = storage.describe(path);
    let bytes = storage
        .read_file(path)
        .map_err(|source| LoadError::Unreadable {
            path: location.clone(),
            source,
        })?;

    tracing::debug!("Read {} bytes from {}", bytes.len(), location);
    let table = parse_table(&bytes, source.delimiter() as u8, &location)?;

    let missing: Vec<String> = source
        .columns
        .required(source.layout)
        .into_iter()
        .filter(|column| !table.has_column(column))
        .map(str::to_string)
        .collect();
    if !missing.is_empty() {
        return Err(LoadError::MissingColumns {
            path: location,
            columns: missing,
        });
    }

    Ok(table)
}

/// Parses delimited text. Ragged rows are kept; cells past the header
/// count are dropped and missing trailing cells are simply absent.
/// Records that are not valid UTF-8 are logged, counted and skipped; only
/// an undecodable header row is fatal.
pub fn parse_table(bytes: &[u8], delimiter: u8, location: &str) -> Result<RawTable, LoadError> {
    let malformed = |source| LoadError::Malformed {
        path: location.to_string(),
        source,
    };

    // Statbel exports start with a UTF-8 BOM
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);

    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(Trim::Fields)
        .from_reader(bytes);

    let headers: Vec<String> = reader
        .headers()
        .map_err(malformed)?
        .iter()
        .map(clean_header)
        .collect();

    let mut rows = Vec::new();
    let mut rows_rejected = 0;
    for result in reader.byte_records() {
        let raw = result.map_err(malformed)?;
        let line = raw.position().map(|p| p.line()).unwrap_or_default();

        let record = match StringRecord::from_byte_record(raw) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(line, "Skipping row that is not valid UTF-8: {}", e.utf8_error());
                rows_rejected += 1;
                continue;
            }
        };

        let fields: HashMap<String, String> = headers
            .iter()
            .zip(record.iter())
            .map(|(name, value)| (name.clone(), value.to_string()))
            .collect();

        rows.push(RawRow { line, fields });
    }

    tracing::debug!(
        "Parsed {} rows with {} columns ({} rejected)",
        rows.len(),
        headers.len(),
        rows_rejected
    );
    Ok(RawTable {
        headers,
        rows,
        rows_rejected,
    })
}

fn clean_header(raw: &str) -> String {
    raw.trim().trim_matches('"').trim().to_string()
}

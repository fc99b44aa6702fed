use crate::config::{ExportSettings, SourceSettings};
use crate::domain::model::{Analysis, ExportReport, RawTable, Region};
use crate::utils::error::Result;

/// Byte-level file access used by the loader and the exporter.
pub trait Storage {
    fn read_file(&self, path: &str) -> std::io::Result<Vec<u8>>;
    fn write_file(&self, path: &str, data: &[u8]) -> std::io::Result<()>;

    /// Human-readable location of `path`, used in log lines and errors.
    fn describe(&self, path: &str) -> String {
        path.to_string()
    }
}

pub trait ConfigProvider {
    fn input_path(&self) -> &str;
    fn output_path(&self) -> &str;
    fn source(&self) -> SourceSettings;
    fn regions(&self) -> Vec<Region>;
    fn trend_window(&self) -> usize;
    fn export(&self) -> ExportSettings;
}

pub trait Pipeline {
    fn extract(&self) -> Result<RawTable>;
    fn transform(&self, table: RawTable) -> Result<Analysis>;
    fn load(&self, analysis: &Analysis) -> Result<ExportReport>;
}

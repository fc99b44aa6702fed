pub mod aggregator;
pub mod etl;
pub mod exporter;
pub mod loader;
pub mod normalizer;
pub mod pipeline;
pub mod trend;

pub use crate::domain::ports::{ConfigProvider, Pipeline, Storage};
pub use crate::utils::error::Result;
pub use etl::{EtlEngine, RunOutcome};
pub use pipeline::PermitPipeline;

//! Data module - storm data loading and processing

mod loader;
mod processor;
mod record;

pub use loader::DataLoader;
pub use processor::{DataProcessor, DataQuality, PreparedData, DEFAULT_CUTOFF_YEAR};
pub use record::{RawStormRecord, RecordError, ResolvedRecord, StormRecord};

pub mod directory;
pub mod loader;

pub use directory::{CsvDirectoryFactory, CsvDirectorySource, default_sources};
pub use loader::{RateTableLoader, RateTableLoaderError, RateTableRecords};

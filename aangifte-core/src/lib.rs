pub mod calculations;
pub mod error;
pub mod filing;
pub mod lifecycle;
pub mod models;
pub mod registry;
pub mod resolver;
pub mod source;
pub mod validation;

#[cfg(test)]
mod fixtures;

pub use error::{ConfigurationFault, FilingError, Rule, StateError, ValidationError};
pub use filing::{DeclarationStore, FilingService, assess};
pub use models::*;
pub use registry::{LoadPolicy, RateTableRegistry, RateTableSet, RegistryError};
pub use resolver::{Resolution, resolve};
pub use source::{
    FetchedTables, RateTableSource, SourceConfig, SourceError, SourceFactory, SourceRegistry,
};

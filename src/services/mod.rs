pub mod ddl;
pub mod distcp;
pub mod executor;
pub mod location;
pub mod metastore;
pub mod runner;
pub mod selector;
pub mod statistics;
pub mod strategies; // One service per data strategy

pub use distcp::DistCpPlanner;
pub use executor::*;
pub use location::LocationTranslator;
pub use metastore::MetastorePoolManager;
pub use runner::MigrationRunner;
pub use selector::StrategySelector;
pub use statistics::*;
pub use strategies::{service_for, DataStrategyService, MigrationContext};

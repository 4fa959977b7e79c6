pub mod copy_spec;
pub mod distcp;
pub mod environment;
pub mod error;
pub mod mirror_config;
pub mod run;
pub mod statistics;
pub mod strategy;
pub mod table;
pub mod warehouse;

pub use copy_spec::*;
pub use distcp::*;
pub use environment::*;
pub use error::*;
pub use mirror_config::*;
pub use run::*;
pub use statistics::*;
pub use strategy::*;
pub use table::*;
pub use warehouse::*;

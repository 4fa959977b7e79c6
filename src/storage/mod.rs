pub mod sqlite;

pub use sqlite::RunStore;

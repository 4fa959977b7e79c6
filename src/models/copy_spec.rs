use super::environment::Environment;

/// Describes how one environment's definition is derived from another
///
/// Built fresh for every build step and never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopySpec {
    pub source: Environment,
    pub target: Environment,
    /// Replace the LOCATION with `location`
    pub replace_location: bool,
    /// Drop the LOCATION clause so the target warehouse decides
    pub strip_location: bool,
    /// Legacy managed table becoming external on a newer Hive
    pub upgrade: bool,
    pub make_external: bool,
    pub make_non_transactional: bool,
    /// Target owns its data (`external.table.purge`)
    pub take_ownership: bool,
    pub table_name_prefix: Option<String>,
    pub location: Option<String>,
    /// Drop bucket clauses at or below this count
    pub strip_buckets_at_or_below: Option<u32>,
}

impl CopySpec {
    pub fn new(source: Environment, target: Environment) -> Self {
        Self {
            source,
            target,
            replace_location: false,
            strip_location: false,
            upgrade: false,
            make_external: false,
            make_non_transactional: false,
            take_ownership: false,
            table_name_prefix: None,
            location: None,
            strip_buckets_at_or_below: None,
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.replace_location = true;
        self.strip_location = false;
        self.location = Some(location.into());
        self
    }

    pub fn strip_location(mut self) -> Self {
        self.strip_location = true;
        self.replace_location = false;
        self.location = None;
        self
    }

    pub fn upgrade(mut self) -> Self {
        self.upgrade = true;
        self.make_external = true;
        self
    }

    pub fn make_external(mut self) -> Self {
        self.make_external = true;
        self
    }

    pub fn make_non_transactional(mut self) -> Self {
        self.make_non_transactional = true;
        self
    }

    pub fn take_ownership(mut self, take: bool) -> Self {
        self.take_ownership = take;
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.table_name_prefix = Some(prefix.into());
        self
    }

    pub fn strip_buckets_at_or_below(mut self, threshold: u32) -> Self {
        self.strip_buckets_at_or_below = Some(threshold);
        self
    }

    /// Name of the derived table
    pub fn target_name(&self, source_name: &str) -> String {
        match &self.table_name_prefix {
            Some(prefix) => format!("{}{}", prefix, source_name),
            None => source_name.to_string(),
        }
    }
}

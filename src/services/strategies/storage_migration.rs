use std::collections::BTreeMap;

use crate::models::{CreateStrategy, DataStrategy, DbMirror, Environment, MigrationError, SqlPair, TableMirror};
use crate::services::ddl;

use super::common::{self, partition_clause};
use super::{DataStrategyService, MigrationContext};

/// Relocates tables inside the LEFT cluster onto the database's warehouse plan
///
/// Only metadata is changed here; the files are moved by the DistCp plan.
pub struct StorageMigrationDataStrategy;

/// Path under `base`, or None when `location` is not inside it
fn suffix_under<'a>(location: &'a str, base: &str) -> Option<&'a str> {
    let base = base.trim_end_matches('/');
    let rest = location.strip_prefix(base)?;
    (rest.is_empty() || rest.starts_with('/')).then_some(rest)
}

impl StorageMigrationDataStrategy {
    /// GLM target when one matches, else the warehouse layout for the table type
    fn relocate(ctx: &MigrationContext, db: &DbMirror, table: &TableMirror) -> Result<String, MigrationError> {
        let config = &ctx.config;
        let namespace = config.left_namespace()?;
        let table_type = ddl::table_type(&table.left().definition);
        let glm = table
            .left()
            .location()
            .and_then(|location| ctx.translator.relative_dir(&location))
            .and_then(|relative| ctx.translator.process_global_location_map(&relative, table_type));
        if let Some(glm) = glm {
            return Ok(format!("{}{}", namespace, glm.mapped_dir));
        }
        let warehouse = config.warehouse_for(&db.name).ok_or_else(|| {
            MigrationError::RequiredConfiguration(format!(
                "No warehouse plan for database {} and no default warehouse",
                db.name
            ))
        })?;
        Ok(format!(
            "{}/{}/{}.db/{}",
            namespace,
            warehouse.directory_for(table_type).trim_matches('/'),
            db.name,
            table.name
        ))
    }
}

#[async_trait::async_trait]
impl DataStrategyService for StorageMigrationDataStrategy {
    fn strategy(&self) -> DataStrategy {
        DataStrategy::StorageMigration
    }

    fn error_environment(&self) -> Environment {
        Environment::Left
    }

    fn build_out_definition(
        &self,
        ctx: &MigrationContext,
        db: &DbMirror,
        table: &mut TableMirror,
    ) -> Result<(), MigrationError> {
        if table.is_acid() {
            return Err(MigrationError::validation(format!(
                "ACID table {} can't be relocated with SET LOCATION; use an in-place downgrade",
                table.name
            )));
        }
        let new_location = Self::relocate(ctx, db, table)?;
        let base = table.left().location().unwrap_or_default();

        let mut partitions = BTreeMap::new();
        for (spec, location) in &table.left().partitions {
            let relocated = match suffix_under(location, &base) {
                Some(rest) => format!("{}{}", new_location, rest),
                None if ctx.config.distcp_enabled() => {
                    return Err(MigrationError::FatalAlignment(format!(
                        "Partition {} of {} is outside the table location {}; DistCp can't relocate it",
                        spec, table.name, base
                    )));
                }
                None => format!("{}/{}", new_location, spec),
            };
            partitions.insert(spec.clone(), relocated);
        }

        let mut definition = table.left().definition.clone();
        ddl::update_location(&mut definition, &new_location);
        let name = table.name.clone();
        let right = table.right_mut();
        right.name = name;
        right.definition = definition;
        right.partitions = partitions;
        right.create_strategy = CreateStrategy::Nothing;
        Ok(())
    }

    fn build_out_sql(
        &self,
        _ctx: &MigrationContext,
        db: &DbMirror,
        table: &mut TableMirror,
    ) -> Result<(), MigrationError> {
        let name = table.name.clone();
        let Some(target) = table.right().location() else {
            return Err(MigrationError::MissingDataPoint(format!("No new location for {}", name)));
        };
        if table.left().location().as_deref() == Some(target.as_str()) {
            table.left_mut().add_issue("Already at the planned location; nothing to do");
            return Ok(());
        }

        let mut pairs = vec![
            common::use_database(&db.name),
            SqlPair::new(
                format!("Relocating {}", name),
                format!("ALTER TABLE {} SET LOCATION '{}'", name, target),
            ),
        ];
        pairs.extend(table.right().partitions.iter().map(|(spec, location)| {
            SqlPair::new(
                format!("Relocating partition {} of {}", spec, name),
                format!(
                    "ALTER TABLE {} PARTITION ({}) SET LOCATION '{}'",
                    name,
                    partition_clause(spec),
                    location
                ),
            )
        }));
        let left = table.left_mut();
        left.sql.extend(pairs);
        left.add_issue("Data must be copied with the DistCp plan before these statements run");
        Ok(())
    }
}

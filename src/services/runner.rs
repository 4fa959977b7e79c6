use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::models::{DataStrategy, DbMirror, Environment, MigrationError, RunReport, RunStatus, SqlPair, TableMirror};
use crate::services::ddl;
use crate::services::metastore::MetastorePoolManager;
use crate::services::selector::StrategySelector;
use crate::services::strategies::{service_for, MigrationContext};

/// Drives every table of a database through build and execute
///
/// Tables run concurrently, at most `parallelism` at a time. Each table is
/// owned by exactly one task; only the aggregate status is shared.
pub struct MigrationRunner {
    ctx: MigrationContext,
    metastore: Option<Arc<MetastorePoolManager>>,
}

impl MigrationRunner {
    pub fn new(ctx: MigrationContext) -> Self {
        Self { ctx, metastore: None }
    }

    pub fn with_metastore(mut self, metastore: Arc<MetastorePoolManager>) -> Self {
        self.metastore = Some(metastore);
        self
    }

    /// Split tables into those this run processes and skip notes for the rest
    pub fn select_tables(&self, db: &DbMirror) -> (Vec<TableMirror>, Vec<String>) {
        let config = &self.ctx.config;
        let in_place = config.data_strategy.is_in_place() && config.data_strategy != DataStrategy::StorageMigration;
        let mut selected = Vec::new();
        let mut skipped = Vec::new();
        for table in db.tables.values() {
            let reason = if ddl::is_view(&table.left().definition) {
                (!config.migrate_views).then_some("view migration is disabled (migrate_views)")
            } else if table.is_acid() {
                (!config.migrate_acid.on && !in_place).then_some("ACID migration is disabled (migrate_acid.on)")
            } else if in_place {
                Some("not transactional; in-place downgrade only applies to ACID tables")
            } else {
                config
                    .migrate_acid
                    .only
                    .then_some("only ACID tables are migrated (migrate_acid.only)")
            };
            match reason {
                Some(reason) => skipped.push(format!("Skipped {}: {}", table.name, reason)),
                None => selected.push(table.clone()),
            }
        }
        (selected, skipped)
    }

    /// Database statements run before any table, and where they run
    pub fn database_sql(&self, db: &DbMirror) -> Result<(Environment, Vec<SqlPair>), MigrationError> {
        let config = &self.ctx.config;
        let locations = self.ctx.translator.translate_database_location(db)?;

        if config.data_strategy.is_in_place() {
            let mut pairs = Vec::new();
            if let Some(locations) = locations {
                pairs.push(SqlPair::new(
                    format!("Relocating database {}", db.name),
                    format!("ALTER DATABASE {} SET LOCATION '{}'", db.name, locations.location),
                ));
                if !config.clusters.left.legacy_hive {
                    pairs.push(SqlPair::new(
                        format!("Relocating managed tables of {}", db.name),
                        format!(
                            "ALTER DATABASE {} SET MANAGEDLOCATION '{}'",
                            db.name, locations.managed_location
                        ),
                    ));
                }
            }
            return Ok((Environment::Left, pairs));
        }

        let target = self.ctx.target_database(db);
        let mut create = format!("CREATE DATABASE IF NOT EXISTS {}", target);
        if let Some(locations) = &locations {
            create.push_str(&format!(" LOCATION '{}'", locations.location));
            if !config.clusters.right.legacy_hive {
                create.push_str(&format!(" MANAGEDLOCATION '{}'", locations.managed_location));
            }
        }
        let mut pairs = vec![SqlPair::new(format!("Creating database {}", target), create)];
        if config.ownership_transfer.database {
            if let Some(owner) = db.owner.as_deref().filter(|o| !o.trim().is_empty()) {
                pairs.push(SqlPair::new(
                    format!("Setting owner of database {}", target),
                    format!("ALTER DATABASE {} SET OWNER USER {}", target, owner),
                ));
            }
        }
        Ok((Environment::Right, pairs))
    }

    /// Fill in missing partition locations from the LEFT metastore
    ///
    /// Lookup failures become database issues; the tables still run.
    pub async fn load_partitions(&self, db: &mut DbMirror) {
        let Some(manager) = &self.metastore else {
            return;
        };
        let Some(direct) = &self.ctx.config.clusters.left.metastore_direct else {
            return;
        };
        let needs_lookup = db
            .tables
            .values()
            .any(|t| t.is_partitioned() && t.left().partitions.is_empty());
        if !needs_lookup {
            return;
        }
        let client = match manager.client(&direct.uri).await {
            Ok(client) => client,
            Err(err) => {
                tracing::warn!("{}: metastore unavailable: {}", db.name, err);
                db.issues.push(format!("Partition discovery skipped: {}", err));
                return;
            }
        };
        let database = db.name.clone();
        for table in db.tables.values_mut() {
            if !table.is_partitioned() || !table.left().partitions.is_empty() {
                continue;
            }
            match client.partition_locations(&database, &table.name).await {
                Ok(partitions) => {
                    tracing::debug!(
                        "{}.{}: loaded {} partitions from {} metastore",
                        database,
                        table.name,
                        partitions.len(),
                        client.backend()
                    );
                    table.left_mut().partitions = partitions;
                }
                Err(err) => {
                    table.left_mut().add_issue(format!("Partition discovery failed: {}", err));
                }
            }
        }
    }

    /// Run one database; configuration errors fail the whole run up front
    pub async fn run(&self, mut db: DbMirror) -> Result<RunReport, MigrationError> {
        let config = self.ctx.config.clone();
        let strategy = config.data_strategy;
        StrategySelector::check_prerequisites(strategy, &config)?;

        let mut report = RunReport::new(db.name.clone(), self.ctx.target_database(&db), !config.execute);
        tracing::info!(
            "Run {}: {} -> {} with {} (dry run: {})",
            report.id,
            report.database,
            report.target_database,
            strategy,
            report.dry_run
        );

        let (db_env, db_sql) = self.database_sql(&db)?;
        if config.execute && strategy != DataStrategy::Dump {
            for pair in &db_sql {
                self.ctx.executor.execute(db_env, &pair.statement).await?;
            }
        }
        report.database_sql = db_sql;

        self.load_partitions(&mut db).await;
        let (tables, skipped) = self.select_tables(&db);
        report.issues.extend(db.issues.iter().cloned());
        report.issues.extend(skipped);

        let mut shared_db = db;
        shared_db.tables.clear();
        let shared_db = Arc::new(shared_db);
        let status = Arc::new(Mutex::new(RunStatus::default()));

        let results: Vec<TableMirror> = stream::iter(tables)
            .map(|table| {
                let ctx = self.ctx.clone();
                let db = shared_db.clone();
                let status = status.clone();
                tokio::spawn(async move {
                    let table = process_table(&ctx, &db, table).await;
                    status.lock().await.record(&table);
                    table
                })
            })
            .buffer_unordered(config.parallelism.max(1))
            .filter_map(|joined| async move {
                match joined {
                    Ok(table) => Some(table),
                    Err(err) => {
                        tracing::error!("Table worker failed: {}", err);
                        None
                    }
                }
            })
            .collect()
            .await;

        report.status = status.lock().await.clone();
        report.tables = results;
        report.mark_completed();
        tracing::info!(
            "Run {} finished: {} succeeded, {} failed",
            report.id,
            report.status.succeeded,
            report.status.failed
        );
        Ok(report)
    }
}

/// Build then execute one table; views always go through SCHEMA_ONLY
pub async fn process_table(ctx: &MigrationContext, db: &DbMirror, mut table: TableMirror) -> TableMirror {
    let strategy = if ddl::is_view(&table.left().definition) {
        DataStrategy::SchemaOnly
    } else {
        ctx.config.data_strategy
    };
    let service = service_for(strategy);

    let built = service.build(ctx, db, &mut table);
    let executed = built && service.execute(ctx, db, &mut table).await;
    if executed {
        table.mark_success();
        tracing::info!("{}.{}: {}", db.name, table.name, table.strategy.unwrap_or(strategy));
    } else {
        table.mark_error();
        tracing::error!("{}.{}: failed", db.name, table.name);
    }
    table
}

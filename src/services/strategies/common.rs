// Shared helpers for strategy implementations

use crate::models::{
    CopySpec, CreateStrategy, DbMirror, Environment, EnvironmentTable, MigrationError, MirrorConfig, SqlPair,
    TableMirror, TableStatistics,
};
use crate::services::ddl;
use crate::services::statistics::StatisticsCalculator;
use crate::validation::SqlValidator;

use super::MigrationContext;

pub const ARCHIVE_SUFFIX: &str = "_archive";

/// Record a build result on the table; false when it failed
pub fn record_outcome(table: &mut TableMirror, env: Environment, result: Result<(), MigrationError>) -> bool {
    match result {
        Ok(()) => true,
        Err(err) => {
            if err.is_fatal() {
                table.mark_error();
            }
            let message = err.to_string();
            let errors = &mut table.env_mut(env).errors;
            if !errors.contains(&message) {
                errors.push(message);
            }
            tracing::warn!("{}: build failed: {}", table.name, err);
            false
        }
    }
}

/// Derive `spec.target` from `spec.source` and decide how to create it
///
/// Working tables (SHADOW, TRANSFER) never exist beforehand and are always
/// created. An existing target is only replaced in sync mode, and never when
/// it owns its data.
pub fn derive_environment(
    config: &MirrorConfig,
    table: &mut TableMirror,
    spec: &CopySpec,
) -> Result<CreateStrategy, MigrationError> {
    let derived = ddl::apply_copy_spec(&table.env(spec.source).definition, &table.name, spec);
    let source_exists = table.env(spec.source).exists;
    let target_name = spec.target_name(&table.name);
    let target = table.env_mut(spec.target);
    target.name = target_name;

    let strategy = if !target.exists {
        CreateStrategy::Create
    } else if !source_exists {
        target.add_issue(format!(
            "{} exists in {} but not in {}; left as is",
            target.name, spec.target, spec.source
        ));
        CreateStrategy::Leave
    } else if ddl::schemas_equal(&derived, &target.definition) {
        target.add_issue("Schemas match; no action");
        CreateStrategy::Nothing
    } else if config.sync {
        if ddl::is_purge(&target.definition) {
            return Err(MigrationError::validation(format!(
                "Schema of {} differs but the table owns its data ({}); refusing to replace it",
                target.name,
                ddl::PURGE
            )));
        }
        CreateStrategy::Replace
    } else {
        target.add_issue("Schemas differ; enable sync to replace the existing table");
        CreateStrategy::Leave
    };

    target.create_strategy = strategy;
    if matches!(strategy, CreateStrategy::Create | CreateStrategy::Replace) {
        target.definition = derived;
    }
    Ok(strategy)
}

/// CopySpec LEFT -> RIGHT for a table that holds its own data on RIGHT
pub fn owned_target_spec(
    ctx: &MigrationContext,
    db: &DbMirror,
    table: &mut TableMirror,
) -> Result<CopySpec, MigrationError> {
    let config = &ctx.config;
    let definition = table.left().definition.clone();
    let mut spec = CopySpec::new(Environment::Left, Environment::Right);
    let mut external = ddl::is_external(&definition);

    if ddl::is_acid(&definition) {
        if config.migrate_acid.downgrade {
            spec = spec.make_non_transactional().make_external().take_ownership(true);
            external = true;
        }
    } else if ddl::is_managed(&definition) {
        if config.clusters.left.legacy_hive && !config.clusters.right.legacy_hive {
            spec = spec.upgrade().take_ownership(true);
            external = true;
        }
    } else {
        spec = spec.take_ownership(ddl::is_purge(&definition));
    }

    let left_location = table.left().location();
    if external || config.translator.force_external_location {
        let location = ctx
            .translator
            .translate_table_location(db, table, left_location.as_deref(), None)?;
        spec = spec.with_location(location);
    } else {
        spec = spec.strip_location();
    }
    Ok(spec)
}

/// DDL for a table according to its create strategy
pub fn table_ddl(env_table: &EnvironmentTable) -> Vec<SqlPair> {
    let name = &env_table.name;
    let create = || {
        SqlPair::new(
            format!("Creating table {}", name),
            ddl::create_statement(&env_table.definition),
        )
    };
    match env_table.create_strategy {
        CreateStrategy::Create => vec![create()],
        CreateStrategy::Replace => vec![drop_table(name), create()],
        CreateStrategy::Drop => vec![drop_table(name)],
        CreateStrategy::Leave | CreateStrategy::Nothing => Vec::new(),
    }
}

pub fn use_database(database: &str) -> SqlPair {
    SqlPair::new(format!("Selecting database {}", database), format!("USE {}", database))
}

pub fn drop_table(name: &str) -> SqlPair {
    SqlPair::new(format!("Dropping table {}", name), format!("DROP TABLE IF EXISTS {}", name))
}

pub fn rename_table(from: &str, to: &str) -> SqlPair {
    SqlPair::new(
        format!("Renaming {} to {}", from, to),
        format!("ALTER TABLE {} RENAME TO {}", from, to),
    )
}

/// MSCK for a freshly created partitioned, non-ACID table
pub fn repair_partitions(env_table: &EnvironmentTable, init_msck: bool) -> Option<SqlPair> {
    let creating = matches!(
        env_table.create_strategy,
        CreateStrategy::Create | CreateStrategy::Replace
    );
    if creating && init_msck && env_table.is_partitioned() && !ddl::is_acid(&env_table.definition) {
        Some(SqlPair::new(
            format!("Discovering partitions for {}", env_table.name),
            format!("MSCK REPAIR TABLE {}", env_table.name),
        ))
    } else {
        None
    }
}

pub fn ownership(config: &MirrorConfig, source: &EnvironmentTable, target_name: &str) -> Option<SqlPair> {
    if !config.ownership_transfer.table {
        return None;
    }
    let owner = source.owner.as_deref().filter(|o| !o.trim().is_empty())?;
    Some(SqlPair::new(
        format!("Setting owner of {}", target_name),
        format!("ALTER TABLE {} SET OWNER USER {}", target_name, owner),
    ))
}

/// `region=us/day=01` to `region='us', day='01'`
pub fn partition_clause(spec: &str) -> String {
    spec.split('/')
        .filter(|part| !part.is_empty())
        .map(|part| match part.split_once('=') {
            Some((key, value)) => format!("{}='{}'", key, value.replace('\'', "\\'")),
            None => part.to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// ADD PARTITION statements for partitions living outside the table directory
pub fn detached_partitions(env_table: &EnvironmentTable) -> Vec<SqlPair> {
    let Some(base) = env_table.location() else {
        return Vec::new();
    };
    let base = format!("{}/", base.trim_end_matches('/'));
    env_table
        .partitions
        .iter()
        .filter(|(_, location)| !location.starts_with(&base))
        .map(|(spec, location)| {
            SqlPair::new(
                format!("Adding partition {} of {}", spec, env_table.name),
                format!(
                    "ALTER TABLE {} ADD IF NOT EXISTS PARTITION ({}) LOCATION '{}'",
                    env_table.name,
                    partition_clause(spec),
                    location
                ),
            )
        })
        .collect()
}

/// Tuning settings then `INSERT OVERWRITE ... SELECT` from `source_name`
///
/// Statistics come from `stats_source`, the table whose data is read.
pub fn move_data(
    config: &MirrorConfig,
    stats_source: &EnvironmentTable,
    source_name: &str,
    target: &EnvironmentTable,
) -> Result<Vec<SqlPair>, MigrationError> {
    let stats = TableStatistics::from_environment(stats_source);
    let mut pairs = StatisticsCalculator::session_settings(config, &stats);

    let statement = if target.is_partitioned() {
        let columns = ddl::partition_columns(&target.definition);
        if columns.is_empty() {
            return Err(MigrationError::MissingDataPoint(format!(
                "Partition elements of {} could not be determined",
                target.name
            )));
        }
        let columns = columns.join(", ");
        let mut statement = format!(
            "INSERT OVERWRITE TABLE {} PARTITION ({}) SELECT * FROM {}",
            target.name, columns, source_name
        );
        let serde_type = match StatisticsCalculator::determine_serde_type(&stats) {
            Ok(serde_type) => Some(serde_type),
            Err(err) => {
                tracing::debug!("{}: {}", source_name, err);
                None
            }
        };
        if let Some(expr) = StatisticsCalculator::generate_distributed_partition_elements(config, &stats, serde_type) {
            statement.push_str(&format!(" DISTRIBUTE BY {}, {}", columns, expr));
        }
        statement
    } else {
        format!("INSERT OVERWRITE TABLE {} SELECT * FROM {}", target.name, source_name)
    };
    pairs.push(SqlPair::new(
        format!("Moving data from {} to {}", source_name, target.name),
        statement,
    ));
    Ok(pairs)
}

/// Target DDL text for one environment
pub fn get_create_statement(table: &TableMirror, env: Environment) -> String {
    ddl::create_statement(&table.env(env).definition)
}

/// Run one environment's SQL in order, stopping at the first failure
pub async fn run_table_sql(ctx: &MigrationContext, db: &DbMirror, table: &mut TableMirror, env: Environment) -> bool {
    let statements = table.env(env).sql.clone();
    if statements.is_empty() {
        return true;
    }
    if !ctx.executor.validate_connection(env).await {
        table
            .env_mut(env)
            .add_error(format!("Connection to {} is not available", env));
        return false;
    }
    for pair in statements {
        tracing::debug!("{}.{} [{}] {}", db.name, table.name, env, pair.statement);
        if let Err(err) = ctx.executor.execute(env, &pair.statement).await {
            tracing::error!("{}.{} [{}] {}: {}", db.name, table.name, env, pair.description, err);
            table.env_mut(env).add_error(format!("{}: {}", pair.description, err));
            return false;
        }
    }
    true
}

/// Run LEFT then RIGHT SQL; cleanup afterwards is best-effort
pub async fn execute(ctx: &MigrationContext, db: &DbMirror, table: &mut TableMirror) -> bool {
    let config = &ctx.config;
    if !config.execute {
        table.add_step("execute", "Dry run; SQL not executed");
        return true;
    }
    if config.read_only {
        if let Err(err) = SqlValidator::check_read_only(&table.right().sql) {
            for message in err.messages() {
                table.right_mut().add_error(message);
            }
            return false;
        }
    }

    table.mark_in_progress();
    let mut success = true;
    for env in [Environment::Left, Environment::Right] {
        if !run_table_sql(ctx, db, table, env).await {
            success = false;
            break;
        }
    }
    table.add_step("execute", if success { "SQL executed" } else { "SQL execution failed" });

    if config.save_working_tables {
        return success;
    }
    for env in [Environment::Left, Environment::Right] {
        let cleanup = table.env(env).cleanup_sql.clone();
        for pair in cleanup {
            if let Err(err) = ctx.executor.execute(env, &pair.statement).await {
                tracing::warn!("{}.{} cleanup '{}' failed: {}", db.name, table.name, pair.description, err);
                table
                    .env_mut(env)
                    .add_issue(format!("Cleanup '{}' failed: {}", pair.description, err));
            }
        }
    }
    success
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::executor::RecordingSqlExecutor;
    use crate::services::strategies::fixtures;
    use std::sync::Arc;

    #[test]
    fn test_create_strategy_rules() {
        let config = fixtures::config();
        let spec = CopySpec::new(Environment::Left, Environment::Right);

        let mut absent = fixtures::external_table("t1");
        assert_eq!(derive_environment(&config, &mut absent, &spec).unwrap(), CreateStrategy::Create);

        let mut equal = fixtures::external_table("t1");
        equal.right_mut().exists = true;
        equal.right_mut().definition = equal.left().definition.clone();
        assert_eq!(derive_environment(&config, &mut equal, &spec).unwrap(), CreateStrategy::Nothing);
        assert_eq!(equal.right().issues, vec!["Schemas match; no action".to_string()]);

        let mut orphan = fixtures::external_table("t1");
        orphan.left_mut().exists = false;
        orphan.right_mut().exists = true;
        assert_eq!(derive_environment(&config, &mut orphan, &spec).unwrap(), CreateStrategy::Leave);
    }

    #[test]
    fn test_sync_replaces_unless_target_owns_data() {
        let mut config = fixtures::config();
        let spec = CopySpec::new(Environment::Left, Environment::Right);
        let mut differs = fixtures::external_table("t1");
        differs.right_mut().exists = true;
        differs.right_mut().definition = vec!["CREATE EXTERNAL TABLE `t1`(".into(), "  `other` string)".into()];
        assert_eq!(derive_environment(&config, &mut differs.clone(), &spec).unwrap(), CreateStrategy::Leave);

        config.sync = true;
        assert_eq!(derive_environment(&config, &mut differs.clone(), &spec).unwrap(), CreateStrategy::Replace);

        ddl::upsert_tbl_property(&mut differs.right_mut().definition, ddl::PURGE, "true");
        assert!(derive_environment(&config, &mut differs, &spec).is_err());
    }

    #[test]
    fn test_get_create_statement_joins_lines() {
        let table = fixtures::external_table("t1");
        let text = get_create_statement(&table, Environment::Left);
        assert!(text.starts_with("CREATE EXTERNAL TABLE `t1`(\n  `id` bigint,"));
        assert!(get_create_statement(&table, Environment::Shadow).is_empty());
    }

    #[tokio::test]
    async fn test_run_table_sql_needs_connection() {
        let executor = Arc::new(RecordingSqlExecutor::new().unavailable(Environment::Right));
        let ctx = MigrationContext::new(Arc::new(fixtures::config()), executor.clone());
        let mut table = fixtures::external_table("t1");
        table.right_mut().add_sql("use", "USE db1");
        assert!(!run_table_sql(&ctx, &fixtures::db(), &mut table, Environment::Right).await);
        assert!(table.right().errors[0].contains("not available"));
        assert!(run_table_sql(&ctx, &fixtures::db(), &mut table, Environment::Left).await);
    }

    #[test]
    fn test_partition_clause() {
        assert_eq!(partition_clause("region=us/day=01"), "region='us', day='01'");
    }

    #[test]
    fn test_move_data_needs_partition_elements() {
        let config = fixtures::config();
        let mut target = EnvironmentTable::new("t1");
        target.definition = vec!["CREATE TABLE `t1`(".into(), "  `id` int)".into(), "PARTITIONED BY (".into()];
        let err = move_data(&config, &target, "s1", &target).unwrap_err();
        assert!(matches!(err, MigrationError::MissingDataPoint(_)));
    }

    #[tokio::test]
    async fn test_left_failure_skips_right_and_cleanup_is_best_effort() {
        let mut config = fixtures::config();
        config.execute = true;
        let executor = Arc::new(RecordingSqlExecutor::new().failing_on("INSERT").failing_on("DROP"));
        let ctx = MigrationContext::new(Arc::new(config), executor.clone());
        let db = fixtures::db();
        let mut table = fixtures::external_table("t1");
        table.left_mut().add_sql("use", "USE db1");
        table.left_mut().add_sql("move", "INSERT OVERWRITE TABLE x SELECT * FROM y");
        table.right_mut().add_sql("use", "USE db1");
        table.left_mut().add_cleanup_sql("drop", "DROP TABLE IF EXISTS x");

        assert!(!execute(&ctx, &db, &mut table).await);
        assert!(executor.statements(Environment::Right).await.is_empty());
        assert_eq!(table.left().errors.len(), 1);
        assert_eq!(table.left().issues.len(), 1);
    }

    #[tokio::test]
    async fn test_cleanup_failure_does_not_fail_table() {
        let mut config = fixtures::config();
        config.execute = true;
        let executor = Arc::new(RecordingSqlExecutor::new().failing_on("DROP"));
        let ctx = MigrationContext::new(Arc::new(config), executor.clone());
        let mut table = fixtures::external_table("t1");
        table.right_mut().add_sql("use", "USE db1");
        table.right_mut().add_cleanup_sql("drop shadow", "DROP TABLE IF EXISTS s1");
        assert!(execute(&ctx, &fixtures::db(), &mut table).await);
        assert_eq!(table.right().issues.len(), 1);
        assert_eq!(executor.statements(Environment::Right).await, vec!["USE db1"]);
    }

    #[tokio::test]
    async fn test_read_only_refuses_drop() {
        let mut config = fixtures::config();
        config.execute = true;
        config.read_only = true;
        let executor = Arc::new(RecordingSqlExecutor::new());
        let ctx = MigrationContext::new(Arc::new(config), executor.clone());
        let mut table = fixtures::external_table("t1");
        table.right_mut().add_sql("drop", "DROP TABLE IF EXISTS t1");
        assert!(!execute(&ctx, &fixtures::db(), &mut table).await);
        assert!(executor.transcript().await.is_empty());
    }

    #[tokio::test]
    async fn test_dry_run_executes_nothing() {
        let executor = Arc::new(RecordingSqlExecutor::new());
        let ctx = MigrationContext::new(Arc::new(fixtures::config()), executor.clone());
        let mut table = fixtures::external_table("t1");
        table.right_mut().add_sql("use", "USE db1");
        assert!(execute(&ctx, &fixtures::db(), &mut table).await);
        assert!(executor.transcript().await.is_empty());
    }
}

use serde::{Deserialize, Serialize};
use sqlparser::ast::{ObjectType, Statement};
use sqlparser::dialect::HiveDialect;
use sqlparser::parser::Parser;

use crate::models::{MigrationError, SqlPair};

/// Coarse kind of a generated Hive statement
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatementKind {
    Query,
    Use,
    Set,
    CreateTable,
    CreateDatabase,
    AlterTable,
    AlterDatabase,
    DropTable,
    DropDatabase,
    Insert,
    Export,
    Import,
    Repair,
    Other,
}

/// Statement classification for the read-only guard
pub struct SqlValidator;

impl SqlValidator {
    /// Classify with the Hive dialect, falling back to the leading keywords
    /// for Hive DDL the parser does not cover (EXPORT, IMPORT, SET ...).
    pub fn classify(sql: &str) -> StatementKind {
        let dialect = HiveDialect {};
        match Parser::parse_sql(&dialect, sql) {
            Ok(statements) => match statements.first() {
                Some(Statement::Query(_)) => StatementKind::Query,
                Some(Statement::Insert { .. }) => StatementKind::Insert,
                Some(Statement::CreateTable { .. }) => StatementKind::CreateTable,
                Some(Statement::CreateDatabase { .. }) => StatementKind::CreateDatabase,
                Some(Statement::AlterTable { .. }) => StatementKind::AlterTable,
                Some(Statement::Drop {
                    object_type: ObjectType::Table,
                    ..
                }) => StatementKind::DropTable,
                _ => Self::classify_keywords(sql),
            },
            Err(e) => {
                tracing::trace!("Hive dialect could not parse statement ({}); using keywords", e);
                Self::classify_keywords(sql)
            }
        }
    }

    fn classify_keywords(sql: &str) -> StatementKind {
        let upper = sql.trim_start().to_uppercase();
        let mut words = upper.split_whitespace();
        let first = words.next().unwrap_or("");
        let rest: Vec<&str> = words.take(3).collect();
        let mentions = |kw: &str| rest.contains(&kw);
        match first {
            "SELECT" | "WITH" => StatementKind::Query,
            "USE" => StatementKind::Use,
            "SET" => StatementKind::Set,
            "INSERT" => StatementKind::Insert,
            "EXPORT" => StatementKind::Export,
            "IMPORT" => StatementKind::Import,
            "MSCK" => StatementKind::Repair,
            "CREATE" if mentions("DATABASE") || mentions("SCHEMA") => StatementKind::CreateDatabase,
            "CREATE" if mentions("TABLE") => StatementKind::CreateTable,
            "ALTER" if mentions("DATABASE") || mentions("SCHEMA") => StatementKind::AlterDatabase,
            "ALTER" if mentions("TABLE") => StatementKind::AlterTable,
            "DROP" if mentions("DATABASE") || mentions("SCHEMA") => StatementKind::DropDatabase,
            "DROP" if mentions("TABLE") => StatementKind::DropTable,
            _ => StatementKind::Other,
        }
    }

    pub fn is_destructive(sql: &str) -> bool {
        matches!(
            Self::classify(sql),
            StatementKind::DropTable | StatementKind::DropDatabase
        )
    }

    /// Refuse any statement that would drop data on a read-only target
    pub fn check_read_only(statements: &[SqlPair]) -> Result<(), MigrationError> {
        let refused: Vec<String> = statements
            .iter()
            .filter(|pair| Self::is_destructive(&pair.statement))
            .map(|pair| format!("Read-only target refuses '{}': {}", pair.description, pair.statement))
            .collect();
        if refused.is_empty() {
            Ok(())
        } else {
            Err(MigrationError::Validation(refused))
        }
    }
}

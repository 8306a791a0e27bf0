//! PostgreSQL persistence.
//!
//! Loading is all-or-nothing per file: every insert for one JSON file runs
//! inside a single transaction, and an error drops the transaction (which
//! rolls it back) before the error is returned.

mod exam;
mod ox;

pub use exam::*;
pub use ox::*;

use crate::config::DbConfig;
use crate::error::ExamError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::PgConnection;
use std::time::Duration;
use tracing::{debug, info};

/// DDL applied by [`initialize_schema`].
pub const SCHEMA_SQL: &str = include_str!("schema.sql");

/// Open a small connection pool. The loaders are sequential, so two
/// connections are plenty.
pub async fn create_pool(config: &DbConfig) -> Result<PgPool, ExamError> {
    let options = config.connect_options()?;
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(options)
        .await?;
    info!(
        "Connected to database {}",
        config.name.as_deref().unwrap_or("(from DATABASE_URL)")
    );
    Ok(pool)
}

/// Statements of [`SCHEMA_SQL`], without comment-only fragments.
pub fn schema_statements() -> Vec<&'static str> {
    SCHEMA_SQL
        .split(';')
        .map(str::trim)
        .filter(|stmt| {
            stmt.lines()
                .any(|l| !l.trim().is_empty() && !l.trim_start().starts_with("--"))
        })
        .collect()
}

/// Create every table and index that does not exist yet.
pub async fn initialize_schema(pool: &PgPool) -> Result<(), ExamError> {
    let mut tx = pool.begin().await?;
    for stmt in schema_statements() {
        debug!("{}", stmt.lines().find(|l| !l.starts_with("--")).unwrap_or(stmt));
        sqlx::query(stmt).execute(&mut *tx).await?;
    }
    tx.commit().await?;
    info!("Schema ready");
    Ok(())
}

/// Id of the subject named `name`, if it exists.
pub(crate) async fn find_subject(conn: &mut PgConnection, name: &str) -> Result<Option<i32>, sqlx::Error> {
    let row: Option<(i32,)> = sqlx::query_as("SELECT id FROM subjects WHERE name = $1")
        .bind(name)
        .fetch_optional(conn)
        .await?;
    Ok(row.map(|(id,)| id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_splits_into_create_statements() {
        let stmts = schema_statements();
        let tables = stmts
            .iter()
            .filter(|s| s.contains("CREATE TABLE IF NOT EXISTS"))
            .count();
        assert_eq!(tables, 6);
        assert!(stmts.iter().all(|s| s.contains("CREATE")));
        assert!(stmts.iter().all(|s| !s.ends_with(';')));
    }

    #[test]
    fn schema_has_array_tag_columns() {
        assert_eq!(SCHEMA_SQL.matches("TEXT[]").count(), 2);
    }
}

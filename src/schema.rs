use crate::catalog::TableSpec;
use crate::db::ClickHouse;
use crate::error::{BackfillError, QueryError};

/// Database every target table lives in.
pub const TARGET_DATABASE: &str = "mainnet";

pub(crate) fn table_exists_sql(qualified: &str) -> String {
    let (database, table) = split_qualified(qualified);
    format!("SELECT 1 FROM system.tables WHERE database = '{database}' AND name = '{table}'")
}

fn split_qualified(qualified: &str) -> (&str, &str) {
    match qualified.split_once('.') {
        Some((database, table)) => (database, table),
        None => ("default", qualified),
    }
}

pub async fn table_exists(db: &dyn ClickHouse, qualified: &str) -> Result<bool, QueryError> {
    let value = db.query_scalar(&table_exists_sql(qualified)).await?;
    Ok(value.is_some())
}

pub async fn ensure_database(target: &dyn ClickHouse, name: &str) -> Result<(), BackfillError> {
    target
        .execute(&format!("CREATE DATABASE IF NOT EXISTS {name}"))
        .await
        .map_err(|err| BackfillError::Ddl {
            table: name.to_string(),
            detail: err.to_string(),
        })?;
    Ok(())
}

/// Idempotently create the target table for `spec`. Returns `true` when the
/// table was created, `false` when it already existed.
pub async fn ensure_table(
    target: &dyn ClickHouse,
    spec: &TableSpec,
) -> Result<bool, BackfillError> {
    let ddl_error = |detail: String| BackfillError::Ddl {
        table: spec.target_table.to_string(),
        detail,
    };

    match table_exists(target, spec.target_table).await {
        Ok(true) => return Ok(false),
        Ok(false) => {}
        Err(err) => return Err(ddl_error(err.to_string())),
    }

    for statement in spec.schema {
        if let Err(err) = target.execute(statement).await {
            // Replicated tables can race their own existence check.
            if err.to_string().to_lowercase().contains("already exists") {
                continue;
            }
            return Err(ddl_error(err.to_string()));
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn existence_check_splits_qualified_names() {
        assert_eq!(
            table_exists_sql("mainnet.int_address_diffs"),
            "SELECT 1 FROM system.tables WHERE database = 'mainnet' AND name = 'int_address_diffs'"
        );
        assert_eq!(
            table_exists_sql("bare_table"),
            "SELECT 1 FROM system.tables WHERE database = 'default' AND name = 'bare_table'"
        );
    }
}

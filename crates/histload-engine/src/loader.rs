//! Truncate-then-COPY bulk load into the warehouse.
//!
//! Runs inside one explicit transaction: begin, truncate, COPY the staged
//! partition, read the loaded row count, commit. Redshift commits TRUNCATE
//! implicitly, so a failure after the truncate can leave the table empty.

use histload_sdk::catalog::TableRef;
use histload_sdk::connector::WarehouseSession;
use pg_escape::{quote_identifier, quote_literal};

use crate::errors::TableError;

/// Row count of the last COPY in the current session.
pub const LAST_COPY_COUNT_SQL: &str = "SELECT PG_LAST_COPY_COUNT()";

/// Outcome of a successful bulk load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadStatus {
    pub affected_rows: i64,
}

fn qualified(table: &TableRef) -> String {
    format!(
        "{}.{}",
        quote_identifier(&table.schema),
        quote_identifier(&table.table)
    )
}

pub fn truncate_sql(table: &TableRef) -> String {
    format!("TRUNCATE TABLE {}", qualified(table))
}

pub fn copy_sql(table: &TableRef, uri: &str, iam_role: &str) -> String {
    format!(
        "COPY {} FROM {} IAM_ROLE {} FORMAT AS PARQUET",
        qualified(table),
        quote_literal(uri),
        quote_literal(iam_role)
    )
}

/// Replaces a warehouse table's contents with a staged partition.
#[derive(Debug, Clone)]
pub struct BulkLoader {
    iam_role: String,
}

impl BulkLoader {
    pub fn new(iam_role: impl Into<String>) -> Self {
        Self {
            iam_role: iam_role.into(),
        }
    }

    /// Truncate `table` and COPY every file under `uri` into it.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::Load`] if any statement fails. The transaction
    /// is rolled back and never committed in that case.
    pub async fn load<W: WarehouseSession>(
        &self,
        session: &mut W,
        table: &TableRef,
        uri: &str,
    ) -> Result<LoadStatus, TableError> {
        session.begin().await.map_err(TableError::load)?;

        match self.load_in_transaction(session, table, uri).await {
            Ok(status) => {
                session.commit().await.map_err(TableError::load)?;
                tracing::info!(
                    table = %table,
                    uri,
                    affected_rows = status.affected_rows,
                    "Bulk load committed"
                );
                Ok(status)
            }
            Err(err) => {
                if let Err(rollback_err) = session.rollback().await {
                    tracing::warn!(
                        table = %table,
                        error = %rollback_err,
                        "Rollback after failed load also failed"
                    );
                }
                Err(err)
            }
        }
    }

    async fn load_in_transaction<W: WarehouseSession>(
        &self,
        session: &mut W,
        table: &TableRef,
        uri: &str,
    ) -> Result<LoadStatus, TableError> {
        session
            .execute(&truncate_sql(table))
            .await
            .map_err(TableError::load)?;
        tracing::debug!(table = %table, "Truncated destination table");

        session
            .execute(&copy_sql(table, uri, &self.iam_role))
            .await
            .map_err(TableError::load)?;

        let affected_rows = session
            .query_count(LAST_COPY_COUNT_SQL)
            .await
            .map_err(TableError::load)?;
        Ok(LoadStatus { affected_rows })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use histload_sdk::catalog::CatalogColumn;
    use histload_sdk::error::ConnectorError;

    #[derive(Default)]
    struct RecordingSession {
        log: Vec<String>,
        fail_on: Option<&'static str>,
    }

    impl RecordingSession {
        fn step(&mut self, what: String) -> Result<(), ConnectorError> {
            let fail = self.fail_on.is_some_and(|f| what.starts_with(f));
            self.log.push(what);
            if fail {
                Err(ConnectorError::transient_db("STATEMENT_FAILED", "boom"))
            } else {
                Ok(())
            }
        }
    }

    impl WarehouseSession for RecordingSession {
        async fn catalog(&mut self, _: &TableRef) -> Result<Vec<CatalogColumn>, ConnectorError> {
            Ok(Vec::new())
        }
        async fn begin(&mut self) -> Result<(), ConnectorError> {
            self.step("BEGIN".into())
        }
        async fn execute(&mut self, sql: &str) -> Result<u64, ConnectorError> {
            self.step(sql.to_string()).map(|()| 0)
        }
        async fn query_count(&mut self, sql: &str) -> Result<i64, ConnectorError> {
            self.step(sql.to_string()).map(|()| 2_500_000)
        }
        async fn commit(&mut self) -> Result<(), ConnectorError> {
            self.step("COMMIT".into())
        }
        async fn rollback(&mut self) -> Result<(), ConnectorError> {
            self.step("ROLLBACK".into())
        }
    }

    fn table() -> TableRef {
        TableRef::new("hr_raw", "employees")
    }

    #[test]
    fn statements_are_quoted() {
        assert_eq!(truncate_sql(&table()), "TRUNCATE TABLE hr_raw.employees");
        assert_eq!(
            truncate_sql(&TableRef::new("hr", "Pay Roll")),
            "TRUNCATE TABLE hr.\"Pay Roll\""
        );
        assert_eq!(
            copy_sql(&table(), "s3://b/raw/employees/2024/01/01/00/", "arn:aws:iam::1:role/r"),
            "COPY hr_raw.employees FROM 's3://b/raw/employees/2024/01/01/00/' \
             IAM_ROLE 'arn:aws:iam::1:role/r' FORMAT AS PARQUET"
        );
    }

    #[tokio::test]
    async fn load_runs_statements_in_order() {
        let mut session = RecordingSession::default();
        let status = BulkLoader::new("arn:role")
            .load(&mut session, &table(), "s3://b/p/")
            .await
            .unwrap();
        assert_eq!(status.affected_rows, 2_500_000);
        assert_eq!(
            session.log,
            vec![
                "BEGIN".to_string(),
                "TRUNCATE TABLE hr_raw.employees".to_string(),
                "COPY hr_raw.employees FROM 's3://b/p/' IAM_ROLE 'arn:role' FORMAT AS PARQUET"
                    .to_string(),
                "SELECT PG_LAST_COPY_COUNT()".to_string(),
                "COMMIT".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn failed_copy_rolls_back_without_commit() {
        let mut session = RecordingSession {
            fail_on: Some("COPY"),
            ..Default::default()
        };
        let err = BulkLoader::new("arn:role")
            .load(&mut session, &table(), "s3://b/p/")
            .await
            .unwrap_err();
        assert!(matches!(err, TableError::Load(_)));
        assert_eq!(session.log.last().map(String::as_str), Some("ROLLBACK"));
        assert!(!session.log.iter().any(|s| s == "COMMIT"));
    }

    #[tokio::test]
    async fn failed_begin_issues_nothing_else() {
        let mut session = RecordingSession {
            fail_on: Some("BEGIN"),
            ..Default::default()
        };
        assert!(BulkLoader::new("arn:role")
            .load(&mut session, &table(), "s3://b/p/")
            .await
            .is_err());
        assert_eq!(session.log, vec!["BEGIN".to_string()]);
    }
}

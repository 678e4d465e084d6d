use chrono::{DateTime, NaiveDateTime, Utc};
use tokio_postgres::{Client, NoTls, Row, types::ToSql};

use crate::{
    errors::{MigrateError, MigrateResult},
    source::RecordSource,
    types::SessionRecord,
};

/// Optionally schema-qualified Postgres table name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableName {
    schema: Option<String>,
    table: String,
}

impl TableName {
    /// Parses `table` or `schema.table`.
    pub fn parse(input: &str) -> MigrateResult<Self> {
        let input = input.trim();
        let (schema, table) = match input.split_once('.') {
            Some((schema, table)) => (Some(schema.trim().to_string()), table.trim().to_string()),
            None => (None, input.to_string()),
        };
        if table.is_empty() {
            return Err(MigrateError::invalid_config("table name is required"));
        }
        if schema.as_deref().is_some_and(str::is_empty) {
            return Err(MigrateError::invalid_config("schema name must not be empty"));
        }
        Ok(Self { schema, table })
    }

    /// Table reference with quoted identifiers.
    pub fn qualified(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", quote_ident(schema), quote_ident(&self.table)),
            None => quote_ident(&self.table),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }
}

impl Default for TableName {
    fn default() -> Self {
        Self {
            schema: None,
            table: "django_session".to_string(),
        }
    }
}

/// Quotes a Postgres identifier, escaping embedded quotes.
fn quote_ident(input: &str) -> String {
    format!("\"{}\"", input.replace('"', "\"\""))
}

/// Session table (`session_key`, `session_data`, `expire_date`) in Postgres.
pub struct PostgresSource {
    client: Client,
    table: TableName,
}

impl PostgresSource {
    pub fn new(client: Client, table: TableName) -> Self {
        Self { client, table }
    }

    /// Connects without TLS and drives the connection on a background task.
    pub async fn connect(url: &str, table: TableName) -> MigrateResult<Self> {
        let (client, connection) = tokio_postgres::connect(url, NoTls)
            .await
            .map_err(|err| MigrateError::source_read("failed to connect to postgres", err))?;
        tokio::spawn(async move {
            if let Err(err) = connection.await {
                log::error!("postgres connection error: {err}");
            }
        });
        Ok(Self::new(client, table))
    }

    pub fn table(&self) -> &TableName {
        &self.table
    }

    fn count_sql(&self) -> String {
        format!("SELECT COUNT(*) FROM {}", self.table.qualified())
    }

}

/// Keyed page query. Keys compare under the `C` collation so the database
/// orders them bytewise, the same way the stream checks them.
fn page_sql(table: &TableName, after_key: bool) -> String {
    let filter = if after_key {
        "WHERE session_key COLLATE \"C\" > $1 "
    } else {
        ""
    };
    let limit = if after_key { "$2" } else { "$1" };
    format!(
        "SELECT session_key, session_data, expire_date FROM {} {filter}ORDER BY session_key COLLATE \"C\" LIMIT {limit}",
        table.qualified()
    )
}

impl RecordSource for PostgresSource {
    async fn count(&mut self) -> MigrateResult<u64> {
        let row = self.client.query_one(&self.count_sql(), &[]).await?;
        let total: i64 = row
            .try_get(0)
            .map_err(|err| MigrateError::source_read("failed to decode session count", err))?;
        Ok(total.max(0) as u64)
    }

    async fn page_after(&mut self, last_key: Option<&str>, limit: usize) -> MigrateResult<Vec<SessionRecord>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = match last_key {
            Some(key) => {
                let params: [&(dyn ToSql + Sync); 2] = [&key, &limit];
                self.client.query(&page_sql(&self.table, true), &params).await?
            }
            None => {
                let params: [&(dyn ToSql + Sync); 1] = [&limit];
                self.client.query(&page_sql(&self.table, false), &params).await?
            }
        };
        rows.iter().map(decode_row).collect()
    }
}

fn decode_row(row: &Row) -> MigrateResult<SessionRecord> {
    let key: String = row
        .try_get(0)
        .map_err(|err| MigrateError::source_read("failed to decode session_key", err))?;

    let payload = match row.try_get::<_, String>(1) {
        Ok(text) => text.into_bytes(),
        Err(_) => row
            .try_get::<_, Vec<u8>>(1)
            .map_err(|err| MigrateError::source_read(format!("failed to decode session_data of {key:?}"), err))?,
    };

    // `timestamptz` when the project uses time zones, plain `timestamp` otherwise.
    // Naive values are taken as UTC.
    let expire_at = match row.try_get::<_, DateTime<Utc>>(2) {
        Ok(at) => at,
        Err(_) => row
            .try_get::<_, NaiveDateTime>(2)
            .map(|naive| naive.and_utc())
            .map_err(|err| MigrateError::source_read(format!("failed to decode expire_date of {key:?}"), err))?,
    };

    Ok(SessionRecord {
        key,
        payload,
        expire_at,
    })
}

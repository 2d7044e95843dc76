use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgRow, PgTypeInfo};
use sqlx::query::Query;
use sqlx::{Column, PgPool, Postgres, Row, TypeInfo};
use tracing::{debug, error};
use uuid::Uuid;

use super::manager::DatabaseError;
use super::store::{DataStore, RecordMap};
use crate::filter::filter::is_identifier;
use crate::filter::{Filter, FilterData, FilterError, SqlResult};

/// PostgreSQL store: one table per resource, rows returned as JSON objects.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn where_filter(resource: &str, where_clause: Option<Value>) -> Result<Filter, DatabaseError> {
        let mut filter = Filter::new(resource)?;
        if let Some(where_clause) = where_clause {
            filter.where_clause(where_clause)?;
        }
        Ok(filter)
    }

    async fn fetch_rows(&self, sql: SqlResult) -> Result<Vec<RecordMap>, DatabaseError> {
        debug!("SQL: {}", sql.query);
        let mut query = sqlx::query(&sql.query);
        for param in sql.params {
            query = bind_param(query, param);
        }
        let rows = query.fetch_all(&self.pool).await.map_err(log_sqlx)?;
        Ok(rows.iter().map(row_to_record).collect())
    }

    async fn execute(&self, sql: SqlResult) -> Result<u64, DatabaseError> {
        debug!("SQL: {}", sql.query);
        let mut query = sqlx::query(&sql.query);
        for param in sql.params {
            query = bind_param(query, param);
        }
        let result = query.execute(&self.pool).await.map_err(log_sqlx)?;
        Ok(result.rows_affected())
    }

    fn insert_sql(resource: &str, record: &RecordMap) -> Result<SqlResult, DatabaseError> {
        Filter::validate_table_name(resource)?;
        if record.is_empty() {
            return Ok(SqlResult {
                query: format!("INSERT INTO \"{}\" DEFAULT VALUES RETURNING *", resource),
                params: vec![],
            });
        }
        let mut columns = Vec::with_capacity(record.len());
        let mut placeholders = Vec::with_capacity(record.len());
        let mut params = Vec::with_capacity(record.len());
        for (column, value) in record {
            if !is_identifier(column) {
                return Err(FilterError::InvalidColumn(format!("Invalid column name format: {}", column)).into());
            }
            params.push(value.clone());
            columns.push(format!("\"{}\"", column));
            placeholders.push(format!("${}", params.len()));
        }
        Ok(SqlResult {
            query: format!(
                "INSERT INTO \"{}\" ({}) VALUES ({}) RETURNING *",
                resource,
                columns.join(", "),
                placeholders.join(", ")
            ),
            params,
        })
    }
}

#[async_trait]
impl DataStore for PgStore {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn select(&self, resource: &str, filter_data: FilterData) -> Result<Vec<RecordMap>, DatabaseError> {
        let mut filter = Filter::new(resource)?;
        filter.assign(filter_data)?;
        self.fetch_rows(filter.to_sql()?).await
    }

    async fn count(&self, resource: &str, where_clause: Option<Value>) -> Result<u64, DatabaseError> {
        let sql = Self::where_filter(resource, where_clause)?.to_count_sql()?;
        debug!("SQL: {}", sql.query);
        let mut query = sqlx::query(&sql.query);
        for param in sql.params {
            query = bind_param(query, param);
        }
        let row = query.fetch_one(&self.pool).await.map_err(log_sqlx)?;
        let count: i64 = row.try_get("count")?;
        Ok(count.max(0) as u64)
    }

    async fn insert(&self, resource: &str, records: Vec<RecordMap>) -> Result<Vec<RecordMap>, DatabaseError> {
        let mut tx = self.pool.begin().await?;
        let mut stored = Vec::with_capacity(records.len());
        for record in &records {
            let sql = Self::insert_sql(resource, record)?;
            debug!("SQL: {}", sql.query);
            let mut query = sqlx::query(&sql.query);
            for param in sql.params {
                query = bind_param(query, param);
            }
            let row = query.fetch_one(&mut *tx).await.map_err(log_sqlx)?;
            stored.push(row_to_record(&row));
        }
        tx.commit().await?;
        Ok(stored)
    }

    async fn update(&self, resource: &str, where_clause: Option<Value>, changes: RecordMap) -> Result<u64, DatabaseError> {
        let sql = Self::where_filter(resource, where_clause)?.to_update_sql(&changes)?;
        self.execute(sql).await
    }

    async fn delete(&self, resource: &str, where_clause: Option<Value>) -> Result<u64, DatabaseError> {
        let sql = Self::where_filter(resource, where_clause)?.to_delete_sql()?;
        self.execute(sql).await
    }
}

fn log_sqlx(e: sqlx::Error) -> DatabaseError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return DatabaseError::Conflict(db.message().to_string());
        }
    }
    error!("Database query failed: {}", e);
    DatabaseError::Sqlx(e)
}

fn row_to_record(row: &PgRow) -> RecordMap {
    let mut record = RecordMap::new();
    for (i, column) in row.columns().iter().enumerate() {
        record.insert(column.name().to_string(), extract_column_value(row, i, column.type_info()));
    }
    record
}

/// Extract typed value from database column
fn extract_column_value(row: &PgRow, index: usize, type_info: &PgTypeInfo) -> Value {
    let type_name = type_info.name();
    match type_name {
        "UUID" => row
            .try_get::<Option<Uuid>, _>(index)
            .ok()
            .flatten()
            .map(|u| Value::String(u.to_string()))
            .unwrap_or(Value::Null),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => row
            .try_get::<Option<String>, _>(index)
            .ok()
            .flatten()
            .map(Value::String)
            .unwrap_or(Value::Null),
        "INT2" => row
            .try_get::<Option<i16>, _>(index)
            .ok()
            .flatten()
            .map(|n| Value::from(n as i64))
            .unwrap_or(Value::Null),
        "INT4" => row
            .try_get::<Option<i32>, _>(index)
            .ok()
            .flatten()
            .map(|n| Value::from(n as i64))
            .unwrap_or(Value::Null),
        "INT8" => row
            .try_get::<Option<i64>, _>(index)
            .ok()
            .flatten()
            .map(Value::from)
            .unwrap_or(Value::Null),
        "FLOAT4" | "FLOAT8" => row
            .try_get::<Option<f64>, _>(index)
            .ok()
            .flatten()
            .map(Value::from)
            .unwrap_or(Value::Null),
        "BOOL" => row
            .try_get::<Option<bool>, _>(index)
            .ok()
            .flatten()
            .map(Value::Bool)
            .unwrap_or(Value::Null),
        "JSONB" | "JSON" => row.try_get::<Option<Value>, _>(index).ok().flatten().unwrap_or(Value::Null),
        "TIMESTAMPTZ" => row
            .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(index)
            .ok()
            .flatten()
            .map(|t| Value::String(t.to_rfc3339()))
            .unwrap_or(Value::Null),
        "TIMESTAMP" => row
            .try_get::<Option<chrono::NaiveDateTime>, _>(index)
            .ok()
            .flatten()
            .map(|t| Value::String(t.and_utc().to_rfc3339()))
            .unwrap_or(Value::Null),
        "DATE" => row
            .try_get::<Option<chrono::NaiveDate>, _>(index)
            .ok()
            .flatten()
            .map(|d| Value::String(d.to_string()))
            .unwrap_or(Value::Null),
        _ => {
            tracing::warn!("Unhandled PostgreSQL type: {}, falling back to string", type_name);
            row.try_get::<Option<String>, _>(index)
                .ok()
                .flatten()
                .map(Value::String)
                .unwrap_or(Value::Null)
        }
    }
}

/// Bind parameter to SQL query. Strings bind as text: tenant and record ids
/// are text columns.
fn bind_param(q: Query<'_, Postgres, PgArguments>, v: Value) -> Query<'_, Postgres, PgArguments> {
    match v {
        Value::Null => q.bind(Option::<String>::None),
        Value::Bool(b) => q.bind(b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                q.bind(i)
            } else if let Some(f) = n.as_f64() {
                q.bind(f)
            } else {
                q.bind(n.to_string())
            }
        }
        Value::String(s) => q.bind(s),
        // JSONB
        other => q.bind(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_insert_sql() {
        let record = json!({"name": "Alpha", "organization_id": "org-a"}).as_object().cloned().unwrap();
        let sql = PgStore::insert_sql("stations", &record).unwrap();
        assert_eq!(
            sql.query,
            "INSERT INTO \"stations\" (\"name\", \"organization_id\") VALUES ($1, $2) RETURNING *"
        );
        assert_eq!(sql.params, vec![json!("Alpha"), json!("org-a")]);
    }

    #[test]
    fn test_insert_sql_rejects_bad_column() {
        let record = json!({"name) VALUES (1); --": "x"}).as_object().cloned().unwrap();
        assert!(PgStore::insert_sql("stations", &record).is_err());
    }

    #[test]
    fn test_extracted_column_types_are_decodable() {
        fn decodable<T>()
        where
            T: for<'r> sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
        {
        }
        decodable::<Uuid>();
        decodable::<chrono::DateTime<chrono::Utc>>();
        decodable::<Value>();
    }
}

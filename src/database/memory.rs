use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::manager::DatabaseError;
use super::store::{DataStore, RecordMap};
use crate::filter::filter_match::compare_values;
use crate::filter::filter_order::FilterOrder;
use crate::filter::{Filter, FilterData, FilterMatch, SortDirection};

/// Table-per-resource store held in process memory.
///
/// Evaluates the same WHERE language as the PostgreSQL store, for tests and
/// local development.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Vec<RecordMap>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts rows verbatim, bypassing id and timestamp generation.
    pub async fn seed(&self, resource: &str, rows: Vec<RecordMap>) {
        self.tables.write().await.entry(resource.to_string()).or_default().extend(rows);
    }

    /// Every row of a resource, unfiltered.
    pub async fn dump(&self, resource: &str) -> Vec<RecordMap> {
        self.tables.read().await.get(resource).cloned().unwrap_or_default()
    }

    fn matches(where_clause: &Option<Value>, row: &RecordMap) -> Result<bool, DatabaseError> {
        match where_clause {
            Some(where_data) => Ok(FilterMatch::matches(where_data, row)?),
            None => Ok(true),
        }
    }

    fn sort(rows: &mut [RecordMap], order: &Value) -> Result<(), DatabaseError> {
        let infos = FilterOrder::validate_and_parse(order)?;
        rows.sort_by(|a, b| {
            for info in &infos {
                let left = a.get(&info.column).unwrap_or(&Value::Null);
                let right = b.get(&info.column).unwrap_or(&Value::Null);
                // NULLs sort last ascending, as in PostgreSQL
                let ordering = match (left.is_null(), right.is_null()) {
                    (true, true) => Ordering::Equal,
                    (true, false) => Ordering::Greater,
                    (false, true) => Ordering::Less,
                    (false, false) => compare_values(left, right).unwrap_or(Ordering::Equal),
                };
                let ordering = match info.sort {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });
        Ok(())
    }
}

#[async_trait]
impl DataStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn select(&self, resource: &str, filter: FilterData) -> Result<Vec<RecordMap>, DatabaseError> {
        Filter::new(resource)?.assign(filter.clone())?;

        let tables = self.tables.read().await;
        let mut rows = Vec::new();
        for row in tables.get(resource).into_iter().flatten() {
            if Self::matches(&filter.where_clause, row)? {
                rows.push(row.clone());
            }
        }
        drop(tables);

        if let Some(order) = &filter.order {
            Self::sort(&mut rows, order)?;
        }

        let offset = filter.offset.unwrap_or(0).max(0) as usize;
        let max_limit = crate::config::config().filter.max_limit.unwrap_or(i32::MAX);
        let limit = filter.limit.map(|l| l.min(max_limit).max(0) as usize).unwrap_or(usize::MAX);
        let mut rows: Vec<RecordMap> = rows.into_iter().skip(offset).take(limit).collect();

        if let Some(columns) = filter.select.filter(|c| !c.is_empty() && !c.iter().any(|c| c == "*")) {
            for row in rows.iter_mut() {
                row.retain(|key, _| columns.contains(key));
            }
        }
        Ok(rows)
    }

    async fn count(&self, resource: &str, where_clause: Option<Value>) -> Result<u64, DatabaseError> {
        Filter::validate_table_name(resource)?;
        let tables = self.tables.read().await;
        let mut count = 0u64;
        for row in tables.get(resource).into_iter().flatten() {
            if Self::matches(&where_clause, row)? {
                count += 1;
            }
        }
        Ok(count)
    }

    async fn insert(&self, resource: &str, records: Vec<RecordMap>) -> Result<Vec<RecordMap>, DatabaseError> {
        Filter::validate_table_name(resource)?;
        let mut tables = self.tables.write().await;
        let table = tables.entry(resource.to_string()).or_default();

        let now = Value::String(Utc::now().to_rfc3339());
        let mut stored = Vec::with_capacity(records.len());
        for mut record in records {
            let id = record
                .entry("id".to_string())
                .or_insert_with(|| Value::String(Uuid::new_v4().to_string()))
                .clone();
            let duplicate = table.iter().chain(stored.iter()).any(|row: &RecordMap| row.get("id") == Some(&id));
            if duplicate {
                return Err(DatabaseError::Conflict(format!("{} with id {} already exists", resource, id)));
            }
            record.entry("created_at".to_string()).or_insert_with(|| now.clone());
            record.insert("updated_at".to_string(), now.clone());
            stored.push(record);
        }
        table.extend(stored.iter().cloned());
        Ok(stored)
    }

    async fn update(&self, resource: &str, where_clause: Option<Value>, changes: RecordMap) -> Result<u64, DatabaseError> {
        Filter::validate_table_name(resource)?;
        let mut tables = self.tables.write().await;
        let Some(table) = tables.get_mut(resource) else { return Ok(0) };

        let now = Value::String(Utc::now().to_rfc3339());
        let mut affected = 0u64;
        for row in table.iter_mut() {
            if Self::matches(&where_clause, row)? {
                for (column, value) in &changes {
                    row.insert(column.clone(), value.clone());
                }
                if !changes.contains_key("updated_at") {
                    row.insert("updated_at".to_string(), now.clone());
                }
                affected += 1;
            }
        }
        Ok(affected)
    }

    async fn delete(&self, resource: &str, where_clause: Option<Value>) -> Result<u64, DatabaseError> {
        Filter::validate_table_name(resource)?;
        let mut tables = self.tables.write().await;
        let Some(table) = tables.get_mut(resource) else { return Ok(0) };

        // Evaluate first so a malformed predicate leaves the table untouched.
        let mut keep = Vec::with_capacity(table.len());
        for row in table.iter() {
            keep.push(!Self::matches(&where_clause, row)?);
        }
        let before = table.len();
        let mut flags = keep.into_iter();
        table.retain(|_| flags.next().unwrap_or(true));
        Ok((before - table.len()) as u64)
    }
}

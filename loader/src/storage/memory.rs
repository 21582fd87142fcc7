use super::{RelationalStore, StoreTransaction};
use crate::models::FlatTuple;
use crate::schema::{OnConflict, TableSpec};
use async_trait::async_trait;
use common::{Error, Result};
use std::collections::{BTreeMap, HashSet};

/// In-process store backing `--dry-run`. Rows only become visible on commit.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: BTreeMap<String, Vec<FlatTuple>>,
    statements: Vec<String>,
    commits: usize,
    fail_inserts_into: Option<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_inserts_into(mut self, table: &str) -> Self {
        self.fail_inserts_into = Some(table.to_string());
        self
    }

    pub fn rows(&self, table: &str) -> &[FlatTuple] {
        self.tables.get(table).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn row_counts(&self) -> BTreeMap<String, usize> {
        self.tables
            .iter()
            .map(|(name, rows)| (name.clone(), rows.len()))
            .collect()
    }

    pub fn statements(&self) -> &[String] {
        &self.statements
    }

    pub fn commits(&self) -> usize {
        self.commits
    }
}

#[async_trait]
impl RelationalStore for MemoryStore {
    async fn execute(&mut self, statement: &str) -> Result<()> {
        self.statements.push(statement.to_string());
        Ok(())
    }

    async fn distinct_values(&mut self, table: &TableSpec, column: &str) -> Result<HashSet<String>> {
        let position = table.position(column).ok_or_else(|| {
            Error::SchemaValidation(format!("Unknown column {}.{}", table.name(), column))
        })?;

        Ok(self
            .rows(table.name())
            .iter()
            .filter_map(|row| row.get(position))
            .filter(|value| !value.is_null())
            .map(ToString::to_string)
            .collect())
    }

    async fn begin(&mut self) -> Result<Box<dyn StoreTransaction + '_>> {
        Ok(Box::new(MemoryTransaction {
            store: self,
            pending: Vec::new(),
        }))
    }
}

struct MemoryTransaction<'a> {
    store: &'a mut MemoryStore,
    pending: Vec<(String, Vec<FlatTuple>)>,
}

#[async_trait]
impl StoreTransaction for MemoryTransaction<'_> {
    async fn insert_batch(
        &mut self,
        table: &TableSpec,
        _on_conflict: OnConflict,
        rows: &[FlatTuple],
    ) -> Result<u64> {
        if self.store.fail_inserts_into.as_deref() == Some(table.name()) {
            return Err(Error::Storage(format!(
                "insert into {} rejected",
                table.name()
            )));
        }

        self.pending.push((table.name().to_string(), rows.to_vec()));
        Ok(rows.len() as u64)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let MemoryTransaction { store, pending } = *self;
        for (table, rows) in pending {
            store.tables.entry(table).or_default().extend(rows);
        }
        store.commits += 1;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

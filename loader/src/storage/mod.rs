pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

use crate::models::FlatTuple;
use crate::schema::{OnConflict, TableSpec};
use async_trait::async_trait;
use common::Result;
use std::collections::HashSet;

#[async_trait]
pub trait RelationalStore: Send {
    async fn execute(&mut self, statement: &str) -> Result<()>;

    /// Distinct non-null values of one column, rendered as text.
    async fn distinct_values(&mut self, table: &TableSpec, column: &str) -> Result<HashSet<String>>;

    async fn begin(&mut self) -> Result<Box<dyn StoreTransaction + '_>>;
}

/// A unit of work. Dropping it without `commit` discards everything inserted.
#[async_trait]
pub trait StoreTransaction: Send {
    /// Inserts `rows` into `table` and returns how many the store kept.
    async fn insert_batch(
        &mut self,
        table: &TableSpec,
        on_conflict: OnConflict,
        rows: &[FlatTuple],
    ) -> Result<u64>;

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}
